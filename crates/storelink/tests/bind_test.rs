//! Tests for storelink bind module

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};
use storelink::prelude::*;

#[derive(Debug, Default, Clone, PartialEq, Record)]
struct User {
    id: u64,
    #[record(default = "anon")]
    name: String,
    age: i32,
    active: bool,
    score: Option<f64>,
    #[record(skip)]
    session: String,
}

fn user_columns() -> Vec<Column> {
    vec![
        Column::new("id", "BIGINT UNSIGNED"),
        Column::new("name", "VARCHAR(64)"),
        Column::new("age", "INT"),
        Column::new("active", "TINYINT"),
        Column::new("score", "DOUBLE"),
        Column::new("session", "VARCHAR(64)"),
    ]
}

fn user_row(id: u64) -> Vec<(String, Option<String>)> {
    vec![
        ("id".to_string(), Some(id.to_string())),
        ("name".to_string(), Some(format!("user{}", id))),
        ("age".to_string(), Some("30".to_string())),
        ("active".to_string(), Some("1".to_string())),
        ("score".to_string(), Some("4.5".to_string())),
        ("session".to_string(), Some("token".to_string())),
    ]
}

fn users(count: u64) -> TabularResult {
    (1..=count).fold(TabularResult::new(user_columns()), |result, id| {
        result.with_row(user_row(id))
    })
}

// ==================== Structure Target Tests ====================

#[test]
fn test_bind_one_structure() {
    let user: User = bind_one(&users(1)).unwrap();

    assert_eq!(user.id, 1);
    assert_eq!(user.name, "user1");
    assert_eq!(user.age, 30);
    assert!(user.active);
    assert_eq!(user.score, Some(4.5));
}

#[test]
fn test_overflow_rejected_not_truncated() {
    let result = TabularResult::new(user_columns())
        .with_row([("id", Some("1")), ("age", Some("999999999999999999999"))]);

    let err = bind_one::<User>(&result).unwrap_err();
    match err {
        Error::Bind(bind) => {
            assert!(bind.is_overflow());
            assert_eq!(bind.target(), "age");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_default_substitution() {
    let absent = TabularResult::new(user_columns()).with_row([("id", Some("7"))]);
    let user: User = bind_one(&absent).unwrap();
    assert_eq!(user.name, "anon");

    let empty = TabularResult::new(user_columns()).with_row([("id", Some("7")), ("name", Some(""))]);
    let user: User = bind_one(&empty).unwrap();
    assert_eq!(user.name, "anon");
}

#[test]
fn test_skipped_field_never_written() {
    let user: User = bind_one(&users(1)).unwrap();
    assert!(user.session.is_empty());

    let mut existing = User {
        session: "keep".into(),
        ..Default::default()
    };
    bind_into(&users(1), &mut existing).unwrap();
    assert_eq!(existing.session, "keep");
}

#[test]
fn test_empty_non_string_keeps_current_value() {
    let result = TabularResult::new(user_columns())
        .with_row([("id", Some("3")), ("age", Some("")), ("score", None)]);

    let mut user = User {
        age: 41,
        score: Some(1.0),
        ..Default::default()
    };
    bind_into(&result, &mut user).unwrap();

    assert_eq!(user.id, 3);
    assert_eq!(user.age, 41);
    assert_eq!(user.score, None);
}

#[test]
fn test_bind_idempotent() {
    let result = users(1);
    let mut first = User::default();
    let mut second = User::default();

    bind_into(&result, &mut first).unwrap();
    bind_into(&result, &mut second).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.id, 1);
}

#[test]
fn test_fail_fast_keeps_earlier_fields() {
    let result = TabularResult::new(user_columns())
        .with_row([("id", Some("9")), ("name", Some("zed")), ("age", Some("old"))]);

    let mut user = User::default();
    let err = bind_into(&result, &mut user).unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Bind);
    assert_eq!(user.id, 9);
    assert_eq!(user.name, "zed");
    assert!(!user.active);
}

// ==================== Required Field Tests ====================

#[derive(Debug, Default, Record)]
struct Account {
    #[record(not_empty)]
    email: String,
    #[record(not_empty, default = "free")]
    plan: String,
}

#[test]
fn test_required_absent_vs_empty() {
    let columns = [Column::new("email", "VARCHAR"), Column::new("plan", "VARCHAR")];

    let absent = TabularResult::new(columns.clone()).with_row([("plan", Some("pro"))]);
    match bind_one::<Account>(&absent).unwrap_err() {
        Error::Bind(BindError::Required { field, absent }) => {
            assert_eq!(field, "email");
            assert!(absent);
        }
        other => panic!("unexpected error: {other}"),
    }

    let empty = TabularResult::new(columns.clone()).with_row([("email", Some(""))]);
    match bind_one::<Account>(&empty).unwrap_err() {
        Error::Bind(BindError::Required { absent, .. }) => assert!(!absent),
        other => panic!("unexpected error: {other}"),
    }

    let defaulted = TabularResult::new(columns).with_row([("email", Some("a@b.c"))]);
    let account: Account = bind_one(&defaulted).unwrap();
    assert_eq!(account.plan, "free");
}

// ==================== Column Naming Tests ====================

#[derive(Debug, Default, Record)]
#[allow(non_snake_case)]
struct Legacy {
    UserName: String,
    #[record(column = "UserMail")]
    mail: String,
}

#[test]
fn test_untagged_lowercased_tagged_verbatim() {
    let result = TabularResult::new([
        Column::new("username", "VARCHAR"),
        Column::new("UserMail", "VARCHAR"),
    ])
    .with_row([("username", Some("ann")), ("UserMail", Some("ann@x.io"))]);

    let legacy: Legacy = bind_one(&result).unwrap();
    assert_eq!(legacy.UserName, "ann");
    assert_eq!(legacy.mail, "ann@x.io");

    let wrong_case = TabularResult::new([Column::new("usermail", "VARCHAR")])
        .with_row([("usermail", Some("nope"))]);
    let legacy: Legacy = bind_one(&wrong_case).unwrap();
    assert!(legacy.mail.is_empty());
}

// ==================== Kind Coverage Tests ====================

#[derive(Debug, Default, Record)]
struct Sample {
    tiny: i8,
    small: u16,
    ratio: f32,
    created: Option<NaiveDateTime>,
    blob: Vec<u8>,
}

#[test]
fn test_narrow_kinds_checked() {
    let columns = [Column::new("tiny", "TINYINT"), Column::new("small", "SMALLINT")];

    let ok = TabularResult::new(columns.clone()).with_row([("tiny", Some("-128")), ("small", Some("65535"))]);
    let sample: Sample = bind_one(&ok).unwrap();
    assert_eq!(sample.tiny, -128);
    assert_eq!(sample.small, 65535);

    let bad = TabularResult::new(columns).with_row([("small", Some("-1"))]);
    assert!(bind_one::<Sample>(&bad).is_err());

    let huge = TabularResult::new([Column::new("ratio", "FLOAT")]).with_row([("ratio", Some("1e39"))]);
    assert!(bind_one::<Sample>(&huge).is_err());
}

#[test]
fn test_timestamps_rfc3339_or_format() {
    let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(10, 20, 30))
        .unwrap();

    for raw in ["2024-03-01T10:20:30Z", "2024-03-01 10:20:30"] {
        let result = TabularResult::new([Column::new("created", "DATETIME")])
            .with_row([("created", Some(raw))]);
        let sample: Sample = bind_one(&result).unwrap();
        assert_eq!(sample.created, Some(expected));
    }

    let custom = ResultBinder::new(BinderOptions::default().with_datetime_format("%d/%m/%Y %H:%M"));
    let result = TabularResult::new([Column::new("created", "DATETIME")])
        .with_row([("created", Some("01/03/2024 10:20"))]);
    let sample: Sample = custom.bind_one(&result).unwrap();
    assert_eq!(sample.created.map(|d| d.date()), Some(expected.date()));
}

#[test]
fn test_unsupported_kind_named_in_error() {
    let result = TabularResult::new([Column::new("blob", "BLOB")]).with_row([("blob", Some("xx"))]);

    match bind_one::<Sample>(&result).unwrap_err() {
        Error::Bind(BindError::Unsupported { field, kind }) => {
            assert_eq!(field, "blob");
            assert_eq!(kind, "Vec");
        }
        other => panic!("unexpected error: {other}"),
    }

    let empty = TabularResult::new([Column::new("blob", "BLOB")]).with_row([("blob", Some(""))]);
    assert!(bind_one::<Sample>(&empty).is_ok());
}

#[derive(Debug, Default, Record)]
struct Attachment {
    id: i64,
    blob: Option<Vec<u8>>,
    raw: Vec<u8>,
}

#[test]
fn test_empty_unsupported_kind_ignored_even_when_optional() {
    let columns = [
        Column::new("id", "INT"),
        Column::new("blob", "BLOB"),
        Column::new("raw", "BLOB"),
    ];

    let empty = TabularResult::new(columns.clone())
        .with_row([("id", Some("1")), ("blob", Some("")), ("raw", Some(""))]);
    let attachment: Attachment = bind_one(&empty).unwrap();
    assert_eq!(attachment.id, 1);
    assert_eq!(attachment.blob, None);
    assert!(attachment.raw.is_empty());

    let absent = TabularResult::new(columns.clone()).with_row([("id", Some("2")), ("blob", None)]);
    assert!(bind_one::<Attachment>(&absent).is_ok());

    let present = TabularResult::new(columns).with_row([("id", Some("3")), ("blob", Some("xx"))]);
    match bind_one::<Attachment>(&present).unwrap_err() {
        Error::Bind(BindError::Unsupported { field, .. }) => assert_eq!(field, "blob"),
        other => panic!("unexpected error: {other}"),
    }
}

// ==================== Sequence Target Tests ====================

#[test]
fn test_sequence_growth_progression() {
    let mut out: Vec<User> = Vec::new();
    let mut capacities = Vec::new();
    for id in 1..=19 {
        let single = TabularResult::new(user_columns()).with_row(user_row(id));
        bind_all(&single, &mut out).unwrap();
        if capacities.last() != Some(&out.capacity()) {
            capacities.push(out.capacity());
        }
    }

    assert_eq!(out.len(), 19);
    assert_eq!(out[18].id, 19);
    assert_eq!(capacities, vec![4, 6, 9, 13, 19]);

    let mut out: Vec<User> = Vec::new();
    bind_all(&users(10), &mut out).unwrap();
    assert_eq!(out.capacity(), 13);

    let mut out: Vec<User> = Vec::with_capacity(4);
    bind_all(&users(5), &mut out).unwrap();
    assert_eq!(out.capacity(), 6);
}

#[test]
fn test_sequence_appends_to_existing() {
    let mut out: Vec<User> = Vec::new();
    bind_all(&users(2), &mut out).unwrap();
    bind_all(&users(2), &mut out).unwrap();
    assert_eq!(out.len(), 4);
}

#[test]
fn test_sequence_keeps_rows_before_failure() {
    let result = users(2).with_row([("id", Some("3")), ("age", Some("x"))]);

    let mut out: Vec<User> = Vec::new();
    assert!(bind_all(&result, &mut out).is_err());
    assert_eq!(out[0].id, 1);
    assert_eq!(out[1].id, 2);
}

// ==================== Empty Result Tests ====================

#[test]
fn test_empty_result_semantics() {
    let empty = TabularResult::new(user_columns());

    assert!(bind_one::<User>(&empty).unwrap_err().is_not_found());
    assert!(bind_one::<HashMap<String, Value>>(&empty)
        .unwrap_err()
        .is_not_found());

    let mut user = User::default();
    assert!(bind_into(&empty, &mut user).unwrap_err().is_not_found());

    let mut out: Vec<User> = Vec::new();
    bind_all(&empty, &mut out).unwrap();
    assert!(out.is_empty());
    assert_eq!(out.capacity(), 0);
}

// ==================== Map Target Tests ====================

#[test]
fn test_map_target_dispatch_on_column_type() {
    let result = TabularResult::new([
        Column::new("id", "BIGINT"),
        Column::new("price", "DECIMAL(10,2)"),
        Column::new("created", "DATETIME"),
        Column::new("note", "TEXT"),
        Column::new("deleted", "DATETIME"),
    ])
    .with_row([
        ("id", Some("12")),
        ("price", Some("9.95")),
        ("created", Some("2024-03-01T10:20:30Z")),
        ("note", Some("hello")),
        ("deleted", None),
    ]);

    let map: BTreeMap<String, Value> = bind_one(&result).unwrap();
    assert_eq!(map["id"], Value::Int(12));
    assert_eq!(map["price"], Value::Float(9.95));
    assert_eq!(map["created"], Value::Text("2024-03-01 10:20:30".into()));
    assert_eq!(map["note"], Value::Text("hello".into()));
    assert_eq!(map["deleted"], Value::Null);
}

#[test]
fn test_map_target_parse_error_names_column() {
    let result = TabularResult::new([Column::new("qty", "INT")]).with_row([("qty", Some("lots"))]);

    let err = bind_one::<HashMap<String, Value>>(&result).unwrap_err();
    match err {
        Error::Bind(bind) => assert_eq!(bind.target(), "qty"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_map_sequence() {
    let rows: Vec<HashMap<String, Value>> = ResultBinder::default().collect(&users(3)).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2]["id"], Value::Int(3));
    assert_eq!(rows[0]["active"], Value::Int(1));
}
