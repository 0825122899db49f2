//! Tests for storelink error module

use std::error::Error as StdError;
use storelink::prelude::*;

// ==================== Category Tests ====================

#[test]
fn test_connection_class_errors() {
    let dial = Error::dial(BackendKind::Relational, "refused");
    let op = Error::operation("broken pipe");
    let timeout = Error::timeout("operation exceeded 10ms");

    for err in [&dial, &op, &timeout] {
        assert!(err.is_connection_error(), "{err} should be retried");
    }
    assert_eq!(dial.category(), ErrorCategory::Dial);
    assert_eq!(op.category(), ErrorCategory::Operation);
    assert_eq!(timeout.category(), ErrorCategory::Timeout);
}

#[test]
fn test_data_errors_not_connection_class() {
    let not_found = Error::NotFound;
    let config = Error::config("bad port");
    let bind = Error::from(BindError::Parse {
        target: "age".into(),
        value: "old".into(),
        expected: "i32",
    });

    assert!(!not_found.is_connection_error());
    assert!(!config.is_connection_error());
    assert!(!bind.is_connection_error());
    assert!(not_found.is_not_found());
    assert_eq!(bind.category(), ErrorCategory::Bind);
}

#[test]
fn test_category_display() {
    assert_eq!(ErrorCategory::NotFound.to_string(), "not_found");
    assert_eq!(ErrorCategory::Configuration.to_string(), "configuration");
}

// ==================== Display Tests ====================

#[test]
fn test_bind_error_messages() {
    let parse = BindError::Parse {
        target: "age".into(),
        value: "old".into(),
        expected: "i32",
    };
    assert_eq!(parse.to_string(), "cannot parse \"old\" for `age` as i32");

    let overflow = BindError::Overflow {
        target: "age".into(),
        value: "999999999999999999999".into(),
        kind: "i32",
    };
    assert_eq!(
        overflow.to_string(),
        "value \"999999999999999999999\" overflows i32 for `age`"
    );

    let required = BindError::Required {
        field: "email".into(),
        absent: false,
    };
    assert_eq!(
        required.to_string(),
        "field `email` must not be empty (column empty)"
    );

    let unsupported = BindError::Unsupported {
        field: "blob".into(),
        kind: "Vec".into(),
    };
    assert_eq!(unsupported.to_string(), "unsupported field kind Vec for `blob`");
}

#[test]
fn test_bind_error_is_transparent() {
    let inner = BindError::Required {
        field: "email".into(),
        absent: true,
    };
    let err = Error::from(inner.clone());
    assert_eq!(err.to_string(), inner.to_string());
}

// ==================== Source Tests ====================

#[test]
fn test_source_chain_preserved() {
    let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
    let err = Error::dial_with_source(BackendKind::Coordination, "cannot reach cluster", io);

    assert_eq!(err.to_string(), "coordination dial error: cannot reach cluster");
    let source = err.source().expect("source");
    assert_eq!(source.to_string(), "refused");

    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
    let err = Error::operation_with_source("write failed", io);
    assert!(err.source().is_some());
    assert!(Error::operation("plain").source().is_none());
}
