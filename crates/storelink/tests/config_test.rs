//! Tests for storelink config module

use proptest::prelude::*;
use std::io::Write;
use std::time::Duration;
use storelink::prelude::*;

const SETTINGS: &str = r#"
cache:
  dial_timeout: 2s
  operation_timeout: 500ms
  probe_interval: 30s

relational:
  orders:
    user: app
    password: ${STORELINK_TEST_UNSET_PASSWORD:-hunter2}
    host: ${STORELINK_TEST_UNSET_HOST:-db.internal}
    database: orders
    max_open_connections: 20
    max_idle_connections: 5
    conn_max_lifetime: 10m
    params:
      time_zone: "+00:00"

key_value:
  sessions:
    url: cache.internal:6379
    db: 2

coordination:
  cluster:
    endpoints: [zk1:2181, zk2:2181]
"#;

// ==================== Loading Tests ====================

#[test]
fn test_load_yaml_settings() {
    let settings = StoreSettings::from_yaml_str(SETTINGS).unwrap();

    assert_eq!(settings.cache.dial_timeout, Duration::from_secs(2));
    assert_eq!(settings.cache.operation_timeout, Duration::from_millis(500));
    assert_eq!(settings.cache.probe_interval, Some(Duration::from_secs(30)));

    let orders = &settings.relational["orders"];
    assert_eq!(orders.host, "db.internal");
    assert_eq!(orders.port, 3306);
    assert_eq!(orders.password.expose(), "hunter2");
    assert_eq!(orders.params["time_zone"], "+00:00");

    let pool = orders.pool_settings();
    assert_eq!(pool.max_open, 20);
    assert_eq!(pool.max_idle, 5);
    assert_eq!(pool.max_lifetime, Duration::from_secs(600));

    assert_eq!(settings.key_value["sessions"].db, 2);
    assert_eq!(settings.coordination["cluster"].endpoints.len(), 2);
    assert!(settings.document.is_empty());
}

#[test]
fn test_cache_defaults_when_section_missing() {
    let settings = StoreSettings::from_yaml_str("wide_column: {}\n").unwrap();
    assert_eq!(settings.cache, CacheOptions::default());
    assert_eq!(settings.cache.dial_timeout, Duration::from_secs(5));
    assert_eq!(settings.cache.probe_interval, None);
}

#[test]
fn test_env_var_overrides_default() {
    std::env::set_var("STORELINK_TEST_DOC_ADDR", "mongo.internal:27017");
    let settings = StoreSettings::from_yaml_str(
        "document:\n  catalog:\n    address: ${STORELINK_TEST_DOC_ADDR:-localhost:27017}\n",
    )
    .unwrap();
    assert_eq!(
        settings.document["catalog"].address,
        "mongo.internal:27017"
    );
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SETTINGS.as_bytes()).unwrap();

    let settings = StoreSettings::from_file(file.path()).unwrap();
    assert!(settings.relational.contains_key("orders"));
}

#[test]
fn test_missing_file_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = StoreSettings::from_file(dir.path().join("absent.yaml")).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

// ==================== Validation Tests ====================

#[test]
fn test_invalid_entry_named_in_error() {
    let yaml = "relational:\n  broken:\n    user: app\n    host: \"\"\n";
    let err = StoreSettings::from_yaml_str(yaml).unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert!(err.to_string().contains("relational.broken"), "{err}");
}

#[test]
fn test_zero_deadline_rejected() {
    let err = StoreSettings::from_yaml_str("cache:\n  dial_timeout: 0s\n").unwrap_err();
    assert!(err.to_string().contains("dial_timeout"));
}

#[test]
fn test_malformed_yaml_rejected() {
    let err = StoreSettings::from_yaml_str("relational: [").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn test_coordination_credentials_checked() {
    let mut config = CoordinationConfig::new(["zk1:2181"]);
    config.password = SensitiveString::new("secret");
    assert!(config.check().is_err());

    let config = CoordinationConfig::new(["zk1:2181", " "]);
    assert!(config.check().is_err());
}

// ==================== Secret Tests ====================

#[test]
fn test_secrets_redacted_when_serialized() {
    let settings = StoreSettings::from_yaml_str(SETTINGS).unwrap();
    let rendered = serde_yaml::to_string(&settings).unwrap();

    assert!(!rendered.contains("hunter2"));
    assert!(rendered.contains("***REDACTED***"));
    assert!(!format!("{:?}", settings).contains("hunter2"));
}

// ==================== Fingerprint Tests ====================

#[test]
fn test_fingerprint_differs_per_backend_kind() {
    let kv = KeyValueConfig::new("host:1", "", 0);
    let wide = WideColumnConfig::new("host:1");
    assert_ne!(kv.fingerprint(), wide.fingerprint());
}

#[test]
fn test_fingerprint_display() {
    let fp = KeyValueConfig::new("host:1", "", 0).fingerprint();
    assert_eq!(fp.to_string().len(), 64);
    assert_eq!(fp.short().len(), 12);
    assert!(fp.to_string().starts_with(&fp.short()));
}

proptest! {
    #[test]
    fn prop_endpoint_order_irrelevant(
        (endpoints, shuffled) in proptest::collection::vec("[a-z]{1,8}:[0-9]{2,4}", 1..6)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let a = CoordinationConfig::new(endpoints);
        let b = CoordinationConfig::new(shuffled);
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn prop_param_insertion_order_irrelevant(
        (params, shuffled) in proptest::collection::btree_map("[a-z_]{1,10}", "[a-zA-Z0-9]{0,8}", 0..6)
            .prop_map(|m| m.into_iter().collect::<Vec<_>>())
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let base = || RelationalConfig::new("app", "pw", "db", 3306, "shop");
        let a = params.iter().fold(base(), |c, (k, v)| c.with_param(k, v));
        let b = shuffled.iter().fold(base(), |c, (k, v)| c.with_param(k, v));
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
