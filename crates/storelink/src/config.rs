//! Configuration for storelink
//!
//! - [`BackendConfig`]: what the connection cache needs from a backend config
//!   (fingerprint, pool sizing, validation)
//! - [`CacheOptions`]: dial/operation deadlines and the optional liveness probe
//! - [`StoreSettings`]: a YAML document of named backend configs with
//!   `${VAR}` / `${VAR:-default}` environment expansion

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use validator::Validate;

use crate::backends::coordination::CoordinationConfig;
use crate::backends::document::DocumentConfig;
use crate::backends::keyvalue::KeyValueConfig;
use crate::backends::relational::RelationalConfig;
use crate::backends::widecolumn::WideColumnConfig;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;

/// Pre-compiled regex for environment variable expansion
/// Pattern: ${VAR} or ${VAR:-default}
static ENV_VAR_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var regex pattern is invalid - this is a bug")
});

/// Kind of external store a cache instance serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Relational database (MySQL-style)
    Relational,
    /// Key-value store (Redis-style)
    KeyValue,
    /// Document store (Mongo-style)
    Document,
    /// Wide-column store (HBase-style)
    WideColumn,
    /// Search engine
    Search,
    /// Coordination service (etcd/ZooKeeper-style)
    Coordination,
    /// Message queue
    MessageQueue,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relational => write!(f, "relational"),
            Self::KeyValue => write!(f, "key-value"),
            Self::Document => write!(f, "document"),
            Self::WideColumn => write!(f, "wide-column"),
            Self::Search => write!(f, "search"),
            Self::Coordination => write!(f, "coordination"),
            Self::MessageQueue => write!(f, "message-queue"),
        }
    }
}

/// Configuration of one backend instance, as seen by the connection cache
pub trait BackendConfig: Clone + Send + Sync + 'static {
    /// Backend kind this configuration targets
    fn kind(&self) -> BackendKind;

    /// Deterministic, order-independent identity of the connection target
    fn fingerprint(&self) -> Fingerprint;

    /// Pool sizing knobs applied when a handle is dialed
    fn pool_settings(&self) -> PoolSettings {
        PoolSettings::default()
    }

    /// Reject malformed or contradictory configuration before dialing
    fn check(&self) -> Result<()> {
        Ok(())
    }
}

/// Pool sizing knobs passed to [`Dialer::dial`](crate::cache::Dialer::dial)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum open connections behind one handle
    pub max_open: u32,
    /// Maximum idle connections kept behind one handle
    pub max_idle: u32,
    /// Maximum lifetime of a pooled connection
    pub max_lifetime: Duration,
}

impl PoolSettings {
    /// Default maximum open connections
    pub const DEFAULT_MAX_OPEN: u32 = 10;
    /// Default maximum idle connections
    pub const DEFAULT_MAX_IDLE: u32 = 8;
    /// Default connection lifetime
    pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(3600);

    /// Create pool settings; zero values fall back to the defaults
    pub fn new(max_open: u32, max_idle: u32, max_lifetime: Duration) -> Self {
        Self {
            max_open: if max_open == 0 {
                Self::DEFAULT_MAX_OPEN
            } else {
                max_open
            },
            max_idle: if max_idle == 0 {
                Self::DEFAULT_MAX_IDLE
            } else {
                max_idle
            },
            max_lifetime: if max_lifetime.is_zero() {
                Self::DEFAULT_MAX_LIFETIME
            } else {
                max_lifetime
            },
        }
    }

    /// Validate cross-field constraints
    pub fn check(&self) -> Result<()> {
        if self.max_idle > self.max_open {
            return Err(Error::config(format!(
                "max idle connections ({}) exceeds max open connections ({})",
                self.max_idle, self.max_open
            )));
        }
        Ok(())
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::new(0, 0, Duration::ZERO)
    }
}

/// Wrapper for sensitive configuration values
#[derive(Clone)]
pub struct SensitiveString(SecretString);

impl SensitiveString {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// Expose the secret (for dialing and fingerprinting only)
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl Default for SensitiveString {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"***\"")
    }
}

impl From<String> for SensitiveString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SensitiveString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for SensitiveString {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str("***REDACTED***")
    }
}

impl<'de> Deserialize<'de> for SensitiveString {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

/// Deadlines and probing for a connection cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Upper bound for establishing a new handle
    #[serde(default = "default_dial_timeout", with = "humantime_serde")]
    pub dial_timeout: Duration,

    /// Upper bound for one operation run through `with_connection`
    #[serde(default = "default_operation_timeout", with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// Liveness probe interval (disabled when absent)
    #[serde(default, with = "humantime_serde")]
    pub probe_interval: Option<Duration>,
}

fn default_dial_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_operation_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            dial_timeout: default_dial_timeout(),
            operation_timeout: default_operation_timeout(),
            probe_interval: None,
        }
    }
}

impl CacheOptions {
    /// Set the dial timeout
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Set the per-operation deadline
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Enable the liveness probe
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = Some(interval);
        self
    }

    /// Reject zero deadlines; no operation may wait unbounded or not at all
    pub fn check(&self) -> Result<()> {
        if self.dial_timeout.is_zero() {
            return Err(Error::config("dial_timeout must be greater than zero"));
        }
        if self.operation_timeout.is_zero() {
            return Err(Error::config("operation_timeout must be greater than zero"));
        }
        if matches!(self.probe_interval, Some(interval) if interval.is_zero()) {
            return Err(Error::config("probe_interval must be greater than zero"));
        }
        Ok(())
    }
}

/// Named backend configurations loaded from one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Options shared by every cache built from these settings
    #[serde(default)]
    pub cache: CacheOptions,

    /// Relational databases by name
    #[serde(default)]
    pub relational: BTreeMap<String, RelationalConfig>,

    /// Key-value stores by name
    #[serde(default)]
    pub key_value: BTreeMap<String, KeyValueConfig>,

    /// Document stores by name
    #[serde(default)]
    pub document: BTreeMap<String, DocumentConfig>,

    /// Coordination services by name
    #[serde(default)]
    pub coordination: BTreeMap<String, CoordinationConfig>,

    /// Wide-column stores by name
    #[serde(default)]
    pub wide_column: BTreeMap<String, WideColumnConfig>,
}

impl StoreSettings {
    /// Load settings from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse settings from YAML, expanding environment references first
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);

        let settings: Self = serde_yaml::from_str(&expanded)
            .map_err(|e| Error::config(format!("failed to parse settings: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate every named configuration
    pub fn validate(&self) -> Result<()> {
        self.cache.check()?;
        check_all("relational", &self.relational)?;
        check_all("key_value", &self.key_value)?;
        check_all("document", &self.document)?;
        check_all("coordination", &self.coordination)?;
        check_all("wide_column", &self.wide_column)?;
        Ok(())
    }
}

fn check_all<C: BackendConfig>(section: &str, configs: &BTreeMap<String, C>) -> Result<()> {
    for (name, config) in configs {
        config
            .check()
            .map_err(|e| Error::config(format!("{}.{}: {}", section, name, e)))?;
    }
    Ok(())
}

/// Expand environment variables in the format ${VAR} or ${VAR:-default}
fn expand_env_vars(content: &str) -> String {
    ENV_VAR_REGEX
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map(|m| m.as_str());

            std::env::var(var_name).unwrap_or_else(|_| default.unwrap_or("").to_string())
        })
        .to_string()
}

/// Run `validator` derive checks and map failures to configuration errors
pub(crate) fn validate_fields<T: Validate>(config: &T) -> Result<()> {
    config.validate().map_err(Error::from)
}
