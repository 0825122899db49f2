//! Key-value backend (Redis-style)

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::cache::ConnectionCache;
use crate::config::{validate_fields, BackendConfig, BackendKind, SensitiveString};
use crate::error::Result;
use crate::fingerprint::{Fingerprint, FingerprintBuilder};

/// Connection target of a key-value store
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct KeyValueConfig {
    /// Server address (`host:port`)
    #[validate(length(min = 1))]
    pub url: String,

    /// Password
    #[serde(default)]
    pub password: SensitiveString,

    /// Logical database index
    #[serde(default)]
    pub db: u32,
}

impl KeyValueConfig {
    /// Create a configuration
    pub fn new(url: impl Into<String>, password: impl Into<SensitiveString>, db: u32) -> Self {
        Self {
            url: url.into(),
            password: password.into(),
            db,
        }
    }
}

impl BackendConfig for KeyValueConfig {
    fn kind(&self) -> BackendKind {
        BackendKind::KeyValue
    }

    fn fingerprint(&self) -> Fingerprint {
        FingerprintBuilder::new(BackendKind::KeyValue)
            .field("url", &self.url)
            .secret("password", &self.password)
            .field("db", self.db)
            .finish()
    }

    fn check(&self) -> Result<()> {
        validate_fields(self)
    }
}

/// Connection cache for a key-value dialer (`D::Config = KeyValueConfig`)
pub type KeyValueCache<D> = ConnectionCache<D>;
