//! Coordination backend (etcd/ZooKeeper-style)

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::cache::ConnectionCache;
use crate::config::{validate_fields, BackendConfig, BackendKind, SensitiveString};
use crate::error::{Error, Result};
use crate::fingerprint::{Fingerprint, FingerprintBuilder};

/// Connection target of a coordination service cluster
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CoordinationConfig {
    /// Cluster endpoints; order is irrelevant
    #[validate(length(min = 1))]
    pub endpoints: Vec<String>,

    /// User name (empty = anonymous)
    #[serde(default)]
    pub username: String,

    /// Password
    #[serde(default)]
    pub password: SensitiveString,
}

impl CoordinationConfig {
    /// Anonymous access to the given endpoints
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            username: String::new(),
            password: SensitiveString::default(),
        }
    }

    /// Authenticate with user name and password
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<SensitiveString>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }
}

impl BackendConfig for CoordinationConfig {
    fn kind(&self) -> BackendKind {
        BackendKind::Coordination
    }

    fn fingerprint(&self) -> Fingerprint {
        FingerprintBuilder::new(BackendKind::Coordination)
            .list("endpoints", &self.endpoints)
            .field("username", &self.username)
            .secret("password", &self.password)
            .finish()
    }

    fn check(&self) -> Result<()> {
        validate_fields(self)?;
        if self.endpoints.iter().any(|e| e.trim().is_empty()) {
            return Err(Error::config("endpoints must not contain empty entries"));
        }
        if self.username.is_empty() && !self.password.is_empty() {
            return Err(Error::config("password given without username"));
        }
        Ok(())
    }
}

/// Connection cache for a coordination dialer (`D::Config = CoordinationConfig`)
pub type CoordinationCache<D> = ConnectionCache<D>;
