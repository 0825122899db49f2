//! Wide-column backend (HBase-style)

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::cache::ConnectionCache;
use crate::config::{validate_fields, BackendConfig, BackendKind};
use crate::error::Result;
use crate::fingerprint::{Fingerprint, FingerprintBuilder};

/// Connection target of a wide-column store
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WideColumnConfig {
    /// Quorum address
    #[validate(length(min = 1))]
    pub url: String,

    /// Table used by operations
    #[serde(default)]
    pub table: String,

    /// Column family used by operations
    #[serde(default)]
    pub column_family: String,
}

impl WideColumnConfig {
    /// Create a configuration
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            table: String::new(),
            column_family: String::new(),
        }
    }

    /// Set the table and column family
    pub fn with_table(mut self, table: impl Into<String>, column_family: impl Into<String>) -> Self {
        self.table = table.into();
        self.column_family = column_family.into();
        self
    }
}

impl BackendConfig for WideColumnConfig {
    fn kind(&self) -> BackendKind {
        BackendKind::WideColumn
    }

    fn fingerprint(&self) -> Fingerprint {
        FingerprintBuilder::new(BackendKind::WideColumn)
            .field("url", &self.url)
            .finish()
    }

    fn check(&self) -> Result<()> {
        validate_fields(self)
    }
}

/// Connection cache for a wide-column dialer (`D::Config = WideColumnConfig`)
pub type WideColumnCache<D> = ConnectionCache<D>;
