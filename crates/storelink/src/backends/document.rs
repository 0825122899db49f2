//! Document backend (Mongo-style)
//!
//! One session is shared per server address; database and collection are
//! chosen per operation and do not take part in the fingerprint.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::cache::ConnectionCache;
use crate::config::{validate_fields, BackendConfig, BackendKind};
use crate::error::Result;
use crate::fingerprint::{Fingerprint, FingerprintBuilder};

/// Connection target of a document store
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DocumentConfig {
    /// Server address
    #[validate(length(min = 1))]
    pub address: String,

    /// Database used by operations
    #[serde(default)]
    pub database: String,

    /// Collection used by operations
    #[serde(default)]
    pub collection: String,
}

impl DocumentConfig {
    /// Create a configuration
    pub fn new(
        address: impl Into<String>,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl BackendConfig for DocumentConfig {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    fn fingerprint(&self) -> Fingerprint {
        FingerprintBuilder::new(BackendKind::Document)
            .field("address", &self.address)
            .finish()
    }

    fn check(&self) -> Result<()> {
        validate_fields(self)
    }
}

/// Connection cache for a document dialer (`D::Config = DocumentConfig`)
pub type DocumentCache<D> = ConnectionCache<D>;
