//! # storelink
//!
//! Uniform, resilient access to external stores.
//!
//! ## Features
//!
//! - **Connection Cache**: one long-lived handle per configuration fingerprint,
//!   shared across concurrent callers, replaced on first failure with a
//!   retry-exactly-once policy and an optional liveness probe
//! - **Result Binder**: decodes tabular results into maps, derived records or
//!   growable sequences of either, with checked numeric narrowing
//! - **Backend Configs**: relational, key-value, document, coordination and
//!   wide-column targets with order-independent fingerprints and redacted secrets
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use storelink::prelude::*;
//!
//! #[derive(Debug, Default, Record)]
//! struct User {
//!     id: u64,
//!     #[record(not_empty)]
//!     name: String,
//! }
//!
//! let store = RelationalStore::new(MySqlDialer, CacheOptions::default())?;
//! let config = RelationalConfig::new("app", "secret", "localhost", 3306, "shop");
//! let users: Vec<User> = store.query_all(&config, "SELECT id, name FROM users", &[]).await?;
//! ```
//!
//! ## Feature Flags
//!
//! - `derive` (default) - `#[derive(Record)]`
//! - `mysql` - MySQL dialer via mysql_async
//! - `full` - All features enabled

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

// Lets `#[derive(Record)]` expand to `::storelink::...` inside this crate too.
extern crate self as storelink;

pub mod backends;
pub mod bind;
pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod telemetry;
pub mod types;

/// Prelude module for convenient imports
pub mod prelude {
    // Error types
    pub use crate::error::{BindError, Error, ErrorCategory, Result};

    // Tabular results
    pub use crate::types::{Column, ColumnType, Row, TabularResult, Value};

    // Cache
    pub use crate::cache::{CacheStats, ConnectionCache, Dialer, Lease, ProbeHandle};

    // Configuration
    pub use crate::config::{
        BackendConfig, BackendKind, CacheOptions, PoolSettings, SensitiveString, StoreSettings,
    };
    pub use crate::fingerprint::{Fingerprint, FingerprintBuilder};

    // Binder
    pub use crate::bind::{
        bind_all, bind_into, bind_one, BinderOptions, FieldKind, FieldSpec, FieldValue,
        FromFieldValue, Record, RecordSchema, ResultBinder, RowTarget,
    };
    #[cfg(feature = "derive")]
    pub use storelink_derive::Record;

    // Backends
    pub use crate::backends::coordination::CoordinationConfig;
    pub use crate::backends::document::DocumentConfig;
    pub use crate::backends::keyvalue::KeyValueConfig;
    #[cfg(feature = "mysql")]
    pub use crate::backends::mysql::{MySqlDialer, MySqlHandle};
    pub use crate::backends::relational::{
        ExecResult, RelationalConfig, RelationalStore, SqlHandle,
    };
    pub use crate::backends::widecolumn::WideColumnConfig;
}

// Re-export commonly used items at crate root
pub use bind::{Record, ResultBinder};
pub use cache::{ConnectionCache, Dialer};
pub use error::{BindError, Error, Result};
pub use types::{TabularResult, Value};

#[cfg(feature = "derive")]
pub use storelink_derive::Record;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_prelude_imports() {
        let _options = CacheOptions::default().with_dial_timeout(Duration::from_secs(1));
        let _binder = ResultBinder::new(BinderOptions::default());
        let _value = Value::Int(42);
        let _config = KeyValueConfig::new("localhost:6379", "", 0);
    }

    #[test]
    fn test_error_types() {
        let err = Error::operation("broken pipe");
        assert!(err.is_connection_error());
        assert_eq!(err.category(), ErrorCategory::Operation);
    }

    #[cfg(feature = "derive")]
    #[test]
    fn test_derive_inside_crate() {
        #[derive(Debug, Default, Record)]
        struct Probe {
            id: i64,
            #[record(column = "Label")]
            label: String,
        }

        let schema = Probe::schema();
        assert_eq!(schema.type_name(), "Probe");
        assert_eq!(schema.columns(), vec!["id", "Label"]);
    }
}
