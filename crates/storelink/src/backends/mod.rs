//! Backend configurations and adapters
//!
//! Each backend kind gets a configuration type implementing
//! [`BackendConfig`](crate::config::BackendConfig) and a cache alias; the
//! relational backend also carries query helpers and, behind the `mysql`
//! feature, a concrete dialer.

pub mod coordination;
pub mod document;
pub mod keyvalue;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod relational;
pub mod widecolumn;
