//! Relational backend
//!
//! [`RelationalConfig`] identifies a MySQL-style database, [`SqlHandle`] is
//! what a relational dialer hands out, and [`RelationalStore`] composes the
//! connection cache with the result binder into query/execute helpers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::debug;
use validator::Validate;

use crate::bind::{ResultBinder, RowTarget};
use crate::cache::{ConnectionCache, Dialer};
use crate::config::{
    validate_fields, BackendConfig, BackendKind, CacheOptions, PoolSettings, SensitiveString,
};
use crate::error::{Error, Result};
use crate::fingerprint::{Fingerprint, FingerprintBuilder};
use crate::types::{TabularResult, Value};

fn default_port() -> u16 {
    3306
}

/// Connection target of a relational database
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RelationalConfig {
    /// User name
    #[validate(length(min = 1))]
    pub user: String,

    /// Password
    #[serde(default)]
    pub password: SensitiveString,

    /// Host name or IP address
    #[validate(length(min = 1))]
    pub host: String,

    /// Port (default: 3306)
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Database name
    #[serde(default)]
    pub database: String,

    /// Maximum open connections (0 = default)
    #[serde(default)]
    pub max_open_connections: u32,

    /// Maximum idle connections (0 = default)
    #[serde(default)]
    pub max_idle_connections: u32,

    /// Maximum connection lifetime (0 = default)
    #[serde(default, with = "humantime_serde")]
    pub conn_max_lifetime: Duration,

    /// Session variables applied to every new connection
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl RelationalConfig {
    /// Create a configuration with default pool settings
    pub fn new(
        user: impl Into<String>,
        password: impl Into<SensitiveString>,
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            host: host.into(),
            port,
            database: database.into(),
            max_open_connections: 0,
            max_idle_connections: 0,
            conn_max_lifetime: Duration::ZERO,
            params: BTreeMap::new(),
        }
    }

    /// Set pool sizing
    pub fn with_pool(mut self, max_open: u32, max_idle: u32, max_lifetime: Duration) -> Self {
        self.max_open_connections = max_open;
        self.max_idle_connections = max_idle;
        self.conn_max_lifetime = max_lifetime;
        self
    }

    /// Add a session variable
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Connection URL with the password redacted
    pub fn display_url(&self) -> String {
        format!(
            "mysql://{}:***@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

impl BackendConfig for RelationalConfig {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn fingerprint(&self) -> Fingerprint {
        FingerprintBuilder::new(BackendKind::Relational)
            .field("user", &self.user)
            .secret("password", &self.password)
            .field("host", &self.host)
            .field("port", self.port)
            .field("database", &self.database)
            .entries("params", &self.params)
            .finish()
    }

    fn pool_settings(&self) -> PoolSettings {
        PoolSettings::new(
            self.max_open_connections,
            self.max_idle_connections,
            self.conn_max_lifetime,
        )
    }

    fn check(&self) -> Result<()> {
        validate_fields(self)?;
        self.pool_settings().check()?;
        for name in self.params.keys() {
            let valid = !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(Error::config(format!(
                    "invalid session variable name: {:?}",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of a data-modifying statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows affected
    pub rows_affected: u64,
    /// Last auto-increment id, if the backend reports one
    pub last_insert_id: Option<u64>,
}

/// Handle to a relational database, shared by concurrent callers
#[async_trait]
pub trait SqlHandle: Send + Sync + 'static {
    /// Run a statement returning rows
    async fn query(&self, sql: &str, params: &[Value]) -> Result<TabularResult>;

    /// Run a data-modifying statement
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult>;

    /// Run `sql` once per parameter set inside one begin/commit; any failure
    /// rolls the whole batch back
    async fn execute_batch(&self, sql: &str, batches: &[Vec<Value>]) -> Result<Vec<ExecResult>>;
}

/// Query/execute helpers over a cached relational handle
pub struct RelationalStore<D>
where
    D: Dialer<Config = RelationalConfig>,
    D::Handle: SqlHandle,
{
    cache: ConnectionCache<D>,
    binder: ResultBinder,
}

impl<D> RelationalStore<D>
where
    D: Dialer<Config = RelationalConfig>,
    D::Handle: SqlHandle,
{
    /// Create a store with default binder options
    pub fn new(dialer: D, options: CacheOptions) -> Result<Self> {
        Ok(Self {
            cache: ConnectionCache::new(dialer, options)?,
            binder: ResultBinder::default(),
        })
    }

    /// Replace the binder
    pub fn with_binder(mut self, binder: ResultBinder) -> Self {
        self.binder = binder;
        self
    }

    /// Underlying connection cache
    pub fn cache(&self) -> &ConnectionCache<D> {
        &self.cache
    }

    /// Run a query and return the raw tabular result
    pub async fn query(
        &self,
        config: &RelationalConfig,
        sql: &str,
        params: &[Value],
    ) -> Result<TabularResult> {
        debug!(target_db = %config.display_url(), sql, params = params.len(), "query");
        self.cache
            .with_connection(config, |conn| async move { conn.query(sql, params).await })
            .await
    }

    /// Bind the first row; no rows is `NotFound`
    pub async fn query_one<T: RowTarget>(
        &self,
        config: &RelationalConfig,
        sql: &str,
        params: &[Value],
    ) -> Result<T> {
        let result = self.query(config, sql, params).await?;
        self.binder.bind_one(&result)
    }

    /// Bind every row; no rows is an empty `Vec`
    pub async fn query_all<T: RowTarget>(
        &self,
        config: &RelationalConfig,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<T>> {
        let result = self.query(config, sql, params).await?;
        self.binder.collect(&result)
    }

    /// Bind every row into a column-name map
    pub async fn query_map(
        &self,
        config: &RelationalConfig,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<HashMap<String, Value>>> {
        self.query_all(config, sql, params).await
    }

    /// Run an insert, update or delete
    pub async fn execute(
        &self,
        config: &RelationalConfig,
        sql: &str,
        params: &[Value],
    ) -> Result<ExecResult> {
        debug!(target_db = %config.display_url(), sql, params = params.len(), "execute");
        self.cache
            .with_connection(config, |conn| async move { conn.execute(sql, params).await })
            .await
    }

    /// Run a parameterless statement (DDL and the like)
    pub async fn execute_sql(&self, config: &RelationalConfig, sql: &str) -> Result<()> {
        self.execute(config, sql, &[]).await.map(|_| ())
    }

    /// Run `sql` once per parameter set in a single transaction
    pub async fn execute_in_transaction(
        &self,
        config: &RelationalConfig,
        sql: &str,
        batches: &[Vec<Value>],
    ) -> Result<Vec<ExecResult>> {
        if batches.is_empty() {
            return Ok(Vec::new());
        }
        debug!(target_db = %config.display_url(), sql, batches = batches.len(), "transaction");
        self.cache
            .with_connection(config, |conn| async move {
                conn.execute_batch(sql, batches).await
            })
            .await
    }
}
