//! MySQL dialer backed by `mysql_async`
//!
//! One [`mysql_async::Pool`] per fingerprint; the pool itself multiplexes
//! concurrent callers, so the cached handle is shared as is.

use async_trait::async_trait;
use mysql_async::consts::{ColumnFlags, ColumnType as MySqlColumnType};
use mysql_async::prelude::*;
use mysql_async::{OptsBuilder, Pool, PoolConstraints, PoolOpts, TxOpts};
use tracing::debug;

use super::relational::{ExecResult, RelationalConfig, SqlHandle};
use crate::cache::Dialer;
use crate::config::{BackendKind, PoolSettings};
use crate::error::{Error, Result};
use crate::types::{Column, Row, TabularResult, Value};

fn value_to_sql(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Int(n) => mysql_async::Value::from(*n),
        Value::Float(n) => mysql_async::Value::from(*n),
        Value::Text(s) => mysql_async::Value::from(s.clone()),
    }
}

fn sql_to_raw(value: mysql_async::Value) -> Option<String> {
    match value {
        mysql_async::Value::NULL => None,
        mysql_async::Value::Bytes(b) => Some(String::from_utf8_lossy(&b).into_owned()),
        mysql_async::Value::Int(n) => Some(n.to_string()),
        mysql_async::Value::UInt(n) => Some(n.to_string()),
        mysql_async::Value::Float(n) => Some(n.to_string()),
        mysql_async::Value::Double(n) => Some(n.to_string()),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let mut s = format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, min, sec
            );
            if micro > 0 {
                s.push_str(&format!(".{:06}", micro));
            }
            Some(s)
        }
        mysql_async::Value::Time(negative, days, hour, min, sec, micro) => {
            let hours = u32::from(hour) + days * 24;
            let mut s = format!(
                "{}{:02}:{:02}:{:02}",
                if negative { "-" } else { "" },
                hours,
                min,
                sec
            );
            if micro > 0 {
                s.push_str(&format!(".{:06}", micro));
            }
            Some(s)
        }
    }
}

fn type_name(column: &mysql_async::Column) -> String {
    let base = match column.column_type() {
        MySqlColumnType::MYSQL_TYPE_TINY => "TINYINT",
        MySqlColumnType::MYSQL_TYPE_SHORT => "SMALLINT",
        MySqlColumnType::MYSQL_TYPE_INT24 => "MEDIUMINT",
        MySqlColumnType::MYSQL_TYPE_LONG => "INT",
        MySqlColumnType::MYSQL_TYPE_LONGLONG => "BIGINT",
        MySqlColumnType::MYSQL_TYPE_FLOAT => "FLOAT",
        MySqlColumnType::MYSQL_TYPE_DOUBLE => "DOUBLE",
        MySqlColumnType::MYSQL_TYPE_DECIMAL | MySqlColumnType::MYSQL_TYPE_NEWDECIMAL => "DECIMAL",
        MySqlColumnType::MYSQL_TYPE_DATETIME | MySqlColumnType::MYSQL_TYPE_DATETIME2 => "DATETIME",
        MySqlColumnType::MYSQL_TYPE_TIMESTAMP | MySqlColumnType::MYSQL_TYPE_TIMESTAMP2 => {
            "TIMESTAMP"
        }
        MySqlColumnType::MYSQL_TYPE_DATE => "DATE",
        MySqlColumnType::MYSQL_TYPE_TIME => "TIME",
        MySqlColumnType::MYSQL_TYPE_JSON => "JSON",
        MySqlColumnType::MYSQL_TYPE_BLOB => "BLOB",
        _ => "VARCHAR",
    };
    if column.flags().contains(ColumnFlags::UNSIGNED_FLAG) {
        format!("{} UNSIGNED", base)
    } else {
        base.to_string()
    }
}

fn to_tabular(columns: &[mysql_async::Column], rows: Vec<mysql_async::Row>) -> TabularResult {
    let mut result = TabularResult::new(
        columns
            .iter()
            .map(|c| Column::new(c.name_str().to_string(), type_name(c))),
    );

    for mut row in rows {
        let mut out = Row::new();
        for (i, column) in result.columns.iter().enumerate() {
            let raw = row.take::<mysql_async::Value, _>(i).and_then(sql_to_raw);
            out.set(column.name.clone(), raw);
        }
        result.push(out);
    }
    result
}

fn operation_error(context: &str, err: mysql_async::Error) -> Error {
    Error::operation_with_source(format!("{}: {}", context, err), err)
}

/// Dials a `mysql_async` pool per relational configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialer;

/// Cached MySQL handle
#[derive(Debug, Clone)]
pub struct MySqlHandle {
    pool: Pool,
}

impl MySqlHandle {
    /// Underlying pool
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl Dialer for MySqlDialer {
    type Config = RelationalConfig;
    type Handle = MySqlHandle;

    fn backend(&self) -> BackendKind {
        BackendKind::Relational
    }

    async fn dial(&self, config: &RelationalConfig, pool: &PoolSettings) -> Result<MySqlHandle> {
        let constraints = PoolConstraints::new(0, pool.max_open as usize).ok_or_else(|| {
            Error::config(format!("invalid pool size: max_open={}", pool.max_open))
        })?;

        let pool_opts = PoolOpts::default()
            .with_constraints(constraints)
            .with_inactive_connection_ttl(pool.max_lifetime)
            .with_abs_conn_ttl(Some(pool.max_lifetime));

        let init: Vec<String> = config
            .params
            .iter()
            .map(|(name, value)| format!("SET SESSION {} = '{}'", name, value.replace('\'', "''")))
            .collect();

        let opts = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.expose().to_string()))
            .db_name((!config.database.is_empty()).then(|| config.database.clone()))
            .init(init)
            .pool_opts(pool_opts);

        let handle = MySqlHandle {
            pool: Pool::new(opts),
        };

        // Pool::new is lazy; surface unreachable servers at dial time.
        self.ping(&handle).await.map_err(|e| {
            Error::dial_with_source(
                BackendKind::Relational,
                format!("failed to connect to {}", config.display_url()),
                e,
            )
        })?;

        debug!(target_db = %config.display_url(), "mysql pool ready");
        Ok(handle)
    }

    async fn close(&self, handle: &MySqlHandle) -> Result<()> {
        handle
            .pool
            .clone()
            .disconnect()
            .await
            .map_err(|e| operation_error("failed to close pool", e))
    }

    async fn ping(&self, handle: &MySqlHandle) -> Result<()> {
        let mut conn = handle
            .pool
            .get_conn()
            .await
            .map_err(|e| operation_error("failed to get connection", e))?;
        conn.ping()
            .await
            .map_err(|e| operation_error("ping failed", e))
    }
}

#[async_trait]
impl SqlHandle for MySqlHandle {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<TabularResult> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| operation_error("failed to get connection", e))?;

        let mysql_params: Vec<mysql_async::Value> = params.iter().map(value_to_sql).collect();

        let mut result = conn
            .exec_iter(sql, mysql_params)
            .await
            .map_err(|e| operation_error("failed to execute query", e))?;
        let columns: Vec<mysql_async::Column> = result
            .columns()
            .map(|columns| columns.to_vec())
            .unwrap_or_default();
        let rows: Vec<mysql_async::Row> = result
            .collect()
            .await
            .map_err(|e| operation_error("failed to read rows", e))?;

        Ok(to_tabular(&columns, rows))
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| operation_error("failed to get connection", e))?;

        let mysql_params: Vec<mysql_async::Value> = params.iter().map(value_to_sql).collect();

        conn.exec_drop(sql, mysql_params)
            .await
            .map_err(|e| operation_error("failed to execute statement", e))?;

        Ok(ExecResult {
            rows_affected: conn.affected_rows(),
            last_insert_id: conn.last_insert_id(),
        })
    }

    async fn execute_batch(&self, sql: &str, batches: &[Vec<Value>]) -> Result<Vec<ExecResult>> {
        let mut tx = self
            .pool
            .start_transaction(TxOpts::default())
            .await
            .map_err(|e| operation_error("failed to begin transaction", e))?;

        let mut results = Vec::with_capacity(batches.len());
        for params in batches {
            let mysql_params: Vec<mysql_async::Value> = params.iter().map(value_to_sql).collect();
            if let Err(e) = tx.exec_drop(sql, mysql_params).await {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                return Err(operation_error("failed to execute in transaction", e));
            }
            results.push(ExecResult {
                rows_affected: tx.affected_rows(),
                last_insert_id: tx.last_insert_id(),
            });
        }

        tx.commit()
            .await
            .map_err(|e| operation_error("failed to commit transaction", e))?;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_to_raw() {
        assert_eq!(sql_to_raw(mysql_async::Value::NULL), None);
        assert_eq!(sql_to_raw(mysql_async::Value::Int(-3)), Some("-3".to_string()));
        assert_eq!(
            sql_to_raw(mysql_async::Value::Date(2024, 3, 1, 10, 20, 30, 0)),
            Some("2024-03-01 10:20:30".to_string())
        );
        assert_eq!(
            sql_to_raw(mysql_async::Value::Bytes(b"alice".to_vec())),
            Some("alice".to_string())
        );
    }

    #[test]
    fn test_value_to_sql() {
        assert_eq!(value_to_sql(&Value::Null), mysql_async::Value::NULL);
        assert_eq!(value_to_sql(&Value::Int(7)), mysql_async::Value::Int(7));
    }
}
