//! Generic result binder
//!
//! Decodes a [`TabularResult`] into one of three target shapes:
//! - a string-keyed map of [`Value`]s (`HashMap` or `BTreeMap`)
//! - a [`Record`] structure described by its [`RecordSchema`]
//! - a `Vec` of either, grown geometrically by [`next_capacity`]
//!
//! Binding is fail-fast per row: the first failing field aborts with a
//! [`BindError`](crate::error::BindError) and fields already written for that
//! row keep their values.

mod schema;
mod value;

pub use schema::{FieldKind, FieldSpec, Record, RecordSchema, RecordSchemaBuilder};
pub use value::{FieldValue, FromFieldValue};

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::error::{BindError, Error, Result};
use crate::types::{Column, Row, TabularResult, Value};

/// Default timestamp layout for datetime normalization and parsing
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Binder options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinderOptions {
    /// `chrono` format used to normalize datetime columns and parse timestamps
    pub datetime_format: String,
}

impl Default for BinderOptions {
    fn default() -> Self {
        Self {
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
        }
    }
}

impl BinderOptions {
    /// Set the datetime format
    pub fn with_datetime_format(mut self, format: impl Into<String>) -> Self {
        self.datetime_format = format.into();
        self
    }
}

/// Anything a single row can be bound into
pub trait RowTarget: Default {
    /// Bind one row into `self`
    fn bind_row(
        &mut self,
        columns: &[Column],
        row: &Row,
        options: &BinderOptions,
    ) -> std::result::Result<(), BindError>;
}

impl<T: Record> RowTarget for T {
    fn bind_row(
        &mut self,
        _columns: &[Column],
        row: &Row,
        options: &BinderOptions,
    ) -> std::result::Result<(), BindError> {
        bind_record(self, row, options)
    }
}

impl RowTarget for HashMap<String, Value> {
    fn bind_row(
        &mut self,
        columns: &[Column],
        row: &Row,
        options: &BinderOptions,
    ) -> std::result::Result<(), BindError> {
        for column in columns {
            let value = value::decode_column(column, row.get(&column.name), &options.datetime_format)?;
            self.insert(column.name.clone(), value);
        }
        Ok(())
    }
}

impl RowTarget for BTreeMap<String, Value> {
    fn bind_row(
        &mut self,
        columns: &[Column],
        row: &Row,
        options: &BinderOptions,
    ) -> std::result::Result<(), BindError> {
        for column in columns {
            let value = value::decode_column(column, row.get(&column.name), &options.datetime_format)?;
            self.insert(column.name.clone(), value);
        }
        Ok(())
    }
}

fn bind_record<T: Record>(
    target: &mut T,
    row: &Row,
    options: &BinderOptions,
) -> std::result::Result<(), BindError> {
    for (index, field) in T::schema().fields().iter().enumerate() {
        if field.skip {
            continue;
        }

        let raw = row.get(&field.column);
        let absent = raw.is_none();
        let resolved = raw
            .filter(|v| !v.is_empty())
            .or(field.default.as_deref())
            .filter(|v| !v.is_empty());

        match resolved {
            Some(raw) => {
                let value = value::coerce(field, raw, &options.datetime_format)?;
                target.set_field(index, value)?;
            }
            None if field.not_empty => {
                return Err(BindError::Required {
                    field: field.name.clone(),
                    absent,
                });
            }
            // Unsupported kinds are only an error once there is a value to bind.
            None if matches!(field.kind, FieldKind::Unsupported(_)) => {}
            None if field.optional => target.set_field(index, FieldValue::Null)?,
            None if field.kind == FieldKind::Str => {
                target.set_field(index, FieldValue::Str(String::new()))?
            }
            // Other kinds keep their current value.
            None => {}
        }
    }
    Ok(())
}

/// Growth policy for sequence targets: `max(4, cap + cap / 2)`
pub const fn next_capacity(capacity: usize) -> usize {
    let grown = capacity + capacity / 2;
    if grown < 4 {
        4
    } else {
        grown
    }
}

/// Binds tabular results into targets
#[derive(Debug, Clone, Default)]
pub struct ResultBinder {
    options: BinderOptions,
}

impl ResultBinder {
    /// Create a binder
    pub fn new(options: BinderOptions) -> Self {
        Self { options }
    }

    /// Binder options
    pub fn options(&self) -> &BinderOptions {
        &self.options
    }

    /// Bind the first row into a fresh target; empty results are `NotFound`
    pub fn bind_one<T: RowTarget>(&self, result: &TabularResult) -> Result<T> {
        let mut target = T::default();
        self.bind_into(result, &mut target)?;
        Ok(target)
    }

    /// Bind the first row into an existing target; empty results are `NotFound`
    pub fn bind_into<T: RowTarget>(&self, result: &TabularResult, target: &mut T) -> Result<()> {
        let row = result.rows.first().ok_or(Error::NotFound)?;
        target.bind_row(&result.columns, row, &self.options)?;
        debug!(columns = result.columns.len(), "bound row");
        Ok(())
    }

    /// Append one element per row to `out`
    ///
    /// An empty result leaves `out` unchanged. On failure, elements for
    /// earlier rows stay in `out`, as does the partially bound failing one.
    pub fn bind_all<T: RowTarget>(&self, result: &TabularResult, out: &mut Vec<T>) -> Result<()> {
        for row in &result.rows {
            if out.len() == out.capacity() {
                let capacity = next_capacity(out.capacity());
                out.reserve_exact(capacity - out.len());
            }
            let mut element = T::default();
            let bound = element.bind_row(&result.columns, row, &self.options);
            out.push(element);
            bound?;
        }
        debug!(rows = result.rows.len(), "bound rows");
        Ok(())
    }

    /// Collect every row into a new `Vec`
    pub fn collect<T: RowTarget>(&self, result: &TabularResult) -> Result<Vec<T>> {
        let mut out = Vec::new();
        self.bind_all(result, &mut out)?;
        Ok(out)
    }
}

/// [`ResultBinder::bind_one`] with default options
pub fn bind_one<T: RowTarget>(result: &TabularResult) -> Result<T> {
    ResultBinder::default().bind_one(result)
}

/// [`ResultBinder::bind_into`] with default options
pub fn bind_into<T: RowTarget>(result: &TabularResult, target: &mut T) -> Result<()> {
    ResultBinder::default().bind_into(result, target)
}

/// [`ResultBinder::bind_all`] with default options
pub fn bind_all<T: RowTarget>(result: &TabularResult, out: &mut Vec<T>) -> Result<()> {
    ResultBinder::default().bind_all(result, out)
}
