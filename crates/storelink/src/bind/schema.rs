//! Per-type schema descriptors for structure targets

use crate::error::BindError;

use super::value::FieldValue;

/// A structure the binder can populate field by field
///
/// Usually derived with `#[derive(Record)]`; hand-written impls build their
/// schema with [`RecordSchema::builder`].
pub trait Record: Default {
    /// Schema describing every field, built once per type
    fn schema() -> &'static RecordSchema;

    /// Store a coerced value into the field at `index` of [`Record::schema`]
    fn set_field(&mut self, index: usize, value: FieldValue) -> Result<(), BindError>;
}

/// Destination kind of a field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum FieldKind {
    Str,
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    /// `chrono::NaiveDateTime`
    NaiveDateTime,
    /// `chrono::DateTime<Utc>`
    DateTimeUtc,
    /// A type the binder cannot populate, named for the error
    Unsupported(String),
}

impl FieldKind {
    /// Map a Rust type name (last path segment) to a field kind
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "String" | "str" => Self::Str,
            "bool" => Self::Bool,
            "i8" => Self::I8,
            "i16" => Self::I16,
            "i32" => Self::I32,
            "i64" => Self::I64,
            "isize" => Self::Isize,
            "u8" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "u64" => Self::U64,
            "usize" => Self::Usize,
            "f32" => Self::F32,
            "f64" => Self::F64,
            "NaiveDateTime" => Self::NaiveDateTime,
            "DateTime" => Self::DateTimeUtc,
            other => Self::Unsupported(other.to_string()),
        }
    }

    /// Short name used in error messages
    pub fn name(&self) -> &str {
        match self {
            Self::Str => "string",
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::Isize => "isize",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::Usize => "usize",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::NaiveDateTime => "NaiveDateTime",
            Self::DateTimeUtc => "DateTime<Utc>",
            Self::Unsupported(name) => name,
        }
    }
}

/// How one structure field is bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Rust field name
    pub name: String,
    /// Source column
    pub column: String,
    /// Substituted when the column is absent or empty
    pub default: Option<String>,
    /// Fail the row when the resolved value is empty
    pub not_empty: bool,
    /// Never bound
    pub skip: bool,
    /// Field is an `Option<_>`; empty binds `None`
    pub optional: bool,
    /// Destination kind
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Describe a field; the column defaults to the lower-cased field name
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            column: name.to_lowercase(),
            name,
            default: None,
            not_empty: false,
            skip: false,
            optional: false,
            kind,
        }
    }

    /// Bind from an explicit column (used verbatim)
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Default for absent or empty values
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Require a non-empty resolved value
    pub fn not_empty(mut self) -> Self {
        self.not_empty = true;
        self
    }

    /// Never bind this field
    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Mark the field as `Option<_>`
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Ordered field descriptors of one record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    type_name: String,
    fields: Vec<FieldSpec>,
}

impl RecordSchema {
    /// Start building a schema
    pub fn builder(type_name: impl Into<String>) -> RecordSchemaBuilder {
        RecordSchemaBuilder {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Name of the described type
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Fields in declaration order; indexes match [`Record::set_field`]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Field by Rust name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Columns read by non-skipped fields
    pub fn columns(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| !f.skip)
            .map(|f| f.column.as_str())
            .collect()
    }
}

/// Builder for [`RecordSchema`]
#[derive(Debug)]
pub struct RecordSchemaBuilder {
    type_name: String,
    fields: Vec<FieldSpec>,
}

impl RecordSchemaBuilder {
    /// Append a field
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Finish the schema
    pub fn build(self) -> RecordSchema {
        RecordSchema {
            type_name: self.type_name,
            fields: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_defaults_to_lowercase_name() {
        let spec = FieldSpec::new("UserName", FieldKind::Str);
        assert_eq!(spec.column, "username");

        let spec = FieldSpec::new("UserName", FieldKind::Str).with_column("User_Name");
        assert_eq!(spec.column, "User_Name");
    }

    #[test]
    fn test_kind_from_type_name() {
        assert_eq!(FieldKind::from_type_name("u16"), FieldKind::U16);
        assert_eq!(FieldKind::from_type_name("DateTime"), FieldKind::DateTimeUtc);
        assert_eq!(
            FieldKind::from_type_name("Vec"),
            FieldKind::Unsupported("Vec".into())
        );
    }

    #[test]
    fn test_schema_columns_skip_ignored() {
        let schema = RecordSchema::builder("User")
            .field(FieldSpec::new("id", FieldKind::I64))
            .field(FieldSpec::new("cache", FieldKind::Str).skip())
            .build();
        assert_eq!(schema.columns(), vec!["id"]);
        assert_eq!(schema.type_name(), "User");
        assert!(schema.field("cache").is_some_and(|f| f.skip));
    }
}
