//! Table schema model and schema file loading.
//!
//! A [`Schema`] is the ordered list of [`FieldDescriptor`]s that a row is
//! checked against, in the same `{name, type, mode}` shape a warehouse table
//! declaration uses. Field types form the closed [`LogicalType`] enumeration;
//! every known type maps onto one [`CoercionClass`], which selects the
//! predicate [`crate::coerce`] applies. Tags outside the enumeration (`ARRAY`,
//! `STRUCT`, `RANGE`, ...) still load, as [`LogicalType::Unrecognized`], and
//! never accept a non-null value.
//!
//! Schema files are YAML or JSON. Both a bare list of fields and a
//! `{fields: [...]}` document are accepted.

use std::{collections::HashSet, fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow, ensure};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoercionClass {
    Textual,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Time,
    Timestamp,
}

impl CoercionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoercionClass::Textual => "textual",
            CoercionClass::Integer => "integer",
            CoercionClass::Decimal => "decimal",
            CoercionClass::Boolean => "boolean",
            CoercionClass::Date => "date",
            CoercionClass::DateTime => "datetime",
            CoercionClass::Time => "time",
            CoercionClass::Timestamp => "timestamp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalType {
    String,
    Bytes,
    Json,
    Geography,
    Interval,
    Int64,
    Integer,
    Int,
    SmallInt,
    BigInt,
    TinyInt,
    ByteInt,
    Numeric,
    Decimal,
    BigNumeric,
    BigDecimal,
    Float64,
    Bool,
    Date,
    DateTime,
    Time,
    Timestamp,
    Unrecognized(String),
}

impl LogicalType {
    /// Maps a type tag onto the enumeration. Matching ignores case; anything
    /// unknown is preserved as [`LogicalType::Unrecognized`].
    pub fn parse(tag: &str) -> Self {
        let trimmed = tag.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "STRING" => LogicalType::String,
            "BYTES" => LogicalType::Bytes,
            "JSON" => LogicalType::Json,
            "GEOGRAPHY" => LogicalType::Geography,
            "INTERVAL" => LogicalType::Interval,
            "INT64" => LogicalType::Int64,
            "INTEGER" => LogicalType::Integer,
            "INT" => LogicalType::Int,
            "SMALLINT" => LogicalType::SmallInt,
            "BIGINT" => LogicalType::BigInt,
            "TINYINT" => LogicalType::TinyInt,
            "BYTEINT" => LogicalType::ByteInt,
            "NUMERIC" => LogicalType::Numeric,
            "DECIMAL" => LogicalType::Decimal,
            "BIGNUMERIC" => LogicalType::BigNumeric,
            "BIGDECIMAL" => LogicalType::BigDecimal,
            "FLOAT64" => LogicalType::Float64,
            "BOOL" => LogicalType::Bool,
            "DATE" => LogicalType::Date,
            "DATETIME" => LogicalType::DateTime,
            "TIME" => LogicalType::Time,
            "TIMESTAMP" => LogicalType::Timestamp,
            _ => LogicalType::Unrecognized(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LogicalType::String => "STRING",
            LogicalType::Bytes => "BYTES",
            LogicalType::Json => "JSON",
            LogicalType::Geography => "GEOGRAPHY",
            LogicalType::Interval => "INTERVAL",
            LogicalType::Int64 => "INT64",
            LogicalType::Integer => "INTEGER",
            LogicalType::Int => "INT",
            LogicalType::SmallInt => "SMALLINT",
            LogicalType::BigInt => "BIGINT",
            LogicalType::TinyInt => "TINYINT",
            LogicalType::ByteInt => "BYTEINT",
            LogicalType::Numeric => "NUMERIC",
            LogicalType::Decimal => "DECIMAL",
            LogicalType::BigNumeric => "BIGNUMERIC",
            LogicalType::BigDecimal => "BIGDECIMAL",
            LogicalType::Float64 => "FLOAT64",
            LogicalType::Bool => "BOOL",
            LogicalType::Date => "DATE",
            LogicalType::DateTime => "DATETIME",
            LogicalType::Time => "TIME",
            LogicalType::Timestamp => "TIMESTAMP",
            LogicalType::Unrecognized(tag) => tag,
        }
    }

    pub fn coercion_class(&self) -> Option<CoercionClass> {
        let class = match self {
            LogicalType::String
            | LogicalType::Bytes
            | LogicalType::Json
            | LogicalType::Geography
            | LogicalType::Interval => CoercionClass::Textual,
            LogicalType::Int64
            | LogicalType::Integer
            | LogicalType::Int
            | LogicalType::SmallInt
            | LogicalType::BigInt
            | LogicalType::TinyInt
            | LogicalType::ByteInt => CoercionClass::Integer,
            LogicalType::Numeric
            | LogicalType::Decimal
            | LogicalType::BigNumeric
            | LogicalType::BigDecimal
            | LogicalType::Float64 => CoercionClass::Decimal,
            LogicalType::Bool => CoercionClass::Boolean,
            LogicalType::Date => CoercionClass::Date,
            LogicalType::DateTime => CoercionClass::DateTime,
            LogicalType::Time => CoercionClass::Time,
            LogicalType::Timestamp => CoercionClass::Timestamp,
            LogicalType::Unrecognized(_) => return None,
        };
        Some(class)
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, LogicalType::Unrecognized(_))
    }

    /// Whether a column of this type can drive time partitioning.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            LogicalType::Date | LogicalType::DateTime | LogicalType::Timestamp
        )
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "STRING",
            "BYTES",
            "JSON",
            "GEOGRAPHY",
            "INTERVAL",
            "INT64",
            "INTEGER",
            "INT",
            "SMALLINT",
            "BIGINT",
            "TINYINT",
            "BYTEINT",
            "NUMERIC",
            "DECIMAL",
            "BIGNUMERIC",
            "BIGDECIMAL",
            "FLOAT64",
            "BOOL",
            "DATE",
            "DATETIME",
            "TIME",
            "TIMESTAMP",
        ]
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LogicalType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogicalType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        if tag.trim().is_empty() {
            return Err(de::Error::custom("field type cannot be empty"));
        }
        Ok(LogicalType::parse(&tag))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    Required,
    #[default]
    Nullable,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Required => "REQUIRED",
            Mode::Nullable => "NULLABLE",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "REQUIRED" => Ok(Mode::Required),
            "NULLABLE" => Ok(Mode::Nullable),
            _ => Err(anyhow!(
                "Unknown field mode '{value}'. Supported modes: REQUIRED, NULLABLE"
            )),
        }
    }
}

impl Serialize for Mode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        Mode::from_str(&token).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: LogicalType,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: LogicalType, mode: Mode) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode,
            description: None,
        }
    }

    pub fn required(name: impl Into<String>, field_type: LogicalType) -> Self {
        Self::new(name, field_type, Mode::Required)
    }

    pub fn nullable(name: impl Into<String>, field_type: LogicalType) -> Self {
        Self::new(name, field_type, Mode::Nullable)
    }

    pub fn is_required(&self) -> bool {
        self.mode == Mode::Required
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let document = serde_yaml::Value::deserialize(deserializer)?;
        let fields = match document {
            serde_yaml::Value::Mapping(mut mapping) => mapping
                .remove(serde_yaml::Value::from("fields"))
                .ok_or_else(|| de::Error::custom("schema document requires a 'fields' list"))?,
            list @ serde_yaml::Value::Sequence(_) => list,
            other => {
                return Err(de::Error::custom(format!(
                    "unsupported schema representation: {other:?}"
                )));
            }
        };
        let fields: Vec<FieldDescriptor> =
            serde_yaml::from_value(fields).map_err(de::Error::custom)?;
        Schema::new(fields).map_err(de::Error::custom)
    }
}

impl Schema {
    /// Builds a schema, rejecting empty field lists, blank names, and names
    /// that collide when compared case-insensitively.
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self> {
        ensure!(!fields.is_empty(), "Schema must declare at least one field");
        let mut seen = HashSet::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            ensure!(
                !field.name.trim().is_empty(),
                "Field at position {} has an empty name",
                idx + 1
            );
            ensure!(
                seen.insert(field.name.to_ascii_lowercase()),
                "Duplicate field name '{}'",
                field.name
            );
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldDescriptor> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|field| field.name.eq_ignore_ascii_case(name))
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.name.clone()).collect()
    }

    pub fn unrecognized_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|field| !field.field_type.is_recognized())
    }

    pub fn validate_headers(&self, headers: &[String]) -> Result<()> {
        if headers.len() != self.fields.len() {
            return Err(anyhow!(
                "Header length mismatch: schema expects {} column(s) but input contains {}",
                self.fields.len(),
                headers.len()
            ));
        }
        for (idx, (field, header)) in self.fields.iter().zip(headers).enumerate() {
            if !field.name.eq_ignore_ascii_case(header.trim()) {
                return Err(anyhow!(
                    "Header mismatch at position {}: expected '{}' but found '{}'",
                    idx + 1,
                    field.name,
                    header
                ));
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).with_context(|| format!("Parsing schema file {path:?}"))
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).context("Parsing schema document")
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing schema to YAML")
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a FieldDescriptor;
    type IntoIter = std::slice::Iter<'a, FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_tags_case_insensitively() {
        assert_eq!(LogicalType::parse("int64"), LogicalType::Int64);
        assert_eq!(LogicalType::parse(" Timestamp "), LogicalType::Timestamp);
        assert_eq!(
            LogicalType::parse("ARRAY"),
            LogicalType::Unrecognized("ARRAY".to_string())
        );
    }

    #[test]
    fn every_listed_variant_is_recognized() {
        for tag in LogicalType::variants() {
            let ty = LogicalType::parse(tag);
            assert!(ty.coercion_class().is_some(), "{tag} should have a class");
            assert_eq!(ty.as_str(), *tag);
        }
    }

    #[test]
    fn mode_defaults_to_nullable() {
        let schema = Schema::from_yaml_str("- {name: note, type: STRING}").unwrap();
        assert_eq!(schema.fields()[0].mode, Mode::Nullable);
    }

    #[test]
    fn accepts_wrapped_json_documents() {
        let schema = Schema::from_yaml_str(
            r#"{"fields": [{"name": "age", "type": "INT64", "mode": "REQUIRED"}]}"#,
        )
        .unwrap();
        assert_eq!(schema.len(), 1);
        assert!(schema.fields()[0].is_required());
    }

    #[test]
    fn rejects_unknown_modes_and_duplicates() {
        assert!(Schema::from_yaml_str("- {name: a, type: STRING, mode: REPEATED}").is_err());
        assert!(
            Schema::from_yaml_str("- {name: a, type: STRING}\n- {name: A, type: INT64}").is_err()
        );
        assert!(Schema::new(Vec::new()).is_err());
    }

    #[test]
    fn header_validation_reports_position() {
        let schema = Schema::new(vec![
            FieldDescriptor::required("name", LogicalType::String),
            FieldDescriptor::nullable("age", LogicalType::Int64),
        ])
        .unwrap();
        assert!(
            schema
                .validate_headers(&["Name".to_string(), "age".to_string()])
                .is_ok()
        );
        let err = schema
            .validate_headers(&["name".to_string(), "years".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("position 2"));
    }
}
