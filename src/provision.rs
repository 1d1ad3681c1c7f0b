//! Warehouse table provisioning.
//!
//! A [`TableSpec`] ties a schema to a fully qualified table id and a
//! time-partitioning rule. Provisioners turn it into a created table;
//! [`ManifestProvisioner`] emits the table-insert request body as JSON so
//! it can be reviewed or handed to whatever client talks to the warehouse.

use std::{fmt, io::Write, path::PathBuf, str::FromStr};

use anyhow::{Context, Result, anyhow, ensure};
use log::info;
use serde_json::{Map, json};

use crate::{
    cli::ProvisionArgs,
    io_utils,
    schema::{LogicalType, Schema},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableId {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl FromStr for TableId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.trim().split('.').collect::<Vec<_>>();
        ensure!(
            parts.len() == 3 && parts.iter().all(|part| !part.trim().is_empty()),
            "Table id '{s}' must have the form project.dataset.table"
        );
        Ok(Self {
            project: parts[0].trim().to_string(),
            dataset: parts[1].trim().to_string(),
            table: parts[2].trim().to_string(),
        })
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Granularity {
    #[default]
    Day,
    Hour,
    Month,
    Year,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "DAY",
            Granularity::Hour => "HOUR",
            Granularity::Month => "MONTH",
            Granularity::Year => "YEAR",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAY" => Ok(Granularity::Day),
            "HOUR" => Ok(Granularity::Hour),
            "MONTH" => Ok(Granularity::Month),
            "YEAR" => Ok(Granularity::Year),
            _ => Err(anyhow!(
                "Unknown partition granularity '{s}'. Expected DAY, HOUR, MONTH, or YEAR"
            )),
        }
    }
}

/// Partition rule; `expiration_ms: None` keeps partitions forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePartitioning {
    pub field: String,
    pub granularity: Granularity,
    pub expiration_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TableSpec {
    id: TableId,
    schema: Schema,
    partitioning: TimePartitioning,
}

impl TableSpec {
    /// Checks that the partition column exists and holds a date or time
    /// type the granularity can slice.
    pub fn new(id: TableId, schema: Schema, partitioning: TimePartitioning) -> Result<Self> {
        let field = schema.field(&partitioning.field).ok_or_else(|| {
            anyhow!(
                "Partition field '{}' is not declared in the schema",
                partitioning.field
            )
        })?;
        ensure!(
            field.field_type.is_temporal(),
            "Partition field '{}' has type {} but must be DATE, DATETIME, or TIMESTAMP",
            field.name,
            field.field_type
        );
        ensure!(
            !(field.field_type == LogicalType::Date && partitioning.granularity == Granularity::Hour),
            "HOUR partitioning is not available for DATE field '{}'",
            field.name
        );
        let partitioning = TimePartitioning {
            field: field.name.clone(),
            ..partitioning
        };
        Ok(Self {
            id,
            schema,
            partitioning,
        })
    }

    pub fn id(&self) -> &TableId {
        &self.id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn partitioning(&self) -> &TimePartitioning {
        &self.partitioning
    }

    /// Table-insert request body in the warehouse REST shape.
    pub fn to_request_body(&self) -> serde_json::Value {
        let fields = self
            .schema
            .iter()
            .map(|field| {
                let mut entry = Map::new();
                entry.insert("name".into(), json!(field.name));
                entry.insert("type".into(), json!(field.field_type.as_str()));
                entry.insert("mode".into(), json!(field.mode.as_str()));
                if let Some(description) = &field.description {
                    entry.insert("description".into(), json!(description));
                }
                serde_json::Value::Object(entry)
            })
            .collect::<Vec<_>>();

        let mut partitioning = Map::new();
        partitioning.insert("type".into(), json!(self.partitioning.granularity.as_str()));
        partitioning.insert("field".into(), json!(self.partitioning.field));
        if let Some(expiration) = self.partitioning.expiration_ms {
            // int64 travels as a decimal string in the REST encoding
            partitioning.insert("expirationMs".into(), json!(expiration.to_string()));
        }

        json!({
            "tableReference": {
                "projectId": self.id.project,
                "datasetId": self.id.dataset,
                "tableId": self.id.table,
            },
            "schema": { "fields": fields },
            "timePartitioning": partitioning,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub id: TableId,
    pub field_count: usize,
}

pub trait TableProvisioner {
    fn create_table(&self, spec: &TableSpec) -> Result<TableRef>;
}

/// Writes the request body to a file, or stdout when no path is set.
#[derive(Debug, Clone, Default)]
pub struct ManifestProvisioner {
    output: Option<PathBuf>,
}

impl ManifestProvisioner {
    pub fn new(output: Option<PathBuf>) -> Self {
        Self { output }
    }
}

impl TableProvisioner for ManifestProvisioner {
    fn create_table(&self, spec: &TableSpec) -> Result<TableRef> {
        let mut writer = io_utils::open_output(self.output.as_deref())?;
        serde_json::to_writer_pretty(&mut writer, &spec.to_request_body())
            .with_context(|| format!("Writing table manifest for {}", spec.id()))?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        info!("Wrote create-table request for {}", spec.id());
        Ok(TableRef {
            id: spec.id().clone(),
            field_count: spec.schema().len(),
        })
    }
}

pub fn execute(args: &ProvisionArgs) -> Result<()> {
    let schema = Schema::load(&args.schema)
        .with_context(|| format!("Loading schema from {:?}", args.schema))?;
    let id = args.table.parse::<TableId>()?;
    let partitioning = TimePartitioning {
        field: args.partition_field.clone(),
        granularity: args.granularity,
        expiration_ms: args.expiration_ms,
    };
    let spec = TableSpec::new(id, schema, partitioning)
        .with_context(|| format!("Preparing table {}", args.table))?;
    let provisioner = ManifestProvisioner::new(args.output.clone());
    let table = provisioner.create_table(&spec)?;
    info!(
        "Table {} declares {} field(s) partitioned by {} on '{}'",
        table.id,
        table.field_count,
        spec.partitioning().granularity,
        spec.partitioning().field
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDescriptor;

    fn schema() -> Schema {
        Schema::new(vec![
            FieldDescriptor::required("name", LogicalType::String),
            FieldDescriptor::required("created_at", LogicalType::Timestamp),
            FieldDescriptor::required("join_date", LogicalType::Date),
        ])
        .unwrap()
    }

    fn partitioning(field: &str, granularity: Granularity) -> TimePartitioning {
        TimePartitioning {
            field: field.to_string(),
            granularity,
            expiration_ms: None,
        }
    }

    #[test]
    fn table_id_needs_three_segments() {
        let id: TableId = "acme.sales.orders".parse().unwrap();
        assert_eq!(id.dataset, "sales");
        assert_eq!(id.to_string(), "acme.sales.orders");
        assert!("acme.orders".parse::<TableId>().is_err());
        assert!("acme..orders".parse::<TableId>().is_err());
    }

    #[test]
    fn partition_field_must_be_temporal() {
        let id: TableId = "p.d.t".parse().unwrap();
        let err = TableSpec::new(id.clone(), schema(), partitioning("name", Granularity::Day))
            .unwrap_err();
        assert!(err.to_string().contains("must be DATE, DATETIME, or TIMESTAMP"));
        assert!(TableSpec::new(id.clone(), schema(), partitioning("missing", Granularity::Day)).is_err());
        assert!(TableSpec::new(id, schema(), partitioning("join_date", Granularity::Hour)).is_err());
    }

    #[test]
    fn request_body_omits_absent_expiration() {
        let id: TableId = "p.d.t".parse().unwrap();
        let spec = TableSpec::new(id, schema(), partitioning("JOIN_DATE", Granularity::Month)).unwrap();
        let body = spec.to_request_body();
        assert_eq!(body["tableReference"]["tableId"], "t");
        assert_eq!(body["schema"]["fields"][1]["type"], "TIMESTAMP");
        assert_eq!(body["timePartitioning"]["type"], "MONTH");
        assert_eq!(body["timePartitioning"]["field"], "join_date");
        assert!(body["timePartitioning"].get("expirationMs").is_none());
    }
}
