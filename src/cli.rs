use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::provision::Granularity;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Validate tabular rows against a warehouse table schema",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse, validate, and split rows into accepted records and dead letters
    Validate(ValidateArgs),
    /// Decode raw tokens into typed values and print them
    Parse(ParseArgs),
    /// List the fields declared by a schema file
    Columns(ColumnsArgs),
    /// Emit the create-table request for a schema with time partitioning
    Provision(ProvisionArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    Csv,
    Jsonl,
}

impl InputFormat {
    /// `.jsonl`, `.ndjson`, and `.json` read as JSON lines; anything else as CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext)
                if ["jsonl", "ndjson", "json"]
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known)) =>
            {
                InputFormat::Jsonl
            }
            _ => InputFormat::Csv,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Csv => "csv",
            InputFormat::Jsonl => "jsonl",
        }
    }
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Schema file (YAML or JSON) describing the target table
    #[arg(short, long)]
    pub schema: PathBuf,
    /// Input rows (`-` reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Accepted records as JSON lines (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Rejected rows as JSON lines with the violation that rejected them
    #[arg(long = "dead-letter")]
    pub dead_letter: Option<PathBuf>,
    /// Input format (inferred from the file extension when omitted)
    #[arg(long, value_enum)]
    pub format: Option<InputFormat>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Treat the first CSV row as data rather than a header
    #[arg(long = "no-headers")]
    pub no_headers: bool,
    /// Read empty CSV cells as nulls
    #[arg(long = "empty-as-null")]
    pub empty_as_null: bool,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// YAML settings file; flags given here take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Exit with an error when any row is rejected
    #[arg(long = "fail-on-reject")]
    pub fail_on_reject: bool,
}

#[derive(Debug, Args)]
pub struct ParseArgs {
    /// Raw tokens, e.g. `42`, `"[1, 2]"`, `None`
    #[arg(required = true)]
    pub tokens: Vec<String>,
    /// Print one JSON value per line instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Schema file to list
    #[arg(short, long)]
    pub schema: PathBuf,
}

#[derive(Debug, Args)]
pub struct ProvisionArgs {
    /// Schema file describing the table fields
    #[arg(short, long)]
    pub schema: PathBuf,
    /// Fully qualified table id (`project.dataset.table`)
    #[arg(long)]
    pub table: String,
    /// DATE, DATETIME, or TIMESTAMP field to partition by
    #[arg(long = "partition-field")]
    pub partition_field: String,
    /// Partition granularity
    #[arg(long, default_value = "DAY", value_parser = parse_granularity)]
    pub granularity: Granularity,
    /// Partition expiration in milliseconds (partitions never expire when omitted)
    #[arg(long = "expiration-ms")]
    pub expiration_ms: Option<u64>,
    /// Destination for the request body (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" | "\\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

pub fn parse_granularity(value: &str) -> Result<Granularity, String> {
    value.parse().map_err(|err: anyhow::Error| err.to_string())
}
