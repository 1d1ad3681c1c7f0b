pub mod cli;
pub mod coerce;
pub mod columns;
pub mod config;
pub mod data;
pub mod io_utils;
pub mod literal;
pub mod pipeline;
pub mod provision;
pub mod record;
pub mod schema;
pub mod table;
pub mod validate;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug};

use crate::{
    cli::{Cli, Commands},
    table::Table,
};

pub use crate::{
    data::Value,
    literal::{parse_field, parse_row, parse_token},
    record::{Record, to_record},
    schema::{FieldDescriptor, LogicalType, Mode, Schema},
    validate::{SchemaViolation, Validator, validate_row},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tabular_ingest", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate(args) => pipeline::execute(&args),
        Commands::Parse(args) => handle_parse(&args),
        Commands::Columns(args) => columns::execute(&args),
        Commands::Provision(args) => provision::execute(&args),
    }
}

fn handle_parse(args: &cli::ParseArgs) -> Result<()> {
    debug!("Parsing token(s): {}", args.tokens.iter().join(" | "));
    let values = literal::parse_text_row(&args.tokens);
    if args.json {
        for value in &values {
            println!("{}", serde_json::to_string(value)?);
        }
        return Ok(());
    }

    let mut table = Table::new(["token", "kind", "value"]);
    for (token, value) in args.tokens.iter().zip(&values) {
        table.push_row(vec![
            token.clone(),
            value.kind().to_string(),
            value.to_literal(),
        ]);
    }
    table.print();
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
