//! Streaming ingest: read rows, parse every field, validate each row against
//! the schema, and route it to the record sink or the dead-letter sink.

use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use encoding_rs::Encoding;
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    cli::{InputFormat, ValidateArgs},
    coerce::{StandardCoercer, TypeCoercer},
    config::IngestConfig,
    data::Value,
    io_utils,
    literal,
    record::{Record, to_record},
    schema::Schema,
    validate::{Validator, ViolationKind},
};

pub type RowStream = Box<dyn Iterator<Item = Result<Vec<Value>>>>;

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub delimiter: u8,
    pub has_headers: bool,
    pub empty_as_null: bool,
    pub encoding: &'static Encoding,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            has_headers: true,
            empty_as_null: false,
            encoding: encoding_rs::UTF_8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub rows_read: usize,
    pub accepted: usize,
    pub rejected: usize,
}

/// A rejected row as written to the dead-letter output.
#[derive(Debug, Serialize)]
pub struct DeadLetter<'a> {
    pub row: usize,
    pub error: String,
    pub kind: ViolationKind,
    pub values: &'a [Value],
}

pub trait RecordSink {
    fn accept(&mut self, record: &Record) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

pub trait DeadLetterSink {
    fn reject(&mut self, letter: &DeadLetter<'_>) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes one JSON document per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    lines: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line<T: Serialize + ?Sized>(&mut self, item: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, item).context("Serializing JSON line")?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn accept(&mut self, record: &Record) -> Result<()> {
        self.write_line(record)
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().context("Flushing record output")
    }
}

impl<W: Write> DeadLetterSink for JsonLinesSink<W> {
    fn reject(&mut self, letter: &DeadLetter<'_>) -> Result<()> {
        self.write_line(letter)
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().context("Flushing dead-letter output")
    }
}

/// Validates every row from `rows` and routes it to `sink` or
/// `dead_letters`. Row numbers in logs and dead letters are 1-based.
pub fn run_ingest<C, I>(
    validator: &Validator<'_, C>,
    rows: I,
    sink: &mut dyn RecordSink,
    mut dead_letters: Option<&mut dyn DeadLetterSink>,
) -> Result<IngestSummary>
where
    C: TypeCoercer,
    I: IntoIterator<Item = Result<Vec<Value>>>,
{
    let field_names = validator.schema().field_names();
    let mut summary = IngestSummary::default();

    for (idx, row) in rows.into_iter().enumerate() {
        let row = row?;
        let number = idx + 1;
        summary.rows_read += 1;
        match validator.validate(&row) {
            Ok(()) => {
                sink.accept(&to_record(row, &field_names))
                    .with_context(|| format!("Writing record for row {number}"))?;
                summary.accepted += 1;
            }
            Err(violation) => {
                warn!("Row {number} rejected ({}): {violation}", violation.kind().as_str());
                summary.rejected += 1;
                if let Some(dead_letters) = dead_letters.as_mut() {
                    let letter = DeadLetter {
                        row: number,
                        error: violation.to_string(),
                        kind: violation.kind(),
                        values: &row,
                    };
                    dead_letters
                        .reject(&letter)
                        .with_context(|| format!("Writing dead letter for row {number}"))?;
                }
            }
        }
    }

    sink.finish()?;
    if let Some(dead_letters) = dead_letters.as_mut() {
        dead_letters.finish()?;
    }
    Ok(summary)
}

/// Streams CSV rows, checking the header row against the schema first when
/// one is expected. Each cell goes through the token parser.
pub fn read_csv_rows(path: &Path, schema: &Schema, options: &IngestOptions) -> Result<RowStream> {
    let mut reader =
        io_utils::open_csv_reader_from_path(path, options.delimiter, options.has_headers)?;
    if options.has_headers {
        let headers = io_utils::reader_headers(&mut reader, options.encoding)
            .with_context(|| format!("Reading headers from {path:?}"))?;
        schema
            .validate_headers(&headers)
            .with_context(|| format!("Validating headers for {path:?}"))?;
    }

    let encoding = options.encoding;
    let empty_as_null = options.empty_as_null;
    let path = path.to_path_buf();
    let rows = reader
        .into_byte_records()
        .enumerate()
        .map(move |(idx, record)| {
            let record =
                record.with_context(|| format!("Reading record {} from {path:?}", idx + 1))?;
            let cells = io_utils::decode_record(&record, encoding)
                .with_context(|| format!("Decoding record {} from {path:?}", idx + 1))?;
            Ok(parse_cells(&cells, empty_as_null))
        });
    Ok(Box::new(rows))
}

/// Streams JSON-lines rows. Every non-blank line must hold a JSON array;
/// string elements go through the token parser, other JSON values map
/// directly.
pub fn read_json_rows(path: &Path, options: &IngestOptions) -> Result<RowStream> {
    let lines = io_utils::open_text_lines(path, options.encoding)?;
    let path = path.to_path_buf();
    let rows = lines
        .lines()
        .enumerate()
        .filter_map(move |(idx, line)| parse_json_line(&path, idx + 1, line).transpose());
    Ok(Box::new(rows))
}

fn parse_json_line(
    path: &Path,
    line_number: usize,
    line: std::io::Result<String>,
) -> Result<Option<Vec<Value>>> {
    let line = line.with_context(|| format!("Reading line {line_number} from {path:?}"))?;
    if line.trim().is_empty() {
        return Ok(None);
    }
    let document: serde_json::Value = serde_json::from_str(&line)
        .with_context(|| format!("Parsing JSON on line {line_number} of {path:?}"))?;
    let serde_json::Value::Array(items) = document else {
        bail!("Line {line_number} of {path:?} is not a JSON array");
    };
    let raw = items.into_iter().map(Value::from).collect::<Vec<_>>();
    Ok(Some(literal::parse_row(&raw)))
}

fn parse_cells(cells: &[String], empty_as_null: bool) -> Vec<Value> {
    cells
        .iter()
        .map(|cell| {
            if empty_as_null && cell.is_empty() {
                Value::Null
            } else {
                literal::parse_token(cell)
            }
        })
        .collect()
}

pub fn execute(args: &ValidateArgs) -> Result<()> {
    let config = IngestConfig::load_optional(args.config.as_deref())?;
    let schema = Schema::load(&args.schema)
        .with_context(|| format!("Loading schema from {:?}", args.schema))?;
    for field in schema.unrecognized_fields() {
        warn!(
            "Field '{}' declares unrecognized type '{}'; non-null values will be rejected",
            field.name, field.field_type
        );
    }

    let coercer = StandardCoercer::with_timestamp_zones(&config.timestamp_zones);
    let validator = Validator::with_coercer(&schema, coercer);

    let format = args
        .format
        .unwrap_or_else(|| InputFormat::from_path(&args.input));
    let options = IngestOptions {
        delimiter: io_utils::resolve_input_delimiter(
            &args.input,
            args.delimiter.or(config.delimiter),
        ),
        has_headers: config.has_headers && !args.no_headers,
        empty_as_null: config.empty_as_null || args.empty_as_null,
        encoding: io_utils::resolve_encoding(
            args.input_encoding
                .as_deref()
                .or(config.input_encoding.as_deref()),
        )?,
    };
    debug!(
        "Reading {:?} as {} (delimiter '{}', headers: {}, encoding: {})",
        args.input,
        format.as_str(),
        crate::printable_delimiter(options.delimiter),
        options.has_headers,
        options.encoding.name()
    );

    let rows = match format {
        InputFormat::Csv => read_csv_rows(&args.input, &schema, &options)?,
        InputFormat::Jsonl => read_json_rows(&args.input, &options)?,
    };

    let mut sink = JsonLinesSink::new(io_utils::open_output(args.output.as_deref())?);
    let dead_letter_path: Option<PathBuf> =
        args.dead_letter.clone().or_else(|| config.dead_letter.clone());
    let mut dead_letters = dead_letter_path
        .as_deref()
        .map(|path| io_utils::open_output(Some(path)).map(JsonLinesSink::new))
        .transpose()?;

    let summary = run_ingest(
        &validator,
        rows,
        &mut sink,
        dead_letters
            .as_mut()
            .map(|letters| letters as &mut dyn DeadLetterSink),
    )?;
    info!(
        "Validated {} row(s) from {:?}: {} accepted, {} rejected",
        summary.rows_read, args.input, summary.accepted, summary.rejected
    );

    if args.fail_on_reject && summary.rejected > 0 {
        bail!(
            "{} of {} row(s) failed schema validation",
            summary.rejected,
            summary.rows_read
        );
    }
    Ok(())
}
