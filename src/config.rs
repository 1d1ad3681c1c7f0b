//! Optional YAML settings file for the `validate` command.
//!
//! Every key is optional. Command-line flags take precedence over the file,
//! and the file takes precedence over built-in defaults.

use std::{fs::File, io::BufReader, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{cli::parse_delimiter, coerce::DEFAULT_TIMESTAMP_ZONES};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    #[serde(deserialize_with = "deserialize_delimiter")]
    pub delimiter: Option<u8>,
    pub has_headers: bool,
    pub empty_as_null: bool,
    pub timestamp_zones: Vec<String>,
    pub dead_letter: Option<PathBuf>,
    pub input_encoding: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            has_headers: true,
            empty_as_null: false,
            timestamp_zones: DEFAULT_TIMESTAMP_ZONES
                .iter()
                .map(|zone| zone.to_string())
                .collect(),
            dead_letter: None,
            input_encoding: None,
        }
    }
}

impl IngestConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config file {path:?}"))
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).context("Parsing config document")
    }

    /// Loads the file when one is given, otherwise returns the defaults.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

fn deserialize_delimiter<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| parse_delimiter(&value).map_err(serde::de::Error::custom))
        .transpose()
}
