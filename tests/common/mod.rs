#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Employee table used across the integration tests.
pub const EMPLOYEE_SCHEMA: &str = "\
fields:
  - {name: name, type: STRING, mode: REQUIRED}
  - {name: age, type: INT64, mode: REQUIRED}
  - {name: salary, type: FLOAT64, mode: NULLABLE}
  - {name: is_active, type: BOOL, mode: REQUIRED}
  - {name: created_at, type: TIMESTAMP, mode: REQUIRED}
  - {name: join_date, type: DATE, mode: REQUIRED}
";

/// Scratch directory that disappears with the test.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.file(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.file(name);
        fs::write(&path, contents).expect("write temp file bytes");
        path
    }

    pub fn employee_schema(&self) -> PathBuf {
        self.write("employees.yaml", EMPLOYEE_SCHEMA)
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.file(name)).expect("read temp file")
    }

    /// Parses every line of a JSON-lines output file.
    pub fn read_json_lines(&self, name: &str) -> Vec<serde_json::Value> {
        self.read(name)
            .lines()
            .map(|line| serde_json::from_str(line).expect("valid JSON line"))
            .collect()
    }
}
