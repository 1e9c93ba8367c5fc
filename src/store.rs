use crate::constants::{API_KEY_FILE, INPUT_DIRS_FILE, OUTPUT_DIRS_FILE, PREFIXES_FILE};
use crate::error::Result;
use crate::model::{Credential, UsageHistory};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File-backed cache for the API key and usage history.
///
/// Every resource is a plain text file with one value per line. A missing or
/// unreadable file reads as empty; writes report their errors to the caller.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    base_dir: PathBuf,
}

impl CredentialStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the cached key, or `None` if it is absent, unreadable or blank.
    pub fn load_key(&self) -> Option<Credential> {
        let raw = fs::read_to_string(self.path(API_KEY_FILE)).ok()?;
        let key = strip_line_ending(&raw);
        Credential::parse(key).ok()
    }

    /// Persists `key`, skipping the write when the stored value is identical.
    ///
    /// # Returns
    /// * `Ok(true)` if the file was (re)written
    /// * `Ok(false)` if the stored key already matched
    pub fn save_key(&self, key: &Credential) -> Result<bool> {
        let path = self.path(API_KEY_FILE);
        if let Ok(current) = fs::read_to_string(&path) {
            if strip_line_ending(&current) == key.as_str() {
                return Ok(false);
            }
        }

        fs::create_dir_all(&self.base_dir)?;
        // Write-then-rename so a crash never leaves a truncated key behind
        let mut temp = NamedTempFile::new_in(&self.base_dir)?;
        temp.write_all(key.as_str().as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| e.error)?;
        Ok(true)
    }

    pub fn load_usage_history(&self) -> UsageHistory {
        UsageHistory {
            input_specs: self.read_lines(INPUT_DIRS_FILE),
            output_dirs: self.read_lines(OUTPUT_DIRS_FILE),
            prefixes: self.read_lines(PREFIXES_FILE),
        }
    }

    /// Remembers the input spec and output directory of a submitted batch.
    pub fn record_dirs(&self, input_spec: &str, output_dir: &str) -> Result<()> {
        self.append_unique(INPUT_DIRS_FILE, input_spec)?;
        self.append_unique(OUTPUT_DIRS_FILE, output_dir)?;
        Ok(())
    }

    /// Remembers a filename prefix. Blank prefixes are ignored.
    pub fn record_prefix(&self, prefix: &str) -> Result<()> {
        if prefix.trim().is_empty() {
            return Ok(());
        }
        self.append_unique(PREFIXES_FILE, prefix)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    fn read_lines(&self, name: &str) -> Vec<String> {
        let Ok(content) = fs::read_to_string(self.path(name)) else {
            return Vec::new();
        };

        let mut values: Vec<String> = Vec::new();
        for line in content.lines() {
            let line = strip_line_ending(line);
            if line.trim().is_empty() || values.iter().any(|v| v == line) {
                continue;
            }
            values.push(line.to_string());
        }
        values
    }

    fn append_unique(&self, name: &str, value: &str) -> Result<()> {
        // Values are stored one per line, so embedded newlines cannot round-trip
        let value = value.replace(['\r', '\n'], " ");
        if value.trim().is_empty() || self.read_lines(name).contains(&value) {
            return Ok(());
        }

        fs::create_dir_all(&self.base_dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name))?;
        writeln!(file, "{}", value)?;
        Ok(())
    }
}

fn strip_line_ending(value: &str) -> &str {
    value
        .strip_suffix("\r\n")
        .or_else(|| value.strip_suffix('\n'))
        .unwrap_or(value)
}
