//! CSV output tables, one file per named table per output category.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use ep_core::{KeyedDataset, finite_or_zero};
use tracing::{debug, info};

use crate::types::{OutputCategory, ResultSet};
use crate::{ResultsError, ResultsResult};

/// Writes result tables under `<root>/<category>/<name>.csv`.
///
/// Every row is prefixed with the scenario name and run timestamp so runs
/// can share a file.
#[derive(Debug, Clone)]
pub struct OutputSink {
    root_dir: PathBuf,
    scenario: String,
    timestamp: String,
}

impl OutputSink {
    pub fn new(root_dir: PathBuf, scenario_name: &str, timestamp: impl Into<String>) -> Self {
        Self {
            root_dir,
            scenario: scenario_name.to_uppercase(),
            timestamp: timestamp.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn category_dir(&self, category: OutputCategory) -> PathBuf {
        self.root_dir.join(category.dir_name())
    }

    pub fn table_path(&self, category: OutputCategory, name: &str) -> PathBuf {
        self.category_dir(category.route(name))
            .join(format!("{name}.csv"))
    }

    /// Remove every output folder.
    pub fn purge(&self) -> ResultsResult<()> {
        for category in OutputCategory::ALL {
            let dir = self.category_dir(category);
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
            }
        }
        info!(root = %self.root_dir.display(), "purged previous outputs");
        Ok(())
    }

    /// Write `table` as `<name>.csv`, appending when the file already exists
    /// with the same header.
    pub fn write_table(
        &self,
        category: OutputCategory,
        name: &str,
        table: &KeyedDataset,
    ) -> ResultsResult<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ResultsError::InvalidName {
                name: name.to_string(),
            });
        }
        let path = self.table_path(category, name);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let header = header_for(table);
        let exists = path.exists() && fs::metadata(&path)?.len() > 0;
        if exists {
            let existing = read_header(&path)?;
            if existing != header {
                return Err(ResultsError::HeaderMismatch {
                    path,
                    existing,
                    new: header,
                });
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut wtr = csv::Writer::from_writer(file);
        if !exists {
            wtr.write_record(&header)?;
        }

        let mut record = Vec::with_capacity(header.len());
        for (key, values) in table.iter() {
            record.clear();
            record.push(self.scenario.clone());
            record.push(self.timestamp.clone());
            record.extend(key.iter().map(|k| k.to_string()));
            record.extend(values.iter().map(|v| finite_or_zero(*v).to_string()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;

        debug!(path = %path.display(), rows = table.len(), "wrote table");
        Ok(path)
    }

    /// Write every table in `set` under `category`.
    pub fn export_result_set(
        &self,
        category: OutputCategory,
        set: &ResultSet,
    ) -> ResultsResult<Vec<PathBuf>> {
        set.iter()
            .map(|(name, table)| self.write_table(category, name, table))
            .collect()
    }
}

fn header_for(table: &KeyedDataset) -> Vec<String> {
    let mut header = vec!["SCENARIO".to_string(), "TIMESTAMP".to_string()];
    header.extend(table.dims().iter().map(|d| d.to_uppercase()));
    header.extend(table.columns().iter().cloned());
    header
}

fn read_header(path: &Path) -> ResultsResult<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    let mut record = csv::StringRecord::new();
    if !reader.read_record(&mut record)? {
        return Ok(Vec::new());
    }
    Ok(record.iter().map(|s| s.to_string()).collect())
}
