// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Measurement file output.
//!
//! Provides [`MeasurementFileConfig`] for TOML configuration and
//! [`MeasurementFileWriter`], which appends one semicolon-separated line per
//! telemetry report and starts a new file when the date in the file name
//! template changes.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use mbr_core::telemetry::MeasurementSink;

/// Column separator in measurement files.
pub const SEPARATOR: char = ';';

#[derive(Debug, Error)]
pub enum MeasureError {
    #[error("create measurement dir '{0}': {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("open measurement file '{0}': {1}")]
    Open(PathBuf, std::io::Error),
}

fn default_measurement_dir() -> String {
    if let Some(data_dir) = dirs::data_dir() {
        return data_dir
            .join("mbr-rs")
            .join("measurements")
            .to_string_lossy()
            .to_string();
    }
    "measurements".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementFileConfig {
    /// Whether measurement records are written to disk
    pub enabled: bool,
    /// Directory for measurement files
    pub dir: String,
    /// File name template with `%YYYY%`, `%MM%` and `%DD%` placeholders
    pub file: String,
    /// Seconds between records
    pub interval_secs: u32,
}

impl Default for MeasurementFileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_measurement_dir(),
            file: "MBR-MEASUREMENTS-%YYYY%-%MM%-%DD%.csv".to_string(),
            interval_secs: 5,
        }
    }
}

/// Expand the date placeholders of a file name template.
pub fn resolve_file_name(template: &str, now: DateTime<Utc>) -> String {
    template
        .replace("%YYYY%", &now.format("%Y").to_string())
        .replace("%MM%", &now.format("%m").to_string())
        .replace("%DD%", &now.format("%d").to_string())
}

fn open_writer(path: &Path) -> Result<BufWriter<File>, MeasureError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent).map_err(|e| MeasureError::CreateDir(parent.to_path_buf(), e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| MeasureError::Open(path.to_path_buf(), e))?;
    Ok(BufWriter::new(file))
}

pub struct MeasurementFileWriter {
    base_dir: PathBuf,
    file_template: String,
    current_file_name: String,
    writer: BufWriter<File>,
}

impl MeasurementFileWriter {
    /// Create a writer from config, or `None` when disabled.
    pub fn from_config(cfg: &MeasurementFileConfig) -> Result<Option<Self>, MeasureError> {
        if !cfg.enabled {
            return Ok(None);
        }
        Self::open(Path::new(cfg.dir.trim()), &cfg.file, Utc::now()).map(Some)
    }

    fn open(base_dir: &Path, template: &str, now: DateTime<Utc>) -> Result<Self, MeasureError> {
        let file_name = resolve_file_name(template, now);
        let path = base_dir.join(&file_name);
        let writer = open_writer(&path)?;
        info!("Writing measurements to {}", path.display());
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            file_template: template.to_string(),
            current_file_name: file_name,
            writer,
        })
    }

    /// Path of the file currently written to.
    pub fn current_path(&self) -> PathBuf {
        self.base_dir.join(&self.current_file_name)
    }

    fn write_at(&mut self, now: DateTime<Utc>, columns: &[String]) {
        let next_file_name = resolve_file_name(&self.file_template, now);
        if next_file_name != self.current_file_name {
            let _ = self.writer.flush();
            let next_path = self.base_dir.join(&next_file_name);
            match open_writer(&next_path) {
                Ok(next_writer) => {
                    self.current_file_name = next_file_name;
                    self.writer = next_writer;
                }
                Err(e) => {
                    warn!("measurement file rotation failed: {}", e);
                    return;
                }
            }
        }

        let mut line = now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        for col in columns {
            line.push(SEPARATOR);
            line.push_str(col);
        }
        line.push('\n');
        if let Err(e) = self.writer.write_all(line.as_bytes()) {
            warn!("measurement write failed: {}", e);
            return;
        }
        let _ = self.writer.flush();
    }
}

impl MeasurementSink for MeasurementFileWriter {
    fn write_record(&mut self, columns: &[String]) {
        self.write_at(Utc::now(), columns);
    }
}
