//! Persisting and previewing result sets.

pub mod csv;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::OutputError;
use crate::models::Record;

/// Directory used when no output location is given.
pub const DEFAULT_OUTPUT_DIR: &str = "results";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    pub fn parse(name: &str) -> Result<Self, OutputError> {
        match name.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(OutputError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

#[derive(Serialize)]
struct Meta<'a> {
    spider_name: &'a str,
    crawl_time: String,
    total_count: usize,
}

#[derive(Serialize)]
struct Document<'a> {
    meta: Meta<'a>,
    data: &'a [Record],
}

/// Writes result sets under one output directory.
#[derive(Debug, Clone)]
pub struct DataSaver {
    output_dir: PathBuf,
}

impl Default for DataSaver {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

impl DataSaver {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// `<name>_<YYYYmmdd_HHMMSS>.<ext>` inside the output directory.
    pub fn default_path(&self, spider_name: &str, format: OutputFormat) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        self.output_dir
            .join(format!("{}_{}.{}", spider_name, stamp, format.extension()))
    }

    /// Save `records`, returning where they went.
    ///
    /// An explicit `path` without an extension gets the format's one. Empty
    /// result sets are not written and give `Ok(None)`.
    pub fn save(
        &self,
        records: &[Record],
        spider_name: &str,
        format: OutputFormat,
        path: Option<&Path>,
    ) -> Result<Option<PathBuf>, OutputError> {
        if records.is_empty() {
            warn!("No data to save for {}", spider_name);
            return Ok(None);
        }

        let path = match path {
            Some(p) if p.extension().is_none() => p.with_extension(format.extension()),
            Some(p) => p.to_path_buf(),
            None => self.default_path(spider_name, format),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| OutputError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = File::create(&path).map_err(|source| OutputError::Io {
            path: path.clone(),
            source,
        })?;
        let writer = BufWriter::new(file);

        match format {
            OutputFormat::Json => {
                let document = Document {
                    meta: Meta {
                        spider_name,
                        crawl_time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                        total_count: records.len(),
                    },
                    data: records,
                };
                serde_json::to_writer_pretty(writer, &document)?;
            }
            OutputFormat::Csv => csv::write_csv(writer, records)?,
        }

        info!("Saved {} records to {}", records.len(), path.display());
        Ok(Some(path))
    }
}

const PREVIEW_FIELDS: &[&str] = &["title", "name", "content"];

fn shorten(value: &str, max: usize) -> String {
    if value.chars().count() > max {
        let kept: String = value.chars().take(max - 3).collect();
        format!("{}...", kept)
    } else {
        value.to_string()
    }
}

/// One summary line per record for the first `max_items` records.
pub fn preview_lines(records: &[Record], max_items: usize) -> Vec<String> {
    records
        .iter()
        .take(max_items)
        .enumerate()
        .map(|(i, record)| {
            let mut parts: Vec<String> = PREVIEW_FIELDS
                .iter()
                .filter_map(|field| {
                    record
                        .get(field)
                        .filter(|v| !v.is_empty())
                        .map(|v| format!("{}: {}", field, shorten(v, 50)))
                })
                .collect();

            if parts.is_empty() {
                parts = record
                    .fields
                    .iter()
                    .filter(|(_, v)| !v.is_empty())
                    .take(2)
                    .map(|(k, v)| format!("{}: {}", k, shorten(v, 30)))
                    .collect();
            }
            format!("{}. {}", i + 1, parts.join(" | "))
        })
        .collect()
}

/// Print a short preview of the result set to stdout.
pub fn preview(records: &[Record], max_items: usize) {
    if records.is_empty() {
        println!("{} No data to preview", console::style("!").yellow());
        return;
    }

    println!(
        "\n{} Preview ({} of {} records):",
        console::style("→").cyan(),
        records.len().min(max_items),
        records.len()
    );
    println!("{}", "-".repeat(80));
    for line in preview_lines(records, max_items) {
        println!("{}", line);
    }
}
