use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::AppResult,
    models::{Disposition, ItemDisposition, MediaType},
};

const HEADER: [&str; 4] = ["title", "media_type", "disposition", "rationale"];

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    title: &'a str,
    media_type: MediaType,
    disposition: String,
    rationale: &'a str,
}

impl<'a> From<&'a ItemDisposition> for ReportRow<'a> {
    fn from(entry: &'a ItemDisposition) -> Self {
        Self {
            title: &entry.item.title,
            media_type: entry.item.media_type,
            disposition: describe(&entry.disposition),
            rationale: entry.item.rationale.as_deref().unwrap_or_default(),
        }
    }
}

fn describe(disposition: &Disposition) -> String {
    match disposition {
        Disposition::Added { .. } => "added".to_string(),
        Disposition::Forwarded {
            already_requested: false,
        } => "forwarded".to_string(),
        Disposition::Forwarded {
            already_requested: true,
        } => "forwarded (already requested)".to_string(),
        Disposition::Dropped { reason } => format!("dropped: {}", reason),
    }
}

pub fn report_file_name(theme_id: &str, run_at: DateTime<Utc>) -> String {
    format!(
        "{}_recommendations_{}.csv",
        theme_id,
        run_at.format("%Y%m%d_%H%M%S")
    )
}

/// Writes one CSV row per item and returns the file's path
///
/// The output directory is created if missing.
pub fn write_report(
    dir: &Path,
    theme_id: &str,
    run_at: DateTime<Utc>,
    items: &[ItemDisposition],
) -> AppResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(theme_id, run_at));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)?;

    writer.write_record(HEADER)?;
    for entry in items {
        writer.serialize(ReportRow::from(entry))?;
    }
    writer.flush()?;

    tracing::info!(theme = %theme_id, rows = items.len(), path = %path.display(), "Report written");
    Ok(path)
}
