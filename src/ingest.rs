// src/ingest.rs

use anyhow::{Context, Result};
use std::{fs, fs::File, path::Path};
use tracing::instrument;
use zip::ZipArchive;

use crate::config::IngestionConfig;
use crate::report::{Event, Reporter};

/// Unzip the configured source archive into `unzip_dir`.
pub fn unzip_source_file(cfg: &IngestionConfig, reporter: &dyn Reporter) -> Result<usize> {
    let entries = extract_zip(&cfg.source_zip_file, &cfg.unzip_dir)?;
    reporter.report(Event::ArchiveExtracted {
        entries,
        dir: cfg.unzip_dir.clone(),
    });
    Ok(entries)
}

/// Extract every entry of `zip_path` into `dest_dir`, creating the directory if needed.
/// Returns the number of archive entries.
#[instrument(level = "info", skip_all, fields(zip = %zip_path.as_ref().display()))]
pub fn extract_zip<P: AsRef<Path>, Q: AsRef<Path>>(zip_path: P, dest_dir: Q) -> Result<usize> {
    let zip_path = zip_path.as_ref();
    let dest_dir = dest_dir.as_ref();
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("creating unzip directory {}", dest_dir.display()))?;

    let file = File::open(zip_path)
        .with_context(|| format!("Failed to open ZIP file: {}", zip_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Failed to read ZIP archive: {}", zip_path.display()))?;
    let entries = archive.len();
    archive
        .extract(dest_dir)
        .with_context(|| format!("extracting {} into {}", zip_path.display(), dest_dir.display()))?;

    Ok(entries)
}
