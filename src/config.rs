// src/config.rs

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Number of raw files the source archive is expected to contain.
pub const EXPECTED_FILE_COUNT: usize = 9;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub artifacts_root: PathBuf,
    pub data_ingestion: IngestionConfig,
    pub data_validation: ValidationConfig,
    pub data_transformation: TransformationConfig,
    pub data_modelling: ModellingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub fx: Option<FxConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    pub root_dir: PathBuf,
    pub source_zip_file: PathBuf,
    pub unzip_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    pub root_dir: PathBuf,
    pub unzip_data_dir: PathBuf,
    pub status_file: PathBuf,
    #[serde(default = "default_expected_file_count")]
    pub expected_file_count: usize,
    /// Stop the run before transformation when the status file reads `False`.
    #[serde(default = "default_true")]
    pub halt_on_failure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformationConfig {
    pub root_dir: PathBuf,
    pub data_path: PathBuf,
    pub output_path: PathBuf,
    #[serde(default = "default_schema_file")]
    pub schema_file: PathBuf,
    /// Fail the stage instead of keeping raw text when a cast fails.
    #[serde(default)]
    pub strict_casting: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModellingConfig {
    pub root_dir: PathBuf,
    pub processed_data_path: PathBuf,
    pub presentation_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_log_file")]
    pub file: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FxConfig {
    pub api_url: String,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default)]
    pub target_currency: Option<String>,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_expected_file_count() -> usize {
    EXPECTED_FILE_COUNT
}
fn default_true() -> bool {
    true
}
fn default_schema_file() -> PathBuf {
    PathBuf::from("schema.yaml")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}
fn default_log_file() -> String {
    "running_logs.log".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_base_currency() -> String {
    "USD".into()
}
fn default_cache_ttl_secs() -> u64 {
    3600
}

impl Config {
    /// Read `config.yaml`, then create `artifacts_root`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = Self::from_yaml(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        create_directories(&[&config.artifacts_root])?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            bail!("YAML file is empty");
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn ingestion(&self) -> Result<IngestionConfig> {
        let cfg = &self.data_ingestion;
        create_directories(&[&cfg.root_dir])?;
        Ok(cfg.clone())
    }

    pub fn validation(&self) -> Result<ValidationConfig> {
        let cfg = &self.data_validation;
        create_directories(&[&cfg.root_dir])?;
        Ok(cfg.clone())
    }

    pub fn transformation(&self) -> Result<TransformationConfig> {
        let cfg = &self.data_transformation;
        create_directories(&[&cfg.root_dir, &cfg.output_path])?;
        Ok(cfg.clone())
    }

    pub fn modelling(&self) -> Result<ModellingConfig> {
        let cfg = &self.data_modelling;
        create_directories(&[&cfg.root_dir, &cfg.presentation_path])?;
        Ok(cfg.clone())
    }
}

pub fn create_directories(dirs: &[&Path]) -> Result<()> {
    for d in dirs {
        fs::create_dir_all(d).with_context(|| format!("creating directory {}", d.display()))?;
        debug!(dir = %d.display(), "directory ready");
    }
    Ok(())
}
