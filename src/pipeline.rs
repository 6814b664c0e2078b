// src/pipeline.rs

use anyhow::{bail, Result};
use tracing::{error, info, instrument};

use crate::{
    config::Config,
    ingest::unzip_source_file,
    model::{run_modelling, StarSchema},
    process::{validate_and_transform_data, TransformSummary},
    report::{Event, Reporter},
    schema::Schema,
    validate::{read_status, validate_all_files_exist},
};

pub const INGESTION: &str = "Data Ingestion";
pub const VALIDATION: &str = "Data Validation";
pub const TRANSFORMATION: &str = "Data Transformation";
pub const MODELLING: &str = "Data Modelling";

/// What a full run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub extracted: usize,
    pub validated: bool,
    pub transform: TransformSummary,
    pub star: StarSchema,
}

/// Runs the four stages in order against one configuration.
pub struct Pipeline<'a> {
    config: &'a Config,
    reporter: &'a dyn Reporter,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, reporter: &'a dyn Reporter) -> Self {
        Self { config, reporter }
    }

    #[instrument(level = "info", skip_all)]
    pub fn run(&self) -> Result<RunOutcome> {
        let extracted = self.run_stage(INGESTION, || self.ingest())?;
        let validated = self.run_stage(VALIDATION, || self.validate())?;
        let transform = self.run_stage(TRANSFORMATION, || self.transform())?;
        let star = self.run_stage(MODELLING, || self.model())?;
        info!("pipeline finished");
        Ok(RunOutcome {
            extracted,
            validated,
            transform,
            star,
        })
    }

    pub fn ingest(&self) -> Result<usize> {
        let cfg = self.config.ingestion()?;
        unzip_source_file(&cfg, self.reporter)
    }

    /// Count the extracted files. With `halt_on_failure`, a `False` status stops the run.
    pub fn validate(&self) -> Result<bool> {
        let cfg = self.config.validation()?;
        validate_all_files_exist(&cfg, self.reporter)?;
        let status = read_status(&cfg.status_file)?;
        if !status && cfg.halt_on_failure {
            bail!(
                "file validation failed: expected {} files in {}",
                cfg.expected_file_count,
                cfg.unzip_data_dir.display()
            );
        }
        Ok(status)
    }

    pub fn transform(&self) -> Result<TransformSummary> {
        let cfg = self.config.transformation()?;
        let schema = Schema::load(&cfg.schema_file)?;
        validate_and_transform_data(&cfg, &schema, self.reporter)
    }

    pub fn model(&self) -> Result<StarSchema> {
        let cfg = self.config.modelling()?;
        run_modelling(&cfg, self.reporter)
    }

    fn run_stage<T>(&self, stage: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.reporter.report(Event::StageStarted { stage });
        match f() {
            Ok(value) => {
                self.reporter.report(Event::StageCompleted { stage });
                Ok(value)
            }
            Err(e) => {
                error!(stage, error = ?e, "stage failed");
                Err(e.context(format!("stage {} failed", stage)))
            }
        }
    }
}
