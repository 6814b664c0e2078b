use anyhow::Result;
use std::env;
use tracing::info;
use velonorth::{logging::init_logging, Config, Pipeline, TracingReporter};

fn main() -> Result<()> {
    let config_path = env::args().nth(1).unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    // ─── logging: hold the guard until exit so the file layer flushes ───
    let _guard = init_logging(&config.logging)?;
    info!(config = %config_path, "startup");

    let outcome = Pipeline::new(&config, &TracingReporter).run()?;
    info!(
        extracted = outcome.extracted,
        tables_written = outcome.transform.written.len(),
        tables_skipped = outcome.transform.skipped.len(),
        fact_rows = outcome.star.fact_sales.num_rows(),
        "all stages complete"
    );
    Ok(())
}
