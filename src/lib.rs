pub mod config;
pub mod fx;
pub mod ingest;
pub mod kpi;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod schema;
pub mod table;
pub mod validate;

pub use config::Config;
pub use pipeline::Pipeline;
pub use report::{Event, MemoryReporter, Reporter, TracingReporter};
