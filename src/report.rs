// src/report.rs

use std::{path::PathBuf, sync::Mutex};
use tracing::{info, warn};

use crate::schema::ScalarType;

/// Something a stage wants the operator to know about.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StageStarted {
        stage: &'static str,
    },
    StageCompleted {
        stage: &'static str,
    },
    ArchiveExtracted {
        entries: usize,
        dir: PathBuf,
    },
    Validated {
        expected: usize,
        found: Option<usize>,
        status: bool,
    },
    FileSkipped {
        file: String,
        reason: SkipReason,
    },
    DuplicatesDropped {
        table: String,
        key: Vec<String>,
        dropped: usize,
    },
    /// Cells kept as raw text because they did not parse as `target`.
    UncastValues {
        table: String,
        column: String,
        target: ScalarType,
        count: usize,
    },
    TableWritten {
        table: String,
        rows: usize,
        path: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoSchema,
    MissingColumns(Vec<String>),
}

/// Sink for stage events, handed to every stage instead of a global logger.
pub trait Reporter {
    fn report(&self, event: Event);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: Event) {
        match event {
            Event::StageStarted { stage } => info!(">>>>>> stage {} started <<<<<<", stage),
            Event::StageCompleted { stage } => {
                info!(">>>>>> stage {} completed <<<<<<\n\nx==========x", stage)
            }
            Event::ArchiveExtracted { entries, dir } => {
                info!(entries, dir = %dir.display(), "unzipped source archive")
            }
            Event::Validated {
                expected,
                found,
                status,
            } => {
                if status {
                    info!(expected, ?found, "file count validation successful");
                } else {
                    warn!(expected, ?found, "file count validation failed");
                }
            }
            Event::FileSkipped { file, reason } => match reason {
                SkipReason::NoSchema => warn!(file = %file, "schema not defined; skipping"),
                SkipReason::MissingColumns(cols) => {
                    tracing::error!(file = %file, missing = ?cols, "schema validation failed; skipping")
                }
            },
            Event::DuplicatesDropped {
                table,
                key,
                dropped,
            } => info!(table = %table, ?key, dropped, "dropped duplicate rows"),
            Event::UncastValues {
                table,
                column,
                target,
                count,
            } => warn!(
                table = %table,
                column = %column,
                ?target,
                count,
                "values did not cast; column kept as text"
            ),
            Event::TableWritten { table, rows, path } => {
                info!(table = %table, rows, path = %path.display(), "wrote table")
            }
        }
    }
}

/// Collects events in memory; used by tests.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<Event>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, event: Event) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
