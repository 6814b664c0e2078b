// src/validate.rs

use anyhow::{bail, Context, Result};
use std::{fs, path::Path};
use tracing::{error, instrument};

use crate::config::ValidationConfig;
use crate::report::{Event, Reporter};

const STATUS_PREFIX: &str = "Validation status: ";

/// Check that `unzip_data_dir` holds exactly `expected_file_count` entries and
/// persist the outcome to `status_file`.
///
/// A failure to inspect the directory is recorded as `False` rather than
/// returned; only a failure to write the status file is an error.
#[instrument(level = "info", skip_all, fields(dir = %cfg.unzip_data_dir.display()))]
pub fn validate_all_files_exist(cfg: &ValidationConfig, reporter: &dyn Reporter) -> Result<bool> {
    let expected = cfg.expected_file_count;
    let found = match count_entries(&cfg.unzip_data_dir) {
        Ok(n) => Some(n),
        Err(e) => {
            error!(error = ?e, "file validation could not read directory");
            None
        }
    };
    let status = found == Some(expected);

    write_status(&cfg.status_file, status)?;
    reporter.report(Event::Validated {
        expected,
        found,
        status,
    });
    Ok(status)
}

fn count_entries(dir: &Path) -> Result<usize> {
    let mut n = 0;
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        entry?;
        n += 1;
    }
    Ok(n)
}

pub fn write_status(path: &Path, status: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = format!("{}{}", STATUS_PREFIX, if status { "True" } else { "False" });
    fs::write(path, text).with_context(|| format!("writing status file {}", path.display()))
}

/// Parse a status file written by [`validate_all_files_exist`].
pub fn read_status(path: &Path) -> Result<bool> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading status file {}", path.display()))?;
    match text.trim().strip_prefix(STATUS_PREFIX) {
        Some("True") => Ok(true),
        Some("False") => Ok(false),
        _ => bail!("unrecognised status file contents: {:?}", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    fn dir_with(n: usize) -> Result<TempDir> {
        let tmp = tempdir()?;
        for i in 0..n {
            fs::write(tmp.path().join(format!("T{i}.csv")), "A\n")?;
        }
        Ok(tmp)
    }

    fn cfg(dir: PathBuf, status_file: PathBuf) -> ValidationConfig {
        ValidationConfig {
            root_dir: dir.clone(),
            unzip_data_dir: dir,
            status_file,
            expected_file_count: 9,
            halt_on_failure: true,
        }
    }

    #[test]
    fn nine_files_pass_eight_and_ten_fail() -> Result<()> {
        let out = tempdir()?;
        for (n, want) in [(9, "True"), (8, "False"), (10, "False")] {
            let raw = dir_with(n)?;
            let status_file = out.path().join(format!("status_{n}.txt"));
            let ok = validate_all_files_exist(
                &cfg(raw.path().to_path_buf(), status_file.clone()),
                &MemoryReporter::new(),
            )?;
            assert_eq!(ok, want == "True");
            assert_eq!(
                fs::read_to_string(&status_file)?,
                format!("Validation status: {want}")
            );
            assert_eq!(read_status(&status_file)?, ok);
        }
        Ok(())
    }

    #[test]
    fn unreadable_directory_writes_false() -> Result<()> {
        let out = tempdir()?;
        let status_file = out.path().join("status.txt");
        let reporter = MemoryReporter::new();
        let ok = validate_all_files_exist(
            &cfg(out.path().join("missing"), status_file.clone()),
            &reporter,
        )?;
        assert!(!ok);
        assert_eq!(fs::read_to_string(&status_file)?, "Validation status: False");
        assert_eq!(
            reporter.events(),
            vec![Event::Validated {
                expected: 9,
                found: None,
                status: false
            }]
        );
        Ok(())
    }

    #[test]
    fn garbage_status_is_an_error() -> Result<()> {
        let out = tempdir()?;
        let p = out.path().join("status.txt");
        fs::write(&p, "maybe")?;
        assert!(read_status(&p).is_err());
        Ok(())
    }
}
