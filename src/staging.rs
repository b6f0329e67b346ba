//! Local stack output directory handling.
//!
//! The detection tool writes into
//! `<base>/rerun/<stack_rerun>/<exptype>/<pointing>/<filter>/` using names of
//! the form `STACK-<visit>-<ccd>-<sub>-<rate>-<angle>.fits`. Only files for
//! the chip being swept are touched.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SweepConfig;
use crate::error::{Result, SweepError};
use crate::models::{Chip, Pointing};

pub struct StackOutputDir {
    dir: PathBuf,
    pattern: Regex,
}

impl StackOutputDir {
    pub fn new(config: &SweepConfig, pointing: &Pointing, chip: &Chip) -> Result<Self> {
        let dir = config
            .base_dir
            .join("rerun")
            .join(&config.stack_rerun)
            .join(&config.exptype)
            .join(pointing.as_str())
            .join(&config.filter);
        let pattern = Regex::new(&format!(
            r"^STACK.*-{}-.*\.fits$",
            regex::escape(&chip.padded())
        ))
        .map_err(|e| SweepError::Config(format!("bad stack file pattern: {}", e)))?;
        Ok(StackOutputDir { dir, pattern })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.pattern.is_match(file_name)
    }

    /// Sorted stack files currently present. A missing directory is empty.
    pub fn stack_files(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SweepError::Staging {
                    dir: self.dir.clone(),
                    source,
                })
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SweepError::Staging {
                dir: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if self.matches(name) && entry.path().is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Delete `files`, stopping at the first failure.
    pub fn remove(&self, files: &[PathBuf]) -> Result<()> {
        for file in files {
            fs::remove_file(file).map_err(|source| SweepError::Cleanup {
                path: file.clone(),
                source,
            })?;
            tracing::debug!("Removed {}", file.display());
        }
        Ok(())
    }

    /// Fail if any stack file for this chip is still present.
    pub fn ensure_clean(&self) -> Result<()> {
        let remaining = self.stack_files()?;
        if remaining.is_empty() {
            Ok(())
        } else {
            Err(SweepError::StaleOutput {
                dir: self.dir.clone(),
                count: remaining.len(),
            })
        }
    }
}
