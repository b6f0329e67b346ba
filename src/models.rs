use serde::{Deserialize, Serialize};
use std::fmt;

/// Sky patch identifier handed through to the tool untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointing(pub String);

impl Pointing {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pointing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Detector chip as given on the command line.
///
/// The raw form goes to the detection tool; `padded()` is the three digit
/// form the tool embeds in its output file names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chip(pub String);

impl Chip {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn padded(&self) -> String {
        let raw = self.0.trim();
        match raw.parse::<u32>() {
            Ok(n) => format!("{:03}", n),
            Err(_) => format!("{:0>3}", raw),
        }
    }
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the caller supplies for one sweep.
#[derive(Debug, Clone)]
pub struct SweepTarget {
    pub storage_uri: String,
    pub pointing: Pointing,
    pub chip: Chip,
}

impl SweepTarget {
    pub fn new(storage_uri: &str, pointing: &str, chip: &str) -> Self {
        SweepTarget {
            storage_uri: storage_uri.to_string(),
            pointing: Pointing(pointing.to_string()),
            chip: Chip(chip.to_string()),
        }
    }

    /// Per-pointing remote directory shared by every grid cell.
    pub fn remote_dir(&self) -> String {
        format!(
            "{}/{}",
            self.storage_uri.trim_end_matches('/'),
            self.pointing
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellStatus {
    Uploaded = 1,
    Failed = 2,
}

impl CellStatus {
    pub fn from_i32(value: i32) -> &'static str {
        match value {
            1 => "Uploaded",
            2 => "Failed",
            _ => "Unknown",
        }
    }
}
