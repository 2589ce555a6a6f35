use std::fmt;
use std::str::FromStr;

use crate::error::{CompressError, Result};

pub const KB: u64 = 1024;
pub const MB: u64 = 1024 * 1024;

pub const MIN_TARGET_KB: i64 = 10;
pub const MAX_TARGET_KB: i64 = 500;

/// Human readable size, two decimals above one kilobyte.
pub fn format_size(bytes: u64) -> String {
    if bytes < KB {
        format!("{} bytes", bytes)
    } else if bytes < MB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    }
}

/// Percentage saved going from `original` to `compressed` bytes.
/// Negative when the output grew; zero for an empty original.
pub fn reduction_percent(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - compressed as f64) / original as f64 * 100.0
}

/// Requested output size. Only values in `[10, 500]` KB can be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    kb: u32,
}

impl TargetSize {
    pub fn from_kb(kb: i64) -> Result<Self> {
        if !(MIN_TARGET_KB..=MAX_TARGET_KB).contains(&kb) {
            return Err(CompressError::TargetOutOfRange(kb.to_string()));
        }
        Ok(Self { kb: kb as u32 })
    }

    pub fn kb(&self) -> u32 {
        self.kb
    }

    pub fn bytes(&self) -> u64 {
        self.kb as u64 * KB
    }
}

impl FromStr for TargetSize {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self> {
        let kb = s
            .trim()
            .parse::<i64>()
            .map_err(|_| CompressError::TargetOutOfRange(s.to_string()))?;
        Self::from_kb(kb)
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} KB", self.kb)
    }
}
