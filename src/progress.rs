use crate::search::Strategy;
use crate::size::format_size;

/// Share of the bar the search loops may fill. The rest is the
/// completion signal sent once the run has returned.
pub const SEARCH_SHARE: u8 = 90;

pub fn progress_percent(attempt: u32, max_attempts: u32) -> u8 {
    if max_attempts == 0 {
        return SEARCH_SHARE;
    }
    let pct = (attempt as f64 / max_attempts as f64 * SEARCH_SHARE as f64).round();
    pct.clamp(0.0, SEARCH_SHARE as f64) as u8
}

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Started {
        strategy: Strategy,
    },
    Attempt {
        attempt: u32,
        quality: f64,
        percent: u8,
    },
    Complete {
        final_size: u64,
    },
}

impl Progress {
    pub fn percent(&self) -> u8 {
        match self {
            Progress::Started { .. } => 0,
            Progress::Attempt { percent, .. } => *percent,
            Progress::Complete { .. } => 100,
        }
    }

    pub fn status(&self) -> String {
        match self {
            Progress::Started {
                strategy: Strategy::QualityDecay,
            } => "Compressing with quality adjustment...".to_string(),
            Progress::Started {
                strategy: Strategy::BinarySearch,
            } => "Compressing to exact size...".to_string(),
            Progress::Attempt {
                attempt, quality, ..
            } => format!("Attempt {} at quality {:.2}", attempt, quality),
            Progress::Complete { final_size } => format!(
                "Compression complete! Final size: {}",
                format_size(*final_size)
            ),
        }
    }
}
