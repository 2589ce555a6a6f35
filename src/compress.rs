use std::path::Path;

use log::info;

use crate::encoder::{Encoder, Surface};
use crate::error::Result;
use crate::progress::Progress;
use crate::search::{self, SearchOptions, Strategy};
use crate::size::{format_size, reduction_percent, TargetSize};

/// File name offered when the result is saved.
pub const DOWNLOAD_FILE_NAME: &str = "exam-photo.jpg";

/// Final result of one compression run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOutcome {
    pub strategy: Strategy,
    pub blob: Vec<u8>,
    pub quality: f64,
    pub attempts: u32,
    pub original_size: u64,
}

impl CompressionOutcome {
    pub fn final_size(&self) -> u64 {
        self.blob.len() as u64
    }

    pub fn reduction_percent(&self) -> f64 {
        reduction_percent(self.original_size, self.final_size())
    }

    /// One decimal, as shown next to the sizes.
    pub fn reduction_label(&self) -> String {
        format!("{:.1}%", self.reduction_percent())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.blob)?;
        info!("saved {} to {:?}", format_size(self.final_size()), path);
        Ok(())
    }
}

/// Runs one search and wraps it with the start and completion signals.
pub fn compress<E: Encoder + ?Sized>(
    encoder: &E,
    surface: &Surface,
    original_size: u64,
    target: TargetSize,
    strategy: Strategy,
    options: &SearchOptions,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<CompressionOutcome> {
    on_progress(Progress::Started { strategy });

    let report = search::run(
        strategy,
        encoder,
        surface,
        target.bytes(),
        options,
        on_progress,
    )?;

    let outcome = CompressionOutcome {
        strategy,
        quality: report.result.quality,
        blob: report.result.blob,
        attempts: report.attempts,
        original_size,
    };
    on_progress(Progress::Complete {
        final_size: outcome.final_size(),
    });
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::testing::{pixel, SizeModel};

    #[test]
    fn wraps_search_with_start_and_complete() {
        let encoder = SizeModel::new(|q| (300_000.0 * q) as u64 + 10_000);
        let mut events = Vec::new();
        let outcome = compress(
            &encoder,
            &pixel(),
            500_000,
            TargetSize::from_kb(100).unwrap(),
            Strategy::QualityDecay,
            &SearchOptions::immediate(),
            &mut |p| events.push(p),
        )
        .unwrap();

        assert_eq!(
            events.first(),
            Some(&Progress::Started {
                strategy: Strategy::QualityDecay
            })
        );
        assert_eq!(
            events.last(),
            Some(&Progress::Complete {
                final_size: outcome.final_size()
            })
        );
        assert_eq!(events.len() as u32, outcome.attempts + 2);
        assert!(outcome.final_size() <= 100 * 1024);
        assert_eq!(outcome.original_size, 500_000);
    }

    #[test]
    fn reduction_label_rounds() {
        let outcome = CompressionOutcome {
            strategy: Strategy::BinarySearch,
            blob: vec![0; 104_000],
            quality: 0.3,
            attempts: 2,
            original_size: 2_000_000,
        };
        assert_eq!(outcome.reduction_label(), "94.8%");
    }

    #[test]
    fn saves_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DOWNLOAD_FILE_NAME);
        let outcome = CompressionOutcome {
            strategy: Strategy::QualityDecay,
            blob: vec![0xFF, 0xD8, 0xFF, 0xD9],
            quality: 0.9,
            attempts: 1,
            original_size: 10,
        };
        outcome.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), outcome.blob);
    }
}
