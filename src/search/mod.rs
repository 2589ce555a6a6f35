//! Size-targeted quality search.
//!
//! Each strategy is a small state machine: the runner asks it for the next
//! quality, encodes once, and hands the result back through `record`, which
//! either asks for another attempt or finishes with the result to keep.
//! Both strategies always finish with a result once their attempt ceiling
//! is reached, so running out of attempts is not an error.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::encoder::{EncodeResult, Encoder, Surface};
use crate::error::{CompressError, Result};
use crate::progress::{progress_percent, Progress};
use crate::size::format_size;

pub mod binary;
pub mod quality_decay;

pub use binary::BinarySearch;
pub use quality_decay::QualityDecay;

/// Pause between attempts when nothing else is configured.
pub const DEFAULT_ATTEMPT_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    QualityDecay,
    BinarySearch,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::QualityDecay => "quality-decay",
            Strategy::BinarySearch => "binary-search",
        }
    }

    pub fn max_attempts(&self) -> u32 {
        match self {
            Strategy::QualityDecay => quality_decay::MAX_ATTEMPTS,
            Strategy::BinarySearch => binary::MAX_ATTEMPTS,
        }
    }

    pub fn searcher(&self, target_bytes: u64) -> Searcher {
        match self {
            Strategy::QualityDecay => Searcher::QualityDecay(QualityDecay::new(target_bytes)),
            Strategy::BinarySearch => Searcher::BinarySearch(BinarySearch::new(target_bytes)),
        }
    }
}

impl FromStr for Strategy {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "quality-decay" => Ok(Strategy::QualityDecay),
            "binary-search" => Ok(Strategy::BinarySearch),
            other => Err(CompressError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a strategy wants after seeing one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Retry,
    Finish(EncodeResult),
}

#[derive(Debug, Clone)]
pub enum Searcher {
    QualityDecay(QualityDecay),
    BinarySearch(BinarySearch),
}

impl Searcher {
    pub fn quality(&self) -> f64 {
        match self {
            Searcher::QualityDecay(s) => s.quality(),
            Searcher::BinarySearch(s) => s.quality(),
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Searcher::QualityDecay(s) => s.attempts(),
            Searcher::BinarySearch(s) => s.attempts(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        match self {
            Searcher::QualityDecay(_) => quality_decay::MAX_ATTEMPTS,
            Searcher::BinarySearch(_) => binary::MAX_ATTEMPTS,
        }
    }

    pub fn record(&mut self, result: EncodeResult) -> Decision {
        match self {
            Searcher::QualityDecay(s) => s.record(result),
            Searcher::BinarySearch(s) => s.record(result),
        }
    }
}

/// Shared flag checked before every attempt.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// True when both tokens were cloned from the same run.
    pub fn same_run(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Sleep between attempts so progress stays observable. Zero disables it.
    pub attempt_delay: Duration,
    pub cancel: CancelToken,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            attempt_delay: DEFAULT_ATTEMPT_DELAY,
            cancel: CancelToken::new(),
        }
    }
}

impl SearchOptions {
    pub fn immediate() -> Self {
        Self {
            attempt_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchReport {
    pub result: EncodeResult,
    pub attempts: u32,
}

/// Drives `strategy` against `encoder` until it finishes.
///
/// Encoder errors end the run at once; they are not retried.
pub fn run<E: Encoder + ?Sized>(
    strategy: Strategy,
    encoder: &E,
    surface: &Surface,
    target_bytes: u64,
    options: &SearchOptions,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<SearchReport> {
    let mut searcher = strategy.searcher(target_bytes);

    loop {
        if options.cancel.is_cancelled() {
            debug!("{}: cancelled after {} attempts", strategy, searcher.attempts());
            return Err(CompressError::Cancelled);
        }

        let attempt = searcher.attempts() + 1;
        let quality = searcher.quality();
        on_progress(Progress::Attempt {
            attempt,
            quality,
            percent: progress_percent(attempt, searcher.max_attempts()),
        });

        let result = encoder.encode(surface, quality)?;
        if result.blob.is_empty() {
            return Err(CompressError::EmptyEncode(quality));
        }
        debug!(
            "{}: attempt {} quality {:.3} -> {} (target {})",
            strategy,
            attempt,
            quality,
            format_size(result.byte_len()),
            format_size(target_bytes)
        );

        match searcher.record(result) {
            Decision::Finish(result) => {
                info!(
                    "{}: finished after {} attempts at quality {:.3}, {}",
                    strategy,
                    searcher.attempts(),
                    result.quality,
                    format_size(result.byte_len())
                );
                return Ok(SearchReport {
                    result,
                    attempts: searcher.attempts(),
                });
            }
            Decision::Retry => {
                if !options.attempt_delay.is_zero() {
                    std::thread::sleep(options.attempt_delay);
                }
            }
        }
    }
}
