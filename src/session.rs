//! One image at a time: load, crop, compress, save.
//!
//! Only one compression may be in flight. Starting a run cancels the one
//! before it; the cancelled run ends with `CompressError::Cancelled` at its
//! next attempt boundary.

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info};

use crate::compress::{compress, CompressionOutcome};
use crate::crop::{crop, CropBox};
use crate::encoder::{EncodeResult, Encoder, Surface};
use crate::error::{CompressError, Result};
use crate::progress::Progress;
use crate::search::{CancelToken, SearchOptions, Strategy, DEFAULT_ATTEMPT_DELAY};
use crate::size::{reduction_percent, TargetSize};
use crate::source::SourceImage;

/// Quality of the preview made right after cropping.
pub const PREVIEW_QUALITY: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct CropPreview {
    pub crop_box: CropBox,
    pub preview: EncodeResult,
    pub original_size: u64,
}

impl CropPreview {
    pub fn size(&self) -> u64 {
        self.preview.byte_len()
    }

    pub fn reduction_percent(&self) -> f64 {
        reduction_percent(self.original_size, self.size())
    }
}

/// A compression running on its own thread.
pub struct RunHandle {
    cancel: CancelToken,
    handle: JoinHandle<Result<CompressionOutcome>>,
}

impl RunHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<CompressionOutcome> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

pub struct Session<E> {
    encoder: Arc<E>,
    attempt_delay: Duration,
    source: Option<SourceImage>,
    crop_box: Option<CropBox>,
    surface: Option<Arc<Surface>>,
    running: Option<CancelToken>,
    outcome: Option<CompressionOutcome>,
}

impl<E: Encoder> Session<E> {
    pub fn new(encoder: E) -> Self {
        Self {
            encoder: Arc::new(encoder),
            attempt_delay: DEFAULT_ATTEMPT_DELAY,
            source: None,
            crop_box: None,
            surface: None,
            running: None,
            outcome: None,
        }
    }

    pub fn with_attempt_delay(mut self, delay: Duration) -> Self {
        self.attempt_delay = delay;
        self
    }

    /// Replaces the current image and drops crop and result.
    pub fn load(&mut self, source: SourceImage) {
        self.cancel();
        self.surface = Some(source.shared_surface());
        self.source = Some(source);
        self.crop_box = None;
        self.outcome = None;
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn crop_box(&self) -> Option<CropBox> {
        self.crop_box
    }

    pub fn outcome(&self) -> Option<&CompressionOutcome> {
        self.outcome.as_ref()
    }

    /// Crops the loaded image and encodes a preview of the crop.
    pub fn apply_crop(&mut self, crop_box: CropBox) -> Result<CropPreview> {
        let source = self.source.as_ref().ok_or(CompressError::NoImage)?;
        let cropped = crop(source.surface(), &crop_box)?;
        let preview = self.encoder.encode(&cropped, PREVIEW_QUALITY)?;
        debug!("cropped to {}, preview {} bytes", crop_box, preview.byte_len());

        let original_size = source.original_size();
        self.cancel();
        self.surface = Some(Arc::new(cropped));
        self.crop_box = Some(crop_box);
        self.outcome = None;
        Ok(CropPreview {
            crop_box,
            preview,
            original_size,
        })
    }

    /// Goes back to the whole image.
    pub fn reset_crop(&mut self) {
        let Some(full) = self.source.as_ref().map(SourceImage::shared_surface) else {
            return;
        };
        self.cancel();
        self.surface = Some(full);
        self.crop_box = None;
        self.outcome = None;
    }

    fn prepare(&self, target_kb: i64) -> Result<(TargetSize, Arc<Surface>, u64)> {
        let target = TargetSize::from_kb(target_kb)?;
        let surface = self.surface.clone().ok_or(CompressError::NoImage)?;
        let original_size = self
            .source
            .as_ref()
            .map(|s| s.original_size())
            .unwrap_or_default();
        Ok((target, surface, original_size))
    }

    fn next_options(&mut self) -> SearchOptions {
        self.cancel();
        let options = SearchOptions {
            attempt_delay: self.attempt_delay,
            cancel: CancelToken::new(),
        };
        self.running = Some(options.cancel.clone());
        options
    }

    /// Runs a compression on the calling thread and keeps its outcome.
    pub fn compress(
        &mut self,
        target_kb: i64,
        strategy: Strategy,
        on_progress: &mut dyn FnMut(Progress),
    ) -> Result<&CompressionOutcome> {
        let (target, surface, original_size) = self.prepare(target_kb)?;
        let options = self.next_options();
        self.outcome = None;

        let outcome = compress(
            &*self.encoder,
            &surface,
            original_size,
            target,
            strategy,
            &options,
            on_progress,
        );
        self.running = None;

        let outcome = outcome?;
        info!(
            "compressed to {} bytes ({} reduction) with {}",
            outcome.final_size(),
            outcome.reduction_label(),
            strategy
        );
        Ok(self.outcome.insert(outcome))
    }

    /// Cancels the in-flight run, if any.
    pub fn cancel(&mut self) {
        if let Some(token) = self.running.take() {
            debug!("cancelling in-flight compression");
            token.cancel();
        }
    }

    /// Keeps the outcome of a finished background run.
    ///
    /// A run superseded by a newer run, a crop change or a new image
    /// ends in `Cancelled` and leaves the session untouched.
    pub fn finish(&mut self, handle: RunHandle) -> Result<&CompressionOutcome> {
        let current = self
            .running
            .as_ref()
            .is_some_and(|token| token.same_run(&handle.cancel));
        let cancel = handle.cancel.clone();
        let outcome = handle.join();
        let cancelled = cancel.is_cancelled();

        if current {
            self.running = None;
        }
        if !current || cancelled {
            debug!("dropping result of a superseded compression");
            return Err(CompressError::Cancelled);
        }
        Ok(self.outcome.insert(outcome?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.outcome
            .as_ref()
            .ok_or(CompressError::NoOutcome)?
            .save(path)
    }
}

impl<E: Encoder + Send + Sync + 'static> Session<E> {
    /// Starts a compression on a worker thread, superseding any run still
    /// in flight.
    pub fn start<F>(
        &mut self,
        target_kb: i64,
        strategy: Strategy,
        mut on_progress: F,
    ) -> Result<RunHandle>
    where
        F: FnMut(Progress) + Send + 'static,
    {
        let (target, surface, original_size) = self.prepare(target_kb)?;
        let options = self.next_options();
        self.outcome = None;

        let encoder = Arc::clone(&self.encoder);
        let cancel = options.cancel.clone();
        let handle = thread::Builder::new()
            .name("compress".to_string())
            .spawn(move || {
                compress(
                    &*encoder,
                    &surface,
                    original_size,
                    target,
                    strategy,
                    &options,
                    &mut on_progress,
                )
            })?;

        Ok(RunHandle { cancel, handle })
    }
}
