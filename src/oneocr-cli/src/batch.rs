//! Directory batch OCR: one output file per input image

use anyhow::{Context, Result};
use oneocr_engine::{NativeApi, OcrEngine, RecognitionResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{BatchConfig, OutputFormat};

/// Anything that can turn an image file into a recognition result.
pub trait Recognizer {
    fn recognize_file(&self, path: &Path) -> oneocr_engine::Result<RecognitionResult>;
}

impl<A: NativeApi> Recognizer for OcrEngine<A> {
    fn recognize_file(&self, path: &Path) -> oneocr_engine::Result<RecognitionResult> {
        self.recognize_path(path)
    }
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Create `dir` if missing. Returns true when it was created.
pub fn ensure_dir(dir: &Path) -> Result<bool> {
    if dir.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create directory {:?}", dir))?;
    Ok(true)
}

/// Image files in `dir` with an accepted extension, sorted by file name.
pub fn find_images(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("failed to read directory {:?}", dir))?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let accepted = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if accepted {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Serialize a result in the requested format.
pub fn render(result: &RecognitionResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(result.text()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
    }
}

/// Output path for `image` in `dest_dir`.
pub fn output_path(image: &Path, dest_dir: &Path, format: OutputFormat) -> PathBuf {
    let mut name = image.file_stem().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(format.extension());
    dest_dir.join(name)
}

/// Runs a recognizer over every image in a directory
pub struct BatchRunner<'a, R: Recognizer> {
    recognizer: &'a R,
    config: BatchConfig,
    running: Arc<AtomicBool>,
}

impl<'a, R: Recognizer> BatchRunner<'a, R> {
    pub fn new(recognizer: &'a R, config: BatchConfig) -> Self {
        Self {
            recognizer,
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Stop flag checked between images
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    /// Process `images`, writing results into the destination directory.
    ///
    /// A failing image is logged and counted; the batch continues.
    pub fn run(&self, images: &[PathBuf]) -> Result<BatchSummary> {
        ensure_dir(&self.config.dest_dir)?;

        let mut summary = BatchSummary::default();
        let started = Instant::now();

        for (i, image) in images.iter().enumerate() {
            if !self.running.load(Ordering::Relaxed) {
                warn!("batch interrupted, {} image(s) left", images.len() - i);
                summary.skipped = images.len() - i;
                break;
            }

            match self.process_one(image) {
                Ok(out) => {
                    summary.processed += 1;
                    info!("processed image: {:?} -> {:?}", image, out);
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("failed to process {:?}: {:#}", image, e);
                }
            }
        }

        info!(
            "batch done in {:.1}s: {} processed, {} failed, {} skipped",
            started.elapsed().as_secs_f64(),
            summary.processed,
            summary.failed,
            summary.skipped
        );
        Ok(summary)
    }

    fn process_one(&self, image: &Path) -> Result<PathBuf> {
        let result = self
            .recognizer
            .recognize_file(image)
            .with_context(|| format!("OCR failed for {:?}", image))?;
        debug!(
            "{:?}: {} line(s), {} word(s)",
            image,
            result.lines.len(),
            result.word_count()
        );

        let out = output_path(image, &self.config.dest_dir, self.config.format);
        std::fs::write(&out, render(&result, self.config.format)?)
            .with_context(|| format!("failed to write {:?}", out))?;
        Ok(out)
    }
}
