//! Safe Rust facade over the OneOCR native engine
//!
//! The native side is a closed-source C ABI shared library plus a
//! proprietary model file. This crate loads it, initializes one pipeline per
//! process, converts images into the layout the engine reads, and decodes
//! its handle tree into owned [`RecognitionResult`] values.
//!
//! ```no_run
//! let engine = oneocr_engine::initialize(oneocr_engine::EngineConfig::default())?;
//! let result = engine.recognize_path("scan.png")?;
//! println!("{}", result.text());
//! # Ok::<(), oneocr_engine::OcrError>(())
//! ```

pub mod bitmap;
mod config;
mod engine;
mod error;
mod extract;
pub mod ffi;
mod library;
mod models;

#[cfg(test)]
mod testing;

pub use bitmap::{normalize, normalize_raw, ArgbImage, PixelLayout, PixelLock, RawRaster};
pub use config::{
    executable_dir, EngineConfig, DEFAULT_MAX_LINE_COUNT, DEFAULT_MODEL_FILE, DEFAULT_MODEL_KEY,
};
pub use engine::{engine, initialize, EngineCell, OcrEngine};
pub use error::{InitError, OcrError, Result};
pub use ffi::{NativeApi, Status};
pub use library::{default_library_name, OneOcrLibrary};
pub use models::{BoundingBox, Line, RecognitionResult, Rect, Word};
