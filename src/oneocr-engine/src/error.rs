use std::path::PathBuf;

use thiserror::Error;

use crate::ffi::Status;

/// Fatal initialization failures. Clone so a failed global initialization
/// can be reported again on every later call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InitError {
    #[error("native OCR library not found at {path:?}: {message}")]
    LibraryNotFound { path: PathBuf, message: String },

    #[error("native OCR library is missing symbol {symbol}: {message}")]
    MissingSymbol { symbol: String, message: String },

    #[error("OCR model not found at {0:?}")]
    ModelNotFound(PathBuf),

    #[error("native OCR library rejected configuration: {call} returned status {status}")]
    Rejected { call: &'static str, status: Status },

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("native struct layout mismatch: {0}")]
    LayoutMismatch(String),
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("failed to initialize OCR engine: {0}")]
    Init(#[from] InitError),

    #[error("OCR engine has not been initialized")]
    NotInitialized,

    #[error("native call {call} failed with status {status}")]
    NativeCall { call: &'static str, status: Status },

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OcrError {
    pub(crate) fn native(call: &'static str) -> impl FnOnce(Status) -> OcrError {
        move |status| OcrError::NativeCall { call, status }
    }
}

pub type Result<T> = std::result::Result<T, OcrError>;
