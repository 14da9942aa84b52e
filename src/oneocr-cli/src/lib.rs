//! OneOCR command-line driver library
//!
//! Configuration, directory batch processing and logging for the `oneocr`
//! binary.

pub mod batch;
pub mod colored_logger;
pub mod config;
