//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::InitError;

/// Key the native library needs to open the bundled `.onemodel` file.
/// Opaque; kept in sync with the model shipped next to the executable.
pub const DEFAULT_MODEL_KEY: &str = "kj)TGtrK>f]b[Piow.gU+nC@s\"\"\"\"\"\"4";

/// Default model file name, resolved next to the executable.
pub const DEFAULT_MODEL_FILE: &str = "oneocr.onemodel";

/// Upper bound on recognized lines per image.
pub const DEFAULT_MAX_LINE_COUNT: i64 = 1000;

/// Native engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to the native shared library
    pub library_path: PathBuf,

    /// Path to the proprietary model file
    pub model_path: PathBuf,

    /// Unlock key for the model file
    pub model_key: String,

    /// Maximum number of lines recognized per image
    pub max_line_count: i64,

    /// Load the model lazily on first recognition instead of at startup
    pub delay_load: bool,

    /// Serialize pipeline runs behind a single mutex
    pub serialize_calls: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let base = executable_dir();
        Self {
            library_path: base.join(crate::library::default_library_name()),
            model_path: base.join(DEFAULT_MODEL_FILE),
            model_key: DEFAULT_MODEL_KEY.to_string(),
            max_line_count: DEFAULT_MAX_LINE_COUNT,
            delay_load: false,
            serialize_calls: true,
        }
    }
}

impl EngineConfig {
    /// Default configuration with library and model looked up in `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            library_path: dir.join(crate::library::default_library_name()),
            model_path: dir.join(DEFAULT_MODEL_FILE),
            ..Self::default()
        }
    }

    /// Reject values the native library cannot take.
    pub fn validate(&self) -> Result<(), InitError> {
        if self.max_line_count <= 0 {
            return Err(InitError::InvalidConfig(format!(
                "max_line_count must be positive, got {}",
                self.max_line_count
            )));
        }
        if self.model_key.contains('\0') {
            return Err(InitError::InvalidConfig(
                "model_key contains a NUL byte".to_string(),
            ));
        }
        Ok(())
    }
}

/// Directory containing the running executable, or `.` if unknown.
pub fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
