use std::ffi::CString;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::bitmap::{self, ArgbImage, RawRaster};
use crate::config::EngineConfig;
use crate::error::{InitError, OcrError, Result};
use crate::extract::extract;
use crate::ffi::{kind, verify_layout, Handle, NativeApi, Status};
use crate::library::OneOcrLibrary;
use crate::models::RecognitionResult;

/// OneOCR engine: the loaded native API plus the pipeline and process
/// options created once at initialization and reused by every call.
pub struct OcrEngine<A: NativeApi = OneOcrLibrary> {
    api: A,
    pipeline: Handle<kind::Pipeline>,
    process_options: Handle<kind::ProcessOptions>,
    run_lock: Option<Mutex<()>>,
    config: EngineConfig,
}

impl OcrEngine<OneOcrLibrary> {
    /// Load the native library named in `config` and initialize it.
    pub fn new(config: EngineConfig) -> std::result::Result<Self, InitError> {
        config.validate()?;
        let api = OneOcrLibrary::load(&config.library_path)?;
        info!("loaded native OCR library from {:?}", api.path());
        Self::with_api(api, config)
    }
}

fn rejected(call: &'static str) -> impl FnOnce(Status) -> InitError {
    move |status| InitError::Rejected { call, status }
}

impl<A: NativeApi> OcrEngine<A> {
    /// Initialize an engine over an already loaded native API.
    pub fn with_api(api: A, config: EngineConfig) -> std::result::Result<Self, InitError> {
        verify_layout()?;
        config.validate()?;

        let model_path = c_string(&config.model_path)?;
        if !config.model_path.exists() {
            return Err(InitError::ModelNotFound(config.model_path.clone()));
        }
        let key = CString::new(config.model_key.as_str())
            .map_err(|e| InitError::InvalidConfig(format!("model key: {}", e)))?;

        info!("initializing OCR engine with model {:?}", config.model_path);

        let ctx = api
            .create_init_options()
            .map_err(rejected("CreateOcrInitOptions"))?;
        // Safety: `ctx` was just created by this API.
        unsafe { api.set_use_model_delay_load(ctx, config.delay_load) }
            .map_err(rejected("OcrInitOptionsSetUseModelDelayLoad"))?;
        let pipeline = unsafe { api.create_pipeline(&model_path, &key, ctx) }
            .map_err(rejected("CreateOcrPipeline"))?;

        let process_options = api
            .create_process_options()
            .map_err(rejected("CreateOcrProcessOptions"))?;
        // Safety: `process_options` was just created by this API.
        unsafe { api.set_max_recognition_line_count(process_options, config.max_line_count) }
            .map_err(rejected("OcrProcessOptionsSetMaxRecognitionLineCount"))?;

        debug!(
            "OCR engine initialized (pipeline {:?}, max lines {})",
            pipeline, config.max_line_count
        );

        Ok(Self {
            api,
            pipeline,
            process_options,
            run_lock: config.serialize_calls.then(|| Mutex::new(())),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn api(&self) -> &A {
        &self.api
    }

    /// Recognize text in any decoded image.
    pub fn recognize_image(&self, image: &DynamicImage) -> Result<RecognitionResult> {
        let mut argb = bitmap::normalize(image)?;
        self.recognize_argb(&mut argb)
    }

    /// Recognize text in a caller-owned raw buffer.
    pub fn recognize_raw(&self, raster: RawRaster<'_>) -> Result<RecognitionResult> {
        let mut argb = bitmap::normalize_raw(raster)?;
        self.recognize_argb(&mut argb)
    }

    /// Decode an image file and recognize its text.
    pub fn recognize_path(&self, path: impl AsRef<Path>) -> Result<RecognitionResult> {
        let bytes = std::fs::read(path.as_ref())?;
        let image = image::load_from_memory(&bytes)?;
        self.recognize_image(&image)
    }

    /// Run the pipeline on a canonical buffer and extract the result.
    ///
    /// A failure here affects only this call; the shared handles stay valid
    /// and the caller may retry.
    pub fn recognize_argb(&self, image: &mut ArgbImage) -> Result<RecognitionResult> {
        let _serialized = self.serialize();
        let instance = self.run_pipeline(image)?;
        // Safety: `instance` comes from the run above, on this API, and is
        // abandoned when this call returns. No other run can start while the
        // serialize guard is held.
        unsafe { extract(&self.api, instance) }
    }

    fn serialize(&self) -> Option<MutexGuard<'_, ()>> {
        self.run_lock
            .as_ref()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn run_pipeline(&self, image: &mut ArgbImage) -> Result<Handle<kind::Instance>> {
        let pixels = image.lock()?;
        debug!(
            "running OCR pipeline on {}x{} image",
            pixels.descriptor().width,
            pixels.descriptor().height
        );

        // Safety: the descriptor points into the buffer exclusively borrowed
        // by `pixels`, which is `height * stride` bytes and lives until the
        // end of this function.
        let instance = unsafe {
            self.api
                .run_pipeline(self.pipeline, pixels.descriptor(), self.process_options)
        }
        .map_err(OcrError::native("RunOcrPipeline"))?;

        Ok(instance)
    }
}

/// The library reads the model path as a narrow string in the system ANSI
/// code page, so only ASCII paths arrive intact.
fn c_string(path: &Path) -> std::result::Result<CString, InitError> {
    let text = path
        .to_str()
        .filter(|text| text.is_ascii())
        .ok_or_else(|| {
            InitError::InvalidConfig(format!(
                "model path {:?} must be ASCII; move the model to a plain ASCII directory",
                path
            ))
        })?;
    CString::new(text).map_err(|e| InitError::InvalidConfig(format!("model path: {}", e)))
}

/// Once-only holder for an engine.
///
/// The first `get_or_init` runs initialization under a mutex, so racing
/// first callers never create a second pipeline. The outcome, success or
/// failure, is kept and returned to every later caller.
pub struct EngineCell<A: NativeApi = OneOcrLibrary> {
    slot: Mutex<Option<std::result::Result<Arc<OcrEngine<A>>, InitError>>>,
}

impl<A: NativeApi> EngineCell<A> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub fn get_or_init(
        &self,
        init: impl FnOnce() -> std::result::Result<OcrEngine<A>, InitError>,
    ) -> std::result::Result<Arc<OcrEngine<A>>, InitError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = slot.as_ref() {
            debug!("OCR engine already initialized");
            return state.clone();
        }

        let state = init().map(Arc::new);
        if let Err(e) = &state {
            warn!("OCR engine initialization failed: {}", e);
        }
        *slot = Some(state.clone());
        state
    }

    /// Outcome of a previous initialization, if any.
    pub fn get(&self) -> Option<std::result::Result<Arc<OcrEngine<A>>, InitError>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<A: NativeApi> Default for EngineCell<A> {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: EngineCell = EngineCell::new();

/// Initialize the process-wide engine.
///
/// Idempotent: after the first call, `config` is ignored and the same engine
/// (or the same initialization error) is returned.
pub fn initialize(config: EngineConfig) -> Result<Arc<OcrEngine>> {
    Ok(GLOBAL.get_or_init(|| OcrEngine::new(config))?)
}

/// The process-wide engine created by [`initialize`].
pub fn engine() -> Result<Arc<OcrEngine>> {
    match GLOBAL.get() {
        Some(state) => Ok(state?),
        None => Err(OcrError::NotInitialized),
    }
}
