//! Runtime loading of the OneOCR shared library

use std::ffi::{c_char, CStr};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::InitError;
use crate::ffi::{
    kind, CreateOcrInitOptionsFn, CreateOcrPipelineFn, CreateOcrProcessOptionsFn,
    GetOcrBoundingBoxFn, GetOcrContentFn, GetOcrLineCountFn, GetOcrLineFn, GetOcrLineWordCountFn,
    GetOcrWordFn, Handle, NativeApi, NativeResult, OcrInitOptionsSetUseModelDelayLoadFn,
    OcrProcessOptionsSetMaxRecognitionLineCountFn, RawBoundingBox, RawImage, RunOcrPipelineFn,
    Status,
};

/// File name of the native library on this platform (`oneocr.dll` on Windows).
pub fn default_library_name() -> std::ffi::OsString {
    libloading::library_filename("oneocr")
}

/// Loaded OneOCR library with every exported function resolved.
pub struct OneOcrLibrary {
    path: PathBuf,
    create_init_options: CreateOcrInitOptionsFn,
    set_use_model_delay_load: OcrInitOptionsSetUseModelDelayLoadFn,
    create_pipeline: CreateOcrPipelineFn,
    create_process_options: CreateOcrProcessOptionsFn,
    set_max_recognition_line_count: OcrProcessOptionsSetMaxRecognitionLineCountFn,
    run_pipeline: RunOcrPipelineFn,
    get_line_count: GetOcrLineCountFn,
    get_line: GetOcrLineFn,
    get_line_content: GetOcrContentFn,
    get_line_bounding_box: GetOcrBoundingBoxFn,
    get_line_word_count: GetOcrLineWordCountFn,
    get_word: GetOcrWordFn,
    get_word_content: GetOcrContentFn,
    get_word_bounding_box: GetOcrBoundingBoxFn,
    // Keeps the function pointers above valid; must outlive them.
    _lib: libloading::Library,
}

// Safety: the struct only holds function pointers into `_lib`, which it owns.
// Thread-safety of concurrent calls is a property of the native library;
// the engine serializes pipeline runs unless configured otherwise.
unsafe impl Send for OneOcrLibrary {}
unsafe impl Sync for OneOcrLibrary {}

impl OneOcrLibrary {
    /// Load the library at `path` and resolve all symbols eagerly.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InitError> {
        let path = path.as_ref();
        debug!("loading native OCR library from {:?}", path);

        if !path.exists() {
            return Err(InitError::LibraryNotFound {
                path: path.to_path_buf(),
                message: "file does not exist".to_string(),
            });
        }

        // Safety: loading runs the library's initializers. We trust the file
        // deployed next to the executable to be the OneOCR library.
        let lib = unsafe { libloading::Library::new(path) }.map_err(|e| {
            InitError::LibraryNotFound {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        // Safety: each symbol is read with the signature documented for the
        // OneOCR C API in `ffi`.
        unsafe {
            Ok(Self {
                path: path.to_path_buf(),
                create_init_options: symbol(&lib, b"CreateOcrInitOptions\0")?,
                set_use_model_delay_load: symbol(&lib, b"OcrInitOptionsSetUseModelDelayLoad\0")?,
                create_pipeline: symbol(&lib, b"CreateOcrPipeline\0")?,
                create_process_options: symbol(&lib, b"CreateOcrProcessOptions\0")?,
                set_max_recognition_line_count: symbol(
                    &lib,
                    b"OcrProcessOptionsSetMaxRecognitionLineCount\0",
                )?,
                run_pipeline: symbol(&lib, b"RunOcrPipeline\0")?,
                get_line_count: symbol(&lib, b"GetOcrLineCount\0")?,
                get_line: symbol(&lib, b"GetOcrLine\0")?,
                get_line_content: symbol(&lib, b"GetOcrLineContent\0")?,
                get_line_bounding_box: symbol(&lib, b"GetOcrLineBoundingBox\0")?,
                get_line_word_count: symbol(&lib, b"GetOcrLineWordCount\0")?,
                get_word: symbol(&lib, b"GetOcrWord\0")?,
                get_word_content: symbol(&lib, b"GetOcrWordContent\0")?,
                get_word_bounding_box: symbol(&lib, b"GetOcrWordBoundingBox\0")?,
                _lib: lib,
            })
        }
    }

    /// Path the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Resolve one exported function, copying the pointer out of the `Symbol`.
unsafe fn symbol<T: Copy>(lib: &libloading::Library, name: &'static [u8]) -> Result<T, InitError> {
    let symbol = lib.get::<T>(name).map_err(|e| InitError::MissingSymbol {
        symbol: String::from_utf8_lossy(&name[..name.len() - 1]).into_owned(),
        message: e.to_string(),
    })?;
    Ok(*symbol)
}

/// Call a native function that writes one value through an out-pointer.
fn out_call<T: Default>(call: impl FnOnce(*mut T) -> i64) -> NativeResult<T> {
    let mut value = T::default();
    Status(call(&mut value)).check()?;
    Ok(value)
}

fn out_ptr_call<T>(call: impl FnOnce(*mut *const T) -> i64) -> NativeResult<*const T> {
    let mut ptr: *const T = std::ptr::null();
    Status(call(&mut ptr)).check()?;
    Ok(ptr)
}

// Safety: every pointer returned here comes straight from the library, which
// keeps line and word data alive as long as the owning instance. Handles are
// passed through untouched; their validity is the caller's contract.
unsafe impl NativeApi for OneOcrLibrary {
    fn create_init_options(&self) -> NativeResult<Handle<kind::InitOptions>> {
        out_call(|out| unsafe { (self.create_init_options)(out) }).map(Handle::from_raw)
    }

    unsafe fn set_use_model_delay_load(
        &self,
        ctx: Handle<kind::InitOptions>,
        delay: bool,
    ) -> NativeResult<()> {
        Status(unsafe { (self.set_use_model_delay_load)(ctx.raw(), u8::from(delay)) }).check()
    }

    unsafe fn create_pipeline(
        &self,
        model_path: &CStr,
        key: &CStr,
        ctx: Handle<kind::InitOptions>,
    ) -> NativeResult<Handle<kind::Pipeline>> {
        out_call(|out| unsafe {
            (self.create_pipeline)(model_path.as_ptr(), key.as_ptr(), ctx.raw(), out)
        })
        .map(Handle::from_raw)
    }

    fn create_process_options(&self) -> NativeResult<Handle<kind::ProcessOptions>> {
        out_call(|out| unsafe { (self.create_process_options)(out) }).map(Handle::from_raw)
    }

    unsafe fn set_max_recognition_line_count(
        &self,
        options: Handle<kind::ProcessOptions>,
        count: i64,
    ) -> NativeResult<()> {
        Status(unsafe { (self.set_max_recognition_line_count)(options.raw(), count) }).check()
    }

    unsafe fn run_pipeline(
        &self,
        pipeline: Handle<kind::Pipeline>,
        image: &RawImage,
        options: Handle<kind::ProcessOptions>,
    ) -> NativeResult<Handle<kind::Instance>> {
        out_call(|out| unsafe {
            (self.run_pipeline)(pipeline.raw(), image as *const RawImage, options.raw(), out)
        })
        .map(Handle::from_raw)
    }

    unsafe fn line_count(&self, instance: Handle<kind::Instance>) -> NativeResult<i64> {
        out_call(|out| unsafe { (self.get_line_count)(instance.raw(), out) })
    }

    unsafe fn line(&self, instance: Handle<kind::Instance>, index: i64) -> NativeResult<Handle<kind::Line>> {
        out_call(|out| unsafe { (self.get_line)(instance.raw(), index, out) }).map(Handle::from_raw)
    }

    unsafe fn line_content(&self, line: Handle<kind::Line>) -> NativeResult<*const c_char> {
        out_ptr_call(|out| unsafe { (self.get_line_content)(line.raw(), out) })
    }

    unsafe fn line_bounding_box(&self, line: Handle<kind::Line>) -> NativeResult<*const RawBoundingBox> {
        out_ptr_call(|out| unsafe { (self.get_line_bounding_box)(line.raw(), out) })
    }

    unsafe fn line_word_count(&self, line: Handle<kind::Line>) -> NativeResult<i64> {
        out_call(|out| unsafe { (self.get_line_word_count)(line.raw(), out) })
    }

    unsafe fn word(&self, line: Handle<kind::Line>, index: i64) -> NativeResult<Handle<kind::Word>> {
        out_call(|out| unsafe { (self.get_word)(line.raw(), index, out) }).map(Handle::from_raw)
    }

    unsafe fn word_content(&self, word: Handle<kind::Word>) -> NativeResult<*const c_char> {
        out_ptr_call(|out| unsafe { (self.get_word_content)(word.raw(), out) })
    }

    unsafe fn word_bounding_box(&self, word: Handle<kind::Word>) -> NativeResult<*const RawBoundingBox> {
        out_ptr_call(|out| unsafe { (self.get_word_bounding_box)(word.raw(), out) })
    }
}
