//! Binary contract with the native OneOCR library
//!
//! Everything in this module mirrors memory the native side reads or writes.
//! Field order, sizes and alignment of [`RawImage`] and [`RawBoundingBox`]
//! are not checked by any compiler across the language boundary: a mismatch
//! corrupts memory silently instead of failing. Do not reorder or resize
//! fields without verifying against the native library, and bump
//! [`LAYOUT_VERSION`] when the contract changes.

use std::ffi::c_char;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{align_of, offset_of, size_of};

use crate::error::InitError;

/// Version of the struct layout contract below.
pub const LAYOUT_VERSION: u32 = 1;

/// Pixel format tag for 32bpp ARGB (B, G, R, A bytes in memory).
pub const FORMAT_ARGB32: i32 = 3;

/// Status code returned by every native call. Zero is success; any other
/// value is a failure with no further detail available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i64);

impl Status {
    pub const OK: Status = Status(0);

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Convert into a `Result`, keeping the raw code as the error.
    pub fn check(self) -> std::result::Result<(), Status> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a single native call.
pub type NativeResult<T> = std::result::Result<T, Status>;

/// Marker types naming what a [`Handle`] refers to.
pub mod kind {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum InitOptions {}
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Pipeline {}
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum ProcessOptions {}
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Instance {}
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Line {}
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Word {}
}

/// Opaque 64-bit handle produced by the native library.
///
/// The ABI is untyped; the phantom kind keeps a line handle from being
/// passed where an instance handle is expected. Handles are never
/// dereferenced on this side, only handed back to the library.
///
/// Only this crate can turn an integer into a handle:
///
/// ```compile_fail
/// use oneocr_engine::ffi::{kind, Handle};
///
/// let forged = Handle::<kind::Instance>::from_raw(0x4141_4141);
/// ```
///
/// and every call that hands one back to the library is `unsafe`:
///
/// ```compile_fail
/// use oneocr_engine::ffi::{kind, Handle, NativeApi};
///
/// fn count_lines<A: NativeApi>(api: &A) {
///     let _ = api.line_count(Handle::<kind::Instance>::NULL);
/// }
/// ```
pub struct Handle<K> {
    raw: i64,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    pub const NULL: Self = Self::from_raw(0);

    pub(crate) const fn from_raw(raw: i64) -> Self {
        Self {
            raw,
            _kind: PhantomData,
        }
    }

    pub const fn raw(self) -> i64 {
        self.raw
    }

    pub const fn is_null(self) -> bool {
        self.raw == 0
    }
}

// Manual impls: derives would put bounds on `K`.
impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K> Eq for Handle<K> {}

impl<K> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = std::any::type_name::<K>().rsplit("::").next().unwrap_or("?");
        write!(f, "Handle<{}>({:#x})", name, self.raw)
    }
}

/// Native image descriptor.
///
/// Non-owning: `data` must stay valid and unmoved for the whole native call.
/// Only built through [`crate::bitmap::PixelLock`], which holds an exclusive
/// borrow of the pixel buffer while the descriptor exists.
#[repr(C)]
#[derive(Debug)]
pub struct RawImage {
    pub format: i32,
    pub width: i32,
    pub height: i32,
    pub reserved: i32,
    pub stride: i64,
    pub data: *const u8,
}

/// Quadrilateral as laid out by the native library: four corners, no padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawBoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub x3: f32,
    pub y3: f32,
    pub x4: f32,
    pub y4: f32,
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(size_of::<RawImage>() == 32);
    assert!(offset_of!(RawImage, stride) == 16);
    assert!(offset_of!(RawImage, data) == 24);
    assert!(size_of::<RawBoundingBox>() == 32);
};

/// Re-check the layout contract at runtime.
///
/// The compile-time assertions above only cover 64-bit targets; this also
/// guards 32-bit builds, where the library's pointer-sized trailing field
/// would shift the descriptor size.
pub fn verify_layout() -> std::result::Result<(), InitError> {
    let checks: [(&str, usize, usize); 8] = [
        ("RawImage.format", offset_of!(RawImage, format), 0),
        ("RawImage.width", offset_of!(RawImage, width), 4),
        ("RawImage.height", offset_of!(RawImage, height), 8),
        ("RawImage.reserved", offset_of!(RawImage, reserved), 12),
        ("RawImage.stride", offset_of!(RawImage, stride), 16),
        ("RawImage.data", offset_of!(RawImage, data), 24),
        ("RawBoundingBox", size_of::<RawBoundingBox>(), 8 * size_of::<f32>()),
        ("RawBoundingBox.align", align_of::<RawBoundingBox>(), align_of::<f32>()),
    ];

    for (field, actual, expected) in checks {
        if actual != expected {
            return Err(InitError::LayoutMismatch(format!(
                "{} is {} (expected {}) in layout v{}",
                field, actual, expected, LAYOUT_VERSION
            )));
        }
    }

    if size_of::<RawImage>() != 24 + size_of::<*const u8>() {
        return Err(InitError::LayoutMismatch(format!(
            "RawImage is {} bytes in layout v{}",
            size_of::<RawImage>(),
            LAYOUT_VERSION
        )));
    }

    Ok(())
}

// Raw signatures of the exported C functions.
pub(crate) type CreateOcrInitOptionsFn = unsafe extern "C" fn(ctx: *mut i64) -> i64;
pub(crate) type OcrInitOptionsSetUseModelDelayLoadFn = unsafe extern "C" fn(ctx: i64, flag: u8) -> i64;
pub(crate) type CreateOcrPipelineFn = unsafe extern "C" fn(
    model_path: *const c_char,
    key: *const c_char,
    ctx: i64,
    pipeline: *mut i64,
) -> i64;
pub(crate) type CreateOcrProcessOptionsFn = unsafe extern "C" fn(opt: *mut i64) -> i64;
pub(crate) type OcrProcessOptionsSetMaxRecognitionLineCountFn =
    unsafe extern "C" fn(opt: i64, count: i64) -> i64;
pub(crate) type RunOcrPipelineFn =
    unsafe extern "C" fn(pipeline: i64, img: *const RawImage, opt: i64, instance: *mut i64) -> i64;
pub(crate) type GetOcrLineCountFn = unsafe extern "C" fn(instance: i64, count: *mut i64) -> i64;
pub(crate) type GetOcrLineFn = unsafe extern "C" fn(instance: i64, index: i64, line: *mut i64) -> i64;
pub(crate) type GetOcrContentFn = unsafe extern "C" fn(node: i64, content: *mut *const c_char) -> i64;
pub(crate) type GetOcrBoundingBoxFn =
    unsafe extern "C" fn(node: i64, bbox: *mut *const RawBoundingBox) -> i64;
pub(crate) type GetOcrLineWordCountFn = unsafe extern "C" fn(line: i64, count: *mut i64) -> i64;
pub(crate) type GetOcrWordFn = unsafe extern "C" fn(line: i64, index: i64, word: *mut i64) -> i64;

/// The native API surface, one method per exported function.
///
/// This is the seam between the safe engine and whatever implements the
/// C ABI: [`crate::OneOcrLibrary`] in production, a scripted fake in tests.
///
/// Every method that takes a [`Handle`] is `unsafe`: the library treats the
/// value as an internal pointer, so a forged or stale handle is undefined
/// behaviour on the native side.
///
/// # Safety
///
/// Implementors must return text and bounding-box pointers that are either
/// null or valid for reads (a NUL-terminated string, or one
/// [`RawBoundingBox`]) until the instance that produced them is abandoned,
/// and `run_pipeline` must only read `height * stride` bytes from
/// `image.data`.
pub unsafe trait NativeApi: Send + Sync {
    fn create_init_options(&self) -> NativeResult<Handle<kind::InitOptions>>;

    /// # Safety
    ///
    /// `ctx` must come from `create_init_options` on this same API.
    unsafe fn set_use_model_delay_load(
        &self,
        ctx: Handle<kind::InitOptions>,
        delay: bool,
    ) -> NativeResult<()>;

    /// # Safety
    ///
    /// `ctx` must come from `create_init_options` on this same API.
    unsafe fn create_pipeline(
        &self,
        model_path: &std::ffi::CStr,
        key: &std::ffi::CStr,
        ctx: Handle<kind::InitOptions>,
    ) -> NativeResult<Handle<kind::Pipeline>>;

    fn create_process_options(&self) -> NativeResult<Handle<kind::ProcessOptions>>;

    /// # Safety
    ///
    /// `options` must come from `create_process_options` on this same API.
    unsafe fn set_max_recognition_line_count(
        &self,
        options: Handle<kind::ProcessOptions>,
        count: i64,
    ) -> NativeResult<()>;

    /// # Safety
    ///
    /// `pipeline` and `options` must come from this same API.
    /// `image.data` must point to at least `image.height * image.stride`
    /// readable bytes that stay valid and unmoved until this returns.
    unsafe fn run_pipeline(
        &self,
        pipeline: Handle<kind::Pipeline>,
        image: &RawImage,
        options: Handle<kind::ProcessOptions>,
    ) -> NativeResult<Handle<kind::Instance>>;

    /// # Safety
    ///
    /// `instance` must be non-null and come from `run_pipeline` on this same
    /// API, within the recognition call that produced it.
    unsafe fn line_count(&self, instance: Handle<kind::Instance>) -> NativeResult<i64>;

    /// # Safety
    ///
    /// Same contract as [`NativeApi::line_count`].
    unsafe fn line(
        &self,
        instance: Handle<kind::Instance>,
        index: i64,
    ) -> NativeResult<Handle<kind::Line>>;

    /// # Safety
    ///
    /// `line` must be non-null and come from [`NativeApi::line`] for an
    /// instance that is still live.
    unsafe fn line_content(&self, line: Handle<kind::Line>) -> NativeResult<*const c_char>;

    /// # Safety
    ///
    /// Same contract as [`NativeApi::line_content`].
    unsafe fn line_bounding_box(
        &self,
        line: Handle<kind::Line>,
    ) -> NativeResult<*const RawBoundingBox>;

    /// # Safety
    ///
    /// Same contract as [`NativeApi::line_content`].
    unsafe fn line_word_count(&self, line: Handle<kind::Line>) -> NativeResult<i64>;

    /// # Safety
    ///
    /// Same contract as [`NativeApi::line_content`].
    unsafe fn word(&self, line: Handle<kind::Line>, index: i64) -> NativeResult<Handle<kind::Word>>;

    /// # Safety
    ///
    /// `word` must be non-null and come from [`NativeApi::word`] for an
    /// instance that is still live.
    unsafe fn word_content(&self, word: Handle<kind::Word>) -> NativeResult<*const c_char>;

    /// # Safety
    ///
    /// Same contract as [`NativeApi::word_content`].
    unsafe fn word_bounding_box(
        &self,
        word: Handle<kind::Word>,
    ) -> NativeResult<*const RawBoundingBox>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_contract_holds() {
        assert!(verify_layout().is_ok());
    }

    #[test]
    fn test_descriptor_field_offsets() {
        assert_eq!(offset_of!(RawImage, reserved), 12);
        assert_eq!(offset_of!(RawImage, stride), 16);
        assert_eq!(offset_of!(RawImage, data), 24);
    }

    #[test]
    fn test_status_check() {
        assert!(Status::OK.check().is_ok());
        assert_eq!(Status(-5).check(), Err(Status(-5)));
        assert_eq!(Status(7).to_string(), "7");
    }

    #[test]
    fn test_handle_null_and_debug() {
        let line: Handle<kind::Line> = Handle::from_raw(0x2a);
        assert!(!line.is_null());
        assert!(Handle::<kind::Word>::NULL.is_null());
        assert_eq!(format!("{:?}", line), "Handle<Line>(0x2a)");
    }
}
