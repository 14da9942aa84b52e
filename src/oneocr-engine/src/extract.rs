//! Walks the native result tree (instance → lines → words) into owned data
//!
//! Only the line count is load-bearing: if it cannot be read there is
//! nothing to return. Any single line or word that fails to resolve is
//! dropped and the walk continues, so the result is the subset that decoded
//! cleanly, in native order.

use std::ffi::{c_char, CStr};
use tracing::{debug, trace};

use crate::error::{OcrError, Result};
use crate::ffi::{kind, Handle, NativeApi, NativeResult, RawBoundingBox};
use crate::models::{BoundingBox, Line, RecognitionResult, Word};

/// Decode everything reachable from `instance`.
///
/// # Safety
///
/// `instance` must come from a pipeline run on `api` during the current
/// call, and must not have been abandoned yet.
pub(crate) unsafe fn extract<A: NativeApi + ?Sized>(
    api: &A,
    instance: Handle<kind::Instance>,
) -> Result<RecognitionResult> {
    let count = unsafe { api.line_count(instance) }
        .map_err(OcrError::native("GetOcrLineCount"))?
        .max(0);

    let mut lines = Vec::with_capacity(usize::try_from(count).unwrap_or(0).min(4096));
    for index in 0..count {
        let handle = match non_null(unsafe { api.line(instance, index) }) {
            Some(handle) => handle,
            None => {
                trace!("skipping line {}: no handle", index);
                continue;
            }
        };

        // Safety: `handle` is a non-null line of the live `instance`.
        match unsafe { extract_line(api, handle) } {
            Some(line) => lines.push(line),
            None => debug!("skipping line {}: content or bounding box unavailable", index),
        }
    }

    debug!("extracted {} of {} lines", lines.len(), count);
    Ok(RecognitionResult { lines })
}

unsafe fn extract_line<A: NativeApi + ?Sized>(api: &A, handle: Handle<kind::Line>) -> Option<Line> {
    let text = read_text(unsafe { api.line_content(handle) })?;
    let bounding_box = read_box(unsafe { api.line_bounding_box(handle) })?;
    Some(Line {
        text,
        bounding_box,
        words: unsafe { extract_words(api, handle) },
    })
}

unsafe fn extract_words<A: NativeApi + ?Sized>(api: &A, line: Handle<kind::Line>) -> Vec<Word> {
    let count = match unsafe { api.line_word_count(line) } {
        Ok(count) if count > 0 => count,
        Ok(_) => return Vec::new(),
        Err(status) => {
            trace!("word count unavailable (status {}), treating as empty", status);
            return Vec::new();
        }
    };

    let mut words = Vec::with_capacity(usize::try_from(count).unwrap_or(0).min(1024));
    for index in 0..count {
        let Some(handle) = non_null(unsafe { api.word(line, index) }) else {
            trace!("skipping word {}: no handle", index);
            continue;
        };

        // Safety: `handle` is a non-null word of a live line.
        let text = read_text(unsafe { api.word_content(handle) });
        let bounding_box = read_box(unsafe { api.word_bounding_box(handle) });
        match (text, bounding_box) {
            (Some(text), Some(bounding_box)) => words.push(Word { text, bounding_box }),
            _ => trace!("skipping word {}: content or bounding box unavailable", index),
        }
    }
    words
}

fn non_null<K>(handle: NativeResult<Handle<K>>) -> Option<Handle<K>> {
    handle.ok().filter(|handle| !handle.is_null())
}

/// `None` only when the call itself failed; a null pointer reads as empty
/// text and invalid UTF-8 is replaced, so the result is always valid.
fn read_text(ptr: NativeResult<*const c_char>) -> Option<String> {
    let ptr = ptr.ok()?;
    if ptr.is_null() {
        return Some(String::new());
    }
    // Safety: `NativeApi` guarantees non-null content pointers reference a
    // NUL-terminated string that lives as long as the instance.
    let text = unsafe { CStr::from_ptr(ptr) };
    Some(text.to_string_lossy().into_owned())
}

fn read_box(ptr: NativeResult<*const RawBoundingBox>) -> Option<BoundingBox> {
    let ptr = ptr.ok()?;
    if ptr.is_null() {
        return None;
    }
    // Safety: `NativeApi` guarantees non-null box pointers reference one
    // `RawBoundingBox`. The native side gives no alignment promise.
    let raw = unsafe { std::ptr::read_unaligned(ptr) };
    Some(BoundingBox::from(raw))
}
