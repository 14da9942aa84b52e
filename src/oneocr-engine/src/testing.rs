//! Scripted in-process stand-in for the native library

use std::ffi::{c_char, CStr, CString};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::ffi::{kind, Handle, NativeApi, NativeResult, RawBoundingBox, RawImage, Status};

const INSTANCE: i64 = 0x1000;
const PIPELINE: i64 = 0x20;
const PROCESS_OPTIONS: i64 = 0x30;
const INIT_OPTIONS: i64 = 0x40;

pub struct FakeWord {
    text: Option<CString>,
    bbox: RawBoundingBox,
    null_handle: bool,
    null_box: bool,
    handle_status: Status,
    content_status: Status,
    box_status: Status,
}

impl FakeWord {
    pub fn new(text: &str, bbox: RawBoundingBox) -> Self {
        Self {
            text: Some(CString::new(text).unwrap()),
            bbox,
            null_handle: false,
            null_box: false,
            handle_status: Status::OK,
            content_status: Status::OK,
            box_status: Status::OK,
        }
    }

    pub fn null_handle(mut self) -> Self {
        self.null_handle = true;
        self
    }

    pub fn null_box(mut self) -> Self {
        self.null_box = true;
        self
    }

    pub fn handle_status(mut self, status: Status) -> Self {
        self.handle_status = status;
        self
    }

    pub fn content_status(mut self, status: Status) -> Self {
        self.content_status = status;
        self
    }

    pub fn box_status(mut self, status: Status) -> Self {
        self.box_status = status;
        self
    }
}

pub struct FakeLine {
    text: Option<CString>,
    bbox: RawBoundingBox,
    words: Vec<FakeWord>,
    null_handle: bool,
    null_box: bool,
    handle_status: Status,
    content_status: Status,
    box_status: Status,
    word_count_status: Status,
}

impl FakeLine {
    pub fn new(text: &str, bbox: RawBoundingBox) -> Self {
        Self::from_bytes(text.as_bytes(), bbox)
    }

    pub fn from_bytes(text: &[u8], bbox: RawBoundingBox) -> Self {
        Self {
            text: Some(CString::new(text).unwrap()),
            bbox,
            words: Vec::new(),
            null_handle: false,
            null_box: false,
            handle_status: Status::OK,
            content_status: Status::OK,
            box_status: Status::OK,
            word_count_status: Status::OK,
        }
    }

    pub fn word(mut self, word: FakeWord) -> Self {
        self.words.push(word);
        self
    }

    pub fn null_handle(mut self) -> Self {
        self.null_handle = true;
        self
    }

    pub fn null_text(mut self) -> Self {
        self.text = None;
        self
    }

    pub fn null_box(mut self) -> Self {
        self.null_box = true;
        self
    }

    pub fn handle_status(mut self, status: Status) -> Self {
        self.handle_status = status;
        self
    }

    pub fn content_status(mut self, status: Status) -> Self {
        self.content_status = status;
        self
    }

    pub fn box_status(mut self, status: Status) -> Self {
        self.box_status = status;
        self
    }

    pub fn word_count_status(mut self, status: Status) -> Self {
        self.word_count_status = status;
        self
    }
}

/// Descriptor values and pixel bytes seen by the last pipeline run.
#[derive(Debug, Clone)]
pub struct SeenImage {
    pub format: i32,
    pub width: i32,
    pub height: i32,
    pub stride: i64,
    pub pixels: Vec<u8>,
}

#[derive(Default)]
pub struct FakeApi {
    lines: Vec<FakeLine>,
    line_count_status: Option<Status>,
    run_failures: AtomicUsize,
    fail_call: Option<&'static str>,
    run_delay: Duration,
    pub pipelines_created: AtomicUsize,
    pub runs: AtomicUsize,
    active_runs: AtomicUsize,
    pub max_concurrent_runs: AtomicUsize,
    pub max_line_count: Mutex<Option<i64>>,
    pub delay_load: Mutex<Option<bool>>,
    pub model_args: Mutex<Option<(String, String)>>,
    pub last_image: Mutex<Option<SeenImage>>,
}

impl FakeApi {
    pub fn with_lines(lines: Vec<FakeLine>) -> Self {
        Self {
            lines,
            ..Self::default()
        }
    }

    pub fn line_count_status(mut self, status: Status) -> Self {
        self.line_count_status = Some(status);
        self
    }

    /// Fail the next `count` pipeline runs with status 5.
    pub fn fail_runs(self, count: usize) -> Self {
        self.run_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Make the named native call return a failure status.
    pub fn fail_on(mut self, call: &'static str) -> Self {
        self.fail_call = Some(call);
        self
    }

    pub fn run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = delay;
        self
    }

    pub fn instance_for_test(&self) -> Handle<kind::Instance> {
        Handle::from_raw(INSTANCE)
    }

    fn check(&self, call: &'static str) -> NativeResult<()> {
        if self.fail_call == Some(call) {
            Err(Status(1))
        } else {
            Ok(())
        }
    }

    fn line_at(&self, line: Handle<kind::Line>) -> NativeResult<&FakeLine> {
        usize::try_from(line.raw() - 1)
            .ok()
            .and_then(|i| self.lines.get(i))
            .ok_or(Status(-1))
    }

    fn word_at(&self, word: Handle<kind::Word>) -> NativeResult<&FakeWord> {
        let line = self.line_at(Handle::from_raw(word.raw() >> 16))?;
        usize::try_from((word.raw() & 0xffff) - 1)
            .ok()
            .and_then(|i| line.words.get(i))
            .ok_or(Status(-1))
    }
}

fn text_ptr(text: &Option<CString>) -> *const c_char {
    text.as_ref().map_or(std::ptr::null(), |t| t.as_ptr())
}

unsafe impl NativeApi for FakeApi {
    fn create_init_options(&self) -> NativeResult<Handle<kind::InitOptions>> {
        self.check("CreateOcrInitOptions")?;
        Ok(Handle::from_raw(INIT_OPTIONS))
    }

    unsafe fn set_use_model_delay_load(
        &self,
        ctx: Handle<kind::InitOptions>,
        delay: bool,
    ) -> NativeResult<()> {
        self.check("OcrInitOptionsSetUseModelDelayLoad")?;
        assert_eq!(ctx.raw(), INIT_OPTIONS);
        *self.delay_load.lock().unwrap() = Some(delay);
        Ok(())
    }

    unsafe fn create_pipeline(
        &self,
        model_path: &CStr,
        key: &CStr,
        ctx: Handle<kind::InitOptions>,
    ) -> NativeResult<Handle<kind::Pipeline>> {
        self.check("CreateOcrPipeline")?;
        assert_eq!(ctx.raw(), INIT_OPTIONS);
        self.pipelines_created.fetch_add(1, Ordering::SeqCst);
        *self.model_args.lock().unwrap() = Some((
            model_path.to_string_lossy().into_owned(),
            key.to_string_lossy().into_owned(),
        ));
        Ok(Handle::from_raw(PIPELINE))
    }

    fn create_process_options(&self) -> NativeResult<Handle<kind::ProcessOptions>> {
        self.check("CreateOcrProcessOptions")?;
        Ok(Handle::from_raw(PROCESS_OPTIONS))
    }

    unsafe fn set_max_recognition_line_count(
        &self,
        options: Handle<kind::ProcessOptions>,
        count: i64,
    ) -> NativeResult<()> {
        self.check("OcrProcessOptionsSetMaxRecognitionLineCount")?;
        assert_eq!(options.raw(), PROCESS_OPTIONS);
        *self.max_line_count.lock().unwrap() = Some(count);
        Ok(())
    }

    unsafe fn run_pipeline(
        &self,
        pipeline: Handle<kind::Pipeline>,
        image: &RawImage,
        options: Handle<kind::ProcessOptions>,
    ) -> NativeResult<Handle<kind::Instance>> {
        assert_eq!(pipeline.raw(), PIPELINE);
        assert_eq!(options.raw(), PROCESS_OPTIONS);
        assert!(image.stride > 0, "negative stride reached the native call");

        let active = self.active_runs.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_runs.fetch_max(active, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);

        let len = image.height as usize * image.stride as usize;
        let pixels = std::slice::from_raw_parts(image.data, len).to_vec();
        *self.last_image.lock().unwrap() = Some(SeenImage {
            format: image.format,
            width: image.width,
            height: image.height,
            stride: image.stride,
            pixels,
        });

        if !self.run_delay.is_zero() {
            std::thread::sleep(self.run_delay);
        }
        self.active_runs.fetch_sub(1, Ordering::SeqCst);

        let failing = self
            .run_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Status(5));
        }
        Ok(Handle::from_raw(INSTANCE))
    }

    unsafe fn line_count(&self, instance: Handle<kind::Instance>) -> NativeResult<i64> {
        assert_eq!(instance.raw(), INSTANCE);
        if let Some(status) = self.line_count_status {
            return Err(status);
        }
        Ok(self.lines.len() as i64)
    }

    unsafe fn line(&self, instance: Handle<kind::Instance>, index: i64) -> NativeResult<Handle<kind::Line>> {
        assert_eq!(instance.raw(), INSTANCE);
        let line = &self.lines[index as usize];
        line.handle_status.check()?;
        if line.null_handle {
            return Ok(Handle::NULL);
        }
        Ok(Handle::from_raw(index + 1))
    }

    unsafe fn line_content(&self, line: Handle<kind::Line>) -> NativeResult<*const c_char> {
        let line = self.line_at(line)?;
        line.content_status.check()?;
        Ok(text_ptr(&line.text))
    }

    unsafe fn line_bounding_box(&self, line: Handle<kind::Line>) -> NativeResult<*const RawBoundingBox> {
        let line = self.line_at(line)?;
        line.box_status.check()?;
        if line.null_box {
            return Ok(std::ptr::null());
        }
        Ok(&line.bbox as *const RawBoundingBox)
    }

    unsafe fn line_word_count(&self, line: Handle<kind::Line>) -> NativeResult<i64> {
        let line = self.line_at(line)?;
        line.word_count_status.check()?;
        Ok(line.words.len() as i64)
    }

    unsafe fn word(&self, line: Handle<kind::Line>, index: i64) -> NativeResult<Handle<kind::Word>> {
        let fake = self.line_at(line)?;
        let word = &fake.words[index as usize];
        word.handle_status.check()?;
        if word.null_handle {
            return Ok(Handle::NULL);
        }
        Ok(Handle::from_raw((line.raw() << 16) | (index + 1)))
    }

    unsafe fn word_content(&self, word: Handle<kind::Word>) -> NativeResult<*const c_char> {
        let word = self.word_at(word)?;
        word.content_status.check()?;
        Ok(text_ptr(&word.text))
    }

    unsafe fn word_bounding_box(&self, word: Handle<kind::Word>) -> NativeResult<*const RawBoundingBox> {
        let word = self.word_at(word)?;
        word.box_status.check()?;
        if word.null_box {
            return Ok(std::ptr::null());
        }
        Ok(&word.bbox as *const RawBoundingBox)
    }
}
