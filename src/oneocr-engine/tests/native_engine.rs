use image::{DynamicImage, Rgb, RgbImage};
use oneocr_engine::{EngineConfig, OcrEngine};
use std::path::PathBuf;

// Needs the native library and model; run with:
// ONEOCR_DIR=/path/to/assets cargo test -p oneocr-engine -- --ignored

fn assets_dir() -> PathBuf {
    std::env::var_os("ONEOCR_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(oneocr_engine::executable_dir)
}

/// 5x7 glyphs for the letters used below, one string per row.
fn glyph(c: char) -> [&'static str; 7] {
    match c {
        'H' => ["#...#", "#...#", "#...#", "#####", "#...#", "#...#", "#...#"],
        'E' => ["#####", "#....", "#....", "####.", "#....", "#....", "#####"],
        'L' => ["#....", "#....", "#....", "#....", "#....", "#....", "#####"],
        'O' => [".###.", "#...#", "#...#", "#...#", "#...#", "#...#", ".###."],
        _ => ["....."; 7],
    }
}

/// Black block letters on white, each glyph cell `scale` pixels wide.
fn render_text(text: &str, scale: u32, margin: u32) -> RgbImage {
    let advance = 6 * scale;
    let width = margin * 2 + advance * text.len() as u32;
    let height = margin * 2 + 7 * scale;
    let mut img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    for (i, c) in text.chars().enumerate() {
        let left = margin + i as u32 * advance;
        for (row, bits) in glyph(c).iter().enumerate() {
            for (col, bit) in bits.chars().enumerate() {
                if bit != '#' {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let x = left + col as u32 * scale + dx;
                        let y = margin + row as u32 * scale + dy;
                        img.put_pixel(x, y, Rgb([0, 0, 0]));
                    }
                }
            }
        }
    }
    img
}

#[test]
#[ignore = "requires the OneOCR native library and model file"]
fn recognizes_rendered_hello() {
    let engine = OcrEngine::new(EngineConfig::in_dir(assets_dir())).expect("engine initializes");

    let img = render_text("HELLO", 8, 40);
    let (width, height) = img.dimensions();
    let result = engine
        .recognize_image(&DynamicImage::ImageRgb8(img))
        .expect("recognition succeeds");

    assert_eq!(result.lines.len(), 1, "got {:?}", result);
    let line = &result.lines[0];
    assert_eq!(line.text, "HELLO");
    assert_eq!(line.words.len(), 1);
    assert_eq!(line.words[0].text, "HELLO");

    for (x, y) in line.bounding_box.points() {
        assert!(x >= 0.0 && x <= width as f32, "x {} out of bounds", x);
        assert!(y >= 0.0 && y <= height as f32, "y {} out of bounds", y);
    }
}

#[test]
#[ignore = "requires the OneOCR native library and model file"]
fn blank_image_has_no_lines() {
    let engine = OcrEngine::new(EngineConfig::in_dir(assets_dir())).expect("engine initializes");

    let blank = DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 200, Rgb([255, 255, 255])));
    let result = engine.recognize_image(&blank).expect("recognition succeeds");

    assert!(result.lines.is_empty());
    assert_eq!(result.text(), "");
}

#[test]
#[ignore = "requires the OneOCR native library and model file"]
fn global_initialization_is_idempotent() {
    let config = EngineConfig::in_dir(assets_dir());
    let first = oneocr_engine::initialize(config.clone()).expect("engine initializes");
    let second = oneocr_engine::initialize(config).expect("engine initializes");

    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert!(std::sync::Arc::ptr_eq(&first, &oneocr_engine::engine().unwrap()));
}
