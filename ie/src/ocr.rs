//! OCR wrapper.
//!
//! The project relies on `ocr-rs` (Rust PaddleOCR bindings). OCR engines are
//! sensitive to input quality, so preprocessing happens in `reader` before
//! calling into this module. Recognition never fails from the caller's point
//! of view: engine errors yield an empty string.

use std::path::Path;

use anyhow::Context;

pub const DIGITS: &str = "0123456789";
pub const RATIO: &str = "0123456789/";

/// Anything that turns pixels into text.
pub trait TextRecognizer {
    /// Recognize text in `image`, keeping only characters of `charset` when given.
    fn recognize(&self, image: crate::Image, charset: Option<&str>) -> String;
}

pub struct Ocr {
    engine: ocr_rs::OcrEngine,
}

impl Ocr {
    /// Initialize the OCR engine with the given model paths.
    pub fn try_new(
        detection: impl AsRef<Path>,
        recognition: impl AsRef<Path>,
        charsset: impl AsRef<Path>,
    ) -> anyhow::Result<Self> {
        let thread_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let engine = ocr_rs::OcrEngine::new(
            detection,
            recognition,
            charsset,
            Some(ocr_rs::OcrEngineConfig {
                backend: ocr_rs::Backend::CPU,
                thread_count: thread_count as i32,
                // Quantities are short runs of small glyphs; High precision
                // noticeably reduces digit confusions.
                precision_mode: ocr_rs::PrecisionMode::High,
                enable_parallel: thread_count > 1,
                min_result_confidence: 0.5,
                ..Default::default()
            }),
        )
        .context("failed to initialize OCR engine")?;

        Ok(Self { engine })
    }
}

impl TextRecognizer for Ocr {
    fn recognize(&self, image: crate::Image, charset: Option<&str>) -> String {
        if image.width() == 0 || image.height() == 0 {
            return String::new();
        }
        let rgb = ocr_rs::preprocess::rgb_to_image(&image.get_bytes(), image.width(), image.height());

        let text = match self.engine.recognize(&rgb) {
            Ok(results) => results
                .into_iter()
                .map(|v| v.text)
                .collect::<Vec<_>>()
                .join(" "),
            Err(err) => {
                tracing::debug!(error = %err, "ocr failed");
                String::new()
            }
        };

        match charset {
            Some(charset) => restrict_to_charset(&text, charset),
            None => text,
        }
    }
}

/// Keep only characters of `charset`.
///
/// When the charset has digits, common letter lookalikes are mapped onto
/// them first (`O` to `0`, `l`/`I` to `1`, `T` to `7`, ...).
pub fn restrict_to_charset(text: &str, charset: &str) -> String {
    let digits = charset.chars().any(|c| c.is_ascii_digit());
    text.chars()
        .map(|c| if digits { digit_lookalike(c).unwrap_or(c) } else { c })
        .filter(|c| charset.contains(*c))
        .collect()
}

fn digit_lookalike(c: char) -> Option<char> {
    Some(match c {
        'O' | 'o' | 'D' | 'Q' => '0',
        'l' | 'I' | 'i' | '|' | '!' => '1',
        'Z' | 'z' => '2',
        'S' | 's' => '5',
        'T' => '7',
        'B' => '8',
        'g' => '9',
        _ => return None,
    })
}
