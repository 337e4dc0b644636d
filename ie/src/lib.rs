mod image;
pub use image::*;
mod geometry;
pub use geometry::*;
mod scale;
pub use scale::*;
mod frame;
pub use frame::*;
mod locate;
pub use locate::*;
mod palette;
pub use palette::*;
mod util;

pub mod ocr;
pub mod phrase;
pub mod reader;
pub mod screen;

use std::time::Duration;

use ocr::TextRecognizer;
use phrase::{PhraseMatch, PhraseVerdict};
use reader::{QuantityReading, ReaderConfig};
use screen::crafting::{Requirement, StripLayout};
use screen::tasks::{CardLayout, CardState, Indicator};

/// The visual resolution engine: template location and text reading over
/// captured frames, all in logical coordinates.
pub struct Ie {
	palette: Palette,
	reader: ReaderConfig,
	locator: Locator,
	ocr: Box<dyn TextRecognizer>,
}

impl Ie {
	pub fn try_new(
		palette: Palette,
		reader: ReaderConfig,
		weights: MatchWeights,
		ocr_detection: impl AsRef<std::path::Path>,
		ocr_recognition: impl AsRef<std::path::Path>,
		ocr_charsset: impl AsRef<std::path::Path>,
	) -> anyhow::Result<Self> {
		let ocr = ocr::Ocr::try_new(ocr_detection, ocr_recognition, ocr_charsset)?;
		Ok(Self::with_recognizer(palette, reader, weights, Box::new(ocr)))
	}

	/// Build on any recognizer, e.g. a scripted one in tests.
	pub fn with_recognizer(palette: Palette, reader: ReaderConfig, weights: MatchWeights, ocr: Box<dyn TextRecognizer>) -> Self {
		Self {
			palette,
			reader,
			locator: Locator::new(weights),
			ocr,
		}
	}

	#[inline]
	pub fn palette(&self) -> &Palette {
		&self.palette
	}

	/// Re-derive the deficit colors from a sample of deficit text.
	pub fn sample_deficit_color(&mut self, sample: Image) {
		self.palette = std::mem::take(&mut self.palette).with_deficit_sample(sample);
	}

	/// Best match of `template` at or above its own threshold.
	pub fn locate(&self, frame: &Frame, template: &Template, region: Option<Rect>) -> Option<Match> {
		self.locator.locate_best(frame, template, template.threshold(), region)
	}

	/// Retry helper: the template's threshold scaled by `factor`.
	pub fn locate_relaxed(&self, frame: &Frame, template: &Template, factor: f32, region: Option<Rect>) -> Option<Match> {
		self.locator.locate_best(frame, template, template.threshold() * factor, region)
	}

	pub fn locate_all(&self, frame: &Frame, template: &Template, region: Option<Rect>, limit: Option<usize>) -> Vec<Match> {
		self.locator.locate_all(frame, template, template.threshold(), region, limit)
	}

	/// Read the single quantity inside `region` (logical).
	pub fn read_number(&self, frame: &Frame, region: Rect) -> QuantityReading {
		let (view, _) = frame.view(region);
		let alternate = reader::classify_color(view, &self.palette, &self.reader) == reader::TextColor::Deficit;
		reader::read_number(view, alternate, self.ocr.as_ref(), &self.palette, &self.reader)
	}

	pub fn read_requirements(&self, frame: &Frame, region: Rect, layout: &StripLayout) -> Vec<Requirement> {
		screen::crafting::read_requirements(frame, region, layout, self.ocr.as_ref(), &self.palette, &self.reader)
	}

	/// Best of `candidates` in the text of `region`, under either rendering.
	pub fn read_phrase(&self, frame: &Frame, region: Rect, candidates: &[&str], threshold: f32) -> Option<PhraseMatch> {
		let (view, _) = frame.view(region);
		reader::read_texts(view, self.ocr.as_ref(), &self.reader)
			.iter()
			.filter_map(|t| phrase::match_phrase(t, candidates, threshold))
			.fold(None, |best: Option<PhraseMatch>, m| match best {
				Some(b) if b.ratio >= m.ratio => Some(b),
				_ => Some(m),
			})
	}

	pub fn read_phrase_pair(&self, frame: &Frame, region: Rect, positive: &str, negative: &str, threshold: f32) -> PhraseVerdict {
		screen::dispatch::read_status(frame, region, self.ocr.as_ref(), &self.reader, positive, negative, threshold)
	}

	pub fn read_occupancy(&self, frame: &Frame, region: Rect) -> Option<(u32, u32)> {
		screen::dispatch::read_occupancy(frame, region, self.ocr.as_ref(), &self.reader)
	}

	pub fn read_cooldown(&self, frame: &Frame, region: Rect) -> Option<Duration> {
		screen::dispatch::read_cooldown(frame, region, self.ocr.as_ref(), &self.reader)
	}

	pub fn detect_cards(&self, frame: &Frame, layout: &CardLayout) -> Vec<Rect> {
		screen::tasks::detect_cards(frame, layout)
	}

	pub fn classify_card(&self, frame: &Frame, card: Rect, locked: bool, layout: &CardLayout) -> CardState {
		screen::tasks::classify_card(frame, card, locked, &self.palette, layout)
	}

	pub fn material_indicators(&self, frame: &Frame, card: Rect, zone: Zone<Card>) -> Vec<Indicator> {
		screen::tasks::material_indicators(frame, card, zone, self.ocr.as_ref(), &self.palette, &self.reader)
	}

	pub fn deliver_amount(&self, frame: &Frame, card: Rect, zone: Zone<Card>) -> Option<u32> {
		screen::tasks::deliver_amount(frame, card, zone, self.ocr.as_ref(), &self.palette, &self.reader)
	}
}
