//! Quantity reading.
//!
//! Quantities are small runs of digits drawn either in dark text (enough in
//! stock) or in a deficit color. Text is found by color masking and
//! connected components, then recognized under three binarizations whose
//! results are put to a vote.

use std::collections::BTreeMap;
use std::time::Duration;

use image::{GrayImage, Luma};
use imageproc::contrast::{ThresholdType, adaptive_threshold, otsu_level, threshold};
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::ocr::{DIGITS, RATIO, TextRecognizer};
use crate::util::{RATIO_REGEX, debug_snapshot};
use crate::{Image, OwnedImage, Palette, Rect, image::ensure_dark_text_on_light};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColor {
	Sufficient,
	Deficit,
}

/// Bounding box of a run of text pixels, relative to the analysed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextBox {
	pub bounds: Rect,
	pub color: TextColor,
}

/// Result of reading one quantity. `value` is `None` when unreadable, which
/// is distinct from a reading of zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityReading {
	pub value: Option<u32>,
	pub raw: String,
	pub color: TextColor,
}

impl QuantityReading {
	#[inline]
	pub fn is_deficit(&self) -> bool {
		self.color == TextColor::Deficit
	}
}

/// A `current/required` pair read from a requirements strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatioReading {
	pub current: u32,
	pub required: u32,
	/// Where the text was found, relative to the analysed image.
	pub bounds: Rect,
	pub raw: String,
}

impl RatioReading {
	#[inline]
	pub fn deficit(&self) -> u32 {
		self.required.saturating_sub(self.current)
	}
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
	/// Accepted glyph heights (pixels, inclusive).
	pub digit_height: (u32, u32),
	/// Accepted widths of a merged number (pixels, inclusive).
	pub number_width: (u32, u32),
	pub merge_y_tolerance: u32,
	pub merge_gap_factor: f32,
	/// Share of deficit-colored pixels above which a box is a deficit.
	pub deficit_ratio: f32,
	/// Requirement clumps further apart than this are separate pairs.
	pub group_gap: u32,
	pub upscale: u32,
	pub fixed_cutoff: u8,
	/// Fixed cutoff used for deficit-colored text, which is brighter.
	pub alternate_cutoff: u8,
	pub adaptive_radius: u32,
	pub adaptive_delta: i32,
}

impl Default for ReaderConfig {
	fn default() -> Self {
		Self {
			digit_height: (10, 30),
			number_width: (10, 60),
			merge_y_tolerance: 5,
			merge_gap_factor: 1.5,
			deficit_ratio: 0.3,
			group_gap: 15,
			upscale: 3,
			fixed_cutoff: 127,
			alternate_cutoff: 100,
			adaptive_radius: 5,
			adaptive_delta: 2,
		}
	}
}

/// Locate runs of text pixels and classify their color.
pub fn segment(image: Image, palette: &Palette, cfg: &ReaderConfig) -> Vec<TextBox> {
	let (w, h) = (image.width(), image.height());
	if w == 0 || h == 0 {
		return Vec::new();
	}

	let mut mask = GrayImage::new(w, h);
	for (x, y, p) in mask.enumerate_pixels_mut() {
		let c = image.get(x, y);
		if palette.is_dark_text(c) || palette.is_deficit(c) {
			*p = Luma([255]);
		}
	}

	let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

	// label -> (min_x, min_y, max_x, max_y)
	let mut extents: BTreeMap<u32, (u32, u32, u32, u32)> = BTreeMap::new();
	for (x, y, l) in labels.enumerate_pixels() {
		let l = l.0[0];
		if l == 0 {
			continue;
		}
		let e = extents.entry(l).or_insert((x, y, x, y));
		e.0 = e.0.min(x);
		e.1 = e.1.min(y);
		e.2 = e.2.max(x);
		e.3 = e.3.max(y);
	}

	let (min_h, max_h) = cfg.digit_height;
	let mut boxes = extents
		.into_values()
		.map(|(x1, y1, x2, y2)| Rect::new(x1 as i32, y1 as i32, x2 - x1 + 1, y2 - y1 + 1))
		.filter(|r| (min_h..=max_h).contains(&r.h))
		.map(|bounds| TextBox {
			bounds,
			color: classify_color(image.sub_rect(bounds), palette, cfg),
		})
		.collect::<Vec<_>>();
	boxes.sort_by_key(|b| (b.bounds.x, b.bounds.y));
	boxes
}

pub fn classify_color(image: Image, palette: &Palette, cfg: &ReaderConfig) -> TextColor {
	if image.fraction(|c| palette.is_deficit(c)) > cfg.deficit_ratio {
		TextColor::Deficit
	} else {
		TextColor::Sufficient
	}
}

/// Join glyph boxes that belong to the same number.
///
/// Two boxes merge when their tops are within the y tolerance and the
/// horizontal gap is below `merge_gap_factor` times their average width.
/// Passes repeat until nothing changes, so the result is a fixpoint.
pub fn merge_boxes(boxes: &[TextBox], cfg: &ReaderConfig) -> Vec<TextBox> {
	let mut current = boxes.to_vec();
	loop {
		let merged = merge_pass(&current, cfg);
		if merged.len() == current.len() {
			return merged;
		}
		current = merged;
	}
}

fn merge_pass(boxes: &[TextBox], cfg: &ReaderConfig) -> Vec<TextBox> {
	let mut sorted = boxes.to_vec();
	sorted.sort_by_key(|b| (b.bounds.x, b.bounds.y));

	let mut out: Vec<TextBox> = Vec::with_capacity(sorted.len());
	for b in sorted {
		if let Some(last) = out.last_mut()
			&& joins(last.bounds, b.bounds, cfg)
		{
			last.bounds = last.bounds.union(&b.bounds);
			if b.color == TextColor::Deficit {
				last.color = TextColor::Deficit;
			}
			continue;
		}
		out.push(b);
	}
	out
}

fn joins(a: Rect, b: Rect, cfg: &ReaderConfig) -> bool {
	let same_line = a.y.abs_diff(b.y) < cfg.merge_y_tolerance;
	let gap = b.x - a.right();
	let avg_w = (a.w + b.w) as f32 / 2.0;
	same_line && (gap as f32) < avg_w * cfg.merge_gap_factor
}

/// Most frequent value; ties go to the earliest. `None` for no values.
pub fn vote<T: PartialEq + Clone>(values: &[T]) -> Option<T> {
	let mut best: Option<(&T, usize)> = None;
	for v in values {
		let count = values.iter().filter(|o| *o == v).count();
		if best.is_none_or(|(_, c)| count > c) {
			best = Some((v, count));
		}
	}
	best.map(|(v, _)| v.clone())
}

/// Upscaled binarizations: Otsu, adaptive and a fixed cutoff.
fn variants(image: Image, alternate: bool, cfg: &ReaderConfig) -> [OwnedImage; 3] {
	let base = image
		.to_owned_image()
		.resized_h(image.height() * cfg.upscale.max(1));
	let gray = base.to_gray_image();

	let otsu = threshold(&gray, otsu_level(&gray), ThresholdType::Binary);
	let adaptive = adaptive_threshold(&gray, cfg.adaptive_radius, cfg.adaptive_delta);
	let cutoff = if alternate { cfg.alternate_cutoff } else { cfg.fixed_cutoff };
	let fixed = threshold(&gray, cutoff, ThresholdType::Binary);

	[otsu, adaptive, fixed].map(|bin| OwnedImage::from_gray_as_rgb(&ensure_dark_text_on_light(bin)))
}

const MIN_READABLE: u32 = 5;

/// Merged runs of digit-sized glyphs whose width lies in `widths`, left to right.
pub fn number_boxes(image: Image, palette: &Palette, cfg: &ReaderConfig, widths: (u32, u32)) -> Vec<TextBox> {
	let (min_w, max_w) = widths;
	merge_boxes(&segment(image, palette, cfg), cfg)
		.into_iter()
		.filter(|b| (min_w..=max_w).contains(&b.bounds.w))
		.collect()
}

/// Read one number from a region holding a single quantity.
///
/// Only the widest digit run in the region is recognized; a region without
/// one is unreadable and never reaches OCR. `alternate` selects the cutoff
/// tuned for deficit-colored text.
pub fn read_number(
	image: Image,
	alternate: bool,
	ocr: &dyn TextRecognizer,
	palette: &Palette,
	cfg: &ReaderConfig,
) -> QuantityReading {
	let number = if image.width() < MIN_READABLE || image.height() < MIN_READABLE {
		None
	} else {
		number_boxes(image, palette, cfg, cfg.number_width)
			.into_iter()
			.max_by_key(|b| b.bounds.w)
	};

	let Some(number) = number else {
		tracing::trace!(width = image.width(), height = image.height(), "no digit run");
		return QuantityReading {
			value: None,
			raw: String::new(),
			color: classify_color(image, palette, cfg),
		};
	};
	recognize(image.sub_rect(number.bounds.padded(2)), alternate, number.color, ocr, cfg)
}

/// Read the number inside `number`, a box found by [`number_boxes`] in `image`.
pub fn read_text_box(
	image: Image,
	number: TextBox,
	ocr: &dyn TextRecognizer,
	cfg: &ReaderConfig,
) -> QuantityReading {
	let alternate = number.color == TextColor::Deficit;
	recognize(image.sub_rect(number.bounds.padded(2)), alternate, number.color, ocr, cfg)
}

fn recognize(image: Image, alternate: bool, color: TextColor, ocr: &dyn TextRecognizer, cfg: &ReaderConfig) -> QuantityReading {
	let mut raw = Vec::with_capacity(3);
	let mut values = Vec::with_capacity(3);
	for variant in variants(image, alternate, cfg) {
		let text = ocr.recognize(variant.as_image(), Some(DIGITS));
		let digits = text.chars().filter(|c| c.is_ascii_digit()).collect::<String>();
		if let Ok(v) = digits.parse::<u32>() {
			values.push(v);
		}
		raw.push(text);
	}

	let value = vote(&values);
	let raw = raw.join("|");
	if value.is_none() {
		debug_snapshot(image, &format!("unreadable_{raw}"));
	}
	tracing::trace!(?value, raw = %raw, ?color, "read number");

	QuantityReading { value, raw, color }
}

/// Read every `current/required` pair in a requirements strip, left to right.
///
/// Groups that never parse are skipped (and logged).
pub fn read_ratios(image: Image, ocr: &dyn TextRecognizer, palette: &Palette, cfg: &ReaderConfig) -> Vec<RatioReading> {
	let mut groups: Vec<Rect> = Vec::new();
	for b in segment(image, palette, cfg) {
		if let Some(last) = groups.last_mut()
			&& b.bounds.x - last.right() <= cfg.group_gap as i32
		{
			*last = last.union(&b.bounds);
			continue;
		}
		groups.push(b.bounds);
	}

	let mut out = Vec::new();
	for bounds in groups {
		let region = image.sub_rect(bounds.padded(2));
		match read_ratio(region, ocr, cfg) {
			Some((current, required, raw)) => out.push(RatioReading {
				current,
				required,
				bounds,
				raw,
			}),
			None => tracing::debug!(x = bounds.x, y = bounds.y, "unreadable requirement"),
		}
	}
	out
}

/// Read a single `x/y` pair under all variants and vote.
pub fn read_ratio(image: Image, ocr: &dyn TextRecognizer, cfg: &ReaderConfig) -> Option<(u32, u32, String)> {
	if image.width() < MIN_READABLE || image.height() < MIN_READABLE {
		return None;
	}

	let mut raw = Vec::with_capacity(3);
	let mut pairs = Vec::with_capacity(3);
	for variant in variants(image, false, cfg) {
		let text = repair_ratio_text(&ocr.recognize(variant.as_image(), Some(RATIO)));
		if let Some(pair) = parse_ratio(&text) {
			pairs.push(pair);
		}
		raw.push(text);
	}

	let (current, required) = vote(&pairs)?;
	Some((current, required, raw.join("|")))
}

/// Free text under two renderings: the upscaled original and Otsu binarized.
pub fn read_texts(image: Image, ocr: &dyn TextRecognizer, cfg: &ReaderConfig) -> [String; 2] {
	if image.width() < MIN_READABLE || image.height() < MIN_READABLE {
		return [String::new(), String::new()];
	}
	let base = image
		.to_owned_image()
		.resized_h(image.height() * cfg.upscale.max(1));
	let gray = base.to_gray_image();
	let otsu = OwnedImage::from_gray_as_rgb(&ensure_dark_text_on_light(threshold(
		&gray,
		otsu_level(&gray),
		ThresholdType::Binary,
	)));

	[ocr.recognize(base.as_image(), None), ocr.recognize(otsu.as_image(), None)]
}

/// Split digit runs where the slash was lost.
///
/// Four digits become `XX/XX`, five become `XX/XXX`, longer runs are split
/// in the middle. This guesses wrong for e.g. `1/234`; there is no better
/// signal in the text alone.
pub fn repair_ratio_text(text: &str) -> String {
	let text = text.trim();
	if text.contains('/') || text.len() < 4 || !text.chars().all(|c| c.is_ascii_digit()) {
		return text.to_string();
	}
	let split = match text.len() {
		4 | 5 => 2,
		n => n / 2,
	};
	format!("{}/{}", &text[..split], &text[split..])
}

pub fn parse_ratio(text: &str) -> Option<(u32, u32)> {
	let caps = RATIO_REGEX.captures(text)?;
	let current = caps.name("current")?.as_str().parse().ok()?;
	let required = caps.name("required")?.as_str().parse().ok()?;
	Some((current, required))
}

/// Parse timers such as `2h 15m`, `5m 30s` or `45s`.
pub fn parse_duration(text: &str) -> Option<Duration> {
	static PARTS: std::sync::LazyLock<[(regex::Regex, u64); 3]> = std::sync::LazyLock::new(|| {
		[
			(regex::Regex::new(r"(?i)(\d+)\s*h").expect("regex"), 3600),
			(regex::Regex::new(r"(?i)(\d+)\s*m").expect("regex"), 60),
			(regex::Regex::new(r"(?i)(\d+)\s*s").expect("regex"), 1),
		]
	});

	let mut total = 0u64;
	let mut found = false;
	for (re, unit) in PARTS.iter() {
		if let Some(v) = re.captures(text).and_then(|c| c[1].parse::<u64>().ok()) {
			total += v * unit;
			found = true;
		}
	}
	found.then(|| Duration::from_secs(total))
}

#[cfg(test)]
pub(crate) mod tests {
	use std::cell::RefCell;
	use std::collections::VecDeque;

	use proptest::prelude::*;

	use super::*;
	use crate::{Color, ocr::restrict_to_charset};

	/// Returns scripted answers in call order, then empty strings.
	pub(crate) struct ScriptedOcr(pub RefCell<VecDeque<String>>);

	impl ScriptedOcr {
		pub(crate) fn new<const N: usize>(answers: [&str; N]) -> Self {
			Self(RefCell::new(answers.iter().map(|s| s.to_string()).collect()))
		}
	}

	impl TextRecognizer for ScriptedOcr {
		fn recognize(&self, _image: Image, charset: Option<&str>) -> String {
			let text = self.0.borrow_mut().pop_front().unwrap_or_default();
			match charset {
				Some(c) => restrict_to_charset(&text, c),
				None => text,
			}
		}
	}

	fn text_box(x: i32, y: i32, w: u32, h: u32) -> TextBox {
		TextBox {
			bounds: Rect::new(x, y, w, h),
			color: TextColor::Sufficient,
		}
	}

	fn glyph_strip() -> OwnedImage {
		let mut img = OwnedImage::filled(120, 40, Color::new(230, 225, 210));
		// "2" "4" as dark blocks, then a far away red "7".
		img.fill_rect(10, 10, 8, 16, Color::new(20, 20, 20));
		img.fill_rect(21, 10, 8, 16, Color::new(20, 20, 20));
		img.fill_rect(80, 11, 9, 16, Color::new(220, 25, 25));
		// Too small to be a glyph.
		img.fill_rect(60, 30, 3, 3, Color::BLACK);
		img
	}

	/// Two dark digit-sized glyphs on a light background.
	fn two_digits() -> OwnedImage {
		let mut img = OwnedImage::filled(40, 24, Color::WHITE);
		img.fill_rect(8, 4, 8, 16, Color::new(20, 20, 20));
		img.fill_rect(19, 4, 8, 16, Color::new(20, 20, 20));
		img
	}

	#[test]
	fn votes_for_the_majority_reading() {
		let ocr = ScriptedOcr::new(["24", "24", "7"]);
		let img = two_digits();
		let reading = read_number(img.as_image(), false, &ocr, &Palette::default(), &ReaderConfig::default());
		assert_eq!(reading.value, Some(24));
		assert_eq!(reading.raw, "24|24|7");
		assert_eq!(reading.color, TextColor::Sufficient);
	}

	#[test]
	fn unreadable_is_none_not_zero() {
		let ocr = ScriptedOcr::new(["", "--", ""]);
		let img = two_digits();
		let reading = read_number(img.as_image(), false, &ocr, &Palette::default(), &ReaderConfig::default());
		assert_eq!(reading.value, None);

		let ocr = ScriptedOcr::new(["0", "", ""]);
		let reading = read_number(img.as_image(), false, &ocr, &Palette::default(), &ReaderConfig::default());
		assert_eq!(reading.value, Some(0));
	}

	#[test]
	fn blob_taller_than_a_digit_is_not_read() {
		let mut img = OwnedImage::filled(120, 80, Color::WHITE);
		img.fill_rect(40, 10, 30, 60, Color::BLACK);
		let ocr = ScriptedOcr::new(["8", "8", "8"]);

		let reading = read_number(img.as_image(), false, &ocr, &Palette::default(), &ReaderConfig::default());
		assert_eq!(reading.value, None);
		assert_eq!(ocr.0.borrow().len(), 3);
	}

	#[test]
	fn blank_region_is_not_read() {
		let img = OwnedImage::filled(30, 20, Color::WHITE);
		let ocr = ScriptedOcr::new(["5", "5", "5"]);
		let reading = read_number(img.as_image(), false, &ocr, &Palette::default(), &ReaderConfig::default());
		assert_eq!(reading.value, None);
		assert_eq!(ocr.0.borrow().len(), 3);
	}

	#[test]
	fn tiny_region_is_unreadable_without_ocr() {
		let ocr = ScriptedOcr::new(["5", "5", "5"]);
		let img = OwnedImage::filled(4, 20, Color::WHITE);
		let reading = read_number(img.as_image(), false, &ocr, &Palette::default(), &ReaderConfig::default());
		assert_eq!(reading.value, None);
		assert_eq!(ocr.0.borrow().len(), 3);
	}

	#[test]
	fn vote_tie_goes_to_first() {
		assert_eq!(vote(&[3, 5, 9]), Some(3));
		assert_eq!(vote(&[3, 5, 5]), Some(5));
		assert_eq!(vote::<u32>(&[]), None);
	}

	#[test]
	fn segments_and_merges_digits() {
		let img = glyph_strip();
		let cfg = ReaderConfig::default();
		let boxes = segment(img.as_image(), &Palette::default(), &cfg);
		assert_eq!(boxes.len(), 3);

		let merged = merge_boxes(&boxes, &cfg);
		assert_eq!(merged.len(), 2);
		assert_eq!(merged[0].bounds, Rect::new(10, 10, 19, 16));
		assert_eq!(merged[0].color, TextColor::Sufficient);
		assert_eq!(merged[1].color, TextColor::Deficit);
	}

	#[test]
	fn merge_keeps_separate_lines_apart() {
		let cfg = ReaderConfig::default();
		let merged = merge_boxes(&[text_box(0, 0, 8, 14), text_box(10, 20, 8, 14)], &cfg);
		assert_eq!(merged.len(), 2);
	}

	proptest! {
		#[test]
		fn merging_is_idempotent(raw in proptest::collection::vec((0i32..300, 0i32..60, 1u32..30, 10u32..30), 0..24)) {
			let cfg = ReaderConfig::default();
			let boxes = raw.into_iter().map(|(x, y, w, h)| text_box(x, y, w, h)).collect::<Vec<_>>();
			let once = merge_boxes(&boxes, &cfg);
			let twice = merge_boxes(&once, &cfg);
			prop_assert_eq!(once, twice);
		}
	}

	#[test]
	fn repairs_lost_slash() {
		assert_eq!(repair_ratio_text("2/5"), "2/5");
		assert_eq!(repair_ratio_text("1020"), "10/20");
		assert_eq!(repair_ratio_text("12150"), "12/150");
		assert_eq!(repair_ratio_text("123456"), "123/456");
		assert_eq!(repair_ratio_text("25"), "25");
	}

	#[test]
	fn parses_ratios_and_durations() {
		assert_eq!(parse_ratio("2 / 5"), Some((2, 5)));
		assert_eq!(parse_ratio("x12/30y"), Some((12, 30)));
		assert_eq!(parse_ratio("12"), None);

		assert_eq!(parse_duration("2h 15m"), Some(Duration::from_secs(2 * 3600 + 15 * 60)));
		assert_eq!(parse_duration("5m 30s"), Some(Duration::from_secs(330)));
		assert_eq!(parse_duration("45s"), Some(Duration::from_secs(45)));
		assert_eq!(parse_duration("soon"), None);
	}

	#[test]
	fn reads_requirement_pairs_left_to_right() {
		let mut img = OwnedImage::filled(200, 40, Color::WHITE);
		img.fill_rect(10, 10, 30, 16, Color::BLACK);
		img.fill_rect(120, 10, 30, 16, Color::BLACK);
		let ocr = ScriptedOcr::new(["2/5", "2/5", "2/6", "TO/10", "10/10", "1010"]);

		let pairs = read_ratios(img.as_image(), &ocr, &Palette::default(), &ReaderConfig::default());
		assert_eq!(pairs.len(), 2);
		assert_eq!((pairs[0].current, pairs[0].required, pairs[0].deficit()), (2, 5, 3));
		assert_eq!((pairs[1].current, pairs[1].required, pairs[1].deficit()), (10, 10, 0));
	}
}
