//! Template location.
//!
//! Three correlation scores are computed for every placement of a template:
//!
//! - direct: zero-mean normalized correlation over the RGB channels,
//! - edge: the same measure over Canny edge maps (robust to tint changes),
//! - alternate: normalized cross-correlation over grayscale.
//!
//! The combined score is `max(direct, edge * w_edge, alt * w_alt)`; the down
//! weights keep the fallbacks from outranking a genuine color match.
//!
//! Searching a large area is coarse-to-fine: both images are shrunk by an
//! integer factor, the strongest coarse peaks are kept, and only small padded
//! windows around them are scored at full resolution.

use anyhow::Result;
use imageproc::template_matching::{MatchTemplateMethod, match_template_parallel};
use rayon::prelude::*;

use crate::{Frame, Image, OwnedImage, Point, Rect};

/// A named reference image with its acceptance threshold.
#[derive(Debug, Clone)]
pub struct Template {
	name: String,
	image: OwnedImage,
	threshold: f32,
}

impl Template {
	pub fn new(name: impl Into<String>, image: OwnedImage, threshold: f32) -> Self {
		Self {
			name: name.into(),
			image,
			threshold,
		}
	}

	pub fn from_encoded(name: impl Into<String>, bytes: &[u8], threshold: f32) -> Result<Self> {
		Ok(Self::new(name, OwnedImage::from_encoded(bytes)?, threshold))
	}

	#[inline]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[inline]
	pub fn image(&self) -> Image<'_> {
		self.image.as_image()
	}

	#[inline]
	pub fn threshold(&self) -> f32 {
		self.threshold
	}
}

/// Strategy weights and parameters of the combined score.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MatchWeights {
	pub edge: f32,
	pub alternate: f32,
	pub canny_low: f32,
	pub canny_high: f32,
	/// Logical distance under which two matches count as the same object.
	pub dedup_radius: u32,
	/// Areas with fewer physical pixels are scored directly at full resolution.
	pub coarse_min_area: u32,
	/// Smallest template side kept after shrinking.
	pub coarse_min_side: u32,
	pub coarse_max_factor: u32,
	/// Coarse peaks rescored at full resolution.
	pub coarse_peaks: usize,
}

impl Default for MatchWeights {
	fn default() -> Self {
		Self {
			edge: 0.7,
			alternate: 0.85,
			canny_low: 50.0,
			canny_high: 150.0,
			dedup_radius: 30,
			coarse_min_area: 250_000,
			coarse_min_side: 8,
			coarse_max_factor: 8,
			coarse_peaks: 12,
		}
	}
}

/// A located template, in logical coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
	pub center: Point,
	pub bounds: Rect,
	pub confidence: f32,
}

/// Per-placement scores, row-major, `(area - template + 1)` in each dimension.
pub struct ScoreMap {
	pub width: u32,
	pub height: u32,
	pub data: Vec<f32>,
}

impl ScoreMap {
	fn best(&self) -> Option<(u32, u32, f32)> {
		self.data
			.iter()
			.enumerate()
			.filter(|(_, v)| v.is_finite())
			.max_by(|a, b| a.1.total_cmp(b.1))
			.map(|(i, v)| (i as u32 % self.width, i as u32 / self.width, *v))
	}

	fn above(&self, floor: f32) -> Vec<(u32, u32, f32)> {
		self.data
			.iter()
			.enumerate()
			.filter(|(_, v)| **v >= floor)
			.map(|(i, v)| (i as u32 % self.width, i as u32 / self.width, *v))
			.collect()
	}

	/// Up to `count` placements, best first, pairwise at least `spacing` apart.
	fn peaks(&self, count: usize, spacing: u32) -> Vec<(u32, u32, f32)> {
		let mut order = (0..self.data.len())
			.filter(|i| self.data[*i].is_finite())
			.collect::<Vec<_>>();
		order.sort_unstable_by(|a, b| self.data[*b].total_cmp(&self.data[*a]));

		let mut kept: Vec<(u32, u32, f32)> = Vec::with_capacity(count.min(self.data.len()));
		for i in order {
			if kept.len() >= count {
				break;
			}
			let (x, y) = (i as u32 % self.width, i as u32 / self.width);
			if kept.iter().any(|k| k.0.abs_diff(x).max(k.1.abs_diff(y)) < spacing) {
				continue;
			}
			kept.push((x, y, self.data[i]));
		}
		kept
	}
}

#[derive(Debug, Clone, Default)]
pub struct Locator {
	weights: MatchWeights,
}

impl Locator {
	pub fn new(weights: MatchWeights) -> Self {
		Self { weights }
	}

	pub fn weights(&self) -> &MatchWeights {
		&self.weights
	}

	/// Combined score map, `None` when the area cannot contain the template.
	pub fn score(&self, area: Image, template: Image) -> Option<ScoreMap> {
		let (tw, th) = (template.width(), template.height());
		if tw == 0 || th == 0 || area.width() < tw || area.height() < th {
			return None;
		}

		let mut combined = ccoeff_normed(&rgb_planes(area), &rgb_planes(template));

		let area_gray = area.to_gray_image();
		let tpl_gray = template.to_gray_image();

		let w = self.weights;
		let area_edges = imageproc::edges::canny(&area_gray, w.canny_low, w.canny_high);
		let tpl_edges = imageproc::edges::canny(&tpl_gray, w.canny_low, w.canny_high);
		let edge = ccoeff_normed(&[Plane::from_gray(&area_edges)], &[Plane::from_gray(&tpl_edges)]);

		let alt = match_template_parallel(&area_gray, &tpl_gray, MatchTemplateMethod::CrossCorrelationNormalized);
		let alt = alt.as_raw();

		let width = combined.width as usize;
		combined
			.data
			.par_chunks_mut(width)
			.enumerate()
			.for_each(|(y, row)| {
				for (x, v) in row.iter_mut().enumerate() {
					let i = y * width + x;
					let e = edge.data[i] * w.edge;
					let a = alt.get(i).copied().filter(|a| a.is_finite()).unwrap_or(0.0) * w.alternate;
					*v = v.max(e).max(a);
				}
			});

		Some(combined)
	}

	/// Best placement of `template` at or above `threshold`.
	///
	/// `region` restricts the search (logical coordinates).
	pub fn locate_best(&self, frame: &Frame, template: &Template, threshold: f32, region: Option<Rect>) -> Option<Match> {
		let (area, origin) = search_area(frame, region);
		let Some(&(x, y, confidence)) = self
			.placements(area, template.image(), threshold, self.weights.coarse_peaks)
			.first()
		else {
			tracing::trace!(template = template.name(), threshold, "no placement");
			return None;
		};

		tracing::trace!(template = template.name(), confidence, "best placement");
		Some(to_match(frame, template, origin, x, y, confidence))
	}

	/// Every distinct placement at or above `threshold`, most confident first.
	///
	/// Placements whose logical centers lie within the dedup radius of an
	/// already accepted one are dropped. `limit` caps the result. Large areas
	/// consider at most `coarse_peaks` placements, or twice `limit` if larger.
	pub fn locate_all(
		&self,
		frame: &Frame,
		template: &Template,
		threshold: f32,
		region: Option<Rect>,
		limit: Option<usize>,
	) -> Vec<Match> {
		let (area, origin) = search_area(frame, region);
		let peaks = limit.map_or(self.weights.coarse_peaks, |l| self.weights.coarse_peaks.max(l.saturating_mul(2)));
		let limit = limit.unwrap_or(usize::MAX);
		let candidates = self.placements(area, template.image(), threshold, peaks);

		let mut kept: Vec<Match> = Vec::new();
		for (x, y, confidence) in candidates {
			if kept.len() >= limit {
				break;
			}
			let m = to_match(frame, template, origin, x, y, confidence);
			if kept.iter().any(|k| k.center.chebyshev(m.center) < self.weights.dedup_radius) {
				continue;
			}
			kept.push(m);
		}

		tracing::debug!(template = template.name(), found = kept.len(), "located all");
		kept
	}

	/// Placements scoring at least `floor`, most confident first, in `area` pixels.
	///
	/// On the coarse path at most `peaks` placements come back.
	fn placements(&self, area: Image, template: Image, floor: f32, peaks: usize) -> Vec<(u32, u32, f32)> {
		let factor = self.coarse_factor(area, template);
		let mut found = if factor > 1 {
			self.coarse_to_fine(area, template, factor, floor, peaks)
		} else {
			self.score(area, template).map(|s| s.above(floor)).unwrap_or_default()
		};
		found.sort_by(|a, b| b.2.total_cmp(&a.2));
		found
	}

	/// Shrink factor for searching `template` in `area`; 1 means full resolution.
	fn coarse_factor(&self, area: Image, template: Image) -> u32 {
		let w = self.weights;
		let pixels = area.width() as u64 * area.height() as u64;
		if w.coarse_min_side == 0 || pixels < w.coarse_min_area as u64 {
			return 1;
		}
		(template.width().min(template.height()) / w.coarse_min_side).clamp(1, w.coarse_max_factor.max(1))
	}

	fn coarse_to_fine(&self, area: Image, template: Image, factor: u32, floor: f32, peaks: usize) -> Vec<(u32, u32, f32)> {
		let small_area = area.to_owned_image().shrunk(factor);
		let small_template = template.to_owned_image().shrunk(factor);
		let Some(coarse) = self.score(small_area.as_image(), small_template.as_image()) else {
			return Vec::new();
		};

		let spacing = (small_template.width().min(small_template.height()) / 2).max(1);
		let peaks = coarse.peaks(peaks, spacing);
		tracing::trace!(factor, peaks = peaks.len(), "coarse search");

		// A coarse peak is off by less than one factor step in each direction.
		let pad = factor + 1;
		let (tw, th) = (template.width(), template.height());
		let mut found: Vec<(u32, u32, f32)> = Vec::with_capacity(peaks.len());
		for (cx, cy, _) in peaks {
			let x = (cx * factor).saturating_sub(pad);
			let y = (cy * factor).saturating_sub(pad);
			let window = area.sub_image(x, y, tw + 2 * pad, th + 2 * pad);
			let Some((fx, fy, confidence)) = self.score(window, template).and_then(|s| s.best()) else {
				continue;
			};
			let placement = (x + fx, y + fy, confidence);
			if confidence >= floor && !found.iter().any(|f| (f.0, f.1) == (placement.0, placement.1)) {
				found.push(placement);
			}
		}
		found
	}
}

fn search_area(frame: &Frame, region: Option<Rect>) -> (Image<'_>, Rect) {
	match region {
		Some(r) => frame.view(r),
		None => {
			let img = frame.image();
			(img, Rect::new(0, 0, img.width(), img.height()))
		}
	}
}

fn to_match(frame: &Frame, template: &Template, origin: Rect, x: u32, y: u32, confidence: f32) -> Match {
	let bounds = Rect::new(
		origin.x + x as i32,
		origin.y + y as i32,
		template.image().width(),
		template.image().height(),
	);
	Match {
		center: frame.to_logical(bounds.center()),
		bounds: frame.rect_to_logical(bounds),
		confidence,
	}
}

// ----------

struct Plane {
	width: u32,
	height: u32,
	data: Vec<f32>,
}

impl Plane {
	fn from_gray(gray: &image::GrayImage) -> Self {
		Self {
			width: gray.width(),
			height: gray.height(),
			data: gray.as_raw().iter().map(|v| *v as f32).collect(),
		}
	}
}

fn rgb_planes(image: Image) -> [Plane; 3] {
	let (w, h) = (image.width(), image.height());
	let n = (w * h) as usize;
	let mut r = Vec::with_capacity(n);
	let mut g = Vec::with_capacity(n);
	let mut b = Vec::with_capacity(n);
	for c in image.pixels() {
		r.push(c.r as f32);
		g.push(c.g as f32);
		b.push(c.b as f32);
	}
	[r, g, b].map(|data| Plane {
		width: w,
		height: h,
		data,
	})
}

/// Summed-area tables of values and squared values.
struct Integral {
	stride: usize,
	sum: Vec<f64>,
	sq: Vec<f64>,
}

impl Integral {
	fn new(plane: &Plane) -> Self {
		let stride = plane.width as usize + 1;
		let mut sum = vec![0.0; stride * (plane.height as usize + 1)];
		let mut sq = sum.clone();
		for y in 0..plane.height as usize {
			let mut row_sum = 0.0;
			let mut row_sq = 0.0;
			for x in 0..plane.width as usize {
				let v = plane.data[y * plane.width as usize + x] as f64;
				row_sum += v;
				row_sq += v * v;
				sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row_sum;
				sq[(y + 1) * stride + x + 1] = sq[y * stride + x + 1] + row_sq;
			}
		}
		Self { stride, sum, sq }
	}

	fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (f64, f64) {
		let (x, y, w, h) = (x as usize, y as usize, w as usize, h as usize);
		let at = |t: &[f64], xx: usize, yy: usize| t[yy * self.stride + xx];
		let rect = |t: &[f64]| at(t, x + w, y + h) - at(t, x, y + h) - at(t, x + w, y) + at(t, x, y);
		(rect(&self.sum), rect(&self.sq))
	}
}

/// Zero-mean normalized correlation summed over channels.
///
/// Flat windows or flat templates score 0.
fn ccoeff_normed(image: &[Plane], template: &[Plane]) -> ScoreMap {
	let (iw, ih) = (image[0].width, image[0].height);
	let (tw, th) = (template[0].width, template[0].height);
	let (ow, oh) = (iw - tw + 1, ih - th + 1);
	let n = (tw * th) as f64;

	let centered = template
		.iter()
		.map(|t| {
			let mean = t.data.iter().map(|v| *v as f64).sum::<f64>() / n;
			t.data.iter().map(|v| (*v as f64 - mean) as f32).collect::<Vec<_>>()
		})
		.collect::<Vec<_>>();
	let t_norm = centered
		.iter()
		.flatten()
		.map(|v| (*v as f64) * (*v as f64))
		.sum::<f64>();

	let mut data = vec![0.0f32; (ow * oh) as usize];
	if t_norm <= f64::EPSILON {
		return ScoreMap {
			width: ow,
			height: oh,
			data,
		};
	}

	let sums = image.iter().map(Integral::new).collect::<Vec<_>>();

	data.par_chunks_mut(ow as usize).enumerate().for_each(|(y, row)| {
		let y = y as u32;
		for x in 0..ow {
			let mut num = 0.0f64;
			let mut var = 0.0f64;
			for (c, plane) in image.iter().enumerate() {
				let (s, s2) = sums[c].window(x, y, tw, th);
				var += s2 - s * s / n;

				let t = &centered[c];
				let mut acc = 0.0f32;
				for ty in 0..th {
					let src = ((y + ty) * iw + x) as usize;
					let src = &plane.data[src..src + tw as usize];
					let tpl = &t[(ty * tw) as usize..((ty + 1) * tw) as usize];
					acc += src.iter().zip(tpl).map(|(a, b)| a * b).sum::<f32>();
				}
				num += acc as f64;
			}

			row[x as usize] = if var <= 1e-3 {
				0.0
			} else {
				(num / (t_norm * var).sqrt()).clamp(-1.0, 1.0) as f32
			};
		}
	});

	ScoreMap {
		width: ow,
		height: oh,
		data,
	}
}
