//! What the bot can see.
//!
//! Every query takes a fresh capture, so a caller never acts on a frame
//! older than its last input.

use std::time::Duration;

use catalog::{Catalog, Control, Marker};
use ie::phrase::PhraseVerdict;
use ie::screen::crafting::{self, Requirement};
use ie::screen::tasks::{self, CardState, Indicator};
use ie::{Frame, Ie, Match, Point, Rect};

use crate::capture::Display;
use crate::config::Config;

/// Anything the locator can look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
	Control(Control),
	Marker(Marker),
}

impl Target {
	pub fn stem(self) -> &'static str {
		match self {
			Target::Control(c) => c.stem(),
			Target::Marker(m) => m.stem(),
		}
	}
}

impl From<Control> for Target {
	fn from(c: Control) -> Self {
		Target::Control(c)
	}
}

impl From<Marker> for Target {
	fn from(m: Marker) -> Self {
		Target::Marker(m)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskCard {
	pub bounds: Rect,
	pub state: CardState,
}

pub trait Observe {
	/// Logical bounds of the screen.
	fn screen(&mut self) -> Rect;

	fn locate(&mut self, target: Target) -> Option<Match>;

	/// Same as [`Observe::locate`] with a lowered threshold.
	fn locate_relaxed(&mut self, target: Target) -> Option<Match>;

	/// Requirements of the open crafting view; `None` without the strip marker.
	fn requirements(&mut self) -> Option<Vec<Requirement>>;

	/// `(busy, total)` producers.
	fn occupancy(&mut self) -> Option<(u32, u32)>;

	/// Time until the next producer frees up.
	fn cooldown(&mut self) -> Option<Duration>;

	/// Task cards left to right.
	fn cards(&mut self) -> Vec<TaskCard>;

	fn indicators(&mut self, card: Rect) -> Vec<Indicator>;

	fn deliver_amount(&mut self, card: Rect) -> Option<u32>;

	fn train_status(&mut self) -> PhraseVerdict;

	/// Name of the material whose icon sits above the quantity at `quantity`.
	fn identify_material(&mut self, quantity: Rect) -> Option<String>;
}

/// Observer over a real display.
pub struct ScreenObserver<'a, D: Display> {
	display: D,
	ie: &'a Ie,
	catalog: &'a Catalog,
	cfg: &'a Config,
}

impl<'a, D: Display> ScreenObserver<'a, D> {
	pub fn new(display: D, ie: &'a Ie, catalog: &'a Catalog, cfg: &'a Config) -> Self {
		Self {
			display,
			ie,
			catalog,
			cfg,
		}
	}

	fn frame(&mut self) -> Option<Frame> {
		match self.display.capture() {
			Ok(frame) => Some(frame),
			Err(err) => {
				tracing::warn!("capture failed: {err:#}");
				None
			}
		}
	}

	fn template(&self, target: Target) -> Option<&'a ie::Template> {
		let t = match target {
			Target::Control(c) => self.catalog.control(c),
			Target::Marker(m) => self.catalog.marker(m),
		};
		if t.is_none() {
			tracing::debug!(?target, "template not loaded");
		}
		t
	}

	fn find(&self, frame: &Frame, target: Target, factor: f32) -> Option<Match> {
		let template = self.template(target)?;
		let zone = self.cfg.search_zones.get(target.stem());
		let region = zone.resolve(frame.logical_bounds());
		let found = self.ie.locate_relaxed(frame, template, factor, Some(region));
		tracing::trace!(?target, ?region, found = found.is_some(), "locate");
		found
	}
}

impl<D: Display> Observe for ScreenObserver<'_, D> {
	fn screen(&mut self) -> Rect {
		self.frame()
			.map(|f| f.logical_bounds())
			.unwrap_or_default()
	}

	fn locate(&mut self, target: Target) -> Option<Match> {
		let frame = self.frame()?;
		self.find(&frame, target, 1.0)
	}

	fn locate_relaxed(&mut self, target: Target) -> Option<Match> {
		let frame = self.frame()?;
		self.find(&frame, target, self.cfg.relax_factor)
	}

	fn requirements(&mut self) -> Option<Vec<Requirement>> {
		let frame = self.frame()?;
		let marker = self.find(&frame, Marker::RequirementsStrip.into(), 1.0)?;
		let layout = &self.cfg.crafting.strip;
		let region = crafting::strip_region(frame.logical_bounds(), &marker, layout);
		let reqs = self.ie.read_requirements(&frame, region, layout);
		tracing::debug!(count = reqs.len(), "requirements");
		Some(reqs)
	}

	fn occupancy(&mut self) -> Option<(u32, u32)> {
		let frame = self.frame()?;
		let label = self.find(&frame, Marker::ProducersOccupied.into(), 1.0)?;
		self.ie.read_occupancy(&frame, self.cfg.occupancy_region.resolve(label.center))
	}

	fn cooldown(&mut self) -> Option<Duration> {
		let frame = self.frame()?;
		let menu = self.find(&frame, Control::TaskMenu.into(), 1.0)?;
		self.ie.read_cooldown(&frame, self.cfg.cooldown_region.resolve(menu.center))
	}

	fn cards(&mut self) -> Vec<TaskCard> {
		let Some(frame) = self.frame() else {
			return Vec::new();
		};
		let layout = &self.cfg.tasks.layout;
		let lock = self.template(Marker::LockedTask.into());

		self.ie
			.detect_cards(&frame, layout)
			.into_iter()
			.map(|bounds| {
				let locked = lock.is_some_and(|t| {
					self.ie
						.locate(&frame, t, Some(tasks::lock_region(bounds)))
						.is_some()
				});
				TaskCard {
					bounds,
					state: self.ie.classify_card(&frame, bounds, locked, layout),
				}
			})
			.collect()
	}

	fn indicators(&mut self, card: Rect) -> Vec<Indicator> {
		let Some(frame) = self.frame() else {
			return Vec::new();
		};
		self.ie.material_indicators(&frame, card, self.cfg.tasks.material_zone)
	}

	fn deliver_amount(&mut self, card: Rect) -> Option<u32> {
		let frame = self.frame()?;
		self.ie.deliver_amount(&frame, card, self.cfg.tasks.deliver_zone)
	}

	fn train_status(&mut self) -> PhraseVerdict {
		let Some(frame) = self.frame() else {
			return PhraseVerdict::Unclear;
		};
		let d = &self.cfg.dispatch;
		let region = d.status_zone.resolve(frame.logical_bounds());
		self.ie
			.read_phrase_pair(&frame, region, &d.available_phrase, &d.exhausted_phrase, d.phrase_threshold)
	}

	fn identify_material(&mut self, quantity: Rect) -> Option<String> {
		let frame = self.frame()?;
		let materials = self.catalog.materials();
		if materials.is_empty() {
			return None;
		}

		// The icon sits above its quantity and is wider than it.
		let h = quantity.h as i32;
		let area = Rect::new(quantity.x - h * 2, quantity.y - h * 5, quantity.w + h as u32 * 4, quantity.h * 6);

		let mut best: Option<(&str, f32)> = None;
		for (id, variants) in materials.iter() {
			for t in variants {
				if let Some(m) = self.ie.locate(&frame, t, Some(area))
					&& best.is_none_or(|(_, c)| m.confidence > c)
				{
					best = materials.name(id).map(|n| (n, m.confidence));
				}
			}
		}
		best.map(|(name, _)| name.to_string())
	}
}

/// Point at fractions of the screen.
pub fn screen_point(screen: Rect, at: (f32, f32)) -> Point {
	Point::new(
		screen.x + (screen.w as f32 * at.0) as i32,
		screen.y + (screen.h as f32 * at.1) as i32,
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use ie::ocr::TextRecognizer;
	use ie::reader::ReaderConfig;
	use ie::{Color, MatchWeights, OwnedImage, Palette, ScaleFactor, Template, Zone};

	struct Blind;

	impl TextRecognizer for Blind {
		fn recognize(&self, _image: ie::Image, _charset: Option<&str>) -> String {
			String::new()
		}
	}

	struct Still(OwnedImage);

	impl Display for Still {
		fn capture(&mut self) -> anyhow::Result<Frame> {
			Ok(Frame::new(self.0.clone(), ScaleFactor::new(2.0)))
		}
	}

	fn button() -> OwnedImage {
		let mut img = OwnedImage::filled(24, 16, Color::new(30, 90, 200));
		img.fill_rect(4, 4, 16, 8, Color::WHITE);
		img.fill_rect(8, 6, 4, 4, Color::new(200, 40, 40));
		img
	}

	#[test]
	fn locates_catalog_controls_in_logical_space() {
		let mut screen = OwnedImage::filled(400, 300, Color::new(120, 120, 110));
		screen.blit(button().as_image(), 200, 100);

		let mut catalog = Catalog::default();
		catalog.insert_control(Control::Confirm, Template::new("ConfirmButton", button(), 0.8));
		let ie = Ie::with_recognizer(Palette::default(), ReaderConfig::default(), MatchWeights::default(), Box::new(Blind));
		let cfg = Config::default();
		let mut eyes = ScreenObserver::new(Still(screen), &ie, &catalog, &cfg);

		let m = eyes.locate(Control::Confirm.into()).unwrap();
		assert_eq!(m.center, Point::new(106, 54));
		assert!(eyes.locate(Control::Dispatch.into()).is_none());
		assert_eq!(eyes.screen(), Rect::new(0, 0, 200, 150));
		assert_eq!(eyes.train_status(), PhraseVerdict::Unclear);
	}

	#[test]
	fn search_stays_inside_the_target_zone() {
		let mut screen = OwnedImage::filled(400, 300, Color::new(120, 120, 110));
		screen.blit(button().as_image(), 20, 20);

		let mut catalog = Catalog::default();
		catalog.insert_control(Control::Dispatch, Template::new("DispatchButton", button(), 0.8));
		let ie = Ie::with_recognizer(Palette::default(), ReaderConfig::default(), MatchWeights::default(), Box::new(Blind));

		// The default zone for dispatch is the lower right quarter.
		let cfg = Config::default();
		let mut eyes = ScreenObserver::new(Still(screen.clone()), &ie, &catalog, &cfg);
		assert!(eyes.locate(Control::Dispatch.into()).is_none());

		let mut cfg = Config::default();
		cfg.search_zones.set(Control::Dispatch.stem(), Zone::new(0.0, 0.0, 0.5, 0.5));
		let mut eyes = ScreenObserver::new(Still(screen), &ie, &catalog, &cfg);
		let m = eyes.locate(Control::Dispatch.into()).unwrap();
		assert_eq!(m.center, Point::new(16, 14));
	}

	#[test]
	fn screen_points_are_fractions() {
		assert_eq!(screen_point(Rect::new(0, 0, 1920, 1080), (0.5, 0.1)), Point::new(960, 108));
	}
}
