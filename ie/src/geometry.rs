//! Points, rectangles and relative zones.
//!
//! Pixel types carry no unit of their own; whether a value is logical or
//! physical is decided by where it came from (see [`crate::ScaleFactor`]).

use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Point {
	pub x: i32,
	pub y: i32,
}

impl Point {
	#[inline]
	pub const fn new(x: i32, y: i32) -> Self {
		Self { x, y }
	}

	#[inline]
	pub const fn offset(self, dx: i32, dy: i32) -> Self {
		Self::new(self.x + dx, self.y + dy)
	}

	/// Chebyshev distance, the metric used for duplicate suppression.
	pub fn chebyshev(self, other: Point) -> u32 {
		self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
	}
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rect {
	pub x: i32,
	pub y: i32,
	pub w: u32,
	pub h: u32,
}

impl Rect {
	#[inline]
	pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
		Self { x, y, w, h }
	}

	#[inline]
	pub fn right(&self) -> i32 {
		self.x + self.w as i32
	}

	#[inline]
	pub fn bottom(&self) -> i32 {
		self.y + self.h as i32
	}

	pub fn center(&self) -> Point {
		Point::new(self.x + self.w as i32 / 2, self.y + self.h as i32 / 2)
	}

	pub fn area(&self) -> u64 {
		self.w as u64 * self.h as u64
	}

	pub fn contains(&self, p: Point) -> bool {
		p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
	}

	/// Smallest rectangle covering both.
	pub fn union(&self, other: &Rect) -> Rect {
		let x = self.x.min(other.x);
		let y = self.y.min(other.y);
		let right = self.right().max(other.right());
		let bottom = self.bottom().max(other.bottom());
		Rect::new(x, y, (right - x) as u32, (bottom - y) as u32)
	}

	/// Overlap of both rectangles, `None` when they are disjoint.
	pub fn intersect(&self, other: &Rect) -> Option<Rect> {
		let x = self.x.max(other.x);
		let y = self.y.max(other.y);
		let right = self.right().min(other.right());
		let bottom = self.bottom().min(other.bottom());
		if right <= x || bottom <= y {
			return None;
		}
		Some(Rect::new(x, y, (right - x) as u32, (bottom - y) as u32))
	}

	/// Grow on every side, never below zero size.
	pub fn padded(&self, pad: i32) -> Rect {
		let w = (self.w as i32 + pad * 2).max(0) as u32;
		let h = (self.h as i32 + pad * 2).max(0) as u32;
		Rect::new(self.x - pad, self.y - pad, w, h)
	}

	pub fn translated(&self, dx: i32, dy: i32) -> Rect {
		Rect::new(self.x + dx, self.y + dy, self.w, self.h)
	}
}

/// Marker for zones expressed as fractions of the whole captured screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Screen;

/// Marker for zones expressed as fractions of a single task card.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Card;

/// A sub-region given as fractions (0.0..=1.0) of a container.
///
/// The container kind is part of the type, so a card-relative zone can only
/// be resolved against a card rectangle.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(bound = "")]
pub struct Zone<C> {
	pub left: f32,
	pub top: f32,
	pub right: f32,
	pub bottom: f32,
	#[serde(skip)]
	container: PhantomData<C>,
}

impl<C> Clone for Zone<C> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<C> Copy for Zone<C> {}

impl<C> PartialEq for Zone<C> {
	fn eq(&self, other: &Self) -> bool {
		self.left == other.left && self.top == other.top && self.right == other.right && self.bottom == other.bottom
	}
}

impl<C> Zone<C> {
	pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
		Self {
			left,
			top,
			right,
			bottom,
			container: PhantomData,
		}
	}

	/// Absolute rectangle inside `container`.
	pub fn resolve(&self, container: Rect) -> Rect {
		let w = container.w as f32;
		let h = container.h as f32;
		let x1 = container.x + (w * self.left.clamp(0.0, 1.0)).round() as i32;
		let y1 = container.y + (h * self.top.clamp(0.0, 1.0)).round() as i32;
		let x2 = container.x + (w * self.right.clamp(0.0, 1.0)).round() as i32;
		let y2 = container.y + (h * self.bottom.clamp(0.0, 1.0)).round() as i32;
		Rect::new(x1, y1, (x2 - x1).max(0) as u32, (y2 - y1).max(0) as u32)
	}

	pub fn center(&self, container: Rect) -> Point {
		self.resolve(container).center()
	}
}

/// A fixed-size region centered at an offset from a located anchor
/// (logical pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Anchored {
	pub dx: i32,
	pub dy: i32,
	pub w: u32,
	pub h: u32,
}

impl Anchored {
	pub const fn new(dx: i32, dy: i32, w: u32, h: u32) -> Self {
		Self { dx, dy, w, h }
	}

	pub fn resolve(&self, anchor: Point) -> Rect {
		let c = anchor.offset(self.dx, self.dy);
		Rect::new(c.x - self.w as i32 / 2, c.y - self.h as i32 / 2, self.w, self.h)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn zone_resolves_against_its_container() {
		let zone = Zone::<Card>::new(0.5, 0.38, 1.0, 0.46);
		let card = Rect::new(100, 200, 400, 1000);
		assert_eq!(zone.resolve(card), Rect::new(300, 580, 200, 80));
	}

	#[test]
	fn inverted_zone_collapses_to_empty() {
		let zone = Zone::<Screen>::new(0.6, 0.6, 0.4, 0.4);
		let r = zone.resolve(Rect::new(0, 0, 100, 100));
		assert_eq!(r.area(), 0);
	}

	#[test]
	fn rect_union_and_intersection() {
		let a = Rect::new(0, 0, 10, 10);
		let b = Rect::new(5, 5, 10, 10);
		assert_eq!(a.union(&b), Rect::new(0, 0, 15, 15));
		assert_eq!(a.intersect(&b), Some(Rect::new(5, 5, 5, 5)));
		assert_eq!(a.intersect(&Rect::new(20, 20, 1, 1)), None);
	}

	#[test]
	fn anchored_region_is_centered_on_offset() {
		let r = Anchored::new(0, -60, 120, 60).resolve(Point::new(500, 400));
		assert_eq!(r, Rect::new(440, 310, 120, 60));
	}

	#[test]
	fn chebyshev_takes_the_larger_axis() {
		assert_eq!(Point::new(0, 0).chebyshev(Point::new(-29, 12)), 29);
	}
}
