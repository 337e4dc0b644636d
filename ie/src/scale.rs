//! Conversion between captured (physical) pixels and injected (logical) points.
//!
//! A capture can be larger than the coordinate space used for pointer input
//! (high-DPI displays). One factor is measured per capture and every
//! coordinate crossing that boundary goes through it exactly once.

use crate::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScaleFactor(f32);

impl Default for ScaleFactor {
	fn default() -> Self {
		Self::IDENTITY
	}
}

impl ScaleFactor {
	pub const IDENTITY: Self = Self(1.0);

	/// Mean of the width and height ratios of `physical` over `logical`.
	///
	/// Degenerate sizes yield the identity factor.
	pub fn measure(physical: (u32, u32), logical: (u32, u32)) -> Self {
		if physical.0 == 0 || physical.1 == 0 || logical.0 == 0 || logical.1 == 0 {
			return Self::IDENTITY;
		}
		let sx = physical.0 as f32 / logical.0 as f32;
		let sy = physical.1 as f32 / logical.1 as f32;
		Self((sx + sy) / 2.0)
	}

	/// Non-positive or non-finite values fall back to identity.
	pub fn new(factor: f32) -> Self {
		if factor.is_finite() && factor > 0.0 {
			Self(factor)
		} else {
			Self::IDENTITY
		}
	}

	#[inline]
	pub fn get(self) -> f32 {
		self.0
	}

	#[inline]
	fn up(self, v: i32) -> i32 {
		(v as f32 * self.0).round() as i32
	}

	#[inline]
	fn down(self, v: i32) -> i32 {
		(v as f32 / self.0).round() as i32
	}

	pub fn to_physical(self, r: Rect) -> Rect {
		let x = self.up(r.x);
		let y = self.up(r.y);
		let right = self.up(r.right());
		let bottom = self.up(r.bottom());
		Rect::new(x, y, (right - x).max(0) as u32, (bottom - y).max(0) as u32)
	}

	pub fn to_logical(self, p: Point) -> Point {
		Point::new(self.down(p.x), self.down(p.y))
	}

	pub fn point_to_physical(self, p: Point) -> Point {
		Point::new(self.up(p.x), self.up(p.y))
	}

	pub fn rect_to_logical(self, r: Rect) -> Rect {
		let x = self.down(r.x);
		let y = self.down(r.y);
		let right = self.down(r.right());
		let bottom = self.down(r.bottom());
		Rect::new(x, y, (right - x).max(0) as u32, (bottom - y).max(0) as u32)
	}

	/// Logical length of a physical distance.
	pub fn len_to_logical(self, v: u32) -> u32 {
		(v as f32 / self.0).round() as u32
	}

	pub fn len_to_physical(self, v: u32) -> u32 {
		(v as f32 * self.0).round() as u32
	}
}
