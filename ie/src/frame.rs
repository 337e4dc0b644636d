use crate::{Image, OwnedImage, Point, Rect, ScaleFactor};

/// One capture of the display together with its scale factor.
///
/// Callers speak logical coordinates; the frame maps them onto its physical
/// pixels.
pub struct Frame {
	image: OwnedImage,
	scale: ScaleFactor,
}

impl Frame {
	pub fn new(image: OwnedImage, scale: ScaleFactor) -> Self {
		Self { image, scale }
	}

	#[inline]
	pub fn scale(&self) -> ScaleFactor {
		self.scale
	}

	#[inline]
	pub fn image(&self) -> Image<'_> {
		self.image.as_image()
	}

	/// Whole frame in logical coordinates.
	pub fn logical_bounds(&self) -> Rect {
		self.scale.rect_to_logical(Rect::new(0, 0, self.image.width(), self.image.height()))
	}

	/// Physical rectangle for a logical one, clipped to the frame.
	pub fn physical_rect(&self, logical: Rect) -> Rect {
		let full = Rect::new(0, 0, self.image.width(), self.image.height());
		self.scale.to_physical(logical).intersect(&full).unwrap_or(Rect::new(0, 0, 0, 0))
	}

	/// View of a logical region plus the physical rectangle it covers.
	pub fn view(&self, logical: Rect) -> (Image<'_>, Rect) {
		let phys = self.physical_rect(logical);
		(self.image().sub_rect(phys), phys)
	}

	pub fn to_logical(&self, physical: Point) -> Point {
		self.scale.to_logical(physical)
	}

	pub fn rect_to_logical(&self, physical: Rect) -> Rect {
		self.scale.rect_to_logical(physical)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Color;

	#[test]
	fn view_maps_logical_region_onto_physical_pixels() {
		let frame = Frame::new(OwnedImage::filled(400, 200, Color::WHITE), ScaleFactor::new(2.0));
		assert_eq!(frame.logical_bounds(), Rect::new(0, 0, 200, 100));

		let (view, phys) = frame.view(Rect::new(150, 50, 100, 100));
		assert_eq!(phys, Rect::new(300, 100, 100, 100));
		assert_eq!((view.width(), view.height()), (100, 100));
	}
}
