use anyhow::Context;
use ie::{Frame, OwnedImage, ScaleFactor};
use xcap::image::EncodableLayout;

/// Source of screen frames.
pub trait Display {
	fn capture(&mut self) -> anyhow::Result<Frame>;
}

/// The primary monitor, captured through `xcap`.
pub struct XcapDisplay {
	monitor: xcap::Monitor,
	/// Display size in the coordinate space input is injected in.
	logical: (u32, u32),
}

impl XcapDisplay {
	pub fn primary(logical: (u32, u32)) -> anyhow::Result<Self> {
		let monitors = xcap::Monitor::all().context("list monitors")?;
		let mut fallback = None;
		for monitor in monitors {
			if monitor.is_primary().unwrap_or(false) {
				return Ok(Self { monitor, logical });
			}
			fallback.get_or_insert(monitor);
		}
		let monitor = fallback.context("no monitor found")?;
		tracing::warn!("no primary monitor reported; using the first one");
		Ok(Self { monitor, logical })
	}
}

impl Display for XcapDisplay {
	fn capture(&mut self) -> anyhow::Result<Frame> {
		let img = self.monitor.capture_image().context("capture monitor")?;
		let physical = (img.width(), img.height());
		let image = OwnedImage::from_rgba(img.width() as usize, img.as_bytes());
		let scale = ScaleFactor::measure(physical, self.logical);
		tracing::trace!(?physical, logical = ?self.logical, scale = scale.get(), "captured");
		Ok(Frame::new(image, scale))
	}
}
