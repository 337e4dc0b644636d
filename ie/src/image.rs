//! Image primitives and utilities.
//!
//! Screen captures are kept in a lightweight owned RGB image (`OwnedImage`)
//! and most analysis borrows a view (`Image<'a>`) of a sub-region instead of
//! copying pixels. Conversions to `image`/`imageproc` buffers happen only at
//! the edges (template scoring, thresholding, OCR input).

use anyhow::{Context, Result};

/// Owned RGB image (no alpha).
#[derive(Clone, Debug)]
pub struct OwnedImage {
    width: u32,
    height: u32,
    data: Vec<Color>,
}

impl OwnedImage {
    /// Build an `OwnedImage` from RGBA bytes (alpha is discarded).
    ///
    /// The buffer is expected to be tightly packed: `width * height * 4` bytes.
    pub fn from_rgba(width: usize, bytes: &[u8]) -> Self {
        let width = width.max(1);
        let height = bytes.len() / width / 4;
        let data = bytes
            .chunks_exact(4)
            .take(width * height)
            .map(|v| Color::new(v[0], v[1], v[2]))
            .collect::<Vec<_>>();

        Self {
            width: width as u32,
            height: height as u32,
            data,
        }
    }

    /// Decode an encoded image (PNG for templates). Alpha is dropped.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)
            .context("decode image")?
            .to_rgb8();
        Ok(Self::from_rgb_image(&img))
    }

    pub fn from_rgb_image(img: &image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        let data = img
            .pixels()
            .map(|p| Color::new(p.0[0], p.0[1], p.0[2]))
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// Solid image, mostly useful for building synthetic scenes.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            width,
            height,
            data: vec![color; (width * height) as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x < self.width && y < self.height {
            self.data[(x + y * self.width) as usize] = color;
        }
    }

    /// Fill a rectangle, clipped to the image.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: Color) {
        for yy in y..(y + height).min(self.height) {
            for xx in x..(x + width).min(self.width) {
                self.data[(xx + yy * self.width) as usize] = color;
            }
        }
    }

    /// Copy `src` into this image with its top-left corner at `(x, y)`.
    pub fn blit(&mut self, src: Image, x: u32, y: u32) {
        for sy in 0..src.height() {
            for sx in 0..src.width() {
                self.set_pixel(x + sx, y + sy, src.get(sx, sy));
            }
        }
    }

    /// Resize this image to the given height (preserving aspect ratio).
    ///
    /// Uses `fast_image_resize` (SIMD-optimized) and keeps output in `Vec<Color>`.
    /// On resizer failure the image is left untouched.
    pub fn resize_h(&mut self, height: u32) {
        if self.height == height || self.width == 0 || self.height == 0 {
            return;
        }

        let height = height.max(1);
        let width = ((self.width as u64 * height as u64 / self.height as u64) as u32).max(1);
        self.resize(
            width,
            height,
            fast_image_resize::ResizeAlg::Interpolation(fast_image_resize::FilterType::CatmullRom),
        );
    }

    #[inline]
    pub fn resized_h(mut self, height: u32) -> Self {
        self.resize_h(height);
        self
    }

    /// Shrink by an integer factor, averaging each `factor x factor` block.
    ///
    /// The result is `width / factor` by `height / factor` (at least 1x1).
    pub fn shrunk(mut self, factor: u32) -> Self {
        if factor <= 1 || self.width == 0 || self.height == 0 {
            return self;
        }
        let width = (self.width / factor).max(1);
        let height = (self.height / factor).max(1);
        self.resize(
            width,
            height,
            fast_image_resize::ResizeAlg::Convolution(fast_image_resize::FilterType::Box),
        );
        self
    }

    fn resize(&mut self, width: u32, height: u32, alg: fast_image_resize::ResizeAlg) {
        // SAFETY: `Color` is `#[repr(C)]` with 3 x `u8`, so it is layout-compatible
        // with `fast_image_resize::pixels::U8x3` (alignment 1).
        let src_pixels = unsafe {
            std::slice::from_raw_parts(
                self.data.as_ptr() as *const fast_image_resize::pixels::U8x3,
                self.data.len(),
            )
        };

        let Ok(src) = fast_image_resize::images::ImageRef::from_pixels(self.width, self.height, src_pixels) else {
            return;
        };

        let mut dst = fast_image_resize::images::Image::new(width, height, fast_image_resize::PixelType::U8x3);

        let mut resizer = fast_image_resize::Resizer::new();
        let options = fast_image_resize::ResizeOptions::new().resize_alg(alg);

        if let Err(err) = resizer.resize(&src, &mut dst, &Some(options)) {
            tracing::debug!(error = %err, "resize failed; keeping original size");
            return;
        }

        let bytes: Vec<u8> = dst.into_vec();
        let data = bytes
            .chunks_exact(3)
            .map(|px| Color::new(px[0], px[1], px[2]))
            .collect();

        self.width = width;
        self.height = height;
        self.data = data;
    }

    /// Create a borrowed view of this entire image.
    pub fn as_image<'a>(&'a self) -> Image<'a> {
        Image {
            x1: 0,
            y1: 0,
            x2: self.width,
            y2: self.height,
            true_width: self.width,
            data: &self.data,
        }
    }

    /// Convert to a grayscale `GrayImage` (luma).
    pub fn to_gray_image(&self) -> image::GrayImage {
        self.as_image().to_gray_image()
    }

    /// Create an RGB `OwnedImage` from a grayscale image (each pixel repeated into RGB).
    pub fn from_gray_as_rgb(gray: &image::GrayImage) -> Self {
        let (w, h) = gray.dimensions();
        let data = gray
            .pixels()
            .map(|p| Color::new(p.0[0], p.0[0], p.0[0]))
            .collect();
        Self {
            width: w,
            height: h,
            data,
        }
    }
}

// ----------

/// Borrowed image view into an `OwnedImage`.
#[derive(Clone, Copy)]
pub struct Image<'a> {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
    true_width: u32,
    data: &'a [Color],
}

impl<'a> Image<'a> {
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    /// Offset of this view inside the image it borrows from.
    #[inline]
    pub fn origin(&self) -> (u32, u32) {
        (self.x1, self.y1)
    }

    #[inline(always)]
    fn pixel(&self, x: u32, y: u32) -> &Color {
        &self.data[(x + y * self.true_width) as usize]
    }

    /// Pixel at view-relative coordinates.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Color {
        *self.pixel(self.x1 + x, self.y1 + y)
    }

    pub fn pixels(&self) -> impl Iterator<Item = Color> + '_ {
        (self.y1..self.y2).flat_map(move |y| (self.x1..self.x2).map(move |x| *self.pixel(x, y)))
    }

    pub fn to_owned_image(self) -> OwnedImage {
        OwnedImage {
            width: self.width(),
            height: self.height(),
            data: self.pixels().collect(),
        }
    }

    pub fn get_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity((self.width() * self.height() * 3) as usize);
        for clr in self.pixels() {
            bytes.extend_from_slice(&[clr.r, clr.g, clr.b]);
        }
        bytes
    }

    pub fn to_rgb_image(&self) -> image::RgbImage {
        let mut out = image::RgbImage::new(self.width(), self.height());
        for (x, y, p) in out.enumerate_pixels_mut() {
            let c = self.get(x, y);
            *p = image::Rgb([c.r, c.g, c.b]);
        }
        out
    }

    pub fn to_gray_image(&self) -> image::GrayImage {
        let mut out = image::GrayImage::new(self.width(), self.height());
        for (x, y, p) in out.enumerate_pixels_mut() {
            *p = image::Luma([self.get(x, y).luma()]);
        }
        out
    }

    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        self.to_rgb_image()
            .save_with_format(path, image::ImageFormat::Png)
            .context("save png")?;
        Ok(())
    }

    /// Create an arbitrary subimage (relative coordinates), clipped to this view.
    pub fn sub_image(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let x = x.min(self.width());
        let y = y.min(self.height());
        let width = width.min(self.width() - x);
        let height = height.min(self.height() - y);

        Self {
            x1: self.x1 + x,
            y1: self.y1 + y,
            x2: self.x1 + x + width,
            y2: self.y1 + y + height,
            true_width: self.true_width,
            data: self.data,
        }
    }

    /// Subimage for a possibly out-of-bounds rectangle (negative origins clip to 0).
    pub fn sub_rect(&self, r: crate::Rect) -> Self {
        let x = r.x.max(0) as u32;
        let y = r.y.max(0) as u32;
        let w = (r.right().max(0) as u32).saturating_sub(x);
        let h = (r.bottom().max(0) as u32).saturating_sub(y);
        self.sub_image(x, y, w, h)
    }

    /// Share of pixels (0.0..=1.0) accepted by `f`. Empty views yield 0.
    pub fn fraction(&self, f: impl Fn(Color) -> bool) -> f32 {
        let total = self.width() * self.height();
        if total == 0 {
            return 0.0;
        }
        self.pixels().filter(|c| f(*c)).count() as f32 / total as f32
    }
}

/// Invert a binary image if it is mostly dark, so text ends up dark on light.
pub(crate) fn ensure_dark_text_on_light(mut bin: image::GrayImage) -> image::GrayImage {
    let mut white = 0u64;
    let mut black = 0u64;
    for p in bin.pixels() {
        if p.0[0] > 0 {
            white += 1;
        } else {
            black += 1;
        }
    }
    if black > white {
        for p in bin.pixels_mut() {
            p.0[0] = 255u8.saturating_sub(p.0[0]);
        }
    }
    bin
}

// ----------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[repr(C)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Compute luma (grayscale intensity).
    pub fn luma(&self) -> u8 {
        let r = self.r as u32;
        let g = self.g as u32;
        let b = self.b as u32;
        ((299 * r + 587 * g + 114 * b) / 1000) as u8
    }

    /// HSV with hue in `0..180` and saturation/value in `0..=255`.
    ///
    /// Half-degree hue keeps it in a byte and matches the ranges the game
    /// colors were measured in.
    pub fn to_hsv(&self) -> Hsv {
        let r = self.r as f32;
        let g = self.g as f32;
        let b = self.b as f32;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };
        let h = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * ((g - b) / delta)
        } else if max == g {
            60.0 * ((b - r) / delta) + 120.0
        } else {
            60.0 * ((r - g) / delta) + 240.0
        };
        let h = if h < 0.0 { h + 360.0 } else { h };

        Hsv {
            h: ((h / 2.0).round() as u16 % 180) as u8,
            s: s.round() as u8,
            v: max as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_of_primaries() {
        assert_eq!(Color::new(255, 0, 0).to_hsv(), Hsv { h: 0, s: 255, v: 255 });
        assert_eq!(Color::new(0, 255, 0).to_hsv(), Hsv { h: 60, s: 255, v: 255 });
        assert_eq!(Color::new(0, 0, 255).to_hsv(), Hsv { h: 120, s: 255, v: 255 });
        assert_eq!(Color::new(40, 40, 40).to_hsv().s, 0);
    }

    #[test]
    fn magenta_red_wraps_into_upper_band() {
        let hsv = Color::new(230, 20, 60).to_hsv();
        assert!(hsv.h >= 160, "hue {}", hsv.h);
    }

    #[test]
    fn sub_rect_clips_negative_origin() {
        let img = OwnedImage::filled(20, 10, Color::WHITE);
        let view = img.as_image().sub_rect(crate::Rect::new(-5, -5, 10, 10));
        assert_eq!((view.width(), view.height()), (5, 5));
        assert_eq!(view.origin(), (0, 0));
    }

    #[test]
    fn fraction_counts_matching_pixels() {
        let mut img = OwnedImage::filled(10, 10, Color::WHITE);
        img.fill_rect(0, 0, 5, 2, Color::BLACK);
        let dark = img.as_image().fraction(|c| c.luma() < 50);
        assert!((dark - 0.1).abs() < 1e-6);
    }

    #[test]
    fn from_rgba_drops_alpha() {
        let img = OwnedImage::from_rgba(2, &[1, 2, 3, 255, 4, 5, 6, 0]);
        assert_eq!((img.width(), img.height()), (2, 1));
        assert_eq!(img.as_image().get(1, 0), Color::new(4, 5, 6));
    }

    #[test]
    fn shrunk_averages_blocks() {
        let mut img = OwnedImage::filled(8, 4, Color::WHITE);
        img.fill_rect(0, 0, 4, 4, Color::BLACK);
        let small = img.shrunk(4);
        assert_eq!((small.width(), small.height()), (2, 1));
        assert!(small.as_image().get(0, 0).luma() < 30);
        assert!(small.as_image().get(1, 0).luma() > 225);
    }
}
