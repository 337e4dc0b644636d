//! Crafting view: the requirements strip above the requirements marker.

use crate::ocr::TextRecognizer;
use crate::reader::{self, ReaderConfig};
use crate::{Frame, Match, Palette, Point, Rect};

/// Placement of the requirements strip relative to its marker.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StripLayout {
    /// Strip width as a fraction of the screen width.
    pub width: f32,
    /// Strip height as a fraction of the screen height.
    pub height: f32,
    /// Logical gap between the strip's bottom edge and the marker's top.
    pub gap: i32,
    /// Logical distance from a requirement's text up to its icon.
    pub icon_offset: i32,
}

impl Default for StripLayout {
    fn default() -> Self {
        Self {
            width: 0.30,
            height: 0.05,
            gap: 20,
            icon_offset: 50,
        }
    }
}

/// One ingredient of the recipe shown in the crafting view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub current: u32,
    pub required: u32,
    /// Logical bounds of the `current/required` text.
    pub text: Rect,
    /// Logical point that opens this ingredient.
    pub icon: Point,
}

impl Requirement {
    #[inline]
    pub fn deficit(&self) -> u32 {
        self.required.saturating_sub(self.current)
    }
}

/// Logical rectangle of the strip for a located marker.
pub fn strip_region(screen: Rect, marker: &Match, layout: &StripLayout) -> Rect {
    let w = (screen.w as f32 * layout.width) as u32;
    let h = (screen.h as f32 * layout.height) as u32;
    let x = marker.center.x - w as i32 / 2;
    let y = marker.bounds.y - layout.gap - h as i32;
    Rect::new(x, y, w, h)
}

/// Read every requirement in `region` (logical), left to right.
pub fn read_requirements(
    frame: &Frame,
    region: Rect,
    layout: &StripLayout,
    ocr: &dyn TextRecognizer,
    palette: &Palette,
    cfg: &ReaderConfig,
) -> Vec<Requirement> {
    let (view, phys) = frame.view(region);
    reader::read_ratios(view, ocr, palette, cfg)
        .into_iter()
        .map(|r| {
            let text = frame.rect_to_logical(r.bounds.translated(phys.x, phys.y));
            Requirement {
                current: r.current,
                required: r.required,
                text,
                icon: text.center().offset(0, -layout.icon_offset),
            }
        })
        .collect()
}
