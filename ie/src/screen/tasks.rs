//! Task board: card detection, card classification and the quantities
//! printed on a card.
//!
//! Cards are found by edge contours first; if nothing card-sized shows up we
//! fall back to the fixed grid the board is normally laid out on.

use imageproc::contours::{BorderType, find_contours};

use crate::ocr::TextRecognizer;
use crate::reader::{self, QuantityReading, ReaderConfig};
use crate::{Card, Frame, Palette, Point, Rect, Zone};

/// Card geometry as fractions of the screen.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CardLayout {
    pub width: f32,
    pub height: f32,
    pub start_x: f32,
    pub start_y: f32,
    pub spacing: f32,
    pub max_cards: usize,
    /// Try contour detection before the fixed grid.
    pub dynamic: bool,
    /// Accepted relative deviation from the expected card size.
    pub size_tolerance: f32,
    /// Accepted height/width ratios of a detected card.
    pub aspect: (f32, f32),
    /// Where to click to select a card (fractions of the card).
    pub select_point: (f32, f32),
    /// Share of checkmark-colored pixels that marks a card as ready.
    pub checkmark_ratio: f32,
    /// Share of dark pixels in the material band that marks a card as ready.
    pub text_ratio: f32,
}

impl Default for CardLayout {
    fn default() -> Self {
        Self {
            width: 0.260,
            height: 0.678,
            start_x: 0.080,
            start_y: 0.217,
            spacing: 0.276,
            max_cards: 5,
            dynamic: true,
            size_tolerance: 0.2,
            aspect: (1.5, 2.5),
            select_point: (0.6, 1.0 / 3.0),
            checkmark_ratio: 0.01,
            text_ratio: 0.02,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    Locked,
    InProgress,
    Selectable,
}

/// A quantity printed on a card, positioned in logical coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Indicator {
    pub center: Point,
    pub bounds: Rect,
    pub reading: QuantityReading,
}

/// Card rectangles (logical), left to right.
pub fn detect_cards(frame: &Frame, layout: &CardLayout) -> Vec<Rect> {
    if layout.dynamic {
        let cards = detect_dynamic(frame, layout);
        if !cards.is_empty() {
            tracing::debug!(count = cards.len(), "cards by contour detection");
            return cards;
        }
        tracing::debug!("contour detection found no cards; using fixed grid");
    }
    fixed_cards(frame.logical_bounds(), layout)
}

/// The fixed grid, cut off at the right screen edge.
pub fn fixed_cards(screen: Rect, layout: &CardLayout) -> Vec<Rect> {
    let sw = screen.w as f32;
    let sh = screen.h as f32;
    let w = (sw * layout.width) as u32;
    let h = (sh * layout.height) as u32;
    let x0 = screen.x + (sw * layout.start_x) as i32;
    let y0 = screen.y + (sh * layout.start_y) as i32;
    let spacing = (sw * layout.spacing) as i32;

    (0..layout.max_cards as i32)
        .map(|i| Rect::new(x0 + i * spacing, y0, w, h))
        .take_while(|r| r.right() <= screen.right())
        .collect()
}

fn detect_dynamic(frame: &Frame, layout: &CardLayout) -> Vec<Rect> {
    let screen = frame.logical_bounds();
    let expected_w = (screen.w as f32 * layout.width) as u32;
    let expected_h = (screen.h as f32 * layout.height) as u32;
    let scale = frame.scale();
    let phys_w = scale.len_to_physical(expected_w).max(1) as f32;
    let phys_h = scale.len_to_physical(expected_h).max(1) as f32;

    let gray = frame.image().to_gray_image();
    let edges = imageproc::edges::canny(&gray, 50.0, 150.0);

    let tol = layout.size_tolerance;
    let mut found = Vec::new();
    for c in find_contours::<i32>(&edges) {
        if c.border_type != BorderType::Outer || c.points.is_empty() {
            continue;
        }

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
        for p in &c.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let w = (max_x - min_x + 1) as f32;
        let h = (max_y - min_y + 1) as f32;

        let width_ok = ((1.0 - tol)..=(1.0 + tol)).contains(&(w / phys_w));
        let height_ok = ((1.0 - tol)..=(1.0 + tol)).contains(&(h / phys_h));
        let aspect_ok = (layout.aspect.0..=layout.aspect.1).contains(&(h / w));
        if !(width_ok && height_ok && aspect_ok) {
            continue;
        }

        let origin = frame.to_logical(Point::new(min_x, min_y));
        found.push(Rect::new(origin.x, origin.y, expected_w, expected_h));
    }

    found.sort_by_key(|r| r.x);
    let min_gap = (expected_w as f32 * 0.3) as u32;
    let mut cards: Vec<Rect> = Vec::new();
    for r in found {
        if cards.iter().any(|c| c.x.abs_diff(r.x) < min_gap) {
            continue;
        }
        cards.push(r);
    }
    cards.truncate(layout.max_cards);
    cards
}

/// Classify a card. The lock icon is matched by the caller; it takes
/// precedence over every other signal.
pub fn classify_card(frame: &Frame, card: Rect, locked: bool, palette: &Palette, layout: &CardLayout) -> CardState {
    if locked {
        return CardState::Locked;
    }

    let (view, _) = frame.view(card);
    let green = view.fraction(|c| palette.checkmark.contains(c));
    if green > layout.checkmark_ratio {
        return CardState::Selectable;
    }

    // Material amounts sit in the upper middle of the card.
    let band = Rect::new(card.x, card.y + card.h as i32 / 4, card.w, card.h / 3);
    let (band, _) = frame.view(band);
    let dark = band.fraction(|c| c.luma() <= palette.card_text_max);
    if dark > layout.text_ratio {
        return CardState::Selectable;
    }

    CardState::InProgress
}

/// Center region of a card, where the lock icon is drawn.
pub fn lock_region(card: Rect) -> Rect {
    Rect::new(card.x + card.w as i32 / 4, card.y + card.h as i32 / 4, card.w / 2, card.h / 2)
}

pub fn select_point(card: Rect, layout: &CardLayout) -> Point {
    Point::new(
        card.x + (card.w as f32 * layout.select_point.0) as i32,
        card.y + (card.h as f32 * layout.select_point.1) as i32,
    )
}

/// Every quantity in a card's material band, left to right.
pub fn material_indicators(
    frame: &Frame,
    card: Rect,
    zone: Zone<Card>,
    ocr: &dyn TextRecognizer,
    palette: &Palette,
    cfg: &ReaderConfig,
) -> Vec<Indicator> {
    let (view, phys) = frame.view(zone.resolve(card));

    reader::number_boxes(view, palette, cfg, cfg.number_width)
        .into_iter()
        .map(|b| {
            let reading = reader::read_text_box(view, b, ocr, cfg);
            let bounds = frame.rect_to_logical(b.bounds.translated(phys.x, phys.y));
            Indicator {
                center: bounds.center(),
                bounds,
                reading,
            }
        })
        .collect()
}

/// The amount a card asks to deliver, `None` when it cannot be read.
pub fn deliver_amount(
    frame: &Frame,
    card: Rect,
    zone: Zone<Card>,
    ocr: &dyn TextRecognizer,
    palette: &Palette,
    cfg: &ReaderConfig,
) -> Option<u32> {
    let (view, _) = frame.view(zone.resolve(card));
    let (min_w, max_w) = cfg.number_width;

    // Large amounts can be wider than a single quantity.
    let number = reader::number_boxes(view, palette, cfg, (min_w, max_w * 3))
        .into_iter()
        .next()?;
    reader::read_text_box(view, number, ocr, cfg).value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::tests::ScriptedOcr;
    use crate::{Color, OwnedImage, ScaleFactor};

    fn board() -> Frame {
        Frame::new(OwnedImage::filled(1920, 1080, Color::new(200, 190, 170)), ScaleFactor::IDENTITY)
    }

    #[test]
    fn fixed_grid_stops_at_screen_edge() {
        let cards = fixed_cards(Rect::new(0, 0, 1920, 1080), &CardLayout::default());
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0], Rect::new(153, 234, 499, 732));
        assert!(cards.windows(2).all(|w| w[0].x < w[1].x));
    }

    #[test]
    fn blank_board_falls_back_to_grid() {
        let frame = board();
        let cards = detect_cards(&frame, &CardLayout::default());
        assert_eq!(cards, fixed_cards(frame.logical_bounds(), &CardLayout::default()));
    }

    #[test]
    fn card_states() {
        let layout = CardLayout::default();
        let palette = Palette::default();
        let card = Rect::new(100, 100, 400, 600);

        let frame = board();
        assert_eq!(classify_card(&frame, card, true, &palette, &layout), CardState::Locked);
        assert_eq!(classify_card(&frame, card, false, &palette, &layout), CardState::InProgress);

        let mut img = OwnedImage::filled(1920, 1080, Color::new(200, 190, 170));
        img.fill_rect(150, 300, 60, 30, Color::new(10, 10, 10));
        let frame = Frame::new(img, ScaleFactor::IDENTITY);
        assert_eq!(classify_card(&frame, card, false, &palette, &layout), CardState::Selectable);

        let mut img = OwnedImage::filled(1920, 1080, Color::new(200, 190, 170));
        img.fill_rect(400, 120, 60, 60, Color::new(40, 200, 60));
        let frame = Frame::new(img, ScaleFactor::IDENTITY);
        assert_eq!(classify_card(&frame, card, false, &palette, &layout), CardState::Selectable);
    }

    #[test]
    fn reads_indicators_with_their_colors() {
        let card = Rect::new(0, 0, 500, 1000);
        let zone = Zone::<Card>::new(0.0, 0.38, 1.0, 0.46);
        let mut img = OwnedImage::filled(600, 1000, Color::new(225, 220, 205));
        img.fill_rect(60, 400, 24, 16, Color::new(15, 15, 15));
        img.fill_rect(300, 400, 24, 16, Color::new(220, 25, 25));
        let frame = Frame::new(img, ScaleFactor::IDENTITY);

        let ocr = ScriptedOcr::new(["12", "12", "12", "3", "8", "3"]);
        let found = material_indicators(&frame, card, zone, &ocr, &Palette::default(), &ReaderConfig::default());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].reading.value, Some(12));
        assert!(!found[0].reading.is_deficit());
        assert_eq!(found[1].reading.value, Some(3));
        assert!(found[1].reading.is_deficit());
        assert_eq!(found[1].center, Point::new(312, 408));
    }

    #[test]
    fn deliver_amount_skips_shapes_that_are_not_digits() {
        let card = Rect::new(0, 0, 500, 1000);
        let zone = Zone::<Card>::new(0.0, 0.44, 1.0, 0.53);
        let mut img = OwnedImage::filled(600, 1000, Color::new(225, 220, 205));
        // A tall icon before the amount.
        img.fill_rect(40, 445, 30, 60, Color::new(15, 15, 15));
        img.fill_rect(200, 460, 90, 18, Color::new(15, 15, 15));
        let frame = Frame::new(img, ScaleFactor::IDENTITY);

        let ocr = ScriptedOcr::new(["150", "150", "160"]);
        let amount = deliver_amount(&frame, card, zone, &ocr, &Palette::default(), &ReaderConfig::default());
        assert_eq!(amount, Some(150));

        let blank = board();
        let ocr = ScriptedOcr::new(["9", "9", "9"]);
        let amount = deliver_amount(&blank, card, zone, &ocr, &Palette::default(), &ReaderConfig::default());
        assert_eq!(amount, None);
        assert_eq!(ocr.0.borrow().len(), 3);
    }
}
