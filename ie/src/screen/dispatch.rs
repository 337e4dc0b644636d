//! Dispatch view: status phrase, producer occupancy and cooldown timers.

use std::time::Duration;

use crate::ocr::TextRecognizer;
use crate::phrase::{self, PhraseVerdict};
use crate::reader::{self, ReaderConfig};
use crate::{Frame, Rect};

/// Classify the status text in `region` (logical) against two phrases.
///
/// Both renderings are checked. A verdict only stands when no rendering
/// contradicts it.
pub fn read_status(
    frame: &Frame,
    region: Rect,
    ocr: &dyn TextRecognizer,
    cfg: &ReaderConfig,
    positive: &str,
    negative: &str,
    threshold: f32,
) -> PhraseVerdict {
    let (view, _) = frame.view(region);
    let texts = reader::read_texts(view, ocr, cfg);
    let verdicts = texts
        .iter()
        .map(|t| phrase::classify(t, positive, negative, threshold))
        .collect::<Vec<_>>();
    tracing::debug!(?texts, ?verdicts, "status text");
    combine(&verdicts)
}

fn combine(verdicts: &[PhraseVerdict]) -> PhraseVerdict {
    let pos = verdicts.contains(&PhraseVerdict::Positive);
    let neg = verdicts.contains(&PhraseVerdict::Negative);
    match (pos, neg) {
        (true, false) => PhraseVerdict::Positive,
        (false, true) => PhraseVerdict::Negative,
        _ => PhraseVerdict::Unclear,
    }
}

/// `busy/total` producer occupancy, `None` when unreadable.
pub fn read_occupancy(frame: &Frame, region: Rect, ocr: &dyn TextRecognizer, cfg: &ReaderConfig) -> Option<(u32, u32)> {
    let (view, _) = frame.view(region);
    let (busy, total, raw) = reader::read_ratio(view, ocr, cfg)?;
    tracing::debug!(busy, total, raw = %raw, "occupancy");
    Some((busy, total))
}

/// Remaining time on a cooldown timer, from whichever rendering parses.
pub fn read_cooldown(frame: &Frame, region: Rect, ocr: &dyn TextRecognizer, cfg: &ReaderConfig) -> Option<Duration> {
    let (view, _) = frame.view(region);
    reader::read_texts(view, ocr, cfg)
        .iter()
        .find_map(|t| reader::parse_duration(t))
}
