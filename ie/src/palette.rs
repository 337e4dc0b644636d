use crate::{Color, Image};

/// Inclusive HSV box (hue in `0..180`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct HsvRange {
    pub hue: (u8, u8),
    pub saturation: (u8, u8),
    pub value: (u8, u8),
}

impl HsvRange {
    pub const fn new(hue: (u8, u8), saturation: (u8, u8), value: (u8, u8)) -> Self {
        Self {
            hue,
            saturation,
            value,
        }
    }

    pub fn contains(&self, color: Color) -> bool {
        let hsv = color.to_hsv();
        (self.hue.0..=self.hue.1).contains(&hsv.h)
            && (self.saturation.0..=self.saturation.1).contains(&hsv.s)
            && (self.value.0..=self.value.1).contains(&hsv.v)
    }
}

/// UI colors the readers classify pixels by.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Palette {
    /// Quantities the player is short of are drawn in these colors (red wraps
    /// around the hue circle, hence more than one band).
    pub deficit: Vec<HsvRange>,
    /// Plain quantity text is at most this bright.
    pub dark_text_max: u8,
    /// Card labels are at most this bright.
    pub card_text_max: u8,
    /// Completed-requirement checkmark on task cards.
    pub checkmark: HsvRange,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            deficit: vec![
                HsvRange::new((0, 10), (100, 255), (100, 255)),
                HsvRange::new((160, 179), (100, 255), (100, 255)),
            ],
            dark_text_max: 80,
            card_text_max: 50,
            checkmark: HsvRange::new((40, 80), (100, 255), (100, 255)),
        }
    }
}

impl Palette {
    #[inline]
    pub fn is_deficit(&self, color: Color) -> bool {
        self.deficit.iter().any(|r| r.contains(color))
    }

    #[inline]
    pub fn is_dark_text(&self, color: Color) -> bool {
        color.luma() <= self.dark_text_max
    }

    /// Derive the deficit bands from a sample of the deficit text color.
    ///
    /// Uses the median HSV of the saturated pixels of `sample`, widened by
    /// 15 hue steps (wrapping) and 50 saturation/value steps below the
    /// median. Samples without saturated pixels keep the current bands.
    pub fn with_deficit_sample(mut self, sample: Image) -> Self {
        let mut hues = Vec::new();
        let mut sats = Vec::new();
        let mut vals = Vec::new();
        for c in sample.pixels() {
            let hsv = c.to_hsv();
            if hsv.s > 50 && hsv.v > 50 {
                hues.push(hsv.h);
                sats.push(hsv.s);
                vals.push(hsv.v);
            }
        }
        if hues.is_empty() {
            tracing::warn!("deficit sample has no saturated pixels; keeping default bands");
            return self;
        }

        let h = median(&mut hues) as i16;
        let s_min = median(&mut sats).saturating_sub(50);
        let v_min = median(&mut vals).saturating_sub(50);
        let (lo, hi) = (h - 15, h + 15);

        let band = |a: i16, b: i16| HsvRange::new((a as u8, b as u8), (s_min, 255), (v_min, 255));
        self.deficit = if lo < 0 {
            vec![band(0, hi), band(180 + lo, 179)]
        } else if hi > 179 {
            vec![band(lo, 179), band(0, hi - 180)]
        } else {
            vec![band(lo, hi)]
        };
        tracing::info!(hue = h, s_min, v_min, "sampled deficit color");
        self
    }
}

fn median(values: &mut [u8]) -> u8 {
    values.sort_unstable();
    values[values.len() / 2]
}
