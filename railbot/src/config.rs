//! Persistent bot configuration.
//!
//! Stored as JSON in a platform-appropriate config directory. Every field
//! has a default, so a partial file only overrides what it names.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use catalog::Control;
use ie::reader::ReaderConfig;
use ie::screen::crafting::StripLayout;
use ie::screen::tasks::CardLayout;
use ie::{Anchored, Card, MatchWeights, Palette, Screen, Zone};
use serde::{Deserialize, Serialize};

/// Longest delay any setting can ask for (seconds).
pub const MAX_DELAY_S: f32 = 86_400.0;

/// Non-negative duration from a configured number of seconds.
///
/// NaN counts as zero and huge values are capped at [`MAX_DELAY_S`].
#[inline]
pub fn secs(v: f32) -> Duration {
    if v.is_nan() {
        return Duration::ZERO;
    }
    Duration::from_secs_f32(v.clamp(0.0, MAX_DELAY_S))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder holding `ocr/` and `templates/`; searched for when unset.
    pub assets_dir: Option<PathBuf>,
    /// Prefix of the OCR recognition model and charset files.
    pub ocr_language: String,

    pub delays: Delays,
    pub retry: RetryPolicy,
    pub crafting: CraftingConfig,
    pub tasks: TasksConfig,
    pub dispatch: DispatchConfig,
    pub freebies: FreebiesConfig,

    pub reader: ReaderConfig,
    pub matching: MatchWeights,
    pub palette: Palette,
    /// Factor applied to a template's threshold for the one relaxed retry.
    pub relax_factor: f32,
    pub search_zones: SearchZones,

    /// Producer occupancy counter, around the occupancy label.
    pub occupancy_region: Anchored,
    /// Cooldown timer, relative to the task menu control.
    pub cooldown_region: Anchored,

    /// Wait between cycles when nothing else decides it (seconds).
    pub poll_interval_s: f32,
    /// Added to a read cooldown before polling again (seconds).
    pub cooldown_buffer_s: f32,
    /// Countdown before the first cycle (seconds).
    pub startup_delay_s: f32,
    /// Pointer within this many logical pixels of the top-left corner stops the bot.
    pub abort_margin: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets_dir: None,
            ocr_language: "latin".to_string(),
            delays: Delays::default(),
            retry: RetryPolicy::default(),
            crafting: CraftingConfig::default(),
            tasks: TasksConfig::default(),
            dispatch: DispatchConfig::default(),
            freebies: FreebiesConfig::default(),
            reader: ReaderConfig::default(),
            matching: MatchWeights::default(),
            palette: Palette::default(),
            relax_factor: 0.85,
            search_zones: SearchZones::default(),
            occupancy_region: Anchored::new(0, 0, 80, 40),
            cooldown_region: Anchored::new(0, -60, 120, 60),
            poll_interval_s: 30.0,
            cooldown_buffer_s: 10.0,
            startup_delay_s: 5.0,
            abort_margin: 5,
        }
    }
}

/// Part of the screen searched for each control and marker, keyed by
/// template stem. Stems without an entry are searched over the whole screen.
///
/// A configured table replaces the defaults as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchZones(BTreeMap<String, Zone<Screen>>);

impl Default for SearchZones {
    fn default() -> Self {
        Self(BTreeMap::from([(
            Control::Dispatch.stem().to_string(),
            Zone::new(0.5, 0.5, 1.0, 1.0),
        )]))
    }
}

impl SearchZones {
    pub const FULL: Zone<Screen> = Zone::new(0.0, 0.0, 1.0, 1.0);

    pub fn get(&self, stem: &str) -> Zone<Screen> {
        self.0.get(stem).copied().unwrap_or(Self::FULL)
    }

    pub fn set(&mut self, stem: impl Into<String>, zone: Zone<Screen>) {
        self.0.insert(stem.into(), zone);
    }
}

/// Settle times after input (seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Delays {
    pub after_click_s: f32,
    pub after_escape_s: f32,
    /// A dialog or menu opening.
    pub dialog_s: f32,
    /// The crafting view opening.
    pub crafting_view_s: f32,
    /// Pause before the next cycle after one that changed something.
    pub after_cycle_s: f32,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            after_click_s: 0.5,
            after_escape_s: 0.5,
            dialog_s: 1.0,
            crafting_view_s: 1.5,
            after_cycle_s: 5.0,
        }
    }
}

impl Delays {
    pub fn after_click(&self) -> Duration {
        secs(self.after_click_s)
    }

    pub fn after_escape(&self) -> Duration {
        secs(self.after_escape_s)
    }

    pub fn dialog(&self) -> Duration {
        secs(self.dialog_s)
    }

    pub fn crafting_view(&self) -> Duration {
        secs(self.crafting_view_s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Base backoff; attempt `n` waits `n * backoff_s`.
    pub backoff_s: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_s: 0.5,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        secs(self.backoff_s * attempt as f32)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CraftingConfig {
    pub max_depth: u32,
    pub strip: StripLayout,
}

impl Default for CraftingConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            strip: StripLayout::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub layout: CardLayout,
    /// Band of a card holding the material quantities.
    pub material_zone: Zone<Card>,
    /// Band of a card holding the amount to deliver.
    pub deliver_zone: Zone<Card>,
    /// A material icon sits this fraction of the screen height above its quantity.
    pub icon_offset: f32,
    pub max_scrolls: u32,
    /// Logical length of one scroll drag.
    pub scroll_px: i32,
    pub scroll_s: f32,
    /// Materials never crafted automatically (closest catalog names).
    pub skip_materials: Vec<String>,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            layout: CardLayout::default(),
            material_zone: Zone::new(0.5, 0.38, 1.0, 0.46),
            deliver_zone: Zone::new(0.5, 0.44, 1.0, 0.53),
            icon_offset: 0.046,
            max_scrolls: 3,
            scroll_px: 400,
            scroll_s: 0.5,
            skip_materials: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Train slot to click, as fractions of the screen.
    pub train_slot: (f32, f32),
    /// Where the pointer rests once dispatching stops.
    pub safe_point: (f32, f32),
    pub status_zone: Zone<Screen>,
    pub available_phrase: String,
    pub exhausted_phrase: String,
    pub phrase_threshold: f32,
    pub max_dispatches: u32,
    pub max_collects: u32,
    /// Units one train brings back from a producing source.
    pub average_capacity: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            train_slot: (1.0 / 6.0, 0.85),
            safe_point: (0.5, 0.1),
            status_zone: Zone::new(0.4774, 0.7339, 0.9462, 0.7728),
            available_phrase: "TAP THE TRAIN TO".to_string(),
            exhausted_phrase: "PLEASE WAIT UNTIL".to_string(),
            phrase_threshold: 0.70,
            max_dispatches: 10,
            max_collects: 10,
            average_capacity: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FreebiesConfig {
    pub enabled: bool,
    pub max: u32,
}

impl Default for FreebiesConfig {
    fn default() -> Self {
        Self { enabled: true, max: 4 }
    }
}

impl Config {
    /// Path to the config file.
    pub fn path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("config_dir() unavailable")?;
        Ok(base.join("railbot.json"))
    }

    /// Load configuration from disk, falling back to defaults on any error.
    pub fn load_or_default() -> Self {
        match Self::try_load() {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load config; using defaults");
                Self::default()
            }
        }
    }

    /// Load from disk; a missing file is written out with the defaults.
    pub fn try_load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            let cfg = Self::default();
            if let Err(err) = cfg.save() {
                tracing::debug!(error = %err, "could not write default config");
            }
            return Ok(cfg);
        }
        let json = fs::read_to_string(&path).with_context(|| format!("read {:?}", path))?;
        Self::from_json(&json).with_context(|| format!("parse {:?}", path))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(&path, json).with_context(|| format!("write {:?}", path))?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        secs(self.poll_interval_s)
    }

    pub fn cooldown_buffer(&self) -> Duration {
        secs(self.cooldown_buffer_s)
    }
}
