//! railbot: screen-driven automation of the crafting and dispatch loop.
//!
//! Move the pointer into the top-left screen corner to stop.

mod capture;
mod config;
mod input;
mod module;
mod observe;
mod poller;
mod util;

use anyhow::Context;
use catalog::{Catalog, Marker};
use tracing_subscriber::EnvFilter;

use crate::capture::XcapDisplay;
use crate::config::Config;
use crate::input::{AbortSignal, EnigoInput};
use crate::module::Bot;
use crate::observe::ScreenObserver;
use crate::poller::Poller;

fn main() -> anyhow::Result<()> {
    // Structured logging. Use `RUST_LOG=debug` etc.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut cfg = Config::load_or_default();
    let assets = util::assets::resolve_assets(cfg.assets_dir.as_deref(), &cfg.ocr_language)?;

    let mut ie = ie::Ie::try_new(
        cfg.palette.clone(),
        cfg.reader.clone(),
        cfg.matching,
        &assets.ocr.detection,
        &assets.ocr.recognition,
        &assets.ocr.charset,
    )
    .context("load OCR models")?;

    let catalog = Catalog::load(&assets.templates).context("load templates")?;
    if let Some(sample) = catalog.marker(Marker::DeficitSample) {
        ie.sample_deficit_color(sample.image());
        tracing::info!("deficit colors sampled");
    }
    cfg.tasks.skip_materials = resolve_materials(&catalog, &cfg.tasks.skip_materials);

    let signal = AbortSignal::default();
    let mut hands = EnigoInput::try_new(signal, cfg.abort_margin)?;
    let display = XcapDisplay::primary(hands.display_size()?)?;
    let mut eyes = ScreenObserver::new(display, &ie, &catalog, &cfg);

    let mut bot = Bot::new(&cfg, &mut eyes, &mut hands);
    let mut poller = Poller::new(&mut bot);
    tracing::info!("move the pointer to the top-left corner to stop");
    if let Err(err) = poller.countdown(cfg.startup_delay_s.max(0.0) as u32) {
        tracing::info!("{err}; stopped before the first cycle");
        return Ok(());
    }

    let cycles = poller.run(None);
    tracing::info!(cycles, "railbot finished");
    Ok(())
}

/// Map configured material names to the closest catalog names.
fn resolve_materials(catalog: &Catalog, names: &[String]) -> Vec<String> {
    let materials = catalog.materials();
    names
        .iter()
        .filter_map(|name| {
            let resolved = materials.closest(name).and_then(|id| materials.name(id));
            if resolved.is_none() {
                tracing::warn!(material = %name, "unknown material in skip list");
            }
            resolved.map(str::to_string)
        })
        .collect()
}
