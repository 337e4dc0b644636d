//! Train view: collecting returned resources and sending trains out.

use catalog::{Control, Marker};
use ie::Rect;
use ie::phrase::PhraseVerdict;

use super::Bot;
use crate::input::Aborted;
use crate::observe::screen_point;

/// Click the collect control until it disappears, at most `max_collects` times.
pub fn collect_ready(bot: &mut Bot) -> Result<u32, Aborted> {
	let mut collected = 0;
	for _ in 0..bot.cfg.dispatch.max_collects {
		let Some(collect) = bot.eyes.locate(Control::Collect.into()) else {
			break;
		};
		bot.click(collect.center)?;
		collected += 1;
	}
	if collected > 0 {
		tracing::info!(collected, "collected ready resources");
	}
	Ok(collected)
}

/// Send up to `limit` trains from the open train view.
///
/// `screen` holds the logical screen bounds. Each train slot click is followed by a read of the status line; only an
/// unambiguous "available" reading lets the dispatch control be clicked.
pub fn dispatch_trains(bot: &mut Bot, screen: Rect, limit: u32) -> Result<u32, Aborted> {
	let mut sent = 0;
	while sent < limit {
		if bot.eyes.locate(Marker::AllTrainsUsed.into()).is_some() {
			tracing::info!(sent, "all trains used");
			break;
		}

		let slot = screen_point(screen, bot.cfg.dispatch.train_slot);
		bot.click(slot)?;

		match bot.eyes.train_status() {
			PhraseVerdict::Positive => {}
			verdict => {
				tracing::info!(sent, ?verdict, "no train available");
				break;
			}
		}

		let Some(dispatch) = bot.wait_for(Control::Dispatch.into())? else {
			tracing::warn!(sent, "dispatch control missing");
			break;
		};
		bot.click(dispatch.center)?;
		sent += 1;
		tracing::debug!(sent, limit, "train dispatched");
	}

	let rest = screen_point(screen, bot.cfg.dispatch.safe_point);
	bot.hands.move_to(rest)?;
	Ok(sent)
}

/// Trains needed to bring `stock` up to `deliver`, at most `max`.
pub fn trains_needed(deliver: u32, stock: u32, capacity: u32, max: u32) -> u32 {
	let missing = deliver.saturating_sub(stock);
	missing.div_ceil(capacity.max(1)).min(max)
}
