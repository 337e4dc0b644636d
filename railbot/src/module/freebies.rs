use catalog::Control;

use super::Bot;
use crate::input::Aborted;

/// Collect free rewards, one dialog at a time.
pub fn collect_freebies(bot: &mut Bot) -> Result<u32, Aborted> {
	let cfg = bot.cfg;
	if !cfg.freebies.enabled {
		return Ok(0);
	}

	let mut collected = 0;
	for _ in 0..cfg.freebies.max {
		let Some(freebie) = bot.eyes.locate(Control::Freebie.into()) else {
			break;
		};
		bot.click(freebie.center)?;
		bot.hands.wait(cfg.delays.dialog())?;
		bot.escape()?;
		collected += 1;
	}
	if collected > 0 {
		tracing::info!(collected, "freebies collected");
	}
	Ok(collected)
}
