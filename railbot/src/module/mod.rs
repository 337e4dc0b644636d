use ie::{Match, Point};

use crate::config::Config;
use crate::input::{Aborted, Input, Key};
use crate::observe::{Observe, Target};

pub mod crafting;
pub mod dispatch;
pub mod freebies;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

/// Configuration plus the two halves of the outside world.
///
/// Steps borrow it for their duration; nothing else is shared between them.
pub struct Bot<'a> {
	pub cfg: &'a Config,
	pub eyes: &'a mut dyn Observe,
	pub hands: &'a mut dyn Input,
}

impl<'a> Bot<'a> {
	pub fn new(cfg: &'a Config, eyes: &'a mut dyn Observe, hands: &'a mut dyn Input) -> Self {
		Self { cfg, eyes, hands }
	}

	/// Click and let the UI settle.
	pub fn click(&mut self, at: Point) -> Result<(), Aborted> {
		self.hands.click(at)?;
		self.hands.wait(self.cfg.delays.after_click())
	}

	pub fn escape(&mut self) -> Result<(), Aborted> {
		self.hands.key_press(Key::Escape)?;
		self.hands.wait(self.cfg.delays.after_escape())
	}

	/// Look for `target` on fresh captures, backing off between attempts.
	pub fn wait_for(&mut self, target: Target) -> Result<Option<Match>, Aborted> {
		let retry = &self.cfg.retry;
		for attempt in 0..retry.attempts.max(1) {
			if attempt > 0 {
				self.hands.wait(retry.backoff(attempt))?;
			}
			if let Some(m) = self.eyes.locate(target) {
				return Ok(Some(m));
			}
			tracing::debug!(?target, attempt, "not visible yet");
		}
		Ok(None)
	}

	/// Locate, relaxing the threshold once on a miss.
	pub fn find_relaxed(&mut self, target: Target) -> Option<Match> {
		self.eyes.locate(target).or_else(|| {
			tracing::debug!(?target, "retrying with relaxed threshold");
			self.eyes.locate_relaxed(target)
		})
	}
}
