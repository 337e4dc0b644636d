//! The polling loop: cycles separated by scheduled waits.

use std::time::{Duration, Instant};

use crate::input::Aborted;
use crate::module::Bot;
use crate::module::freebies::collect_freebies;
use crate::module::workflow::Workflow;

pub struct Poller<'r, 'a> {
	bot: &'r mut Bot<'a>,
	next_poll: Instant,
}

impl<'r, 'a> Poller<'r, 'a> {
	pub fn new(bot: &'r mut Bot<'a>) -> Self {
		Self {
			bot,
			next_poll: Instant::now(),
		}
	}

	/// Push the next cycle back to `time`; an earlier time is ignored.
	pub fn delay_till(&mut self, time: Instant) {
		if time > self.next_poll {
			self.next_poll = time;
		}
	}

	pub fn secs_till_next_poll(&self) -> f32 {
		self.next_poll.saturating_duration_since(Instant::now()).as_secs_f32()
	}

	/// Count down before the first cycle so the game window can be focused.
	pub fn countdown(&mut self, secs: u32) -> Result<(), Aborted> {
		for left in (1..=secs).rev() {
			tracing::info!(left, "starting");
			self.bot.hands.wait(Duration::from_secs(1))?;
		}
		Ok(())
	}

	/// Run cycles until the emergency stop, or `max_cycles` if given.
	///
	/// Returns the number of completed cycles.
	pub fn run(&mut self, max_cycles: Option<u64>) -> u64 {
		let mut cycles = 0;
		while max_cycles.is_none_or(|max| cycles < max) {
			if let Err(err) = self.step() {
				tracing::info!(cycles, "{err}; stopped");
				break;
			}
			cycles += 1;
		}
		cycles
	}

	fn step(&mut self) -> Result<(), Aborted> {
		self.idle()?;
		let outcome = Workflow::new(self.bot).run_cycle()?;
		let delay = outcome.delay(self.bot.cfg);
		tracing::info!(?outcome, delay_s = delay.as_secs_f32(), "cycle finished");
		self.delay_till(Instant::now() + delay);
		Ok(())
	}

	/// Wait for the next scheduled cycle, collecting freebies meanwhile.
	fn idle(&mut self) -> Result<(), Aborted> {
		if self.next_poll <= Instant::now() {
			return Ok(());
		}
		collect_freebies(self.bot)?;

		tracing::debug!(left_s = self.secs_till_next_poll(), "idle");
		let left = self.next_poll.saturating_duration_since(Instant::now());
		if !left.is_zero() {
			self.bot.hands.wait(left)?;
		}
		Ok(())
	}
}
