//! One pass over the task board.
//!
//! A cycle checks that a producer is free, opens the task menu, picks the
//! first selectable task and either dispatches it or crafts its first
//! missing material. Nothing is remembered between cycles; every decision is
//! made on fresh observations.

use std::time::Duration;

use catalog::{Control, Marker};
use ie::screen::tasks::{self, CardState, Indicator};
use ie::Rect;

use super::Bot;
use super::crafting::{CraftFailure, Resolution, Resolver};
use super::dispatch::{collect_ready, dispatch_trains, trains_needed};
use crate::config::{Config, secs};
use crate::input::Aborted;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
	/// Every producer is busy; wait this long.
	ProducersBusy(Duration),
	MenuMissing,
	NoTask,
	/// Trains sent for a task.
	Dispatched(u32),
	Crafted,
	/// Trains sent to a producing source for a missing material.
	Generated(u32),
	Skipped,
	CraftFailed(CraftFailure),
}

impl CycleOutcome {
	/// How long to wait before the next cycle.
	pub fn delay(&self, cfg: &Config) -> Duration {
		match self {
			Self::ProducersBusy(wait) => *wait,
			Self::Dispatched(_) | Self::Crafted | Self::Generated(_) => secs(cfg.delays.after_cycle_s),
			_ => cfg.poll_interval(),
		}
	}
}

pub struct Workflow<'r, 'a> {
	bot: &'r mut Bot<'a>,
	/// Logical screen bounds, read once per cycle.
	screen: Option<Rect>,
}

impl<'r, 'a> Workflow<'r, 'a> {
	pub fn new(bot: &'r mut Bot<'a>) -> Self {
		Self { bot, screen: None }
	}

	fn screen(&mut self) -> Rect {
		if let Some(screen) = self.screen {
			return screen;
		}
		let screen = self.bot.eyes.screen();
		self.screen = Some(screen);
		screen
	}

	pub fn run_cycle(&mut self) -> Result<CycleOutcome, Aborted> {
		if let Some(wait) = self.producers_busy() {
			return Ok(CycleOutcome::ProducersBusy(wait));
		}

		let Some(menu) = self.bot.find_relaxed(Control::TaskMenu.into()) else {
			tracing::warn!("task menu not found");
			return Ok(CycleOutcome::MenuMissing);
		};
		self.bot.click(menu.center)?;
		self.bot.hands.wait(self.bot.cfg.delays.dialog())?;

		if let Some(collect) = self.bot.eyes.locate(Control::CollectTask.into()) {
			tracing::info!("collecting completed task");
			self.bot.click(collect.center)?;
			self.bot.hands.wait(self.bot.cfg.delays.dialog())?;
		}

		let Some(card) = self.select_task()? else {
			tracing::info!("no selectable task");
			self.bot.escape()?;
			return Ok(CycleOutcome::NoTask);
		};

		let indicators = self.bot.eyes.indicators(card);
		tracing::debug!(count = indicators.len(), "material indicators");
		match indicators.into_iter().find(|i| i.reading.is_deficit()) {
			None => self.dispatch_card(card),
			Some(first) => self.resolve_and_retry(card, first),
		}
	}

	/// `Some(wait)` when no producer is free.
	///
	/// An unreadable counter is treated as possibly free; the rest of the
	/// cycle will find out.
	fn producers_busy(&mut self) -> Option<Duration> {
		match self.bot.eyes.occupancy() {
			Some((busy, total)) if total > 0 && busy >= total => {
				let cfg = self.bot.cfg;
				let wait = match self.bot.eyes.cooldown() {
					Some(cooldown) => cooldown + cfg.cooldown_buffer(),
					None => cfg.poll_interval(),
				};
				tracing::info!(busy, total, wait_s = wait.as_secs_f32(), "all producers busy");
				Some(wait)
			}
			Some((busy, total)) => {
				tracing::debug!(busy, total, "producer free");
				None
			}
			None => {
				tracing::debug!("occupancy unreadable; assuming a producer is free");
				None
			}
		}
	}

	/// First selectable card, scrolling the board left when none is.
	fn select_task(&mut self) -> Result<Option<Rect>, Aborted> {
		let cfg = self.bot.cfg;
		for scroll in 0..=cfg.tasks.max_scrolls {
			if scroll > 0 {
				let from = self.screen().center();
				self.bot.hands.drag(from, from.offset(-cfg.tasks.scroll_px, 0), secs(cfg.tasks.scroll_s))?;
				self.bot.hands.wait(cfg.delays.after_click())?;
			}

			let cards = self.bot.eyes.cards();
			if let Some(card) = cards.iter().find(|c| c.state == CardState::Selectable) {
				tracing::debug!(scroll, x = card.bounds.x, "task selected");
				return Ok(Some(card.bounds));
			}
			tracing::debug!(scroll, count = cards.len(), "no selectable card");
		}
		Ok(None)
	}

	fn dispatch_card(&mut self, card: Rect) -> Result<CycleOutcome, Aborted> {
		let cfg = self.bot.cfg;
		self.bot.click(tasks::select_point(card, &cfg.tasks.layout))?;
		if self.bot.wait_for(Marker::TrainView.into())?.is_none() {
			tracing::warn!("train view did not open");
			self.bot.escape()?;
			return Ok(CycleOutcome::Skipped);
		}

		collect_ready(self.bot)?;
		let screen = self.screen();
		let sent = dispatch_trains(self.bot, screen, cfg.dispatch.max_dispatches)?;
		self.bot.escape()?;
		Ok(CycleOutcome::Dispatched(sent))
	}

	/// Craft (or generate) the first missing material of `card`.
	fn resolve_and_retry(&mut self, card: Rect, first: Indicator) -> Result<CycleOutcome, Aborted> {
		let cfg = self.bot.cfg;
		let deliver = self.bot.eyes.deliver_amount(card);
		let stock = first.reading.value;

		let material = self.bot.eyes.identify_material(first.bounds);
		tracing::info!(?material, ?stock, ?deliver, "material missing");
		if let Some(name) = &material
			&& cfg.tasks.skip_materials.iter().any(|s| s.eq_ignore_ascii_case(name))
		{
			tracing::info!(material = %name, "material is skipped");
			self.bot.escape()?;
			return Ok(CycleOutcome::Skipped);
		}

		let screen = self.screen();
		let target = first.center.offset(0, -((screen.h as f32 * cfg.tasks.icon_offset) as i32));
		let resolution = Resolver::new(self.bot).resolve(target)?;
		let outcome = match resolution {
			Resolution::Crafted => CycleOutcome::Crafted,
			Resolution::Failed(CraftFailure::Navigation) if self.bot.eyes.locate(Marker::ProducerStrip.into()).is_some() => {
				self.generate(deliver, stock)?
			}
			Resolution::Failed(failure) => CycleOutcome::CraftFailed(failure),
		};

		self.bot.escape()?;
		Ok(outcome)
	}

	/// Send trains to the producing source that is open.
	fn generate(&mut self, deliver: Option<u32>, stock: Option<u32>) -> Result<CycleOutcome, Aborted> {
		let (Some(deliver), Some(stock)) = (deliver, stock) else {
			tracing::info!(?deliver, ?stock, "amounts unreadable; not generating");
			return Ok(CycleOutcome::Skipped);
		};
		let d = &self.bot.cfg.dispatch;
		let trains = trains_needed(deliver, stock, d.average_capacity, d.max_dispatches);
		tracing::info!(deliver, stock, trains, "generating from source");
		let screen = self.screen();
		let sent = dispatch_trains(self.bot, screen, trains)?;
		Ok(CycleOutcome::Generated(sent))
	}
}
