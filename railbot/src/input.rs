//! Synthetic input and the emergency stop.
//!
//! All coordinates are logical. Every call checks the emergency stop first:
//! once the pointer has been seen in the top-left corner, each later call
//! returns [`Aborted`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use enigo::{Button, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};
use ie::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("emergency stop: pointer moved into the screen corner")]
pub struct Aborted;

/// Shared emergency stop flag.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
	pub fn trip(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_tripped(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}

	pub fn check(&self) -> Result<(), Aborted> {
		if self.is_tripped() { Err(Aborted) } else { Ok(()) }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
	Escape,
}

pub trait Input {
	fn click(&mut self, at: Point) -> Result<(), Aborted>;
	fn move_to(&mut self, at: Point) -> Result<(), Aborted>;
	fn key_press(&mut self, key: Key) -> Result<(), Aborted>;
	fn drag(&mut self, from: Point, to: Point, duration: Duration) -> Result<(), Aborted>;
	/// Sleep, still honouring the emergency stop.
	fn wait(&mut self, duration: Duration) -> Result<(), Aborted>;
}

const WAIT_SLICE: Duration = Duration::from_millis(100);
const DRAG_STEPS: i32 = 10;

pub struct EnigoInput {
	enigo: Enigo,
	signal: AbortSignal,
	margin: i32,
}

impl EnigoInput {
	pub fn try_new(signal: AbortSignal, margin: i32) -> anyhow::Result<Self> {
		let enigo = Enigo::new(&Settings::default()).map_err(|err| anyhow::anyhow!("input init failed: {err:?}"))?;
		Ok(Self { enigo, signal, margin })
	}

	/// Logical size of the main display.
	pub fn display_size(&self) -> anyhow::Result<(u32, u32)> {
		let (w, h) = self
			.enigo
			.main_display()
			.map_err(|err| anyhow::anyhow!("display size unavailable: {err:?}"))?;
		Ok((w.max(0) as u32, h.max(0) as u32))
	}

	/// Trip the signal if the pointer sits in the corner, then check it.
	fn guard(&mut self) -> Result<(), Aborted> {
		if let Ok((x, y)) = self.enigo.location()
			&& x <= self.margin
			&& y <= self.margin
		{
			if !self.signal.is_tripped() {
				tracing::warn!(x, y, "pointer in the corner; stopping");
			}
			self.signal.trip();
		}
		self.signal.check()
	}

	fn pointer_to(&mut self, at: Point) {
		if let Err(err) = self.enigo.move_mouse(at.x, at.y, Coordinate::Abs) {
			tracing::warn!(x = at.x, y = at.y, "move failed: {err:?}");
		}
	}

	fn left(&mut self, direction: Direction) {
		if let Err(err) = self.enigo.button(Button::Left, direction) {
			tracing::warn!("button {direction:?} failed: {err:?}");
		}
	}
}

impl Input for EnigoInput {
	fn click(&mut self, at: Point) -> Result<(), Aborted> {
		self.guard()?;
		tracing::debug!(x = at.x, y = at.y, "click");
		self.pointer_to(at);
		self.left(Direction::Click);
		Ok(())
	}

	fn move_to(&mut self, at: Point) -> Result<(), Aborted> {
		self.guard()?;
		self.pointer_to(at);
		Ok(())
	}

	fn key_press(&mut self, key: Key) -> Result<(), Aborted> {
		self.guard()?;
		let k = match key {
			Key::Escape => enigo::Key::Escape,
		};
		if let Err(err) = self.enigo.key(k, Direction::Click) {
			tracing::warn!("key {key:?} failed: {err:?}");
		}
		Ok(())
	}

	fn drag(&mut self, from: Point, to: Point, duration: Duration) -> Result<(), Aborted> {
		self.guard()?;
		tracing::debug!(from_x = from.x, from_y = from.y, to_x = to.x, to_y = to.y, "drag");
		self.pointer_to(from);
		self.left(Direction::Press);

		let step = duration / DRAG_STEPS as u32;
		for i in 1..=DRAG_STEPS {
			let p = Point::new(
				from.x + (to.x - from.x) * i / DRAG_STEPS,
				from.y + (to.y - from.y) * i / DRAG_STEPS,
			);
			std::thread::sleep(step);
			self.pointer_to(p);
		}

		self.left(Direction::Release);
		Ok(())
	}

	fn wait(&mut self, duration: Duration) -> Result<(), Aborted> {
		let deadline = Instant::now() + duration;
		loop {
			self.guard()?;
			let left = deadline.saturating_duration_since(Instant::now());
			if left.is_zero() {
				return Ok(());
			}
			std::thread::sleep(left.min(WAIT_SLICE));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn signal_is_shared_between_clones() {
		let a = AbortSignal::default();
		let b = a.clone();
		assert_eq!(b.check(), Ok(()));
		a.trip();
		assert_eq!(b.check(), Err(Aborted));
	}
}
