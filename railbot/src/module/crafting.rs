//! Recursive crafting.
//!
//! An item is crafted by opening its crafting view, crafting every missing
//! ingredient first (depth first, left to right) and confirming. The
//! dependency tree is never stored; it is the call stack.

use catalog::{Control, Marker};
use ie::screen::crafting::Requirement;
use ie::{Match, Point};

use super::Bot;
use crate::input::Aborted;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CraftFailure {
	/// The crafting view or one of its controls never showed up.
	Navigation,
	DepthExceeded,
	/// Confirming was refused twice.
	StillMissing,
	ChildFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
	Crafted,
	Failed(CraftFailure),
}

pub struct Resolver<'r, 'a> {
	bot: &'r mut Bot<'a>,
}

impl<'r, 'a> Resolver<'r, 'a> {
	pub fn new(bot: &'r mut Bot<'a>) -> Self {
		Self { bot }
	}

	/// Craft whatever clicking `target` selects.
	///
	/// Only an emergency stop is an error; every other outcome is reported
	/// in the [`Resolution`].
	pub fn resolve(&mut self, target: Point) -> Result<Resolution, Aborted> {
		let resolution = self.craft(target, 0)?;
		tracing::info!(?resolution, x = target.x, y = target.y, "crafting finished");
		Ok(resolution)
	}

	fn craft(&mut self, target: Point, depth: u32) -> Result<Resolution, Aborted> {
		let max_depth = self.bot.cfg.crafting.max_depth;
		if depth >= max_depth {
			tracing::warn!(depth, max_depth, "crafting tree too deep; giving up on this branch");
			return Ok(Resolution::Failed(CraftFailure::DepthExceeded));
		}

		let Some(mut confirm) = self.navigate(target)? else {
			return Ok(Resolution::Failed(CraftFailure::Navigation));
		};
		let Some(requirements) = self.bot.eyes.requirements() else {
			tracing::warn!(depth, "requirements strip not found");
			return Ok(Resolution::Failed(CraftFailure::Navigation));
		};

		if has_deficits(&requirements) {
			match self.craft_children(target, &requirements, depth)? {
				Ok(m) => confirm = m,
				Err(failure) => return Ok(Resolution::Failed(failure)),
			}
		} else {
			tracing::debug!(depth, count = requirements.len(), "all requirements satisfied");
		}

		self.bot.click(confirm.center)?;
		if let Some(failure) = self.verify(target, depth)? {
			return Ok(Resolution::Failed(failure));
		}

		tracing::info!(depth, x = target.x, y = target.y, "crafted");
		if depth > 0 {
			self.bot.escape()?;
		}
		Ok(Resolution::Crafted)
	}

	/// Select `target`, open its crafting view and wait for the confirm control.
	fn navigate(&mut self, target: Point) -> Result<Option<Match>, Aborted> {
		self.bot.click(target)?;
		let Some(open) = self.bot.find_relaxed(Control::OpenCrafting.into()) else {
			tracing::debug!(x = target.x, y = target.y, "no crafting control");
			return Ok(None);
		};

		self.bot.hands.click(open.center)?;
		self.bot.hands.wait(self.bot.cfg.delays.crafting_view())?;

		let confirm = self.bot.wait_for(Control::Confirm.into())?;
		if confirm.is_none() {
			tracing::warn!(x = target.x, y = target.y, "crafting view did not open");
		}
		Ok(confirm)
	}

	/// Craft every ingredient in deficit, returning to this view after each.
	///
	/// A failed ingredient does not stop its siblings, but the item itself
	/// then fails. On success the confirm control of the last navigation is
	/// returned.
	fn craft_children(
		&mut self,
		target: Point,
		requirements: &[Requirement],
		depth: u32,
	) -> Result<Result<Match, CraftFailure>, Aborted> {
		let mut failed = false;
		let mut confirm = None;

		for req in requirements.iter().filter(|r| r.deficit() > 0) {
			tracing::info!(depth, current = req.current, required = req.required, "ingredient missing");
			if let Resolution::Failed(failure) = self.craft(req.icon, depth + 1)? {
				tracing::warn!(depth, ?failure, "ingredient not crafted");
				failed = true;
			}

			match self.navigate(target)? {
				Some(m) => confirm = Some(m),
				None => return Ok(Err(CraftFailure::Navigation)),
			}
		}

		if failed {
			return Ok(Err(CraftFailure::ChildFailed));
		}
		Ok(confirm.ok_or(CraftFailure::Navigation))
	}

	/// Handle the "not enough materials" popup after a confirm.
	///
	/// Dismiss it, rescan, craft what is still missing and confirm exactly
	/// once more. A second popup is final.
	fn verify(&mut self, target: Point, depth: u32) -> Result<Option<CraftFailure>, Aborted> {
		if self.bot.eyes.locate(Marker::NotEnoughMaterials.into()).is_none() {
			return Ok(None);
		}
		tracing::info!(depth, "not enough materials; rescanning");
		self.bot.escape()?;

		let Some(requirements) = self.bot.eyes.requirements() else {
			return Ok(Some(CraftFailure::Navigation));
		};
		let confirm = if has_deficits(&requirements) {
			match self.craft_children(target, &requirements, depth)? {
				Ok(m) => m,
				Err(failure) => return Ok(Some(failure)),
			}
		} else {
			match self.bot.eyes.locate(Control::Confirm.into()) {
				Some(m) => m,
				None => return Ok(Some(CraftFailure::Navigation)),
			}
		};

		self.bot.click(confirm.center)?;
		if self.bot.eyes.locate(Marker::NotEnoughMaterials.into()).is_some() {
			tracing::warn!(depth, "still not enough materials");
			self.bot.escape()?;
			return Ok(Some(CraftFailure::StillMissing));
		}
		Ok(None)
	}
}

fn has_deficits(requirements: &[Requirement]) -> bool {
	requirements.iter().any(|r| r.deficit() > 0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::Config;
	use crate::module::testing::{Item, World, fake, item_point};

	fn run(world: World, cfg: &Config) -> (Result<Resolution, Aborted>, World) {
		let (shared, mut eyes, mut hands) = fake(world);
		let result = {
			let mut bot = Bot::new(cfg, &mut eyes, &mut hands);
			Resolver::new(&mut bot).resolve(item_point(0))
		};
		let world = shared.borrow().clone();
		(result, world)
	}

	#[test]
	fn satisfied_recipe_confirms_without_recursing() {
		let world = World::crafting(vec![Item::craftable(0, vec![(1, 2)]), Item::stocked(5)]);
		let (result, world) = run(world, &Config::default());

		assert_eq!(result, Ok(Resolution::Crafted));
		assert_eq!(world.crafted, vec![0]);
		assert_eq!(world.clicks_on(item_point(1)), 0);
		assert_eq!(world.items[1].stock, 3);
	}

	#[test]
	fn one_deficit_recurses_once_before_the_parent_confirms() {
		let mut child = Item::craftable(2, vec![(2, 1)]);
		child.output = 3;
		let world = World::crafting(vec![Item::craftable(0, vec![(1, 5)]), child, Item::stocked(10)]);
		let (result, world) = run(world, &Config::default());

		assert_eq!(result, Ok(Resolution::Crafted));
		assert_eq!(world.crafted, vec![1, 0]);
		assert_eq!(world.clicks_on(item_point(1)), 1);
		// Initial navigation plus the return after the ingredient.
		assert_eq!(world.clicks_on(item_point(0)), 2);
	}

	#[test]
	fn depth_bound_fails_the_branch_without_error() {
		let mut cfg = Config::default();
		cfg.crafting.max_depth = 2;
		let world = World::crafting(vec![
			Item::craftable(0, vec![(1, 1)]),
			Item::craftable(0, vec![(2, 1)]),
			Item::craftable(0, vec![(3, 1)]),
			Item::stocked(0),
		]);
		let (result, world) = run(world, &cfg);

		assert_eq!(result, Ok(Resolution::Failed(CraftFailure::ChildFailed)));
		assert_eq!(world.clicks_on(item_point(2)), 0);
		assert!(world.crafted.is_empty());

		cfg.crafting.max_depth = 0;
		let (result, world) = run(World::crafting(vec![Item::stocked(0)]), &cfg);
		assert_eq!(result, Ok(Resolution::Failed(CraftFailure::DepthExceeded)));
		assert!(world.actions.is_empty());
	}

	#[test]
	fn failed_ingredient_does_not_stop_its_siblings() {
		let world = World::crafting(vec![
			Item::craftable(0, vec![(1, 2), (2, 2)]),
			Item::stocked(0),
			Item::craftable(0, vec![(3, 1)]),
			Item::stocked(5),
		]);
		let (result, world) = run(world, &Config::default());

		assert_eq!(result, Ok(Resolution::Failed(CraftFailure::ChildFailed)));
		assert_eq!(world.crafted, vec![2]);
		assert_eq!(world.confirms_on(0), 0);
	}

	#[test]
	fn popup_triggers_one_rescan_and_one_more_confirm() {
		let mut root = Item::craftable(0, vec![(1, 5)]);
		root.misread_once = true;
		let mut child = Item::craftable(2, vec![(2, 1)]);
		child.output = 3;
		let world = World::crafting(vec![root, child, Item::stocked(10)]);
		let (result, world) = run(world, &Config::default());

		assert_eq!(result, Ok(Resolution::Crafted));
		assert_eq!(world.confirms_on(0), 2);
		assert_eq!(world.crafted, vec![1, 0]);
	}

	#[test]
	fn second_popup_is_final() {
		let mut child = Item::craftable(0, vec![(2, 1)]);
		child.output = 0;
		let world = World::crafting(vec![Item::craftable(0, vec![(1, 5)]), child, Item::stocked(10)]);
		let (result, world) = run(world, &Config::default());

		assert_eq!(result, Ok(Resolution::Failed(CraftFailure::StillMissing)));
		assert_eq!(world.confirms_on(0), 2);
	}

	#[test]
	fn emergency_stop_propagates() {
		let mut world = World::crafting(vec![Item::craftable(0, vec![(1, 2)]), Item::stocked(5)]);
		world.abort_after_clicks = Some(1);
		let (result, world) = run(world, &Config::default());

		assert_eq!(result, Err(Aborted));
		assert!(world.crafted.is_empty());
	}
}
