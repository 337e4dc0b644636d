//! A scripted game for the resolver and workflow tests.
//!
//! The world is shared between a fake observer and a fake input so both can
//! be borrowed by a [`super::Bot`] at once.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use catalog::{Control, Marker};
use ie::phrase::PhraseVerdict;
use ie::reader::{QuantityReading, TextColor};
use ie::screen::crafting::Requirement;
use ie::screen::tasks::{CardState, Indicator};
use ie::{Match, Point, Rect};

use crate::config::Config;
use crate::input::{Aborted, Input, Key};
use crate::observe::{Observe, TaskCard, Target, screen_point};

pub const SCREEN: Rect = Rect::new(0, 0, 1920, 1080);
pub const OPEN_CRAFTING: Point = Point::new(900, 900);
pub const CONFIRM: Point = Point::new(1000, 950);
pub const TASK_MENU: Point = Point::new(60, 1000);
pub const COLLECT_TASK: Point = Point::new(500, 560);
pub const COLLECT: Point = Point::new(640, 820);
pub const DISPATCH: Point = Point::new(1500, 900);
pub const FREEBIE: Point = Point::new(1800, 120);

/// Where item `i` is clicked to select it.
pub fn item_point(i: usize) -> Point {
	Point::new(100 + 100 * i as i32, 400)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
	Click(Point),
	Move(Point),
	Key(Key),
	Drag(Point, Point),
	Wait(Duration),
}

#[derive(Debug, Clone)]
pub struct Item {
	pub stock: u32,
	/// (ingredient, amount)
	pub recipe: Vec<(usize, u32)>,
	/// Units added per confirm.
	pub output: u32,
	/// Produced by trains instead of crafting.
	pub source: bool,
	/// The first scan reports every requirement as met.
	pub misread_once: bool,
}

impl Item {
	pub fn craftable(stock: u32, recipe: Vec<(usize, u32)>) -> Self {
		Self {
			stock,
			recipe,
			output: 1,
			source: false,
			misread_once: false,
		}
	}

	pub fn stocked(stock: u32) -> Self {
		Self::craftable(stock, Vec::new())
	}

	pub fn source(stock: u32) -> Self {
		Self {
			source: true,
			..Self::stocked(stock)
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
	Idle,
	Selected(usize),
	Crafting(usize),
	NotEnough(usize),
	TaskMenu,
	Trains,
}

#[derive(Debug, Clone)]
pub struct World {
	pub view: View,
	pub actions: Vec<Action>,
	pub abort_after_clicks: Option<usize>,

	pub items: Vec<Item>,
	/// Items in the order they were crafted.
	pub crafted: Vec<usize>,
	/// Item of every confirm click, successful or not.
	pub confirm_log: Vec<usize>,

	pub occupancy: Option<(u32, u32)>,
	pub cooldown: Option<Duration>,
	pub menu_visible: bool,
	pub completed_task: bool,
	/// Cards per scroll position.
	pub pages: Vec<Vec<TaskCard>>,
	pub page: usize,
	pub indicators: Vec<Indicator>,
	pub deliver: Option<u32>,
	pub material: Option<String>,

	pub ready_resources: u32,
	/// Answers to successive train slot clicks; `Negative` once exhausted.
	pub statuses: VecDeque<PhraseVerdict>,
	pub last_status: Option<PhraseVerdict>,
	pub trains_left: u32,
	pub dispatched: u32,
	pub freebies: u32,
	/// Calls to `Observe::screen`.
	pub screen_reads: u32,
}

impl Default for World {
	fn default() -> Self {
		Self {
			view: View::Idle,
			actions: Vec::new(),
			abort_after_clicks: None,
			items: Vec::new(),
			crafted: Vec::new(),
			confirm_log: Vec::new(),
			occupancy: Some((1, 3)),
			cooldown: None,
			menu_visible: true,
			completed_task: false,
			pages: Vec::new(),
			page: 0,
			indicators: Vec::new(),
			deliver: None,
			material: None,
			ready_resources: 0,
			statuses: VecDeque::new(),
			last_status: None,
			trains_left: 5,
			dispatched: 0,
			freebies: 0,
			screen_reads: 0,
		}
	}
}

impl World {
	pub fn crafting(items: Vec<Item>) -> Self {
		Self {
			items,
			..Self::default()
		}
	}

	pub fn clicks_on(&self, p: Point) -> usize {
		self.actions.iter().filter(|a| **a == Action::Click(p)).count()
	}

	pub fn escapes(&self) -> usize {
		self.actions.iter().filter(|a| **a == Action::Key(Key::Escape)).count()
	}

	/// Confirms clicked while item `i`'s crafting view was open.
	pub fn confirms_on(&self, i: usize) -> usize {
		self.confirm_log.iter().filter(|c| **c == i).count()
	}

	fn clicks(&self) -> usize {
		self.actions.iter().filter(|a| matches!(a, Action::Click(_))).count()
	}

	fn at_trains(&self) -> bool {
		match self.view {
			View::Trains => true,
			View::Selected(i) => self.items[i].source,
			_ => false,
		}
	}

	fn item_at(&self, p: Point) -> Option<usize> {
		(0..self.items.len()).find(|i| item_point(*i) == p)
	}

	fn card_at(&self, p: Point) -> bool {
		self.pages
			.get(self.page)
			.is_some_and(|cards| cards.iter().any(|c| c.bounds.contains(p)))
	}

	fn click(&mut self, p: Point) {
		let slot = screen_point(SCREEN, Config::default().dispatch.train_slot);
		let view = self.view;
		match view {
			View::Selected(i) if p == OPEN_CRAFTING && !self.items[i].recipe.is_empty() => {
				self.view = View::Crafting(i);
			}
			View::Crafting(i) if p == CONFIRM => self.confirm(i),
			View::TaskMenu if p == COLLECT_TASK && self.completed_task => self.completed_task = false,
			View::TaskMenu if self.item_at(p).is_none() && self.card_at(p) => self.view = View::Trains,
			_ if self.at_trains() && p == slot => {
				self.last_status = Some(self.statuses.pop_front().unwrap_or(PhraseVerdict::Negative));
			}
			_ if self.at_trains() && p == COLLECT && self.ready_resources > 0 => self.ready_resources -= 1,
			_ if self.at_trains() && p == DISPATCH && self.dispatch_visible() => {
				self.dispatched += 1;
				self.trains_left -= 1;
				self.last_status = None;
			}
			_ if p == FREEBIE && self.freebies > 0 => self.freebies -= 1,
			View::NotEnough(_) => {}
			_ if p == TASK_MENU && self.menu_visible => self.view = View::TaskMenu,
			_ => {
				if let Some(i) = self.item_at(p) {
					self.view = View::Selected(i);
				}
			}
		}
	}

	fn confirm(&mut self, i: usize) {
		self.confirm_log.push(i);
		let recipe = self.items[i].recipe.clone();
		if recipe.iter().any(|(c, n)| self.items[*c].stock < *n) {
			self.view = View::NotEnough(i);
			return;
		}
		for (c, n) in recipe {
			self.items[c].stock -= n;
		}
		self.items[i].stock += self.items[i].output;
		self.crafted.push(i);
	}

	fn escape(&mut self) {
		self.view = match self.view {
			View::NotEnough(i) => View::Crafting(i),
			_ => View::Idle,
		};
	}

	fn dispatch_visible(&self) -> bool {
		self.last_status == Some(PhraseVerdict::Positive) && self.trains_left > 0
	}

	fn requirements(&mut self, i: usize) -> Vec<Requirement> {
		let misread = std::mem::take(&mut self.items[i].misread_once);
		self.items[i]
			.recipe
			.iter()
			.map(|(c, n)| {
				let stock = self.items[*c].stock;
				let icon = item_point(*c);
				Requirement {
					current: if misread { stock.max(*n) } else { stock },
					required: *n,
					text: Rect::new(icon.x - 20, icon.y + 40, 40, 16),
					icon,
				}
			})
			.collect()
	}
}

fn at(p: Point) -> Option<Match> {
	Some(Match {
		center: p,
		bounds: Rect::new(p.x - 20, p.y - 10, 40, 20),
		confidence: 0.95,
	})
}

/// A card on the task board.
pub fn card(index: i32, state: CardState) -> TaskCard {
	TaskCard {
		bounds: Rect::new(150 + index * 530, 230, 500, 730),
		state,
	}
}

/// A quantity indicator whose icon is item `i`'s select point.
pub fn indicator(i: usize, value: Option<u32>, color: TextColor) -> Indicator {
	let offset = (SCREEN.h as f32 * Config::default().tasks.icon_offset) as i32;
	let icon = item_point(i);
	let center = icon.offset(0, offset);
	Indicator {
		center,
		bounds: Rect::new(center.x - 12, center.y - 8, 24, 16),
		reading: QuantityReading {
			value,
			raw: value.map(|v| v.to_string()).unwrap_or_default(),
			color,
		},
	}
}

pub struct FakeEyes(Rc<RefCell<World>>);
pub struct FakeHands(Rc<RefCell<World>>);

pub fn fake(world: World) -> (Rc<RefCell<World>>, FakeEyes, FakeHands) {
	let shared = Rc::new(RefCell::new(world));
	(shared.clone(), FakeEyes(shared.clone()), FakeHands(shared))
}

impl Observe for FakeEyes {
	fn screen(&mut self) -> Rect {
		self.0.borrow_mut().screen_reads += 1;
		SCREEN
	}

	fn locate(&mut self, target: Target) -> Option<Match> {
		let w = self.0.borrow();
		let visible = |p: Point, cond: bool| if cond { at(p) } else { None };
		match target {
			Target::Control(Control::OpenCrafting) => match w.view {
				View::Selected(i) => visible(OPEN_CRAFTING, !w.items[i].recipe.is_empty()),
				_ => None,
			},
			Target::Control(Control::Confirm) => visible(CONFIRM, matches!(w.view, View::Crafting(_))),
			Target::Control(Control::TaskMenu) => visible(TASK_MENU, w.menu_visible && w.view == View::Idle),
			Target::Control(Control::CollectTask) => visible(COLLECT_TASK, w.view == View::TaskMenu && w.completed_task),
			Target::Control(Control::Collect) => visible(COLLECT, w.at_trains() && w.ready_resources > 0),
			Target::Control(Control::Dispatch) => visible(DISPATCH, w.at_trains() && w.dispatch_visible()),
			Target::Control(Control::Freebie) => visible(FREEBIE, w.freebies > 0),
			Target::Marker(Marker::NotEnoughMaterials) => visible(CONFIRM, matches!(w.view, View::NotEnough(_))),
			Target::Marker(Marker::TrainView) => visible(Point::new(960, 1000), w.at_trains()),
			Target::Marker(Marker::AllTrainsUsed) => visible(Point::new(960, 1000), w.at_trains() && w.trains_left == 0),
			Target::Marker(Marker::ProducerStrip) => match w.view {
				View::Selected(i) => visible(Point::new(960, 700), w.items[i].source),
				_ => None,
			},
			_ => None,
		}
	}

	fn locate_relaxed(&mut self, target: Target) -> Option<Match> {
		self.locate(target)
	}

	fn requirements(&mut self) -> Option<Vec<Requirement>> {
		let mut w = self.0.borrow_mut();
		match w.view {
			View::Crafting(i) => Some(w.requirements(i)),
			_ => None,
		}
	}

	fn occupancy(&mut self) -> Option<(u32, u32)> {
		self.0.borrow().occupancy
	}

	fn cooldown(&mut self) -> Option<Duration> {
		self.0.borrow().cooldown
	}

	fn cards(&mut self) -> Vec<TaskCard> {
		let w = self.0.borrow();
		if w.view != View::TaskMenu {
			return Vec::new();
		}
		w.pages.get(w.page).cloned().unwrap_or_default()
	}

	fn indicators(&mut self, _card: Rect) -> Vec<Indicator> {
		self.0.borrow().indicators.clone()
	}

	fn deliver_amount(&mut self, _card: Rect) -> Option<u32> {
		self.0.borrow().deliver
	}

	fn train_status(&mut self) -> PhraseVerdict {
		self.0.borrow().last_status.unwrap_or(PhraseVerdict::Unclear)
	}

	fn identify_material(&mut self, _quantity: Rect) -> Option<String> {
		self.0.borrow().material.clone()
	}
}

impl FakeHands {
	fn record(&mut self, action: Action) -> Result<(), Aborted> {
		let mut w = self.0.borrow_mut();
		if w.abort_after_clicks.is_some_and(|n| w.clicks() >= n) {
			return Err(Aborted);
		}
		w.actions.push(action);
		Ok(())
	}
}

impl Input for FakeHands {
	fn click(&mut self, at: Point) -> Result<(), Aborted> {
		self.record(Action::Click(at))?;
		self.0.borrow_mut().click(at);
		Ok(())
	}

	fn move_to(&mut self, at: Point) -> Result<(), Aborted> {
		self.record(Action::Move(at))
	}

	fn key_press(&mut self, key: Key) -> Result<(), Aborted> {
		self.record(Action::Key(key))?;
		self.0.borrow_mut().escape();
		Ok(())
	}

	fn drag(&mut self, from: Point, to: Point, _duration: Duration) -> Result<(), Aborted> {
		self.record(Action::Drag(from, to))?;
		let mut w = self.0.borrow_mut();
		if w.page + 1 < w.pages.len() {
			w.page += 1;
		}
		Ok(())
	}

	fn wait(&mut self, duration: Duration) -> Result<(), Aborted> {
		self.record(Action::Wait(duration))
	}
}
