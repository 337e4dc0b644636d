use std::{
	collections::HashMap,
	fs::File,
	io::BufReader,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use ie::Template;

mod material;
pub use material::{MaterialId, Materials, base_name};

/// Optional per-template thresholds, keyed by file stem.
pub const MANIFEST: &str = "templates.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
	Button,
	Status,
	Material,
}

impl Category {
	pub fn dir(self) -> &'static str {
		match self {
			Category::Button => "buttons",
			Category::Status => "status",
			Category::Material => "materials",
		}
	}

	pub fn default_threshold(self) -> f32 {
		match self {
			Category::Button => 0.7,
			Category::Status => 0.6,
			Category::Material => 0.48,
		}
	}
}

/// Clickable controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
	TaskMenu,
	OpenCrafting,
	Confirm,
	Dispatch,
	/// Collects resources waiting at the station.
	Collect,
	/// Collects a completed task.
	CollectTask,
	Freebie,
}

impl Control {
	pub const ALL: [Control; 7] = [
		Control::TaskMenu,
		Control::OpenCrafting,
		Control::Confirm,
		Control::Dispatch,
		Control::Collect,
		Control::CollectTask,
		Control::Freebie,
	];

	pub fn stem(self) -> &'static str {
		match self {
			Control::TaskMenu => "TaskMenu",
			Control::OpenCrafting => "OpenCrafting",
			Control::Confirm => "ConfirmButton",
			Control::Dispatch => "DispatchButton",
			Control::Collect => "CollectButton",
			Control::CollectTask => "CollectButtonTask",
			Control::Freebie => "Freebie",
		}
	}
}

/// Screen elements that are looked for but not clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
	/// Sits right below the requirements strip of the crafting view.
	RequirementsStrip,
	NotEnoughMaterials,
	LockedTask,
	/// The train view is open.
	TrainView,
	AllTrainsUsed,
	/// Label next to the producer occupancy counter.
	ProducersOccupied,
	/// Shown instead of a crafting control when the target is a producing source.
	ProducerStrip,
	/// A sample of deficit text, used to calibrate the palette.
	DeficitSample,
}

impl Marker {
	pub const ALL: [Marker; 8] = [
		Marker::RequirementsStrip,
		Marker::NotEnoughMaterials,
		Marker::LockedTask,
		Marker::TrainView,
		Marker::AllTrainsUsed,
		Marker::ProducersOccupied,
		Marker::ProducerStrip,
		Marker::DeficitSample,
	];

	pub fn stem(self) -> &'static str {
		match self {
			Marker::RequirementsStrip => "UnderMaterialsNeeded",
			Marker::NotEnoughMaterials => "NotEnoughMaterials",
			Marker::LockedTask => "Lock",
			Marker::TrainView => "AvailableTrains",
			Marker::AllTrainsUsed => "AllTrainsUsed",
			Marker::ProducersOccupied => "ProducersOccupied",
			Marker::ProducerStrip => "ProducerStrip",
			Marker::DeficitSample => "RedNumber",
		}
	}
}

/// Every template the automation looks for.
///
/// Templates that fail to load are logged and left out; the features that
/// need them degrade instead of stopping the program.
#[derive(Default)]
pub struct Catalog {
	controls: HashMap<Control, Template>,
	markers: HashMap<Marker, Template>,
	materials: Materials,
}

impl Catalog {
	/// Load `<dir>/{buttons,status,materials}/*.png`.
	pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
		let dir = dir.as_ref();
		if !dir.is_dir() {
			bail!("template directory {} does not exist", dir.display());
		}
		let thresholds = load_manifest(&dir.join(MANIFEST));

		let mut s = Self::default();
		for c in Control::ALL {
			if let Some(t) = load_one(dir, Category::Button, c.stem(), &thresholds) {
				s.controls.insert(c, t);
			}
		}
		for m in Marker::ALL {
			if let Some(t) = load_one(dir, Category::Status, m.stem(), &thresholds) {
				s.markers.insert(m, t);
			}
		}

		let materials_dir = dir.join(Category::Material.dir());
		for path in png_files(&materials_dir) {
			let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned) else {
				continue;
			};
			if let Some(t) = load_template(&path, &stem, threshold_for(&stem, Category::Material, &thresholds)) {
				s.materials.add(&stem, t);
			}
		}

		tracing::info!(
			controls = s.controls.len(),
			markers = s.markers.len(),
			materials = s.materials.len(),
			"loaded templates from {}",
			dir.display()
		);
		Ok(s)
	}

	pub fn control(&self, c: Control) -> Option<&Template> {
		self.controls.get(&c)
	}

	pub fn marker(&self, m: Marker) -> Option<&Template> {
		self.markers.get(&m)
	}

	pub fn materials(&self) -> &Materials {
		&self.materials
	}

	/// Put a template in place, replacing a loaded one.
	pub fn insert_control(&mut self, c: Control, template: Template) {
		self.controls.insert(c, template);
	}

	pub fn insert_marker(&mut self, m: Marker, template: Template) {
		self.markers.insert(m, template);
	}

	pub fn materials_mut(&mut self) -> &mut Materials {
		&mut self.materials
	}
}

fn load_manifest(path: &Path) -> HashMap<String, f32> {
	if !path.is_file() {
		return HashMap::new();
	}
	let parsed = File::open(path)
		.with_context(|| format!("Open manifest {}", path.display()))
		.and_then(|f| {
			serde_json::from_reader::<_, HashMap<String, f32>>(BufReader::new(f))
				.with_context(|| format!("Parse manifest {}", path.display()))
		});
	match parsed {
		Ok(map) => map,
		Err(err) => {
			tracing::warn!("ignoring template manifest: {err:#}");
			HashMap::new()
		}
	}
}

fn threshold_for(stem: &str, category: Category, thresholds: &HashMap<String, f32>) -> f32 {
	thresholds
		.get(stem)
		.copied()
		.filter(|t| (0.0..=1.0).contains(t))
		.unwrap_or(category.default_threshold())
}

fn load_one(dir: &Path, category: Category, stem: &str, thresholds: &HashMap<String, f32>) -> Option<Template> {
	let path = dir.join(category.dir()).join(format!("{stem}.png"));
	if !path.is_file() {
		tracing::warn!("missing template {}", path.display());
		return None;
	}
	load_template(&path, stem, threshold_for(stem, category, thresholds))
}

fn load_template(path: &Path, name: &str, threshold: f32) -> Option<Template> {
	let loaded = std::fs::read(path)
		.with_context(|| format!("Read {}", path.display()))
		.and_then(|bytes| Template::from_encoded(name, &bytes, threshold).with_context(|| format!("Decode {}", path.display())));
	match loaded {
		Ok(t) => Some(t),
		Err(err) => {
			tracing::warn!("skipping template: {err:#}");
			None
		}
	}
}

fn png_files(dir: &Path) -> Vec<PathBuf> {
	let Ok(entries) = std::fs::read_dir(dir) else {
		tracing::warn!("no material templates in {}", dir.display());
		return Vec::new();
	};
	let mut files = entries
		.filter_map(|e| e.ok().map(|e| e.path()))
		.filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("png")))
		.collect::<Vec<_>>();
	files.sort();
	files
}
