use std::collections::HashMap;

use ie::Template;

// Index of the interned material name
pub type MaterialId = lasso::Spur;

/// Material templates grouped by logical material.
///
/// `Nails.png` and `Nails_blue.png` are two looks of the same material
/// `Nails`; both end up as variants under one id.
pub struct Materials {
	names: lasso::Rodeo,
	variants: HashMap<MaterialId, Vec<Template>>,
}

impl Default for Materials {
	fn default() -> Self {
		Self::new()
	}
}

impl Materials {
	pub fn new() -> Self {
		Self {
			names: lasso::Rodeo::new(),
			variants: HashMap::new(),
		}
	}

	/// Add a template under the material named by its file stem.
	pub fn add(&mut self, stem: &str, template: Template) -> MaterialId {
		let id = self.names.get_or_intern(base_name(stem));
		self.variants.entry(id).or_default().push(template);
		id
	}

	pub fn len(&self) -> usize {
		self.variants.len()
	}

	pub fn is_empty(&self) -> bool {
		self.variants.is_empty()
	}

	pub fn id(&self, name: &str) -> Option<MaterialId> {
		self.names.get(name)
	}

	pub fn name(&self, id: MaterialId) -> Option<&str> {
		self.names.try_resolve(&id)
	}

	pub fn variants(&self, id: MaterialId) -> &[Template] {
		self.variants.get(&id).map(Vec::as_slice).unwrap_or_default()
	}

	pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &[Template])> {
		self.variants.iter().map(|(id, v)| (*id, v.as_slice()))
	}

	/// Closest known material for a user-written name.
	///
	/// Exact (case-insensitive) names win; otherwise the smallest Levenshtein
	/// distance, as long as it is under half the longer name.
	pub fn closest(&self, name: &str) -> Option<MaterialId> {
		let name = name.trim();
		if name.is_empty() {
			return None;
		}

		let wanted = name.to_lowercase();
		let mut best: Option<(MaterialId, usize, usize)> = None;
		for id in self.variants.keys() {
			let known = self.names.resolve(id);
			let lev = levenshtein::levenshtein(&wanted, &known.to_lowercase());
			if best.is_none_or(|(_, min, _)| lev < min) {
				best = Some((*id, lev, known.chars().count()));
			}
		}

		let (id, lev, len) = best?;
		let max_len = len.max(wanted.chars().count());
		(lev * 2 < max_len || lev == 0).then_some(id)
	}
}

/// Everything before the first `_` of a file stem.
pub fn base_name(stem: &str) -> &str {
	stem.split('_').next().unwrap_or(stem)
}
