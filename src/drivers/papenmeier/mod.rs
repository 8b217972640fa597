//! Drivers for Papenmeier BrailleX displays.
//!
//! Older displays speak protocol 1, newer ones protocol 2.
//! Both share the model table and the layout of the keys.

use super::Geometry;
use crate::keys::{KeyGroup, KeyRange};

pub mod protocol1;
pub mod protocol2;

pub use protocol1::{Protocol1, Protocol1Verifier};
pub use protocol2::{Protocol2, Protocol2Verifier};

const STX: u8 = 0x02;
const ETX: u8 = 0x03;

/// The number of keys on a bar, if the display has one.
const BAR_KEYS: usize = 8;

/// The number of switches, if the display has them.
const SWITCH_KEYS: usize = 8;

/// A Papenmeier model.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ModelEntry {
	/// The identity byte reported by the display.
	pub identifier: u8,
	pub name: &'static str,

	/// The number of text cells.
	pub columns: usize,

	/// The number of status cells, placed before the text cells.
	pub status_cells: usize,

	/// The number of keys on the front.
	pub front_keys: usize,
	pub has_bar: bool,
	pub has_switches: bool,
}

const fn model(
	identifier: u8,
	name: &'static str,
	columns: usize,
	status_cells: usize,
	front_keys: usize,
	has_bar: bool,
	has_switches: bool,
) -> ModelEntry {
	ModelEntry {
		identifier,
		name,
		columns,
		status_cells,
		front_keys,
		has_bar,
		has_switches,
	}
}

/// All known models.
pub const MODELS: [ModelEntry; 24] = [
	model(1, "BrailleX Compact 486", 40, 0, 9, false, false),
	model(2, "BrailleX 2D Lite", 40, 13, 9, false, false),
	model(3, "BrailleX Compact/Tiny", 40, 0, 9, false, false),
	model(4, "BrailleX 2D Screen Soft", 80, 22, 13, false, false),
	model(6, "BrailleX IB 80 CR Soft", 80, 4, 9, false, false),
	model(64, "BrailleX EL 2D-40", 40, 13, 0, true, false),
	model(65, "BrailleX EL 2D-66", 66, 13, 0, true, false),
	model(66, "BrailleX EL 80", 80, 2, 0, true, false),
	model(67, "BrailleX EL 2D-80", 80, 20, 0, true, false),
	model(68, "BrailleX EL 40 P", 40, 0, 0, true, false),
	model(69, "BrailleX Elba 32", 32, 0, 0, true, false),
	model(70, "BrailleX Elba 20", 20, 0, 0, true, false),
	model(85, "BrailleX EL40s", 40, 0, 0, true, true),
	model(86, "BrailleX EL80-II", 80, 2, 0, true, true),
	model(87, "BrailleX EL66s", 66, 0, 0, true, true),
	model(88, "BrailleX EL80s", 80, 0, 0, true, true),
	model(89, "BrailleX Trio", 40, 0, 0, true, true),
	model(90, "BrailleX EL70s", 70, 0, 0, true, true),
	model(91, "BrailleX EL2D-80s", 80, 20, 0, true, true),
	model(92, "BrailleX Elba (Trio 20)", 20, 0, 0, true, true),
	model(93, "BrailleX Elba (Trio 32)", 32, 0, 0, true, true),
	model(95, "BrailleX EL40c", 40, 0, 0, true, true),
	model(96, "BrailleX EL60c", 60, 0, 0, true, true),
	model(97, "BrailleX EL80c", 80, 0, 0, true, true),
];

/// Look up a model by its identity byte.
pub fn find_model(identifier: u8) -> Option<&'static ModelEntry> {
	MODELS.iter().find(|model| model.identifier == identifier)
}

impl ModelEntry {
	/// The total number of cells.
	pub fn cell_count(&self) -> usize {
		self.status_cells + self.columns
	}

	/// The geometry of the display: status cells first, then text.
	pub fn geometry(&self) -> Geometry {
		Geometry {
			model: self.name.to_string(),
			cell_count: self.cell_count(),
			text_columns: self.columns,
			text_start: self.status_cells,
			status_count: self.status_cells,
			status_start: 0,
		}
	}

	fn bar_keys(&self) -> usize {
		if self.has_bar {
			BAR_KEYS
		} else {
			0
		}
	}

	fn switch_keys(&self) -> usize {
		if self.has_switches {
			SWITCH_KEYS
		} else {
			0
		}
	}

	/// The ranges of protocol 1 key indices (the key code divided by 3).
	pub fn protocol1_key_ranges(&self) -> Vec<KeyRange> {
		[
			KeyRange::with_count(0x01, self.front_keys, KeyGroup::Navigation),
			KeyRange::with_count(0x10, self.status_cells, KeyGroup::Status),
			KeyRange::with_count(0x30, self.switch_keys(), KeyGroup::Switches),
			KeyRange::with_count(0x38, self.bar_keys(), KeyGroup::Bar),
			KeyRange::with_count(0x40, self.columns, KeyGroup::Routing1),
		]
		.into_iter()
		.flatten()
		.collect()
	}

	/// The groups in a protocol 2 key bitmap, in bit order, with the number of keys in each.
	pub fn protocol2_key_layout(&self) -> [(KeyGroup, usize); 5] {
		[
			(KeyGroup::Navigation, self.front_keys),
			(KeyGroup::Bar, self.bar_keys()),
			(KeyGroup::Switches, self.switch_keys()),
			(KeyGroup::Status, self.status_cells),
			(KeyGroup::Routing1, self.columns),
		]
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::keys::map_key;
	use assert2::{assert, let_assert};

	#[test]
	fn model_lookup() {
		let_assert!(Some(model) = find_model(2));
		assert!(model.name == "BrailleX 2D Lite");
		let geometry = model.geometry();
		assert!(geometry.cell_count == 53);
		assert!(geometry.status_range() == (0..13));
		assert!(geometry.text_range() == (13..53));
		assert!(find_model(5) == None);
	}

	#[test]
	fn protocol1_ranges_follow_the_model() {
		let_assert!(Some(model) = find_model(2));
		let ranges = model.protocol1_key_ranges();
		assert!(map_key(&ranges, 0x01) == Some((KeyGroup::Navigation, 0)));
		assert!(map_key(&ranges, 0x09) == Some((KeyGroup::Navigation, 8)));
		assert!(map_key(&ranges, 0x0A) == None);
		assert!(map_key(&ranges, 0x1C) == Some((KeyGroup::Status, 12)));
		assert!(map_key(&ranges, 0x30) == None);
		assert!(map_key(&ranges, 0x40 + 39) == Some((KeyGroup::Routing1, 39)));
	}

	#[test]
	fn protocol2_layout() {
		let_assert!(Some(model) = find_model(85));
		let layout = model.protocol2_key_layout();
		let total: usize = layout.iter().map(|(_, count)| count).sum();
		assert!(total == 8 + 8 + 40);
	}
}
