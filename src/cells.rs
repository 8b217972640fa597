//! Translation between logical dot patterns and the bit order of a display.
//!
//! A cell is an 8-bit dot pattern where bit `i` is set when dot `i + 1` is raised.
//! Displays wire their pins in different orders, described by a [`DotsTable`].

/// Maps logical dot bit `i` to the physical bit `table[i]`.
pub type DotsTable = [u8; 8];

/// The dots table of ISO 11548-1, which is the logical order itself.
pub const DOTS_ISO_11548_1: DotsTable = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80];

/// Each column of dots occupies one nibble, top to bottom.
///
/// Dot 7 shares the low nibble with dots 1 to 3, dots 4 to 6 move up.
pub const DOTS_NIBBLE_COLUMNS: DotsTable = [0x01, 0x02, 0x04, 0x10, 0x20, 0x40, 0x08, 0x80];

/// Lookup tables to translate cells to and from the physical bit order.
#[derive(Clone)]
pub struct TranslationTable {
	output: [u8; 256],
	input: [u8; 256],
}

impl core::fmt::Debug for TranslationTable {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		let dots: Vec<u8> = (0..8).map(|i| self.output[1 << i]).collect();
		f.debug_struct("TranslationTable").field("dots", &dots).finish()
	}
}

impl TranslationTable {
	/// Build the lookup tables for a dots table.
	///
	/// The dots table should be a permutation of the eight bits.
	pub fn from_dots(dots: &DotsTable) -> Self {
		let mut output = [0u8; 256];
		let mut input = [0u8; 256];

		for cell in 0..=255u8 {
			let physical = dots
				.iter()
				.enumerate()
				.filter(|(dot, _)| cell & (1 << dot) != 0)
				.fold(0, |physical, (_, bit)| physical | bit);
			output[usize::from(cell)] = physical;
			input[usize::from(physical)] = cell;
		}

		Self { output, input }
	}

	/// Translate a single logical cell to the physical bit order.
	pub fn output_cell(&self, cell: u8) -> u8 {
		self.output[usize::from(cell)]
	}

	/// Translate a single physical cell back to logical dots.
	pub fn input_cell(&self, cell: u8) -> u8 {
		self.input[usize::from(cell)]
	}

	/// Translate logical cells into physical cells.
	///
	/// Only `min(cells.len(), output.len())` cells are translated.
	pub fn translate_output_cells(&self, cells: &[u8], output: &mut [u8]) {
		for (out, &cell) in output.iter_mut().zip(cells) {
			*out = self.output_cell(cell);
		}
	}

	/// Translate logical cells into a newly allocated vector of physical cells.
	pub fn output_cells(&self, cells: &[u8]) -> Vec<u8> {
		cells.iter().map(|&cell| self.output_cell(cell)).collect()
	}
}
