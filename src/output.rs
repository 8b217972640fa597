//! Tracking which cells of a display need to be transmitted.

/// An inclusive range of cell indices.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ChangedRange {
	pub first: usize,
	pub last: usize,
}

impl ChangedRange {
	/// Create a range covering `first..=last`.
	pub fn new(first: usize, last: usize) -> Self {
		debug_assert!(first <= last);
		Self { first, last }
	}

	/// The number of cells in the range.
	#[allow(clippy::len_without_is_empty)]
	pub fn len(&self) -> usize {
		self.last + 1 - self.first
	}

	/// The smallest range covering both ranges.
	pub fn union(self, other: Self) -> Self {
		Self {
			first: self.first.min(other.first),
			last: self.last.max(other.last),
		}
	}

	/// The range as a slice index.
	pub fn as_range(&self) -> core::ops::Range<usize> {
		self.first..self.last + 1
	}
}

/// Find the minimal range of cells that differs between `shadow` and `cells`.
///
/// If `force` is set, the whole buffer is reported as changed even if nothing differs.
/// Returns `None` if there is nothing to transmit.
///
/// Both slices must have the same length.
pub fn cells_have_changed(shadow: &[u8], cells: &[u8], force: bool) -> Option<ChangedRange> {
	debug_assert_eq!(shadow.len(), cells.len());
	let count = shadow.len().min(cells.len());
	if count == 0 {
		return None;
	}

	if force {
		return Some(ChangedRange::new(0, count - 1));
	}

	let first = (0..count).find(|&i| shadow[i] != cells[i])?;
	let last = (first..count).rev().find(|&i| shadow[i] != cells[i]).unwrap_or(first);
	Some(ChangedRange::new(first, last))
}

/// The cells of a display as last transmitted.
///
/// The shadow copy is only updated by [`Self::commit()`],
/// which should be called after the cells were handed to the display successfully.
/// If a transmission fails, the next call to [`Self::changed_range()`] reports the same cells again.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
	shadow: Vec<u8>,
	force_rewrite: bool,
}

impl OutputBuffer {
	/// Create a buffer for a display with `size` cells.
	///
	/// The first update of a new buffer always rewrites the whole display.
	pub fn new(size: usize) -> Self {
		Self {
			shadow: vec![0; size],
			force_rewrite: true,
		}
	}

	/// The number of cells in the buffer.
	pub fn len(&self) -> usize {
		self.shadow.len()
	}

	/// Check if the buffer has zero cells.
	pub fn is_empty(&self) -> bool {
		self.shadow.is_empty()
	}

	/// Change the size of the buffer, forcing a full rewrite.
	pub fn resize(&mut self, size: usize) {
		self.shadow.clear();
		self.shadow.resize(size, 0);
		self.force_rewrite = true;
	}

	/// Make the next update rewrite the whole display.
	pub fn force_rewrite(&mut self) {
		self.force_rewrite = true;
	}

	/// Check if the next update will rewrite the whole display.
	pub fn rewrite_forced(&self) -> bool {
		self.force_rewrite
	}

	/// The cells as last transmitted.
	pub fn shadow(&self) -> &[u8] {
		&self.shadow
	}

	/// The range of `cells` that needs to be transmitted.
	pub fn changed_range(&self, cells: &[u8]) -> Option<ChangedRange> {
		cells_have_changed(&self.shadow, cells, self.force_rewrite)
	}

	/// Record that `range` of `cells` was transmitted successfully.
	pub fn commit(&mut self, cells: &[u8], range: ChangedRange) {
		self.shadow[range.as_range()].copy_from_slice(&cells[range.as_range()]);
		if range.first == 0 && range.last + 1 == self.shadow.len() {
			self.force_rewrite = false;
		}
	}

	/// Diff `cells` against the shadow, transmit the changed range and commit it on success.
	///
	/// Returns `Ok(false)` if nothing needed to be transmitted.
	pub fn update<E, F>(&mut self, cells: &[u8], transmit: F) -> Result<bool, E>
	where
		F: FnOnce(&[u8], ChangedRange) -> Result<(), E>,
	{
		let range = match self.changed_range(cells) {
			Some(range) => range,
			None => return Ok(false),
		};
		transmit(cells, range)?;
		self.commit(cells, range);
		Ok(true)
	}
}
