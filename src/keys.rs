//! Display agnostic key events and the state machines that produce them.

use crate::command::{Command, CommandQueue};

/// A group of related keys on a display.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum KeyGroup {
	/// Keys for moving around: arrows, advance bars, thumb keys and friends.
	Navigation,

	/// The first row of routing keys, one per text cell.
	Routing1,

	/// The second row of routing keys.
	Routing2,

	/// Keys next to the status cells.
	Status,

	/// Left and right switches.
	Switches,

	/// Rocker bars on the front of the display.
	Bar,

	/// Scroll wheels, reported as one press and release per click.
	Wheels,

	/// Braille keyboard keys.
	Braille,
}

impl KeyGroup {
	/// All key groups.
	pub const ALL: [KeyGroup; 8] = [
		KeyGroup::Navigation,
		KeyGroup::Routing1,
		KeyGroup::Routing2,
		KeyGroup::Status,
		KeyGroup::Switches,
		KeyGroup::Bar,
		KeyGroup::Wheels,
		KeyGroup::Braille,
	];

	fn index(self) -> usize {
		self as usize
	}
}

/// A key was pressed or released.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct KeyEvent {
	/// The group of the key.
	pub group: KeyGroup,

	/// The zero-based number of the key within its group.
	pub number: u8,

	/// True for a press, false for a release.
	pub pressed: bool,
}

impl KeyEvent {
	pub fn press(group: KeyGroup, number: u8) -> Self {
		Self { group, number, pressed: true }
	}

	pub fn release(group: KeyGroup, number: u8) -> Self {
		Self { group, number, pressed: false }
	}
}

/// A fixed-size set of key numbers.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct KeySet {
	words: [u64; 4],
}

impl KeySet {
	/// Create an empty set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Create a set from a bitmask where bit `i` represents key `i`.
	pub fn from_mask(mask: u64) -> Self {
		Self { words: [mask, 0, 0, 0] }
	}

	/// Create a set from a bitmap of bytes, least significant bit first.
	pub fn from_bitmap(bitmap: &[u8]) -> Self {
		let mut set = Self::new();
		for (i, &byte) in bitmap.iter().enumerate().take(32) {
			for bit in 0..8 {
				if byte & (1 << bit) != 0 {
					set.insert((i * 8 + bit) as u8);
				}
			}
		}
		set
	}

	/// Add a key, returns false if it was already present.
	pub fn insert(&mut self, key: u8) -> bool {
		let (word, bit) = Self::position(key);
		let was_present = self.words[word] & bit != 0;
		self.words[word] |= bit;
		!was_present
	}

	/// Remove a key, returns false if it was not present.
	pub fn remove(&mut self, key: u8) -> bool {
		let (word, bit) = Self::position(key);
		let was_present = self.words[word] & bit != 0;
		self.words[word] &= !bit;
		was_present
	}

	/// Check if a key is in the set.
	pub fn contains(&self, key: u8) -> bool {
		let (word, bit) = Self::position(key);
		self.words[word] & bit != 0
	}

	/// The number of keys in the set.
	pub fn len(&self) -> usize {
		self.words.iter().map(|word| word.count_ones() as usize).sum()
	}

	/// Check if the set is empty.
	pub fn is_empty(&self) -> bool {
		self.words.iter().all(|&word| word == 0)
	}

	/// Remove all keys.
	pub fn clear(&mut self) {
		self.words = [0; 4];
	}

	/// Iterate over the keys in ascending order.
	pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
		(0..=255u8).filter(move |&key| self.contains(key))
	}

	fn position(key: u8) -> (usize, u64) {
		(usize::from(key / 64), 1 << (key % 64))
	}
}

/// The currently pressed keys of a display, per group.
///
/// All key events go through here, so that a key is never reported pressed twice
/// without a release in between, and never released without being pressed.
#[derive(Debug, Clone, Default)]
pub struct KeyState {
	groups: [KeySet; 8],
}

impl KeyState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Report a key press, unless the key is already pressed.
	pub fn press(&mut self, group: KeyGroup, number: u8, queue: &mut CommandQueue) {
		if self.groups[group.index()].insert(number) {
			queue.push(Command::Key(KeyEvent::press(group, number)));
		}
	}

	/// Report a key release, unless the key is not pressed.
	pub fn release(&mut self, group: KeyGroup, number: u8, queue: &mut CommandQueue) {
		if self.groups[group.index()].remove(number) {
			queue.push(Command::Key(KeyEvent::release(group, number)));
		}
	}

	/// Report a press immediately followed by a release.
	pub fn click(&mut self, group: KeyGroup, number: u8, queue: &mut CommandQueue) {
		self.press(group, number, queue);
		self.release(group, number, queue);
	}

	/// Replace the pressed keys of a group with a new snapshot.
	///
	/// Releases are reported before presses.
	pub fn update_group(&mut self, group: KeyGroup, pressed: &KeySet, queue: &mut CommandQueue) {
		let held = self.groups[group.index()].clone();
		for number in held.iter().filter(|&number| !pressed.contains(number)) {
			self.release(group, number, queue);
		}
		for number in pressed.iter().filter(|&number| !held.contains(number)) {
			self.press(group, number, queue);
		}
	}

	/// Replace the pressed keys of several groups at once.
	///
	/// All releases are reported before any press.
	pub fn update_groups(&mut self, snapshot: &[(KeyGroup, KeySet)], queue: &mut CommandQueue) {
		for (group, pressed) in snapshot {
			let held = self.groups[group.index()].clone();
			for number in held.iter().filter(|&number| !pressed.contains(number)) {
				self.release(*group, number, queue);
			}
		}
		for (group, pressed) in snapshot {
			for number in pressed.iter() {
				self.press(*group, number, queue);
			}
		}
	}

	/// Release every pressed key in every group.
	pub fn release_all(&mut self, queue: &mut CommandQueue) {
		for group in KeyGroup::ALL {
			let held = self.groups[group.index()].clone();
			for number in held.iter() {
				self.release(group, number, queue);
			}
		}
	}

	/// Check if a key is pressed.
	pub fn is_pressed(&self, group: KeyGroup, number: u8) -> bool {
		self.groups[group.index()].contains(number)
	}

	/// The total number of pressed keys.
	pub fn pressed_count(&self) -> usize {
		self.groups.iter().map(KeySet::len).sum()
	}
}

/// Raw key codes reported by a display that sends the complete set of pressed keys.
#[derive(Debug, Clone, Default)]
pub struct PressedKeys {
	held: KeySet,
}

/// The difference between two snapshots of pressed keys.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Transitions {
	/// Codes that are no longer pressed, in ascending order.
	pub released: Vec<u8>,

	/// Codes that are newly pressed, in snapshot order.
	pub pressed: Vec<u8>,
}

impl PressedKeys {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replace the held codes by a new snapshot and report what changed.
	pub fn update(&mut self, snapshot: impl IntoIterator<Item = u8>) -> Transitions {
		let mut next = KeySet::new();
		let mut pressed = Vec::new();
		for code in snapshot {
			if next.insert(code) && !self.held.contains(code) {
				pressed.push(code);
			}
		}
		let released = self.held.iter().filter(|&code| !next.contains(code)).collect();
		self.held = next;
		Transitions { released, pressed }
	}

	/// Add a single code, returns false if it was already held.
	pub fn press(&mut self, code: u8) -> bool {
		self.held.insert(code)
	}

	/// Remove a single code, returns false if it was not held.
	pub fn release(&mut self, code: u8) -> bool {
		self.held.remove(code)
	}

	/// Forget all held codes, returning them in ascending order.
	pub fn clear(&mut self) -> Vec<u8> {
		let released = self.held.iter().collect();
		self.held.clear();
		released
	}

	/// The number of held codes.
	pub fn count(&self) -> usize {
		self.held.len()
	}
}

/// A key that toggles between pressed and released every time the display reports it.
///
/// At most one latch key is active at a time.
#[derive(Debug, Clone, Default)]
pub struct Latch {
	active: Option<u8>,
}

/// What happened to the latch.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LatchTransition {
	/// The code was latched.
	Pressed(u8),

	/// The active latch was cleared by a second occurrence of its code.
	Released(u8),

	/// A different code took over the latch.
	Switched { released: u8, pressed: u8 },
}

impl Latch {
	pub fn new() -> Self {
		Self::default()
	}

	/// The currently latched code, if any.
	pub fn active(&self) -> Option<u8> {
		self.active
	}

	/// Process one occurrence of a latch code.
	pub fn toggle(&mut self, code: u8) -> LatchTransition {
		match self.active {
			Some(active) if active == code => {
				self.active = None;
				LatchTransition::Released(code)
			},
			Some(active) => {
				self.active = Some(code);
				LatchTransition::Switched {
					released: active,
					pressed: code,
				}
			},
			None => {
				self.active = Some(code);
				LatchTransition::Pressed(code)
			},
		}
	}

	/// Clear the latch without reporting anything.
	pub fn clear(&mut self) {
		self.active = None;
	}
}

/// A contiguous range of raw key codes that maps onto the keys of a group.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct KeyRange {
	/// The first raw code of the range.
	pub first: u16,

	/// The last raw code of the range (inclusive).
	pub last: u16,

	/// The group the keys belong to.
	pub group: KeyGroup,

	/// The key number of the first code.
	pub base: u8,
}

impl KeyRange {
	pub const fn new(first: u16, last: u16, group: KeyGroup, base: u8) -> Self {
		Self { first, last, group, base }
	}

	/// Create a range of `count` keys starting at raw code `first`.
	///
	/// Returns `None` for an empty range.
	pub fn with_count(first: u16, count: usize, group: KeyGroup) -> Option<Self> {
		if count == 0 {
			return None;
		}
		Some(Self::new(first, first + count as u16 - 1, group, 0))
	}

	/// Map a raw code onto a key of this range.
	pub fn map(&self, code: u16) -> Option<(KeyGroup, u8)> {
		if (self.first..=self.last).contains(&code) {
			Some((self.group, self.base + (code - self.first) as u8))
		} else {
			None
		}
	}
}

/// Map a raw code through a list of ranges.
pub fn map_key(ranges: &[KeyRange], code: u16) -> Option<(KeyGroup, u8)> {
	ranges.iter().find_map(|range| range.map(code))
}
