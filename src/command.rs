//! Commands reported by a display session.

use crate::drivers::Geometry;
use crate::keys::KeyEvent;
use std::collections::VecDeque;

/// Something the caller of [`crate::Session::read_command()`] should act on.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Command {
	/// Nothing happened.
	None,

	/// The display is switched off or otherwise unavailable, but the connection is kept.
	Offline,

	/// The connection failed and the session must be restarted.
	RestartDriver,

	/// The display (re-)identified itself with a new geometry.
	Resized(Geometry),

	/// A key was pressed or released.
	Key(KeyEvent),

	/// A character was typed on the braille keyboard, as logical dots.
	Braille(u8),
}

/// Commands produced by a driver, waiting to be picked up by the caller.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
	commands: VecDeque<Command>,
	offline: bool,
}

impl CommandQueue {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a command to the back of the queue.
	pub fn push(&mut self, command: Command) {
		self.commands.push_back(command);
	}

	/// Take the oldest command from the queue.
	pub fn pop(&mut self) -> Option<Command> {
		self.commands.pop_front()
	}

	/// The number of queued commands.
	pub fn len(&self) -> usize {
		self.commands.len()
	}

	/// Check if there are no queued commands.
	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}

	/// Drop all queued commands.
	pub fn clear(&mut self) {
		self.commands.clear();
	}

	/// Mark the display as offline or online.
	///
	/// Returns true if the state changed.
	pub fn set_offline(&mut self, offline: bool) -> bool {
		let changed = self.offline != offline;
		self.offline = offline;
		changed
	}

	/// Check if the display reported that it is offline.
	pub fn is_offline(&self) -> bool {
		self.offline
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::keys::KeyGroup;
	use assert2::assert;

	#[test]
	fn fifo_order() {
		let mut queue = CommandQueue::new();
		queue.push(Command::Braille(0x01));
		queue.push(Command::Key(KeyEvent::press(KeyGroup::Navigation, 2)));
		assert!(queue.len() == 2);
		assert!(queue.pop() == Some(Command::Braille(0x01)));
		assert!(queue.pop() == Some(Command::Key(KeyEvent::press(KeyGroup::Navigation, 2))));
		assert!(queue.pop() == None);
		assert!(queue.is_empty());
	}

	#[test]
	fn offline_flag() {
		let mut queue = CommandQueue::new();
		assert!(!queue.is_offline());
		assert!(queue.set_offline(true));
		assert!(!queue.set_offline(true));
		assert!(queue.is_offline());
		assert!(queue.set_offline(false));
	}
}
