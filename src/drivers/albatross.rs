//! Driver for Albatross displays.
//!
//! The display announces itself by repeatedly sending `FF <description>` until the host acknowledges it.
//! Every other byte it sends is a key code.

use super::{read_until, Context, Driver, Geometry};
use crate::cells::{TranslationTable, DOTS_NIBBLE_COLUMNS};
use crate::framing::{PacketVerifier, Verification};
use crate::keys::{map_key, KeyGroup, KeyRange, Latch, LatchTransition};
use crate::output::ChangedRange;
use crate::{InitializeError, Link, NoResponse, SessionConfig, Transport, WriteError};
use std::time::Instant;

const BAUD_RATES: &[u32] = &[19200, 9600];

const DESCRIPTION_START: u8 = 0xFF;
const ACKNOWLEDGE: [u8; 4] = [0xFE, 0xFF, 0xFE, 0xFF];
const WRITE_START: u8 = 0xFB;
const WRITE_END: u8 = 0xFC;

const DESCRIPTION_80_CELLS: u8 = 0x80;
const DESCRIPTION_STATUS_RIGHT: u8 = 0x20;
const DESCRIPTION_STATUS_COUNT: u8 = 0x0F;

/// Control keys latch: they are reported pressed until they are sent a second time.
const CONTROL_KEYS: [u8; 2] = [0x01, 0x2A];

/// The key number of a control key in the switches group.
fn control_number(code: u8) -> u8 {
	if code == CONTROL_KEYS[0] {
		0
	} else {
		1
	}
}

/// Key ranges, the second routing range of each row covers cells 40 to 79.
const KEY_RANGES: [KeyRange; 7] = [
	KeyRange::new(2, 41, KeyGroup::Routing1, 0),
	KeyRange::new(43, 82, KeyGroup::Routing2, 0),
	KeyRange::new(83, 110, KeyGroup::Navigation, 0),
	KeyRange::new(111, 150, KeyGroup::Routing1, 40),
	KeyRange::new(151, 190, KeyGroup::Routing2, 40),
	KeyRange::new(191, 206, KeyGroup::Status, 0),
	KeyRange::new(207, 214, KeyGroup::Wheels, 0),
];

/// Framing of Albatross input: `FF <description>` or a single key byte.
#[derive(Debug, Default)]
pub struct AlbatrossVerifier;

impl PacketVerifier for AlbatrossVerifier {
	fn reset(&mut self) {}

	fn verify(&mut self, bytes: &[u8]) -> Verification {
		match bytes {
			[DESCRIPTION_START] => Verification::Incomplete,
			[_] => Verification::Complete(1),
			[_, DESCRIPTION_START] => Verification::Invalid,
			[_, _] => Verification::Complete(2),
			_ => Verification::Invalid,
		}
	}
}

/// Decode the layout of the display from a description byte.
///
/// If there are status cells, one extra cell separates them from the text.
pub fn parse_description(description: u8) -> Geometry {
	let cell_count = if description & DESCRIPTION_80_CELLS != 0 { 80 } else { 46 };
	let status_count = usize::from(description & DESCRIPTION_STATUS_COUNT);
	let model = format!("Albatross {}", cell_count);

	if status_count == 0 {
		return Geometry::text_only(model, cell_count);
	}

	let text_columns = cell_count - status_count - 1;
	let (text_start, status_start) = if description & DESCRIPTION_STATUS_RIGHT != 0 {
		(0, text_columns + 1)
	} else {
		(status_count + 1, 0)
	};

	Geometry {
		model,
		cell_count,
		text_columns,
		text_start,
		status_count,
		status_start,
	}
}

/// Driver for Albatross displays.
#[derive(Debug)]
pub struct Albatross {
	verifier: AlbatrossVerifier,
	table: TranslationTable,
	control: Latch,
	description: Option<u8>,
}

impl Albatross {
	pub fn new() -> Self {
		Self {
			verifier: AlbatrossVerifier,
			table: TranslationTable::from_dots(&DOTS_NIBBLE_COLUMNS),
			control: Latch::new(),
			description: None,
		}
	}

	/// The last description byte received from the display.
	pub fn description(&self) -> Option<u8> {
		self.description
	}

	fn acknowledge<T: Transport>(&self, link: &mut Link<T>) -> Result<(), WriteError<T::Error>> {
		link.write_packet(&ACKNOWLEDGE)?;
		link.discard_input()
	}

	fn handle_key(&mut self, code: u8, context: &mut Context) {
		if CONTROL_KEYS.contains(&code) {
			match self.control.toggle(code) {
				LatchTransition::Pressed(code) => context.keys.press(KeyGroup::Switches, control_number(code), context.queue),
				LatchTransition::Released(code) => context.keys.release(KeyGroup::Switches, control_number(code), context.queue),
				LatchTransition::Switched { released, pressed } => {
					context.keys.release(KeyGroup::Switches, control_number(released), context.queue);
					context.keys.press(KeyGroup::Switches, control_number(pressed), context.queue);
				},
			}
			return;
		}

		match map_key(&KEY_RANGES, code.into()) {
			Some((group, number)) => context.keys.click(group, number, context.queue),
			None => warn!("unexpected key code from Albatross display: 0x{:02X}", code),
		}
	}
}

impl Default for Albatross {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Transport> Driver<T> for Albatross {
	fn name(&self) -> &'static str {
		"Albatross"
	}

	fn baud_rates(&self) -> &'static [u32] {
		BAUD_RATES
	}

	fn verifier(&mut self) -> &mut dyn PacketVerifier {
		&mut self.verifier
	}

	fn identify(&mut self, link: &mut Link<T>, config: &SessionConfig) -> Result<Geometry, InitializeError<T::Error>> {
		let mut packet = Vec::new();
		for _ in 0..config.identify_attempts {
			let deadline = Instant::now() + config.response_timeout;
			while read_until(link, &mut self.verifier, deadline, &mut packet)? {
				if let [DESCRIPTION_START, description] = packet[..] {
					debug!("received Albatross description: 0x{:02X}", description);
					self.acknowledge(link)?;
					self.description = Some(description);
					self.control.clear();
					return Ok(parse_description(description));
				}
				debug!("ignoring key code before identification: {:02X?}", packet);
			}
		}

		Err(NoResponse {
			protocol: "Albatross",
			attempts: config.identify_attempts,
		}
		.into())
	}

	fn write_cells(&mut self, link: &mut Link<T>, cells: &[u8], range: ChangedRange) -> Result<(), WriteError<T::Error>> {
		let mut packet = Vec::with_capacity(range.len() * 2 + 2);
		packet.push(WRITE_START);
		for index in range.as_range() {
			packet.push((index + 1) as u8);
			packet.push(self.table.output_cell(cells[index]));
		}
		packet.push(WRITE_END);
		link.write_packet(&packet)
	}

	fn handle_packet(&mut self, link: &mut Link<T>, packet: &[u8], context: &mut Context) -> Result<(), WriteError<T::Error>> {
		match *packet {
			[DESCRIPTION_START, description] => {
				debug!("Albatross display sent a new description: 0x{:02X}", description);
				self.acknowledge(link)?;
				self.description = Some(description);
				if let Some(code) = self.control.active() {
					context.keys.release(KeyGroup::Switches, control_number(code), context.queue);
				}
				self.control.clear();
				context.reidentified(parse_description(description));
			},
			[code] => self.handle_key(code, context),
			_ => warn!("unexpected packet from Albatross display: {:02X?}", packet),
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::framing::test_util::{assert_complete_at_end, assert_rejected};
	use assert2::assert;

	#[test]
	fn framing() {
		let mut verifier = AlbatrossVerifier;
		assert_complete_at_end(&mut verifier, &[0xFF, 0x80]);
		assert_complete_at_end(&mut verifier, &[0x53]);
		assert_rejected(&mut verifier, &[0xFF, 0xFF]);
	}

	#[test]
	fn description_without_status_cells() {
		let geometry = parse_description(0x80);
		assert!(geometry.cell_count == 80);
		assert!(geometry.text_columns == 80);
		assert!(geometry.status_count == 0);

		let geometry = parse_description(0x00);
		assert!(geometry.cell_count == 46);
		assert!(geometry.text_columns == 46);
	}

	#[test]
	fn description_with_status_on_the_left() {
		let geometry = parse_description(0x84);
		assert!(geometry.status_count == 4);
		assert!(geometry.status_start == 0);
		assert!(geometry.text_start == 5);
		assert!(geometry.text_columns == 75);
	}

	#[test]
	fn description_with_status_on_the_right() {
		let geometry = parse_description(0x22);
		assert!(geometry.cell_count == 46);
		assert!(geometry.text_start == 0);
		assert!(geometry.text_columns == 43);
		assert!(geometry.status_start == 44);
		assert!(geometry.status_range() == (44..46));
	}

	#[test]
	fn routing_keys_wrap() {
		assert!(map_key(&KEY_RANGES, 2) == Some((KeyGroup::Routing1, 0)));
		assert!(map_key(&KEY_RANGES, 111) == Some((KeyGroup::Routing1, 40)));
		assert!(map_key(&KEY_RANGES, 190) == Some((KeyGroup::Routing2, 79)));
		assert!(map_key(&KEY_RANGES, 214) == Some((KeyGroup::Wheels, 7)));
		assert!(map_key(&KEY_RANGES, 42) == None);
	}
}
