//! Driver for EuroBraille Esys and Iris displays.
//!
//! Packets look like `STX length_hi length_lo payload ETX`,
//! where the 16-bit length counts itself and the payload.
//! The payload starts with a packet type and subtype, both ASCII letters.

use super::{probe, Context, Driver, Geometry};
use crate::cells::{TranslationTable, DOTS_ISO_11548_1};
use crate::command::Command;
use crate::endian::{read_u16_be, read_u32_be, write_u16_be};
use crate::framing::{PacketVerifier, Verification};
use crate::keys::{KeyGroup, KeySet};
use crate::output::ChangedRange;
use crate::transport::Parity;
use crate::{InitializeError, InvalidCellCount, Link, NoResponse, SessionConfig, Transport, WriteError};

const BAUD_RATES: &[u32] = &[9600];

const STX: u8 = 0x02;
const ETX: u8 = 0x03;
const LENGTH_SIZE: usize = 2;
const MAX_PACKET_SIZE: usize = 2048;
const MAX_CELLS: usize = 80;

/// Inbound payloads carry a sequence number as first byte.
const OPTION_SEQUENCE_NUMBERS: u8 = 0x01;

const SYSTEM: u8 = b'S';
const SYSTEM_IDENTITY: u8 = b'I';
const SYSTEM_NAME: u8 = b'H';
const SYSTEM_COLUMNS: u8 = b'G';
const SYSTEM_TYPE: u8 = b'T';
const SYSTEM_OPTIONS: u8 = b'O';

const BRAILLE: u8 = b'B';
const BRAILLE_SHOW: u8 = b'S';

const KEY: u8 = b'K';
const KEY_COMMAND: u8 = b'T';
const KEY_ROUTING: u8 = b'C';
const KEY_BRAILLE: u8 = b'B';

/// Framing of Esysiris packets.
#[derive(Debug, Default)]
pub struct EsysirisVerifier;

impl PacketVerifier for EsysirisVerifier {
	fn reset(&mut self) {}

	fn verify(&mut self, bytes: &[u8]) -> Verification {
		if bytes[0] != STX {
			return Verification::Invalid;
		}
		if bytes.len() < 1 + LENGTH_SIZE {
			return Verification::Incomplete;
		}

		let length = usize::from(read_u16_be(&bytes[1..3]));
		let total = length + 2;
		if length < LENGTH_SIZE || total > MAX_PACKET_SIZE {
			return Verification::Invalid;
		}

		if bytes.len() < total {
			Verification::Incomplete
		} else if bytes[total - 1] != ETX {
			Verification::Invalid
		} else {
			Verification::Complete(total)
		}
	}
}

/// Encode a packet around a payload.
pub fn encode_packet(payload: &[u8]) -> Vec<u8> {
	let mut packet = vec![0; payload.len() + 4];
	packet[0] = STX;
	write_u16_be(&mut packet[1..3], (payload.len() + LENGTH_SIZE) as u16);
	packet[3..3 + payload.len()].copy_from_slice(payload);
	packet[3 + payload.len()] = ETX;
	packet
}

/// Strip the framing and the optional sequence number from a packet.
///
/// Returns the sequence number (if present) and the payload.
fn split_packet(packet: &[u8], sequenced: bool) -> (Option<u8>, &[u8]) {
	let payload = &packet[1 + LENGTH_SIZE..packet.len() - 1];
	match payload {
		[sequence, rest @ ..] if sequenced => (Some(*sequence), rest),
		_ => (None, payload),
	}
}

/// What the display told about itself during identification.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Identity {
	pub name: String,
	pub columns: Option<usize>,
	pub device_type: Option<u8>,
	pub options: u8,
}

/// Driver for Esysiris displays.
#[derive(Debug)]
pub struct Esysiris {
	verifier: EsysirisVerifier,
	table: TranslationTable,
	identity: Identity,
	last_sequence: Option<u8>,
	command_keys: u32,
}

impl Esysiris {
	pub fn new() -> Self {
		Self {
			verifier: EsysirisVerifier,
			table: TranslationTable::from_dots(&DOTS_ISO_11548_1),
			identity: Identity::default(),
			last_sequence: None,
			command_keys: 0,
		}
	}

	/// The identification received from the display.
	pub fn identity(&self) -> &Identity {
		&self.identity
	}

	fn sequenced(&self) -> bool {
		self.identity.options & OPTION_SEQUENCE_NUMBERS != 0
	}

	/// Check the sequence number of an inbound packet.
	///
	/// A gap is only reported, the packet is processed anyway.
	fn check_sequence(&mut self, sequence: u8) {
		if let Some(last) = self.last_sequence {
			let expected = last.wrapping_add(1);
			if sequence != expected {
				warn!("unexpected sequence number: expected {}, got {}", expected, sequence);
			}
		}
		self.last_sequence = Some(sequence);
	}

	fn handle_key(&mut self, subtype: u8, data: &[u8], context: &mut Context) {
		match (subtype, data) {
			(KEY_COMMAND, [a, b, c, d, ..]) => {
				self.command_keys = read_u32_be(&[*a, *b, *c, *d]);
				let pressed = KeySet::from_mask(self.command_keys.into());
				context.keys.update_group(KeyGroup::Navigation, &pressed, context.queue);
			},
			(KEY_ROUTING, [index, ..]) if *index > 0 => {
				context.keys.click(KeyGroup::Routing1, index - 1, context.queue);
			},
			(KEY_BRAILLE, [_, dots, ..]) => {
				context.queue.push(Command::Braille(self.table.input_cell(*dots)));
			},
			_ => warn!("unexpected key packet from Esysiris display: {:02X?} {:02X?}", subtype, data),
		}
	}
}

impl Default for Esysiris {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Transport> Driver<T> for Esysiris {
	fn name(&self) -> &'static str {
		"Esysiris"
	}

	fn baud_rates(&self) -> &'static [u32] {
		BAUD_RATES
	}

	fn parity(&self) -> Parity {
		Parity::Even
	}

	fn verifier(&mut self) -> &mut dyn PacketVerifier {
		&mut self.verifier
	}

	fn identify(&mut self, link: &mut Link<T>, config: &SessionConfig) -> Result<Geometry, InitializeError<T::Error>> {
		let request = encode_packet(&[SYSTEM, SYSTEM_IDENTITY]);
		let mut identity = Identity::default();
		let mut last_sequence = None;

		let complete = probe(link, &mut self.verifier, config, &request, |packet| {
			let sequenced = identity.options & OPTION_SEQUENCE_NUMBERS != 0;
			let (sequence, payload) = split_packet(packet, sequenced);
			if sequence.is_some() {
				last_sequence = sequence;
			}
			match payload {
				[SYSTEM, SYSTEM_NAME, name @ ..] => identity.name = String::from_utf8_lossy(name).trim_end_matches('\0').trim().to_string(),
				[SYSTEM, SYSTEM_COLUMNS, columns, ..] => identity.columns = Some(usize::from(*columns)),
				[SYSTEM, SYSTEM_TYPE, device_type, ..] => identity.device_type = Some(*device_type),
				[SYSTEM, SYSTEM_OPTIONS, options, ..] => identity.options = *options,
				[SYSTEM, SYSTEM_IDENTITY, ..] if identity.columns.is_some() => return Ok(Some(())),
				_ => debug!("ignoring packet during identification: {:02X?}", packet),
			}
			Ok(None)
		})?;
		complete.ok_or(NoResponse {
			protocol: "Esysiris",
			attempts: config.identify_attempts,
		})?;

		let columns = identity.columns.unwrap_or(0);
		InvalidCellCount::check(columns, MAX_CELLS)?;
		debug!("display identified as {:?}", identity);

		let name = if identity.name.is_empty() {
			String::from("Esysiris")
		} else {
			identity.name.clone()
		};
		self.identity = identity;
		self.last_sequence = last_sequence;
		self.command_keys = 0;
		Ok(Geometry::text_only(name, columns))
	}

	fn write_cells(&mut self, link: &mut Link<T>, cells: &[u8], _range: ChangedRange) -> Result<(), WriteError<T::Error>> {
		let mut payload = Vec::with_capacity(cells.len() + 2);
		payload.extend_from_slice(&[BRAILLE, BRAILLE_SHOW]);
		payload.extend(cells.iter().map(|&cell| self.table.output_cell(cell)));
		link.write_packet(&encode_packet(&payload))
	}

	fn handle_packet(&mut self, _link: &mut Link<T>, packet: &[u8], context: &mut Context) -> Result<(), WriteError<T::Error>> {
		let (sequence, payload) = split_packet(packet, self.sequenced());
		if let Some(sequence) = sequence {
			self.check_sequence(sequence);
		}

		match payload {
			[KEY, subtype, data @ ..] => self.handle_key(*subtype, data, context),
			[SYSTEM, subtype, ..] => debug!("ignoring system packet '{}'", char::from(*subtype)),
			_ => warn!("unexpected packet from Esysiris display: {:02X?}", packet),
		}
		Ok(())
	}
}
