use super::{find_model, ModelEntry, ETX, STX};
use crate::cells::{TranslationTable, DOTS_NIBBLE_COLUMNS};
use crate::drivers::{probe, Context, Driver, Geometry};
use crate::framing::{PacketVerifier, Verification};
use crate::keys::KeySet;
use crate::output::ChangedRange;
use crate::{BufferTooSmallError, InitializeError, InvalidPayloadLength, Link, NoResponse, SessionConfig, Transport, UnknownModel, WriteError};

const BAUD_RATES: &[u32] = &[57600];

const TYPE_MARKER: u8 = 0x40;
const LENGTH_MARKER: u8 = 0x50;
const NIBBLE_MARKER: u8 = 0x30;
const HEADER_SIZE: usize = 4;
const MAX_PAYLOAD_SIZE: usize = 0xFF;

const IDENTIFY: u8 = 0x02;
const WRITE: u8 = 0x03;
const IDENTITY: u8 = 0x0A;
const KEYS: u8 = 0x0B;

/// Framing of protocol 2 packets.
///
/// Every byte after the start byte carries a marker in the high nibble,
/// so the packets never contain control characters.
#[derive(Debug, Default)]
pub struct Protocol2Verifier {
	length: usize,
	mid_nibble: bool,
}

impl PacketVerifier for Protocol2Verifier {
	fn reset(&mut self) {
		self.length = 0;
		self.mid_nibble = false;
	}

	fn verify(&mut self, bytes: &[u8]) -> Verification {
		let size = bytes.len();
		let byte = bytes[size - 1];
		let expect_marker = |marker: u8| {
			if byte & 0xF0 == marker {
				Verification::Incomplete
			} else {
				Verification::Invalid
			}
		};

		match size {
			1 if byte == STX => Verification::Incomplete,
			1 => Verification::Invalid,
			2 => expect_marker(TYPE_MARKER),
			3 => {
				self.length = usize::from(byte & 0x0F) << 4;
				expect_marker(LENGTH_MARKER)
			},
			4 => {
				self.length |= usize::from(byte & 0x0F);
				expect_marker(LENGTH_MARKER)
			},
			_ if size == HEADER_SIZE + 2 * self.length + 1 => {
				if byte == ETX && !self.mid_nibble {
					Verification::Complete(size)
				} else {
					Verification::Invalid
				}
			},
			_ => {
				self.mid_nibble = !self.mid_nibble;
				expect_marker(NIBBLE_MARKER)
			},
		}
	}
}

/// Encode a packet with a nibble encoded payload.
pub fn encode_packet(packet_type: u8, payload: &[u8]) -> Vec<u8> {
	let mut packet = Vec::with_capacity(HEADER_SIZE + payload.len() * 2 + 1);
	packet.push(STX);
	packet.push(TYPE_MARKER | packet_type);
	packet.push(LENGTH_MARKER | (payload.len() >> 4 & 0x0F) as u8);
	packet.push(LENGTH_MARKER | (payload.len() & 0x0F) as u8);
	for &byte in payload {
		packet.push(NIBBLE_MARKER | byte >> 4);
		packet.push(NIBBLE_MARKER | byte & 0x0F);
	}
	packet.push(ETX);
	packet
}

/// Decode a verified packet into its type and payload.
pub fn decode_packet(packet: &[u8]) -> (u8, Vec<u8>) {
	let packet_type = packet[1] & 0x0F;
	let payload = packet[HEADER_SIZE..packet.len() - 1]
		.chunks_exact(2)
		.map(|pair| (pair[0] & 0x0F) << 4 | pair[1] & 0x0F)
		.collect();
	(packet_type, payload)
}

/// Driver for Papenmeier displays speaking protocol 2.
#[derive(Debug)]
pub struct Protocol2 {
	verifier: Protocol2Verifier,
	table: TranslationTable,
	model: Option<&'static ModelEntry>,
	firmware: (u8, u8),
}

impl Protocol2 {
	pub fn new() -> Self {
		Self {
			verifier: Protocol2Verifier::default(),
			table: TranslationTable::from_dots(&DOTS_NIBBLE_COLUMNS),
			model: None,
			firmware: (0, 0),
		}
	}

	/// The identified model.
	pub fn model(&self) -> Option<&'static ModelEntry> {
		self.model
	}

	/// The firmware version reported by the display.
	pub fn firmware(&self) -> (u8, u8) {
		self.firmware
	}

	fn handle_keys(&self, bitmap: &[u8], context: &mut Context) {
		let model = match self.model {
			Some(model) => model,
			None => return,
		};

		let all = KeySet::from_bitmap(bitmap);
		let mut offset = 0;
		let mut snapshot = Vec::with_capacity(5);
		for (group, count) in model.protocol2_key_layout() {
			let mut pressed = KeySet::new();
			for number in 0..count {
				if all.contains((offset + number) as u8) {
					pressed.insert(number as u8);
				}
			}
			offset += count;
			snapshot.push((group, pressed));
		}
		context.keys.update_groups(&snapshot, context.queue);
	}
}

impl Default for Protocol2 {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Transport> Driver<T> for Protocol2 {
	fn name(&self) -> &'static str {
		"Papenmeier2"
	}

	fn baud_rates(&self) -> &'static [u32] {
		BAUD_RATES
	}

	fn verifier(&mut self) -> &mut dyn PacketVerifier {
		&mut self.verifier
	}

	fn identify(&mut self, link: &mut Link<T>, config: &SessionConfig) -> Result<Geometry, InitializeError<T::Error>> {
		let request = encode_packet(IDENTIFY, &[]);
		let identity = probe(link, &mut self.verifier, config, &request, |packet| {
			let (packet_type, payload) = decode_packet(packet);
			if packet_type != IDENTITY {
				return Ok(None);
			}
			InvalidPayloadLength::check_min(payload.len(), 3)?;
			Ok(Some(payload))
		})?;
		let identity = identity.ok_or(NoResponse {
			protocol: "Papenmeier2",
			attempts: config.identify_attempts,
		})?;

		let model = find_model(identity[0]).ok_or_else(|| UnknownModel {
			protocol: "Papenmeier2",
			identifier: identity[0].to_string(),
		})?;
		debug!("display identified as {}, firmware {}.{}", model.name, identity[1], identity[2]);

		self.model = Some(model);
		self.firmware = (identity[1], identity[2]);
		Ok(model.geometry())
	}

	fn write_cells(&mut self, link: &mut Link<T>, cells: &[u8], _range: ChangedRange) -> Result<(), WriteError<T::Error>> {
		BufferTooSmallError::check(cells.len(), MAX_PAYLOAD_SIZE)?;
		let cells = self.table.output_cells(cells);
		link.write_packet(&encode_packet(WRITE, &cells))
	}

	fn handle_packet(&mut self, _link: &mut Link<T>, packet: &[u8], context: &mut Context) -> Result<(), WriteError<T::Error>> {
		let (packet_type, payload) = decode_packet(packet);
		match packet_type {
			KEYS => self.handle_keys(&payload, context),
			IDENTITY => debug!("ignoring identity packet"),
			other => warn!("unexpected packet of type 0x{:02X} from Papenmeier display", other),
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
		let mut verifier = Protocol2Verifier::default();
		let packet = encode_packet(IDENTITY, &[85, 1, 2]);
		assert!(packet == [STX, 0x4A, 0x50, 0x53, 0x35, 0x35, 0x30, 0x31, 0x30, 0x32, ETX]);
		assert_complete_at_end(&mut verifier, &packet);
		assert_complete_at_end(&mut verifier, &encode_packet(IDENTIFY, &[]));

		let mut corrupted = packet.clone();
		corrupted[5] = 0x45;
		assert_rejected(&mut verifier, &corrupted);
		assert_rejected(&mut verifier, &[STX, 0x4A, 0x50, 0x51, 0x30, 0x30, 0x04]);
	}

	#[test]
	fn decoding() {
		let packet = encode_packet(KEYS, &[0xA5, 0x0F]);
		assert!(decode_packet(&packet) == (KEYS, vec![0xA5, 0x0F]));
	}
}
