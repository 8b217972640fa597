use super::{find_model, ModelEntry, ETX, STX};
use crate::cells::{TranslationTable, DOTS_NIBBLE_COLUMNS};
use crate::drivers::{probe, Context, Driver, Geometry};
use crate::endian::{read_u16_be, write_u16_be};
use crate::framing::{PacketVerifier, Verification};
use crate::keys::{map_key, KeyRange};
use crate::output::ChangedRange;
use crate::{InitializeError, Link, NoResponse, SessionConfig, Transport, UnknownModel, WriteError};

const BAUD_RATES: &[u32] = &[19200];

const IDENTITY: u8 = b'I';
const KEY: u8 = b'K';
const WRITE: u8 = b'S';

const IDENTITY_SIZE: usize = 10;
const KEY_SIZE: usize = 6;
const WRITE_HEADER_SIZE: usize = 6;

const IDENTIFY_REQUEST: [u8; 7] = [STX, IDENTITY, 0x00, 0x00, 0x00, 0x07, ETX];

/// Framing of protocol 1 packets: the packet id determines the length.
#[derive(Debug, Default)]
pub struct Protocol1Verifier;

impl PacketVerifier for Protocol1Verifier {
	fn reset(&mut self) {}

	fn verify(&mut self, bytes: &[u8]) -> Verification {
		if bytes[0] != STX {
			return Verification::Invalid;
		}
		if bytes.len() < 2 {
			return Verification::Incomplete;
		}

		let total = match bytes[1] {
			IDENTITY => IDENTITY_SIZE,
			KEY => KEY_SIZE,
			_ => return Verification::Invalid,
		};

		if bytes.len() < total {
			Verification::Incomplete
		} else if bytes[total - 1] != ETX {
			Verification::Invalid
		} else {
			Verification::Complete(total)
		}
	}
}

/// Driver for Papenmeier displays speaking protocol 1.
#[derive(Debug)]
pub struct Protocol1 {
	verifier: Protocol1Verifier,
	table: TranslationTable,
	model: Option<&'static ModelEntry>,
	key_ranges: Vec<KeyRange>,
}

impl Protocol1 {
	pub fn new() -> Self {
		Self {
			verifier: Protocol1Verifier,
			table: TranslationTable::from_dots(&DOTS_NIBBLE_COLUMNS),
			model: None,
			key_ranges: Vec::new(),
		}
	}

	/// The identified model.
	pub fn model(&self) -> Option<&'static ModelEntry> {
		self.model
	}
}

impl Default for Protocol1 {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Transport> Driver<T> for Protocol1 {
	fn name(&self) -> &'static str {
		"Papenmeier1"
	}

	fn baud_rates(&self) -> &'static [u32] {
		BAUD_RATES
	}

	fn verifier(&mut self) -> &mut dyn PacketVerifier {
		&mut self.verifier
	}

	fn identify(&mut self, link: &mut Link<T>, config: &SessionConfig) -> Result<Geometry, InitializeError<T::Error>> {
		let identity = probe(link, &mut self.verifier, config, &IDENTIFY_REQUEST, |packet| match packet[1] {
			IDENTITY => Ok(Some(packet[2])),
			_ => Ok(None),
		})?;
		let identity = identity.ok_or(NoResponse {
			protocol: "Papenmeier1",
			attempts: config.identify_attempts,
		})?;

		let model = find_model(identity).ok_or_else(|| UnknownModel {
			protocol: "Papenmeier1",
			identifier: identity.to_string(),
		})?;
		debug!("display identified as {}", model.name);

		self.model = Some(model);
		self.key_ranges = model.protocol1_key_ranges();
		Ok(model.geometry())
	}

	fn write_cells(&mut self, link: &mut Link<T>, cells: &[u8], range: ChangedRange) -> Result<(), WriteError<T::Error>> {
		let total = WRITE_HEADER_SIZE + range.len() + 1;
		let mut packet = vec![0; total];
		packet[0] = STX;
		packet[1] = WRITE;
		write_u16_be(&mut packet[2..4], range.first as u16);
		write_u16_be(&mut packet[4..6], total as u16);
		self.table.translate_output_cells(&cells[range.as_range()], &mut packet[WRITE_HEADER_SIZE..total - 1]);
		packet[total - 1] = ETX;
		link.write_packet(&packet)
	}

	fn handle_packet(&mut self, _link: &mut Link<T>, packet: &[u8], context: &mut Context) -> Result<(), WriteError<T::Error>> {
		match packet[1] {
			KEY => {
				let code = read_u16_be(&packet[2..4]);
				let pressed = packet[4] != 0;
				match map_key(&self.key_ranges, code / 3) {
					Some((group, number)) if pressed => context.keys.press(group, number, context.queue),
					Some((group, number)) => context.keys.release(group, number, context.queue),
					None => warn!("unexpected key code from Papenmeier display: 0x{:04X}", code),
				}
			},
			IDENTITY => debug!("ignoring identity packet"),
			_ => warn!("unexpected packet from Papenmeier display: {:02X?}", packet),
		}
		Ok(())
	}
}
