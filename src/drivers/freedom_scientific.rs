//! Driver for Freedom Scientific Focus and PAC Mate displays.
//!
//! Every packet starts with a four byte header: `type arg1 arg2 arg3`.
//! Packet types with bit 0x80 set carry `arg1` payload bytes, followed by a checksum byte.
//! Writes are acknowledged by the display, and only one write is outstanding at a time.

use super::{probe, Context, Driver, Geometry};
use crate::cells::{TranslationTable, DOTS_ISO_11548_1};
use crate::checksum::{calculate_checksum, verify_checksum};
use crate::endian::read_u32_le;
use crate::framing::{PacketVerifier, Verification};
use crate::keys::{KeyGroup, KeySet};
use crate::output::ChangedRange;
use crate::{InitializeError, InvalidCellCount, InvalidPayloadLength, Link, NoResponse, SessionConfig, Transport, UnknownModel, WriteError};
use core::time::Duration;
use std::time::Instant;

const BAUD_RATES: &[u32] = &[57600, 38400, 19200];

const HEADER_SIZE: usize = 4;
const MAX_CELLS: usize = 84;

/// The initial number of cells sent in a single write packet.
const DEFAULT_OUTPUT_PAYLOAD_LIMIT: usize = 0xFF;

const MANUFACTURER_SIZE: usize = 24;
const MODEL_SIZE: usize = 16;
const FIRMWARE_SIZE: usize = 8;

/// Packet types.
pub mod packet_type {
	pub const QUERY: u8 = 0x00;
	pub const ACK: u8 = 0x01;
	pub const NAK: u8 = 0x02;
	pub const KEY: u8 = 0x03;
	pub const BUTTON: u8 = 0x04;
	pub const WHEEL: u8 = 0x05;
	pub const HVADJ: u8 = 0x08;
	pub const BEEP: u8 = 0x09;
	pub const CONFIG: u8 = 0x0F;
	pub const INFO: u8 = 0x80;
	pub const WRITE: u8 = 0x81;
	pub const EXTKEY: u8 = 0x82;

	/// Types with this bit set carry a payload and a checksum.
	pub const PAYLOAD_BIT: u8 = 0x80;

	pub(super) const ALL: [u8; 12] = [QUERY, ACK, NAK, KEY, BUTTON, WHEEL, HVADJ, BEEP, CONFIG, INFO, WRITE, EXTKEY];
}

/// Reasons for a negative acknowledgement.
pub mod nak_code {
	pub const TIMEOUT: u8 = 0x30;
	pub const CHECKSUM: u8 = 0x31;
	pub const TYPE: u8 = 0x32;
	pub const PARAMETER: u8 = 0x33;
	pub const SIZE: u8 = 0x34;
	pub const POSITION: u8 = 0x35;
	pub const OVERRUN: u8 = 0x36;
	pub const POWER: u8 = 0x37;
	pub const SPI: u8 = 0x38;

	pub(super) fn describe(code: u8) -> &'static str {
		match code {
			TIMEOUT => "timeout while receiving",
			CHECKSUM => "bad checksum",
			TYPE => "unknown packet type",
			PARAMETER => "invalid parameter",
			SIZE => "write size too large",
			POSITION => "write position too large",
			OVERRUN => "message queue overflow",
			POWER => "insufficient USB power",
			SPI => "SPI bus timeout",
			_ => "unknown error",
		}
	}
}

/// Known models and their cell counts.
const MODELS: [(&str, usize); 8] = [
	("Focus 14", 14),
	("Focus 40", 40),
	("Focus 44", 44),
	("Focus 70", 70),
	("Focus 80", 80),
	("Focus 84", 84),
	("pm display 20", 20),
	("pm display 40", 40),
];

/// Framing of Freedom Scientific packets.
#[derive(Debug, Default)]
pub struct FreedomScientificVerifier;

impl PacketVerifier for FreedomScientificVerifier {
	fn reset(&mut self) {}

	fn verify(&mut self, bytes: &[u8]) -> Verification {
		let packet_type = bytes[0];
		if !packet_type::ALL.contains(&packet_type) {
			return Verification::Invalid;
		}
		if bytes.len() < HEADER_SIZE {
			return Verification::Incomplete;
		}

		let has_payload = packet_type & packet_type::PAYLOAD_BIT != 0;
		let total = if has_payload {
			HEADER_SIZE + usize::from(bytes[1]) + 1
		} else {
			HEADER_SIZE
		};

		if bytes.len() < total {
			Verification::Incomplete
		} else if has_payload && !verify_checksum(&bytes[..total]) {
			Verification::Invalid
		} else {
			Verification::Complete(total)
		}
	}
}

/// Encode a packet, adding the checksum if the type carries a payload.
pub fn encode_packet(packet_type: u8, arg1: u8, arg2: u8, arg3: u8, payload: &[u8]) -> Vec<u8> {
	let mut packet = Vec::with_capacity(HEADER_SIZE + payload.len() + 1);
	packet.extend_from_slice(&[packet_type, arg1, arg2, arg3]);
	if packet_type & packet_type::PAYLOAD_BIT != 0 {
		packet.extend_from_slice(payload);
		packet.push(calculate_checksum(&packet));
	}
	packet
}

/// The identification of a display, from an INFO packet.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Info {
	pub manufacturer: String,
	pub model: String,
	pub firmware: String,
}

fn nul_terminated(data: &[u8]) -> String {
	let end = data.iter().position(|&byte| byte == 0).unwrap_or(data.len());
	String::from_utf8_lossy(&data[..end]).trim().to_string()
}

/// Parse the payload of an INFO packet.
///
/// The firmware field is optional.
pub fn parse_info(payload: &[u8]) -> Result<Info, InvalidPayloadLength> {
	InvalidPayloadLength::check_min(payload.len(), MANUFACTURER_SIZE + MODEL_SIZE)?;
	let (manufacturer, rest) = payload.split_at(MANUFACTURER_SIZE);
	let (model, rest) = rest.split_at(MODEL_SIZE);
	let firmware = &rest[..rest.len().min(FIRMWARE_SIZE)];
	Ok(Info {
		manufacturer: nul_terminated(manufacturer),
		model: nul_terminated(model),
		firmware: nul_terminated(firmware),
	})
}

/// A verified packet from the display.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Packet {
	Ack,
	Nak(u8),

	/// The state of the 24 basic navigation keys.
	Key(u32),

	/// The state of the extended navigation keys, starting at key 24.
	ExtendedKey(u32),

	/// A routing key changed state. Row 0 is the first routing row.
	Button { key: u8, pressed: bool, row: u8 },

	/// One of the wheels turned.
	Wheel { wheel: u8, clicks: u8 },
	Info(Info),
	Other(u8),
}

impl Packet {
	/// Decode a packet that passed the [`FreedomScientificVerifier`].
	pub fn parse(packet: &[u8]) -> Result<Self, InvalidPayloadLength> {
		let (arg1, arg2, arg3) = (packet[1], packet[2], packet[3]);
		let payload = match packet.len() {
			len if len > HEADER_SIZE => &packet[HEADER_SIZE..len - 1],
			_ => &[][..],
		};
		Ok(match packet[0] {
			packet_type::ACK => Self::Ack,
			packet_type::NAK => Self::Nak(arg1),
			packet_type::KEY => Self::Key(u32::from(arg1) | u32::from(arg2) << 8 | u32::from(arg3) << 16),
			packet_type::EXTKEY => {
				InvalidPayloadLength::check_min(payload.len(), 4)?;
				Self::ExtendedKey(read_u32_le(payload))
			},
			packet_type::BUTTON => Self::Button {
				key: arg1,
				pressed: arg2 & 0x01 != 0,
				row: arg3,
			},
			packet_type::WHEEL => Self::Wheel {
				wheel: (arg1 >> 3) & 0x07,
				clicks: arg1 & 0x07,
			},
			packet_type::INFO => Self::Info(parse_info(payload)?),
			other => Self::Other(other),
		})
	}
}

/// Find the cell count of a model.
///
/// Unlisted "Focus NN" models are accepted with NN cells.
pub fn model_cell_count(model: &str) -> Option<usize> {
	if let Some((_, cells)) = MODELS.iter().find(|(name, _)| *name == model) {
		return Some(*cells);
	}
	let digits: String = model
		.strip_prefix("Focus ")?
		.chars()
		.take_while(|c| c.is_ascii_digit())
		.collect();
	digits.parse().ok()
}

/// Driver for Freedom Scientific displays.
#[derive(Debug)]
pub struct FreedomScientific {
	verifier: FreedomScientificVerifier,
	table: TranslationTable,
	info: Option<Info>,
	cell_count: usize,

	/// Physical cells, as last handed to the driver.
	cells: Vec<u8>,

	/// Cells that still need to be written.
	pending: Option<ChangedRange>,

	/// Cells of the write that is waiting for an acknowledgement.
	writing: Option<ChangedRange>,

	/// When the outstanding write is considered lost.
	ack_deadline: Option<Instant>,
	ack_timeout: Duration,

	output_payload_limit: usize,

	/// Navigation keys held down, including the extended keys from bit 24 on.
	key_mask: u64,
}

impl FreedomScientific {
	pub fn new() -> Self {
		Self {
			verifier: FreedomScientificVerifier,
			table: TranslationTable::from_dots(&DOTS_ISO_11548_1),
			info: None,
			cell_count: 0,
			cells: Vec::new(),
			pending: None,
			writing: None,
			ack_deadline: None,
			ack_timeout: SessionConfig::default().ack_timeout,
			output_payload_limit: DEFAULT_OUTPUT_PAYLOAD_LIMIT,
			key_mask: 0,
		}
	}

	/// The maximum number of cells sent in a single write packet.
	///
	/// The limit shrinks whenever the display reports a receive timeout.
	pub fn output_payload_limit(&self) -> usize {
		self.output_payload_limit
	}

	/// The identification of the display, if it has been identified.
	pub fn info(&self) -> Option<&Info> {
		self.info.as_ref()
	}

	/// Check if a write is waiting for an acknowledgement.
	pub fn write_outstanding(&self) -> bool {
		self.writing.is_some()
	}

	/// Send the next chunk of pending cells, unless a write is still outstanding.
	fn send_pending<T: Transport>(&mut self, link: &mut Link<T>) -> Result<(), WriteError<T::Error>> {
		if self.writing.is_some() {
			return Ok(());
		}
		let pending = match self.pending.take() {
			Some(pending) => pending,
			None => return Ok(()),
		};

		let last = pending.last.min(pending.first + self.output_payload_limit - 1);
		let chunk = ChangedRange::new(pending.first, last);
		if last < pending.last {
			self.pending = Some(ChangedRange::new(last + 1, pending.last));
		}

		let packet = encode_packet(
			packet_type::WRITE,
			chunk.len() as u8,
			chunk.first as u8,
			0,
			&self.cells[chunk.as_range()],
		);
		self.writing = Some(chunk);
		self.ack_deadline = Some(Instant::now() + self.ack_timeout);
		link.write_packet(&packet)
	}

	fn handle_ack<T: Transport>(&mut self, link: &mut Link<T>) -> Result<(), WriteError<T::Error>> {
		self.writing = None;
		self.ack_deadline = None;
		self.send_pending(link)
	}

	/// Put the outstanding write back in the queue and send it again.
	fn handle_nak<T: Transport>(&mut self, link: &mut Link<T>, code: Option<u8>) -> Result<(), WriteError<T::Error>> {
		match code {
			Some(code) => warn!("display rejected packet: {} (0x{:02X})", nak_code::describe(code), code),
			None => warn!("no acknowledgement received from display"),
		}

		if code == Some(nak_code::TIMEOUT) {
			self.output_payload_limit = self.output_payload_limit.min(self.cell_count.max(1));
			if self.output_payload_limit > 1 {
				self.output_payload_limit -= 1;
			}
			warn!("reduced output payload limit to {} cells", self.output_payload_limit);
		}

		self.ack_deadline = None;
		if let Some(writing) = self.writing.take() {
			self.pending = Some(match self.pending {
				Some(pending) => pending.union(writing),
				None => writing,
			});
		}
		self.send_pending(link)
	}

	fn handle_keys(&mut self, context: &mut Context) {
		context.keys.update_group(KeyGroup::Navigation, &KeySet::from_mask(self.key_mask), context.queue);
	}
}

impl Default for FreedomScientific {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Transport> Driver<T> for FreedomScientific {
	fn name(&self) -> &'static str {
		"FreedomScientific"
	}

	fn baud_rates(&self) -> &'static [u32] {
		BAUD_RATES
	}

	fn verifier(&mut self) -> &mut dyn PacketVerifier {
		&mut self.verifier
	}

	fn identify(&mut self, link: &mut Link<T>, config: &SessionConfig) -> Result<Geometry, InitializeError<T::Error>> {
		let query = encode_packet(packet_type::QUERY, 0, 0, 0, &[]);
		let info = probe(link, &mut self.verifier, config, &query, |packet| match Packet::parse(packet) {
			Ok(Packet::Info(info)) => Ok(Some(info)),
			Err(e) if packet[0] == packet_type::INFO => Err(e.into()),
			_ => Ok(None),
		})?;
		let info = info.ok_or(NoResponse {
			protocol: "FreedomScientific",
			attempts: config.identify_attempts,
		})?;
		debug!("display identified as {:?}", info);

		let cell_count = model_cell_count(&info.model).ok_or_else(|| UnknownModel {
			protocol: "FreedomScientific",
			identifier: info.model.clone(),
		})?;
		InvalidCellCount::check(cell_count, MAX_CELLS)?;

		self.cell_count = cell_count;
		self.cells = vec![0; cell_count];
		self.pending = None;
		self.writing = None;
		self.ack_deadline = None;
		self.ack_timeout = config.ack_timeout;
		self.output_payload_limit = DEFAULT_OUTPUT_PAYLOAD_LIMIT;
		self.key_mask = 0;
		let geometry = Geometry::text_only(info.model.clone(), cell_count);
		self.info = Some(info);
		Ok(geometry)
	}

	fn write_cells(&mut self, link: &mut Link<T>, cells: &[u8], range: ChangedRange) -> Result<(), WriteError<T::Error>> {
		if self.cells.len() != cells.len() {
			self.cells.resize(cells.len(), 0);
		}
		self.table.translate_output_cells(&cells[range.as_range()], &mut self.cells[range.as_range()]);
		self.pending = Some(match self.pending {
			Some(pending) => pending.union(range),
			None => range,
		});
		self.send_pending(link)
	}

	fn handle_packet(&mut self, link: &mut Link<T>, packet: &[u8], context: &mut Context) -> Result<(), WriteError<T::Error>> {
		let packet = match Packet::parse(packet) {
			Ok(packet) => packet,
			Err(e) => {
				warn!("ignoring malformed packet {:02X?}: {}", packet, e);
				return Ok(());
			},
		};

		match packet {
			Packet::Ack => self.handle_ack(link)?,
			Packet::Nak(code) => self.handle_nak(link, Some(code))?,
			Packet::Key(mask) => {
				self.key_mask = self.key_mask & !0xFF_FFFF | u64::from(mask);
				self.handle_keys(context);
			},
			Packet::ExtendedKey(mask) => {
				self.key_mask = self.key_mask & 0xFF_FFFF | u64::from(mask) << 24;
				self.handle_keys(context);
			},
			Packet::Button { key, pressed, row } => {
				let group = if row == 0 { KeyGroup::Routing1 } else { KeyGroup::Routing2 };
				if pressed {
					context.keys.press(group, key, context.queue);
				} else {
					context.keys.release(group, key, context.queue);
				}
			},
			Packet::Wheel { wheel, clicks } => {
				for _ in 0..clicks {
					context.keys.click(KeyGroup::Wheels, wheel, context.queue);
				}
			},
			Packet::Info(_) => debug!("ignoring unsolicited info packet"),
			Packet::Other(packet_type) => debug!("ignoring packet of type 0x{:02X}", packet_type),
		}
		Ok(())
	}

	fn poll(&mut self, link: &mut Link<T>, _context: &mut Context) -> Result<(), WriteError<T::Error>> {
		match self.ack_deadline {
			Some(deadline) if Instant::now() >= deadline => self.handle_nak(link, None),
			_ => Ok(()),
		}
	}

	fn set_firmness(&mut self, link: &mut Link<T>, level: u8) -> Result<bool, WriteError<T::Error>> {
		let packet = encode_packet(packet_type::HVADJ, level.min(2), 0, 0, &[]);
		link.write_packet(&packet)?;
		Ok(true)
	}

	fn cancel(&mut self) {
		self.ack_deadline = None;
		self.writing = None;
		self.pending = None;
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::framing::test_util::{assert_complete_at_end, assert_rejected};
	use assert2::{assert, let_assert};

	#[test]
	fn framing() {
		let mut verifier = FreedomScientificVerifier;
		assert_complete_at_end(&mut verifier, &[packet_type::ACK, 0, 0, 0]);
		assert_complete_at_end(&mut verifier, &[packet_type::KEY, 0x01, 0x00, 0x80]);

		let write = encode_packet(packet_type::WRITE, 2, 0, 0, &[0xFF, 0x01]);
		assert!(write == [0x81, 0x02, 0x00, 0x00, 0xFF, 0x01, 0x7D]);
		assert_complete_at_end(&mut verifier, &write);

		let mut corrupted = write.clone();
		*corrupted.last_mut().unwrap() ^= 0x01;
		assert_rejected(&mut verifier, &corrupted);
		assert_rejected(&mut verifier, &[0x77, 0, 0, 0]);
	}

	#[test]
	fn info_payload() {
		let mut payload = vec![0; 48];
		payload[..17].copy_from_slice(b"Freedom Scientif\0");
		payload[24..32].copy_from_slice(b"Focus 40");
		payload[40..44].copy_from_slice(b"1.23");
		let_assert!(Ok(info) = parse_info(&payload));
		assert!(info.manufacturer == "Freedom Scientif");
		assert!(info.model == "Focus 40");
		assert!(info.firmware == "1.23");
		assert!(let Err(_) = parse_info(&payload[..30]));
	}

	#[test]
	fn decode_packets() {
		assert!(let Ok(Packet::Key(0x80_0001)) = Packet::parse(&[packet_type::KEY, 0x01, 0x00, 0x80]));
		assert!(let Ok(Packet::Button { key: 7, pressed: true, row: 1 }) = Packet::parse(&[packet_type::BUTTON, 7, 1, 1]));
		assert!(let Ok(Packet::Wheel { wheel: 3, clicks: 2 }) = Packet::parse(&[packet_type::WHEEL, 3 << 3 | 2, 0, 0]));
		assert!(let Ok(Packet::Other(packet_type::BEEP)) = Packet::parse(&[packet_type::BEEP, 0, 0, 0]));

		let extended = encode_packet(packet_type::EXTKEY, 4, 0, 0, &[0x02, 0, 0, 0]);
		assert!(let Ok(Packet::ExtendedKey(0x02)) = Packet::parse(&extended));
		let short = encode_packet(packet_type::EXTKEY, 2, 0, 0, &[0x02, 0]);
		assert!(let Err(_) = Packet::parse(&short));
	}

	#[test]
	fn model_table() {
		assert!(model_cell_count("Focus 14") == Some(14));
		assert!(model_cell_count("pm display 20") == Some(20));
		assert!(model_cell_count("Focus 60 Blue") == Some(60));
		assert!(model_cell_count("Unknown") == None);
	}
}
