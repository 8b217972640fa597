//! Driver for HumanWare Brailliant displays on a serial connection.
//!
//! Packets look like `ESC type length data[length]`.

use super::{probe, Context, Driver, Geometry};
use crate::cells::{TranslationTable, DOTS_ISO_11548_1};
use crate::framing::{PacketVerifier, Verification};
use crate::keys::{map_key, KeyGroup, KeyRange, PressedKeys};
use crate::output::ChangedRange;
use crate::{BufferTooSmallError, InitializeError, InvalidCellCount, InvalidPayloadLength, Link, NoResponse, SessionConfig, Transport, WriteError};
use core::time::Duration;
use std::time::Instant;

const BAUD_RATES: &[u32] = &[115200];

const ESC: u8 = 0x1B;
const HEADER_SIZE: usize = 3;
const MAX_CELLS: usize = 84;

/// Packet types.
pub mod packet_type {
	pub const INIT: u8 = 0x00;
	pub const INIT_RESP: u8 = 0x01;
	pub const DISPLAY: u8 = 0x02;
	pub const GET_KEYS: u8 = 0x03;
	pub const KEYS: u8 = 0x04;
	pub const KEY_DOWN: u8 = 0x05;
	pub const KEY_UP: u8 = 0x06;
	pub const GET_FIRMWARE_VERSION: u8 = 0x0C;
	pub const FIRMWARE_VERSION_RESP: u8 = 0x0D;
	pub const KEEP_AWAKE: u8 = 0x0E;
	pub const POWERING_OFF: u8 = 0x0F;

	pub(super) fn is_known(packet_type: u8) -> bool {
		matches!(packet_type, INIT..=KEY_UP | GET_FIRMWARE_VERSION..=POWERING_OFF)
	}
}

/// Key codes.
pub mod key {
	pub const DOT1: u8 = 0x01;
	pub const DOT8: u8 = 0x08;
	pub const SPACE: u8 = 0x09;
	pub const ROUTING: u8 = 0x50;

	pub const CAL_OK: u8 = 0xF0;
	pub const CAL_FAIL: u8 = 0xF1;
	pub const CAL_EMPTY: u8 = 0xF2;
	pub const CAL_RESET: u8 = 0xF3;
}

const KEY_RANGES: [KeyRange; 4] = [
	KeyRange::new(key::DOT1 as u16, key::SPACE as u16, KeyGroup::Braille, 0),
	KeyRange::new(0x0A, 0x0F, KeyGroup::Navigation, 0),
	KeyRange::new(0x10, 0x13, KeyGroup::Bar, 0),
	KeyRange::new(0x14, 0x18, KeyGroup::Navigation, 6),
];

const MODELS: [(u8, &str); 5] = [
	(0x01, "Brailliant BI 32"),
	(0x02, "Brailliant BI 40"),
	(0x03, "Brailliant BI 14"),
	(0x04, "Brailliant B 80"),
	(0x05, "Brailliant BI 20X"),
];

fn is_calibration(code: u8) -> bool {
	(key::CAL_OK..=key::CAL_RESET).contains(&code)
}

/// Framing of HumanWare packets.
#[derive(Debug, Default)]
pub struct HumanWareVerifier;

impl PacketVerifier for HumanWareVerifier {
	fn reset(&mut self) {}

	fn verify(&mut self, bytes: &[u8]) -> Verification {
		match bytes.len() {
			1 if bytes[0] != ESC => Verification::Invalid,
			2 if !packet_type::is_known(bytes[1]) => Verification::Invalid,
			0..=2 => Verification::Incomplete,
			size => {
				let total = HEADER_SIZE + usize::from(bytes[2]);
				if size < total {
					Verification::Incomplete
				} else {
					Verification::Complete(total)
				}
			},
		}
	}
}

/// Encode a packet.
pub fn encode_packet(packet_type: u8, data: &[u8]) -> Vec<u8> {
	let mut packet = Vec::with_capacity(HEADER_SIZE + data.len());
	packet.extend_from_slice(&[ESC, packet_type, data.len() as u8]);
	packet.extend_from_slice(data);
	packet
}

/// The content of an init response.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct InitResponse {
	pub still_initializing: bool,
	pub model_id: u8,
	pub cell_count: usize,
}

/// Parse the data of an init response.
pub fn parse_init_response(data: &[u8]) -> Result<InitResponse, InvalidPayloadLength> {
	InvalidPayloadLength::check_min(data.len(), 3)?;
	Ok(InitResponse {
		still_initializing: data[0] != 0,
		model_id: data[1],
		cell_count: usize::from(data[2]),
	})
}

/// A verified packet from the display.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Packet<'a> {
	InitResponse(InitResponse),

	/// All keys that are currently pressed.
	Keys(&'a [u8]),
	KeyDown(u8),
	KeyUp(u8),
	FirmwareVersion(&'a [u8]),
	PoweringOff,
	Other(u8),
}

impl<'a> Packet<'a> {
	/// Decode a packet that passed the [`HumanWareVerifier`].
	pub fn parse(packet: &'a [u8]) -> Result<Self, InvalidPayloadLength> {
		let data = &packet[HEADER_SIZE..];
		Ok(match packet[1] {
			packet_type::INIT_RESP => Self::InitResponse(parse_init_response(data)?),
			packet_type::KEYS => Self::Keys(data),
			packet_type::KEY_DOWN => {
				InvalidPayloadLength::check(data.len(), 1)?;
				Self::KeyDown(data[0])
			},
			packet_type::KEY_UP => {
				InvalidPayloadLength::check(data.len(), 1)?;
				Self::KeyUp(data[0])
			},
			packet_type::FIRMWARE_VERSION_RESP => Self::FirmwareVersion(data),
			packet_type::POWERING_OFF => Self::PoweringOff,
			other => Self::Other(other),
		})
	}
}

fn geometry(response: &InitResponse) -> Geometry {
	let model = match MODELS.iter().find(|(id, _)| *id == response.model_id) {
		Some((_, name)) => name.to_string(),
		None => format!("HumanWare model 0x{:02X}", response.model_id),
	};
	Geometry::text_only(model, response.cell_count)
}

/// Driver for HumanWare displays.
#[derive(Debug)]
pub struct HumanWare {
	verifier: HumanWareVerifier,
	table: TranslationTable,
	pressed: PressedKeys,
	routing: Option<KeyRange>,
	keep_awake_interval: Duration,
	next_keep_awake: Option<Instant>,
}

impl HumanWare {
	pub fn new() -> Self {
		Self {
			verifier: HumanWareVerifier,
			table: TranslationTable::from_dots(&DOTS_ISO_11548_1),
			pressed: PressedKeys::new(),
			routing: None,
			keep_awake_interval: SessionConfig::default().keep_awake_interval,
			next_keep_awake: None,
		}
	}

	fn map_key(&self, code: u8) -> Option<(KeyGroup, u8)> {
		let routing = self.routing.and_then(|range| range.map(code.into()));
		let mapped = routing.or_else(|| map_key(&KEY_RANGES, code.into()));
		if mapped.is_none() {
			warn!("unexpected key code from HumanWare display: 0x{:02X}", code);
		}
		mapped
	}

	fn configure(&mut self, response: &InitResponse) {
		self.routing = KeyRange::with_count(key::ROUTING.into(), response.cell_count, KeyGroup::Routing1);
	}

	/// Forget every held key after the display recalibrated.
	fn recalibrate(&mut self, code: u8, context: &mut Context) {
		debug!("display recalibrated (0x{:02X}), releasing {} keys", code, self.pressed.count());
		self.pressed.clear();
		context.keys.release_all(context.queue);
	}

	fn key_down(&mut self, code: u8, context: &mut Context) {
		if is_calibration(code) {
			self.recalibrate(code, context);
		} else if let Some((group, number)) = self.map_key(code) {
			self.pressed.press(code);
			context.keys.press(group, number, context.queue);
		}
	}

	fn key_up(&mut self, code: u8, context: &mut Context) {
		if self.pressed.release(code) {
			if let Some((group, number)) = self.map_key(code) {
				context.keys.release(group, number, context.queue);
			}
		}
	}

	/// Process a complete set of pressed keys.
	fn key_snapshot(&mut self, codes: &[u8], context: &mut Context) {
		let mut snapshot = Vec::with_capacity(codes.len());
		// The list may be terminated by a zero byte.
		for &code in codes.iter().take_while(|&&code| code != 0) {
			if is_calibration(code) {
				self.recalibrate(code, context);
				snapshot.clear();
			} else if self.map_key(code).is_some() {
				snapshot.push(code);
			}
		}

		let transitions = self.pressed.update(snapshot);
		for code in transitions.released {
			if let Some((group, number)) = self.map_key(code) {
				context.keys.release(group, number, context.queue);
			}
		}
		for code in transitions.pressed {
			if let Some((group, number)) = self.map_key(code) {
				context.keys.press(group, number, context.queue);
			}
		}
	}
}

impl Default for HumanWare {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Transport> Driver<T> for HumanWare {
	fn name(&self) -> &'static str {
		"HumanWare"
	}

	fn baud_rates(&self) -> &'static [u32] {
		BAUD_RATES
	}

	fn verifier(&mut self) -> &mut dyn PacketVerifier {
		&mut self.verifier
	}

	fn identify(&mut self, link: &mut Link<T>, config: &SessionConfig) -> Result<Geometry, InitializeError<T::Error>> {
		let request = encode_packet(packet_type::INIT, &[]);
		let response = probe(link, &mut self.verifier, config, &request, |packet| match Packet::parse(packet) {
			Ok(Packet::InitResponse(response)) if response.still_initializing => {
				debug!("display is still initializing");
				Ok(None)
			},
			Ok(Packet::InitResponse(response)) => Ok(Some(response)),
			Err(e) if packet[1] == packet_type::INIT_RESP => Err(e.into()),
			_ => Ok(None),
		})?;
		let response = response.ok_or(NoResponse {
			protocol: "HumanWare",
			attempts: config.identify_attempts,
		})?;
		InvalidCellCount::check(response.cell_count, MAX_CELLS)?;

		self.configure(&response);
		self.pressed.clear();
		self.keep_awake_interval = config.keep_awake_interval;
		self.next_keep_awake = Some(Instant::now() + config.keep_awake_interval);
		link.write_packet(&encode_packet(packet_type::GET_FIRMWARE_VERSION, &[]))?;
		Ok(geometry(&response))
	}

	fn write_cells(&mut self, link: &mut Link<T>, cells: &[u8], _range: ChangedRange) -> Result<(), WriteError<T::Error>> {
		BufferTooSmallError::check(cells.len(), usize::from(u8::MAX))?;
		let cells = self.table.output_cells(cells);
		link.write_packet(&encode_packet(packet_type::DISPLAY, &cells))
	}

	fn handle_packet(&mut self, _link: &mut Link<T>, packet: &[u8], context: &mut Context) -> Result<(), WriteError<T::Error>> {
		let packet = match Packet::parse(packet) {
			Ok(packet) => packet,
			Err(e) => {
				warn!("ignoring malformed packet {:02X?}: {}", packet, e);
				return Ok(());
			},
		};

		if packet == Packet::PoweringOff {
			self.pressed.clear();
			context.go_offline();
			return Ok(());
		}
		context.mark_online();

		match packet {
			Packet::Keys(codes) => self.key_snapshot(codes, context),
			Packet::KeyDown(code) => self.key_down(code, context),
			Packet::KeyUp(code) => self.key_up(code, context),
			Packet::FirmwareVersion(version) => {
				info!("HumanWare firmware version: {}", String::from_utf8_lossy(version).trim_end_matches('\0'));
			},
			Packet::InitResponse(response) if response.still_initializing => debug!("display is reinitializing"),
			Packet::InitResponse(response) => {
				if let Err(e) = InvalidCellCount::check(response.cell_count, MAX_CELLS) {
					warn!("ignoring init response: {}", e);
					return Ok(());
				}
				self.configure(&response);
				context.reidentified(geometry(&response));
			},
			Packet::PoweringOff => (),
			Packet::Other(packet_type) => debug!("ignoring packet of type 0x{:02X}", packet_type),
		}
		Ok(())
	}

	fn poll(&mut self, link: &mut Link<T>, _context: &mut Context) -> Result<(), WriteError<T::Error>> {
		let now = Instant::now();
		match self.next_keep_awake {
			Some(next) if now >= next => {
				trace!("sending keep-awake message");
				self.next_keep_awake = Some(now + self.keep_awake_interval);
				link.write_packet(&encode_packet(packet_type::KEEP_AWAKE, &[]))
			},
			_ => Ok(()),
		}
	}

	fn cancel(&mut self) {
		self.next_keep_awake = None;
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::framing::test_util::{assert_complete_at_end, assert_rejected};
	use crate::ExpectedCount;
	use assert2::{assert, let_assert};

	#[test]
	fn framing() {
		let mut verifier = HumanWareVerifier;
		assert_complete_at_end(&mut verifier, &[ESC, packet_type::INIT_RESP, 3, 0, 2, 40]);
		assert_complete_at_end(&mut verifier, &[ESC, packet_type::KEEP_AWAKE, 0]);
		assert_rejected(&mut verifier, &[0x1C, packet_type::INIT, 0]);
		assert_rejected(&mut verifier, &[ESC, 0x42, 0]);
	}

	#[test]
	fn init_response() {
		let_assert!(Ok(response) = parse_init_response(&[0, 0x02, 40]));
		assert!(response == InitResponse { still_initializing: false, model_id: 2, cell_count: 40 });
		assert!(geometry(&response).model == "Brailliant BI 40");
		assert!(geometry(&response).text_columns == 40);
		assert!(let Err(_) = parse_init_response(&[0, 2]));
	}

	#[test]
	fn decode_packets() {
		let packet = encode_packet(packet_type::KEYS, &[0x01, 0x14]);
		assert!(Packet::parse(&packet) == Ok(Packet::Keys(&[0x01, 0x14])));
		assert!(Packet::parse(&encode_packet(packet_type::KEY_UP, &[0x09])) == Ok(Packet::KeyUp(0x09)));
		assert!(let Err(_) = Packet::parse(&encode_packet(packet_type::KEY_DOWN, &[])));
		let too_long = encode_packet(packet_type::KEY_UP, &[0x09, 0x0A]);
		let_assert!(Err(e) = Packet::parse(&too_long));
		assert!(e.expected == ExpectedCount::Exact(1));
		assert!(Packet::parse(&encode_packet(packet_type::POWERING_OFF, &[])) == Ok(Packet::PoweringOff));
	}

	#[test]
	fn key_mapping() {
		let mut driver = HumanWare::new();
		driver.configure(&InitResponse { still_initializing: false, model_id: 2, cell_count: 40 });
		assert!(driver.map_key(key::DOT1) == Some((KeyGroup::Braille, 0)));
		assert!(driver.map_key(key::SPACE) == Some((KeyGroup::Braille, 8)));
		assert!(driver.map_key(0x14) == Some((KeyGroup::Navigation, 6)));
		assert!(driver.map_key(0x50 + 39) == Some((KeyGroup::Routing1, 39)));
		assert!(driver.map_key(0x50 + 40) == None);
	}
}
