//! The protocol drivers for the supported display families.
//!
//! A driver knows how packets of its protocol are framed, how a display is identified,
//! how cells are written and how received packets translate into commands.
//! The [`crate::Session`] drives it and owns everything that is shared between protocols.

use crate::command::{Command, CommandQueue};
use crate::framing::PacketVerifier;
use crate::keys::KeyState;
use crate::output::{ChangedRange, OutputBuffer};
use crate::transport::Parity;
use crate::{InitializeError, Link, SessionConfig, Transport, WriteError};
use core::time::Duration;
use std::time::Instant;

pub mod albatross;
pub mod esysiris;
pub mod freedom_scientific;
pub mod humanware;
pub mod papenmeier;

/// The layout of an identified display.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Geometry {
	/// The model name of the display.
	pub model: String,

	/// The total number of cells, text and status cells together.
	pub cell_count: usize,

	/// The number of text cells.
	pub text_columns: usize,

	/// The index of the first text cell.
	pub text_start: usize,

	/// The number of status cells.
	pub status_count: usize,

	/// The index of the first status cell.
	pub status_start: usize,
}

impl Geometry {
	/// A display that has only text cells.
	pub fn text_only(model: impl Into<String>, cell_count: usize) -> Self {
		Self {
			model: model.into(),
			cell_count,
			text_columns: cell_count,
			text_start: 0,
			status_count: 0,
			status_start: 0,
		}
	}

	/// The cell indices of the text window.
	pub fn text_range(&self) -> core::ops::Range<usize> {
		self.text_start..self.text_start + self.text_columns
	}

	/// The cell indices of the status cells.
	pub fn status_range(&self) -> core::ops::Range<usize> {
		self.status_start..self.status_start + self.status_count
	}
}

/// The supported protocols.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Protocol {
	Albatross,
	FreedomScientific,
	HumanWare,
	Esysiris,

	/// Papenmeier protocol 1, falling back to protocol 2.
	Papenmeier,
	Papenmeier1,
	Papenmeier2,
}

impl Protocol {
	/// All protocols.
	pub const ALL: [Protocol; 7] = [
		Protocol::Albatross,
		Protocol::FreedomScientific,
		Protocol::HumanWare,
		Protocol::Esysiris,
		Protocol::Papenmeier,
		Protocol::Papenmeier1,
		Protocol::Papenmeier2,
	];

	/// A human readable name of the protocol.
	pub fn name(self) -> &'static str {
		match self {
			Self::Albatross => "Albatross",
			Self::FreedomScientific => "FreedomScientific",
			Self::HumanWare => "HumanWare",
			Self::Esysiris => "Esysiris",
			Self::Papenmeier => "Papenmeier",
			Self::Papenmeier1 => "Papenmeier1",
			Self::Papenmeier2 => "Papenmeier2",
		}
	}

	/// The drivers to try for this protocol, in order.
	pub fn drivers<T: Transport>(self) -> Vec<Box<dyn Driver<T>>> {
		match self {
			Self::Albatross => vec![Box::new(albatross::Albatross::new())],
			Self::FreedomScientific => vec![Box::new(freedom_scientific::FreedomScientific::new())],
			Self::HumanWare => vec![Box::new(humanware::HumanWare::new())],
			Self::Esysiris => vec![Box::new(esysiris::Esysiris::new())],
			Self::Papenmeier => vec![
				Box::new(papenmeier::Protocol1::new()),
				Box::new(papenmeier::Protocol2::new()),
			],
			Self::Papenmeier1 => vec![Box::new(papenmeier::Protocol1::new())],
			Self::Papenmeier2 => vec![Box::new(papenmeier::Protocol2::new())],
		}
	}
}

impl std::fmt::Display for Protocol {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

/// The session state a driver may touch while handling packets.
pub struct Context<'a> {
	/// The keys currently held down.
	pub keys: &'a mut KeyState,

	/// The commands for the caller.
	pub queue: &'a mut CommandQueue,

	/// The cells as last transmitted.
	pub output: &'a mut OutputBuffer,

	/// The geometry of the display.
	pub geometry: &'a mut Geometry,

	/// The settings of the session.
	pub config: &'a SessionConfig,
}

impl Context<'_> {
	/// Apply a new geometry after the display identified itself again.
	///
	/// The whole display is rewritten, and the caller is told if the geometry changed.
	pub fn reidentified(&mut self, geometry: Geometry) {
		if *self.geometry != geometry {
			debug!("display geometry changed: {:?}", geometry);
			self.output.resize(geometry.cell_count);
			*self.geometry = geometry.clone();
			self.queue.push(Command::Resized(geometry));
		} else {
			self.output.force_rewrite();
		}
	}

	/// The display is going away: release all keys and report it offline.
	pub fn go_offline(&mut self) {
		self.keys.release_all(self.queue);
		if self.queue.set_offline(true) {
			info!("display went offline");
		}
	}

	/// The display sent something, so it is back online.
	pub fn mark_online(&mut self) {
		if self.queue.set_offline(false) {
			info!("display is back online");
			self.output.force_rewrite();
		}
	}
}

/// A protocol driver.
pub trait Driver<T: Transport> {
	/// The name of the protocol.
	fn name(&self) -> &'static str;

	/// The baud rates to try, in order.
	fn baud_rates(&self) -> &'static [u32];

	/// The parity of the serial connection.
	fn parity(&self) -> Parity {
		Parity::None
	}

	/// The packet verifier of the protocol.
	fn verifier(&mut self) -> &mut dyn PacketVerifier;

	/// Identify the display on the other side of the link.
	///
	/// The link has already been configured with a baud rate from [`Self::baud_rates()`] and [`Self::parity()`].
	fn identify(&mut self, link: &mut Link<T>, config: &SessionConfig) -> Result<Geometry, InitializeError<T::Error>>;

	/// Transmit `range` of the logical cells.
	///
	/// `cells` always holds the complete display, so drivers that can only write everything may ignore the range.
	fn write_cells(&mut self, link: &mut Link<T>, cells: &[u8], range: ChangedRange) -> Result<(), WriteError<T::Error>>;

	/// Process a verified packet.
	fn handle_packet(&mut self, link: &mut Link<T>, packet: &[u8], context: &mut Context) -> Result<(), WriteError<T::Error>>;

	/// Run timers of the driver.
	///
	/// Called whenever the session reads from the display.
	fn poll(&mut self, link: &mut Link<T>, context: &mut Context) -> Result<(), WriteError<T::Error>> {
		let _ = (link, context);
		Ok(())
	}

	/// Set the firmness of the dots.
	///
	/// Returns `Ok(false)` if the display does not support it.
	fn set_firmness(&mut self, link: &mut Link<T>, level: u8) -> Result<bool, WriteError<T::Error>> {
		let _ = (link, level);
		Ok(false)
	}

	/// Stop all pending timers, the session is going away.
	fn cancel(&mut self) {}
}

/// Wait for a verified packet until a deadline.
pub(crate) fn read_until<T: Transport>(
	link: &mut Link<T>,
	verifier: &mut dyn PacketVerifier,
	deadline: Instant,
	packet: &mut Vec<u8>,
) -> Result<bool, InitializeError<T::Error>> {
	let now = Instant::now();
	if now >= deadline {
		return Ok(false);
	}
	Ok(link.read_packet(verifier, deadline - now, packet)?)
}

/// Send `request` and wait for a packet accepted by `accept`.
///
/// Packets that are not accepted are ignored.
/// The request is sent up to `config.identify_attempts` times.
/// Returns `Ok(None)` if no acceptable answer arrived at all.
pub(crate) fn probe<T, R, F>(
	link: &mut Link<T>,
	verifier: &mut dyn PacketVerifier,
	config: &SessionConfig,
	request: &[u8],
	mut accept: F,
) -> Result<Option<R>, InitializeError<T::Error>>
where
	T: Transport,
	F: FnMut(&[u8]) -> Result<Option<R>, InitializeError<T::Error>>,
{
	let mut packet = Vec::new();
	for attempt in 1..=config.identify_attempts {
		debug!("sending identification request, attempt {} of {}", attempt, config.identify_attempts);
		link.discard_input()?;
		link.write_packet(request)?;
		let deadline = Instant::now() + response_timeout(link, config, request.len());
		while read_until(link, verifier, deadline, &mut packet)? {
			if let Some(result) = accept(&packet)? {
				return Ok(Some(result));
			}
			debug!("ignoring packet while waiting for identification: {:02X?}", packet);
		}
	}
	Ok(None)
}

/// The time to wait for an answer to a request of the given size.
pub(crate) fn response_timeout<T: Transport>(link: &Link<T>, config: &SessionConfig, request_size: usize) -> Duration {
	config.response_timeout + link.transfer_time(request_size)
}
