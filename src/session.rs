//! A connection to one braille display.

use crate::command::{Command, CommandQueue};
use crate::drivers::{Context, Driver, Geometry, Protocol};
use crate::keys::KeyState;
use crate::output::OutputBuffer;
use crate::{InitializeError, Link, NoResponse, SessionConfig, Transport, WriteError};
use core::time::Duration;

/// The life cycle of a session.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum State {
	/// The connection failed, the session must be restarted.
	Disconnected,

	/// The display is being identified.
	Probing,

	/// The display is identified, but nothing has been exchanged yet.
	Identified,

	/// Cells and keys are flowing.
	Active,
}

/// A connection to an identified braille display.
///
/// The session owns the transport, the driver and all state shared between protocols.
/// It is driven by the caller: [`Self::write_window()`] and [`Self::write_status()`] update the cells,
/// [`Self::read_command()`] processes input from the display and runs the timers of the driver.
pub struct Session<T: Transport> {
	link: Link<T>,
	driver: Box<dyn Driver<T>>,
	config: SessionConfig,
	state: State,
	geometry: Geometry,

	/// The logical cells of the whole display.
	cells: Vec<u8>,
	output: OutputBuffer,
	keys: KeyState,
	queue: CommandQueue,
	packet: Vec<u8>,
}

impl<T> core::fmt::Debug for Session<T>
where
	T: Transport + core::fmt::Debug,
{
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Session")
			.field("link", &self.link)
			.field("driver", &self.driver.name())
			.field("state", &self.state)
			.field("geometry", &self.geometry)
			.finish_non_exhaustive()
	}
}

#[cfg(feature = "serial2")]
impl Session<serial2::SerialPort> {
	/// Open a serial port and connect to the display on the other side.
	pub fn open(
		path: impl AsRef<std::path::Path>,
		protocol: Protocol,
		config: SessionConfig,
	) -> Result<Self, InitializeError<std::io::Error>> {
		let baud_rate = config.baud_rate.unwrap_or(9600);
		let port = serial2::SerialPort::open(path, baud_rate).map_err(InitializeError::Open)?;
		Self::connect(port, protocol, config)
	}
}

impl<T> Session<T>
where
	T: Transport,
	T::Error: std::fmt::Display,
{
	/// Identify the display on a transport.
	///
	/// Every driver of the protocol is tried at each of its baud rates,
	/// until one of them identifies the display.
	/// A [`Command::Resized`] with the geometry of the display is queued for the caller.
	pub fn connect(transport: T, protocol: Protocol, config: SessionConfig) -> Result<Self, InitializeError<T::Error>> {
		let mut link = Link::new(transport).map_err(InitializeError::Configure)?;
		link.set_inter_byte_timeout(config.inter_byte_timeout);

		let mut last_error = None;
		for mut driver in protocol.drivers::<T>() {
			let baud_rates = config.baud_rates(driver.baud_rates()).to_vec();
			for baud_rate in baud_rates {
				debug!("probing for {} display at {} baud", driver.name(), baud_rate);
				link.set_baud_rate(baud_rate).map_err(InitializeError::Configure)?;
				link.set_parity(driver.parity()).map_err(InitializeError::Configure)?;
				match driver.identify(&mut link, &config) {
					Ok(geometry) => return Ok(Self::identified(link, driver, config, geometry)),
					Err(InitializeError::NoResponse(e)) => {
						debug!("{}", e);
						last_error = Some(InitializeError::NoResponse(e));
					},
					Err(e) => return Err(e),
				}
			}
		}

		Err(last_error.unwrap_or_else(|| {
			NoResponse {
				protocol: protocol.name(),
				attempts: 0,
			}
			.into()
		}))
	}

	fn identified(link: Link<T>, driver: Box<dyn Driver<T>>, config: SessionConfig, geometry: Geometry) -> Self {
		info!(
			"connected to {} using the {} protocol: {} cells, {} text, {} status",
			geometry.model,
			driver.name(),
			geometry.cell_count,
			geometry.text_columns,
			geometry.status_count
		);
		let mut queue = CommandQueue::new();
		queue.push(Command::Resized(geometry.clone()));
		Self {
			link,
			driver,
			config,
			state: State::Identified,
			cells: vec![0; geometry.cell_count],
			output: OutputBuffer::new(geometry.cell_count),
			geometry,
			keys: KeyState::new(),
			queue,
			packet: Vec::with_capacity(64),
		}
	}

	/// Run the identification of the display again, with the current driver and baud rate.
	///
	/// This can bring a disconnected session back if the transport recovered.
	pub fn reidentify(&mut self) -> Result<(), InitializeError<T::Error>> {
		self.state = State::Probing;
		self.driver.cancel();
		self.keys.release_all(&mut self.queue);

		match self.driver.identify(&mut self.link, &self.config) {
			Ok(geometry) => {
				self.state = State::Identified;
				self.queue.set_offline(false);
				let mut context = Context {
					keys: &mut self.keys,
					queue: &mut self.queue,
					output: &mut self.output,
					geometry: &mut self.geometry,
					config: &self.config,
				};
				context.reidentified(geometry);
				self.sync_cells();
				Ok(())
			},
			Err(e) => {
				self.state = State::Disconnected;
				Err(e)
			},
		}
	}

	/// The state of the session.
	pub fn state(&self) -> State {
		self.state
	}

	/// The geometry of the display.
	pub fn geometry(&self) -> &Geometry {
		&self.geometry
	}

	/// The name of the protocol driver in use.
	pub fn driver_name(&self) -> &'static str {
		self.driver.name()
	}

	/// The settings of the session.
	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// The keys currently held down.
	pub fn keys(&self) -> &KeyState {
		&self.keys
	}

	/// Check if the display reported that it is offline.
	pub fn is_offline(&self) -> bool {
		self.queue.is_offline()
	}

	/// Get a reference to the underlying transport.
	pub fn transport(&self) -> &T {
		self.link.transport()
	}

	/// Set the time [`Self::read_command()`] waits for input.
	pub fn set_poll_timeout(&mut self, timeout: Duration) {
		self.config.poll_timeout = timeout;
	}

	/// Show text on the display.
	///
	/// `text` holds one logical cell per text column, missing cells are cleared and extra cells are ignored.
	/// Only the cells that changed are sent.
	/// Returns `Ok(false)` if nothing needed to be sent.
	pub fn write_window(&mut self, text: &[u8]) -> Result<bool, WriteError<T::Error>> {
		let range = self.geometry.text_range();
		fill(&mut self.cells[range], text);
		self.flush()
	}

	/// Show status cells on the display.
	///
	/// Displays without status cells ignore this.
	pub fn write_status(&mut self, status: &[u8]) -> Result<bool, WriteError<T::Error>> {
		let range = self.geometry.status_range();
		fill(&mut self.cells[range], status);
		self.flush()
	}

	/// Make the next write send every cell.
	pub fn force_rewrite(&mut self) {
		self.output.force_rewrite();
	}

	/// Send the changed cells to the display.
	fn flush(&mut self) -> Result<bool, WriteError<T::Error>> {
		if self.state == State::Disconnected {
			return Err(WriteError::Disconnected);
		}

		let driver = &mut self.driver;
		let link = &mut self.link;
		let written = self.output.update(&self.cells, |cells, range| driver.write_cells(link, cells, range));
		let written = match written {
			Ok(written) => self.poll_driver().map(|()| written),
			Err(e) => Err(e),
		};

		match written {
			Ok(written) => {
				self.state = State::Active;
				Ok(written)
			},
			Err(e) => {
				self.fail(&e);
				Err(e)
			},
		}
	}

	/// Process input from the display and return the oldest pending command.
	///
	/// Waits up to the poll timeout for the first packet, then processes everything that is already buffered.
	/// Returns [`Command::Offline`] while the display is switched off,
	/// and [`Command::RestartDriver`] once the connection failed.
	pub fn read_command(&mut self) -> Command {
		if self.state == State::Disconnected {
			return Command::RestartDriver;
		}

		if let Err(e) = self.process_input() {
			self.fail(&e);
			return Command::RestartDriver;
		}
		self.state = State::Active;

		match self.queue.pop() {
			Some(command) => command,
			None if self.queue.is_offline() => Command::Offline,
			None => Command::None,
		}
	}

	fn process_input(&mut self) -> Result<(), WriteError<T::Error>> {
		let mut packet = core::mem::take(&mut self.packet);
		let mut timeout = self.config.poll_timeout;

		let result = loop {
			match self.link.read_packet(self.driver.verifier(), timeout, &mut packet) {
				Ok(true) => (),
				Ok(false) => break Ok(()),
				Err(crate::ReadError::Io(e)) => {
					error!("failed to read from display: {}", e);
					break Err(WriteError::Disconnected);
				},
			}
			timeout = Duration::ZERO;

			let mut context = Context {
				keys: &mut self.keys,
				queue: &mut self.queue,
				output: &mut self.output,
				geometry: &mut self.geometry,
				config: &self.config,
			};
			if let Err(e) = self.driver.handle_packet(&mut self.link, &packet, &mut context) {
				break Err(e);
			}
			self.sync_cells();
		};

		self.packet = packet;
		result?;
		self.poll_driver()
	}

	fn poll_driver(&mut self) -> Result<(), WriteError<T::Error>> {
		let mut context = Context {
			keys: &mut self.keys,
			queue: &mut self.queue,
			output: &mut self.output,
			geometry: &mut self.geometry,
			config: &self.config,
		};
		self.driver.poll(&mut self.link, &mut context)
	}

	/// Resize the cell buffer after the geometry changed.
	fn sync_cells(&mut self) {
		if self.cells.len() != self.geometry.cell_count {
			self.cells.resize(self.geometry.cell_count, 0);
		}
	}

	fn fail(&mut self, error: &WriteError<T::Error>) {
		error!("lost connection to display: {}", error);
		self.state = State::Disconnected;
		self.driver.cancel();
		self.keys.release_all(&mut self.queue);
	}

	/// Set the firmness of the dots, from 0 (soft) to 2 (hard).
	///
	/// Returns `Ok(false)` if the display does not support it.
	pub fn set_firmness(&mut self, level: u8) -> Result<bool, WriteError<T::Error>> {
		if self.state == State::Disconnected {
			return Err(WriteError::Disconnected);
		}
		self.driver.set_firmness(&mut self.link, level)
	}

	/// Close the session and get the transport back.
	///
	/// Timers of the driver are stopped and all held keys are released.
	/// The release events are dropped with the session.
	pub fn disconnect(mut self) -> T {
		debug!("disconnecting from {}", self.geometry.model);
		self.driver.cancel();
		self.keys.release_all(&mut self.queue);
		self.link.into_transport()
	}
}

/// Copy `data` into `cells`, clearing the cells it does not cover.
fn fill(cells: &mut [u8], data: &[u8]) {
	let count = cells.len().min(data.len());
	cells[..count].copy_from_slice(&data[..count]);
	cells[count..].fill(0);
}

#[cfg(test)]
mod test {
	use super::*;
	use assert2::assert;

	#[test]
	fn fill_pads_and_truncates() {
		let mut cells = [9; 4];
		fill(&mut cells, &[1, 2]);
		assert!(cells == [1, 2, 0, 0]);
		fill(&mut cells, &[1, 2, 3, 4, 5]);
		assert!(cells == [1, 2, 3, 4]);
	}
}
