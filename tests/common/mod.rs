#![allow(dead_code)]

use braille_display::{Parity, SessionConfig, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A scripted display on the other side of a fake serial line.
///
/// Clones share the same state, so a test can keep a handle while the session owns the transport.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
	state: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
	input: VecDeque<u8>,
	written: Vec<Vec<u8>>,
	baud_rate: u32,
	baud_rates: Vec<u32>,
	parity: Option<Parity>,
	replies: Vec<(Vec<u8>, Vec<u8>)>,
	broken: bool,
	noise: Option<u8>,
}

impl MockTransport {
	pub fn new(baud_rate: u32) -> Self {
		let transport = Self::default();
		transport.lock().baud_rate = baud_rate;
		transport
	}

	fn lock(&self) -> MutexGuard<'_, MockState> {
		self.state.lock().unwrap()
	}

	/// Make bytes available for reading.
	pub fn push_input(&self, data: &[u8]) {
		self.lock().input.extend(data);
	}

	/// Every time `request` is written, make `reply` available for reading.
	pub fn reply_to(&self, request: &[u8], reply: &[u8]) {
		self.lock().replies.push((request.to_vec(), reply.to_vec()));
	}

	/// All packets written so far.
	pub fn written(&self) -> Vec<Vec<u8>> {
		self.lock().written.clone()
	}

	/// Take all packets written so far.
	pub fn take_written(&self) -> Vec<Vec<u8>> {
		std::mem::take(&mut self.lock().written)
	}

	/// All baud rates that were configured, in order.
	pub fn baud_rates(&self) -> Vec<u32> {
		self.lock().baud_rates.clone()
	}

	/// The last configured parity.
	pub fn parity(&self) -> Option<Parity> {
		self.lock().parity
	}

	/// Make every following read return this byte, without ever running dry.
	pub fn stream_noise(&self, byte: u8) {
		self.lock().noise = Some(byte);
	}

	/// Make every following read fail with a hard error.
	pub fn break_connection(&self) {
		self.lock().broken = true;
	}
}

impl Transport for MockTransport {
	type Error = std::io::Error;

	fn baud_rate(&self) -> Result<u32, Self::Error> {
		Ok(self.lock().baud_rate)
	}

	fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), Self::Error> {
		let mut state = self.lock();
		state.baud_rate = baud_rate;
		state.baud_rates.push(baud_rate);
		Ok(())
	}

	fn set_parity(&mut self, parity: Parity) -> Result<(), Self::Error> {
		self.lock().parity = Some(parity);
		Ok(())
	}

	fn discard_input_buffer(&mut self) -> Result<(), Self::Error> {
		self.lock().input.clear();
		Ok(())
	}

	fn read(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize, Self::Error> {
		{
			let mut state = self.lock();
			if state.broken {
				return Err(std::io::ErrorKind::BrokenPipe.into());
			}
			if let Some(byte) = state.noise {
				buffer.fill(byte);
				return Ok(buffer.len());
			}
			if !state.input.is_empty() {
				let count = buffer.len().min(state.input.len());
				for (out, byte) in buffer.iter_mut().zip(state.input.drain(..count)) {
					*out = byte;
				}
				return Ok(count);
			}
		}
		std::thread::sleep(timeout.min(Duration::from_millis(2)));
		Err(std::io::ErrorKind::TimedOut.into())
	}

	fn write_all(&mut self, buffer: &[u8]) -> Result<(), Self::Error> {
		let mut state = self.lock();
		if state.broken {
			return Err(std::io::ErrorKind::BrokenPipe.into());
		}
		state.written.push(buffer.to_vec());
		let replies: Vec<u8> = state
			.replies
			.iter()
			.filter(|(request, _)| request == buffer)
			.flat_map(|(_, reply)| reply.iter().copied())
			.collect();
		state.input.extend(replies);
		Ok(())
	}

	fn is_timeout_error(error: &Self::Error) -> bool {
		error.kind() == std::io::ErrorKind::TimedOut
	}
}

/// Settings with short timeouts, so failing identifications do not slow down the tests.
pub fn test_config() -> SessionConfig {
	SessionConfig {
		response_timeout: Duration::from_millis(50),
		identify_attempts: 2,
		ack_timeout: Duration::from_millis(200),
		..SessionConfig::default()
	}
}
