//! Packet level access to a [`Transport`].

use crate::framing::{PacketVerifier, Verification};
use crate::transport::Parity;
use crate::{ReadError, Transport, WriteError};
use core::time::Duration;
use std::time::Instant;

/// Default time to wait for the next byte of a packet that has already started.
pub const DEFAULT_INTER_BYTE_TIMEOUT: Duration = Duration::from_millis(100);

/// Packet level access to a display connection.
///
/// The link owns the transport and a buffer with received bytes that have not been consumed yet.
/// Packets are delimited by a protocol specific [`PacketVerifier`].
pub struct Link<T: Transport> {
	/// The underlying byte channel (normally a serial port).
	transport: T,

	/// The baud rate of the transport, if known.
	baud_rate: u32,

	/// Received bytes that have not been returned as part of a packet yet.
	input: Vec<u8>,

	/// The number of leading bytes in `input` that the verifier accepted as a valid prefix.
	verified: usize,

	/// Time to wait for the rest of a packet once the first byte has arrived.
	inter_byte_timeout: Duration,
}

impl<T> core::fmt::Debug for Link<T>
where
	T: Transport + core::fmt::Debug,
{
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Link")
			.field("transport", &self.transport)
			.field("baud_rate", &self.baud_rate)
			.finish_non_exhaustive()
	}
}

impl<T: Transport> Link<T> {
	/// Create a new link for an open transport.
	pub fn new(transport: T) -> Result<Self, T::Error> {
		let baud_rate = transport.baud_rate()?;
		Ok(Self::with_baud_rate(transport, baud_rate))
	}

	/// Create a new link for an open transport with a known baud rate.
	pub fn with_baud_rate(transport: T, baud_rate: u32) -> Self {
		Self {
			transport,
			baud_rate,
			input: Vec::with_capacity(256),
			verified: 0,
			inter_byte_timeout: DEFAULT_INTER_BYTE_TIMEOUT,
		}
	}

	/// Get a reference to the underlying transport.
	///
	/// Note that performing any read or write with the transport bypasses the input buffer of the link,
	/// and may disrupt the communication with the display.
	pub fn transport(&self) -> &T {
		&self.transport
	}

	/// Consume the link to get ownership of the transport.
	///
	/// This discards any data in the input buffer of the link.
	pub fn into_transport(self) -> T {
		self.transport
	}

	/// Get the baud rate of the link.
	pub fn baud_rate(&self) -> u32 {
		self.baud_rate
	}

	/// Set the baud rate of the underlying transport.
	pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), T::Error> {
		self.transport.set_baud_rate(baud_rate)?;
		self.baud_rate = baud_rate;
		Ok(())
	}

	/// Set the parity of the underlying transport.
	pub fn set_parity(&mut self, parity: Parity) -> Result<(), T::Error> {
		self.transport.set_parity(parity)
	}

	/// Set the time to wait for the remainder of a packet that has already started.
	pub fn set_inter_byte_timeout(&mut self, timeout: Duration) {
		self.inter_byte_timeout = timeout;
	}

	/// The time it takes to transfer a message of the given size at the current baud rate.
	pub fn transfer_time(&self, message_size: usize) -> Duration {
		message_transfer_time(message_size as u32, self.baud_rate)
	}

	/// Throw away all buffered input, both in the link and in the transport.
	pub fn discard_input(&mut self) -> Result<(), WriteError<T::Error>> {
		self.input.clear();
		self.verified = 0;
		self.transport.discard_input_buffer().map_err(WriteError::DiscardBuffer)
	}

	/// Write a complete packet to the transport.
	pub fn write_packet(&mut self, packet: &[u8]) -> Result<(), WriteError<T::Error>> {
		trace!("sending packet: {:02X?}", packet);
		self.transport.write_all(packet).map_err(WriteError::Write)
	}

	/// Read the next verified packet.
	///
	/// Returns `Ok(true)` with the packet copied into `packet`,
	/// or `Ok(false)` if no complete packet arrived before the timeout expired.
	///
	/// Bytes that can not start a valid packet are discarded one at a time,
	/// so a corrupted packet never takes the start of the next packet with it.
	/// A packet that stops arriving halfway is discarded after the inter-byte timeout.
	/// Even if bytes keep arriving, this returns at most one inter-byte timeout after `timeout` expires.
	pub fn read_packet(
		&mut self,
		verifier: &mut dyn PacketVerifier,
		timeout: Duration,
		packet: &mut Vec<u8>,
	) -> Result<bool, ReadError<T::Error>> {
		let deadline = Instant::now() + timeout;

		loop {
			if let Some(length) = self.scan(verifier) {
				packet.clear();
				packet.extend_from_slice(&self.input[..length]);
				self.consume_input(length);
				trace!("received packet: {:02X?}", packet);
				return Ok(true);
			}

			let now = Instant::now();
			let packet_started = !self.input.is_empty();
			if !packet_started && now >= deadline && timeout > Duration::ZERO {
				return Ok(false);
			}
			// A started packet may use the inter-byte timeout past the deadline, but no more.
			if packet_started && now >= deadline + self.inter_byte_timeout {
				debug!("no complete packet before the deadline, keeping {} pending bytes", self.input.len());
				return Ok(false);
			}
			let wait = if packet_started {
				self.inter_byte_timeout
			} else {
				deadline.saturating_duration_since(now)
			};

			let mut chunk = [0u8; 64];
			let new_data = match self.transport.read(&mut chunk, wait) {
				Ok(count) => count,
				Err(e) if T::is_timeout_error(&e) => 0,
				Err(e) => return Err(ReadError::Io(e)),
			};

			if new_data > 0 {
				self.input.extend_from_slice(&chunk[..new_data]);
				continue;
			}

			if packet_started {
				warn!("discarding truncated packet: {:02X?}", self.input);
				self.consume_input(self.input.len());
			}
			if Instant::now() >= deadline {
				return Ok(false);
			}
		}
	}

	/// Run the verifier over the unverified part of the input buffer.
	///
	/// Returns the length of a complete packet at the start of the input buffer, if there is one.
	fn scan(&mut self, verifier: &mut dyn PacketVerifier) -> Option<usize> {
		let mut discarded = Vec::new();

		if self.verified == 0 {
			verifier.reset();
		}

		let result = loop {
			if self.verified >= self.input.len() {
				break None;
			}

			let size = self.verified + 1;
			match verifier.verify(&self.input[..size]) {
				Verification::Incomplete => self.verified = size,
				Verification::Complete(length) => {
					debug_assert_eq!(length, size);
					break Some(length);
				},
				Verification::Invalid => {
					// Drop one byte and look for a packet start in the remaining bytes.
					discarded.push(self.input[0]);
					self.consume_input(1);
					verifier.reset();
				},
			}
		};

		if !discarded.is_empty() {
			warn!("discarded {} bytes of invalid input: {:02X?}", discarded.len(), discarded);
		}

		result
	}

	fn consume_input(&mut self, len: usize) {
		debug_assert!(len <= self.input.len());
		self.input.drain(..len);
		self.verified = 0;
	}
}

/// Calculate the required time to transfer a message of a given size.
///
/// The size must include any headers and footers of the message.
pub(crate) fn message_transfer_time(message_size: u32, baud_rate: u32) -> Duration {
	if baud_rate == 0 {
		return Duration::ZERO;
	}
	let baud_rate = u64::from(baud_rate);
	let bits = u64::from(message_size) * 10; // each byte is 1 start bit, 8 data bits and 1 stop bit.
	let secs = bits / baud_rate;
	let subsec_bits = bits % baud_rate;
	let nanos = (subsec_bits * 1_000_000_000).div_ceil(baud_rate);
	Duration::new(secs, nanos as u32)
}
