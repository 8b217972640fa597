//! [`Transport`] trait to support talking to a display over different byte channels.

use core::time::Duration;

#[cfg(feature = "serial2")]
pub mod serial2;

/// Parity setting of a serial line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Parity {
	None,
	Odd,
	Even,
}

/// [`Transport`]s carry raw bytes between the host and a braille display.
///
/// The implementor is normally a serial port, but USB and Bluetooth channels work just as well,
/// as long as they can tell the difference between "no data yet" and a hard failure.
/// Transports without a notion of baud rate or parity may accept and ignore those settings.
pub trait Transport {
	/// The error type returned by the transport.
	type Error;

	/// Get the current baud rate of the transport.
	fn baud_rate(&self) -> Result<u32, Self::Error>;

	/// Set the baud rate of the transport.
	fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), Self::Error>;

	/// Set the parity of the transport.
	fn set_parity(&mut self, parity: Parity) -> Result<(), Self::Error>;

	/// Discard the input buffer of the transport. Maybe a no-op on some platforms.
	fn discard_input_buffer(&mut self) -> Result<(), Self::Error>;

	/// Returns available bytes, blocking until at least one byte is available or the timeout expires.
	///
	/// When the timeout expires an error must be returned for which [`Self::is_timeout_error()`] returns true.
	fn read(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize, Self::Error>;

	/// Write all bytes in the buffer to the transport.
	fn write_all(&mut self, buffer: &[u8]) -> Result<(), Self::Error>;

	/// Check if an error indicates a timeout ("no data yet") rather than a hard failure.
	fn is_timeout_error(error: &Self::Error) -> bool;
}
