//! Trait implementation using the `serial2` crate.

use super::Parity;
use std::time::Duration;

/// Re-exported `serial2` crate in case you need to modify serial port settings.
pub use serial2;

impl crate::Transport for serial2::SerialPort {
	type Error = std::io::Error;

	fn baud_rate(&self) -> Result<u32, Self::Error> {
		self.get_configuration()?.get_baud_rate()
	}

	fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), Self::Error> {
		let mut settings = self.get_configuration()?;
		settings.set_baud_rate(baud_rate)?;
		self.set_configuration(&settings)?;
		Ok(())
	}

	fn set_parity(&mut self, parity: Parity) -> Result<(), Self::Error> {
		let mut settings = self.get_configuration()?;
		settings.set_parity(match parity {
			Parity::None => serial2::Parity::None,
			Parity::Odd => serial2::Parity::Odd,
			Parity::Even => serial2::Parity::Even,
		});
		self.set_configuration(&settings)?;
		Ok(())
	}

	fn discard_input_buffer(&mut self) -> Result<(), Self::Error> {
		serial2::SerialPort::discard_input_buffer(self)
	}

	fn read(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize, Self::Error> {
		self.set_read_timeout(timeout)?;
		serial2::SerialPort::read(self, buffer)
	}

	fn write_all(&mut self, buffer: &[u8]) -> Result<(), Self::Error> {
		serial2::SerialPort::write_all(self, buffer)
	}

	fn is_timeout_error(error: &Self::Error) -> bool {
		error.kind() == std::io::ErrorKind::TimedOut
	}
}
