//! Tunable timing and connection parameters of a session.

use core::time::Duration;

/// Settings used while connecting to and talking with a display.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SessionConfig {
	/// Use this baud rate instead of trying the defaults of the driver.
	pub baud_rate: Option<u32>,

	/// Time to wait for an answer to an identification request.
	///
	/// The transfer time of the request itself is added on top.
	pub response_timeout: Duration,

	/// Number of identification requests sent per baud rate before giving up.
	pub identify_attempts: usize,

	/// Time [`crate::Session::read_command()`] waits for a packet when nothing is buffered.
	pub poll_timeout: Duration,

	/// Time to wait for the next byte of a packet that has already started.
	pub inter_byte_timeout: Duration,

	/// Time to wait for the acknowledgement of a write before treating it as lost.
	pub ack_timeout: Duration,

	/// Interval between keep-awake messages for displays that power down when idle.
	pub keep_awake_interval: Duration,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			baud_rate: None,
			response_timeout: Duration::from_millis(1000),
			identify_attempts: 3,
			poll_timeout: Duration::ZERO,
			inter_byte_timeout: crate::link::DEFAULT_INTER_BYTE_TIMEOUT,
			ack_timeout: Duration::from_millis(500),
			keep_awake_interval: Duration::from_secs(10),
		}
	}
}

impl SessionConfig {
	/// The baud rates to try, in order.
	pub fn baud_rates<'a>(&'a self, defaults: &'a [u32]) -> &'a [u32] {
		match &self.baud_rate {
			Some(baud_rate) => core::slice::from_ref(baud_rate),
			None => defaults,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use assert2::assert;

	#[test]
	fn baud_rate_override() {
		let mut config = SessionConfig::default();
		assert!(config.baud_rates(&[19200, 9600]) == [19200, 9600]);
		config.baud_rate = Some(4800);
		assert!(config.baud_rates(&[19200, 9600]) == [4800]);
	}
}
