/// An error that can occur while identifying a display.
#[derive(Debug)]
pub enum InitializeError<E> {
	/// Failed to open the transport.
	Open(E),

	/// Failed to configure the transport (baud rate or parity).
	Configure(E),

	/// Failed to write a probe packet.
	Write(WriteError<E>),

	/// Failed to read from the transport.
	Read(ReadError<E>),

	/// The display identified itself as a model we do not know.
	UnknownModel(UnknownModel),

	/// The display sent a malformed identification.
	InvalidMessage(InvalidMessage),

	/// The display did not answer within the retry budget.
	NoResponse(NoResponse),
}

/// An error that can occur while writing to a display.
#[derive(Debug)]
pub enum WriteError<E> {
	/// Failed to discard the input buffer of the transport.
	DiscardBuffer(E),

	/// Failed to write to the transport.
	Write(E),

	/// The data does not fit in a single packet.
	BufferTooSmall(BufferTooSmallError),

	/// The session lost its connection to the display.
	Disconnected,
}

/// An error that can occur while reading from a display.
///
/// Running out of time without receiving a packet is not an error,
/// it is reported as "no packet" by [`crate::Link::read_packet()`].
#[derive(Debug)]
pub enum ReadError<E> {
	/// The transport reported a hard failure.
	Io(E),
}

/// A received packet is well framed but its content makes no sense.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum InvalidMessage {
	InvalidPayloadLength(InvalidPayloadLength),
	InvalidCellCount(InvalidCellCount),
}

/// The display reported a model identifier that is not in the model table.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UnknownModel {
	pub protocol: &'static str,
	pub identifier: String,
}

/// No valid identification was received.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NoResponse {
	pub protocol: &'static str,
	pub attempts: usize,
}

/// The expected number of bytes.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ExpectedCount {
	Exact(usize),
	Min(usize),
}

/// The payload of a packet has an unexpected length.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InvalidPayloadLength {
	pub actual: usize,
	pub expected: ExpectedCount,
}

/// The display reported a cell count we can not drive.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InvalidCellCount {
	pub actual: usize,
	pub max: usize,
}

/// The buffer is too small to hold the entire packet.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BufferTooSmallError {
	pub required_size: usize,
	pub total_size: usize,
}

impl InvalidPayloadLength {
	pub fn check(actual: usize, expected: usize) -> Result<(), Self> {
		if actual == expected {
			Ok(())
		} else {
			Err(Self {
				actual,
				expected: ExpectedCount::Exact(expected),
			})
		}
	}

	pub fn check_min(actual: usize, min: usize) -> Result<(), Self> {
		if actual >= min {
			Ok(())
		} else {
			Err(Self {
				actual,
				expected: ExpectedCount::Min(min),
			})
		}
	}
}

impl InvalidCellCount {
	pub fn check(actual: usize, max: usize) -> Result<(), Self> {
		if actual > 0 && actual <= max {
			Ok(())
		} else {
			Err(Self { actual, max })
		}
	}
}

impl BufferTooSmallError {
	pub fn check(required_size: usize, total_size: usize) -> Result<(), Self> {
		if required_size <= total_size {
			Ok(())
		} else {
			Err(Self { required_size, total_size })
		}
	}
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for InitializeError<E> {}
impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for WriteError<E> {}
impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for ReadError<E> {}
impl std::error::Error for InvalidMessage {}
impl std::error::Error for UnknownModel {}
impl std::error::Error for NoResponse {}
impl std::error::Error for InvalidPayloadLength {}
impl std::error::Error for InvalidCellCount {}
impl std::error::Error for BufferTooSmallError {}

impl<E> From<WriteError<E>> for InitializeError<E> {
	fn from(other: WriteError<E>) -> Self {
		Self::Write(other)
	}
}

impl<E> From<ReadError<E>> for InitializeError<E> {
	fn from(other: ReadError<E>) -> Self {
		Self::Read(other)
	}
}

impl<E> From<UnknownModel> for InitializeError<E> {
	fn from(other: UnknownModel) -> Self {
		Self::UnknownModel(other)
	}
}

impl<E> From<InvalidMessage> for InitializeError<E> {
	fn from(other: InvalidMessage) -> Self {
		Self::InvalidMessage(other)
	}
}

impl<E> From<InvalidPayloadLength> for InitializeError<E> {
	fn from(other: InvalidPayloadLength) -> Self {
		Self::InvalidMessage(other.into())
	}
}

impl<E> From<InvalidCellCount> for InitializeError<E> {
	fn from(other: InvalidCellCount) -> Self {
		Self::InvalidMessage(other.into())
	}
}

impl<E> From<NoResponse> for InitializeError<E> {
	fn from(other: NoResponse) -> Self {
		Self::NoResponse(other)
	}
}

impl<E> From<BufferTooSmallError> for WriteError<E> {
	fn from(other: BufferTooSmallError) -> Self {
		Self::BufferTooSmall(other)
	}
}

impl From<InvalidPayloadLength> for InvalidMessage {
	fn from(other: InvalidPayloadLength) -> Self {
		Self::InvalidPayloadLength(other)
	}
}

impl From<InvalidCellCount> for InvalidMessage {
	fn from(other: InvalidCellCount) -> Self {
		Self::InvalidCellCount(other)
	}
}

impl<E: std::fmt::Display> std::fmt::Display for InitializeError<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Open(e) => write!(f, "failed to open transport: {}", e),
			Self::Configure(e) => write!(f, "failed to configure transport: {}", e),
			Self::Write(e) => write!(f, "{}", e),
			Self::Read(e) => write!(f, "{}", e),
			Self::UnknownModel(e) => write!(f, "{}", e),
			Self::InvalidMessage(e) => write!(f, "{}", e),
			Self::NoResponse(e) => write!(f, "{}", e),
		}
	}
}

impl<E: std::fmt::Display> std::fmt::Display for WriteError<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::DiscardBuffer(e) => write!(f, "failed to discard input buffer: {}", e),
			Self::Write(e) => write!(f, "failed to write to transport: {}", e),
			Self::BufferTooSmall(e) => write!(f, "{}", e),
			Self::Disconnected => write!(f, "the display is disconnected"),
		}
	}
}

impl<E: std::fmt::Display> std::fmt::Display for ReadError<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Io(e) => write!(f, "failed to read from transport: {}", e),
		}
	}
}

impl std::fmt::Display for InvalidMessage {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::InvalidPayloadLength(e) => write!(f, "{}", e),
			Self::InvalidCellCount(e) => write!(f, "{}", e),
		}
	}
}

impl std::fmt::Display for UnknownModel {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "unknown {} model: {}", self.protocol, self.identifier)
	}
}

impl std::fmt::Display for NoResponse {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"no {} display responded after {} attempts",
			self.protocol, self.attempts
		)
	}
}

impl std::fmt::Display for ExpectedCount {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Exact(x) => write!(f, "exactly {}", x),
			Self::Min(x) => write!(f, "at least {}", x),
		}
	}
}

impl std::fmt::Display for InvalidPayloadLength {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "invalid payload length, expected {}, got {}", self.expected, self.actual)
	}
}

impl std::fmt::Display for InvalidCellCount {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "invalid cell count {}, expected 1 up to {}", self.actual, self.max)
	}
}

impl std::fmt::Display for BufferTooSmallError {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"buffer is too small: need {} bytes, but the size is {}",
			self.required_size, self.total_size
		)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use assert2::{assert, let_assert};

	#[test]
	fn check_payload_length() {
		assert!(let Ok(()) = InvalidPayloadLength::check(3, 3));
		let_assert!(Err(e) = InvalidPayloadLength::check(2, 3));
		assert!(e.to_string() == "invalid payload length, expected exactly 3, got 2");
		assert!(let Ok(()) = InvalidPayloadLength::check_min(5, 3));
		assert!(let Err(_) = InvalidPayloadLength::check_min(2, 3));
	}

	#[test]
	fn check_cell_count() {
		assert!(let Ok(()) = InvalidCellCount::check(40, 84));
		assert!(let Err(_) = InvalidCellCount::check(0, 84));
		assert!(let Err(_) = InvalidCellCount::check(85, 84));
	}
}
