//! Incremental packet verification.
//!
//! Every protocol describes its framing with a [`PacketVerifier`].
//! The [`crate::Link`] feeds received bytes to the verifier one at a time,
//! and the verifier classifies the bytes collected so far.

/// Classification of the bytes collected so far.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Verification {
	/// The bytes can not be the start of a valid packet.
	Invalid,

	/// The bytes are a valid prefix, more bytes are needed.
	Incomplete,

	/// The bytes form a complete and valid packet of the given length.
	Complete(usize),
}

/// Incremental verifier for the packets of one protocol.
pub trait PacketVerifier {
	/// Forget any state from the previous packet.
	///
	/// Called before the first byte of every candidate packet.
	fn reset(&mut self);

	/// Classify the collected bytes.
	///
	/// Called once for every appended byte, so `bytes` is one byte longer than in the previous call.
	/// The last byte of `bytes` is the new one.
	fn verify(&mut self, bytes: &[u8]) -> Verification;
}

/// Feed a byte sequence through a verifier, the way the link does.
///
/// Returns the classification after each byte, up to and including the first conclusive one.
pub fn verify_all(verifier: &mut dyn PacketVerifier, bytes: &[u8]) -> Vec<Verification> {
	verifier.reset();
	let mut results = Vec::with_capacity(bytes.len());
	for size in 1..=bytes.len() {
		let result = verifier.verify(&bytes[..size]);
		results.push(result);
		if result != Verification::Incomplete {
			break;
		}
	}
	results
}

#[cfg(test)]
pub(crate) mod test_util {
	use super::*;
	use assert2::assert;

	/// Assert that a packet is only complete at the final byte.
	pub fn assert_complete_at_end(verifier: &mut dyn PacketVerifier, packet: &[u8]) {
		let results = verify_all(verifier, packet);
		assert!(results.len() == packet.len(), "concluded early on {:02X?}: {:?}", packet, results);
		let (last, prefix) = results.split_last().unwrap();
		for (i, result) in prefix.iter().enumerate() {
			assert!(*result == Verification::Incomplete, "byte {} of {:02X?}", i, packet);
		}
		assert!(*last == Verification::Complete(packet.len()), "{:02X?}", packet);
	}

	/// Assert that the verifier rejects a packet before (or at) the final byte.
	pub fn assert_rejected(verifier: &mut dyn PacketVerifier, packet: &[u8]) {
		let results = verify_all(verifier, packet);
		let first_conclusion = results.iter().find(|x| **x != Verification::Incomplete);
		assert!(first_conclusion == Some(&Verification::Invalid), "{:02X?}", packet);
	}
}
