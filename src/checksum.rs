//! Additive packet checksum.

/// Add the bytes to a running 8-bit sum.
pub fn accumulate(sum: u8, data: &[u8]) -> u8 {
	data.iter().fold(sum, |sum, &byte| sum.wrapping_add(byte))
}

/// Compute the checksum byte that makes the sum of `data` and the checksum zero.
pub fn calculate_checksum(data: &[u8]) -> u8 {
	accumulate(0, data).wrapping_neg()
}

/// Check that the sum of all bytes, including the trailing checksum byte, is zero.
pub fn verify_checksum(data: &[u8]) -> bool {
	accumulate(0, data) == 0
}
