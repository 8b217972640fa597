/// Write a u16 to a buffer in big endian format.
pub fn write_u16_be(buffer: &mut [u8], value: u16) {
	buffer[0] = (value >> 8 & 0xFF) as u8;
	buffer[1] = (value & 0xFF) as u8;
}

/// Read a u16 in big endian format from a buffer.
pub fn read_u16_be(buffer: &[u8]) -> u16 {
	let high = buffer[0] as u16;
	let low = buffer[1] as u16;
	high << 8 | low
}

/// Read a u32 in big endian format from a buffer.
pub fn read_u32_be(buffer: &[u8]) -> u32 {
	(read_u16_be(&buffer[0..2]) as u32) << 16 | read_u16_be(&buffer[2..4]) as u32
}

/// Read a u32 in little endian format from a buffer.
pub fn read_u32_le(buffer: &[u8]) -> u32 {
	buffer[0] as u32 | (buffer[1] as u32) << 8 | (buffer[2] as u32) << 16 | (buffer[3] as u32) << 24
}

#[cfg(test)]
mod test {
	use super::*;
	use assert2::assert;

	#[test]
	fn test_write_u16_be() {
		let mut buffer = [0xFF; 4];
		write_u16_be(&mut buffer[0..], 0x0000);
		assert!(buffer == [0x00, 0x00, 0xFF, 0xFF]);

		write_u16_be(&mut buffer[2..], 0x1234);
		assert!(buffer == [0x00, 0x00, 0x12, 0x34]);
	}

	#[test]
	fn test_read_u16_be() {
		assert!(read_u16_be(&[0x00, 0x00, 0x12, 0x34]) == 0);
		assert!(read_u16_be(&[0x12, 0x34]) == 0x1234);
	}

	#[test]
	fn test_read_u32() {
		assert!(read_u32_be(&[0x12, 0x34, 0x56, 0x78]) == 0x1234_5678);
		assert!(read_u32_le(&[0x12, 0x34, 0x56, 0x78]) == 0x7856_3412);
	}
}
