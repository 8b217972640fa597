use assert2::{assert, let_assert};
use braille_display::drivers::esysiris::{encode_packet, EsysirisVerifier};
use braille_display::drivers::freedom_scientific::FreedomScientificVerifier;
use braille_display::Link;
use std::time::{Duration, Instant};
use test_log::test;

mod common;
use common::MockTransport;

#[test]
fn endless_noise_returns_after_deadline() {
	// A run of 0x81 always looks like the start of a long WRITE packet, but the checksum never matches.
	let transport = MockTransport::new(57600);
	transport.stream_noise(0x81);
	let mut link = Link::with_baud_rate(transport, 57600);
	link.set_inter_byte_timeout(Duration::from_millis(20));

	let mut packet = Vec::new();
	let start = Instant::now();
	let_assert!(Ok(false) = link.read_packet(&mut FreedomScientificVerifier, Duration::from_millis(50), &mut packet));
	assert!(start.elapsed() >= Duration::from_millis(50));
	assert!(start.elapsed() < Duration::from_millis(500));
}

#[test]
fn garbage_before_packet_is_skipped() {
	let transport = MockTransport::new(9600);
	transport.push_input(&[0x55, 0xAA]);
	transport.push_input(&encode_packet(b"KT\x00\x00\x00\x01"));
	let mut link = Link::with_baud_rate(transport, 9600);

	let mut packet = Vec::new();
	let_assert!(Ok(true) = link.read_packet(&mut EsysirisVerifier, Duration::from_millis(50), &mut packet));
	assert!(packet == encode_packet(b"KT\x00\x00\x00\x01"));
	let_assert!(Ok(false) = link.read_packet(&mut EsysirisVerifier, Duration::from_millis(10), &mut packet));
}
