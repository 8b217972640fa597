use assert2::{assert, let_assert};
use braille_display::{Command, KeyEvent, KeyGroup, Protocol, Session};
use test_log::test;

mod common;
use common::{test_config, MockTransport};

const IDENTIFY_REQUEST: [u8; 7] = [0x02, b'I', 0x00, 0x00, 0x00, 0x07, 0x03];

/// A protocol 1 identity reply for the given model.
fn identity(model: u8) -> [u8; 10] {
	[0x02, b'I', model, 1, 2, 3, 4, 5, 6, 0x03]
}

/// Encode a protocol 2 packet: every payload byte is split in two marked nibbles.
fn protocol2_packet(packet_type: u8, payload: &[u8]) -> Vec<u8> {
	let mut packet = vec![0x02, 0x40 | packet_type, 0x50 | (payload.len() >> 4) as u8, 0x50 | (payload.len() & 0x0F) as u8];
	for &byte in payload {
		packet.push(0x30 | byte >> 4);
		packet.push(0x30 | byte & 0x0F);
	}
	packet.push(0x03);
	packet
}

fn commands(session: &mut Session<MockTransport>) -> Vec<Command> {
	let mut commands = Vec::new();
	loop {
		match session.read_command() {
			Command::None => return commands,
			command => commands.push(command),
		}
	}
}

fn connect_protocol1(model: u8) -> (MockTransport, Session<MockTransport>) {
	let transport = MockTransport::new(9600);
	transport.reply_to(&IDENTIFY_REQUEST, &identity(model));
	let_assert!(Ok(mut session) = Session::connect(transport.clone(), Protocol::Papenmeier, test_config()));
	commands(&mut session);
	transport.take_written();
	(transport, session)
}

fn connect_protocol2(model: u8) -> (MockTransport, Session<MockTransport>) {
	let transport = MockTransport::new(9600);
	transport.reply_to(&protocol2_packet(0x02, &[]), &protocol2_packet(0x0A, &[model, 1, 2]));
	let_assert!(Ok(mut session) = Session::connect(transport.clone(), Protocol::Papenmeier, test_config()));
	commands(&mut session);
	transport.take_written();
	(transport, session)
}

#[test]
fn protocol1_identify() {
	let transport = MockTransport::new(9600);
	transport.reply_to(&IDENTIFY_REQUEST, &identity(2));
	let_assert!(Ok(session) = Session::connect(transport.clone(), Protocol::Papenmeier, test_config()));
	assert!(session.driver_name() == "Papenmeier1");
	assert!(session.geometry().model == "BrailleX 2D Lite");
	assert!(session.geometry().cell_count == 53);
	assert!(session.geometry().status_count == 13);
	assert!(session.geometry().text_start == 13);
	assert!(transport.baud_rates() == [19200]);
}

#[test]
fn protocol1_unknown_model() {
	let transport = MockTransport::new(9600);
	transport.reply_to(&IDENTIFY_REQUEST, &identity(5));
	let_assert!(Err(e) = Session::connect(transport, Protocol::Papenmeier1, test_config()));
	assert!(e.to_string() == "unknown Papenmeier1 model: 5");
}

#[test]
fn protocol1_writes_changed_range() {
	let (transport, mut session) = connect_protocol1(2);
	let mut text = [0u8; 40];
	text[0] = 0x01;
	assert!(let Ok(true) = session.write_window(&text));
	let written = transport.take_written();
	let_assert!([full] = &written[..]);
	assert!(full[..6] == [0x02, b'S', 0, 0, 0, 60]);
	assert!(full[6 + 13] == 0x01);
	assert!(full.len() == 60);

	// Dot 4 sits in the high nibble of the wire format.
	text[2] = 0x08;
	assert!(let Ok(true) = session.write_window(&text));
	assert!(transport.take_written() == [vec![0x02, b'S', 0, 15, 0, 8, 0x10, 0x03]]);

	assert!(let Ok(true) = session.write_status(&[0x80]));
	assert!(transport.take_written() == [vec![0x02, b'S', 0, 0, 0, 8, 0x80, 0x03]]);
}

#[test]
fn protocol1_keys() {
	let (transport, mut session) = connect_protocol1(2);
	transport.push_input(&[0x02, b'K', 0x00, 0x03, 0x01, 0x03]);
	transport.push_input(&[0x02, b'K', 0x00, 0x03 * 0x42, 0x01, 0x03]);
	transport.push_input(&[0x02, b'K', 0x00, 0x03, 0x00, 0x03]);
	transport.push_input(&[0x02, b'K', 0x00, 0x03 * 0x11, 0x01, 0x03]);
	assert!(commands(&mut session) == [
		Command::Key(KeyEvent::press(KeyGroup::Navigation, 0)),
		Command::Key(KeyEvent::press(KeyGroup::Routing1, 2)),
		Command::Key(KeyEvent::release(KeyGroup::Navigation, 0)),
		Command::Key(KeyEvent::press(KeyGroup::Status, 1)),
	]);
}

#[test]
fn falls_back_to_protocol2() {
	let transport = MockTransport::new(9600);
	transport.reply_to(&protocol2_packet(0x02, &[]), &protocol2_packet(0x0A, &[85, 1, 2]));
	let_assert!(Ok(session) = Session::connect(transport.clone(), Protocol::Papenmeier, test_config()));
	assert!(session.driver_name() == "Papenmeier2");
	assert!(session.geometry().model == "BrailleX EL40s");
	assert!(session.geometry().text_columns == 40);
	assert!(transport.baud_rates() == [19200, 57600]);
}

#[test]
fn protocol2_writes_all_cells() {
	let (transport, mut session) = connect_protocol2(85);
	assert!(let Ok(true) = session.write_window(&[0x08]));
	let written = transport.take_written();
	let_assert!([packet] = &written[..]);
	assert!(packet[..6] == [0x02, 0x43, 0x52, 0x58, 0x31, 0x30]);
	assert!(packet.len() == 4 + 2 * 40 + 1);
}

#[test]
fn protocol2_key_bitmap() {
	let (transport, mut session) = connect_protocol2(85);
	// Bar keys come first, then the switches, then the routing keys.
	transport.push_input(&protocol2_packet(0x0B, &[0x01, 0x00, 0x01, 0, 0, 0, 0]));
	transport.push_input(&protocol2_packet(0x0B, &[0x00, 0x01, 0x01, 0, 0, 0, 0]));
	transport.push_input(&protocol2_packet(0x0B, &[0; 7]));
	assert!(commands(&mut session) == [
		Command::Key(KeyEvent::press(KeyGroup::Bar, 0)),
		Command::Key(KeyEvent::press(KeyGroup::Routing1, 0)),
		Command::Key(KeyEvent::release(KeyGroup::Bar, 0)),
		Command::Key(KeyEvent::press(KeyGroup::Switches, 0)),
		Command::Key(KeyEvent::release(KeyGroup::Switches, 0)),
		Command::Key(KeyEvent::release(KeyGroup::Routing1, 0)),
	]);
}

#[test]
fn nothing_answers() {
	let transport = MockTransport::new(9600);
	let_assert!(Err(e) = Session::connect(transport, Protocol::Papenmeier, test_config()));
	assert!(e.to_string() == "no Papenmeier2 display responded after 2 attempts");
}
