use assert2::{assert, let_assert};
use braille_display::drivers::humanware::{encode_packet, key, packet_type};
use braille_display::{Command, KeyEvent, KeyGroup, Protocol, Session, SessionConfig};
use std::time::Duration;
use test_log::test;

mod common;
use common::{test_config, MockTransport};

fn init_request() -> Vec<u8> {
	encode_packet(packet_type::INIT, &[])
}

fn connect_with(config: SessionConfig) -> (MockTransport, Session<MockTransport>) {
	let transport = MockTransport::new(9600);
	transport.reply_to(&init_request(), &encode_packet(packet_type::INIT_RESP, &[0, 0x02, 40]));
	let_assert!(Ok(mut session) = Session::connect(transport.clone(), Protocol::HumanWare, config));
	commands(&mut session);
	(transport, session)
}

fn connect() -> (MockTransport, Session<MockTransport>) {
	connect_with(test_config())
}

fn commands(session: &mut Session<MockTransport>) -> Vec<Command> {
	let mut commands = Vec::new();
	loop {
		match session.read_command() {
			Command::None | Command::Offline => return commands,
			command => commands.push(command),
		}
	}
}

fn key_down(code: u8) -> Vec<u8> {
	encode_packet(packet_type::KEY_DOWN, &[code])
}

#[test]
fn identify() {
	let (transport, session) = connect();
	assert!(session.geometry().model == "Brailliant BI 40");
	assert!(session.geometry().text_columns == 40);
	assert!(transport.baud_rates() == [115200]);
	assert!(transport.written() == [init_request(), encode_packet(packet_type::GET_FIRMWARE_VERSION, &[])]);
}

#[test]
fn waits_for_initialization() {
	let transport = MockTransport::new(9600);
	transport.push_input(&encode_packet(packet_type::KEEP_AWAKE, &[]));
	transport.reply_to(&init_request(), &encode_packet(packet_type::INIT_RESP, &[1, 0x02, 40]));
	let_assert!(Err(braille_display::InitializeError::NoResponse(e)) = Session::connect(transport, Protocol::HumanWare, test_config()));
	assert!(e.attempts == 2);
}

#[test]
fn writes_whole_display() {
	let (transport, mut session) = connect();
	transport.take_written();
	assert!(let Ok(true) = session.write_window(&[0x01, 0x02]));
	let written = transport.take_written();
	let_assert!([display] = &written[..]);
	assert!(display[..5] == [0x1B, packet_type::DISPLAY, 40, 0x01, 0x02]);
	assert!(display.len() == 3 + 40);

	assert!(let Ok(true) = session.write_window(&[0x01, 0x03]));
	let written = transport.take_written();
	let_assert!([display] = &written[..]);
	assert!(display.len() == 3 + 40);
}

#[test]
fn key_down_and_up() {
	let (transport, mut session) = connect();
	transport.push_input(&key_down(key::DOT1));
	transport.push_input(&key_down(key::ROUTING + 3));
	transport.push_input(&encode_packet(packet_type::KEY_UP, &[key::DOT1]));
	assert!(commands(&mut session) == [
		Command::Key(KeyEvent::press(KeyGroup::Braille, 0)),
		Command::Key(KeyEvent::press(KeyGroup::Routing1, 3)),
		Command::Key(KeyEvent::release(KeyGroup::Braille, 0)),
	]);
}

#[test]
fn key_snapshots() {
	let (transport, mut session) = connect();
	transport.push_input(&encode_packet(packet_type::KEYS, &[0x14, key::SPACE]));
	transport.push_input(&encode_packet(packet_type::KEYS, &[key::SPACE, 0x10]));
	transport.push_input(&encode_packet(packet_type::KEYS, &[]));
	assert!(commands(&mut session) == [
		Command::Key(KeyEvent::press(KeyGroup::Navigation, 6)),
		Command::Key(KeyEvent::press(KeyGroup::Braille, 8)),
		Command::Key(KeyEvent::release(KeyGroup::Navigation, 6)),
		Command::Key(KeyEvent::press(KeyGroup::Bar, 0)),
		Command::Key(KeyEvent::release(KeyGroup::Braille, 8)),
		Command::Key(KeyEvent::release(KeyGroup::Bar, 0)),
	]);
}

#[test]
fn calibration_releases_held_keys() {
	let (transport, mut session) = connect();
	transport.push_input(&key_down(key::DOT1));
	transport.push_input(&key_down(key::SPACE));
	transport.push_input(&key_down(0x14));
	assert!(commands(&mut session).len() == 3);
	assert!(session.keys().pressed_count() == 3);

	transport.push_input(&key_down(key::CAL_OK));
	let released = commands(&mut session);
	assert!(released.len() == 3);
	for command in &released {
		let_assert!(Command::Key(event) = command);
		assert!(!event.pressed);
	}
	assert!(session.keys().pressed_count() == 0);

	// The calibration code is never reported, and releasing it later does nothing.
	transport.push_input(&encode_packet(packet_type::KEY_UP, &[key::CAL_OK]));
	assert!(commands(&mut session).is_empty());
}

#[test]
fn calibration_snapshot_releases_held_keys() {
	let (transport, mut session) = connect();
	transport.push_input(&encode_packet(packet_type::KEYS, &[key::DOT1, key::SPACE, 0x14]));
	assert!(commands(&mut session).len() == 3);
	assert!(session.keys().pressed_count() == 3);

	transport.push_input(&encode_packet(packet_type::KEYS, &[key::CAL_OK]));
	let released = commands(&mut session);
	assert!(released.len() == 3);
	for command in &released {
		let_assert!(Command::Key(event) = command);
		assert!(!event.pressed);
	}
	assert!(session.keys().pressed_count() == 0);
}

#[test]
fn zero_terminates_key_snapshot() {
	let (transport, mut session) = connect();
	transport.push_input(&encode_packet(packet_type::KEYS, &[key::SPACE, 0x00, 0x10, 0x00]));
	assert!(commands(&mut session) == [Command::Key(KeyEvent::press(KeyGroup::Braille, 8))]);
	assert!(session.keys().pressed_count() == 1);
}

#[test]
fn calibration_in_snapshot_keeps_later_keys() {
	let (transport, mut session) = connect();
	transport.push_input(&encode_packet(packet_type::KEYS, &[key::DOT1, key::DOT8]));
	assert!(commands(&mut session).len() == 2);

	transport.push_input(&encode_packet(packet_type::KEYS, &[key::DOT1, key::CAL_RESET, key::SPACE]));
	assert!(commands(&mut session) == [
		Command::Key(KeyEvent::release(KeyGroup::Braille, 0)),
		Command::Key(KeyEvent::release(KeyGroup::Braille, 7)),
		Command::Key(KeyEvent::press(KeyGroup::Braille, 8)),
	]);
	assert!(session.keys().pressed_count() == 1);
}

#[test]
fn powering_off() {
	let (transport, mut session) = connect();
	assert!(let Ok(true) = session.write_window(&[0x01]));
	transport.push_input(&key_down(key::DOT1));
	commands(&mut session);
	transport.take_written();

	transport.push_input(&encode_packet(packet_type::POWERING_OFF, &[]));
	assert!(session.read_command() == Command::Key(KeyEvent::release(KeyGroup::Braille, 0)));
	assert!(session.read_command() == Command::Offline);
	assert!(session.is_offline());
	assert!(session.read_command() == Command::Offline);

	// Any packet brings the display back, and the cells are sent again.
	transport.push_input(&encode_packet(packet_type::KEYS, &[]));
	assert!(session.read_command() == Command::None);
	assert!(!session.is_offline());
	assert!(let Ok(true) = session.write_window(&[0x01]));
	assert!(transport.take_written().len() == 1);
}

#[test]
fn keep_awake() {
	let config = SessionConfig {
		keep_awake_interval: Duration::from_millis(20),
		..test_config()
	};
	let (transport, mut session) = connect_with(config);
	transport.take_written();

	std::thread::sleep(Duration::from_millis(30));
	assert!(session.read_command() == Command::None);
	assert!(transport.take_written() == [encode_packet(packet_type::KEEP_AWAKE, &[])]);
}
