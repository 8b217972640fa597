use braille_display::{Command as DisplayCommand, Geometry, Protocol, Session, SessionConfig};
use std::path::Path;
use std::time::{Duration, Instant};

mod logging;
mod options;

use options::{Command, Options};

/// North American Braille ASCII, indexed by the dot pattern of the cell (dots 1 to 6).
const BRAILLE_ASCII: &[u8; 64] = b" A1B'K2L@CIF/MSP\"E3H9O6R^DJG>NTQ,*5<-U8V.%[$+X!&;:4\\0Z7(_?W]#Y)=";

fn main() {
	if let Err(()) = do_main(clap::Parser::parse()) {
		std::process::exit(1);
	}
}

fn do_main(options: Options) -> Result<(), ()> {
	logging::init(module_path!(), options.verbose);
	match &options.command {
		Command::Identify => {
			let session = open_session(&options)?;
			log_geometry(session.driver_name(), session.geometry());
		},
		Command::Write { text, status } => {
			let mut session = open_session(&options)?;
			let cells = text_to_cells(text)?;
			if cells.len() > session.geometry().text_columns {
				log::warn!(
					"Text is {} cells long, only the first {} are shown",
					cells.len(),
					session.geometry().text_columns
				);
			}
			session.write_window(&cells).map_err(|e| log::error!("Failed to write cells: {}", e))?;
			if let Some(status) = status {
				let cells = text_to_cells(status)?;
				session.write_status(&cells).map_err(|e| log::error!("Failed to write status cells: {}", e))?;
			}
			settle(&mut session);
		},
		Command::Dots { cells } => {
			let mut session = open_session(&options)?;
			log::debug!("Showing {} cells: {:02X?}", cells.len(), cells);
			session.write_window(cells).map_err(|e| log::error!("Failed to write cells: {}", e))?;
			settle(&mut session);
		},
		Command::Monitor { duration } => {
			let mut session = open_session(&options)?;
			monitor(&mut session, *duration)?;
		},
		Command::Firmness { level } => {
			let mut session = open_session(&options)?;
			let supported = session
				.set_firmness(*level)
				.map_err(|e| log::error!("Failed to set firmness: {}", e))?;
			if supported {
				log::info!("Firmness set to {}", level);
			} else {
				log::error!("The {} protocol does not support setting the firmness", session.driver_name());
				return Err(());
			}
		},
		Command::ShellCompletion { shell, output } => {
			write_shell_completion(*shell, output.as_deref())?;
		},
	}

	Ok(())
}

fn open_session(options: &Options) -> Result<Session<serial2::SerialPort>, ()> {
	let config = SessionConfig {
		baud_rate: options.baud_rate,
		identify_attempts: options.attempts,
		..SessionConfig::default()
	};
	let protocol: Protocol = options.protocol.into();
	log::debug!("Looking for a {} display on {}", protocol, options.serial_port.display());
	Session::open(&options.serial_port, protocol, config)
		.map_err(|e| log::error!("Failed to connect to display on {}: {}", options.serial_port.display(), e))
}

fn log_geometry(driver: &str, geometry: &Geometry) {
	log::info!("Model: {}", geometry.model);
	log::info!(" ├─ Protocol: {}", driver);
	log::info!(" ├─ Cells: {}", geometry.cell_count);
	log::info!(" ├─ Text: {} cells from {}", geometry.text_columns, geometry.text_start);
	log::info!(" └─ Status: {} cells from {}", geometry.status_count, geometry.status_start);
}

/// Translate text to cells using Braille ASCII.
fn text_to_cells(text: &str) -> Result<Vec<u8>, ()> {
	text.chars()
		.map(|c| {
			let upper = c.to_ascii_uppercase();
			BRAILLE_ASCII
				.iter()
				.position(|&b| char::from(b) == upper)
				.map(|dots| dots as u8)
				.ok_or_else(|| log::error!("Character {:?} has no Braille ASCII representation", c))
		})
		.collect()
}

/// Give the display some time to acknowledge what was sent.
fn settle(session: &mut Session<serial2::SerialPort>) {
	session.set_poll_timeout(Duration::from_millis(20));
	let deadline = Instant::now() + Duration::from_millis(500);
	while Instant::now() < deadline {
		if let DisplayCommand::RestartDriver = session.read_command() {
			log::warn!("Lost connection to the display");
			return;
		}
	}
}

fn monitor(session: &mut Session<serial2::SerialPort>, duration: Option<Duration>) -> Result<(), ()> {
	let deadline = duration.map(|duration| Instant::now() + duration);
	session.set_poll_timeout(Duration::from_millis(100));
	let mut offline = false;

	loop {
		if deadline.map_or(false, |deadline| Instant::now() >= deadline) {
			return Ok(());
		}

		let command = session.read_command();
		if offline && command != DisplayCommand::Offline {
			log::info!("Display is back online");
			offline = false;
		}
		match command {
			DisplayCommand::None => (),
			DisplayCommand::Offline => {
				if !offline {
					log::info!("Display is offline");
					offline = true;
				}
			},
			DisplayCommand::RestartDriver => {
				log::error!("Lost connection to the display");
				return Err(());
			},
			DisplayCommand::Resized(geometry) => log_geometry(session.driver_name(), &geometry),
			DisplayCommand::Key(event) => {
				let action = if event.pressed { "pressed" } else { "released" };
				log::info!("{:?} key {} {}", event.group, event.number, action);
			},
			DisplayCommand::Braille(dots) => {
				let character = BRAILLE_ASCII[usize::from(dots & 0x3F)];
				log::info!("Braille input: dots 0x{:02X} ({:?})", dots, char::from(character));
			},
		}
	}
}

fn write_shell_completion(shell: clap_complete::Shell, path: Option<&Path>) -> Result<(), ()> {
	use clap::CommandFactory;
	use std::io::Write;

	let mut output: Box<dyn Write> = match path {
		None => Box::new(std::io::stdout().lock()),
		Some(path) if path == Path::new("-") => Box::new(std::io::stdout().lock()),
		Some(path) => {
			log::debug!("Writing {} completion for {} to {}", shell, env!("CARGO_BIN_NAME"), path.display());
			Box::new(std::fs::File::create(path).map_err(|e| log::error!("Failed to create {}: {}", path.display(), e))?)
		},
	};

	clap_complete::generate(shell, &mut Options::command(), env!("CARGO_BIN_NAME"), &mut output);
	output.flush().map_err(|e| log::error!("Failed to write shell completion: {}", e))
}

#[cfg(test)]
mod test {
	use super::*;
	use assert2::assert;

	#[test]
	fn braille_ascii() {
		assert!(text_to_cells("abc") == Ok(vec![0x01, 0x03, 0x09]));
		assert!(text_to_cells("L ") == Ok(vec![0x07, 0x00]));
		assert!(text_to_cells("é") == Err(()));
	}
}
