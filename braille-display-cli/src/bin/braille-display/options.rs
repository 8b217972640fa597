use std::path::PathBuf;
use std::time::Duration;

/// Talk to a refreshable braille display on a serial port.
///
/// The display is identified first, then the requested command runs.
#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Options {
	#[arg(long, short, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// The serial port the display is connected to.
	#[arg(long, short, global = true)]
	#[cfg_attr(target_os = "windows", arg(default_value = "COM1"))]
	#[cfg_attr(not(target_os = "windows"), arg(default_value = "/dev/ttyUSB0"))]
	pub serial_port: PathBuf,

	/// Only try this baud rate instead of the defaults of the protocol.
	#[arg(long, short, global = true)]
	pub baud_rate: Option<u32>,

	/// The protocol spoken by the display.
	#[arg(long, short, global = true, value_enum, default_value = "papenmeier")]
	pub protocol: ProtocolName,

	/// The number of identification requests per baud rate.
	#[arg(long, global = true, default_value = "3")]
	pub attempts: usize,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
	/// Identify the display and show its geometry.
	Identify,

	/// Show text on the display, using North American Braille ASCII.
	Write {
		/// The text to show.
		text: String,

		/// Also show this text on the status cells.
		#[arg(long)]
		status: Option<String>,
	},

	/// Show raw cells on the display.
	Dots {
		/// The cells to show, as hexadecimal dot patterns (bit 0 is dot 1).
		#[arg(value_name = "HEX", value_parser = parse_cell)]
		cells: Vec<u8>,
	},

	/// Print key presses and releases until the connection is lost.
	Monitor {
		/// Stop after this many seconds.
		#[arg(long, value_parser = parse_seconds)]
		duration: Option<Duration>,
	},

	/// Set the firmness of the dots.
	Firmness {
		/// The firmness level, from 0 (soft) to 2 (hard).
		#[arg(value_parser = clap::value_parser!(u8).range(0..=2))]
		level: u8,
	},

	/// Write shell completions to standard output or a file.
	ShellCompletion {
		/// The shell for which to generate completions.
		#[arg(long)]
		shell: clap_complete::Shell,

		/// The file to write the generated completion file to.
		#[arg(long, short)]
		output: Option<PathBuf>,
	},
}

#[derive(Copy, Clone, clap::ValueEnum)]
pub enum ProtocolName {
	Albatross,
	FreedomScientific,
	Humanware,
	Esysiris,
	/// Papenmeier protocol 1 or 2, whichever answers.
	Papenmeier,
	Papenmeier1,
	Papenmeier2,
}

impl From<ProtocolName> for braille_display::Protocol {
	fn from(other: ProtocolName) -> Self {
		match other {
			ProtocolName::Albatross => Self::Albatross,
			ProtocolName::FreedomScientific => Self::FreedomScientific,
			ProtocolName::Humanware => Self::HumanWare,
			ProtocolName::Esysiris => Self::Esysiris,
			ProtocolName::Papenmeier => Self::Papenmeier,
			ProtocolName::Papenmeier1 => Self::Papenmeier1,
			ProtocolName::Papenmeier2 => Self::Papenmeier2,
		}
	}
}

fn parse_cell(input: &str) -> Result<u8, String> {
	let digits = input.strip_prefix("0x").unwrap_or(input);
	u8::from_str_radix(digits, 16).map_err(|e| format!("invalid cell {:?}: {}", input, e))
}

fn parse_seconds(input: &str) -> Result<Duration, String> {
	let seconds: f64 = input.parse().map_err(|e| format!("invalid duration {:?}: {}", input, e))?;
	if !seconds.is_finite() || seconds < 0.0 {
		return Err(format!("invalid duration {:?}: must be a positive number of seconds", input));
	}
	Ok(Duration::from_secs_f64(seconds))
}
