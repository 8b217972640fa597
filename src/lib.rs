//! Wire protocol drivers for refreshable braille displays.
//!
//! This library implements the serial protocols of a number of braille display families:
//! Albatross, Freedom Scientific, HumanWare, EuroBraille Esysiris and Papenmeier (protocol 1 and 2).
//! For every protocol it knows how packets are framed, how the display is identified,
//! how cells are sent and how key presses are reported.
//!
//! The main entry point is the [`Session`], which owns the connection to one display.
//! A session is created with [`Session::connect()`] from any [`Transport`],
//! or with [`Session::open()`] from the path of a serial port.
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use braille_display::{Command, Protocol, Session, SessionConfig};
//!
//! let mut session = Session::open("/dev/ttyUSB0", Protocol::FreedomScientific, SessionConfig::default())?;
//! // Dots 1-2-5 (h) and dots 2-4 (i).
//! session.write_window(&[0x13, 0x0A])?;
//! loop {
//! 	match session.read_command() {
//! 		Command::Key(event) => println!("{:?}", event),
//! 		Command::RestartDriver => break,
//! 		_ => (),
//! 	}
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Optional features
//!
//! The `serial2` feature (enabled by default) implements [`Transport`] for [`serial2::SerialPort`](::serial2::SerialPort).

#[macro_use]
extern crate log;

pub mod cells;
pub mod checksum;
pub mod command;
pub mod config;
pub mod drivers;
pub mod endian;
pub mod framing;
pub mod keys;
pub mod output;
pub mod transport;

mod error;
mod link;
mod session;

pub use command::{Command, CommandQueue};
pub use config::SessionConfig;
pub use drivers::{Driver, Geometry, Protocol};
pub use error::*;
pub use keys::{KeyEvent, KeyGroup};
pub use link::{Link, DEFAULT_INTER_BYTE_TIMEOUT};
pub use session::{Session, State};
pub use transport::{Parity, Transport};
