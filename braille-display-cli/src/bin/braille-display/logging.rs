/// The log level for a number of `-v` flags.
///
/// `-v` shows handshake steps and resynchronization, `-vv` adds every raw packet sent and received.
fn level(verbosity: u8) -> log::LevelFilter {
	match verbosity {
		0 => log::LevelFilter::Info,
		1 => log::LevelFilter::Debug,
		_ => log::LevelFilter::Trace,
	}
}

/// The driver or layer a library message comes from, like `humanware` or `link`.
fn source(target: &str) -> Option<&str> {
	let path = target.strip_prefix("braille_display::")?;
	path.rsplit("::").next()
}

pub fn init(root_module: &str, verbosity: u8) {
	use std::io::Write;

	// The binary shares its crate name with the library, so one filter covers both.
	let log_level = level(verbosity);

	env_logger::Builder::new()
		.format(|buffer, record: &log::Record| {
			use env_logger::fmt::Color;

			let mut prefix_style = buffer.style();
			let prefix = match record.level() {
				log::Level::Trace => {
					prefix_style.set_dimmed(true);
					"Trace: "
				},
				log::Level::Debug | log::Level::Info => "",
				log::Level::Warn => {
					prefix_style.set_color(Color::Yellow).set_bold(true);
					"Warning: "
				},
				log::Level::Error => {
					prefix_style.set_color(Color::Red).set_bold(true);
					"Error: "
				},
			};

			match source(record.target()) {
				Some(source) => writeln!(buffer, "{}[{}] {}", prefix_style.value(prefix), source, record.args()),
				None => writeln!(buffer, "{}{}", prefix_style.value(prefix), record.args()),
			}
		})
		.filter_level(log::LevelFilter::Warn)
		.filter_module(root_module, log_level)
		.init();
}
