//! Help output styling for the `linectl` binary.

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;

/// Help styles for `linectl`: cyan accents to match the status colors the
/// command output uses, bold headers in the cargo tradition.
pub fn cli_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Cyan.on_default().bold())
		.usage(AnsiColor::Cyan.on_default().bold())
		.literal(AnsiColor::Green.on_default())
		.placeholder(AnsiColor::BrightBlue.on_default())
		.valid(AnsiColor::Green.on_default())
		.invalid(AnsiColor::Yellow.on_default())
		.error(AnsiColor::Red.on_default().bold())
}
