//! Terminal styling for command output

use owo_colors::{OwoColorize, colors::css};

/// Detects whether coloured output should be enabled on the given stream
fn supports_color(stream: supports_color::Stream) -> bool {
    supports_color::on(stream).is_some()
}

/// Extension trait for styling command output
pub trait Colorize {
    /// Style as success (green), for stdout
    fn success(&self) -> String;
    /// Style as a hint (amber), for stderr
    fn hint(&self) -> String;
    /// Highlight a value (blue), for stdout
    fn value(&self) -> String;
}

impl Colorize for str {
    fn success(&self) -> String {
        if supports_color(supports_color::Stream::Stdout) {
            self.fg::<css::Green>().to_string()
        } else {
            self.to_string()
        }
    }

    fn hint(&self) -> String {
        if supports_color(supports_color::Stream::Stderr) {
            self.fg::<css::Orange>().to_string()
        } else {
            self.to_string()
        }
    }

    fn value(&self) -> String {
        if supports_color(supports_color::Stream::Stdout) {
            self.fg::<css::LightBlue>().bold().to_string()
        } else {
            self.to_string()
        }
    }
}

impl Colorize for String {
    fn success(&self) -> String {
        self.as_str().success()
    }

    fn hint(&self) -> String {
        self.as_str().hint()
    }

    fn value(&self) -> String {
        self.as_str().value()
    }
}
