//! Terminal helpers for the CLI.

use std::io::{self, IsTerminal};

/// Print a status message to stderr when it is a terminal.
///
/// Keeps piped JSON output on stdout clean.
pub fn status(message: &str) {
    if io::stderr().is_terminal() {
        eprintln!("{}", message);
    }
}
