//! CLI command implementations.

pub mod cache;
pub mod lock;
pub mod version;
pub mod why;

use std::io::IsTerminal;

/// Exit code for invalid command-line input.
pub const EXIT_INVALID_ARGS: i32 = 2;

/// Exit code for a command that ran but failed.
pub const EXIT_FAILURE: i32 = 1;

/// Whether human-readable output should be colored.
pub(crate) fn use_color() -> bool {
    std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}
