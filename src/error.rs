//! Crate error type.
//!
//! Recoverable conditions (a failing source command, a missing clipboard
//! backend) are handled locally with fallbacks; only the kinds that end
//! the run propagate out of the library.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A document could not be read. Logged per file; parsing continues.
    #[error("failed to read {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An auxiliary shell command exited non-zero or could not be spawned.
    #[error("shell command failed: {detail}")]
    ShellSourceFailed { detail: String },

    /// No clipboard backend was found on this system.
    #[error("no clipboard backend found (tried wl-copy, xclip, xsel, pbcopy)")]
    ClipboardUnavailable,

    /// The controlling terminal could not be acquired for interactive use.
    #[error("cannot open a terminal for interactive use: {0}")]
    TerminalUnavailable(String),

    /// Parsing finished without producing a single snippet.
    #[error("no cheats found in {0}")]
    NoSnippets(PathBuf),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
