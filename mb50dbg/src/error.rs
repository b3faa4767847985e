//! The two error kinds distinguished by §7: [`FatalError`] (transport/OS
//! failure, unrecoverable) and [`DbgError`] (a command-level mistake,
//! printed inline, REPL continues).

use miette::Diagnostic;
use thiserror::Error;

/// An internal invariant was violated, a required OS call failed, or the
/// serial device misbehaved. Always terminates the process.
#[derive(Debug, Error, Diagnostic)]
pub enum FatalError {
	#[error("cannot open \"{path}\": {source}")]
	Open {
		path: std::path::PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("cannot configure terminal attributes on \"{path}\": {source}")]
	Termios {
		path: std::path::PathBuf,
		#[source]
		source: nix::Error,
	},
	#[error("I/O error on the CDI transport: {0}")]
	Io(#[from] std::io::Error),
	#[error("poll() on stdin/serial failed: {0}")]
	Poll(nix::Error),
	#[error("device sent an unexpected or truncated response frame: {0}")]
	Protocol(String),
	#[error("{0}")]
	Message(String),
}

impl FatalError {
	pub fn message(msg: impl Into<String>) -> Self {
		Self::Message(msg.into())
	}
}

/// A user-facing command error: bad syntax, unknown register, file I/O
/// during `load`/`save`/`do`. Printed inline; the REPL keeps going.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DbgError(pub String);

impl DbgError {
	pub fn new(msg: impl Into<String>) -> Self {
		Self(msg.into())
	}
}

impl From<String> for DbgError {
	fn from(s: String) -> Self {
		Self(s)
	}
}

impl From<&str> for DbgError {
	fn from(s: &str) -> Self {
		Self(s.to_string())
	}
}

pub type DbgResult<T> = Result<T, DbgError>;
