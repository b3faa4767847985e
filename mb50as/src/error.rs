//! The two error kinds distinguished by §7: [`FatalError`] (internal
//! invariant violated, required OS call failed, or otherwise unrecoverable)
//! and [`AsmError`] (already positioned and printed, short-circuits the
//! current compilation unit).

use miette::Diagnostic;
use thiserror::Error;

use crate::position::Position;

/// An internal invariant was violated, a required OS call failed, or some
/// other unrecoverable condition occurred. Carries a message, printed on
/// exit; never carries a source position.
#[derive(Debug, Error, Diagnostic)]
pub enum FatalError {
	#[error("cannot read \"{path}\": {source}")]
	Io {
		path: std::path::PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("{0}")]
	Message(String),
}

impl FatalError {
	pub fn message(msg: impl Into<String>) -> Self {
		Self::Message(msg.into())
	}
}

/// A user-facing assembly error, already carrying its source position.
/// Displays exactly as `file:line: message`, per §7's "each reported error
/// includes enough context ... to be actionable; no stack traces".
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
#[error("{position}{message}")]
pub struct AsmError {
	pub position: Position,
	pub message:  String,
}

impl AsmError {
	pub fn new(position: Position, message: impl Into<String>) -> Self {
		Self { position, message: message.into() }
	}
}

pub type AsmResult<T> = Result<T, AsmError>;
