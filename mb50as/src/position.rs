use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A `(file, line)` pair used for diagnostics. `line` is 1-based, matching
/// what a human would point to in an editor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
	pub file: Arc<PathBuf>,
	pub line: usize,
}

impl Position {
	#[must_use]
	pub fn new(file: Arc<PathBuf>, line: usize) -> Self {
		Self { file, line }
	}

	#[must_use]
	pub fn path(&self) -> &Path {
		&self.file
	}
}

impl fmt::Display for Position {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}: ", self.file.display(), self.line)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn displays_as_file_colon_line_colon_space() {
		let pos = Position::new(Arc::new(PathBuf::from("top.s")), 3);
		assert_eq!(pos.to_string(), "top.s:3: ");
	}
}
