//! Script/history tee (§4.8, §4.9): mirrors REPL input and output to two
//! independent append files. `history` records input the user typed;
//! `script` records both sides of the conversation so it can be replayed
//! with `do`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Appends input/output lines to whichever of `script`/`history` is
/// currently open. Both start closed; `history`/`script` commands open and
/// close them independently.
#[derive(Default)]
pub struct Tee {
	script: Option<File>,
	history: Option<File>,
}

fn open_append(path: &Path) -> io::Result<File> {
	OpenOptions::new().create(true).append(true).open(path)
}

impl Tee {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn start_script(&mut self, path: &Path) -> io::Result<()> {
		self.script = Some(open_append(path)?);
		Ok(())
	}

	pub fn stop_script(&mut self) {
		self.script = None;
	}

	pub fn start_history(&mut self, path: &Path) -> io::Result<()> {
		self.history = Some(open_append(path)?);
		Ok(())
	}

	pub fn stop_history(&mut self) {
		self.history = None;
	}

	#[must_use]
	pub fn script_active(&self) -> bool {
		self.script.is_some()
	}

	#[must_use]
	pub fn history_active(&self) -> bool {
		self.history.is_some()
	}

	/// Records one line the user typed at the prompt: `> line` to the
	/// script, the bare line to the history.
	pub fn input(&mut self, line: &str) -> io::Result<()> {
		if let Some(f) = &mut self.script {
			writeln!(f, "> {line}")?;
		}
		if let Some(f) = &mut self.history {
			writeln!(f, "{line}")?;
		}
		Ok(())
	}

	/// Writes `text` to stdout and, prefixed `< `, to the script. Returns
	/// `self` so callers can chain several `output()` calls before a final
	/// `endl()`, mirroring the REPL's line-building style.
	pub fn output(&mut self, text: &str) -> io::Result<&mut Self> {
		print!("{text}");
		if let Some(f) = &mut self.script {
			write!(f, "< {text}")?;
		}
		Ok(self)
	}

	/// Terminates the current output line on stdout and the script, then
	/// flushes both.
	pub fn endl(&mut self) -> io::Result<()> {
		println!();
		io::stdout().flush()?;
		if let Some(f) = &mut self.script {
			writeln!(f)?;
			f.flush()?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn input_writes_prefixed_to_script_and_plain_to_history() {
		let dir = std::env::temp_dir().join(format!("mb50dbg-tee-test-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		let script_path = dir.join("script.txt");
		let history_path = dir.join("history.txt");

		let mut tee = Tee::new();
		tee.start_script(&script_path).unwrap();
		tee.start_history(&history_path).unwrap();
		tee.input("step").unwrap();
		tee.stop_script();
		tee.stop_history();

		assert_eq!(std::fs::read_to_string(&script_path).unwrap(), "> step\n");
		assert_eq!(std::fs::read_to_string(&history_path).unwrap(), "step\n");
		std::fs::remove_dir_all(&dir).ok();
	}

	#[test]
	fn output_is_prefixed_in_script_only() {
		let dir = std::env::temp_dir().join(format!("mb50dbg-tee-test-output-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		let script_path = dir.join("script.txt");

		let mut tee = Tee::new();
		tee.start_script(&script_path).unwrap();
		tee.output("Ready r15(pc)=0x0100").unwrap();
		tee.endl().unwrap();
		tee.stop_script();

		assert_eq!(std::fs::read_to_string(&script_path).unwrap(), "< Ready r15(pc)=0x0100\n");
		std::fs::remove_dir_all(&dir).ok();
	}

	#[test]
	fn closed_streams_are_silently_skipped() {
		let mut tee = Tee::new();
		assert!(!tee.script_active());
		assert!(!tee.history_active());
		tee.input("noop").unwrap();
		tee.output("noop").unwrap();
		tee.endl().unwrap();
	}
}
