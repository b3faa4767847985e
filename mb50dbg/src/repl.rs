//! The interactive prompt loop (§6): one `status` request at startup, an
//! optional initial `do` file, then `> `-prompted commands until EOF.

use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::command::{self, CommandError, Session};
use crate::error::FatalError;

/// Runs the debugger session to completion. Returns once stdin hits EOF,
/// `quit`/`q` is entered, or a transport error makes the session
/// unrecoverable.
pub fn run(session: &mut Session, init_file: Option<&Path>) -> Result<(), FatalError> {
	let status = session.cdi.status()?;
	let _ = session.tee.output(&format!("Ready r15(pc)=0x{:04X} halted={}", status.pc, status.halted)).and_then(|tee| tee.endl());

	if let Some(path) = init_file {
		let line = format!("do {}", path.display());
		if !run_line(session, &line)? {
			return Ok(());
		}
	}

	let stdin = io::stdin();
	loop {
		print!("> ");
		io::stdout().flush()?;
		let mut line = String::new();
		if stdin.lock().read_line(&mut line)? == 0 {
			println!();
			return Ok(());
		}
		let line = line.trim_end_matches(['\n', '\r']);
		session.tee.input(line).ok();
		if !run_line(session, line)? {
			return Ok(());
		}
	}
}

/// Runs one command line, converting a [`CommandError::Reported`] into an
/// inline message rather than propagating it (only `CommandError::Fatal`
/// ends the session).
fn run_line(session: &mut Session, line: &str) -> Result<bool, FatalError> {
	let (name, args) = command::split_command(line);
	if name.is_empty() {
		return Ok(true);
	}
	match command::dispatch(session, name, args) {
		Ok(keep_going) => Ok(keep_going),
		Err(CommandError::Fatal(e)) => Err(e),
		Err(CommandError::Reported(e)) => {
			let _ = session.tee.output(&e.to_string()).and_then(|tee| tee.endl());
			Ok(true)
		},
	}
}
