//! Debugger command engine (§4.8): a dispatch table from command name (or
//! alias) to handler, argument parsing per command, and the breakpoint
//! step-loop variant of `execute`.

use std::fs;
use std::path::PathBuf;

use mb50_image::{decode_bin, encode_bin, Image};
use thiserror::Error;

use crate::breakpoint::Breakpoints;
use crate::cdi::{Cdi, Status};
use crate::error::{DbgError, FatalError};
use crate::tee::Tee;

/// Mirrors `mb50as`'s `DriverError`: a transport failure aborts the
/// debugger, a command mistake is printed inline and the REPL continues.
#[derive(Debug, Error)]
pub enum CommandError {
	#[error(transparent)]
	Fatal(#[from] FatalError),
	#[error(transparent)]
	Reported(#[from] DbgError),
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Mutable state one REPL carries across commands: the transport, the
/// breakpoint set, the tee streams, and the dump family's remembered
/// `(addr, size)` window (§4.8 "share remembered (addr, size)").
pub struct Session {
	pub cdi: Cdi,
	pub tee: Tee,
	pub breakpoints: Breakpoints,
	dump_addr: u16,
	dump_size: u16,
}

impl Session {
	#[must_use]
	pub fn new(cdi: Cdi) -> Self {
		Self { cdi, tee: Tee::new(), breakpoints: Breakpoints::new(), dump_addr: 0, dump_size: 16 }
	}
}

/// `false` tells the REPL to stop (the `quit`/`q` command).
pub type RunOutcome = bool;

const REGISTER_NAMES: &[(&str, u8)] = &[
	("r0", 0), ("r1", 1), ("r2", 2), ("r3", 3), ("r4", 4), ("r5", 5), ("r6", 6), ("r7", 7),
	("r8", 8), ("r9", 9), ("r10", 10), ("r11", 11), ("r12", 12), ("r13", 13), ("r14", 14), ("r15", 15),
	("sp", 11), ("ca", 12), ("ia", 13), ("f", 14), ("pc", 15),
];

fn parse_register(token: &str) -> Option<u8> {
	REGISTER_NAMES.iter().find(|(name, _)| *name == token).map(|(_, idx)| *idx)
}

fn parse_u16(token: &str) -> Result<u16, DbgError> {
	let token = token.trim();
	if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
		u16::from_str_radix(hex, 16).map_err(|_| DbgError::new(format!("\"{token}\" is not a valid hex number")))
	} else {
		token.parse::<u16>().map_err(|_| DbgError::new(format!("\"{token}\" is not a valid number")))
	}
}

fn split_args(args: &str) -> Vec<String> {
	args.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

fn split_ws(args: &str) -> Vec<&str> {
	args.split_whitespace().collect()
}

fn format_status(status: Status) -> String {
	format!("Ready r15(pc)=0x{:04X} halted={}", status.pc, status.halted)
}

/// Writes one line of command output through the tee (§2 item 9, §4.8): to
/// stdout always, and additionally to the script file if one is open. Tee
/// I/O errors are not fatal to the command itself.
fn out_line(tee: &mut Tee, text: &str) {
	let _ = tee.output(text).and_then(Tee::endl);
}

/// Parses a `memset`/`$data_b`-style value: a number or a double-quoted
/// string, producing the raw bytes it contributes.
fn parse_byte_producer(token: &str) -> Result<Vec<u8>, DbgError> {
	let token = token.trim();
	if let Some(inner) = token.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
		Ok(inner.as_bytes().to_vec())
	} else {
		let v = parse_u16(token)?;
		if v > 0xff { Ok(v.to_le_bytes().to_vec()) } else { Ok(vec![v as u8]) }
	}
}

/// Dispatches `name args` to its handler. Returns `Ok(false)` only for
/// `quit`/`q`.
pub fn dispatch(session: &mut Session, name: &str, args: &str) -> CommandResult<RunOutcome> {
	match name {
		"break" | "b" => cmd_break(session, args),
		"csr" => cmd_register_bank(session, args, true),
		"register" | "reg" | "r" => cmd_register_bank(session, args, false),
		"do" => cmd_do(session, args),
		"dump" | "d" => cmd_dump(session, args, DumpStyle::HexBytes),
		"dumpd" | "dd" => cmd_dump(session, args, DumpStyle::DecBytes),
		"dumpw" | "dw" => cmd_dump(session, args, DumpStyle::HexWords),
		"dumpwd" | "dwd" => cmd_dump(session, args, DumpStyle::DecWords),
		"execute" | "exe" | "x" => cmd_execute(session),
		"help" | "?" | "h" => cmd_help(session, name),
		"history" => cmd_tee_toggle(session, args, true),
		"script" => cmd_tee_toggle(session, args, false),
		"load" => cmd_load(session, args),
		"save" => cmd_save(session, args),
		"memset" | "m" => cmd_memset(session, args),
		"step" | "s" => cmd_step(session),
		"quit" | "q" => Ok(false),
		_ => {
			out_line(&mut session.tee, "Unknown command");
			Ok(true)
		},
	}
}

fn cmd_break(session: &mut Session, args: &str) -> CommandResult<RunOutcome> {
	let tokens = split_ws(args);
	match tokens.as_slice() {
		[] => {
			let addrs: Vec<u16> = session.breakpoints.iter().collect();
			for addr in addrs {
				out_line(&mut session.tee, &format!("0x{addr:04X}"));
			}
		},
		["-"] => session.breakpoints.clear_all(),
		["-", addr] => session.breakpoints.clear(parse_u16(addr)?),
		[addr] => session.breakpoints.set(parse_u16(addr)?),
		_ => return Err(DbgError::new("break takes at most \"-\" and an address").into()),
	}
	Ok(true)
}

fn cmd_register_bank(session: &mut Session, args: &str, csr: bool) -> CommandResult<RunOutcome> {
	let tokens = split_ws(args);
	match tokens.as_slice() {
		[] =>
			for idx in 0u8 ..= 15 {
				let value = if csr { session.cdi.csr_read(idx)? } else { session.cdi.reg_read(idx)? };
				let prefix = if csr { "csr" } else { "r" };
				out_line(&mut session.tee, &format!("{prefix}{idx:<2} = 0x{value:04X}"));
			},
		[name, value] => {
			let idx = parse_register(name).ok_or_else(|| DbgError::new(format!("unknown register \"{name}\"")))?;
			let value = parse_u16(value)?;
			if csr {
				session.cdi.csr_write(idx, value)?;
			} else {
				session.cdi.reg_write(idx, value)?;
			}
		},
		_ => return Err(DbgError::new("register/csr takes either no arguments or a name and a value").into()),
	}
	Ok(true)
}

fn cmd_do(session: &mut Session, args: &str) -> CommandResult<RunOutcome> {
	let path = args.trim();
	if path.is_empty() {
		return Err(DbgError::new("do requires a file path").into());
	}
	let contents =
		fs::read_to_string(path).map_err(|e| DbgError::new(format!("cannot open do-file \"{path}\": {e}")))?;
	out_line(&mut session.tee, &format!("BEGIN {path}"));
	for line in contents.lines() {
		println!("> {line}");
		session.tee.input(line).ok();
		let (name, rest) = split_command(line);
		if name.is_empty() {
			continue;
		}
		match dispatch(session, name, rest) {
			Ok(true) => {},
			Ok(false) => {
				out_line(&mut session.tee, &format!("END {path}"));
				return Ok(false);
			},
			Err(CommandError::Fatal(e)) => return Err(CommandError::Fatal(e)),
			Err(CommandError::Reported(e)) => out_line(&mut session.tee, &e.to_string()),
		}
	}
	out_line(&mut session.tee, &format!("END {path}"));
	Ok(true)
}

#[derive(Clone, Copy)]
enum DumpStyle {
	HexBytes,
	DecBytes,
	HexWords,
	DecWords,
}

fn cmd_dump(session: &mut Session, args: &str, style: DumpStyle) -> CommandResult<RunOutcome> {
	let tokens = split_ws(args);
	let (addr, size) = match tokens.as_slice() {
		[] => (session.dump_addr, session.dump_size),
		[addr] => (parse_u16(addr)?, session.dump_size),
		[addr, size] => (parse_u16(addr)?, parse_u16(size)?),
		_ => return Err(DbgError::new("dump takes at most an address and a size").into()),
	};
	let bytes = session.cdi.mem_read(addr, size)?;
	let (per_line, step): (usize, usize) = match style {
		DumpStyle::HexBytes | DumpStyle::DecBytes => (16, 1),
		DumpStyle::HexWords | DumpStyle::DecWords => (8, 2),
	};
	let mut offset = 0usize;
	while offset < bytes.len() {
		let line_end = (offset + per_line * step).min(bytes.len());
		let line_bytes = &bytes[offset .. line_end];
		let rendered: String = match style {
			DumpStyle::HexBytes => line_bytes.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" "),
			DumpStyle::DecBytes => line_bytes.iter().map(|b| format!("{b:3}")).collect::<Vec<_>>().join(" "),
			DumpStyle::HexWords =>
				line_bytes.chunks(2).map(|w| format!("{:04X}", word_of(w))).collect::<Vec<_>>().join(" "),
			DumpStyle::DecWords =>
				line_bytes.chunks(2).map(|w| format!("{:5}", word_of(w))).collect::<Vec<_>>().join(" "),
		};
		let line_addr = addr.wrapping_add(offset as u16);
		out_line(&mut session.tee, &format!("{line_addr:04X}: {rendered}"));
		offset = line_end;
	}
	session.dump_addr = addr.wrapping_add(bytes.len() as u16);
	session.dump_size = size;
	Ok(true)
}

fn word_of(pair: &[u8]) -> u16 {
	if pair.len() == 2 { u16::from_le_bytes([pair[0], pair[1]]) } else { u16::from(pair[0]) }
}

fn cmd_execute(session: &mut Session) -> CommandResult<RunOutcome> {
	let status =
		if session.breakpoints.is_empty() { session.cdi.execute()? } else { execute_with_breakpoints(session)? };
	out_line(&mut session.tee, &format_status(status));
	Ok(true)
}

/// §4.8 "execute with breakpoints": single-steps instead of a one-shot
/// execute, polling stdin non-blockingly after each step, stopping on halt,
/// a user-typed line, or `pc` landing in the breakpoint set.
fn execute_with_breakpoints(session: &mut Session) -> Result<Status, FatalError> {
	loop {
		let status = session.cdi.step()?;
		if status.halted || session.breakpoints.contains(status.pc) {
			return Ok(status);
		}
		if session.cdi.stdin_ready()? {
			return session.cdi.status();
		}
	}
}

fn cmd_step(session: &mut Session) -> CommandResult<RunOutcome> {
	let status = session.cdi.step()?;
	out_line(&mut session.tee, &format_status(status));
	Ok(true)
}

fn cmd_load(session: &mut Session, args: &str) -> CommandResult<RunOutcome> {
	let path = args.trim();
	if path.is_empty() {
		return Err(DbgError::new("load requires a file path").into());
	}
	let data = fs::read(path).map_err(|e| DbgError::new(format!("cannot read \"{path}\": {e}")))?;
	let (start, payload) = decode_bin(&data).map_err(|e| DbgError::new(e.to_string()))?;
	if !payload.is_empty() {
		session.cdi.mem_write(start, payload)?;
	}
	session.dump_addr = start;
	session.dump_size = payload.len() as u16;
	Ok(true)
}

fn cmd_save(session: &mut Session, args: &str) -> CommandResult<RunOutcome> {
	let tokens = split_ws(args);
	let (path, addr, size) = match tokens.as_slice() {
		[path] => (*path, session.dump_addr, session.dump_size),
		[path, addr] => (*path, parse_u16(addr)?, session.dump_size),
		[path, addr, size] => (*path, parse_u16(addr)?, parse_u16(size)?),
		_ => return Err(DbgError::new("save requires a file path and optionally an address and size").into()),
	};
	let bytes = session.cdi.mem_read(addr, size)?;
	let mut image = Image::new();
	for (offset, byte) in bytes.iter().enumerate() {
		image.set_byte(addr.wrapping_add(offset as u16), *byte);
	}
	fs::write(path, encode_bin(&image)).map_err(|e| DbgError::new(format!("cannot write \"{path}\": {e}")))?;
	Ok(true)
}

fn cmd_memset(session: &mut Session, args: &str) -> CommandResult<RunOutcome> {
	let parts = split_args(args);
	let [addr_token, rest @ ..] = parts.as_slice() else {
		return Err(DbgError::new("memset requires an address and at least one value").into());
	};
	if rest.is_empty() {
		return Err(DbgError::new("memset requires at least one value").into());
	}
	let addr = parse_u16(addr_token)?;
	let mut bytes = Vec::new();
	for token in rest {
		bytes.extend(parse_byte_producer(token)?);
	}
	session.cdi.mem_write(addr, &bytes)?;
	session.dump_addr = addr;
	session.dump_size = bytes.len() as u16;
	Ok(true)
}

fn cmd_tee_toggle(session: &mut Session, args: &str, is_history: bool) -> CommandResult<RunOutcome> {
	let tokens = split_ws(args);
	match tokens.as_slice() {
		["start", path] => {
			let path = PathBuf::from(path);
			if is_history { session.tee.start_history(&path) } else { session.tee.start_script(&path) }
				.map_err(|e| DbgError::new(format!("cannot open \"{}\": {e}", path.display())))?;
		},
		["stop"] =>
			if is_history {
				session.tee.stop_history();
			} else {
				session.tee.stop_script();
			},
		_ => return Err(DbgError::new("expected \"start PATH\" or \"stop\"").into()),
	}
	Ok(true)
}

/// `?`/`h` print a one-line-per-command listing; `help` prints it with
/// synopses.
fn cmd_help(session: &mut Session, invoked_as: &str) -> CommandResult<RunOutcome> {
	const SHORT: &[(&str, &str)] = &[
		("break (b)", "set/clear/list breakpoints"),
		("csr", "dump or set CSR bank registers"),
		("do", "run commands from a file"),
		("dump/dumpd/dumpw/dumpwd (d/dd/dw/dwd)", "hex/decimal byte/word memory dump"),
		("execute (exe, x)", "run until halt, breakpoint, or keypress"),
		("help/? (h)", "this listing"),
		("history", "start/stop input tee"),
		("load", "write a .bin file's payload into memory"),
		("memset (m)", "write bytes/strings starting at an address"),
		("quit (q)", "exit the debugger"),
		("register (reg, r)", "dump or set the plain register bank"),
		("save", "read memory into a .bin file"),
		("script", "start/stop input+output tee"),
		("step (s)", "execute one instruction"),
	];
	if invoked_as == "?" {
		for (name, _) in SHORT {
			out_line(&mut session.tee, name);
		}
	} else {
		for (name, synopsis) in SHORT {
			out_line(&mut session.tee, &format!("{name:<40} {synopsis}"));
		}
	}
	Ok(true)
}

/// Splits `line` into its command token and the remaining argument string,
/// the shape every handler receives.
#[must_use]
pub fn split_command(line: &str) -> (&str, &str) {
	let trimmed = line.trim_start();
	match trimmed.find(char::is_whitespace) {
		Some(idx) => (&trimmed[.. idx], trimmed[idx ..].trim()),
		None => (trimmed, ""),
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn split_command_separates_name_and_residual_args() {
		assert_eq!(split_command("dump 0x0100 16"), ("dump", "0x0100 16"));
		assert_eq!(split_command("  quit  "), ("quit", ""));
		assert_eq!(split_command(""), ("", ""));
	}

	#[test]
	fn parse_u16_accepts_hex_and_decimal() {
		assert_eq!(parse_u16("0x10").unwrap(), 16);
		assert_eq!(parse_u16("16").unwrap(), 16);
		assert!(parse_u16("nope").is_err());
	}

	#[test]
	fn parse_register_resolves_aliases() {
		assert_eq!(parse_register("pc"), Some(15));
		assert_eq!(parse_register("sp"), Some(11));
		assert_eq!(parse_register("r3"), Some(3));
		assert_eq!(parse_register("bogus"), None);
	}

	#[test]
	fn memset_byte_producer_handles_numbers_and_strings() {
		assert_eq!(parse_byte_producer("0x41").unwrap(), vec![0x41]);
		assert_eq!(parse_byte_producer("\"hi\"").unwrap(), b"hi".to_vec());
		assert_eq!(parse_byte_producer("0x1234").unwrap(), vec![0x34, 0x12]);
	}

	#[test]
	fn breakpoint_command_grammar() {
		let mut bp = Breakpoints::new();
		bp.set(0x10);
		assert!(bp.contains(0x10));
	}

	#[test]
	fn out_line_mirrors_to_an_active_script() {
		let dir = std::env::temp_dir().join(format!("mb50dbg-command-test-{}", std::process::id()));
		fs::create_dir_all(&dir).unwrap();
		let script_path = dir.join("script.txt");

		let mut tee = Tee::new();
		tee.start_script(&script_path).unwrap();
		out_line(&mut tee, "Ready r15(pc)=0x0100 halted=false");
		tee.stop_script();

		assert_eq!(fs::read_to_string(&script_path).unwrap(), "< Ready r15(pc)=0x0100 halted=false\n");
		fs::remove_dir_all(&dir).ok();
	}
}
