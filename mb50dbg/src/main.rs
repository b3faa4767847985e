//! `mb50dbg` CLI (§6): `mb50dbg tty [init_file]` or `mb50dbg {-h|--help}`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use mb50dbg::cdi::Cdi;
use mb50dbg::command::Session;

/// Interactive CDI debugger for the MB50 16-bit target.
#[derive(Parser, Debug)]
#[command(name = "mb50dbg", version, about)]
struct Args {
	/// Serial port device for communication with the target computer.
	tty: PathBuf,

	/// File of initial commands executed before entering interactive mode.
	init_file: Option<PathBuf>,
}

fn main() -> ExitCode {
	let args = Args::parse();
	env_logger::Builder::new().filter_level(log::LevelFilter::Info).init();

	match run(&args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(message) => {
			eprintln!("{message}");
			ExitCode::FAILURE
		},
	}
}

fn run(args: &Args) -> Result<(), String> {
	let cdi = Cdi::open(&args.tty).map_err(|e| e.to_string())?;
	let mut session = Session::new(cdi);
	mb50dbg::repl::run(&mut session, args.init_file.as_deref()).map_err(|e| e.to_string())
}
