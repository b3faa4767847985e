//! `mb50as` CLI (§6): `mb50as [-v] input_file.s`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// Two-phase assembler for the MB50 16-bit target.
#[derive(Parser, Debug)]
#[command(name = "mb50as", version, about)]
struct Args {
	/// Log namespace resolution, file reads, and macro expansion to stderr.
	#[arg(short = 'v', long = "verbose")]
	verbose: bool,

	/// Source file to assemble.
	input: PathBuf,
}

fn main() -> ExitCode {
	let args = Args::parse();
	if args.verbose {
		env_logger::Builder::new().filter_level(log::LevelFilter::Trace).init();
	}

	match assemble(&args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(message) => {
			eprintln!("{message}");
			ExitCode::FAILURE
		},
	}
}

fn assemble(args: &Args) -> Result<(), String> {
	let (files, root) = mb50as::load(&args.input, args.verbose).map_err(|e| e.to_string())?;
	let mut driver = mb50as::Driver::new(files, args.verbose);
	driver.run(root).map_err(|e| e.to_string())?;
	mb50_image::write_outputs(driver.image(), &args.input).map_err(|e| format!("cannot write output: {e}"))?;
	Ok(())
}
