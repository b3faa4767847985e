//! The `.bin` binary file format (also used verbatim by the debugger's
//! `load`/`save` commands) and the `.mif` Memory Initialization File format.

use std::path::{Path, PathBuf};

use crate::image::Image;

/// Errors decoding a `.bin` file, used by the debugger's `load` command.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
	#[error("file is too short to contain a start address")]
	Truncated,
	#[error("start address {0:?} is not four hex digits")]
	BadAddress(String),
}

/// Encodes an image's write window as the `.bin` format: four hex digits of
/// start address, a newline, then the raw bytes of the window. If nothing
/// was written, the window is empty and only the address prefix is emitted
/// (start address `0x0000`).
#[must_use]
pub fn encode_bin(image: &Image) -> Vec<u8> {
	let (start, _) = image.window();
	let mut out = format!("{start:04X}\n").into_bytes();
	out.extend_from_slice(image.window_bytes());
	out
}

/// Decodes a `.bin` file into a start address and its raw payload bytes.
pub fn decode_bin(data: &[u8]) -> Result<(u16, &[u8]), FormatError> {
	let newline = data.iter().position(|&b| b == b'\n').ok_or(FormatError::Truncated)?;
	let header = std::str::from_utf8(&data[.. newline]).map_err(|_| FormatError::Truncated)?;
	let start = u16::from_str_radix(header.trim(), 16).map_err(|_| FormatError::BadAddress(header.to_string()))?;
	Ok((start, &data[newline + 1 ..]))
}

/// Encodes an image's write window as a Memory Initialization File: a fixed
/// header (width 8, depth 30720), one `\t<addr4hex>: <byte2hex>;` line per
/// byte of the window, then `END;`.
#[must_use]
pub fn encode_mif(image: &Image) -> String {
	let (start, end) = image.window();
	let mut out = String::new();
	out.push_str("WIDTH=8;\nDEPTH=30720;\n\nADDRESS_RADIX=HEX;\nDATA_RADIX=HEX;\n\nCONTENT BEGIN\n");
	for (offset, byte) in image.bytes()[start as usize .. end as usize].iter().enumerate() {
		let addr = start as usize + offset;
		out.push_str(&format!("\t{addr:04X}: {byte:02X};\n"));
	}
	out.push_str("END;\n");
	out
}

/// Writes the three output files named in §6: `X.bin`, `X.mif`, `X.out` for
/// an input path `X.s`. The base name is the input path with its extension
/// stripped, regardless of what that extension was.
///
/// # Errors
/// Propagates any I/O error writing one of the three files.
pub fn write_outputs(image: &Image, input_path: &Path) -> std::io::Result<PathBuf> {
	let base = input_path.with_extension("");
	std::fs::write(base.with_extension("bin"), encode_bin(image))?;
	std::fs::write(base.with_extension("mif"), encode_mif(image))?;
	std::fs::write(base.with_extension("out"), image.render_listing())?;
	Ok(base)
}
