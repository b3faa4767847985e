//! Instruction encoding table (§4.5 "Encoding table"). Two bytes per
//! instruction: the opcode, then `(dst << 4) | src` register selectors.

use std::collections::HashMap;
use std::sync::OnceLock;

/// One mnemonic's encoding: its opcode byte and whether the destination
/// or source operand must be a CSR selector rather than a plain register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
	pub code:     u8,
	pub dst_csr:  bool,
	pub src_csr:  bool,
	/// A historical encoding that a real target may not implement. It
	/// still parses and encodes, but emitting it raises a diagnostic
	/// (§9 "reserved opcode" open question).
	pub reserved: bool,
}

impl OpcodeInfo {
	const fn new(code: u8) -> Self {
		Self { code, dst_csr: false, src_csr: false, reserved: false }
	}

	const fn csr_src(code: u8) -> Self {
		Self { code, dst_csr: false, src_csr: true, reserved: false }
	}

	const fn csr_dst(code: u8) -> Self {
		Self { code, dst_csr: true, src_csr: false, reserved: false }
	}

	const fn reserved_at(code: u8) -> Self {
		Self { code, dst_csr: false, src_csr: false, reserved: true }
	}
}

const DIRECT: &[(&str, OpcodeInfo)] = &[
	("ill", OpcodeInfo::new(0x00)),
	("add", OpcodeInfo::new(0x01)),
	("and", OpcodeInfo::new(0x02)),
	("csrr", OpcodeInfo::csr_src(0x03)),
	("csrw", OpcodeInfo::csr_dst(0x04)),
	("dec1", OpcodeInfo::new(0x05)),
	("dec2", OpcodeInfo::new(0x06)),
	("exch", OpcodeInfo::new(0x07)),
	("inc1", OpcodeInfo::new(0x08)),
	("inc2", OpcodeInfo::new(0x09)),
	("ld", OpcodeInfo::new(0x0a)),
	("ldb", OpcodeInfo::new(0x0b)),
	("ldis", OpcodeInfo::new(0x0c)),
	("mv", OpcodeInfo::new(0x0e)),
	("neg", OpcodeInfo::new(0x0f)),
	("not", OpcodeInfo::new(0x10)),
	("or", OpcodeInfo::new(0x11)),
	("shl", OpcodeInfo::new(0x12)),
	("shr", OpcodeInfo::new(0x13)),
	("shra", OpcodeInfo::new(0x14)),
	("sto", OpcodeInfo::new(0x15)),
	("stob", OpcodeInfo::new(0x16)),
	("ddsto", OpcodeInfo::new(0x17)),
	("sub", OpcodeInfo::new(0x18)),
	("cmpu", OpcodeInfo::new(0x19)),
	("xor", OpcodeInfo::new(0x1a)),
	("cmps", OpcodeInfo::new(0x1b)),
	("reti", OpcodeInfo::new(0x1c)),
	("rev", OpcodeInfo::new(0x1d)),
	("mulss", OpcodeInfo::new(0x1e)),
	("mulsu", OpcodeInfo::new(0x1f)),
	("mulus", OpcodeInfo::new(0x20)),
	("muluu", OpcodeInfo::new(0x21)),
	// Named by the earlier draft but dropped from the latest encoding
	// table; kept so old sources still assemble, flagged reserved.
	("ldisx", OpcodeInfo::reserved_at(0x0d)),
];

const CONDITIONAL_PREFIXES: &[(&str, u8)] = &[("ld", 0x90), ("ldis", 0xa0), ("mv", 0xc0)];
const CONDITIONAL_FLAGS: &[(&str, u8)] = &[("f0", 0), ("f1", 1), ("f2", 2), ("f3", 3), ("z", 4), ("c", 5), ("s", 6), ("o", 7)];

fn build_table() -> HashMap<String, OpcodeInfo> {
	let mut table = HashMap::new();
	for &(name, info) in DIRECT {
		table.insert(name.to_string(), info);
	}
	for &(prefix, prefix_code) in CONDITIONAL_PREFIXES {
		for &(flag_name, flag_code) in CONDITIONAL_FLAGS {
			for negated in [true, false] {
				let mnemonic = format!("{prefix}{}{flag_name}", if negated { "n" } else { "" });
				let negation_bits = if negated { 0x00 } else { 0x08 };
				table.insert(mnemonic, OpcodeInfo::new(prefix_code | negation_bits | flag_code));
			}
		}
	}
	table
}

fn table() -> &'static HashMap<String, OpcodeInfo> {
	static TABLE: OnceLock<HashMap<String, OpcodeInfo>> = OnceLock::new();
	TABLE.get_or_init(build_table)
}

/// Looks up a mnemonic (case-sensitive, as written in source).
#[must_use]
pub fn lookup(mnemonic: &str) -> Option<OpcodeInfo> {
	table().get(mnemonic).copied()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn direct_opcodes_resolve_to_the_documented_byte() {
		assert_eq!(lookup("add").unwrap().code, 0x01);
		assert_eq!(lookup("ddsto").unwrap().code, 0x17);
		assert_eq!(lookup("muluu").unwrap().code, 0x21);
	}

	#[test]
	fn csr_flags_match_the_two_csr_instructions() {
		let csrr = lookup("csrr").unwrap();
		assert!(csrr.src_csr && !csrr.dst_csr);
		let csrw = lookup("csrw").unwrap();
		assert!(csrw.dst_csr && !csrw.src_csr);
		assert!(!lookup("add").unwrap().dst_csr && !lookup("add").unwrap().src_csr);
	}

	#[test]
	fn conditional_move_family_matches_the_worked_example() {
		// mvnz -> 0xc0 | 0x00 | 0x04 = 0xc4
		assert_eq!(lookup("mvnz").unwrap().code, 0xc4);
		// non-negated counterpart sets the 0x08 bit instead
		assert_eq!(lookup("mvz").unwrap().code, 0xcc);
	}

	#[test]
	fn conditional_family_covers_all_three_prefixes() {
		assert_eq!(lookup("ldf0").unwrap().code, 0x90 | 0x08);
		assert_eq!(lookup("ldisno").unwrap().code, 0xa0 | 0x00 | 0x07);
		assert_eq!(lookup("mvnc").unwrap().code, 0xc0 | 0x00 | 0x05);
	}

	#[test]
	fn reserved_opcode_is_marked_but_still_resolves() {
		let ldisx = lookup("ldisx").unwrap();
		assert!(ldisx.reserved);
		assert_eq!(ldisx.code, 0x0d);
	}

	#[test]
	fn unknown_mnemonic_is_none() {
		assert!(lookup("nope").is_none());
	}
}
