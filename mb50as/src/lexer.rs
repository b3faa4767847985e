//! Lexical helpers (§2 "Lexical helpers"): whitespace scanning, number
//! parsing, byte-sequence parsing, and identifier parsing with the
//! namespace-qualifier and macro-index-expansion (`$`, `$$`) extensions.

use smartstring::alias::String as SmolStr;

pub const WHITESPACE: &[char] = &[' ', '\t'];

/// Skips leading whitespace, returning the remainder of the string.
#[must_use]
pub fn skip_ws(s: &str) -> &str {
	s.trim_start_matches(WHITESPACE)
}

/// The width of a numeric literal, implicit in how it was written (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
	Byte,
	Word,
}

/// A parsed numeric literal: its unsigned 16-bit value, implicit width, and
/// whether it was written with a leading `-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Number {
	pub val:      u16,
	pub width:    Width,
	pub negative: bool,
}

/// Parses a number at the start of `s`. On success, returns the number and
/// the unconsumed remainder.
pub fn parse_number(s: &str) -> Result<(Number, &str), String> {
	let s = skip_ws(s);
	if let Some(rest) = s.strip_prefix("0x") {
		parse_hex(rest)
	} else if let Some(rest) = s.strip_prefix("0b") {
		parse_bin(rest)
	} else if let Some(rest) = s.strip_prefix('-') {
		let (mut n, rest) = parse_dec(rest)?;
		n.val = n.val.wrapping_neg();
		n.negative = true;
		Ok((n, rest))
	} else if s.starts_with('\'') {
		parse_char(s)
	} else {
		parse_dec(s)
	}
}

fn take_digits(s: &str, is_digit: impl Fn(char) -> bool) -> (&str, &str) {
	let end = s.find(|c: char| !(is_digit(c) || c == '_')).unwrap_or(s.len());
	s.split_at(end)
}

fn parse_hex(s: &str) -> Result<(Number, &str), String> {
	let (digits, rest) = take_digits(s, |c| c.is_ascii_hexdigit());
	let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
	if cleaned.is_empty() {
		return Err("expected hexadecimal digits after 0x".to_string());
	}
	let val = u32::from_str_radix(&cleaned, 16).map_err(|_| "hexadecimal literal does not fit in 16 bits".to_string())?;
	if val > 0xFFFF {
		return Err("hexadecimal literal does not fit in 16 bits".to_string());
	}
	let width = if cleaned.len() <= 2 { Width::Byte } else if cleaned.len() <= 4 { Width::Word } else {
		return Err("hexadecimal literal is too wide".to_string());
	};
	Ok((Number { val: val as u16, width, negative: false }, rest))
}

fn parse_bin(s: &str) -> Result<(Number, &str), String> {
	let (digits, rest) = take_digits(s, |c| c == '0' || c == '1');
	let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
	if cleaned.is_empty() {
		return Err("expected binary digits after 0b".to_string());
	}
	if cleaned.len() > 16 {
		return Err("binary literal is too wide".to_string());
	}
	let val = u32::from_str_radix(&cleaned, 2).map_err(|_| "invalid binary literal".to_string())?;
	let width = if cleaned.len() <= 8 { Width::Byte } else { Width::Word };
	Ok((Number { val: val as u16, width, negative: false }, rest))
}

fn parse_dec(s: &str) -> Result<(Number, &str), String> {
	let (digits, rest) = take_digits(s, |c| c.is_ascii_digit());
	let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
	if cleaned.is_empty() {
		return Err("expected decimal digits".to_string());
	}
	let val: u32 = cleaned.parse().map_err(|_| "decimal literal does not fit in 16 bits".to_string())?;
	if val > 0xFFFF {
		return Err("decimal literal does not fit in 16 bits".to_string());
	}
	let width = if cleaned.len() <= 3 && val <= 255 { Width::Byte } else { Width::Word };
	Ok((Number { val: val as u16, width, negative: false }, rest))
}

/// Decodes one backslash escape starting right after the backslash, per §6:
/// `\0 \t \n \r \" \' \\ \xNN`.
fn decode_escape(s: &str) -> Result<(u8, &str), String> {
	let mut chars = s.chars();
	let c = chars.next().ok_or_else(|| "unterminated escape sequence".to_string())?;
	let rest = chars.as_str();
	Ok(match c {
		'0' => (0, rest),
		't' => (b'\t', rest),
		'n' => (b'\n', rest),
		'r' => (b'\r', rest),
		'"' => (b'"', rest),
		'\'' => (b'\'', rest),
		'\\' => (b'\\', rest),
		'x' => {
			if rest.len() < 2 || !rest.is_char_boundary(2) {
				return Err("expected two hex digits after \\x".to_string());
			}
			let (hex, rest) = rest.split_at(2);
			let byte = u8::from_str_radix(hex, 16).map_err(|_| "invalid \\x escape".to_string())?;
			(byte, rest)
		},
		other => return Err(format!("unknown escape sequence \\{other}")),
	})
}

/// Parses a character literal `'c'`, where `c` may be a single byte or a
/// backslash escape. A second character (`'ab'`) makes this a word,
/// little-endian, first character in the low byte (§6/§9 open question).
fn parse_char(s: &str) -> Result<(Number, &str), String> {
	let mut rest = s.strip_prefix('\'').ok_or_else(|| "expected character literal".to_string())?;
	let mut bytes = Vec::with_capacity(2);
	loop {
		if let Some(after_quote) = rest.strip_prefix('\'') {
			rest = after_quote;
			break;
		}
		if rest.is_empty() {
			return Err("unterminated character literal".to_string());
		}
		if let Some(escaped) = rest.strip_prefix('\\') {
			let (byte, remaining) = decode_escape(escaped)?;
			bytes.push(byte);
			rest = remaining;
		} else {
			let mut chars = rest.chars();
			let c = chars.next().unwrap();
			if !c.is_ascii() {
				return Err("character literal must be ASCII".to_string());
			}
			bytes.push(c as u8);
			rest = chars.as_str();
		}
		if bytes.len() > 2 {
			return Err("character literal is too long".to_string());
		}
	}
	match bytes.as_slice() {
		[b] => Ok((Number { val: u16::from(*b), width: Width::Byte, negative: false }, rest)),
		[lo, hi] => Ok((Number { val: u16::from_le_bytes([*lo, *hi]), width: Width::Word, negative: false }, rest)),
		_ => Err("empty character literal".to_string()),
	}
}

/// Parses a double-quoted string literal into its raw bytes (with escapes
/// decoded), returning the bytes and the remainder of the input.
pub fn parse_string_bytes(s: &str) -> Result<(Vec<u8>, &str), String> {
	let mut rest = s.strip_prefix('"').ok_or_else(|| "expected string literal".to_string())?;
	let mut bytes = Vec::new();
	loop {
		if let Some(after_quote) = rest.strip_prefix('"') {
			rest = after_quote;
			break;
		}
		if rest.is_empty() {
			return Err("unterminated string literal".to_string());
		}
		if let Some(escaped) = rest.strip_prefix('\\') {
			let (byte, remaining) = decode_escape(escaped)?;
			bytes.push(byte);
			rest = remaining;
		} else {
			let mut chars = rest.chars();
			let c = chars.next().unwrap();
			if !c.is_ascii() {
				return Err("string literal must be ASCII".to_string());
			}
			bytes.push(c as u8);
			rest = chars.as_str();
		}
	}
	Ok((bytes, rest))
}

/// A parsed identifier, the three shapes of §3: bareword, `.name`, `ns.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
	pub namespace: Option<SmolStr>,
	pub name:      SmolStr,
}

fn is_ident_start(c: char) -> bool {
	c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Scans a raw identifier token (letters/digits/underscore plus the `$`
/// macro-index markers), not yet namespace-split or macro-expanded.
fn scan_ident_raw(s: &str) -> Result<(&str, &str), String> {
	let mut chars = s.char_indices();
	match chars.next() {
		Some((_, c)) if is_ident_start(c) => {},
		_ => return Err("expected identifier".to_string()),
	}
	let end = chars.find(|&(_, c)| !is_ident_continue(c)).map_or(s.len(), |(i, _)| i);
	Ok(s.split_at(end))
}

/// Replaces `$$` with `last_macro` and remaining `$` with `cur_macro`,
/// applied to bareword-or-name fragments of identifiers found inside a
/// macro body (§6, §9 "macro-local labels").
#[must_use]
pub fn expand_macro_markers(raw: &str, cur_macro: u64, last_macro: u64) -> SmolStr {
	let mut out = SmolStr::new();
	let mut chars = raw.chars().peekable();
	while let Some(c) = chars.next() {
		if c == '$' {
			if chars.peek() == Some(&'$') {
				chars.next();
				out.push_str(&last_macro.to_string());
			} else {
				out.push_str(&cur_macro.to_string());
			}
		} else {
			out.push(c);
		}
	}
	out
}

/// Parses an identifier, expanding macro-index markers against `macro_ctx`
/// if given (used when parsing inside a macro body).
pub fn parse_identifier(s: &str, macro_ctx: Option<(u64, u64)>) -> Result<(Identifier, &str), String> {
	let s = skip_ws(s);
	if let Some(rest) = s.strip_prefix('.') {
		let (raw, rest) = scan_ident_raw(rest)?;
		let name = expand(raw, macro_ctx);
		return Ok((Identifier { namespace: Some(SmolStr::new()), name }, rest));
	}
	let (first_raw, rest) = scan_ident_raw(s)?;
	if let Some(after_dot) = rest.strip_prefix('.') {
		let (second_raw, rest) = scan_ident_raw(after_dot)?;
		let namespace = expand(first_raw, macro_ctx);
		let name = expand(second_raw, macro_ctx);
		Ok((Identifier { namespace: Some(namespace), name }, rest))
	} else {
		let name = expand(first_raw, macro_ctx);
		Ok((Identifier { namespace: None, name }, rest))
	}
}

fn expand(raw: &str, macro_ctx: Option<(u64, u64)>) -> SmolStr {
	match macro_ctx {
		Some((cur, last)) => expand_macro_markers(raw, cur, last),
		None => SmolStr::from(raw),
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn byte_number_round_trip() {
		for b in 0u16 ..= 255 {
			for text in [format!("0x{b:02X}"), format!("0b{b:08b}"), format!("{b}")] {
				let (n, rest) = parse_number(&text).unwrap();
				assert_eq!(rest, "");
				assert_eq!(n.val, b, "parsing {text}");
				assert_eq!(n.width, Width::Byte, "parsing {text}");
			}
		}
	}

	#[test]
	fn word_number_round_trip() {
		for w in [0u32, 1, 255, 256, 4096, 65535] {
			let w = w as u16;
			for text in [format!("0x{w:04X}"), format!("0b{w:016b}")] {
				let (n, rest) = parse_number(&text).unwrap();
				assert_eq!(rest, "");
				assert_eq!(n.val, w);
				assert_eq!(n.width, Width::Word);
			}
		}
	}

	#[test]
	fn negative_number_is_twos_complement() {
		let (n, _) = parse_number("-1").unwrap();
		assert_eq!(n.val, 0xFFFF);
		assert!(n.negative);
	}

	#[test]
	fn shift_by_sixteen_edge_is_not_a_number_concern_but_char_literal_is_byte() {
		let (n, rest) = parse_number("'a'").unwrap();
		assert_eq!(rest, "");
		assert_eq!(n.val, b'a' as u16);
		assert_eq!(n.width, Width::Byte);
	}

	#[test]
	fn two_char_literal_is_a_little_endian_word() {
		let (n, _) = parse_number("'ab'").unwrap();
		assert_eq!(n.width, Width::Word);
		assert_eq!(n.val, u16::from_le_bytes([b'a', b'b']));
	}

	#[test]
	fn string_escape_round_trip() {
		let (bytes, rest) = parse_string_bytes(r#""\0\t\n\r\"\'\\\x41""#).unwrap();
		assert_eq!(rest, "");
		assert_eq!(bytes, vec![0, 9, 10, 13, 34, 39, 92, 65]);
	}

	#[test]
	fn identifier_shapes() {
		let (id, _) = parse_identifier("foo", None).unwrap();
		assert_eq!(id.namespace, None);
		assert_eq!(id.name, "foo");

		let (id, _) = parse_identifier(".foo", None).unwrap();
		assert_eq!(id.namespace, Some(SmolStr::new()));

		let (id, _) = parse_identifier("ns.foo", None).unwrap();
		assert_eq!(id.namespace.as_deref(), Some("ns"));
		assert_eq!(id.name, "foo");
	}

	#[test]
	fn macro_local_label_markers_expand_distinctly_per_invocation() {
		let first = expand_macro_markers("L$", 1, 0);
		let second = expand_macro_markers("L$", 2, 0);
		assert_eq!(first, "L1");
		assert_eq!(second, "L2");
		assert_ne!(first, second);

		let outer = expand_macro_markers("L$$", 7, 3);
		assert_eq!(outer, "L3");
	}
}
