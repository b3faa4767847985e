//! Line splitter & comment stripper (§4.2).

/// A quote/escape-aware scan used by both [`strip_comment`] and [`split`]:
/// calls `on_char` for every character, tracking whether we're inside a
/// `'...'` or `"..."` run so callers can treat `#`/`,` specially outside of
/// them.
struct QuoteState {
	in_char: bool,
	in_str:  bool,
}

impl QuoteState {
	fn new() -> Self {
		Self { in_char: false, in_str: false }
	}

	fn quoted(&self) -> bool {
		self.in_char || self.in_str
	}

	fn advance(&mut self, c: char) {
		match c {
			'\'' =>
				if self.in_char {
					self.in_char = false;
				} else if !self.in_str {
					self.in_char = true;
				},
			'"' =>
				if self.in_str {
					self.in_str = false;
				} else if !self.in_char {
					self.in_str = true;
				},
			_ => {},
		}
	}
}

/// Removes a `#`-initiated comment from `line`, treating `#` inside
/// character literals, string literals, and right after a `\` escape as
/// literal. Returns an empty string if the result is all whitespace.
#[must_use]
pub fn strip_comment(line: &str) -> String {
	let mut result = String::with_capacity(line.len());
	let mut state = QuoteState::new();
	let mut chars = line.chars().peekable();
	while let Some(c) = chars.next() {
		if c == '#' && !state.quoted() {
			break;
		}
		state.advance(c);
		result.push(c);
		if c == '\\' {
			if let Some(next) = chars.next() {
				result.push(next);
			}
		}
	}
	if result.trim().is_empty() { String::new() } else { result }
}

/// A split source line: the optional label before `:`, the optional
/// command token, and its comma-separated argument list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitLine {
	pub label: Option<String>,
	pub cmd:   Option<String>,
	pub args:  Vec<String>,
}

/// Splits a comment-stripped line into label, command, and arguments (§4.2).
#[must_use]
pub fn split(line: &str) -> SplitLine {
	let (label, rest) = split_label(line);
	let rest = rest.trim_start();
	if rest.is_empty() {
		return SplitLine { label, cmd: None, args: Vec::new() };
	}
	let cmd_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
	let (cmd, after_cmd) = rest.split_at(cmd_end);
	let args = split_args(after_cmd.trim_start());
	SplitLine { label, cmd: Some(cmd.to_string()), args }
}

/// Finds the unquoted top-level `:` that separates a label from the rest of
/// the line, if any.
fn split_label(line: &str) -> (Option<String>, &str) {
	let mut state = QuoteState::new();
	let mut chars = line.char_indices().peekable();
	while let Some((i, c)) = chars.next() {
		if c == ':' && !state.quoted() {
			return (Some(line[.. i].trim().to_string()), &line[i + 1 ..]);
		}
		state.advance(c);
		if c == '\\' {
			chars.next();
		}
	}
	(None, line)
}

/// Splits `s` on unquoted, unescaped commas, trimming trailing whitespace
/// off each argument.
fn split_args(s: &str) -> Vec<String> {
	if s.is_empty() {
		return Vec::new();
	}
	let mut args = Vec::new();
	let mut current = String::new();
	let mut state = QuoteState::new();
	let mut chars = s.chars().peekable();
	while let Some(c) = chars.next() {
		if c == ',' && !state.quoted() {
			args.push(current.trim().to_string());
			current.clear();
			continue;
		}
		state.advance(c);
		current.push(c);
		if c == '\\' {
			if let Some(next) = chars.next() {
				current.push(next);
			}
		}
	}
	args.push(current.trim().to_string());
	args
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn comment_is_removed() {
		assert_eq!(strip_comment("add r1, r2 # comment"), "add r1, r2 ");
	}

	#[test]
	fn hash_inside_char_literal_is_literal() {
		assert_eq!(strip_comment("$data_b '#'"), "$data_b '#'");
	}

	#[test]
	fn hash_inside_string_is_literal() {
		assert_eq!(strip_comment(r#"$data_b "a#b""#), r#"$data_b "a#b""#);
	}

	#[test]
	fn all_whitespace_after_stripping_becomes_empty() {
		assert_eq!(strip_comment("   # just a comment"), "");
	}

	#[test]
	fn escaped_quote_inside_string_does_not_corrupt_quote_tracking() {
		assert_eq!(strip_comment(r#"$data_b "\"" # c"#), r#"$data_b "\"" "#);
	}

	#[test]
	fn splits_label_cmd_args() {
		let parsed = split("start: add r1, r2");
		assert_eq!(parsed.label.as_deref(), Some("start"));
		assert_eq!(parsed.cmd.as_deref(), Some("add"));
		assert_eq!(parsed.args, vec!["r1".to_string(), "r2".to_string()]);
	}

	#[test]
	fn no_colon_means_no_label() {
		let parsed = split("add r1, r2");
		assert_eq!(parsed.label, None);
		assert_eq!(parsed.cmd.as_deref(), Some("add"));
	}

	#[test]
	fn commas_inside_quotes_are_literal() {
		let parsed = split(r#"$data_b "a,b", 1"#);
		assert_eq!(parsed.args, vec![r#""a,b""#.to_string(), "1".to_string()]);
	}

	#[test]
	fn escaped_quote_inside_string_does_not_corrupt_arg_splitting() {
		let parsed = split(r#"$data_b "\"", 1"#);
		assert_eq!(parsed.args, vec![r#""\"""#.to_string(), "1".to_string()]);
	}

	#[test]
	fn label_only_line_has_no_command() {
		let parsed = split("loop:");
		assert_eq!(parsed.label.as_deref(), Some("loop"));
		assert_eq!(parsed.cmd, None);
	}
}
