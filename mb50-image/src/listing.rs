/// One line of the `.out` listing: a pure text line, or a text line paired
/// with the bytes it emitted (printed after the text as comma-separated hex).
#[derive(Debug, Clone)]
pub struct ListingLine {
	pub text:  String,
	pub bytes: Option<(u16, Vec<u8>)>,
}

/// Ordered accumulator of listing lines, written to the `.out` file.
#[derive(Debug, Default)]
pub struct Listing {
	lines: Vec<ListingLine>,
}

impl Listing {
	#[must_use]
	pub fn new() -> Self {
		Self { lines: Vec::new() }
	}

	pub fn push_text(&mut self, text: String) {
		self.lines.push(ListingLine { text, bytes: None });
	}

	pub fn push_bytes(&mut self, text: String, addr: u16, bytes: Vec<u8>) {
		self.lines.push(ListingLine { text, bytes: Some((addr, bytes)) });
	}

	#[must_use]
	pub fn lines(&self) -> &[ListingLine] {
		&self.lines
	}

	/// Renders the listing the way `.out` expects: every line prefixed `; `,
	/// bytes lines followed by their comma-separated hex bytes.
	#[must_use]
	pub fn render(&self) -> String {
		let mut out = String::new();
		for line in &self.lines {
			out.push_str("; ");
			out.push_str(&line.text);
			if let Some((_, bytes)) = &line.bytes {
				if !bytes.is_empty() {
					out.push_str("  ");
					let rendered =
						bytes.iter().map(|b| format!("0x{b:02x}")).collect::<Vec<_>>().join(" , ");
					out.push_str(&rendered);
				}
			}
			out.push('\n');
		}
		out
	}
}
