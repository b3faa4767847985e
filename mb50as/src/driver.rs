//! Assembler driver (§4.5): the two-phase line processor that ties the
//! lexer, expression engine, symbol tables, and output image together.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use log::trace;
use smartstring::alias::String as SmolStr;

use mb50_image::{Image, Width as ImageWidth};

use crate::error::{AsmError, FatalError};
use crate::expr::{EvalCtx, Expr};
use crate::input::{FileId, Files};
use crate::lexer;
use crate::line::{self, SplitLine};
use crate::opcodes;
use crate::position::Position;
use crate::symbol::{self, Lookup, Symbol, SymbolTables};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
	#[error(transparent)]
	Fatal(#[from] FatalError),
	#[error(transparent)]
	Reported(#[from] AsmError),
	#[error("undefined label(s) at end of assembly:\n{0}")]
	Undefined(String),
}

fn format_undefined(names: &[(Option<std::path::PathBuf>, SmolStr)]) -> String {
	names
		.iter()
		.map(|(path, name)| match path {
			Some(p) => format!("  {}: undefined label \"{name}\"", p.display()),
			None => format!("  undefined label \"{name}\""),
		})
		.collect::<Vec<_>>()
		.join("\n")
}

/// A deferred (phase-2) value: the frozen expression, where to write it,
/// and whether it is one byte or a little-endian word.
struct Patch {
	expr:     Expr,
	file:     FileId,
	position: Position,
	addr:     u16,
	width:    ImageWidth,
}

/// Live state while expanding a macro body: the caller-bound argument
/// expressions, this expansion's own counter, and the enclosing
/// expansion's counter (for `$$`).
#[derive(Clone)]
struct MacroFrame {
	args:        HashMap<SmolStr, Expr>,
	cur_macro:   u64,
	last_macro:  u64,
	order_limit: u64,
}

/// Owns every piece of state for one assembly run and drives phase 1 and
/// phase 2 to completion.
pub struct Driver {
	files:      Files,
	symbols:    SymbolTables,
	image:      Image,
	patches:    Vec<Patch>,
	macro_defs: u64,
	max_macro:  u64,
	files_run:  HashSet<FileId>,
	cur_addr:   u16,
	verbose:    bool,
}

impl Driver {
	#[must_use]
	pub fn new(files: Files, verbose: bool) -> Self {
		Self {
			files,
			symbols: SymbolTables::new(),
			image: Image::new(),
			patches: Vec::new(),
			macro_defs: 0,
			max_macro: 0,
			files_run: HashSet::new(),
			cur_addr: 0,
			verbose,
		}
	}

	#[must_use]
	pub fn image(&self) -> &Image {
		&self.image
	}

	/// Runs phase 1 starting at `root`, then phase 2.
	pub fn run(&mut self, root: FileId) -> Result<(), DriverError> {
		self.run_file(root, None)?;
		self.check_undefined()?;
		self.run_phase2()?;
		Ok(())
	}

	fn run_file(&mut self, file: FileId, frame: Option<&MacroFrame>) -> Result<(), DriverError> {
		if !self.files_run.insert(file) {
			return Ok(());
		}
		let len = self.files.get(file).stripped.len();
		self.run_lines(file, 0 .. len, frame, 0)
	}

	fn check_undefined(&self) -> Result<(), DriverError> {
		let undefined = self.symbols.undefined_labels();
		if undefined.is_empty() {
			return Ok(());
		}
		let named: Vec<_> =
			undefined.into_iter().map(|(file, name)| (file.map(|f| self.files.get(f).canonical.as_ref().clone()), name)).collect();
		Err(DriverError::Undefined(format_undefined(&named)))
	}

	fn run_phase2(&mut self) -> Result<(), DriverError> {
		let patches = std::mem::take(&mut self.patches);
		for patch in patches {
			let mut ctx =
				EvalCtx { symbols: &mut self.symbols, files: &self.files, file: patch.file, cur_addr: patch.addr, position: patch.position.clone() };
			let Some(value) = patch.expr.eval(&mut ctx)? else {
				return Err(DriverError::Reported(AsmError::new(
					patch.position,
					"expression is still indefinite after phase 1; this is an assembler defect, not a source error",
				)));
			};
			let n = match value {
				crate::expr::Value::Number(n) => n,
				_ => return Err(DriverError::Reported(AsmError::new(patch.position, "phase-2 patch expression must be numeric"))),
			};
			match patch.width {
				ImageWidth::Byte => self.image.set_byte(patch.addr, n as u8),
				ImageWidth::Word => self.image.set_word(patch.addr, n),
			}
		}
		Ok(())
	}

	/// Runs the lines `range` of `file` (a whole file at top level, or a
	/// macro body span during expansion), interleaving listing echoes with
	/// directive/instruction processing.
	fn run_lines(&mut self, file: FileId, range: Range<usize>, frame: Option<&MacroFrame>, level: usize) -> Result<(), DriverError> {
		let indent = "    ".repeat(level);
		let mut line_no = range.start;
		while line_no < range.end {
			let full = self.files.get(file).full[line_no].clone();
			let stripped = self.files.get(file).stripped[line_no].clone();
			if !full.trim().is_empty() {
				self.image.add_src_line(format!("{indent}{full}"));
			}
			if stripped.trim().is_empty() {
				line_no += 1;
				continue;
			}
			let position = self.files.get(file).position(line_no + 1);
			let macro_ctx = frame.map(|f| (f.cur_macro, f.last_macro));
			let parsed = line::split(&stripped);

			if let Some(label) = &parsed.label {
				self.define_label_from_line(file, &position, label, macro_ctx)?;
			}

			let Some(cmd) = &parsed.cmd else {
				line_no += 1;
				continue;
			};

			if let Some(directive) = cmd.strip_prefix('$') {
				match directive {
					"macro" => {
						let end = self.define_macro_block(file, line_no, &position, &parsed)?;
						line_no = end + 1;
						continue;
					},
					"end_macro" => return Err(DriverError::Reported(AsmError::new(position, "$end_macro without matching $macro"))),
					"addr" => self.handle_addr(file, &position, &parsed, frame, macro_ctx)?,
					"const" => self.handle_const(file, &position, &parsed, frame, macro_ctx)?,
					"data_b" => self.handle_data(file, &position, &parsed, frame, macro_ctx, ImageWidth::Byte, level)?,
					"data_w" => self.handle_data(file, &position, &parsed, frame, macro_ctx, ImageWidth::Word, level)?,
					"use" => self.handle_use(file, &position, &parsed, frame)?,
					other => return Err(DriverError::Reported(AsmError::new(position, format!("unknown directive \"${other}\"")))),
				}
			} else {
				self.handle_identifier_command(file, &position, cmd, &parsed, frame, level)?;
			}
			line_no += 1;
		}
		Ok(())
	}

	fn define_label_from_line(
		&mut self,
		file: FileId,
		position: &Position,
		label: &str,
		macro_ctx: Option<(u64, u64)>,
	) -> Result<(), DriverError> {
		let (id, rest) = lexer::parse_identifier(label, macro_ctx).map_err(|msg| AsmError::new(position.clone(), msg))?;
		if id.namespace.is_some() || !rest.trim().is_empty() {
			return Err(DriverError::Reported(AsmError::new(position.clone(), "label must be an unqualified identifier")));
		}
		symbol::define_label(&mut self.symbols, file, &id.name, Some(self.cur_addr))
			.map_err(|msg| DriverError::Reported(AsmError::new(position.clone(), msg)))
	}

	fn handle_addr(
		&mut self,
		file: FileId,
		position: &Position,
		parsed: &SplitLine,
		frame: Option<&MacroFrame>,
		macro_ctx: Option<(u64, u64)>,
	) -> Result<(), DriverError> {
		let arg = single_arg(position, parsed)?;
		let value = self.eval_now(file, position, arg, frame, macro_ctx)?;
		let crate::expr::Value::Number(n) = value else {
			return Err(DriverError::Reported(AsmError::new(position.clone(), "$addr requires a numeric expression")));
		};
		self.cur_addr = n;
		self.image.add_txt_line(format!("$addr 0x{n:04X}"));
		Ok(())
	}

	fn handle_const(
		&mut self,
		file: FileId,
		position: &Position,
		parsed: &SplitLine,
		frame: Option<&MacroFrame>,
		macro_ctx: Option<(u64, u64)>,
	) -> Result<(), DriverError> {
		if parsed.args.len() != 2 {
			return Err(DriverError::Reported(AsmError::new(position.clone(), "$const requires exactly two arguments: name, expression")));
		}
		let (id, rest) = lexer::parse_identifier(&parsed.args[0], macro_ctx).map_err(|msg| AsmError::new(position.clone(), msg))?;
		if id.namespace.is_some() || !rest.trim().is_empty() {
			return Err(DriverError::Reported(AsmError::new(position.clone(), "$const name must be an unqualified identifier")));
		}
		let (expr, rest) =
			self.parse_expr_here(&parsed.args[1], frame, macro_ctx).map_err(|msg| AsmError::new(position.clone(), msg))?;
		if !rest.trim().is_empty() {
			return Err(DriverError::Reported(AsmError::new(position.clone(), format!("unexpected trailing input: \"{rest}\""))));
		}
		symbol::define_const(&mut self.symbols, file, &id.name, expr).map_err(|msg| DriverError::Reported(AsmError::new(position.clone(), msg)))
	}

	fn handle_data(
		&mut self,
		file: FileId,
		position: &Position,
		parsed: &SplitLine,
		frame: Option<&MacroFrame>,
		macro_ctx: Option<(u64, u64)>,
		width: ImageWidth,
		level: usize,
	) -> Result<(), DriverError> {
		if parsed.args.is_empty() {
			return Err(DriverError::Reported(AsmError::new(position.clone(), "directive requires at least one argument")));
		}
		let mnemonic = if matches!(width, ImageWidth::Byte) { "$data_b" } else { "$data_w" };
		let mut buffer = Vec::new();
		let start_addr = self.cur_addr;
		for arg in &parsed.args {
			let (expr, rest) = self.parse_expr_here(arg, frame, macro_ctx).map_err(|msg| AsmError::new(position.clone(), msg))?;
			if !rest.trim().is_empty() {
				return Err(DriverError::Reported(AsmError::new(position.clone(), format!("unexpected trailing input: \"{rest}\""))));
			}
			let addr_here = self.cur_addr;
			let mut ctx = EvalCtx { symbols: &mut self.symbols, files: &self.files, file, cur_addr: addr_here, position: position.clone() };
			let value = expr.eval(&mut ctx)?;
			match width {
				ImageWidth::Byte => match value {
					Some(crate::expr::Value::Number(n)) => {
						buffer.push(n as u8);
						self.cur_addr = self.cur_addr.wrapping_add(1);
					},
					Some(crate::expr::Value::Bytes(bytes)) => {
						self.cur_addr = self.cur_addr.wrapping_add(bytes.len() as u16);
						buffer.extend(bytes);
					},
					Some(crate::expr::Value::Register { .. }) =>
						return Err(DriverError::Reported(AsmError::new(position.clone(), "a register is not a byte-producing expression"))),
					None => {
						self.patches.push(Patch {
							expr: expr.freeze_cur_addr(addr_here),
							file,
							position: position.clone(),
							addr: addr_here,
							width: ImageWidth::Byte,
						});
						buffer.push(0);
						self.cur_addr = self.cur_addr.wrapping_add(1);
					},
				},
				ImageWidth::Word => {
					match value {
						Some(crate::expr::Value::Number(n)) => buffer.extend(n.to_le_bytes()),
						None => {
							self.patches.push(Patch {
								expr: expr.freeze_cur_addr(addr_here),
								file,
								position: position.clone(),
								addr: addr_here,
								width: ImageWidth::Word,
							});
							buffer.extend([0u8, 0]);
						},
						_ => return Err(DriverError::Reported(AsmError::new(position.clone(), "$data_w requires a numeric expression"))),
					}
					self.cur_addr = self.cur_addr.wrapping_add(2);
				},
			}
		}
		let text = format!("{mnemonic} {}", parsed.args.join(", "));
		let indent = "    ".repeat(level);
		self.image.add_bytes(start_addr, &buffer, &text, &indent);
		Ok(())
	}

	fn handle_use(&mut self, file: FileId, position: &Position, parsed: &SplitLine, frame: Option<&MacroFrame>) -> Result<(), DriverError> {
		if parsed.args.len() != 2 {
			return Err(DriverError::Reported(AsmError::new(position.clone(), "$use requires exactly two arguments: namespace, path")));
		}
		let (ns, rest) = lexer::parse_identifier(&parsed.args[0], None).map_err(|msg| AsmError::new(position.clone(), msg))?;
		if ns.namespace.is_some() || !rest.trim().is_empty() {
			return Err(DriverError::Reported(AsmError::new(position.clone(), "$use namespace must be an unqualified identifier")));
		}
		let Some(&target) = self.files.get(file).namespaces.get(ns.name.as_str()) else {
			return Err(DriverError::Reported(AsmError::new(
				position.clone(),
				format!("namespace \"{}\" was not resolved by the input manager", ns.name),
			)));
		};
		self.run_file(target, frame)
	}

	/// Finds the matching `$end_macro`, defines the macro, and returns the
	/// line index of that `$end_macro` (so the caller can skip past it).
	fn define_macro_block(&mut self, file: FileId, macro_line: usize, position: &Position, parsed: &SplitLine) -> Result<usize, DriverError> {
		if parsed.args.is_empty() {
			return Err(DriverError::Reported(AsmError::new(position.clone(), "$macro requires a name")));
		}
		let (name_id, rest) = lexer::parse_identifier(&parsed.args[0], None).map_err(|msg| AsmError::new(position.clone(), msg))?;
		if name_id.namespace.is_some() || !rest.trim().is_empty() {
			return Err(DriverError::Reported(AsmError::new(position.clone(), "$macro name must be an unqualified identifier")));
		}
		let mut params = Vec::new();
		for raw in &parsed.args[1 ..] {
			let (id, rest) = lexer::parse_identifier(raw, None).map_err(|msg| AsmError::new(position.clone(), msg))?;
			if id.namespace.is_some() || !rest.trim().is_empty() {
				return Err(DriverError::Reported(AsmError::new(position.clone(), "macro parameters must be unqualified identifiers")));
			}
			params.push(id.name);
		}

		let stripped = &self.files.get(file).stripped;
		let mut depth = 0usize;
		let mut end_line = None;
		for (offset, text) in stripped.iter().enumerate().skip(macro_line + 1) {
			let split = line::split(text);
			match split.cmd.as_deref() {
				Some("$macro") => depth += 1,
				Some("$end_macro") if depth == 0 => {
					end_line = Some(offset);
					break;
				},
				Some("$end_macro") => depth -= 1,
				_ => {},
			}
		}
		let Some(end_line) = end_line else {
			return Err(DriverError::Reported(AsmError::new(position.clone(), "$macro without matching $end_macro")));
		};

		self.macro_defs += 1;
		let order = self.macro_defs;
		let body = macro_line + 1 .. end_line;
		symbol::define_macro(&mut self.symbols, file, &name_id.name, params, body.clone(), body, order)
			.map_err(|msg| DriverError::Reported(AsmError::new(position.clone(), msg)))?;
		Ok(end_line)
	}

	fn handle_identifier_command(
		&mut self,
		file: FileId,
		position: &Position,
		cmd: &str,
		parsed: &SplitLine,
		frame: Option<&MacroFrame>,
		level: usize,
	) -> Result<(), DriverError> {
		let macro_ctx = frame.map(|f| (f.cur_macro, f.last_macro));
		let (id, rest) = lexer::parse_identifier(cmd, macro_ctx).map_err(|msg| AsmError::new(position.clone(), msg))?;
		if !rest.trim().is_empty() {
			return Err(DriverError::Reported(AsmError::new(position.clone(), format!("unexpected trailing input in command: \"{rest}\""))));
		}

		match symbol::find_symbol(&mut self.symbols, &self.files, file, &id, false).map_err(|msg| AsmError::new(position.clone(), msg))? {
			Lookup::Found(Symbol::Macro { params, home_file, full_span, stripped_span: _, order }) =>
				return self.expand_macro(position, parsed, frame, params, home_file, full_span, order, level),
			Lookup::Ambiguous =>
				return Err(DriverError::Reported(AsmError::new(position.clone(), format!("\"{}\" is ambiguous between files", id.name)))),
			_ => {},
		}

		let Some(info) = opcodes::lookup(&id.name) else {
			return Err(DriverError::Reported(AsmError::new(position.clone(), format!("\"{}\" is not an instruction, macro, or known name", id.name))));
		};
		if parsed.args.len() != 2 {
			return Err(DriverError::Reported(AsmError::new(position.clone(), format!("\"{}\" requires exactly two register operands", id.name))));
		}
		if info.reserved {
			return Err(DriverError::Reported(AsmError::new(position.clone(), format!("\"{}\" is a reserved opcode", id.name))));
		}
		let dst = self.eval_register(file, position, &parsed.args[0], frame, macro_ctx, info.dst_csr, "destination")?;
		let src = self.eval_register(file, position, &parsed.args[1], frame, macro_ctx, info.src_csr, "source")?;
		let operand = (dst << 4) | src;
		let indent = "    ".repeat(level);
		let text = format!("{} {}", id.name, parsed.args.join(", "));
		self.image.add_bytes(self.cur_addr, &[info.code, operand], &text, &indent);
		self.cur_addr = self.cur_addr.wrapping_add(2);
		Ok(())
	}

	fn eval_register(
		&mut self,
		file: FileId,
		position: &Position,
		arg: &str,
		frame: Option<&MacroFrame>,
		macro_ctx: Option<(u64, u64)>,
		want_csr: bool,
		which: &str,
	) -> Result<u8, DriverError> {
		let value = self.eval_now(file, position, arg, frame, macro_ctx)?;
		match value {
			crate::expr::Value::Register { index, csr } if csr == want_csr => Ok(index),
			crate::expr::Value::Register { csr, .. } =>
				Err(DriverError::Reported(AsmError::new(
					position.clone(),
					format!("{which} operand must be {} register, found a {} register", if want_csr { "a CSR" } else { "a plain" }, if csr { "CSR" } else { "plain" }),
				))),
			_ => Err(DriverError::Reported(AsmError::new(position.clone(), format!("{which} operand must be a register selector")))),
		}
	}

	fn expand_macro(
		&mut self,
		position: &Position,
		parsed: &SplitLine,
		frame: Option<&MacroFrame>,
		params: Vec<SmolStr>,
		home_file: FileId,
		body: Range<usize>,
		order: u64,
		level: usize,
	) -> Result<(), DriverError> {
		let order_limit = frame.map_or(u64::MAX, |f| f.order_limit);
		if order > order_limit {
			return Err(DriverError::Reported(AsmError::new(position.clone(), "macro invoked before its own definition")));
		}
		if parsed.args.len() != params.len() {
			return Err(DriverError::Reported(AsmError::new(
				position.clone(),
				format!("macro expects {} argument(s), got {}", params.len(), parsed.args.len()),
			)));
		}
		let outer_macro_ctx = frame.map(|f| (f.cur_macro, f.last_macro));
		let mut args = HashMap::new();
		for (param, raw) in params.iter().zip(&parsed.args) {
			let (expr, rest) = self.parse_expr_here(raw, frame, outer_macro_ctx).map_err(|msg| AsmError::new(position.clone(), msg))?;
			if !rest.trim().is_empty() {
				return Err(DriverError::Reported(AsmError::new(position.clone(), format!("unexpected trailing input: \"{rest}\""))));
			}
			args.insert(param.clone(), expr);
		}
		self.max_macro += 1;
		let new_frame =
			MacroFrame { args, cur_macro: self.max_macro, last_macro: frame.map_or(0, |f| f.cur_macro), order_limit: order };
		if self.verbose {
			trace!("expanding macro (order {order}) as expansion #{}", new_frame.cur_macro);
		}
		self.run_lines(home_file, body, Some(&new_frame), level + 1)
	}

	fn parse_expr_here<'s>(
		&self,
		s: &'s str,
		frame: Option<&MacroFrame>,
		macro_ctx: Option<(u64, u64)>,
	) -> Result<(Expr, &'s str), String> {
		crate::expr::parse_expr(s, &self.symbols.predefined, frame.map(|f| &f.args), macro_ctx)
	}

	fn eval_now(
		&mut self,
		file: FileId,
		position: &Position,
		s: &str,
		frame: Option<&MacroFrame>,
		macro_ctx: Option<(u64, u64)>,
	) -> Result<crate::expr::Value, DriverError> {
		let (expr, rest) = self.parse_expr_here(s, frame, macro_ctx).map_err(|msg| AsmError::new(position.clone(), msg))?;
		if !rest.trim().is_empty() {
			return Err(DriverError::Reported(AsmError::new(position.clone(), format!("unexpected trailing input: \"{rest}\""))));
		}
		let mut ctx = EvalCtx { symbols: &mut self.symbols, files: &self.files, file, cur_addr: self.cur_addr, position: position.clone() };
		expr.eval(&mut ctx)?.ok_or_else(|| DriverError::Reported(AsmError::new(position.clone(), "expression must be definite here")))
	}
}

fn single_arg<'p>(position: &Position, parsed: &'p SplitLine) -> Result<&'p str, DriverError> {
	if parsed.args.len() != 1 {
		return Err(DriverError::Reported(AsmError::new(position.clone(), "directive requires exactly one argument")));
	}
	Ok(&parsed.args[0])
}

#[cfg(test)]
mod test {
	use super::*;
	use std::fs;
	use std::path::{Path, PathBuf};

	fn write_temp(dir: &Path, name: &str, contents: &str) -> PathBuf {
		let path = dir.join(name);
		fs::write(&path, contents).unwrap();
		path
	}

	fn assemble(contents: &str) -> Image {
		let dir = std::env::temp_dir().join(format!("mb50as-driver-test-{}", uuid_like()));
		fs::create_dir_all(&dir).unwrap();
		let path = write_temp(&dir, "t.s", contents);
		let (files, root) = crate::input::load(&path, false).unwrap();
		let mut driver = Driver::new(files, false);
		driver.run(root).unwrap();
		fs::remove_dir_all(&dir).ok();
		driver.image
	}

	fn uuid_like() -> u64 {
		use std::hash::{Hash, Hasher};
		let mut hasher = std::collections::hash_map::DefaultHasher::new();
		std::thread::current().id().hash(&mut hasher);
		hasher.finish()
	}

	#[test]
	fn e1_direct_instructions() {
		let image = assemble("$addr 0x0100\nstart: add r1, r2\n       mv pc, r15\n");
		assert_eq!(image.window(), (0x0100, 0x0104));
		assert_eq!(image.window_bytes(), &[0x01, 0x12, 0x0e, 0xff]);
	}

	#[test]
	fn e2_forward_reference_patches_in_phase2() {
		let image = assemble("$addr 0x0000\n       $data_w target\ntarget: $data_b 0xab\n");
		assert_eq!(&image.window_bytes()[0 .. 2], &[0x02, 0x00]);
		assert_eq!(image.window_bytes()[2], 0xab);
	}

	#[test]
	fn e3_const_expression() {
		let image = assemble("$const K, 1 + 2 * 3\n$data_b K\n");
		assert_eq!(image.window_bytes(), &[0x07]);
	}

	#[test]
	fn e4_macro_expansion_emits_twice() {
		let image = assemble("$macro inc2 r\n  add r, r1\n  add r, r1\n$end_macro\n$addr 0x0000\ninc2 r2\n");
		assert_eq!(image.window_bytes(), &[0x01, 0x21, 0x01, 0x21]);
	}

	#[test]
	fn e5_namespace_qualified_constant() {
		let dir = std::env::temp_dir().join(format!("mb50as-driver-test-e5-{}", uuid_like()));
		fs::create_dir_all(&dir).unwrap();
		write_temp(&dir, "lib.s", "$const X, 0x1234\n");
		let top = write_temp(&dir, "top.s", "$use lib, \"lib.s\"\n$data_w lib.X\n");
		let (files, root) = crate::input::load(&top, false).unwrap();
		let mut driver = Driver::new(files, false);
		driver.run(root).unwrap();
		assert_eq!(driver.image.window_bytes(), &[0x34, 0x12]);
		fs::remove_dir_all(&dir).ok();
	}

	#[test]
	fn undefined_label_aborts_with_a_combined_report() {
		let dir = std::env::temp_dir().join(format!("mb50as-driver-test-undef-{}", uuid_like()));
		fs::create_dir_all(&dir).unwrap();
		let path = write_temp(&dir, "t.s", "$data_w .nowhere\n");
		let (files, root) = crate::input::load(&path, false).unwrap();
		let mut driver = Driver::new(files, false);
		let err = driver.run(root).unwrap_err();
		assert!(matches!(err, DriverError::Undefined(_)));
		fs::remove_dir_all(&dir).ok();
	}

	#[test]
	fn macro_local_label_gets_a_distinct_address_per_invocation() {
		let image = assemble(concat!(
			"$macro twice\n",
			"L$: add r1, r1\n",
			"$end_macro\n",
			"$addr 0x0000\n",
			"twice\n",
			"twice\n",
		));
		assert_eq!(image.window_bytes(), &[0x01, 0x11, 0x01, 0x11]);
	}
}
