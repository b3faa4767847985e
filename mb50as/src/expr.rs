//! Expression engine (§4.3): a recursive-descent parser over the fixed
//! operator-precedence table, producing a tree that supports deferred
//! ("indefinite") evaluation for phase 2.

use crate::error::AsmError;
use crate::input::{FileId, Files};
use crate::lexer::{self, Identifier};
use crate::position::Position;
use crate::symbol::{Lookup, PredefinedTable, Predefined, SymbolTables, find_symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
	Not,
	Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
	Or,
	Xor,
	And,
	Shl,
	Shr,
	Add,
	Sub,
	Mul,
	Div,
	Rem,
}

/// One node of a parsed expression. `LabelRef` is resolved by name at
/// evaluation time, never at parse time, since the referenced label or
/// constant may not exist yet (forward reference).
#[derive(Debug, Clone)]
pub enum Expr {
	Const(u16),
	LabelRef(Identifier),
	CurAddr,
	Register { index: u8, csr: bool },
	Bytes(Vec<u8>),
	Unary(UnOp, Box<Expr>),
	Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
	/// Replaces every `__addr` occurrence with a constant holding
	/// `cur_addr`, leaving everything else untouched. Used when an
	/// expression must be deferred to phase 2, where `__addr` would
	/// otherwise mean whatever address phase 2 happens to be visiting
	/// rather than the address at the original reference site (§9).
	#[must_use]
	pub fn freeze_cur_addr(&self, cur_addr: u16) -> Expr {
		match self {
			Expr::CurAddr => Expr::Const(cur_addr),
			Expr::Const(_) | Expr::LabelRef(_) | Expr::Register { .. } | Expr::Bytes(_) => self.clone(),
			Expr::Unary(op, inner) => Expr::Unary(*op, Box::new(inner.freeze_cur_addr(cur_addr))),
			Expr::Binary(op, lhs, rhs) =>
				Expr::Binary(*op, Box::new(lhs.freeze_cur_addr(cur_addr)), Box::new(rhs.freeze_cur_addr(cur_addr))),
		}
	}
}

/// The result of evaluating an [`Expr`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
	Number(u16),
	Bytes(Vec<u8>),
	Register { index: u8, csr: bool },
}

impl Value {
	fn as_number(&self, position: &Position) -> Result<u16, AsmError> {
		match self {
			Value::Number(n) => Ok(*n),
			Value::Bytes(_) => Err(AsmError::new(position.clone(), "expected a number, found a byte sequence")),
			Value::Register { .. } => Err(AsmError::new(position.clone(), "expected a number, found a register")),
		}
	}
}

/// Everything [`Expr::eval`] needs: the symbol tables (mutable, since
/// looking up a global label marks it fixed), the file graph (for
/// namespace resolution), which file the expression is being evaluated
/// relative to, the current output address (`__addr`), and a position to
/// blame on failure.
pub struct EvalCtx<'a> {
	pub symbols:  &'a mut SymbolTables,
	pub files:    &'a Files,
	pub file:     FileId,
	pub cur_addr: u16,
	pub position: Position,
}

impl Expr {
	/// Evaluates this expression. `Ok(None)` means the value is indefinite
	/// right now (an undefined label, or division by zero) but may become
	/// definite later; that is not itself an error.
	pub fn eval(&self, ctx: &mut EvalCtx) -> Result<Option<Value>, AsmError> {
		match self {
			Expr::Const(v) => Ok(Some(Value::Number(*v))),
			Expr::CurAddr => Ok(Some(Value::Number(ctx.cur_addr))),
			Expr::Register { index, csr } => Ok(Some(Value::Register { index: *index, csr: *csr })),
			Expr::Bytes(bytes) => Ok(Some(Value::Bytes(bytes.clone()))),
			Expr::LabelRef(id) => eval_label_ref(ctx, id),
			Expr::Unary(op, inner) => eval_unary(ctx, *op, inner),
			Expr::Binary(op, lhs, rhs) => eval_binary(ctx, *op, lhs, rhs),
		}
	}
}

fn eval_label_ref(ctx: &mut EvalCtx, id: &Identifier) -> Result<Option<Value>, AsmError> {
	match find_symbol(ctx.symbols, ctx.files, ctx.file, id, true).map_err(|msg| AsmError::new(ctx.position.clone(), msg))? {
		Lookup::NotFound => Err(AsmError::new(ctx.position.clone(), format!("undefined name \"{}\"", display_id(id)))),
		Lookup::Ambiguous => Err(AsmError::new(ctx.position.clone(), format!("\"{}\" is ambiguous between files", display_id(id)))),
		Lookup::Found(crate::symbol::Symbol::Macro { .. }) =>
			Err(AsmError::new(ctx.position.clone(), format!("\"{}\" names a macro, not a value", display_id(id)))),
		Lookup::Found(crate::symbol::Symbol::Label { address, .. }) => Ok(address.map(Value::Number)),
		Lookup::Found(crate::symbol::Symbol::Var { expr, home_file }) => {
			let mut inner_ctx = EvalCtx { symbols: ctx.symbols, files: ctx.files, file: home_file, cur_addr: ctx.cur_addr, position: ctx.position.clone() };
			expr.eval(&mut inner_ctx)
		},
	}
}

fn display_id(id: &Identifier) -> String {
	match &id.namespace {
		None => id.name.to_string(),
		Some(ns) if ns.is_empty() => format!(".{}", id.name),
		Some(ns) => format!("{ns}.{}", id.name),
	}
}

fn eval_unary(ctx: &mut EvalCtx, op: UnOp, inner: &Expr) -> Result<Option<Value>, AsmError> {
	let Some(value) = inner.eval(ctx)? else { return Ok(None) };
	let n = value.as_number(&ctx.position)?;
	Ok(Some(Value::Number(match op {
		UnOp::Not => !n,
		UnOp::Neg => n.wrapping_neg(),
	})))
}

fn eval_binary(ctx: &mut EvalCtx, op: BinOp, lhs: &Expr, rhs: &Expr) -> Result<Option<Value>, AsmError> {
	let Some(lhs) = lhs.eval(ctx)? else { return Ok(None) };
	let Some(rhs) = rhs.eval(ctx)? else { return Ok(None) };
	let a = lhs.as_number(&ctx.position)?;
	let b = rhs.as_number(&ctx.position)?;
	Ok(match op {
		BinOp::Or => Some(Value::Number(a | b)),
		BinOp::Xor => Some(Value::Number(a ^ b)),
		BinOp::And => Some(Value::Number(a & b)),
		BinOp::Shl => Some(Value::Number(if b >= 16 { 0 } else { a << b })),
		BinOp::Shr => Some(Value::Number(if b >= 16 { 0 } else { a >> b })),
		BinOp::Add => Some(Value::Number(a.wrapping_add(b))),
		BinOp::Sub => Some(Value::Number(a.wrapping_sub(b))),
		BinOp::Mul => Some(Value::Number(a.wrapping_mul(b))),
		BinOp::Div =>
			if b == 0 {
				None
			} else {
				Some(Value::Number(a / b))
			},
		BinOp::Rem =>
			if b == 0 {
				None
			} else {
				Some(Value::Number(a % b))
			},
	})
}

/// Parses an expression from the start of `s`, returning it and the
/// unconsumed remainder. `macro_args` substitutes bareword identifiers
/// that name a macro parameter with the caller-supplied expression
/// (shadowing everything else, including predefined names); `macro_ctx`
/// expands `$`/`$$` macro-local-label markers inside identifiers.
pub fn parse_expr<'s>(
	s: &'s str,
	predefined: &PredefinedTable,
	macro_args: Option<&std::collections::HashMap<smartstring::alias::String, Expr>>,
	macro_ctx: Option<(u64, u64)>,
) -> Result<(Expr, &'s str), String> {
	Parser { predefined, macro_args, macro_ctx }.parse_or(s)
}

struct Parser<'a> {
	predefined: &'a PredefinedTable,
	macro_args: Option<&'a std::collections::HashMap<smartstring::alias::String, Expr>>,
	macro_ctx: Option<(u64, u64)>,
}

macro_rules! binary_level {
	($name:ident, $next:ident, [$($tok:literal => $op:expr),+ $(,)?]) => {
		fn $name<'s>(&self, s: &'s str) -> Result<(Expr, &'s str), String> {
			let (mut lhs, mut rest) = self.$next(s)?;
			loop {
				let trimmed = lexer::skip_ws(rest);
				let mut matched = false;
				$(
					if let Some(after) = trimmed.strip_prefix($tok) {
						let (rhs, after) = self.$next(after)?;
						lhs = Expr::Binary($op, Box::new(lhs), Box::new(rhs));
						rest = after;
						matched = true;
					}
				)+
				if !matched {
					break;
				}
			}
			Ok((lhs, rest))
		}
	};
}

impl<'a> Parser<'a> {
	fn parse_or<'s>(&self, s: &'s str) -> Result<(Expr, &'s str), String> {
		self.or_expr(s)
	}

	binary_level!(or_expr, xor_expr, ["|" => BinOp::Or]);

	binary_level!(xor_expr, and_expr, ["^" => BinOp::Xor]);

	binary_level!(and_expr, shift_expr, ["&" => BinOp::And]);

	binary_level!(shift_expr, add_expr, ["<<" => BinOp::Shl, ">>" => BinOp::Shr]);

	binary_level!(add_expr, mul_expr, ["+" => BinOp::Add, "-" => BinOp::Sub]);

	binary_level!(mul_expr, unary_expr, ["*" => BinOp::Mul, "/" => BinOp::Div, "%" => BinOp::Rem]);

	fn unary_expr<'s>(&self, s: &'s str) -> Result<(Expr, &'s str), String> {
		let trimmed = lexer::skip_ws(s);
		if let Some(rest) = trimmed.strip_prefix('~') {
			let (inner, rest) = self.unary_expr(rest)?;
			return Ok((Expr::Unary(UnOp::Not, Box::new(inner)), rest));
		}
		if let Some(rest) = trimmed.strip_prefix('-') {
			let (inner, rest) = self.unary_expr(rest)?;
			return Ok((Expr::Unary(UnOp::Neg, Box::new(inner)), rest));
		}
		self.atom(trimmed)
	}

	fn atom<'s>(&self, s: &'s str) -> Result<(Expr, &'s str), String> {
		let s = lexer::skip_ws(s);
		if let Some(rest) = s.strip_prefix('(') {
			let (inner, rest) = self.or_expr(rest)?;
			let rest = lexer::skip_ws(rest);
			let rest = rest.strip_prefix(')').ok_or_else(|| "expected ')'".to_string())?;
			return Ok((inner, rest));
		}
		if s.starts_with('"') {
			let (bytes, rest) = lexer::parse_string_bytes(s)?;
			return Ok((Expr::Bytes(bytes), rest));
		}
		if s.starts_with(|c: char| c.is_ascii_digit() || c == '\'') {
			let (n, rest) = lexer::parse_number(s)?;
			return Ok((Expr::Const(n.val), rest));
		}
		if s.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '.') {
			return self.identifier_atom(s);
		}
		Err(format!("unexpected input in expression: \"{}\"", first_token(s)))
	}

	fn identifier_atom<'s>(&self, s: &'s str) -> Result<(Expr, &'s str), String> {
		let (id, rest) = lexer::parse_identifier(s, self.macro_ctx)?;
		if id.namespace.is_none() {
			if let Some(args) = self.macro_args {
				if let Some(bound) = args.get(id.name.as_str()) {
					return Ok((bound.clone(), rest));
				}
			}
			if let Some(predefined) = self.predefined.lookup(&id.name) {
				return Ok((
					match predefined {
						Predefined::Register { index, csr } => Expr::Register { index, csr },
						Predefined::CurAddr => Expr::CurAddr,
					},
					rest,
				));
			}
		}
		Ok((Expr::LabelRef(id), rest))
	}
}

fn first_token(s: &str) -> &str {
	let end = s.find(char::is_whitespace).unwrap_or(s.len());
	&s[.. end.min(20)]
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::input::Files;
	use crate::symbol::{SymbolTables, define_const, define_label};
	use std::path::PathBuf;
	use std::sync::Arc;

	fn parse(s: &str) -> Expr {
		let predefined = PredefinedTable::new();
		parse_or_panic(s, &predefined)
	}

	fn parse_or_panic(s: &str, predefined: &PredefinedTable) -> Expr {
		let (expr, rest) = parse_expr(s, predefined, None, None).unwrap();
		assert!(rest.trim().is_empty(), "unconsumed input: {rest:?}");
		expr
	}

	fn eval_const(expr: &Expr) -> u16 {
		let mut files = Files::default();
		let root = files.insert_test(PathBuf::from("t.s"));
		let mut symbols = SymbolTables::new();
		let mut ctx = EvalCtx { symbols: &mut symbols, files: &files, file: root, cur_addr: 0x100, position: test_position() };
		match expr.eval(&mut ctx).unwrap() {
			Some(Value::Number(n)) => n,
			other => panic!("expected a definite number, got {other:?}"),
		}
	}

	fn test_position() -> Position {
		Position::new(Arc::new(PathBuf::from("t.s")), 1)
	}

	#[test]
	fn precedence_matches_table() {
		assert_eq!(eval_const(&parse("1 + 2 * 3")), 7);
		assert_eq!(eval_const(&parse("(1 + 2) * 3")), 9);
		assert_eq!(eval_const(&parse("1 | 2 & 3")), 3);
		assert_eq!(eval_const(&parse("4 >> 1 + 1")), 1);
	}

	#[test]
	fn unary_minus_is_twos_complement() {
		assert_eq!(eval_const(&parse("-1")), 0xFFFF);
		assert_eq!(eval_const(&parse("~0")), 0xFFFF);
	}

	#[test]
	fn division_by_zero_is_indefinite_not_an_error() {
		let expr = parse("1 / 0");
		let mut files = Files::default();
		let root = files.insert_test(PathBuf::from("t.s"));
		let mut symbols = SymbolTables::new();
		let mut ctx = EvalCtx { symbols: &mut symbols, files: &files, file: root, cur_addr: 0, position: test_position() };
		assert_eq!(expr.eval(&mut ctx).unwrap(), None);
	}

	#[test]
	fn cur_addr_reads_back_the_context_address() {
		assert_eq!(eval_const(&parse("__addr + 1")), 0x101);
	}

	#[test]
	fn freeze_cur_addr_only_replaces_cur_addr_leaves() {
		let expr = parse("__addr + foo");
		let frozen = expr.freeze_cur_addr(0x42);
		match frozen {
			Expr::Binary(BinOp::Add, lhs, rhs) => {
				assert!(matches!(*lhs, Expr::Const(0x42)));
				assert!(matches!(*rhs, Expr::LabelRef(_)));
			},
			other => panic!("unexpected shape: {other:?}"),
		}
	}

	#[test]
	fn label_reference_resolves_through_symbol_table() {
		let mut files = Files::default();
		let root = files.insert_test(PathBuf::from("t.s"));
		let mut symbols = SymbolTables::new();
		define_label(&mut symbols, root, "start", Some(0x200)).unwrap();
		let expr = parse("start + 4");
		let mut ctx = EvalCtx { symbols: &mut symbols, files: &files, file: root, cur_addr: 0, position: test_position() };
		assert_eq!(expr.eval(&mut ctx).unwrap(), Some(Value::Number(0x204)));
	}

	#[test]
	fn undefined_label_is_indefinite() {
		let mut files = Files::default();
		let root = files.insert_test(PathBuf::from("t.s"));
		let mut symbols = SymbolTables::new();
		let expr = parse("later");
		let mut ctx = EvalCtx { symbols: &mut symbols, files: &files, file: root, cur_addr: 0, position: test_position() };
		// `later` is auto-forward-declared by find_symbol, so this is `None`
		// (indefinite), not an error.
		assert_eq!(expr.eval(&mut ctx).unwrap(), None);
	}

	#[test]
	fn constant_is_reevaluated_against_the_reference_sites_address() {
		let mut files = Files::default();
		let root = files.insert_test(PathBuf::from("t.s"));
		let mut symbols = SymbolTables::new();
		define_const(&mut symbols, root, "k", Expr::CurAddr).unwrap();
		let expr = parse("k");
		let mut ctx = EvalCtx { symbols: &mut symbols, files: &files, file: root, cur_addr: 0x55, position: test_position() };
		assert_eq!(expr.eval(&mut ctx).unwrap(), Some(Value::Number(0x55)));
	}
}
