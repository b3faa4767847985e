//! Symbol tables (§4.4, §3): per-file local tables, a derived global table,
//! and the predefined table for registers and `__addr`.

use std::collections::HashMap;
use std::ops::Range;

use smartstring::alias::String as SmolStr;

use crate::expr::Expr;
use crate::input::{FileId, Files};
use crate::lexer::Identifier;

/// A label, constant (var), or macro, identified by name within a file and
/// optionally promoted to the global scope (§3).
#[derive(Debug, Clone)]
pub enum Symbol {
	/// A label: `address` is `None` until defined; `fixed` becomes `true`
	/// once the label has been *observed* as a global reference, after
	/// which its address may not be changed to something else.
	Label { address: Option<u16>, fixed: bool },
	/// A constant. The expression is re-evaluated on every use because it
	/// may reference `__addr`.
	Var { expr: Expr, home_file: FileId },
	/// A macro, whose body is kept as spans into the defining file's line
	/// vectors so it stays readable for the whole run (§9).
	Macro {
		params:        Vec<SmolStr>,
		home_file:     FileId,
		full_span:     Range<usize>,
		stripped_span: Range<usize>,
		order:         u64,
	},
}

/// The global table's per-name state, derived from what the local tables
/// say (§3, §9 "cross-file symbol ambiguity").
#[derive(Debug, Clone)]
pub enum GlobalEntry {
	/// A label known globally. `home` is the file whose local table is
	/// authoritative (`None` for a pure forward declaration created by a
	/// `.name` reference before any file has defined the label).
	Label { home: Option<FileId>, address: Option<u16>, fixed: bool },
	/// A constant or macro, defined in exactly one file so far.
	NonLabel { home: FileId },
	/// Two files defined this name incompatibly; looking it up from
	/// outside its defining file is now an error.
	Ambiguous,
}

/// What a register-or-`__addr` predefined name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predefined {
	Register { index: u8, csr: bool },
	CurAddr,
}

/// The fixed table of registers, CSRs, their aliases, and `__addr`. These
/// names shadow all user definitions.
#[derive(Debug, Clone)]
pub struct PredefinedTable {
	map: HashMap<SmolStr, Predefined>,
}

impl Default for PredefinedTable {
	fn default() -> Self {
		Self::new()
	}
}

impl PredefinedTable {
	#[must_use]
	pub fn new() -> Self {
		let mut map = HashMap::new();
		for i in 0u8 .. 16 {
			map.insert(SmolStr::from(format!("r{i}")), Predefined::Register { index: i, csr: false });
			map.insert(SmolStr::from(format!("csr{i}")), Predefined::Register { index: i, csr: true });
		}
		for (alias, index) in [("sp", 11u8), ("ca", 12), ("ia", 13), ("f", 14), ("pc", 15)] {
			map.insert(SmolStr::from(alias), Predefined::Register { index, csr: false });
		}
		map.insert(SmolStr::from("__addr"), Predefined::CurAddr);
		Self { map }
	}

	#[must_use]
	pub fn lookup(&self, name: &str) -> Option<Predefined> {
		self.map.get(name).copied()
	}

	#[must_use]
	pub fn contains(&self, name: &str) -> bool {
		self.map.contains_key(name)
	}
}

/// Result of [`find_symbol`], distinguishing "never defined" from
/// "defined more than once and therefore unusable from outside its file".
#[derive(Debug, Clone)]
pub enum Lookup {
	Found(Symbol),
	Ambiguous,
	NotFound,
}

/// All symbol state for one assembly run: the predefined table, every
/// file's local table, and the derived global table.
#[derive(Debug, Default)]
pub struct SymbolTables {
	pub predefined: PredefinedTable,
	locals:         HashMap<FileId, HashMap<SmolStr, Symbol>>,
	globals:        HashMap<SmolStr, GlobalEntry>,
}

impl SymbolTables {
	#[must_use]
	pub fn new() -> Self {
		Self { predefined: PredefinedTable::new(), locals: HashMap::new(), globals: HashMap::new() }
	}

	#[must_use]
	pub fn local(&self, file: FileId, name: &str) -> Option<&Symbol> {
		self.locals.get(&file).and_then(|table| table.get(name))
	}

	/// Every name with no address anywhere (local or global), for the
	/// end-of-phase-1 undefined-label check (§4.5). `None` as the file
	/// means the name was only ever referenced via `.name` and never
	/// defined in any file.
	#[must_use]
	pub fn undefined_labels(&self) -> Vec<(Option<FileId>, SmolStr)> {
		let mut out = Vec::new();
		for (&file, table) in &self.locals {
			for (name, symbol) in table {
				if let Symbol::Label { address: None, .. } = symbol {
					out.push((Some(file), name.clone()));
				}
			}
		}
		for (name, entry) in &self.globals {
			if let GlobalEntry::Label { home: None, address: None, .. } = entry {
				out.push((None, name.clone()));
			}
		}
		out
	}
}

fn publish_non_label(tables: &mut SymbolTables, file: FileId, name: &str) {
	match tables.globals.get(name) {
		None => {
			tables.globals.insert(name.into(), GlobalEntry::NonLabel { home: file });
		},
		Some(GlobalEntry::Ambiguous) => {},
		_ => {
			tables.globals.insert(name.into(), GlobalEntry::Ambiguous);
		},
	}
}

/// Defines a constant. Fails if the name is predefined or already defined
/// in `file`; publishes globally, marking the name ambiguous if another
/// file already defined it.
pub fn define_const(tables: &mut SymbolTables, file: FileId, name: &str, expr: Expr) -> Result<(), String> {
	if tables.predefined.contains(name) {
		return Err(format!("\"{name}\" is a predefined name and cannot be redefined"));
	}
	let local = tables.locals.entry(file).or_default();
	if local.contains_key(name) {
		return Err(format!("\"{name}\" is already defined in this file"));
	}
	local.insert(name.into(), Symbol::Var { expr, home_file: file });
	publish_non_label(tables, file, name);
	Ok(())
}

/// Defines a macro. Fails on predefined-name collision, opcode-mnemonic
/// collision (checked by the caller, which knows the opcode table), or
/// local redefinition; publishes globally like [`define_const`].
pub fn define_macro(
	tables: &mut SymbolTables,
	file: FileId,
	name: &str,
	params: Vec<SmolStr>,
	full_span: Range<usize>,
	stripped_span: Range<usize>,
	order: u64,
) -> Result<(), String> {
	if tables.predefined.contains(name) {
		return Err(format!("\"{name}\" is a predefined name and cannot be redefined"));
	}
	let local = tables.locals.entry(file).or_default();
	if local.contains_key(name) {
		return Err(format!("\"{name}\" is already defined in this file"));
	}
	local.insert(name.into(), Symbol::Macro { params, home_file: file, full_span, stripped_span, order });
	publish_non_label(tables, file, name);
	Ok(())
}

/// Defines (or re-declares) a label in `file`. `addr` is `None` for a bare
/// declaration. Redefinition with the same address is idempotent;
/// redefinition with a different address fails once the label has been
/// observed as a global reference, and otherwise demotes the name to
/// globally ambiguous.
pub fn define_label(tables: &mut SymbolTables, file: FileId, name: &str, addr: Option<u16>) -> Result<(), String> {
	if tables.predefined.contains(name) {
		return Err(format!("\"{name}\" is a predefined name and cannot be redefined"));
	}
	let local = tables.locals.entry(file).or_default();
	let fixed = match local.get(name) {
		Some(Symbol::Label { address: Some(existing), fixed }) => {
			if let Some(new_addr) = addr {
				if *existing != new_addr {
					if *fixed {
						return Err(format!(
							"label \"{name}\" redefined at a different address after being referenced globally"
						));
					}
				}
			}
			*fixed
		},
		Some(Symbol::Label { address: None, fixed }) => *fixed,
		Some(_) => return Err(format!("\"{name}\" is already defined as something other than a label in this file")),
		None => false,
	};
	local.insert(name.into(), Symbol::Label { address: addr, fixed });
	reconcile_global_label(tables, file, name, addr, fixed)?;
	Ok(())
}

fn reconcile_global_label(
	tables: &mut SymbolTables,
	file: FileId,
	name: &str,
	addr: Option<u16>,
	fixed: bool,
) -> Result<(), String> {
	match tables.globals.get(name).cloned() {
		None => {
			tables.globals.insert(name.into(), GlobalEntry::Label { home: Some(file), address: addr, fixed });
		},
		Some(GlobalEntry::Label { home, address: g_addr, fixed: g_fixed }) => {
			let merged_fixed = fixed || g_fixed;
			if home == Some(file) || home.is_none() {
				tables.globals.insert(name.into(), GlobalEntry::Label { home: Some(file), address: addr.or(g_addr), fixed: merged_fixed });
			} else {
				match (g_addr, addr) {
					(Some(a), Some(b)) if a == b =>
						tables.globals.insert(name.into(), GlobalEntry::Label { home, address: Some(b), fixed: merged_fixed }),
					_ if merged_fixed && g_addr.is_some() && addr.is_some() && g_addr != addr =>
						return Err(format!(
							"label \"{name}\" redefined at a different address after being referenced globally"
						)),
					_ => tables.globals.insert(name.into(), GlobalEntry::Ambiguous),
				};
			}
		},
		Some(GlobalEntry::NonLabel { .. }) => {
			tables.globals.insert(name.into(), GlobalEntry::Ambiguous);
		},
		Some(GlobalEntry::Ambiguous) => {},
	}
	Ok(())
}

/// Marks a label as `fixed` (observed as a global reference), in both its
/// owning file's local table and the global table.
fn mark_fixed(tables: &mut SymbolTables, file: FileId, name: &str) {
	if let Some(Symbol::Label { fixed, .. }) = tables.locals.entry(file).or_default().get_mut(name) {
		*fixed = true;
	}
	if let Some(GlobalEntry::Label { fixed, .. }) = tables.globals.get_mut(name) {
		*fixed = true;
	}
}

/// Looks up an identifier per §4.4: bareword in the local table of `file`;
/// `.name` in the global table (creating a forward-declared global label if
/// absent and `def_as_label`); `ns.name` in the file that `ns` resolves to.
/// Any successful resolution to a [`Symbol::Label`] marks it `fixed`.
pub fn find_symbol(
	tables: &mut SymbolTables,
	files: &Files,
	file: FileId,
	id: &Identifier,
	def_as_label: bool,
) -> Result<Lookup, String> {
	match &id.namespace {
		None => match tables.local(file, &id.name) {
			Some(sym) => Ok(Lookup::Found(sym.clone())),
			None if def_as_label => {
				let local = tables.locals.entry(file).or_default();
				local.insert(id.name.clone(), Symbol::Label { address: None, fixed: false });
				Ok(Lookup::Found(Symbol::Label { address: None, fixed: false }))
			},
			None => Ok(Lookup::NotFound),
		},
		Some(ns) if ns.is_empty() => find_global(tables, &id.name, def_as_label),
		Some(ns) => {
			let target = files
				.get(file)
				.namespaces
				.get(ns.as_str())
				.copied()
				.ok_or_else(|| format!("namespace \"{ns}\" is not used in this file"))?;
			match tables.local(target, &id.name).cloned() {
				Some(Symbol::Label { address, .. }) => {
					mark_fixed(tables, target, &id.name);
					Ok(Lookup::Found(Symbol::Label { address, fixed: true }))
				},
				Some(other) => Ok(Lookup::Found(other)),
				None => Ok(Lookup::NotFound),
			}
		},
	}
}

fn find_global(tables: &mut SymbolTables, name: &str, def_as_label: bool) -> Result<Lookup, String> {
	match tables.globals.get(name).cloned() {
		Some(GlobalEntry::Ambiguous) => Ok(Lookup::Ambiguous),
		Some(GlobalEntry::NonLabel { home }) => Ok(tables.local(home, name).cloned().map_or(Lookup::NotFound, Lookup::Found)),
		Some(GlobalEntry::Label { home, address, .. }) => {
			tables.globals.insert(name.into(), GlobalEntry::Label { home, address, fixed: true });
			if let Some(home) = home {
				mark_fixed(tables, home, name);
			}
			Ok(Lookup::Found(Symbol::Label { address, fixed: true }))
		},
		None =>
			if def_as_label {
				tables.globals.insert(name.into(), GlobalEntry::Label { home: None, address: None, fixed: true });
				Ok(Lookup::Found(Symbol::Label { address: None, fixed: true }))
			} else {
				Ok(Lookup::NotFound)
			},
	}
}
