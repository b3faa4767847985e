//! Input manager (§4.1): resolves, deduplicates, reads, and strips comments
//! from the graph of source files reachable by `$use` directives.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, trace};
use smartstring::alias::String as SmolStr;

use crate::error::{AsmError, FatalError};
use crate::lexer::{parse_identifier, parse_string_bytes};
use crate::line::strip_comment;
use crate::position::Position;

/// Stable index into [`Files`]; never invalidated once handed out, so
/// downstream components (symbol tables, the driver) can hold it by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(usize);

#[derive(Debug)]
pub struct SourceFile {
	/// The path token exactly as written at the `$use` site (or the root's
	/// command-line argument).
	pub orig_path: PathBuf,
	pub canonical: Arc<PathBuf>,
	/// Lines with comments and trailing whitespace intact.
	pub full:      Vec<String>,
	/// Lines with comments and trailing whitespace removed; indices stay
	/// aligned with `full`.
	pub stripped:  Vec<String>,
	/// Namespaces `$use`d directly from this file.
	pub namespaces: HashMap<SmolStr, FileId>,
	processed: bool,
}

impl SourceFile {
	#[must_use]
	pub fn position(&self, line: usize) -> Position {
		Position::new(self.canonical.clone(), line)
	}
}

/// The file graph produced by [`load`]. Files are never removed, so a
/// [`FileId`] remains valid and stable for the life of the program.
#[derive(Debug, Default)]
pub struct Files {
	entries: Vec<SourceFile>,
	by_path: HashMap<PathBuf, FileId>,
}

impl Files {
	#[must_use]
	pub fn get(&self, id: FileId) -> &SourceFile {
		&self.entries[id.0]
	}

	pub fn get_mut(&mut self, id: FileId) -> &mut SourceFile {
		&mut self.entries[id.0]
	}

	/// Registers a file with no backing content, for unit tests of modules
	/// that only need a `FileId` to key their own tables by.
	#[cfg(test)]
	pub fn insert_test(&mut self, path: PathBuf) -> FileId {
		self.insert(path.clone(), path).0
	}

	fn insert(&mut self, orig_path: PathBuf, canonical: PathBuf) -> (FileId, bool) {
		if let Some(&id) = self.by_path.get(&canonical) {
			return (id, false);
		}
		let id = FileId(self.entries.len());
		self.entries.push(SourceFile {
			orig_path,
			canonical: Arc::new(canonical.clone()),
			full: Vec::new(),
			stripped: Vec::new(),
			namespaces: HashMap::new(),
			processed: false,
		});
		self.by_path.insert(canonical, id);
		(id, true)
	}
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
	#[error(transparent)]
	Fatal(#[from] FatalError),
	#[error(transparent)]
	Reported(#[from] AsmError),
}

fn canonicalize(path: &Path) -> Result<PathBuf, FatalError> {
	fs::canonicalize(path)
		.map_err(|source| FatalError::Io { path: path.to_path_buf(), source })
}

/// Resolves a `$use` path argument against the directory of the importing
/// file (relative paths) or as-is (absolute paths), then canonicalises it.
fn resolve_path(from_dir: &Path, relative: &Path) -> Result<PathBuf, FatalError> {
	let joined = if relative.is_absolute() { relative.to_path_buf() } else { from_dir.join(relative) };
	canonicalize(&joined)
}

/// Loads the file graph reachable from `root_path` via `$use` directives.
///
/// # Errors
/// `InputError::Fatal` for unreadable files; `InputError::Reported` for
/// duplicate namespaces or malformed `$use` directives.
pub fn load(root_path: &Path, verbose: bool) -> Result<(Files, FileId), InputError> {
	let mut files = Files::default();
	let canonical_root = canonicalize(root_path)?;
	let (root_id, _) = files.insert(root_path.to_path_buf(), canonical_root);

	let mut stack = vec![root_id];
	while let Some(id) = stack.pop() {
		let newly_used = read_file(&mut files, id, verbose)?;
		stack.extend(newly_used.into_iter().rev());
	}
	Ok((files, root_id))
}

/// Reads one file (if not already processed), splitting it into `full` and
/// `stripped` line vectors and eagerly resolving any `$use` directives it
/// contains. Returns the `FileId`s of newly discovered files, in source
/// order.
fn read_file(files: &mut Files, id: FileId, verbose: bool) -> Result<Vec<FileId>, InputError> {
	{
		let entry = files.get_mut(id);
		if entry.processed {
			return Ok(Vec::new());
		}
		entry.processed = true;
	}
	let canonical = files.get(id).canonical.clone();
	if verbose {
		debug!("reading file \"{}\"", canonical.display());
	}
	let text = fs::read_to_string(&*canonical)
		.map_err(|source| InputError::Fatal(FatalError::Io { path: (*canonical).clone(), source }))?;

	let dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
	let mut newly_used = Vec::new();
	for (line_no, raw_line) in text.lines().enumerate() {
		let line_no = line_no + 1;
		let full_line = raw_line.trim_end().to_string();
		let stripped_line = strip_comment(&full_line);
		if let Some(new_file) = try_handle_use(files, id, line_no, &stripped_line, &dir, verbose)? {
			newly_used.push(new_file);
		}
		let entry = files.get_mut(id);
		entry.full.push(full_line);
		entry.stripped.push(stripped_line);
	}
	Ok(newly_used)
}

/// If `stripped_line` is a `$use` directive, resolves and binds it,
/// returning the `FileId` of a freshly-discovered file (`None` if the
/// namespace was already bound to an already-known file).
fn try_handle_use(
	files: &mut Files,
	from: FileId,
	line_no: usize,
	stripped_line: &str,
	from_dir: &Path,
	verbose: bool,
) -> Result<Option<FileId>, InputError> {
	let parsed = crate::line::split(stripped_line);
	if parsed.cmd.as_deref() != Some("$use") {
		return Ok(None);
	}
	let position = files.get(from).position(line_no);
	if parsed.args.len() != 2 {
		return Err(InputError::Reported(AsmError::new(position, "$use requires exactly two arguments: namespace, path")));
	}
	let (namespace_id, ns_rest) = parse_identifier(&parsed.args[0], None)
		.map_err(|msg| InputError::Reported(AsmError::new(position.clone(), msg)))?;
	if namespace_id.namespace.is_some() || !ns_rest.trim().is_empty() {
		return Err(InputError::Reported(AsmError::new(position, "$use namespace must be an unqualified identifier")));
	}
	let (path_bytes, path_rest) = parse_string_bytes(&parsed.args[1])
		.map_err(|msg| InputError::Reported(AsmError::new(position.clone(), msg)))?;
	if !path_rest.trim().is_empty() {
		return Err(InputError::Reported(AsmError::new(position, "$use path must be a single quoted string")));
	}
	if path_bytes.is_empty() {
		return Err(InputError::Reported(AsmError::new(position, "$use path must not be empty")));
	}
	let path_string = String::from_utf8(path_bytes)
		.map_err(|_| InputError::Reported(AsmError::new(position.clone(), "$use path must be ASCII")))?;

	if files.get(from).namespaces.contains_key(namespace_id.name.as_str()) {
		return Err(InputError::Reported(AsmError::new(position, format!("namespace \"{}\" already defined", namespace_id.name))));
	}

	let canonical = resolve_path(from_dir, Path::new(&path_string))?;
	let (new_id, is_new) = files.insert(PathBuf::from(&path_string), canonical.clone());
	if verbose {
		trace!("namespace \"{}\" -> \"{}\"{}", namespace_id.name, canonical.display(), if is_new { "" } else { " (already read)" });
	}
	files.get_mut(from).namespaces.insert(namespace_id.name.clone(), new_id);
	Ok(if is_new { Some(new_id) } else { None })
}

#[cfg(test)]
mod test {
	use super::*;
	use std::io::Write;

	fn write_temp(dir: &Path, name: &str, contents: &str) -> PathBuf {
		let path = dir.join(name);
		let mut f = fs::File::create(&path).unwrap();
		f.write_all(contents.as_bytes()).unwrap();
		path
	}

	#[test]
	fn use_of_same_file_under_different_namespaces_is_read_once() {
		let dir = std::env::temp_dir().join(format!("mb50as-test-{}", std::process::id()));
		fs::create_dir_all(&dir).unwrap();
		write_temp(&dir, "lib.s", "$const X, 1\n");
		write_temp(&dir, "top.s", "$use a, \"lib.s\"\n$use b, \"lib.s\"\n");
		let (files, root) = load(&dir.join("top.s"), false).unwrap();
		let root_file = files.get(root);
		assert_eq!(root_file.namespaces.len(), 2);
		let a = root_file.namespaces["a"];
		let b = root_file.namespaces["b"];
		assert_eq!(a, b, "both namespaces must resolve to the same FileId");
		fs::remove_dir_all(&dir).ok();
	}

	#[test]
	fn duplicate_namespace_in_same_file_is_an_error() {
		let dir = std::env::temp_dir().join(format!("mb50as-test-dup-{}", std::process::id()));
		fs::create_dir_all(&dir).unwrap();
		write_temp(&dir, "lib.s", "$const X, 1\n");
		write_temp(&dir, "top.s", "$use a, \"lib.s\"\n$use a, \"lib.s\"\n");
		let result = load(&dir.join("top.s"), false);
		assert!(result.is_err());
		fs::remove_dir_all(&dir).ok();
	}
}
