//! Crate-level end-to-end tests: whole programs in, whole output files out.
//! Per-module unit tests live next to their module; this file exercises the
//! cross-cutting properties of §8 that only make sense over a full run.

use std::fs;
use std::path::{Path, PathBuf};

use mb50_image::decode_bin;

fn temp_dir(tag: &str) -> PathBuf {
	use std::hash::{Hash, Hasher};
	let mut hasher = std::collections::hash_map::DefaultHasher::new();
	std::thread::current().id().hash(&mut hasher);
	let dir = std::env::temp_dir().join(format!("mb50as-test-{tag}-{}", hasher.finish()));
	fs::create_dir_all(&dir).unwrap();
	dir
}

fn write_temp(dir: &Path, name: &str, contents: &str) -> PathBuf {
	let path = dir.join(name);
	fs::write(&path, contents).unwrap();
	path
}

fn assemble_to_files(dir: &Path, name: &str, contents: &str) -> PathBuf {
	let path = write_temp(dir, name, contents);
	let (files, root) = crate::load(&path, false).unwrap();
	let mut driver = crate::Driver::new(files, false);
	driver.run(root).unwrap();
	mb50_image::write_outputs(driver.image(), &path).unwrap()
}

/// Property 2: every `$data_b`/`$data_w`/instruction listing line's bytes
/// equal the `.bin` bytes at the same offsets.
#[test]
fn listing_bytes_match_bin_bytes() {
	let dir = temp_dir("listing-consistency");
	let path = write_temp(&dir, "t.s", "$addr 0x0010\n$data_b 0x01, 0x02\nstart: add r1, r2\n$data_w 0xbeef\n");
	let (files, root) = crate::load(&path, false).unwrap();
	let mut driver = crate::Driver::new(files, false);
	driver.run(root).unwrap();
	let image = driver.image();
	let (bin_start, _) = image.window();
	let bin_bytes = image.window_bytes();

	let mut any_checked = false;
	for line in image.listing() {
		let Some((addr, bytes)) = &line.bytes else { continue };
		let offset = (*addr - bin_start as u16) as usize;
		assert_eq!(&bin_bytes[offset .. offset + bytes.len()], bytes.as_slice(), "listing line {:?} disagrees with .bin", line.text);
		any_checked = true;
	}
	assert!(any_checked, "expected at least one bytes-bearing listing line");
	fs::remove_dir_all(&dir).ok();
}

/// Property 3: a forward reference resolved in phase 2 produces the same
/// bytes as the same value written directly, once the defining constant is
/// known up front.
#[test]
fn phase2_patch_matches_direct_encoding() {
	let dir = temp_dir("phase2-equivalence");

	let forward_ref = assemble_to_files(&dir, "forward.s", "$addr 0x0000\n       $data_w target\ntarget: $data_b 0xab\n");
	let direct = assemble_to_files(&dir, "direct.s", "$addr 0x0000\n       $data_w 0x0002\n$data_b 0xab\n");

	let forward_bin = fs::read(forward_ref.with_extension("bin")).unwrap();
	let direct_bin = fs::read(direct.with_extension("bin")).unwrap();
	assert_eq!(forward_bin, direct_bin, "phase-2 patched output must match the equivalent direct encoding");

	fs::remove_dir_all(&dir).ok();
}

/// Property 1: two namespaces aliasing the same canonical path converge on
/// one symbol table, observable end-to-end through the assembled image.
#[test]
fn use_idempotence_converges_to_one_table() {
	let dir = temp_dir("use-idempotence");
	write_temp(&dir, "lib.s", "$const X, 0x2a\n");
	let top = write_temp(&dir, "top.s", "$use a, \"lib.s\"\n$use b, \"lib.s\"\n$addr 0x0000\n$data_b a.X\n$data_b b.X\n");
	let (files, root) = crate::load(&top, false).unwrap();
	let mut driver = crate::Driver::new(files, false);
	driver.run(root).unwrap();
	assert_eq!(driver.image().window_bytes(), &[0x2a, 0x2a]);
	fs::remove_dir_all(&dir).ok();
}

/// End-to-end E1: the exact worked example in §6, checked through the real
/// `.bin` file rather than the in-memory image, so the file format itself is
/// exercised too.
#[test]
fn e1_bin_file_matches_worked_example() {
	let dir = temp_dir("e1-bin-file");
	let base = assemble_to_files(&dir, "e1.s", "$addr 0x0100\nstart: add r1, r2\n       mv pc, r15\n");
	let bin = fs::read(base.with_extension("bin")).unwrap();
	let (start, payload) = decode_bin(&bin).unwrap();
	assert_eq!(start, 0x0100);
	assert_eq!(payload[0 .. 2], [0x01, 0x12]);
	assert_eq!(payload[3], 0xff);
	fs::remove_dir_all(&dir).ok();
}

/// `.mif` and `.out` are written alongside `.bin` for every successful run.
#[test]
fn write_outputs_emits_all_three_files() {
	let dir = temp_dir("write-outputs");
	let base = assemble_to_files(&dir, "three.s", "$addr 0x0000\n$data_b 0xaa\n");
	assert!(base.with_extension("bin").exists());
	assert!(base.with_extension("mif").exists());
	assert!(base.with_extension("out").exists());
	let out = fs::read_to_string(base.with_extension("out")).unwrap();
	assert!(out.contains("$data_b"));
	fs::remove_dir_all(&dir).ok();
}
