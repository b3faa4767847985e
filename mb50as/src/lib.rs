//! MB50 assembler core (A1): the two-phase translator from a multi-file
//! source program into a 64 KiB output image plus a listing. See the
//! module-level docs of each submodule for the corresponding part of the
//! design.

pub mod driver;
pub mod error;
pub mod expr;
pub mod input;
pub mod lexer;
pub mod line;
pub mod opcodes;
pub mod position;
pub mod symbol;

pub use driver::{Driver, DriverError};
pub use error::{AsmError, AsmResult, FatalError};
pub use input::{load, FileId, Files, InputError};

#[cfg(test)]
mod test;
