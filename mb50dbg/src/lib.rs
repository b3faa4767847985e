//! `mb50dbg` core (A2): the CDI transport, the breakpoint set, the
//! script/history tee, and the command engine that drives them from a REPL.

pub mod breakpoint;
pub mod cdi;
pub mod command;
pub mod error;
pub mod repl;
pub mod tee;

pub use breakpoint::Breakpoints;
pub use cdi::Cdi;
pub use command::{dispatch, CommandError, Session};
pub use error::{DbgError, DbgResult, FatalError};
pub use tee::Tee;
