//! Overlay network taggers.

pub mod exec;
pub mod weave;

pub use exec::{Exec, OsExec, Process};
pub use weave::Weave;
