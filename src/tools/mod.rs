//! tools
//!
//! Shared plumbing for driving external command-line tools.

pub mod exec;

pub use exec::{run_capture, run_streamed, ExecError, ExecOutput};
