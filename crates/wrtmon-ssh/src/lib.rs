//! Blocking SSH command execution for router CLI scraping.
//!
//! This crate owns exactly one concern: run a command string on a remote
//! router and hand back its exit status and stdout as text. Everything on
//! top of that (capability probing, output parsing, polling) lives in
//! `wrtmon-core`, which talks to this crate exclusively through the
//! [`CommandRunner`] trait so it can be driven by scripted doubles in tests.
//!
//! Sessions are deliberately synchronous. A router is polled one command at
//! a time over a single persistent channel, and the only suspension point
//! in the whole system is the network I/O here, so an async runtime would
//! buy nothing at this layer.

pub mod error;
pub mod runner;
pub mod session;

pub use error::Error;
pub use runner::{CommandOutput, CommandRunner, Transport};
pub use session::{SessionConfig, SessionState, SshSession};
