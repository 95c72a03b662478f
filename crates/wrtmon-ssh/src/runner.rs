// ── Command execution seam ──
//
// Everything above the transport talks to routers through this trait so
// backends and facades can be exercised against scripted outputs instead
// of a live SSH server.

use crate::error::Error;

/// Result of one remote command: exit status plus captured stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Stdout with surrounding whitespace removed.
    pub fn trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Executes command strings on a remote router.
///
/// Implemented by [`SshSession`](crate::SshSession) for production and by
/// scripted doubles in tests. Takes `&mut self` because a session is an
/// exclusive, stateful resource — commands are issued strictly one at a
/// time per router.
pub trait CommandRunner {
    /// Execute `command` and return its status and stdout.
    ///
    /// A non-zero exit status is *not* an error here; the caller inspects
    /// the status and decides. Transport failures and use of a
    /// non-connected session are errors.
    fn run(&mut self, command: &str) -> Result<CommandOutput, Error>;

    /// Execute `command`, treating a non-zero exit status as
    /// [`Error::CommandFailed`]. Returns stdout on success.
    fn run_checked(&mut self, command: &str) -> Result<String, Error> {
        let output = self.run(command)?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(Error::CommandFailed {
                command: command.to_owned(),
                status: output.status,
                output: output.stdout,
            })
        }
    }
}

/// A [`CommandRunner`] with an explicit connection lifecycle.
///
/// The polling facade holds its session behind this trait: it checks
/// [`is_connected`](Transport::is_connected) before each poll and performs
/// exactly one [`reconnect`](Transport::reconnect) attempt when the
/// session dropped, without knowing anything about SSH.
pub trait Transport: CommandRunner {
    fn is_connected(&self) -> bool;

    fn connect(&mut self) -> Result<(), Error>;

    /// Tear down any existing channel and connect again.
    fn reconnect(&mut self) -> Result<(), Error>;

    /// Idempotent teardown.
    fn close(&mut self);
}
