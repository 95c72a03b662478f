// ── Core error types ──
//
// Per-router failures from probing and polling. These never cross router
// boundaries: the fleet logs them and either excludes the router (probing)
// or degrades it for one cycle (polling). The `From<wrtmon_ssh::Error>`
// impl translates transport errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Connection failed: {reason}")]
    Connection { reason: String },

    #[error("Session is not connected")]
    NotConnected,

    // ── Remote commands ──────────────────────────────────────────────
    #[error("Command `{command}` exited with status {status}")]
    CommandFailed { command: String, status: i32 },

    /// None of the diagnostic binaries this backend depends on exist on
    /// the device. Fatal to this router's probing.
    #[error("None of the expected commands exist on the device: {}", tried.join(", "))]
    MissingCommand { tried: Vec<String> },

    // ── Probing ──────────────────────────────────────────────────────
    #[error("Capability probing failed: {message}")]
    Probe { message: String },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Malformed command output: {message}")]
    Parse { message: String },
}

impl CoreError {
    /// Returns `true` if the underlying session is gone and the next poll
    /// must reconnect before issuing commands.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::NotConnected)
    }
}

impl From<wrtmon_ssh::Error> for CoreError {
    fn from(err: wrtmon_ssh::Error) -> Self {
        match err {
            wrtmon_ssh::Error::Connection { host, reason } => CoreError::Connection {
                reason: format!("{host}: {reason}"),
            },
            wrtmon_ssh::Error::AuthenticationFailed { user } => CoreError::Connection {
                reason: format!("authentication failed for user {user}"),
            },
            wrtmon_ssh::Error::NotConnected => CoreError::NotConnected,
            wrtmon_ssh::Error::CommandFailed {
                command, status, ..
            } => CoreError::CommandFailed { command, status },
        }
    }
}
