use thiserror::Error;

/// Top-level error type for the `wrtmon-ssh` crate.
///
/// Covers the full lifecycle of a remote session: establishing the
/// transport, authenticating, and executing commands. `wrtmon-core` maps
/// these into per-router diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// The SSH channel could not be established or died mid-command
    /// (unreachable host, DNS failure, handshake error, broken pipe).
    #[error("Connection to {host} failed: {reason}")]
    Connection { host: String, reason: String },

    /// The router rejected the configured credentials.
    #[error("Authentication failed for user {user}")]
    AuthenticationFailed { user: String },

    // ── Usage ───────────────────────────────────────────────────────
    /// A command was issued on a session that is not in the Connected
    /// state. The session never reconnects transparently; the caller owns
    /// that decision.
    #[error("Session is not connected")]
    NotConnected,

    // ── Remote command ──────────────────────────────────────────────
    /// The remote command ran but returned a non-zero exit status.
    #[error("Command `{command}` exited with status {status}")]
    CommandFailed {
        command: String,
        status: i32,
        output: String,
    },
}

impl Error {
    /// Returns `true` if this error means the underlying transport is gone
    /// and the session must be torn down and re-established.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::NotConnected)
    }
}
