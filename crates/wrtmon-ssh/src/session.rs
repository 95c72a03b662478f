// ── SSH session ──
//
// Wraps `ssh2::Session` with connect/reconnect lifecycle management and
// the blocking exec-and-drain loop. All policy (when to reconnect, what
// commands to run) lives in the caller; a session only ever transitions
// Disconnected → Connected → Failed and back via explicit calls.

use std::fmt;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::runner::{CommandOutput, CommandRunner, Transport};

/// Bound on transport establishment, and on each subsequent blocking
/// libssh2 call once the session is up.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// No-op probe issued right after authentication. A session that cannot
/// run this is not worth keeping.
const VERIFY_COMMAND: &str = "hostname";

/// Connection lifecycle state.
///
/// A `Failed` session must be fully torn down and re-established via
/// [`SshSession::reconnect`]; it is never resumed in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Failed,
}

/// Everything needed to establish a session with one router.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Password auth. Ignored when `use_keys` is set.
    pub password: Option<SecretString>,
    /// Authenticate via the local SSH agent instead of a password.
    pub use_keys: bool,
    pub connect_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: username.into(),
            password: None,
            use_keys: false,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

/// One persistent command-execution channel to a router.
///
/// Owns reconnect mechanics but never reconnects on its own: any transport
/// failure flips the session to `Failed` and surfaces as
/// [`Error::Connection`], leaving the retry decision to the caller.
pub struct SshSession {
    config: SessionConfig,
    session: Option<ssh2::Session>,
    state: SessionState,
}

impl fmt::Debug for SshSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshSession")
            .field("host", &self.config.host)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SshSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            session: None,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Establish the transport, authenticate, and verify the session with
    /// a no-op probe. Replaces any existing channel.
    pub fn connect(&mut self) -> Result<(), Error> {
        self.close();

        let stream = self.open_stream()?;
        let mut session = ssh2::Session::new().map_err(|e| self.connection_error(&e))?;
        session.set_tcp_stream(stream);
        session
            .handshake()
            .map_err(|e| self.connection_error(&e))?;
        self.authenticate(&session)?;

        // Every later blocking call inherits the same bound as connect.
        session.set_timeout(timeout_ms(self.config.connect_timeout));

        self.session = Some(session);
        self.state = SessionState::Connected;

        let probe = self.run(VERIFY_COMMAND)?;
        if !probe.success() {
            self.close();
            self.state = SessionState::Failed;
            return Err(Error::Connection {
                host: self.config.host.clone(),
                reason: format!(
                    "verification probe `{VERIFY_COMMAND}` exited with status {}",
                    probe.status
                ),
            });
        }
        debug!(
            host = %self.config.host,
            hostname = probe.trimmed(),
            "session established"
        );
        Ok(())
    }

    /// Tear down any existing channel and connect again.
    pub fn reconnect(&mut self) -> Result<(), Error> {
        debug!(host = %self.config.host, "reconnecting");
        self.connect()
    }

    /// Idempotent teardown. Safe on an already-closed or never-opened
    /// session.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = session.disconnect(None, "closing", None);
        }
        self.state = SessionState::Disconnected;
    }

    fn open_stream(&self) -> Result<TcpStream, Error> {
        let addrs = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(|e| self.connection_error(&e))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => self.connection_error(&e),
            None => self.connection_error(&"address resolved to nothing"),
        })
    }

    fn authenticate(&self, session: &ssh2::Session) -> Result<(), Error> {
        let user = &self.config.username;
        let auth_failed = || Error::AuthenticationFailed { user: user.clone() };

        if self.config.use_keys {
            session.userauth_agent(user).map_err(|_| auth_failed())?;
        } else {
            let password = self.config.password.as_ref().ok_or_else(auth_failed)?;
            session
                .userauth_password(user, password.expose_secret())
                .map_err(|_| auth_failed())?;
        }
        if session.authenticated() {
            Ok(())
        } else {
            Err(auth_failed())
        }
    }

    fn connection_error(&self, reason: &dyn fmt::Display) -> Error {
        Error::Connection {
            host: self.config.host.clone(),
            reason: reason.to_string(),
        }
    }

    /// Open a channel, exec, drain stdout, and collect the exit status.
    fn exec(session: &ssh2::Session, command: &str) -> Result<CommandOutput, String> {
        let mut channel = session.channel_session().map_err(|e| e.to_string())?;
        channel.exec(command).map_err(|e| e.to_string())?;

        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .map_err(|e| e.to_string())?;
        // Drain stderr too so the channel can close cleanly; the text is
        // not interesting to callers.
        let mut stderr = String::new();
        let _ = channel.stderr().read_to_string(&mut stderr);

        channel.wait_close().map_err(|e| e.to_string())?;
        let status = channel.exit_status().map_err(|e| e.to_string())?;
        Ok(CommandOutput { status, stdout })
    }
}

impl CommandRunner for SshSession {
    fn run(&mut self, command: &str) -> Result<CommandOutput, Error> {
        if self.state != SessionState::Connected {
            return Err(Error::NotConnected);
        }
        let session = self.session.as_ref().ok_or(Error::NotConnected)?;

        trace!(command, "exec");
        match Self::exec(session, command) {
            Ok(output) => {
                trace!(command, status = output.status, "command finished");
                Ok(output)
            }
            Err(reason) => {
                // Any I/O error mid-command poisons the channel; force a
                // full reconnect before further use.
                warn!(host = %self.config.host, command, %reason, "session failed");
                self.session = None;
                self.state = SessionState::Failed;
                Err(Error::Connection {
                    host: self.config.host.clone(),
                    reason,
                })
            }
        }
    }
}

impl Transport for SshSession {
    fn is_connected(&self) -> bool {
        Self::is_connected(self)
    }

    fn connect(&mut self) -> Result<(), Error> {
        Self::connect(self)
    }

    fn reconnect(&mut self) -> Result<(), Error> {
        Self::reconnect(self)
    }

    fn close(&mut self) {
        Self::close(self);
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn timeout_ms(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}
