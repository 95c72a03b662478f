// Scripted stand-in for an SSH session. Commands not in the script exit
// 127, which conveniently behaves like a missing binary in probes.

use std::collections::{HashMap, VecDeque};

use wrtmon_ssh::{CommandOutput, CommandRunner, Error, Transport};

pub struct FakeRunner {
    responses: HashMap<String, VecDeque<CommandOutput>>,
    pub calls: Vec<String>,
    connected: bool,
    failing_connects: usize,
    pub connect_attempts: usize,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            calls: Vec::new(),
            connected: true,
            failing_connects: 0,
            connect_attempts: 0,
        }
    }

    /// Script a response. Repeated calls for the same command are served
    /// in order; the last scripted response repeats forever.
    pub fn on(mut self, command: &str, status: i32, stdout: &str) -> Self {
        self.responses
            .entry(command.to_owned())
            .or_default()
            .push_back(CommandOutput {
                status,
                stdout: stdout.to_owned(),
            });
        self
    }

    /// Start in the disconnected state.
    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    /// Make the next `n` connect attempts fail.
    pub fn failing_connects(mut self, n: usize) -> Self {
        self.failing_connects = n;
        self
    }

    pub fn call_count(&self, command: &str) -> usize {
        self.calls.iter().filter(|c| *c == command).count()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&mut self, command: &str) -> Result<CommandOutput, Error> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.calls.push(command.to_owned());
        let Some(queue) = self.responses.get_mut(command) else {
            return Ok(CommandOutput {
                status: 127,
                stdout: String::new(),
            });
        };
        if queue.len() > 1 {
            Ok(queue.pop_front().unwrap_or(CommandOutput {
                status: 127,
                stdout: String::new(),
            }))
        } else {
            Ok(queue.front().cloned().unwrap_or(CommandOutput {
                status: 127,
                stdout: String::new(),
            }))
        }
    }
}

impl Transport for FakeRunner {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<(), Error> {
        self.connect_attempts += 1;
        if self.failing_connects > 0 {
            self.failing_connects -= 1;
            return Err(Error::Connection {
                host: "fake".into(),
                reason: "scripted connect failure".into(),
            });
        }
        self.connected = true;
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), Error> {
        self.connected = false;
        self.connect()
    }

    fn close(&mut self) {
        self.connected = false;
    }
}
