//! Process execution
//!
//! [`CommandRunner`] is the seam between the adapter and the operating system.
//! [`SystemRunner`] spawns real processes, captures standard output up to a
//! byte bound and enforces a wall-clock timeout.

use super::command::CommandLine;
use crate::config::{InvocationMode, ToolsConfig};
use crate::error::ExecutionError;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Node-style default capture bound (1 MiB)
pub const DEFAULT_MAX_OUTPUT: usize = 1024 * 1024;

/// Bytes of stderr kept for error messages
const STDERR_LIMIT: usize = 64 * 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Resource limits for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecLimits {
    /// Maximum captured stdout, in bytes
    pub max_output: usize,
    /// Wall-clock limit; `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            max_output: DEFAULT_MAX_OUTPUT,
            timeout: None,
        }
    }
}

/// Runs a command line to completion and returns its stdout
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &CommandLine, limits: &ExecLimits) -> Result<String, ExecutionError>;
}

/// Runner backed by `std::process`
#[derive(Debug, Clone)]
pub struct SystemRunner {
    mode: InvocationMode,
    shell: String,
    working_dir: Option<PathBuf>,
}

impl SystemRunner {
    #[cfg(test)]
    pub fn new(mode: InvocationMode) -> Self {
        Self {
            mode,
            shell: "sh".to_string(),
            working_dir: None,
        }
    }

    pub fn from_config(config: &ToolsConfig) -> Self {
        Self {
            mode: config.invocation,
            shell: config.shell.clone(),
            working_dir: config.working_dir.clone(),
        }
    }

    #[cfg(test)]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn build(&self, command: &CommandLine) -> Command {
        let mut cmd = match self.mode {
            InvocationMode::Argv => {
                let mut c = Command::new(command.program());
                c.args(command.argv());
                c
            }
            InvocationMode::Shell => {
                let mut c = Command::new(&self.shell);
                c.arg("-c").arg(command.render());
                c
            }
        };

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        // Own process group, so a kill also reaches anything the tool forks.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

/// What a reader thread hands back once its pipe is done
enum Captured {
    /// `None` when the output bound was exceeded
    Stdout(io::Result<Option<Vec<u8>>>),
    Stderr(Vec<u8>),
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandLine, limits: &ExecLimits) -> Result<String, ExecutionError> {
        debug!("Running ({:?}): {}", self.mode, command);

        let mut child = self.build(command).spawn().map_err(|e| {
            ExecutionError::Spawn(format!("failed to start {}: {}", command.program(), e))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::Io("failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutionError::Io("failed to capture stderr".to_string()))?;

        // Readers are left detached on the early-return paths; killing the
        // process group closes their pipes.
        let (tx, rx) = mpsc::channel();
        {
            let tx = tx.clone();
            let limit = limits.max_output;
            thread::spawn(move || {
                let _ = tx.send(Captured::Stdout(read_bounded(stdout, limit)));
            });
        }
        thread::spawn(move || {
            let _ = tx.send(Captured::Stderr(read_prefix(stderr, STDERR_LIMIT)));
        });

        let (status, stdout, stderr) = match wait_for_completion(&mut child, &rx, limits.timeout) {
            Ok(done) => done,
            Err(stop) => {
                terminate(&mut child);
                return Err(match stop {
                    Stop::Overflowed => {
                        warn!("{} exceeded {} bytes of output", command.program(), limits.max_output);
                        ExecutionError::OutputTooLarge {
                            limit: limits.max_output,
                        }
                    }
                    Stop::TimedOut(after) => {
                        warn!("{} timed out after {:?}", command.program(), after);
                        ExecutionError::Timeout(after)
                    }
                    Stop::Failed(e) => e,
                });
            }
        };

        if status.success() {
            return Ok(String::from_utf8_lossy(&stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&stderr);
        let detail = stderr.trim();
        let detail = if !detail.is_empty() {
            detail.to_string()
        } else {
            match status.code() {
                Some(code) => format!("{} exited with status {}", command.program(), code),
                None => format!("{} terminated by signal", command.program()),
            }
        };

        Err(ExecutionError::Failed(detail))
    }
}

/// Why an invocation stopped before it completed
enum Stop {
    Overflowed,
    TimedOut(Duration),
    Failed(ExecutionError),
}

/// Wait until the child has exited and both pipes are drained, all within
/// the deadline.
fn wait_for_completion(
    child: &mut Child,
    rx: &mpsc::Receiver<Captured>,
    timeout: Option<Duration>,
) -> Result<(ExitStatus, Vec<u8>, Vec<u8>), Stop> {
    let deadline = timeout.map(|limit| (Instant::now() + limit, limit));
    let mut status = None;
    let mut stdout = None;
    let mut stderr = None;

    loop {
        if status.is_none() {
            status = child.try_wait().map_err(|e| {
                Stop::Failed(ExecutionError::Io(format!("failed to wait for process: {}", e)))
            })?;
        }

        if let Some(status) = status {
            if stdout.is_some() && stderr.is_some() {
                return Ok((
                    status,
                    stdout.take().unwrap_or_default(),
                    stderr.take().unwrap_or_default(),
                ));
            }
        }

        let mut wait = POLL_INTERVAL;
        if let Some((at, limit)) = deadline {
            let now = Instant::now();
            if now >= at {
                return Err(Stop::TimedOut(limit));
            }
            wait = wait.min(at - now);
        }

        if stdout.is_some() && stderr.is_some() {
            thread::sleep(wait);
            continue;
        }

        match rx.recv_timeout(wait) {
            Ok(Captured::Stdout(Ok(Some(buf)))) => stdout = Some(buf),
            Ok(Captured::Stdout(Ok(None))) => return Err(Stop::Overflowed),
            Ok(Captured::Stdout(Err(e))) => {
                return Err(Stop::Failed(ExecutionError::Io(format!("failed to read stdout: {}", e))))
            }
            Ok(Captured::Stderr(buf)) => stderr = Some(buf),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Stop::Failed(ExecutionError::Io("output reader stopped".to_string())))
            }
        }
    }
}

/// Kill the child's whole process group and reap the child
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
            debug!("killpg failed: {}", e);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Read everything, or `None` once more than `limit` bytes arrive
fn read_bounded<R: Read>(mut reader: R, limit: usize) -> io::Result<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => return Ok(Some(buf)),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        if buf.len() + n > limit {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Drain the reader, keeping at most `limit` bytes
fn read_prefix<R: Read>(mut reader: R, limit: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }

    buf
}

/// Canned runner that records every command it is asked to run
#[cfg(test)]
pub struct ScriptedRunner {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, ExecutionError>>>,
    calls: std::sync::Mutex<Vec<(CommandLine, ExecLimits)>>,
}

#[cfg(test)]
impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            responses: std::sync::Mutex::new(Default::default()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn respond(self, response: Result<String, ExecutionError>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<(CommandLine, ExecLimits)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn rendered(&self) -> Vec<String> {
        self.calls().iter().map(|(c, _)| c.render()).collect()
    }
}

#[cfg(test)]
impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &CommandLine, limits: &ExecLimits) -> Result<String, ExecutionError> {
        self.calls
            .lock()
            .unwrap()
            .push((command.clone(), limits.clone()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}
