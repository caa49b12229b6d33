//! Spawning the underlying program and streaming its output.

use std::ffi::{OsStr, OsString};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::OnceLock;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::env_file::EnvOverrides;
use crate::exit_codes;

/// A fully resolved program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build a `Command` with `overrides` layered over the inherited
    /// environment and `PATH` pinned to `search_path` when given.
    pub fn command(&self, overrides: &EnvOverrides, search_path: Option<&OsStr>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(overrides.iter());
        if let Some(path) = search_path {
            cmd.env("PATH", path);
        }
        cmd
    }
}

/// Final state of a program that was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    pub exit_code: i32,
    pub timed_out: bool,
}

/// Result of trying to run an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    /// The program ran to completion (or was killed on timeout).
    Completed(RunStatus),
    /// The program could not be spawned; nothing ran.
    NotStarted { reason: String },
}

/// How long to keep forwarding output after a timeout kill before giving up
/// on pipes still held open by descendants that escaped the process group.
const DRAIN_GRACE: Duration = Duration::from_millis(500);
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Run `cmd`, copying its stdout and stderr line by line into `out`.
///
/// Both pipes are drained concurrently so a chatty child cannot deadlock.
/// Each line is flushed as soon as it is read. With a `timeout`, the child's
/// process group is killed once the limit passes, and output forwarding stops
/// after [`DRAIN_GRACE`] even if a surviving descendant keeps a pipe open.
///
/// The first error writing to `out` is returned once the child has finished;
/// the pipes keep draining in the meantime so the child never blocks.
#[instrument(skip_all, fields(program = ?cmd.get_program(), timeout = ?timeout))]
pub fn run_streaming(
    mut cmd: Command,
    out: &mut (dyn Write + Send),
    timeout: Option<Duration>,
) -> Result<Execution> {
    cmd.stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    if timeout.is_some() {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!(err = %err, "failed to spawn command");
            return Ok(Execution::NotStarted {
                reason: format!("spawn {}: {err}", cmd.get_program().to_string_lossy()),
            });
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let (tx, rx) = mpsc::channel();
    let readers = [
        spawn_reader(stdout, tx.clone()),
        spawn_reader(stderr, tx),
    ];

    let drain_deadline = OnceLock::new();
    let (waited, forwarded) = thread::scope(|scope| {
        let deadline = &drain_deadline;
        let writer = scope.spawn(move || forward_lines(rx, out, deadline));

        let waited = wait_child(&mut child, timeout);
        if !matches!(waited, Ok((_, false))) {
            let _ = drain_deadline.set(Instant::now() + DRAIN_GRACE);
        }
        let forwarded = writer
            .join()
            .unwrap_or_else(|_| Err(anyhow!("output writer thread panicked")));
        (waited, forwarded)
    });

    let (status, timed_out) = waited?;
    let drained = forwarded.context("write child output")?;
    if drained {
        for reader in readers {
            join_reader(reader).context("read child output")?;
        }
    } else {
        warn!("output pipes still open after kill; abandoning readers");
    }

    let exit_code = if timed_out {
        exit_codes::TIMED_OUT
    } else {
        exit_code(status)
    };
    debug!(exit_code, timed_out, "command finished");
    Ok(Execution::Completed(RunStatus {
        exit_code,
        timed_out,
    }))
}

/// Map an exit status to a shell-style exit code (`128 + signal` on Unix).
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    exit_codes::INTERNAL
}

/// Wait for `child`, killing it (and its process group) after `timeout`.
///
/// Returns the exit status and whether the timeout fired.
fn wait_child(child: &mut Child, timeout: Option<Duration>) -> Result<(ExitStatus, bool)> {
    let Some(limit) = timeout else {
        return Ok((child.wait().context("wait for command")?, false));
    };
    if let Some(status) = child.wait_timeout(limit).context("wait for command")? {
        return Ok((status, false));
    }
    warn!(timeout_secs = limit.as_secs(), "command timed out, killing");
    kill_process_group(child.id());
    child.kill().context("kill command")?;
    let status = child.wait().context("wait command after kill")?;
    Ok((status, true))
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        warn!(pid, "pid out of range for process group kill");
        return;
    };
    if let Err(err) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        warn!(err = %err, pid, "failed to kill process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

fn join_reader(handle: thread::JoinHandle<Result<()>>) -> Result<()> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Read `reader` line by line into `tx` until EOF or the receiver is gone.
fn spawn_reader<R: Read + Send + 'static>(
    reader: R,
    tx: Sender<Vec<u8>>,
) -> thread::JoinHandle<Result<()>> {
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        loop {
            let mut line = Vec::new();
            let n = reader.read_until(b'\n', &mut line).context("read line")?;
            if n == 0 || tx.send(line).is_err() {
                return Ok(());
            }
        }
    })
}

/// Write received lines to `out` until every reader has hit EOF.
///
/// Returns `Ok(true)` when all output was drained and `Ok(false)` when
/// forwarding stopped at `deadline` with pipes still open. After the first
/// write error the remaining lines are discarded and that error is returned.
fn forward_lines(
    rx: Receiver<Vec<u8>>,
    out: &mut (dyn Write + Send),
    deadline: &OnceLock<Instant>,
) -> Result<bool> {
    let mut first_error: Option<std::io::Error> = None;
    let drained = loop {
        if deadline.get().is_some_and(|at| Instant::now() >= *at) {
            break false;
        }
        match rx.recv_timeout(DRAIN_POLL) {
            Ok(line) => {
                if first_error.is_some() {
                    continue;
                }
                let written = out.write_all(&line).and_then(|()| out.flush());
                if let Err(err) = written {
                    warn!(err = %err, "failed to write child output");
                    first_error = Some(err);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break true,
        }
    };
    match first_error {
        Some(err) => Err(err.into()),
        None => Ok(drained),
    }
}
