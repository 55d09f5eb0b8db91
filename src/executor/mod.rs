//! Child process supervision.
//!
//! Runs the wrapped command with stdin inherited and both output streams
//! piped. Two concurrent pumps tee the streams: stdout accumulates in memory
//! (and mirrors raw bytes into the log file), stderr is forwarded to the
//! terminal (and into the log file). After the child exits the selected
//! filter strategy reduces the accumulated stdout, which is then written to
//! the terminal in one shot. Terminal signals are forwarded to the child for
//! the whole run.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::filter::{PassthroughStrategy, Registry, Strategy};
use crate::logpath;


/// Byte count below which a log file is not worth keeping (roughly ~80 lines
/// of typical terminal output).
const SMALL_OUTPUT_THRESHOLD: usize = 4096;

/// Read chunk size for the stream pumps.
const PUMP_CHUNK_SIZE: usize = 4096;

/// Everything the supervisor needs for one invocation.
pub struct ExecConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Base log directory override; empty means flag absent.
    pub log_dir: String,
    pub no_filter: bool,
    pub no_log: bool,
    pub registry: Registry,
}

/// What the invocation came to: the child's exit code and the log path that
/// survived cleanup (empty when no log was kept).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub exit_code: i32,
    pub log_path: String,
}

/// Serializes concurrent writes from the two pumps into the log file.
/// Neither pump owns the file; the supervisor recovers sole ownership after
/// joining them so the small-output path can close before unlink.
struct LogWriter {
    inner: Mutex<File>,
}

impl LogWriter {
    fn new(file: File) -> Self {
        Self { inner: Mutex::new(file) }
    }

    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        let mut file = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        file.write_all(buf)
    }

    fn into_file(self) -> File {
        match self.inner.into_inner() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Runs the wrapped command to completion and returns its exit code plus the
/// kept log path. Never panics and never clobbers the child's exit status
/// with a supervisor-internal failure.
pub async fn run(cfg: ExecConfig) -> RunResult {
    let command = logpath::base_name(&cfg.command).to_string();

    // Resolve the filter strategy up front.
    let passthrough = PassthroughStrategy;
    let strategy: &dyn Strategy = if cfg.no_filter || cfg.no_log {
        &passthrough
    } else {
        cfg.registry.find(&command, &cfg.args)
    };
    debug!(command = %command, args = ?cfg.args, filter = strategy.name(), "resolved filter strategy");

    // Set up the log file. Creation failure is a warning, not an error.
    let mut log_path = String::new();
    let mut log_writer: Option<Arc<LogWriter>> = None;
    if !cfg.no_log {
        let path = logpath::resolve(&cfg.log_dir, &command, &cfg.args);
        match logpath::create_log_file(&path) {
            Ok(file) => {
                log_path = path.to_string_lossy().into_owned();
                log_writer = Some(Arc::new(LogWriter::new(file)));
                debug!(log = %log_path, "created log file");
            }
            Err(err) => {
                eprintln!("coc: warning: could not create log file: {err}");
            }
        }
    }

    // Install the signal forwarder before the child starts; signals that
    // arrive before the pid is known are dropped on the floor.
    let child_pid = Arc::new(AtomicI32::new(0));
    let signal_task = spawn_signal_forwarder(Arc::clone(&child_pid));

    let mut cmd = Command::new(&cfg.command);
    cmd.args(&cfg.args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            eprintln!("coc: error starting command: {err}");
            stop_signal_forwarder(signal_task);
            drop(log_writer);
            let exit_code = if err.kind() == io::ErrorKind::NotFound { 127 } else { 1 };
            return RunResult { exit_code, log_path: String::new() };
        }
    };
    child_pid.store(child.id().map(|pid| pid as i32).unwrap_or(0), Ordering::SeqCst);

    // Drain both pipes concurrently. Draining one after the other deadlocks
    // once the child fills the un-drained pipe's kernel buffer (~64 KiB).
    let stdout_task = child
        .stdout
        .take()
        .map(|pipe| tokio::spawn(pump_stdout(pipe, log_writer.clone())));
    let stderr_task = child
        .stderr
        .take()
        .map(|pipe| tokio::spawn(pump_stderr(pipe, log_writer.clone())));

    let (stdout_buf, stdout_copy_err) = match stdout_task {
        Some(task) => task.await.unwrap_or_else(|_| (Vec::new(), None)),
        None => (Vec::new(), None),
    };
    let stderr_copy_err = match stderr_task {
        Some(task) => task.await.unwrap_or(None),
        None => None,
    };

    if let Some(err) = stdout_copy_err {
        eprintln!("coc: warning: error reading stdout: {err}");
    }
    if let Some(err) = stderr_copy_err {
        eprintln!("coc: warning: error reading stderr: {err}");
    }

    // Reap the child and derive the exit code.
    let exit_code = match child.wait().await {
        Ok(status) => exit_code_from_status(status),
        Err(err) => {
            eprintln!("coc: warning: error waiting for command: {err}");
            1
        }
    };
    // The pid may be recycled from here on; the forwarder must not touch it.
    child_pid.store(0, Ordering::SeqCst);

    // Reduce and emit stdout in one shot.
    let result = strategy.filter(&stdout_buf, &command, &cfg.args, exit_code);

    let mut stdout = io::stdout();
    if stdout
        .write_all(result.filtered.as_bytes())
        .and_then(|()| stdout.flush())
        .is_err()
    {
        stop_signal_forwarder(signal_task);
        drop(log_writer);
        return RunResult { exit_code, log_path };
    }

    // Small-output cleanup: a short unreduced run leaves the log as disk
    // clutter for zero benefit.
    if log_writer.is_some() && !result.was_reduced && stdout_buf.len() <= SMALL_OUTPUT_THRESHOLD {
        close_log(&mut log_writer);
        match std::fs::remove_file(&log_path) {
            Ok(()) => {
                // Best effort; the directory may hold other sessions.
                if let Some(parent) = Path::new(&log_path).parent() {
                    let _ = std::fs::remove_dir(parent);
                }
            }
            Err(err) => {
                eprintln!("coc: warning: could not remove log file: {err}");
            }
        }
        log_path.clear();
    }

    close_log(&mut log_writer);
    stop_signal_forwarder(signal_task);

    if result.was_reduced && !log_path.is_empty() {
        eprintln!("\nOutput was reduced, see the full logs at {log_path}");
    }

    RunResult { exit_code, log_path }
}

/// Maps a wait status to the exit-code taxonomy: the child's own code,
/// `128 + N` for death by signal N, or 1 when neither is available.
fn exit_code_from_status(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    1
}

/// Closes the log file by recovering sole ownership of the writer. Both
/// pumps have been joined by the time this runs, so the unwrap of the Arc
/// always succeeds in practice; a still-shared writer is simply dropped.
fn close_log(log_writer: &mut Option<Arc<LogWriter>>) {
    if let Some(writer) = log_writer.take() {
        match Arc::try_unwrap(writer) {
            Ok(writer) => drop(writer.into_file()),
            Err(shared) => drop(shared),
        }
    }
}

/// Copies child stdout into memory, mirroring raw bytes into the log.
/// Returns the accumulated bytes and the first I/O error, if any.
async fn pump_stdout(
    mut pipe: tokio::process::ChildStdout,
    log: Option<Arc<LogWriter>>,
) -> (Vec<u8>, Option<io::Error>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; PUMP_CHUNK_SIZE];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if let Some(log) = &log {
                    if let Err(err) = log.write_all(&chunk[..n]) {
                        return (buf, Some(err));
                    }
                }
            }
            Err(err) => return (buf, Some(err)),
        }
    }
    (buf, None)
}

/// Copies child stderr to the terminal and into the log, verbatim.
async fn pump_stderr(
    mut pipe: tokio::process::ChildStderr,
    log: Option<Arc<LogWriter>>,
) -> Option<io::Error> {
    let mut chunk = [0u8; PUMP_CHUNK_SIZE];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => return None,
            Ok(n) => {
                let mut stderr = io::stderr();
                if let Err(err) = stderr.write_all(&chunk[..n]).and_then(|()| stderr.flush()) {
                    return Some(err);
                }
                if let Some(log) = &log {
                    if let Err(err) = log.write_all(&chunk[..n]) {
                        return Some(err);
                    }
                }
            }
            Err(err) => return Some(err),
        }
    }
}

/// Forwards SIGINT/SIGTERM/SIGQUIT to the child, one-for-one, for as long as
/// the supervisor runs. A zero pid means no live child; the signal is dropped.
fn spawn_signal_forwarder(child_pid: Arc<AtomicI32>) -> Option<JoinHandle<()>> {
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(stream) => stream,
        Err(err) => {
            eprintln!("coc: warning: could not install signal handler: {err}");
            return None;
        }
    };
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            eprintln!("coc: warning: could not install signal handler: {err}");
            return None;
        }
    };
    let mut sigquit = match signal(SignalKind::quit()) {
        Ok(stream) => stream,
        Err(err) => {
            eprintln!("coc: warning: could not install signal handler: {err}");
            return None;
        }
    };

    Some(tokio::spawn(async move {
        loop {
            let sig = tokio::select! {
                _ = sigint.recv() => Signal::SIGINT,
                _ = sigterm.recv() => Signal::SIGTERM,
                _ = sigquit.recv() => Signal::SIGQUIT,
            };
            let pid = child_pid.load(Ordering::SeqCst);
            if pid > 0 {
                let _ = kill(Pid::from_raw(pid), sig);
            }
        }
    }))
}

fn stop_signal_forwarder(task: Option<JoinHandle<()>>) {
    if let Some(task) = task {
        task.abort();
    }
}
