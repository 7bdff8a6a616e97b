//! Process execution with timeout and output ceilings
//!
//! Spawns one backend process, drains stdout and stderr concurrently, and
//! hard-kills the child as soon as either stream crosses its ceiling or the
//! timeout elapses. Exit status interpretation is left to the caller: for the
//! grep family exit code 1 means "no matches", not failure.

use std::ffi::OsStr;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

const READ_CHUNK: usize = 8 * 1024;

/// Which captured stream breached its ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// Limits applied to a single process run
#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub timeout: Duration,
    pub max_stdout_bytes: usize,
    pub max_stderr_bytes: usize,
    pub cwd: Option<PathBuf>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS),
            max_stdout_bytes: crate::config::DEFAULT_MAX_STDOUT_BYTES,
            max_stderr_bytes: crate::config::DEFAULT_MAX_STDERR_BYTES,
            cwd: None,
        }
    }
}

/// Captured result of a process that exited on its own
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
    pub elapsed: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while reading `{program}` output: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` timed out after {}ms", timeout.as_millis())]
    Timeout { program: String, timeout: Duration },

    #[error("`{program}` {stream} exceeded {limit} bytes")]
    OutputLimitExceeded {
        program: String,
        stream: OutputStream,
        limit: usize,
    },
}

/// Run `program` with `args`, enforcing the limits in `options`
///
/// # Errors
/// Returns `ExecError` on spawn failure, read failure, timeout or when a
/// stream exceeds its ceiling. In the last two cases the child has already
/// been killed and reaped.
pub async fn run<I, S>(program: &str, args: I, options: &ExecOptions) -> Result<ExecOutput, ExecError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let start = Instant::now();

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &options.cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let outcome = tokio::time::timeout(options.timeout, drive(program, &mut child, options)).await;

    match outcome {
        Ok(Ok((stdout, stderr, status))) => {
            let exit_code = status.code();
            log::debug!(
                "`{program}` exited with {exit_code:?} after {}ms ({} bytes stdout)",
                start.elapsed().as_millis(),
                stdout.len()
            );
            Ok(ExecOutput {
                stdout,
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_code,
                success: exit_code == Some(0),
                elapsed: start.elapsed(),
            })
        }
        Ok(Err(err)) => {
            if let ExecError::OutputLimitExceeded { stream, limit, .. } = &err {
                log::warn!("Killing `{program}`: {stream} exceeded {limit} bytes");
            }
            kill_quietly(&mut child).await;
            Err(err)
        }
        Err(_elapsed) => {
            log::warn!(
                "Killing `{program}`: timed out after {}ms",
                options.timeout.as_millis()
            );
            kill_quietly(&mut child).await;
            Err(ExecError::Timeout {
                program: program.to_string(),
                timeout: options.timeout,
            })
        }
    }
}

/// Drain both pipes until EOF, then reap the child
async fn drive(
    program: &str,
    child: &mut Child,
    options: &ExecOptions,
) -> Result<(Vec<u8>, Vec<u8>, std::process::ExitStatus), ExecError> {
    let io_err = |source| ExecError::Io {
        program: program.to_string(),
        source,
    };

    let mut stdout = child.stdout.take().ok_or_else(|| {
        io_err(std::io::Error::other("stdout was not captured"))
    })?;
    let mut stderr = child.stderr.take().ok_or_else(|| {
        io_err(std::io::Error::other("stderr was not captured"))
    })?;

    let mut out = Vec::new();
    let mut err = Vec::new();
    let mut out_chunk = vec![0u8; READ_CHUNK];
    let mut err_chunk = vec![0u8; READ_CHUNK];
    let mut out_done = false;
    let mut err_done = false;

    loop {
        tokio::select! {
            read = stdout.read(&mut out_chunk), if !out_done => {
                out_done = append(read.map_err(io_err)?, &out_chunk, &mut out);
                check_ceiling(program, OutputStream::Stdout, out.len(), options.max_stdout_bytes)?;
            }
            read = stderr.read(&mut err_chunk), if !err_done => {
                err_done = append(read.map_err(io_err)?, &err_chunk, &mut err);
                check_ceiling(program, OutputStream::Stderr, err.len(), options.max_stderr_bytes)?;
            }
            else => break,
        }
    }

    let status = child.wait().await.map_err(io_err)?;
    Ok((out, err, status))
}

/// Returns true on EOF
fn append(read: usize, chunk: &[u8], buf: &mut Vec<u8>) -> bool {
    if read == 0 {
        return true;
    }
    buf.extend_from_slice(&chunk[..read]);
    false
}

fn check_ceiling(
    program: &str,
    stream: OutputStream,
    len: usize,
    limit: usize,
) -> Result<(), ExecError> {
    if len > limit {
        return Err(ExecError::OutputLimitExceeded {
            program: program.to_string(),
            stream,
            limit,
        });
    }
    Ok(())
}

/// Kill and reap; errors after a deliberate kill are not surfaced
async fn kill_quietly(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        log::debug!("start_kill after deliberate termination: {e}");
    }
    if let Err(e) = child.wait().await {
        log::debug!("wait after deliberate termination: {e}");
    }
}
