//! Silent, fully buffered subprocess execution
//!
//! This module provides the single primitive used to launch the external
//! converter. It guarantees that:
//!
//! - no console window flashes up on Windows (`CREATE_NO_WINDOW`); the flag
//!   is a no-op on every other platform
//! - the whole input is written to the child's stdin and the whole of
//!   stdout/stderr is captured before returning
//! - the child is always reaped before returning, including on timeout
//! - on unix a timed-out child is killed together with its process group,
//!   so helpers it spawned cannot keep the output pipes open
//!
//! Stdin is fed and both output pipes are drained on scoped helper threads so
//! that a child producing more output than the pipe buffer holds can never
//! deadlock against a parent that is still writing input.

use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{DocumentError, Result};

/// Interval between exit checks while a timeout is armed
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a finished child process
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Create a command that will not open a visible console window
pub fn silent_command(program: &Path) -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(program);

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    cmd
}

/// Run `cmd` to completion, feeding `input` on stdin
///
/// # Arguments
///
/// * `cmd` - Prepared command (usually from [`silent_command`])
/// * `input` - Bytes written to the child's stdin, which is then closed
/// * `timeout` - Optional wall-clock limit; the child is killed when exceeded
///
/// # Errors
///
/// - `DocumentError::Io` if the process cannot be spawned or its pipes fail
/// - `DocumentError::Timeout` if the wall-clock limit is exceeded
pub fn run_buffered(
    mut cmd: Command,
    input: &[u8],
    timeout: Option<Duration>,
) -> Result<ProcessOutput> {
    let program = cmd.get_program().to_owned();

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        if timeout.is_some() {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| DocumentError::io(&program, e))?;

    let mut stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (wait_result, write_result, stdout_result, stderr_result) = thread::scope(|scope| {
        let writer = scope.spawn(move || -> io::Result<()> {
            if let Some(pipe) = stdin.as_mut() {
                match pipe.write_all(input) {
                    // The child may exit without consuming everything; its
                    // exit status is what reports the failure.
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                    other => other?,
                }
            }
            drop(stdin);
            Ok(())
        });
        let out_reader = scope.spawn(move || drain(stdout));
        let err_reader = scope.spawn(move || drain(stderr));

        let wait_result = wait_for(&mut child, timeout);

        (
            wait_result,
            join(writer),
            join(out_reader),
            join(err_reader),
        )
    });

    let status = wait_result.map_err(|e| DocumentError::io(&program, e))??;
    write_result.map_err(|e| DocumentError::io(&program, e))?;
    let stdout = stdout_result.map_err(|e| DocumentError::io(&program, e))?;
    let stderr = stderr_result.map_err(|e| DocumentError::io(&program, e))?;

    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
    })
}

fn drain<R: Read>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf)?;
    }
    Ok(buf)
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, io::Result<T>>) -> io::Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("pipe worker thread panicked")))
}

/// Wait for the child, killing and reaping it if `timeout` elapses
///
/// The outer `io::Result` reports wait failures; the inner result reports
/// the timeout.
fn wait_for(child: &mut Child, timeout: Option<Duration>) -> io::Result<Result<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Ok);
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Ok(status));
        }
        if start.elapsed() >= timeout {
            warn!(pid = child.id(), ?timeout, "killing converter after timeout");
            if let Err(e) = kill_tree(child) {
                debug!(error = %e, "kill after timeout failed");
            }
            child.wait()?;
            return Ok(Err(DocumentError::Timeout(timeout)));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the child and, on unix, the process group it leads
fn kill_tree(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        let pgid = libc::pid_t::try_from(child.id()).map_err(io::Error::other)?;
        // SAFETY: killpg takes no pointers; the group was created for this
        // child by `process_group(0)` and lives until the child is reaped.
        if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
            return Ok(());
        }
        debug!(error = %io::Error::last_os_error(), "killpg failed, killing child only");
    }
    child.kill()
}
