//! Child process plumbing: spawn with merged output, graceful termination

use super::command::CommandSpec;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Lines buffered between the pipe reader and the supervisor
const LINE_BUFFER: usize = 256;

/// A spawned child whose stdout and stderr arrive on one line channel.
///
/// The channel closes once the shared pipe reaches end of file.
#[derive(Debug)]
pub struct MergedChild {
    pub child: Child,
    pub lines: mpsc::Receiver<io::Result<String>>,
}

/// Spawn `spec` with stdin closed and stdout and stderr writing into the
/// same pipe, so lines arrive in the order the child wrote them.
///
/// Lines keep their trailing newline. Invalid UTF-8 is replaced rather
/// than treated as a read error.
pub fn spawn_merged(spec: &CommandSpec) -> io::Result<MergedChild> {
    let (reader, writer) = io::pipe()?;
    let stderr_writer = writer.try_clone()?;
    let reader = async_reader(reader)?;

    let mut cmd = spec.to_command();
    cmd.stdin(Stdio::null())
        .stdout(writer)
        .stderr(stderr_writer)
        .kill_on_drop(true);

    let child = cmd.spawn();
    // The command owns our copies of the write end; EOF needs them closed
    drop(cmd);
    let child = child?;
    debug!(pid = ?child.id(), program = %spec.program_name(), "spawned child process");

    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    tokio::spawn(forward_lines(reader, tx));

    Ok(MergedChild { child, lines: rx })
}

#[cfg(unix)]
fn async_reader(reader: io::PipeReader) -> io::Result<tokio::net::unix::pipe::Receiver> {
    tokio::net::unix::pipe::Receiver::from_owned_fd(std::os::fd::OwnedFd::from(reader))
}

#[cfg(windows)]
fn async_reader(reader: io::PipeReader) -> io::Result<tokio::fs::File> {
    let handle = std::os::windows::io::OwnedHandle::from(reader);
    Ok(tokio::fs::File::from_std(std::fs::File::from(handle)))
}

async fn forward_lines<R>(reader: R, tx: mpsc::Sender<io::Result<String>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).into_owned();
                if tx.send(Ok(line)).await.is_err() {
                    // Supervisor stopped listening
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }
}

/// Ask the child to exit, then force-kill it after `grace`.
///
/// Returns once the child has been reaped.
pub async fn terminate(child: &mut Child, grace: Duration) {
    let pid = child.id();

    #[cfg(unix)]
    {
        if let Some(pid) = pid {
            // SAFETY: kill(2) has no memory-safety preconditions; the pid is
            // our own unreaped child, so it cannot have been recycled.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = child.start_kill();
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(?pid, %status, "child exited after terminate request");
            return;
        }
        Ok(Err(e)) => warn!(?pid, error = %e, "failed to wait for terminated child"),
        Err(_) => warn!(
            ?pid,
            grace_secs = grace.as_secs(),
            "child ignored terminate request, killing"
        ),
    }

    if let Err(e) = child.start_kill() {
        debug!(?pid, error = %e, "kill failed, child already gone");
    }
    let _ = child.wait().await;
}
