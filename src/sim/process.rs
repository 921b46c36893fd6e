//! Running a child process with a deadline while draining its output.

use std::{
    io::{self, Read},
    process::{Child, Command, ExitStatus, Stdio},
    sync::mpsc::{self, RecvTimeoutError, Sender},
    thread,
    time::{Duration, Instant},
};

use derive_more::Display;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Display)]
pub enum ProcessError {
    #[display(fmt = "failed to spawn {}: {}", program, source)]
    Spawn { program: String, source: io::Error },
    #[display(fmt = "killed after {:?}", _0)]
    TimedOut(Duration),
    #[display(fmt = "failed to wait for the child: {}", _0)]
    Wait(io::Error),
}

impl std::error::Error for ProcessError {}

/// everything a finished child left behind
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// read `pipe` to its end on a new thread and send the text back
fn drain(mut pipe: impl Read + Send + 'static, stream: Stream, sender: Sender<(Stream, String)>) {
    thread::spawn(move || {
        let mut buffer = vec![];
        // a read error only truncates the captured text
        pipe.read_to_end(&mut buffer).ok();
        sender
            .send((stream, String::from_utf8_lossy(&buffer).into_owned()))
            .ok();
    });
}

fn kill(child: &mut Child) {
    child.kill().ok();
    child.wait().ok();
}

/// Run `command` to completion, killing it once `timeout` has passed.
///
/// stdout and stderr are read on their own threads so a chatty child never blocks on a full
/// pipe while we poll its exit status. The deadline also bounds the wait for the pipes to close:
/// a grandchild that inherited them and outlives the child turns the run into a timeout.
pub fn run_with_timeout(
    command: &mut Command,
    timeout: Duration,
) -> Result<ProcessOutput, ProcessError> {
    let program = command.get_program().to_string_lossy().into_owned();
    let start = Instant::now();
    let deadline = start + timeout;
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;
    let (sender, receiver) = mpsc::channel();
    let mut pending = 0;
    if let Some(pipe) = child.stdout.take() {
        drain(pipe, Stream::Stdout, sender.clone());
        pending += 1;
    }
    if let Some(pipe) = child.stderr.take() {
        drain(pipe, Stream::Stderr, sender.clone());
        pending += 1;
    }
    drop(sender);

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                kill(&mut child);
                debug!("{program} passed its deadline of {timeout:?}");
                // the reader threads are left to finish on their own, a grandchild may still
                // hold the pipes open
                return Err(ProcessError::TimedOut(timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                kill(&mut child);
                return Err(ProcessError::Wait(e));
            }
        }
    };

    let mut stdout = String::new();
    let mut stderr = String::new();
    while pending > 0 {
        // one poll interval of grace so a child exiting right at the deadline keeps its output
        let remaining = deadline
            .saturating_duration_since(Instant::now())
            .max(POLL_INTERVAL);
        match receiver.recv_timeout(remaining) {
            Ok((Stream::Stdout, text)) => stdout = text,
            Ok((Stream::Stderr, text)) => stderr = text,
            Err(RecvTimeoutError::Timeout) => {
                debug!("{program} exited with {status} but its pipes are still open");
                return Err(ProcessError::TimedOut(timeout));
            }
            // a reader thread died, keep what arrived
            Err(RecvTimeoutError::Disconnected) => break,
        }
        pending -= 1;
    }
    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        elapsed: start.elapsed(),
    })
}
