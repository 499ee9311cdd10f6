//! Engine process execution with a hard wall-clock budget.
//!
//! Output pipes are drained by reader threads that forward chunks over a
//! channel. The caller only waits for those readers for a short grace period
//! after the engine exits, so a descendant that inherited the pipes (a wrapper
//! script's child, a detached helper) cannot stretch a run past its timeout.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How long captured output may keep arriving after the engine exited.
pub const DRAIN_GRACE: Duration = Duration::from_millis(250);

const CHUNK_SIZE: usize = 8192;

/// Bytes captured from one engine run, up to termination.
#[derive(Debug)]
pub struct CapturedRun {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
    /// Bytes read past `output_limit_bytes` and dropped, across both streams.
    pub dropped_bytes: usize,
    /// A pipe was still open when the grace period ended.
    pub pipes_abandoned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

enum ReadEvent {
    Chunk(Stream, Vec<u8>),
    Closed { dropped: usize },
}

/// Run an engine with a timeout and capture its output.
///
/// On timeout the engine is killed and everything it printed so far is
/// returned. Each stream keeps at most `output_limit_bytes`; the rest is read
/// and dropped so the engine never blocks on a full pipe.
#[instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64, output_limit_bytes))]
pub fn run_engine(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CapturedRun> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|err| {
        error!(%err, "failed to spawn engine");
        anyhow!(err).context("spawn engine")
    })?;

    let (tx, rx) = mpsc::channel();
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    spawn_reader(stdout, Stream::Stdout, output_limit_bytes, tx.clone());
    spawn_reader(stderr, Stream::Stderr, output_limit_bytes, tx);

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for engine")? {
        Some(status) => (status, false),
        None => {
            warn!(timeout_ms = timeout.as_millis() as u64, "engine timed out, killing");
            child.kill().context("kill engine")?;
            (child.wait().context("wait for engine after kill")?, true)
        }
    };

    let mut run = CapturedRun {
        status,
        stdout: Vec::new(),
        stderr: Vec::new(),
        timed_out,
        dropped_bytes: 0,
        pipes_abandoned: false,
    };
    collect(&rx, &mut run);

    if run.dropped_bytes > 0 {
        warn!(dropped_bytes = run.dropped_bytes, "engine output truncated");
    }
    if run.pipes_abandoned {
        warn!("engine descendants still hold output pipes; stopped reading");
    }
    debug!(exit_code = ?run.status.code(), timed_out, "engine finished");
    Ok(run)
}

/// Gather forwarded chunks until both readers closed or the grace period ran out.
fn collect(rx: &Receiver<ReadEvent>, run: &mut CapturedRun) {
    let deadline = Instant::now() + DRAIN_GRACE;
    let mut open = 2;
    while open > 0 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(ReadEvent::Chunk(Stream::Stdout, bytes)) => run.stdout.extend_from_slice(&bytes),
            Ok(ReadEvent::Chunk(Stream::Stderr, bytes)) => run.stderr.extend_from_slice(&bytes),
            Ok(ReadEvent::Closed { dropped }) => {
                run.dropped_bytes += dropped;
                open -= 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                run.pipes_abandoned = true;
                return;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Forward up to `limit` bytes of `reader` as chunks, then report how much was dropped.
fn spawn_reader<R: Read + Send + 'static>(
    mut reader: R,
    stream: Stream,
    limit: usize,
    tx: Sender<ReadEvent>,
) {
    thread::spawn(move || {
        let mut kept = 0usize;
        let mut dropped = 0usize;
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(?stream, %err, "reading engine output failed");
                    break;
                }
            };
            let keep = n.min(limit.saturating_sub(kept));
            dropped += n - keep;
            if keep > 0 {
                kept += keep;
                // The receiver is gone once the caller stopped waiting.
                if tx.send(ReadEvent::Chunk(stream, chunk[..keep].to_vec())).is_err() {
                    return;
                }
            }
        }
        let _ = tx.send(ReadEvent::Closed { dropped });
    });
}
