// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker I/O tasks.
//!
//! Each spawned worker gets a writer task (owns stdin), a reader task
//! (frames and decodes stdout), an optional stderr task, and a supervise
//! task that waits for exit. All of them report to the actor through one
//! unbounded signal channel tagged with the worker generation, so frames
//! always arrive before the exit signal of the same worker.

use crate::spawner::{WorkerControl, WorkerOutput, WorkerStdin};
use dx_core::CorrelationId;
use dx_wire::{decode_line, Inbound, MAX_FRAME_LEN};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::Instrument;

/// Message from a worker task to the actor.
#[derive(Debug)]
pub(crate) enum Signal {
    Frame { generation: u64, inbound: Inbound },
    WriteFailed { generation: u64, correlation_id: CorrelationId, error: String },
    Exited { generation: u64, code: Option<i32> },
}

/// One encoded request line bound for stdin.
pub(crate) struct Outbound {
    pub correlation_id: CorrelationId,
    pub line: String,
}

pub(crate) fn spawn_writer(
    generation: u64,
    mut stdin: WorkerStdin,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    signals: mpsc::UnboundedSender<Signal>,
) {
    tokio::spawn(
        async move {
            while let Some(Outbound { correlation_id, line }) = rx.recv().await {
                let result = async {
                    stdin.write_all(line.as_bytes()).await?;
                    stdin.flush().await
                }
                .await;
                if let Err(e) = result {
                    tracing::warn!(%correlation_id, error = %e, "write to worker failed");
                    let _ = signals.send(Signal::WriteFailed {
                        generation,
                        correlation_id,
                        error: e.to_string(),
                    });
                    break;
                }
                tracing::trace!(%correlation_id, "request written");
            }
            // Dropping stdin closes the pipe; well-behaved workers exit on EOF
        }
        .instrument(tracing::debug_span!("worker.stdin", generation)),
    );
}

pub(crate) fn spawn_reader(
    generation: u64,
    stdout: WorkerOutput,
    signals: mpsc::UnboundedSender<Signal>,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            let mut frames =
                FramedRead::new(stdout, LinesCodec::new_with_max_length(MAX_FRAME_LEN));
            // After a decode error the stream yields `None` once before resuming
            let mut resumed_after_error = false;
            loop {
                match frames.next().await {
                    Some(Ok(line)) => {
                        resumed_after_error = false;
                        if let Some(inbound) = decode_line(&line) {
                            if signals.send(Signal::Frame { generation, inbound }).is_err() {
                                break;
                            }
                        }
                    }
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        tracing::warn!(max = MAX_FRAME_LEN, "dropping oversized worker frame");
                        resumed_after_error = true;
                    }
                    Some(Err(LinesCodecError::Io(e))) => {
                        tracing::warn!(error = %e, "worker stdout read failed");
                        break;
                    }
                    None if resumed_after_error => resumed_after_error = false,
                    None => break,
                }
            }
            tracing::debug!("worker stdout closed");
        }
        .instrument(tracing::debug_span!("worker.stdout", generation)),
    )
}

pub(crate) fn spawn_stderr(generation: u64, stderr: WorkerOutput) {
    tokio::spawn(async move {
        let mut lines = FramedRead::new(stderr, LinesCodec::new_with_max_length(MAX_FRAME_LEN));
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) if line.trim().is_empty() => {}
                Ok(line) => tracing::warn!(target: "worker.stderr", generation, "{line}"),
                Err(LinesCodecError::MaxLineLengthExceeded) => {}
                Err(LinesCodecError::Io(_)) => break,
            }
        }
    });
}

/// Wait for the worker to exit (or to be killed), let the reader drain, then
/// report the exit.
pub(crate) fn spawn_supervisor(
    generation: u64,
    mut control: Box<dyn WorkerControl>,
    kill_rx: oneshot::Receiver<()>,
    mut reader: JoinHandle<()>,
    drain_timeout: Duration,
    signals: mpsc::UnboundedSender<Signal>,
) {
    tokio::spawn(
        async move {
            let (code, killed) = tokio::select! {
                code = control.wait() => (code, false),
                // A dropped sender also kills: the bridge is gone
                _ = kill_rx => {
                    control.kill().await;
                    (control.wait().await, true)
                }
            };

            if killed {
                reader.abort();
            } else if tokio::time::timeout(drain_timeout, &mut reader).await.is_err() {
                tracing::debug!("worker stdout still open after exit, abandoning reader");
                reader.abort();
            }

            tracing::debug!(?code, killed, "worker reaped");
            let _ = signals.send(Signal::Exited { generation, code });
        }
        .instrument(tracing::debug_span!("worker.supervise", generation)),
    );
}
