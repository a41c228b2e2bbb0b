//! Bidirectional byte pump between a transport and a PTY.
//!
//! The pump runs two copy loops, transport → process and process →
//! transport, and finishes as soon as either loop ends or the process
//! exits. Whichever happens first triggers teardown exactly once; the pump
//! then gives the other loop a bounded amount of time to wind down so no
//! task outlives the session.

use std::future::Future;
use std::io::{Read, Write};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::pty::{AsyncPtyReader, AsyncPtyWriter};

/// How long the surviving loop gets after teardown before it is abandoned.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Which side ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The transport stopped sending (EOF, close, or error).
    TransportClosed,
    /// The terminal output reached EOF or failed.
    OutputClosed,
    /// The process exited.
    ProcessExited,
}

impl PumpExit {
    /// Whether the process side ended the session.
    pub fn is_process_side(&self) -> bool {
        matches!(self, Self::OutputClosed | Self::ProcessExited)
    }
}

/// Copies bytes between a transport and a PTY for one session.
pub struct Pump<R, W> {
    reader: R,
    writer: W,
    buffer_size: usize,
    drain_timeout: Duration,
}

impl<R, W> Pump<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    /// Create a pump over the PTY's output `reader` and input `writer`.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            buffer_size: 4096,
            drain_timeout: DRAIN_TIMEOUT,
        }
    }

    /// Read buffer size for terminal output.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Bound on waiting for the surviving loop after teardown.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Run until one side ends.
    ///
    /// * `inbound` carries transport bytes destined for the process; the
    ///   transport closes it by dropping the sender.
    /// * `outbound` receives terminal output; output produced before the
    ///   session ended is still delivered while the output loop drains.
    /// * `process_exit` resolves when the process exits.
    /// * `on_finish` runs exactly once, before the surviving loop is drained.
    ///   It is expected to tear the session down, which is what unblocks a
    ///   pending terminal read.
    pub async fn run<E, F, Fut>(
        self,
        inbound: mpsc::Receiver<Vec<u8>>,
        outbound: mpsc::Sender<Vec<u8>>,
        process_exit: E,
        on_finish: F,
    ) -> PumpExit
    where
        E: Future<Output = ()>,
        F: FnOnce(PumpExit) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut output = tokio::spawn(
            AsyncPtyReader::new(self.reader, outbound)
                .with_buffer_size(self.buffer_size)
                .run(),
        );
        let mut input = tokio::spawn(AsyncPtyWriter::new(self.writer, inbound).run());

        let exit = tokio::select! {
            _ = &mut output => PumpExit::OutputClosed,
            _ = &mut input => PumpExit::TransportClosed,
            () = process_exit => PumpExit::ProcessExited,
        };
        debug!(exit = ?exit, "Pump finished");

        on_finish(exit).await;

        // Pending transport reads are cancellable; a write in flight finishes
        // on its own once the terminal is gone.
        if exit != PumpExit::TransportClosed {
            input.abort();
            let _ = input.await;
        }

        if exit != PumpExit::OutputClosed
            && tokio::time::timeout(self.drain_timeout, &mut output)
                .await
                .is_err()
        {
            warn!(
                timeout_ms = self.drain_timeout.as_millis() as u64,
                "Terminal output did not close after teardown"
            );
            output.abort();
        }

        exit
    }
}
