//! Channel adapters around the blocking PTY handles.
//!
//! portable-pty only offers blocking `Read`/`Write`. The reader owns a
//! blocking-pool thread for the life of the session; the writer hops onto
//! the pool once per chunk so it can be cancelled between chunks.

use std::io::{Read, Write};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

/// Async reader for PTY output.
///
/// Runs in a blocking thread and sends output chunks through a channel.
pub struct AsyncPtyReader<R: Read + Send + 'static> {
    reader: R,
    tx: mpsc::Sender<Vec<u8>>,
    buffer_size: usize,
}

impl<R: Read + Send + 'static> AsyncPtyReader<R> {
    /// Create a new AsyncPtyReader.
    pub fn new(reader: R, tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            reader,
            tx,
            buffer_size: 4096,
        }
    }

    /// Create with custom buffer size.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Run the reader loop in a blocking thread.
    ///
    /// Returns the number of bytes forwarded once:
    /// - The PTY is closed (read returns 0 or EIO)
    /// - The channel is closed (receiver dropped)
    /// - An unrecoverable error occurs
    pub async fn run(self) -> u64 {
        let buffer_size = self.buffer_size;
        let mut reader = self.reader;
        let tx = self.tx;

        let result = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; buffer_size];
            let mut total = 0u64;

            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        debug!("PTY reader: EOF");
                        break;
                    }
                    Ok(n) => {
                        trace!(bytes = n, "PTY reader: chunk");
                        if tx.blocking_send(buf[..n].to_vec()).is_err() {
                            debug!("PTY reader: channel closed");
                            break;
                        }
                        total += n as u64;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) if is_terminal_gone(&e) => {
                        debug!(error = %e, "PTY reader: terminal closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "PTY reader failed");
                        break;
                    }
                }
            }

            total
        })
        .await;

        result.unwrap_or_else(|e| {
            error!(error = %e, "PTY reader task panicked");
            0
        })
    }
}

/// Whether a read error means the terminal has no slave side left.
///
/// Linux reports this as `EIO` once the child and its descendants exit.
fn is_terminal_gone(e: &std::io::Error) -> bool {
    #[cfg(unix)]
    if e.raw_os_error() == Some(libc::EIO) {
        return true;
    }
    e.kind() == std::io::ErrorKind::BrokenPipe
}

/// Async writer for PTY input.
///
/// Receives data asynchronously and performs each write on the blocking
/// pool, so dropping the `run` future stops the loop at the next chunk.
pub struct AsyncPtyWriter<W: Write + Send + 'static> {
    writer: W,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl<W: Write + Send + 'static> AsyncPtyWriter<W> {
    /// Create a new AsyncPtyWriter.
    pub fn new(writer: W, rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self { writer, rx }
    }

    /// Run the writer loop.
    ///
    /// Returns the number of bytes written once:
    /// - The channel is closed (sender dropped)
    /// - An unrecoverable error occurs
    pub async fn run(self) -> u64 {
        let mut writer = self.writer;
        let mut rx = self.rx;
        let mut total = 0u64;

        while let Some(data) = rx.recv().await {
            if data.is_empty() {
                continue;
            }

            let result = tokio::task::spawn_blocking(move || {
                let outcome = writer.write_all(&data).and_then(|()| writer.flush());
                (writer, outcome, data.len())
            })
            .await;

            match result {
                Ok((w, Ok(()), n)) => {
                    trace!(bytes = n, "PTY writer: chunk");
                    writer = w;
                    total += n as u64;
                }
                Ok((_, Err(e), _)) => {
                    if e.kind() == std::io::ErrorKind::BrokenPipe {
                        debug!("PTY writer: broken pipe");
                    } else {
                        warn!(error = %e, "PTY writer failed");
                    }
                    return total;
                }
                Err(e) => {
                    error!(error = %e, "PTY writer task panicked");
                    return total;
                }
            }
        }

        debug!("PTY writer: channel closed");
        total
    }
}
