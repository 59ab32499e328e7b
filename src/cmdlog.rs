//! Append-Only Command Log
//!
//! Successful write commands are appended to a flat file, in the same wire
//! format clients send them. On startup the file is replayed through the
//! dispatcher to rebuild the key space before any client is accepted.
//!
//! ## Design
//!
//! ```text
//!  connection tasks                        writer task
//! ┌────────────────┐   CommandLogger   ┌──────────────────┐
//! │ CommandHandler │──── record() ────>│  mpsc receiver   │──> write_all + flush
//! └────────────────┘   (unbounded)     └──────────────────┘
//! ```
//!
//! A single task owns the file, so frames from concurrent connections are
//! never interleaved. Each record is received once and written once.
//!
//! The log has no header, checksum or compaction. Relative deadlines
//! (`SET k v ttl`, `EXPIRE k secs`) are re-evaluated against the clock at
//! replay time.

use crate::commands::CommandHandler;
use crate::protocol::{FrameParser, ParseError, Request};
use crate::storage::StorageEngine;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Errors raised by the command log.
#[derive(Debug, Error)]
pub enum CmdlogError {
    /// The log file could not be opened or created
    #[error("cannot open command log {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("command log I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file holds a malformed or truncated frame
    #[error("replay aborted after {restored} commands: {source}")]
    Replay {
        restored: usize,
        #[source]
        source: ParseError,
    },

    /// The writer task is gone, so nothing more can be recorded
    #[error("command log writer has stopped")]
    WriterClosed,
}

/// An open command log file, before its writer is started.
#[derive(Debug)]
pub struct CommandLog {
    path: PathBuf,
    file: File,
}

impl CommandLog {
    /// Opens the log for reading and appending, creating it if missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CmdlogError> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(|source| CmdlogError::Open {
                path: path.clone(),
                source,
            })?;

        Ok(Self { path, file })
    }

    /// Replays every request in the file into `storage`, in file order.
    ///
    /// Requests go through a dispatcher with no logger attached, so nothing
    /// is appended back to the file. A command that fails is skipped. A
    /// malformed or truncated frame stops the replay, leaving `storage`
    /// with what was restored so far.
    ///
    /// Returns the number of commands applied.
    pub async fn restore(&mut self, storage: Arc<StorageEngine>) -> Result<usize, CmdlogError> {
        info!(path = %self.path.display(), "Restoring storage from command log");

        let mut data = Vec::new();
        self.file.read_to_end(&mut data).await?;

        let handler = CommandHandler::new(storage);
        let parser = FrameParser::new();
        let mut offset = 0;
        let mut restored = 0;

        while offset < data.len() {
            let (request, consumed) = match parser.parse_request(&data[offset..]) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => {
                    return Err(CmdlogError::Replay {
                        restored,
                        source: ParseError::UnexpectedEof,
                    })
                }
                Err(source) => return Err(CmdlogError::Replay { restored, source }),
            };
            offset += consumed;

            match handler.dispatch(&request) {
                Ok(_) => restored += 1,
                Err(e) => warn!(request = %request, error = %e, "Skipping failed command during replay"),
            }
        }

        info!(restored = restored, "Storage restored from command log");
        Ok(restored)
    }

    /// Starts the writer task.
    ///
    /// The task ends once every [`CommandLogger`] clone has been dropped,
    /// after flushing what was queued. A write failure ends it with an error.
    pub fn start(self) -> (CommandLogger, JoinHandle<Result<(), CmdlogError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(writer_loop(self.file, self.path, rx));
        (CommandLogger::from_sender(tx), handle)
    }
}

async fn writer_loop(
    file: File,
    path: PathBuf,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
) -> Result<(), CmdlogError> {
    info!(path = %path.display(), "Command log writer started");

    match write_records(BufWriter::new(file), rx).await {
        Ok(written) => {
            info!(written = written, "Command log writer stopped");
            Ok(())
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Command log write failed");
            Err(e.into())
        }
    }
}

async fn write_records(
    mut writer: BufWriter<File>,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
) -> io::Result<usize> {
    let mut written = 0;

    while let Some(record) = rx.recv().await {
        writer.write_all(&record).await?;
        written += 1;

        // Batch whatever else is already queued into the same flush
        while let Ok(record) = rx.try_recv() {
            writer.write_all(&record).await?;
            written += 1;
        }

        writer.flush().await?;
    }

    writer.flush().await?;
    Ok(written)
}

/// Sending half of the command log, held by every dispatcher.
#[derive(Debug, Clone)]
pub struct CommandLogger {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl CommandLogger {
    pub(crate) fn from_sender(tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { tx }
    }

    /// Queues the wire encoding of `request` for appending. Never blocks.
    pub fn record(&self, request: &Request) -> Result<(), CmdlogError> {
        self.tx
            .send(request.encode())
            .map_err(|_| CmdlogError::WriterClosed)
    }
}
