//! Incremental reader over an append-only log we do not own.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use localai_core::CoreError;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::info;

/// Upper bound of bytes consumed per poll.
pub const MAX_CHUNK: u64 = 1024 * 1024;

/// One complete line and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailLine {
    pub offset: u64,
    pub text: String,
}

/// Result of one poll.
#[derive(Debug, Default)]
pub struct TailRead {
    pub lines: Vec<TailLine>,
    /// The file shrank below our cursor and was re-read from the start.
    pub rotated: bool,
}

/// Read cursor over a log file.
///
/// Only complete (newline-terminated) lines are consumed; a trailing partial
/// line is left for the next poll.
#[derive(Debug)]
pub struct LogTail {
    path: PathBuf,
    offset: u64,
}

impl LogTail {
    pub fn new(path: impl Into<PathBuf>, offset: u64) -> Self {
        Self {
            path: path.into(),
            offset,
        }
    }

    /// Cursor positioned at the current end of the file (0 if missing).
    pub async fn at_end(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let offset = tokio::fs::metadata(&path).await.map_or(0, |m| m.len());
        Self { path, offset }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Read lines appended since the last poll.
    pub async fn poll(&mut self) -> Result<TailRead, CoreError> {
        let source_err =
            |e: std::io::Error| CoreError::WatchSource(format!("{}: {e}", self.path.display()));

        let len = tokio::fs::metadata(&self.path).await.map_err(source_err)?.len();
        let mut read = TailRead::default();

        if len < self.offset {
            info!(
                path = %self.path.display(),
                offset = self.offset,
                len,
                "Log shrank below cursor, assuming rotation"
            );
            self.offset = 0;
            read.rotated = true;
        }
        if len == self.offset {
            return Ok(read);
        }

        let mut file = File::open(&self.path).await.map_err(source_err)?;
        file.seek(SeekFrom::Start(self.offset))
            .await
            .map_err(source_err)?;
        let mut buf = Vec::new();
        file.take((len - self.offset).min(MAX_CHUNK))
            .read_to_end(&mut buf)
            .await
            .map_err(source_err)?;

        let consumed = match buf.iter().rposition(|&b| b == b'\n') {
            Some(last_newline) => last_newline + 1,
            // A single line longer than the chunk is taken as is.
            None if buf.len() as u64 >= MAX_CHUNK => buf.len(),
            None => return Ok(read),
        };

        let mut line_start = self.offset;
        for raw in buf[..consumed].split_inclusive(|&b| b == b'\n') {
            let text = String::from_utf8_lossy(raw)
                .trim_end_matches(['\n', '\r'])
                .to_string();
            read.lines.push(TailLine {
                offset: line_start,
                text,
            });
            line_start += raw.len() as u64;
        }
        self.offset += consumed as u64;
        Ok(read)
    }
}
