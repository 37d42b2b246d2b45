use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{trace, warn};

use crate::error::RelayError;
use crate::field::Record;
use crate::reader::HEADER_LINES;

/// Record written right before the process replaces itself.
pub const RESTART_MARKER: &[u8] = br##"[{"full_text":"Restarting","color":"#ff0000"}],"##;

/// Writes the outbound i3bar stream.
///
/// Header lines pass through verbatim, at most [`HEADER_LINES`] of them and
/// only before the first record. Each record is written as a JSON array and
/// newline, flushed, and followed by the `,` that continues the endless
/// array.
#[derive(Debug)]
pub struct Emitter<W> {
    out: W,
    suppress_headers: bool,
    headers_written: usize,
    records_written: u64,
}

impl<W: AsyncWrite + Unpin> Emitter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            suppress_headers: false,
            headers_written: 0,
            records_written: 0,
        }
    }

    /// Drops header lines instead of writing them; used after a restart,
    /// when the display host has already seen the header.
    pub fn suppress_headers(mut self, suppress: bool) -> Self {
        self.suppress_headers = suppress;
        self
    }

    pub async fn header(&mut self, line: &[u8]) -> Result<(), RelayError> {
        if self.records_written > 0 || self.headers_written >= HEADER_LINES {
            warn!(
                headers_written = self.headers_written,
                records_written = self.records_written,
                "dropping late header line"
            );
            return Ok(());
        }
        self.headers_written += 1;
        if self.suppress_headers {
            trace!("suppressing header line on restart");
            return Ok(());
        }

        self.out.write_all(line).await.map_err(RelayError::Write)?;
        self.out.write_all(b"\n").await.map_err(RelayError::Write)?;
        self.out.flush().await.map_err(RelayError::Write)
    }

    pub async fn emit(&mut self, record: &Record) -> Result<(), RelayError> {
        let mut encoded = serde_json::to_vec(record).map_err(RelayError::Serialize)?;
        encoded.push(b'\n');
        self.out
            .write_all(&encoded)
            .await
            .map_err(RelayError::Write)?;
        self.out.flush().await.map_err(RelayError::Write)?;
        self.out.write_all(b",").await.map_err(RelayError::Write)?;
        self.records_written += 1;
        Ok(())
    }

    pub async fn restart_marker(&mut self) -> Result<(), RelayError> {
        self.out
            .write_all(RESTART_MARKER)
            .await
            .map_err(RelayError::Write)?;
        self.out.flush().await.map_err(RelayError::Write)
    }

    pub async fn flush(&mut self) -> Result<(), RelayError> {
        self.out.flush().await.map_err(RelayError::Write)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
