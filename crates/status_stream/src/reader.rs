use tracing::{debug, trace};

use crate::config::ReaderLimits;
use crate::error::ProtocolError;
use crate::field::Record;

/// Number of preamble lines preceding the body: the version object and `[`.
pub const HEADER_LINES: usize = 2;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ReaderPhase {
    Header { lines_remaining: usize },
    Body,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// A header line, without its terminating newline, byte-for-byte.
    Header(Vec<u8>),
    Record(Record),
}

/// Incremental reader for the i3bar protocol.
///
/// Chunks may split lines anywhere; unterminated bytes are carried over to
/// the next [`ProtocolReader::feed`] call and never parsed on their own.
#[derive(Debug)]
pub struct ProtocolReader {
    phase: ReaderPhase,
    carry: Vec<u8>,
    limits: ReaderLimits,
    body_lines: usize,
}

impl Default for ProtocolReader {
    fn default() -> Self {
        Self::new(ReaderLimits::default())
    }
}

impl ProtocolReader {
    pub fn new(limits: ReaderLimits) -> Self {
        Self {
            phase: ReaderPhase::Header {
                lines_remaining: HEADER_LINES,
            },
            carry: Vec::new(),
            limits,
            body_lines: 0,
        }
    }

    pub fn phase(&self) -> ReaderPhase {
        self.phase
    }

    /// Bytes received after the last newline.
    pub fn pending_bytes(&self) -> usize {
        self.carry.len()
    }

    /// Consumes one chunk, handing each header line and record to `sink` as
    /// soon as its line completes.
    ///
    /// Items completed before a failing line have already reached `sink`
    /// when the error is returned.
    pub fn feed<F>(&mut self, chunk: &[u8], mut sink: F) -> Result<(), ProtocolError>
    where
        F: FnMut(StreamItem),
    {
        let mut buffer = std::mem::take(&mut self.carry);
        buffer.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            self.check_len(end - start)?;
            if let Some(item) = self.handle_line(&buffer[start..end])? {
                sink(item);
            }
            start = end + 1;
        }

        buffer.drain(..start);
        self.check_len(buffer.len())?;
        self.carry = buffer;
        Ok(())
    }

    fn check_len(&self, observed_bytes: usize) -> Result<(), ProtocolError> {
        if observed_bytes > self.limits.max_line_bytes {
            return Err(ProtocolError::LineTooLong {
                observed_bytes,
                max_line_bytes: self.limits.max_line_bytes,
            });
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &[u8]) -> Result<Option<StreamItem>, ProtocolError> {
        match self.phase {
            ReaderPhase::Header { lines_remaining } => {
                let lines_remaining = lines_remaining - 1;
                self.phase = if lines_remaining == 0 {
                    debug!("status header complete");
                    ReaderPhase::Body
                } else {
                    ReaderPhase::Header { lines_remaining }
                };
                Ok(Some(StreamItem::Header(line.to_vec())))
            }
            ReaderPhase::Body => {
                self.body_lines += 1;
                let record = parse_body_line(line, self.body_lines)?;
                if record.is_none() {
                    trace!(line_number = self.body_lines, "skipping separator-only line");
                }
                Ok(record.map(StreamItem::Record))
            }
        }
    }
}

/// Parses one body line, tolerating the `,` separator and whitespace around it.
///
/// Returns `Ok(None)` for lines holding nothing but separator/whitespace.
pub(crate) fn parse_body_line(
    line: &[u8],
    line_number: usize,
) -> Result<Option<Record>, ProtocolError> {
    let body = trim_separator(line);
    let Some(&first) = body.first() else {
        return Ok(None);
    };
    if first != b'[' {
        return Err(ProtocolError::UnexpectedByte {
            line_number,
            byte: first,
            line: String::from_utf8_lossy(line).into_owned(),
        });
    }

    serde_json::from_slice::<Record>(body)
        .map(Some)
        .map_err(|source| ProtocolError::InvalidJson {
            line_number,
            line: String::from_utf8_lossy(line).into_owned(),
            source,
        })
}

fn trim_separator(line: &[u8]) -> &[u8] {
    let line = trim_whitespace(line);
    let line = line.strip_prefix(b",").unwrap_or(line);
    let line = trim_whitespace(line);
    let line = line.strip_suffix(b",").unwrap_or(line);
    trim_whitespace(line)
}

fn trim_whitespace(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if !is_protocol_whitespace(*first) {
            break;
        }
        bytes = rest;
    }
    while let [rest @ .., last] = bytes {
        if !is_protocol_whitespace(*last) {
            break;
        }
        bytes = rest;
    }
    bytes
}

fn is_protocol_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}
