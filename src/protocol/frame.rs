//! Newline-delimited framing over a byte stream.
//!
//! Every message in either direction is one UTF-8 line terminated by
//! `\n`. [`FrameReader`] buffers partial reads and yields complete,
//! trimmed, non-empty lines. Bytes still buffered when the peer closes
//! without a final newline are dropped, never yielded.

use std::io;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bytes requested from the socket per read.
pub const READ_CHUNK: usize = 16 * 1024;

/// Splits a byte stream into newline-terminated frames.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    buffer: Vec<u8>,
    /// Length of the buffer prefix already known to hold no `\n`.
    scanned: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wraps `reader` with an empty buffer.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(READ_CHUNK),
            scanned: 0,
            eof: false,
        }
    }

    /// Returns the next complete frame, or `None` once the peer has closed.
    ///
    /// Cancel safe: if the future is dropped before completion, no bytes
    /// are lost and the next call resumes where this one stopped.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised by the underlying reader.
    pub async fn next_frame(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(frame) = self.pop_frame() {
                return Ok(Some(frame));
            }
            if self.eof {
                return Ok(None);
            }

            self.buffer.reserve(READ_CHUNK);
            let read = self.reader.read_buf(&mut self.buffer).await?;
            if read == 0 {
                self.eof = true;
                if !self.buffer.is_empty() {
                    tracing::debug!(
                        bytes = self.buffer.len(),
                        "discarding unterminated trailing data"
                    );
                    self.buffer.clear();
                    self.scanned = 0;
                }
            }
        }
    }

    /// Splits complete lines off the buffer, skipping blank ones.
    ///
    /// Only bytes past `scanned` are searched, so a long line arriving over
    /// many reads is scanned once in total.
    fn pop_frame(&mut self) -> Option<String> {
        loop {
            let newline = self
                .buffer
                .get(self.scanned..)
                .and_then(|rest| rest.iter().position(|b| *b == b'\n'));
            let Some(offset) = newline else {
                self.scanned = self.buffer.len();
                return None;
            };
            let pos = self.scanned.saturating_add(offset);
            self.scanned = 0;
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
}

/// Serializes `value` as one JSON line including the trailing newline.
///
/// # Errors
///
/// Returns an error if `value` cannot be serialized.
pub fn encode_frame<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Writes `value` as one frame and flushes.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = encode_frame(value)?;
    writer.write_all(&bytes).await?;
    writer.flush().await
}
