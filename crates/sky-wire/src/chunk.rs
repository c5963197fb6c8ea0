//! HTTP chunk framing: one chunk per logical write.

use std::io::{self, Write};

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

/// Errors from chunk framing.
#[derive(Debug, Error)]
pub enum WireError {
    /// The chunk size line could not be written.
    #[error("chunk size line write failed: {source}")]
    SizeLine {
        #[source]
        source: io::Error,
    },

    /// The chunk body could not be written in full.
    #[error("chunk body write failed after {written} bytes: {source}")]
    Body {
        /// Body bytes that reached the sink before the failure.
        written: usize,
        #[source]
        source: io::Error,
    },

    /// The chunk trailer could not be written.
    #[error("chunk trailer write failed after {written} body bytes: {source}")]
    Trailer {
        /// Body bytes that reached the sink before the failure.
        written: usize,
        #[source]
        source: io::Error,
    },

    /// A decoded chunk size line is not valid hexadecimal.
    #[error("invalid chunk size line: {line:?}")]
    InvalidSizeLine {
        /// The offending size line, lossily decoded.
        line: String,
    },

    /// A decoded chunk body is not followed by CRLF.
    #[error("chunk body missing CRLF trailer")]
    MissingTrailer,
}

impl WireError {
    /// Body bytes that reached the sink before the failure, if any.
    pub fn bytes_written(&self) -> usize {
        match self {
            WireError::Body { written, .. } | WireError::Trailer { written, .. } => *written,
            _ => 0,
        }
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            WireError::SizeLine { source }
            | WireError::Body { source, .. }
            | WireError::Trailer { source, .. } => source.kind(),
            WireError::InvalidSizeLine { .. } | WireError::MissingTrailer => {
                io::ErrorKind::InvalidData
            }
        }
    }
}

impl From<WireError> for io::Error {
    fn from(err: WireError) -> Self {
        io::Error::new(err.io_kind(), err)
    }
}

/// Adapts a byte sink so that every write is emitted as one HTTP chunk.
///
/// Each call produces exactly one chunk, immediately; there is no
/// buffering here. Stack a `std::io::BufWriter` on top to coalesce small
/// writes into larger chunks.
#[derive(Debug)]
pub struct ChunkWriter<W> {
    sink: W,
}

impl<W: Write> ChunkWriter<W> {
    /// Wraps a sink.
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Returns a mutable reference to the underlying sink.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Consumes the framer, returning the underlying sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Writes one chunk: lowercase-hex size line, body, CRLF trailer.
    ///
    /// An empty `body` is the terminating chunk of the stream and still
    /// emits exactly `0\r\n\r\n`. Returns the number of body bytes
    /// written; on failure the error names the stage that failed and how
    /// many body bytes had already reached the sink.
    pub fn write_chunk(&mut self, body: &[u8]) -> Result<usize, WireError> {
        write!(self.sink, "{:x}\r\n", body.len())
            .map_err(|source| WireError::SizeLine { source })?;

        let mut written = 0;
        let mut rest = body;
        while !rest.is_empty() {
            match self.sink.write(rest) {
                Ok(0) => {
                    return Err(WireError::Body {
                        written,
                        source: io::Error::new(
                            io::ErrorKind::WriteZero,
                            "sink accepted no bytes",
                        ),
                    });
                }
                Ok(n) => {
                    written += n;
                    rest = &rest[n..];
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(source) => return Err(WireError::Body { written, source }),
            }
        }

        self.sink
            .write_all(b"\r\n")
            .map_err(|source| WireError::Trailer { written, source })?;
        Ok(written)
    }
}

impl<W: Write> Write for ChunkWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.write_chunk(buf)?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

/// One decoded chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk payload. Empty for the terminating chunk.
    pub payload: Bytes,
}

impl Chunk {
    /// Attempts to decode one chunk from the front of `buf`.
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a complete
    /// chunk; bytes are consumed from `buf` only on success.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Chunk>, WireError> {
        let Some(line_end) = find_crlf(buf) else {
            return Ok(None);
        };

        let size = std::str::from_utf8(&buf[..line_end])
            .ok()
            .and_then(|line| usize::from_str_radix(line, 16).ok())
            .ok_or_else(|| WireError::InvalidSizeLine {
                line: String::from_utf8_lossy(&buf[..line_end]).into_owned(),
            })?;

        let body_start = line_end + 2;
        let total = body_start + size + 2;
        if buf.len() < total {
            return Ok(None);
        }
        if &buf[body_start + size..total] != b"\r\n" {
            return Err(WireError::MissingTrailer);
        }

        buf.advance(body_start);
        let payload = buf.split_to(size).freeze();
        buf.advance(2);
        Ok(Some(Chunk { payload }))
    }

    /// True when this is the zero-length chunk that terminates a stream.
    pub fn is_terminator(&self) -> bool {
        self.payload.is_empty()
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == b"\r\n")
}
