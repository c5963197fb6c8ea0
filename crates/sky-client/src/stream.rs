//! Bulk event streaming over chunked HTTP.
//!
//! A stream holds one TCP connection. At connect time a fixed PATCH
//! request header announcing chunked transfer encoding is written, then
//! each inserted event is encoded as one JSON record into a buffered
//! writer whose flushes become HTTP chunks:
//!
//! ```text
//! JSON records → BufWriter → ChunkWriter → TcpStream
//! ```
//!
//! Each layer exclusively owns the one beneath it; reconnect replaces the
//! whole stack at once. Closing flushes, writes the zero-length
//! terminating chunk and reads the server's status line, releasing the
//! socket whether or not the server accepted the stream.

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::mem;
use std::net::{Shutdown, TcpStream};

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use sky_types::Event;
use sky_wire::ChunkWriter;

use crate::client::Client;
use crate::error::{ClientError, ClientResult};
use crate::table::Table;

/// Capacity of the buffered writer between the JSON encoder and the
/// chunk framer. One flush of this buffer becomes one chunk.
const WRITE_BUFFER_SIZE: usize = 8 * 1024;

/// Status-line prefix the server sends when it accepted the stream.
const CLOSE_OK_PREFIX: &str = "HTTP/1.0 200";

/// Builds the fixed connect-time request header for a stream path.
fn stream_header(host: &str, path: &str) -> Vec<u8> {
    format!(
        "PATCH {path} HTTP/1.0\r\nHost: {host}\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n"
    )
    .into_bytes()
}

/// The owned writer stack plus a cloned read handle for the close
/// handshake. Torn down and rebuilt as one unit.
struct Stack {
    encoder: BufWriter<ChunkWriter<TcpStream>>,
    reader: TcpStream,
}

impl Stack {
    /// Dials the server and writes the fixed request header.
    fn connect(host: &str, header: &[u8]) -> ClientResult<Self> {
        let mut socket = TcpStream::connect(host).map_err(|source| ClientError::Connect {
            addr: host.to_string(),
            source,
        })?;
        let reader = socket.try_clone().map_err(|source| ClientError::Connect {
            addr: host.to_string(),
            source,
        })?;

        if let Err(source) = socket.write_all(header) {
            let _ = socket.shutdown(Shutdown::Both);
            return Err(ClientError::Handshake { source });
        }

        Ok(Self {
            encoder: BufWriter::with_capacity(WRITE_BUFFER_SIZE, ChunkWriter::new(socket)),
            reader,
        })
    }

    /// Encodes one record plus a newline into the buffered writer.
    fn encode(&mut self, record: &Map<String, JsonValue>) -> Result<(), serde_json::Error> {
        serde_json::to_writer(&mut self.encoder, record)?;
        self.encoder
            .write_all(b"\n")
            .map_err(serde_json::Error::io)?;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }

    /// Runs the close handshake, then shuts the socket down on every
    /// path, success or failure.
    fn finish(mut self) -> ClientResult<()> {
        let result = self.terminate();
        let _ = self.reader.shutdown(Shutdown::Both);
        result
    }

    /// Flush, terminating chunk, status line.
    fn terminate(&mut self) -> ClientResult<()> {
        self.encoder.flush()?;
        self.encoder.get_mut().write_chunk(&[])?;

        let mut line = Vec::new();
        BufReader::new(&self.reader).read_until(b'\r', &mut line)?;
        let status = String::from_utf8_lossy(&line)
            .trim_end_matches('\r')
            .to_string();
        if status.starts_with(CLOSE_OK_PREFIX) {
            Ok(())
        } else {
            Err(ClientError::ServerRejectedStream { status })
        }
    }

    /// Drops the stack, shutting the socket down without a handshake.
    fn abort(self) {
        let _ = self.reader.shutdown(Shutdown::Both);
    }
}

/// A live half-duplex ingest connection: the engine shared by both
/// stream variants, which differ only in the request path they announce
/// and the identity fields they inject into each record.
///
/// After an I/O failure the stream is broken: `insert`/`flush` refuse
/// without touching the socket, and only `reconnect` (or closing, which
/// still releases the socket) remains valid. Closing consumes the
/// stream, so no operation can reach a closed connection.
struct StreamConn {
    host: String,
    header: Vec<u8>,
    stack: Stack,
    broken: bool,
}

impl StreamConn {
    /// Opens a new connection with the given fixed header.
    fn connect(host: String, header: Vec<u8>) -> ClientResult<Self> {
        let stack = Stack::connect(&host, &header)?;
        debug!(host = %host, "event stream connected");
        Ok(Self {
            host,
            header,
            stack,
            broken: false,
        })
    }

    /// Replaces the socket and writer stack with a fresh connection.
    ///
    /// The new stack is fully established before the old one is torn
    /// down: on failure the previous state is left untouched, and no
    /// partially-rebuilt state is ever observable.
    fn reconnect(&mut self) -> ClientResult<()> {
        let stack = Stack::connect(&self.host, &self.header)?;
        mem::replace(&mut self.stack, stack).abort();
        self.broken = false;
        debug!(host = %self.host, "event stream reconnected");
        Ok(())
    }

    /// Appends one record to the write buffer.
    fn insert(&mut self, record: &Map<String, JsonValue>) -> ClientResult<()> {
        if self.broken {
            return Err(ClientError::NotConnected);
        }
        match self.stack.encode(record) {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.is_io() {
                    self.broken = true;
                }
                Err(ClientError::Serialization { source: err })
            }
        }
    }

    /// Pushes buffered records to the server. An empty buffer emits no
    /// chunk.
    fn flush(&mut self) -> ClientResult<()> {
        if self.broken {
            return Err(ClientError::NotConnected);
        }
        match self.stack.flush() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.broken = true;
                Err(ClientError::Io(err))
            }
        }
    }

    /// Flush, terminating chunk, status check; the socket is released on
    /// every path, including a broken stream whose handshake cannot
    /// succeed.
    fn close(self) -> ClientResult<()> {
        let result = self.stack.finish();
        debug!(host = %self.host, "event stream closed");
        result
    }
}

/// Bulk stream carrying events for any table. Each record names its
/// table explicitly; the connection path is table-agnostic.
pub struct EventStream {
    conn: StreamConn,
}

impl EventStream {
    /// Opens a database-wide event stream.
    pub(crate) fn connect(client: &Client) -> ClientResult<Self> {
        let host = client.host().to_string();
        let header = stream_header(&host, "/events");
        Ok(Self {
            conn: StreamConn::connect(host, header)?,
        })
    }

    /// Sends one event for object `id` in `table` through the stream.
    ///
    /// The record lands in the write buffer; it reaches the server on the
    /// next [`flush`](Self::flush) or on [`close`](Self::close).
    pub fn insert_event(&mut self, table: &Table, id: &str, event: &Event) -> ClientResult<()> {
        if id.is_empty() {
            return Err(ClientError::IdRequired);
        }
        if table.name().is_empty() {
            return Err(ClientError::TableNameRequired);
        }
        let mut record = event.to_wire();
        record.insert("id".to_string(), JsonValue::String(id.to_string()));
        record.insert(
            "table".to_string(),
            JsonValue::String(table.name().to_string()),
        );
        self.conn.insert(&record)
    }

    /// Pushes buffered records to the server as one chunk.
    pub fn flush(&mut self) -> ClientResult<()> {
        self.conn.flush()
    }

    /// Re-dials the server, replacing the socket and writer stack.
    /// Buffered-but-unflushed records are lost.
    pub fn reconnect(&mut self) -> ClientResult<()> {
        self.conn.reconnect()
    }

    /// Ends the stream and reads the server's acknowledgment.
    pub fn close(self) -> ClientResult<()> {
        self.conn.close()
    }
}

/// Bulk stream scoped to one table; the table identity is implicit in
/// the connection's request path, so records carry only `id`.
pub struct TableEventStream {
    conn: StreamConn,
}

impl TableEventStream {
    /// Opens an event stream scoped to `table_name`.
    pub(crate) fn connect(client: &Client, table_name: &str) -> ClientResult<Self> {
        if table_name.is_empty() {
            return Err(ClientError::TableNameRequired);
        }
        let host = client.host().to_string();
        let header = stream_header(&host, &format!("/tables/{table_name}/events"));
        Ok(Self {
            conn: StreamConn::connect(host, header)?,
        })
    }

    /// Sends one event for object `id` through the stream.
    ///
    /// The record lands in the write buffer; it reaches the server on the
    /// next [`flush`](Self::flush) or on [`close`](Self::close).
    pub fn insert_event(&mut self, id: &str, event: &Event) -> ClientResult<()> {
        if id.is_empty() {
            return Err(ClientError::IdRequired);
        }
        let mut record = event.to_wire();
        record.insert("id".to_string(), JsonValue::String(id.to_string()));
        self.conn.insert(&record)
    }

    /// Pushes buffered records to the server as one chunk.
    pub fn flush(&mut self) -> ClientResult<()> {
        self.conn.flush()
    }

    /// Re-dials the server, replacing the socket and writer stack.
    /// Buffered-but-unflushed records are lost.
    pub fn reconnect(&mut self) -> ClientResult<()> {
        self.conn.reconnect()
    }

    /// Ends the stream and reads the server's acknowledgment.
    pub fn close(self) -> ClientResult<()> {
        self.conn.close()
    }
}
