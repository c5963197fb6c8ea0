//! Client error types.

use sky_types::MalformedEventError;
use sky_wire::WireError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur during client operations.
///
/// Precondition violations (`IdRequired`, `TableNameRequired`,
/// `PropertyNameRequired`, `QueryRequired`) are detected before any I/O
/// is attempted, so a rejected call never leaves partial bytes on a
/// connection.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP dial failure.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The stream request header could not be written.
    #[error("stream handshake failed: {source}")]
    Handshake {
        #[source]
        source: std::io::Error,
    },

    /// Operation attempted on a broken or closed stream.
    #[error("stream is not connected")]
    NotConnected,

    /// A blank object identifier was supplied.
    #[error("object identifier required")]
    IdRequired,

    /// A blank table name was supplied.
    #[error("table name required")]
    TableNameRequired,

    /// A blank property name was supplied.
    #[error("property name required")]
    PropertyNameRequired,

    /// A blank query string was supplied.
    #[error("query required")]
    QueryRequired,

    /// JSON encoding or decoding failed.
    #[error("serialization failed: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    /// The close handshake returned a non-200 status line.
    #[error("server rejected stream: {status}")]
    ServerRejectedStream {
        /// The raw status line read from the socket.
        status: String,
    },

    /// The server answered a request with an error.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The server response could not be parsed as HTTP.
    #[error("malformed HTTP response: {reason}")]
    Http { reason: String },

    /// Chunk framing failure.
    #[error("wire protocol error: {0}")]
    Wire(#[from] WireError),

    /// Malformed event read back from the server.
    #[error("malformed event: {0}")]
    MalformedEvent(#[from] MalformedEventError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
