//! # sky-client: Rust client for the Sky behavioral database
//!
//! Sky stores timestamped events for objects inside tables and answers
//! SkyQL queries over them. This crate exposes that HTTP surface:
//!
//! - [`Client`] — table CRUD, ping, database-wide event streams
//! - [`Table`] — property CRUD, single-event CRUD, queries, stats and
//!   table-scoped event streams
//! - [`EventStream`] / [`TableEventStream`] — bulk ingest over one
//!   long-lived connection using chunked transfer encoding, built by
//!   hand over a raw socket (see `sky-wire`)
//!
//! ## Usage
//!
//! ```ignore
//! use sky_client::Client;
//! use sky_types::Event;
//!
//! let client = Client::new("localhost:8585");
//! let table = client.create_table("users")?;
//!
//! let mut stream = table.stream()?;
//! stream.insert_event("bob", &Event::at(chrono::Utc::now()))?;
//! stream.close()?;
//! ```
//!
//! All I/O is blocking and synchronous. A stream instance must not be
//! shared between threads without external serialization: interleaved
//! writes would corrupt the chunk framing and desynchronize the protocol
//! until the next reconnect.

mod client;
mod error;
mod http;
mod property;
mod stream;
mod table;

pub use client::{Client, DEFAULT_HOST, VERSION};
pub use error::{ClientError, ClientResult};
pub use property::{DataType, Property};
pub use stream::{EventStream, TableEventStream};
pub use table::{Stats, Table};

// Re-exported so callers can build events without naming sky-types.
pub use sky_types::{Event, Value};
