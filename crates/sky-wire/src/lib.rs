//! # sky-wire: Wire framing for the Sky client
//!
//! Sky's bulk ingest path speaks HTTP/1.0 with chunked transfer encoding
//! constructed by hand over a raw socket. This crate provides both halves
//! of that framing:
//!
//! - [`ChunkWriter`] — wraps a byte sink and re-emits every logical write
//!   as one chunk (`<hex size>\r\n<body>\r\n`, terminated by `0\r\n\r\n`)
//! - [`Chunk`] — incremental decoder that consumes complete chunks from
//!   the front of a receive buffer
//!
//! The framer holds no buffer of its own; batching belongs to the layer
//! above it.

mod chunk;

pub use chunk::{Chunk, ChunkWriter, WireError};
