//! Client handle and table management.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::http::{self, BodyKind, HttpResponse};
use crate::stream::EventStream;
use crate::table::{Table, TableWire};

/// Sky server version this library targets.
pub const VERSION: &str = "0.4.0";

/// Host used when none is configured.
pub const DEFAULT_HOST: &str = "localhost:8585";

/// Handle to a Sky server.
///
/// Cheap to clone; every request opens its own short-lived connection,
/// so a client holds no sockets of its own.
#[derive(Debug, Clone)]
pub struct Client {
    host: String,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(DEFAULT_HOST)
    }
}

impl Client {
    /// Creates a client for the given `host:port`.
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// The `host:port` this client targets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Retrieves a reference to a single table.
    pub fn table(&self, name: &str) -> ClientResult<Table> {
        if name.is_empty() {
            return Err(ClientError::TableNameRequired);
        }
        let response = self.send::<()>("GET", &format!("/tables/{name}"), None)?;
        let wire: TableWire = decode(&response)?;
        Ok(Table::new(self.clone(), wire.name))
    }

    /// Retrieves all tables on the server.
    pub fn tables(&self) -> ClientResult<Vec<Table>> {
        let response = self.send::<()>("GET", "/tables", None)?;
        let wires: Vec<TableWire> = decode(&response)?;
        Ok(wires
            .into_iter()
            .map(|wire| Table::new(self.clone(), wire.name))
            .collect())
    }

    /// Creates a table and returns a handle to it.
    pub fn create_table(&self, name: &str) -> ClientResult<Table> {
        if name.is_empty() {
            return Err(ClientError::TableNameRequired);
        }
        let body = TableWire {
            name: name.to_string(),
        };
        let response = self.send("POST", "/tables", Some(&body))?;
        let wire: TableWire = decode(&response)?;
        debug!(table = %wire.name, "table created");
        Ok(Table::new(self.clone(), wire.name))
    }

    /// Deletes a table.
    pub fn delete_table(&self, name: &str) -> ClientResult<()> {
        if name.is_empty() {
            return Err(ClientError::TableNameRequired);
        }
        self.send::<()>("DELETE", &format!("/tables/{name}"), None)?;
        Ok(())
    }

    /// Returns true when the server answers its ping endpoint.
    pub fn ping(&self) -> bool {
        self.send::<()>("GET", "/ping", None).is_ok()
    }

    /// Opens a database-wide bulk event stream.
    ///
    /// Records on this stream name their table explicitly; use
    /// [`Table::stream`] for a table-scoped stream.
    pub fn stream(&self) -> ClientResult<EventStream> {
        EventStream::connect(self)
    }

    /// Sends a JSON request and rejects non-200 responses.
    pub(crate) fn send<B: Serialize>(
        &self,
        method: &str,
        path: &str,
        body: Option<&B>,
    ) -> ClientResult<HttpResponse> {
        let payload = match body {
            Some(value) => Some(serde_json::to_vec(value)?),
            None => None,
        };
        let response = http::send_request(
            &self.host,
            method,
            path,
            payload.as_deref().map(|bytes| (bytes, BodyKind::Json)),
        )?;
        check_status(method, path, response)
    }

    /// Sends a raw text request (used for queries) and rejects non-200
    /// responses.
    pub(crate) fn send_text(
        &self,
        method: &str,
        path: &str,
        text: &str,
    ) -> ClientResult<HttpResponse> {
        let response = http::send_request(
            &self.host,
            method,
            path,
            Some((text.as_bytes(), BodyKind::Text)),
        )?;
        check_status(method, path, response)
    }
}

/// Error envelope the server attaches to failed requests when it can.
#[derive(serde::Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: String,
}

fn check_status(method: &str, path: &str, response: HttpResponse) -> ClientResult<HttpResponse> {
    if response.status == 200 {
        return Ok(response);
    }
    let message = match serde_json::from_slice::<ErrorEnvelope>(&response.body) {
        Ok(envelope) if !envelope.message.is_empty() => envelope.message,
        _ => format!("{method} {path}"),
    };
    Err(ClientError::Server {
        status: response.status,
        message,
    })
}

/// Decodes a JSON response body.
pub(crate) fn decode<R: DeserializeOwned>(response: &HttpResponse) -> ClientResult<R> {
    Ok(serde_json::from_slice(&response.body)?)
}
