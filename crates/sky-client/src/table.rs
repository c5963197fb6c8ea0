//! Table handles: property CRUD, single-event CRUD, queries and stats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use sky_types::{Event, format_timestamp};

use crate::client::{Client, decode};
use crate::error::{ClientError, ClientResult};
use crate::property::Property;
use crate::stream::TableEventStream;

/// Wire shape of a table.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TableWire {
    pub name: String,
}

/// Basic statistics for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of events stored in the table.
    #[serde(rename = "count")]
    pub event_count: u64,
}

/// Handle to a single Sky table.
#[derive(Debug, Clone)]
pub struct Table {
    client: Client,
    name: String,
}

impl Table {
    pub(crate) fn new(client: Client, name: String) -> Self {
        Self { client, name }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retrieves a single property by name.
    pub fn property(&self, name: &str) -> ClientResult<Property> {
        if name.is_empty() {
            return Err(ClientError::PropertyNameRequired);
        }
        let response = self.client.send::<()>(
            "GET",
            &format!("/tables/{}/properties/{name}", self.name),
            None,
        )?;
        decode(&response)
    }

    /// Retrieves all properties on the table.
    pub fn properties(&self) -> ClientResult<Vec<Property>> {
        let response =
            self.client
                .send::<()>("GET", &format!("/tables/{}/properties", self.name), None)?;
        decode(&response)
    }

    /// Creates a property, returning the server's view of it.
    pub fn create_property(&self, property: &Property) -> ClientResult<Property> {
        if property.name.is_empty() {
            return Err(ClientError::PropertyNameRequired);
        }
        let response = self.client.send(
            "POST",
            &format!("/tables/{}/properties", self.name),
            Some(property),
        )?;
        decode(&response)
    }

    /// Renames a property.
    pub fn rename_property(&self, old_name: &str, new_name: &str) -> ClientResult<()> {
        if old_name.is_empty() || new_name.is_empty() {
            return Err(ClientError::PropertyNameRequired);
        }
        self.client.send(
            "PATCH",
            &format!("/tables/{}/properties/{old_name}", self.name),
            Some(&json!({ "name": new_name })),
        )?;
        Ok(())
    }

    /// Removes a property from the table.
    pub fn delete_property(&self, name: &str) -> ClientResult<()> {
        if name.is_empty() {
            return Err(ClientError::PropertyNameRequired);
        }
        self.client.send::<()>(
            "DELETE",
            &format!("/tables/{}/properties/{name}", self.name),
            None,
        )?;
        Ok(())
    }

    /// Fetches the event for an object at an exact timestamp, if any.
    pub fn event(&self, id: &str, timestamp: DateTime<Utc>) -> ClientResult<Option<Event>> {
        if id.is_empty() {
            return Err(ClientError::IdRequired);
        }
        let response = self
            .client
            .send::<()>("GET", &self.event_path(id, timestamp), None)?;
        let obj: Map<String, JsonValue> = decode(&response)?;
        if obj.is_empty() {
            return Ok(None);
        }
        Ok(Some(Event::from_wire(&obj)?))
    }

    /// Lists all events for an object, oldest first.
    pub fn events(&self, id: &str) -> ClientResult<Vec<Event>> {
        if id.is_empty() {
            return Err(ClientError::IdRequired);
        }
        let response = self.client.send::<()>(
            "GET",
            &format!("/tables/{}/objects/{id}/events", self.name),
            None,
        )?;
        let objs: Vec<Map<String, JsonValue>> = decode(&response)?;
        objs.iter()
            .map(|obj| Ok(Event::from_wire(obj)?))
            .collect()
    }

    /// Adds an event for an object, merging into any event already stored
    /// at the same timestamp.
    pub fn insert_event(&self, id: &str, event: &Event) -> ClientResult<()> {
        if id.is_empty() {
            return Err(ClientError::IdRequired);
        }
        self.client.send(
            "PATCH",
            &self.event_path(id, event.timestamp),
            Some(&JsonValue::Object(event.to_wire())),
        )?;
        Ok(())
    }

    /// Deletes the event for an object at the given time.
    pub fn delete_event(&self, id: &str, timestamp: DateTime<Utc>) -> ClientResult<()> {
        if id.is_empty() {
            return Err(ClientError::IdRequired);
        }
        self.client
            .send::<()>("DELETE", &self.event_path(id, timestamp), None)?;
        Ok(())
    }

    /// Deletes all events for an object.
    pub fn delete_events(&self, id: &str) -> ClientResult<()> {
        if id.is_empty() {
            return Err(ClientError::IdRequired);
        }
        self.client.send::<()>(
            "DELETE",
            &format!("/tables/{}/objects/{id}/events", self.name),
            None,
        )?;
        Ok(())
    }

    /// Opens a bulk event stream scoped to this table.
    pub fn stream(&self) -> ClientResult<TableEventStream> {
        TableEventStream::connect(&self.client, &self.name)
    }

    /// Retrieves basic statistics on the table.
    pub fn stats(&self) -> ClientResult<Stats> {
        let response =
            self.client
                .send::<()>("GET", &format!("/tables/{}/stats", self.name), None)?;
        decode(&response)
    }

    /// Executes a SkyQL query and returns the raw result object.
    pub fn query(&self, query: &str) -> ClientResult<Map<String, JsonValue>> {
        if query.is_empty() {
            return Err(ClientError::QueryRequired);
        }
        let response =
            self.client
                .send_text("POST", &format!("/tables/{}/query", self.name), query)?;
        decode(&response)
    }

    fn event_path(&self, id: &str, timestamp: DateTime<Utc>) -> String {
        format!(
            "/tables/{}/objects/{id}/events/{}",
            self.name,
            format_timestamp(&timestamp)
        )
    }
}
