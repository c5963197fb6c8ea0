//! In-process mock of the Sky server's HTTP surface.
//!
//! Speaks just enough HTTP/1.0 for the client: plain request/response
//! with `Content-Length` bodies, and chunked PATCH ingest on the event
//! stream paths. Events merge by `(object id, timestamp)` the way the
//! real server does, so the boundary contracts can be asserted end to
//! end.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use bytes::BytesMut;
use serde_json::{Map, Value as JsonValue, json};
use sky_types::parse_timestamp;
use sky_wire::Chunk;

/// Events are keyed by object id and literal wire timestamp.
type EventKey = (String, String);

#[derive(Default)]
struct TableState {
    properties: Vec<Map<String, JsonValue>>,
    events: BTreeMap<EventKey, Map<String, JsonValue>>,
}

impl TableState {
    fn event_count(&self) -> usize {
        self.events.len()
    }
}

#[derive(Default)]
struct State {
    tables: BTreeMap<String, TableState>,
}

/// Handle to a running mock server. The listener thread lives for the
/// duration of the test process.
pub struct MockSky {
    addr: String,
    state: Arc<Mutex<State>>,
    kill_next_stream: Arc<AtomicBool>,
    reject_stream_close: Arc<AtomicBool>,
    stream_records: Arc<AtomicUsize>,
}

impl MockSky {
    /// Binds an ephemeral port and starts serving.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let addr = listener.local_addr().expect("local addr").to_string();

        let state = Arc::new(Mutex::new(State::default()));
        let kill_next_stream = Arc::new(AtomicBool::new(false));
        let reject_stream_close = Arc::new(AtomicBool::new(false));
        let stream_records = Arc::new(AtomicUsize::new(0));

        {
            let state = Arc::clone(&state);
            let kill = Arc::clone(&kill_next_stream);
            let reject = Arc::clone(&reject_stream_close);
            let records = Arc::clone(&stream_records);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { break };
                    let state = Arc::clone(&state);
                    let kill = Arc::clone(&kill);
                    let reject = Arc::clone(&reject);
                    let records = Arc::clone(&records);
                    thread::spawn(move || {
                        handle_connection(stream, &state, &kill, &reject, &records);
                    });
                }
            });
        }

        Self {
            addr,
            state,
            kill_next_stream,
            reject_stream_close,
            stream_records,
        }
    }

    /// `host:port` the server listens on.
    pub fn host(&self) -> String {
        self.addr.clone()
    }

    /// Drop the next stream connection right after its request header.
    pub fn kill_next_stream(&self) {
        self.kill_next_stream.store(true, Ordering::SeqCst);
    }

    /// Answer the next stream close handshake with a non-200 status.
    pub fn reject_next_stream_close(&self) {
        self.reject_stream_close.store(true, Ordering::SeqCst);
    }

    /// Total records ingested over stream connections.
    pub fn stream_record_count(&self) -> usize {
        self.stream_records.load(Ordering::SeqCst)
    }
}

fn handle_connection(
    mut stream: TcpStream,
    state: &Mutex<State>,
    kill: &AtomicBool,
    reject: &AtomicBool,
    records: &AtomicUsize,
) {
    let Some((head, leftover)) = read_head(&mut stream) else {
        return;
    };

    let mut lines = head.lines();
    let Some(request_line) = lines.next() else {
        return;
    };
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
        return;
    };
    let method = method.to_string();
    let path = path.to_string();

    let mut content_length = 0usize;
    let mut chunked = false;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name.to_ascii_lowercase().as_str() {
            "content-length" => content_length = value.parse().unwrap_or(0),
            "transfer-encoding" => chunked = value.eq_ignore_ascii_case("chunked"),
            _ => {}
        }
    }

    if chunked {
        ingest_stream(&mut stream, leftover, &path, state, kill, reject, records);
        return;
    }

    let mut body = leftover;
    while body.len() < content_length {
        let mut buf = [0u8; 4096];
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => body.extend_from_slice(&buf[..n]),
        }
    }

    let (status, reply) = dispatch(&method, &path, &body, state);
    respond(&mut stream, status, &reply);
}

/// Reads up to the end of the request header, returning the header text
/// and any body bytes already received.
fn read_head(stream: &mut TcpStream) -> Option<(String, Vec<u8>)> {
    let mut raw = Vec::new();
    loop {
        if let Some(pos) = raw.windows(4).position(|quad| quad == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&raw[..pos]).into_owned();
            let leftover = raw[pos + 4..].to_vec();
            return Some((head, leftover));
        }
        let mut buf = [0u8; 4096];
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return None,
            Ok(n) => raw.extend_from_slice(&buf[..n]),
        }
    }
}

/// Consumes a chunked event stream, applying each NDJSON record, then
/// answers the close handshake.
fn ingest_stream(
    stream: &mut TcpStream,
    leftover: Vec<u8>,
    path: &str,
    state: &Mutex<State>,
    kill: &AtomicBool,
    reject: &AtomicBool,
    records: &AtomicUsize,
) {
    if kill.swap(false, Ordering::SeqCst) {
        let _ = stream.shutdown(Shutdown::Both);
        return;
    }

    // "/tables/{name}/events" fixes the table; "/events" leaves it to
    // each record.
    let default_table = path
        .strip_prefix("/tables/")
        .and_then(|rest| rest.strip_suffix("/events"))
        .map(str::to_string);

    let mut buf = BytesMut::from(&leftover[..]);
    let mut body = Vec::new();
    'outer: loop {
        while let Some(chunk) = Chunk::decode(&mut buf).expect("well-formed chunk stream") {
            if chunk.is_terminator() {
                break 'outer;
            }
            body.extend_from_slice(&chunk.payload);
        }
        let mut read_buf = [0u8; 4096];
        match stream.read(&mut read_buf) {
            Ok(0) | Err(_) => return, // connection died before the terminator
            Ok(n) => buf.extend_from_slice(&read_buf[..n]),
        }
    }

    for line in body.split(|byte| *byte == b'\n') {
        if line.is_empty() {
            continue;
        }
        let record: Map<String, JsonValue> =
            serde_json::from_slice(line).expect("well-formed stream record");
        apply_record(&record, default_table.as_deref(), state);
        records.fetch_add(1, Ordering::SeqCst);
    }

    let status = if reject.swap(false, Ordering::SeqCst) {
        "HTTP/1.0 422 Unprocessable Entity\r\n\r\n"
    } else {
        "HTTP/1.0 200 OK\r\n\r\n"
    };
    let _ = stream.write_all(status.as_bytes());
    let _ = stream.shutdown(Shutdown::Both);
}

fn apply_record(record: &Map<String, JsonValue>, default_table: Option<&str>, state: &Mutex<State>) {
    let table = record
        .get("table")
        .and_then(JsonValue::as_str)
        .or(default_table)
        .expect("record names a table")
        .to_string();
    let id = record
        .get("id")
        .and_then(JsonValue::as_str)
        .expect("record carries an id")
        .to_string();
    let timestamp = record
        .get("timestamp")
        .and_then(JsonValue::as_str)
        .expect("record carries a timestamp")
        .to_string();
    let data = match record.get("data") {
        Some(JsonValue::Object(fields)) => fields.clone(),
        _ => Map::new(),
    };

    let mut state = state.lock().unwrap();
    let table_state = state.tables.entry(table).or_default();
    merge_event(table_state, (id, timestamp), data);
}

/// Server-side merge: later values win per field, earlier fields persist.
fn merge_event(table: &mut TableState, key: EventKey, data: Map<String, JsonValue>) {
    let stored = table.events.entry(key).or_default();
    for (name, value) in data {
        stored.insert(name, value);
    }
}

fn respond(stream: &mut TcpStream, status: u16, body: &JsonValue) {
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        _ => "Error",
    };
    let body = body.to_string();
    let reply = format!(
        "HTTP/1.0 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(reply.as_bytes());
    let _ = stream.shutdown(Shutdown::Both);
}

fn dispatch(method: &str, path: &str, body: &[u8], state: &Mutex<State>) -> (u16, JsonValue) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut state = state.lock().unwrap();

    match (method, segments.as_slice()) {
        ("GET", ["ping"]) => (200, json!({})),

        ("GET", ["tables"]) => {
            let tables: Vec<JsonValue> = state
                .tables
                .keys()
                .map(|name| json!({ "name": name }))
                .collect();
            (200, JsonValue::Array(tables))
        }
        ("POST", ["tables"]) => {
            let request: Map<String, JsonValue> = serde_json::from_slice(body).unwrap_or_default();
            let Some(name) = request.get("name").and_then(JsonValue::as_str) else {
                return (400, json!({"message": "table name required"}));
            };
            state.tables.entry(name.to_string()).or_default();
            (200, json!({ "name": name }))
        }
        ("GET", ["tables", name]) => {
            if state.tables.contains_key(*name) {
                (200, json!({ "name": name }))
            } else {
                (404, json!({"message": "table not found"}))
            }
        }
        ("DELETE", ["tables", name]) => {
            state.tables.remove(*name);
            (200, json!({}))
        }

        ("GET", ["tables", name, "properties"]) => match state.tables.get(*name) {
            Some(table) => {
                let mut properties = table.properties.clone();
                properties.sort_by(|a, b| {
                    a.get("name")
                        .and_then(JsonValue::as_str)
                        .cmp(&b.get("name").and_then(JsonValue::as_str))
                });
                (
                    200,
                    JsonValue::Array(properties.into_iter().map(JsonValue::Object).collect()),
                )
            }
            None => (404, json!({"message": "table not found"})),
        },
        ("POST", ["tables", name, "properties"]) => {
            let Ok(property) = serde_json::from_slice::<Map<String, JsonValue>>(body) else {
                return (400, json!({"message": "invalid property"}));
            };
            match state.tables.get_mut(*name) {
                Some(table) => {
                    table.properties.push(property.clone());
                    (200, JsonValue::Object(property))
                }
                None => (404, json!({"message": "table not found"})),
            }
        }
        ("GET", ["tables", name, "properties", property]) => match state.tables.get(*name) {
            Some(table) => table
                .properties
                .iter()
                .find(|p| p.get("name").and_then(JsonValue::as_str) == Some(*property))
                .map_or(
                    (404, json!({"message": "property not found"})),
                    |p| (200, JsonValue::Object(p.clone())),
                ),
            None => (404, json!({"message": "table not found"})),
        },
        ("PATCH", ["tables", name, "properties", property]) => {
            let request: Map<String, JsonValue> = serde_json::from_slice(body).unwrap_or_default();
            let Some(new_name) = request.get("name").and_then(JsonValue::as_str) else {
                return (400, json!({"message": "property name required"}));
            };
            match state.tables.get_mut(*name) {
                Some(table) => {
                    for stored in &mut table.properties {
                        if stored.get("name").and_then(JsonValue::as_str) == Some(*property) {
                            stored.insert("name".to_string(), json!(new_name));
                            return (200, json!({}));
                        }
                    }
                    (404, json!({"message": "property not found"}))
                }
                None => (404, json!({"message": "table not found"})),
            }
        }
        ("DELETE", ["tables", name, "properties", property]) => {
            match state.tables.get_mut(*name) {
                Some(table) => {
                    table
                        .properties
                        .retain(|p| p.get("name").and_then(JsonValue::as_str) != Some(*property));
                    (200, json!({}))
                }
                None => (404, json!({"message": "table not found"})),
            }
        }

        ("GET", ["tables", name, "objects", id, "events"]) => match state.tables.get(*name) {
            Some(table) => {
                let mut events: Vec<(&String, &Map<String, JsonValue>)> = table
                    .events
                    .iter()
                    .filter(|((object, _), _)| object == id)
                    .map(|((_, timestamp), data)| (timestamp, data))
                    .collect();
                events.sort_by_key(|(timestamp, _)| {
                    parse_timestamp(timestamp).expect("stored timestamps parse")
                });
                let events: Vec<JsonValue> = events
                    .into_iter()
                    .map(|(timestamp, data)| json!({ "timestamp": timestamp, "data": data }))
                    .collect();
                (200, JsonValue::Array(events))
            }
            None => (404, json!({"message": "table not found"})),
        },
        ("DELETE", ["tables", name, "objects", id, "events"]) => {
            match state.tables.get_mut(*name) {
                Some(table) => {
                    table.events.retain(|(object, _), _| object != id);
                    (200, json!({}))
                }
                None => (404, json!({"message": "table not found"})),
            }
        }
        ("GET", ["tables", name, "objects", id, "events", timestamp]) => {
            match state.tables.get(*name) {
                Some(table) => {
                    let key = ((*id).to_string(), (*timestamp).to_string());
                    match table.events.get(&key) {
                        Some(data) => (
                            200,
                            json!({ "timestamp": timestamp, "data": data }),
                        ),
                        None => (200, json!({})),
                    }
                }
                None => (404, json!({"message": "table not found"})),
            }
        }
        ("PATCH", ["tables", name, "objects", id, "events", timestamp]) => {
            let Ok(record) = serde_json::from_slice::<Map<String, JsonValue>>(body) else {
                return (400, json!({"message": "invalid event"}));
            };
            let data = match record.get("data") {
                Some(JsonValue::Object(fields)) => fields.clone(),
                _ => Map::new(),
            };
            match state.tables.get_mut(*name) {
                Some(table) => {
                    let key = ((*id).to_string(), (*timestamp).to_string());
                    merge_event(table, key, data);
                    (200, json!({}))
                }
                None => (404, json!({"message": "table not found"})),
            }
        }
        ("DELETE", ["tables", name, "objects", id, "events", timestamp]) => {
            match state.tables.get_mut(*name) {
                Some(table) => {
                    let key = ((*id).to_string(), (*timestamp).to_string());
                    table.events.remove(&key);
                    (200, json!({}))
                }
                None => (404, json!({"message": "table not found"})),
            }
        }

        ("POST", ["tables", name, "query"]) => match state.tables.get(*name) {
            Some(table) => (200, json!({ "count": table.event_count() })),
            None => (404, json!({"message": "table not found"})),
        },
        ("GET", ["tables", name, "stats"]) => match state.tables.get(*name) {
            Some(table) => (200, json!({ "count": table.event_count() })),
            None => (404, json!({"message": "table not found"})),
        },

        _ => (404, json!({"message": "not found"})),
    }
}
