// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker protocol: one JSON object per line in each direction.
//!
//! Outbound: `{ ...requestFields, "correlationId": id }`
//! Inbound reply: `{ "correlationId": id, "value": ... }`
//! Inbound event: `{ "type": tag, ...eventFields }`

use dx_core::CorrelationId;
use serde_json::{Map, Value};
use thiserror::Error;

pub const CORRELATION_FIELD: &str = "correlationId";
pub const TYPE_FIELD: &str = "type";
pub const VALUE_FIELD: &str = "value";

/// Longest accepted inbound line. Longer frames are discarded by the reader.
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("request payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A request to the worker, before a correlation id is attached.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkerRequest {
    fields: Map<String, Value>,
}

impl WorkerRequest {
    /// A request carrying only a `type` tag.
    pub fn typed(kind: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(TYPE_FIELD.to_string(), Value::String(kind.into()));
        Self { fields }
    }

    /// Add or replace a field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> Option<&str> {
        self.fields.get(TYPE_FIELD).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl TryFrom<Value> for WorkerRequest {
    type Error = ProtocolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(ProtocolError::NotAnObject(json_kind(&other))),
        }
    }
}

impl From<Map<String, Value>> for WorkerRequest {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Serialize a request as a single protocol line (with trailing newline).
///
/// The correlation id overwrites any `correlationId` the caller supplied.
pub fn encode_request(id: &CorrelationId, request: &WorkerRequest) -> Result<String, ProtocolError> {
    let mut fields = request.fields.clone();
    fields.insert(CORRELATION_FIELD.to_string(), Value::String(id.to_string()));
    let mut line = serde_json::to_string(&Value::Object(fields))?;
    line.push('\n');
    Ok(line)
}

/// An unsolicited message from the worker, keyed by its `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerEvent {
    kind: String,
    body: Map<String, Value>,
}

impl WorkerEvent {
    pub fn new(kind: impl Into<String>, body: Map<String, Value>) -> Self {
        let kind = kind.into();
        let mut body = body;
        body.insert(TYPE_FIELD.to_string(), Value::String(kind.clone()));
        Self { kind, body }
    }

    /// The `type` tag.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The full message, including the `type` field.
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn into_body(self) -> Map<String, Value> {
        self.body
    }
}

/// Classification of one inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Carries a correlation id. `event` is set when the frame also carries a
    /// `type` tag; it is routed as an event if no request is waiting on the id.
    Reply { correlation_id: CorrelationId, value: Value, event: Option<WorkerEvent> },
    /// Carries a `type` tag and no correlation id.
    Event(WorkerEvent),
    /// Valid JSON object with neither a correlation id nor a type tag.
    Untagged(Value),
    /// Not a JSON object.
    Unparsable { error: String },
}

/// Decode one line of worker output. Blank lines yield `None`.
pub fn decode_line(line: &str) -> Option<Inbound> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let fields = match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => {
            return Some(Inbound::Unparsable {
                error: format!("expected object, got {}", json_kind(&other)),
            })
        }
        Err(e) => return Some(Inbound::Unparsable { error: e.to_string() }),
    };

    let kind = fields.get(TYPE_FIELD).and_then(Value::as_str).map(str::to_string);
    let correlation_id = fields.get(CORRELATION_FIELD).and_then(|v| match v {
        Value::String(s) if !s.is_empty() => Some(CorrelationId::from(s.as_str())),
        Value::Number(n) => Some(CorrelationId::from(n.to_string())),
        _ => None,
    });

    Some(match (correlation_id, kind) {
        (Some(correlation_id), kind) => {
            let value = fields.get(VALUE_FIELD).cloned().unwrap_or(Value::Null);
            let event = kind.map(|kind| WorkerEvent { kind, body: fields });
            Inbound::Reply { correlation_id, value, event }
        }
        (None, Some(kind)) => Inbound::Event(WorkerEvent { kind, body: fields }),
        (None, None) => Inbound::Untagged(Value::Object(fields)),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
