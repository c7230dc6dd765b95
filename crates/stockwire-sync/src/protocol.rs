//! # Inventory Feed Protocol
//!
//! Wire format of the inventory feed and the decoder that turns a raw text
//! frame into exactly one [`UpdateEvent`].
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Inventory Feed Messages                              │
//! │                                                                         │
//! │  INBOUND (server → client), one JSON envelope per frame                │
//! │  ──────────────────────────────────────────────────────                │
//! │  { "type": "inventory_update", "data": <payload> }                     │
//! │                                                                         │
//! │  payload                                              → event          │
//! │  [ item, ... ]                                        → Snapshot       │
//! │  { "action": "deleted", "product_id": 7 }             → Delete         │
//! │  { "action": "bulk_update", "data": [ item, ... ] }   → BulkUpsert     │
//! │  { "action": <other>, "data": item }                  → Upsert         │
//! │  item  (no "action")                                  → Upsert         │
//! │  anything else                                        → Malformed      │
//! │                                                                         │
//! │  OUTBOUND (client → server)                                            │
//! │  ──────────────────────────                                            │
//! │  { "type": "get_inventory" }     request a full snapshot               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decoding is total: every input, however broken, yields an event. A frame
//! whose items do not all decode is rejected as a whole.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use stockwire_core::{ItemId, StockItem, UpdateEvent};

/// Envelope `type` carrying inventory payloads.
pub const INVENTORY_UPDATE: &str = "inventory_update";

/// `action` marking a deletion.
pub const ACTION_DELETED: &str = "deleted";

/// `action` marking a multi-item update.
pub const ACTION_BULK_UPDATE: &str = "bulk_update";

/// Longest slice of a bad frame echoed into logs.
const LOG_PREVIEW_LEN: usize = 120;

// =============================================================================
// Inbound Envelope
// =============================================================================

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Decodes one frame's text payload. Never fails.
pub fn decode_frame(raw: &str) -> UpdateEvent {
    match try_decode(raw) {
        Ok(event) => event,
        Err(reason) => UpdateEvent::Malformed {
            raw: raw.to_string(),
            reason,
        },
    }
}

fn try_decode(raw: &str) -> Result<UpdateEvent, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {}", e))?;
    // Struct derives also accept positional arrays; the feed only sends objects.
    if !value.is_object() {
        return Err(format!("envelope must be an object, got {}", json_kind(&value)));
    }
    let envelope: Envelope =
        serde_json::from_value(value).map_err(|e| format!("invalid envelope: {}", e))?;

    if envelope.kind != INVENTORY_UPDATE {
        return Err(format!("unrecognized message type '{}'", envelope.kind));
    }

    match envelope.data {
        Value::Array(items) => parse_items(items).map(UpdateEvent::Snapshot),
        Value::Object(mut payload) => match payload.remove("action") {
            Some(action) => decode_action(action, payload),
            None => parse_item(Value::Object(payload)).map(UpdateEvent::Upsert),
        },
        Value::Null => Err("missing payload".to_string()),
        other => Err(format!("unsupported payload: {}", json_kind(&other))),
    }
}

fn decode_action(action: Value, mut payload: Map<String, Value>) -> Result<UpdateEvent, String> {
    let action = match action {
        Value::String(action) => action,
        other => return Err(format!("action must be a string, got {}", json_kind(&other))),
    };

    match action.as_str() {
        ACTION_DELETED => {
            let id = payload
                .remove("product_id")
                .or_else(|| payload.remove("id"))
                .ok_or_else(|| "deleted action without an id".to_string())?;
            serde_json::from_value::<ItemId>(id)
                .map(UpdateEvent::Delete)
                .map_err(|e| format!("invalid id in deleted action: {}", e))
        }
        ACTION_BULK_UPDATE => match payload.remove("data") {
            Some(Value::Array(items)) => parse_items(items).map(UpdateEvent::BulkUpsert),
            _ => Err("bulk_update requires an array payload".to_string()),
        },
        other => match payload.remove("data") {
            Some(item @ Value::Object(_)) => parse_item(item).map(UpdateEvent::Upsert),
            _ => Err(format!("action '{}' requires a single-item payload", other)),
        },
    }
}

fn parse_items(items: Vec<Value>) -> Result<Vec<StockItem>, String> {
    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| {
            parse_item(item).map_err(|reason| format!("item {}: {}", position, reason))
        })
        .collect()
}

fn parse_item(item: Value) -> Result<StockItem, String> {
    if !item.is_object() {
        return Err(format!("item must be an object, got {}", json_kind(&item)));
    }
    serde_json::from_value(item).map_err(|e| format!("invalid item: {}", e))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Shortened frame text for log lines.
pub fn preview(raw: &str) -> &str {
    match raw.char_indices().nth(LOG_PREVIEW_LEN) {
        Some((end, _)) => &raw[..end],
        None => raw,
    }
}

// =============================================================================
// Outbound Commands
// =============================================================================

/// Client-initiated requests sent on the feed connection.
///
/// Serialized as an internally tagged enum: `{ "type": "get_inventory" }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Ask the server for a full snapshot of the inventory.
    GetInventory,
}

impl Command {
    /// Returns the wire type name (for logging and errors).
    pub fn type_name(&self) -> &'static str {
        match self {
            Command::GetInventory => "get_inventory",
        }
    }

    /// Serializes to a JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
