//! Payload codec for gateway JSON bodies.
//!
//! The gateway speaks one logical shape, a list of `{key, value}` functions,
//! but wraps it in several envelopes depending on the topic:
//!
//! - commands and echoes: `{"state": {"functions": [...]}}`
//! - telegrams: `{"from": {"functions": [...], "telegramInfo": {...}}}`
//! - boot data: `{"states": {"switch": "on"}}`
//! - flattened MQTT sub-topics, reassembled by [`FragmentTree`], where
//!   arrays arrive as index-keyed objects (`{"0": {...}}`)
//!
//! Everything here is pure. Timing (debounce) lives in `greennet-core`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::Error;
use crate::topic::{Category, Direction};

/// Sentinel the gateway sends for sensor values it cannot read.
pub const NOT_AVAILABLE: &str = "notAvailable";

/// Keys on a telegram or device object that describe the message, not device state.
const METADATA_KEYS: &[&str] = &[
    "deviceId",
    "friendlyId",
    "timestamp",
    "telegramInfo",
    "direction",
    "physicalDevice",
    "manufacturer",
    "eep",
    "eeps",
    "dbm",
    "firstSeen",
    "lastSeen",
    "deleted",
    "header",
];

// ── Function ─────────────────────────────────────────────────────────

/// A single `{key, value}` pair as carried in gateway bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub key: String,
    pub value: Value,
}

impl Function {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Function with a text value, the form the gateway expects on `put`.
    pub fn text(key: impl Into<String>, value: impl ToString) -> Self {
        Self::new(key, Value::String(value.to_string()))
    }

    /// Value rendered as text, without JSON quoting for strings.
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

// ── Scalar coercion ──────────────────────────────────────────────────

/// Coerce a raw scalar from a flattened sub-topic into a typed JSON value.
///
/// `true`/`false` (any case) become booleans, integer text becomes an
/// integer, decimal text a float. Everything else, including `on`,
/// `notAvailable` and the empty string, stays text.
pub fn coerce_scalar(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_owned())
}

// ── JSON entry points ────────────────────────────────────────────────

/// Parse a payload as JSON, mapping failures to [`Error::MalformedPayload`].
pub fn parse_json(topic: &str, payload: &[u8]) -> Result<Value, Error> {
    serde_json::from_slice(payload)
        .map_err(|e| Error::malformed_payload(topic, format!("invalid JSON: {e}")))
}

/// A payload that signals removal on `stream/devices/<id>`.
///
/// Empty bodies, `null`, and `{"deleted": true}` all count.
pub fn is_removal(payload: &[u8]) -> bool {
    let text = String::from_utf8_lossy(payload);
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return true;
    }
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|v| v.get("deleted").and_then(Value::as_bool))
        .unwrap_or(false)
}

// ── Command encoding ─────────────────────────────────────────────────

/// Build the `{"state": {"functions": [...]}}` body for a `put/.../state` topic.
///
/// Order is preserved: paired keys (`angle` + `position`) must reach the
/// device in one payload.
pub fn encode_command(functions: &[Function]) -> Result<Bytes, Error> {
    let body = json!({ "state": { "functions": functions } });
    Ok(Bytes::from(serde_json::to_vec(&body)?))
}

// ── Telegram / state bodies ──────────────────────────────────────────

/// Normalized content of a telegram, delta or command body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelegramBody {
    pub functions: Vec<Function>,
    /// `Some(To)` when the body describes a radio-bound command.
    pub direction: Option<Direction>,
    pub friendly_id: Option<String>,
    pub timestamp: Option<String>,
    pub dbm: Option<i64>,
}

impl TelegramBody {
    pub fn is_outbound(&self) -> bool {
        self.direction == Some(Direction::To)
    }
}

/// Decode a raw payload for the given category.
///
/// Stream payloads are decoded leniently (any envelope, flat key/value
/// objects included). Request and answer payloads must carry a
/// `functions` list.
pub fn decode_telegram_body(
    category: Category,
    topic: &str,
    payload: &[u8],
) -> Result<TelegramBody, Error> {
    let value = parse_json(topic, payload)?;
    match category {
        Category::Stream => decode_body(topic, &value),
        Category::Get | Category::GetAnswer | Category::Put | Category::PutAnswer => {
            decode_command_body(topic, &value)
        }
    }
}

/// Strict decode: `functions` or `state.functions` is required.
pub fn decode_command_body(topic: &str, value: &Value) -> Result<TelegramBody, Error> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::malformed_payload(topic, "expected a JSON object"))?;
    let (effective, envelope) = effective_object(obj);
    let list = functions_value(effective)
        .ok_or_else(|| Error::malformed_payload(topic, "missing 'functions' array"))?;
    let mut body = metadata(obj, effective, envelope);
    body.functions = decode_function_list(topic, list)?;
    Ok(body)
}

/// Lenient decode used for stream payloads and reassembled fragments.
pub fn decode_body(topic: &str, value: &Value) -> Result<TelegramBody, Error> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::malformed_payload(topic, "expected a JSON object"))?;
    let (effective, envelope) = effective_object(obj);
    let mut body = metadata(obj, effective, envelope);

    body.functions = if let Some(list) = functions_value(effective) {
        decode_function_list(topic, list)?
    } else if let Some(states) = effective.get("states").and_then(Value::as_object) {
        states
            .iter()
            .map(|(k, v)| Function::new(k.clone(), v.clone()))
            .collect()
    } else {
        flat_functions(effective)
    };

    Ok(body)
}

/// Unwrap `device` and pick the `from`/`to` sub-object when present.
fn effective_object(obj: &Map<String, Value>) -> (&Map<String, Value>, Option<Direction>) {
    let obj = obj
        .get("device")
        .and_then(Value::as_object)
        .unwrap_or(obj);
    if let Some(from) = obj.get("from").and_then(Value::as_object) {
        return (from, Some(Direction::From));
    }
    if let Some(to) = obj.get("to").and_then(Value::as_object) {
        return (to, Some(Direction::To));
    }
    (obj, None)
}

fn functions_value(obj: &Map<String, Value>) -> Option<&Value> {
    obj.get("functions").or_else(|| {
        obj.get("state")
            .and_then(Value::as_object)
            .and_then(|s| s.get("functions"))
    })
}

fn metadata(
    root: &Map<String, Value>,
    effective: &Map<String, Value>,
    envelope: Option<Direction>,
) -> TelegramBody {
    let lookup = |key: &str| effective.get(key).or_else(|| root.get(key));

    let direction = lookup("direction")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .or(envelope);

    TelegramBody {
        functions: Vec::new(),
        direction,
        friendly_id: lookup("friendlyId").and_then(Value::as_str).map(str::to_owned),
        timestamp: lookup("timestamp").and_then(Value::as_str).map(str::to_owned),
        dbm: lookup("telegramInfo")
            .and_then(|t| t.get("dbm"))
            .or_else(|| lookup("dbm"))
            .and_then(as_i64),
    }
}

/// Decode `[{key, value}, ...]`, an index-keyed object, or a single `{key, value}`.
fn decode_function_list(topic: &str, list: &Value) -> Result<Vec<Function>, Error> {
    let items: Vec<&Value> = match list {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) if map.contains_key("key") => vec![list],
        Value::Object(map) => indexed_values(map)
            .ok_or_else(|| Error::malformed_payload(topic, "'functions' object is not index-keyed"))?,
        _ => return Err(Error::malformed_payload(topic, "'functions' must be an array")),
    };

    items
        .into_iter()
        .map(|item| {
            let key = item
                .get("key")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::malformed_payload(topic, "function without a string 'key'"))?;
            Ok(Function::new(
                key,
                item.get("value").cloned().unwrap_or(Value::Null),
            ))
        })
        .collect()
}

/// Scalar entries of a flat object, skipping metadata keys.
fn flat_functions(obj: &Map<String, Value>) -> Vec<Function> {
    obj.iter()
        .filter(|(k, _)| !METADATA_KEYS.contains(&k.as_str()))
        .filter(|(_, v)| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)))
        .map(|(k, v)| Function::new(k.clone(), v.clone()))
        .collect()
}

/// Values of an object whose keys are all array indices, in index order.
fn indexed_values(map: &Map<String, Value>) -> Option<Vec<&Value>> {
    let mut entries: Vec<(usize, &Value)> = map
        .iter()
        .map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, v)))
        .collect::<Option<_>>()?;
    entries.sort_by_key(|(i, _)| *i);
    Some(entries.into_iter().map(|(_, v)| v).collect())
}

fn as_i64(v: &Value) -> Option<i64> {
    v.as_i64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

// ── Answers ──────────────────────────────────────────────────────────

/// A `getAnswer`/`putAnswer` body: HTTP-style status plus echoed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub status: u16,
    pub detail: Option<String>,
    /// Body without the `header`, `Null` if nothing else was sent.
    pub data: Value,
}

impl Answer {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Decode `{"header": {"httpStatus": ..}, ...}`.
pub fn decode_answer(topic: &str, payload: &[u8]) -> Result<Answer, Error> {
    let value = parse_json(topic, payload)?;
    let Value::Object(mut obj) = value else {
        return Err(Error::malformed_payload(topic, "answer must be a JSON object"));
    };
    let header = obj
        .remove("header")
        .ok_or_else(|| Error::malformed_payload(topic, "answer without 'header'"))?;

    let status = header
        .get("httpStatus")
        .and_then(as_i64)
        .and_then(|s| u16::try_from(s).ok())
        .ok_or_else(|| Error::malformed_payload(topic, "missing or invalid 'httpStatus'"))?;

    let detail = ["message", "description", "content"]
        .iter()
        .find_map(|k| header.get(*k).and_then(Value::as_str))
        .map(str::to_owned);

    let data = if obj.is_empty() {
        Value::Null
    } else {
        Value::Object(obj)
    };

    Ok(Answer {
        status,
        detail,
        data,
    })
}

// ── Device descriptors ───────────────────────────────────────────────

/// A device as described by discovery (`getAnswer/devices`, `stream/devices/<id>`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub device_id: String,
    pub friendly_id: Option<String>,
    /// Primary EEP (first entry of `eeps`), e.g. `D2-01-12`.
    pub eep: Option<String>,
    pub manufacturer: Option<String>,
    pub dbm: Option<i64>,
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
    /// Initial state, from `states` or `state.functions`.
    pub states: Vec<Function>,
}

impl DeviceDescriptor {
    /// Build from a device object, unwrapping a `device` wrapper.
    ///
    /// `fallback_id` fills in `deviceId` when only the topic carries it.
    pub fn from_json(value: &Value, fallback_id: Option<&str>) -> Option<Self> {
        let obj = value.get("device").unwrap_or(value).as_object()?;
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_owned);

        let device_id = text("deviceId").or_else(|| fallback_id.map(str::to_owned))?;

        let eep = obj.get("eeps").and_then(|eeps| match eeps {
            Value::Array(items) => items.first().and_then(eep_of),
            Value::Object(map) => indexed_values(map)?.first().copied().and_then(eep_of),
            _ => None,
        });
        let eep = eep.or_else(|| text("eep"));

        let states = match obj.get("states").and_then(Value::as_object) {
            Some(states) => states
                .iter()
                .map(|(k, v)| Function::new(k.clone(), v.clone()))
                .collect(),
            None => functions_value(obj)
                .and_then(|list| decode_function_list("", list).ok())
                .unwrap_or_default(),
        };

        Some(Self {
            device_id,
            friendly_id: text("friendlyId"),
            eep,
            manufacturer: text("manufacturer"),
            dbm: obj.get("dbm").and_then(as_i64),
            first_seen: text("firstSeen"),
            last_seen: text("lastSeen"),
            states,
        })
    }
}

fn eep_of(entry: &Value) -> Option<String> {
    match entry {
        Value::String(s) => Some(s.clone()),
        other => other.get("eep").and_then(Value::as_str).map(str::to_owned),
    }
}

/// Decode the full device set from a discovery answer.
///
/// Accepts `{"devices": [...]}` (array or index-keyed object), a bare
/// array, or a single device object.
pub fn decode_device_list(topic: &str, value: &Value) -> Result<Vec<DeviceDescriptor>, Error> {
    let list = value.get("devices").unwrap_or(value);
    let entries: Vec<&Value> = match list {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) if map.contains_key("deviceId") || map.contains_key("device") => {
            vec![list]
        }
        Value::Object(map) if map.is_empty() => Vec::new(),
        Value::Object(map) => indexed_values(map)
            .ok_or_else(|| Error::malformed_payload(topic, "unrecognized device list"))?,
        _ => return Err(Error::malformed_payload(topic, "device list must be an array")),
    };

    Ok(entries
        .into_iter()
        .filter_map(|v| DeviceDescriptor::from_json(v, None))
        .collect())
}

// ── Fragment trees ───────────────────────────────────────────────────

/// Accumulates flattened sub-topic fragments into one nested JSON object.
///
/// `state/functions/0/key = "switch"` becomes
/// `{"state": {"functions": [{"key": "switch"}]}}` once finished.
#[derive(Debug, Default, Clone)]
pub struct FragmentTree {
    root: Map<String, Value>,
    fragments: usize,
}

impl FragmentTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments == 0
    }

    /// Record one fragment. An empty `path` merges a whole JSON object.
    pub fn insert(&mut self, path: &[String], raw: &[u8]) {
        self.fragments += 1;
        let value = fragment_value(raw);

        let Some((last, parents)) = path.split_last() else {
            if let Value::Object(obj) = value {
                self.root.extend(obj);
            }
            return;
        };

        let mut cursor = &mut self.root;
        for seg in parents {
            let slot = cursor
                .entry(seg.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(next) = slot else { return };
            cursor = next;
        }
        cursor.insert(last.clone(), value);
    }

    /// Finish assembly, turning index-keyed objects into arrays.
    pub fn finish(self) -> Value {
        normalize_indices(Value::Object(self.root))
    }
}

fn fragment_value(raw: &[u8]) -> Value {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(v) = serde_json::from_str(trimmed) {
            return v;
        }
    }
    coerce_scalar(trimmed)
}

fn normalize_indices(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let all_indices = !map.is_empty() && map.keys().all(|k| k.parse::<usize>().is_ok());
            if all_indices {
                let mut entries: Vec<(usize, Value)> = map
                    .into_iter()
                    .filter_map(|(k, v)| k.parse().ok().map(|i| (i, normalize_indices(v))))
                    .collect();
                entries.sort_by_key(|(i, _)| *i);
                Value::Array(entries.into_iter().map(|(_, v)| v).collect())
            } else {
                Value::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, normalize_indices(v)))
                        .collect(),
                )
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_indices).collect()),
        other => other,
    }
}

// ── Tests ────────────────────────────────────────────────────────────
