//! The decoded event, its dedup key and the persisted record shape.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BridgeError;

/// Maximum number of characters of a payload quoted in log lines.
pub const EXCERPT_CHARS: usize = 20;

/// One event received from the upstream stream.
///
/// Only the fields that make up the dedup key are projected; everything else
/// stays in `raw`, which is the frame text exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Classification tag (`"message"`, `"notice"`, `"meta_event"`, ...).
    pub post_type: Option<String>,
    /// Upstream message id, `0` when absent.
    pub message_id: i64,
    /// Epoch seconds, `0` when absent.
    pub time: i64,
    /// Plain-text message body, used for log excerpts only.
    pub message: Option<String>,
    /// The original frame text.
    pub raw: String,
}

impl Event {
    /// Decode a text frame.
    ///
    /// The frame must be a JSON object. `post_type` must be a string and
    /// `message_id`/`time` must be integers when present; `null` counts as
    /// absent.
    pub fn from_frame(text: &str) -> Result<Self, BridgeError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(obj) = value else {
            return Err(BridgeError::Decode(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        };

        Ok(Self {
            post_type: string_field(&obj, "post_type")?,
            message_id: int_field(&obj, "message_id")?.unwrap_or(0),
            time: int_field(&obj, "time")?.unwrap_or(0),
            // OneBot may send `message` as a segment array; fall back to raw_message.
            message: obj
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| obj.get("raw_message").and_then(Value::as_str))
                .map(str::to_string),
            raw: text.to_string(),
        })
    }

    /// The event timestamp as a UTC naive datetime.
    pub fn occurred_at(&self) -> Result<NaiveDateTime, BridgeError> {
        DateTime::from_timestamp(self.time, 0)
            .map(|dt| dt.naive_utc())
            .ok_or(BridgeError::Timestamp { secs: self.time })
    }

    /// Build the `(post_type, message_id, occurred_at)` triple.
    pub fn dedup_key(&self) -> Result<DedupKey, BridgeError> {
        Ok(DedupKey {
            post_type: self.post_type.clone(),
            message_id: self.message_id,
            occurred_at: self.occurred_at()?,
        })
    }

    /// Short excerpt of the message body (or of the raw frame) for logging.
    pub fn excerpt(&self) -> String {
        let source = self.message.as_deref().unwrap_or(&self.raw);
        let mut chars = source.chars();
        let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }
}

/// Uniqueness key of a stored record. Two missing `post_type`s are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pub post_type: Option<String>,
    pub message_id: i64,
    pub occurred_at: NaiveDateTime,
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.post_type.as_deref().unwrap_or("-"),
            self.message_id,
            self.occurred_at
        )
    }
}

/// A row of the `qq_messages` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub post_type: Option<String>,
    pub message_id: i64,
    pub timestamp: NaiveDateTime,
    pub raw: String,
}

impl StoredRecord {
    /// Project an event onto a row. Fails only on an unrepresentable timestamp.
    pub fn from_event(event: &Event) -> Result<Self, BridgeError> {
        Ok(Self {
            post_type: event.post_type.clone(),
            message_id: event.message_id,
            timestamp: event.occurred_at()?,
            raw: event.raw.clone(),
        })
    }

    pub fn key(&self) -> DedupKey {
        DedupKey {
            post_type: self.post_type.clone(),
            message_id: self.message_id,
            occurred_at: self.timestamp,
        }
    }
}

fn string_field(obj: &Map<String, Value>, field: &'static str) -> Result<Option<String>, BridgeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(BridgeError::InvalidField {
            field,
            reason: format!("expected string, got {}", json_kind(other)),
        }),
    }
}

/// Integers, and floats with no fractional part (`1700000000.0`), in `i64` range.
fn int_field(obj: &Map<String, Value>, field: &'static str) -> Result<Option<i64>, BridgeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral))
            .map(Some)
            .ok_or_else(|| BridgeError::InvalidField {
                field,
                reason: format!("{n} is not a 64-bit integer"),
            }),
        Some(other) => Err(BridgeError::InvalidField {
            field,
            reason: format!("expected integer, got {}", json_kind(other)),
        }),
    }
}

fn integral(f: f64) -> Option<i64> {
    // 2^63 is exactly representable; i64::MAX is not.
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.fract() == 0.0 && in_range).then_some(f as i64)
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
