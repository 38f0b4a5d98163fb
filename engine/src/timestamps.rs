//! Creation and update timestamps.
//!
//! The core works with `DateTime<Utc>`; how a timestamp is stored is decided
//! by the persistence adapter through [`TimestampEncoding`].

use crate::{
    field::FieldType,
    schema::{CREATED_AT, UPDATED_AT},
    Schema,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Concrete representation of timestamps inside stored documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimestampEncoding {
    /// Integer milliseconds since the Unix epoch
    EpochMillis,
    /// RFC 3339 string with millisecond precision, mapped to a native column
    Rfc3339,
}

impl TimestampEncoding {
    pub fn encode(&self, at: DateTime<Utc>) -> Value {
        match self {
            TimestampEncoding::EpochMillis => Value::from(at.timestamp_millis()),
            TimestampEncoding::Rfc3339 => {
                Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }

    /// Decode a timestamp in either representation.
    pub fn decode(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|at| at.with_timezone(&Utc)),
            _ => None,
        }
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Useful in tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Start at the given milliseconds since epoch (clamped to the epoch if out of range).
    pub fn at_millis(millis: i64) -> Self {
        Self::new(DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Stamps `createdAt`/`updatedAt` and normalizes timestamp-typed fields.
#[derive(Debug, Clone)]
pub struct TimestampManager {
    encoding: TimestampEncoding,
    clock: Arc<dyn Clock>,
}

impl TimestampManager {
    pub fn new(encoding: TimestampEncoding, clock: Arc<dyn Clock>) -> Self {
        Self { encoding, clock }
    }

    pub fn encoding(&self) -> TimestampEncoding {
        self.encoding
    }

    /// Current time truncated to milliseconds, the precision both encodings keep.
    pub fn now(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
    }

    /// Encoded `updatedAt` value for a write, never earlier than `previous`.
    pub fn touch(&self, previous: Option<&Value>) -> Value {
        let now = self.now();
        let at = match previous.and_then(TimestampEncoding::decode) {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        self.encoding.encode(at)
    }

    /// Prepare a new document: normalize timestamp fields, set both stamps.
    pub fn stamp_create(&self, schema: &Schema, document: &mut Map<String, Value>) {
        self.normalize(schema, document);
        let now = self.encoding.encode(self.now());
        document.insert(CREATED_AT.to_string(), now.clone());
        document.insert(UPDATED_AT.to_string(), now);
    }

    /// Prepare a patch: normalize timestamp fields, advance `updatedAt`.
    ///
    /// `createdAt` is never written by an update.
    pub fn stamp_update(
        &self,
        schema: &Schema,
        patch: &mut Map<String, Value>,
        previous_updated_at: Option<&Value>,
    ) {
        self.normalize(schema, patch);
        patch.remove(CREATED_AT);
        patch.insert(UPDATED_AT.to_string(), self.touch(previous_updated_at));
    }

    fn normalize(&self, schema: &Schema, document: &mut Map<String, Value>) {
        for field in schema
            .fields()
            .iter()
            .filter(|f| f.field_type == FieldType::Timestamp)
        {
            if let Some(value) = document.get_mut(&field.name) {
                if let Some(at) = TimestampEncoding::decode(value) {
                    *value = self.encoding.encode(at);
                }
            }
        }
    }
}
