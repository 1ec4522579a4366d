// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoded event payloads.
//!
//! A [`Payload`] is the key/value mapping the transport layer decodes from a
//! hub request. It starts out mutable and can be frozen exactly once: after
//! [`Payload::freeze`] every mutating method returns
//! [`PayloadError::Frozen`] and nested values are only reachable through
//! shared references, so the freeze is deep and cannot be undone.
//!
//! # Examples
//!
//! ```
//! use websub_dispatch::Payload;
//!
//! let mut payload = Payload::new();
//! payload.insert("hub.topic", "https://example.com/feed").unwrap();
//!
//! payload.freeze();
//! assert!(payload.is_frozen());
//! assert!(payload.insert("hub.mode", "subscribe").is_err());
//! assert_eq!(payload.get_str("hub.topic"), Some("https://example.com/feed"));
//! ```

use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::PayloadError;

/// `hub.mode` parameter of a verification request.
pub const HUB_MODE: &str = "hub.mode";
/// `hub.topic` parameter of a verification request.
pub const HUB_TOPIC: &str = "hub.topic";
/// `hub.challenge` parameter of a verification request.
pub const HUB_CHALLENGE: &str = "hub.challenge";
/// `hub.lease_seconds` parameter of a verification request.
pub const HUB_LEASE_SECONDS: &str = "hub.lease_seconds";
/// `hub.reason` parameter of a denial notice.
pub const HUB_REASON: &str = "hub.reason";

#[derive(Debug, Clone)]
enum Entries {
    Mutable(Map<String, Value>),
    Frozen(Arc<Map<String, Value>>),
}

/// A decoded event payload that can be made deeply immutable.
///
/// Cloning a frozen payload is cheap: clones share the same frozen entries.
#[derive(Debug, Clone)]
pub struct Payload {
    entries: Entries,
}

impl Payload {
    /// Creates an empty, mutable payload.
    #[must_use]
    pub fn new() -> Self {
        Self::from_map(Map::new())
    }

    /// Creates a mutable payload from an existing JSON map.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            entries: Entries::Mutable(map),
        }
    }

    /// Returns `true` once the payload has been frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        matches!(self.entries, Entries::Frozen(_))
    }

    /// Freezes the payload.
    ///
    /// Freezing is irreversible. Freezing an already frozen payload is a no-op.
    pub fn freeze(&mut self) {
        if let Entries::Mutable(map) = &mut self.entries {
            let map = std::mem::take(map);
            self.entries = Entries::Frozen(Arc::new(map));
        }
    }

    /// Consumes the payload and returns it frozen.
    #[must_use]
    pub fn into_frozen(mut self) -> Self {
        self.freeze();
        self
    }

    /// Returns a read-only view of all entries.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        match &self.entries {
            Entries::Mutable(map) => map,
            Entries::Frozen(map) => map.as_ref(),
        }
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().get(key)
    }

    /// Returns the value stored under `key` if it is a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Returns `true` if the payload contains `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.as_map().contains_key(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_map().len()
    }

    /// Returns `true` if the payload has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_map().is_empty()
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.as_map().iter()
    }

    /// Inserts a value, returning the previous value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Frozen`] if the payload has been frozen.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, PayloadError> {
        let key = key.into();
        match &mut self.entries {
            Entries::Mutable(map) => Ok(map.insert(key, value.into())),
            Entries::Frozen(_) => Err(PayloadError::Frozen {
                operation: "insert",
                key,
            }),
        }
    }

    /// Removes `key`, returning its value.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Frozen`] if the payload has been frozen.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, PayloadError> {
        match &mut self.entries {
            Entries::Mutable(map) => Ok(map.remove(key)),
            Entries::Frozen(_) => Err(PayloadError::Frozen {
                operation: "remove",
                key: key.to_string(),
            }),
        }
    }

    /// Returns a mutable reference to the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Frozen`] if the payload has been frozen.
    pub fn get_mut(&mut self, key: &str) -> Result<Option<&mut Value>, PayloadError> {
        match &mut self.entries {
            Entries::Mutable(map) => Ok(map.get_mut(key)),
            Entries::Frozen(_) => Err(PayloadError::Frozen {
                operation: "modify",
                key: key.to_string(),
            }),
        }
    }

    /// Returns the payload as a JSON object value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.as_map().clone())
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.as_map() == other.as_map()
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

impl TryFrom<Value> for Payload {
    type Error = PayloadError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(PayloadError::NotAnObject(value_type_name(&other))),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_map().serialize(serializer)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
