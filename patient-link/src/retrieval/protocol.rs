//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Subscription wire documents.
//!
//! Outbound requests subscribe to one topic each:
//!
//! ```json
//! { "setSubscriptions": { "<topic>": "request" } }
//! ```
//!
//! Inbound updates map topics to typed values:
//!
//! ```json
//! { "updateSubscriptions": { "<topic>": { "type": "<tag>", ... } } }
//! ```
//!
//! The helpers here give the session what it needs from an update: presence
//! checks, typed extraction, ordered iteration over collections and
//! iteration over key/value pairs. Shape mismatches are reported as
//! [`ClientError::ProtocolError`].

use crate::ClientError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

/// Key of outbound subscription requests.
pub const SET_SUBSCRIPTIONS: &str = "setSubscriptions";

/// Key of inbound subscription updates.
pub const UPDATE_SUBSCRIPTIONS: &str = "updateSubscriptions";

/// Subscription mode asking for the current value.
pub const REQUEST: &str = "request";

/// Name of the type tag carried by every typed value.
pub const TYPE_TAG: &str = "type";

/// Topic of the patient list.
pub const PATIENTS_TOPIC: &str = "public:patients";

/// Builds a request subscribing to exactly one topic.
///
/// The server only answers the first entry of a request naming several
/// topics, so there is deliberately no multi-topic variant.
pub fn subscribe(topic: &str) -> String {
    json!({ SET_SUBSCRIPTIONS: { topic: REQUEST } }).to_string()
}

/// An inbound `updateSubscriptions` document.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    entries: Map<String, Value>,
}

impl Update {
    /// Parses `payload` and extracts its update map.
    pub fn parse(payload: &str) -> Result<Self, ClientError> {
        let document: Value = serde_json::from_str(payload)
            .map_err(|e| ClientError::protocol(format!("invalid JSON payload: {e}")))?;

        match document {
            Value::Object(mut root) => match root.remove(UPDATE_SUBSCRIPTIONS) {
                Some(Value::Object(entries)) => Ok(Self { entries }),
                Some(other) => Err(ClientError::protocol(format!(
                    "{UPDATE_SUBSCRIPTIONS} is {}, expected an object",
                    kind_of(&other)
                ))),
                None => Err(ClientError::protocol(format!(
                    "payload has no {UPDATE_SUBSCRIPTIONS} entry"
                ))),
            },
            other => Err(ClientError::protocol(format!(
                "payload is {}, expected an object",
                kind_of(&other)
            ))),
        }
    }

    /// Returns `true` if the update carries `topic`.
    pub fn contains(&self, topic: &str) -> bool {
        self.entries.contains_key(topic)
    }

    /// Value of `topic`, if present.
    pub fn get(&self, topic: &str) -> Option<&Value> {
        self.entries.get(topic)
    }

    /// Topic/value pairs in document order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(topic, value)| (topic.as_str(), value))
    }

    /// Number of topics in the update.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the update carries no topic.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Returns `value` as an object whose type tag equals `expected`.
pub fn typed<'a>(value: &'a Value, expected: &str) -> Result<&'a Map<String, Value>, ClientError> {
    let object = value.as_object().ok_or_else(|| {
        ClientError::protocol(format!("expected a {expected} object, got {}", kind_of(value)))
    })?;

    match object.get(TYPE_TAG).and_then(Value::as_str) {
        Some(tag) if tag == expected => Ok(object),
        Some(tag) => Err(ClientError::protocol(format!(
            "expected type {expected:?}, got {tag:?}"
        ))),
        None => Err(ClientError::protocol(format!(
            "{expected} object has no {TYPE_TAG} tag"
        ))),
    }
}

/// Returns the array stored in `object[field]`.
pub fn items<'a>(object: &'a Map<String, Value>, field: &str) -> Result<&'a [Value], ClientError> {
    match object.get(field) {
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(other) => Err(ClientError::protocol(format!(
            "field {field:?} is {}, expected an array",
            kind_of(other)
        ))),
        None => Err(ClientError::protocol(format!("missing field {field:?}"))),
    }
}

/// Returns the string stored in `value[field]`.
pub fn str_field<'a>(value: &'a Value, field: &str) -> Result<&'a str, ClientError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::protocol(format!("missing string field {field:?}")))
}

/// Checks the type tag of `value` and decodes it into `T`.
pub fn decode<T: DeserializeOwned>(value: &Value, expected: &str) -> Result<T, ClientError> {
    typed(value, expected)?;
    serde_json::from_value(value.clone())
        .map_err(|e| ClientError::protocol(format!("malformed {expected}: {e}")))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_subscribe_names_one_topic() {
        let request: Value = serde_json::from_str(&subscribe(PATIENTS_TOPIC)).unwrap();
        assert_eq!(request, json!({"setSubscriptions": {"public:patients": "request"}}));
    }

    #[test]
    fn test_parse_update() {
        let update = Update::parse(
            r#"{"updateSubscriptions":{"b":{"type":"Patient"},"a":{"type":"Patient"}}}"#,
        )
        .unwrap();

        assert_eq!(update.len(), 2);
        assert!(update.contains("a"));
        assert!(!update.contains("c"));
        let topics: Vec<_> = update.entries().map(|(topic, _)| topic).collect();
        assert_eq!(topics.len(), 2);
        assert!(topics.contains(&"a") && topics.contains(&"b"));
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        for payload in [
            "not json",
            "[]",
            r#"{"somethingElse":{}}"#,
            r#"{"updateSubscriptions":[1,2]}"#,
        ] {
            let err = Update::parse(payload).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ProtocolError, "payload: {payload}");
        }
    }

    #[test]
    fn test_typed_checks_tag() {
        let value = json!({"type": "PatientList", "value": []});
        assert!(typed(&value, "PatientList").is_ok());
        assert!(typed(&value, "Patient").is_err());
        assert!(typed(&json!({"value": []}), "PatientList").is_err());
        assert!(typed(&json!("PatientList"), "PatientList").is_err());
    }

    #[test]
    fn test_items_and_fields() {
        let value = json!({"type": "PatientList", "value": [{"uri": "a"}], "count": 1});
        let object = value.as_object().unwrap();

        let list = items(object, "value").unwrap();
        assert_eq!(str_field(&list[0], "uri").unwrap(), "a");
        assert!(items(object, "count").is_err());
        assert!(items(object, "missing").is_err());
        assert!(str_field(&list[0], "label").is_err());
    }

    #[test]
    fn test_decode() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Plan {
            label: String,
        }

        let plan: Plan = decode(&json!({"type": "Plan", "label": "P1"}), "Plan").unwrap();
        assert_eq!(plan, Plan { label: "P1".into() });

        let err = decode::<Plan>(&json!({"type": "Plan"}), "Plan").unwrap_err();
        assert!(err.to_string().contains("malformed Plan"));
    }
}
