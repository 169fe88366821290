//! Device config document parsing and patching.
//!
//! The device keeps a single JSON object. Only `wifis` is interpreted; every
//! other top-level key is carried through untouched.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::protocol::constants::WIFIS_KEY;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Config is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Config field `{field}` must be {expected}, found {found}")]
    Schema {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A single change applied to the device config.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigEdit {
    /// Set `wifis[network] = credential`.
    UpsertWifi { network: String, credential: String },
    /// Remove `wifis[network]` if present.
    RemoveWifi { network: String },
    /// Replace a top-level field.
    SetField { key: String, value: Value },
}

impl ConfigEdit {
    pub fn upsert_wifi(network: impl Into<String>, credential: impl Into<String>) -> Self {
        ConfigEdit::UpsertWifi {
            network: network.into(),
            credential: credential.into(),
        }
    }
}

impl fmt::Display for ConfigEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigEdit::UpsertWifi { network, .. } => write!(f, "add network '{network}'"),
            ConfigEdit::RemoveWifi { network } => write!(f, "remove network '{network}'"),
            ConfigEdit::SetField { key, .. } => write!(f, "set '{key}'"),
        }
    }
}

/// Parsed device config.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    root: Map<String, Value>,
}

impl ConfigDocument {
    /// Parse the dumped payload. The top level must be an object.
    pub fn parse(text: &str) -> Result<Self, PatchError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Parse raw payload bytes; invalid UTF-8 is reported as malformed.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, PatchError> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    fn from_value(value: Value) -> Result<Self, PatchError> {
        match value {
            Value::Object(root) => {
                let doc = Self { root };
                if let Some(wifis) = doc.root.get(WIFIS_KEY)
                    && !wifis.is_object()
                {
                    return Err(PatchError::Schema {
                        field: WIFIS_KEY.to_string(),
                        expected: "an object",
                        found: kind_of(wifis),
                    });
                }
                Ok(doc)
            }
            other => Err(PatchError::Schema {
                field: "<root>".to_string(),
                expected: "an object",
                found: kind_of(&other),
            }),
        }
    }

    fn wifis_mut(&mut self) -> Result<&mut Map<String, Value>, PatchError> {
        let entry = self
            .root
            .entry(WIFIS_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        let found = kind_of(entry);
        entry.as_object_mut().ok_or_else(|| PatchError::Schema {
            field: WIFIS_KEY.to_string(),
            expected: "an object",
            found,
        })
    }

    /// Stored networks, name -> credential. Non-string credentials are skipped.
    pub fn wifis(&self) -> Vec<(&str, &str)> {
        self.root
            .get(WIFIS_KEY)
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.as_str(), s)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root.keys().map(String::as_str)
    }

    pub fn upsert_wifi(&mut self, network: &str, credential: &str) -> Result<(), PatchError> {
        self.wifis_mut()?
            .insert(network.to_string(), Value::String(credential.to_string()));
        Ok(())
    }

    pub fn apply(&mut self, edit: &ConfigEdit) -> Result<(), PatchError> {
        match edit {
            ConfigEdit::UpsertWifi {
                network,
                credential,
            } => self.upsert_wifi(network, credential),
            ConfigEdit::RemoveWifi { network } => {
                if let Some(wifis) = self
                    .root
                    .get_mut(WIFIS_KEY)
                    .and_then(Value::as_object_mut)
                {
                    wifis.remove(network);
                }
                Ok(())
            }
            ConfigEdit::SetField { key, value } => {
                if key == WIFIS_KEY && !value.is_object() {
                    return Err(PatchError::Schema {
                        field: WIFIS_KEY.to_string(),
                        expected: "an object",
                        found: kind_of(value),
                    });
                }
                self.root.insert(key.clone(), value.clone());
                Ok(())
            }
        }
    }

    /// Compact serialization, the form written back to the device.
    pub fn to_json_string(&self) -> Result<String, PatchError> {
        Ok(serde_json::to_string(&self.root)?)
    }

    pub fn to_pretty_string(&self) -> Result<String, PatchError> {
        Ok(serde_json::to_string_pretty(&self.root)?)
    }
}

/// Parse `payload`, upsert one network and serialize the result.
pub fn patch(payload: &str, network: &str, credential: &str) -> Result<String, PatchError> {
    let mut doc = ConfigDocument::parse(payload)?;
    doc.upsert_wifi(network, credential)?;
    doc.to_json_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_value(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_patch_adds_network() {
        let out = patch(r#"{"wifis":{"home":"old"}}"#, "office", "secret").unwrap();
        assert_eq!(
            parse_value(&out),
            json!({"wifis": {"home": "old", "office": "secret"}})
        );
    }

    #[test]
    fn test_patch_overwrites_existing() {
        let out = patch(r#"{"wifis":{"home":"old"}}"#, "home", "new").unwrap();
        assert_eq!(parse_value(&out), json!({"wifis": {"home": "new"}}));
    }

    #[test]
    fn test_patch_creates_missing_wifis() {
        let out = patch(r#"{"sumo_id":"abc"}"#, "home", "pw").unwrap();
        assert_eq!(
            parse_value(&out),
            json!({"sumo_id": "abc", "wifis": {"home": "pw"}})
        );
    }

    #[test]
    fn test_patch_preserves_other_keys() {
        let input = r#"{"sumo_server":"ws://x","status_led_pin":5,"nested":{"a":[1,2]},"wifis":{}}"#;
        let out = parse_value(&patch(input, "n", "c").unwrap());
        assert_eq!(out["sumo_server"], "ws://x");
        assert_eq!(out["status_led_pin"], 5);
        assert_eq!(out["nested"], json!({"a": [1, 2]}));
    }

    #[test]
    fn test_malformed_payload() {
        assert!(matches!(
            patch(r#"{"wifis":{"#, "n", "c"),
            Err(PatchError::Malformed(_))
        ));
    }

    #[test]
    fn test_wifis_not_object() {
        let err = patch(r#"{"wifis":["a"]}"#, "n", "c").unwrap_err();
        assert!(matches!(err, PatchError::Schema { found: "an array", .. }));
    }

    #[test]
    fn test_parse_bytes_rejects_invalid_utf8() {
        assert!(matches!(
            ConfigDocument::parse_bytes(b"{\"wifis\":{\"\xff\":\"x\"}}"),
            Err(PatchError::Malformed(_))
        ));
    }

    #[test]
    fn test_root_not_object() {
        assert!(matches!(
            patch("[1,2]", "n", "c"),
            Err(PatchError::Schema { .. })
        ));
    }

    #[test]
    fn test_remove_and_set_field() {
        let mut doc = ConfigDocument::parse(r#"{"wifis":{"a":"1","b":"2"},"sumo_id":"x"}"#).unwrap();
        doc.apply(&ConfigEdit::RemoveWifi {
            network: "a".into(),
        })
        .unwrap();
        doc.apply(&ConfigEdit::SetField {
            key: "sumo_id".into(),
            value: json!("y"),
        })
        .unwrap();
        assert_eq!(doc.wifis(), vec![("b", "2")]);
        assert_eq!(doc.get("sumo_id"), Some(&json!("y")));
    }

    #[test]
    fn test_remove_wifi_without_wifis_is_noop() {
        let mut doc = ConfigDocument::parse(r#"{"sumo_id":"x"}"#).unwrap();
        let before = doc.clone();
        doc.apply(&ConfigEdit::RemoveWifi {
            network: "gone".into(),
        })
        .unwrap();
        assert_eq!(doc, before);
        assert!(doc.get(WIFIS_KEY).is_none());
        assert_eq!(doc.to_json_string().unwrap(), r#"{"sumo_id":"x"}"#);
    }

    #[test]
    fn test_set_field_rejects_non_object_wifis() {
        let mut doc = ConfigDocument::parse("{}").unwrap();
        let err = doc
            .apply(&ConfigEdit::SetField {
                key: WIFIS_KEY.into(),
                value: json!(3),
            })
            .unwrap_err();
        assert!(matches!(err, PatchError::Schema { .. }));
    }
}
