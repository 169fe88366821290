//! Network scan results.

use serde_json::Value;

use super::config::{ConfigDocument, PatchError, kind_of};
use crate::protocol::constants::SSIDS_KEY;

/// SSIDs from a scan document, in scan order.
///
/// Access points sharing an SSID are listed once. Hidden networks report an
/// empty SSID and are skipped.
pub fn networks(doc: &ConfigDocument) -> Result<Vec<String>, PatchError> {
    let schema = |expected, found| PatchError::Schema {
        field: SSIDS_KEY.to_string(),
        expected,
        found,
    };

    let entries = match doc.get(SSIDS_KEY) {
        Some(Value::Array(entries)) => entries,
        Some(other) => return Err(schema("an array", kind_of(other))),
        None => return Err(schema("an array", "nothing")),
    };

    let mut ssids: Vec<String> = Vec::with_capacity(entries.len());
    for entry in entries {
        let ssid = entry
            .as_str()
            .ok_or_else(|| schema("a list of strings", kind_of(entry)))?;
        if !ssid.is_empty() && !ssids.iter().any(|s| s == ssid) {
            ssids.push(ssid.to_string());
        }
    }
    Ok(ssids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str) -> Result<Vec<String>, PatchError> {
        networks(&ConfigDocument::parse(text).unwrap())
    }

    #[test]
    fn test_scan_order_kept() {
        assert_eq!(
            scan(r#"{"ssids": ["office", "home", "cafe"]}"#).unwrap(),
            vec!["office", "home", "cafe"]
        );
    }

    #[test]
    fn test_duplicates_and_hidden_dropped() {
        assert_eq!(
            scan(r#"{"ssids": ["home", "", "home", "café"]}"#).unwrap(),
            vec!["home", "café"]
        );
    }

    #[test]
    fn test_empty_scan() {
        assert!(scan(r#"{"ssids": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_missing_list() {
        assert!(matches!(
            scan(r#"{"wifis": {}}"#),
            Err(PatchError::Schema { found: "nothing", .. })
        ));
    }

    #[test]
    fn test_non_string_entry() {
        assert!(matches!(
            scan(r#"{"ssids": ["a", 3]}"#),
            Err(PatchError::Schema { found: "a number", .. })
        ));
    }
}
