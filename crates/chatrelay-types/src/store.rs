//! Store-reserved document metadata.
//!
//! Every persisted record carries an id plus the revision fields the document
//! store assigns on write. They are flattened into the record's JSON so the
//! stored document layout matches what the store returns.

use serde::{Deserialize, Serialize};

/// Identity and revision metadata for a stored document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMeta {
    /// Document id. Generated on first save when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rid", default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    /// Self-link of the document inside the store.
    #[serde(rename = "_self", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    /// Revision tag, changes on every write.
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(rename = "_attachments", default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<String>,
    /// Last write time in seconds since the epoch.
    #[serde(rename = "_ts", default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

impl StoreMeta {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_field_names() {
        let meta = StoreMeta {
            id: Some("abc".to_string()),
            rid: Some("r1".to_string()),
            self_link: Some("dbs/x/colls/y/docs/abc".to_string()),
            etag: Some("\"0001\"".to_string()),
            attachments: None,
            ts: Some(1_700_000_000),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["_rid"], "r1");
        assert_eq!(json["_self"], "dbs/x/colls/y/docs/abc");
        assert_eq!(json["_ts"], 1_700_000_000);
        assert!(json.get("_attachments").is_none());
    }

    #[test]
    fn test_missing_fields_default() {
        let meta: StoreMeta = serde_json::from_str("{}").unwrap();
        assert_eq!(meta, StoreMeta::default());
    }
}
