//! The canonical captured-request record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// One inbound HTTP request, normalized at capture time.
///
/// Field names on the wire match the documents already sitting in
/// existing record directories, so old captures keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub id: Uuid,
    pub method: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "remote_addr")]
    pub remote_address: String,
    pub user_agent: String,
    pub content_type: String,
    /// First value per form field. Empty unless the body was form-encoded.
    #[serde(rename = "body_params", default, deserialize_with = "null_as_empty")]
    pub body_parameters: BTreeMap<String, String>,
    /// Link to the stored body when it could not be split into parameters.
    #[serde(
        rename = "link_to_file",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub file_link: Option<String>,
}

impl CapturedRequest {
    /// Storage filename stem and in-memory key.
    pub fn key(&self) -> String {
        self.id.to_string()
    }
}

/// Fresh, never-reused identifier for records and blob names.
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|link| !link.is_empty()))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<BTreeMap<String, String>> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    /// Record with a fixed timestamp `secs` after the epoch.
    pub fn record_at(secs: i64) -> CapturedRequest {
        CapturedRequest {
            id: new_id(),
            method: "GET".into(),
            url: format!("/item/{secs}"),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            remote_address: "127.0.0.1".into(),
            user_agent: "test-agent".into(),
            content_type: String::new(),
            body_parameters: BTreeMap::new(),
            file_link: None,
        }
    }
}
