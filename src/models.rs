//! Typed views over the mirrored collections.
//!
//! The sync core moves records around as opaque JSON values; these structs are
//! the tolerant, consumer-facing decode of those records. Unknown fields are
//! ignored and most fields are optional so a remote schema change never turns
//! into a client crash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A listed service entry from the `services` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A taxonomy entry from the `categories` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}
