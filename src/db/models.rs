//! Database models for image metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Image metadata record from the database
///
/// `key` doubles as the object-storage path and is immutable once
/// created; `created_at` is the descending sort key for listing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageRecord {
    pub id: i32,
    pub key: String,
    pub url: String,
    pub filename: String,
    pub description: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a new image record
#[derive(Debug, Clone)]
pub struct NewImage {
    pub key: String,
    pub url: String,
    pub filename: String,
    pub description: String,
}
