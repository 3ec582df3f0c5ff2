//! The cached in-app message entity.

use serde::{Deserialize, Serialize};

use crate::Error;

pub const STATUS_NEW: &str = "NEW";
pub const STATUS_READ: &str = "READ";

/// An in-app message as delivered by the messaging service.
///
/// `id` is the natural key; storing a message whose id is already cached
/// replaces the earlier copy. `tags: None` and `tags: Some(vec![])` are
/// distinct in memory, but both are stored the same way and read back as
/// `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InAppMessage {
    pub id: String,
    #[serde(default)]
    pub config_name: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub message_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub ttl: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created: i64,
}

impl InAppMessage {
    /// A new unread message created now.
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            status: STATUS_NEW.to_string(),
            created: chrono::Utc::now().timestamp_millis(),
            ..Default::default()
        }
    }

    /// Parse a message from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let message: Self = serde_json::from_str(json).map_err(|e| Error::Codec(format!("invalid message JSON: {e}")))?;
        if message.id.is_empty() {
            return Err(Error::Codec("message id must not be empty".into()));
        }
        Ok(message)
    }

    pub fn is_read(&self) -> bool {
        self.status == STATUS_READ
    }
}

/// A sparse change to a cached message. Unset fields are left untouched;
/// the id cannot be changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageUpdate {
    pub config_name: Option<String>,
    pub priority: Option<String>,
    pub device_id: Option<String>,
    pub message_type: Option<String>,
    pub message: Option<String>,
    pub tags: Option<Vec<String>>,
    pub ttl: Option<i64>,
    pub status: Option<String>,
    pub created: Option<i64>,
}

impl MessageUpdate {
    /// Patch that only sets the status.
    pub fn status(status: impl Into<String>) -> Self {
        Self { status: Some(status.into()), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
