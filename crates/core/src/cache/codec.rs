//! Mapping between [`InAppMessage`] and message table rows.

use super::engine::Row;
use super::schema::messages;
use crate::message::{InAppMessage, MessageUpdate};
use crate::Error;

const TAG_SEPARATOR: char = ',';

/// Flatten a message into a row for the message table.
pub fn encode(message: &InAppMessage) -> Row {
    Row::new()
        .with(messages::ID, message.id.clone())
        .with(messages::CONFIG_NAME, message.config_name.clone())
        .with(messages::PRIORITY, message.priority.clone())
        .with(messages::DEVICE_ID, message.device_id.clone())
        .with(messages::MESSAGE_TYPE, message.message_type.clone())
        .with(messages::MESSAGE, message.message.clone())
        .with(messages::TAGS, join_tags(message.tags.as_deref()))
        .with(messages::STATUS, message.status.clone())
        .with(messages::TTL, message.ttl)
        .with(messages::CREATED, message.created)
}

/// Rebuild a message from a row. Missing text reads as empty and missing
/// numbers as 0; a missing id is an error.
pub fn decode(row: &Row) -> Result<InAppMessage, Error> {
    let id = row
        .get_text(messages::ID)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Codec("row has no message id".into()))?;

    let text = |column: &str| row.get_text(column).unwrap_or_default().to_string();
    let integer = |column: &str| row.get_integer(column).unwrap_or_default();

    Ok(InAppMessage {
        id: id.to_string(),
        config_name: text(messages::CONFIG_NAME),
        priority: text(messages::PRIORITY),
        device_id: text(messages::DEVICE_ID),
        message_type: text(messages::MESSAGE_TYPE),
        message: text(messages::MESSAGE),
        tags: split_tags(row.get_text(messages::TAGS).unwrap_or_default()),
        ttl: integer(messages::TTL),
        status: text(messages::STATUS),
        created: integer(messages::CREATED),
    })
}

/// Row holding only the columns a patch sets.
pub fn encode_update(update: &MessageUpdate) -> Row {
    let mut row = Row::new();
    let text_fields = [
        (messages::CONFIG_NAME, &update.config_name),
        (messages::PRIORITY, &update.priority),
        (messages::DEVICE_ID, &update.device_id),
        (messages::MESSAGE_TYPE, &update.message_type),
        (messages::MESSAGE, &update.message),
        (messages::STATUS, &update.status),
    ];
    for (column, value) in text_fields {
        if let Some(value) = value {
            row.put(column, value.clone());
        }
    }
    if let Some(tags) = &update.tags {
        row.put(messages::TAGS, join_tags(Some(tags)));
    }
    if let Some(ttl) = update.ttl {
        row.put(messages::TTL, ttl);
    }
    if let Some(created) = update.created {
        row.put(messages::CREATED, created);
    }
    row
}

/// Join tags with commas; no tags is the empty string.
pub fn join_tags(tags: Option<&[String]>) -> String {
    match tags {
        Some(tags) => tags.join(","),
        None => String::new(),
    }
}

/// Split a stored tag string.
///
/// The empty string means "no tags" and yields `None`, never an empty list.
/// A single trailing comma is ignored and each tag is trimmed.
pub fn split_tags(stored: &str) -> Option<Vec<String>> {
    if stored.is_empty() {
        return None;
    }
    let stored = stored.strip_suffix(TAG_SEPARATOR).unwrap_or(stored);
    Some(stored.split(TAG_SEPARATOR).map(|tag| tag.trim().to_string()).collect())
}
