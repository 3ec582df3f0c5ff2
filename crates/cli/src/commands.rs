//! Subcommand implementations.
//!
//! Each command runs against an open [`MessageCache`] and returns the JSON
//! document printed on stdout.

use std::time::Duration;

use anyhow::{Context, Result};
use flipcast_core::cache::{AddressScheme, MessageAddress, StorageEngine};
use flipcast_core::{InAppMessage, MessageCache};
use serde_json::{Value, json};

pub async fn list<E: StorageEngine>(cache: &MessageCache<E>, status: Option<&str>) -> Result<Value> {
    let messages: Vec<InAppMessage> = cache
        .messages()
        .await?
        .into_iter()
        .filter(|m| status.is_none_or(|s| m.status == s))
        .collect();
    Ok(json!({ "count": messages.len(), "messages": messages }))
}

pub async fn get<E: StorageEngine>(cache: &MessageCache<E>, id: &str) -> Result<Value> {
    let message = cache.message(id).await?.with_context(|| format!("no cached message with id {id:?}"))?;
    Ok(serde_json::to_value(message)?)
}

pub async fn count<E: StorageEngine>(cache: &MessageCache<E>, status: Option<&str>) -> Result<Value> {
    Ok(json!({ "count": cache.count(status).await? }))
}

pub async fn insert<E: StorageEngine>(cache: &MessageCache<E>, raw: &str) -> Result<Value> {
    let message = InAppMessage::from_json(raw)?;
    let inserted = cache.insert(&message).await?;
    tracing::debug!(id = %message.id, row_id = inserted.row_id, "Inserted message");
    Ok(json!({
        "id": message.id,
        "rowId": inserted.row_id,
        "evicted": inserted.evicted,
    }))
}

pub async fn delete<E: StorageEngine>(cache: &MessageCache<E>, id: &str) -> Result<Value> {
    Ok(json!({ "deleted": cache.delete_one(id).await? }))
}

pub async fn clear<E: StorageEngine>(cache: &MessageCache<E>) -> Result<Value> {
    Ok(json!({ "deleted": cache.delete_all().await? }))
}

pub async fn mark_read<E: StorageEngine>(cache: &MessageCache<E>, id: &str) -> Result<Value> {
    let updated = cache.mark_read(id).await?;
    if updated == 0 {
        anyhow::bail!("no cached message with id {id:?}");
    }
    Ok(json!({ "updated": updated }))
}

pub async fn limit_get<E: StorageEngine>(cache: &MessageCache<E>) -> Result<Value> {
    let limit = cache.cache_limit().await?;
    Ok(json!({ "limit": limit.to_raw(), "display": limit.to_string() }))
}

pub async fn limit_set<E: StorageEngine>(cache: &MessageCache<E>, raw: i64) -> Result<Value> {
    let limit = cache.set_cache_limit(raw).await?;
    Ok(json!({ "limit": limit.to_raw(), "display": limit.to_string() }))
}

pub async fn prefs_get<E: StorageEngine>(cache: &MessageCache<E>) -> Result<Value> {
    let prefs = cache.preferences();
    let poll_interval_ms = prefs.poll_interval().await?.map(|d| d.as_millis() as u64);
    Ok(json!({
        "pollIntervalMs": poll_interval_ms,
        "bootPersist": prefs.boot_persist().await?,
    }))
}

pub async fn prefs_set<E: StorageEngine>(
    cache: &MessageCache<E>,
    poll_interval_ms: Option<u64>,
    boot_persist: Option<bool>,
) -> Result<Value> {
    if poll_interval_ms.is_none() && boot_persist.is_none() {
        anyhow::bail!("nothing to set; pass --poll-interval-ms or --boot-persist");
    }
    let prefs = cache.preferences();
    if let Some(ms) = poll_interval_ms {
        prefs.set_poll_interval(Duration::from_millis(ms)).await?;
    }
    if let Some(enabled) = boot_persist {
        prefs.set_boot_persist(enabled).await?;
    }
    drop(prefs);
    prefs_get(cache).await
}

pub async fn resolve<E: StorageEngine>(cache: &MessageCache<E>, scheme: &AddressScheme, uri: &str) -> Result<Value> {
    let address = scheme.parse(uri)?;
    let messages = cache.query(&address).await?.into_messages()?;
    let id = match &address {
        MessageAddress::AllMessages => None,
        MessageAddress::SingleMessage(id) => Some(id.clone()),
    };
    Ok(json!({
        "uri": scheme.to_url(&address).as_str(),
        "id": id,
        "messages": messages,
    }))
}
