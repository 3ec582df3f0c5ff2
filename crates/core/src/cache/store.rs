//! The message cache facade.
//!
//! [`MessageCache`] composes a storage engine, the record codec, the trim
//! policy and a limit store. Inserts encode the message, replace any row with
//! the same id and trim to the cache limit in a single transaction, then
//! notify observers.

use std::sync::Arc;

use super::address::MessageAddress;
use super::codec;
use super::connection::SqliteEngine;
use super::engine::{Cursor, Query, Selection, StorageEngine};
use super::limit::{CacheLimit, LimitStore, Preferences};
use super::notify::{Change, ChangeKind, ChangeNotifier};
use super::policy;
use super::schema::messages;
use crate::config::AppConfig;
use crate::message::{InAppMessage, MessageUpdate, STATUS_READ};
use crate::Error;
use tokio::sync::broadcast;

/// Default capacity of the change notification channel.
pub const DEFAULT_NOTIFY_CAPACITY: usize = 64;

/// Result of a successful insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inserted {
    /// Surrogate id of the stored row.
    pub row_id: i64,
    /// The address the insert went through.
    pub address: MessageAddress,
    /// Rows evicted by the trim that followed the insert.
    pub evicted: u64,
}

/// Bounded, insertion-ordered cache of in-app messages.
pub struct MessageCache<E: StorageEngine = SqliteEngine> {
    engine: Arc<E>,
    limits: Arc<dyn LimitStore>,
    notifier: ChangeNotifier,
}

impl MessageCache<SqliteEngine> {
    /// Open the SQLite-backed cache described by `config`.
    pub async fn open(config: &AppConfig) -> Result<Self, Error> {
        let engine = SqliteEngine::open(&config.db_path, config.busy_timeout()).await?;
        Ok(Self::with_preferences(engine, config.notify_capacity))
    }

    /// SQLite cache in memory, for tests and throwaway sessions.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let engine = SqliteEngine::open_in_memory().await?;
        Ok(Self::with_preferences(engine, DEFAULT_NOTIFY_CAPACITY))
    }
}

impl<E: StorageEngine> MessageCache<E> {
    /// Cache whose limit lives in the engine's own preferences table.
    pub fn with_preferences(engine: E, notify_capacity: usize) -> Self {
        let engine = Arc::new(engine);
        let limits = Arc::new(Preferences::new(Arc::clone(&engine)));
        Self { engine, limits, notifier: ChangeNotifier::new(notify_capacity) }
    }

    /// Cache with a separately supplied limit store.
    pub fn new(engine: E, limits: Arc<dyn LimitStore>, notify_capacity: usize) -> Self {
        Self { engine: Arc::new(engine), limits, notifier: ChangeNotifier::new(notify_capacity) }
    }

    /// Preferences stored alongside the messages.
    pub fn preferences(&self) -> Preferences<E> {
        Preferences::new(Arc::clone(&self.engine))
    }

    /// Store a message through the collection address.
    pub async fn insert(&self, message: &InAppMessage) -> Result<Inserted, Error> {
        self.insert_at(&MessageAddress::AllMessages, message).await
    }

    /// Store a message through `address`.
    ///
    /// A single-message address must name the message's own id.
    pub async fn insert_at(&self, address: &MessageAddress, message: &InAppMessage) -> Result<Inserted, Error> {
        if message.id.is_empty() {
            return Err(Error::InvalidInput("message id must not be empty".into()));
        }
        if let MessageAddress::SingleMessage(id) = address {
            if *id != message.id {
                return Err(Error::InvalidInput(format!("address {address} does not match message id {}", message.id)));
            }
        }

        let limit = self.limits.cache_limit().await?;
        let row = codec::encode(message);
        let (row_id, evicted) = self
            .engine
            .transaction(move |scope| {
                let row_id = scope.insert_or_replace(messages::TABLE, &row)?;
                let evicted = policy::trim(scope, limit)?;
                scope.mark_successful();
                Ok((row_id, evicted))
            })
            .await?;

        self.notifier.notify(ChangeKind::Inserted);
        Ok(Inserted { row_id, address: address.clone(), evicted })
    }

    /// Rows for an address; the collection comes newest first.
    pub async fn query(&self, address: &MessageAddress) -> Result<Cursor, Error> {
        let query = match address {
            MessageAddress::AllMessages => policy::newest_first(Query::all()),
            MessageAddress::SingleMessage(id) => Query::all().filter(Selection::eq(messages::ID, id.clone())),
        };
        self.engine.query(messages::TABLE, query).await
    }

    pub async fn query_all(&self) -> Result<Cursor, Error> {
        self.query(&MessageAddress::AllMessages).await
    }

    pub async fn query_one(&self, id: &str) -> Result<Cursor, Error> {
        self.query(&MessageAddress::single(id)).await
    }

    /// Every cached message, newest first.
    pub async fn messages(&self) -> Result<Vec<InAppMessage>, Error> {
        self.query_all().await?.into_messages()
    }

    pub async fn message(&self, id: &str) -> Result<Option<InAppMessage>, Error> {
        Ok(self.query_one(id).await?.into_messages()?.into_iter().next())
    }

    /// Number of cached messages, optionally only those with `status`.
    pub async fn count(&self, status: Option<&str>) -> Result<u64, Error> {
        let selection = match status {
            Some(status) => Selection::eq(messages::STATUS, status.to_string()),
            None => Selection::All,
        };
        self.engine.count(messages::TABLE, selection).await
    }

    /// Delete the rows an address names and return how many went.
    pub async fn delete(&self, address: &MessageAddress) -> Result<u64, Error> {
        let selection = match address {
            MessageAddress::AllMessages => Selection::All,
            MessageAddress::SingleMessage(id) => Selection::eq(messages::ID, id.clone()),
        };
        let deleted = self.engine.delete(messages::TABLE, selection).await?;
        if *address == MessageAddress::AllMessages {
            tracing::info!(deleted, "Cleared message cache");
        }
        if deleted > 0 {
            self.notifier.notify(ChangeKind::Deleted);
        }
        Ok(deleted)
    }

    pub async fn delete_all(&self) -> Result<u64, Error> {
        self.delete(&MessageAddress::AllMessages).await
    }

    pub async fn delete_one(&self, id: &str) -> Result<u64, Error> {
        self.delete(&MessageAddress::single(id)).await
    }

    /// Apply a patch to the rows an address names.
    pub async fn update(&self, address: &MessageAddress, update: &MessageUpdate) -> Result<u64, Error> {
        let selection = match address {
            MessageAddress::AllMessages => Selection::All,
            MessageAddress::SingleMessage(id) => Selection::eq(messages::ID, id.clone()),
        };
        self.update_where(selection, update).await
    }

    /// Apply a patch to every row matching `selection`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when the patch sets nothing.
    pub async fn update_where(&self, selection: Selection, update: &MessageUpdate) -> Result<u64, Error> {
        if update.is_empty() {
            return Err(Error::InvalidInput("update sets no fields".into()));
        }
        let values = codec::encode_update(update);
        let updated = self.engine.update(messages::TABLE, values, selection).await?;
        if updated > 0 {
            self.notifier.notify(ChangeKind::Updated);
        }
        Ok(updated)
    }

    /// Mark one message as read.
    pub async fn mark_read(&self, id: &str) -> Result<u64, Error> {
        self.update(&MessageAddress::single(id), &MessageUpdate::status(STATUS_READ)).await
    }

    pub async fn cache_limit(&self) -> Result<CacheLimit, Error> {
        self.limits.cache_limit().await
    }

    /// Store a new limit from its raw form (`-1` unbounded, `0` default).
    ///
    /// Rows already cached are trimmed on the next insert.
    pub async fn set_cache_limit(&self, raw: i64) -> Result<CacheLimit, Error> {
        let limit = CacheLimit::from_raw(raw)?;
        self.limits.set_cache_limit(limit).await?;
        Ok(limit)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.notifier.subscribe()
    }

    /// Release the storage handle.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` while a [`Preferences`] handle from
    /// [`MessageCache::preferences`] is still alive.
    pub async fn close(self) -> Result<(), Error> {
        drop(self.limits);
        let engine = Arc::try_unwrap(self.engine)
            .map_err(|_| Error::InvalidInput("storage engine is still shared; drop preference handles first".into()))?;
        engine.close().await
    }
}
