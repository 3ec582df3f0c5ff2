//! Cache capacity limit and the persisted preferences that hold it.
//!
//! The limit is a single integer setting with its own lifecycle: it is
//! written to the `preferences` table, which survives message table
//! recreation, and reads as the default of 2 until set.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::engine::{Query, Row, Selection, StorageEngine};
use super::schema::preferences;
use crate::Error;
use tokio_rusqlite::rusqlite::types::Value;

/// Preference key holding the cache limit.
pub const CACHE_LIMIT_KEY: &str = "cache_limit";
/// Preference key holding the message poll interval in milliseconds.
pub const POLL_INTERVAL_KEY: &str = "poll_interval";
/// Preference key holding whether polling should resume after a restart.
pub const BOOT_PERSIST_KEY: &str = "boot_persist";

/// Maximum number of cached messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLimit {
    /// Keep at most this many rows, evicting the oldest.
    Bounded(u32),
    /// Never trim.
    Unbounded,
}

impl CacheLimit {
    pub const DEFAULT: CacheLimit = CacheLimit::Bounded(2);

    /// Raw value that disables trimming.
    pub const UNBOUNDED_RAW: i64 = -1;

    /// Interpret a stored value: `-1` is unbounded, `0` means the default.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for values below `-1` or above `u32::MAX`.
    pub fn from_raw(raw: i64) -> Result<Self, Error> {
        match raw {
            Self::UNBOUNDED_RAW => Ok(CacheLimit::Unbounded),
            0 => Ok(Self::DEFAULT),
            n if n > 0 => u32::try_from(n)
                .map(CacheLimit::Bounded)
                .map_err(|_| Error::InvalidInput(format!("cache limit {n} is too large"))),
            n => Err(Error::InvalidInput(format!("cache limit must be -1 or non-negative, got {n}"))),
        }
    }

    pub fn to_raw(self) -> i64 {
        match self {
            CacheLimit::Bounded(n) => i64::from(n),
            CacheLimit::Unbounded => Self::UNBOUNDED_RAW,
        }
    }

    pub fn is_enabled(self) -> bool {
        self != CacheLimit::Unbounded
    }
}

impl Default for CacheLimit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for CacheLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheLimit::Bounded(n) => write!(f, "{n}"),
            CacheLimit::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Source of the current cache limit.
#[async_trait::async_trait]
pub trait LimitStore: Send + Sync {
    async fn cache_limit(&self) -> Result<CacheLimit, Error>;

    async fn set_cache_limit(&self, limit: CacheLimit) -> Result<(), Error>;
}

/// Key/value settings stored in the `preferences` table of a storage engine.
#[derive(Debug)]
pub struct Preferences<E> {
    engine: Arc<E>,
}

impl<E> Clone for Preferences<E> {
    fn clone(&self) -> Self {
        Self { engine: Arc::clone(&self.engine) }
    }
}

impl<E: StorageEngine> Preferences<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>, Error> {
        let query = Query::all()
            .columns([preferences::VALUE])
            .filter(Selection::eq(preferences::KEY, key.to_string()))
            .limit(1);
        let mut cursor = self.engine.query(preferences::TABLE, query).await?;
        Ok(cursor
            .next()
            .and_then(|row| row.get(preferences::VALUE).cloned())
            .filter(|v| *v != Value::Null))
    }

    pub async fn set(&self, key: &str, value: impl Into<Value> + Send) -> Result<(), Error> {
        let row = Row::new().with(preferences::KEY, key.to_string()).with(preferences::VALUE, value);
        self.engine.insert_or_replace(preferences::TABLE, row).await?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<bool, Error> {
        let removed = self
            .engine
            .delete(preferences::TABLE, Selection::eq(preferences::KEY, key.to_string()))
            .await?;
        Ok(removed > 0)
    }

    pub async fn get_integer(&self, key: &str) -> Result<Option<i64>, Error> {
        match self.get(key).await? {
            None => Ok(None),
            Some(Value::Integer(i)) => Ok(Some(i)),
            Some(other) => Err(Error::Codec(format!("preference {key} is not an integer: {other:?}"))),
        }
    }

    /// Interval between message polls, if one was configured.
    pub async fn poll_interval(&self) -> Result<Option<Duration>, Error> {
        let millis = self.get_integer(POLL_INTERVAL_KEY).await?;
        Ok(millis.and_then(|ms| u64::try_from(ms).ok()).map(Duration::from_millis))
    }

    pub async fn set_poll_interval(&self, interval: Duration) -> Result<(), Error> {
        let millis = i64::try_from(interval.as_millis())
            .map_err(|_| Error::InvalidInput(format!("poll interval {interval:?} is too large")))?;
        self.set(POLL_INTERVAL_KEY, millis).await
    }

    /// Whether polling should resume after a restart. Defaults to false.
    pub async fn boot_persist(&self) -> Result<bool, Error> {
        Ok(self.get_integer(BOOT_PERSIST_KEY).await?.is_some_and(|v| v != 0))
    }

    pub async fn set_boot_persist(&self, enabled: bool) -> Result<(), Error> {
        self.set(BOOT_PERSIST_KEY, i64::from(enabled)).await
    }
}

#[async_trait::async_trait]
impl<E: StorageEngine> LimitStore for Preferences<E> {
    async fn cache_limit(&self) -> Result<CacheLimit, Error> {
        match self.get_integer(CACHE_LIMIT_KEY).await? {
            Some(raw) => CacheLimit::from_raw(raw),
            None => Ok(CacheLimit::DEFAULT),
        }
    }

    async fn set_cache_limit(&self, limit: CacheLimit) -> Result<(), Error> {
        self.set(CACHE_LIMIT_KEY, limit.to_raw()).await
    }
}
