//! Bounded local cache of in-app messages.
//!
//! Layers, bottom up:
//!
//! - [`engine`]: the storage engine contract and its typed requests
//! - [`connection`] and [`memory`]: SQLite and in-memory engines
//! - [`codec`]: message to row mapping
//! - [`limit`] and [`policy`]: the capacity setting and eviction
//! - [`store`]: the [`MessageCache`] facade, with [`address`] and [`notify`]

pub mod address;
pub mod codec;
pub mod connection;
pub mod engine;
pub mod limit;
pub mod memory;
pub mod migrations;
pub mod notify;
pub mod policy;
pub mod schema;
mod sql;
pub mod store;

pub use crate::Error;

pub use address::{AddressScheme, MessageAddress};
pub use connection::SqliteEngine;
pub use engine::{Cursor, Direction, Query, Row, Selection, StorageEngine, TransactionScope};
pub use limit::{CacheLimit, LimitStore, Preferences};
pub use memory::MemoryEngine;
pub use notify::{Change, ChangeKind, ChangeNotifier};
pub use store::{Inserted, MessageCache};
