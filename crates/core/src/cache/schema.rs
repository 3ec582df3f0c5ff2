//! Table and column names, and the table descriptions the in-memory engine
//! needs to mirror the SQLite schema.

use tokio_rusqlite::rusqlite::types::Value;

/// Surrogate key column present on every table.
pub const COLUMN_ROW_ID: &str = "_id";

pub mod messages {
    pub const TABLE: &str = "in_app_messages";

    pub const ID: &str = "id";
    pub const CONFIG_NAME: &str = "config_name";
    pub const PRIORITY: &str = "priority";
    pub const DEVICE_ID: &str = "device_id";
    pub const MESSAGE_TYPE: &str = "message_type";
    pub const MESSAGE: &str = "message";
    pub const TAGS: &str = "tags";
    pub const STATUS: &str = "status";
    pub const TTL: &str = "ttl";
    pub const CREATED: &str = "created";
}

pub mod preferences {
    pub const TABLE: &str = "preferences";

    pub const KEY: &str = "key";
    pub const VALUE: &str = "value";
}

/// One column of a [`TableSpec`].
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub default: Value,
    pub unique: bool,
    pub not_null: bool,
}

impl ColumnSpec {
    fn text(name: &'static str) -> Self {
        Self { name, default: Value::Text(String::new()), unique: false, not_null: false }
    }

    fn integer(name: &'static str) -> Self {
        Self { name, default: Value::Integer(0), unique: false, not_null: false }
    }

    fn unique_key(name: &'static str) -> Self {
        Self { name, default: Value::Null, unique: true, not_null: true }
    }
}

/// Shape of a table: the `_id` surrogate key is implied.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names including the surrogate key, in declaration order.
    pub fn column_names(&self) -> Vec<&'static str> {
        std::iter::once(COLUMN_ROW_ID).chain(self.columns.iter().map(|c| c.name)).collect()
    }
}

/// The message table, matching `migrations/in_app_messages.sql`.
pub fn in_app_messages() -> TableSpec {
    TableSpec {
        name: messages::TABLE,
        columns: vec![
            ColumnSpec::unique_key(messages::ID),
            ColumnSpec::text(messages::CONFIG_NAME),
            ColumnSpec::text(messages::PRIORITY),
            ColumnSpec::text(messages::DEVICE_ID),
            ColumnSpec::text(messages::MESSAGE_TYPE),
            ColumnSpec::text(messages::MESSAGE),
            ColumnSpec::text(messages::TAGS),
            ColumnSpec::text(messages::STATUS),
            ColumnSpec::integer(messages::TTL),
            ColumnSpec::integer(messages::CREATED),
        ],
    }
}

/// The preference table, matching `migrations/preferences.sql`.
pub fn preference_table() -> TableSpec {
    TableSpec {
        name: preferences::TABLE,
        columns: vec![
            ColumnSpec::unique_key(preferences::KEY),
            ColumnSpec { name: preferences::VALUE, default: Value::Null, unique: false, not_null: false },
        ],
    }
}
