//! Storage engine contract.
//!
//! The cache talks to storage only through [`StorageEngine`] and
//! [`TransactionScope`], so the SQLite engine and the in-memory engine are
//! interchangeable. Requests are typed values: selections never carry raw SQL
//! and every value is bound as a parameter.

use std::cmp::Ordering;

use crate::Error;
use tokio_rusqlite::rusqlite::types::Value;

/// An ordered set of column/value pairs.
///
/// Used both for writes (the values to insert or update) and for rows read
/// back through a [`Cursor`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing any previous value for it.
    pub fn put(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let column = column.into();
        let value = value.into();
        match self.values.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((column, value)),
        }
        self
    }

    /// Builder form of [`Row::put`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    /// Text value of a column; `None` when missing, null or not text.
    pub fn get_text(&self, column: &str) -> Option<&str> {
        match self.get(column) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Integer value of a column; `None` when missing, null or not an integer.
    pub fn get_integer(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            Some(Value::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.put(column, value);
        }
        row
    }
}

/// Which rows an operation applies to.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Selection {
    /// Every row.
    #[default]
    All,
    /// Rows whose column equals the value. Null never matches.
    Eq(String, Value),
    /// Rows whose column is one of the values.
    In(String, Vec<Value>),
    /// Rows whose column is none of the values.
    NotIn(String, Vec<Value>),
    /// Rows matching every inner selection.
    And(Vec<Selection>),
    /// Rows whose column is not among the first `limit` rows of the table
    /// under `order_by`. Evaluated by the engine against the whole table, so
    /// the kept values never leave storage.
    NotInRanked { column: String, order_by: Vec<OrderBy>, limit: u64 },
}

impl Selection {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Selection::Eq(column.into(), value.into())
    }

    /// Evaluate the selection against a row with SQL comparison semantics.
    ///
    /// [`Selection::NotInRanked`] depends on the rest of the table and never
    /// matches here; engines rewrite it into [`Selection::NotIn`] first.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Selection::All => true,
            Selection::Eq(column, value) => match row.get(column) {
                Some(current) => sql_eq(current, value),
                None => false,
            },
            Selection::In(column, values) => match row.get(column) {
                Some(current) => values.iter().any(|v| sql_eq(current, v)),
                None => false,
            },
            Selection::NotIn(_, values) if values.is_empty() => true,
            Selection::NotIn(column, values) => match row.get(column) {
                Some(Value::Null) | None => false,
                Some(current) => !values.iter().any(|v| sql_eq(current, v)),
            },
            Selection::And(inner) => inner.iter().all(|s| s.matches(row)),
            Selection::NotInRanked { .. } => false,
        }
    }

    /// Every column name this selection refers to.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Selection::All => Vec::new(),
            Selection::Eq(c, _) | Selection::In(c, _) | Selection::NotIn(c, _) => vec![c.as_str()],
            Selection::And(inner) => inner.iter().flat_map(Selection::columns).collect(),
            Selection::NotInRanked { column, order_by, .. } => std::iter::once(column.as_str())
                .chain(order_by.iter().map(|o| o.column.as_str()))
                .collect(),
        }
    }
}

fn sql_eq(a: &Value, b: &Value) -> bool {
    !matches!(a, Value::Null) && !matches!(b, Value::Null) && compare_values(a, b) == Ordering::Equal
}

/// Total order over values following SQLite's storage class ordering:
/// NULL, then numbers, then text, then blobs.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn class(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Integer(_) | Value::Real(_) => 1,
            Value::Text(_) => 2,
            Value::Blob(_) => 3,
        }
    }

    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Integer(x), Value::Real(y)) => (*x as f64).total_cmp(y),
        (Value::Real(x), Value::Integer(y)) => x.total_cmp(&(*y as f64)),
        (Value::Real(x), Value::Real(y)) => x.total_cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Blob(x), Value::Blob(y)) => x.cmp(y),
        _ => class(a).cmp(&class(b)),
    }
}

/// Sort direction for [`OrderBy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

/// A read request: projection, filter, grouping, ordering and limit.
///
/// `columns: None` selects every column of the table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub columns: Option<Vec<String>>,
    pub selection: Selection,
    pub group_by: Option<String>,
    pub having: Option<Selection>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by = Some(column.into());
        self
    }

    pub fn having(mut self, selection: Selection) -> Self {
        self.having = Some(selection);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy { column: column.into(), direction });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Forward-only view over the rows a query produced.
#[derive(Debug)]
pub struct Cursor {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Row>,
}

impl Cursor {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows: rows.into_iter() }
    }

    /// Column names in projection order.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Decode the remaining rows as messages.
    pub fn into_messages(self) -> Result<Vec<crate::InAppMessage>, Error> {
        self.map(|row| super::codec::decode(&row)).collect()
    }
}

impl Iterator for Cursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for Cursor {}

/// Row operations available inside a transaction.
///
/// Writes made through a scope are kept only if [`mark_successful`] is
/// called before the transaction ends.
///
/// [`mark_successful`]: TransactionScope::mark_successful
pub trait TransactionScope {
    fn query(&mut self, table: &str, query: &Query) -> Result<Cursor, Error>;

    /// Insert a row; a row conflicting on a unique column is replaced.
    /// Returns the new row's surrogate id.
    fn insert_or_replace(&mut self, table: &str, row: &Row) -> Result<i64, Error>;

    fn update(&mut self, table: &str, values: &Row, selection: &Selection) -> Result<u64, Error>;

    /// Delete matching rows and return the true number removed.
    fn delete(&mut self, table: &str, selection: &Selection) -> Result<u64, Error>;

    fn mark_successful(&mut self);
}

/// A durable, transactional row store over named tables.
#[async_trait::async_trait]
pub trait StorageEngine: Send + Sync + 'static {
    async fn query(&self, table: &str, query: Query) -> Result<Cursor, Error>;

    async fn insert_or_replace(&self, table: &str, row: Row) -> Result<i64, Error>;

    async fn update(&self, table: &str, values: Row, selection: Selection) -> Result<u64, Error>;

    async fn delete(&self, table: &str, selection: Selection) -> Result<u64, Error>;

    /// Number of rows matching `selection`, counted in storage.
    async fn count(&self, table: &str, selection: Selection) -> Result<u64, Error>;

    /// Run `work` inside one transaction.
    ///
    /// Commits when `work` returns `Ok` after calling
    /// [`TransactionScope::mark_successful`]; otherwise every write made in
    /// the scope is rolled back. The output of `work` is returned either way.
    async fn transaction<T, F>(&self, work: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn TransactionScope) -> Result<T, Error> + Send + 'static;

    /// Release the engine's handles. Later calls fail with a storage error.
    async fn close(self) -> Result<(), Error>
    where
        Self: Sized;
}

/// Reject anything but a plain SQL identifier.
///
/// Table and column names cannot be bound as parameters, so they are checked
/// before being written into a statement.
pub fn check_identifier(name: &str) -> Result<&str, Error> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    };
    if valid { Ok(name) } else { Err(Error::InvalidIdentifier(name.to_string())) }
}
