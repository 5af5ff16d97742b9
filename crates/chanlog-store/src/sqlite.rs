// ABOUTME: SQLite-backed durable store of the last issued log number per channel.
// ABOUTME: Values are kept as decimal text and normalized to SequenceNumber at this boundary.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chanlog_core::{ChannelId, PersistenceError, SequenceNumber, SequenceStore};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use thiserror::Error;

/// Errors that can occur during SQLite sequence store operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored sequence for channel {channel} is not a positive integer: {value:?}")]
    Corrupt { channel: ChannelId, value: String },

    #[error("sequence numbers exhausted for channel {0}")]
    Exhausted(ChannelId),

    #[error("sqlite connection lock poisoned")]
    Poisoned,

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<SqliteError> for PersistenceError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Corrupt { channel, value } => PersistenceError::Corrupt { channel, value },
            SqliteError::Exhausted(channel) => PersistenceError::Exhausted(channel),
            other => PersistenceError::backend("sqlite sequence store", other),
        }
    }
}

/// Durable channel -> last sequence number map. The connection is shared
/// behind a mutex and used from blocking tasks so callers never stall the
/// async runtime on disk I/O.
#[derive(Clone)]
pub struct SqliteSequenceStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSequenceStore {
    /// Open or create the store at `path`, creating the schema if needed.
    pub fn open(path: &Path) -> Result<Self, SqliteError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, SqliteError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SqliteError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sequences (
                channel TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Issue the next number for `channel` inside one immediate transaction.
    pub fn issue_next(&self, channel: &ChannelId) -> Result<SequenceNumber, SqliteError> {
        let mut conn = self.conn.lock().map_err(|_| SqliteError::Poisoned)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let last = read_value(&tx, channel)?;
        let next = SequenceNumber::after(last).ok_or_else(|| SqliteError::Exhausted(channel.clone()))?;

        tx.execute(
            "INSERT INTO sequences (channel, value) VALUES (?1, ?2)
             ON CONFLICT(channel) DO UPDATE SET value = excluded.value",
            params![channel.as_str(), next.to_string()],
        )?;
        tx.commit()?;

        Ok(next)
    }

    /// The last number issued for `channel`, if any.
    pub fn get(&self, channel: &ChannelId) -> Result<Option<SequenceNumber>, SqliteError> {
        let conn = self.conn.lock().map_err(|_| SqliteError::Poisoned)?;
        read_value(&conn, channel)
    }

    /// Overwrite the stored number for `channel`. The next issued number
    /// continues from `value`.
    pub fn set(&self, channel: &ChannelId, value: SequenceNumber) -> Result<(), SqliteError> {
        let conn = self.conn.lock().map_err(|_| SqliteError::Poisoned)?;
        conn.execute(
            "INSERT INTO sequences (channel, value) VALUES (?1, ?2)
             ON CONFLICT(channel) DO UPDATE SET value = excluded.value",
            params![channel.as_str(), value.to_string()],
        )?;
        Ok(())
    }

    /// Every channel with its last issued number, ordered by channel.
    pub fn list(&self) -> Result<Vec<(ChannelId, SequenceNumber)>, SqliteError> {
        let conn = self.conn.lock().map_err(|_| SqliteError::Poisoned)?;
        let mut stmt = conn.prepare("SELECT channel, value FROM sequences ORDER BY channel ASC")?;

        let rows = stmt.query_map([], |row| {
            let channel: String = row.get(0)?;
            let value: Value = row.get(1)?;
            Ok((channel, value))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (channel, value) = row?;
            let channel = ChannelId::from(channel);
            let sequence = parse_value(&channel, value)?;
            entries.push((channel, sequence));
        }
        Ok(entries)
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, SqliteError>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteSequenceStore) -> Result<T, SqliteError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store)).await?
    }
}

#[async_trait]
impl SequenceStore for SqliteSequenceStore {
    async fn next(&self, channel: &ChannelId) -> Result<SequenceNumber, PersistenceError> {
        let channel = channel.clone();
        Ok(self.blocking(move |store| store.issue_next(&channel)).await?)
    }
}

fn read_value(conn: &Connection, channel: &ChannelId) -> Result<Option<SequenceNumber>, SqliteError> {
    let value: Option<Value> = conn
        .query_row(
            "SELECT value FROM sequences WHERE channel = ?1",
            params![channel.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    value.map(|v| parse_value(channel, v)).transpose()
}

/// Older stores may hold the number as an INTEGER rather than text; both
/// normalize to the same SequenceNumber.
fn parse_value(channel: &ChannelId, value: Value) -> Result<SequenceNumber, SqliteError> {
    let parsed = match &value {
        Value::Text(text) => SequenceNumber::parse(text),
        Value::Integer(n) => u64::try_from(*n).ok().and_then(SequenceNumber::new),
        _ => None,
    };

    parsed.ok_or_else(|| SqliteError::Corrupt {
        channel: channel.clone(),
        value: format!("{:?}", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn channel(id: &str) -> ChannelId {
        ChannelId::from(id)
    }

    #[test]
    fn first_number_is_one() {
        let store = SqliteSequenceStore::in_memory().unwrap();
        assert_eq!(store.get(&channel("channel")).unwrap(), None);

        let first = store.issue_next(&channel("channel")).unwrap();
        assert_eq!(first.get(), 1);
        assert_eq!(store.get(&channel("channel")).unwrap(), Some(first));
    }

    #[test]
    fn next_is_one_higher_than_previous() {
        let store = SqliteSequenceStore::in_memory().unwrap();
        store
            .set(&channel("channel"), SequenceNumber::new(32).unwrap())
            .unwrap();

        assert_eq!(store.issue_next(&channel("channel")).unwrap().get(), 33);
        assert_eq!(store.issue_next(&channel("channel")).unwrap().get(), 34);
    }

    #[test]
    fn values_are_stored_as_decimal_text() {
        let store = SqliteSequenceStore::in_memory().unwrap();
        store.issue_next(&channel("channel")).unwrap();
        store.issue_next(&channel("channel")).unwrap();

        let conn = store.conn.lock().unwrap();
        let (value, kind): (String, String) = conn
            .query_row(
                "SELECT value, typeof(value) FROM sequences WHERE channel = 'channel'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(value, "2");
        assert_eq!(kind, "text");
    }

    #[test]
    fn integer_values_are_accepted() {
        let store = SqliteSequenceStore::in_memory().unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO sequences (channel, value) VALUES ('legacy', 23)",
                [],
            )
            .unwrap();
        }

        assert_eq!(store.issue_next(&channel("legacy")).unwrap().get(), 24);
    }

    #[test]
    fn corrupt_value_is_reported() {
        let store = SqliteSequenceStore::in_memory().unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO sequences (channel, value) VALUES ('broken', 'banana')",
                [],
            )
            .unwrap();
        }

        let err = store.issue_next(&channel("broken")).unwrap_err();
        assert!(
            matches!(err, SqliteError::Corrupt { ref channel, .. } if channel.as_str() == "broken"),
            "expected Corrupt, got: {}",
            err
        );
        // The failed issue must not have changed the stored value
        let conn = store.conn.lock().unwrap();
        let value: String = conn
            .query_row("SELECT value FROM sequences WHERE channel = 'broken'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(value, "banana");
    }

    #[test]
    fn exhausted_channel_is_reported() {
        let store = SqliteSequenceStore::in_memory().unwrap();
        store
            .set(&channel("full"), SequenceNumber::new(u64::MAX).unwrap())
            .unwrap();

        let err = store.issue_next(&channel("full")).unwrap_err();
        assert!(matches!(err, SqliteError::Exhausted(_)));
    }

    #[test]
    fn channels_are_independent_and_listed_in_order() {
        let store = SqliteSequenceStore::in_memory().unwrap();
        store.issue_next(&channel("#zeta")).unwrap();
        store.issue_next(&channel("#alpha")).unwrap();
        store.issue_next(&channel("#alpha")).unwrap();

        let listed: Vec<(String, u64)> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|(c, s)| (c.to_string(), s.get()))
            .collect();
        assert_eq!(
            listed,
            vec![("#alpha".to_string(), 2), ("#zeta".to_string(), 1)]
        );
    }

    #[test]
    fn numbers_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("sequences.db");

        {
            let store = SqliteSequenceStore::open(&db_path).unwrap();
            store.issue_next(&channel("#crossings_ooc")).unwrap();
            store.issue_next(&channel("#crossings_ooc")).unwrap();
        }

        let reopened = SqliteSequenceStore::open(&db_path).unwrap();
        assert_eq!(reopened.issue_next(&channel("#crossings_ooc")).unwrap().get(), 3);
    }

    #[tokio::test]
    async fn trait_next_persists_before_returning() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("sequences.db");
        let store = SqliteSequenceStore::open(&db_path).unwrap();

        let issued = SequenceStore::next(&store, &channel("channel")).await.unwrap();
        assert_eq!(issued.get(), 1);

        let other = SqliteSequenceStore::open(&db_path).unwrap();
        assert_eq!(other.get(&channel("channel")).unwrap(), Some(issued));
        assert_eq!(
            SequenceStore::next(&store, &channel("channel")).await.unwrap().get(),
            2
        );
    }

    #[tokio::test]
    async fn trait_maps_corruption_to_persistence_error() {
        let store = SqliteSequenceStore::in_memory().unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO sequences (channel, value) VALUES ('broken', '-4')",
                [],
            )
            .unwrap();
        }

        let err = SequenceStore::next(&store, &channel("broken")).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt { .. }));
    }
}
