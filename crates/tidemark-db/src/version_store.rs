use rusqlite::{Connection, OptionalExtension, params};
use tidemark_common::{Error, NO_VERSION, Result, Version};
use tracing::{info, warn};

use crate::validation::validate_identifier;

/// Primary key of the single row holding the current version.
const RECORD_ID: i64 = 1;

/// Reads and writes the current schema version, kept in a one-row table inside
/// the migrated database itself.
#[derive(Debug, Clone)]
pub struct VersionStore {
    table: String,
}

impl VersionStore {
    pub fn new(table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        Ok(Self { table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether the bookkeeping table exists yet.
    pub fn exists(&self, conn: &Connection) -> Result<bool> {
        conn.query_row(
            "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![self.table],
            |row| row.get(0),
        )
        .map_err(|e| Error::Persistence(format!("failed to look up {}: {e}", self.table)))
    }

    /// Current version, creating the table on first use. A missing table or
    /// an empty one both read as [`NO_VERSION`].
    pub fn current_version(&self, conn: &Connection) -> Result<Version> {
        if !self.exists(conn)? {
            self.create_table(conn)?;
            return Ok(NO_VERSION);
        }

        match self.read_record(conn)? {
            Some(version) => Ok(version),
            None => {
                warn!(
                    "{} exists but holds no version record; treating database as unmigrated",
                    self.table
                );
                Ok(NO_VERSION)
            }
        }
    }

    /// Current version without touching the schema. `None` when the table or
    /// its record is missing.
    pub fn peek_version(&self, conn: &Connection) -> Result<Option<Version>> {
        if !self.exists(conn)? {
            return Ok(None);
        }
        self.read_record(conn)
    }

    pub fn set_current_version(&self, conn: &Connection, version: Version) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (id, version) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET version = excluded.version",
            self.table
        );
        conn.execute(&sql, params![RECORD_ID, version])
            .map_err(|e| {
                Error::Persistence(format!("failed to record version {version}: {e}"))
            })?;
        Ok(())
    }

    fn create_table(&self, conn: &Connection) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY,
                version INTEGER
            )",
            self.table
        );
        conn.execute_batch(&sql)
            .map_err(|e| Error::Persistence(format!("failed to create {}: {e}", self.table)))?;
        info!("created version table {}", self.table);
        Ok(())
    }

    fn read_record(&self, conn: &Connection) -> Result<Option<Version>> {
        let sql = format!("SELECT version FROM {} WHERE id = ?1", self.table);
        let record: Option<Option<Version>> = conn
            .query_row(&sql, params![RECORD_ID], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Persistence(format!("failed to read {}: {e}", self.table)))?;

        match record {
            None => Ok(None),
            Some(Some(version)) => Ok(Some(version)),
            Some(None) => Err(Error::Persistence(format!(
                "{} record has no version value",
                self.table
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> VersionStore {
        VersionStore::new("migrations").unwrap()
    }

    #[test]
    fn fresh_database_creates_table_and_reads_no_version() {
        let conn = Connection::open_in_memory().unwrap();
        let store = store();
        assert!(!store.exists(&conn).unwrap());

        assert_eq!(store.current_version(&conn).unwrap(), NO_VERSION);
        assert!(store.exists(&conn).unwrap());
    }

    #[test]
    fn empty_table_reads_no_version() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE migrations (id INTEGER PRIMARY KEY, version INTEGER)")
            .unwrap();

        assert_eq!(store().current_version(&conn).unwrap(), NO_VERSION);
    }

    #[test]
    fn set_then_read_version() {
        let conn = Connection::open_in_memory().unwrap();
        let store = store();
        store.current_version(&conn).unwrap();

        store.set_current_version(&conn, 3).unwrap();
        assert_eq!(store.current_version(&conn).unwrap(), 3);

        store.set_current_version(&conn, 2).unwrap();
        assert_eq!(store.current_version(&conn).unwrap(), 2);

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn null_version_is_a_persistence_error() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE migrations (id INTEGER PRIMARY KEY, version INTEGER);
             INSERT INTO migrations (id, version) VALUES (1, NULL);",
        )
        .unwrap();

        let err = store().current_version(&conn).unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }

    #[test]
    fn missing_column_is_a_persistence_error() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE migrations (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();

        let err = store().current_version(&conn).unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }

    #[test]
    fn rejected_write_is_a_persistence_error() {
        let conn = Connection::open_in_memory().unwrap();
        let err = store().set_current_version(&conn, 1).unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }

    #[test]
    fn peek_never_creates_the_table() {
        let conn = Connection::open_in_memory().unwrap();
        let store = store();
        assert_eq!(store.peek_version(&conn).unwrap(), None);
        assert!(!store.exists(&conn).unwrap());
    }

    #[test]
    fn custom_table_name_is_validated() {
        assert!(VersionStore::new("schema_version").is_ok());
        assert!(matches!(
            VersionStore::new("bad name"),
            Err(Error::Config(_))
        ));
    }
}
