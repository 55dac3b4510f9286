//! Database gateway.
//!
//! The original wraps SQLAlchemy behind `DatabaseWrapper`, exposing a
//! scoped `Session` that handlers pull from and that gets torn down in
//! `__exec`'s `finally` block after every dispatch. Grounded on
//! `data-daemon`'s `storage::adapter::StorageAdapter` trait (the async
//! interface shape) and `storage::sqlite::SqliteGateway` (the
//! `rusqlite` + WAL setup).

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::config::{Config, Dbms};
use crate::errors::ConfigError;

/// Per-request lifecycle around a database handle: acquire before the
/// handler runs, release in the dispatcher's cleanup path regardless of
/// whether the handler succeeded, mirroring the original's
/// `finally: self._database.Session.remove()`.
#[async_trait]
pub trait DatabaseGateway: Send + Sync {
    /// Acquire a handle to use for the duration of one dispatch. The
    /// gateway owns its own connection pooling/locking; this just marks
    /// the start of a unit of work.
    async fn session(&self);

    /// Release whatever `session()` acquired. Always called, success or
    /// failure.
    async fn release_session(&self);
}

/// Embedded SQLite backend, selected by `DBMS=sqlite`.
pub struct SqliteGateway {
    conn: Mutex<Connection>,
}

impl SqliteGateway {
    pub fn open(path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Run a closure with exclusive access to the underlying connection.
    pub async fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> rusqlite::Result<T> {
        let conn = self.conn.lock().await;
        f(&conn)
    }
}

#[async_trait]
impl DatabaseGateway for SqliteGateway {
    async fn session(&self) {}
    async fn release_session(&self) {}
}

/// Construct the gateway named by `config.dbms`. MySQL is accepted as a
/// configuration value (parity with the original's key table) but this
/// gateway only ships a SQLite implementation - pulling in a MySQL
/// driver isn't grounded in anything the corpus actually uses, so it's
/// a startup-time configuration error instead of a stub.
pub fn open_gateway(config: &Config) -> Result<SqliteGateway, ConfigError> {
    match config.dbms {
        Dbms::Sqlite => SqliteGateway::open(&config.sqlite_file).map_err(|_| {
            ConfigError::InvalidPort(config.sqlite_file.clone())
        }),
        Dbms::Mysql => Err(ConfigError::UnsupportedDbms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_an_in_memory_database_and_runs_a_statement() {
        let gateway = SqliteGateway::open(":memory:").unwrap();
        gateway
            .with_connection(|conn| conn.execute("CREATE TABLE t (id INTEGER)", []))
            .await
            .unwrap();
    }

    #[test]
    fn mysql_is_rejected_as_unimplemented() {
        let mut config_defaults = Config::from_env().unwrap_or_else(|_| panic!("defaults must parse"));
        config_defaults.dbms = Dbms::Mysql;
        assert!(matches!(open_gateway(&config_defaults), Err(ConfigError::UnsupportedDbms)));
    }
}
