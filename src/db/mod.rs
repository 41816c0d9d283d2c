// src/db/mod.rs
//
// Connection setup for the people database plus the repositories on top of it.

pub mod error;
pub mod handler;
pub mod monitoring;
pub mod person;
pub mod person_repo;
pub mod schema;
pub mod shared;
pub mod statement;

use log::{debug, info, trace};
use rusqlite::{hooks::Action, Connection, OpenFlags};

use crate::config::DatabaseConfig;

pub use error::{ErrorCategory, RepoError, TxStage};
pub use handler::EntityRepository;
pub use person::{Gender, Person, PersonFilter};
pub use person_repo::PersonRepository;
pub use shared::SharedPersonRepository;
pub use statement::Statement;

pub(crate) const OPEN_FLAGS: OpenFlags = OpenFlags::SQLITE_OPEN_READ_WRITE
    .union(OpenFlags::SQLITE_OPEN_CREATE)
    .union(OpenFlags::SQLITE_OPEN_URI)
    .union(OpenFlags::SQLITE_OPEN_NO_MUTEX);

/// Opens (creating if needed) the configured database and applies
/// [`configure`]. Any failure is a connection error.
pub fn open_connection(config: &DatabaseConfig) -> Result<Connection, RepoError> {
    const OP: &str = "open_connection";

    info!("Opening database {}", config.descriptor());
    let conn = Connection::open_with_flags(&config.path, OPEN_FLAGS)
        .map_err(RepoError::connection(OP))?;
    configure(&conn, config)?;
    Ok(conn)
}

/// Per-connection setup: key, busy timeout, optional hook logging.
///
/// Reads `sqlite_master` once so a wrong key fails here rather than on the
/// first repository call.
pub fn configure(conn: &Connection, config: &DatabaseConfig) -> Result<(), RepoError> {
    const OP: &str = "open_connection";

    if let Some(key) = config.password.as_deref() {
        apply_key(conn, key)?;
    }
    conn.busy_timeout(config.busy_timeout)
        .map_err(RepoError::connection(OP))?;

    let objects: i64 = conn
        .query_row("SELECT count(*) FROM sqlite_master", [], |r| r.get(0))
        .map_err(RepoError::connection(OP))?;
    debug!("Database ready, {objects} schema objects");

    if config.trace_hooks {
        register_hooks(conn);
    }
    Ok(())
}

#[cfg(feature = "sqlcipher")]
fn apply_key(conn: &Connection, key: &str) -> Result<(), RepoError> {
    conn.pragma_update(None, "key", key)
        .map_err(RepoError::connection("open_connection"))
}

// Plain SQLite ignores PRAGMA key, which would leave the file in cleartext.
#[cfg(not(feature = "sqlcipher"))]
fn apply_key(_conn: &Connection, _key: &str) -> Result<(), RepoError> {
    Err(RepoError::Encryption {
        op: "open_connection",
        reason: "a password is configured but this build has no SQLCipher support \
                 (enable the `sqlcipher` feature or unset PEOPLE_DB_PASSWORD)"
            .to_string(),
    })
}

/// Logs every commit, rollback and row change on this connection.
pub fn register_hooks(conn: &Connection) {
    conn.commit_hook(Some(|| {
        debug!("::HOOK:: commit");
        // false keeps the commit
        false
    }));

    conn.rollback_hook(Some(|| {
        debug!("::HOOK:: rollback");
    }));

    conn.update_hook(Some(|action_code: Action, db: &str, table: &str, rowid: i64| {
        let action = match action_code {
            Action::SQLITE_DELETE => "delete",
            Action::SQLITE_INSERT => "insert",
            Action::SQLITE_UPDATE => "update",
            _ => "unknown",
        };
        trace!("::HOOK:: {action} on table '{table}' in db '{db}', rowid {rowid}");
    }));
}
