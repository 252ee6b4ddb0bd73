//! Performs database migrations to newer application/database format
//! versions on an existing connection.
//!
//! ```ignore
//! db_migration::upgrade_db(&connection)?; // upgrades to latest DB version
//! ```
mod version_001;

use diesel::sql_types::Integer;
use diesel::{sql_query, QueryableByName, RunQueryDsl, SqliteConnection};
use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum MigrationError {
    ReadWriteDbVersion { source: diesel::result::Error },
    UnknownDbVersion { version: DbVersion },
    SqlError { source: diesel::result::Error },
}
pub type Result<T> = std::result::Result<T, MigrationError>;

pub type DbVersion = u32;
const REQUIRED_DB_VERSION: DbVersion = 1;

#[derive(QueryableByName)]
struct UserVersion {
    #[sql_type = "Integer"]
    user_version: i32,
}

/// Upgrades the given database connection to `REQUIRED_DB_VERSION`.
/// Must run before any other action on the connection.
pub fn upgrade_db(connection: &SqliteConnection) -> Result<DbVersion> {
    loop {
        let current_version = read_db_version(connection)?;
        if current_version < REQUIRED_DB_VERSION {
            migrate_up_from(connection, current_version)?;
        } else {
            return Ok(current_version);
        }
    }
}

fn migrate_up_from(connection: &SqliteConnection, version: DbVersion) -> Result<()> {
    match version {
        0 => version_001::migrate(connection).map_err(|source| MigrationError::SqlError { source })?,
        _ => return Err(MigrationError::UnknownDbVersion { version }),
    };

    write_db_version(connection, version + 1)?;
    Ok(())
}

fn read_db_version(connection: &SqliteConnection) -> Result<DbVersion> {
    let result: UserVersion = sql_query("PRAGMA user_version")
        .get_result(connection)
        .map_err(|source| MigrationError::ReadWriteDbVersion { source })?;
    Ok(result.user_version as DbVersion)
}

fn write_db_version(connection: &SqliteConnection, version: DbVersion) -> Result<()> {
    sql_query(format!("PRAGMA user_version = {}", version))
        .execute(connection)
        .map_err(|source| MigrationError::ReadWriteDbVersion { source })?;
    Ok(())
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error during database migration ({:?})", self)
    }
}
impl Error for MigrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ReadWriteDbVersion { ref source } => Some(source),
            Self::UnknownDbVersion { .. } => None,
            Self::SqlError { ref source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::Connection;

    fn open_connection() -> SqliteConnection {
        SqliteConnection::establish(":memory:").unwrap()
    }

    #[test]
    fn read_and_write_db_version() {
        let connection = open_connection();
        assert_eq!(read_db_version(&connection).unwrap(), 0);
        write_db_version(&connection, 42).unwrap();
        assert_eq!(read_db_version(&connection).unwrap(), 42);
    }

    #[test]
    fn upgrades_to_required_version() {
        let connection = open_connection();
        upgrade_db(&connection).unwrap();
        assert_eq!(read_db_version(&connection).unwrap(), REQUIRED_DB_VERSION);
    }
}
