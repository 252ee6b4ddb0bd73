use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum PairStoreError {
    Sql { source: diesel::result::Error },
    Connection { source: diesel::ConnectionError },
    Migration { source: super::db_migration::MigrationError },
    NotFound,
}
pub type Result<T> = std::result::Result<T, PairStoreError>;

impl From<diesel::result::Error> for PairStoreError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Sql { source: error }
    }
}
impl From<diesel::ConnectionError> for PairStoreError {
    fn from(error: diesel::ConnectionError) -> Self {
        Self::Connection { source: error }
    }
}
impl From<super::db_migration::MigrationError> for PairStoreError {
    fn from(error: super::db_migration::MigrationError) -> Self {
        Self::Migration { source: error }
    }
}
impl fmt::Display for PairStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pair state store error ({:?})", self)
    }
}
impl Error for PairStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sql { ref source } => Some(source),
            Self::Connection { ref source } => Some(source),
            Self::Migration { ref source } => Some(source),
            Self::NotFound => None,
        }
    }
}
