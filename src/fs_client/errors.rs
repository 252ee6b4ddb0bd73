use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum FsClientError {
    NotFound,
    AlreadyExists,
    Locked,
    SoftLinksForbidden,
    IoError { source: io::Error },
}
pub type Result<T> = std::result::Result<T, FsClientError>;

impl From<io::Error> for FsClientError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::AlreadyExists => Self::AlreadyExists,
            _ => Self::IoError { source: error },
        }
    }
}
impl fmt::Display for FsClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local fs client error ({:?})", self)
    }
}
impl Error for FsClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IoError { ref source } => Some(source),
            _ => None,
        }
    }
}
