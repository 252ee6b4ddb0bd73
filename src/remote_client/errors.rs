use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum RemoteClientError {
    Request(reqwest::Error),
    Status(u16),
    NotFound,
    Auth,
    Serialization(serde_json::Error),
}
pub type Result<T> = std::result::Result<T, RemoteClientError>;

impl From<reqwest::Error> for RemoteClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.status().map(|s| s.as_u16()) == Some(401) || error.status().map(|s| s.as_u16()) == Some(403) {
            Self::Auth
        } else {
            Self::Request(error)
        }
    }
}
impl From<serde_json::Error> for RemoteClientError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error)
    }
}
impl fmt::Display for RemoteClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(e) => write!(f, "remote request failed: {}", e),
            Self::Status(code) => write!(f, "unexpected remote status {}", code),
            Self::NotFound => write!(f, "remote node not found"),
            Self::Auth => write!(f, "remote authentication failed"),
            Self::Serialization(e) => write!(f, "could not decode remote response: {}", e),
        }
    }
}
impl Error for RemoteClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Request(e) => Some(e),
            Self::Serialization(e) => Some(e),
            _ => None,
        }
    }
}
