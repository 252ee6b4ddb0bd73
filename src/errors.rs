use crate::fs_client::FsClientError;
use crate::pair_store::PairStoreError;
use crate::remote_client::RemoteClientError;
use std::error::Error;
use std::fmt;

/// Top level error variant produced anywhere a handler, scanner or the
/// scheduler can fail. Kept flat (no nested "possible network error" bucket)
/// so the scheduler's retry/blacklist policy can match on it directly.
#[derive(Debug)]
pub enum SyncError {
    Network(RemoteClientError),
    Auth,
    Http(u16),
    LocalIo(FsClientError),
    Store(PairStoreError),
    /// A resolver/scanner precondition failed for one specific pair (missing
    /// parent, missing expected field, vanished mid-resolve, ...). Recovered
    /// from by blacklisting just the offending pair, per the "any other
    /// handler exception" row of the error policy table - the same bucket
    /// "missing parent pair during create" falls into.
    InvariantViolation(String),
    /// The resolver's dispatch saw a `pair_state` tag outside the closed set
    /// `pair_state_tag` can ever produce. Unlike `InvariantViolation` this is
    /// a programmer error, not a data error, so it is never blacklisted away.
    UnknownPairState(String),
}
pub type Result<T> = std::result::Result<T, SyncError>;

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(e) => write!(f, "network error: {}", e),
            Self::Auth => write!(f, "authentication failed"),
            Self::Http(status) => write!(f, "unexpected HTTP status {}", status),
            Self::LocalIo(e) => write!(f, "local filesystem error: {}", e),
            Self::Store(e) => write!(f, "pair state store error: {}", e),
            Self::InvariantViolation(msg) => write!(f, "invariant violation: {}", msg),
            Self::UnknownPairState(msg) => write!(f, "unknown pair_state tag: {}", msg),
        }
    }
}
impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Network(e) => Some(e),
            Self::LocalIo(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Auth | Self::Http(_) | Self::InvariantViolation(_) | Self::UnknownPairState(_) => None,
        }
    }
}
impl From<RemoteClientError> for SyncError {
    fn from(error: RemoteClientError) -> Self {
        match error {
            RemoteClientError::Auth => Self::Auth,
            RemoteClientError::Status(code) => Self::Http(code),
            other => Self::Network(other),
        }
    }
}
impl From<FsClientError> for SyncError {
    fn from(error: FsClientError) -> Self {
        Self::LocalIo(error)
    }
}
impl From<PairStoreError> for SyncError {
    fn from(error: PairStoreError) -> Self {
        Self::Store(error)
    }
}

/// What the scheduler should do in response to a SyncError, as a pure
/// function so the policy itself is unit-testable without any I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffAction {
    /// Keep going, no special handling required.
    Continue,
    /// Set `last_sync_error_date` on the offending pair and skip it for
    /// `error_skip_period`.
    BlacklistPair,
    /// Invalidate the cached remote client and mark the binding offline.
    UnbindBinding,
    /// Programmer error (e.g. an unknown pair_state tag) - propagate.
    Fatal,
}

pub fn backoff_policy(error: &SyncError) -> BackoffAction {
    match error {
        SyncError::Network(_) | SyncError::Auth => BackoffAction::UnbindBinding,
        SyncError::Http(status) if *status >= 500 || *status == 403 => {
            BackoffAction::BlacklistPair
        }
        SyncError::Http(_) => BackoffAction::BlacklistPair,
        SyncError::LocalIo(_) => BackoffAction::BlacklistPair,
        SyncError::Store(_) => BackoffAction::Fatal,
        // Covers both "missing parent pair during create" and the general
        // "any other handler exception" row: blacklist the one pair and let
        // the next loop re-derive whether it's still a problem.
        SyncError::InvariantViolation(_) => BackoffAction::BlacklistPair,
        SyncError::UnknownPairState(_) => BackoffAction::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_unbind_the_binding() {
        assert_eq!(
            backoff_policy(&SyncError::Auth),
            BackoffAction::UnbindBinding
        );
    }

    #[test]
    fn bad_http_status_blacklists_the_pair() {
        assert_eq!(
            backoff_policy(&SyncError::Http(500)),
            BackoffAction::BlacklistPair
        );
        assert_eq!(
            backoff_policy(&SyncError::Http(403)),
            BackoffAction::BlacklistPair
        );
    }

    #[test]
    fn invariant_violations_blacklist_the_pair() {
        assert_eq!(
            backoff_policy(&SyncError::InvariantViolation("bad state".into())),
            BackoffAction::BlacklistPair
        );
    }

    #[test]
    fn unknown_pair_state_is_fatal() {
        assert_eq!(
            backoff_policy(&SyncError::UnknownPairState("local=deleted remote=created".into())),
            BackoffAction::Fatal
        );
    }
}
