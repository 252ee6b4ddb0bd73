//! Remote document repository client: the HTTP-reachable side of a pair.
//! Kept behind the `RemoteFsClient` trait so the resolver and scanners never
//! depend on the wire format directly; `HttpRemoteClient` is the concrete,
//! reqwest-backed implementation and `InMemoryRemoteClient` is the
//! deterministic test double.

pub mod errors;
pub mod http_client;
pub mod in_memory_client;

pub use errors::{RemoteClientError, Result};
pub use http_client::HttpRemoteClient;
pub use in_memory_client::InMemoryRemoteClient;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNodeInfo {
    #[serde(rename = "ref")]
    pub remote_ref: String,
    pub parent_ref: Option<String>,
    pub folderish: bool,
    pub name: String,
    pub digest: Option<String>,
    #[serde(default = "default_true")]
    pub can_rename: bool,
    #[serde(default = "default_true")]
    pub can_delete: bool,
    #[serde(default = "default_true")]
    pub can_create_child: bool,
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSystemChange {
    pub event_date: i64,
    #[serde(rename = "ref")]
    pub remote_ref: String,
    pub parent_uid: Option<String>,
    pub fs_item: Option<RemoteNodeInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub file_system_changes: Vec<FileSystemChange>,
    pub sync_date: i64,
    pub active_synchronization_root_definitions: String,
    pub has_too_many_changes: bool,
}

/// Capabilities required of the remote repository by the scanners and
/// resolver. Every call may perform a blocking network request.
pub trait RemoteFsClient {
    fn get_info(&self, remote_ref: &str, raise_if_missing: bool) -> Result<Option<RemoteNodeInfo>>;
    fn get_children_info(&self, remote_ref: &str) -> Result<Vec<RemoteNodeInfo>>;
    fn get_changes(
        &self,
        last_sync_date: i64,
        last_root_definitions: &str,
    ) -> Result<ChangeSummary>;

    fn stream_content(&self, remote_ref: &str) -> Result<Vec<u8>>;
    fn stream_update(&self, remote_ref: &str, content: &[u8]) -> Result<()>;
    fn stream_file(&self, parent_ref: &str, name: &str, content: &[u8]) -> Result<String>;

    fn make_folder(&self, parent_ref: &str, name: &str) -> Result<String>;
    fn rename(&self, remote_ref: &str, name: &str) -> Result<RemoteNodeInfo>;
    fn move_item(&self, remote_ref: &str, target_parent_ref: &str) -> Result<RemoteNodeInfo>;
    fn can_move(&self, remote_ref: &str, target_parent_ref: &str) -> Result<bool>;
    fn delete(&self, remote_ref: &str) -> Result<()>;

    /// Generates a server-suggested name for a conflicting local file, e.g.
    /// `"c.txt"` -> `"c (conflict).txt"`.
    fn conflicted_name(&self, local_name: &str) -> String;
}
