use super::*;
use std::collections::HashMap;
use std::sync::Mutex;

struct State {
    nodes: HashMap<String, RemoteNodeInfo>,
    content: HashMap<String, Vec<u8>>,
    pending_changes: Vec<FileSystemChange>,
    sync_date: i64,
    next_ref: u64,
}

/// Deterministic in-memory double for `RemoteFsClient`, used by scanner and
/// resolver tests. Tests seed it via `insert_node`/`push_change` and drive
/// the engine against it without a socket.
pub struct InMemoryRemoteClient {
    state: Mutex<State>,
}

impl InMemoryRemoteClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                nodes: HashMap::new(),
                content: HashMap::new(),
                pending_changes: Vec::new(),
                sync_date: 0,
                next_ref: 1,
            }),
        }
    }

    pub fn insert_node(&self, info: RemoteNodeInfo, content: Option<Vec<u8>>) {
        let mut state = self.state.lock().unwrap();
        if let Some(content) = content {
            state.content.insert(info.remote_ref.clone(), content);
        }
        state.nodes.insert(info.remote_ref.clone(), info);
    }

    pub fn push_change(&self, change: FileSystemChange) {
        self.state.lock().unwrap().pending_changes.push(change);
    }

    pub fn fresh_ref(&self) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next_ref;
        state.next_ref += 1;
        format!("r{}", id)
    }
}

impl RemoteFsClient for InMemoryRemoteClient {
    fn get_info(&self, remote_ref: &str, raise_if_missing: bool) -> Result<Option<RemoteNodeInfo>> {
        let state = self.state.lock().unwrap();
        match state.nodes.get(remote_ref) {
            Some(info) => Ok(Some(info.clone())),
            None if raise_if_missing => Err(RemoteClientError::NotFound),
            None => Ok(None),
        }
    }

    fn get_children_info(&self, remote_ref: &str) -> Result<Vec<RemoteNodeInfo>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .nodes
            .values()
            .filter(|n| n.parent_ref.as_deref() == Some(remote_ref))
            .cloned()
            .collect())
    }

    fn get_changes(
        &self,
        _last_sync_date: i64,
        _last_root_definitions: &str,
    ) -> Result<ChangeSummary> {
        let mut state = self.state.lock().unwrap();
        let changes = std::mem::take(&mut state.pending_changes);
        state.sync_date += 1;
        Ok(ChangeSummary {
            file_system_changes: changes,
            sync_date: state.sync_date,
            active_synchronization_root_definitions: String::new(),
            has_too_many_changes: false,
        })
    }

    fn stream_content(&self, remote_ref: &str) -> Result<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .content
            .get(remote_ref)
            .cloned()
            .ok_or(RemoteClientError::NotFound)
    }

    fn stream_update(&self, remote_ref: &str, content: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.nodes.contains_key(remote_ref) {
            return Err(RemoteClientError::NotFound);
        }
        state.content.insert(remote_ref.to_string(), content.to_vec());
        Ok(())
    }

    fn stream_file(&self, parent_ref: &str, name: &str, content: &[u8]) -> Result<String> {
        let new_ref = self.fresh_ref();
        let mut state = self.state.lock().unwrap();
        state.nodes.insert(
            new_ref.clone(),
            RemoteNodeInfo {
                remote_ref: new_ref.clone(),
                parent_ref: Some(parent_ref.to_string()),
                folderish: false,
                name: name.to_string(),
                digest: None,
                can_rename: true,
                can_delete: true,
                can_create_child: true,
            },
        );
        state.content.insert(new_ref.clone(), content.to_vec());
        Ok(new_ref)
    }

    fn make_folder(&self, parent_ref: &str, name: &str) -> Result<String> {
        let new_ref = self.fresh_ref();
        let mut state = self.state.lock().unwrap();
        state.nodes.insert(
            new_ref.clone(),
            RemoteNodeInfo {
                remote_ref: new_ref.clone(),
                parent_ref: Some(parent_ref.to_string()),
                folderish: true,
                name: name.to_string(),
                digest: None,
                can_rename: true,
                can_delete: true,
                can_create_child: true,
            },
        );
        Ok(new_ref)
    }

    fn rename(&self, remote_ref: &str, name: &str) -> Result<RemoteNodeInfo> {
        let mut state = self.state.lock().unwrap();
        let node = state
            .nodes
            .get_mut(remote_ref)
            .ok_or(RemoteClientError::NotFound)?;
        node.name = name.to_string();
        Ok(node.clone())
    }

    fn move_item(&self, remote_ref: &str, target_parent_ref: &str) -> Result<RemoteNodeInfo> {
        let mut state = self.state.lock().unwrap();
        let node = state
            .nodes
            .get_mut(remote_ref)
            .ok_or(RemoteClientError::NotFound)?;
        node.parent_ref = Some(target_parent_ref.to_string());
        Ok(node.clone())
    }

    fn can_move(&self, _remote_ref: &str, _target_parent_ref: &str) -> Result<bool> {
        Ok(true)
    }

    fn delete(&self, remote_ref: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.nodes.remove(remote_ref);
        state.content.remove(remote_ref);
        Ok(())
    }

    fn conflicted_name(&self, local_name: &str) -> String {
        match local_name.rfind('.') {
            Some(idx) if idx > 0 => format!("{} (conflict){}", &local_name[..idx], &local_name[idx..]),
            _ => format!("{} (conflict)", local_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_node_roundtrips() {
        let client = InMemoryRemoteClient::new();
        client.insert_node(
            RemoteNodeInfo {
                remote_ref: "r1".into(),
                parent_ref: None,
                folderish: false,
                name: "a.txt".into(),
                digest: Some("d1".into()),
                can_rename: true,
                can_delete: true,
                can_create_child: true,
            },
            Some(b"content".to_vec()),
        );

        let info = client.get_info("r1", true).unwrap().unwrap();
        assert_eq!(info.name, "a.txt");
        assert_eq!(client.stream_content("r1").unwrap(), b"content");
    }
}
