//! Dual scanners: recursive refresh of the local tree and
//! the remote tree into pair states, plus the incremental change-summary
//! application used between full remote scans.
//!
//! Both scanners share the same shape: refresh the node's own info, and if
//! it is a folder, mark-and-sweep its children against a fresh listing,
//! aligning or creating a pair for anything new.

use crate::errors::Result;
use crate::fs_client::{LocalFsClient, LocalNodeInfo, RelativePath};
use crate::move_detector::name_match;
use crate::pair_store::{
    NewPairState, NodeState, PairState, PairStateFilter, PairStateStore, SelectionKind,
};
use crate::remote_client::{ChangeSummary, RemoteFsClient, RemoteNodeInfo};
use log::{debug, trace, warn};
use std::collections::HashSet;

/// Mark-and-sweep page size; also the default page size for any other
/// batched store operation, matching the `default_page_size=100` tunable.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Per-scan accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub indexed_items: usize,
    pub new_items: usize,
    pub changed_items: usize,
    pub deleted_items: usize,
}
impl ScanResult {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            indexed_items: self.indexed_items + other.indexed_items,
            new_items: self.new_items + other.new_items,
            changed_items: self.changed_items + other.changed_items,
            deleted_items: self.deleted_items + other.deleted_items,
        }
    }
}

/// Per-item notifications a scan emits, so tests can assert on the event
/// stream instead of only on final DB state. Returning `false` from the
/// listener skips descending into that pair's children (it is not an abort
/// of the whole scan, just a "don't recurse here" signal).
pub enum LocalScanEvent<'a> {
    Unchanged(&'a PairState),
    New(&'a PairState),
    Changed(&'a PairState),
    Deleted(&'a PairState),
}
pub enum RemoteScanEvent<'a> {
    Unchanged(&'a PairState),
    New(&'a PairState),
    Changed(&'a PairState),
    Deleted(&'a PairState),
}

fn noop_local(_event: LocalScanEvent) -> bool {
    true
}
fn noop_remote(_event: RemoteScanEvent) -> bool {
    true
}

// --- local scanner (§4.D) ---

/// Refreshes the subtree anchored at `root_pair` (whose `local_path` must be
/// set) from the local filesystem.
pub fn scan_local(
    store: &PairStateStore,
    fs: &dyn LocalFsClient,
    root_pair: &PairState,
) -> Result<ScanResult> {
    scan_local_with_listener(store, fs, root_pair, &mut noop_local)
}

pub fn scan_local_with_listener(
    store: &PairStateStore,
    fs: &dyn LocalFsClient,
    root_pair: &PairState,
    listener: &mut dyn FnMut(LocalScanEvent) -> bool,
) -> Result<ScanResult> {
    let mut result = ScanResult::new();
    scan_local_node(store, fs, root_pair, listener, &mut result)?;
    Ok(result)
}

fn scan_local_node(
    store: &PairStateStore,
    fs: &dyn LocalFsClient,
    pair: &PairState,
    listener: &mut dyn FnMut(LocalScanEvent) -> bool,
    result: &mut ScanResult,
) -> Result<()> {
    let path = match &pair.local_path {
        Some(p) => RelativePath::from_path(p),
        None => return Ok(()),
    };

    // Step 1: refresh the node's own local info.
    let info = fs.get_info(&path)?;
    let mut updated = pair.clone();
    let previous_digest = updated.local_digest.clone();
    updated.local_name = Some(info.name.clone());
    updated.folderish = info.folderish;
    updated.local_digest = info.digest.clone();

    let mut changed = false;
    if !info.folderish && updated.local_digest != previous_digest && updated.local_state == NodeState::Synchronized
    {
        updated.local_state = NodeState::Modified;
        changed = true;
    }
    result.indexed_items += 1;
    store.update(&updated)?;
    if changed {
        result.changed_items += 1;
        listener(LocalScanEvent::Changed(&updated));
    } else {
        listener(LocalScanEvent::Unchanged(&updated));
    }

    // Step 2: files have no children.
    if !updated.folderish {
        return Ok(());
    }

    // Step 3: list children; a vanished directory is left for the next
    // higher-level sweep to catch.
    let children = match fs.get_children_info(&path) {
        Ok(c) => c,
        Err(_) => {
            trace!("local directory {} vanished mid-scan, deferring to sweep", path.to_canonical_string());
            return Ok(());
        }
    };

    // Step 4: mark-and-sweep deletions.
    let keys: Vec<String> = children.iter().map(|c| c.path.to_canonical_string()).collect();
    let tag = store.mark_selection(&pair.local_folder, SelectionKind::LocalPaths, &keys, DEFAULT_PAGE_SIZE)?;
    let missing = store.not_selected(&pair.local_folder, SelectionKind::LocalPaths, &path.to_canonical_string(), &tag)?;
    for missing_pair in missing {
        mark_locally_deleted(store, &missing_pair, listener, result)?;
    }

    // Step 5: align or create each fresh child, then recurse.
    for child_info in children {
        let child_path = child_info.path.to_canonical_string();
        let existing = store.get_by_local_path(&pair.local_folder, &child_path)?;
        let child_pair = match existing {
            Some(found) => found,
            None => seed_local_child(store, &pair, &child_info, result)?,
        };
        scan_local_node(store, fs, &child_pair, listener, result)?;
    }

    Ok(())
}

fn seed_local_child(
    store: &PairStateStore,
    parent: &PairState,
    child_info: &LocalNodeInfo,
    result: &mut ScanResult,
) -> Result<PairState> {
    let parent_path = parent
        .local_path
        .clone()
        .unwrap_or_else(|| "/".to_string());

    if let Some(mut aligned) = align_local_child(store, parent, child_info)? {
        aligned.local_path = Some(child_info.path.to_canonical_string());
        aligned.local_parent_path = Some(parent_path);
        aligned.local_name = Some(child_info.name.clone());
        aligned.local_digest = child_info.digest.clone();
        aligned.folderish = child_info.folderish;
        store.update(&aligned)?;
        result.indexed_items += 1;
        return Ok(aligned);
    }

    let created = store.add(NewPairState {
        local_folder: parent.local_folder.clone(),
        local_path: Some(child_info.path.to_canonical_string()),
        local_parent_path: Some(parent_path),
        local_name: Some(child_info.name.clone()),
        local_digest: child_info.digest.clone(),
        folderish: child_info.folderish,
        local_state: NodeState::Created,
        remote_state: NodeState::Unknown,
        ..Default::default()
    })?;
    result.new_items += 1;
    Ok(created)
}

/// Alignment: pair a freshly observed local file with a pre-existing
/// remote-only pair, keyed first by `(parent, digest, folderish, name)`,
/// then relaxed to `(parent, folderish, name)`. Folders are never aligned -
/// they always seed a fresh pair and let the remote scanner/move detector
/// reconcile them.
fn align_local_child(
    store: &PairStateStore,
    parent: &PairState,
    child_info: &LocalNodeInfo,
) -> Result<Option<PairState>> {
    if child_info.folderish {
        return Ok(None);
    }
    let remote_parent_ref = match &parent.remote_ref {
        Some(r) => r.clone(),
        None => return Ok(None),
    };

    if let Some(digest) = &child_info.digest {
        let filter = PairStateFilter {
            local_folder: Some(parent.local_folder.clone()),
            local_path_is_null: true,
            remote_parent_ref: Some(remote_parent_ref.clone()),
            folderish: Some(false),
            remote_digest: Some(digest.clone()),
            ..Default::default()
        };
        if let Some(found) = store
            .query_by(&filter)?
            .into_iter()
            .find(|c| c.remote_name.as_deref().map_or(false, |n| name_match(&child_info.name, n)))
        {
            return Ok(Some(found));
        }
    }

    let filter = PairStateFilter {
        local_folder: Some(parent.local_folder.clone()),
        local_path_is_null: true,
        remote_parent_ref: Some(remote_parent_ref),
        folderish: Some(false),
        ..Default::default()
    };
    Ok(store
        .query_by(&filter)?
        .into_iter()
        .find(|c| c.remote_name.as_deref().map_or(false, |n| name_match(&child_info.name, n))))
}

/// Recursively marks a subtree missing from a fresh local listing: rows with
/// no remote counterpart are unbound metadata and get purged outright, rows
/// with a remote counterpart are flagged `local_state=deleted` for the
/// resolver to reconcile. Descendants are handled before the pair itself.
fn mark_locally_deleted(
    store: &PairStateStore,
    pair: &PairState,
    listener: &mut dyn FnMut(LocalScanEvent) -> bool,
    result: &mut ScanResult,
) -> Result<()> {
    if pair.folderish {
        let children = store.query_by(&PairStateFilter {
            local_folder: Some(pair.local_folder.clone()),
            local_parent_path: pair.local_path.clone(),
            ..Default::default()
        })?;
        for child in children {
            mark_locally_deleted(store, &child, listener, result)?;
        }
    }

    if pair.remote_ref.is_none() {
        store.delete(pair.id)?;
    } else {
        let mut updated = pair.clone();
        updated.local_state = NodeState::Deleted;
        store.update(&updated)?;
        result.deleted_items += 1;
        listener(LocalScanEvent::Deleted(&updated));
    }
    Ok(())
}

// --- remote scanner (§4.E) ---

/// Full recursive remote scan, identity keyed by `remote_ref`.
pub fn scan_remote(
    store: &PairStateStore,
    remote: &dyn RemoteFsClient,
    root_pair: &PairState,
) -> Result<ScanResult> {
    scan_remote_with_listener(store, remote, root_pair, &mut noop_remote)
}

pub fn scan_remote_with_listener(
    store: &PairStateStore,
    remote: &dyn RemoteFsClient,
    root_pair: &PairState,
    listener: &mut dyn FnMut(RemoteScanEvent) -> bool,
) -> Result<ScanResult> {
    let mut result = ScanResult::new();
    let remote_ref = match &root_pair.remote_ref {
        Some(r) => r.clone(),
        None => return Ok(result),
    };

    match remote.get_info(&remote_ref, false)? {
        Some(info) => scan_remote_recursive(store, remote, root_pair, &info, true, None, listener, &mut result)?,
        None => {
            // Root missing remotely: mark the root pair's remote side
            // deleted rather than unbinding (§7 - asymmetric with the local
            // scanner's root-missing case, which unbinds the whole binding).
            let mut updated = root_pair.clone();
            updated.remote_state = NodeState::Deleted;
            store.update(&updated)?;
            result.deleted_items += 1;
            listener(RemoteScanEvent::Deleted(&updated));
        }
    }
    Ok(result)
}

fn scan_remote_recursive(
    store: &PairStateStore,
    remote: &dyn RemoteFsClient,
    pair: &PairState,
    new_info: &RemoteNodeInfo,
    force_recursion: bool,
    parent_ctx: Option<(&str, &str)>,
    listener: &mut dyn FnMut(RemoteScanEvent) -> bool,
    result: &mut ScanResult,
) -> Result<()> {
    let mut updated = pair.clone();
    let previous_digest = updated.remote_digest.clone();
    let previous_name = updated.remote_name.clone();
    let previous_parent_ref = updated.remote_parent_ref.clone();
    updated.remote_name = Some(new_info.name.clone());
    updated.folderish = new_info.folderish;
    updated.remote_digest = new_info.digest.clone();
    updated.remote_can_create_child = new_info.can_create_child;
    updated.remote_can_rename = new_info.can_rename;
    updated.remote_can_delete = new_info.can_delete;
    if let Some((parent_ref, parent_path)) = parent_ctx {
        updated.remote_parent_ref = Some(parent_ref.to_string());
        updated.remote_parent_path = Some(parent_path.to_string());
    }

    let mut changed = false;
    if updated.remote_state == NodeState::Synchronized {
        let content_changed = !new_info.folderish && updated.remote_digest != previous_digest;
        let renamed_or_moved =
            updated.remote_name != previous_name || updated.remote_parent_ref != previous_parent_ref;
        if content_changed || renamed_or_moved {
            updated.remote_state = NodeState::Modified;
            changed = true;
        }
    }
    result.indexed_items += 1;
    store.update(&updated)?;
    let keep_going = if changed {
        result.changed_items += 1;
        listener(RemoteScanEvent::Changed(&updated))
    } else {
        listener(RemoteScanEvent::Unchanged(&updated))
    };

    if !updated.folderish || !force_recursion || !keep_going {
        return Ok(());
    }

    let children = remote.get_children_info(&new_info.remote_ref)?;
    let keys: Vec<String> = children.iter().map(|c| c.remote_ref.clone()).collect();
    let tag = store.mark_selection(&pair.local_folder, SelectionKind::RemoteRefs, &keys, DEFAULT_PAGE_SIZE)?;
    let missing = store.not_selected(&pair.local_folder, SelectionKind::RemoteRefs, &new_info.remote_ref, &tag)?;
    for missing_pair in missing {
        mark_remotely_deleted(store, &missing_pair, listener, result)?;
    }

    let parent_ref = new_info.remote_ref.clone();
    let remote_parent_path = materialized_remote_parent_path(&updated, &parent_ref);
    for child_info in &children {
        let existing = store.get_by_remote_ref(&pair.local_folder, &child_info.remote_ref)?;
        let child_pair = match existing {
            Some(found) => found,
            None => seed_remote_child(store, &pair, &updated, child_info, result)?,
        };
        scan_remote_recursive(
            store,
            remote,
            &child_pair,
            child_info,
            true,
            Some((&parent_ref, &remote_parent_path)),
            listener,
            result,
        )?;
    }

    Ok(())
}

/// Materialized path of refs, used to fast-path descendant updates
/// (`update_remote_parent_path_recursive`) without re-walking the parent
/// chain.
pub(crate) fn materialized_remote_parent_path(parent: &PairState, parent_ref: &str) -> String {
    match &parent.remote_parent_path {
        Some(p) if !p.is_empty() => format!("{}/{}", p, parent_ref),
        _ => format!("/{}", parent_ref),
    }
}

fn seed_remote_child(
    store: &PairStateStore,
    parent: &PairState,
    parent_refreshed: &PairState,
    child_info: &RemoteNodeInfo,
    result: &mut ScanResult,
) -> Result<PairState> {
    let parent_ref = parent_refreshed
        .remote_ref
        .clone()
        .expect("remote scan recursion always holds a bound remote_ref");
    let remote_parent_path = materialized_remote_parent_path(parent_refreshed, &parent_ref);

    if let Some(mut aligned) = align_remote_child(store, parent, child_info)? {
        aligned.remote_ref = Some(child_info.remote_ref.clone());
        aligned.remote_parent_ref = Some(parent_ref);
        aligned.remote_parent_path = Some(remote_parent_path);
        aligned.remote_name = Some(child_info.name.clone());
        aligned.remote_digest = child_info.digest.clone();
        aligned.folderish = child_info.folderish;
        aligned.remote_can_create_child = child_info.can_create_child;
        aligned.remote_can_rename = child_info.can_rename;
        aligned.remote_can_delete = child_info.can_delete;
        store.update(&aligned)?;
        result.indexed_items += 1;
        return Ok(aligned);
    }

    let created = store.add(NewPairState {
        local_folder: parent.local_folder.clone(),
        remote_ref: Some(child_info.remote_ref.clone()),
        remote_parent_ref: Some(parent_ref),
        remote_parent_path: Some(remote_parent_path),
        remote_name: Some(child_info.name.clone()),
        remote_digest: child_info.digest.clone(),
        folderish: child_info.folderish,
        remote_can_create_child: child_info.can_create_child,
        remote_can_rename: child_info.can_rename,
        remote_can_delete: child_info.can_delete,
        local_state: NodeState::Unknown,
        remote_state: NodeState::Created,
        ..Default::default()
    })?;
    result.new_items += 1;
    Ok(created)
}

/// Alignment when creating a remote child: search pairs with
/// `remote_ref=∅`, same `local_parent_path`, same `folderish`, and (if
/// file) same `local_digest`; fall back to name-only match.
fn align_remote_child(
    store: &PairStateStore,
    parent: &PairState,
    child_info: &RemoteNodeInfo,
) -> Result<Option<PairState>> {
    let local_parent_path = match &parent.local_path {
        Some(p) => p.clone(),
        None => return Ok(None),
    };

    if !child_info.folderish {
        if let Some(digest) = &child_info.digest {
            let filter = PairStateFilter {
                local_folder: Some(parent.local_folder.clone()),
                remote_ref_is_null: true,
                local_parent_path: Some(local_parent_path.clone()),
                folderish: Some(false),
                local_digest: Some(digest.clone()),
                ..Default::default()
            };
            if let Some(found) = store
                .query_by(&filter)?
                .into_iter()
                .find(|c| c.local_name.as_deref().map_or(false, |n| name_match(n, &child_info.name)))
            {
                return Ok(Some(found));
            }
        }
    }

    let filter = PairStateFilter {
        local_folder: Some(parent.local_folder.clone()),
        remote_ref_is_null: true,
        local_parent_path: Some(local_parent_path),
        folderish: Some(child_info.folderish),
        ..Default::default()
    };
    Ok(store
        .query_by(&filter)?
        .into_iter()
        .find(|c| c.local_name.as_deref().map_or(false, |n| name_match(n, &child_info.name))))
}

fn mark_remotely_deleted(
    store: &PairStateStore,
    pair: &PairState,
    listener: &mut dyn FnMut(RemoteScanEvent) -> bool,
    result: &mut ScanResult,
) -> Result<()> {
    if pair.folderish {
        let children = store.query_by(&PairStateFilter {
            local_folder: Some(pair.local_folder.clone()),
            remote_parent_ref: pair.remote_ref.clone(),
            ..Default::default()
        })?;
        for child in children {
            mark_remotely_deleted(store, &child, listener, result)?;
        }
    }

    if pair.local_path.is_none() {
        store.delete(pair.id)?;
    } else {
        let mut updated = pair.clone();
        updated.remote_state = NodeState::Deleted;
        store.update(&updated)?;
        result.deleted_items += 1;
        listener(RemoteScanEvent::Deleted(&updated));
    }
    Ok(())
}

/// Incremental application of a change summary (§4.E). Processes each
/// `remote_ref` at most once, most-recent event wins. Events whose parent
/// can't be resolved to a locally-bound pair are logged and dropped.
/// Checkpoints the binding on success, per the ordering guarantee that
/// remote change application precedes the local scan.
pub fn update_remote_states(
    store: &PairStateStore,
    remote: &dyn RemoteFsClient,
    local_folder: &str,
    summary: &ChangeSummary,
) -> Result<ScanResult> {
    let mut result = ScanResult::new();
    let mut events = summary.file_system_changes.clone();
    events.sort_by(|a, b| b.event_date.cmp(&a.event_date));

    let mut processed = HashSet::new();
    for event in events {
        if !processed.insert(event.remote_ref.clone()) {
            continue;
        }

        let existing = store.get_by_remote_ref(local_folder, &event.remote_ref)?;
        match (existing, &event.fs_item) {
            (Some(pair), None) => {
                mark_remotely_deleted(store, &pair, &mut noop_remote, &mut result)?;
            }
            (Some(pair), Some(info)) => {
                let parent_ctx = match &event.parent_uid {
                    Some(parent_ref) => match store.get_by_remote_ref(local_folder, parent_ref)? {
                        Some(parent) => {
                            Some((parent_ref.clone(), materialized_remote_parent_path(&parent, parent_ref)))
                        }
                        None => None,
                    },
                    None => None,
                };
                scan_remote_recursive(
                    store,
                    remote,
                    &pair,
                    info,
                    false,
                    parent_ctx.as_ref().map(|(r, p)| (r.as_str(), p.as_str())),
                    &mut noop_remote,
                    &mut result,
                )?;
            }
            (None, Some(info)) => {
                let parent_ref = match &event.parent_uid {
                    Some(p) => p,
                    None => {
                        warn!("remote change for {} has no parent_uid, dropping", event.remote_ref);
                        continue;
                    }
                };
                let parent = match store.get_by_remote_ref(local_folder, parent_ref)? {
                    Some(p) => p,
                    None => {
                        warn!(
                            "remote change for {} references unbound parent {}, dropping",
                            event.remote_ref, parent_ref
                        );
                        continue;
                    }
                };
                let seeded = seed_remote_child(store, &parent, &parent, info, &mut result)?;
                if seeded.folderish {
                    scan_remote_recursive(store, remote, &seeded, info, true, None, &mut noop_remote, &mut result)?;
                }
            }
            (None, None) => {
                debug!("remote deletion event for unknown ref {}, ignoring", event.remote_ref);
            }
        }
    }

    store.checkpoint(
        local_folder,
        summary.sync_date,
        &summary.active_synchronization_root_definitions,
    )?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_client::InMemoryLocalFsClient;
    use crate::remote_client::{FileSystemChange, InMemoryRemoteClient};
    use std::path::PathBuf;

    fn new_store() -> PairStateStore {
        PairStateStore::open(":memory:").unwrap()
    }

    fn local_client() -> InMemoryLocalFsClient {
        InMemoryLocalFsClient::new(PathBuf::from("/"))
    }

    #[test]
    fn local_scan_indexes_new_file() {
        let store = new_store();
        let root = store.create_root_item("binding").unwrap();
        let fs = local_client();
        fs.make_folder(&RelativePath::root(), "a").unwrap();
        let a_path = RelativePath::root().join("a".into());
        let file = fs.get_new_file(&a_path, "f.txt").unwrap();
        fs.write_content(&file, b"hello").unwrap();

        let result = scan_local(&store, &fs, &root).unwrap();
        assert_eq!(result.new_items, 2); // folder + file
        let pair = store.get_by_local_path("binding", "/a/f.txt").unwrap().unwrap();
        assert_eq!(pair.local_state, NodeState::Created);
        assert!(pair.local_digest.is_some());
    }

    #[test]
    fn local_scan_detects_deletion_of_bound_pair() {
        let store = new_store();
        let root = store.create_root_item("binding").unwrap();
        let fs = local_client();
        let file = fs.get_new_file(&RelativePath::root(), "f.txt").unwrap();
        fs.write_content(&file, b"hi").unwrap();
        scan_local(&store, &fs, &root).unwrap();

        let mut pair = store.get_by_local_path("binding", "/f.txt").unwrap().unwrap();
        pair.remote_ref = Some("r1".to_string());
        pair.local_state = NodeState::Synchronized;
        pair.remote_state = NodeState::Synchronized;
        store.update(&pair).unwrap();

        fs.delete(&file).unwrap();
        let result = scan_local(&store, &fs, &root).unwrap();
        assert_eq!(result.deleted_items, 1);
        let reloaded = store.get_by_local_path("binding", "/f.txt").unwrap().unwrap();
        assert_eq!(reloaded.local_state, NodeState::Deleted);
    }

    // A remote creation download seeds a pending remotely_created pair.
    #[test]
    fn remote_scan_seeds_new_file() {
        let store = new_store();
        let root = store.create_root_item("binding").unwrap();
        let mut root = root;
        root.remote_ref = Some("root".to_string());
        store.update(&root).unwrap();

        let remote = InMemoryRemoteClient::new();
        remote.insert_node(
            crate::remote_client::RemoteNodeInfo {
                remote_ref: "root".into(),
                parent_ref: None,
                folderish: true,
                name: "".into(),
                digest: None,
                can_rename: true,
                can_delete: true,
                can_create_child: true,
            },
            None,
        );
        remote.insert_node(
            crate::remote_client::RemoteNodeInfo {
                remote_ref: "r1".into(),
                parent_ref: Some("root".into()),
                folderish: false,
                name: "a.txt".into(),
                digest: Some("d1".into()),
                can_rename: true,
                can_delete: true,
                can_create_child: true,
            },
            Some(b"content".to_vec()),
        );

        let result = scan_remote(&store, &remote, &root).unwrap();
        assert_eq!(result.new_items, 1);
        let pair = store.get_by_remote_ref("binding", "r1").unwrap().unwrap();
        assert_eq!(pair.remote_state, NodeState::Created);
        assert_eq!(pair.local_state, NodeState::Unknown);
    }

    // A delete-then-create pair for the same name processed in one
    // summary must apply the deletion before the creation.
    #[test]
    fn incremental_update_applies_in_event_date_order() {
        let store = new_store();
        let mut root = store.create_root_item("binding").unwrap();
        root.remote_ref = Some("root".into());
        store.update(&root).unwrap();

        let remote = InMemoryRemoteClient::new();
        remote.insert_node(
            crate::remote_client::RemoteNodeInfo {
                remote_ref: "root".into(),
                parent_ref: None,
                folderish: true,
                name: "".into(),
                digest: None,
                can_rename: true,
                can_delete: true,
                can_create_child: true,
            },
            None,
        );

        store
            .add(NewPairState {
                local_folder: "binding".to_string(),
                remote_ref: Some("old".to_string()),
                remote_parent_ref: Some("root".to_string()),
                remote_name: Some("old".to_string()),
                folderish: false,
                local_state: NodeState::Unknown,
                remote_state: NodeState::Synchronized,
                ..Default::default()
            })
            .unwrap();

        let summary = ChangeSummary {
            file_system_changes: vec![
                FileSystemChange {
                    event_date: 2,
                    remote_ref: "old".to_string(),
                    parent_uid: Some("root".to_string()),
                    fs_item: None,
                },
                FileSystemChange {
                    event_date: 1,
                    remote_ref: "new".to_string(),
                    parent_uid: Some("root".to_string()),
                    fs_item: Some(crate::remote_client::RemoteNodeInfo {
                        remote_ref: "new".into(),
                        parent_ref: Some("root".into()),
                        folderish: false,
                        name: "old".into(),
                        digest: Some("d2".into()),
                        can_rename: true,
                        can_delete: true,
                        can_create_child: true,
                    }),
                },
            ],
            sync_date: 42,
            active_synchronization_root_definitions: String::new(),
            has_too_many_changes: false,
        };

        update_remote_states(&store, &remote, "binding", &summary).unwrap();

        let old = store.get_by_remote_ref("binding", "old").unwrap().unwrap();
        assert_eq!(old.remote_state, NodeState::Deleted);
        let new = store.get_by_remote_ref("binding", "new").unwrap().unwrap();
        assert_eq!(new.remote_state, NodeState::Created);

        let binding = store.get_server_binding("binding").unwrap();
        assert_eq!(binding.last_sync_date, 42);
    }
}
