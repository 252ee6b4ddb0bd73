//! Move/rename detection: given a pair sitting in
//! `locally_deleted` or `locally_created`, finds the opposite-side pair it
//! most likely corresponds to, so the resolver can drive a move/rename
//! instead of a delete-then-recreate.
//!
//! Candidate gathering uses the store's indexed filters for the cheap part
//! (`local_folder`, `folderish`, `local_state`, `remote_ref` nullness) and
//! applies the non-indexed match rules (`local_name`/`local_parent_path`/
//! `local_digest` equality) in memory, matching the attribute list
//! `PairStateFilter` actually indexes.

use crate::errors::Result;
use crate::pair_store::{NodeState, PairState, PairStateFilter, PairStateStore, PairStateTag};
use log::warn;
use std::collections::HashSet;

/// Re-ranking is quadratic in the number of surviving candidates; this caps
/// it so a directory with many same-digest files can't make move detection
/// pathological.
const MAX_CANDIDATES: usize = 32;

/// The grammar a deduplication suffix must match for `name_match` to strip
/// it before comparing basenames. Treated as a contract, not re-derived.
pub const DEDUPED_BASENAME_PATTERN: &str = r"^(.*)__(\d+)$";

fn strip_dedup_suffix(stem: &str) -> &str {
    if let Some(idx) = stem.rfind("__") {
        let (base, suffix) = stem.split_at(idx);
        let digits = &suffix[2..];
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return base;
        }
    }
    stem
}

fn split_ext(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Safe-filename normalization applied to a remote name before comparing
/// basenames, so names carrying characters that are illegal in a local path
/// (but legal server-side) still line up with their on-disk counterpart.
fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| if "<>:\"/\\|?*".contains(c) { '_' } else { c })
        .collect()
}

/// File-extension-sensitive equality that strips a deduplication suffix
/// (e.g. `foo__1.txt` matches `foo.txt`) and normalizes the remote name
/// before comparing basenames. Used both by the scanners' alignment step
/// and by move detection's name-equality tie-breaker.
pub fn name_match(local: &str, remote: &str) -> bool {
    let normalized_remote = safe_filename(remote);
    let (local_stem, local_ext) = split_ext(local);
    let (remote_stem, remote_ext) = split_ext(&normalized_remote);
    strip_dedup_suffix(local_stem) == remote_stem && local_ext.eq_ignore_ascii_case(remote_ext)
}

fn child_name_set(store: &PairStateStore, local_folder: &str, parent_path: &str) -> Result<HashSet<String>> {
    let filter = PairStateFilter {
        local_folder: Some(local_folder.to_string()),
        local_parent_path: Some(parent_path.to_string()),
        ..Default::default()
    };
    let rows = store.query_by(&filter)?;
    Ok(rows.into_iter().filter_map(|row| row.local_name).collect())
}

/// Jaccard index of direct-child name sets for folders; `1.0` for files and
/// for a pair of folders that are both empty.
fn jaccard(store: &PairStateStore, source: &PairState, candidate: &PairState) -> Result<f64> {
    if !source.folderish {
        return Ok(1.0);
    }
    let source_children = child_name_set(
        store,
        &source.local_folder,
        source.local_path.as_deref().unwrap_or(""),
    )?;
    let candidate_children = child_name_set(
        store,
        &candidate.local_folder,
        candidate.local_path.as_deref().unwrap_or(""),
    )?;
    if source_children.is_empty() && candidate_children.is_empty() {
        return Ok(1.0);
    }
    let intersection = source_children.intersection(&candidate_children).count();
    let union = source_children.union(&candidate_children).count();
    Ok(intersection as f64 / union as f64)
}

fn gather_candidates(store: &PairStateStore, source: &PairState) -> Result<Vec<PairState>> {
    let tag = source.pair_state();
    let candidate_states: &[NodeState] = match tag {
        PairStateTag::LocallyDeleted => &[NodeState::Created, NodeState::Unknown],
        PairStateTag::LocallyCreated => &[NodeState::Deleted],
        _ => return Ok(Vec::new()),
    };

    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for &state in candidate_states {
        let filter = PairStateFilter {
            local_folder: Some(source.local_folder.clone()),
            folderish: Some(source.folderish),
            local_state: Some(state),
            remote_ref_is_null: tag == PairStateTag::LocallyDeleted,
            ..Default::default()
        };
        for row in store.query_by(&filter)? {
            if row.id == source.id || !seen.insert(row.id) {
                continue;
            }
            merged.push(row);
        }
    }

    let filtered: Vec<PairState> = merged
        .into_iter()
        .filter(|candidate| {
            if source.folderish {
                candidate.local_name == source.local_name
                    || candidate.local_parent_path == source.local_parent_path
            } else {
                candidate.local_digest.is_some() && candidate.local_digest == source.local_digest
            }
        })
        .collect();

    if filtered.len() > MAX_CANDIDATES {
        warn!(
            "move detection candidate cap triggered for pair {} ({} candidates found, capping at {})",
            source.id,
            filtered.len(),
            MAX_CANDIDATES
        );
        Ok(filtered.into_iter().take(MAX_CANDIDATES).collect())
    } else {
        Ok(filtered)
    }
}

/// Identifies whether `source` (a `locally_deleted` or `locally_created`
/// pair) is really one half of a move/rename, returning `(source, target)`
/// or `(None, None)` if no candidate survives.
pub fn rerank_local_rename_or_move_candidates(
    store: &PairStateStore,
    source: &PairState,
) -> Result<(Option<PairState>, Option<PairState>)> {
    let candidates = gather_candidates(store, source)?;
    if candidates.is_empty() {
        return Ok((None, None));
    }

    let mut scored = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let j = jaccard(store, source, &candidate)?;
        if source.folderish && j <= 0.0 {
            continue;
        }
        let same_name = source.local_name == candidate.local_name;
        let same_parent = source.local_parent_path == candidate.local_parent_path;
        scored.push((j, same_name, same_parent, candidate));
    }

    // Stable sort: ties keep their original (query) order, satisfying the
    // kept deterministic on tied keys.
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.1.cmp(&a.1))
            .then(b.2.cmp(&a.2))
    });

    match scored.into_iter().next() {
        Some((_, _, _, target)) => Ok((Some(source.clone()), Some(target))),
        None => Ok((None, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pair_store::{NewPairState, PairStateStore};

    fn store() -> PairStateStore {
        PairStateStore::open(":memory:").unwrap()
    }

    fn folder(store: &PairStateStore, folder: &str, path: &str, parent: &str, state: NodeState, remote_state: NodeState) -> PairState {
        store
            .add(NewPairState {
                local_folder: folder.to_string(),
                local_path: Some(path.to_string()),
                local_parent_path: Some(parent.to_string()),
                local_name: Some(path.rsplit('/').next().unwrap().to_string()),
                folderish: true,
                local_state: state,
                remote_state,
                ..Default::default()
            })
            .unwrap()
    }

    fn child(store: &PairStateStore, folder: &str, path: &str, parent: &str, name: &str, state: NodeState) {
        store
            .add(NewPairState {
                local_folder: folder.to_string(),
                local_path: Some(path.to_string()),
                local_parent_path: Some(parent.to_string()),
                local_name: Some(name.to_string()),
                folderish: false,
                local_state: state,
                remote_state: NodeState::Unknown,
                ..Default::default()
            })
            .unwrap();
    }

    #[test]
    fn name_match_strips_dedup_suffix() {
        assert!(name_match("foo__1.txt", "foo.txt"));
        assert!(name_match("foo.txt", "foo.txt"));
        assert!(!name_match("foo__1.txt", "bar.txt"));
    }

    #[test]
    fn name_match_normalizes_remote_name() {
        assert!(name_match("a_b.txt", "a:b.txt"));
    }

    // Two candidates with equal children sets: prefer exact Jaccard
    // match over an unrelated folder that happens to share no children.
    #[test]
    fn folder_move_detection_prefers_highest_jaccard() {
        let store = store();
        let source = folder(&store, "f", "/src/A", "/src", NodeState::Deleted, NodeState::Synchronized);
        for name in ["p", "q", "r"] {
            child(&store, "f", &format!("/src/A/{}", name), "/src/A", name, NodeState::Deleted);
        }

        let dst = folder(&store, "f", "/dst/A", "/dst", NodeState::Created, NodeState::Unknown);
        for name in ["p", "q", "r"] {
            child(&store, "f", &format!("/dst/A/{}", name), "/dst/A", name, NodeState::Created);
        }

        let other = folder(&store, "f", "/other/B", "/other", NodeState::Created, NodeState::Unknown);
        for name in ["u", "v"] {
            child(&store, "f", &format!("/other/B/{}", name), "/other/B", name, NodeState::Created);
        }

        let (src, target) = rerank_local_rename_or_move_candidates(&store, &source).unwrap();
        assert_eq!(src.unwrap().id, source.id);
        assert_eq!(target.unwrap().id, dst.id);
        let _ = other;
    }

    #[test]
    fn no_candidates_returns_none() {
        let store = store();
        let source = folder(&store, "f", "/src/A", "/src", NodeState::Deleted, NodeState::Synchronized);
        let (src, target) = rerank_local_rename_or_move_candidates(&store, &source).unwrap();
        assert!(src.is_none());
        assert!(target.is_none());
    }
}
