//! Scheduler loop: the per-binding `change-feed -> scan ->
//! resolve` iteration, singleton execution via a PID lock, and back-off
//! under network failure.
//!
//! The PID lock's liveness probe checks the process name of the owning PID
//! via the `sysinfo` crate: a stale file (dead PID, or a live PID whose name
//! doesn't match this binary) is removed and the lock retaken rather than
//! refused.

use crate::config::Config;
use crate::errors::{backoff_policy, BackoffAction, Result, SyncError};
use crate::fs_client::LocalFsClient;
use crate::pair_store::{PairStateStore, ServerBinding};
use crate::remote_client::RemoteFsClient;
use crate::resolver::{self, SyncConflictEvent, SyncConflictResolution};
use crate::scan;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use sysinfo::{PidExt, ProcessExt, System, SystemExt};

/// Optional frontend hooks; every method has a no-op default so a headless
/// caller (tests, a bare CLI run) doesn't need to implement all of them.
pub trait FrontendNotifier {
    fn notify_sync_started(&self) {}
    fn notify_sync_stopped(&self) {}
    fn notify_local_folders(&self, _folders: &[String]) {}
    fn notify_online(&self, _local_folder: &str) {}
    fn notify_offline(&self, _local_folder: &str, _error: &SyncError) {}
    fn notify_pending(&self, _local_folder: &str, _count: usize, _or_more: bool) {}
}

/// No-op notifier for headless operation.
pub struct SilentNotifier;
impl FrontendNotifier for SilentNotifier {}

/// PID file based singleton lock, held for the lifetime of one `loop()`
/// call. Verified against live processes, not merely file existence, so a
/// crash doesn't permanently wedge the next run.
pub struct PidLock {
    path: PathBuf,
    acquired: bool,
}

impl PidLock {
    /// Lock file convention: `<config>/nxdrive_<process_name>.pid`.
    pub fn path_for(config_dir: &Path, process_name: &str) -> PathBuf {
        config_dir.join(format!("nxdrive_{}.pid", process_name))
    }

    pub fn acquire(path: PathBuf, process_name: &str) -> Result<Self> {
        if let Ok(existing) = fs::read_to_string(&path) {
            if let Ok(pid) = existing.trim().parse::<u32>() {
                if Self::process_is_us(pid, process_name) {
                    return Err(SyncError::InvariantViolation(format!(
                        "another {} process (pid {}) already holds the lock at {}",
                        process_name,
                        pid,
                        path.display()
                    )));
                }
                info!("removing stale PID lock for dead/foreign process {}", pid);
            }
        }

        fs::write(&path, std::process::id().to_string()).map_err(|e| SyncError::LocalIo(e.into()))?;
        Ok(Self { path, acquired: true })
    }

    fn process_is_us(pid: u32, process_name: &str) -> bool {
        let mut system = System::new();
        let sys_pid = sysinfo::Pid::from_u32(pid);
        if !system.refresh_process(sys_pid) {
            return false;
        }
        match system.process(sys_pid) {
            Some(process) => process.name().contains(process_name),
            None => false,
        }
    }

    pub fn release(mut self) {
        if self.acquired {
            let _ = fs::remove_file(&self.path);
            self.acquired = false;
        }
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        if self.acquired {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn stop_file_path(config_dir: &Path, pid: u32) -> PathBuf {
    config_dir.join(format!("stop_{}", pid))
}

/// Drains one binding's pending pairs, resolving up to `limit` of them,
/// preferring rows with a non-null `local_path` first - the documented
/// tie-breaker for delete-then-create bursts on the same name, not a
/// general priority policy.
pub fn synchronize(
    store: &PairStateStore,
    local_fs: &dyn LocalFsClient,
    remote_fs: &dyn RemoteFsClient,
    binding: &ServerBinding,
    limit: i64,
    error_skip_period_secs: i64,
    now: i64,
    conflict_policy: &mut dyn FnMut(SyncConflictEvent) -> SyncConflictResolution,
) -> Result<usize> {
    let cutoff = now - error_skip_period_secs;
    let pending = store.list_pending(&binding.local_folder, cutoff, limit)?;
    let mut resolved = 0;

    for pair in &pending {
        match resolver::resolve(store, local_fs, remote_fs, pair, conflict_policy) {
            Ok(()) => resolved += 1,
            Err(error) => {
                match backoff_policy(&error) {
                    BackoffAction::BlacklistPair => {
                        warn!("blacklisting pair {} after handler failure: {}", pair.id, error);
                        store.blacklist(pair.id, now)?;
                    }
                    BackoffAction::Continue => {}
                    BackoffAction::UnbindBinding | BackoffAction::Fatal => return Err(error),
                }
            }
        }
    }
    Ok(resolved)
}

/// One iteration's worth of work for a single binding: change-feed (or full
/// scan) -> checkpoint -> local scan -> synchronize. Ordered so
/// remote deletions are visible before the local walk could recreate them.
fn run_binding(
    store: &PairStateStore,
    local_fs: &dyn LocalFsClient,
    remote_fs: &dyn RemoteFsClient,
    binding: &ServerBinding,
    config: &Config,
    seen_bindings: &mut HashSet<i64>,
    notifier: &dyn FrontendNotifier,
    now_secs: i64,
) -> Result<bool> {
    let root = store
        .get_by_local_path(&binding.local_folder, "/")?
        .ok_or_else(|| SyncError::InvariantViolation(format!("binding {} has no root pair", binding.local_folder)))?;

    let first_pass = seen_bindings.insert(store_binding_key(binding));
    let summary = remote_fs.get_changes(binding.last_sync_date, &binding.last_root_definitions)?;

    if summary.has_too_many_changes || first_pass {
        scan::scan_remote(store, remote_fs, &root)?;
        store.checkpoint(
            &binding.local_folder,
            summary.sync_date,
            &summary.active_synchronization_root_definitions,
        )?;
    } else {
        scan::update_remote_states(store, remote_fs, &binding.local_folder, &summary)?;
    }

    match scan::scan_local(store, local_fs, &root) {
        Ok(_) => {}
        Err(SyncError::LocalIo(ref e)) if matches!(e, crate::fs_client::FsClientError::NotFound) => {
            warn!("local root for binding {} is gone, unbinding", binding.local_folder);
            store.unbind(&binding.local_folder)?;
            return Ok(true);
        }
        Err(e) => return Err(e),
    }

    let pending_before = store.dirty_count(&binding.local_folder)?;
    let resolved = synchronize(
        store,
        local_fs,
        remote_fs,
        binding,
        config.max_sync_step,
        config.error_skip_period_secs,
        now_secs,
        &mut resolver::default_conflict_policy,
    )?;

    let pending_after = store.dirty_count(&binding.local_folder)?;
    let or_more = pending_after >= config.limit_pending;
    notifier.notify_pending(&binding.local_folder, pending_after as usize, or_more);

    Ok(resolved > 0 || pending_before != pending_after)
}

fn store_binding_key(binding: &ServerBinding) -> i64 {
    binding.id
}

/// Runs the scheduler loop for a single binding. `max_loops` bounds the
/// number of iterations (mainly for tests); pass `None` to run until the
/// stop file appears.
pub fn run_loop(
    store: &PairStateStore,
    local_fs: &dyn LocalFsClient,
    remote_fs: &dyn RemoteFsClient,
    config: &Config,
    config_dir: &Path,
    notifier: &dyn FrontendNotifier,
) -> Result<()> {
    let lock = PidLock::acquire(PidLock::path_for(config_dir, "pairsync"), "pairsync")?;
    let stop_path = stop_file_path(config_dir, std::process::id());
    notifier.notify_sync_started();

    let mut seen_bindings = HashSet::new();
    let mut loops_done: u64 = 0;
    let result = (|| -> Result<()> {
        loop {
            if let Some(max) = config.max_loops {
                if loops_done >= max {
                    break;
                }
            }
            if stop_path.exists() {
                info!("stop file present, exiting scheduler loop");
                break;
            }

            let iteration_start = Instant::now();
            let mut did_work = false;

            let bindings = store.list_server_bindings()?;
            notifier.notify_local_folders(&bindings.iter().map(|b| b.local_folder.clone()).collect::<Vec<_>>());

            for binding in &bindings {
                match run_binding(store, local_fs, remote_fs, binding, config, &mut seen_bindings, notifier, now_unix()) {
                    Ok(worked) => {
                        did_work = did_work || worked;
                        notifier.notify_online(&binding.local_folder);
                    }
                    Err(error) => match backoff_policy(&error) {
                        BackoffAction::UnbindBinding => {
                            error!("binding {} failed, invalidating: {}", binding.local_folder, error);
                            store.invalidate_server_binding(&binding.local_folder)?;
                            notifier.notify_offline(&binding.local_folder, &error);
                        }
                        BackoffAction::Fatal => return Err(error),
                        BackoffAction::BlacklistPair | BackoffAction::Continue => {
                            debug!("binding {} iteration recoverable error: {}", binding.local_folder, error);
                        }
                    },
                }
            }

            loops_done += 1;
            if !did_work {
                let elapsed = iteration_start.elapsed();
                let target = Duration::from_secs(config.delay_secs);
                if elapsed < target {
                    thread::sleep(target - elapsed);
                }
            }
        }
        Ok(())
    })();

    notifier.notify_sync_stopped();
    lock.release();
    result
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_client::InMemoryLocalFsClient;
    use crate::pair_store::PairStateTag;
    use crate::remote_client::InMemoryRemoteClient;
    use std::path::PathBuf;

    fn store() -> PairStateStore {
        PairStateStore::open(":memory:").unwrap()
    }

    fn local_client() -> InMemoryLocalFsClient {
        InMemoryLocalFsClient::new(PathBuf::from("/"))
    }

    // A single-loop run downloads a remote-only file end to end.
    #[test]
    fn one_loop_downloads_remote_creation() {
        let store = store();
        store.create_server_binding("binding", "https://example.com", "token").unwrap();
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

        let local = local_client();
        let mut config = Config::new("binding".to_string(), "https://example.com".to_string(), "token".to_string());
        config.max_loops = Some(1);

        let binding = store.get_server_binding("binding").unwrap();
        run_binding(&store, &local, &remote, &binding, &config, &mut HashSet::new(), &SilentNotifier, 0).unwrap();

        let pair = store.get_by_remote_ref("binding", "r1").unwrap().unwrap();
        assert_eq!(pair.pair_state(), PairStateTag::Synchronized);
        assert_eq!(local.read_content(&crate::fs_client::RelativePath::from_path("/a.txt")).unwrap(), b"content");
    }

    // A second pass with no external change resolves nothing.
    #[test]
    fn second_loop_with_no_changes_does_no_work() {
        let store = store();
        store.create_server_binding("binding", "https://example.com", "token").unwrap();
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

        let local = local_client();
        let config = Config::new("binding".to_string(), "https://example.com".to_string(), "token".to_string());
        let binding = store.get_server_binding("binding").unwrap();
        let mut seen = HashSet::new();

        let first = run_binding(&store, &local, &remote, &binding, &config, &mut seen, &SilentNotifier, 0).unwrap();
        assert!(first); // first pass always does a full scan, counted as work
        let second = run_binding(&store, &local, &remote, &binding, &config, &mut seen, &SilentNotifier, 1).unwrap();
        assert!(!second);
    }
}
