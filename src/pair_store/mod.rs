//! Persistent pair-state table: the single source of truth for everything
//! the scanners and resolver know about the correspondence between a local
//! node and a remote node.
//!
//! Backed by SQLite through `diesel`, mirroring the metadata
//! store: a `table!`-defined schema, `Queryable`/`Insertable` entity
//! structs, and a `db_migration` submodule that runs ordered, idempotent
//! `PRAGMA user_version`-gated migrations.

pub mod db_migration;
pub mod entity;
pub mod errors;
pub mod schema;

pub use errors::{PairStoreError, Result};

use diesel::prelude::*;
use diesel::sql_query;
use entity::{NewPairStateRow, NewServerBindingRow, PairStateRow, ServerBindingRow};
use log::debug;
use schema::{pair_states, server_bindings};
use uuid::Uuid;

/// One side of a pair: local or remote observation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Unknown,
    Created,
    Modified,
    Deleted,
    Synchronized,
}
impl NodeState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Synchronized => "synchronized",
        }
    }
    fn from_str(s: &str) -> Self {
        match s {
            "created" => Self::Created,
            "modified" => Self::Modified,
            "deleted" => Self::Deleted,
            "synchronized" => Self::Synchronized,
            _ => Self::Unknown,
        }
    }
}

/// The closed tag set a pair can be classified into. Exhaustive, so the
/// resolver's dispatch match is checked for completeness at compile time
/// instead of failing at run time on an unhandled string key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairStateTag {
    LocallyModified,
    RemotelyModified,
    LocallyCreated,
    RemotelyCreated,
    LocallyDeleted,
    RemotelyDeleted,
    Deleted,
    Conflicted,
    Synchronized,
    Unknown,
}

/// `pair_state` is a pure function of `(local_state, remote_state)` -
/// the persisted record always reflects both sides' last known state.
pub fn pair_state_tag(local: NodeState, remote: NodeState) -> PairStateTag {
    use NodeState::*;
    match (local, remote) {
        (Deleted, Deleted) => PairStateTag::Deleted,
        (Deleted, Synchronized) => PairStateTag::LocallyDeleted,
        (Synchronized, Deleted) => PairStateTag::RemotelyDeleted,
        (Modified, Synchronized) => PairStateTag::LocallyModified,
        (Synchronized, Modified) => PairStateTag::RemotelyModified,
        (Created, Unknown) => PairStateTag::LocallyCreated,
        (Unknown, Created) => PairStateTag::RemotelyCreated,
        (Synchronized, Synchronized) => PairStateTag::Synchronized,
        (Unknown, Unknown) => PairStateTag::Unknown,
        (a, b) if a != Synchronized && a != Unknown && b != Synchronized && b != Unknown => {
            PairStateTag::Conflicted
        }
        _ => PairStateTag::Unknown,
    }
}

/// Fully hydrated, domain-level view of a `pair_states` row.
#[derive(Debug, Clone)]
pub struct PairState {
    pub id: i64,
    pub local_folder: String,

    pub local_path: Option<String>,
    pub local_parent_path: Option<String>,
    pub local_name: Option<String>,
    pub local_digest: Option<String>,
    pub folderish: bool,

    pub remote_ref: Option<String>,
    pub remote_parent_ref: Option<String>,
    pub remote_parent_path: Option<String>,
    pub remote_name: Option<String>,
    pub remote_digest: Option<String>,
    pub remote_can_create_child: bool,
    pub remote_can_rename: bool,
    pub remote_can_delete: bool,

    pub local_state: NodeState,
    pub remote_state: NodeState,

    pub last_sync_error_date: Option<i64>,
}
impl PairState {
    pub fn pair_state(&self) -> PairStateTag {
        pair_state_tag(self.local_state, self.remote_state)
    }

    pub fn is_root(&self) -> bool {
        self.local_path.as_deref() == Some("/") || self.remote_parent_ref.is_none() && self.local_parent_path.is_none()
    }

    fn from_row(row: PairStateRow) -> Self {
        Self {
            id: row.id,
            local_folder: row.local_folder,
            local_path: row.local_path,
            local_parent_path: row.local_parent_path,
            local_name: row.local_name,
            local_digest: row.local_digest,
            folderish: row.folderish,
            remote_ref: row.remote_ref,
            remote_parent_ref: row.remote_parent_ref,
            remote_parent_path: row.remote_parent_path,
            remote_name: row.remote_name,
            remote_digest: row.remote_digest,
            remote_can_create_child: row.remote_can_create_child,
            remote_can_rename: row.remote_can_rename,
            remote_can_delete: row.remote_can_delete,
            local_state: NodeState::from_str(&row.local_state),
            remote_state: NodeState::from_str(&row.remote_state),
            last_sync_error_date: row.last_sync_error_date,
        }
    }
}

/// A not-yet-persisted pair, seeded by a scanner.
#[derive(Debug, Clone, Default)]
pub struct NewPairState {
    pub local_folder: String,

    pub local_path: Option<String>,
    pub local_parent_path: Option<String>,
    pub local_name: Option<String>,
    pub local_digest: Option<String>,
    pub folderish: bool,

    pub remote_ref: Option<String>,
    pub remote_parent_ref: Option<String>,
    pub remote_parent_path: Option<String>,
    pub remote_name: Option<String>,
    pub remote_digest: Option<String>,
    pub remote_can_create_child: bool,
    pub remote_can_rename: bool,
    pub remote_can_delete: bool,

    pub local_state: NodeState,
    pub remote_state: NodeState,
}

/// Equality filters over the indexed columns; any field left `None` is not
/// constrained. Always scoped to one `local_folder`.
#[derive(Debug, Clone, Default)]
pub struct PairStateFilter {
    pub local_folder: Option<String>,
    pub local_path: Option<String>,
    pub local_parent_path: Option<String>,
    pub remote_ref: Option<String>,
    pub remote_parent_ref: Option<String>,
    pub folderish: Option<bool>,
    pub local_digest: Option<String>,
    pub remote_digest: Option<String>,
    pub local_state: Option<NodeState>,
    pub remote_state: Option<NodeState>,
    pub local_path_is_null: bool,
    pub remote_ref_is_null: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    LocalPaths,
    RemoteRefs,
}

pub struct ServerBinding {
    pub id: i64,
    pub local_folder: String,
    pub server_url: String,
    pub credentials: String,
    pub last_sync_date: i64,
    pub last_root_definitions: String,
    pub invalid_credentials: bool,
}
impl ServerBinding {
    fn from_row(row: ServerBindingRow) -> Self {
        Self {
            id: row.id,
            local_folder: row.local_folder,
            server_url: row.server_url,
            credentials: row.credentials,
            last_sync_date: row.last_sync_date,
            last_root_definitions: row.last_root_definitions,
            invalid_credentials: row.invalid_credentials,
        }
    }
}

pub struct PairStateStore {
    connection: SqliteConnection,
}

impl PairStateStore {
    pub fn open(database_url: &str) -> Result<Self> {
        let connection = SqliteConnection::establish(database_url)?;
        default_db_settings(&connection)?;
        db_migration::upgrade_db(&connection)?;
        Ok(Self { connection })
    }

    pub fn begin(&self) -> Result<()> {
        sql_query("BEGIN IMMEDIATE").execute(&self.connection)?;
        Ok(())
    }
    pub fn commit(&self) -> Result<()> {
        sql_query("COMMIT").execute(&self.connection)?;
        Ok(())
    }
    pub fn rollback(&self) -> Result<()> {
        sql_query("ROLLBACK").execute(&self.connection)?;
        Ok(())
    }

    pub fn optimize_database(&self) -> Result<()> {
        sql_query("VACUUM").execute(&self.connection)?;
        sql_query("ANALYZE").execute(&self.connection)?;
        Ok(())
    }

    // --- server bindings ---

    pub fn create_server_binding(
        &self,
        local_folder: &str,
        server_url: &str,
        credentials: &str,
    ) -> Result<ServerBinding> {
        diesel::insert_into(server_bindings::table)
            .values(NewServerBindingRow {
                local_folder: local_folder.to_string(),
                server_url: server_url.to_string(),
                credentials: credentials.to_string(),
                last_sync_date: 0,
                last_root_definitions: String::new(),
                invalid_credentials: false,
            })
            .execute(&self.connection)?;
        self.get_server_binding(local_folder)
    }

    pub fn get_server_binding(&self, local_folder: &str) -> Result<ServerBinding> {
        let row = server_bindings::table
            .filter(server_bindings::local_folder.eq(local_folder))
            .first::<ServerBindingRow>(&self.connection)
            .optional()?
            .ok_or(PairStoreError::NotFound)?;
        Ok(ServerBinding::from_row(row))
    }

    pub fn list_server_bindings(&self) -> Result<Vec<ServerBinding>> {
        let rows = server_bindings::table
            .filter(server_bindings::invalid_credentials.eq(false))
            .load::<ServerBindingRow>(&self.connection)?;
        Ok(rows.into_iter().map(ServerBinding::from_row).collect())
    }

    pub fn checkpoint(&self, local_folder: &str, sync_date: i64, root_definitions: &str) -> Result<()> {
        diesel::update(server_bindings::table.filter(server_bindings::local_folder.eq(local_folder)))
            .set((
                server_bindings::last_sync_date.eq(sync_date),
                server_bindings::last_root_definitions.eq(root_definitions),
            ))
            .execute(&self.connection)?;
        Ok(())
    }

    pub fn invalidate_server_binding(&self, local_folder: &str) -> Result<()> {
        diesel::update(server_bindings::table.filter(server_bindings::local_folder.eq(local_folder)))
            .set(server_bindings::invalid_credentials.eq(true))
            .execute(&self.connection)?;
        Ok(())
    }

    pub fn unbind(&self, local_folder: &str) -> Result<()> {
        diesel::delete(pair_states::table.filter(pair_states::local_folder.eq(local_folder)))
            .execute(&self.connection)?;
        diesel::delete(server_bindings::table.filter(server_bindings::local_folder.eq(local_folder)))
            .execute(&self.connection)?;
        Ok(())
    }

    // --- root / pair lifecycle ---

    pub fn create_root_item(&self, local_folder: &str) -> Result<PairState> {
        self.add(NewPairState {
            local_folder: local_folder.to_string(),
            local_path: Some("/".to_string()),
            local_parent_path: None,
            local_name: Some(String::new()),
            folderish: true,
            remote_parent_ref: None,
            remote_can_create_child: true,
            remote_can_rename: true,
            remote_can_delete: true,
            local_state: NodeState::Synchronized,
            remote_state: NodeState::Synchronized,
            ..Default::default()
        })
    }

    pub fn add(&self, pair: NewPairState) -> Result<PairState> {
        let row = NewPairStateRow {
            local_folder: pair.local_folder.clone(),
            local_path: pair.local_path,
            local_parent_path: pair.local_parent_path,
            local_name: pair.local_name,
            local_digest: pair.local_digest,
            folderish: pair.folderish,
            remote_ref: pair.remote_ref,
            remote_parent_ref: pair.remote_parent_ref,
            remote_parent_path: pair.remote_parent_path,
            remote_name: pair.remote_name,
            remote_digest: pair.remote_digest,
            remote_can_create_child: pair.remote_can_create_child,
            remote_can_rename: pair.remote_can_rename,
            remote_can_delete: pair.remote_can_delete,
            local_state: pair.local_state.as_str().to_string(),
            remote_state: pair.remote_state.as_str().to_string(),
            last_sync_error_date: None,
            scan_tag: None,
        };
        diesel::insert_into(pair_states::table)
            .values(row)
            .execute(&self.connection)?;

        let inserted = pair_states::table
            .order(pair_states::id.desc())
            .first::<PairStateRow>(&self.connection)?;
        Ok(PairState::from_row(inserted))
    }

    pub fn update(&self, pair: &PairState) -> Result<()> {
        diesel::update(pair_states::table.filter(pair_states::id.eq(pair.id)))
            .set((
                pair_states::local_path.eq(&pair.local_path),
                pair_states::local_parent_path.eq(&pair.local_parent_path),
                pair_states::local_name.eq(&pair.local_name),
                pair_states::local_digest.eq(&pair.local_digest),
                pair_states::remote_ref.eq(&pair.remote_ref),
                pair_states::remote_parent_ref.eq(&pair.remote_parent_ref),
                pair_states::remote_parent_path.eq(&pair.remote_parent_path),
                pair_states::remote_name.eq(&pair.remote_name),
                pair_states::remote_digest.eq(&pair.remote_digest),
                pair_states::remote_can_create_child.eq(pair.remote_can_create_child),
                pair_states::remote_can_rename.eq(pair.remote_can_rename),
                pair_states::remote_can_delete.eq(pair.remote_can_delete),
                pair_states::local_state.eq(pair.local_state.as_str()),
                pair_states::remote_state.eq(pair.remote_state.as_str()),
                pair_states::last_sync_error_date.eq(pair.last_sync_error_date),
            ))
            .execute(&self.connection)?;
        Ok(())
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        diesel::delete(pair_states::table.filter(pair_states::id.eq(id))).execute(&self.connection)?;
        Ok(())
    }

    pub fn blacklist(&self, id: i64, now: i64) -> Result<()> {
        diesel::update(pair_states::table.filter(pair_states::id.eq(id)))
            .set(pair_states::last_sync_error_date.eq(Some(now)))
            .execute(&self.connection)?;
        Ok(())
    }

    // --- queries ---

    pub fn query_by(&self, filter: &PairStateFilter) -> Result<Vec<PairState>> {
        let mut query = pair_states::table.into_boxed();
        if let Some(ref v) = filter.local_folder {
            query = query.filter(pair_states::local_folder.eq(v.clone()));
        }
        if let Some(ref v) = filter.local_path {
            query = query.filter(pair_states::local_path.eq(v.clone()));
        }
        if filter.local_path_is_null {
            query = query.filter(pair_states::local_path.is_null());
        }
        if let Some(ref v) = filter.local_parent_path {
            query = query.filter(pair_states::local_parent_path.eq(v.clone()));
        }
        if let Some(ref v) = filter.remote_ref {
            query = query.filter(pair_states::remote_ref.eq(v.clone()));
        }
        if filter.remote_ref_is_null {
            query = query.filter(pair_states::remote_ref.is_null());
        }
        if let Some(ref v) = filter.remote_parent_ref {
            query = query.filter(pair_states::remote_parent_ref.eq(v.clone()));
        }
        if let Some(v) = filter.folderish {
            query = query.filter(pair_states::folderish.eq(v));
        }
        if let Some(ref v) = filter.local_digest {
            query = query.filter(pair_states::local_digest.eq(v.clone()));
        }
        if let Some(ref v) = filter.remote_digest {
            query = query.filter(pair_states::remote_digest.eq(v.clone()));
        }
        if let Some(v) = filter.local_state {
            query = query.filter(pair_states::local_state.eq(v.as_str()));
        }
        if let Some(v) = filter.remote_state {
            query = query.filter(pair_states::remote_state.eq(v.as_str()));
        }

        let rows = query.load::<PairStateRow>(&self.connection)?;
        Ok(rows.into_iter().map(PairState::from_row).collect())
    }

    pub fn get_by_local_path(&self, local_folder: &str, local_path: &str) -> Result<Option<PairState>> {
        let row = pair_states::table
            .filter(pair_states::local_folder.eq(local_folder))
            .filter(pair_states::local_path.eq(local_path))
            .first::<PairStateRow>(&self.connection)
            .optional()?;
        Ok(row.map(PairState::from_row))
    }

    pub fn get_by_remote_ref(&self, local_folder: &str, remote_ref: &str) -> Result<Option<PairState>> {
        let row = pair_states::table
            .filter(pair_states::local_folder.eq(local_folder))
            .filter(pair_states::remote_ref.eq(remote_ref))
            .first::<PairStateRow>(&self.connection)
            .optional()?;
        Ok(row.map(PairState::from_row))
    }

    pub fn dirty_count(&self, local_folder: &str) -> Result<i64> {
        let count = pair_states::table
            .filter(pair_states::local_folder.eq(local_folder))
            .filter(
                pair_states::local_state
                    .ne(NodeState::Synchronized.as_str())
                    .or(pair_states::remote_state.ne(NodeState::Synchronized.as_str())),
            )
            .count()
            .get_result(&self.connection)?;
        Ok(count)
    }

    pub fn deleted_count(&self, local_folder: &str) -> Result<i64> {
        let count = pair_states::table
            .filter(pair_states::local_folder.eq(local_folder))
            .filter(pair_states::local_state.eq(NodeState::Deleted.as_str()))
            .filter(pair_states::remote_state.eq(NodeState::Deleted.as_str()))
            .count()
            .get_result(&self.connection)?;
        Ok(count)
    }

    /// Pairs whose `pair_state` is not `synchronized` and whose
    /// `last_sync_error_date` is outside the cooldown window.
    pub fn list_pending(&self, local_folder: &str, error_cutoff: i64, limit: i64) -> Result<Vec<PairState>> {
        let rows = pair_states::table
            .filter(pair_states::local_folder.eq(local_folder))
            .filter(
                pair_states::local_state
                    .ne(NodeState::Synchronized.as_str())
                    .or(pair_states::remote_state.ne(NodeState::Synchronized.as_str())),
            )
            .filter(
                pair_states::last_sync_error_date
                    .is_null()
                    .or(pair_states::last_sync_error_date.lt(error_cutoff)),
            )
            // SQLite sorts NULL as the smallest value, so ordering
            // local_path descending already puts null-path pairs last -
            // this is how "local_path non-null first" is satisfied without
            // a NULLS LAST extension.
            .order(pair_states::local_path.desc())
            .limit(limit)
            .load::<PairStateRow>(&self.connection)?;
        Ok(rows.into_iter().map(PairState::from_row).collect())
    }

    // --- mark and sweep ---

    /// Tags every pair whose key is in `keys` with a fresh `scan_tag` so a
    /// later `not_selected` call can find rows under the same scope that are
    /// no longer present on disk / on the server. Paged because `keys` can be
    /// arbitrarily large.
    pub fn mark_selection(
        &self,
        local_folder: &str,
        kind: SelectionKind,
        keys: &[String],
        page_size: usize,
    ) -> Result<String> {
        let tag = Uuid::new_v4().to_simple().to_string();
        for chunk in keys.chunks(page_size.max(1)) {
            let chunk: Vec<String> = chunk.to_vec();
            match kind {
                SelectionKind::LocalPaths => {
                    diesel::update(
                        pair_states::table
                            .filter(pair_states::local_folder.eq(local_folder))
                            .filter(pair_states::local_path.eq_any(chunk)),
                    )
                    .set(pair_states::scan_tag.eq(Some(tag.clone())))
                    .execute(&self.connection)?;
                }
                SelectionKind::RemoteRefs => {
                    diesel::update(
                        pair_states::table
                            .filter(pair_states::local_folder.eq(local_folder))
                            .filter(pair_states::remote_ref.eq_any(chunk)),
                    )
                    .set(pair_states::scan_tag.eq(Some(tag.clone())))
                    .execute(&self.connection)?;
                }
            }
        }
        Ok(tag)
    }

    /// Rows under `local_parent_path` (or `remote_parent_ref`, depending on
    /// `kind`) that were not tagged by the most recent `mark_selection` call -
    /// i.e. missing from the fresh directory listing / children response.
    pub fn not_selected(
        &self,
        local_folder: &str,
        kind: SelectionKind,
        parent_key: &str,
        tag: &str,
    ) -> Result<Vec<PairState>> {
        let rows = match kind {
            SelectionKind::LocalPaths => pair_states::table
                .filter(pair_states::local_folder.eq(local_folder))
                .filter(pair_states::local_parent_path.eq(parent_key))
                .filter(
                    pair_states::scan_tag
                        .is_null()
                        .or(pair_states::scan_tag.ne(tag)),
                )
                .load::<PairStateRow>(&self.connection)?,
            SelectionKind::RemoteRefs => pair_states::table
                .filter(pair_states::local_folder.eq(local_folder))
                .filter(pair_states::remote_parent_ref.eq(parent_key))
                .filter(
                    pair_states::scan_tag
                        .is_null()
                        .or(pair_states::scan_tag.ne(tag)),
                )
                .load::<PairStateRow>(&self.connection)?,
        };
        Ok(rows.into_iter().map(PairState::from_row).collect())
    }
}

fn default_db_settings(connection: &SqliteConnection) -> Result<()> {
    sql_query("PRAGMA journal_mode = WAL").execute(connection)?;
    sql_query("PRAGMA foreign_keys = 1").execute(connection)?;
    sql_query("PRAGMA locking_mode = EXCLUSIVE").execute(connection)?;
    debug!("applied default pragmas to pair state store connection");
    Ok(())
}
