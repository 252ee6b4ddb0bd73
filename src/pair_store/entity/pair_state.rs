use super::schema::pair_states;

/// Raw row as stored in SQLite. `local_state`/`remote_state` are persisted
/// as text and converted to/from `NodeState` by the store - keeping the
/// entity a close mirror of the schema.
#[derive(Debug, Queryable, QueryableByName, Clone)]
#[table_name = "pair_states"]
pub struct PairStateRow {
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

    pub local_state: String,
    pub remote_state: String,

    pub last_sync_error_date: Option<i64>,
    pub scan_tag: Option<String>,
}

#[derive(Insertable)]
#[table_name = "pair_states"]
pub struct NewPairStateRow {
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

    pub local_state: String,
    pub remote_state: String,

    pub last_sync_error_date: Option<i64>,
    pub scan_tag: Option<String>,
}
