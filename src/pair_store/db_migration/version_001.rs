use diesel::{sql_query, RunQueryDsl, SqliteConnection};

pub fn migrate(conn: &SqliteConnection) -> diesel::result::QueryResult<()> {
    create_table_server_bindings(conn)?;
    create_table_pair_states(conn)?;
    Ok(())
}

// One ServerBinding per locally bound root; the cursor into that root's
// remote change stream.
fn create_table_server_bindings(conn: &SqliteConnection) -> diesel::result::QueryResult<()> {
    sql_query(
        "CREATE TABLE server_bindings(
                id                      INTEGER PRIMARY KEY NOT NULL,

                local_folder            TEXT NOT NULL UNIQUE,
                server_url              TEXT NOT NULL,
                credentials             TEXT NOT NULL,

                last_sync_date          INTEGER NOT NULL DEFAULT 0,
                last_root_definitions   TEXT NOT NULL DEFAULT '',
                invalid_credentials     INTEGER NOT NULL DEFAULT 0
             )",
    )
    .execute(conn)?;

    Ok(())
}

// A PairState row joins a local node and a remote node the engine believes
// correspond. Either side may be absent (NULL); never both (enforced by the
// store, not by a CHECK constraint, so the handlers see a typed violation
// instead of a raw SQL error).
fn create_table_pair_states(conn: &SqliteConnection) -> diesel::result::QueryResult<()> {
    sql_query(
        "CREATE TABLE pair_states(
                id                          INTEGER PRIMARY KEY NOT NULL,

                local_folder                TEXT NOT NULL,

                local_path                  TEXT,
                local_parent_path           TEXT,
                local_name                  TEXT,
                local_digest                TEXT,
                folderish                   INTEGER NOT NULL,

                remote_ref                  TEXT,
                remote_parent_ref           TEXT,
                remote_parent_path          TEXT,
                remote_name                 TEXT,
                remote_digest               TEXT,
                remote_can_create_child     INTEGER NOT NULL DEFAULT 1,
                remote_can_rename           INTEGER NOT NULL DEFAULT 1,
                remote_can_delete           INTEGER NOT NULL DEFAULT 1,

                local_state                 TEXT NOT NULL,
                remote_state                 TEXT NOT NULL,

                last_sync_error_date        INTEGER,
                scan_tag                    TEXT,

                UNIQUE(local_folder, local_path),
                UNIQUE(local_folder, remote_ref)
             )",
    )
    .execute(conn)?;

    sql_query(
        "CREATE INDEX pair_states_local_parent ON pair_states(local_folder, local_parent_path)",
    )
    .execute(conn)?;
    sql_query(
        "CREATE INDEX pair_states_remote_parent ON pair_states(local_folder, remote_parent_ref)",
    )
    .execute(conn)?;
    sql_query("CREATE INDEX pair_states_local_digest ON pair_states(local_digest)").execute(conn)?;
    sql_query("CREATE INDEX pair_states_remote_digest ON pair_states(remote_digest)")
        .execute(conn)?;
    sql_query("CREATE INDEX pair_states_local_state ON pair_states(local_state)").execute(conn)?;
    sql_query("CREATE INDEX pair_states_remote_state ON pair_states(remote_state)")
        .execute(conn)?;

    Ok(())
}
