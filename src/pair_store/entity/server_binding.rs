use super::schema::server_bindings;

#[derive(Debug, Queryable, QueryableByName, Clone)]
#[table_name = "server_bindings"]
pub struct ServerBindingRow {
    pub id: i64,
    pub local_folder: String,
    pub server_url: String,
    pub credentials: String,
    pub last_sync_date: i64,
    pub last_root_definitions: String,
    pub invalid_credentials: bool,
}

#[derive(Insertable)]
#[table_name = "server_bindings"]
pub struct NewServerBindingRow {
    pub local_folder: String,
    pub server_url: String,
    pub credentials: String,
    pub last_sync_date: i64,
    pub last_root_definitions: String,
    pub invalid_credentials: bool,
}
