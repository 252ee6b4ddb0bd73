table! {
    server_bindings (id) {
        id -> BigInt,
        local_folder -> Text,
        server_url -> Text,
        credentials -> Text,
        last_sync_date -> BigInt,
        last_root_definitions -> Text,
        invalid_credentials -> Bool,
    }
}

table! {
    pair_states (id) {
        id -> BigInt,

        local_folder -> Text,

        local_path -> Nullable<Text>,
        local_parent_path -> Nullable<Text>,
        local_name -> Nullable<Text>,
        local_digest -> Nullable<Text>,
        folderish -> Bool,

        remote_ref -> Nullable<Text>,
        remote_parent_ref -> Nullable<Text>,
        remote_parent_path -> Nullable<Text>,
        remote_name -> Nullable<Text>,
        remote_digest -> Nullable<Text>,
        remote_can_create_child -> Bool,
        remote_can_rename -> Bool,
        remote_can_delete -> Bool,

        local_state -> Text,
        remote_state -> Text,

        last_sync_error_date -> Nullable<BigInt>,
        scan_tag -> Nullable<Text>,
    }
}
