use super::*;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use std::time::Duration;

/// Blocking `reqwest`-backed `RemoteFsClient`, talking to a document
/// repository over a small JSON REST surface
/// (`/fs/info`, `/fs/children`, `/fs/changes`, `/fs/content`, ...).
pub struct HttpRemoteClient {
    base_url: String,
    auth_token: String,
    client: Client,
}

impl HttpRemoteClient {
    pub fn new(base_url: String, auth_token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(RemoteClientError::from)?;
        Ok(Self {
            base_url,
            auth_token,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(RemoteClientError::Auth);
        }
        if !status.is_success() {
            return Err(RemoteClientError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

impl RemoteFsClient for HttpRemoteClient {
    fn get_info(&self, remote_ref: &str, raise_if_missing: bool) -> Result<Option<RemoteNodeInfo>> {
        let response = self
            .client
            .get(self.url(&format!("/fs/info/{}", remote_ref)))
            .header(AUTHORIZATION, &self.auth_token)
            .send()?;

        if response.status().as_u16() == 404 {
            return if raise_if_missing {
                Err(RemoteClientError::NotFound)
            } else {
                Ok(None)
            };
        }
        let response = Self::check_status(response)?;
        Ok(Some(response.json::<RemoteNodeInfo>()?))
    }

    fn get_children_info(&self, remote_ref: &str) -> Result<Vec<RemoteNodeInfo>> {
        let response = self
            .client
            .get(self.url(&format!("/fs/children/{}", remote_ref)))
            .header(AUTHORIZATION, &self.auth_token)
            .send()?;
        let response = Self::check_status(response)?;
        Ok(response.json::<Vec<RemoteNodeInfo>>()?)
    }

    fn get_changes(
        &self,
        last_sync_date: i64,
        last_root_definitions: &str,
    ) -> Result<ChangeSummary> {
        let response = self
            .client
            .get(self.url("/fs/changes"))
            .header(AUTHORIZATION, &self.auth_token)
            .query(&[
                ("lastSyncDate", last_sync_date.to_string()),
                (
                    "lastRootDefinitions".to_string(),
                    last_root_definitions.to_string(),
                ),
            ])
            .send()?;
        let response = Self::check_status(response)?;
        Ok(response.json::<ChangeSummary>()?)
    }

    fn stream_content(&self, remote_ref: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.url(&format!("/fs/content/{}", remote_ref)))
            .header(AUTHORIZATION, &self.auth_token)
            .send()?;
        let response = Self::check_status(response)?;
        Ok(response.bytes()?.to_vec())
    }

    fn stream_update(&self, remote_ref: &str, content: &[u8]) -> Result<()> {
        let response = self
            .client
            .put(self.url(&format!("/fs/content/{}", remote_ref)))
            .header(AUTHORIZATION, &self.auth_token)
            .body(content.to_vec())
            .send()?;
        Self::check_status(response)?;
        Ok(())
    }

    fn stream_file(&self, parent_ref: &str, name: &str, content: &[u8]) -> Result<String> {
        let response = self
            .client
            .post(self.url(&format!("/fs/children/{}", parent_ref)))
            .header(AUTHORIZATION, &self.auth_token)
            .query(&[("name", name)])
            .body(content.to_vec())
            .send()?;
        let response = Self::check_status(response)?;
        let created = response.json::<RemoteNodeInfo>()?;
        Ok(created.remote_ref)
    }

    fn make_folder(&self, parent_ref: &str, name: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url(&format!("/fs/folders/{}", parent_ref)))
            .header(AUTHORIZATION, &self.auth_token)
            .json(&serde_json::json!({ "name": name }))
            .send()?;
        let response = Self::check_status(response)?;
        let created = response.json::<RemoteNodeInfo>()?;
        Ok(created.remote_ref)
    }

    fn rename(&self, remote_ref: &str, name: &str) -> Result<RemoteNodeInfo> {
        let response = self
            .client
            .patch(self.url(&format!("/fs/{}/rename", remote_ref)))
            .header(AUTHORIZATION, &self.auth_token)
            .json(&serde_json::json!({ "name": name }))
            .send()?;
        let response = Self::check_status(response)?;
        Ok(response.json::<RemoteNodeInfo>()?)
    }

    fn move_item(&self, remote_ref: &str, target_parent_ref: &str) -> Result<RemoteNodeInfo> {
        let response = self
            .client
            .patch(self.url(&format!("/fs/{}/move", remote_ref)))
            .header(AUTHORIZATION, &self.auth_token)
            .json(&serde_json::json!({ "targetParentRef": target_parent_ref }))
            .send()?;
        let response = Self::check_status(response)?;
        Ok(response.json::<RemoteNodeInfo>()?)
    }

    fn can_move(&self, remote_ref: &str, target_parent_ref: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.url(&format!("/fs/{}/can-move", remote_ref)))
            .header(AUTHORIZATION, &self.auth_token)
            .query(&[("targetParentRef", target_parent_ref)])
            .send()?;
        let response = Self::check_status(response)?;
        Ok(response.json::<bool>()?)
    }

    fn delete(&self, remote_ref: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/fs/{}", remote_ref)))
            .header(AUTHORIZATION, &self.auth_token)
            .send()?;
        Self::check_status(response)?;
        Ok(())
    }

    fn conflicted_name(&self, local_name: &str) -> String {
        match local_name.rfind('.') {
            Some(idx) if idx > 0 => format!(
                "{} (conflict){}",
                &local_name[..idx],
                &local_name[idx..]
            ),
            _ => format!("{} (conflict)", local_name),
        }
    }
}
