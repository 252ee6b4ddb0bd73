//! Local filesystem client: enumerates children, computes digests and
//! performs the atomic create/rename/move/delete operations the resolver
//! needs, behind the `LocalFsClient` trait so tests can swap in an
//! in-memory double.

pub mod errors;
pub mod relative_path;
pub mod virtual_fs;

pub use errors::{FsClientError, Result};
pub use relative_path::RelativePath;
pub use virtual_fs::{InMemoryFS, WrapperFS, FS};

use data_encoding::HEXLOWER;
use ring::digest::{Context, SHA256};
use std::io::Read;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNodeInfo {
    pub path: RelativePath,
    pub folderish: bool,
    pub name: String,
    pub digest: Option<String>,
}

/// Capabilities required of a local filesystem by the scanners and resolver,
/// independent of any concrete FS implementation.
pub trait LocalFsClient {
    fn get_info(&self, path: &RelativePath) -> Result<LocalNodeInfo>;
    fn get_children_info(&self, path: &RelativePath) -> Result<Vec<LocalNodeInfo>>;
    fn get_digest(&self, path: &RelativePath) -> Result<String>;

    fn make_folder(&self, parent: &RelativePath, name: &str) -> Result<RelativePath>;
    /// Reserves a path/name for a new file the caller is about to stream
    /// content into; returns the relative path to write to.
    fn get_new_file(&self, parent: &RelativePath, name: &str) -> Result<RelativePath>;

    fn rename(&self, path: &RelativePath, new_name: &str) -> Result<LocalNodeInfo>;
    fn move_item(&self, path: &RelativePath, new_parent: &RelativePath) -> Result<LocalNodeInfo>;
    fn delete(&self, path: &RelativePath) -> Result<()>;

    fn write_content(&self, path: &RelativePath, content: &[u8]) -> Result<()>;
    fn read_content(&self, path: &RelativePath) -> Result<Vec<u8>>;
}

/// Thin adapter from a `virtual_fs::FS` implementation to the
/// `LocalFsClient` contract, shared by both `WrapperFS`-backed and
/// `InMemoryFS`-backed clients.
pub struct FsClient<F: FS> {
    root: std::path::PathBuf,
    fs: F,
}

impl<F: FS> FsClient<F> {
    pub fn new(root: std::path::PathBuf) -> Self {
        Self {
            root,
            fs: FS::default(),
        }
    }

    fn abs(&self, path: &RelativePath) -> std::path::PathBuf {
        self.root.join(path.to_path_buf().strip_prefix("/").unwrap_or(&path.to_path_buf()))
    }

    fn digest_of(&self, path: &RelativePath) -> Result<String> {
        let mut reader = self.fs.read_file(self.abs(path))?;
        let mut context = Context::new(&SHA256);
        let mut buffer = [0u8; 8192];
        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            context.update(&buffer[..read]);
        }
        Ok(HEXLOWER.encode(context.finish().as_ref()))
    }
}

impl<F: FS> LocalFsClient for FsClient<F> {
    fn get_info(&self, path: &RelativePath) -> Result<LocalNodeInfo> {
        let metadata = self.fs.metadata(self.abs(path))?;
        let folderish = metadata.file_type() == virtual_fs::FileType::Dir;
        Ok(LocalNodeInfo {
            path: path.clone(),
            folderish,
            name: path.name().to_string(),
            digest: if folderish {
                None
            } else {
                Some(self.digest_of(path)?)
            },
        })
    }

    fn get_children_info(&self, path: &RelativePath) -> Result<Vec<LocalNodeInfo>> {
        let entries = self.fs.list_dir(self.abs(path))?;
        let mut result = Vec::with_capacity(entries.len());
        for entry in entries {
            let name = entry
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let child_path = path.join(name);
            // A single unreadable child (e.g. locked file) must not abort
            // the whole listing - the scanner falls back to name-only
            // alignment for it.
            if let Ok(info) = self.get_info(&child_path) {
                result.push(info);
            }
        }
        Ok(result)
    }

    fn get_digest(&self, path: &RelativePath) -> Result<String> {
        self.digest_of(path)
    }

    fn make_folder(&self, parent: &RelativePath, name: &str) -> Result<RelativePath> {
        let path = parent.join(name.to_string());
        self.fs.create_dir(self.abs(&path))?;
        Ok(path)
    }

    fn get_new_file(&self, parent: &RelativePath, name: &str) -> Result<RelativePath> {
        let path = parent.join(name.to_string());
        self.fs.create_file(self.abs(&path))?;
        Ok(path)
    }

    fn rename(&self, path: &RelativePath, new_name: &str) -> Result<LocalNodeInfo> {
        let parent = path.parent().ok_or(FsClientError::NotFound)?;
        let new_path = parent.join(new_name.to_string());
        self.fs.rename(self.abs(path), self.abs(&new_path))?;
        self.get_info(&new_path)
    }

    fn move_item(&self, path: &RelativePath, new_parent: &RelativePath) -> Result<LocalNodeInfo> {
        let new_path = new_parent.join(path.name().to_string());
        self.fs.rename(self.abs(path), self.abs(&new_path))?;
        self.get_info(&new_path)
    }

    fn delete(&self, path: &RelativePath) -> Result<()> {
        let metadata = self.fs.metadata(self.abs(path))?;
        if metadata.file_type() == virtual_fs::FileType::Dir {
            self.fs.remove_dir(self.abs(path))?;
        } else {
            self.fs.remove_file(self.abs(path))?;
        }
        Ok(())
    }

    fn write_content(&self, path: &RelativePath, content: &[u8]) -> Result<()> {
        self.fs.write_file(self.abs(path), content)?;
        Ok(())
    }

    fn read_content(&self, path: &RelativePath) -> Result<Vec<u8>> {
        let mut reader = self.fs.read_file(self.abs(path))?;
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

pub type DefaultLocalFsClient = FsClient<WrapperFS>;
pub type InMemoryLocalFsClient = FsClient<InMemoryFS>;

/// Generates a fresh conflict/dedup suffix, e.g. for a temp download slot
/// name collision. Kept distinct from `DEDUPED_BASENAME_PATTERN` matching in
/// `move_detector`, which only ever reads such suffixes back off.
pub fn fresh_temp_suffix() -> String {
    Uuid::new_v4().to_simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> InMemoryLocalFsClient {
        FsClient::new(std::path::PathBuf::from("/"))
    }

    #[test]
    fn make_folder_and_list_children() {
        let client = client();
        let root = RelativePath::root();
        client.make_folder(&root, "a").unwrap();
        let path = root.join("a".into());
        let new_file = client.get_new_file(&path, "f.txt").unwrap();
        client.write_content(&new_file, b"hello").unwrap();

        let children = client.get_children_info(&path).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "f.txt");
        assert!(children[0].digest.is_some());
    }

    #[test]
    fn rename_then_move() {
        let client = client();
        let root = RelativePath::root();
        client.make_folder(&root, "a").unwrap();
        client.make_folder(&root, "b").unwrap();
        let a = root.join("a".into());
        let b = root.join("b".into());
        let f = client.get_new_file(&a, "f.txt").unwrap();
        client.write_content(&f, b"hi").unwrap();

        let renamed = client.rename(&f, "g.txt").unwrap();
        assert_eq!(renamed.path.name(), "g.txt");

        let moved = client.move_item(&renamed.path, &b).unwrap();
        assert_eq!(moved.path.to_canonical_string(), "/b/g.txt");
    }
}
