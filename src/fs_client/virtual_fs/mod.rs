use filetime::FileTime;
use std::io;
use std::path::{Path, PathBuf};

/// Virtual abstraction layer above the actual FS implementation and API.
///
/// Two implementations exist: a thin wrapper around the OS file system
/// (`WrapperFS`) and an in-memory mock (`InMemoryFS`) used by scanner and
/// resolver tests so they do not need a real disk.
///
/// Only functions actually required by the local client are wrapped - this
/// can be less or sometimes more than `std::fs` provides (e.g. we need to
/// read creation time on platforms that support it).
pub trait FS {
    fn default() -> Self;

    fn metadata<P: AsRef<Path>>(&self, path: P) -> io::Result<Metadata>;

    fn create_dir<P: AsRef<Path>>(&self, path: P) -> io::Result<()>;
    fn remove_dir<P: AsRef<Path>>(&self, path: P) -> io::Result<()>;
    fn list_dir<P: AsRef<Path>>(&self, path: P) -> io::Result<Vec<DirEntry>>;

    fn create_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()>;
    fn remove_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()>;
    fn rename<P: AsRef<Path>>(&self, from: P, to: P) -> io::Result<()>;

    fn read_file<P: AsRef<Path>>(&self, path: P) -> io::Result<Box<dyn io::Read>>;
    fn write_file<P: AsRef<Path>>(&self, path: P, content: &[u8]) -> io::Result<()>;
}

pub struct DirEntry {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Metadata {
    pub file_type: FileType,
    pub read_only: bool,
    pub last_mod_time: FileTime,
}
impl Metadata {
    pub fn file_type(&self) -> FileType {
        self.file_type
    }
}
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FileType {
    File,
    Dir,
    Link,
}

mod wrapper_fs;
pub use self::wrapper_fs::WrapperFS;

mod in_memory_fs;
pub use self::in_memory_fs::InMemoryFS;
