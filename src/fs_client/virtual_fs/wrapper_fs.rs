use super::*;
use std::fs;
use std::io::Write;

#[derive(Clone)]
pub struct WrapperFS {}
impl FS for WrapperFS {
    fn default() -> Self {
        Self {}
    }

    fn metadata<P: AsRef<Path>>(&self, path: P) -> io::Result<Metadata> {
        let native = fs::metadata(path)?;
        Ok(Metadata {
            read_only: native.permissions().readonly(),
            file_type: match native.file_type() {
                t if t.is_file() => FileType::File,
                t if t.is_dir() => FileType::Dir,
                t if t.is_symlink() => FileType::Link,
                _ => return Err(io::Error::from(io::ErrorKind::Other)),
            },
            last_mod_time: FileTime::from_last_modification_time(&native),
        })
    }

    fn create_dir<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        fs::DirBuilder::new().recursive(false).create(&path)
    }
    fn remove_dir<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        fs::remove_dir(path)
    }
    fn list_dir<P: AsRef<Path>>(&self, path: P) -> io::Result<Vec<DirEntry>> {
        fs::read_dir(path)?
            .map(|entry| entry.map(|entry| DirEntry { path: entry.path() }))
            .collect()
    }

    fn create_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;
        Ok(())
    }
    fn remove_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        fs::remove_file(path)
    }
    fn rename<P: AsRef<Path>>(&self, from: P, to: P) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn read_file<P: AsRef<Path>>(&self, path: P) -> io::Result<Box<dyn io::Read>> {
        let reader = fs::OpenOptions::new()
            .create(false)
            .read(true)
            .write(false)
            .open(path.as_ref())?;
        Ok(Box::new(reader))
    }
    fn write_file<P: AsRef<Path>>(&self, path: P, content: &[u8]) -> io::Result<()> {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path.as_ref())?;
        f.write_all(content)
    }
}
