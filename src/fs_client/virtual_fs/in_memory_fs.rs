use super::*;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Mutex;

#[derive(Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

/// Deterministic in-memory filesystem double used by scanner/resolver tests.
/// Keyed by the OS-style path string so tests can seed and inspect content
/// without touching disk.
pub struct InMemoryFS {
    nodes: Mutex<BTreeMap<String, Node>>,
    clock: Mutex<i64>,
}

fn key<P: AsRef<Path>>(path: P) -> String {
    path.as_ref().to_string_lossy().replace('\\', "/")
}

impl FS for InMemoryFS {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Dir);
        Self {
            nodes: Mutex::new(nodes),
            clock: Mutex::new(0),
        }
    }

    fn metadata<P: AsRef<Path>>(&self, path: P) -> io::Result<Metadata> {
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(&key(path)) {
            Some(Node::Dir) => Ok(Metadata {
                read_only: false,
                file_type: FileType::Dir,
                last_mod_time: FileTime::zero(),
            }),
            Some(Node::File(_)) => Ok(Metadata {
                read_only: false,
                file_type: FileType::File,
                last_mod_time: FileTime::zero(),
            }),
            None => Err(io::Error::from(io::ErrorKind::NotFound)),
        }
    }

    fn create_dir<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        let k = key(path);
        if nodes.contains_key(&k) {
            return Err(io::Error::from(io::ErrorKind::AlreadyExists));
        }
        nodes.insert(k, Node::Dir);
        Ok(())
    }
    fn remove_dir<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.remove(&key(path)) {
            Some(Node::Dir) => Ok(()),
            Some(other) => {
                nodes.insert(key(path), other);
                Err(io::Error::from(io::ErrorKind::Other))
            }
            None => Err(io::Error::from(io::ErrorKind::NotFound)),
        }
    }
    fn list_dir<P: AsRef<Path>>(&self, path: P) -> io::Result<Vec<DirEntry>> {
        let nodes = self.nodes.lock().unwrap();
        let prefix = key(path);
        let prefix = if prefix.ends_with('/') {
            prefix
        } else {
            format!("{}/", prefix)
        };
        let exists = prefix == "/" || nodes.contains_key(&prefix[..prefix.len() - 1]);
        if !exists {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }

        let mut result = Vec::new();
        for k in nodes.keys() {
            if k.len() > prefix.len() && k.starts_with(&prefix) {
                let rest = &k[prefix.len()..];
                if !rest.contains('/') {
                    result.push(DirEntry {
                        path: PathBuf::from(k),
                    });
                }
            }
        }
        Ok(result)
    }

    fn create_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        let k = key(path);
        if nodes.contains_key(&k) {
            return Err(io::Error::from(io::ErrorKind::AlreadyExists));
        }
        nodes.insert(k, Node::File(Vec::new()));
        Ok(())
    }
    fn remove_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.remove(&key(path)) {
            Some(Node::File(_)) => Ok(()),
            Some(other) => {
                nodes.insert(key(path), other);
                Err(io::Error::from(io::ErrorKind::Other))
            }
            None => Err(io::Error::from(io::ErrorKind::NotFound)),
        }
    }
    fn rename<P: AsRef<Path>>(&self, from: P, to: P) -> io::Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes
            .remove(&key(from))
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        nodes.insert(key(to), node);
        Ok(())
    }

    fn read_file<P: AsRef<Path>>(&self, path: P) -> io::Result<Box<dyn io::Read>> {
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(&key(path)) {
            Some(Node::File(content)) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(Node::Dir) => Err(io::Error::from(io::ErrorKind::Other)),
            None => Err(io::Error::from(io::ErrorKind::NotFound)),
        }
    }
    fn write_file<P: AsRef<Path>>(&self, path: P, content: &[u8]) -> io::Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        nodes.insert(key(path), Node::File(content.to_vec()));
        Ok(())
    }
}

impl InMemoryFS {
    /// Advances and returns a fake monotonic clock, used by tests that need
    /// distinct mod times without sleeping.
    pub fn tick(&self) -> i64 {
        let mut clock = self.clock.lock().unwrap();
        *clock += 1;
        *clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    #[test]
    fn create_and_list_dir() {
        let fs = InMemoryFS::default();
        fs.create_dir("/a").unwrap();
        fs.create_file("/a/f.txt").unwrap();
        let entries = fs.list_dir("/a").unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn root_lists_its_own_children() {
        let fs = InMemoryFS::default();
        fs.create_file("/f.txt").unwrap();
        fs.create_dir("/a").unwrap();
        let entries = fs.list_dir("/").unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn write_and_read_round_trip() {
        let fs = InMemoryFS::default();
        fs.create_file("/f.txt").unwrap();
        fs.write_file("/f.txt", b"hello").unwrap();
        let mut buf = Vec::new();
        fs.read_file("/f.txt").unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello");
    }
}
