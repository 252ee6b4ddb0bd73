use std::path::{Path, PathBuf};

/// A simplified, tree-rooted relative path.
///
/// All pair-state paths are stored and compared in this form, never as raw
/// `PathBuf`s: it keeps the resolver and scanners free of platform-specific
/// separator and case handling, and bans indirection like `..` components.
/// Only the concrete `LocalFsClient` implementation converts to/from a
/// native `Path`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RelativePath {
    path_components: Vec<String>,
}

impl RelativePath {
    pub fn root() -> Self {
        Self {
            path_components: vec![String::new()],
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let mut path_components = Vec::new();
        path_components.push(String::new());

        for component in path.as_ref().components() {
            let name = component
                .as_os_str()
                .to_str()
                .expect("only UTF-8 compatible file names are supported")
                .to_string();
            if name == "/" {
                continue;
            }
            path_components.push(name);
        }

        Self { path_components }
    }

    pub fn from_vec(path_components: Vec<String>) -> Self {
        Self { path_components }
    }

    pub fn to_path_buf(&self) -> PathBuf {
        let mut result = PathBuf::new();
        for component in &self.path_components {
            result.push(component);
        }
        result
    }

    /// Canonical slash-joined representation, used as the DB key.
    pub fn to_canonical_string(&self) -> String {
        if self.is_root() {
            return "/".to_string();
        }
        format!("/{}", self.path_components[1..].join("/"))
    }

    pub fn components(&self) -> &Vec<String> {
        &self.path_components
    }

    pub fn is_root(&self) -> bool {
        self.path_components.len() == 1
    }

    pub fn join(&self, component: String) -> Self {
        let mut result = self.clone();
        result.path_components.push(component);
        result
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let mut result = self.clone();
        result.path_components.pop();
        Some(result)
    }

    pub fn to_lower_case(&self) -> Self {
        Self {
            path_components: self
                .path_components
                .iter()
                .map(|c| c.to_lowercase())
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        self.path_components.last().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_root() {
        assert!(RelativePath::root().is_root());
        assert_eq!(RelativePath::root().to_canonical_string(), "/");
    }

    #[test]
    fn join_and_canonical_string() {
        let p = RelativePath::root().join("a".into()).join("b.txt".into());
        assert_eq!(p.to_canonical_string(), "/a/b.txt");
        assert_eq!(p.name(), "b.txt");
        assert_eq!(p.parent().unwrap().to_canonical_string(), "/a");
    }

    #[test]
    fn lower_case_only_affects_components() {
        let p = RelativePath::root().join("Foo".into());
        assert_eq!(p.to_lower_case().to_canonical_string(), "/foo");
    }
}
