//! Import lookup policy
//!
//! An [`ImportSet`] is the bag of named proto sources supplied alongside the
//! main file. Names are whatever the caller had at hand (a bare file name, a
//! relative path, an absolute path), so lookups match on path suffixes and
//! basenames rather than requiring an exact spelling.

use crate::error::{Error, Result};

/// Ordered collection of import file contents keyed by file identifier
#[derive(Debug, Clone, Default)]
pub struct ImportSet {
    files: Vec<(String, String)>,
}

impl ImportSet {
    /// Create an empty import set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file under `name`
    ///
    /// Registering the same name twice replaces the earlier content but keeps
    /// its position in iteration order.
    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        let name = normalize(&name.into());
        let content = content.into();
        match self.files.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = content,
            None => self.files.push((name, content)),
        }
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(name, content);
        self
    }

    /// Number of registered files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no files are registered
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate `(name, content)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files
            .iter()
            .map(|(name, content)| (name.as_str(), content.as_str()))
    }

    /// Map an import statement's target to the name it should be fetched under
    ///
    /// A key equal to `target` wins, then the first key ending with `target`.
    /// When nothing matches, `target` is returned unchanged so later stages can
    /// still attempt their own resolution.
    pub fn resolve_path(&self, origin: &str, target: &str) -> String {
        let target = normalize(target);
        if let Some((key, _)) = self.files.iter().find(|(key, _)| *key == target) {
            return key.clone();
        }
        if let Some((key, _)) = self
            .files
            .iter()
            .find(|(key, _)| ends_with_path(key, &target))
        {
            tracing::trace!(origin, target = %target, resolved = %key, "import matched by suffix");
            return key.clone();
        }
        target
    }

    /// Fetch the content registered for `name`
    ///
    /// Exact key first, then a key that is a suffix of `name`, then a key with
    /// the same basename.
    pub fn fetch(&self, name: &str) -> Result<&str> {
        let name = normalize(name);
        self.files
            .iter()
            .find(|(key, _)| *key == name)
            .or_else(|| {
                self.files
                    .iter()
                    .find(|(key, _)| ends_with_path(&name, key))
            })
            .or_else(|| {
                self.files
                    .iter()
                    .find(|(key, _)| basename(key) == basename(&name))
            })
            .map(|(_, content)| content.as_str())
            .ok_or(Error::ImportNotFound(name))
    }
}

impl<K, V> FromIterator<(K, V)> for ImportSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = ImportSet::new();
        for (name, content) in iter {
            set.insert(name, content);
        }
        set
    }
}

fn normalize(name: &str) -> String {
    name.replace('\\', "/")
}

/// Whether `path` ends with `suffix` on a `/` boundary
fn ends_with_path(path: &str, suffix: &str) -> bool {
    if suffix.is_empty() {
        return false;
    }
    path == suffix
        || path
            .strip_suffix(suffix)
            .is_some_and(|head| head.ends_with('/'))
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
