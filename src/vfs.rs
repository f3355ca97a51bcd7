//! Virtual file map and path resolution for multi-file projects.
//!
//! DESIGN
//! ======
//! Project sources live in a flat map from normalized forward-slash paths
//! (no leading slash, `.`/`..` resolved) to source text. Lookups never climb
//! above the project root: a `..` with nothing to pop is dropped.

use std::collections::BTreeMap;

/// Suffixes probed, in order, when resolving a local import.
pub const RESOLVE_SUFFIXES: &[&str] = &[
    "",
    ".tsx",
    ".ts",
    ".jsx",
    ".js",
    ".css",
    "/index.tsx",
    "/index.ts",
    "/index.jsx",
    "/index.js",
    "/index.css",
];

/// Flat project file map with pre-normalized keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualFileMap {
    files: BTreeMap<String, String>,
}

impl VirtualFileMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file, normalizing its path. Returns the previous source, if any.
    pub fn insert(&mut self, path: &str, source: impl Into<String>) -> Option<String> {
        self.files.insert(normalize(path), source.into())
    }

    /// Look up a file by (already normalized) path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for VirtualFileMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (path, source) in iter {
            map.insert(path.as_ref(), source);
        }
        map
    }
}

/// Normalize a project path: backslashes become `/`, the leading slash is
/// stripped, and `.`/`..` segments are resolved. A `..` that would escape
/// the root is ignored.
#[must_use]
pub fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Normalized parent directory, or an empty string for root-level paths.
#[must_use]
pub fn dirname(path: &str) -> String {
    let normalized = normalize(path);
    match normalized.rfind('/') {
        Some(idx) => normalized[..idx].to_owned(),
        None => String::new(),
    }
}

/// Resolve `specifier` relative to the file at `importer`, probing
/// [`RESOLVE_SUFFIXES`] in order. Returns the first path present in `files`.
#[must_use]
pub fn resolve_local(specifier: &str, importer: &str, files: &VirtualFileMap) -> Option<String> {
    let base = normalize(&format!("{}/{}", dirname(importer), specifier));
    RESOLVE_SUFFIXES.iter().find_map(|suffix| {
        let candidate = if base.is_empty() {
            normalize(suffix)
        } else {
            format!("{base}{suffix}")
        };
        (!candidate.is_empty() && files.contains(&candidate)).then_some(candidate)
    })
}

/// Loader-relevant extension of a project path (`"tsx"`, `"css"`, ...).
#[must_use]
pub fn extension(path: &str) -> Option<&str> {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rsplit_once('.').map(|(_, ext)| ext).filter(|ext| !ext.is_empty())
}

#[cfg(test)]
#[path = "vfs_test.rs"]
mod tests;
