// SPDX-License-Identifier: AGPL-3.0-or-later
//! Access to previously persisted files

use std::collections::BTreeMap;

use glob::{MatchOptions, Pattern};

use crate::asset::File;
use crate::error::{AssetError, Result};

/// Lookup of persisted files by exact path or by pattern
pub trait FileFetcher {
    /// Fetch the file stored at `path`, if any
    fn fetch_by_name(&self, path: &str) -> Option<File>;

    /// Fetch every file whose path matches the shell pattern `pattern`.
    ///
    /// Wildcards and character classes never match `/`. Results are
    /// ordered by path. A malformed pattern is a `PersistedState` error.
    fn fetch_by_pattern(&self, pattern: &str) -> Result<Vec<File>>;
}

/// In-memory snapshot of an output directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedFiles {
    files: BTreeMap<String, Vec<u8>>,
}

impl PersistedFiles {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from file artifacts
    pub fn from_files<I>(files: I) -> Self
    where
        I: IntoIterator<Item = File>,
    {
        let mut snapshot = Self::new();
        for file in files {
            snapshot.insert(file);
        }
        snapshot
    }

    /// Add or replace a file
    pub fn insert(&mut self, file: File) {
        self.files.insert(file.path, file.data);
    }

    /// Number of files in the snapshot
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the snapshot holds no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileFetcher for PersistedFiles {
    fn fetch_by_name(&self, path: &str) -> Option<File> {
        self.files
            .get(path)
            .map(|data| File::new(path, data.clone()))
    }

    fn fetch_by_pattern(&self, pattern: &str) -> Result<Vec<File>> {
        let compiled =
            Pattern::new(pattern).map_err(|error| AssetError::persisted(pattern, error))?;
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::default()
        };

        Ok(self
            .files
            .iter()
            .filter(|(path, _)| compiled.matches_with(path, options))
            .map(|(path, data)| File::new(path.clone(), data.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> PersistedFiles {
        PersistedFiles::from_files(vec![
            File::new("manifests/cluster-config.yaml", "kind: ConfigMap"),
            File::new("manifests/pull.json", "{}"),
            File::new("manifests/nested/deep.yaml", ""),
            File::new("tls/root-ca.crt", "CERT"),
            File::new("tls/root-ca.key", "KEY"),
            File::new("tls/etcd-ca.crt", "CERT"),
            File::new("metadata.json", "{}"),
        ])
    }

    fn paths(files: &[File]) -> Vec<&str> {
        files.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn test_fetch_by_name() {
        let snapshot = snapshot();
        let file = snapshot.fetch_by_name("tls/root-ca.crt").unwrap();
        assert_eq!(file.data, b"CERT");
        assert!(snapshot.fetch_by_name("tls/missing.crt").is_none());
    }

    #[test]
    fn test_fetch_by_pattern_single_level() {
        let files = snapshot().fetch_by_pattern("manifests/*").unwrap();
        assert_eq!(paths(&files), vec!["manifests/cluster-config.yaml", "manifests/pull.json"]);
    }

    #[test]
    fn test_fetch_by_pattern_no_match() {
        assert!(snapshot().fetch_by_pattern("openshift/*").unwrap().is_empty());
        assert!(PersistedFiles::new().fetch_by_pattern("manifests/*").unwrap().is_empty());
    }

    #[test]
    fn test_wildcards_stay_within_one_segment() {
        let snapshot = snapshot();
        assert_eq!(paths(&snapshot.fetch_by_pattern("*").unwrap()), vec!["metadata.json"]);
        assert_eq!(
            paths(&snapshot.fetch_by_pattern("tls/etcd-?a.crt").unwrap()),
            vec!["tls/etcd-ca.crt"]
        );
        assert!(snapshot.fetch_by_pattern("manifests*").unwrap().is_empty());
    }

    #[test]
    fn test_character_class_pattern() {
        let files = snapshot().fetch_by_pattern("tls/[er]*.crt").unwrap();
        assert_eq!(paths(&files), vec!["tls/etcd-ca.crt", "tls/root-ca.crt"]);

        let files = snapshot().fetch_by_pattern("tls/root-ca.[!c]*").unwrap();
        assert_eq!(paths(&files), vec!["tls/root-ca.key"]);
    }

    #[test]
    fn test_escaped_wildcard_matches_literally() {
        let snapshot = PersistedFiles::from_files(vec![
            File::new("manifests/a*b.yaml", ""),
            File::new("manifests/axb.yaml", ""),
        ]);
        let files = snapshot.fetch_by_pattern("manifests/a[*]b.yaml").unwrap();
        assert_eq!(paths(&files), vec!["manifests/a*b.yaml"]);
    }

    #[test]
    fn test_malformed_pattern_is_persisted_state_error() {
        let error = snapshot().fetch_by_pattern("manifests/[").unwrap_err();
        match error {
            AssetError::PersistedState { path, .. } => assert_eq!(path, "manifests/["),
            other => panic!("unexpected error: {}", other),
        }
    }
}
