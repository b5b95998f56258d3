// SPDX-License-Identifier: AGPL-3.0-or-later
//! Merging of file lists into one deterministically ordered output set

use std::collections::HashSet;

use crate::asset::File;
use crate::error::{AssetError, Result};

/// Collects files from several producers into a single output set
#[derive(Debug, Default)]
pub struct FileSetMerger {
    files: Vec<File>,
}

impl FileSetMerger {
    /// Create an empty merger
    pub fn new() -> Self {
        Self::default()
    }

    /// Append files in the order given
    pub fn extend<I>(&mut self, files: I) -> &mut Self
    where
        I: IntoIterator<Item = File>,
    {
        self.files.extend(files);
        self
    }

    /// Sort by path and reject duplicate paths
    pub fn finish(self) -> Result<Vec<File>> {
        let mut files = self.files;
        sort_files(&mut files);

        let mut seen = HashSet::with_capacity(files.len());
        for file in &files {
            if !seen.insert(file.path.as_str()) {
                return Err(AssetError::DuplicateFile {
                    path: file.path.clone(),
                });
            }
        }

        Ok(files)
    }
}

/// Sort files byte-wise by path
pub fn sort_files(files: &mut [File]) {
    files.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));
}

/// BLAKE3 digest over the paths and contents of an ordered file set
pub fn digest(files: &[File]) -> String {
    let mut hasher = blake3::Hasher::new();
    for file in files {
        hasher.update(&(file.path.len() as u64).to_le_bytes());
        hasher.update(file.path.as_bytes());
        hasher.update(&(file.data.len() as u64).to_le_bytes());
        hasher.update(&file.data);
    }
    hasher.finalize().to_hex().to_string()
}
