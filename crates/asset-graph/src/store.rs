// SPDX-License-Identifier: AGPL-3.0-or-later
//! Loading and persisting file sets under an output directory

use std::path::{Component, Path};

use tokio::fs;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::asset::File;
use crate::error::{AssetError, Result};
use crate::fetch::PersistedFiles;

/// Snapshot every regular file under `dir`.
///
/// A directory that does not exist yields an empty snapshot.
pub async fn load_dir<P: AsRef<Path>>(dir: P) -> Result<PersistedFiles> {
    let dir = dir.as_ref();
    let mut snapshot = PersistedFiles::new();

    if !dir.exists() {
        debug!(dir = %dir.display(), "Output directory does not exist yet");
        return Ok(snapshot);
    }

    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|error| {
            AssetError::persisted(dir.display().to_string(), error.to_string())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(dir).map_err(|error| {
            AssetError::persisted(entry.path().display().to_string(), error.to_string())
        })?;
        let data = fs::read(entry.path()).await?;
        snapshot.insert(File::new(relative_path(relative), data));
    }

    debug!(dir = %dir.display(), files = snapshot.len(), "Loaded persisted files");
    Ok(snapshot)
}

/// Write a file set under `dir`, creating parent directories as needed
pub async fn persist<P: AsRef<Path>>(dir: P, files: &[File]) -> Result<()> {
    let dir = dir.as_ref();

    for file in files {
        let relative = Path::new(&file.path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AssetError::persisted(
                file.path.clone(),
                "path must be relative and must not leave the output directory",
            ));
        }

        let target = dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, &file.data).await?;
    }

    info!(dir = %dir.display(), files = files.len(), "Persisted file set");
    Ok(())
}

fn relative_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
