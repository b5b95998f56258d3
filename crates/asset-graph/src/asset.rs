// SPDX-License-Identifier: AGPL-3.0-or-later
//! The producer contract
//!
//! An [`Asset`] declares the identities it depends on, computes its value
//! from those dependencies once they are resolved, can repopulate itself
//! from previously persisted files, and exposes the files it emits.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AssetError, Result};
use crate::fetch::FileFetcher;

/// Stable identity of a producer within one resolution pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(&'static str);

impl AssetId {
    /// Create an identity from a static name
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The identity as a string slice
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.0)
    }
}

/// A file artifact: a stable relative path and its full content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// Relative path, `/`-separated
    pub path: String,

    /// Materialized content
    pub data: Vec<u8>,
}

impl File {
    /// Create a new file artifact
    pub fn new(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
        }
    }

    /// Final path component
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Upcasting support so resolved producers can be read back as their
/// concrete types.
pub trait AsAny: Any + Send + Sync {
    /// Borrow as `Any`
    fn as_any(&self) -> &dyn Any;

    /// Convert a shared handle into a shared `Any`
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A node of the dependency graph
pub trait Asset: AsAny {
    /// Identity of this producer
    fn id(&self) -> AssetId;

    /// Human friendly name
    fn name(&self) -> &str;

    /// Identities this producer reads from, in declaration order.
    ///
    /// Must not depend on any state the producer acquires while resolving.
    fn dependencies(&self) -> Vec<AssetId> {
        Vec::new()
    }

    /// Compute the value from the resolved dependencies
    fn synthesize(&mut self, parents: &Parents) -> Result<()>;

    /// Repopulate from persisted files.
    ///
    /// Returns `Ok(false)` when nothing matching was persisted.
    fn restore(&mut self, fetcher: &dyn FileFetcher) -> Result<bool> {
        let _ = fetcher;
        Ok(false)
    }

    /// Files emitted by this producer
    fn files(&self) -> &[File] {
        &[]
    }
}

/// Read-only view of the resolved dependencies of one producer
pub struct Parents {
    owner: AssetId,
    resolved: HashMap<AssetId, Arc<dyn Asset>>,
}

impl Parents {
    pub(crate) fn new(owner: AssetId, resolved: HashMap<AssetId, Arc<dyn Asset>>) -> Self {
        Self { owner, resolved }
    }

    /// Borrow a resolved dependency as its concrete type
    pub fn get<T: Asset>(&self, id: AssetId) -> Result<&T> {
        let asset: &dyn Asset = &**self.lookup(id)?;
        asset.as_any().downcast_ref::<T>().ok_or_else(|| {
            AssetError::synthesis(
                self.owner,
                format!("dependency '{}' is not a {}", id, std::any::type_name::<T>()),
            )
        })
    }

    /// Files emitted by a resolved dependency
    pub fn files(&self, id: AssetId) -> Result<&[File]> {
        Ok(self.lookup(id)?.files())
    }

    fn lookup(&self, id: AssetId) -> Result<&Arc<dyn Asset>> {
        self.resolved.get(&id).ok_or_else(|| {
            AssetError::synthesis(self.owner, format!("'{}' is not a declared dependency", id))
        })
    }
}
