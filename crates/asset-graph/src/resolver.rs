// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dependency resolution with per-pass memoization
//!
//! A [`Resolver`] owns the producers of one pass. Resolving a producer
//! first plans a topological order over its transitive dependencies, so a
//! missing producer or a cycle is reported before anything runs, and then
//! materializes each planned producer exactly once: restored from the
//! persisted snapshot when possible, synthesized otherwise.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::asset::{Asset, AssetId, Parents};
use crate::error::{AssetError, Result, Step};
use crate::fetch::FileFetcher;

/// How a producer obtained its value during the pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Repopulated from persisted files
    Restored,
    /// Computed from its dependencies
    Synthesized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Resolves producers against a persisted snapshot
pub struct Resolver<'a> {
    /// Registered producers not yet materialized
    pending: HashMap<AssetId, Box<dyn Asset>>,

    /// Memoized results, immutable once inserted
    resolved: HashMap<AssetId, Arc<dyn Asset>>,

    /// How each resolved producer was materialized
    outcomes: HashMap<AssetId, Resolution>,

    /// Producers that must synthesize even if persisted state exists
    forced: HashSet<AssetId>,

    /// Previously persisted files
    fetcher: &'a dyn FileFetcher,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over an explicit producer set
    pub fn new<I>(assets: I, fetcher: &'a dyn FileFetcher) -> Result<Self>
    where
        I: IntoIterator<Item = Box<dyn Asset>>,
    {
        let mut pending = HashMap::new();
        for asset in assets {
            let id = asset.id();
            if pending.insert(id, asset).is_some() {
                return Err(AssetError::DuplicateProducer { id });
            }
        }

        Ok(Self {
            pending,
            resolved: HashMap::new(),
            outcomes: HashMap::new(),
            forced: HashSet::new(),
            fetcher,
        })
    }

    /// Skip restoration for `id`; it will always be synthesized
    pub fn force(&mut self, id: AssetId) -> &mut Self {
        self.forced.insert(id);
        self
    }

    /// How `id` was materialized, if it has been resolved
    pub fn resolution(&self, id: AssetId) -> Option<Resolution> {
        self.outcomes.get(&id).copied()
    }

    /// Order in which the unresolved part of `root`'s graph would run,
    /// dependencies first
    pub fn plan(&self, root: AssetId) -> Result<Vec<AssetId>> {
        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        let mut order = Vec::new();
        self.visit(root, root, &mut marks, &mut stack, &mut order)?;
        Ok(order)
    }

    fn visit(
        &self,
        id: AssetId,
        required_by: AssetId,
        marks: &mut HashMap<AssetId, Mark>,
        stack: &mut Vec<AssetId>,
        order: &mut Vec<AssetId>,
    ) -> Result<()> {
        if self.resolved.contains_key(&id) {
            return Ok(());
        }

        match marks.get(&id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                let start = stack.iter().position(|entry| *entry == id).unwrap_or(0);
                let mut path = stack[start..].to_vec();
                path.push(id);
                return Err(AssetError::Cycle { path });
            }
            None => {}
        }

        let asset = self
            .pending
            .get(&id)
            .ok_or(AssetError::MissingProducer { id, required_by })?;

        marks.insert(id, Mark::InProgress);
        stack.push(id);
        for dependency in asset.dependencies() {
            self.visit(dependency, id, marks, stack, order)?;
        }
        stack.pop();
        marks.insert(id, Mark::Done);
        order.push(id);

        Ok(())
    }

    /// Resolve `root` and everything it transitively depends on
    pub fn resolve(&mut self, root: AssetId) -> Result<Arc<dyn Asset>> {
        if let Some(asset) = self.resolved.get(&root) {
            return Ok(Arc::clone(asset));
        }

        let order = self.plan(root)?;
        info!(root = %root, producers = order.len(), "Resolving asset graph");

        for id in order {
            self.materialize(id)?;
        }

        self.resolved
            .get(&root)
            .cloned()
            .ok_or(AssetError::MissingProducer {
                id: root,
                required_by: root,
            })
    }

    /// Resolve `root` and read it back as its concrete type
    pub fn resolve_as<T: Asset>(&mut self, root: AssetId) -> Result<Arc<T>> {
        self.resolve(root)?
            .into_any()
            .downcast::<T>()
            .map_err(|_| {
                AssetError::synthesis(
                    root,
                    format!("resolved producer is not a {}", std::any::type_name::<T>()),
                )
            })
    }

    fn materialize(&mut self, id: AssetId) -> Result<()> {
        let mut asset = self.pending.remove(&id).ok_or(AssetError::MissingProducer {
            id,
            required_by: id,
        })?;

        let mut parents = HashMap::new();
        for dependency in asset.dependencies() {
            let resolved = self
                .resolved
                .get(&dependency)
                .ok_or(AssetError::MissingProducer {
                    id: dependency,
                    required_by: id,
                })?;
            parents.insert(dependency, Arc::clone(resolved));
        }
        let parents = Parents::new(id, parents);

        let restored = if self.forced.contains(&id) {
            false
        } else {
            asset
                .restore(self.fetcher)
                .map_err(|error| wrap(id, Step::Restore, error))?
        };

        let resolution = if restored {
            Resolution::Restored
        } else {
            asset
                .synthesize(&parents)
                .map_err(|error| wrap(id, Step::Synthesize, error))?;
            Resolution::Synthesized
        };

        debug!(
            asset = %id,
            name = asset.name(),
            resolution = ?resolution,
            files = asset.files().len(),
            "Resolved producer"
        );

        self.outcomes.insert(id, resolution);
        self.resolved.insert(id, Arc::from(asset));
        Ok(())
    }
}

fn wrap(asset: AssetId, step: Step, source: AssetError) -> AssetError {
    AssetError::Step {
        asset,
        step,
        source: Box::new(source),
    }
}
