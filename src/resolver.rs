//! Vault dependency resolution
//!
//! Decoded collections are staged in a [`PendingSet`] with their parent
//! *names* still unresolved. Resolution builds a vault graph where an edge
//! `a -> b` means "a collection in vault `a` has its parent in vault `b`",
//! orders the vaults so dependencies come first, and produces an
//! [`AttachPlan`] in which every parent precedes its children. Nothing
//! touches the destination store until the plan is applied.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, warn};

use crate::database::{short_path, Collection, CollectionStore, Vault};
use crate::error::{InterchangeError, Result};

/// A decoded collection whose parent link has not been made yet
#[derive(Debug, Clone)]
pub struct PendingCollection {
    pub collection: Collection,
    pub parent_name: Option<String>,
}

impl PendingCollection {
    pub fn new(collection: Collection, parent_name: Option<String>) -> Self {
        let parent_name = parent_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        Self {
            collection,
            parent_name,
        }
    }

    /// `ShortPath` of the parent; parents always share the child's class
    pub fn parent_path(&self) -> Option<String> {
        self.parent_name
            .as_deref()
            .map(|name| short_path(&self.collection.class, name))
    }
}

#[derive(Debug, Clone)]
pub struct PendingVault {
    pub vault: Vault,
    pub collections: Vec<PendingCollection>,
}

/// Graph node: one vault of the load set
#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub vault: String,
    /// Parent paths referenced from this vault that exist nowhere
    pub missing_parents: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Resolved,
    Unresolved,
}

/// Every collection decoded for one load, grouped by vault
#[derive(Debug, Default)]
pub struct PendingSet {
    vaults: Vec<PendingVault>,
    /// ShortPath -> index of the owning vault
    paths: HashMap<String, usize>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vault(&mut self, vault: Vault) -> usize {
        self.vaults.push(PendingVault {
            vault,
            collections: Vec::new(),
        });
        self.vaults.len() - 1
    }

    /// Stage a collection. Its path must be new to both this set and `existing`.
    pub fn add_collection(
        &mut self,
        vault: usize,
        pending: PendingCollection,
        existing: &CollectionStore,
    ) -> Result<()> {
        let path = pending.collection.short_path();
        if self.paths.contains_key(&path) || existing.contains_path(&path) {
            return Err(InterchangeError::DuplicateCollectionPath(path));
        }
        let slot = self
            .vaults
            .get_mut(vault)
            .ok_or_else(|| InterchangeError::Manifest(format!("no staged vault #{}", vault)))?;
        slot.collections.push(pending);
        self.paths.insert(path, vault);
        Ok(())
    }

    pub fn vaults(&self) -> &[PendingVault] {
        &self.vaults
    }

    /// Number of staged collections
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Vault dependency graph; node `i` is staged vault `i`
    pub fn dependency_graph(&self, existing: &CollectionStore) -> DiGraph<DependencyNode, ()> {
        let mut graph = DiGraph::with_capacity(self.vaults.len(), self.vaults.len());
        for pending in &self.vaults {
            graph.add_node(DependencyNode {
                vault: pending.vault.name.clone(),
                missing_parents: Vec::new(),
            });
        }

        for (index, pending) in self.vaults.iter().enumerate() {
            let node = NodeIndex::new(index);
            for collection in &pending.collections {
                let Some(parent) = collection.parent_path() else {
                    continue;
                };
                match self.paths.get(&parent) {
                    Some(&owner) if owner != index => {
                        graph.update_edge(node, NodeIndex::new(owner), ());
                    }
                    Some(_) => {}
                    None if existing.contains_path(&parent) => {}
                    None => {
                        warn!(
                            vault = %pending.vault.name,
                            collection = %collection.collection.short_path(),
                            parent = %parent,
                            "parent collection not found"
                        );
                        graph[node].missing_parents.push(parent);
                    }
                }
            }
        }
        graph
    }

    /// Order vaults dependencies-first and plan the attachment of every collection
    pub fn resolve(self, existing: &CollectionStore) -> Result<AttachPlan> {
        let graph = self.dependency_graph(existing);
        let (resolved, unresolved) = topological_order(&graph);

        if !unresolved.is_empty() {
            let mut seen = HashSet::new();
            let vaults = unresolved
                .into_iter()
                .map(|n| graph[n].vault.clone())
                .filter(|name| seen.insert(name.clone()))
                .collect();
            return Err(InterchangeError::UnresolvedVaultDependencies { vaults });
        }

        let order: Vec<usize> = resolved.iter().map(|n| n.index()).collect();
        debug!(
            order = ?order.iter().map(|&i| &self.vaults[i].vault.name).collect::<Vec<_>>(),
            "resolved vault order"
        );
        self.plan(&order, existing)
    }

    /// Attachment order: vaults in `order`; inside a vault, children wait for
    /// same-vault parents
    fn plan(self, order: &[usize], existing: &CollectionStore) -> Result<AttachPlan> {
        let staged = self.paths.len();
        let (declared, mut slots): (Vec<Vault>, Vec<Vec<Option<PendingCollection>>>) = self
            .vaults
            .into_iter()
            .map(|v| (v.vault, v.collections.into_iter().map(Some).collect()))
            .unzip();
        let mut placed: HashSet<String> = HashSet::with_capacity(staged);
        let mut steps = Vec::with_capacity(staged);
        let mut vaults = Vec::with_capacity(order.len());

        for &index in order {
            let mut waiting: Vec<usize> = (0..slots[index].len()).collect();
            while !waiting.is_empty() {
                let before = waiting.len();
                waiting.retain(|&i| {
                    let ready = match slots[index][i].as_ref().and_then(|p| p.parent_path()) {
                        None => true,
                        Some(parent) => placed.contains(&parent) || existing.contains_path(&parent),
                    };
                    if ready {
                        if let Some(pending) = slots[index][i].take() {
                            placed.insert(pending.collection.short_path());
                            steps.push(pending);
                        }
                    }
                    !ready
                });
                if waiting.len() == before {
                    let stuck = waiting
                        .first()
                        .and_then(|&i| slots[index][i].as_ref())
                        .map(|p| p.collection.short_path())
                        .unwrap_or_default();
                    return Err(InterchangeError::CyclicCollectionParent(stuck));
                }
            }
            vaults.push(declared[index].clone());
        }

        Ok(AttachPlan { vaults, steps })
    }
}

/// Iterative depth-first ordering. Returns `(resolved, unresolved)`, where
/// `resolved` lists every node after all of its dependencies. A node is
/// unresolved if it lies on a cycle, has a missing parent, or depends on an
/// unresolved node.
fn topological_order(graph: &DiGraph<DependencyNode, ()>) -> (Vec<NodeIndex>, Vec<NodeIndex>) {
    let count = graph.node_count();
    let mut marks = vec![Mark::Unvisited; count];
    let mut failed = vec![false; count];
    let mut resolved = Vec::with_capacity(count);
    let mut unresolved = Vec::new();

    let dependencies = |node: NodeIndex| {
        let mut deps: Vec<NodeIndex> = graph.neighbors(node).collect();
        deps.sort();
        deps
    };

    for start in graph.node_indices() {
        if marks[start.index()] != Mark::Unvisited {
            continue;
        }
        marks[start.index()] = Mark::Visiting;
        failed[start.index()] = !graph[start].missing_parents.is_empty();
        let mut stack = vec![(start, dependencies(start), 0usize)];

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            if let Some(&dep) = frame.1.get(frame.2) {
                frame.2 += 1;
                match marks[dep.index()] {
                    Mark::Unvisited => {
                        marks[dep.index()] = Mark::Visiting;
                        failed[dep.index()] = !graph[dep].missing_parents.is_empty();
                        stack.push((dep, dependencies(dep), 0));
                    }
                    // Back edge: the failure flows down the stack to `dep` as frames pop
                    Mark::Visiting | Mark::Unresolved => failed[node.index()] = true,
                    Mark::Resolved => {}
                }
                continue;
            }

            stack.pop();
            if failed[node.index()] {
                marks[node.index()] = Mark::Unresolved;
                unresolved.push(node);
                if let Some((parent, _, _)) = stack.last() {
                    failed[parent.index()] = true;
                }
            } else {
                marks[node.index()] = Mark::Resolved;
                resolved.push(node);
            }
        }
    }

    (resolved, unresolved)
}

/// Validated attachment order for one load
#[derive(Debug)]
pub struct AttachPlan {
    /// Vaults in dependency order
    pub vaults: Vec<Vault>,
    /// Collections in attachment order; parents precede children
    pub steps: Vec<PendingCollection>,
}

impl AttachPlan {
    pub fn vault_order(&self) -> impl Iterator<Item = &str> {
        self.vaults.iter().map(|v| v.name.as_str())
    }

    /// Insert every collection into `store`, linking it under its parent
    pub fn apply(self, store: &mut CollectionStore) -> Result<usize> {
        let count = self.steps.len();
        for pending in self.steps {
            let parent = match pending.parent_path() {
                Some(path) => Some(
                    store
                        .find_by_path(&path)
                        .ok_or(InterchangeError::CollectionNotFound(path))?,
                ),
                None => None,
            };
            store.insert(pending.collection, parent)?;
        }
        Ok(count)
    }
}
