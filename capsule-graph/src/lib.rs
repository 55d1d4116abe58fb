//! In-memory parent/child index over a capsule's locally present records.
//!
//! A [`LogGraph`] is rebuilt from scratch on every [`LogGraph::refresh`]
//! rather than mutated in place — the resulting snapshot can be shared
//! freely across threads, which is what lets a reconciliation exchange
//! pin a consistent view of the graph for its whole lifetime even while
//! a background refresh replaces the daemon's "current" graph underneath
//! it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use capsule_common::Hash;
use capsule_store::LogStore;

/// The in-memory parent/child index derived from a [`LogStore`] scan.
///
/// Grounded on `common/src/block/tree.rs`'s split between a read-only
/// `BlockReader` and a tree that gets rebuilt (`BlockTree::import_blocks`),
/// generalized here from a single best chain to a forest: every
/// chain-start is a logical begin, every childless node a logical end.
#[derive(Debug, Clone, Default)]
pub struct LogGraph {
    nodes: HashSet<Hash>,
    backward: HashMap<Hash, Hash>,
    forward: HashMap<Hash, HashSet<Hash>>,
    begins: HashSet<Hash>,
    ends: HashSet<Hash>,
}

impl LogGraph {
    /// An empty graph, as if built from a store with no records.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rebuild the graph from a full scan of `store`. O(N) in record
    /// count; the store is consulted for metadata only, never `value`.
    pub fn refresh<S: LogStore + ?Sized>(store: &S) -> Result<Self, capsule_common::Error> {
        let metadata = store.read_all_metadata()?;

        let mut nodes = HashSet::with_capacity(metadata.len());
        let mut backward = HashMap::with_capacity(metadata.len());
        let mut forward: HashMap<Hash, HashSet<Hash>> = HashMap::new();

        for m in &metadata {
            nodes.insert(m.hash);
            backward.insert(m.hash, m.prev_hash);
            forward.entry(m.prev_hash).or_default().insert(m.hash);
        }

        let begins = nodes
            .iter()
            .copied()
            .filter(|h| {
                let parent = backward.get(h).copied().unwrap_or(Hash::NULL);
                parent.is_null() || !nodes.contains(&parent)
            })
            .collect();

        let ends = nodes
            .iter()
            .copied()
            .filter(|h| forward.get(h).map(|children| children.is_empty()).unwrap_or(true))
            .collect();

        let begins: HashSet<Hash> = begins;
        let ends: HashSet<Hash> = ends;

        log::debug!(
            target: "capsule::graph",
            "refreshed graph: {} nodes, {} begins, {} ends",
            nodes.len(),
            begins.len(),
            ends.len(),
        );

        Ok(Self {
            nodes,
            backward,
            forward,
            begins,
            ends,
        })
    }

    /// Every hash present locally.
    pub fn nodes(&self) -> &HashSet<Hash> {
        &self.nodes
    }

    /// Every node's declared parent, total over `nodes()`.
    pub fn backward(&self) -> &HashMap<Hash, Hash> {
        &self.backward
    }

    /// Parent to children, inverted from `backward()`.
    pub fn forward(&self) -> &HashMap<Hash, HashSet<Hash>> {
        &self.forward
    }

    /// Locally present hashes whose parent is null or not locally present.
    pub fn begins(&self) -> &HashSet<Hash> {
        &self.begins
    }

    /// Locally present hashes with no locally present child.
    pub fn ends(&self) -> &HashSet<Hash> {
        &self.ends
    }

    /// True if `hash` is locally present.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.nodes.contains(hash)
    }

    /// The parent of `hash`, if `hash` is locally present.
    pub fn parent_of(&self, hash: &Hash) -> Option<Hash> {
        self.backward.get(hash).copied()
    }

    /// The children of `hash`, if any.
    pub fn children_of(&self, hash: &Hash) -> impl Iterator<Item = &Hash> {
        self.forward.get(hash).into_iter().flatten()
    }

    /// Undirected BFS over `forward ∪ backward` starting at `start`,
    /// returning every locally-present hash reachable from it. Empty if
    /// `start` itself isn't locally present.
    pub fn connected_component(&self, start: &Hash) -> HashSet<Hash> {
        let mut visited = HashSet::new();
        if !self.nodes.contains(start) {
            return visited;
        }

        let mut queue = VecDeque::new();
        queue.push_back(*start);
        visited.insert(*start);

        while let Some(current) = queue.pop_front() {
            if let Some(parent) = self.backward.get(&current) {
                if self.nodes.contains(parent) && visited.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
            if let Some(children) = self.forward.get(&current) {
                for child in children {
                    if visited.insert(*child) {
                        queue.push_back(*child);
                    }
                }
            }
        }

        visited
    }

    /// Walk the `backward` chain from `start` up to (and including) the
    /// nearest enclosing logical begin. Returns the hashes visited, in
    /// walk order (`start` first). Empty if `start` isn't locally
    /// present.
    ///
    /// Used by the graph-diff policy to collect the ancestor frontier
    /// owed to a peer whose begin sits inside our chain.
    pub fn walk_to_begin(&self, start: &Hash) -> Vec<Hash> {
        let mut walked = Vec::new();
        if !self.nodes.contains(start) {
            return walked;
        }
        let mut current = *start;
        loop {
            walked.push(current);
            if self.begins.contains(&current) {
                break;
            }
            match self.backward.get(&current) {
                Some(parent) if self.nodes.contains(parent) => current = *parent,
                _ => break,
            }
        }
        walked
    }

    /// Walk the `forward` tree from `start` out to every reachable
    /// logical end. Returns the union of all hashes visited along every
    /// downstream branch (order unspecified).
    ///
    /// Used by the graph-diff policy to collect the descendant frontier
    /// owed to a peer whose end sits inside our chain. A chain can fan
    /// out below `start`, so every branch is walked, not just the first.
    pub fn walk_to_ends(&self, start: &Hash) -> HashSet<Hash> {
        let mut walked = HashSet::new();
        if !self.nodes.contains(start) {
            return walked;
        }
        let mut queue = VecDeque::new();
        queue.push_back(*start);
        walked.insert(*start);
        while let Some(current) = queue.pop_front() {
            if let Some(children) = self.forward.get(&current) {
                for child in children {
                    if walked.insert(*child) {
                        queue.push_back(*child);
                    }
                }
            }
        }
        walked
    }
}

/// The daemon's "current graph" pointer: a refresh swaps in a freshly
/// rebuilt graph as one atomic pointer update, while an exchange
/// that pinned the old `Arc<LogGraph>` keeps reasoning over it until it
/// finishes. Readers never block a refresh and a refresh never blocks a
/// reader.
#[derive(Debug, Default)]
pub struct GraphHandle {
    current: RwLock<Arc<LogGraph>>,
}

impl GraphHandle {
    /// Wrap an already-built graph.
    pub fn new(graph: LogGraph) -> Self {
        Self {
            current: RwLock::new(Arc::new(graph)),
        }
    }

    /// Pin the graph as it stands right now. Cheap: an `Arc` clone.
    pub fn snapshot(&self) -> Arc<LogGraph> {
        self.current.read().unwrap().clone()
    }

    /// Rebuild from `store` and swap it in as the current graph.
    pub fn refresh<S: LogStore + ?Sized>(&self, store: &S) -> Result<(), capsule_common::Error> {
        let rebuilt = LogGraph::refresh(store)?;
        *self.current.write().unwrap() = Arc::new(rebuilt);
        Ok(())
    }
}
