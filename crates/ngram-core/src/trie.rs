//! Prefix tree over token sequences carrying n-gram log probabilities.
//!
//! Nodes live in a flat arena and are addressed by `NodeId`. A node at depth
//! `n` represents an n-gram; it carries an `NgramEntry` only if that exact
//! n-gram was observed. Most nodes have a single child, so the child table
//! starts as an inline pair and is promoted to a hash map on the second key.

use rustc_hash::FxHashMap;

use crate::error::TrieError;
use crate::symbol::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// Log probability and backoff weight of one observed n-gram (base 10).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NgramEntry {
    pub log_prob: f32,
    pub backoff: f32,
}

impl NgramEntry {
    pub fn new(log_prob: f32, backoff: f32) -> Self {
        Self { log_prob, backoff }
    }
}

#[derive(Debug)]
enum Children {
    Empty,
    One(Symbol, NodeId),
    Many(FxHashMap<Symbol, NodeId>),
}

#[derive(Debug)]
struct Node {
    entry: Option<NgramEntry>,
    children: Children,
}

impl Node {
    fn new(entry: Option<NgramEntry>) -> Self {
        Self {
            entry,
            children: Children::Empty,
        }
    }
}

#[derive(Debug)]
pub struct BackoffTrie {
    nodes: Vec<Node>,
    max_depth: usize,
    entry_count: usize,
}

impl BackoffTrie {
    /// The empty history.
    pub const ROOT: NodeId = NodeId(0);

    /// An empty trie that refuses paths longer than `max_depth`.
    pub fn new(max_depth: usize) -> Self {
        Self {
            nodes: vec![Node::new(None)],
            max_depth,
            entry_count: 0,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Number of nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes carrying an entry.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn child(&self, node: NodeId, token: Symbol) -> Option<NodeId> {
        match &self.nodes[node.0 as usize].children {
            Children::Empty => None,
            Children::One(key, child) => (*key == token).then_some(*child),
            Children::Many(map) => map.get(&token).copied(),
        }
    }

    pub fn has_child(&self, node: NodeId, token: Symbol) -> bool {
        self.child(node, token).is_some()
    }

    pub fn entry(&self, node: NodeId) -> Option<&NgramEntry> {
        self.nodes[node.0 as usize].entry.as_ref()
    }

    /// Walk `path` from the root.
    pub fn node_at(&self, path: &[Symbol]) -> Option<NodeId> {
        path.iter()
            .try_fold(Self::ROOT, |node, &token| self.child(node, token))
    }

    /// Entry for exactly `path`; `None` if the node or its entry is missing.
    pub fn entry_at(&self, path: &[Symbol]) -> Option<&NgramEntry> {
        self.node_at(path).and_then(|node| self.entry(node))
    }

    /// Walk `path`, creating entry-less nodes as needed.
    pub fn find_or_insert(&mut self, path: &[Symbol]) -> Result<NodeId, TrieError> {
        self.check_depth(path.len())?;
        let mut node = Self::ROOT;
        for &token in path {
            node = match self.child(node, token) {
                Some(child) => child,
                None => self.push_child(node, token, None),
            };
        }
        Ok(node)
    }

    /// Attach `entry` at `path`, creating any missing intermediate nodes.
    pub fn insert_path(&mut self, path: &[Symbol], entry: NgramEntry) -> Result<NodeId, TrieError> {
        let node = self.find_or_insert(path)?;
        self.set_entry(node, entry);
        Ok(node)
    }

    /// Attach a batch of sibling n-grams under `prefix`, walking the prefix
    /// once. A key already present under the prefix has its entry replaced.
    pub fn add_children(
        &mut self,
        prefix: &[Symbol],
        batch: &[(Symbol, NgramEntry)],
    ) -> Result<(), TrieError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.check_depth(prefix.len() + 1)?;
        let parent = self.find_or_insert(prefix)?;

        let slot = &mut self.nodes[parent.0 as usize].children;
        *slot = match std::mem::replace(slot, Children::Empty) {
            Children::Empty if batch.len() > 1 => Children::Many(
                FxHashMap::with_capacity_and_hasher(batch.len(), Default::default()),
            ),
            Children::Many(mut map) => {
                map.reserve(batch.len());
                Children::Many(map)
            }
            other => other,
        };

        for &(key, entry) in batch {
            match self.child(parent, key) {
                Some(existing) => self.set_entry(existing, entry),
                None => {
                    self.push_child(parent, key, Some(entry));
                    self.entry_count += 1;
                }
            }
        }
        Ok(())
    }

    fn check_depth(&self, len: usize) -> Result<(), TrieError> {
        if len > self.max_depth {
            return Err(TrieError::TooDeep {
                len,
                max: self.max_depth,
            });
        }
        Ok(())
    }

    fn set_entry(&mut self, node: NodeId, entry: NgramEntry) {
        let slot = &mut self.nodes[node.0 as usize].entry;
        if slot.is_none() {
            self.entry_count += 1;
        }
        *slot = Some(entry);
    }

    fn push_child(&mut self, parent: NodeId, key: Symbol, entry: Option<NgramEntry>) -> NodeId {
        let child = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(entry));
        let slot = &mut self.nodes[parent.0 as usize].children;
        *slot = match std::mem::replace(slot, Children::Empty) {
            Children::Empty => Children::One(key, child),
            Children::One(first_key, first_child) => {
                let mut map = FxHashMap::default();
                map.insert(first_key, first_child);
                map.insert(key, child);
                Children::Many(map)
            }
            Children::Many(mut map) => {
                map.insert(key, child);
                Children::Many(map)
            }
        };
        child
    }
}
