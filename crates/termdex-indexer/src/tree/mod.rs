//! Ordered term tree.
//!
//! An unbalanced binary search tree of [`TermRecord`]s ordered by
//! case-insensitive key, stored in an arena and rooted at a fixed sentinel
//! key. Inserting keys in sorted order degrades it to a linked list, so every
//! operation is O(n) in the worst case. All walks are iterative so a
//! degenerate tree never overflows the stack.
//!
//! The sentinel node carries no documents. Records without documents are
//! placeholders and are skipped by [`TermTree::find`] and
//! [`TermTree::search`]; if data later produces the sentinel key, it fills
//! in like any other term.

mod snapshot;

pub use snapshot::TreeSnapshot;

use crate::document::{fold_key, TermRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Index of a node in the tree arena.
pub type NodeId = usize;

/// Default root key.
pub const DEFAULT_SENTINEL_KEY: &str = "mn";

/// A node in the term tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermNode {
    /// Arena index
    pub id: NodeId,
    /// The term stored at this node
    pub value: TermRecord,
    /// Subtree of smaller keys
    pub left: Option<NodeId>,
    /// Subtree of larger keys
    pub right: Option<NodeId>,
    /// Parent node (None for root)
    pub parent: Option<NodeId>,
}

/// Where a key lives, or where it would be attached.
enum Slot {
    Found(NodeId),
    Vacant { parent: NodeId, side: Ordering },
}

/// The term index.
#[derive(Debug, Clone)]
pub struct TermTree {
    nodes: Vec<TermNode>,
    root_id: NodeId,
}

impl TermTree {
    /// Create a tree holding only the sentinel root.
    pub fn new(sentinel_key: impl Into<String>) -> Self {
        let root = TermNode {
            id: 0,
            value: TermRecord::new(sentinel_key),
            left: None,
            right: None,
            parent: None,
        };

        Self {
            nodes: vec![root],
            root_id: 0,
        }
    }

    /// The root (sentinel) node.
    pub fn root(&self) -> &TermNode {
        &self.nodes[self.root_id]
    }

    /// Get a node by ID.
    pub fn get(&self, id: NodeId) -> Option<&TermNode> {
        self.nodes.get(id)
    }

    /// Number of nodes, sentinel included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of discovered terms (nodes with at least one document).
    pub fn term_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.value.is_empty()).count()
    }

    /// Number of discovered terms.
    pub fn len(&self) -> usize {
        self.term_count()
    }

    /// True when nothing but placeholders is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a term, or merge it into the node with an equal key.
    ///
    /// Returns `true` if a new node was created.
    pub fn insert_or_merge(&mut self, term: TermRecord) -> bool {
        match self.locate(&term.key) {
            Slot::Found(id) => {
                self.nodes[id].value.merge(term.documents);
                false
            }
            Slot::Vacant { parent, side } => {
                let id = self.nodes.len();
                self.nodes.push(TermNode {
                    id,
                    value: term,
                    left: None,
                    right: None,
                    parent: Some(parent),
                });

                let parent = &mut self.nodes[parent];
                if side == Ordering::Less {
                    parent.left = Some(id);
                } else {
                    parent.right = Some(id);
                }
                true
            }
        }
    }

    /// Exact case-insensitive lookup.
    pub fn find(&self, key: &str) -> Option<&TermRecord> {
        self.find_node(key)
            .map(|n| &n.value)
            .filter(|t| !t.is_empty())
    }

    /// Exact lookup that also returns placeholder nodes.
    pub fn find_node(&self, key: &str) -> Option<&TermNode> {
        match self.locate(key) {
            Slot::Found(id) => self.get(id),
            Slot::Vacant { .. } => None,
        }
    }

    /// Every term whose key contains `needle`, ignoring case, in key order.
    pub fn search(&self, needle: &str) -> Vec<&TermRecord> {
        let needle = fold_key(needle);
        self.terms()
            .filter(|t| fold_key(&t.key).contains(&needle))
            .collect()
    }

    /// Discovered terms in key order.
    pub fn terms(&self) -> impl Iterator<Item = &TermRecord> {
        self.in_order().map(|n| &n.value).filter(|t| !t.is_empty())
    }

    /// In-order walk over every node, sentinel included.
    pub fn in_order(&self) -> InOrder<'_> {
        InOrder {
            tree: self,
            stack: Vec::new(),
            current: Some(self.root_id),
        }
    }

    /// Length of the longest root-to-leaf path, counted in nodes.
    pub fn height(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(self.root_id, 1)];

        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            let node = &self.nodes[id];
            for child in [node.left, node.right].into_iter().flatten() {
                stack.push((child, depth + 1));
            }
        }

        max_depth
    }

    /// A serializable copy of the whole tree.
    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            root_id: self.root_id,
            node_count: self.node_count(),
            term_count: self.term_count(),
            height: self.height(),
            nodes: self.nodes.clone(),
        }
    }

    fn locate(&self, key: &str) -> Slot {
        let mut current = self.root_id;

        loop {
            let node = &self.nodes[current];
            let next = match node.value.compare_key(key).reverse() {
                Ordering::Equal => return Slot::Found(current),
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };

            match next {
                Some(id) => current = id,
                None => {
                    return Slot::Vacant {
                        parent: current,
                        side: node.value.compare_key(key).reverse(),
                    }
                }
            }
        }
    }
}

impl Default for TermTree {
    fn default() -> Self {
        Self::new(DEFAULT_SENTINEL_KEY)
    }
}

/// Iterative in-order traversal.
pub struct InOrder<'a> {
    tree: &'a TermTree,
    stack: Vec<NodeId>,
    current: Option<NodeId>,
}

impl<'a> Iterator for InOrder<'a> {
    type Item = &'a TermNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.current {
            self.stack.push(id);
            self.current = self.tree.nodes[id].left;
        }

        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id];
        self.current = node.right;
        Some(node)
    }
}
