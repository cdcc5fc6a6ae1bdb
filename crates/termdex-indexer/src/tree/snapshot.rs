//! Serializable tree image for diagnostics.

use super::{NodeId, TermNode};
use serde::{Deserialize, Serialize};

/// A flat copy of the term tree.
///
/// Nodes are listed by arena index and linked through `left`/`right`, so a
/// degenerate tree serializes without deep recursion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSnapshot {
    /// Index of the sentinel root
    pub root_id: NodeId,
    /// Total nodes, sentinel included
    pub node_count: usize,
    /// Nodes holding at least one document
    pub term_count: usize,
    /// Longest root-to-leaf path in nodes
    pub height: usize,
    /// Every node, by arena index
    pub nodes: Vec<TermNode>,
}

impl TreeSnapshot {
    /// The root node.
    pub fn root(&self) -> Option<&TermNode> {
        self.nodes.get(self.root_id)
    }
}

#[cfg(test)]
mod tests {
    use crate::document::{DocumentRecord, TermRecord};
    use crate::tree::TermTree;

    #[test]
    fn test_snapshot_mirrors_tree() {
        let mut tree = TermTree::default();
        tree.insert_or_merge(TermRecord::with_document(
            "alice",
            DocumentRecord::new("a.txt"),
        ));

        let snapshot = tree.snapshot();
        assert_eq!(snapshot.node_count, 2);
        assert_eq!(snapshot.term_count, 1);
        assert_eq!(snapshot.height, 2);
        assert_eq!(snapshot.root().unwrap().value.key, "mn");
        assert_eq!(snapshot.root().unwrap().left, Some(1));
    }

    #[test]
    fn test_snapshot_json_has_node_links() {
        let tree = TermTree::default();
        let json = serde_json::to_string(&tree.snapshot()).unwrap();
        assert!(json.contains("\"root_id\":0"));
        assert!(json.contains("\"left\":null"));
    }
}
