//! Zoom tree: lazily created children, addressed from the root by cell-index paths.
//!
//! The root exclusively owns the whole tree. A child at index `i` always covers cell `i`
//! of its parent, at most one child exists per index, and children are never removed.

use std::collections::btree_map::Entry;

use crate::GridNode;

impl GridNode {
    /// The child covering cell `index`, if it was ever created.
    pub fn child(&self, index: usize) -> Option<&GridNode> {
        self.children.get(&index)
    }

    /// Existing children, ordered by cell index.
    pub fn children(&self) -> impl Iterator<Item = (usize, &GridNode)> {
        self.children.iter().map(|(&i, c)| (i, c))
    }

    /// The child covering cell `index`, created through [`zoom`](Self::zoom) on first use.
    pub fn child_or_zoom(&mut self, index: usize) -> &mut GridNode {
        let params = self.params;
        let (lo, hi) = self.cell_bounds(index);
        match self.children.entry(index) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                tracing::debug!(cell = index, min = lo, max = hi, "zoom: new child");
                e.insert(GridNode::new(params, lo, hi))
            }
        }
    }

    /// Follow `path` (one cell index per level) down from this node.
    pub fn descendant(&self, path: &[usize]) -> Option<&GridNode> {
        let mut node = self;
        for i in path {
            node = node.children.get(i)?;
        }
        Some(node)
    }

    pub(crate) fn descendant_mut(&mut self, path: &[usize]) -> Option<&mut GridNode> {
        let mut node = self;
        for i in path {
            node = node.children.get_mut(i)?;
        }
        Some(node)
    }

    /// Number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children.values().map(GridNode::node_count).sum::<usize>()
    }

    /// Levels below this node; a leaf has depth 0.
    pub fn depth(&self) -> usize {
        self.children
            .values()
            .map(|c| 1 + c.depth())
            .max()
            .unwrap_or(0)
    }

    /// Observations recorded anywhere in this subtree.
    pub fn subtree_pulls(&self) -> u64 {
        self.total_pulls() + self.children.values().map(GridNode::subtree_pulls).sum::<u64>()
    }

    /// Visit every node of the subtree depth-first, with its path relative to this node.
    pub fn visit<'a, F: FnMut(&[usize], &'a GridNode)>(&'a self, mut f: F) {
        fn go<'a, F>(node: &'a GridNode, path: &mut Vec<usize>, f: &mut F)
        where
            F: FnMut(&[usize], &'a GridNode),
        {
            f(path, node);
            for (&i, c) in &node.children {
                path.push(i);
                go(c, path, f);
                path.pop();
            }
        }
        let mut path = Vec::new();
        go(self, &mut path, &mut f);
    }
}
