//! Positional node paths.
//!
//! Nodes have no identity beyond their position: a [`NodePath`] is the
//! sequence of child indices from the forest root. Lexicographic order of
//! paths is pre-order traversal order of the tree.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sequence of child indices from the forest root identifying one node.
///
/// The empty path denotes the forest itself (the parent of the root nodes).
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// The empty path (the forest).
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Indices from the forest root.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Number of indices (0 for the forest, 1 for a root node).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// True for the empty path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Path of the `index`-th child of this node.
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut indices = Vec::with_capacity(self.0.len() + 1);
        indices.extend_from_slice(&self.0);
        indices.push(index);
        Self(indices)
    }

    /// Path of the parent node, `None` for the forest.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.0.split_last()?;
        Some(Self(init.to_vec()))
    }

    /// Path of `relative` taken from this node.
    #[must_use]
    pub fn join(&self, relative: &NodePath) -> Self {
        let mut indices = Vec::with_capacity(self.0.len() + relative.0.len());
        indices.extend_from_slice(&self.0);
        indices.extend_from_slice(&relative.0);
        Self(indices)
    }

    /// Path made of the first `len` indices.
    ///
    /// `len` is clamped to the depth of this path.
    #[must_use]
    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Proper ancestors, outermost first, excluding the forest.
    ///
    /// For `[1, 4, 2]` yields `[1]` and `[1, 4]`.
    pub fn ancestors(&self) -> impl Iterator<Item = NodePath> + '_ {
        (1..self.0.len()).map(|len| self.prefix(len))
    }

    /// True if `self` is a proper ancestor of `other`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &NodePath) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl<const N: usize> From<[usize; N]> for NodePath {
    fn from(indices: [usize; N]) -> Self {
        Self(indices.to_vec())
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{index}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_root_path_is_empty() {
        let root = NodePath::root();

        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(root.parent(), None);
        assert_eq!(root.to_string(), "[]");
    }

    #[test]
    fn test_child_and_parent() {
        let path = NodePath::root().child(1).child(0);

        assert_eq!(path.indices(), &[1, 0]);
        assert_eq!(path.parent(), Some(NodePath::from([1])));
        assert_eq!(path.to_string(), "[1,0]");
    }

    #[test]
    fn test_join_appends_relative_path() {
        let base = NodePath::from([0]);

        assert_eq!(base.join(&NodePath::from([2, 1])), NodePath::from([0, 2, 1]));
        assert_eq!(base.join(&NodePath::root()), base);
        assert_eq!(NodePath::root().join(&base), base);
    }

    #[test]
    fn test_ancestors_exclude_forest_and_self() {
        let path = NodePath::from([1, 4, 2]);

        let ancestors: Vec<_> = path.ancestors().collect();

        assert_eq!(ancestors, vec![NodePath::from([1]), NodePath::from([1, 4])]);
    }

    #[test]
    fn test_prefix_is_clamped() {
        let path = NodePath::from([3, 1]);

        assert_eq!(path.prefix(1), NodePath::from([3]));
        assert_eq!(path.prefix(9), path);
    }

    #[test]
    fn test_is_ancestor_of() {
        let parent = NodePath::from([1]);

        assert!(parent.is_ancestor_of(&NodePath::from([1, 0])));
        assert!(NodePath::root().is_ancestor_of(&parent));
        assert!(!parent.is_ancestor_of(&parent));
        assert!(!parent.is_ancestor_of(&NodePath::from([2, 0])));
    }

    #[test]
    fn test_order_is_preorder() {
        let mut paths = vec![
            NodePath::from([1]),
            NodePath::from([0, 1]),
            NodePath::from([1, 0]),
            NodePath::from([0]),
        ];

        paths.sort();

        assert_eq!(
            paths,
            vec![
                NodePath::from([0]),
                NodePath::from([0, 1]),
                NodePath::from([1]),
                NodePath::from([1, 0]),
            ]
        );
    }

    #[test]
    fn test_serializes_as_array() {
        let json = serde_json::to_string(&NodePath::from([0, 2, 5])).unwrap();

        assert_eq!(json, "[0,2,5]");
    }
}
