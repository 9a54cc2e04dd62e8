//! Navigation tree nodes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a loadable fragment (e.g., `"namespaces_dup"`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentId(String);

impl FragmentId {
    /// Create a fragment identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FragmentId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Children slot of a [`TreeNode`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Children {
    /// Leaf node.
    #[default]
    None,
    /// Materialized children.
    Inline(Vec<TreeNode>),
    /// Children live in another fragment that has not been loaded yet.
    Deferred(FragmentId),
}

/// One titled link in the navigation tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    /// Display text.
    pub title: String,
    /// Document reference with optional anchor (`page.html#anchor`).
    ///
    /// `None` for grouping nodes that link nowhere.
    pub target: Option<String>,
    /// Children slot.
    pub children: Children,
}

impl TreeNode {
    /// Create a leaf node.
    #[must_use]
    pub fn leaf(title: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            target: Some(target.into()),
            children: Children::None,
        }
    }

    /// Create a node with inline children.
    #[must_use]
    pub fn branch(
        title: impl Into<String>,
        target: impl Into<String>,
        children: Vec<TreeNode>,
    ) -> Self {
        Self {
            title: title.into(),
            target: Some(target.into()),
            children: Children::Inline(children),
        }
    }

    /// Create a node whose children live in another fragment.
    #[must_use]
    pub fn deferred(
        title: impl Into<String>,
        target: impl Into<String>,
        fragment: impl Into<FragmentId>,
    ) -> Self {
        Self {
            title: title.into(),
            target: Some(target.into()),
            children: Children::Deferred(fragment.into()),
        }
    }

    /// True if the node's target equals `page_id`.
    #[must_use]
    pub fn links_to(&self, page_id: &str) -> bool {
        self.target.as_deref() == Some(page_id)
    }
}
