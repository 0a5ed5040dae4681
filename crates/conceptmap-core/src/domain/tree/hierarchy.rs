//! Folder hierarchy types
//!
//! The hierarchy is immutable once built. Children are held behind `Arc`
//! so that edits can copy only the path to the changed folder and share
//! every other subtree with the previous version.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::classify::Bucket;

/// Folder id for a category
pub fn category_folder_id(category: &str) -> String {
    format!("category-folder:{}", category)
}

/// Leaf id for a node
pub fn node_leaf_id(node_id: &str) -> String {
    format!("node-leaf:{}", node_id)
}

/// What a folder groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FolderKind {
    /// Top-level subject bucket
    Bucket { bucket: Bucket },
    /// Second-level grouping by exact category string
    Category { category: String },
}

/// A folder in the hierarchy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Folder {
    pub id: String,
    /// Display name; may differ from the category after a rename
    pub name: String,
    pub is_open: bool,
    pub kind: FolderKind,
    pub children: Vec<Arc<TreeItem>>,
}

impl Folder {
    /// Copy of this folder with a different child list
    pub(crate) fn with_children(&self, children: Vec<Arc<TreeItem>>) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            is_open: self.is_open,
            kind: self.kind.clone(),
            children,
        }
    }

    /// The grouping category, for category folders
    pub fn category(&self) -> Option<&str> {
        match &self.kind {
            FolderKind::Category { category } => Some(category),
            FolderKind::Bucket { .. } => None,
        }
    }
}

/// A concept leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Leaf {
    pub id: String,
    pub name: String,
    pub node_id: String,
}

/// A hierarchy entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeItem {
    Folder(Folder),
    Leaf(Leaf),
}

impl TreeItem {
    pub fn id(&self) -> &str {
        match self {
            Self::Folder(folder) => &folder.id,
            Self::Leaf(leaf) => &leaf.id,
        }
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            Self::Folder(folder) => Some(folder),
            Self::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Self::Leaf(leaf) => Some(leaf),
            Self::Folder(_) => None,
        }
    }
}

/// Saved per-folder customization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderState {
    pub name: String,
    pub is_open: bool,
}

/// The navigational tree: bucket folders, category folders, concept leaves
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Hierarchy {
    roots: Vec<Arc<TreeItem>>,
}

impl Hierarchy {
    pub(crate) fn from_roots(roots: Vec<Arc<TreeItem>>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[Arc<TreeItem>] {
        &self.roots
    }

    /// Find any item by id, at any depth
    pub fn find(&self, id: &str) -> Option<&TreeItem> {
        find_in(&self.roots, id)
    }

    pub fn folder(&self, id: &str) -> Option<&Folder> {
        self.find(id).and_then(TreeItem::as_folder)
    }

    /// The leaf that represents `node_id`
    pub fn leaf_for(&self, node_id: &str) -> Option<&Leaf> {
        self.find(&node_leaf_id(node_id)).and_then(TreeItem::as_leaf)
    }

    /// Folder directly containing the item with `id`
    pub fn parent_of(&self, id: &str) -> Option<&Folder> {
        fn walk<'a>(items: &'a [Arc<TreeItem>], id: &str) -> Option<&'a Folder> {
            for item in items {
                if let TreeItem::Folder(folder) = item.as_ref() {
                    if folder.children.iter().any(|c| c.id() == id) {
                        return Some(folder);
                    }
                    if let Some(found) = walk(&folder.children, id) {
                        return Some(found);
                    }
                }
            }
            None
        }
        walk(&self.roots, id)
    }

    /// All leaves in depth-first order
    pub fn leaves(&self) -> Vec<&Leaf> {
        let mut leaves = Vec::new();
        self.visit(&mut |item| {
            if let TreeItem::Leaf(leaf) = item {
                leaves.push(leaf);
            }
        });
        leaves
    }

    /// All folders in depth-first order
    pub fn folders(&self) -> Vec<&Folder> {
        let mut folders = Vec::new();
        self.visit(&mut |item| {
            if let TreeItem::Folder(folder) = item {
                folders.push(folder);
            }
        });
        folders
    }

    pub fn folder_ids(&self) -> Vec<&str> {
        self.folders().into_iter().map(|f| f.id.as_str()).collect()
    }

    /// Name and open flag of every folder, keyed by folder id
    pub fn folder_states(&self) -> HashMap<String, FolderState> {
        self.folders()
            .into_iter()
            .map(|f| {
                (
                    f.id.clone(),
                    FolderState {
                        name: f.name.clone(),
                        is_open: f.is_open,
                    },
                )
            })
            .collect()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    pub fn folder_count(&self) -> usize {
        self.folders().len()
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a TreeItem)) {
        fn walk<'a>(items: &'a [Arc<TreeItem>], f: &mut impl FnMut(&'a TreeItem)) {
            for item in items {
                f(item.as_ref());
                if let TreeItem::Folder(folder) = item.as_ref() {
                    walk(&folder.children, f);
                }
            }
        }
        walk(&self.roots, f);
    }
}

fn find_in<'a>(items: &'a [Arc<TreeItem>], id: &str) -> Option<&'a TreeItem> {
    for item in items {
        if item.id() == id {
            return Some(item.as_ref());
        }
        if let TreeItem::Folder(folder) = item.as_ref()
            && let Some(found) = find_in(&folder.children, id)
        {
            return Some(found);
        }
    }
    None
}
