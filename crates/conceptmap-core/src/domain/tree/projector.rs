//! Graph to hierarchy projection
//!
//! Projection is an upsert: folders that already exist in the previous
//! hierarchy keep their name and open state, new folders get defaults and
//! leaves are always rebuilt from store order.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::classify::{Bucket, classify};
use super::hierarchy::{
    Folder, FolderKind, FolderState, Hierarchy, Leaf, TreeItem, category_folder_id, node_leaf_id,
};
use crate::config::TreeConfig;
use crate::domain::graph::{GraphStore, Node};

/// Derives the bucket / category / leaf hierarchy from a [`GraphStore`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeProjector {
    category_folders_open: bool,
}

impl TreeProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &TreeConfig) -> Self {
        Self::new().with_category_folders_open(config.category_folders_open)
    }

    /// Open state for category folders created by projection
    pub fn with_category_folders_open(mut self, open: bool) -> Self {
        self.category_folders_open = open;
        self
    }

    /// Project with no prior customizations
    pub fn project(&self, store: &GraphStore) -> Hierarchy {
        self.build(store, &HashMap::new())
    }

    /// Project, carrying over name and open state of surviving folders
    pub fn reproject(&self, store: &GraphStore, previous: &Hierarchy) -> Hierarchy {
        self.build(store, &previous.folder_states())
    }

    fn build(&self, store: &GraphStore, saved: &HashMap<String, FolderState>) -> Hierarchy {
        // category -> leaves, per bucket, in first-seen order
        let mut grouped: Vec<(Bucket, Vec<(String, Vec<Arc<TreeItem>>)>)> =
            Bucket::all().iter().map(|b| (*b, Vec::new())).collect();

        for node in store.nodes() {
            let bucket = classify(&node.category);
            let Some((_, categories)) = grouped.iter_mut().find(|(b, _)| *b == bucket) else {
                continue;
            };
            let leaf = leaf_item(node);
            match categories.iter_mut().find(|(c, _)| *c == node.category) {
                Some((_, leaves)) => leaves.push(leaf),
                None => categories.push((node.category.clone(), vec![leaf])),
            }
        }

        let roots: Vec<Arc<TreeItem>> = grouped
            .into_iter()
            .map(|(bucket, categories)| {
                let children = categories
                    .into_iter()
                    .map(|(category, leaves)| {
                        let id = category_folder_id(&category);
                        let (name, is_open) =
                            restore(saved, &id, &category, self.category_folders_open);
                        Arc::new(TreeItem::Folder(Folder {
                            id,
                            name,
                            is_open,
                            kind: FolderKind::Category { category },
                            children: leaves,
                        }))
                    })
                    .collect();
                let id = bucket.folder_id().to_string();
                let (name, is_open) =
                    restore(saved, &id, bucket.display_name(), bucket.default_open());
                Arc::new(TreeItem::Folder(Folder {
                    id,
                    name,
                    is_open,
                    kind: FolderKind::Bucket { bucket },
                    children,
                }))
            })
            .collect();

        let hierarchy = Hierarchy::from_roots(roots);
        debug!(
            folders = hierarchy.folder_count(),
            leaves = hierarchy.leaf_count(),
            "Projection completed"
        );
        hierarchy
    }
}

fn leaf_item(node: &Node) -> Arc<TreeItem> {
    Arc::new(TreeItem::Leaf(Leaf {
        id: node_leaf_id(&node.id),
        name: node.label.clone(),
        node_id: node.id.clone(),
    }))
}

fn restore(
    saved: &HashMap<String, FolderState>,
    id: &str,
    default_name: &str,
    default_open: bool,
) -> (String, bool) {
    match saved.get(id) {
        Some(state) => (state.name.clone(), state.is_open),
        None => (default_name.to_string(), default_open),
    }
}
