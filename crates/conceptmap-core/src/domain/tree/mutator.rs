//! Structural edits on the projected hierarchy
//!
//! Edits never touch the graph. Each edit returns a new [`Hierarchy`] that
//! copies only the folders on the path from the root to the target; every
//! other subtree is the same `Arc` as before.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::hierarchy::{Folder, Hierarchy, TreeItem};
use crate::error::{Error, Result};

/// Toggle and rename operations on folders
pub struct TreeMutator;

impl TreeMutator {
    /// Flip the open state of the folder with `folder_id`
    pub fn toggle_folder(hierarchy: &Hierarchy, folder_id: &str) -> Result<Hierarchy> {
        let next = edit_folder(hierarchy, folder_id, |folder| folder.is_open = !folder.is_open)?;
        debug!(folder_id = %folder_id, "Folder toggled");
        Ok(next)
    }

    /// Override the display name of the folder with `folder_id`
    ///
    /// The grouping category is left untouched, so nodes with the original
    /// category keep landing in the renamed folder.
    pub fn rename_folder(hierarchy: &Hierarchy, folder_id: &str, name: &str) -> Result<Hierarchy> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::ValidationFailed(
                "Folder name cannot be empty".to_string(),
            ));
        }
        let next = edit_folder(hierarchy, folder_id, |folder| folder.name = name.to_string())?;
        debug!(folder_id = %folder_id, name = %name, "Folder renamed");
        Ok(next)
    }
}

fn edit_folder<F>(hierarchy: &Hierarchy, folder_id: &str, edit: F) -> Result<Hierarchy>
where
    F: Fn(&mut Folder),
{
    edit_path(hierarchy.roots(), folder_id, &edit)
        .map(Hierarchy::from_roots)
        .ok_or_else(|| Error::FolderNotFound(folder_id.to_string()))
}

/// Rebuild `items` with the target folder edited, or `None` if absent
fn edit_path<F>(items: &[Arc<TreeItem>], folder_id: &str, edit: &F) -> Option<Vec<Arc<TreeItem>>>
where
    F: Fn(&mut Folder),
{
    for (index, item) in items.iter().enumerate() {
        let TreeItem::Folder(folder) = item.as_ref() else {
            continue;
        };

        let replacement = if folder.id == folder_id {
            let mut edited = folder.clone();
            edit(&mut edited);
            edited
        } else {
            match edit_path(&folder.children, folder_id, edit) {
                Some(children) => folder.with_children(children),
                None => continue,
            }
        };

        let mut copy = items.to_vec();
        copy[index] = Arc::new(TreeItem::Folder(replacement));
        return Some(copy);
    }
    None
}

/// Category names hidden from rendering
///
/// Consulted by renderers only; never changes the graph or the hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenCategories {
    categories: Vec<String>,
}

impl HiddenCategories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide if visible, show if hidden. Returns whether it is now hidden.
    pub fn toggle(&mut self, category: &str) -> bool {
        match self.categories.iter().position(|c| c == category) {
            Some(pos) => {
                self.categories.remove(pos);
                false
            }
            None => {
                self.categories.push(category.to_string());
                true
            }
        }
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for HiddenCategories {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut hidden = Self::new();
        for category in iter {
            if !hidden.contains(category.as_ref()) {
                hidden.toggle(category.as_ref());
            }
        }
        hidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{GraphStore, Link, Node, seed_links, seed_nodes};
    use crate::domain::tree::TreeProjector;
    use crate::error::ErrorKind;

    fn seeded_tree() -> (GraphStore, Hierarchy) {
        let store = GraphStore::from_parts(seed_nodes(), seed_links()).unwrap();
        let tree = TreeProjector::new().project(&store);
        (store, tree)
    }

    fn root<'a>(tree: &'a Hierarchy, id: &str) -> &'a Arc<TreeItem> {
        tree.roots().iter().find(|r| r.id() == id).unwrap()
    }

    #[test]
    fn test_toggle_flips_only_target() {
        let (_, tree) = seeded_tree();
        let next = TreeMutator::toggle_folder(&tree, "category-folder:Core").unwrap();

        assert!(next.folder("category-folder:Core").unwrap().is_open);
        assert!(!tree.folder("category-folder:Core").unwrap().is_open);

        let before = tree.folder_states();
        let after = next.folder_states();
        for (id, state) in &before {
            if id != "category-folder:Core" {
                assert_eq!(after[id], *state);
            }
        }
    }

    #[test]
    fn test_toggle_twice_restores() {
        let (_, tree) = seeded_tree();
        let once = TreeMutator::toggle_folder(&tree, "bucket:mathematics").unwrap();
        let twice = TreeMutator::toggle_folder(&once, "bucket:mathematics").unwrap();
        assert_eq!(tree, twice);
    }

    #[test]
    fn test_untouched_subtrees_are_shared() {
        let (_, tree) = seeded_tree();
        let next = TreeMutator::toggle_folder(&tree, "category-folder:Core").unwrap();

        // sibling buckets are the same allocation
        assert!(Arc::ptr_eq(
            root(&tree, "bucket:mathematics"),
            root(&next, "bucket:mathematics")
        ));
        assert!(Arc::ptr_eq(
            root(&tree, "bucket:general-knowledge"),
            root(&next, "bucket:general-knowledge")
        ));
        // the path to the target is copied
        assert!(!Arc::ptr_eq(
            root(&tree, "bucket:computer-science"),
            root(&next, "bucket:computer-science")
        ));

        // sibling category folders inside the copied bucket are shared too
        let old_cs = root(&tree, "bucket:computer-science").as_folder().unwrap();
        let new_cs = root(&next, "bucket:computer-science").as_folder().unwrap();
        assert!(Arc::ptr_eq(&old_cs.children[1], &new_cs.children[1]));
    }

    #[test]
    fn test_rename_is_display_only() {
        let (mut store, tree) = seeded_tree();
        let renamed =
            TreeMutator::rename_folder(&tree, "category-folder:Architecture", "Models").unwrap();
        let folder = renamed.folder("category-folder:Architecture").unwrap();
        assert_eq!(folder.name, "Models");
        assert_eq!(folder.category(), Some("Architecture"));

        store
            .append(
                vec![Node::new("x", "Mixture of Experts", "Architecture")],
                vec![Link::new("c1", "x")],
            )
            .unwrap();
        let next = TreeProjector::new().reproject(&store, &renamed);
        let parent = next.parent_of("node-leaf:x").unwrap();
        assert_eq!(parent.id, "category-folder:Architecture");
        assert_eq!(parent.name, "Models");
    }

    #[test]
    fn test_rename_trims_and_rejects_blank() {
        let (_, tree) = seeded_tree();
        let renamed = TreeMutator::rename_folder(&tree, "bucket:mathematics", "  Maths ").unwrap();
        assert_eq!(renamed.folder("bucket:mathematics").unwrap().name, "Maths");

        let err = TreeMutator::rename_folder(&tree, "bucket:mathematics", "   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_missing_folder_is_not_found() {
        let (_, tree) = seeded_tree();
        let err = TreeMutator::toggle_folder(&tree, "category-folder:Nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // leaves are not folders
        let err = TreeMutator::rename_folder(&tree, "node-leaf:c1", "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_toggle_survives_unrelated_merge() {
        let (mut store, tree) = seeded_tree();
        let toggled = TreeMutator::toggle_folder(&tree, "category-folder:Math").unwrap();
        store
            .append(
                vec![Node::new("h", "Renaissance", "History")],
                vec![Link::new("root", "h")],
            )
            .unwrap();
        let next = TreeProjector::new().reproject(&store, &toggled);
        assert!(next.folder("category-folder:Math").unwrap().is_open);
    }

    #[test]
    fn test_hidden_categories_toggle() {
        let mut hidden = HiddenCategories::new();
        assert!(hidden.toggle("Math"));
        assert!(hidden.contains("Math"));
        assert!(!hidden.toggle("Math"));
        assert!(!hidden.contains("Math"));
        assert!(hidden.is_empty());

        let hidden: HiddenCategories = ["Core", "Skill", "Core"].into_iter().collect();
        assert_eq!(hidden.len(), 2);
        assert_eq!(hidden.iter().collect::<Vec<_>>(), vec!["Core", "Skill"]);
    }
}
