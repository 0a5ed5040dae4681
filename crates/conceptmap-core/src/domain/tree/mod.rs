//! Navigational folder tree projected from the concept graph

mod classify;
mod hierarchy;
mod mutator;
mod projector;

pub use classify::{Bucket, classify};
pub use hierarchy::{
    Folder, FolderKind, FolderState, Hierarchy, Leaf, TreeItem, category_folder_id, node_leaf_id,
};
pub use mutator::{HiddenCategories, TreeMutator};
pub use projector::TreeProjector;
