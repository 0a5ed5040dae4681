//! Domain layer
//!
//! The concept graph, its projected folder tree, and the operations that
//! change them.

pub mod assessment;
pub mod graph;
pub mod merge;
pub mod persistence;
pub mod tree;

pub use assessment::{AssessmentOutcome, StatusUpdater};
pub use graph::{GraphStore, Link, MasteryStatus, Node};
pub use merge::{CandidateConcept, ConceptMerger, DedupPolicy, MergePlan, MergeReport};
pub use persistence::{AssessmentRecord, ChatMessage, ChatSender, NodeContent, PersistenceStore};
pub use tree::{Bucket, Folder, Hierarchy, HiddenCategories, Leaf, TreeItem, TreeMutator, TreeProjector};
