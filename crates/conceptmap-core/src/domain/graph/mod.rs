//! Concept graph: nodes, links and the in-memory store that owns them

mod node;
mod seed;
mod store;

pub use node::{Link, MasteryStatus, Node, canonicalize};
pub use seed::{seed_links, seed_nodes};
pub use store::GraphStore;
