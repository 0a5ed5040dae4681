//! Starter graph loaded for a fresh learner

use super::node::{Link, MasteryStatus, Node};

/// Seed concepts, in store order
pub fn seed_nodes() -> Vec<Node> {
    vec![
        Node::new("root", "LLM (Large Language Model)", "Core")
            .with_status(MasteryStatus::Known)
            .with_weight(30.0)
            .with_description("An AI model trained on a very large body of text."),
        Node::new("c1", "Transformer", "Architecture")
            .with_status(MasteryStatus::Fuzzy)
            .with_weight(25.0)
            .with_description("A deep learning architecture built on the attention mechanism."),
        Node::new("c2", "Attention Mechanism", "Concept")
            .with_status(MasteryStatus::Unknown)
            .with_weight(20.0)
            .with_description("Weights the most relevant parts of the input more heavily."),
        Node::new("c3", "RAG (Retrieval-Augmented Generation)", "Application")
            .with_status(MasteryStatus::Known)
            .with_weight(28.0)
            .with_description("Retrieves from an external knowledge base to ground LLM answers."),
        Node::new("c4", "Vector DB", "Infrastructure")
            .with_status(MasteryStatus::Known)
            .with_weight(22.0)
            .with_description("Stores and searches high-dimensional vectors efficiently."),
        Node::new("c5", "Embedding", "Math")
            .with_status(MasteryStatus::Fuzzy)
            .with_weight(18.0)
            .with_description("Turns text or images into numeric vectors."),
        Node::new("c6", "Fine-tuning", "Training")
            .with_status(MasteryStatus::Unknown)
            .with_weight(15.0)
            .with_description("Adapts a pretrained model to a specific task."),
        Node::new("c7", "Prompt Engineering", "Skill")
            .with_status(MasteryStatus::Known)
            .with_weight(20.0)
            .with_description("Designs inputs to get the best results from an AI model."),
    ]
}

/// Seed links
pub fn seed_links() -> Vec<Link> {
    [
        ("root", "c1"),
        ("c1", "c2"),
        ("root", "c3"),
        ("c3", "c4"),
        ("c4", "c5"),
        ("root", "c6"),
        ("root", "c7"),
        ("c3", "c7"),
    ]
    .into_iter()
    .map(|(source, target)| Link::new(source, target))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::GraphStore;

    #[test]
    fn test_seed_is_a_valid_graph() {
        let store = GraphStore::from_parts(seed_nodes(), seed_links()).unwrap();
        assert_eq!(store.len(), 8);
        assert_eq!(store.link_count(), 8);
        assert_eq!(store.nodes()[0].id, "root");
    }
}
