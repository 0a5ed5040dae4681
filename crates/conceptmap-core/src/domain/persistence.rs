//! Persistence contract
//!
//! Every record is scoped to an owner id. Graph writes are append-only
//! except for status updates, mirroring what the in-memory store allows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::assessment::AssessmentOutcome;
use crate::domain::graph::{Link, MasteryStatus, Node};
use crate::domain::merge::CandidateConcept;
use crate::error::Result;

/// Free-text notes attached to a node, one per node per owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContent {
    pub owner_id: String,
    pub node_id: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

impl NodeContent {
    pub fn new(
        owner_id: impl Into<String>,
        node_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            node_id: node_id.into(),
            content: content.into(),
            updated_at: Utc::now(),
        }
    }
}

/// Who wrote a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    User,
    Bot,
}

impl ChatSender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "bot" => Some(Self::Bot),
            _ => None,
        }
    }
}

/// One entry of the analysis conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub owner_id: String,
    pub sender: ChatSender,
    pub content: String,
    /// Candidates proposed alongside a bot reply
    #[serde(default)]
    pub subconcepts: Vec<CandidateConcept>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(owner_id: impl Into<String>, sender: ChatSender, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            sender,
            content: content.into(),
            subconcepts: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn user(owner_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(owner_id, ChatSender::User, content)
    }

    pub fn bot(owner_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(owner_id, ChatSender::Bot, content)
    }

    pub fn with_subconcepts(mut self, subconcepts: Vec<CandidateConcept>) -> Self {
        self.subconcepts = subconcepts;
        self
    }
}

/// A stored assessment of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub node_id: String,
    pub score: u8,
    pub status: MasteryStatus,
    pub feedback: String,
    pub next_step: String,
    pub created_at: DateTime<Utc>,
}

impl AssessmentRecord {
    pub fn from_outcome(
        owner_id: impl Into<String>,
        node_id: impl Into<String>,
        outcome: &AssessmentOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            node_id: node_id.into(),
            score: outcome.score,
            status: outcome.status,
            feedback: outcome.feedback.clone(),
            next_step: outcome.next_step.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Storage backend for the graph and its side records
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    // ========== Graph ==========

    /// Append nodes then links in one transaction
    async fn append_graph(&self, owner_id: &str, nodes: &[Node], links: &[Link]) -> Result<()>;

    /// Load nodes and links in insertion order
    async fn load_graph(&self, owner_id: &str) -> Result<(Vec<Node>, Vec<Link>)>;

    /// Overwrite one node's status; returns false if the node is unknown
    async fn update_node_status(
        &self,
        owner_id: &str,
        node_id: &str,
        status: MasteryStatus,
    ) -> Result<bool>;

    // ========== Node content ==========

    /// Insert or replace the notes of a node
    async fn save_content(&self, content: &NodeContent) -> Result<()>;

    async fn get_content(&self, owner_id: &str, node_id: &str) -> Result<Option<NodeContent>>;

    async fn delete_content(&self, owner_id: &str, node_id: &str) -> Result<bool>;

    // ========== Chat ==========

    async fn save_message(&self, message: &ChatMessage) -> Result<()>;

    /// Messages oldest first, optionally only the most recent `limit`
    async fn list_messages(&self, owner_id: &str, limit: Option<i64>) -> Result<Vec<ChatMessage>>;

    // ========== Assessments ==========

    /// Store the record and set the node status in one transaction
    async fn record_assessment(&self, record: &AssessmentRecord) -> Result<()>;

    /// Records newest first, optionally filtered by node
    async fn list_assessments(
        &self,
        owner_id: &str,
        node_id: Option<&str>,
    ) -> Result<Vec<AssessmentRecord>>;

    // ========== Maintenance ==========

    /// Remove every record of the owner
    async fn clear_all(&self, owner_id: &str) -> Result<()>;
}
