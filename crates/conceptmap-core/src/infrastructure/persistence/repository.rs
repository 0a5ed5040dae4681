//! SQLite implementation of the persistence contract

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::graph::{Link, MasteryStatus, Node};
use crate::domain::persistence::{
    AssessmentRecord, ChatMessage, ChatSender, NodeContent, PersistenceStore,
};
use crate::error::{Error, Result};
use crate::storage::Database;

/// Persistence store backed by the conceptmap SQLite database
#[derive(Debug, Clone)]
pub struct SqlitePersistenceStore {
    db: Database,
}

impl SqlitePersistenceStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn row_to_node(row: &SqliteRow) -> Result<Node> {
        let status: String = row.get("status");
        Ok(Node {
            id: row.get("id"),
            label: row.get("label"),
            status: parse_status(&status)?,
            weight: row.get("weight"),
            category: row.get("category"),
            description: row.get("description"),
        })
    }

    fn row_to_message(row: &SqliteRow) -> Result<ChatMessage> {
        let id: String = row.get("id");
        let sender: String = row.get("sender");
        let subconcepts: String = row.get("subconcepts");
        Ok(ChatMessage {
            id: parse_uuid(&id)?,
            owner_id: row.get("owner_id"),
            sender: ChatSender::parse(&sender)
                .ok_or_else(|| Error::Other(format!("Invalid chat sender '{}'", sender)))?,
            content: row.get("content"),
            subconcepts: serde_json::from_str(&subconcepts)
                .map_err(|e| Error::Other(format!("Invalid stored subconcepts: {}", e)))?,
            created_at: row.get("created_at"),
        })
    }

    fn row_to_assessment(row: &SqliteRow) -> Result<AssessmentRecord> {
        let id: String = row.get("id");
        let status: String = row.get("status");
        let score: i64 = row.get("score");
        Ok(AssessmentRecord {
            id: parse_uuid(&id)?,
            owner_id: row.get("owner_id"),
            node_id: row.get("node_id"),
            score: u8::try_from(score)
                .map_err(|_| Error::Other(format!("Invalid stored score {}", score)))?,
            status: parse_status(&status)?,
            feedback: row.get("feedback"),
            next_step: row.get("next_step"),
            created_at: row.get("created_at"),
        })
    }
}

fn parse_status(s: &str) -> Result<MasteryStatus> {
    MasteryStatus::parse(s).ok_or_else(|| Error::Other(format!("Invalid stored status '{}'", s)))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Other(format!("Invalid stored id '{}': {}", s, e)))
}

#[async_trait]
impl PersistenceStore for SqlitePersistenceStore {
    // ========== Graph ==========

    async fn append_graph(&self, owner_id: &str, nodes: &[Node], links: &[Link]) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;
        let now = Utc::now();

        for node in nodes {
            sqlx::query(
                r#"
                INSERT INTO nodes (owner_id, id, label, status, weight, category, description, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(owner_id)
            .bind(&node.id)
            .bind(&node.label)
            .bind(node.status.as_str())
            .bind(node.weight)
            .bind(&node.category)
            .bind(&node.description)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        for link in links {
            sqlx::query(
                "INSERT INTO links (owner_id, source, target, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(owner_id)
            .bind(&link.source)
            .bind(&link.target)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            owner_id = %owner_id,
            nodes = nodes.len(),
            links = links.len(),
            "Graph batch persisted"
        );
        Ok(())
    }

    async fn load_graph(&self, owner_id: &str) -> Result<(Vec<Node>, Vec<Link>)> {
        let node_rows = sqlx::query(
            "SELECT id, label, status, weight, category, description FROM nodes WHERE owner_id = ? ORDER BY seq ASC",
        )
        .bind(owner_id)
        .fetch_all(self.db.pool())
        .await?;

        let nodes = node_rows
            .iter()
            .map(Self::row_to_node)
            .collect::<Result<Vec<_>>>()?;

        let link_rows =
            sqlx::query("SELECT source, target FROM links WHERE owner_id = ? ORDER BY seq ASC")
                .bind(owner_id)
                .fetch_all(self.db.pool())
                .await?;

        let links = link_rows
            .iter()
            .map(|r| Link::new(r.get::<String, _>("source"), r.get::<String, _>("target")))
            .collect();

        debug!(owner_id = %owner_id, nodes = nodes.len(), "Graph loaded");
        Ok((nodes, links))
    }

    async fn update_node_status(
        &self,
        owner_id: &str,
        node_id: &str,
        status: MasteryStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE nodes SET status = ?, updated_at = ? WHERE owner_id = ? AND id = ?",
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(owner_id)
        .bind(node_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========== Node content ==========

    async fn save_content(&self, content: &NodeContent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO node_contents (owner_id, node_id, content, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (owner_id, node_id) DO UPDATE SET
                content = excluded.content,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&content.owner_id)
        .bind(&content.node_id)
        .bind(&content.content)
        .bind(content.updated_at)
        .execute(self.db.pool())
        .await?;

        debug!(owner_id = %content.owner_id, node_id = %content.node_id, "Node content saved");
        Ok(())
    }

    async fn get_content(&self, owner_id: &str, node_id: &str) -> Result<Option<NodeContent>> {
        let row = sqlx::query(
            "SELECT owner_id, node_id, content, updated_at FROM node_contents WHERE owner_id = ? AND node_id = ?",
        )
        .bind(owner_id)
        .bind(node_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|r| NodeContent {
            owner_id: r.get("owner_id"),
            node_id: r.get("node_id"),
            content: r.get("content"),
            updated_at: r.get("updated_at"),
        }))
    }

    async fn delete_content(&self, owner_id: &str, node_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM node_contents WHERE owner_id = ? AND node_id = ?")
            .bind(owner_id)
            .bind(node_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========== Chat ==========

    async fn save_message(&self, message: &ChatMessage) -> Result<()> {
        let subconcepts = serde_json::to_string(&message.subconcepts)
            .map_err(|e| Error::Other(format!("Failed to encode subconcepts: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, owner_id, sender, content, subconcepts, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(message.id.to_string())
        .bind(&message.owner_id)
        .bind(message.sender.as_str())
        .bind(&message.content)
        .bind(subconcepts)
        .bind(message.created_at)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn list_messages(&self, owner_id: &str, limit: Option<i64>) -> Result<Vec<ChatMessage>> {
        // newest `limit` rows, returned oldest first
        let rows = sqlx::query(
            r#"
            SELECT * FROM (
                SELECT rowid AS seq, id, owner_id, sender, content, subconcepts, created_at
                FROM chat_messages WHERE owner_id = ?
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?
            ) ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(owner_id)
        .bind(limit.unwrap_or(-1))
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(Self::row_to_message).collect()
    }

    // ========== Assessments ==========

    async fn record_assessment(&self, record: &AssessmentRecord) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        let updated = sqlx::query(
            "UPDATE nodes SET status = ?, updated_at = ? WHERE owner_id = ? AND id = ?",
        )
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(&record.owner_id)
        .bind(&record.node_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(Error::NodeNotFound(record.node_id.clone()));
        }

        sqlx::query(
            r#"
            INSERT INTO assessment_results (id, owner_id, node_id, score, status, feedback, next_step, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.owner_id)
        .bind(&record.node_id)
        .bind(i64::from(record.score))
        .bind(record.status.as_str())
        .bind(&record.feedback)
        .bind(&record.next_step)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(
            owner_id = %record.owner_id,
            node_id = %record.node_id,
            status = %record.status,
            "Assessment persisted"
        );
        Ok(())
    }

    async fn list_assessments(
        &self,
        owner_id: &str,
        node_id: Option<&str>,
    ) -> Result<Vec<AssessmentRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, node_id, score, status, feedback, next_step, created_at
            FROM assessment_results
            WHERE owner_id = ? AND (? IS NULL OR node_id = ?)
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(owner_id)
        .bind(node_id)
        .bind(node_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(Self::row_to_assessment).collect()
    }

    // ========== Maintenance ==========

    async fn clear_all(&self, owner_id: &str) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;
        for table in [
            "assessment_results",
            "node_contents",
            "chat_messages",
            "links",
            "nodes",
        ] {
            sqlx::query(&format!("DELETE FROM {} WHERE owner_id = ?", table))
                .bind(owner_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!(owner_id = %owner_id, "All records cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::assessment::AssessmentOutcome;
    use crate::domain::graph::{seed_links, seed_nodes};
    use crate::domain::merge::CandidateConcept;
    use crate::error::ErrorKind;

    async fn store() -> SqlitePersistenceStore {
        SqlitePersistenceStore::new(Database::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_graph_round_trip_keeps_order() {
        let store = store().await;
        store
            .append_graph("alice", &seed_nodes(), &seed_links())
            .await
            .unwrap();

        let (nodes, links) = store.load_graph("alice").await.unwrap();
        assert_eq!(nodes, seed_nodes());
        assert_eq!(links, seed_links());
    }

    #[tokio::test]
    async fn test_owners_are_isolated() {
        let store = store().await;
        store
            .append_graph("alice", &seed_nodes(), &seed_links())
            .await
            .unwrap();
        // same node ids are fine for another owner
        store
            .append_graph("bob", &seed_nodes()[..1], &[])
            .await
            .unwrap();

        let (nodes, links) = store.load_graph("bob").await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_writes_nothing() {
        let store = store().await;
        let nodes = vec![Node::new("a", "A", "Core")];
        let links = vec![Link::new("a", "missing")];

        let err = store.append_graph("alice", &nodes, &links).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);

        let (nodes, _) = store.load_graph("alice").await.unwrap();
        assert!(nodes.is_empty());
    }

    #[tokio::test]
    async fn test_update_node_status() {
        let store = store().await;
        store
            .append_graph("alice", &seed_nodes(), &seed_links())
            .await
            .unwrap();

        assert!(
            store
                .update_node_status("alice", "c2", MasteryStatus::Known)
                .await
                .unwrap()
        );
        assert!(
            !store
                .update_node_status("alice", "ghost", MasteryStatus::Known)
                .await
                .unwrap()
        );

        let (nodes, _) = store.load_graph("alice").await.unwrap();
        assert_eq!(nodes[2].status, MasteryStatus::Known);
    }

    #[tokio::test]
    async fn test_content_upsert() {
        let store = store().await;
        store
            .append_graph("alice", &seed_nodes(), &[])
            .await
            .unwrap();

        store
            .save_content(&NodeContent::new("alice", "c1", "first"))
            .await
            .unwrap();
        store
            .save_content(&NodeContent::new("alice", "c1", "second"))
            .await
            .unwrap();

        let content = store.get_content("alice", "c1").await.unwrap().unwrap();
        assert_eq!(content.content, "second");

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM node_contents")
            .fetch_one(store.database().pool())
            .await
            .unwrap();
        assert_eq!(count.0, 1);

        assert!(store.delete_content("alice", "c1").await.unwrap());
        assert!(!store.delete_content("alice", "c1").await.unwrap());
        assert!(store.get_content("alice", "c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_messages_round_trip() {
        let store = store().await;
        let question = ChatMessage::user("alice", "What is attention?");
        let answer = ChatMessage::bot("alice", "It weighs inputs.")
            .with_subconcepts(vec![CandidateConcept::new("Softmax")]);
        store.save_message(&question).await.unwrap();
        store.save_message(&answer).await.unwrap();
        store
            .save_message(&ChatMessage::user("bob", "hello"))
            .await
            .unwrap();

        let messages = store.list_messages("alice", None).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, question.id);
        assert_eq!(messages[0].sender, ChatSender::User);
        assert_eq!(messages[0].content, "What is attention?");
        assert_eq!(messages[1].subconcepts[0].label, "Softmax");

        let latest = store.list_messages("alice", Some(1)).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].id, answer.id);
    }

    #[tokio::test]
    async fn test_record_assessment_updates_status() {
        let store = store().await;
        store
            .append_graph("alice", &seed_nodes(), &seed_links())
            .await
            .unwrap();

        let outcome = AssessmentOutcome::new(85, MasteryStatus::Known).with_feedback("Solid");
        let record = AssessmentRecord::from_outcome("alice", "c6", &outcome);
        store.record_assessment(&record).await.unwrap();

        let (nodes, _) = store.load_graph("alice").await.unwrap();
        assert_eq!(nodes[6].status, MasteryStatus::Known);

        let records = store.list_assessments("alice", Some("c6")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].score, 85);
        assert!(store.list_assessments("alice", Some("c1")).await.unwrap().is_empty());
        assert_eq!(store.list_assessments("alice", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_assessment_unknown_node() {
        let store = store().await;
        let outcome = AssessmentOutcome::new(50, MasteryStatus::Fuzzy);
        let record = AssessmentRecord::from_outcome("alice", "ghost", &outcome);
        let err = store.record_assessment(&record).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(store.list_assessments("alice", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_scoped_to_owner() {
        let store = store().await;
        store
            .append_graph("alice", &seed_nodes(), &seed_links())
            .await
            .unwrap();
        store
            .append_graph("bob", &seed_nodes(), &seed_links())
            .await
            .unwrap();
        store
            .save_message(&ChatMessage::user("alice", "hi"))
            .await
            .unwrap();

        store.clear_all("alice").await.unwrap();

        assert!(store.load_graph("alice").await.unwrap().0.is_empty());
        assert!(store.list_messages("alice", None).await.unwrap().is_empty());
        assert_eq!(store.load_graph("bob").await.unwrap().0.len(), 8);
    }
}
