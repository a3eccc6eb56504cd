//! SQLite persistence executor.
//!
//! WAL mode plus foreign keys, a `Mutex<Connection>`, and an idempotent
//! `migrate()`, shaped around the room/agent/message/task/artifact data
//! this system actually needs.

use crate::error::RuntimeError;
use crate::ids::{AgentId, MessageId, RoomId, SenderId};
use crate::values::{Attachment, ChatMessage, MessageType, RoomConfig, Task, TaskStatus};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

pub struct SqlitePersistence {
    conn: Mutex<Connection>,
}

impl SqlitePersistence {
    pub fn open(path: &std::path::Path) -> Result<Self, RuntimeError> {
        let conn = Connection::open(path)
            .map_err(|e| RuntimeError::Fatal(format!("failed to open database: {e}")))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| RuntimeError::Fatal(format!("failed to set pragmas: {e}")))?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, RuntimeError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| RuntimeError::Fatal(format!("failed to open in-memory database: {e}")))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| RuntimeError::Fatal(format!("failed to set pragmas: {e}")))?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), RuntimeError> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT DEFAULT '',
                topic TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT DEFAULT '',
                system_prompt TEXT DEFAULT '',
                personality_traits TEXT DEFAULT '{}',
                speaking_style TEXT DEFAULT '',
                interests TEXT DEFAULT '[]',
                response_tendency REAL DEFAULT 0.5,
                temperature REAL DEFAULT 0.7,
                model TEXT DEFAULT 'claude-haiku-4-5-20251001',
                status TEXT DEFAULT 'offline',
                message_count INTEGER DEFAULT 0,
                last_spoke_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS room_members (
                room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
                joined_at INTEGER NOT NULL,
                PRIMARY KEY (room_id, agent_id)
            );

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                sender_name TEXT NOT NULL,
                content TEXT NOT NULL,
                type TEXT NOT NULL DEFAULT 'chat',
                mentions TEXT DEFAULT '[]',
                attachments TEXT DEFAULT '[]',
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_room_created_sender
                ON messages(room_id, created_at, sender_id);

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                mode TEXT DEFAULT 'hybrid',
                started_at INTEGER NOT NULL,
                ended_at INTEGER,
                total_rounds INTEGER DEFAULT 0,
                total_messages INTEGER DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS event_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT,
                event_type TEXT NOT NULL,
                event_data TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_event_log_session_type_created
                ON event_log(session_id, event_type, created_at);

            CREATE TABLE IF NOT EXISTS artifacts (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                path TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(room_id, agent_id, path)
            );
            CREATE INDEX IF NOT EXISTS idx_artifacts_room_agent ON artifacts(room_id, agent_id);
            ",
        )
        .map_err(|e| RuntimeError::Fatal(format!("failed to run migrations: {e}")))?;
        Ok(())
    }

    pub fn log_event(&self, session_id: Option<&str>, event_type: &str, event_data: &serde_json::Value, now_ms: i64) -> Result<(), RuntimeError> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        conn.execute(
            "INSERT INTO event_log (session_id, event_type, event_data, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, event_type, event_data.to_string(), now_ms],
        )
        .map_err(|e| RuntimeError::TransientIo(e.to_string()))?;
        Ok(())
    }
}

fn sender_id_to_column(sender: &SenderId) -> String {
    sender.to_string()
}

fn sender_id_from_column(raw: &str) -> SenderId {
    if let Some(id) = raw.strip_prefix("agent:") {
        SenderId::Agent(AgentId::new(id))
    } else if let Some(id) = raw.strip_prefix("user:") {
        SenderId::User(crate::ids::UserId::new(id))
    } else {
        SenderId::System
    }
}

fn message_type_to_column(kind: MessageType) -> &'static str {
    match kind {
        MessageType::Chat => "chat",
        MessageType::System => "system",
        MessageType::Action => "action",
        MessageType::Join => "join",
        MessageType::Leave => "leave",
    }
}

fn message_type_from_column(raw: &str) -> MessageType {
    match raw {
        "system" => MessageType::System,
        "action" => MessageType::Action,
        "join" => MessageType::Join,
        "leave" => MessageType::Leave,
        _ => MessageType::Chat,
    }
}

#[async_trait]
impl super::PersistenceExecutor for SqlitePersistence {
    async fn persist_message(&self, message: ChatMessage) -> Result<(), RuntimeError> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        conn.execute(
            "INSERT INTO messages (id, room_id, sender_id, sender_name, content, type, mentions, attachments, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                message.id.as_str(),
                message.room_id.as_str(),
                sender_id_to_column(&message.sender_id),
                message.sender_name,
                message.content,
                message_type_to_column(message.message_type),
                serde_json::to_string(&message.mentions).unwrap_or_else(|_| "[]".to_string()),
                serde_json::to_string(&message.attachments).unwrap_or_else(|_| "[]".to_string()),
                message.timestamp_ms,
            ],
        )
        .map_err(|e| RuntimeError::TransientIo(e.to_string()))?;
        Ok(())
    }

    async fn delete_room_messages(&self, room_id: RoomId) -> Result<(), RuntimeError> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        conn.execute("DELETE FROM messages WHERE room_id = ?1", params![room_id.as_str()])
            .map_err(|e| RuntimeError::TransientIo(e.to_string()))?;
        Ok(())
    }

    async fn upsert_room_config(&self, config: RoomConfig) -> Result<(), RuntimeError> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        conn.execute(
            "INSERT INTO rooms (id, name, description, topic, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, description = excluded.description,
                topic = excluded.topic, updated_at = excluded.updated_at",
            params![config.id.as_str(), config.name, config.description, config.topic, config.created_at_ms],
        )
        .map_err(|e| RuntimeError::TransientIo(e.to_string()))?;
        Ok(())
    }

    async fn upsert_task(&self, project_room_id: RoomId, task: Task) -> Result<(), RuntimeError> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        let status = match task.status {
            TaskStatus::Unassigned => "unassigned",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        };
        let payload = serde_json::json!({
            "title": task.title,
            "description": task.description,
            "priority": task.priority,
            "status": status,
            "assigneeId": task.assignee_id,
            "artifacts": task.artifacts,
            "startedAt": task.started_at_ms,
            "completedAt": task.completed_at_ms,
            "error": task.error,
        });
        conn.execute(
            "INSERT INTO event_log (session_id, event_type, event_data, created_at) VALUES (?1, 'task_upsert', ?2, ?3)",
            params![project_room_id.as_str(), payload.to_string(), task.created_at_ms],
        )
        .map_err(|e| RuntimeError::TransientIo(e.to_string()))?;
        Ok(())
    }

    async fn upsert_artifact(
        &self,
        room_id: RoomId,
        agent_id: String,
        path: String,
        content: String,
    ) -> Result<(), RuntimeError> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        let now = chrono::Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO artifacts (id, room_id, agent_id, path, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(room_id, agent_id, path) DO UPDATE SET
                content = excluded.content, updated_at = excluded.updated_at",
            params![
                crate::ids::new_id("artifact"),
                room_id.as_str(),
                agent_id,
                path,
                content,
                now,
            ],
        )
        .map_err(|e| RuntimeError::TransientIo(e.to_string()))?;
        Ok(())
    }

    async fn delete_artifact(&self, room_id: RoomId, agent_id: String, path: String) -> Result<(), RuntimeError> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        conn.execute(
            "DELETE FROM artifacts WHERE room_id = ?1 AND agent_id = ?2 AND path = ?3",
            params![room_id.as_str(), agent_id, path],
        )
        .map_err(|e| RuntimeError::TransientIo(e.to_string()))?;
        Ok(())
    }

    async fn load_artifact(&self, room_id: RoomId, agent_id: String, path: String) -> Result<Option<String>, RuntimeError> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        conn.query_row(
            "SELECT content FROM artifacts WHERE room_id = ?1 AND agent_id = ?2 AND path = ?3",
            params![room_id.as_str(), agent_id, path],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| RuntimeError::TransientIo(e.to_string()))
    }

    async fn load_messages(&self, room_id: RoomId, limit: usize) -> Result<Vec<ChatMessage>, RuntimeError> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT id, room_id, sender_id, sender_name, content, type, mentions, attachments, created_at
                 FROM messages WHERE room_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            )
            .map_err(|e| RuntimeError::TransientIo(e.to_string()))?;
        let rows = stmt
            .query_map(params![room_id.as_str(), limit as i64], |row| {
                let mentions_raw: String = row.get(6)?;
                let attachments_raw: String = row.get(7)?;
                Ok(ChatMessage::new(
                    MessageId::new(row.get::<_, String>(0)?),
                    RoomId::new(row.get::<_, String>(1)?),
                    sender_id_from_column(&row.get::<_, String>(2)?),
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    message_type_from_column(&row.get::<_, String>(5)?),
                    row.get::<_, i64>(8)?,
                    None,
                    serde_json::from_str(&mentions_raw).unwrap_or_default(),
                    serde_json::from_str::<Vec<Attachment>>(&attachments_raw).unwrap_or_default(),
                ))
            })
            .map_err(|e| RuntimeError::TransientIo(e.to_string()))?;
        let mut messages: Vec<ChatMessage> = rows
            .collect::<Result<_, _>>()
            .map_err(|e| RuntimeError::TransientIo(e.to_string()))?;
        messages.reverse();
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::PersistenceExecutor;

    fn message(id: &str, room: &str, ts: i64) -> ChatMessage {
        ChatMessage::new(
            MessageId::new(id),
            RoomId::new(room),
            SenderId::User(crate::ids::UserId::new("u1")),
            "dana",
            "hello",
            MessageType::Chat,
            ts,
            None,
            vec!["B".to_string()],
            vec![],
        )
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        store.persist_message(message("m1", "r1", 1_000)).await.unwrap();
        store.persist_message(message("m2", "r1", 2_000)).await.unwrap();

        let loaded = store.load_messages(RoomId::new("r1"), 10).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, MessageId::new("m1"));
        assert_eq!(loaded[1].id, MessageId::new("m2"));
        assert_eq!(loaded[0].mentions, vec!["B".to_string()]);
    }

    #[tokio::test]
    async fn delete_room_messages_removes_all() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        store.persist_message(message("m1", "r1", 1_000)).await.unwrap();
        store.delete_room_messages(RoomId::new("r1")).await.unwrap();
        let loaded = store.load_messages(RoomId::new("r1"), 10).await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn artifact_upsert_then_load_round_trips() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        store
            .upsert_artifact(RoomId::new("r1"), "_shared_".to_string(), "notes.md".to_string(), "hello".to_string())
            .await
            .unwrap();
        let loaded = store.load_artifact(RoomId::new("r1"), "_shared_".to_string(), "notes.md".to_string()).await.unwrap();
        assert_eq!(loaded, Some("hello".to_string()));

        store
            .upsert_artifact(RoomId::new("r1"), "_shared_".to_string(), "notes.md".to_string(), "updated".to_string())
            .await
            .unwrap();
        let loaded = store.load_artifact(RoomId::new("r1"), "_shared_".to_string(), "notes.md".to_string()).await.unwrap();
        assert_eq!(loaded, Some("updated".to_string()));
    }

    #[tokio::test]
    async fn delete_artifact_removes_entry() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        store
            .upsert_artifact(RoomId::new("r1"), "a1".to_string(), "notes.md".to_string(), "hello".to_string())
            .await
            .unwrap();
        store.delete_artifact(RoomId::new("r1"), "a1".to_string(), "notes.md".to_string()).await.unwrap();
        let loaded = store.load_artifact(RoomId::new("r1"), "a1".to_string(), "notes.md".to_string()).await.unwrap();
        assert_eq!(loaded, None);
    }
}
