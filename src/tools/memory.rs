//! `memory` tool: a persistent key-value file store backed by
//! the artifacts table, keyed by `(roomId, agentId, path)`. The pseudo-agent
//! id `_shared_` denotes a room-wide entry any agent in the room may read or
//! write.

use crate::executor::PersistenceExecutor;
use crate::ids::RoomId;

pub const SHARED_AGENT_ID: &str = "_shared_";

pub struct MemoryArgs<'a> {
    pub command: &'a str,
    pub path: &'a str,
    pub file_text: Option<&'a str>,
    pub old_str: Option<&'a str>,
    pub new_str: Option<&'a str>,
    pub insert_line: Option<i64>,
    pub new_path: Option<&'a str>,
}

pub async fn run(
    args: MemoryArgs<'_>,
    room_id: RoomId,
    agent_id: &str,
    persistence: &dyn PersistenceExecutor,
) -> Result<String, String> {
    let agent_key = agent_id.to_string();

    match args.command {
        "view" => {
            let content = persistence
                .load_artifact(room_id, agent_key, args.path.to_string())
                .await
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("no memory entry at {}", args.path))?;
            Ok(content)
        }
        "create" => {
            let text = args.file_text.ok_or("create requires file_text")?.to_string();
            persistence
                .upsert_artifact(room_id, agent_key, args.path.to_string(), text)
                .await
                .map_err(|e| e.to_string())?;
            Ok(format!("created {}", args.path))
        }
        "str_replace" => {
            let old = args.old_str.ok_or("str_replace requires old_str")?;
            let new = args.new_str.unwrap_or("");
            let content = persistence
                .load_artifact(room_id.clone(), agent_key.clone(), args.path.to_string())
                .await
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("no memory entry at {}", args.path))?;
            let occurrences = content.matches(old).count();
            if occurrences == 0 {
                return Err(format!("search string not found in {}", args.path));
            }
            if occurrences > 1 {
                return Err(format!("search string is not unique in {} ({occurrences} occurrences)", args.path));
            }
            let replaced = content.replacen(old, new, 1);
            persistence
                .upsert_artifact(room_id, agent_key, args.path.to_string(), replaced)
                .await
                .map_err(|e| e.to_string())?;
            Ok(format!("replaced one occurrence in {}", args.path))
        }
        "insert" => {
            let new = args.new_str.ok_or("insert requires new_str")?;
            let line = args.insert_line.ok_or("insert requires insert_line")?;
            let content = persistence
                .load_artifact(room_id.clone(), agent_key.clone(), args.path.to_string())
                .await
                .map_err(|e| e.to_string())?
                .unwrap_or_default();
            let mut lines: Vec<&str> = content.lines().collect();
            let index = (line.max(0) as usize).min(lines.len());
            lines.insert(index, new);
            let joined = lines.join("\n") + "\n";
            persistence
                .upsert_artifact(room_id, agent_key, args.path.to_string(), joined)
                .await
                .map_err(|e| e.to_string())?;
            Ok(format!("inserted at line {line} in {}", args.path))
        }
        "delete" => {
            persistence
                .delete_artifact(room_id, agent_key, args.path.to_string())
                .await
                .map_err(|e| e.to_string())?;
            Ok(format!("deleted {}", args.path))
        }
        "rename" => {
            let new_path = args.new_path.ok_or("rename requires new_path")?;
            let content = persistence
                .load_artifact(room_id.clone(), agent_key.clone(), args.path.to_string())
                .await
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("no memory entry at {}", args.path))?;
            persistence
                .upsert_artifact(room_id.clone(), agent_key.clone(), new_path.to_string(), content)
                .await
                .map_err(|e| e.to_string())?;
            persistence
                .delete_artifact(room_id, agent_key, args.path.to_string())
                .await
                .map_err(|e| e.to_string())?;
            Ok(format!("renamed {} to {new_path}", args.path))
        }
        other => Err(format!("unknown memory command: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::persistence::SqlitePersistence;

    fn args<'a>(command: &'a str, path: &'a str) -> MemoryArgs<'a> {
        MemoryArgs { command, path, file_text: None, old_str: None, new_str: None, insert_line: None, new_path: None }
    }

    #[tokio::test]
    async fn create_then_view_round_trips() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        let mut create = args("create", "notes.md");
        create.file_text = Some("hello");
        run(create, RoomId::new("r1"), SHARED_AGENT_ID, &store).await.unwrap();

        let view = args("view", "notes.md");
        let output = run(view, RoomId::new("r1"), SHARED_AGENT_ID, &store).await.unwrap();
        assert_eq!(output, "hello");
    }

    #[tokio::test]
    async fn rename_moves_content_to_new_path() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        let mut create = args("create", "old.md");
        create.file_text = Some("content");
        run(create, RoomId::new("r1"), "a1", &store).await.unwrap();

        let mut rename = args("rename", "old.md");
        rename.new_path = Some("new.md");
        run(rename, RoomId::new("r1"), "a1", &store).await.unwrap();

        let view = args("view", "new.md");
        let output = run(view, RoomId::new("r1"), "a1", &store).await.unwrap();
        assert_eq!(output, "content");

        let missing = run(args("view", "old.md"), RoomId::new("r1"), "a1", &store).await;
        assert!(missing.is_err());
    }
}
