//! Chat session history, stored in `chat_messages`.

use anyhow::Result;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Agent that produced an assistant message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub created_at: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            agent: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Append one message to `session_id`.
pub fn append_message(
    conn: &Connection,
    session_id: &str,
    role: Role,
    content: &str,
    agent: Option<&str>,
) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO chat_messages (session_id, role, content, agent, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![session_id, role.as_str(), content, agent, now],
    )?;
    Ok(())
}

/// The last `limit` messages of a session, oldest first.
pub fn load_history(conn: &Connection, session_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
    let mut stmt = conn.prepare(
        "SELECT role, content, agent, created_at FROM ( \
             SELECT id, role, content, agent, created_at FROM chat_messages \
             WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2 \
         ) ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![session_id, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(role, content, agent, created_at)| {
            Ok(ChatMessage {
                role: role.parse().map_err(anyhow::Error::msg)?,
                content,
                agent,
                created_at,
            })
        })
        .collect()
}
