//! SQLite conversation store

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

use duet_core::{Conversation, ConversationStore, ConversationSummary, Message, Role};

#[derive(Debug, Error)]
#[error("unknown message role '{0}'")]
struct UnknownRole(String);

/// SQLite-backed conversation store (thread-safe via Arc<Mutex>)
pub struct SqliteConversationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteConversationStore {
    /// Open (or create) the database at `path` and initialize the schema
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).context("Failed to open SQLite database")?;
        info!("Initializing conversation database at {:?}", path.as_ref());
        Self::init(conn)
    }

    /// In-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                conversation_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                PRIMARY KEY (conversation_id, seq),
                FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_conversations_owner
             ON conversations(owner_id, updated_at)",
            [],
        )?;

        debug!("Conversation schema initialized");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
        conn.lock().unwrap_or_else(|poisoned| {
            warn!("Database mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
        let role: String = row.get(0)?;
        let role = Role::parse(&role).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(UnknownRole(role.clone())),
            )
        })?;
        Ok(Message {
            role,
            content: row.get(1)?,
            timestamp: row.get(2)?,
        })
    }
}

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp column; a corrupt value fails the read
fn parse_ts(idx: usize, s: String) -> rusqlite::Result<DateTime<Utc>> {
    s.parse().map_err(|e: chrono::ParseError| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn create(&self, owner_id: &str, name: &str) -> Result<Conversation> {
        let conn = Arc::clone(&self.conn);
        let conversation = Conversation::new(owner_id, name);

        tokio::task::spawn_blocking(move || {
            let conn = Self::lock(&conn);
            conn.execute(
                "INSERT INTO conversations (id, owner_id, name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    &conversation.id,
                    &conversation.owner_id,
                    &conversation.name,
                    ts(&conversation.created_at),
                    ts(&conversation.updated_at),
                ],
            )?;
            info!(
                "Created conversation '{}' ({}) for {}",
                conversation.name, conversation.id, conversation.owner_id
            );
            Ok(conversation)
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    async fn load(&self, owner_id: &str, conversation_id: &str) -> Result<Option<Conversation>> {
        let conn = Arc::clone(&self.conn);
        let owner_id = owner_id.to_owned();
        let conversation_id = conversation_id.to_owned();

        tokio::task::spawn_blocking(move || {
            let conn = Self::lock(&conn);
            let header = conn
                .query_row(
                    "SELECT name, created_at, updated_at
                     FROM conversations WHERE id = ?1 AND owner_id = ?2",
                    params![&conversation_id, &owner_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            parse_ts(1, row.get(1)?)?,
                            parse_ts(2, row.get(2)?)?,
                        ))
                    },
                )
                .optional()?;

            let Some((name, created_at, updated_at)) = header else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT role, content, timestamp FROM messages
                 WHERE conversation_id = ?1 ORDER BY seq ASC",
            )?;
            let messages = stmt
                .query_map(params![&conversation_id], Self::row_to_message)?
                .collect::<Result<Vec<_>, _>>()?;

            let persisted_len = messages.len();
            Ok(Some(Conversation {
                id: conversation_id,
                owner_id,
                name,
                messages,
                created_at,
                updated_at,
                persisted_len,
            }))
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<ConversationSummary>> {
        let conn = Arc::clone(&self.conn);
        let owner_id = owner_id.to_owned();

        tokio::task::spawn_blocking(move || {
            let conn = Self::lock(&conn);
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.created_at, c.updated_at,
                        (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id)
                 FROM conversations c
                 WHERE c.owner_id = ?1
                 ORDER BY c.updated_at DESC",
            )?;
            let summaries = stmt
                .query_map(params![&owner_id], |row| {
                    Ok(ConversationSummary {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: parse_ts(2, row.get(2)?)?,
                        updated_at: parse_ts(3, row.get(3)?)?,
                        message_count: row.get::<_, i64>(4)? as usize,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(summaries)
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    async fn save(&self, conversation: &mut Conversation) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let snapshot = conversation.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let conversation = snapshot;
            let mut conn = Self::lock(&conn);
            let tx = conn.transaction()?;

            let owner: Option<String> = tx
                .query_row(
                    "SELECT owner_id FROM conversations WHERE id = ?1",
                    params![&conversation.id],
                    |row| row.get(0),
                )
                .optional()?;
            match owner {
                Some(owner) if owner == conversation.owner_id => {}
                _ => return Err(anyhow!("Conversation {} does not exist", conversation.id)),
            }

            let stored: i64 = tx.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
                params![&conversation.id],
                |row| row.get(0),
            )?;
            let stored = stored as usize;
            // Another writer appended since this copy was loaded
            if stored != conversation.persisted_len {
                return Err(anyhow!(
                    "Conversation {} changed since it was loaded ({} stored, expected {})",
                    conversation.id,
                    stored,
                    conversation.persisted_len
                ));
            }
            if conversation.messages.len() < stored {
                return Err(anyhow!(
                    "Conversation {} has {} stored messages but only {} in memory",
                    conversation.id,
                    stored,
                    conversation.messages.len()
                ));
            }

            {
                let mut insert = tx.prepare(
                    "INSERT INTO messages (conversation_id, seq, role, content, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for (seq, msg) in conversation.messages.iter().enumerate().skip(stored) {
                    insert.execute(params![
                        &conversation.id,
                        seq as i64,
                        msg.role.to_string(),
                        &msg.content,
                        msg.timestamp,
                    ])?;
                }
            }

            tx.execute(
                "UPDATE conversations SET name = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    &conversation.name,
                    ts(&conversation.updated_at),
                    &conversation.id
                ],
            )?;
            tx.commit()?;

            debug!(
                "Saved conversation {} ({} new messages)",
                conversation.id,
                conversation.messages.len() - stored
            );
            Ok(())
        })
        .await
        .context("spawn_blocking task panicked")??;

        conversation.mark_persisted();
        Ok(())
    }
}
