//! SQLite [`Store`] backend (feature `sqlite`).
//!
//! One connection behind a mutex. Every call runs on the blocking pool, and
//! upserts are `INSERT ... ON CONFLICT DO NOTHING` followed by a `SELECT`
//! under the same lock, so concurrent units never race on a natural key.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, Row};

use super::{
    NewSend, RecipientId, SendHistoryEntry, SendId, SendStatus, SenderId, Stats, Store,
    StoredRecipient, TemplateId,
};
use crate::error::StoreError;
use crate::recipient::Recipient;

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS email_contents (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    subject     TEXT NOT NULL,
    body        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS senders (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    email       TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS recipients (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    email       TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL DEFAULT '',
    company     TEXT NOT NULL DEFAULT '',
    city        TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS email_sends (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    email_content_id  INTEGER NOT NULL REFERENCES email_contents(id),
    sender_id         INTEGER REFERENCES senders(id),
    recipient_id      INTEGER REFERENCES recipients(id),
    status            TEXT NOT NULL,
    error_message     TEXT,
    sent_at           TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_email_sends_sent_at ON email_sends(sent_at);
";

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("SQLite schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {}", e)))?
    }
}

impl ToSql for SendStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SendStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: StoreError| FromSqlError::Other(Box::new(e)))
    }
}

fn recipient_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRecipient> {
    Ok(StoredRecipient {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        company: row.get(3)?,
        city: row.get(4)?,
        created_at: row.get(5)?,
    })
}

const RECIPIENT_COLUMNS: &str = "id, email, name, company, city, created_at";

#[async_trait]
impl Store for SqliteStore {
    async fn insert_template(&self, subject: &str, body: &str) -> Result<TemplateId, StoreError> {
        let (subject, body) = (subject.to_string(), body.to_string());
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO email_contents (subject, body, created_at) VALUES (?1, ?2, ?3)",
                params![subject, body, Utc::now()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn upsert_sender(
        &self,
        address: &str,
        display_name: &str,
    ) -> Result<SenderId, StoreError> {
        let (address, display_name) = (address.to_string(), display_name.to_string());
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO senders (email, name, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(email) DO NOTHING",
                params![address, display_name, Utc::now()],
            )?;
            let id = conn.query_row(
                "SELECT id FROM senders WHERE email = ?1",
                params![address],
                |row| row.get(0),
            )?;
            Ok(id)
        })
        .await
    }

    async fn upsert_recipient(&self, recipient: &Recipient) -> Result<RecipientId, StoreError> {
        let recipient = recipient.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO recipients (email, name, company, city, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(email) DO NOTHING",
                params![
                    recipient.email,
                    recipient.name,
                    recipient.company,
                    recipient.city,
                    Utc::now()
                ],
            )?;
            let id = conn.query_row(
                "SELECT id FROM recipients WHERE email = ?1",
                params![recipient.email],
                |row| row.get(0),
            )?;
            Ok(id)
        })
        .await
    }

    async fn append_send(&self, send: NewSend) -> Result<SendId, StoreError> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO email_sends
                 (email_content_id, sender_id, recipient_id, status, error_message, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    send.template_id,
                    send.sender_id,
                    send.recipient_id,
                    send.status,
                    send.error,
                    send.sent_at
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn history(&self) -> Result<Vec<SendHistoryEntry>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT es.id, ec.subject, s.email, s.name, r.email, r.name,
                        es.status, es.error_message, es.sent_at
                 FROM email_sends es
                 JOIN email_contents ec ON ec.id = es.email_content_id
                 LEFT JOIN senders s ON s.id = es.sender_id
                 LEFT JOIN recipients r ON r.id = es.recipient_id
                 ORDER BY es.sent_at DESC, es.id DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(SendHistoryEntry {
                    id: row.get(0)?,
                    subject: row.get(1)?,
                    sender_address: row.get(2)?,
                    sender_name: row.get(3)?,
                    recipient_email: row.get(4)?,
                    recipient_name: row.get(5)?,
                    status: row.get(6)?,
                    error: row.get(7)?,
                    sent_at: row.get::<_, DateTime<Utc>>(8)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn stats(&self) -> Result<Stats, StoreError> {
        self.run(|conn| {
            let (total_sends, sent, failed): (i64, i64, i64) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN status = 'sent' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0)
                 FROM email_sends",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;
            let total_recipients: i64 =
                conn.query_row("SELECT COUNT(*) FROM recipients", [], |row| row.get(0))?;
            let total_senders: i64 =
                conn.query_row("SELECT COUNT(*) FROM senders", [], |row| row.get(0))?;

            Ok(Stats {
                total_sends: total_sends as u64,
                sent: sent as u64,
                failed: failed as u64,
                total_recipients: total_recipients as u64,
                total_senders: total_senders as u64,
            })
        })
        .await
    }

    async fn recipients(&self) -> Result<Vec<StoredRecipient>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM recipients ORDER BY id DESC",
                RECIPIENT_COLUMNS
            ))?;
            let rows = stmt.query_map([], recipient_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn search_recipients(&self, fragment: &str) -> Result<Vec<StoredRecipient>, StoreError> {
        let pattern = format!(
            "%{}%",
            fragment
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM recipients WHERE email LIKE ?1 ESCAPE '\\' ORDER BY id DESC",
                RECIPIENT_COLUMNS
            ))?;
            let rows = stmt.query_map(params![pattern], recipient_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn prune_sends(&self, older_than: chrono::Duration) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - older_than;
        let removed = self
            .run(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM email_sends WHERE sent_at < ?1",
                    params![cutoff],
                )?)
            })
            .await?;
        tracing::info!(removed, "Pruned old send records");
        Ok(removed as u64)
    }
}
