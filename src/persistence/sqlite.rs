use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row, Transaction};
use tracing::{debug, info};

use crate::orchestrator::types::TurnRole;
use crate::session::history::{ConversationSession, NewTurn, Turn};

/// Provides SQLCipher key material for the local database.
pub trait KeyResolver: Send + Sync {
    fn resolve_key(&self) -> Result<Option<String>>;
}

/// Key resolver that reads the key material from the `MOCKCHAT_SQLCIPHER_KEY` env variable.
#[derive(Default)]
pub struct EnvKeyResolver;

impl KeyResolver for EnvKeyResolver {
    fn resolve_key(&self) -> Result<Option<String>> {
        Ok(std::env::var("MOCKCHAT_SQLCIPHER_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty()))
    }
}

/// Storage location configuration for the conversation database.
#[derive(Debug, Clone)]
pub enum SqlitePath {
    File(PathBuf),
    Memory,
}

impl SqlitePath {
    fn to_manager(&self) -> SqliteConnectionManager {
        match self {
            SqlitePath::File(path) => {
                SqliteConnectionManager::file(path).with_flags(Self::open_flags())
            }
            SqlitePath::Memory => SqliteConnectionManager::memory().with_flags(Self::open_flags()),
        }
    }

    fn open_flags() -> OpenFlags {
        OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX
    }

    fn as_path(&self) -> Option<&Path> {
        match self {
            SqlitePath::File(path) => Some(path.as_path()),
            SqlitePath::Memory => None,
        }
    }
}

/// Configuration required to bootstrap persistence.
#[derive(Clone)]
pub struct SqliteConfig {
    pub path: SqlitePath,
    pub pool_size: u32,
    pub busy_timeout: Duration,
    pub key_resolver: Arc<dyn KeyResolver>,
}

impl SqliteConfig {
    /// Private in-memory database. Pinned to a single pooled connection so every
    /// caller sees the same data.
    pub fn memory() -> Self {
        Self {
            path: SqlitePath::Memory,
            pool_size: 1,
            busy_timeout: Duration::from_millis(250),
            key_resolver: Arc::new(EnvKeyResolver::default()),
        }
    }

    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: SqlitePath::File(path.into()),
            pool_size: 8,
            busy_timeout: Duration::from_millis(250),
            key_resolver: Arc::new(EnvKeyResolver::default()),
        }
    }
}

/// Handle that manages SQLite backed persistence of sessions and turns.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: Pool<SqliteConnectionManager>,
    db_path: Option<PathBuf>,
}

impl SqlitePersistence {
    /// Bootstraps the connection pool and runs the database migrations.
    pub fn bootstrap(config: SqliteConfig) -> Result<Self> {
        let key_material = config.key_resolver.resolve_key()?;
        let key_for_init = key_material.clone();
        let busy_timeout = config.busy_timeout;
        let manager = config.path.to_manager().with_init(move |conn| {
            Self::configure_connection(conn, busy_timeout, key_for_init.as_deref())
        });

        let mut builder = Pool::builder()
            .max_size(config.pool_size.max(1))
            .connection_timeout(Duration::from_secs(5));
        if matches!(config.path, SqlitePath::Memory) {
            // An in-memory database lives exactly as long as its connection.
            builder = builder
                .max_size(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = builder
            .build(manager)
            .context("failed to create SQLite connection pool")?;

        {
            let mut conn = pool
                .get()
                .context("failed to acquire SQLite bootstrap connection")?;
            Self::verify_encryption(&mut conn, key_material.as_deref())?;
            Self::run_migrations(&mut conn)?;
        }

        info!(
            target: "persistence",
            path = ?config.path.as_path(),
            "conversation store ready"
        );

        Ok(Self {
            pool,
            db_path: config.path.as_path().map(Path::to_path_buf),
        })
    }

    /// Provides access to a pooled connection for custom commands.
    pub fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|err| anyhow!("failed to obtain SQLite connection: {err}"))
    }

    fn configure_connection(
        conn: &mut Connection,
        busy_timeout: Duration,
        key: Option<&str>,
    ) -> rusqlite::Result<()> {
        if let Some(value) = key {
            conn.pragma_update(None, "key", value)?;
        }
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
        Ok(())
    }

    fn verify_encryption(conn: &mut Connection, key: Option<&str>) -> Result<()> {
        if key.is_none() {
            return Ok(());
        }

        let cipher_version: String = conn
            .pragma_query_value(None, "cipher_version", |row| row.get(0))
            .context("cipher_version pragma unsupported; SQLCipher missing")?;

        if cipher_version.trim().is_empty() {
            return Err(anyhow!("SQLCipher cipher_version returned empty value"));
        }
        Ok(())
    }

    fn run_migrations(conn: &mut Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                secret_hash TEXT NOT NULL,
                language TEXT NOT NULL,
                subtitle_language TEXT NOT NULL DEFAULT '',
                voice TEXT NOT NULL DEFAULT '',
                created_at_ms INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS turns (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL REFERENCES sessions(session_id),
                role TEXT NOT NULL CHECK (role IN ('system', 'assistant', 'user')),
                text TEXT NOT NULL,
                audio BLOB,
                concludes INTEGER NOT NULL DEFAULT 0,
                created_at_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS turns_by_session ON turns(session_id, seq);

            CREATE TRIGGER IF NOT EXISTS sessions_immutable BEFORE UPDATE ON sessions BEGIN
                SELECT RAISE(ABORT, 'sessions are immutable');
            END;

            CREATE TRIGGER IF NOT EXISTS turns_append_only BEFORE UPDATE ON turns BEGIN
                SELECT RAISE(ABORT, 'turns are append-only');
            END;
            "#,
        )
        .context("failed to run SQLite migrations")?;

        Ok(())
    }

    /// Writes a new session and its opening turns in one transaction.
    pub fn create_session_with_turns(
        &self,
        session: &ConversationSession,
        turns: &[NewTurn],
    ) -> Result<()> {
        match turns.first() {
            Some(first) if first.role == TurnRole::System => {}
            _ => return Err(anyhow!("session history must open with a system turn")),
        }

        let mut conn = self.connection()?;
        let tx = conn
            .transaction()
            .context("failed to open transaction for session create")?;

        tx.execute(
            "INSERT INTO sessions (
                session_id,
                secret_hash,
                language,
                subtitle_language,
                voice,
                created_at_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.id,
                session.secret_hash,
                session.conversation_language,
                session.subtitle_language,
                session.voice_profile,
                session.created_at_ms,
            ],
        )
        .context("failed to insert session record")?;

        Self::insert_turns(&tx, &session.id, turns)?;

        tx.commit().context("failed to commit session create")?;
        debug!(
            target: "persistence",
            session_id = %session.id,
            turns = turns.len(),
            "session created"
        );
        Ok(())
    }

    /// Appends a batch of turns. Any failure rolls the whole batch back.
    pub fn append_turns(&self, session_id: &str, turns: &[NewTurn]) -> Result<()> {
        if turns.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection()?;
        let tx = conn
            .transaction()
            .context("failed to open transaction for turn append")?;

        let exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(anyhow!("session {session_id} not found for turn append"));
        }

        Self::insert_turns(&tx, session_id, turns)?;

        tx.commit().context("failed to commit turn append")?;
        debug!(
            target: "persistence",
            session_id,
            turns = turns.len(),
            "turns appended"
        );
        Ok(())
    }

    fn insert_turns(tx: &Transaction<'_>, session_id: &str, turns: &[NewTurn]) -> Result<()> {
        let now = now_ms();
        let mut stmt = tx.prepare(
            "INSERT INTO turns (session_id, role, text, audio, concludes, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for turn in turns {
            stmt.execute(params![
                session_id,
                turn.role.as_str(),
                turn.text,
                turn.audio.as_deref(),
                turn.concludes,
                now,
            ])
            .with_context(|| format!("failed to insert {} turn", turn.role.as_str()))?;
        }
        Ok(())
    }

    pub fn load_session(&self, session_id: &str) -> Result<Option<ConversationSession>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, secret_hash, language, subtitle_language, voice, created_at_ms
            FROM sessions WHERE session_id = ?1",
        )?;

        let session = stmt
            .query_row(params![session_id], |row| Self::read_session(row))
            .optional()?;
        Ok(session)
    }

    /// Full history of a session in conversation order.
    pub fn load_turns(&self, session_id: &str) -> Result<Vec<Turn>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT seq, session_id, role, text, audio, concludes, created_at_ms
            FROM turns WHERE session_id = ?1 ORDER BY seq ASC",
        )?;
        let mut rows = stmt.query(params![session_id])?;
        let mut turns = Vec::new();
        while let Some(row) = rows.next()? {
            turns.push(Self::read_turn(row)?);
        }
        Ok(turns)
    }

    pub fn count_turns(&self, session_id: &str) -> Result<i64> {
        let conn = self.connection()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM turns WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn ping(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .context("SQLite ping failed")?;
        Ok(())
    }

    fn read_session(row: &Row) -> rusqlite::Result<ConversationSession> {
        Ok(ConversationSession {
            id: row.get("session_id")?,
            secret_hash: row.get("secret_hash")?,
            conversation_language: row.get("language")?,
            subtitle_language: row.get("subtitle_language")?,
            voice_profile: row.get("voice")?,
            created_at_ms: row.get("created_at_ms")?,
        })
    }

    fn read_turn(row: &Row) -> Result<Turn> {
        let role: String = row.get("role")?;
        let role = TurnRole::from_db(&role).ok_or_else(|| anyhow!("unknown turn role {role}"))?;
        Ok(Turn {
            seq: row.get("seq")?,
            session_id: row.get("session_id")?,
            role,
            text: row.get("text")?,
            audio: row.get("audio")?,
            concludes: row.get("concludes")?,
            created_at_ms: row.get("created_at_ms")?,
        })
    }

    pub fn database_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
impl SqlitePersistence {
    pub fn run_migrations_for_tests(conn: &mut Connection) -> Result<()> {
        Self::run_migrations(conn)
    }
}
