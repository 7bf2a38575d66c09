//! SQLite-backed [`IndexStore`].
//!
//! One database file per session directory: `<db_path>/recall.db`.
//!
//! ## Database Schema
//!
//! ```sql
//! -- Entries table: one row per embedded chunk, seq is insertion order
//! CREATE TABLE entries (
//!     seq INTEGER PRIMARY KEY AUTOINCREMENT,
//!     id TEXT UNIQUE NOT NULL,          -- chunk ID (path hash + ordinal)
//!     source_path TEXT NOT NULL,
//!     filename TEXT NOT NULL,
//!     chunk_idx INTEGER NOT NULL,
//!     content TEXT NOT NULL,
//!     embedding BLOB NOT NULL,          -- f16 vector, little-endian
//!     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
//! );
//!
//! -- Files table: last successfully indexed fingerprint per file
//! CREATE TABLE files (
//!     path TEXT PRIMARY KEY,
//!     hash TEXT NOT NULL,               -- blake3 hex
//!     extension TEXT,
//!     indexed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
//! );
//! ```
//!
//! The connection runs in WAL mode with `synchronous = NORMAL`, so committed
//! upserts and deletes survive the process and are visible to the next query
//! on the same pool.

use super::{FileFingerprint, FingerprintStore, IndexEntry, ScoredEntry, VectorStore, rank};
use anyhow::{Context, Result};
use async_trait::async_trait;
use half::f16;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};

/// File name of the database inside the session directory
pub const DB_FILE_NAME: &str = "recall.db";

#[derive(Clone, Debug)]
pub struct SqliteStore {
    location: Option<PathBuf>,
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the store under the directory `db_dir`.
    pub async fn open(db_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(db_dir)
            .await
            .with_context(|| format!("Failed to create database directory {}", db_dir.display()))?;
        let db_path = db_dir.join(DB_FILE_NAME);

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(&db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .create_if_missing(true)
                .page_size(1 << 16)
                .optimize_on_close(true, 1 << 10),
        )
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

        tracing::debug!("Opened vector store at {}", db_path.display());
        Self::new_with_pool(Some(db_path), pool).await
    }

    /// Opens a store backed by an in-memory SQLite database.
    pub async fn open_memory() -> Result<Self> {
        // A single connection, otherwise every pooled connection gets its own database
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::new_with_pool(None, pool).await
    }

    async fn new_with_pool(location: Option<PathBuf>, pool: SqlitePool) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { location, pool })
    }

    /// Path of the database file, `None` for in-memory stores
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                source_path TEXT NOT NULL,
                filename TEXT NOT NULL,
                chunk_idx INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                path TEXT PRIMARY KEY,
                hash TEXT NOT NULL,
                extension TEXT,
                indexed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_source ON entries(source_path)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Close the pool, flushing the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Little-endian f16 pairs, independent of the host byte order
fn encode_embedding(embedding: &[f16]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f16> {
    bytes
        .chunks_exact(2)
        .map(|pair| f16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

fn entry_from_row(row: &SqliteRow) -> IndexEntry {
    let chunk_idx: i64 = row.get("chunk_idx");
    let embedding: Vec<u8> = row.get("embedding");
    IndexEntry {
        id: row.get("id"),
        source_path: row.get("source_path"),
        filename: row.get("filename"),
        chunk_idx: chunk_idx as usize,
        text: row.get("content"),
        embedding: decode_embedding(&embedding),
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for entry in &entries {
            sqlx::query(
                r#"
                INSERT INTO entries (id, source_path, filename, chunk_idx, content, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    source_path = excluded.source_path,
                    filename = excluded.filename,
                    chunk_idx = excluded.chunk_idx,
                    content = excluded.content,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.source_path)
            .bind(&entry.filename)
            .bind(entry.chunk_idx as i64)
            .bind(&entry.text)
            .bind(encode_embedding(&entry.embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_by_source(&self, source_path: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM entries WHERE source_path = ?1")
            .bind(source_path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn query(&self, vector: &[f16], limit: usize) -> Result<Vec<ScoredEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT id, source_path, filename, chunk_idx, content, embedding FROM entries ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rank(rows.iter().map(entry_from_row), vector, limit))
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM entries")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FingerprintStore for SqliteStore {
    async fn fingerprint(&self, path: &str) -> Result<Option<FileFingerprint>> {
        let row = sqlx::query("SELECT path, hash, extension FROM files WHERE path = ?1")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| FileFingerprint {
            path: row.get("path"),
            hash: row.get("hash"),
            extension: row.get("extension"),
        }))
    }

    async fn record_fingerprint(&self, fingerprint: FileFingerprint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO files (path, hash, extension, indexed_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(path) DO UPDATE SET
                hash = excluded.hash,
                extension = excluded.extension,
                indexed_at = datetime('now')
            "#,
        )
        .bind(&fingerprint.path)
        .bind(&fingerprint.hash)
        .bind(&fingerprint.extension)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn forget_fingerprint(&self, path: &str) -> Result<()> {
        sqlx::query("DELETE FROM files WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn tracked_files(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn clear_fingerprints(&self) -> Result<()> {
        sqlx::query("DELETE FROM files").execute(&self.pool).await?;
        Ok(())
    }
}
