//! Persisted similarity index.
//!
//! One SQLite database per repository, stored at
//! `<index.dir>/<repo short name>.sqlite` and holding every source chunk
//! alongside its embedding vector. The index is built at most once per
//! on-disk state: when the database file already exists it is reused
//! without re-scanning or re-embedding, so it can silently diverge from
//! the current checkout until rebuilt explicitly.
//!
//! Queries embed the query text and cosine-rank every stored vector in
//! process, returning the top-K chunks.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::chunk::chunk_source;
use crate::config::{Config, Credentials};
use crate::embedding;
use crate::error::PipelineError;
use crate::models::{RetrievedChunk, SourceChunk};
use crate::scan::scan_repository;

/// The repository's short name: everything after the last `/` of
/// `owner/repo`.
pub fn repo_short_name(repo: &str) -> &str {
    repo.rsplit('/').next().unwrap_or(repo)
}

/// Deterministic on-disk location of a repository's index.
pub fn index_path(config: &Config, repo: &str) -> PathBuf {
    config
        .index
        .dir
        .join(format!("{}.sqlite", repo_short_name(repo)))
}

/// Summary counters for a persisted index.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub chunks: i64,
    pub model: String,
    pub dims: i64,
    pub created_at: i64,
}

#[derive(Debug)]
pub struct SimilarityIndex {
    pool: SqlitePool,
}

impl SimilarityIndex {
    /// Open an existing index; the database file must already exist.
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::NotFound(format!(
                "no similarity index at {}",
                path.display()
            ))
            .into());
        }
        let pool = connect(path, false).await?;
        Ok(Self { pool })
    }

    /// Open the repository's index if one is persisted, otherwise build it.
    ///
    /// The reuse path never touches the scanner or the embedding provider.
    pub async fn open_or_build(config: &Config, creds: &Credentials, repo: &str) -> Result<Self> {
        let path = index_path(config, repo);
        if path.exists() {
            return Self::open(&path).await;
        }
        Self::build(config, creds, &path).await
    }

    /// Delete any persisted index for the repository, then build afresh.
    pub async fn rebuild(config: &Config, creds: &Credentials, repo: &str) -> Result<Self> {
        let path = index_path(config, repo);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        let _ = std::fs::remove_file(format!("{}-wal", path.display()));
        let _ = std::fs::remove_file(format!("{}-shm", path.display()));
        Self::build(config, creds, &path).await
    }

    async fn build(config: &Config, creds: &Credentials, path: &Path) -> Result<Self> {
        let files = scan_repository(config)?;

        let mut chunks: Vec<SourceChunk> = Vec::new();
        for file in &files {
            chunks.extend(chunk_source(
                &file.path,
                &file.body,
                config.index.max_chunk_chars,
            ));
        }

        if chunks.is_empty() {
            return Err(PipelineError::Validation(format!(
                "no source text to index under {}",
                config.index.root.display()
            ))
            .into());
        }

        let provider = embedding::create_provider(&config.embedding)?;

        // Embed every chunk before touching the database so a failed
        // provider call leaves no half-built index on disk.
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(config.embedding.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let batch_vectors = embedding::embed_texts(&config.embedding, creds, &texts).await?;

            if batch_vectors.len() != batch.len() {
                return Err(PipelineError::Validation(format!(
                    "embedding count mismatch: sent {} texts, got {} vectors",
                    batch.len(),
                    batch_vectors.len()
                ))
                .into());
            }
            for vector in &batch_vectors {
                if vector.len() != provider.dims() {
                    return Err(PipelineError::Validation(format!(
                        "embedding dims mismatch: expected {}, got {}",
                        provider.dims(),
                        vector.len()
                    ))
                    .into());
                }
            }
            vectors.extend(batch_vectors);
        }

        let pool = connect(path, true).await?;
        let index = Self { pool };
        index.create_schema().await?;
        index
            .store(&chunks, &vectors, provider.model_name(), provider.dims())
            .await?;
        Ok(index)
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                hash TEXT NOT NULL,
                UNIQUE(source, chunk_index)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunk_vectors (
                chunk_id TEXT PRIMARY KEY,
                embedding BLOB NOT NULL,
                FOREIGN KEY (chunk_id) REFERENCES chunks(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS index_meta (
                model TEXT NOT NULL,
                dims INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn store(
        &self,
        chunks: &[SourceChunk],
        vectors: &[Vec<f32>],
        model: &str,
        dims: usize,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                "INSERT INTO chunks (id, source, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.source)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO chunk_vectors (chunk_id, embedding) VALUES (?, ?)")
                .bind(&chunk.id)
                .bind(embedding::vec_to_blob(vector))
                .execute(&mut *tx)
                .await?;
        }

        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO index_meta (model, dims, created_at) VALUES (?, ?, ?)")
            .bind(model)
            .bind(dims as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Embed the query text and return the K most similar chunks, highest
    /// score first.
    pub async fn query(
        &self,
        config: &Config,
        creds: &Credentials,
        text: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let query_vec = embedding::embed_query(&config.embedding, creds, text).await?;
        self.query_vector(&query_vec, k).await
    }

    /// Rank every stored vector by cosine similarity against `query_vec`.
    async fn query_vector(&self, query_vec: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.source, c.text, cv.embedding
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut results: Vec<RetrievedChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = embedding::blob_to_vec(&blob);
                RetrievedChunk {
                    source: row.get("source"),
                    text: row.get("text"),
                    score: embedding::cosine_similarity(query_vec, &vector) as f64,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);

        Ok(results)
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;

        let meta = sqlx::query("SELECT model, dims, created_at FROM index_meta LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        let (model, dims, created_at) = match meta {
            Some(row) => (row.get("model"), row.get("dims"), row.get("created_at")),
            None => ("unknown".to_string(), 0, 0),
        };

        Ok(IndexStats {
            chunks,
            model,
            dims,
            created_at,
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn connect(path: &Path, create: bool) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(create)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
