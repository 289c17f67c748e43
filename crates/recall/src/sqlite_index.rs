//! SQLite-backed vector index.
//!
//! Persistent implementation of [`VectorIndex`] over the `chunks` table.
//! Embeddings are stored as little-endian f32 BLOBs; queries load the
//! candidate rows and rank them by cosine similarity in Rust. Rows come
//! back in rowid order and the sort is stable, so equal scores rank by
//! insertion order — upserts use `ON CONFLICT ... DO UPDATE`, which keeps
//! a replaced chunk's original rowid.

use async_trait::async_trait;
use sqlx::SqlitePool;

use recall_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use recall_core::error::{Error, Result};
use recall_core::index::VectorIndex;
use recall_core::models::{DocumentChunk, ScoredChunk, SourceType};

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ChunkRow {
    id: String,
    source_id: String,
    source_type: String,
    title: String,
    url: Option<String>,
    position: i64,
    text: String,
    embedding: Vec<u8>,
}

fn parse_source_type(raw: &str) -> Result<SourceType> {
    match raw {
        "note" => Ok(SourceType::Note),
        "bookmark" => Ok(SourceType::Bookmark),
        other => Err(Error::Index(format!("unknown source_type: {}", other))),
    }
}

impl ChunkRow {
    fn into_chunk(self) -> Result<DocumentChunk> {
        Ok(DocumentChunk {
            source_type: parse_source_type(&self.source_type)?,
            embedding: blob_to_vec(&self.embedding),
            id: self.id,
            source_id: self.source_id,
            title: self.title,
            url: self.url,
            position: self.position,
            text: self.text,
        })
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, chunks: &[DocumentChunk]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Index(e.to_string()))?;

        let now = chrono::Utc::now().timestamp();
        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, source_id, source_type, title, url, position, text, embedding, inserted_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source_id = excluded.source_id,
                    source_type = excluded.source_type,
                    title = excluded.title,
                    url = excluded.url,
                    position = excluded.position,
                    text = excluded.text,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.source_id)
            .bind(chunk.source_type.to_string())
            .bind(&chunk.title)
            .bind(&chunk.url)
            .bind(chunk.position)
            .bind(&chunk.text)
            .bind(vec_to_blob(&chunk.embedding))
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Index(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| Error::Index(e.to_string()))?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        source_type: Option<SourceType>,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(Error::Index("query limit must be > 0".to_string()));
        }

        let rows: Vec<ChunkRow> = match source_type {
            Some(st) => sqlx::query_as(
                "SELECT id, source_id, source_type, title, url, position, text, embedding \
                 FROM chunks WHERE source_type = ? ORDER BY rowid",
            )
            .bind(st.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Index(e.to_string()))?,
            None => sqlx::query_as(
                "SELECT id, source_id, source_type, title, url, position, text, embedding \
                 FROM chunks ORDER BY rowid",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Index(e.to_string()))?,
        };

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let chunk = row.into_chunk()?;
            let score = cosine_similarity(vector, &chunk.embedding);
            scored.push(ScoredChunk { chunk, score });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Index(e.to_string()))?;
        Ok(count as u64)
    }
}
