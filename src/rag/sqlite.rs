//! SQLite-backed RAG store implementation.
//!
//! In-process vector store using SQLite for chunk metadata and
//! brute-force cosine similarity for search, filtered by department.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{ChunkScope, ChunkSearchResult, DepartmentCount, RagStore, StoredChunk};
use crate::core::errors::ApiError;
use crate::department::Department;

pub struct SqliteRagStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteRagStore {
    pub async fn open(db_path: &Path) -> Result<Self, ApiError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(ApiError::internal)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self {
            pool,
            db_path: db_path.to_path_buf(),
        };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_chunks (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                source TEXT NOT NULL,
                department TEXT NOT NULL
                    CHECK (department IN ('engineering', 'marketing', 'finance', 'hr')),
                scope TEXT NOT NULL DEFAULT 'department',
                chunk_index INTEGER NOT NULL DEFAULT 0,
                start_offset INTEGER NOT NULL DEFAULT 0,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_rag_department_source
             ON rag_chunks(department, source)",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    /// Rows with a department or scope outside the known set are skipped.
    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Option<StoredChunk> {
        let department_raw: String = row.get("department");
        let scope_raw: String = row.get("scope");
        let chunk_id: String = row.get("chunk_id");

        let Ok(department) = department_raw.parse::<Department>() else {
            tracing::warn!("Skipping chunk {} with unknown department '{}'", chunk_id, department_raw);
            return None;
        };
        let Some(scope) = ChunkScope::parse(&scope_raw) else {
            tracing::warn!("Skipping chunk {} with unknown scope '{}'", chunk_id, scope_raw);
            return None;
        };

        let chunk_index: i64 = row.get("chunk_index");
        let start_offset: i64 = row.get("start_offset");

        Some(StoredChunk {
            chunk_id,
            content: row.get("content"),
            source: row.get("source"),
            department,
            scope,
            chunk_index: chunk_index.max(0) as usize,
            start_offset: start_offset.max(0) as usize,
        })
    }
}

#[async_trait]
impl RagStore for SqliteRagStore {
    async fn replace_source(
        &self,
        department: Department,
        source: &str,
        items: Vec<(StoredChunk, Vec<f32>)>,
    ) -> Result<usize, ApiError> {
        if let Some((chunk, _)) = items
            .iter()
            .find(|(chunk, _)| chunk.department != department || chunk.source != source)
        {
            return Err(ApiError::BadRequest(format!(
                "Chunk {} does not belong to {}/{}",
                chunk.chunk_id, department, source
            )));
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        let removed = sqlx::query("DELETE FROM rag_chunks WHERE department = ?1 AND source = ?2")
            .bind(department.as_str())
            .bind(source)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?
            .rows_affected() as usize;

        for (chunk, embedding) in &items {
            let blob = Self::serialize_embedding(embedding);

            sqlx::query(
                "INSERT OR REPLACE INTO rag_chunks
                    (chunk_id, content, source, department, scope, chunk_index, start_offset, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.content)
            .bind(&chunk.source)
            .bind(chunk.department.as_str())
            .bind(chunk.scope.as_str())
            .bind(chunk.chunk_index as i64)
            .bind(chunk.start_offset as i64)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(removed)
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        department: Department,
    ) -> Result<Vec<ChunkSearchResult>, ApiError> {
        if query_embedding.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT chunk_id, content, source, department, scope, chunk_index, start_offset, embedding
             FROM rag_chunks
             WHERE department = ?1",
        )
        .bind(department.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut scored: Vec<ChunkSearchResult> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                let stored_emb = Self::deserialize_embedding(&embedding_bytes);
                if stored_emb.len() != query_embedding.len() {
                    return None;
                }
                let chunk = Self::row_to_chunk(row)?;
                let score = Self::cosine_similarity(query_embedding, &stored_emb);

                Some(ChunkSearchResult { chunk, score })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
        });
        scored.truncate(limit.max(1));

        Ok(scored)
    }

    async fn clear_department(&self, department: Department) -> Result<usize, ApiError> {
        let result = sqlx::query("DELETE FROM rag_chunks WHERE department = ?1")
            .bind(department.as_str())
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(result.rows_affected() as usize)
    }

    async fn count(&self, department: Option<Department>) -> Result<usize, ApiError> {
        let count: i64 = if let Some(department) = department {
            sqlx::query_scalar("SELECT COUNT(*) FROM rag_chunks WHERE department = ?1")
                .bind(department.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(ApiError::internal)?
        } else {
            sqlx::query_scalar("SELECT COUNT(*) FROM rag_chunks")
                .fetch_one(&self.pool)
                .await
                .map_err(ApiError::internal)?
        };

        Ok(count as usize)
    }

    async fn department_counts(&self) -> Result<Vec<DepartmentCount>, ApiError> {
        let rows = sqlx::query(
            "SELECT department, COUNT(*) AS chunks, COUNT(DISTINCT source) AS sources
             FROM rag_chunks
             GROUP BY department",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut counts: Vec<DepartmentCount> = Department::ALL
            .iter()
            .map(|department| DepartmentCount {
                department: *department,
                chunks: 0,
                sources: 0,
            })
            .collect();

        for row in &rows {
            let department: String = row.get("department");
            let Ok(department) = department.parse::<Department>() else {
                continue;
            };
            let chunks: i64 = row.get("chunks");
            let sources: i64 = row.get("sources");
            if let Some(entry) = counts.iter_mut().find(|c| c.department == department) {
                entry.chunks = chunks as usize;
                entry.sources = sources as usize;
            }
        }

        Ok(counts)
    }

    async fn embedding_model(&self) -> Result<Option<String>, ApiError> {
        sqlx::query_scalar::<_, String>("SELECT value FROM rag_meta WHERE key = 'embedding_model'")
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)
    }

    async fn set_embedding_model(&self, model: &str) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT OR REPLACE INTO rag_meta (key, value, updated_at)
             VALUES ('embedding_model', ?1, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(model)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (tempfile::TempDir, SqliteRagStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRagStore::open(&dir.path().join("index.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn make_chunk(department: Department, source: &str, index: usize, content: &str) -> StoredChunk {
        StoredChunk {
            chunk_id: StoredChunk::chunk_id_for(department, source, index),
            content: content.to_string(),
            source: source.to_string(),
            department,
            scope: ChunkScope::Department,
            chunk_index: index,
            start_offset: index * 100,
        }
    }

    #[tokio::test]
    async fn search_is_restricted_to_department() {
        let (_dir, store) = test_store().await;

        store
            .replace_source(
                Department::Engineering,
                "arch.md",
                vec![(make_chunk(Department::Engineering, "arch.md", 0, "services"), vec![1.0, 0.0])],
            )
            .await
            .unwrap();
        store
            .replace_source(
                Department::Marketing,
                "campaign.md",
                vec![(make_chunk(Department::Marketing, "campaign.md", 0, "launch"), vec![1.0, 0.0])],
            )
            .await
            .unwrap();

        let results = store
            .search(&[1.0, 0.0], 10, Department::Engineering)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.department, Department::Engineering);
        assert!(results[0].score > 0.99);

        let hr = store.search(&[1.0, 0.0], 10, Department::Hr).await.unwrap();
        assert!(hr.is_empty());
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_and_truncates() {
        let (_dir, store) = test_store().await;

        store
            .replace_source(
                Department::Finance,
                "q3.md",
                vec![
                    (make_chunk(Department::Finance, "q3.md", 0, "far"), vec![0.0, 1.0]),
                    (make_chunk(Department::Finance, "q3.md", 1, "near"), vec![0.9, 0.1]),
                    (make_chunk(Department::Finance, "q3.md", 2, "mid"), vec![0.5, 0.5]),
                ],
            )
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 2, Department::Finance).await.unwrap();
        let contents: Vec<&str> = results.iter().map(|r| r.chunk.content.as_str()).collect();
        assert_eq!(contents, vec!["near", "mid"]);
    }

    #[tokio::test]
    async fn replacing_a_source_does_not_duplicate() {
        let (_dir, store) = test_store().await;
        let items = || {
            vec![
                (make_chunk(Department::Hr, "leave.md", 0, "a"), vec![1.0]),
                (make_chunk(Department::Hr, "leave.md", 1, "b"), vec![1.0]),
            ]
        };

        let removed = store
            .replace_source(Department::Hr, "leave.md", items())
            .await
            .unwrap();
        assert_eq!(removed, 0);

        let removed = store
            .replace_source(Department::Hr, "leave.md", items())
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count(Some(Department::Hr)).await.unwrap(), 2);

        let removed = store
            .replace_source(Department::Hr, "leave.md", vec![items().remove(0)])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn replace_source_rejects_foreign_chunks() {
        let (_dir, store) = test_store().await;

        let result = store
            .replace_source(
                Department::Hr,
                "leave.md",
                vec![(make_chunk(Department::Finance, "leave.md", 0, "x"), vec![1.0])],
            )
            .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert_eq!(store.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn clear_department_and_counts() {
        let (_dir, store) = test_store().await;

        store
            .replace_source(
                Department::Hr,
                "a.md",
                vec![(make_chunk(Department::Hr, "a.md", 0, "x"), vec![1.0])],
            )
            .await
            .unwrap();
        store
            .replace_source(
                Department::Hr,
                "b.md",
                vec![(make_chunk(Department::Hr, "b.md", 0, "y"), vec![1.0])],
            )
            .await
            .unwrap();
        store
            .replace_source(
                Department::Finance,
                "c.md",
                vec![(make_chunk(Department::Finance, "c.md", 0, "z"), vec![1.0])],
            )
            .await
            .unwrap();

        let counts = store.department_counts().await.unwrap();
        let hr = counts.iter().find(|c| c.department == Department::Hr).unwrap();
        assert_eq!((hr.chunks, hr.sources), (2, 2));
        assert_eq!(counts.len(), Department::ALL.len());

        assert_eq!(store.clear_department(Department::Hr).await.unwrap(), 2);
        assert_eq!(store.count(Some(Department::Hr)).await.unwrap(), 0);
        assert_eq!(store.count(Some(Department::Finance)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn embedding_model_is_recorded_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");

        {
            let store = SqliteRagStore::open(&path).await.unwrap();
            assert_eq!(store.embedding_model().await.unwrap(), None);
            store.set_embedding_model("embed-english-v3.0").await.unwrap();
        }

        let reopened = SqliteRagStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.embedding_model().await.unwrap().as_deref(),
            Some("embed-english-v3.0")
        );
        assert_eq!(reopened.db_path(), path.as_path());
    }

    #[test]
    fn embedding_blob_round_trip() {
        let embedding = vec![0.25_f32, -1.5, 3.0];
        let blob = SqliteRagStore::serialize_embedding(&embedding);
        assert_eq!(blob.len(), 12);
        assert_eq!(SqliteRagStore::deserialize_embedding(&blob), embedding);
    }
}
