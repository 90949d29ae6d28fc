//! Offline document ingestion.
//!
//! Reads `<source_root>/<department>/*` plus the shared `<source_root>/general/*`,
//! chunks and embeds each document, and replaces that document's chunks in the
//! index. Re-running over the same tree leaves the index unchanged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::core::errors::ApiError;
use crate::department::Department;
use crate::llm::embedding::{EmbedInputType, Embedder};
use crate::rag::chunker::TextChunker;
use crate::rag::store::{ChunkScope, RagStore, StoredChunk};

pub const GENERAL_FOLDER: &str = "general";
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["md", "txt", "csv"];

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub department: Department,
    pub files_indexed: usize,
    pub chunks_written: usize,
    /// Chunks removed from the index, by `--reset` or by replacing a source.
    pub chunks_removed: usize,
    /// Files with no text after trimming.
    pub empty_files: Vec<String>,
    /// Files that could not be read as UTF-8.
    pub failed_files: Vec<String>,
}

impl IngestReport {
    fn new(department: Department) -> Self {
        Self {
            department,
            files_indexed: 0,
            chunks_written: 0,
            chunks_removed: 0,
            empty_files: Vec::new(),
            failed_files: Vec::new(),
        }
    }
}

struct SourceDocument {
    path: PathBuf,
    source_id: String,
    scope: ChunkScope,
}

pub struct Ingestor {
    store: Arc<dyn RagStore>,
    embedder: Arc<dyn Embedder>,
    chunker: TextChunker,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn RagStore>,
        embedder: Arc<dyn Embedder>,
        chunker: TextChunker,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            chunker,
            batch_size: batch_size.max(1),
        }
    }

    /// Ingests each department in turn. Folders under `source_root` that are
    /// neither a department nor `general` are reported and ignored.
    pub async fn ingest_all(
        &self,
        source_root: &Path,
        departments: &[Department],
        reset: bool,
    ) -> Result<Vec<IngestReport>, ApiError> {
        if !source_root.is_dir() {
            return Err(ApiError::NotFound(format!(
                "Document directory not found: {}",
                source_root.display()
            )));
        }

        warn_unknown_folders(source_root)?;

        let mut reports = Vec::with_capacity(departments.len());
        for department in departments {
            reports.push(self.ingest_department(source_root, *department, reset).await?);
        }
        Ok(reports)
    }

    pub async fn ingest_department(
        &self,
        source_root: &Path,
        department: Department,
        reset: bool,
    ) -> Result<IngestReport, ApiError> {
        self.check_embedding_model().await?;

        let mut report = IngestReport::new(department);
        if reset {
            report.chunks_removed += self.store.clear_department(department).await?;
            tracing::info!(
                "Cleared {} chunks from {} before ingesting",
                report.chunks_removed,
                department
            );
        }

        let documents = collect_documents(source_root, department)?;
        if documents.is_empty() {
            tracing::warn!(
                "No {} documents found for {} under {}",
                SUPPORTED_EXTENSIONS.join("/"),
                department,
                source_root.display()
            );
        }

        for document in &documents {
            let text = match tokio::fs::read_to_string(&document.path).await {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!("Skipping {}: {}", document.path.display(), err);
                    report.failed_files.push(document.source_id.clone());
                    continue;
                }
            };

            let written = self.ingest_document(department, document, &text, &mut report).await?;
            if written == 0 {
                report.empty_files.push(document.source_id.clone());
            } else {
                report.files_indexed += 1;
                report.chunks_written += written;
            }
        }

        self.store
            .set_embedding_model(self.embedder.model_name())
            .await?;

        tracing::info!(
            "Ingested {} files ({} chunks) for {}",
            report.files_indexed,
            report.chunks_written,
            department
        );
        Ok(report)
    }

    async fn ingest_document(
        &self,
        department: Department,
        document: &SourceDocument,
        text: &str,
        report: &mut IngestReport,
    ) -> Result<usize, ApiError> {
        let chunks = self.chunker.split(text);

        let mut items = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self
                .embedder
                .embed(&texts, EmbedInputType::Document)
                .await?;

            for (chunk, embedding) in batch.iter().zip(embeddings) {
                let stored = StoredChunk {
                    chunk_id: StoredChunk::chunk_id_for(
                        department,
                        &document.source_id,
                        chunk.chunk_index,
                    ),
                    content: chunk.text.clone(),
                    source: document.source_id.clone(),
                    department,
                    scope: document.scope,
                    chunk_index: chunk.chunk_index,
                    start_offset: chunk.start_offset,
                };
                items.push((stored, embedding));
            }
        }

        let written = items.len();
        report.chunks_removed += self
            .store
            .replace_source(department, &document.source_id, items)
            .await?;

        tracing::debug!(
            "Indexed {} chunks from {} into {}",
            written,
            document.source_id,
            department
        );
        Ok(written)
    }

    async fn check_embedding_model(&self) -> Result<(), ApiError> {
        let current = self.embedder.model_name();
        match self.store.embedding_model().await? {
            Some(recorded) if recorded != current => {
                tracing::warn!(
                    "Index was built with embedding model '{}' but '{}' is configured; \
                     re-ingest every department with --reset",
                    recorded,
                    current
                );
            }
            _ => {}
        }
        Ok(())
    }
}

fn collect_documents(
    source_root: &Path,
    department: Department,
) -> Result<Vec<SourceDocument>, ApiError> {
    let mut documents: Vec<SourceDocument> = list_supported_files(&source_root.join(department.as_str()))?
        .into_iter()
        .map(|(path, name)| SourceDocument {
            path,
            source_id: name,
            scope: ChunkScope::Department,
        })
        .collect();

    documents.extend(
        list_supported_files(&source_root.join(GENERAL_FOLDER))?
            .into_iter()
            .map(|(path, name)| SourceDocument {
                path,
                source_id: format!("{}/{}", GENERAL_FOLDER, name),
                scope: ChunkScope::General,
            }),
    );

    Ok(documents)
}

/// Regular files with a supported extension directly under `dir`, sorted by name.
fn list_supported_files(dir: &Path) -> Result<Vec<(PathBuf, String)>, ApiError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(ApiError::internal)? {
        let entry = entry.map_err(ApiError::internal)?;
        let path = entry.path();
        if !path.is_file() || !has_supported_extension(&path) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            tracing::warn!("Skipping file with non UTF-8 name: {}", path.display());
            continue;
        };
        files.push((path, name));
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

fn warn_unknown_folders(source_root: &Path) -> Result<(), ApiError> {
    for entry in std::fs::read_dir(source_root).map_err(ApiError::internal)? {
        let entry = entry.map_err(ApiError::internal)?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name != GENERAL_FOLDER && name.parse::<Department>().is_err() {
            tracing::warn!("Skipping folder '{}': not a known department", name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::chunker::ChunkerConfig;
    use crate::rag::sqlite::SqliteRagStore;
    use crate::testing::FakeEmbedder;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn document_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "engineering/deploy.md", "Deployments run nightly through CI.");
        write(root, "engineering/notes.pdf", "binary-ish");
        write(root, "marketing/campaign.txt", "The spring campaign targets enterprise buyers.");
        write(root, "marketing/empty.md", "   \n");
        write(root, "finance/q3.csv", "quarter,revenue\nQ3,1200000");
        write(root, "general/handbook.md", "Office hours are nine to five.");
        write(root, "legal/contract.md", "Not a known department.");
        dir
    }

    async fn ingestor(dir: &Path) -> (Ingestor, Arc<SqliteRagStore>, Arc<FakeEmbedder>) {
        let store = Arc::new(SqliteRagStore::open(&dir.join("index.db")).await.unwrap());
        let embedder = Arc::new(FakeEmbedder::default());
        let ingestor = Ingestor::new(
            store.clone(),
            embedder.clone(),
            TextChunker::new(ChunkerConfig {
                chunk_size: 20,
                chunk_overlap: 5,
            }),
            2,
        );
        (ingestor, store, embedder)
    }

    #[tokio::test]
    async fn ingests_department_and_general_documents() {
        let docs = document_tree();
        let index = tempfile::tempdir().unwrap();
        let (ingestor, store, _) = ingestor(index.path()).await;

        let report = ingestor
            .ingest_department(docs.path(), Department::Engineering, false)
            .await
            .unwrap();

        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.chunks_written, store.count(Some(Department::Engineering)).await.unwrap());

        let counts = store.department_counts().await.unwrap();
        let eng = counts.iter().find(|c| c.department == Department::Engineering).unwrap();
        assert_eq!(eng.sources, 2);
        assert_eq!(store.count(Some(Department::Marketing)).await.unwrap(), 0);
        assert_eq!(store.embedding_model().await.unwrap().as_deref(), Some("fake-embed"));
    }

    #[tokio::test]
    async fn general_documents_are_tagged_with_the_ingesting_department() {
        let docs = document_tree();
        let index = tempfile::tempdir().unwrap();
        let (ingestor, store, embedder) = ingestor(index.path()).await;

        ingestor
            .ingest_all(docs.path(), &Department::ALL, false)
            .await
            .unwrap();

        for department in Department::ALL {
            let results = store
                .search(&embedder.vector("office hours nine to five"), 50, department)
                .await
                .unwrap();
            let general: Vec<_> = results
                .iter()
                .filter(|r| r.chunk.source == "general/handbook.md")
                .collect();
            assert!(!general.is_empty());
            assert!(general
                .iter()
                .all(|r| r.chunk.department == department && r.chunk.scope == ChunkScope::General));
        }
    }

    #[tokio::test]
    async fn reingesting_does_not_change_counts() {
        let docs = document_tree();
        let index = tempfile::tempdir().unwrap();
        let (ingestor, store, _) = ingestor(index.path()).await;

        ingestor.ingest_all(docs.path(), &Department::ALL, false).await.unwrap();
        let first = store.department_counts().await.unwrap();

        let reports = ingestor.ingest_all(docs.path(), &Department::ALL, false).await.unwrap();
        assert_eq!(store.department_counts().await.unwrap(), first);
        assert!(reports.iter().all(|r| r.chunks_removed == r.chunks_written));
    }

    #[tokio::test]
    async fn ingest_order_does_not_matter() {
        let docs = document_tree();
        let index_a = tempfile::tempdir().unwrap();
        let index_b = tempfile::tempdir().unwrap();
        let (forward, store_a, embedder) = ingestor(index_a.path()).await;
        let (backward, store_b, _) = ingestor(index_b.path()).await;

        let mut reversed = Department::ALL.to_vec();
        reversed.reverse();
        forward.ingest_all(docs.path(), &Department::ALL, false).await.unwrap();
        backward.ingest_all(docs.path(), &reversed, false).await.unwrap();

        let query = embedder.vector("spring campaign revenue deployments");
        for department in Department::ALL {
            let a: Vec<String> = store_a
                .search(&query, 10, department)
                .await
                .unwrap()
                .into_iter()
                .map(|r| r.chunk.chunk_id)
                .collect();
            let b: Vec<String> = store_b
                .search(&query, 10, department)
                .await
                .unwrap()
                .into_iter()
                .map(|r| r.chunk.chunk_id)
                .collect();
            assert_eq!(a, b);
        }
    }

    #[tokio::test]
    async fn skips_unsupported_and_empty_files() {
        let docs = document_tree();
        let index = tempfile::tempdir().unwrap();
        let (ingestor, store, _) = ingestor(index.path()).await;

        let report = ingestor
            .ingest_department(docs.path(), Department::Marketing, false)
            .await
            .unwrap();
        assert_eq!(report.empty_files, vec!["empty.md".to_string()]);
        assert_eq!(report.files_indexed, 2);

        let results = store
            .search(&[1.0; 256], 100, Department::Engineering)
            .await
            .unwrap();
        assert!(results.is_empty());

        ingestor
            .ingest_department(docs.path(), Department::Engineering, false)
            .await
            .unwrap();
        let sources: Vec<String> = store
            .search(&[1.0; 256], 100, Department::Engineering)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.chunk.source)
            .collect();
        assert!(!sources.iter().any(|s| s.ends_with(".pdf")));
    }

    #[tokio::test]
    async fn reset_removes_documents_deleted_from_disk() {
        let docs = document_tree();
        let index = tempfile::tempdir().unwrap();
        let (ingestor, store, _) = ingestor(index.path()).await;

        ingestor
            .ingest_department(docs.path(), Department::Finance, false)
            .await
            .unwrap();
        std::fs::remove_file(docs.path().join("finance/q3.csv")).unwrap();

        ingestor
            .ingest_department(docs.path(), Department::Finance, false)
            .await
            .unwrap();
        let counts = store.department_counts().await.unwrap();
        let finance = counts.iter().find(|c| c.department == Department::Finance).unwrap();
        assert_eq!(finance.sources, 2);

        ingestor
            .ingest_department(docs.path(), Department::Finance, true)
            .await
            .unwrap();
        let counts = store.department_counts().await.unwrap();
        let finance = counts.iter().find(|c| c.department == Department::Finance).unwrap();
        assert_eq!(finance.sources, 1);
    }

    #[tokio::test]
    async fn missing_source_root_is_not_found() {
        let index = tempfile::tempdir().unwrap();
        let (ingestor, _, _) = ingestor(index.path()).await;

        let result = ingestor
            .ingest_all(&index.path().join("nope"), &Department::ALL, false)
            .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn embedding_failure_aborts_the_run() {
        let docs = document_tree();
        let index = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteRagStore::open(&index.path().join("index.db")).await.unwrap());
        let ingestor = Ingestor::new(
            store.clone(),
            Arc::new(FakeEmbedder::failing()),
            TextChunker::new(ChunkerConfig::default()),
            96,
        );

        let result = ingestor
            .ingest_department(docs.path(), Department::Hr, false)
            .await;
        assert!(matches!(result, Err(ApiError::Upstream(_))));
        assert_eq!(store.count(None).await.unwrap(), 0);
    }
}
