use std::sync::Arc;

use crate::auth::Authenticator;
use crate::core::config::{AppPaths, Settings};
use crate::llm::{AnswerGenerator, CohereEmbedder, Embedder, LlmProvider, OpenAiCompatProvider};
use crate::qa::QaService;
use crate::rag::{RagStore, Retriever, SqliteRagStore};
use crate::server::session::SessionStore;
use crate::users::{MongoUserStore, UserStore};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub auth: Arc<Authenticator>,
    pub rag_store: Arc<dyn RagStore>,
    pub embedding_model: String,
    pub qa: Arc<QaService>,
    pub sessions: SessionStore,
}

impl AppState {
    /// Connects to MongoDB, opens the vector index and builds the hosted
    /// model clients. Fails when `MONGO_URI` or `COHERE_API_KEY` is missing;
    /// a missing `GROQ_API_KEY` only disables answer generation.
    pub async fn initialize(
        settings: Settings,
        paths: AppPaths,
    ) -> Result<Arc<Self>, InitializationError> {
        let users = Arc::new(
            MongoUserStore::connect(&settings.mongo)
                .await
                .map_err(|e| InitializationError::UserStore(e.into()))?,
        );

        let rag_store = Arc::new(
            SqliteRagStore::open(&paths.index_db_path())
                .await
                .map_err(|e| InitializationError::Rag(e.into()))?,
        );

        let embedder = Arc::new(
            CohereEmbedder::from_settings(&settings.embedding)
                .map_err(|e| InitializationError::Embedding(e.into()))?,
        );

        match rag_store.embedding_model().await {
            Ok(Some(recorded)) if recorded != embedder.model_name() => tracing::warn!(
                "Index at {} was built with '{}' but '{}' is configured; answers will be poor until it is re-ingested",
                paths.index_dir.display(),
                recorded,
                embedder.model_name()
            ),
            Ok(None) => tracing::warn!(
                "Index at {} is empty; run deptqa-ingest to index documents",
                paths.index_dir.display()
            ),
            Ok(Some(_)) => {}
            Err(err) => tracing::warn!("Failed to read index metadata: {}", err),
        }

        let llm = OpenAiCompatProvider::from_settings(&settings.llm)
            .map_err(|e| InitializationError::Llm(e.into()))?
            .map(|provider| Arc::new(provider) as Arc<dyn LlmProvider>);
        if llm.is_none() {
            tracing::warn!("GROQ_API_KEY is not set; answers will list retrieved passages only");
        }

        Ok(Self::from_parts(&settings, users, rag_store, embedder, llm))
    }

    pub fn from_parts(
        settings: &Settings,
        users: Arc<dyn UserStore>,
        rag_store: Arc<dyn RagStore>,
        embedder: Arc<dyn Embedder>,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> Arc<Self> {
        let embedding_model = embedder.model_name().to_string();
        let retriever = Retriever::new(rag_store.clone(), embedder, settings.retrieval.top_k);
        let answers = AnswerGenerator::new(llm, &settings.llm);
        let sessions = SessionStore::from_minutes(settings.session.ttl_minutes);

        Arc::new(AppState {
            auth: Arc::new(Authenticator::new(users.clone())),
            qa: Arc::new(QaService::new(retriever, answers)),
            users,
            rag_store,
            embedding_model,
            sessions,
        })
    }
}
