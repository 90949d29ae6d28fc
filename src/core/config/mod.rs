pub mod paths;
pub mod service;
pub mod settings;
pub mod validation;

pub use paths::{discover_project_root, AppPaths};
pub use service::ConfigService;
pub use settings::{
    EmbeddingSettings, LlmSettings, MongoSettings, RetrievalSettings, ServerSettings,
    SessionSettings, Settings, StorageSettings,
};
