use std::path::PathBuf;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unknown service: {0}")]
    UnknownService(String),
    #[error("service appears more than once in request: {0}")]
    DuplicateService(String),

    #[error("invalid mutation path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("mutation path does not resolve in template: {path}")]
    PathNotFound { path: String },

    #[error("failed to read template {path}: {source}", path = path.display())]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse template {path}: {message}", path = path.display())]
    TemplateParse { path: PathBuf, message: String },
    #[error("failed to serialise message: {0}")]
    Serialise(String),

    #[error("no documents found for encounter {0}")]
    NoDocumentsFound(String),
    #[error("failed to connect to document store: {0}")]
    StoreConnection(#[source] BoxError),
    #[error("document store query failed: {0}")]
    StoreQuery(#[source] BoxError),

    #[error("workspace error: {0}")]
    Workspace(#[from] hip_files::WorkspaceError),
    #[error("archive queue is closed")]
    ArchiveQueueClosed,
    #[error("background task failed: {0}")]
    BackgroundTask(#[from] tokio::task::JoinError),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
