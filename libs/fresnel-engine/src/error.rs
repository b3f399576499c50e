use fresnel_api::error::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
