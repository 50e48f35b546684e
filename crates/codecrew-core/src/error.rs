use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrewError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    #[error("Decision oracle unavailable: {0}")]
    OracleUnavailable(String),

    // Specialist errors
    #[error("Specialist failed: {agent}: {message}")]
    Specialist { agent: String, message: String },

    // Graph errors
    #[error("Graph topology error: {0}")]
    Topology(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Workspace errors
    #[error("Workspace path rejected: {0}")]
    WorkspacePath(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CrewError>;
