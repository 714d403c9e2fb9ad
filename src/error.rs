use thiserror::Error;

/// Missing or unusable settings. Reported through the status endpoint,
/// never fatal to the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("warehouse credentials missing: {0}")]
    MissingWarehouseCredentials(String),

    #[error("language model not configured: {0}")]
    MissingLlmCredentials(String),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigurationError {
    /// The next step a user can take to clear the condition.
    pub fn hint(&self) -> &'static str {
        match self {
            ConfigurationError::MissingWarehouseCredentials(_) => {
                "Set up database credentials to access real data"
            }
            ConfigurationError::MissingLlmCredentials(_) => {
                "Set OPENAI_API_KEY to enable AI query generation"
            }
            ConfigurationError::Invalid { .. } => "Check the configuration file",
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("AI generation failed: {0}")]
    Ai(#[from] crate::llm::LlmError),
}

/// Database failures, surfaced to the user verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("{0}")]
    Query(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VisualizationError {
    #[error("column {0} is missing from the result")]
    MissingColumn(String),

    #[error("value in column {column} at row {row} cannot be used as a series label")]
    UnlabelledGroup { column: String, row: usize },
}
