use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Dependency cycle through task '{0}'")]
    Cycle(String),

    #[error("Task '{0}':\n{1}")]
    Task(String, anyhow::Error),

    #[error("Unknown task '{0}'")]
    UnknownTask(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    MissingVar(&'static str),
}
