use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid query input: {0}")]
    Validation(String),

    #[error("Logfire configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Logfire API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected Logfire response: {0}")]
    Response(String),
}

impl QueryError {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Validation(_) => "ValidationError",
            QueryError::Config(_) => "ConfigError",
            QueryError::Http(_) | QueryError::Api { .. } | QueryError::Response(_) => {
                "BackendError"
            }
        }
    }
}
