use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("warehouse API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("warehouse job {job_id} failed: {message}")]
    Job { job_id: String, message: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SQL template {name}: {reason}")]
    Template { name: String, reason: String },
}

impl WarehouseError {
    /// `true` when the target table rejected DML because rows written by a
    /// streaming insert are still buffered.
    #[must_use]
    pub fn is_streaming_buffer_conflict(&self) -> bool {
        let message = match self {
            Self::Api { body, .. } => body,
            Self::Job { message, .. } => message,
            _ => return false,
        };
        message.to_ascii_lowercase().contains("streaming buffer")
    }
}
