use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("empty response: no choices returned")]
    EmptyResponse,
}

impl AiClientError {
    /// True when the underlying transport timed out. Callers retry these
    /// once; every other failure is terminal for the request.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AiClientError::Http(e) if e.is_timeout())
    }
}
