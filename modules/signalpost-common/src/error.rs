use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignalPostError {
    #[error("Gazetteer error: {0}")]
    Gazetteer(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
