use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("node list is closed")]
    Closed,

    #[error("cluster {0:?} not found")]
    ClusterNotFound(String),

    #[error("node {0:?} not found")]
    NodeNotFound(String),

    #[error("node {0:?} is not ready")]
    NodeNotReady(String),
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
