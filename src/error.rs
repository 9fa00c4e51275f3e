use thiserror::Error;

/// Errors raised by [`Supercluster`](crate::Supercluster) operations.
#[derive(Error, Debug)]
pub enum SuperclusterError {
    #[error("The index is already loaded; load can only be called once.")]
    AlreadyLoaded,

    #[error("The index has no points yet; call load first.")]
    NotLoaded,

    #[error("The index has been disposed.")]
    Disposed,

    #[error("No cluster with the specified id: {0}.")]
    ClusterNotFound(usize),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Options parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SuperclusterError>;
