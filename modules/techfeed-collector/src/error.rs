/// Result type alias for collector operations.
pub type Result<T> = std::result::Result<T, CollectError>;

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// No adapter registered for the requested publisher key.
    #[error("No source adapter registered for key: {0}")]
    UnknownSource(String),

    /// Job name not registered with the runner. Raised synchronously at
    /// submission, never enqueued.
    #[error("Unknown batch job: {0}")]
    UnknownJob(String),

    /// The runner's worker is gone; nothing can be enqueued any more.
    #[error("Batch job runner is shut down")]
    RunnerClosed,

    #[error("Staging queue error: {0}")]
    Queue(String),
}

impl From<redis::RedisError> for CollectError {
    fn from(e: redis::RedisError) -> Self {
        CollectError::Queue(e.to_string())
    }
}
