/// Errors produced by the notification and task fabric.
#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    /// The task queue is at capacity; the job was not accepted.
    #[error("task queue full (capacity {capacity}), dropped job {label}")]
    QueueFull { label: String, capacity: usize },

    /// The task queue's workers have stopped.
    #[error("task queue is shut down")]
    Shutdown,
}

/// Convenience alias used throughout the fabric crate.
pub type FabricResult<T> = std::result::Result<T, FabricError>;
