//! Queue error types.

/// Reasons a download request is not admitted.
///
/// The messages are shown to the requester as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmitError {
    #[error("You already have a download in queue")]
    AlreadyQueued,

    #[error("I'm too busy with too many downloads, try again later")]
    QueueFull { capacity: usize },
}

/// Errors reported by a [`Deliverer`](crate::Deliverer).
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] chunkcast_transfer::TransferError),

    #[error("transport error: {0}")]
    Transport(String),
}
