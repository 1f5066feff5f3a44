use thiserror::Error;

/// Errors that can occur during RPC queue operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcQueueError {
    /// Every slot holds a reliable request still waiting for acknowledgement
    #[error("RPC queue is full: all {capacity} entries are reliable and unacknowledged")]
    QueueFull { capacity: usize },
}
