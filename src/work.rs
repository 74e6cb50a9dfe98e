use crate::errors::WorkError;
use crate::progress::ProgressReporter;
use async_trait::async_trait;
use rusoto_sqs::Message as SqsMessage;

/// Trait to implement to create your own Worker implementation
#[async_trait]
pub trait Worker: Send + Sync {
    /// Processes a single message pulled from the queue.
    ///
    /// Long running work should call `progress.progress_made()` periodically
    /// so the receiver keeps the message's visibility lease alive. A worker
    /// that never reports progress risks the lease expiring mid-run and the
    /// message being delivered to another consumer.
    ///
    /// If the message should be returned to the queue for a quick retry,
    /// return a `WorkError::RecoverableError`. Any other failure should be a
    /// `WorkError::UnRecoverableError`; the message will not be retried.
    async fn process(
        &self,
        message: SqsMessage,
        progress: ProgressReporter,
    ) -> Result<(), WorkError>;
}
