use crate::errors::{ReceiverError, WorkError};
use crate::gate::{Gate, Runner};
use crate::progress::progress_channel;
use crate::sqs::MessageQueue;
use crate::work::Worker;
use async_trait::async_trait;
use rusoto_sqs::Message as SqsMessage;
use std::sync::Arc;

/// The maximum amount of time in seconds that a single poll will wait for a
/// message to appear in the queue.
pub const MAX_MESSAGE_POLL_TIME_SEC: i64 = 2;

/// Used for a message that failed but should be returned to the queue. For
/// this case we want to be able to retry the message quickly, so it is set
/// to 5 seconds.
pub const RETRY_MESSAGE_VISIBILITY_TIMEOUT_SEC: i64 = 5;

/// Since this receiver polls with a bounded wait, gate lock timeouts must
/// not be less than two full polls, or a permit could expire while its
/// holder is still inside one poll-plus-lease cycle.
pub const MIN_LOCK_TIMEOUT_SEC: i64 = MAX_MESSAGE_POLL_TIME_SEC * 2;

/// Configuration for a [`PollingMessageReceiver`].
pub struct PollingReceiverConfig {
    pub queue_url: String,
    /// Visibility lease applied to every received message, and the value a
    /// progress signal resets the lease to.
    pub message_visibility_timeout_sec: i64,
    /// Timeout of the gate permit guarding this receiver. Only validated
    /// here; the permit itself lives in the gate's backing implementation.
    pub lock_timeout_sec: i64,
    /// Checked before every poll. `None` means always admitted.
    pub gate: Option<Arc<dyn Gate>>,
    pub worker: Arc<dyn Worker>,
}

/// A message receiver that polls AWS SQS one message at a time.
///
/// Each [`PollingMessageReceiver::run`] invocation drains the queue: it
/// checks the gate, polls for a single message, hands it to the worker, and
/// keeps the message's visibility lease alive for as long as the worker
/// reports progress. The disposition of every message is settled before
/// `run` returns or propagates an error: delete on success, delete on an
/// unrecoverable failure, a short re-visibility window on a recoverable one.
pub struct PollingMessageReceiver {
    queue: Arc<dyn MessageQueue>,
    queue_url: String,
    message_visibility_timeout_sec: i64,
    gate: Option<Arc<dyn Gate>>,
    worker: Arc<dyn Worker>,
}

impl PollingMessageReceiver {
    /// Validates the configuration and builds the receiver. All timeout
    /// relationships are rejected here so they can never fail mid-poll.
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        config: PollingReceiverConfig,
    ) -> Result<Self, ReceiverError> {
        if config.queue_url.is_empty() {
            return Err(ReceiverError::ConfigurationError(
                "queue url cannot be empty",
            ));
        }
        if config.message_visibility_timeout_sec <= 0 {
            return Err(ReceiverError::ConfigurationError(
                "message visibility timeout must be positive",
            ));
        }
        if config.lock_timeout_sec < MIN_LOCK_TIMEOUT_SEC {
            return Err(ReceiverError::ConfigurationError(
                "lock timeout must cover at least two message polls",
            ));
        }
        if config.lock_timeout_sec < config.message_visibility_timeout_sec {
            return Err(ReceiverError::ConfigurationError(
                "lock timeout cannot be less than the message visibility timeout",
            ));
        }
        Ok(PollingMessageReceiver {
            queue,
            queue_url: config.queue_url,
            message_visibility_timeout_sec: config.message_visibility_timeout_sec,
            gate: config.gate,
            worker: config.worker,
        })
    }

    /// Drains the queue: poll, process, repeat until a poll comes back empty
    /// or the gate closes. Messages are processed strictly one at a time.
    ///
    /// A closed gate and an empty queue are both normal returns. The only
    /// error surfaced for a message is an unrecoverable worker failure, and
    /// by the time it propagates the message has already been deleted.
    pub async fn run(&self) -> Result<(), ReceiverError> {
        loop {
            if let Some(gate) = &self.gate {
                if !gate.can_run().await {
                    trace!("gate is closed for {}", &self.queue_url);
                    return Ok(());
                }
            }
            let message = match self.poll_for_message().await? {
                Some(message) => message,
                None => break,
            };
            self.process_message(message).await?;
        }
        trace!("there are no more messages for {}", &self.queue_url);
        Ok(())
    }

    /// Poll for a single message.
    async fn poll_for_message(&self) -> Result<Option<SqsMessage>, ReceiverError> {
        trace!("polling {} for a message", &self.queue_url);
        let mut messages = self
            .queue
            .receive_message(
                MAX_MESSAGE_POLL_TIME_SEC,
                self.message_visibility_timeout_sec,
            )
            .await?;
        if messages.is_empty() {
            return Ok(None);
        }
        if messages.len() != 1 {
            return Err(ReceiverError::TransportViolation(format!(
                "expected only one message but received: {}",
                messages.len()
            )));
        }
        Ok(Some(messages.remove(0)))
    }

    /// Process a single message.
    async fn process_message(&self, message: SqsMessage) -> Result<(), ReceiverError> {
        debug!("processing message {:?}", &message.message_id);
        let receipt_handle = message.receipt_handle.clone().ok_or_else(|| {
            ReceiverError::TransportViolation("received a message with no receipt handle".to_owned())
        })?;

        let (reporter, mut signals) = progress_channel();
        let work = self.worker.process(message.clone(), reporter);
        tokio::pin!(work);

        let outcome = loop {
            tokio::select! {
                // drain pending progress signals before accepting completion,
                // so every signal sent while the worker ran gets its renewal
                biased;
                Some(()) = signals.recv() => {
                    trace!("progress was made on message {:?}", &message.message_id);
                    self.queue
                        .change_visibility(&receipt_handle, self.message_visibility_timeout_sec)
                        .await?;
                }
                outcome = &mut work => break outcome,
            }
        };
        // Signals that were still queued when the worker finished get their
        // renewal too; resetting to the same lease length is idempotent.
        while let Ok(()) = signals.try_recv() {
            trace!("progress was made on message {:?}", &message.message_id);
            self.queue
                .change_visibility(&receipt_handle, self.message_visibility_timeout_sec)
                .await?;
        }
        // The listener must be gone before any terminal disposition is
        // issued; a late progress signal becomes a no-op instead of racing
        // against the delete.
        drop(signals);

        match outcome {
            Ok(()) => {
                self.queue.delete_message(&receipt_handle).await?;
                Ok(())
            }
            Err(WorkError::RecoverableError(msg)) => {
                debug!("message will be returned to the queue: {}", &msg);
                self.queue
                    .change_visibility(&receipt_handle, RETRY_MESSAGE_VISIBILITY_TIMEOUT_SEC)
                    .await?;
                Ok(())
            }
            Err(WorkError::UnRecoverableError(msg)) => {
                error!("no way to recover from error: {}, deleting message", &msg);
                self.queue.delete_message(&receipt_handle).await?;
                Err(ReceiverError::WorkerFailed(msg))
            }
        }
    }
}

#[async_trait]
impl Runner for PollingMessageReceiver {
    async fn run(&self) -> Result<(), ReceiverError> {
        PollingMessageReceiver::run(self).await
    }
}
