use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rs_gated_receiver::errors::{ReceiverError, WorkError};
use rs_gated_receiver::gate::Gate;
use rs_gated_receiver::progress::ProgressReporter;
use rs_gated_receiver::receiver::{PollingMessageReceiver, PollingReceiverConfig};
use rs_gated_receiver::sqs::MessageQueue;
use rs_gated_receiver::work::Worker;
use rusoto_sqs::Message as SqsMessage;
use serde_derive::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const TEST_QUEUE_URL: &str = "http://localhost:9324/queue/test-queue";
pub const TEST_VISIBILITY_TIMEOUT_SEC: i64 = 30;
pub const TEST_LOCK_TIMEOUT_SEC: i64 = 30;

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub enum Action {
    Success,
    FailRequeue,
    FailDelete,
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct Payload {
    pub msg: String,
    pub action: Action,
    pub progress_signals: u32,
    pub created: DateTime<Utc>,
}

impl Payload {
    pub fn new(msg: &str, action: Action) -> Self {
        Payload {
            msg: msg.to_owned(),
            action,
            progress_signals: 0,
            created: Utc::now(),
        }
    }

    pub fn with_progress_signals(mut self, progress_signals: u32) -> Self {
        self.progress_signals = progress_signals;
        self
    }
}

/// One recorded call against the mock queue, in invocation order.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueCall {
    Receive {
        wait_time_sec: i64,
        visibility_timeout_sec: i64,
    },
    Delete {
        receipt_handle: String,
    },
    ChangeVisibility {
        receipt_handle: String,
        visibility_timeout_sec: i64,
    },
}

/// In-process stand-in for SQS. Every receive call pops one pre-loaded
/// batch (normally a single message) and every call is recorded so tests
/// can assert on exact dispositions.
#[derive(Default)]
pub struct MockQueue {
    batches: Mutex<VecDeque<Vec<SqsMessage>>>,
    calls: Mutex<Vec<QueueCall>>,
}

impl MockQueue {
    pub fn new() -> Self {
        MockQueue::default()
    }

    /// Enqueues a single-message batch holding the payload as json, and
    /// returns the receipt handle it was given.
    pub fn push_payload(&self, payload: &Payload) -> String {
        let receipt_handle = Uuid::new_v4().to_string();
        let mut message = SqsMessage::default();
        message.message_id = Some(Uuid::new_v4().to_string());
        message.receipt_handle = Some(receipt_handle.clone());
        message.body = Some(serde_json::to_string(payload).unwrap());
        self.push_batch(vec![message]);
        receipt_handle
    }

    pub fn push_batch(&self, batch: Vec<SqsMessage>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    pub fn remaining_batches(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<QueueCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn receives(&self) -> Vec<(i64, i64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                QueueCall::Receive {
                    wait_time_sec,
                    visibility_timeout_sec,
                } => Some((wait_time_sec, visibility_timeout_sec)),
                _ => None,
            })
            .collect()
    }

    pub fn deleted_handles(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                QueueCall::Delete { receipt_handle } => Some(receipt_handle),
                _ => None,
            })
            .collect()
    }

    pub fn visibility_changes(&self) -> Vec<(String, i64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                QueueCall::ChangeVisibility {
                    receipt_handle,
                    visibility_timeout_sec,
                } => Some((receipt_handle, visibility_timeout_sec)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MessageQueue for MockQueue {
    async fn receive_message(
        &self,
        wait_time_sec: i64,
        visibility_timeout_sec: i64,
    ) -> Result<Vec<SqsMessage>, ReceiverError> {
        self.calls.lock().unwrap().push(QueueCall::Receive {
            wait_time_sec,
            visibility_timeout_sec,
        });
        Ok(self
            .batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Vec::new))
    }

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), ReceiverError> {
        self.calls.lock().unwrap().push(QueueCall::Delete {
            receipt_handle: receipt_handle.to_owned(),
        });
        Ok(())
    }

    async fn change_visibility(
        &self,
        receipt_handle: &str,
        visibility_timeout_sec: i64,
    ) -> Result<(), ReceiverError> {
        self.calls.lock().unwrap().push(QueueCall::ChangeVisibility {
            receipt_handle: receipt_handle.to_owned(),
            visibility_timeout_sec,
        });
        Ok(())
    }
}

/// Worker driven by the `Action` inside each payload, mirroring what a
/// real message handler would do with a recoverable or fatal failure.
#[derive(Default)]
pub struct TestWorker {
    processed: Mutex<Vec<Payload>>,
}

impl TestWorker {
    pub fn new() -> Self {
        TestWorker::default()
    }

    pub fn processed(&self) -> Vec<Payload> {
        self.processed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Worker for TestWorker {
    async fn process(
        &self,
        message: SqsMessage,
        progress: ProgressReporter,
    ) -> Result<(), WorkError> {
        let body = message
            .body
            .ok_or_else(|| WorkError::UnRecoverableError("No Body Found".to_owned()))?;
        let payload: Payload = serde_json::from_str(body.as_ref()).map_err(|e| {
            WorkError::UnRecoverableError(format!("Body does not match payload: {:?}", e))
        })?;
        for _ in 0..payload.progress_signals {
            progress.progress_made();
        }
        self.processed.lock().unwrap().push(payload.clone());
        match payload.action {
            Action::Success => Ok(()),
            Action::FailRequeue => Err(WorkError::RecoverableError(
                "Received requeue action".to_owned(),
            )),
            Action::FailDelete => Err(WorkError::UnRecoverableError(
                "Received delete action".to_owned(),
            )),
        }
    }
}

/// Worker that keeps its progress handle alive past the end of processing,
/// so tests can report progress after the message is already settled.
#[derive(Default)]
pub struct StashingWorker {
    pub stash: Mutex<Option<ProgressReporter>>,
}

#[async_trait]
impl Worker for StashingWorker {
    async fn process(
        &self,
        _message: SqsMessage,
        progress: ProgressReporter,
    ) -> Result<(), WorkError> {
        progress.progress_made();
        *self.stash.lock().unwrap() = Some(progress);
        Ok(())
    }
}

/// Gate that admits a fixed number of runs and then closes.
pub struct LimitedGate {
    remaining: AtomicUsize,
}

impl LimitedGate {
    pub fn new(admissions: usize) -> Self {
        LimitedGate {
            remaining: AtomicUsize::new(admissions),
        }
    }

    pub fn closed() -> Self {
        LimitedGate::new(0)
    }
}

#[async_trait]
impl Gate for LimitedGate {
    async fn can_run(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_ok()
    }

    async fn on_run_failed(&self, _error: &ReceiverError) {}
}

pub fn build_receiver(
    queue: Arc<MockQueue>,
    worker: Arc<dyn Worker>,
    gate: Option<Arc<dyn Gate>>,
) -> PollingMessageReceiver {
    PollingMessageReceiver::new(
        queue,
        PollingReceiverConfig {
            queue_url: TEST_QUEUE_URL.to_owned(),
            message_visibility_timeout_sec: TEST_VISIBILITY_TIMEOUT_SEC,
            lock_timeout_sec: TEST_LOCK_TIMEOUT_SEC,
            gate,
            worker,
        },
    )
    .unwrap()
}
