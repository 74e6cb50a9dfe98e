use crate::errors::ReceiverError;
use async_trait::async_trait;
use rusoto_core::{HttpClient, Region};
use rusoto_credential::StaticProvider;
use rusoto_sqs::{
    ChangeMessageVisibilityRequest, DeleteMessageRequest, Message as SqsMessage,
    ReceiveMessageRequest, SendMessageRequest, Sqs, SqsClient as RusotoSqsClient,
};
use std::sync::Arc;

const SQS_LOCAL_REGION: &str = "sqs-local";

/// The queue operations a [`crate::receiver::PollingMessageReceiver`] needs.
///
/// [`SqsClient`] is the production implementation. The trait exists so the
/// receiver can be exercised against an in-process queue in tests, or run on
/// another transport with the same at-least-once semantics.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Polls for at most one message, waiting up to `wait_time_sec` and
    /// leasing whatever is returned for `visibility_timeout_sec`.
    async fn receive_message(
        &self,
        wait_time_sec: i64,
        visibility_timeout_sec: i64,
    ) -> Result<Vec<SqsMessage>, ReceiverError>;

    /// Removes a message from the queue. A deleted message never reappears.
    async fn delete_message(&self, receipt_handle: &str) -> Result<(), ReceiverError>;

    /// Resets the visibility lease of a message to `visibility_timeout_sec`
    /// from now.
    async fn change_visibility(
        &self,
        receipt_handle: &str,
        visibility_timeout_sec: i64,
    ) -> Result<(), ReceiverError>;
}

#[derive(Clone)]
pub struct SqsClient {
    pub queue_url: String,
    sqs: Arc<RusotoSqsClient>,
}

impl SqsClient {
    pub fn new(region: Region, queue_url: &str) -> Self {
        let sqs = build_rusoto_client(region);
        SqsClient {
            queue_url: queue_url.to_owned(),
            sqs: Arc::new(sqs),
        }
    }

    /// Client for a local ElasticMQ server listening on the given port.
    pub fn local(port: u32, queue_url: &str) -> Self {
        SqsClient::new(build_local_region(port), queue_url)
    }

    pub fn new_with_rusoto_client(rusoto_client: RusotoSqsClient, queue_url: &str) -> Self {
        SqsClient {
            queue_url: queue_url.to_owned(),
            sqs: Arc::new(rusoto_client),
        }
    }

    /// Enqueues a message, visible after `delay_seconds`.
    pub async fn send_message(&self, body: &str, delay_seconds: i64) -> Result<(), ReceiverError> {
        let mut request = SendMessageRequest::default();
        request.queue_url = self.queue_url.clone();
        request.message_body = body.to_owned();
        request.delay_seconds = Some(delay_seconds);

        self.sqs.send_message(request).await?;
        Ok(())
    }
}

#[async_trait]
impl MessageQueue for SqsClient {
    async fn receive_message(
        &self,
        wait_time_sec: i64,
        visibility_timeout_sec: i64,
    ) -> Result<Vec<SqsMessage>, ReceiverError> {
        trace!("receive_message called for {}", &self.queue_url);
        let mut request = ReceiveMessageRequest::default();
        request.queue_url = self.queue_url.clone();
        request.max_number_of_messages = Some(1);
        request.wait_time_seconds = Some(wait_time_sec);
        request.visibility_timeout = Some(visibility_timeout_sec);

        let result = self.sqs.receive_message(request).await?;
        Ok(result.messages.unwrap_or_else(Vec::new))
    }

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), ReceiverError> {
        debug!("delete_message called. receipt_handle: {}", receipt_handle);
        let mut request = DeleteMessageRequest::default();
        request.queue_url = self.queue_url.clone();
        request.receipt_handle = receipt_handle.to_owned();

        self.sqs.delete_message(request).await?;
        Ok(())
    }

    async fn change_visibility(
        &self,
        receipt_handle: &str,
        visibility_timeout_sec: i64,
    ) -> Result<(), ReceiverError> {
        debug!(
            "change_visibility called. receipt_handle: {} timeout: {}",
            receipt_handle, visibility_timeout_sec
        );
        let mut request = ChangeMessageVisibilityRequest::default();
        request.queue_url = self.queue_url.clone();
        request.receipt_handle = receipt_handle.to_owned();
        request.visibility_timeout = visibility_timeout_sec;

        self.sqs.change_message_visibility(request).await?;
        Ok(())
    }
}

fn build_rusoto_client(region: Region) -> RusotoSqsClient {
    match region {
        Region::Custom { .. } => {
            let dispatcher = HttpClient::new().expect("could not create http client");
            let credentials_provider =
                StaticProvider::new("fakeKey".to_string(), "fakeSecret".to_string(), None, None);
            RusotoSqsClient::new_with(dispatcher, credentials_provider, region)
        }
        _ => RusotoSqsClient::new(region),
    }
}

fn build_local_region(port: u32) -> Region {
    Region::Custom {
        name: SQS_LOCAL_REGION.to_string(),
        endpoint: format!("http://localhost:{}", port),
    }
}
