#[macro_use]
extern crate log;

use async_trait::async_trait;
use rs_gated_receiver::config::{Cli, Mode, WorkerStackConfig};
use rs_gated_receiver::errors::{ReceiverError, WorkError};
use rs_gated_receiver::gate::{GatedRunner, OpenGate};
use rs_gated_receiver::progress::ProgressReporter;
use rs_gated_receiver::receiver::PollingMessageReceiver;
use rs_gated_receiver::sqs::SqsClient;
use rs_gated_receiver::work::Worker;
use rusoto_sqs::Message as SqsMessage;
use std::sync::Arc;
use std::time::Duration;

/// Prints every message body it receives.
#[derive(Clone, Default)]
struct PrintingWorker;

#[async_trait]
impl Worker for PrintingWorker {
    async fn process(
        &self,
        message: SqsMessage,
        progress: ProgressReporter,
    ) -> Result<(), WorkError> {
        progress.progress_made();
        match message.body {
            Some(body) => {
                println!("Received message: {}", body);
                Ok(())
            }
            None => Err(WorkError::UnRecoverableError(
                "Message contains no body".to_owned(),
            )),
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::new();
    match cli.determine_mode() {
        Ok(mode) => {
            if let Err(e) = run(&cli, mode).await {
                panic!("{}", e);
            }
        }
        Err(e) => panic!("{}", e),
    }
}

async fn run(cli: &Cli, mode: Mode) -> Result<(), ReceiverError> {
    let sqs_client = build_sqs_client(&mode);
    println!("Initializing rs-gated-receiver: {:?}", &mode);

    if let Some(body) = cli.send_body() {
        return sqs_client.send_message(&body, 0).await;
    }

    let mut stack = WorkerStackConfig::new(&sqs_client.queue_url, Arc::new(PrintingWorker))
        .with_semaphore_max_lock_count(cli.max_locks()?)
        .with_lock_and_visibility_timeout_sec(cli.timeout_sec()?)
        .with_gate(Arc::new(OpenGate));
    if let Some(lock_key) = cli.lock_key() {
        stack = stack.with_semaphore_lock_key(&lock_key);
    }
    debug!(
        "semaphore configuration: {:?}",
        stack.semaphore_gate_config()
    );

    let receiver = PollingMessageReceiver::new(Arc::new(sqs_client), stack.receiver_config())?;
    let gated = GatedRunner::new(Arc::new(OpenGate), Arc::new(receiver));

    let mut interval = tokio::time::interval(Duration::from_secs(2));
    loop {
        interval.tick().await;
        gated.run().await;
    }
}

fn build_sqs_client(mode: &Mode) -> SqsClient {
    match mode {
        Mode::AWS(region, queue) => SqsClient::new(region.to_owned(), queue),
        Mode::Local(port, queue) => SqsClient::local(*port, queue),
    }
}
