use crate::errors::ReceiverError::{self, CommandLineError};
use crate::gate::Gate;
use crate::receiver::PollingReceiverConfig;
use crate::work::Worker;
use clap::{App, Arg, ArgMatches};
use rusoto_core::Region;
use std::str::FromStr;
use std::sync::Arc;

pub type Queue = String;
pub type Port = u32;

/// Applied to both the message visibility lease and the semaphore lock
/// timeout when no explicit value is configured.
pub const DEFAULT_LOCK_AND_VISIBILITY_TIMEOUT_SEC: i64 = 30;

#[derive(Debug, PartialEq, Clone)]
pub enum Mode {
    Local(Port, Queue),
    AWS(Region, Queue),
}

/// Parameters for a distributed semaphore backing a [`Gate`].
///
/// The semaphore implementation itself lives outside this crate; this is
/// the bundle it is handed. A `max_lock_count` of one yields a singleton
/// worker across the fleet.
#[derive(Debug, Clone, PartialEq)]
pub struct SemaphoreGateConfig {
    pub lock_key: String,
    pub max_lock_count: u32,
    pub lock_timeout_sec: i64,
}

/// Wrapper for all of the configuration needed to stand up a message driven
/// worker: the queue, the worker, and the semaphore parameters guarding it.
pub struct WorkerStackConfig {
    queue_url: String,
    worker: Arc<dyn Worker>,
    lock_key: String,
    max_lock_count: u32,
    lock_and_visibility_timeout_sec: i64,
    gate: Option<Arc<dyn Gate>>,
}

impl WorkerStackConfig {
    pub fn new(queue_url: &str, worker: Arc<dyn Worker>) -> Self {
        WorkerStackConfig {
            queue_url: queue_url.to_owned(),
            worker,
            lock_key: queue_url.to_owned(),
            max_lock_count: 1,
            lock_and_visibility_timeout_sec: DEFAULT_LOCK_AND_VISIBILITY_TIMEOUT_SEC,
            gate: None,
        }
    }

    /// The semaphore lock key that must be held in order to run the worker.
    pub fn with_semaphore_lock_key(mut self, lock_key: &str) -> Self {
        self.lock_key = lock_key.to_owned();
        self
    }

    /// The maximum number of concurrent locks that can be issued for the
    /// semaphore key. If the worker is expected to be a singleton, set this
    /// to one.
    pub fn with_semaphore_max_lock_count(mut self, max_lock_count: u32) -> Self {
        self.max_lock_count = max_lock_count;
        self
    }

    /// One value applied to both the message visibility timeout and the
    /// semaphore lock timeout, keeping the two leases consistent.
    pub fn with_lock_and_visibility_timeout_sec(mut self, timeout_sec: i64) -> Self {
        self.lock_and_visibility_timeout_sec = timeout_sec;
        self
    }

    /// The gate checked before every poll, typically backed by the
    /// semaphore described by [`WorkerStackConfig::semaphore_gate_config`].
    pub fn with_gate(mut self, gate: Arc<dyn Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn semaphore_gate_config(&self) -> SemaphoreGateConfig {
        SemaphoreGateConfig {
            lock_key: self.lock_key.clone(),
            max_lock_count: self.max_lock_count,
            lock_timeout_sec: self.lock_and_visibility_timeout_sec,
        }
    }

    pub fn receiver_config(&self) -> PollingReceiverConfig {
        PollingReceiverConfig {
            queue_url: self.queue_url.clone(),
            message_visibility_timeout_sec: self.lock_and_visibility_timeout_sec,
            lock_timeout_sec: self.lock_and_visibility_timeout_sec,
            gate: self.gate.clone(),
            worker: Arc::clone(&self.worker),
        }
    }
}

#[derive(Debug)]
pub struct Cli {
    maybe_local: Option<String>,
    maybe_region: Option<String>,
    maybe_queue: Option<String>,
    maybe_lock_key: Option<String>,
    maybe_max_locks: Option<String>,
    maybe_timeout: Option<String>,
    maybe_send: Option<String>,
}

impl Cli {
    pub fn new() -> Self {
        let matches = get_matches();
        Cli {
            maybe_local: matches.value_of("local").map(|s| s.to_owned()),
            maybe_region: matches.value_of("region").map(|s| s.to_owned()),
            maybe_queue: matches.value_of("queue").map(|s| s.to_owned()),
            maybe_lock_key: matches.value_of("lock-key").map(|s| s.to_owned()),
            maybe_max_locks: matches.value_of("max-locks").map(|s| s.to_owned()),
            maybe_timeout: matches.value_of("timeout").map(|s| s.to_owned()),
            maybe_send: matches.value_of("send").map(|s| s.to_owned()),
        }
    }

    #[cfg(test)]
    fn new_with(
        maybe_local: Option<String>,
        maybe_region: Option<String>,
        maybe_queue: Option<String>,
    ) -> Self {
        Cli {
            maybe_local,
            maybe_region,
            maybe_queue,
            maybe_lock_key: None,
            maybe_max_locks: None,
            maybe_timeout: None,
            maybe_send: None,
        }
    }

    pub fn determine_mode(&self) -> Result<Mode, ReceiverError> {
        if let Some(queue) = self.maybe_queue.clone() {
            if let Some(port_string) = self.maybe_local.clone() {
                port_string
                    .parse::<u32>()
                    .map_err(|_| CommandLineError("Invalid Port"))
                    .map(|port| Mode::Local(port, queue.to_owned()))
            } else if let Some(region_string) = self.maybe_region.clone() {
                Region::from_str(region_string.as_ref())
                    .map_err(|_| CommandLineError("Invalid region specified"))
                    .map(|region| Mode::AWS(region, queue.to_owned()))
            } else {
                Err(CommandLineError(
                    "No local or region parameter was specified",
                ))
            }
        } else {
            Err(CommandLineError("No queue was specified"))
        }
    }

    pub fn lock_key(&self) -> Option<String> {
        self.maybe_lock_key.clone()
    }

    pub fn max_locks(&self) -> Result<u32, ReceiverError> {
        match &self.maybe_max_locks {
            Some(count) => count
                .parse::<u32>()
                .map_err(|_| CommandLineError("Invalid max lock count")),
            None => Ok(1),
        }
    }

    pub fn timeout_sec(&self) -> Result<i64, ReceiverError> {
        match &self.maybe_timeout {
            Some(timeout) => timeout
                .parse::<i64>()
                .map_err(|_| CommandLineError("Invalid timeout")),
            None => Ok(DEFAULT_LOCK_AND_VISIBILITY_TIMEOUT_SEC),
        }
    }

    pub fn send_body(&self) -> Option<String> {
        self.maybe_send.clone()
    }
}

fn get_matches<'a>() -> ArgMatches<'a> {
    App::new("rs-gated-receiver")
        .version("0.1")
        .about("Processes messages off of an SQS queue behind an admission gate")
        .arg(
            Arg::with_name("local")
                .short("l")
                .long("local")
                .help("Run against a local Elastic MQ server running on port")
                .value_name("PORT")
                .takes_value(true)
                .conflicts_with("region")
                .required_unless_one(&["region"]),
        )
        .arg(
            Arg::with_name("region")
                .short("r")
                .long("region")
                .help("The Amazon region of the sqs server")
                .value_name("REGION")
                .takes_value(true)
                .conflicts_with("local")
                .required_unless_one(&["local"]),
        )
        .arg(
            Arg::with_name("queue")
                .short("q")
                .long("queue")
                .help("The url of the queue")
                .value_name("QUEUE")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("lock-key")
                .short("k")
                .long("lock-key")
                .help("The semaphore lock key guarding the worker")
                .value_name("KEY")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("max-locks")
                .short("m")
                .long("max-locks")
                .help("The maximum number of concurrent semaphore locks")
                .value_name("COUNT")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("timeout")
                .short("t")
                .long("timeout")
                .help("Lock and message visibility timeout in seconds")
                .value_name("SECONDS")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("send")
                .short("s")
                .long("send")
                .help("Send a message with the given body instead of receiving")
                .value_name("BODY")
                .takes_value(true),
        )
        .get_matches()
}
