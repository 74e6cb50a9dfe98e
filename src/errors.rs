use rusoto_core::RusotoError;
use rusoto_sqs::{
    ChangeMessageVisibilityError, DeleteMessageError, ReceiveMessageError, SendMessageError,
};
use std::convert::From;
use std::error::Error;
use std::fmt::{self, Display};

/// Error a `Worker` can return for a single message.
///
/// The variant decides what happens to the message: a recoverable error
/// leaves it in the queue for a quick retry, anything else removes it.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkError {
    RecoverableError(String),
    UnRecoverableError(String),
}

impl Display for WorkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkError::RecoverableError(msg) => write!(f, "A recoverable error occurred: {}", msg),
            WorkError::UnRecoverableError(msg) => {
                write!(f, "An unrecoverable error occurred: {}", msg)
            }
        }
    }
}

impl Error for WorkError {}

#[derive(Debug)]
pub enum ReceiverError {
    ConfigurationError(&'static str),
    SqsReceiveMessageError(RusotoError<ReceiveMessageError>),
    SqsDeleteMessageError(RusotoError<DeleteMessageError>),
    SqsChangeVisibilityError(RusotoError<ChangeMessageVisibilityError>),
    SqsSendMessageError(RusotoError<SendMessageError>),
    TransportViolation(String),
    WorkerFailed(String),
    CommandLineError(&'static str),
}

impl Display for ReceiverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverError::ConfigurationError(e) => {
                write!(f, "A configuration error occurred: {}", e)
            }
            ReceiverError::SqsReceiveMessageError(e) => {
                write!(f, "Error receiving SQS message: {:#?}", e)
            }
            ReceiverError::SqsDeleteMessageError(e) => {
                write!(f, "Error deleting SQS message: {:#?}", e)
            }
            ReceiverError::SqsChangeVisibilityError(e) => {
                write!(f, "Error changing SQS message visibility: {:#?}", e)
            }
            ReceiverError::SqsSendMessageError(e) => {
                write!(f, "Error sending SQS message: {:#?}", e)
            }
            ReceiverError::TransportViolation(e) => {
                write!(f, "The queue violated an expectation: {}", e)
            }
            ReceiverError::WorkerFailed(e) => {
                write!(f, "The worker failed processing a message: {}", e)
            }
            ReceiverError::CommandLineError(e) => {
                write!(f, "A command line error occurred: {}", e)
            }
        }
    }
}

impl Error for ReceiverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReceiverError::SqsReceiveMessageError(ref e) => Some(e),
            ReceiverError::SqsDeleteMessageError(ref e) => Some(e),
            ReceiverError::SqsChangeVisibilityError(ref e) => Some(e),
            ReceiverError::SqsSendMessageError(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<RusotoError<ReceiveMessageError>> for ReceiverError {
    fn from(e: RusotoError<ReceiveMessageError>) -> Self {
        ReceiverError::SqsReceiveMessageError(e)
    }
}

impl From<RusotoError<DeleteMessageError>> for ReceiverError {
    fn from(e: RusotoError<DeleteMessageError>) -> Self {
        ReceiverError::SqsDeleteMessageError(e)
    }
}

impl From<RusotoError<ChangeMessageVisibilityError>> for ReceiverError {
    fn from(e: RusotoError<ChangeMessageVisibilityError>) -> Self {
        ReceiverError::SqsChangeVisibilityError(e)
    }
}

impl From<RusotoError<SendMessageError>> for ReceiverError {
    fn from(e: RusotoError<SendMessageError>) -> Self {
        ReceiverError::SqsSendMessageError(e)
    }
}
