use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Handle a `Worker` uses to report that work on the current message is
/// still progressing.
///
/// Each signal makes the receiver slide the message's visibility timeout
/// forward by the full configured lease, so a message that takes longer than
/// one lease to process is not redelivered to another consumer. The handle
/// is only wired up for the duration of one message; signals sent after that
/// message reached its terminal disposition are dropped.
#[derive(Clone)]
pub struct ProgressReporter {
    tx: UnboundedSender<()>,
}

impl ProgressReporter {
    pub fn progress_made(&self) {
        // A closed channel means the listener is already gone. Nothing to do.
        let _ = self.tx.send(());
    }
}

pub type ProgressSignals = UnboundedReceiver<()>;

/// Creates the reporter/listener pair for a single message.
pub fn progress_channel() -> (ProgressReporter, ProgressSignals) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressReporter { tx }, rx)
}
