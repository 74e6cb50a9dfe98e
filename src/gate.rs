use crate::errors::ReceiverError;
use async_trait::async_trait;
use std::sync::Arc;

/// Admission control for a protected action.
///
/// A gate decides whether the action it guards may run right now, and is
/// told about failures of runs it admitted. Implementations typically back
/// this with a distributed semaphore so that at most N processes across a
/// fleet hold a permit at once; `on_run_failed` lets such an implementation
/// release its lock early.
#[async_trait]
pub trait Gate: Send + Sync {
    /// True if the protected action may execute right now.
    async fn can_run(&self) -> bool;

    /// Notifies the gate that an action it admitted failed while running.
    async fn on_run_failed(&self, error: &ReceiverError);
}

/// A protected action that can be wrapped by a [`GatedRunner`].
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self) -> Result<(), ReceiverError>;
}

/// A gate that always admits and ignores failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

#[async_trait]
impl Gate for OpenGate {
    async fn can_run(&self) -> bool {
        true
    }

    async fn on_run_failed(&self, _error: &ReceiverError) {}
}

/// Combines several gates into one.
///
/// Open only when every member gate is open. Failure notifications fan out
/// to every member.
pub struct CompositeGate {
    gates: Vec<Arc<dyn Gate>>,
}

impl CompositeGate {
    pub fn new(gates: Vec<Arc<dyn Gate>>) -> Self {
        CompositeGate { gates }
    }
}

#[async_trait]
impl Gate for CompositeGate {
    async fn can_run(&self) -> bool {
        for gate in &self.gates {
            if !gate.can_run().await {
                return false;
            }
        }
        true
    }

    async fn on_run_failed(&self, error: &ReceiverError) {
        for gate in &self.gates {
            gate.on_run_failed(error).await;
        }
    }
}

/// A simple runner controlled with a gate.
///
/// When [`GatedRunner::run`] is called the wrapped runner will run if the
/// provided [`Gate::can_run`] returns true. A closed gate is a silent no-op.
/// An error from the runner is forwarded to [`Gate::on_run_failed`] and
/// swallowed at this layer; the gate owns the consequences.
pub struct GatedRunner {
    gate: Arc<dyn Gate>,
    runner: Arc<dyn Runner>,
}

impl GatedRunner {
    pub fn new(gate: Arc<dyn Gate>, runner: Arc<dyn Runner>) -> Self {
        GatedRunner { gate, runner }
    }

    pub async fn run(&self) {
        if self.gate.can_run().await {
            if let Err(e) = self.runner.run().await {
                trace!("run failed, notifying the gate: {}", &e);
                self.gate.on_run_failed(&e).await;
            }
        } else {
            trace!("gate is closed, skipping run");
        }
    }
}

#[async_trait]
impl Runner for GatedRunner {
    async fn run(&self) -> Result<(), ReceiverError> {
        GatedRunner::run(self).await;
        Ok(())
    }
}
