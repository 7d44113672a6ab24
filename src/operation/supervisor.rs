//! Async operation supervisor.
//!
//! One [`OperationSlot`] per operation a step owns. A slot runs the remote
//! call behind a connectivity pre-flight, drives the cosmetic progress
//! ticker, classifies failures, bounds retries and drops any response whose
//! generation token is no longer current.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::OperationPolicy;
use crate::connectivity::{ConnectivityProbe, ConnectivityStatus};
use crate::error::{ApiError, OperationError, RetryError};

use super::kind::OperationKind;
use super::state::{OperationSnapshot, OperationState};
use super::ticker::spawn_ticker;

/// A remote call that can be supervised.
#[async_trait]
pub trait RemoteCall: Send + Sync + 'static {
    type Request: Clone + Send + Sync + 'static;
    type Output: Clone + Send + Sync + 'static;

    fn kind(&self) -> OperationKind;

    async fn call(&self, request: &Self::Request) -> Result<Self::Output, ApiError>;
}

/// How one run of a slot ended, from the caller's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome<T> {
    Succeeded(T),
    Failed(OperationError),
    /// A newer trigger or a reset replaced this run; its response was dropped.
    Superseded,
}

impl<T> RunOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Supervises one operation slot.
pub struct OperationSlot<C: RemoteCall> {
    call: Arc<C>,
    probe: ConnectivityProbe,
    policy: OperationPolicy,
    state: Arc<watch::Sender<OperationSnapshot<C::Output>>>,
    /// Inputs of the current invocation, replayed by `retry`.
    request: Mutex<Option<C::Request>>,
}

impl<C: RemoteCall> OperationSlot<C> {
    pub fn new(call: C, probe: ConnectivityProbe, policy: OperationPolicy) -> Self {
        let snapshot = OperationSnapshot::idle(call.kind(), policy.max_attempts);
        let (tx, _rx) = watch::channel(snapshot);
        Self {
            call: Arc::new(call),
            probe,
            policy,
            state: Arc::new(tx),
            request: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.call.kind()
    }

    /// Current state of the slot.
    pub fn snapshot(&self) -> OperationSnapshot<C::Output> {
        self.state.borrow().clone()
    }

    /// Receive every state change (progress ticks included).
    pub fn subscribe(&self) -> watch::Receiver<OperationSnapshot<C::Output>> {
        self.state.subscribe()
    }

    /// Result of the last successful run, if the slot is still showing it.
    pub fn result(&self) -> Option<C::Output> {
        self.state.borrow().result.clone()
    }

    /// Inputs of the current invocation, if any.
    pub fn request(&self) -> Option<C::Request> {
        self.request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start a new, independent invocation. Any run still in flight for this
    /// slot is superseded.
    pub async fn start(&self, request: C::Request) -> RunOutcome<C::Output> {
        *self.request.lock().unwrap_or_else(PoisonError::into_inner) = Some(request.clone());
        let mut generation = 0;
        self.state.send_modify(|s| {
            s.generation += 1;
            s.reset();
            generation = s.generation;
        });
        self.execute(generation, request).await
    }

    /// Re-run the last invocation with the same inputs, if the retry budget
    /// and the last failure allow it.
    pub async fn retry(&self) -> Result<RunOutcome<C::Output>, RetryError> {
        let request = self.request().ok_or(RetryError::NothingToRetry)?;

        let mut verdict = Err(RetryError::NothingToRetry);
        self.state.send_if_modified(|s| match s.retry_blocker() {
            Some(blocker) => {
                verdict = Err(blocker);
                false
            }
            None => {
                s.generation += 1;
                verdict = Ok(s.generation);
                true
            }
        });
        let generation = verdict?;

        Ok(self.execute(generation, request).await)
    }

    /// Inputs changed: forget the current invocation and any result. A run
    /// still in flight will be discarded when it lands.
    pub fn reset(&self) {
        *self.request.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.state.send_if_modified(|s| {
            let was_idle = s.state == OperationState::Idle && s.result.is_none();
            s.generation += 1;
            s.reset();
            !was_idle
        });
        debug!(kind = %self.kind(), "Operation reset to idle");
    }

    /// Show a result recovered from saved step data, as if a run had just
    /// succeeded. There is nothing to retry afterwards.
    pub fn restore_success(&self, output: C::Output) {
        *self.request.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.state.send_modify(|s| {
            s.generation += 1;
            s.restore(output);
        });
    }

    async fn execute(&self, generation: u64, request: C::Request) -> RunOutcome<C::Output> {
        let kind = self.kind();

        if self.probe.check().await != ConnectivityStatus::Connected {
            warn!(%kind, generation, "Backend unreachable, operation not attempted");
            let error = OperationError::connectivity();
            return if self.apply(generation, |s| s.fail(error.clone())) {
                RunOutcome::Failed(error)
            } else {
                RunOutcome::Superseded
            };
        }

        let base = self.policy.base_duration_secs(kind);
        if !self.apply(generation, |s| s.begin_attempt(base)) {
            return RunOutcome::Superseded;
        }
        let attempt = self.state.borrow().attempt;
        info!(%kind, attempt, generation, "Operation started");

        let in_flight = InFlight {
            state: &self.state,
            generation,
            ticker: spawn_ticker(
                Arc::clone(&self.state),
                generation,
                self.policy.tick_interval,
                self.policy.max_tick_increment,
            ),
            settled: false,
        };
        let result = self.call.call(&request).await;
        in_flight.finish();

        match result {
            Ok(output) => {
                if self.apply(generation, |s| s.succeed(output.clone())) {
                    info!(%kind, attempt, "Operation succeeded");
                    RunOutcome::Succeeded(output)
                } else {
                    debug!(%kind, generation, "Dropping superseded success");
                    RunOutcome::Superseded
                }
            }
            Err(err) => {
                let error = OperationError::from(&err);
                if self.apply(generation, |s| s.fail(error.clone())) {
                    warn!(
                        %kind,
                        attempt,
                        error_kind = %error.kind,
                        retryable = error.is_retryable(),
                        "Operation failed: {}",
                        err
                    );
                    RunOutcome::Failed(error)
                } else {
                    debug!(%kind, generation, "Dropping superseded failure");
                    RunOutcome::Superseded
                }
            }
        }
    }

    /// Apply `f` only while `generation` is still the slot's current one.
    fn apply(&self, generation: u64, f: impl FnOnce(&mut OperationSnapshot<C::Output>)) -> bool {
        self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            f(s);
            true
        })
    }
}

/// The remote call of one generation while it is awaited. Dropping it before
/// [`InFlight::finish`] means the caller abandoned the run: the ticker is
/// stopped and the slot leaves `Running` with a retryable failure.
struct InFlight<'a, T> {
    state: &'a watch::Sender<OperationSnapshot<T>>,
    generation: u64,
    ticker: JoinHandle<()>,
    settled: bool,
}

impl<T> InFlight<'_, T> {
    /// The call returned; the caller applies the outcome itself.
    fn finish(mut self) {
        self.settled = true;
    }
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        self.ticker.abort();
        if self.settled {
            return;
        }
        let generation = self.generation;
        let abandoned = self.state.send_if_modified(|s| {
            if s.generation != generation || s.state != OperationState::Running {
                return false;
            }
            s.fail(OperationError::interrupted());
            true
        });
        if abandoned {
            let kind = self.state.borrow().kind;
            warn!(%kind, generation, "Operation abandoned before the backend answered");
        }
    }
}
