//! Pipeline state: single-flight lock, stage machine, abort flag, and
//! the cost-gate decision channel.
//!
//! The handle is an explicit, injectable object owned by one
//! orchestrator and cloned into anything that needs to read or mutate
//! pipeline state; there are no ambient singletons.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Where the pipeline currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Fetch,
    Scrape,
    CostGate,
    Summarize,
    Notify,
    Embed,
    Done,
    Aborted,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Fetch => "fetch",
            Stage::Scrape => "scrape",
            Stage::CostGate => "cost_gate",
            Stage::Summarize => "summarize",
            Stage::Notify => "notify",
            Stage::Embed => "embed",
            Stage::Done => "done",
            Stage::Aborted => "aborted",
            Stage::Error => "error",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the cost gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Approved,
    Declined,
}

/// Snapshot returned by status polls
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub held: bool,
    pub stage: Stage,
    pub cost_estimate: Option<f64>,
    pub actual_cost: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug)]
struct StatusFields {
    stage: Stage,
    cost_estimate: Option<f64>,
    actual_cost: Option<f64>,
    error: Option<String>,
}

struct Inner {
    held: AtomicBool,
    abort: AtomicBool,
    status: Mutex<StatusFields>,
    gate_tx: watch::Sender<Option<GateDecision>>,
}

/// Shared pipeline state handle
#[derive(Clone)]
pub struct PipelineHandle {
    inner: Arc<Inner>,
}

impl Default for PipelineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineHandle {
    pub fn new() -> Self {
        let (gate_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                held: AtomicBool::new(false),
                abort: AtomicBool::new(false),
                status: Mutex::new(StatusFields {
                    stage: Stage::Idle,
                    cost_estimate: None,
                    actual_cost: None,
                    error: None,
                }),
                gate_tx,
            }),
        }
    }

    /// Non-blocking compare-and-set acquisition. Returns false when
    /// another execution already holds the lock; callers must not retry
    /// or queue.
    pub fn try_acquire(&self) -> bool {
        if self
            .inner
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.inner.abort.store(false, Ordering::Release);
        self.inner.gate_tx.send_replace(None);
        let mut status = self.inner.status.lock().unwrap();
        status.stage = Stage::Idle;
        status.cost_estimate = None;
        status.actual_cost = None;
        status.error = None;
        true
    }

    /// Release the lock. The terminal stage (done/aborted/error) stays
    /// visible to status polls until the next acquisition.
    pub fn release(&self) {
        self.inner.held.store(false, Ordering::Release);
    }

    pub fn is_held(&self) -> bool {
        self.inner.held.load(Ordering::Acquire)
    }

    pub fn set_stage(&self, stage: Stage) {
        self.inner.status.lock().unwrap().stage = stage;
    }

    pub fn stage(&self) -> Stage {
        self.inner.status.lock().unwrap().stage
    }

    /// Request cooperative cancellation; checked at stage and batch-item
    /// boundaries, never preemptive. Idempotent no-op when idle.
    pub fn request_abort(&self) {
        if self.is_held() {
            self.inner.abort.store(true, Ordering::Release);
            // An abort also unblocks a pending cost gate
            self.inner.gate_tx.send_replace(Some(GateDecision::Declined));
        }
    }

    pub fn abort_requested(&self) -> bool {
        self.inner.abort.load(Ordering::Acquire)
    }

    pub fn set_cost_estimate(&self, estimate: Option<f64>) {
        self.inner.status.lock().unwrap().cost_estimate = estimate;
    }

    pub fn set_actual_cost(&self, cost: Option<f64>) {
        self.inner.status.lock().unwrap().actual_cost = cost;
    }

    pub fn set_error(&self, message: String) {
        let mut status = self.inner.status.lock().unwrap();
        status.stage = Stage::Error;
        status.error = Some(message);
    }

    /// Resolve the cost gate with an approval
    pub fn approve_cost(&self) {
        self.inner.gate_tx.send_replace(Some(GateDecision::Approved));
    }

    /// Resolve the cost gate with a decline
    pub fn decline_cost(&self) {
        self.inner.gate_tx.send_replace(Some(GateDecision::Declined));
    }

    /// Block until the gate is resolved or the timeout lapses. Timeout
    /// counts as a decline; its timer is independent of any call timeout.
    pub async fn wait_for_gate(&self, timeout: Duration) -> GateDecision {
        let mut rx = self.inner.gate_tx.subscribe();
        let wait = async {
            loop {
                if let Some(decision) = *rx.borrow_and_update() {
                    return decision;
                }
                if rx.changed().await.is_err() {
                    return GateDecision::Declined;
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .unwrap_or(GateDecision::Declined)
    }

    pub fn status(&self) -> PipelineStatus {
        let status = self.inner.status.lock().unwrap();
        PipelineStatus {
            held: self.is_held(),
            stage: status.stage,
            cost_estimate: status.cost_estimate,
            actual_cost: status.actual_cost,
            error: status.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight_acquisition() {
        let handle = PipelineHandle::new();
        assert!(handle.try_acquire());
        assert!(!handle.try_acquire());
        handle.release();
        assert!(handle.try_acquire());
    }

    #[test]
    fn test_acquire_resets_prior_run_state() {
        let handle = PipelineHandle::new();
        assert!(handle.try_acquire());
        handle.set_stage(Stage::Error);
        handle.set_error("boom".into());
        handle.set_cost_estimate(Some(1.5));
        handle.release();

        // terminal state stays visible until the next run starts
        assert_eq!(handle.status().stage, Stage::Error);

        assert!(handle.try_acquire());
        let status = handle.status();
        assert_eq!(status.stage, Stage::Idle);
        assert!(status.cost_estimate.is_none());
        assert!(status.error.is_none());
    }

    #[test]
    fn test_abort_is_noop_when_idle() {
        let handle = PipelineHandle::new();
        handle.request_abort();
        assert!(!handle.abort_requested());

        assert!(handle.try_acquire());
        handle.request_abort();
        assert!(handle.abort_requested());
    }

    #[tokio::test]
    async fn test_gate_approve() {
        let handle = PipelineHandle::new();
        assert!(handle.try_acquire());

        let waiter = handle.clone();
        let task =
            tokio::spawn(async move { waiter.wait_for_gate(Duration::from_secs(5)).await });
        tokio::task::yield_now().await;
        handle.approve_cost();

        assert_eq!(task.await.unwrap(), GateDecision::Approved);
    }

    #[tokio::test]
    async fn test_gate_decision_before_wait_is_seen() {
        let handle = PipelineHandle::new();
        assert!(handle.try_acquire());
        handle.decline_cost();
        let decision = handle.wait_for_gate(Duration::from_secs(5)).await;
        assert_eq!(decision, GateDecision::Declined);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_timeout_declines() {
        let handle = PipelineHandle::new();
        assert!(handle.try_acquire());
        let decision = handle.wait_for_gate(Duration::from_secs(300)).await;
        assert_eq!(decision, GateDecision::Declined);
    }
}
