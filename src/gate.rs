//! The acceptance gate: a per-request state machine over
//! `{PENDING, ACCEPTED, REJECTED}` with idempotent `accept`/`reject`.
//!
//! Listeners are handed a one-shot accept/reject callback; the idiomatic Rust
//! shape for that is a `Mutex`-guarded state plus a `Notify` that wakes
//! whichever task is awaiting a terminal transition, with a timeout that
//! auto-accepts if a listener never calls back.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

/// Upper bound on how long the gate waits for a listener to call `accept`/`reject`
/// before auto-accepting. A single documented constant, applied uniformly,
/// rather than a per-listener configurable timeout.
pub const GATE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Pending,
    Accepted,
    Rejected(String),
}

pub struct Gate {
    state: Mutex<GateState>,
    notify: Notify,
}

impl Gate {
    pub fn new() -> Self {
        Gate {
            state: Mutex::new(GateState::Pending),
            notify: Notify::new(),
        }
    }

    /// PENDING -> ACCEPTED iff still PENDING; otherwise a silent no-op.
    pub fn accept(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == GateState::Pending {
            *state = GateState::Accepted;
            drop(state);
            self.notify.notify_waiters();
        }
    }

    /// PENDING -> REJECTED(message) iff still PENDING; otherwise a silent no-op.
    pub fn reject(&self, message: String) {
        let mut state = self.state.lock().unwrap();
        if *state == GateState::Pending {
            *state = GateState::Rejected(message);
            drop(state);
            self.notify.notify_waiters();
        }
    }

    pub fn snapshot(&self) -> GateState {
        self.state.lock().unwrap().clone()
    }

    fn is_pending(&self) -> bool {
        matches!(self.snapshot(), GateState::Pending)
    }

    /// Await a terminal transition, bounded by `GATE_TIMEOUT`. If the gate is
    /// still PENDING when the timeout fires, it auto-accepts — a listener bug
    /// must never stall the transport forever.
    pub async fn await_decision(&self) -> GateState {
        if !self.is_pending() {
            return self.snapshot();
        }
        loop {
            let notified = self.notify.notified();
            tokio::select! {
                _ = notified => {
                    let state = self.snapshot();
                    if state != GateState::Pending {
                        return state;
                    }
                    // Spurious wake with no terminal state yet; keep waiting within budget.
                }
                _ = tokio::time::sleep(GATE_TIMEOUT) => {
                    self.accept();
                    return self.snapshot();
                }
            }
        }
    }

    /// Resolve immediately without waiting: used when there are zero listeners
    /// for the emitted event(s), so the gate auto-accepts synchronously rather
    /// than going through the timeout path.
    pub fn auto_accept(&self) -> GateState {
        self.accept();
        self.snapshot()
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn accept_then_reject_is_idempotent() {
        let gate = Gate::new();
        gate.accept();
        gate.reject("too late".into());
        assert_eq!(gate.snapshot(), GateState::Accepted);
    }

    #[test]
    fn reject_then_accept_is_idempotent() {
        let gate = Gate::new();
        gate.reject("no".into());
        gate.accept();
        assert_eq!(gate.snapshot(), GateState::Rejected("no".into()));
    }

    #[test]
    fn second_reject_does_not_change_message() {
        let gate = Gate::new();
        gate.reject("first".into());
        gate.reject("second".into());
        assert_eq!(gate.snapshot(), GateState::Rejected("first".into()));
    }

    #[tokio::test]
    async fn auto_accept_is_immediate() {
        let gate = Gate::new();
        assert_eq!(gate.auto_accept(), GateState::Accepted);
    }

    #[tokio::test]
    async fn await_decision_resolves_on_accept() {
        let gate = Arc::new(Gate::new());
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.await_decision().await })
        };
        tokio::task::yield_now().await;
        gate.accept();
        let result = waiter.await.unwrap();
        assert_eq!(result, GateState::Accepted);
    }

    #[tokio::test(start_paused = true)]
    async fn await_decision_auto_accepts_on_timeout() {
        let gate = Gate::new();
        // No one ever calls accept/reject; the bounded wait must still resolve
        // once virtual time crosses GATE_TIMEOUT.
        let result = gate.await_decision().await;
        assert_eq!(result, GateState::Accepted);
    }
}
