//! Typed event names and the observer registry.
//!
//! Modeled as a struct holding a `Vec` of boxed closures per named event, with
//! synchronous, inline fan-out on `emit` — a typed map from event name to its
//! list of listeners, registered once up front and never mutated per-request.

use std::fmt;
use std::sync::Arc;

use crate::gate::Gate;

/// `type ∈ {fetch, push}`, derived from the Git service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Fetch,
    Push,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Fetch => write!(f, "fetch"),
            OperationType::Push => write!(f, "push"),
        }
    }
}

/// `phase ∈ {advertise, rpc, head}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Advertise,
    Rpc,
    Head,
}

/// Carried to `info`/`fetch`/`push`/`head` listeners: the repo name plus a handle
/// onto the per-request acceptance gate. `accept`/`reject` are exposed as
/// methods on the gate handle rather than free closures, which is the natural
/// Rust shape for "an object with accept()/reject() fields".
#[derive(Clone)]
pub struct GitInfo {
    pub repo: String,
    pub operation: OperationType,
    pub phase: Phase,
    pub gate: Arc<Gate>,
}

impl GitInfo {
    pub fn accept(&self) {
        self.gate.accept();
    }

    pub fn reject(&self, message: impl Into<String>) {
        self.gate.reject(message.into());
    }
}

/// Carried to `tag` listeners when a `refs/tags/<name>` creation is observed
/// mid-push. `accept`/`reject` here are advisory notifications only — the
/// underlying push is never gated on them.
#[derive(Clone)]
pub struct TagInfo {
    pub repo: String,
    pub commit: String,
    pub version: String,
}

impl TagInfo {
    /// No-op acknowledgement; kept for interface parity with `GitInfo`.
    pub fn accept(&self) {}

    /// No-op acknowledgement; kept for interface parity with `GitInfo`.
    pub fn reject(&self, _message: impl Into<String>) {}
}

type InfoListener = Arc<dyn Fn(GitInfo) + Send + Sync>;
type TagListener = Arc<dyn Fn(TagInfo) + Send + Sync>;
type ErrorListener = Arc<dyn Fn(String) + Send + Sync>;

/// The observer registry: one list of listeners per named event. Persists
/// across requests, set up once before `listen`.
#[derive(Default, Clone)]
pub struct EventBus {
    info: Vec<InfoListener>,
    fetch: Vec<InfoListener>,
    push: Vec<InfoListener>,
    head: Vec<InfoListener>,
    tag: Vec<TagListener>,
    error: Vec<ErrorListener>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_info(&mut self, listener: impl Fn(GitInfo) + Send + Sync + 'static) {
        self.info.push(Arc::new(listener));
    }

    pub fn on_fetch(&mut self, listener: impl Fn(GitInfo) + Send + Sync + 'static) {
        self.fetch.push(Arc::new(listener));
    }

    pub fn on_push(&mut self, listener: impl Fn(GitInfo) + Send + Sync + 'static) {
        self.push.push(Arc::new(listener));
    }

    pub fn on_head(&mut self, listener: impl Fn(GitInfo) + Send + Sync + 'static) {
        self.head.push(Arc::new(listener));
    }

    pub fn on_tag(&mut self, listener: impl Fn(TagInfo) + Send + Sync + 'static) {
        self.tag.push(Arc::new(listener));
    }

    pub fn on_error(&mut self, listener: impl Fn(String) + Send + Sync + 'static) {
        self.error.push(Arc::new(listener));
    }

    fn listeners_for(&self, operation: OperationType) -> &[InfoListener] {
        match operation {
            OperationType::Fetch => &self.fetch,
            OperationType::Push => &self.push,
        }
    }

    /// Whether `emit` would have zero listeners to call for this phase/operation —
    /// i.e. whether the gate should auto-accept synchronously instead of waiting.
    pub fn has_listeners(&self, phase: Phase, operation: OperationType) -> bool {
        match phase {
            Phase::Advertise => !self.info.is_empty() || !self.listeners_for(operation).is_empty(),
            Phase::Rpc => !self.listeners_for(operation).is_empty(),
            Phase::Head => !self.head.is_empty(),
        }
    }

    /// Fan out to all listeners for this info: `info` first (advertisement
    /// phase only), then the type-specific event.
    pub fn emit(&self, info: GitInfo) {
        if info.phase == Phase::Advertise {
            for listener in &self.info {
                listener(info.clone());
            }
        }
        match info.phase {
            Phase::Advertise | Phase::Rpc => {
                for listener in self.listeners_for(info.operation) {
                    listener(info.clone());
                }
            }
            Phase::Head => {
                for listener in &self.head {
                    listener(info.clone());
                }
            }
        }
    }

    pub fn emit_tag(&self, tag: TagInfo) {
        for listener in &self.tag {
            listener(tag.clone());
        }
    }

    pub fn has_error_listeners(&self) -> bool {
        !self.error.is_empty()
    }

    /// Asynchronous operational errors: surfaced to listeners if any are
    /// registered, otherwise logged so the failure is never silent.
    pub fn emit_error(&self, message: impl Into<String>) {
        let message = message.into();
        if self.error.is_empty() {
            log::error!("{message}");
            return;
        }
        for listener in &self.error {
            listener(message.clone());
        }
    }
}
