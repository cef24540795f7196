//! Message routing.
//!
//! Frames are parsed into [`InboundMessage`]s and dispatched to every handler
//! registered for the message kind. A failing or panicking handler is logged
//! and skipped; the remaining handlers still run.

use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use thiserror::Error;
use tracing::{debug, warn};

use super::messages::{InboundMessage, MessageKind};
use crate::metrics::FeedMetrics;

/// Error returned by a message handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("handler failed: {0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Creates a handler error.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A message handler.
pub type Handler = Arc<dyn Fn(&InboundMessage) -> Result<(), HandlerError> + Send + Sync>;

/// Handlers grouped by message kind.
///
/// Ids only grow, so each kind's map iterates in registration order.
#[derive(Default)]
pub struct SubscriptionRegistry {
    handlers: RwLock<HashMap<MessageKind, BTreeMap<u64, Handler>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<MessageKind, usize> =
            handlers.iter().map(|(kind, h)| (*kind, h.len())).collect();
        f.debug_struct("SubscriptionRegistry")
            .field("handlers", &counts)
            .finish()
    }
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, kind: MessageKind, handler: Handler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .insert(id, handler);
        id
    }

    fn remove(&self, kind: MessageKind, id: u64) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let Some(for_kind) = handlers.get_mut(&kind) else {
            return false;
        };
        let removed = for_kind.remove(&id).is_some();
        if for_kind.is_empty() {
            handlers.remove(&kind);
        }
        removed
    }

    /// Returns the handlers for a kind in registration order.
    fn handlers_for(&self, kind: MessageKind) -> Vec<Handler> {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers
            .get(&kind)
            .map(|for_kind| for_kind.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of handlers registered for a kind.
    #[must_use]
    pub fn len(&self, kind: MessageKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, BTreeMap::len)
    }
}

/// Handle returned by [`MessageRouter::on`]; removes the handler on
/// [`unsubscribe`](Self::unsubscribe).
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    registry: Weak<SubscriptionRegistry>,
    kind: MessageKind,
    id: u64,
}

impl SubscriptionHandle {
    /// Removes the handler. Returns true the first time only.
    pub fn unsubscribe(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.kind, self.id))
    }

    /// Returns the message kind the handler listens to.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Returns the registration id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

/// Parses frames and dispatches them to registered handlers.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: Arc<SubscriptionRegistry>,
    metrics: Arc<FeedMetrics>,
}

impl MessageRouter {
    /// Creates a router reporting into `metrics`.
    #[must_use]
    pub fn new(metrics: Arc<FeedMetrics>) -> Self {
        Self {
            registry: Arc::new(SubscriptionRegistry::new()),
            metrics,
        }
    }

    /// Registers a handler for a message kind.
    pub fn on<F>(&self, kind: MessageKind, handler: F) -> SubscriptionHandle
    where
        F: Fn(&InboundMessage) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = self.registry.insert(kind, Arc::new(handler));
        debug!(kind = %kind, id, "Handler registered");
        SubscriptionHandle {
            registry: Arc::downgrade(&self.registry),
            kind,
            id,
        }
    }

    /// Parses a raw frame and dispatches it.
    ///
    /// Malformed frames are logged, counted, and dropped.
    pub fn route(&self, raw: &str) -> Option<InboundMessage> {
        match InboundMessage::parse(raw) {
            Ok(msg) => {
                self.dispatch(&msg);
                Some(msg)
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                self.metrics.record_malformed();
                None
            }
        }
    }

    /// Invokes every handler for the message's kind, in registration order.
    ///
    /// Returns the number of handlers that completed successfully.
    pub fn dispatch(&self, msg: &InboundMessage) -> usize {
        let kind = msg.kind();
        let mut succeeded = 0;

        for handler in self.registry.handlers_for(kind) {
            match catch_unwind(AssertUnwindSafe(|| handler(msg))) {
                Ok(Ok(())) => succeeded += 1,
                Ok(Err(e)) => {
                    warn!(kind = %kind, error = %e, "Message handler failed");
                    self.metrics.record_handler_failure();
                }
                Err(_) => {
                    warn!(kind = %kind, "Message handler panicked");
                    self.metrics.record_handler_failure();
                }
            }
        }

        succeeded
    }

    /// Returns the number of handlers registered for a kind.
    #[must_use]
    pub fn handler_count(&self, kind: MessageKind) -> usize {
        self.registry.len(kind)
    }

    /// Returns the metrics this router reports into.
    #[must_use]
    pub fn metrics(&self) -> &Arc<FeedMetrics> {
        &self.metrics
    }
}
