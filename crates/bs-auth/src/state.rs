use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::trace;

use crate::config::STATE_CHANNEL_CAPACITY;

/// Observable state of the session state machine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session activity: initial or post-logout rest state
    #[default]
    Idle,
    /// An operation is in flight
    Loading,
    /// The last operation completed
    Success(String),
    /// The last operation failed
    Error(String),
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Message carried by `Success` or `Error`
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(message) | Self::Error(message) => Some(message),
            Self::Idle | Self::Loading => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Loading => f.write_str("loading"),
            Self::Success(message) => write!(f, "success: {}", message),
            Self::Error(message) => write!(f, "error: {}", message),
        }
    }
}

/// Passive reader notified synchronously on every transition
///
/// Observers must not assume `Success` persists: logout publishes
/// `Success` and then `Idle` back to back.
pub trait SessionObserver: Send + Sync {
    fn on_transition(&self, state: &SessionState);
}

impl<F> SessionObserver for F
where
    F: Fn(&SessionState) + Send + Sync,
{
    fn on_transition(&self, state: &SessionState) {
        self(state)
    }
}

/// Handle returned by [`StatePublisher::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Holds the current state and fans each transition out to observers
pub struct StatePublisher {
    current: RwLock<SessionState>,
    observers: RwLock<Vec<(ObserverId, Arc<dyn SessionObserver>)>>,
    next_id: AtomicU64,
    events: broadcast::Sender<SessionState>,
}

impl StatePublisher {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Self {
            current: RwLock::new(SessionState::Idle),
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            events,
        }
    }

    pub fn current(&self) -> SessionState {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Register a synchronous observer. Observers run in registration order.
    pub fn observe(&self, observer: Arc<dyn SessionObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        id
    }

    /// Returns false if the observer was not registered
    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Async stream of every transition published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<SessionState> {
        self.events.subscribe()
    }

    /// Replace the current state and notify everyone, in order
    pub fn publish(&self, state: SessionState) {
        trace!(%state, "Session transition");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = state.clone();

        // Snapshot so observers may (un)register without deadlocking.
        let observers: Vec<Arc<dyn SessionObserver>> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer.on_transition(&state);
        }

        // No receivers is fine.
        let _ = self.events.send(state);
    }
}

impl Default for StatePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StatePublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let observers = self
            .observers
            .read()
            .map(|o| o.len())
            .unwrap_or_default();
        f.debug_struct("StatePublisher")
            .field("current", &self.current())
            .field("observers", &observers)
            .finish()
    }
}
