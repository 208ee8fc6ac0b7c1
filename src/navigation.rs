use std::sync::{Mutex, PoisonError};

use bs_auth::{SessionObserver, SessionState};
use tracing::debug;

/// Screens of the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Auth,
    BookList,
}

/// Credential submission the navigator is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthIntent {
    SignUp,
    Login,
}

/// Navigation history driven by session transitions
///
/// Once armed with an [`AuthIntent`], the next `Success` moves to the book
/// list and drops the auth screen from history. An `Error` disarms it.
#[derive(Debug)]
pub struct Navigator {
    stack: Mutex<Vec<Route>>,
    pending: Mutex<Option<AuthIntent>>,
}

impl Navigator {
    pub fn new(start: Route) -> Self {
        Self {
            stack: Mutex::new(vec![start]),
            pending: Mutex::new(None),
        }
    }

    pub fn arm(&self, intent: AuthIntent) {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(intent);
    }

    pub fn current(&self) -> Option<Route> {
        self.stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn history(&self) -> Vec<Route> {
        self.stack.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Navigate and forget everything before `route`
    pub fn navigate_clearing(&self, route: Route) {
        debug!(?route, "Navigating, clearing history");
        *self.stack.lock().unwrap_or_else(PoisonError::into_inner) = vec![route];
    }

    fn take_pending(&self) -> Option<AuthIntent> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl SessionObserver for Navigator {
    fn on_transition(&self, state: &SessionState) {
        match state {
            SessionState::Success(_) => {
                if let Some(intent) = self.take_pending() {
                    debug!(?intent, "Authenticated");
                    self.navigate_clearing(Route::BookList);
                }
            }
            SessionState::Error(_) => {
                self.take_pending();
            }
            SessionState::Idle | SessionState::Loading => {}
        }
    }
}
