//! Guarded session lifecycle

use crate::error::NautaError;

/// Phase a client is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No authenticated session
    Unauthenticated,
    /// Logged in, or restored from saved state
    Authenticated,
}

/// Lifecycle state machine
///
/// Whatever only exists for an authenticated session (the captive portal's
/// session identifier, for instance) lives inside the `Authenticated` variant,
/// so it cannot be observed once the session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Lifecycle<S> {
    Unauthenticated,
    Authenticated(S),
}

impl<S> Lifecycle<S> {
    pub fn phase(&self) -> Phase {
        match self {
            Lifecycle::Unauthenticated => Phase::Unauthenticated,
            Lifecycle::Authenticated(_) => Phase::Authenticated,
        }
    }

    /// Borrow the session data, or fail with a state error naming `operation`
    pub fn require_authenticated(&self, operation: &'static str) -> Result<&S, NautaError> {
        match self {
            Lifecycle::Authenticated(session) => Ok(session),
            Lifecycle::Unauthenticated => Err(NautaError::State {
                operation,
                reason: "user is not logged in",
            }),
        }
    }

    pub fn require_authenticated_mut(&mut self, operation: &'static str) -> Result<&mut S, NautaError> {
        match self {
            Lifecycle::Authenticated(session) => Ok(session),
            Lifecycle::Unauthenticated => Err(NautaError::State {
                operation,
                reason: "user is not logged in",
            }),
        }
    }

    pub fn require_unauthenticated(&self, operation: &'static str) -> Result<(), NautaError> {
        match self {
            Lifecycle::Unauthenticated => Ok(()),
            Lifecycle::Authenticated(_) => Err(NautaError::State {
                operation,
                reason: "user is already logged in",
            }),
        }
    }

    /// Enter the authenticated phase
    pub fn authenticate(&mut self, session: S) {
        *self = Lifecycle::Authenticated(session);
    }

    /// Leave the authenticated phase, returning the dropped session data
    pub fn terminate(&mut self) -> Option<S> {
        match std::mem::replace(self, Lifecycle::Unauthenticated) {
            Lifecycle::Authenticated(session) => Some(session),
            Lifecycle::Unauthenticated => None,
        }
    }
}
