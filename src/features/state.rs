//! The `Idle → Loading → {Success, Failed}` state machine every feature
//! controller follows, with stale-result guarding.
//!
//! Each [`StateSlot::begin`] hands out a [`Ticket`]. Only the newest ticket
//! may settle the slot, and nothing settles after [`StateSlot::teardown`].
//! A request that was superseded or whose owner went away still runs to
//! completion; its result is simply dropped.

use std::fmt;

use crate::error::{FlowError, Result};

/// Observable state of one feature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FeatureState<T> {
    #[default]
    Idle,
    Loading,
    Success(T),
    /// Failed with a displayable message; retry is allowed from here.
    Failed(String),
}

impl<T> FeatureState<T> {
    pub fn name(&self) -> &'static str {
        match self {
            FeatureState::Idle => "idle",
            FeatureState::Loading => "loading",
            FeatureState::Success(_) => "success",
            FeatureState::Failed(_) => "failed",
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, FeatureState::Loading)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            FeatureState::Success(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FeatureState::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Proof that a caller started the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A [`FeatureState`] plus the bookkeeping that keeps late results out.
#[derive(Debug)]
pub struct StateSlot<T> {
    state: FeatureState<T>,
    generation: u64,
    torn_down: bool,
}

impl<T> Default for StateSlot<T> {
    fn default() -> Self {
        Self {
            state: FeatureState::Idle,
            generation: 0,
            torn_down: false,
        }
    }
}

impl<T: Clone> StateSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FeatureState<T> {
        &self.state
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Enter `Loading` for a new request.
    ///
    /// Allowed from every state except after teardown. Starting while
    /// already loading supersedes the in-flight request.
    pub fn begin(&mut self) -> Result<Ticket> {
        if self.torn_down {
            return Err(FlowError::InvalidTransition {
                from: "torn down",
                action: "begin",
            });
        }
        self.generation += 1;
        self.state = FeatureState::Loading;
        Ok(Ticket(self.generation))
    }

    /// User-triggered retry: only valid from `Failed`.
    pub fn retry(&mut self) -> Result<Ticket> {
        if !matches!(self.state, FeatureState::Failed(_)) {
            return Err(FlowError::InvalidTransition {
                from: self.state.name(),
                action: "retry",
            });
        }
        self.begin()
    }

    /// Jump straight to `Success` with a cached value, skipping `Loading`.
    /// Supersedes any in-flight request.
    pub fn resolve_cached(&mut self, value: T) -> Result<()> {
        if self.torn_down {
            return Err(FlowError::InvalidTransition {
                from: "torn down",
                action: "resolve",
            });
        }
        self.generation += 1;
        self.state = FeatureState::Success(value);
        Ok(())
    }

    /// Apply the outcome of the request identified by `ticket`.
    ///
    /// Returns `false` (and changes nothing) when the ticket is stale or the
    /// slot has been torn down.
    pub fn settle(&mut self, ticket: Ticket, outcome: Result<T>) -> bool {
        if self.torn_down || ticket.0 != self.generation || !self.state.is_loading() {
            return false;
        }
        self.state = match outcome {
            Ok(value) => FeatureState::Success(value),
            Err(e) => FeatureState::Failed(e.to_string()),
        };
        true
    }

    /// The owner is gone; ignore every later result.
    pub fn teardown(&mut self) {
        self.torn_down = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut slot = StateSlot::<u32>::new();
        assert_eq!(slot.state(), &FeatureState::Idle);
        let t = slot.begin().unwrap();
        assert!(slot.state().is_loading());
        assert!(slot.settle(t, Ok(7)));
        assert_eq!(slot.state().value(), Some(&7));
    }

    #[test]
    fn failure_then_retry() {
        let mut slot = StateSlot::<u32>::new();
        let t = slot.begin().unwrap();
        assert!(slot.settle(t, Err(FlowError::EmptyOutput)));
        assert_eq!(slot.state().error(), Some("empty model output"));

        let t2 = slot.retry().unwrap();
        assert!(slot.settle(t2, Ok(1)));
        assert_eq!(slot.state(), &FeatureState::Success(1));
    }

    #[test]
    fn retry_only_from_failed() {
        let mut slot = StateSlot::<u32>::new();
        let err = slot.retry().unwrap_err();
        assert!(matches!(
            err,
            FlowError::InvalidTransition { from: "idle", action: "retry" }
        ));
        slot.begin().unwrap();
        assert!(slot.retry().is_err());
    }

    #[test]
    fn stale_ticket_is_discarded() {
        let mut slot = StateSlot::<&str>::new();
        let first = slot.begin().unwrap();
        let second = slot.begin().unwrap();
        assert!(slot.settle(second, Ok("new")));
        assert!(!slot.settle(first, Ok("old")));
        assert_eq!(slot.state().value(), Some(&"new"));
    }

    #[test]
    fn stale_failure_does_not_clobber_loading() {
        let mut slot = StateSlot::<u32>::new();
        let first = slot.begin().unwrap();
        let _second = slot.begin().unwrap();
        assert!(!slot.settle(first, Err(FlowError::EmptyOutput)));
        assert!(slot.state().is_loading());
    }

    #[test]
    fn cached_resolution_supersedes_in_flight() {
        let mut slot = StateSlot::<u32>::new();
        let t = slot.begin().unwrap();
        slot.resolve_cached(3).unwrap();
        assert!(!slot.settle(t, Ok(4)));
        assert_eq!(slot.state().value(), Some(&3));
    }

    #[test]
    fn teardown_discards_results() {
        let mut slot = StateSlot::<u32>::new();
        let t = slot.begin().unwrap();
        slot.teardown();
        assert!(!slot.settle(t, Ok(1)));
        assert!(slot.state().is_loading());
        assert!(slot.begin().is_err());
        assert!(slot.resolve_cached(2).is_err());
    }
}
