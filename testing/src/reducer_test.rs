//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.
//! A relief reducer either returns the events of a valid transition or rejects the action and
//! leaves state untouched; the builder can assert on either outcome.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use relief_core::error::ReliefError;
use relief_core::event::{Events, ShelterEvent};
use relief_core::reducer::Reducer;
use std::fmt::Debug;

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S, &S)>;

/// Type alias for outcome assertion functions
type OutcomeAssertion = Box<dyn FnOnce(&Result<Events, ReliefError>)>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// # Example
///
/// ```ignore
/// use relief_testing::ReducerTest;
///
/// ReducerTest::new(CenterReducer::new())
///     .with_env(test_environment())
///     .given_state(Some(center_with(1, 0)))
///     .when_action(CenterAction::AdjustOccupancy { delta: 1 })
///     .then_state(|state| {
///         assert_eq!(state.as_ref().map(|c| c.current_occupancy), Some(1));
///     })
///     .then_events(|events| {
///         assert_eq!(events.len(), 1);
///     })
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    action: Option<A>,
    state_assertions: Vec<StateAssertion<S>>,
    outcome_assertions: Vec<OutcomeAssertion>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
    S: Clone + 'static,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            action: None,
            state_assertions: Vec::new(),
            outcome_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the action to test (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.action = Some(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions
            .push(Box::new(move |_before, after| assertion(after)));
        self
    }

    /// Assert that the state is exactly what it was before the action
    #[must_use]
    pub fn then_state_unchanged(mut self) -> Self
    where
        S: PartialEq + Debug,
    {
        self.state_assertions.push(Box::new(|before, after| {
            assert_eq!(before, after, "state changed although the action should be a no-op");
        }));
        self
    }

    /// Add an assertion about the emitted events; fails if the action was rejected
    #[must_use]
    #[allow(clippy::panic)] // Test assertion
    pub fn then_events<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[ShelterEvent]) + 'static,
    {
        self.outcome_assertions.push(Box::new(move |outcome| match outcome {
            Ok(events) => assertion(events),
            Err(err) => panic!("expected events, action was rejected: {err}"),
        }));
        self
    }

    /// Add an assertion about the rejection; fails if the action succeeded
    #[must_use]
    #[allow(clippy::panic)] // Test assertion
    pub fn then_error<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&ReliefError) + 'static,
    {
        self.outcome_assertions.push(Box::new(move |outcome| match outcome {
            Ok(events) => panic!("expected rejection, got {} events", events.len()),
            Err(err) => assertion(err),
        }));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let before = self
            .initial_state
            .expect("Initial state must be set with given_state()");
        let mut state = before.clone();

        let action = self.action.expect("Action must be set with when_action()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        let outcome = self.reducer.reduce(&mut state, action, &env);

        for assertion in self.state_assertions {
            assertion(&before, &state);
        }

        for assertion in self.outcome_assertions {
            assertion(&outcome);
        }
    }
}

/// Helper assertions for events
pub mod assertions {
    use relief_core::event::ShelterEvent;

    /// Assert that there are no events
    ///
    /// # Panics
    ///
    /// Panics if events is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_events(events: &[ShelterEvent]) {
        assert!(
            events.is_empty(),
            "Expected no events, but found {}: {:?}",
            events.len(),
            event_names(events)
        );
    }

    /// Assert the exact sequence of event names
    ///
    /// # Panics
    ///
    /// Panics if the names differ.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_event_names(events: &[ShelterEvent], expected: &[&str]) {
        assert_eq!(event_names(events), expected);
    }

    /// Names of the given events, in order
    #[must_use]
    pub fn event_names(events: &[ShelterEvent]) -> Vec<&'static str> {
        events.iter().map(ShelterEvent::name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_core::center::CenterId;
    use relief_core::event::Events;
    use relief_core::smallvec;

    #[derive(Clone, Debug, PartialEq)]
    struct Counter {
        value: u32,
        limit: u32,
    }

    enum CounterAction {
        Increment,
    }

    struct CounterReducer;

    impl Reducer for CounterReducer {
        type State = Counter;
        type Action = CounterAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Counter,
            action: CounterAction,
            _env: &(),
        ) -> Result<Events, ReliefError> {
            match action {
                CounterAction::Increment if state.value < state.limit => {
                    state.value += 1;
                    Ok(smallvec![ShelterEvent::CenterDeleted {
                        center_id: CenterId::new()
                    }])
                }
                CounterAction::Increment => Err(ReliefError::Conflict("limit".into())),
            }
        }
    }

    #[test]
    fn test_accepted_action() {
        ReducerTest::new(CounterReducer)
            .with_env(())
            .given_state(Counter { value: 0, limit: 1 })
            .when_action(CounterAction::Increment)
            .then_state(|state| assert_eq!(state.value, 1))
            .then_events(|events| assertions::assert_event_names(events, &["center:deleted"]))
            .run();
    }

    #[test]
    fn test_rejected_action_leaves_state() {
        ReducerTest::new(CounterReducer)
            .with_env(())
            .given_state(Counter { value: 1, limit: 1 })
            .when_action(CounterAction::Increment)
            .then_state_unchanged()
            .then_error(|err| assert_eq!(err.code(), "CONFLICT"))
            .run();
    }

    #[test]
    fn test_assert_no_events() {
        assertions::assert_no_events(&[]);
    }
}
