//! In-flight computation marker shared between the computing thread and its
//! waiters.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

enum State<V, E> {
    Pending,
    Done(Result<V, Arc<E>>),
    Abandoned,
}

/// What a waiter observes once the flight lands.
pub(crate) enum Outcome<V, E> {
    Done(Result<V, Arc<E>>),
    /// The computing thread unwound before publishing a result.
    Abandoned,
}

pub(crate) struct Flight<V, E> {
    state: Mutex<State<V, E>>,
    landed: Condvar,
}

impl<V: Clone, E> Flight<V, E> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State::Pending),
            landed: Condvar::new(),
        }
    }

    /// Block until the flight completes or is abandoned.
    pub(crate) fn wait(&self) -> Outcome<V, E> {
        let mut state = self.state.lock();
        while matches!(*state, State::Pending) {
            self.landed.wait(&mut state);
        }

        match &*state {
            State::Done(result) => Outcome::Done(result.clone()),
            State::Abandoned => Outcome::Abandoned,
            State::Pending => unreachable!("flight still pending after wait loop"),
        }
    }

    pub(crate) fn complete(&self, result: Result<V, Arc<E>>) {
        let mut state = self.state.lock();
        *state = State::Done(result);
        self.landed.notify_all();
    }

    pub(crate) fn abandon(&self) {
        let mut state = self.state.lock();
        if matches!(*state, State::Pending) {
            *state = State::Abandoned;
            self.landed.notify_all();
        }
    }
}
