use crate::error::DriverError;
use std::fmt::Debug;

/// A component driven by the enter/update/leave signals of an outer state
/// machine.
pub trait StateLifecycle<A> {
    fn on_enter(&mut self, agent: &mut A) -> Result<(), DriverError>;

    /// Returns true when the component is done and the outer state machine
    /// may transition away.
    fn on_update(&mut self, agent: &mut A) -> bool;

    fn on_leave(&mut self, agent: &mut A);

    fn on_reload(&mut self, _agent: &mut A) -> Result<(), DriverError> {
        Ok(())
    }
}

struct Binding<S, A> {
    state: S,
    component: Box<dyn StateLifecycle<A>>,
    entered: bool,
}

/// Routes lifecycle signals to the components bound to the active state.
///
/// The outer state machine itself lives elsewhere; it only tells the
/// dispatcher which state it entered and when to tick.
pub struct LifecycleDispatcher<S, A> {
    bindings: Vec<Binding<S, A>>,
    active: Option<S>,
}

impl<S, A> Default for LifecycleDispatcher<S, A> {
    fn default() -> Self {
        Self {
            bindings: vec![],
            active: None,
        }
    }
}

impl<S: PartialEq + Clone + Debug, A> LifecycleDispatcher<S, A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, state: S, component: impl StateLifecycle<A> + 'static) {
        self.bindings.push(Binding {
            state,
            component: Box::new(component),
            entered: false,
        });
    }

    /// Leave the current state, if any, and enter `state`.
    ///
    /// Components that fail to enter are skipped by later updates. Their
    /// errors are returned, the other components are entered regardless.
    pub fn enter(&mut self, state: S, agent: &mut A) -> Vec<DriverError> {
        self.leave(agent);
        tracing::debug!(?state, "entering state");

        let mut errors = vec![];
        for binding in self.bindings.iter_mut().filter(|b| b.state == state) {
            match binding.component.on_enter(agent) {
                Ok(()) => binding.entered = true,
                Err(e) => {
                    tracing::error!(?state, error = %e, "component failed to enter");
                    errors.push(e);
                }
            }
        }
        self.active = Some(state);
        errors
    }

    /// Update every entered component once. True if any of them is done.
    pub fn update(&mut self, agent: &mut A) -> bool {
        let mut done = false;
        for binding in self.bindings.iter_mut().filter(|b| b.entered) {
            done |= binding.component.on_update(agent);
        }
        done
    }

    pub fn leave(&mut self, agent: &mut A) {
        let Some(state) = self.active.take() else {
            return;
        };
        for binding in self.bindings.iter_mut().filter(|b| b.entered) {
            binding.component.on_leave(agent);
            binding.entered = false;
        }
        tracing::debug!(?state, "left state");
    }

    /// Forward a hot-reload to the entered components.
    pub fn reload(&mut self, agent: &mut A) -> Vec<DriverError> {
        let mut errors = vec![];
        for binding in self.bindings.iter_mut().filter(|b| b.entered) {
            if let Err(e) = binding.component.on_reload(agent) {
                tracing::error!(state = ?binding.state, error = %e, "component failed to reload");
                binding.entered = false;
                errors.push(e);
            }
        }
        errors
    }

    pub fn active_state(&self) -> Option<&S> {
        self.active.as_ref()
    }
}
