use crate::{agent::ControlledAgent, BBMap, Blackboard, BlackboardValue, Symbol};
use std::{any::Any, str::FromStr};

/// Per-evaluation data handed down the tree.
///
/// A context borrows the controlled agent for exactly one top-level `tick`
/// and must not be cached by nodes. It owns the scratch blackboard for the
/// duration of the call; the owner lends it in with [`Context::new`] and
/// takes it back with [`Context::take_blackboard`].
///
/// Keys are resolved through the port map of the node currently ticking, so
/// a node reading `"target"` may actually read the blackboard variable
/// `enemy`, or a literal given in the tree source.
pub struct Context<'a, A> {
    agent: &'a mut A,
    blackboard: Blackboard,
    pub(crate) blackboard_map: BBMap,
}

impl<'a, A> Context<'a, A> {
    pub fn new(agent: &'a mut A, blackboard: Blackboard) -> Self {
        Self {
            agent,
            blackboard,
            blackboard_map: BBMap::new(),
        }
    }

    pub fn agent(&self) -> &A {
        &*self.agent
    }

    pub fn agent_mut(&mut self) -> &mut A {
        &mut *self.agent
    }

    pub fn take_blackboard(self) -> Blackboard {
        self.blackboard
    }

    pub fn get<T: 'static>(&self, key: impl Into<Symbol>) -> Option<&T> {
        let key: Symbol = key.into();
        let mapped = match self.blackboard_map.get(&key) {
            None => key,
            Some(BlackboardValue::Ref(mapped, _)) => *mapped,
            Some(BlackboardValue::Literal(literal)) => {
                return (literal as &dyn Any).downcast_ref();
            }
        };

        self.blackboard.get(&mapped).and_then(|val| val.downcast_ref())
    }

    /// Like [`Context::get`], but falls back to parsing a string value, which
    /// is what literals in tree sources always are.
    pub fn get_parse<T>(&self, key: impl Into<Symbol>) -> Option<T>
    where
        T: FromStr + Clone + 'static,
    {
        let key: Symbol = key.into();
        self.get::<T>(key)
            .cloned()
            .or_else(|| self.get::<String>(key).and_then(|s| s.parse().ok()))
    }

    pub fn set<T: 'static>(&mut self, key: impl Into<Symbol>, val: T) {
        let key: Symbol = key.into();
        let mapped = match self.blackboard_map.get(&key) {
            None => key,
            Some(BlackboardValue::Ref(mapped, _)) => *mapped,
            Some(BlackboardValue::Literal(_)) => {
                tracing::warn!(port = %key, "ignoring write to a port bound to a literal");
                return;
            }
        };
        self.blackboard.insert(mapped, Box::new(val));
    }

    pub fn remove(&mut self, key: impl Into<Symbol>) -> bool {
        let key: Symbol = key.into();
        let mapped = match self.blackboard_map.get(&key) {
            None => key,
            Some(BlackboardValue::Ref(mapped, _)) => *mapped,
            Some(BlackboardValue::Literal(_)) => return false,
        };
        self.blackboard.remove(&mapped).is_some()
    }
}

impl<'a, A: ControlledAgent> Context<'a, A> {
    /// The task the agent is assigned right now.
    pub fn task(&self) -> Option<&A::Task> {
        self.agent.current_task()
    }
}
