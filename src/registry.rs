use super::{
    nodes::{
        AlwaysFailure, AlwaysSuccess, FallbackNode, InverterNode, IsTrueNode, ParallelNode,
        SequenceNode, SetBoolNode, WaitNode,
    },
    BehaviorNode,
};
use std::collections::HashMap;

pub type Constructor<A> = Box<dyn Fn() -> Box<dyn BehaviorNode<A>>>;

pub fn boxify<A, T>(cons: impl (Fn() -> T) + 'static) -> Constructor<A>
where
    T: BehaviorNode<A> + 'static,
{
    Box::new(move || Box::new(cons()))
}

/// Node type names known to the tree loaders.
///
/// A registry is an ordinary value handed to whatever builds trees; there is
/// no global one. `Registry::default()` knows the built-in composites and
/// leaves, game code registers its own leaves on top.
pub struct Registry<A> {
    node_types: HashMap<String, Constructor<A>>,
}

impl<A: 'static> Default for Registry<A> {
    fn default() -> Self {
        let mut ret = Self::empty();
        ret.register("Sequence", boxify(SequenceNode::default));
        ret.register("Parallel", boxify(ParallelNode::default));
        ret.register("Fallback", boxify(FallbackNode::default));
        ret.register("Inverter", boxify(InverterNode::default));
        ret.register("AlwaysSuccess", boxify(|| AlwaysSuccess));
        ret.register("AlwaysFailure", boxify(|| AlwaysFailure));
        ret.register("Wait", boxify(WaitNode::default));
        ret.register("IsTrue", boxify(|| IsTrueNode));
        ret.register("SetBool", boxify(|| SetBoolNode));
        ret
    }
}

impl<A> Registry<A> {
    /// A registry without even the built-in nodes.
    pub fn empty() -> Self {
        Self {
            node_types: HashMap::new(),
        }
    }

    pub fn register(&mut self, type_name: impl ToString, constructor: Constructor<A>) {
        self.node_types.insert(type_name.to_string(), constructor);
    }

    pub fn build(&self, type_name: &str) -> Option<Box<dyn BehaviorNode<A>>> {
        self.node_types
            .get(type_name)
            .map(|constructor| constructor())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.node_types.contains_key(type_name)
    }
}
