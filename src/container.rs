use crate::{
    error::{AddChildResult, TickError},
    BBMap, BehaviorNode, BehaviorResult, CancellationToken, Context, PortSpec, TickResult,
};

/// A node together with its port map and the result of its last tick.
///
/// Composites hold their children through containers, and the driver holds
/// the root through one. Every tick goes through [`BehaviorNodeContainer::tick`],
/// which is where the cancellation token is checked, and every cancellation
/// goes through [`BehaviorNodeContainer::halt`], which only reaches nodes that
/// are actually Running.
pub struct BehaviorNodeContainer<A> {
    /// Name of the type of the node
    pub(crate) name: String,
    pub(crate) node: Box<dyn BehaviorNode<A>>,
    pub(crate) blackboard_map: BBMap,
    pub(crate) last_result: Option<BehaviorResult>,
}

impl<A> BehaviorNodeContainer<A> {
    pub fn new(node: Box<dyn BehaviorNode<A>>, blackboard_map: BBMap) -> Self {
        Self {
            name: String::new(),
            node,
            blackboard_map,
            last_result: None,
        }
    }

    pub fn new_node(node: impl BehaviorNode<A> + 'static) -> Self {
        Self::new(Box::new(node), BBMap::new())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn tick(&mut self, ctx: &mut Context<A>, token: &CancellationToken) -> TickResult {
        if token.is_cancelled() {
            self.halt(ctx);
            return Err(TickError::Cancelled);
        }

        std::mem::swap(&mut self.blackboard_map, &mut ctx.blackboard_map);
        let res = self.node.tick(ctx, token);
        std::mem::swap(&mut self.blackboard_map, &mut ctx.blackboard_map);
        self.last_result = res.as_ref().ok().copied();

        // The node may have yielded just as the token fired; it must not stay
        // suspended with nobody left to resume it.
        if token.is_cancelled() {
            self.halt(ctx);
            return Err(TickError::Cancelled);
        }
        res
    }

    /// Deliver a cancellation to the node if it is suspended mid-evaluation.
    pub fn halt(&mut self, ctx: &mut Context<A>) {
        if self.is_running() {
            std::mem::swap(&mut self.blackboard_map, &mut ctx.blackboard_map);
            self.node.halt(ctx);
            std::mem::swap(&mut self.blackboard_map, &mut ctx.blackboard_map);
        }
        self.last_result = None;
    }

    pub fn add_child(&mut self, child: BehaviorNodeContainer<A>) -> AddChildResult {
        self.node.add_child(child)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.last_result, Some(BehaviorResult::Running))
    }

    pub fn last_result(&self) -> Option<BehaviorResult> {
        self.last_result
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn blackboard_map(&self) -> &BBMap {
        &self.blackboard_map
    }

    pub fn provided_ports(&self) -> Vec<PortSpec> {
        self.node.provided_ports()
    }
}
