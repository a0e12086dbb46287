use crate::{
    error::{AddChildError, AddChildResult, TickError},
    BehaviorNode, BehaviorNodeContainer, BehaviorResult, CancellationToken, Context, Lazy,
    PortSpec, Symbol, TickResult,
};

/// AND-composition with memory.
///
/// Ticks children in declared order. A failing child fails the sequence
/// without ticking the rest; a Running child is remembered and resumed on the
/// next tick instead of starting over from the first child.
pub struct SequenceNode<A> {
    children: Vec<BehaviorNodeContainer<A>>,
    current_child: Option<usize>,
}

impl<A> Default for SequenceNode<A> {
    fn default() -> Self {
        Self {
            children: vec![],
            current_child: None,
        }
    }
}

impl<A> BehaviorNode<A> for SequenceNode<A> {
    fn tick(&mut self, ctx: &mut Context<A>, token: &CancellationToken) -> TickResult {
        let from = self.current_child.unwrap_or(0);
        for (i, node) in self.children[from..].iter_mut().enumerate() {
            match node.tick(ctx, token) {
                Ok(BehaviorResult::Success) => (),
                Ok(BehaviorResult::Fail) => {
                    self.current_child = None;
                    return Ok(BehaviorResult::Fail);
                }
                Ok(BehaviorResult::Running) => {
                    self.current_child = Some(i + from);
                    return Ok(BehaviorResult::Running);
                }
                Err(e) => {
                    self.current_child = None;
                    return Err(e);
                }
            }
        }
        self.current_child = None;
        Ok(BehaviorResult::Success)
    }

    fn halt(&mut self, ctx: &mut Context<A>) {
        if let Some(node) = self
            .current_child
            .take()
            .and_then(|i| self.children.get_mut(i))
        {
            node.halt(ctx);
        }
    }

    fn add_child(&mut self, node: BehaviorNodeContainer<A>) -> AddChildResult {
        self.children.push(node);
        Ok(())
    }
}

/// OR-composition with memory; the mirror image of [`SequenceNode`].
pub struct FallbackNode<A> {
    children: Vec<BehaviorNodeContainer<A>>,
    current_child: Option<usize>,
}

impl<A> Default for FallbackNode<A> {
    fn default() -> Self {
        Self {
            children: vec![],
            current_child: None,
        }
    }
}

impl<A> BehaviorNode<A> for FallbackNode<A> {
    fn tick(&mut self, ctx: &mut Context<A>, token: &CancellationToken) -> TickResult {
        let from = self.current_child.unwrap_or(0);
        for (i, node) in self.children[from..].iter_mut().enumerate() {
            match node.tick(ctx, token) {
                Ok(BehaviorResult::Fail) => (),
                Ok(BehaviorResult::Success) => {
                    self.current_child = None;
                    return Ok(BehaviorResult::Success);
                }
                Ok(BehaviorResult::Running) => {
                    self.current_child = Some(i + from);
                    return Ok(BehaviorResult::Running);
                }
                Err(e) => {
                    self.current_child = None;
                    return Err(e);
                }
            }
        }
        self.current_child = None;
        Ok(BehaviorResult::Fail)
    }

    fn halt(&mut self, ctx: &mut Context<A>) {
        if let Some(node) = self
            .current_child
            .take()
            .and_then(|i| self.children.get_mut(i))
        {
            node.halt(ctx);
        }
    }

    fn add_child(&mut self, node: BehaviorNodeContainer<A>) -> AddChildResult {
        self.children.push(node);
        Ok(())
    }
}

/// Concurrent composition.
///
/// Every child that has not succeeded yet is advanced exactly once per tick,
/// in declared order. The node succeeds when all children have succeeded and
/// fails on the tick any child fails; at that point every child still Running
/// is halted before the node returns. A child error counts as a failure and is
/// returned once the siblings are halted.
pub struct ParallelNode<A> {
    children: Vec<BehaviorNodeContainer<A>>,
    /// Children that already succeeded in the current evaluation.
    completed: Vec<bool>,
}

impl<A> Default for ParallelNode<A> {
    fn default() -> Self {
        Self {
            children: vec![],
            completed: vec![],
        }
    }
}

impl<A> ParallelNode<A> {
    fn halt_children(&mut self, ctx: &mut Context<A>) {
        for child in &mut self.children {
            child.halt(ctx);
        }
        self.completed.clear();
    }
}

impl<A> BehaviorNode<A> for ParallelNode<A> {
    fn tick(&mut self, ctx: &mut Context<A>, token: &CancellationToken) -> TickResult {
        self.completed.resize(self.children.len(), false);

        let mut failed = false;
        let mut cancelled = false;
        let mut error = None;
        for (child, done) in self.children.iter_mut().zip(self.completed.iter_mut()) {
            if *done {
                continue;
            }
            match child.tick(ctx, token) {
                Ok(BehaviorResult::Success) => *done = true,
                Ok(BehaviorResult::Running) => (),
                Ok(BehaviorResult::Fail) => failed = true,
                Err(TickError::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(e) => {
                    failed = true;
                    if error.is_none() {
                        error = Some(e);
                    } else {
                        tracing::warn!(node = child.name(), error = %e, "further node error in parallel");
                    }
                }
            }
        }

        if cancelled {
            self.halt_children(ctx);
            return Err(TickError::Cancelled);
        }

        if failed {
            self.halt_children(ctx);
            return match error {
                Some(e) => Err(e),
                None => Ok(BehaviorResult::Fail),
            };
        }

        if self.completed.iter().all(|done| *done) {
            self.completed.clear();
            Ok(BehaviorResult::Success)
        } else {
            Ok(BehaviorResult::Running)
        }
    }

    fn halt(&mut self, ctx: &mut Context<A>) {
        self.halt_children(ctx);
    }

    fn add_child(&mut self, node: BehaviorNodeContainer<A>) -> AddChildResult {
        self.children.push(node);
        Ok(())
    }
}

pub struct InverterNode<A>(Option<BehaviorNodeContainer<A>>);

impl<A> Default for InverterNode<A> {
    fn default() -> Self {
        Self(None)
    }
}

impl<A> BehaviorNode<A> for InverterNode<A> {
    fn tick(&mut self, ctx: &mut Context<A>, token: &CancellationToken) -> TickResult {
        if let Some(ref mut node) = self.0 {
            Ok(match node.tick(ctx, token)? {
                BehaviorResult::Running => BehaviorResult::Running,
                BehaviorResult::Success => BehaviorResult::Fail,
                BehaviorResult::Fail => BehaviorResult::Success,
            })
        } else {
            Ok(BehaviorResult::Fail)
        }
    }

    fn halt(&mut self, ctx: &mut Context<A>) {
        if let Some(ref mut node) = self.0 {
            node.halt(ctx);
        }
    }

    fn add_child(&mut self, node: BehaviorNodeContainer<A>) -> AddChildResult {
        if self.0.is_none() {
            self.0 = Some(node);
            Ok(())
        } else {
            Err(AddChildError::TooManyNodes)
        }
    }
}

pub struct AlwaysSuccess;

impl<A> BehaviorNode<A> for AlwaysSuccess {
    fn tick(&mut self, _ctx: &mut Context<A>, _token: &CancellationToken) -> TickResult {
        Ok(BehaviorResult::Success)
    }
}

pub struct AlwaysFailure;

impl<A> BehaviorNode<A> for AlwaysFailure {
    fn tick(&mut self, _ctx: &mut Context<A>, _token: &CancellationToken) -> TickResult {
        Ok(BehaviorResult::Fail)
    }
}

pub(crate) static TICKS: Lazy<Symbol> = Lazy::new(|| "ticks".into());

/// Stays Running for `ticks` ticks, then succeeds.
#[derive(Default)]
pub struct WaitNode {
    remaining: Option<usize>,
}

impl<A> BehaviorNode<A> for WaitNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*TICKS)]
    }

    fn tick(&mut self, ctx: &mut Context<A>, _token: &CancellationToken) -> TickResult {
        let remaining = match self.remaining {
            Some(remaining) => remaining,
            None => ctx
                .get_parse::<usize>(*TICKS)
                .ok_or_else(|| TickError::node("Wait", "input port \"ticks\" is not a count"))?,
        };
        if remaining == 0 {
            self.remaining = None;
            return Ok(BehaviorResult::Success);
        }
        self.remaining = Some(remaining - 1);
        Ok(BehaviorResult::Running)
    }

    fn halt(&mut self, _ctx: &mut Context<A>) {
        self.remaining = None;
    }
}

pub(crate) static VALUE: Lazy<Symbol> = Lazy::new(|| "value".into());
pub(crate) static OUTPUT: Lazy<Symbol> = Lazy::new(|| "output".into());

pub struct SetBoolNode;

impl<A> BehaviorNode<A> for SetBoolNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*VALUE), PortSpec::new_out(*OUTPUT)]
    }

    fn tick(&mut self, ctx: &mut Context<A>, _token: &CancellationToken) -> TickResult {
        if let Some(value) = ctx.get_parse::<bool>(*VALUE) {
            ctx.set(*OUTPUT, value);
            Ok(BehaviorResult::Success)
        } else {
            Ok(BehaviorResult::Fail)
        }
    }
}

pub(crate) static INPUT: Lazy<Symbol> = Lazy::new(|| "input".into());

pub struct IsTrueNode;

impl<A> BehaviorNode<A> for IsTrueNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*INPUT)]
    }

    fn tick(&mut self, ctx: &mut Context<A>, _token: &CancellationToken) -> TickResult {
        match ctx.get_parse::<bool>(*INPUT) {
            Some(true) => Ok(BehaviorResult::Success),
            _ => Ok(BehaviorResult::Fail),
        }
    }
}
