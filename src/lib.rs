//! # bot-behavior-tree
//!
//! Behavior trees for bots living inside a real-time game tick loop.
//!
//!
//! ## Overview
//!
//! Every frame each bot has to decide on and carry out an action: roam, engage a target,
//! reload, reposition.
//! This crate evaluates that decision as a behavior tree which is advanced once per tick,
//! may stay suspended across ticks, can be cancelled in the middle of an evaluation and
//! can be rebuilt on hot-reload without the game mode having to re-enter the state.
//!
//! The pieces, from the bottom up:
//!
//! * [`BehaviorNode`]: a unit of decision logic. Leaves check or act on the agent,
//!   composites combine children.
//! * [`SequenceNode`], [`ParallelNode`] and [`FallbackNode`]: the composites.
//! * [`BehaviorTreeDriver`]: owns the root, builds it on enter, advances it on every
//!   update and cancels it on leave.
//! * [`LifecycleDispatcher`]: routes the enter/update/leave signals of the game mode's
//!   state machine to the drivers bound to each state.
//!
//!
//! ## Defining a leaf
//!
//! A node gets the [`Context`] of the current evaluation, which borrows the agent being
//! controlled, and the [`CancellationToken`] of the evaluation.
//!
//! ```rust
//! # use bot_behavior_tree::*;
//! struct Bot {
//!     ammo: u32,
//!     reloading: bool,
//! }
//!
//! struct ReloadIfEmpty;
//!
//! impl BehaviorNode<Bot> for ReloadIfEmpty {
//!     fn tick(&mut self, ctx: &mut Context<Bot>, _token: &CancellationToken) -> TickResult {
//!         let bot = ctx.agent_mut();
//!         if bot.ammo > 0 {
//!             bot.reloading = false;
//!             return Ok(BehaviorResult::Success);
//!         }
//!         bot.reloading = true;
//!         bot.ammo = 30;
//!         Ok(BehaviorResult::Running)
//!     }
//!
//!     fn halt(&mut self, ctx: &mut Context<Bot>) {
//!         // Never leave the bot stuck mid-reload.
//!         ctx.agent_mut().reloading = false;
//!     }
//! }
//! ```
//!
//! `Running` means "not finished, call me again next tick". The parent composite
//! resumes the same node on the next tick instead of starting over.
//! `halt` is the cancellation call: a composite or the driver sends it to a node that
//! is suspended in `Running` when the evaluation is abandoned.
//!
//!
//! ## Building a tree
//!
//! Trees can be put together in Rust:
//!
//! ```rust
//! # use bot_behavior_tree::*;
//! # struct Bot;
//! let mut root = BehaviorNodeContainer::<Bot>::new_node(SequenceNode::default());
//! root.add_child(BehaviorNodeContainer::new_node(AlwaysSuccess)).unwrap();
//!
//! let mut engage = BehaviorNodeContainer::new_node(ParallelNode::default());
//! engage.add_child(BehaviorNodeContainer::new_node(AlwaysSuccess)).unwrap();
//! engage.add_child(BehaviorNodeContainer::new(
//!     Box::new(WaitNode::default()),
//!     hash_map!("ticks" => "2"),
//! )).unwrap();
//! root.add_child(engage).unwrap();
//! ```
//!
//! or described in the tree file format and instantiated through a [`Registry`]:
//!
//! ```rust
//! # use bot_behavior_tree::*;
//! # struct Bot;
//! let source = r#"
//! tree main = Sequence {
//!     AlwaysSuccess
//!     Parallel {
//!         AlwaysSuccess
//!         Wait (ticks <- "2")
//!     }
//! }
//! "#;
//! let (_, tree_source) = parse_file(source).unwrap();
//! let registry = Registry::<Bot>::default();
//! let root = load(&tree_source, &registry, "main", true).unwrap();
//! ```
//!
//!
//! ### The tree file format
//!
//! ```raw
//! # A line comment.
//! tree main = Sequence {
//!     EnemyVisible
//!     SelectTarget (target -> enemy)
//!     Parallel {
//!         MoveToFiringPosition (target <- enemy)
//!         AimAtTarget (target <- enemy)
//!         Fire
//!     }
//! }
//! ```
//!
//! A node starts with its registered type name, optionally followed by a port list in
//! parentheses and a child list in braces.
//! The arrow gives the direction of the port: `<-` input, `->` output, `<->` both.
//! The right hand side is a blackboard variable or, for input ports only, a string
//! literal in double quotes.
//!
//! ```raw
//! tree = "tree" tree-name "=" node
//!
//! node = node-name [ "(" port-list ")" ] [ "{" node* "}" ]
//!
//! port-list = port [ "," port-list ]
//!
//! port = node-port-name ("<-" | "->" | "<->") ( blackboard-name | string-literal )
//! ```
//!
//! The same trees can be given in YAML with [`load_yaml`].
//!
//!
//! ## Driving a tree
//!
//! ```rust
//! # use bot_behavior_tree::*;
//! # struct Bot;
//! let mut driver = BehaviorTreeDriver::new(
//!     |_: &DriverConfig| -> Result<BehaviorNodeContainer<Bot>, error::LoadError> {
//!         Ok(BehaviorNodeContainer::new_node(AlwaysSuccess))
//!     },
//!     DriverConfig::default(),
//! );
//! let mut bot = Bot;
//! driver.enter().unwrap();
//! assert!(driver.update(&mut bot).unwrap());
//! driver.leave(&mut bot);
//! ```

mod agent;
mod cancel;
mod container;
mod context;
mod driver;
pub mod error;
mod lifecycle;
mod nodes;
pub mod parser;
mod port;
mod registry;
mod symbol;

use std::any::Any;
use std::collections::HashMap;

pub use crate::agent::{ControlledAgent, Vec3};
pub use crate::cancel::CancellationToken;
pub use crate::container::BehaviorNodeContainer;
pub use crate::context::Context;
pub use crate::driver::{
    BehaviorTreeDriver, DriverConfig, Lifecycle, SourceTreeFactory, TreeFactory,
    YamlTreeFactory,
};
pub use crate::lifecycle::{LifecycleDispatcher, StateLifecycle};
pub use crate::nodes::{
    AlwaysFailure, AlwaysSuccess, FallbackNode, InverterNode, IsTrueNode, ParallelNode,
    SequenceNode, SetBoolNode, WaitNode,
};
pub use crate::symbol::Symbol;
pub use crate::{
    error::TickError,
    parser::{load, load_yaml, parse_file, TreeSource},
    port::{PortSpec, PortType},
    registry::{boxify, Registry},
};
pub use ::once_cell::sync::*;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum BehaviorResult {
    Success,
    Fail,
    /// The node should keep running in the next tick
    Running,
}

/// What a tick produced: a result, or the reason there is none.
pub type TickResult = Result<BehaviorResult, TickError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlackboardValue {
    Ref(Symbol, PortType),
    Literal(String),
}

impl From<&str> for BlackboardValue {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_owned())
    }
}

/// Scratch variables shared by the nodes of one tree, keyed by symbol.
pub type Blackboard = HashMap<Symbol, Box<dyn Any>>;
/// Port name to blackboard binding, one per node.
pub type BBMap = HashMap<Symbol, BlackboardValue>;

/// A unit of decision logic, evaluated once per tick while its parent wants it.
///
/// # Contract
///
/// * `tick` may return `Running` to be resumed on the next tick. The parent calls
///   `tick` again on the same instance; a node keeps whatever progress it needs in
///   `self`.
/// * A node that sees the token cancelled returns `Err(TickError::Cancelled)`
///   instead of a result, ideally before touching the agent.
/// * `halt` is called at most once for every evaluation that was left in `Running`.
///   It must undo partially applied actions and reset the node so that the next
///   `tick` starts over.
/// * Side effects on the agent belong in leaves. They have to tolerate being
///   re-entered after a `Running` result.
pub trait BehaviorNode<A> {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![]
    }

    fn tick(&mut self, ctx: &mut Context<A>, token: &CancellationToken) -> TickResult;

    fn halt(&mut self, _ctx: &mut Context<A>) {}

    fn add_child(&mut self, _child: BehaviorNodeContainer<A>) -> error::AddChildResult {
        Err(error::AddChildError::TooManyNodes)
    }
}

#[macro_export]
macro_rules! hash_map {
    () => {
        std::collections::HashMap::default()
    };
    ($($name: literal => $val: expr),+ $(,)?) => {{
        let mut ret = std::collections::HashMap::default();
        $(ret.insert($name.into(), $val.into());)+
        ret
    }};
}
