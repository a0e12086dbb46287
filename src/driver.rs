use crate::{
    error::{DriverError, LoadError, TickError},
    lifecycle::StateLifecycle,
    parser::{load, load_yaml, parse_file},
    BehaviorNodeContainer, BehaviorResult, Blackboard, CancellationToken, Context, Registry,
};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Persistent part of the driver state.
///
/// This is what survives a hot-reload; the tree itself is rebuilt from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    Uninitialized,
    Active,
    Inactive,
}

/// Which tree a driver instantiates and how strictly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Name of the tree to instantiate from a tree source.
    pub tree: String,
    /// Reject port bindings the nodes do not declare.
    pub check_ports: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tree: "main".to_owned(),
            check_ports: true,
        }
    }
}

impl DriverConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

/// Builds the root of a behavior tree.
///
/// Called once on enter and again on every hot-reload, so it has to produce
/// an equivalent tree every time.
pub trait TreeFactory<A> {
    fn build(&self, config: &DriverConfig) -> Result<BehaviorNodeContainer<A>, LoadError>;
}

impl<A, F> TreeFactory<A> for F
where
    F: Fn(&DriverConfig) -> Result<BehaviorNodeContainer<A>, LoadError>,
{
    fn build(&self, config: &DriverConfig) -> Result<BehaviorNodeContainer<A>, LoadError> {
        self(config)
    }
}

/// Builds trees from the text format, see [`crate::parse_file`].
pub struct SourceTreeFactory<A> {
    source: String,
    registry: Rc<Registry<A>>,
}

impl<A> SourceTreeFactory<A> {
    pub fn new(source: impl Into<String>, registry: Rc<Registry<A>>) -> Self {
        Self {
            source: source.into(),
            registry,
        }
    }
}

impl<A> TreeFactory<A> for SourceTreeFactory<A> {
    fn build(&self, config: &DriverConfig) -> Result<BehaviorNodeContainer<A>, LoadError> {
        let (rest, tree_source) =
            parse_file(&self.source).map_err(|e| LoadError::Parse(e.to_string()))?;
        let rest = rest.trim();
        if !rest.is_empty() {
            let line: String = rest.lines().next().unwrap_or_default().to_owned();
            return Err(LoadError::Parse(format!("unexpected input: {line:?}")));
        }
        load(&tree_source, &self.registry, &config.tree, config.check_ports)
    }
}

/// Builds trees from YAML, see [`crate::load_yaml`].
///
/// Port checking does not apply; YAML ports carry no direction.
pub struct YamlTreeFactory<A> {
    source: String,
    registry: Rc<Registry<A>>,
}

impl<A> YamlTreeFactory<A> {
    pub fn new(source: impl Into<String>, registry: Rc<Registry<A>>) -> Self {
        Self {
            source: source.into(),
            registry,
        }
    }
}

impl<A> TreeFactory<A> for YamlTreeFactory<A> {
    fn build(&self, config: &DriverConfig) -> Result<BehaviorNodeContainer<A>, LoadError> {
        let mut trees = load_yaml(&self.source, &self.registry)?;
        trees
            .remove(&config.tree)
            .ok_or_else(|| LoadError::MissingTree(config.tree.clone()))
    }
}

/// Transient part of the driver state, thrown away on leave and on rebuild.
struct TreeInstance<A> {
    root: BehaviorNodeContainer<A>,
    /// The last tick returned Running and the next one resumes it.
    in_flight: bool,
    blackboard: Blackboard,
    task_token: CancellationToken,
    last_result: Option<BehaviorResult>,
}

impl<A> TreeInstance<A> {
    fn new(root: BehaviorNodeContainer<A>, lifetime: &CancellationToken) -> Self {
        Self {
            root,
            in_flight: false,
            blackboard: Blackboard::new(),
            task_token: lifetime.child_token(),
            last_result: None,
        }
    }

    fn tick(&mut self, agent: &mut A) -> Result<BehaviorResult, TickError> {
        if !self.in_flight {
            self.blackboard.clear();
        }
        let mut ctx = Context::new(agent, std::mem::take(&mut self.blackboard));
        let res = self.root.tick(&mut ctx, &self.task_token);
        if res.is_err() {
            self.root.halt(&mut ctx);
        }
        self.blackboard = ctx.take_blackboard();
        self.in_flight = matches!(res, Ok(BehaviorResult::Running));
        self.last_result = res.as_ref().ok().copied();
        res
    }

    /// Halt the evaluation in flight, if any. Returns immediately otherwise.
    fn halt(&mut self, agent: &mut A) {
        if !self.in_flight {
            return;
        }
        let mut ctx = Context::new(agent, std::mem::take(&mut self.blackboard));
        self.root.halt(&mut ctx);
        self.blackboard = ctx.take_blackboard();
        self.in_flight = false;
    }
}

/// Owns the behavior tree of one agent and advances it from lifecycle signals.
///
/// ```raw
/// Uninitialized --enter--> Active --leave--> Inactive --enter--> Active
///                            |  ^
///                            +--+ rebuild (hot-reload)
/// ```
///
/// The root is built exactly once per enter, and again only on rebuild. An
/// update resumes the evaluation left Running by the previous update, or
/// starts a new one from the top.
pub struct BehaviorTreeDriver<A> {
    factory: Box<dyn TreeFactory<A>>,
    config: DriverConfig,
    lifecycle: Lifecycle,
    lifetime: CancellationToken,
    instance: Option<TreeInstance<A>>,
}

impl<A> BehaviorTreeDriver<A> {
    pub fn new(factory: impl TreeFactory<A> + 'static, config: DriverConfig) -> Self {
        Self {
            factory: Box::new(factory),
            config,
            lifecycle: Lifecycle::Uninitialized,
            lifetime: CancellationToken::new(),
            instance: None,
        }
    }

    /// Re-create a driver from a persisted lifecycle flag, e.g. after the
    /// code was reloaded. A tree is built if and only if the flag is Active.
    pub fn restore(
        factory: impl TreeFactory<A> + 'static,
        config: DriverConfig,
        lifecycle: Lifecycle,
    ) -> Result<Self, DriverError> {
        let mut ret = Self::new(factory, config);
        ret.lifecycle = lifecycle;
        if lifecycle == Lifecycle::Active {
            ret.instance = Some(ret.construct()?);
        }
        Ok(ret)
    }

    fn construct(&mut self) -> Result<TreeInstance<A>, DriverError> {
        match self.factory.build(&self.config) {
            Ok(root) => {
                tracing::debug!(tree = %self.config.tree, "behavior tree constructed");
                Ok(TreeInstance::new(root, &self.lifetime))
            }
            Err(e) => {
                tracing::error!(tree = %self.config.tree, error = %e, "behavior tree construction failed");
                self.lifecycle = Lifecycle::Inactive;
                self.instance = None;
                Err(e.into())
            }
        }
    }

    /// Build the root and become Active. Entering an Active driver does nothing.
    pub fn enter(&mut self) -> Result<(), DriverError> {
        if self.lifecycle == Lifecycle::Active {
            tracing::debug!("driver entered while already active");
            return Ok(());
        }
        self.lifetime = CancellationToken::new();
        let instance = self.construct()?;
        self.instance = Some(instance);
        self.lifecycle = Lifecycle::Active;
        tracing::debug!(tree = %self.config.tree, "driver entered");
        Ok(())
    }

    /// Advance the tree by one tick.
    ///
    /// Returns `Ok(true)` iff the root finished with Success on this tick.
    /// Failure, Running and leaf errors all yield `Ok(false)`.
    pub fn update(&mut self, agent: &mut A) -> Result<bool, DriverError> {
        let Some(instance) = self
            .instance
            .as_mut()
            .filter(|_| self.lifecycle == Lifecycle::Active)
        else {
            tracing::error!(lifecycle = ?self.lifecycle, "update on an inactive driver");
            return Err(DriverError::NotActive);
        };

        if self.lifetime.is_cancelled() {
            tracing::debug!("driver lifetime cancelled, tearing down");
            self.teardown(agent);
            return Ok(false);
        }

        let resumed = instance.in_flight;
        match instance.tick(agent) {
            Ok(res) => {
                tracing::trace!(?res, resumed, "root ticked");
                Ok(res == BehaviorResult::Success)
            }
            Err(TickError::Cancelled) => {
                if self.lifetime.is_cancelled() {
                    tracing::debug!("driver lifetime cancelled mid-evaluation, tearing down");
                    self.teardown(agent);
                } else {
                    instance.task_token = self.lifetime.child_token();
                }
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(error = %e, "behavior tree evaluation failed, retrying next update");
                Ok(false)
            }
        }
    }

    /// Cancel the evaluation in flight and drop the tree.
    ///
    /// Every node suspended in Running has been halted by the time this
    /// returns.
    pub fn leave(&mut self, agent: &mut A) {
        self.lifetime.cancel();
        self.teardown(agent);
        tracing::debug!("driver left");
    }

    fn teardown(&mut self, agent: &mut A) {
        if let Some(mut instance) = self.instance.take() {
            instance.halt(agent);
        }
        if self.lifecycle != Lifecycle::Uninitialized {
            self.lifecycle = Lifecycle::Inactive;
        }
    }

    /// Abandon the evaluation for the current task assignment only.
    ///
    /// The tree stays built and starts over from the top on the next update.
    pub fn cancel_task(&mut self, agent: &mut A) {
        if let Some(instance) = self.instance.as_mut() {
            instance.task_token.cancel();
            instance.halt(agent);
            instance.task_token = self.lifetime.child_token();
            instance.last_result = None;
            tracing::debug!("task cancelled");
        }
    }

    /// Hot-reload: rebuild the tree from the factory without re-entering.
    ///
    /// Only an Active driver builds anything; an Inactive one stays as it is
    /// until it is entered again.
    pub fn rebuild(&mut self, agent: &mut A) -> Result<(), DriverError> {
        if self.lifecycle != Lifecycle::Active {
            tracing::debug!(lifecycle = ?self.lifecycle, "rebuild skipped");
            return Ok(());
        }
        if let Some(mut instance) = self.instance.take() {
            instance.halt(agent);
        }
        let instance = self.construct()?;
        self.instance = Some(instance);
        tracing::debug!(tree = %self.config.tree, "driver rebuilt");
        Ok(())
    }

    /// Swap in a new factory, e.g. one holding freshly reloaded tree source, and rebuild.
    pub fn reload_with(
        &mut self,
        factory: impl TreeFactory<A> + 'static,
        agent: &mut A,
    ) -> Result<(), DriverError> {
        self.factory = Box::new(factory);
        self.rebuild(agent)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.lifetime
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn is_in_flight(&self) -> bool {
        self.instance.as_ref().map_or(false, |i| i.in_flight)
    }

    pub fn last_result(&self) -> Option<BehaviorResult> {
        self.instance.as_ref().and_then(|i| i.last_result)
    }
}

impl<A> StateLifecycle<A> for BehaviorTreeDriver<A> {
    fn on_enter(&mut self, _agent: &mut A) -> Result<(), DriverError> {
        self.enter()
    }

    fn on_update(&mut self, agent: &mut A) -> bool {
        self.update(agent).unwrap_or(false)
    }

    fn on_leave(&mut self, agent: &mut A) {
        self.leave(agent)
    }

    fn on_reload(&mut self, agent: &mut A) -> Result<(), DriverError> {
        self.rebuild(agent)
    }
}
