use bot_behavior_tree::{
    boxify, BehaviorNode, BehaviorResult, BehaviorTreeDriver, CancellationToken, Context,
    ControlledAgent, DriverConfig, Lazy, LifecycleDispatcher, PortSpec, Registry,
    SourceTreeFactory, Symbol, TickError, TickResult, Vec3,
};
use std::rc::Rc;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct EntityId(u32);

#[derive(Debug, PartialEq)]
enum Task {
    Engage,
    Patrol,
}

impl Task {
    fn name(&self) -> &'static str {
        match self {
            Self::Engage => "engage",
            Self::Patrol => "patrol",
        }
    }
}

const MAGAZINE: u32 = 3;

struct Bot {
    position: Vec3,
    velocity: Vec3,
    look: Vec3,
    enemies: Vec<(EntityId, Vec3)>,
    task: Option<Task>,
    ammo: u32,
    reloading: bool,
    shots: u32,
}

impl Bot {
    fn new(task: Task) -> Self {
        Self {
            position: [0.; 3],
            velocity: [0.; 3],
            look: [1., 0., 0.],
            enemies: vec![(EntityId(1), [10., 0., 0.]), (EntityId(2), [0., 30., 0.])],
            task: Some(task),
            ammo: MAGAZINE,
            reloading: false,
            shots: 0,
        }
    }

    fn entity_position(&self, id: EntityId) -> Option<Vec3> {
        self.enemies
            .iter()
            .find(|(enemy, _)| *enemy == id)
            .map(|(_, pos)| *pos)
    }
}

fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn length(v: Vec3) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn scale(v: Vec3, s: f32) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

impl ControlledAgent for Bot {
    type Entity = EntityId;
    type Task = Task;

    fn position(&self) -> Vec3 {
        self.position
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn look_direction(&self) -> Vec3 {
        self.look
    }

    fn visible_entities(&self) -> Vec<EntityId> {
        self.enemies.iter().map(|(id, _)| *id).collect()
    }

    fn current_task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    fn move_to(&mut self, point: Vec3) {
        self.velocity = sub(point, self.position);
        self.position = point;
    }

    fn aim_at(&mut self, point: Vec3) {
        let delta = sub(point, self.position);
        self.look = scale(delta, 1. / length(delta));
    }

    fn fire(&mut self) {
        if self.ammo > 0 {
            self.ammo -= 1;
            self.shots += 1;
        }
    }

    fn reload(&mut self) {
        self.reloading = true;
    }

    fn stop(&mut self) {
        self.velocity = [0.; 3];
        self.reloading = false;
    }
}

static TARGET: Lazy<Symbol> = Lazy::new(|| "target".into());
static TASK: Lazy<Symbol> = Lazy::new(|| "task".into());

struct TaskIs;

impl BehaviorNode<Bot> for TaskIs {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*TASK)]
    }

    fn tick(&mut self, ctx: &mut Context<Bot>, _token: &CancellationToken) -> TickResult {
        let wanted = ctx.get::<String>(*TASK).map(String::as_str);
        if ctx.task().map(Task::name) == wanted {
            Ok(BehaviorResult::Success)
        } else {
            Ok(BehaviorResult::Fail)
        }
    }
}

struct EnemyVisible;

impl BehaviorNode<Bot> for EnemyVisible {
    fn tick(&mut self, ctx: &mut Context<Bot>, _token: &CancellationToken) -> TickResult {
        if ctx.agent().visible_entities().is_empty() {
            Ok(BehaviorResult::Fail)
        } else {
            Ok(BehaviorResult::Success)
        }
    }
}

struct SelectTarget;

impl BehaviorNode<Bot> for SelectTarget {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_out(*TARGET)]
    }

    fn tick(&mut self, ctx: &mut Context<Bot>, _token: &CancellationToken) -> TickResult {
        let bot = ctx.agent();
        let here = bot.position();
        let nearest = bot
            .visible_entities()
            .into_iter()
            .filter_map(|id| bot.entity_position(id))
            .min_by(|a, b| length(sub(*a, here)).total_cmp(&length(sub(*b, here))));
        match nearest {
            Some(target) => {
                ctx.set(*TARGET, target);
                Ok(BehaviorResult::Success)
            }
            None => Ok(BehaviorResult::Fail),
        }
    }
}

/// Takes two extra ticks to refill an empty magazine.
#[derive(Default)]
struct ReloadIfNeeded {
    remaining: Option<u32>,
}

impl BehaviorNode<Bot> for ReloadIfNeeded {
    fn tick(&mut self, ctx: &mut Context<Bot>, _token: &CancellationToken) -> TickResult {
        let bot = ctx.agent_mut();
        match self.remaining {
            Some(0) => {
                self.remaining = None;
                bot.ammo = MAGAZINE;
                bot.reloading = false;
                Ok(BehaviorResult::Success)
            }
            Some(n) => {
                self.remaining = Some(n - 1);
                Ok(BehaviorResult::Running)
            }
            None if bot.ammo > 0 => Ok(BehaviorResult::Success),
            None => {
                bot.reload();
                self.remaining = Some(1);
                Ok(BehaviorResult::Running)
            }
        }
    }

    fn halt(&mut self, ctx: &mut Context<Bot>) {
        self.remaining = None;
        ctx.agent_mut().stop();
    }
}

fn target(ctx: &Context<Bot>, node: &str) -> Result<Vec3, TickError> {
    ctx.get::<Vec3>(*TARGET)
        .copied()
        .ok_or_else(|| TickError::node(node, "no target selected"))
}

struct MoveToFiringPosition {
    range: f32,
    speed: f32,
}

impl BehaviorNode<Bot> for MoveToFiringPosition {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*TARGET)]
    }

    fn tick(&mut self, ctx: &mut Context<Bot>, _token: &CancellationToken) -> TickResult {
        let target = target(ctx, "MoveToFiringPosition")?;
        let bot = ctx.agent_mut();
        let delta = sub(target, bot.position());
        let distance = length(delta);
        if distance <= self.range {
            return Ok(BehaviorResult::Success);
        }
        let step = self.speed.min(distance - self.range);
        let dest = sub(bot.position(), scale(delta, -step / distance));
        bot.move_to(dest);
        if distance - step <= self.range {
            Ok(BehaviorResult::Success)
        } else {
            Ok(BehaviorResult::Running)
        }
    }

    fn halt(&mut self, ctx: &mut Context<Bot>) {
        ctx.agent_mut().stop();
    }
}

struct AimAtTarget;

impl BehaviorNode<Bot> for AimAtTarget {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*TARGET)]
    }

    fn tick(&mut self, ctx: &mut Context<Bot>, _token: &CancellationToken) -> TickResult {
        let target = target(ctx, "AimAtTarget")?;
        ctx.agent_mut().aim_at(target);
        Ok(BehaviorResult::Success)
    }
}

/// Holds fire until the target is in range.
struct Fire {
    range: f32,
}

impl BehaviorNode<Bot> for Fire {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*TARGET)]
    }

    fn tick(&mut self, ctx: &mut Context<Bot>, token: &CancellationToken) -> TickResult {
        let target = target(ctx, "Fire")?;
        if length(sub(target, ctx.agent().position())) > self.range {
            return Ok(BehaviorResult::Running);
        }
        if token.is_cancelled() {
            return Err(TickError::Cancelled);
        }
        ctx.agent_mut().fire();
        Ok(BehaviorResult::Success)
    }
}

const TREE: &str = r#"
# Engage the nearest enemy while the assigned task allows it.
tree main = Sequence {
    TaskIs (task <- "engage")
    EnemyVisible
    SelectTarget (target -> enemy)
    ReloadIfNeeded
    Parallel {
        MoveToFiringPosition (target <- enemy)
        AimAtTarget (target <- enemy)
        Fire (target <- enemy)
    }
}
"#;

fn registry() -> Registry<Bot> {
    let mut registry = Registry::default();
    registry.register("TaskIs", boxify(|| TaskIs));
    registry.register("EnemyVisible", boxify(|| EnemyVisible));
    registry.register("SelectTarget", boxify(|| SelectTarget));
    registry.register("ReloadIfNeeded", boxify(ReloadIfNeeded::default));
    registry.register(
        "MoveToFiringPosition",
        boxify(|| MoveToFiringPosition {
            range: 4.,
            speed: 2.,
        }),
    );
    registry.register("AimAtTarget", boxify(|| AimAtTarget));
    registry.register("Fire", boxify(|| Fire { range: 4. }));
    registry
}

fn driver() -> BehaviorTreeDriver<Bot> {
    BehaviorTreeDriver::new(
        SourceTreeFactory::new(TREE, Rc::new(registry())),
        DriverConfig::default(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Roam,
    Combat,
}

fn dispatcher() -> LifecycleDispatcher<Mode, Bot> {
    let mut dispatcher = LifecycleDispatcher::new();
    dispatcher.bind(Mode::Combat, driver());
    dispatcher
}

#[test]
fn test_engage_nearest_enemy() -> anyhow::Result<()> {
    let mut bot = Bot::new(Task::Engage);
    let mut driver = driver();
    driver.enter()?;

    assert!(!driver.update(&mut bot)?);
    assert_eq!(bot.position, [2., 0., 0.]);
    assert_eq!(bot.shots, 0);
    assert!(!driver.update(&mut bot)?);
    assert_eq!(bot.position, [4., 0., 0.]);
    assert!(driver.update(&mut bot)?);
    assert_eq!(bot.position, [6., 0., 0.]);
    assert_eq!(bot.look, [1., 0., 0.]);
    assert_eq!(bot.shots, 1);
    assert_eq!(bot.ammo, MAGAZINE - 1);

    // In range now, so the next evaluation completes in a single tick.
    assert!(driver.update(&mut bot)?);
    assert_eq!(bot.shots, 2);
    driver.leave(&mut bot);
    Ok(())
}

#[test]
fn test_task_gates_engagement() -> anyhow::Result<()> {
    let mut bot = Bot::new(Task::Patrol);
    let mut driver = driver();
    driver.enter()?;
    assert!(!driver.update(&mut bot)?);
    assert!(!driver.is_in_flight());
    assert_eq!(bot.position, [0.; 3]);

    bot.task = Some(Task::Engage);
    assert!(!driver.update(&mut bot)?);
    assert!(driver.is_in_flight());
    Ok(())
}

#[test]
fn test_state_change_stops_movement() {
    let mut bot = Bot::new(Task::Engage);
    let mut dispatcher = dispatcher();
    assert!(dispatcher.enter(Mode::Combat, &mut bot).is_empty());
    assert!(!dispatcher.update(&mut bot));
    assert_eq!(bot.velocity, [2., 0., 0.]);

    assert!(dispatcher.enter(Mode::Roam, &mut bot).is_empty());
    assert_eq!(bot.velocity, [0.; 3]);
    assert_eq!(dispatcher.active_state(), Some(&Mode::Roam));
    // Nothing is bound to roaming.
    assert!(!dispatcher.update(&mut bot));
    assert_eq!(bot.position, [2., 0., 0.]);
}

#[test]
fn test_leave_mid_reload() {
    let mut bot = Bot::new(Task::Engage);
    bot.ammo = 0;
    let mut dispatcher = dispatcher();
    dispatcher.enter(Mode::Combat, &mut bot);
    assert!(!dispatcher.update(&mut bot));
    assert!(bot.reloading);
    assert!(!dispatcher.update(&mut bot));

    dispatcher.leave(&mut bot);
    assert!(!bot.reloading);
    assert_eq!(bot.ammo, 0);

    // A fresh evaluation starts the reload over.
    dispatcher.enter(Mode::Combat, &mut bot);
    for _ in 0..3 {
        assert!(!dispatcher.update(&mut bot));
    }
    assert_eq!(bot.ammo, MAGAZINE);
    assert!(!bot.reloading);
}

#[test]
fn test_hot_reload_restarts_evaluation() {
    let mut bot = Bot::new(Task::Engage);
    let mut dispatcher = dispatcher();
    dispatcher.enter(Mode::Combat, &mut bot);
    assert!(!dispatcher.update(&mut bot));
    assert_eq!(bot.velocity, [2., 0., 0.]);

    assert!(dispatcher.reload(&mut bot).is_empty());
    // The suspended move was halted and the driver is still running.
    assert_eq!(bot.velocity, [0.; 3]);
    assert!(!dispatcher.update(&mut bot));
    assert_eq!(bot.position, [4., 0., 0.]);
    assert!(dispatcher.update(&mut bot));
    assert_eq!(bot.shots, 1);
}

#[test]
fn test_missing_target_is_not_fatal() -> anyhow::Result<()> {
    let source = r#"
tree main = Sequence {
    AimAtTarget (target <- nobody)
}
"#;
    let mut driver = BehaviorTreeDriver::new(
        SourceTreeFactory::new(source, Rc::new(registry())),
        DriverConfig::default(),
    );
    let mut bot = Bot::new(Task::Engage);
    driver.enter()?;
    assert!(!driver.update(&mut bot)?);
    assert!(!driver.update(&mut bot)?);
    assert_eq!(bot.look, [1., 0., 0.]);
    Ok(())
}
