//! Two bots on a line, each one closing in on the other and shooting once in range.
//!
//! Run with `RUST_LOG=debug cargo run --example skirmish` to see the driver
//! lifecycle.

use bot_behavior_tree::{
    boxify, BehaviorNode, BehaviorResult, BehaviorTreeDriver, CancellationToken, Context,
    ControlledAgent, DriverConfig, LifecycleDispatcher, PortSpec, Registry, TickError,
    TickResult, Vec3, YamlTreeFactory,
};
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

const TREES: &str = r#"
behavior_tree:
  duel:
    type: Sequence
    children:
      - type: PickOpponent
        ports:
          target: foe
      - type: Parallel
        children:
          - type: Approach
            ports:
              target: foe
            inputs:
              range: 3
          - type: Shoot
            ports:
              target: foe
            inputs:
              range: 3
"#;

const CONFIG: &str = "tree: duel\n";

struct Skirmisher {
    name: &'static str,
    x: f32,
    speed: f32,
    opponent: Option<f32>,
    hits: u32,
    ammo: u32,
}

impl ControlledAgent for Skirmisher {
    type Entity = u8;
    type Task = ();

    fn position(&self) -> Vec3 {
        [self.x, 0., 0.]
    }

    fn velocity(&self) -> Vec3 {
        [self.speed, 0., 0.]
    }

    fn look_direction(&self) -> Vec3 {
        [1., 0., 0.]
    }

    fn visible_entities(&self) -> Vec<u8> {
        self.opponent.iter().map(|_| 0).collect()
    }

    fn current_task(&self) -> Option<&()> {
        None
    }

    fn move_to(&mut self, point: Vec3) {
        self.x = point[0];
    }

    fn aim_at(&mut self, _point: Vec3) {}

    fn fire(&mut self) {
        if self.ammo > 0 {
            self.ammo -= 1;
            self.hits += 1;
        }
    }

    fn reload(&mut self) {}

    fn stop(&mut self) {
        self.speed = 0.;
    }
}

struct PickOpponent;

impl BehaviorNode<Skirmisher> for PickOpponent {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_out("target")]
    }

    fn tick(&mut self, ctx: &mut Context<Skirmisher>, _token: &CancellationToken) -> TickResult {
        match ctx.agent().opponent {
            Some(x) => {
                ctx.set("target", x);
                Ok(BehaviorResult::Success)
            }
            None => Ok(BehaviorResult::Fail),
        }
    }
}

fn target_and_range(ctx: &Context<Skirmisher>, node: &str) -> Result<(f32, f32), TickError> {
    let target = ctx
        .get::<f32>("target")
        .copied()
        .ok_or_else(|| TickError::node(node, "no opponent"))?;
    let range = ctx
        .get_parse::<f32>("range")
        .ok_or_else(|| TickError::node(node, "range is not a number"))?;
    Ok((target, range))
}

struct Approach;

impl BehaviorNode<Skirmisher> for Approach {
    fn tick(&mut self, ctx: &mut Context<Skirmisher>, _token: &CancellationToken) -> TickResult {
        let (target, range) = target_and_range(ctx, "Approach")?;
        let bot = ctx.agent_mut();
        let gap = target - bot.x;
        if gap.abs() <= range {
            return Ok(BehaviorResult::Success);
        }
        let step = bot.speed.min(gap.abs() - range).copysign(gap);
        bot.move_to([bot.x + step, 0., 0.]);
        tracing::info!(bot = bot.name, x = bot.x, "moving");
        Ok(BehaviorResult::Running)
    }

    fn halt(&mut self, ctx: &mut Context<Skirmisher>) {
        ctx.agent_mut().stop();
    }
}

struct Shoot;

impl BehaviorNode<Skirmisher> for Shoot {
    fn tick(&mut self, ctx: &mut Context<Skirmisher>, token: &CancellationToken) -> TickResult {
        let (target, range) = target_and_range(ctx, "Shoot")?;
        if (target - ctx.agent().x).abs() > range {
            return Ok(BehaviorResult::Running);
        }
        if token.is_cancelled() {
            return Err(TickError::Cancelled);
        }
        let bot = ctx.agent_mut();
        bot.fire();
        tracing::info!(bot = bot.name, hits = bot.hits, "bang");
        Ok(BehaviorResult::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Fight,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut registry = Registry::default();
    registry.register("PickOpponent", boxify(|| PickOpponent));
    registry.register("Approach", boxify(|| Approach));
    registry.register("Shoot", boxify(|| Shoot));
    let registry = Rc::new(registry);
    let config = DriverConfig::from_yaml(CONFIG)?;

    let mut bots = [
        Skirmisher {
            name: "red",
            x: 0.,
            speed: 1.5,
            opponent: None,
            hits: 0,
            ammo: 2,
        },
        Skirmisher {
            name: "blue",
            x: 12.,
            speed: 1.,
            opponent: None,
            hits: 0,
            ammo: 2,
        },
    ];

    let mut dispatchers = vec![];
    for bot in bots.iter_mut() {
        let mut dispatcher = LifecycleDispatcher::new();
        dispatcher.bind(
            Mode::Fight,
            BehaviorTreeDriver::new(
                YamlTreeFactory::new(TREES, registry.clone()),
                config.clone(),
            ),
        );
        if let Some(e) = dispatcher.enter(Mode::Fight, bot).into_iter().next() {
            return Err(e.into());
        }
        dispatchers.push(dispatcher);
    }

    for tick in 0..10 {
        let positions = [bots[0].x, bots[1].x];
        bots[0].opponent = Some(positions[1]);
        bots[1].opponent = Some(positions[0]);

        for (bot, dispatcher) in bots.iter_mut().zip(dispatchers.iter_mut()) {
            if dispatcher.update(bot) {
                tracing::info!(tick, bot = bot.name, "engagement finished");
            }
        }
        if bots.iter().all(|bot| bot.ammo == 0) {
            break;
        }
    }

    for (bot, dispatcher) in bots.iter_mut().zip(dispatchers.iter_mut()) {
        dispatcher.leave(bot);
        println!("{}: x = {}, hits = {}", bot.name, bot.x, bot.hits);
    }
    Ok(())
}
