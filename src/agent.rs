//! The contract a controlled agent exposes to leaf nodes.
//!
//! The engine itself only asks for the current task (see [`crate::Context::task`]);
//! everything else is here so that game-side leaves written against different
//! agent types share one vocabulary.

use std::fmt::Debug;

pub type Vec3 = [f32; 3];

pub trait ControlledAgent {
    /// Handle of anything the agent can perceive.
    type Entity: Copy + Eq + Debug;
    /// The objective the agent is currently assigned.
    type Task;

    fn position(&self) -> Vec3;

    fn velocity(&self) -> Vec3;

    fn look_direction(&self) -> Vec3;

    fn visible_entities(&self) -> Vec<Self::Entity>;

    fn current_task(&self) -> Option<&Self::Task>;

    fn move_to(&mut self, point: Vec3);

    fn aim_at(&mut self, point: Vec3);

    fn fire(&mut self);

    fn reload(&mut self);

    /// Release movement and trigger. Called by leaves that are halted while
    /// one of their actions is only partly applied.
    fn stop(&mut self);
}
