//! Simulation core for the town: maps and pathfinding, the need model,
//! navigation and transitions, the action lifecycle, and the engine that
//! ties them together behind an async orchestration shell.
//!
//! The engine itself is single-threaded; all concurrency lives in
//! `EngineHandle`, which serializes world access through one lock and
//! fans decisions out to tasks that never hold it while awaiting.

mod action;
mod behavior;
mod engine;
mod events;
mod needs;
mod orchestrator;
mod pathfind;
mod router;
mod scheduler;
mod store;
mod world;

#[cfg(test)]
mod testutil;

pub use action::{ActionCompletion, ActionExecutor, ActionRequest, TimedActionExecutor};
pub use behavior::{BehaviorDecider, DecisionError, DecisionFuture, ScriptedDecider};
pub use engine::{DecisionRequest, SimEngine, TickOutput};
pub use events::EventBus;
pub use needs::{apply_decay, NeedInterrupt};
pub use orchestrator::{wall_ms, EngineHandle};
pub use pathfind::find_path;
pub use router::plan_route;
pub use scheduler::{run_loop, run_ticks};
pub use store::{StateStore, StoreError};
pub use world::{NavError, WorldClock, WorldError, WorldState, ADJACENCY_MARGIN};
