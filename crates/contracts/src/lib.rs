//! Shared data contracts for the town simulation: world geometry, agent
//! records, behavior decisions, activity events, snapshots, and the
//! simulation config. Pure data, serde throughout; no behavior lives here.

mod agent;
mod behavior;
mod catalog;
mod events;
mod world;

pub use agent::{
    ActionState, AgentKind, AgentRecord, CrossMapNavigation, MapTransition, NavigationState,
    NeedKind, NeedRateOverrides, NeedStats, PendingAction, Route, RouteSegment, ScheduleEntry,
    TransitionPhase,
};
pub use behavior::{BehaviorDecision, DecisionContext, DecisionTrigger, FacilityInfo, NearbyAgent};
pub use catalog::{ActionCatalog, ActionSpec};
pub use events::{ActivityEvent, AgentSnapshot, PersistedWorldState, WorldSnapshot, WorldTime};
pub use world::{
    Direction, Facility, MapLink, NodeKind, Obstacle, PathNode, Position, Rect, WorldMap,
};

use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION_V1: &str = "town.v1";

/// Engine configuration. Loaded from JSON by the CLI or built with
/// `Default` for embedded/test use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed tick rate for the scheduler loop.
    pub tick_hz: u32,
    /// Simulated minutes that pass per real minute. 1.0 means the world
    /// clock tracks wall-clock time.
    pub time_scale: f64,
    /// Offset applied to UTC when deriving the local world clock.
    pub utc_offset_minutes: i32,
    /// Movement speed in pixels per real second.
    pub move_speed: f64,
    /// Duration of each transition ramp (fade-out and fade-in) in seconds.
    pub transition_fade_secs: f64,
    /// Baseline decay per simulated minute for each need.
    pub decay_per_minute: NeedStats,
    /// A need dropping below this value raises an interrupt.
    pub interrupt_threshold: f64,
    /// Forced wandering fires after this many completed actions.
    pub wander_after_actions: u32,
    /// Maximum map hops considered when picking a wander destination.
    pub wander_hop_radius: u32,
    /// Delay before retrying after a failed navigation or action start.
    pub retry_short_ms: u64,
    /// Delay before re-deciding after a voluntary idle decision.
    pub idle_retry_ms: u64,
    /// Delay before re-deciding when an interrupt produced no resolution.
    pub stuck_retry_ms: u64,
    /// Checkpoint cadence in ticks (0 disables checkpoints).
    pub snapshot_every_ticks: u64,
    /// Subscriber notification cadence in ticks.
    pub broadcast_every_ticks: u64,
    /// Map shown to fresh subscribers and used for spawning.
    pub default_map_id: String,
    /// Safe map used when an interrupt has no viable facility.
    pub fallback_map_id: String,
    /// Action id for the placeholder started while a decision is in flight.
    pub thinking_action_id: String,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_hz: 20,
            time_scale: 1.0,
            utc_offset_minutes: 0,
            move_speed: 80.0,
            transition_fade_secs: 0.5,
            decay_per_minute: NeedStats {
                satiety: 0.25,
                energy: 0.15,
                hygiene: 0.12,
                mood: 0.08,
                bladder: 0.4,
            },
            interrupt_threshold: 15.0,
            wander_after_actions: 5,
            wander_hop_radius: 2,
            retry_short_ms: 1_000,
            idle_retry_ms: 2_000,
            stuck_retry_ms: 5_000,
            snapshot_every_ticks: 200,
            broadcast_every_ticks: 1,
            default_map_id: "town".to_string(),
            fallback_map_id: "town".to_string(),
            thinking_action_id: "think".to_string(),
            seed: 0,
        }
    }
}
