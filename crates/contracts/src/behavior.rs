//! Behavior decision contract: the tagged decision variants an external
//! decider returns, and the read-only context snapshot it receives.

use serde::{Deserialize, Serialize};

use crate::agent::{NeedKind, NeedStats, ScheduleEntry};
use crate::events::WorldTime;

/// What an agent should do next. Returned by a `BehaviorDecider`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BehaviorDecision {
    Idle {
        reason: String,
    },
    Move {
        #[serde(default)]
        target_map_id: Option<String>,
        #[serde(default)]
        target_node_id: Option<String>,
        reason: String,
    },
    Action {
        action_id: String,
        #[serde(default)]
        target_facility_id: Option<String>,
        #[serde(default)]
        target_npc_id: Option<String>,
        #[serde(default)]
        duration_minutes: Option<u32>,
        reason: String,
    },
}

/// Why a decision was requested. Interrupt triggers force the action kind
/// and only delegate the facility choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionTrigger {
    /// World init or restore; the agent has nothing to do yet.
    Bootstrap,
    /// An action or navigation just completed.
    Completion,
    /// A need crossed the interrupt threshold.
    Interrupt(NeedKind),
    /// A delayed retry scheduled by the orchestrator.
    Scheduled,
}

/// A facility visible to the decider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityInfo {
    pub facility_id: String,
    pub map_id: String,
    pub tags: Vec<String>,
    pub cost: i64,
    pub quality: i64,
}

/// Another agent sharing the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyAgent {
    pub agent_id: String,
    pub name: String,
    pub busy: bool,
}

/// Immutable snapshot handed to the decider. Built under the engine lock,
/// then used without it; the world may move on while the decider runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    pub agent_id: String,
    pub agent_name: String,
    pub needs: NeedStats,
    pub time: WorldTime,
    pub current_map_id: String,
    pub current_facility_id: Option<String>,
    pub schedule: Vec<ScheduleEntry>,
    pub available_actions: Vec<String>,
    pub nearby_agents: Vec<NearbyAgent>,
    pub facilities: Vec<FacilityInfo>,
    pub reachable_maps: Vec<String>,
    pub recent_history: Vec<String>,
    pub trigger: DecisionTrigger,
}
