//! Activity events, world time, subscriber snapshots, and the checkpoint
//! payload handed to the state store.

use serde::{Deserialize, Serialize};

use crate::agent::{
    ActionState, AgentKind, AgentRecord, NavigationState, NeedKind, NeedStats, PendingAction,
};
use crate::world::{Direction, Position};

/// Simulated clock value derived from wall time. `day` counts local
/// midnights since the engine's anchor, not process restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldTime {
    pub hour: u8,
    pub minute: u8,
    pub day: u32,
}

impl WorldTime {
    pub fn minutes_of_day(&self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.minute)
    }
}

impl std::fmt::Display for WorldTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "day {} {:02}:{:02}", self.day, self.hour, self.minute)
    }
}

/// Items on the activity-log stream pushed alongside snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityEvent {
    ActionStarted {
        agent_id: String,
        action_id: String,
        facility_id: Option<String>,
        tick: u64,
    },
    ActionCompleted {
        agent_id: String,
        action_id: String,
        tick: u64,
    },
    MovementStarted {
        agent_id: String,
        map_id: String,
        target_node_id: String,
        tick: u64,
    },
    MovementCompleted {
        agent_id: String,
        map_id: String,
        node_id: String,
        tick: u64,
    },
    MapTransition {
        agent_id: String,
        from_map_id: String,
        to_map_id: String,
        tick: u64,
    },
    InterruptRaised {
        agent_id: String,
        need: NeedKind,
        value: f64,
        tick: u64,
    },
    DecisionDiscarded {
        agent_id: String,
        reason: String,
        tick: u64,
    },
    DecisionFailed {
        agent_id: String,
        detail: String,
        tick: u64,
    },
}

impl ActivityEvent {
    pub fn agent_id(&self) -> &str {
        match self {
            ActivityEvent::ActionStarted { agent_id, .. }
            | ActivityEvent::ActionCompleted { agent_id, .. }
            | ActivityEvent::MovementStarted { agent_id, .. }
            | ActivityEvent::MovementCompleted { agent_id, .. }
            | ActivityEvent::MapTransition { agent_id, .. }
            | ActivityEvent::InterruptRaised { agent_id, .. }
            | ActivityEvent::DecisionDiscarded { agent_id, .. }
            | ActivityEvent::DecisionFailed { agent_id, .. } => agent_id,
        }
    }

    pub fn tick(&self) -> u64 {
        match self {
            ActivityEvent::ActionStarted { tick, .. }
            | ActivityEvent::ActionCompleted { tick, .. }
            | ActivityEvent::MovementStarted { tick, .. }
            | ActivityEvent::MovementCompleted { tick, .. }
            | ActivityEvent::MapTransition { tick, .. }
            | ActivityEvent::InterruptRaised { tick, .. }
            | ActivityEvent::DecisionDiscarded { tick, .. }
            | ActivityEvent::DecisionFailed { tick, .. } => *tick,
        }
    }
}

/// Per-agent slice of the subscriber snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: String,
    pub name: String,
    pub kind: AgentKind,
    pub needs: NeedStats,
    pub map_id: String,
    pub node_id: String,
    pub position: Position,
    pub direction: Direction,
    pub navigation: NavigationState,
    pub transitioning: bool,
    pub current_action: Option<ActionState>,
    pub pending_action: Option<PendingAction>,
    pub thought: Option<String>,
    pub in_conversation: bool,
}

impl AgentSnapshot {
    pub fn of(agent: &AgentRecord) -> Self {
        Self {
            id: agent.id.clone(),
            name: agent.name.clone(),
            kind: agent.kind,
            needs: agent.needs,
            map_id: agent.current_map_id.clone(),
            node_id: agent.current_node_id.clone(),
            position: agent.position,
            direction: agent.direction,
            navigation: agent.navigation.clone(),
            transitioning: agent.transition.is_some(),
            current_action: agent.current_action.clone(),
            pending_action: agent.pending_action.clone(),
            thought: agent.thought.clone(),
            in_conversation: agent.in_conversation,
        }
    }
}

/// The serialized world-state snapshot pushed to subscribers once per
/// broadcast window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub schema_version: String,
    pub tick: u64,
    pub time: WorldTime,
    pub current_map_id: String,
    pub paused: bool,
    pub characters: Vec<AgentSnapshot>,
    pub npcs: Vec<AgentSnapshot>,
}

/// Checkpoint payload: everything needed to restore agents after a
/// restart. Maps are static and reload from their own source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedWorldState {
    pub schema_version: String,
    pub tick: u64,
    pub time: WorldTime,
    pub agents: Vec<AgentRecord>,
}
