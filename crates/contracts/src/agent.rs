//! Mutable agent records: needs, navigation state, action state, and the
//! deferred-intent bookkeeping the orchestrator relies on.

use serde::{Deserialize, Serialize};

use crate::world::{Direction, Position};

/// The five simulated needs, 0–100 where 100 is fully satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeedStats {
    pub satiety: f64,
    pub energy: f64,
    pub hygiene: f64,
    pub mood: f64,
    pub bladder: f64,
}

impl Default for NeedStats {
    fn default() -> Self {
        Self {
            satiety: 100.0,
            energy: 100.0,
            hygiene: 100.0,
            mood: 100.0,
            bladder: 100.0,
        }
    }
}

impl NeedStats {
    pub fn get(&self, kind: NeedKind) -> f64 {
        match kind {
            NeedKind::Satiety => self.satiety,
            NeedKind::Energy => self.energy,
            NeedKind::Hygiene => self.hygiene,
            NeedKind::Mood => self.mood,
            NeedKind::Bladder => self.bladder,
        }
    }

    pub fn set(&mut self, kind: NeedKind, value: f64) {
        let clamped = value.clamp(0.0, 100.0);
        match kind {
            NeedKind::Satiety => self.satiety = clamped,
            NeedKind::Energy => self.energy = clamped,
            NeedKind::Hygiene => self.hygiene = clamped,
            NeedKind::Mood => self.mood = clamped,
            NeedKind::Bladder => self.bladder = clamped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedKind {
    Satiety,
    Energy,
    Hygiene,
    Mood,
    Bladder,
}

impl NeedKind {
    pub const ALL: [NeedKind; 5] = [
        NeedKind::Satiety,
        NeedKind::Energy,
        NeedKind::Hygiene,
        NeedKind::Mood,
        NeedKind::Bladder,
    ];

    /// Interrupt priority order. Mood never interrupts and is absent here.
    pub const INTERRUPT_PRIORITY: [NeedKind; 4] = [
        NeedKind::Bladder,
        NeedKind::Satiety,
        NeedKind::Energy,
        NeedKind::Hygiene,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            NeedKind::Satiety => "satiety",
            NeedKind::Energy => "energy",
            NeedKind::Hygiene => "hygiene",
            NeedKind::Mood => "mood",
            NeedKind::Bladder => "bladder",
        }
    }
}

/// Per-minute rates reported by a running action. A `Some` entry replaces
/// the baseline decay for that need while the action is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NeedRateOverrides {
    pub satiety: Option<f64>,
    pub energy: Option<f64>,
    pub hygiene: Option<f64>,
    pub mood: Option<f64>,
    pub bladder: Option<f64>,
}

impl NeedRateOverrides {
    pub fn get(&self, kind: NeedKind) -> Option<f64> {
        match kind {
            NeedKind::Satiety => self.satiety,
            NeedKind::Energy => self.energy,
            NeedKind::Hygiene => self.hygiene,
            NeedKind::Mood => self.mood,
            NeedKind::Bladder => self.bladder,
        }
    }
}

/// Single-map movement state. `is_moving == false` with an empty path is
/// the rest state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    pub is_moving: bool,
    pub path: Vec<String>,
    pub current_path_index: usize,
    /// Progress along the current edge, 0 to 1.
    pub progress: f64,
    pub start_position: Position,
    pub target_position: Position,
}

impl NavigationState {
    pub fn clear(&mut self) {
        *self = NavigationState::default();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub map_id: String,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub segments: Vec<RouteSegment>,
}

/// Multi-map overlay on top of `NavigationState`. While `is_active`, either
/// navigation or a map transition must also be in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossMapNavigation {
    pub is_active: bool,
    pub route: Route,
    pub current_segment_index: usize,
    pub target_map_id: String,
    pub target_node_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPhase {
    FadeOut,
    FadeIn,
}

/// Fade choreography entered when an agent steps through an entrance. At
/// the fade-out/fade-in boundary the agent's map, node, and position swap
/// to the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapTransition {
    pub phase: TransitionPhase,
    /// Progress of the current ramp, 0 to 1.
    pub progress: f64,
    pub destination_map_id: String,
    pub destination_node_id: String,
}

/// A running timed action. At most one per agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionState {
    pub action_id: String,
    pub started_at_ms: u64,
    pub ends_at_ms: u64,
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(default)]
    pub target_npc_id: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Intent to act once navigation arrives. Cleared the instant the action
/// starts or the agent gives up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub action_id: String,
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(default)]
    pub target_npc_id: Option<String>,
    pub facility_map_id: String,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Character,
    Npc,
}

/// Hour-keyed entry in an agent's daily routine, surfaced to the decision
/// context so external deciders can honor it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub hour: u8,
    pub activity: String,
}

/// The full mutable record for one character or NPC. Created at world init
/// or restored from a checkpoint; mutated only through the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    pub kind: AgentKind,
    pub needs: NeedStats,
    pub current_map_id: String,
    pub current_node_id: String,
    pub position: Position,
    pub direction: Direction,
    pub navigation: NavigationState,
    #[serde(default)]
    pub cross_map_navigation: Option<CrossMapNavigation>,
    #[serde(default)]
    pub transition: Option<MapTransition>,
    #[serde(default)]
    pub current_action: Option<ActionState>,
    #[serde(default)]
    pub pending_action: Option<PendingAction>,
    /// Completed-action counter driving periodic forced wandering.
    #[serde(default)]
    pub action_counter: u32,
    #[serde(default)]
    pub in_conversation: bool,
    /// Idle display indicator set by idle decisions.
    #[serde(default)]
    pub thought: Option<String>,
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
}

impl AgentRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: AgentKind,
        map_id: impl Into<String>,
        node_id: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            needs: NeedStats::default(),
            current_map_id: map_id.into(),
            current_node_id: node_id.into(),
            position,
            direction: Direction::Down,
            navigation: NavigationState::default(),
            cross_map_navigation: None,
            transition: None,
            current_action: None,
            pending_action: None,
            action_counter: 0,
            in_conversation: false,
            thought: None,
            schedule: Vec::new(),
        }
    }

    /// True while single-map movement, a transition, or a cross-map route
    /// is in progress.
    pub fn is_navigating(&self) -> bool {
        self.navigation.is_moving
            || self.transition.is_some()
            || self
                .cross_map_navigation
                .as_ref()
                .is_some_and(|route| route.is_active)
    }

    /// Idle means nothing is meaningfully driving the agent: no action, no
    /// navigation, no conversation.
    pub fn is_idle(&self) -> bool {
        self.current_action.is_none() && !self.is_navigating() && !self.in_conversation
    }
}
