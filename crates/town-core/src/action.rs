//! Action lifecycle: a pluggable executor owning the timed-action table.
//!
//! The engine mirrors the executor's state into each agent record every
//! tick, so the executor is the single source of truth for what is
//! running and when it ends.

use std::collections::BTreeMap;

use contracts::{ActionCatalog, ActionState, NeedRateOverrides};

/// Everything needed to start an action for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub agent_id: String,
    pub action_id: String,
    pub facility_id: Option<String>,
    pub target_npc_id: Option<String>,
    pub duration_minutes: Option<u32>,
    pub reason: Option<String>,
}

impl ActionRequest {
    pub fn bare(agent_id: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            action_id: action_id.into(),
            facility_id: None,
            target_npc_id: None,
            duration_minutes: None,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCompletion {
    pub agent_id: String,
    pub action_id: String,
}

/// Seam for the action subsystem. The timed implementation below covers
/// the simulation; tests substitute their own to script completions.
pub trait ActionExecutor: Send {
    /// Begin an action. Returns the running state, or `None` when the
    /// action id is unknown or the agent is already busy.
    fn start(&mut self, request: ActionRequest, now_ms: u64) -> Option<ActionState>;

    /// Advance the clock, returning every action that just finished.
    fn tick(&mut self, now_ms: u64) -> Vec<ActionCompletion>;

    /// End an agent's action immediately regardless of its timer.
    fn force_complete(&mut self, agent_id: &str) -> Option<ActionCompletion>;

    /// Drop an agent's action without reporting a completion.
    fn cancel(&mut self, agent_id: &str);

    fn active(&self, agent_id: &str) -> Option<&ActionState>;

    /// Per-minute need rates of the agent's running action, if any.
    fn effects(&self, agent_id: &str) -> Option<NeedRateOverrides>;
}

/// Wall-clock timed executor driven by an injected catalog. Durations are
/// simulated minutes converted through the configured time scale.
pub struct TimedActionExecutor {
    catalog: ActionCatalog,
    ms_per_minute: f64,
    active: BTreeMap<String, ActionState>,
}

impl TimedActionExecutor {
    pub fn new(catalog: ActionCatalog, time_scale: f64) -> Self {
        let scale = if time_scale > 0.0 { time_scale } else { 1.0 };
        Self {
            catalog,
            ms_per_minute: 60_000.0 / scale,
            active: BTreeMap::new(),
        }
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }
}

impl ActionExecutor for TimedActionExecutor {
    fn start(&mut self, request: ActionRequest, now_ms: u64) -> Option<ActionState> {
        if self.active.contains_key(&request.agent_id) {
            return None;
        }
        let spec = self.catalog.action(&request.action_id)?;
        let minutes = request
            .duration_minutes
            .unwrap_or(spec.default_duration_minutes);
        let ends_at_ms = now_ms + (f64::from(minutes) * self.ms_per_minute) as u64;

        let state = ActionState {
            action_id: request.action_id,
            started_at_ms: now_ms,
            ends_at_ms,
            facility_id: request.facility_id,
            target_npc_id: request.target_npc_id,
            duration_minutes: Some(minutes),
            reason: request.reason,
        };
        self.active.insert(request.agent_id, state.clone());
        Some(state)
    }

    fn tick(&mut self, now_ms: u64) -> Vec<ActionCompletion> {
        let done: Vec<String> = self
            .active
            .iter()
            .filter(|(_, state)| now_ms >= state.ends_at_ms)
            .map(|(agent_id, _)| agent_id.clone())
            .collect();
        done.into_iter()
            .filter_map(|agent_id| {
                self.active.remove(&agent_id).map(|state| ActionCompletion {
                    agent_id,
                    action_id: state.action_id,
                })
            })
            .collect()
    }

    fn force_complete(&mut self, agent_id: &str) -> Option<ActionCompletion> {
        self.active.remove(agent_id).map(|state| ActionCompletion {
            agent_id: agent_id.to_string(),
            action_id: state.action_id,
        })
    }

    fn cancel(&mut self, agent_id: &str) {
        self.active.remove(agent_id);
    }

    fn active(&self, agent_id: &str) -> Option<&ActionState> {
        self.active.get(agent_id)
    }

    fn effects(&self, agent_id: &str) -> Option<NeedRateOverrides> {
        let state = self.active.get(agent_id)?;
        self.catalog
            .action(&state.action_id)
            .map(|spec| spec.effects)
    }
}
