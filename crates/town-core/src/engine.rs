//! The simulation engine.
//!
//! `tick` runs the single-threaded pipeline: clock sync, need decay,
//! action completions, navigation, arrival follow-ups, and the idle scan
//! that feeds the decision orchestrator. Decisions come back through
//! `begin_decision`/`resolve_decision`, both called under the engine
//! lock; the await on the decider itself happens elsewhere, without the
//! lock.
//!
//! Single-flight: `pending` maps each deciding agent to the epoch of the
//! flight that owns the marker. Interrupts bump the epoch and take the
//! marker over, so the superseded flight discards its result on arrival
//! and never frees the agent for a third concurrent flight.

use std::collections::{BTreeMap, BTreeSet};

use contracts::{
    ActionCatalog, ActivityEvent, BehaviorDecision, DecisionContext, DecisionTrigger, NearbyAgent,
    NeedKind, PendingAction, PersistedWorldState,
};

use crate::action::{ActionExecutor, ActionRequest};
use crate::behavior::DecisionError;
use crate::events::EventBus;
use crate::needs::apply_decay;
use crate::world::WorldState;

const HISTORY_CAPACITY: usize = 64;
const HISTORY_PER_AGENT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRequest {
    pub agent_id: String,
    pub trigger: DecisionTrigger,
}

#[derive(Default)]
pub struct TickOutput {
    pub requests: Vec<DecisionRequest>,
    pub checkpoint: Option<PersistedWorldState>,
}

pub struct SimEngine {
    world: WorldState,
    executor: Box<dyn ActionExecutor>,
    catalog: ActionCatalog,
    events: EventBus,
    pending: BTreeMap<String, u64>,
    epoch: BTreeMap<String, u64>,
    cooldown_until: BTreeMap<String, u64>,
    attempted: BTreeSet<String>,
    prev_navigating: BTreeSet<String>,
}

impl SimEngine {
    pub fn new(world: WorldState, executor: Box<dyn ActionExecutor>, catalog: ActionCatalog) -> Self {
        Self {
            world,
            executor,
            catalog,
            events: EventBus::new(HISTORY_CAPACITY),
            pending: BTreeMap::new(),
            epoch: BTreeMap::new(),
            cooldown_until: BTreeMap::new(),
            attempted: BTreeSet::new(),
            prev_navigating: BTreeSet::new(),
        }
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    /// Load a checkpoint and drop all in-flight bookkeeping.
    pub fn restore(&mut self, state: PersistedWorldState) {
        self.world.restore(state);
        self.pending.clear();
        self.epoch.clear();
        self.cooldown_until.clear();
        self.attempted.clear();
        self.prev_navigating.clear();
    }

    // -----------------------------------------------------------------------
    // Tick pipeline
    // -----------------------------------------------------------------------

    pub fn tick(&mut self, now_ms: u64, dt_secs: f64) -> TickOutput {
        self.world.sync_clock(now_ms);
        if self.world.paused() {
            self.events.publish_snapshot(self.world.snapshot());
            return TickOutput::default();
        }

        self.world.advance_tick();
        let tick = self.world.tick();
        let cfg = self.world.config().clone();
        let mut requests: Vec<DecisionRequest> = Vec::new();

        // Need decay and interrupt edges.
        let elapsed = self.world.clock().sim_minutes(dt_secs);
        let ids: Vec<String> = self.world.agents().keys().cloned().collect();
        for agent_id in &ids {
            let effects = self.executor.effects(agent_id);
            let Some(agent) = self.world.agent_mut(agent_id) else {
                continue;
            };
            let Some(hit) = apply_decay(
                agent,
                elapsed,
                &cfg.decay_per_minute,
                effects.as_ref(),
                cfg.interrupt_threshold,
            ) else {
                continue;
            };
            self.events.publish(ActivityEvent::InterruptRaised {
                agent_id: agent_id.clone(),
                need: hit.need,
                value: hit.value,
                tick,
            });
            // Interrupts bypass the single-flight gate; bumping the epoch
            // invalidates whatever is already in flight and hands the
            // marker to the new flight.
            let entry = self.epoch.entry(agent_id.clone()).or_insert(0);
            *entry += 1;
            let epoch = *entry;
            self.pending.insert(agent_id.clone(), epoch);
            requests.push(DecisionRequest {
                agent_id: agent_id.clone(),
                trigger: DecisionTrigger::Interrupt(hit.need),
            });
        }

        // Action completions.
        for done in self.executor.tick(now_ms) {
            let placeholder = done.action_id == cfg.thinking_action_id;
            let Some(agent) = self.world.agent_mut(&done.agent_id) else {
                continue;
            };
            agent.current_action = None;
            if placeholder {
                // The thinking placeholder timing out is not a completion.
                continue;
            }
            agent.action_counter = agent.action_counter.saturating_add(1);
            self.events.publish(ActivityEvent::ActionCompleted {
                agent_id: done.agent_id.clone(),
                action_id: done.action_id,
                tick,
            });
            if self.claim_flight(&done.agent_id) {
                requests.push(DecisionRequest {
                    agent_id: done.agent_id,
                    trigger: DecisionTrigger::Completion,
                });
            }
        }

        // Mirror executor state into the records subscribers see.
        for agent_id in &ids {
            let active = self.executor.active(agent_id).cloned();
            if let Some(agent) = self.world.agent_mut(agent_id) {
                agent.current_action = active;
            }
        }

        let mut nav_events = Vec::new();
        self.world.tick_navigation(dt_secs, &mut nav_events);
        for event in nav_events {
            self.events.publish(event);
        }

        // Navigation completion is edge-detected against the previous tick.
        let now_navigating: BTreeSet<String> = self
            .world
            .agents()
            .values()
            .filter(|agent| agent.is_navigating())
            .map(|agent| agent.id.clone())
            .collect();
        let arrived: Vec<String> = self
            .prev_navigating
            .difference(&now_navigating)
            .cloned()
            .collect();
        self.prev_navigating = now_navigating;
        for agent_id in arrived {
            self.after_navigation(&agent_id, now_ms, tick, &mut requests);
        }

        // Idle scan: anything with no work and no in-flight decision asks
        // for one, subject to its retry cooldown.
        for agent_id in &ids {
            if self.pending.contains_key(agent_id) {
                continue;
            }
            if self
                .cooldown_until
                .get(agent_id)
                .is_some_and(|until| now_ms < *until)
            {
                continue;
            }
            let Some(agent) = self.world.agent(agent_id) else {
                continue;
            };
            if agent.is_idle() && agent.pending_action.is_none() {
                let trigger = if self.attempted.insert(agent_id.clone()) {
                    DecisionTrigger::Bootstrap
                } else {
                    DecisionTrigger::Scheduled
                };
                self.claim_flight(agent_id);
                requests.push(DecisionRequest {
                    agent_id: agent_id.clone(),
                    trigger,
                });
            }
        }

        if cfg.broadcast_every_ticks > 0 && tick % cfg.broadcast_every_ticks == 0 {
            self.events.publish_snapshot(self.world.snapshot());
        }
        let checkpoint = (cfg.snapshot_every_ticks > 0 && tick % cfg.snapshot_every_ticks == 0)
            .then(|| self.world.persisted());

        TickOutput {
            requests,
            checkpoint,
        }
    }

    /// An agent's navigation just ended. Resume its deferred action or ask
    /// for a fresh decision.
    fn after_navigation(
        &mut self,
        agent_id: &str,
        now_ms: u64,
        tick: u64,
        requests: &mut Vec<DecisionRequest>,
    ) {
        let Some(agent) = self.world.agent(agent_id) else {
            return;
        };
        let Some(pending) = agent.pending_action.clone() else {
            if self.claim_flight(agent_id) {
                requests.push(DecisionRequest {
                    agent_id: agent_id.to_string(),
                    trigger: DecisionTrigger::Completion,
                });
            }
            return;
        };
        let map_id = agent.current_map_id.clone();
        let node_id = agent.current_node_id.clone();

        if map_id != pending.facility_map_id {
            // Route aborted mid-journey; try again from here.
            match self
                .world
                .navigate_to_map(agent_id, &pending.facility_map_id, None)
            {
                Ok(_) => {}
                Err(err) => self.give_up(agent_id, &err.to_string(), now_ms, tick, true),
            }
            return;
        }

        let adjacent = match pending.facility_id.as_deref() {
            Some(facility_id) => {
                let Some(agent) = self.world.agent(agent_id) else {
                    return;
                };
                self.world.facility_adjacent(agent, facility_id)
            }
            None => true,
        };
        if adjacent {
            self.start_pending(agent_id, pending, now_ms, tick);
            return;
        }

        let next_node = pending
            .facility_id
            .as_deref()
            .and_then(|facility_id| self.world.node_near_facility(&map_id, facility_id));
        match next_node {
            Some(next) if next != node_id => match self.world.navigate_to_node(agent_id, &next) {
                Ok(true) => self.events.publish(ActivityEvent::MovementStarted {
                    agent_id: agent_id.to_string(),
                    map_id,
                    target_node_id: next,
                    tick,
                }),
                Ok(false) | Err(_) => {
                    self.give_up(agent_id, "facility unreachable", now_ms, tick, true)
                }
            },
            _ => self.give_up(agent_id, "facility unreachable", now_ms, tick, true),
        }
    }

    /// Hand a deferred action to the executor.
    fn start_pending(&mut self, agent_id: &str, pending: PendingAction, now_ms: u64, tick: u64) {
        let request = ActionRequest {
            agent_id: agent_id.to_string(),
            action_id: pending.action_id.clone(),
            facility_id: pending.facility_id.clone(),
            target_npc_id: pending.target_npc_id.clone(),
            duration_minutes: pending.duration_minutes,
            reason: pending.reason.clone(),
        };
        match self.executor.start(request, now_ms) {
            Some(state) => {
                if let Some(agent) = self.world.agent_mut(agent_id) {
                    agent.pending_action = None;
                    agent.current_action = Some(state);
                }
                self.events.publish(ActivityEvent::ActionStarted {
                    agent_id: agent_id.to_string(),
                    action_id: pending.action_id,
                    facility_id: pending.facility_id,
                    tick,
                });
            }
            None => self.give_up(agent_id, "action rejected", now_ms, tick, false),
        }
    }

    fn give_up(&mut self, agent_id: &str, detail: &str, now_ms: u64, tick: u64, stuck: bool) {
        let cfg = self.world.config();
        let delay = if stuck {
            cfg.stuck_retry_ms
        } else {
            cfg.retry_short_ms
        };
        if let Some(agent) = self.world.agent_mut(agent_id) {
            agent.pending_action = None;
        }
        self.events.publish(ActivityEvent::DecisionFailed {
            agent_id: agent_id.to_string(),
            detail: detail.to_string(),
            tick,
        });
        self.cooldown(agent_id, now_ms, delay);
    }

    fn cooldown(&mut self, agent_id: &str, now_ms: u64, delay_ms: u64) {
        self.cooldown_until
            .insert(agent_id.to_string(), now_ms + delay_ms);
    }

    /// Claim the flight marker for the agent at its current epoch. Returns
    /// false when another flight already owns it.
    fn claim_flight(&mut self, agent_id: &str) -> bool {
        if self.pending.contains_key(agent_id) {
            return false;
        }
        let epoch = self.epoch.get(agent_id).copied().unwrap_or(0);
        self.pending.insert(agent_id.to_string(), epoch);
        true
    }

    // -----------------------------------------------------------------------
    // Decision lifecycle (called under the engine lock)
    // -----------------------------------------------------------------------

    /// Prepare a decision: forced wandering may resolve it on the spot, in
    /// which case no context is returned and the decider is never asked.
    /// Otherwise the thinking placeholder starts and the context snapshot
    /// plus the agent's current epoch come back.
    pub fn begin_decision(
        &mut self,
        agent_id: &str,
        trigger: DecisionTrigger,
        now_ms: u64,
    ) -> Option<(DecisionContext, u64)> {
        let Some(agent) = self.world.agent(agent_id) else {
            self.pending.remove(agent_id);
            return None;
        };
        let cfg = self.world.config().clone();
        let counter = agent.action_counter;
        let idle = agent.is_idle();
        // A critically low need always goes to the decider; wandering can
        // wait until the agent has been seen to.
        let needs = agent.needs;
        let critical = NeedKind::ALL
            .into_iter()
            .any(|kind| needs.get(kind) < cfg.interrupt_threshold);

        if !matches!(trigger, DecisionTrigger::Interrupt(_))
            && !critical
            && cfg.wander_after_actions > 0
            && counter >= cfg.wander_after_actions
        {
            self.pending.remove(agent_id);
            self.force_wander(agent_id, now_ms);
            return None;
        }

        if idle && self.executor.active(agent_id).is_none() {
            if let Some(state) = self
                .executor
                .start(ActionRequest::bare(agent_id, &cfg.thinking_action_id), now_ms)
            {
                if let Some(agent) = self.world.agent_mut(agent_id) {
                    agent.current_action = Some(state);
                }
            }
        }

        let epoch = self.epoch.get(agent_id).copied().unwrap_or(0);
        let context = self.build_context(agent_id, trigger)?;
        Some((context, epoch))
    }

    /// Apply (or discard) a finished decision.
    pub fn resolve_decision(
        &mut self,
        agent_id: &str,
        trigger: DecisionTrigger,
        epoch: u64,
        result: Result<BehaviorDecision, DecisionError>,
        now_ms: u64,
    ) {
        // Only the flight that owns the marker may clear it; a superseded
        // flight leaves the agent reserved for its replacement.
        if self.pending.get(agent_id) == Some(&epoch) {
            self.pending.remove(agent_id);
        }
        let cfg = self.world.config().clone();
        let tick = self.world.tick();

        if self
            .executor
            .active(agent_id)
            .is_some_and(|state| state.action_id == cfg.thinking_action_id)
        {
            self.executor.force_complete(agent_id);
            if let Some(agent) = self.world.agent_mut(agent_id) {
                agent.current_action = None;
            }
        }

        let current_epoch = self.epoch.get(agent_id).copied().unwrap_or(0);
        if epoch != current_epoch {
            self.events.publish(ActivityEvent::DecisionDiscarded {
                agent_id: agent_id.to_string(),
                reason: "superseded by interrupt".to_string(),
                tick,
            });
            return;
        }

        let decision = match result {
            Ok(decision) => decision,
            Err(err) => {
                self.events.publish(ActivityEvent::DecisionFailed {
                    agent_id: agent_id.to_string(),
                    detail: err.to_string(),
                    tick,
                });
                self.cooldown(agent_id, now_ms, cfg.retry_short_ms);
                return;
            }
        };

        if matches!(trigger, DecisionTrigger::Interrupt(_)) {
            // Interrupts preempt whatever the agent was doing. An agent
            // caught mid-fade lands on the far side first, so the new plan
            // is computed against the map it actually ends up on.
            self.executor.cancel(agent_id);
            let mut transition_events = Vec::new();
            self.world
                .finish_transition(agent_id, &mut transition_events);
            for event in transition_events {
                self.events.publish(event);
            }
            if let Some(agent) = self.world.agent_mut(agent_id) {
                agent.current_action = None;
                agent.pending_action = None;
                agent.navigation.clear();
                agent.cross_map_navigation = None;
            }
        } else {
            let still_idle = self
                .world
                .agent(agent_id)
                .map(|agent| agent.is_idle() && agent.pending_action.is_none())
                .unwrap_or(false);
            if !still_idle {
                self.events.publish(ActivityEvent::DecisionDiscarded {
                    agent_id: agent_id.to_string(),
                    reason: "agent state changed while deciding".to_string(),
                    tick,
                });
                return;
            }
        }

        self.apply_decision(agent_id, trigger, decision, now_ms);
    }

    fn apply_decision(
        &mut self,
        agent_id: &str,
        trigger: DecisionTrigger,
        decision: BehaviorDecision,
        now_ms: u64,
    ) {
        let cfg = self.world.config().clone();
        let tick = self.world.tick();

        match decision {
            BehaviorDecision::Idle { reason } => {
                if let Some(agent) = self.world.agent_mut(agent_id) {
                    agent.thought = Some(reason);
                }
                // A forced interrupt decision that resolved to nothing gets
                // the longer leash before the next attempt.
                let delay = if matches!(trigger, DecisionTrigger::Interrupt(_)) {
                    cfg.stuck_retry_ms
                } else {
                    cfg.idle_retry_ms
                };
                self.cooldown(agent_id, now_ms, delay);
            }

            BehaviorDecision::Move {
                target_map_id,
                target_node_id,
                ..
            } => {
                if let Some(agent) = self.world.agent_mut(agent_id) {
                    agent.thought = None;
                }
                let current_map = match self.world.agent(agent_id) {
                    Some(agent) => agent.current_map_id.clone(),
                    None => return,
                };
                let result = match (target_map_id, target_node_id.as_deref()) {
                    (Some(map_id), node) => self.world.navigate_to_map(agent_id, &map_id, node),
                    (None, Some(node_id)) => self.world.navigate_to_node(agent_id, node_id),
                    (None, None) => {
                        self.give_up(agent_id, "move without a target", now_ms, tick, false);
                        return;
                    }
                };
                match result {
                    Ok(true) => {
                        let target = target_node_id.unwrap_or_default();
                        self.events.publish(ActivityEvent::MovementStarted {
                            agent_id: agent_id.to_string(),
                            map_id: current_map,
                            target_node_id: target,
                            tick,
                        });
                    }
                    // Already there; nothing to do until the next nudge.
                    Ok(false) => self.cooldown(agent_id, now_ms, cfg.idle_retry_ms),
                    Err(err) => {
                        self.give_up(agent_id, &err.to_string(), now_ms, tick, false);
                    }
                }
            }

            BehaviorDecision::Action {
                action_id,
                target_facility_id,
                target_npc_id,
                duration_minutes,
                reason,
            } => {
                if let Some(agent) = self.world.agent_mut(agent_id) {
                    agent.thought = None;
                }
                let Some(facility_id) = target_facility_id else {
                    if let Some(npc_id) = target_npc_id {
                        // Aimed at another agent: walk over first if needed.
                        self.approach_agent(
                            agent_id,
                            action_id,
                            npc_id,
                            duration_minutes,
                            reason,
                            now_ms,
                            tick,
                        );
                        return;
                    }
                    // Facility-free action; runs right where the agent is.
                    let pending = PendingAction {
                        action_id,
                        facility_id: None,
                        target_npc_id: None,
                        facility_map_id: match self.world.agent(agent_id) {
                            Some(agent) => agent.current_map_id.clone(),
                            None => return,
                        },
                        duration_minutes,
                        reason: Some(reason),
                    };
                    self.start_pending(agent_id, pending, now_ms, tick);
                    return;
                };

                let Some((facility_map_id, _)) = self.world.find_facility(&facility_id) else {
                    self.give_up(
                        agent_id,
                        &format!("unknown facility {facility_id}"),
                        now_ms,
                        tick,
                        false,
                    );
                    return;
                };

                let pending = PendingAction {
                    action_id,
                    facility_id: Some(facility_id.clone()),
                    target_npc_id,
                    facility_map_id: facility_map_id.clone(),
                    duration_minutes,
                    reason: Some(reason),
                };

                let (current_map, adjacent) = match self.world.agent(agent_id) {
                    Some(agent) => (
                        agent.current_map_id.clone(),
                        self.world.facility_adjacent(agent, &facility_id),
                    ),
                    None => return,
                };
                if current_map == facility_map_id && adjacent {
                    self.start_pending(agent_id, pending, now_ms, tick);
                    return;
                }

                // Walk there first, act on arrival.
                if let Some(agent) = self.world.agent_mut(agent_id) {
                    agent.pending_action = Some(pending);
                }
                let target_node = self
                    .world
                    .node_near_facility(&facility_map_id, &facility_id);
                let started = if current_map == facility_map_id {
                    match target_node.as_deref() {
                        Some(node) => self.world.navigate_to_node(agent_id, node),
                        None => Ok(false),
                    }
                } else {
                    self.world
                        .navigate_to_map(agent_id, &facility_map_id, target_node.as_deref())
                };
                match started {
                    Ok(true) => self.events.publish(ActivityEvent::MovementStarted {
                        agent_id: agent_id.to_string(),
                        map_id: facility_map_id,
                        target_node_id: target_node.unwrap_or_default(),
                        tick,
                    }),
                    Ok(false) => {
                        // Standing on the nearest node yet not adjacent.
                        self.give_up(agent_id, "facility unreachable", now_ms, tick, true);
                    }
                    Err(err) => {
                        if matches!(trigger, DecisionTrigger::Interrupt(_)) {
                            // Last resort for a critical need: head for the
                            // fallback map and retry later.
                            if let Some(agent) = self.world.agent_mut(agent_id) {
                                agent.pending_action = None;
                            }
                            let _ =
                                self.world
                                    .navigate_to_map(agent_id, &cfg.fallback_map_id, None);
                            self.events.publish(ActivityEvent::DecisionFailed {
                                agent_id: agent_id.to_string(),
                                detail: err.to_string(),
                                tick,
                            });
                            self.cooldown(agent_id, now_ms, cfg.stuck_retry_ms);
                        } else {
                            self.give_up(agent_id, &err.to_string(), now_ms, tick, false);
                        }
                    }
                }
            }
        }
    }

    /// An action aimed at another agent: start in place when already next
    /// to them, otherwise park the action and walk toward their node.
    #[allow(clippy::too_many_arguments)]
    fn approach_agent(
        &mut self,
        agent_id: &str,
        action_id: String,
        npc_id: String,
        duration_minutes: Option<u32>,
        reason: String,
        now_ms: u64,
        tick: u64,
    ) {
        let Some(target) = self.world.agent(&npc_id).cloned() else {
            self.give_up(
                agent_id,
                &format!("unknown agent {npc_id}"),
                now_ms,
                tick,
                false,
            );
            return;
        };
        let pending = PendingAction {
            action_id,
            facility_id: None,
            target_npc_id: Some(npc_id),
            facility_map_id: target.current_map_id.clone(),
            duration_minutes,
            reason: Some(reason),
        };

        let (current_map, adjacent) = match self.world.agent(agent_id) {
            Some(agent) => (
                agent.current_map_id.clone(),
                self.world.agent_adjacent(agent, &target),
            ),
            None => return,
        };
        if adjacent {
            self.start_pending(agent_id, pending, now_ms, tick);
            return;
        }

        if let Some(agent) = self.world.agent_mut(agent_id) {
            agent.pending_action = Some(pending);
        }
        let target_node = self.world.node_near_agent(agent_id, &target);
        let started = if current_map == target.current_map_id {
            match target_node.as_deref() {
                Some(node) => self.world.navigate_to_node(agent_id, node),
                None => Ok(false),
            }
        } else {
            self.world
                .navigate_to_map(agent_id, &target.current_map_id, target_node.as_deref())
        };
        match started {
            Ok(true) => self.events.publish(ActivityEvent::MovementStarted {
                agent_id: agent_id.to_string(),
                map_id: target.current_map_id,
                target_node_id: target_node.unwrap_or_default(),
                tick,
            }),
            Ok(false) => {
                // Already as close as the walk graph allows.
                if let Some(pending) = self
                    .world
                    .agent_mut(agent_id)
                    .and_then(|agent| agent.pending_action.take())
                {
                    self.start_pending(agent_id, pending, now_ms, tick);
                }
            }
            Err(err) => self.give_up(agent_id, &err.to_string(), now_ms, tick, false),
        }
    }

    /// Break routine: after enough completed actions the agent is marched
    /// to a deterministic pseudo-random nearby map before the decider gets
    /// another say.
    fn force_wander(&mut self, agent_id: &str, now_ms: u64) {
        let cfg = self.world.config().clone();
        let tick = self.world.tick();
        let Some(agent) = self.world.agent(agent_id) else {
            return;
        };
        let current_map = agent.current_map_id.clone();
        let options = self.world.reachable_maps(&current_map, cfg.wander_hop_radius);

        if let Some(agent) = self.world.agent_mut(agent_id) {
            agent.action_counter = 0;
            agent.thought = None;
        }
        if options.is_empty() {
            self.cooldown(agent_id, now_ms, cfg.idle_retry_ms);
            return;
        }

        let roll = mix_seed(cfg.seed ^ tick ^ fold_id(agent_id));
        let target = options[(roll % options.len() as u64) as usize].clone();
        let spawn_node = self
            .world
            .map(&target)
            .map(|map| map.spawn_node_id.clone())
            .unwrap_or_default();
        match self.world.navigate_to_map(agent_id, &target, None) {
            Ok(_) => self.events.publish(ActivityEvent::MovementStarted {
                agent_id: agent_id.to_string(),
                map_id: target,
                target_node_id: spawn_node,
                tick,
            }),
            Err(err) => {
                tracing::warn!(%agent_id, %target, %err, "wander failed");
                self.cooldown(agent_id, now_ms, cfg.retry_short_ms);
            }
        }
    }

    fn build_context(&self, agent_id: &str, trigger: DecisionTrigger) -> Option<DecisionContext> {
        let agent = self.world.agent(agent_id)?;
        let cfg = self.world.config();
        let facility = self.world.facility_at(agent);

        let mut available = match facility.as_ref() {
            Some(facility) => self.catalog.actions_for_tags(&facility.tags),
            None => Vec::new(),
        };
        for (action_id, spec) in &self.catalog.actions {
            if spec.facility_tags.is_empty() && action_id != &cfg.thinking_action_id {
                available.push(action_id.clone());
            }
        }

        let nearby_agents = self
            .world
            .agents()
            .values()
            .filter(|other| other.id != agent.id && other.current_map_id == agent.current_map_id)
            .map(|other| NearbyAgent {
                agent_id: other.id.clone(),
                name: other.name.clone(),
                busy: !other.is_idle(),
            })
            .collect();

        Some(DecisionContext {
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone(),
            needs: agent.needs,
            time: self.world.time(),
            current_map_id: agent.current_map_id.clone(),
            current_facility_id: facility.map(|facility| facility.facility_id),
            schedule: agent.schedule.clone(),
            available_actions: available,
            nearby_agents,
            facilities: self.world.all_facilities(),
            reachable_maps: self
                .world
                .reachable_maps(&agent.current_map_id, cfg.wander_hop_radius),
            recent_history: self.events.recent_for(agent_id, HISTORY_PER_AGENT),
            trigger,
        })
    }
}

fn mix_seed(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn fold_id(id: &str) -> u64 {
    id.bytes()
        .fold(0u64, |acc, byte| acc.wrapping_mul(131).wrapping_add(u64::from(byte)))
}
