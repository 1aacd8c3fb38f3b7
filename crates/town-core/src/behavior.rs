//! Behavior decider seam.
//!
//! The engine never knows where decisions come from; it hands a
//! `DecisionContext` to a `BehaviorDecider` and awaits the verdict
//! without holding the world lock. The scripted decider below is the
//! built-in rule-based implementation used by the CLI and tests;
//! deployments wire an external brain behind the same trait.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use contracts::{
    ActionCatalog, BehaviorDecision, DecisionContext, DecisionTrigger, FacilityInfo, NeedKind,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionError {
    /// The decision backend failed or returned garbage.
    Backend(String),
    Timeout,
}

impl fmt::Display for DecisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(detail) => write!(f, "decision backend error: {detail}"),
            Self::Timeout => write!(f, "decision timed out"),
        }
    }
}

impl std::error::Error for DecisionError {}

pub type DecisionFuture =
    Pin<Box<dyn Future<Output = Result<BehaviorDecision, DecisionError>> + Send>>;

pub trait BehaviorDecider: Send + Sync {
    fn decide(&self, context: DecisionContext) -> DecisionFuture;

    /// Interrupt variant: the action is already fixed by the need that
    /// crossed its threshold; only the facility or partner choice is left
    /// to the decider. Defaults to the plain `decide` path, which sees the
    /// interrupt through the context trigger.
    fn decide_interrupt_facility(
        &self,
        forced_action_id: String,
        context: DecisionContext,
    ) -> DecisionFuture {
        let _ = forced_action_id;
        self.decide(context)
    }
}

/// Rule-based decider: services the lowest unsatisfied need it can find a
/// facility for, idles otherwise. Interrupt triggers force the action and
/// only leave the facility choice here.
pub struct ScriptedDecider {
    catalog: ActionCatalog,
    /// Needs at or above this level are considered satisfied.
    act_below: f64,
}

impl ScriptedDecider {
    pub fn new(catalog: ActionCatalog) -> Self {
        Self {
            catalog,
            act_below: 40.0,
        }
    }

    fn action_for_need(&self, need: NeedKind) -> Option<&str> {
        match need {
            NeedKind::Mood => self
                .catalog
                .action("relax")
                .is_some()
                .then_some("relax"),
            other => self.catalog.interrupt_action(other),
        }
    }

    /// Facility supporting `action_id`, preferring the agent's current map.
    fn facility_for<'a>(
        &self,
        action_id: &str,
        context: &'a DecisionContext,
    ) -> Option<&'a FacilityInfo> {
        let spec = self.catalog.action(action_id)?;
        if spec.facility_tags.is_empty() {
            return None;
        }
        let supports = |facility: &&FacilityInfo| {
            spec.facility_tags
                .iter()
                .any(|tag| facility.tags.contains(tag))
        };
        context
            .facilities
            .iter()
            .filter(supports)
            .find(|facility| facility.map_id == context.current_map_id)
            .or_else(|| context.facilities.iter().find(supports))
    }

    fn act(&self, action_id: &str, context: &DecisionContext, reason: String) -> BehaviorDecision {
        match self.facility_for(action_id, context) {
            Some(facility) => BehaviorDecision::Action {
                action_id: action_id.to_string(),
                target_facility_id: Some(facility.facility_id.clone()),
                target_npc_id: None,
                duration_minutes: None,
                reason,
            },
            None => BehaviorDecision::Idle {
                reason: format!("no facility for {action_id}"),
            },
        }
    }

    fn pick(&self, context: &DecisionContext) -> BehaviorDecision {
        if let DecisionTrigger::Interrupt(need) = context.trigger {
            return match self.catalog.interrupt_action(need) {
                Some(action_id) => {
                    let action_id = action_id.to_string();
                    self.act(&action_id, context, format!("{} critical", need.label()))
                }
                None => BehaviorDecision::Idle {
                    reason: format!("no relief for {}", need.label()),
                },
            };
        }

        let worst = NeedKind::ALL
            .into_iter()
            .map(|need| (need, context.needs.get(need)))
            .filter(|(_, value)| *value < self.act_below)
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match worst {
            Some((need, _)) => match self.action_for_need(need) {
                Some(action_id) => {
                    let action_id = action_id.to_string();
                    self.act(&action_id, context, format!("{} low", need.label()))
                }
                None => BehaviorDecision::Idle {
                    reason: "content".to_string(),
                },
            },
            None => BehaviorDecision::Idle {
                reason: "content".to_string(),
            },
        }
    }
}

impl BehaviorDecider for ScriptedDecider {
    fn decide(&self, context: DecisionContext) -> DecisionFuture {
        let decision = self.pick(&context);
        Box::pin(std::future::ready(Ok(decision)))
    }

    fn decide_interrupt_facility(
        &self,
        forced_action_id: String,
        context: DecisionContext,
    ) -> DecisionFuture {
        let decision = self.act(
            &forced_action_id,
            &context,
            format!("urgent {forced_action_id}"),
        );
        Box::pin(std::future::ready(Ok(decision)))
    }
}
