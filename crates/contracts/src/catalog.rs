//! The action catalog: a pure, explicitly-injected lookup table mapping
//! abstract action ids to facility tags, default durations, and per-minute
//! need effects, plus the interrupt-need → action mapping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agent::{NeedKind, NeedRateOverrides};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Facility tags that support this action. Empty means the action needs
    /// no facility (e.g. the thinking placeholder).
    #[serde(default)]
    pub facility_tags: Vec<String>,
    pub default_duration_minutes: u32,
    /// Per-minute need rates while the action runs. Replaces baseline decay
    /// for the needs it names.
    #[serde(default)]
    pub effects: NeedRateOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCatalog {
    pub actions: BTreeMap<String, ActionSpec>,
    /// Action forced when the given need crosses the interrupt threshold.
    pub interrupt_actions: BTreeMap<NeedKind, String>,
}

impl ActionCatalog {
    pub fn action(&self, action_id: &str) -> Option<&ActionSpec> {
        self.actions.get(action_id)
    }

    pub fn interrupt_action(&self, need: NeedKind) -> Option<&str> {
        self.interrupt_actions.get(&need).map(String::as_str)
    }

    /// Action ids whose tag requirements are satisfied by `tags`.
    pub fn actions_for_tags(&self, tags: &[String]) -> Vec<String> {
        self.actions
            .iter()
            .filter(|(_, spec)| {
                !spec.facility_tags.is_empty()
                    && spec.facility_tags.iter().any(|tag| tags.contains(tag))
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// A small default catalog covering the five needs. Real deployments
    /// inject their own table; tests and the CLI use this one.
    pub fn standard() -> Self {
        let mut actions = BTreeMap::new();
        actions.insert(
            "eat".to_string(),
            ActionSpec {
                facility_tags: vec!["food".to_string()],
                default_duration_minutes: 30,
                effects: NeedRateOverrides {
                    satiety: Some(3.0),
                    ..NeedRateOverrides::default()
                },
            },
        );
        actions.insert(
            "sleep".to_string(),
            ActionSpec {
                facility_tags: vec!["bed".to_string()],
                default_duration_minutes: 240,
                effects: NeedRateOverrides {
                    energy: Some(0.5),
                    ..NeedRateOverrides::default()
                },
            },
        );
        actions.insert(
            "shower".to_string(),
            ActionSpec {
                facility_tags: vec!["bath".to_string()],
                default_duration_minutes: 20,
                effects: NeedRateOverrides {
                    hygiene: Some(5.0),
                    ..NeedRateOverrides::default()
                },
            },
        );
        actions.insert(
            "use_toilet".to_string(),
            ActionSpec {
                facility_tags: vec!["toilet".to_string()],
                default_duration_minutes: 5,
                effects: NeedRateOverrides {
                    bladder: Some(20.0),
                    ..NeedRateOverrides::default()
                },
            },
        );
        actions.insert(
            "relax".to_string(),
            ActionSpec {
                facility_tags: vec!["leisure".to_string()],
                default_duration_minutes: 45,
                effects: NeedRateOverrides {
                    mood: Some(1.5),
                    ..NeedRateOverrides::default()
                },
            },
        );
        actions.insert(
            "chat".to_string(),
            ActionSpec {
                facility_tags: Vec::new(),
                default_duration_minutes: 10,
                effects: NeedRateOverrides {
                    mood: Some(2.0),
                    ..NeedRateOverrides::default()
                },
            },
        );
        actions.insert(
            "think".to_string(),
            ActionSpec {
                facility_tags: Vec::new(),
                default_duration_minutes: 1,
                effects: NeedRateOverrides::default(),
            },
        );

        let mut interrupt_actions = BTreeMap::new();
        interrupt_actions.insert(NeedKind::Bladder, "use_toilet".to_string());
        interrupt_actions.insert(NeedKind::Satiety, "eat".to_string());
        interrupt_actions.insert(NeedKind::Energy, "sleep".to_string());
        interrupt_actions.insert(NeedKind::Hygiene, "shower".to_string());

        Self {
            actions,
            interrupt_actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_covers_interruptible_needs() {
        let catalog = ActionCatalog::standard();
        for need in NeedKind::INTERRUPT_PRIORITY {
            let action_id = catalog
                .interrupt_action(need)
                .unwrap_or_else(|| panic!("no interrupt action for {need:?}"));
            assert!(catalog.action(action_id).is_some());
        }
    }

    #[test]
    fn actions_for_tags_matches_any_tag() {
        let catalog = ActionCatalog::standard();
        let ids = catalog.actions_for_tags(&["food".to_string(), "bed".to_string()]);
        assert!(ids.contains(&"eat".to_string()));
        assert!(ids.contains(&"sleep".to_string()));
        assert!(!ids.contains(&"shower".to_string()));
        // Tagless actions never match through facilities.
        assert!(!ids.contains(&"think".to_string()));
    }
}
