//! Event fan-out: broadcast channels for snapshots and activity events,
//! plus a small ring of human-readable history lines fed back into
//! decision contexts. Lagging subscribers drop messages rather than slow
//! the tick loop.

use std::collections::VecDeque;

use contracts::{ActivityEvent, WorldSnapshot};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

pub struct EventBus {
    snapshots: broadcast::Sender<WorldSnapshot>,
    activity: broadcast::Sender<ActivityEvent>,
    recent: VecDeque<(String, String)>,
    history_capacity: usize,
}

impl EventBus {
    pub fn new(history_capacity: usize) -> Self {
        let (snapshots, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (activity, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            snapshots,
            activity,
            recent: VecDeque::new(),
            history_capacity: history_capacity.max(1),
        }
    }

    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<WorldSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn subscribe_activity(&self) -> broadcast::Receiver<ActivityEvent> {
        self.activity.subscribe()
    }

    pub fn publish_snapshot(&self, snapshot: WorldSnapshot) {
        // Send only fails with zero subscribers, which is fine.
        let _ = self.snapshots.send(snapshot);
    }

    pub fn publish(&mut self, event: ActivityEvent) {
        self.recent
            .push_back((event.agent_id().to_string(), describe(&event)));
        while self.recent.len() > self.history_capacity {
            self.recent.pop_front();
        }
        let _ = self.activity.send(event);
    }

    /// Recent history lines for one agent, oldest first, capped at `limit`.
    pub fn recent_for(&self, agent_id: &str, limit: usize) -> Vec<String> {
        let mut lines: Vec<String> = self
            .recent
            .iter()
            .rev()
            .filter(|(id, _)| id == agent_id)
            .take(limit)
            .map(|(_, line)| line.clone())
            .collect();
        lines.reverse();
        lines
    }
}

fn describe(event: &ActivityEvent) -> String {
    match event {
        ActivityEvent::ActionStarted {
            action_id,
            facility_id,
            ..
        } => match facility_id {
            Some(facility_id) => format!("started {action_id} at {facility_id}"),
            None => format!("started {action_id}"),
        },
        ActivityEvent::ActionCompleted { action_id, .. } => format!("finished {action_id}"),
        ActivityEvent::MovementStarted { target_node_id, .. } => {
            format!("walking to {target_node_id}")
        }
        ActivityEvent::MovementCompleted { map_id, node_id, .. } => {
            format!("arrived at {node_id} on {map_id}")
        }
        ActivityEvent::MapTransition { to_map_id, .. } => format!("entered {to_map_id}"),
        ActivityEvent::InterruptRaised { need, .. } => {
            format!("{} became critical", need.label())
        }
        ActivityEvent::DecisionDiscarded { reason, .. } => format!("changed plans: {reason}"),
        ActivityEvent::DecisionFailed { detail, .. } => format!("could not decide: {detail}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::NeedKind;

    fn movement(agent_id: &str, tick: u64) -> ActivityEvent {
        ActivityEvent::MovementCompleted {
            agent_id: agent_id.to_string(),
            map_id: "town".to_string(),
            node_id: "t1".to_string(),
            tick,
        }
    }

    #[test]
    fn subscribers_receive_published_events() {
        let mut bus = EventBus::new(8);
        let mut rx = bus.subscribe_activity();
        bus.publish(movement("char_1", 7));
        let event = rx.try_recv().expect("event delivered");
        assert_eq!(event.tick(), 7);
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let mut bus = EventBus::new(8);
        bus.publish(movement("char_1", 1));
        bus.publish_snapshot(WorldSnapshot {
            schema_version: "town.v1".into(),
            tick: 0,
            time: Default::default(),
            current_map_id: "town".into(),
            paused: true,
            characters: Vec::new(),
            npcs: Vec::new(),
        });
    }

    #[test]
    fn history_is_per_agent_and_capped() {
        let mut bus = EventBus::new(3);
        for tick in 0..5 {
            bus.publish(movement("char_1", tick));
        }
        bus.publish(ActivityEvent::InterruptRaised {
            agent_id: "char_2".to_string(),
            need: NeedKind::Bladder,
            value: 9.0,
            tick: 6,
        });

        // Ring holds 3 entries total; char_1 kept the two newest of its own.
        let lines = bus.recent_for("char_1", 10);
        assert_eq!(lines.len(), 2);
        let lines = bus.recent_for("char_2", 10);
        assert_eq!(lines, vec!["bladder became critical".to_string()]);
        assert!(bus.recent_for("char_3", 10).is_empty());
    }

    #[test]
    fn recent_for_orders_oldest_first() {
        let mut bus = EventBus::new(8);
        bus.publish(ActivityEvent::ActionStarted {
            agent_id: "char_1".into(),
            action_id: "eat".into(),
            facility_id: Some("cafe_counter".into()),
            tick: 1,
        });
        bus.publish(ActivityEvent::ActionCompleted {
            agent_id: "char_1".into(),
            action_id: "eat".into(),
            tick: 2,
        });
        assert_eq!(
            bus.recent_for("char_1", 10),
            vec![
                "started eat at cafe_counter".to_string(),
                "finished eat".to_string(),
            ]
        );
    }
}
