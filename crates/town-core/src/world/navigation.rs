//! Movement and map-transition state machine.
//!
//! Same-map movement walks a precomputed node path at a constant speed,
//! interpolating position along each leg. Cross-map movement follows a
//! planned route segment by segment; reaching an entrance at the end of a
//! non-final segment starts a fade-out/fade-in transition, with the map,
//! node and position swapped at the fade boundary and the next segment
//! starting when the fade-in completes.

use contracts::{
    ActivityEvent, CrossMapNavigation, Direction, MapTransition, NavigationState, Position,
    TransitionPhase,
};

use super::WorldState;
use crate::pathfind::find_path;
use crate::router::plan_route;

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    UnknownAgent(String),
    UnknownMap(String),
    UnknownNode(String),
    NoPath {
        map_id: String,
        from: String,
        to: String,
    },
    NoRoute {
        from_map: String,
        to_map: String,
    },
}

impl fmt::Display for NavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAgent(agent_id) => write!(f, "unknown agent: {agent_id}"),
            Self::UnknownMap(map_id) => write!(f, "unknown map: {map_id}"),
            Self::UnknownNode(node_id) => write!(f, "unknown node: {node_id}"),
            Self::NoPath { map_id, from, to } => {
                write!(f, "no path on {map_id} from {from} to {to}")
            }
            Self::NoRoute { from_map, to_map } => {
                write!(f, "no route from {from_map} to {to_map}")
            }
        }
    }
}

impl std::error::Error for NavError {}

impl WorldState {
    /// Start walking toward a node on the agent's current map. Returns
    /// `Ok(false)` when the agent is already standing on the target.
    pub fn navigate_to_node(
        &mut self,
        agent_id: &str,
        target_node_id: &str,
    ) -> Result<bool, NavError> {
        let agent = self
            .agents
            .get(agent_id)
            .ok_or_else(|| NavError::UnknownAgent(agent_id.to_string()))?;
        let map_id = agent.current_map_id.clone();
        let from = agent.current_node_id.clone();
        // An occupant of the start node never pins the mover in place.
        let mut blocked = self.blocked_nodes(&map_id, agent_id);
        blocked.remove(&from);
        let map = self
            .maps
            .get(&map_id)
            .ok_or_else(|| NavError::UnknownMap(map_id.clone()))?;
        if map.node(target_node_id).is_none() {
            return Err(NavError::UnknownNode(target_node_id.to_string()));
        }

        let path = find_path(map, &from, target_node_id, &blocked);
        if path.is_empty() {
            return Err(NavError::NoPath {
                map_id,
                from,
                to: target_node_id.to_string(),
            });
        }
        if path.len() == 1 {
            return Ok(false);
        }
        self.begin_path(agent_id, path);
        Ok(true)
    }

    /// Start walking toward a node on another map (or the same map, which
    /// degenerates to `navigate_to_node`). With no explicit target node the
    /// destination map's spawn node is used.
    pub fn navigate_to_map(
        &mut self,
        agent_id: &str,
        target_map_id: &str,
        target_node_id: Option<&str>,
    ) -> Result<bool, NavError> {
        let target_map = self
            .maps
            .get(target_map_id)
            .ok_or_else(|| NavError::UnknownMap(target_map_id.to_string()))?;
        let target_node = match target_node_id {
            Some(node_id) => {
                if target_map.node(node_id).is_none() {
                    return Err(NavError::UnknownNode(node_id.to_string()));
                }
                node_id.to_string()
            }
            None => target_map.spawn_node_id.clone(),
        };

        let agent = self
            .agents
            .get(agent_id)
            .ok_or_else(|| NavError::UnknownAgent(agent_id.to_string()))?;
        let from_map = agent.current_map_id.clone();
        let from_node = agent.current_node_id.clone();
        if from_map == target_map_id {
            return self.navigate_to_node(agent_id, &target_node);
        }

        let mut blocked = self.blocked_per_map(agent_id);
        if let Some(start_map) = blocked.get_mut(&from_map) {
            start_map.remove(&from_node);
        }
        let route = plan_route(
            &self.maps,
            &from_map,
            &from_node,
            target_map_id,
            &target_node,
            &blocked,
        )
        .ok_or_else(|| NavError::NoRoute {
            from_map: from_map.clone(),
            to_map: target_map_id.to_string(),
        })?;

        let first = route.segments[0].path.clone();
        if let Some(agent) = self.agents.get_mut(agent_id) {
            agent.cross_map_navigation = Some(CrossMapNavigation {
                is_active: true,
                route,
                current_segment_index: 0,
                target_map_id: target_map_id.to_string(),
                target_node_id: target_node,
            });
        }
        if first.len() > 1 {
            self.begin_path(agent_id, first);
        } else {
            // Already standing on the first entrance.
            self.arrive(agent_id, &mut Vec::new());
        }
        Ok(true)
    }

    /// Advance all in-flight movement and transitions by `dt_secs`.
    pub fn tick_navigation(&mut self, dt_secs: f64, events: &mut Vec<ActivityEvent>) {
        let ids: Vec<String> = self.agents.keys().cloned().collect();
        for agent_id in ids {
            self.tick_agent(&agent_id, dt_secs, events);
        }
    }

    fn tick_agent(&mut self, agent_id: &str, dt_secs: f64, events: &mut Vec<ActivityEvent>) {
        let Some(agent) = self.agents.get(agent_id) else {
            return;
        };
        if agent.transition.is_some() {
            self.tick_transition(agent_id, dt_secs, events);
        } else if agent.navigation.is_moving {
            self.tick_movement(agent_id, dt_secs, events);
        }
    }

    fn tick_transition(&mut self, agent_id: &str, dt_secs: f64, events: &mut Vec<ActivityEvent>) {
        let fade = self.config.transition_fade_secs.max(0.01);
        let tick = self.tick;

        let Some(agent) = self.agents.get_mut(agent_id) else {
            return;
        };
        let Some(transition) = agent.transition.as_mut() else {
            return;
        };
        transition.progress = (transition.progress + dt_secs / fade).min(1.0);
        if transition.progress < 1.0 {
            return;
        }

        match transition.phase {
            TransitionPhase::FadeOut => {
                let from_map = agent.current_map_id.clone();
                let to_map = transition.destination_map_id.clone();
                let to_node = transition.destination_node_id.clone();
                let position = self
                    .maps
                    .get(&to_map)
                    .and_then(|map| map.node(&to_node))
                    .map(|node| node.position());
                let Some(position) = position else {
                    // Destination vanished from under us; abort the route.
                    tracing::warn!(%agent_id, %to_map, %to_node, "transition target missing");
                    agent.transition = None;
                    agent.cross_map_navigation = None;
                    return;
                };
                agent.current_map_id = to_map.clone();
                agent.current_node_id = to_node;
                agent.position = position;
                transition.phase = TransitionPhase::FadeIn;
                transition.progress = 0.0;
                events.push(ActivityEvent::MapTransition {
                    agent_id: agent_id.to_string(),
                    from_map_id: from_map,
                    to_map_id: to_map,
                    tick,
                });
            }
            TransitionPhase::FadeIn => {
                agent.transition = None;
                self.advance_route(agent_id, events);
            }
        }
    }

    fn tick_movement(&mut self, agent_id: &str, dt_secs: f64, events: &mut Vec<ActivityEvent>) {
        let Some(agent) = self.agents.get_mut(agent_id) else {
            return;
        };
        let Some(map) = self.maps.get(&agent.current_map_id) else {
            return;
        };

        let speed = self.config.move_speed.max(1.0);
        let mut remaining = speed * dt_secs.max(0.0);
        let mut arrived = false;

        while remaining > 0.0 {
            let nav = &agent.navigation;
            let Some(from) = map.node(&nav.path[nav.current_path_index]) else {
                agent.navigation.clear();
                return;
            };
            let Some(to) = map.node(&nav.path[nav.current_path_index + 1]) else {
                agent.navigation.clear();
                return;
            };
            let from_pos = from.position();
            let to_pos = to.position();
            let leg = from_pos.distance_to(&to_pos);
            let left = (1.0 - nav.progress) * leg;

            if remaining < left {
                let nav = &mut agent.navigation;
                nav.progress += remaining / leg;
                nav.start_position = from_pos;
                nav.target_position = to_pos;
                agent.position = Position::new(
                    from_pos.x + (to_pos.x - from_pos.x) * nav.progress,
                    from_pos.y + (to_pos.y - from_pos.y) * nav.progress,
                );
                agent.direction = Direction::facing(&from_pos, &to_pos);
                return;
            }

            remaining -= left;
            agent.position = to_pos;
            agent.direction = Direction::facing(&from_pos, &to_pos);
            agent.current_node_id = to.id.clone();
            let nav = &mut agent.navigation;
            nav.current_path_index += 1;
            nav.progress = 0.0;
            if nav.current_path_index + 1 >= nav.path.len() {
                arrived = true;
                break;
            }
        }

        if arrived {
            agent.navigation.clear();
            self.arrive(agent_id, events);
        }
    }

    /// The agent just stopped on its current node. Chain a transition when
    /// a cross-map route continues past this node, step through a lone
    /// entrance when no route is in play, otherwise finish.
    fn arrive(&mut self, agent_id: &str, events: &mut Vec<ActivityEvent>) {
        let tick = self.tick;
        let Some(agent) = self.agents.get_mut(agent_id) else {
            return;
        };
        let map_id = agent.current_map_id.clone();
        let node_id = agent.current_node_id.clone();

        let (active, segment_index, segments) = match agent.cross_map_navigation.as_ref() {
            Some(cross) => (
                cross.is_active,
                cross.current_segment_index,
                cross.route.segments.len(),
            ),
            None => (false, 0, 0),
        };
        let link = self
            .maps
            .get(&map_id)
            .and_then(|map| map.node(&node_id))
            .and_then(|node| node.leads_to.clone());

        if active && segment_index + 1 < segments {
            match link {
                Some(link) => {
                    agent.transition = Some(MapTransition {
                        phase: TransitionPhase::FadeOut,
                        progress: 0.0,
                        destination_map_id: link.map_id,
                        destination_node_id: link.node_id,
                    });
                }
                None => {
                    tracing::warn!(%agent_id, %map_id, %node_id, "route node is not an entrance");
                    agent.cross_map_navigation = None;
                }
            }
            return;
        }

        // A walk that ends on an entrance outside any planned route still
        // steps through the door; completion fires after the fade-in.
        if !active {
            if let Some(link) = link {
                agent.transition = Some(MapTransition {
                    phase: TransitionPhase::FadeOut,
                    progress: 0.0,
                    destination_map_id: link.map_id,
                    destination_node_id: link.node_id,
                });
                return;
            }
        }

        agent.cross_map_navigation = None;
        events.push(ActivityEvent::MovementCompleted {
            agent_id: agent_id.to_string(),
            map_id,
            node_id,
            tick,
        });
    }

    /// A fade-in just finished: move to the next route segment, or finish
    /// the walk when the fade belonged to a lone entrance step.
    fn advance_route(&mut self, agent_id: &str, events: &mut Vec<ActivityEvent>) {
        let tick = self.tick;
        let Some(agent) = self.agents.get_mut(agent_id) else {
            return;
        };
        let segment = match agent.cross_map_navigation.as_mut() {
            Some(cross) => {
                cross.current_segment_index += 1;
                cross
                    .route
                    .segments
                    .get(cross.current_segment_index)
                    .cloned()
            }
            None => {
                events.push(ActivityEvent::MovementCompleted {
                    agent_id: agent_id.to_string(),
                    map_id: agent.current_map_id.clone(),
                    node_id: agent.current_node_id.clone(),
                    tick,
                });
                return;
            }
        };
        let Some(segment) = segment else {
            agent.cross_map_navigation = None;
            return;
        };

        if segment.path.len() > 1 {
            self.begin_path(agent_id, segment.path);
        } else {
            self.arrive(agent_id, events);
        }
    }

    /// Complete an in-flight transition immediately, performing the map
    /// swap if the fade-out has not finished yet. Used when an interrupt
    /// preempts an agent mid-fade: the agent must land on the far side
    /// before the replacement plan is applied.
    pub(crate) fn finish_transition(&mut self, agent_id: &str, events: &mut Vec<ActivityEvent>) {
        let tick = self.tick;
        let Some(agent) = self.agents.get_mut(agent_id) else {
            return;
        };
        let Some(transition) = agent.transition.take() else {
            return;
        };
        if transition.phase == TransitionPhase::FadeOut {
            let from_map = agent.current_map_id.clone();
            let to_map = transition.destination_map_id;
            let to_node = transition.destination_node_id;
            let position = self
                .maps
                .get(&to_map)
                .and_then(|map| map.node(&to_node))
                .map(|node| node.position());
            let Some(position) = position else {
                return;
            };
            agent.current_map_id = to_map.clone();
            agent.current_node_id = to_node;
            agent.position = position;
            events.push(ActivityEvent::MapTransition {
                agent_id: agent_id.to_string(),
                from_map_id: from_map,
                to_map_id: to_map,
                tick,
            });
        }
    }

    fn begin_path(&mut self, agent_id: &str, path: Vec<String>) {
        let Some(agent) = self.agents.get_mut(agent_id) else {
            return;
        };
        let target = self
            .maps
            .get(&agent.current_map_id)
            .and_then(|map| map.node(&path[1]))
            .map(|node| node.position())
            .unwrap_or(agent.position);
        agent.direction = Direction::facing(&agent.position, &target);
        agent.navigation = NavigationState {
            is_moving: true,
            path,
            current_path_index: 0,
            progress: 0.0,
            start_position: agent.position,
            target_position: target,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{now_ms, town_and_cafe_maps};
    use contracts::{AgentKind, SimConfig};

    fn world() -> WorldState {
        let mut world = WorldState::new(SimConfig::default(), town_and_cafe_maps(), now_ms());
        world
            .spawn_agent("char_1", "Mori", AgentKind::Character, "town")
            .expect("spawn");
        world
    }

    fn run(world: &mut WorldState, steps: usize, dt: f64) -> Vec<ActivityEvent> {
        let mut events = Vec::new();
        for _ in 0..steps {
            world.tick_navigation(dt, &mut events);
        }
        events
    }

    #[test]
    fn walks_a_path_and_emits_completion() {
        let mut world = world();
        // Default move_speed is 80 px/s; t0 -> t1 is 64 px.
        assert!(world.navigate_to_node("char_1", "t1").expect("navigate"));
        assert!(world.agent("char_1").unwrap().navigation.is_moving);

        let events = run(&mut world, 10, 0.1);
        let agent = world.agent("char_1").unwrap();
        assert!(!agent.navigation.is_moving);
        assert_eq!(agent.current_node_id, "t1");
        assert_eq!(agent.position, Position::new(64.0, 0.0));
        assert!(matches!(
            events.as_slice(),
            [ActivityEvent::MovementCompleted { agent_id, node_id, .. }]
                if agent_id == "char_1" && node_id == "t1"
        ));
    }

    #[test]
    fn position_interpolates_along_a_leg() {
        let mut world = world();
        world.navigate_to_node("char_1", "t1").expect("navigate");
        run(&mut world, 1, 0.4); // 32 px of a 64 px leg
        let agent = world.agent("char_1").unwrap();
        assert!((agent.position.x - 32.0).abs() < 1e-9);
        assert_eq!(agent.direction, Direction::Right);
        assert!((agent.navigation.progress - 0.5).abs() < 1e-9);
    }

    #[test]
    fn large_step_crosses_multiple_legs() {
        let mut world = world();
        world.navigate_to_node("char_1", "t_door").expect("navigate");
        // 128 px total at 80 px/s: one 2 s step covers it all. The walk
        // ends on a door, so a fade starts instead of a completion.
        let events = run(&mut world, 1, 2.0);
        let agent = world.agent("char_1").unwrap();
        assert_eq!(agent.current_node_id, "t_door");
        assert!(events.is_empty());
        assert!(agent.transition.is_some());
    }

    #[test]
    fn entrance_arrival_without_a_route_steps_through() {
        let mut world = world();
        assert!(world.navigate_to_node("char_1", "t_door").expect("navigate"));
        // 1.6 s walk plus both fades.
        let events = run(&mut world, 30, 0.1);
        let agent = world.agent("char_1").unwrap();
        assert_eq!(agent.current_map_id, "cafe");
        assert_eq!(agent.current_node_id, "c_door");
        assert!(!agent.is_navigating());
        assert!(events.iter().any(|event| matches!(
            event,
            ActivityEvent::MovementCompleted { map_id, node_id, .. }
                if map_id == "cafe" && node_id == "c_door"
        )));
    }

    #[test]
    fn finishing_a_transition_early_lands_on_the_destination() {
        let mut world = world();
        world
            .navigate_to_map("char_1", "cafe", Some("c0"))
            .expect("navigate");
        // Walk to the door; the fade-out is underway but unfinished.
        run(&mut world, 17, 0.1);
        assert!(world.agent("char_1").unwrap().transition.is_some());

        let mut events = Vec::new();
        world.finish_transition("char_1", &mut events);
        let agent = world.agent("char_1").unwrap();
        assert_eq!(agent.current_map_id, "cafe");
        assert_eq!(agent.current_node_id, "c_door");
        assert!(agent.transition.is_none());
        assert!(events
            .iter()
            .any(|event| matches!(event, ActivityEvent::MapTransition { to_map_id, .. } if to_map_id == "cafe")));
    }

    #[test]
    fn already_at_target_starts_nothing() {
        let mut world = world();
        assert!(!world.navigate_to_node("char_1", "t0").expect("navigate"));
        assert!(!world.agent("char_1").unwrap().navigation.is_moving);
    }

    #[test]
    fn unknown_target_node_is_an_error() {
        let mut world = world();
        assert!(matches!(
            world.navigate_to_node("char_1", "nope"),
            Err(NavError::UnknownNode(_))
        ));
    }

    #[test]
    fn blocked_only_route_reports_no_path() {
        let mut world = world();
        world
            .spawn_agent("npc_1", "Clerk", AgentKind::Npc, "town")
            .expect("spawn");
        // Park the NPC on the only corridor node.
        world.agent_mut("npc_1").unwrap().current_node_id = "t1".to_string();
        assert!(matches!(
            world.navigate_to_node("char_1", "t_door"),
            Err(NavError::NoPath { .. })
        ));
    }

    #[test]
    fn cross_map_route_transitions_and_finishes_on_target_map() {
        let mut world = world();
        assert!(world
            .navigate_to_map("char_1", "cafe", Some("c0"))
            .expect("navigate"));
        assert!(world.agent("char_1").unwrap().cross_map_navigation.is_some());

        // Walk t0 -> t_door (128 px, 1.6 s).
        run(&mut world, 16, 0.1);
        let agent = world.agent("char_1").unwrap();
        assert_eq!(agent.current_node_id, "t_door");
        let transition = agent.transition.as_ref().expect("fade started");
        assert_eq!(transition.phase, TransitionPhase::FadeOut);

        // Fade out completes (0.5 s): map swaps, fade-in begins.
        let events = run(&mut world, 5, 0.1);
        let agent = world.agent("char_1").unwrap();
        assert_eq!(agent.current_map_id, "cafe");
        assert_eq!(agent.current_node_id, "c_door");
        assert_eq!(
            agent.transition.as_ref().map(|t| t.phase),
            Some(TransitionPhase::FadeIn)
        );
        assert!(events
            .iter()
            .any(|event| matches!(event, ActivityEvent::MapTransition { to_map_id, .. } if to_map_id == "cafe")));

        // Fade in completes, then the cafe segment walks c_door -> c0.
        run(&mut world, 5, 0.1);
        assert!(world.agent("char_1").unwrap().navigation.is_moving);
        let events = run(&mut world, 10, 0.1);
        let agent = world.agent("char_1").unwrap();
        assert_eq!(agent.current_node_id, "c0");
        assert!(agent.cross_map_navigation.is_none());
        assert!(!agent.is_navigating());
        assert!(events
            .iter()
            .any(|event| matches!(event, ActivityEvent::MovementCompleted { node_id, .. } if node_id == "c0")));
    }

    #[test]
    fn route_ending_at_entrance_uses_stub_segment() {
        let mut world = world();
        world
            .navigate_to_map("char_1", "cafe", Some("c_door"))
            .expect("navigate");
        // Walk to the door, fade out, fade in; the cafe segment is just
        // the arrival node, so the route completes right after the fade.
        let events = run(&mut world, 30, 0.1);
        let agent = world.agent("char_1").unwrap();
        assert_eq!(agent.current_map_id, "cafe");
        assert_eq!(agent.current_node_id, "c_door");
        assert!(!agent.is_navigating());
        assert!(events
            .iter()
            .any(|event| matches!(event, ActivityEvent::MovementCompleted { node_id, .. } if node_id == "c_door")));
    }

    #[test]
    fn starting_at_entrance_fades_immediately() {
        let mut world = world();
        world.agent_mut("char_1").unwrap().current_node_id = "t_door".to_string();
        world.agent_mut("char_1").unwrap().position = Position::new(128.0, 0.0);
        world
            .navigate_to_map("char_1", "cafe", Some("c0"))
            .expect("navigate");
        let agent = world.agent("char_1").unwrap();
        assert!(agent.transition.is_some());
        assert!(!agent.navigation.is_moving);
    }

    #[test]
    fn unknown_destination_map_is_an_error() {
        let mut world = world();
        assert!(matches!(
            world.navigate_to_map("char_1", "arcade", None),
            Err(NavError::UnknownMap(_))
        ));
    }
}
