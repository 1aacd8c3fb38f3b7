//! Authoritative mutable world store: the map registry, agent records,
//! per-map occupancy, simulated time, and the pause flag. All mutation
//! goes through methods here or through the engine impls layered on top
//! (`navigation.rs`); nothing outside the crate writes fields directly.

mod clock;
mod navigation;
mod snapshot;

pub use clock::WorldClock;
pub use navigation::NavError;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use contracts::{
    AgentKind, AgentRecord, FacilityInfo, Position, ScheduleEntry, SimConfig, WorldMap, WorldTime,
    SCHEMA_VERSION_V1,
};

/// How close (in pixels) an agent must be to a facility's bounds to count
/// as adjacent/inside for action purposes.
pub const ADJACENCY_MARGIN: f64 = 48.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    UnknownMap(String),
    UnknownNode(String),
    DuplicateAgent(String),
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMap(map_id) => write!(f, "unknown map: {map_id}"),
            Self::UnknownNode(node_id) => write!(f, "unknown node: {node_id}"),
            Self::DuplicateAgent(agent_id) => write!(f, "agent already exists: {agent_id}"),
        }
    }
}

impl std::error::Error for WorldError {}

#[derive(Debug)]
pub struct WorldState {
    config: SimConfig,
    maps: BTreeMap<String, WorldMap>,
    agents: BTreeMap<String, AgentRecord>,
    paused: bool,
    tick: u64,
    time: WorldTime,
    clock: WorldClock,
}

impl WorldState {
    pub fn new(config: SimConfig, maps: Vec<WorldMap>, now_ms: u64) -> Self {
        let clock = WorldClock::new(now_ms, config.utc_offset_minutes, config.time_scale);
        let time = clock.world_time(now_ms);
        let maps = maps.into_iter().map(|map| (map.id.clone(), map)).collect();
        Self {
            config,
            maps,
            agents: BTreeMap::new(),
            paused: true,
            tick: 0,
            time,
            clock,
        }
    }

    // --- Accessors ---

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn maps(&self) -> &BTreeMap<String, WorldMap> {
        &self.maps
    }

    pub fn map(&self, map_id: &str) -> Option<&WorldMap> {
        self.maps.get(map_id)
    }

    pub fn agents(&self) -> &BTreeMap<String, AgentRecord> {
        &self.agents
    }

    pub fn agent(&self, agent_id: &str) -> Option<&AgentRecord> {
        self.agents.get(agent_id)
    }

    pub fn agent_mut(&mut self, agent_id: &str) -> Option<&mut AgentRecord> {
        self.agents.get_mut(agent_id)
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn advance_tick(&mut self) {
        self.tick = self.tick.saturating_add(1);
    }

    pub fn time(&self) -> WorldTime {
        self.time
    }

    pub fn clock(&self) -> &WorldClock {
        &self.clock
    }

    /// Re-derive the world clock from the wall clock. Runs every tick,
    /// paused or not.
    pub fn sync_clock(&mut self, now_ms: u64) -> WorldTime {
        self.time = self.clock.world_time(now_ms);
        self.time
    }

    // --- Agent lifecycle ---

    /// Spawn an agent at a map's spawn node. Agents are created at world
    /// init or restore; there is no mid-simulation removal.
    pub fn spawn_agent(
        &mut self,
        agent_id: &str,
        name: &str,
        kind: AgentKind,
        map_id: &str,
    ) -> Result<(), WorldError> {
        if self.agents.contains_key(agent_id) {
            return Err(WorldError::DuplicateAgent(agent_id.to_string()));
        }
        let map = self
            .maps
            .get(map_id)
            .ok_or_else(|| WorldError::UnknownMap(map_id.to_string()))?;
        let spawn = map
            .node(&map.spawn_node_id)
            .ok_or_else(|| WorldError::UnknownNode(map.spawn_node_id.clone()))?;

        let record = AgentRecord::new(
            agent_id,
            name,
            kind,
            map_id,
            spawn.id.clone(),
            spawn.position(),
        );
        self.agents.insert(agent_id.to_string(), record);
        Ok(())
    }

    pub(crate) fn insert_agent(&mut self, record: AgentRecord) {
        self.agents.insert(record.id.clone(), record);
    }

    /// Replace an agent's daily routine.
    pub fn set_schedule(&mut self, agent_id: &str, schedule: Vec<ScheduleEntry>) {
        if let Some(agent) = self.agents.get_mut(agent_id) {
            agent.schedule = schedule;
        }
    }

    // --- Occupancy ---

    /// Nodes blocked on a map: every node a stationary NPC stands on,
    /// excluding `exclude_agent` itself.
    pub fn blocked_nodes(&self, map_id: &str, exclude_agent: &str) -> BTreeSet<String> {
        self.agents
            .values()
            .filter(|agent| {
                agent.kind == AgentKind::Npc
                    && agent.id != exclude_agent
                    && agent.current_map_id == map_id
                    && !agent.is_navigating()
            })
            .map(|agent| agent.current_node_id.clone())
            .collect()
    }

    pub fn blocked_per_map(&self, exclude_agent: &str) -> BTreeMap<String, BTreeSet<String>> {
        self.maps
            .keys()
            .map(|map_id| (map_id.clone(), self.blocked_nodes(map_id, exclude_agent)))
            .collect()
    }

    // --- Facility lookups ---

    /// Locate a facility by id across all maps.
    pub fn find_facility(&self, facility_id: &str) -> Option<(String, FacilityInfo)> {
        for map in self.maps.values() {
            if let Some(obstacle) = map.obstacle(facility_id) {
                if let Some(facility) = obstacle.facility.as_ref() {
                    return Some((
                        map.id.clone(),
                        FacilityInfo {
                            facility_id: obstacle.id.clone(),
                            map_id: map.id.clone(),
                            tags: facility.tags.clone(),
                            cost: facility.cost,
                            quality: facility.quality,
                        },
                    ));
                }
            }
        }
        None
    }

    /// Facility the agent currently stands at (inside or within the
    /// adjacency margin of its bounds), if any.
    pub fn facility_at(&self, agent: &AgentRecord) -> Option<FacilityInfo> {
        let map = self.maps.get(&agent.current_map_id)?;
        map.obstacles.iter().find_map(|obstacle| {
            let facility = obstacle.facility.as_ref()?;
            if obstacle
                .bounds
                .contains_with_margin(&agent.position, ADJACENCY_MARGIN)
            {
                Some(FacilityInfo {
                    facility_id: obstacle.id.clone(),
                    map_id: map.id.clone(),
                    tags: facility.tags.clone(),
                    cost: facility.cost,
                    quality: facility.quality,
                })
            } else {
                None
            }
        })
    }

    /// Whether the agent is close enough to the named facility to use it.
    pub fn facility_adjacent(&self, agent: &AgentRecord, facility_id: &str) -> bool {
        let Some(map) = self.maps.get(&agent.current_map_id) else {
            return false;
        };
        map.obstacle(facility_id)
            .filter(|obstacle| obstacle.facility.is_some())
            .is_some_and(|obstacle| {
                obstacle
                    .bounds
                    .contains_with_margin(&agent.position, ADJACENCY_MARGIN)
            })
    }

    /// Every facility in the world, in map order.
    pub fn all_facilities(&self) -> Vec<FacilityInfo> {
        let mut facilities = Vec::new();
        for map in self.maps.values() {
            for obstacle in &map.obstacles {
                if let Some(facility) = obstacle.facility.as_ref() {
                    facilities.push(FacilityInfo {
                        facility_id: obstacle.id.clone(),
                        map_id: map.id.clone(),
                        tags: facility.tags.clone(),
                        cost: facility.cost,
                        quality: facility.quality,
                    });
                }
            }
        }
        facilities
    }

    /// Node on a map nearest to a facility's center; used to snap action
    /// targets onto the walk graph.
    pub fn node_near_facility(&self, map_id: &str, facility_id: &str) -> Option<String> {
        let map = self.maps.get(map_id)?;
        let obstacle = map.obstacle(facility_id)?;
        let center: Position = obstacle.bounds.center();
        map.nearest_node(&center).map(|node| node.id.clone())
    }

    // --- Agent proximity ---

    /// Whether two agents stand close enough to interact: same map, on
    /// the same node or on directly connected nodes.
    pub fn agent_adjacent(&self, agent: &AgentRecord, other: &AgentRecord) -> bool {
        if agent.current_map_id != other.current_map_id {
            return false;
        }
        if agent.current_node_id == other.current_node_id {
            return true;
        }
        self.maps
            .get(&agent.current_map_id)
            .and_then(|map| map.node(&agent.current_node_id))
            .is_some_and(|node| node.connected_to.contains(&other.current_node_id))
    }

    /// Node to walk to when approaching another agent: the target's own
    /// node when nothing blocks it, otherwise its closest open neighbor.
    pub fn node_near_agent(&self, mover_id: &str, target: &AgentRecord) -> Option<String> {
        let map = self.maps.get(&target.current_map_id)?;
        let node = map.node(&target.current_node_id)?;
        let blocked = self.blocked_nodes(&target.current_map_id, mover_id);
        if !blocked.contains(&node.id) {
            return Some(node.id.clone());
        }
        let anchor = node.position();
        node.connected_to
            .iter()
            .filter(|neighbor| !blocked.contains(neighbor.as_str()))
            .filter_map(|neighbor| map.node(neighbor))
            .min_by(|a, b| {
                let da = a.position().distance_to(&anchor);
                let db = b.position().distance_to(&anchor);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|node| node.id.clone())
    }

    /// Maps reachable from `start_map_id` within `max_hops` entrance hops,
    /// excluding the start map itself. Deterministic order.
    pub fn reachable_maps(&self, start_map_id: &str, max_hops: u32) -> Vec<String> {
        let mut reached: BTreeSet<String> = BTreeSet::new();
        let mut frontier = vec![start_map_id.to_string()];
        let mut seen: BTreeSet<String> = BTreeSet::from([start_map_id.to_string()]);

        for _ in 0..max_hops {
            let mut next = Vec::new();
            for map_id in frontier {
                let Some(map) = self.maps.get(&map_id) else {
                    continue;
                };
                for node in map.entrances() {
                    if let Some(link) = node.leads_to.as_ref() {
                        if self.maps.contains_key(&link.map_id) && seen.insert(link.map_id.clone())
                        {
                            reached.insert(link.map_id.clone());
                            next.push(link.map_id.clone());
                        }
                    }
                }
            }
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }

        reached.into_iter().collect()
    }
}

pub(crate) fn schema_version() -> String {
    SCHEMA_VERSION_V1.to_string()
}
