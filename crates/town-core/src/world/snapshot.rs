//! Subscriber snapshots and checkpoint payloads.

use contracts::{AgentKind, AgentSnapshot, PersistedWorldState, WorldSnapshot};

use super::{schema_version, WorldState};

impl WorldState {
    /// Serialized view pushed to subscribers. Characters and NPCs are
    /// split the way the UI consumes them.
    pub fn snapshot(&self) -> WorldSnapshot {
        let mut characters = Vec::new();
        let mut npcs = Vec::new();
        for agent in self.agents().values() {
            let view = AgentSnapshot::of(agent);
            match agent.kind {
                AgentKind::Character => characters.push(view),
                AgentKind::Npc => npcs.push(view),
            }
        }
        WorldSnapshot {
            schema_version: schema_version(),
            tick: self.tick(),
            time: self.time(),
            current_map_id: self.config().default_map_id.clone(),
            paused: self.paused(),
            characters,
            npcs,
        }
    }

    /// Checkpoint payload for the state store. Maps are static data and
    /// reload from their own source on restart.
    pub fn persisted(&self) -> PersistedWorldState {
        PersistedWorldState {
            schema_version: schema_version(),
            tick: self.tick(),
            time: self.time(),
            agents: self.agents().values().cloned().collect(),
        }
    }

    /// Restore agent records from a checkpoint. Agents referencing maps
    /// this world does not know are dropped with a warning; everything
    /// else is taken verbatim, including in-flight navigation state.
    pub fn restore(&mut self, state: PersistedWorldState) {
        self.agents.clear();
        self.tick = state.tick;
        for agent in state.agents {
            if !self.maps.contains_key(&agent.current_map_id) {
                tracing::warn!(
                    agent_id = %agent.id,
                    map_id = %agent.current_map_id,
                    "dropping restored agent on unknown map"
                );
                continue;
            }
            self.insert_agent(agent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{now_ms, town_and_cafe_maps};
    use contracts::SimConfig;

    #[test]
    fn snapshot_splits_characters_and_npcs() {
        let mut world = WorldState::new(SimConfig::default(), town_and_cafe_maps(), now_ms());
        world
            .spawn_agent("char_1", "Mori", AgentKind::Character, "town")
            .expect("spawn");
        world
            .spawn_agent("npc_1", "Clerk", AgentKind::Npc, "cafe")
            .expect("spawn");

        let snapshot = world.snapshot();
        assert_eq!(snapshot.characters.len(), 1);
        assert_eq!(snapshot.npcs.len(), 1);
        assert_eq!(snapshot.characters[0].id, "char_1");
        assert_eq!(snapshot.current_map_id, "town");
    }

    #[test]
    fn persist_and_restore_round_trips_agents() {
        let mut world = WorldState::new(SimConfig::default(), town_and_cafe_maps(), now_ms());
        world
            .spawn_agent("char_1", "Mori", AgentKind::Character, "town")
            .expect("spawn");
        if let Some(agent) = world.agent_mut("char_1") {
            agent.needs.bladder = 42.0;
            agent.action_counter = 3;
        }

        let checkpoint = world.persisted();
        let mut fresh = WorldState::new(SimConfig::default(), town_and_cafe_maps(), now_ms());
        fresh.restore(checkpoint);

        let agent = fresh.agent("char_1").expect("restored");
        assert_eq!(agent.needs.bladder, 42.0);
        assert_eq!(agent.action_counter, 3);
    }

    #[test]
    fn restore_drops_agents_on_unknown_maps() {
        let mut world = WorldState::new(SimConfig::default(), town_and_cafe_maps(), now_ms());
        world
            .spawn_agent("char_1", "Mori", AgentKind::Character, "town")
            .expect("spawn");
        let mut checkpoint = world.persisted();
        checkpoint.agents[0].current_map_id = "arcade".to_string();

        let mut fresh = WorldState::new(SimConfig::default(), town_and_cafe_maps(), now_ms());
        fresh.restore(checkpoint);
        assert!(fresh.agent("char_1").is_none());
    }
}
