//! End-to-end simulation properties: pathfinding soundness, decay bounds,
//! and the async decision pipeline (single-flight, stale discard,
//! checkpoint fan-out) driven through the public handle.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use tokio::sync::Notify;

use contracts::{
    ActionCatalog, ActivityEvent, AgentKind, AgentRecord, BehaviorDecision, MapLink, NeedStats,
    NodeKind, PathNode, PersistedWorldState, Position, SimConfig, WorldMap,
};
use town_core::{
    apply_decay, find_path, run_ticks, wall_ms, BehaviorDecider, DecisionFuture, EngineHandle,
    ScriptedDecider, SimEngine, StateStore, StoreError, TimedActionExecutor, WorldState,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn node(id: &str, x: f64, y: f64, kind: NodeKind, connected: &[&str]) -> PathNode {
    PathNode {
        id: id.to_string(),
        x,
        y,
        kind,
        connected_to: connected.iter().map(|s| s.to_string()).collect(),
        leads_to: None,
    }
}

/// 4x4 grid, ids g0..g15 row-major, 64 px spacing.
fn grid_map() -> WorldMap {
    let mut nodes = Vec::new();
    for row in 0..4i64 {
        for col in 0..4i64 {
            let index = row * 4 + col;
            let mut connected = Vec::new();
            if col > 0 {
                connected.push(format!("g{}", index - 1));
            }
            if col < 3 {
                connected.push(format!("g{}", index + 1));
            }
            if row > 0 {
                connected.push(format!("g{}", index - 4));
            }
            if row < 3 {
                connected.push(format!("g{}", index + 4));
            }
            nodes.push(PathNode {
                id: format!("g{index}"),
                x: col as f64 * 64.0,
                y: row as f64 * 64.0,
                kind: NodeKind::Waypoint,
                connected_to: connected,
                leads_to: None,
            });
        }
    }
    WorldMap {
        id: "grid".to_string(),
        nodes,
        obstacles: Vec::new(),
        spawn_node_id: "g0".to_string(),
    }
}

/// Town and cafe joined by one entrance pair, with a food counter in the
/// cafe near its inner node.
fn two_maps() -> Vec<WorldMap> {
    let mut t_door = node("t_door", 128.0, 0.0, NodeKind::Entrance, &["t1"]);
    t_door.leads_to = Some(MapLink {
        map_id: "cafe".to_string(),
        node_id: "c_door".to_string(),
    });
    let mut c_door = node("c_door", 0.0, 0.0, NodeKind::Entrance, &["c0"]);
    c_door.leads_to = Some(MapLink {
        map_id: "town".to_string(),
        node_id: "t_door".to_string(),
    });

    let town = WorldMap {
        id: "town".to_string(),
        nodes: vec![
            node("t0", 0.0, 0.0, NodeKind::Spawn, &["t1"]),
            node("t1", 64.0, 0.0, NodeKind::Waypoint, &["t0", "t_door"]),
            t_door,
        ],
        obstacles: Vec::new(),
        spawn_node_id: "t0".to_string(),
    };
    let cafe = WorldMap {
        id: "cafe".to_string(),
        nodes: vec![c_door, node("c0", 64.0, 0.0, NodeKind::Waypoint, &["c_door"])],
        obstacles: vec![contracts::Obstacle {
            id: "cafe_counter".to_string(),
            bounds: contracts::Rect {
                x: 40.0,
                y: -40.0,
                width: 32.0,
                height: 32.0,
            },
            facility: Some(contracts::Facility {
                tags: vec!["food".to_string()],
                cost: 0,
                quality: 50,
            }),
        }],
        spawn_node_id: "c_door".to_string(),
    };
    vec![town, cafe]
}

fn handle_with(decider: Arc<dyn BehaviorDecider>, config: SimConfig) -> EngineHandle {
    let catalog = ActionCatalog::standard();
    let executor = TimedActionExecutor::new(catalog.clone(), config.time_scale);
    let mut world = WorldState::new(config, two_maps(), wall_ms());
    world
        .spawn_agent("char_1", "Mori", AgentKind::Character, "town")
        .expect("spawn");
    world.set_paused(false);
    EngineHandle::new(SimEngine::new(world, Box::new(executor), catalog), decider)
}

// ---------------------------------------------------------------------------
// Pathfinding and decay properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn paths_are_connected_and_avoid_blocked_nodes(
        blocked_indices in prop::collection::btree_set(1usize..15, 0..6)
    ) {
        let map = grid_map();
        let blocked: BTreeSet<String> =
            blocked_indices.iter().map(|index| format!("g{index}")).collect();
        let path = find_path(&map, "g0", "g15", &blocked);

        if path.is_empty() {
            return Ok(());
        }
        prop_assert_eq!(path.first().map(String::as_str), Some("g0"));
        prop_assert_eq!(path.last().map(String::as_str), Some("g15"));
        for step in &path {
            prop_assert!(!blocked.contains(step));
        }
        for pair in path.windows(2) {
            let from = map.node(&pair[0]).expect("node exists");
            prop_assert!(from.connected_to.contains(&pair[1]));
        }
    }

    #[test]
    fn decay_never_leaves_the_valid_range(
        start in 0.0f64..100.0,
        rate in 0.0f64..5.0,
        elapsed in 0.0f64..500.0,
        boost in -5.0f64..5.0,
    ) {
        let mut agent = AgentRecord::new(
            "a", "A", AgentKind::Character, "town", "t0", Position::default(),
        );
        agent.needs = NeedStats {
            satiety: start,
            energy: start,
            hygiene: start,
            mood: start,
            bladder: start,
        };
        let rates = NeedStats {
            satiety: rate,
            energy: rate,
            hygiene: rate,
            mood: rate,
            bladder: rate,
        };
        let overrides = contracts::NeedRateOverrides {
            bladder: Some(boost),
            ..Default::default()
        };
        apply_decay(&mut agent, elapsed, &rates, Some(&overrides), 15.0);
        for kind in contracts::NeedKind::ALL {
            let value = agent.needs.get(kind);
            prop_assert!((0.0..=100.0).contains(&value), "{kind:?} = {value}");
        }
    }
}

// ---------------------------------------------------------------------------
// Async decision pipeline
// ---------------------------------------------------------------------------

/// Decider whose first call parks until released; later calls resolve
/// immediately. Counts every call.
struct GatedDecider {
    calls: Arc<AtomicUsize>,
    release: Arc<Notify>,
}

impl BehaviorDecider for GatedDecider {
    fn decide(&self, _context: contracts::DecisionContext) -> DecisionFuture {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let release = self.release.clone();
        Box::pin(async move {
            if call == 0 {
                release.notified().await;
            }
            Ok(BehaviorDecision::Idle {
                reason: "pondered".to_string(),
            })
        })
    }
}

#[tokio::test]
async fn one_decision_in_flight_per_agent() {
    let calls = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(Notify::new());
    let handle = handle_with(
        Arc::new(GatedDecider {
            calls: calls.clone(),
            release: release.clone(),
        }),
        SimConfig::default(),
    );

    let mut clock = wall_ms();
    let requests = { handle.engine().lock().await.tick(clock, 0.05).requests };
    assert_eq!(requests.len(), 1);

    let task = {
        let handle = handle.clone();
        let request = requests[0].clone();
        tokio::spawn(async move { handle.run_decision(request, clock).await })
    };
    tokio::task::yield_now().await;

    // While the first decision is parked, no tick hands out another.
    for _ in 0..20 {
        clock += 50;
        let requests = { handle.engine().lock().await.tick(clock, 0.05).requests };
        assert!(requests.is_empty());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    release.notify_one();
    task.await.expect("decision task");
    let engine = handle.engine().lock().await;
    assert_eq!(
        engine.world().agent("char_1").unwrap().thought.as_deref(),
        Some("pondered")
    );
}

#[tokio::test]
async fn interrupt_mid_flight_discards_the_stale_decision() {
    let calls = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(Notify::new());
    let handle = handle_with(
        Arc::new(GatedDecider {
            calls: calls.clone(),
            release: release.clone(),
        }),
        SimConfig::default(),
    );

    let mut clock = wall_ms();
    let requests = { handle.engine().lock().await.tick(clock, 0.05).requests };
    let task = {
        let handle = handle.clone();
        let request = requests[0].clone();
        tokio::spawn(async move { handle.run_decision(request, clock).await })
    };
    tokio::task::yield_now().await;

    // A need collapses while the decider is out.
    let mut discard_rx = {
        let mut engine = handle.engine().lock().await;
        engine.world_mut().agent_mut("char_1").unwrap().needs.bladder = 15.0001;
        engine.events().subscribe_activity()
    };
    let mut interrupted = false;
    for _ in 0..200 {
        clock += 50;
        let requests = { handle.engine().lock().await.tick(clock, 0.05).requests };
        if requests
            .iter()
            .any(|request| matches!(request.trigger, contracts::DecisionTrigger::Interrupt(_)))
        {
            interrupted = true;
            break;
        }
    }
    assert!(interrupted);

    release.notify_one();
    task.await.expect("decision task");

    let mut discarded = false;
    while let Ok(event) = discard_rx.try_recv() {
        if matches!(event, ActivityEvent::DecisionDiscarded { .. }) {
            discarded = true;
        }
    }
    assert!(discarded);
    let engine = handle.engine().lock().await;
    // The parked idle thought never landed.
    assert_ne!(
        engine.world().agent("char_1").unwrap().thought.as_deref(),
        Some("pondered")
    );
}

#[tokio::test]
async fn hungry_agent_crosses_maps_and_eats() {
    let catalog = ActionCatalog::standard();
    let handle = handle_with(
        Arc::new(ScriptedDecider::new(catalog)),
        SimConfig::default(),
    );
    {
        let mut engine = handle.engine().lock().await;
        engine.world_mut().agent_mut("char_1").unwrap().needs.satiety = 20.0;
    }

    // Walk (1.6 s) + both fades (1 s) + cafe leg (0.8 s) at 20 Hz.
    run_ticks(&handle, 120).await;

    let engine = handle.engine().lock().await;
    let agent = engine.world().agent("char_1").unwrap();
    assert_eq!(agent.current_map_id, "cafe");
    assert!(!agent.is_navigating());
    assert_eq!(
        agent.current_action.as_ref().map(|a| a.action_id.as_str()),
        Some("eat")
    );
}

// ---------------------------------------------------------------------------
// Checkpoint fan-out
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingStore {
    saved: Mutex<Vec<PersistedWorldState>>,
}

impl StateStore for RecordingStore {
    fn save_state(&self, state: &PersistedWorldState) -> Result<(), StoreError> {
        self.saved.lock().unwrap().push(state.clone());
        Ok(())
    }

    fn load_state(&self) -> Result<Option<PersistedWorldState>, StoreError> {
        Ok(self.saved.lock().unwrap().last().cloned())
    }

    fn append_activity(&self, _event: &ActivityEvent) -> Result<(), StoreError> {
        Ok(())
    }

    fn recent_activity(&self, _limit: usize) -> Result<Vec<ActivityEvent>, StoreError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn checkpoints_reach_the_store_without_blocking_ticks() {
    let store = Arc::new(RecordingStore::default());
    let config = SimConfig {
        snapshot_every_ticks: 10,
        ..SimConfig::default()
    };
    let catalog = ActionCatalog::standard();
    let handle =
        handle_with(Arc::new(ScriptedDecider::new(catalog)), config).with_store(store.clone());

    run_ticks(&handle, 25).await;
    // Saves run on the blocking pool; give them a beat to land.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let saved = store.saved.lock().unwrap();
    assert!(saved.len() >= 2);
    assert_eq!(saved[0].agents.len(), 1);
    assert_eq!(saved[0].schema_version, "town.v1");
}
