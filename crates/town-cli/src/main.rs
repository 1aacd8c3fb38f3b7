//! Command-line entry point: serve the simulation over HTTP or run a
//! fixed number of ticks headless with the scripted decider.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use contracts::{
    ActionCatalog, AgentKind, Facility, MapLink, NodeKind, Obstacle, PathNode, Rect, ScheduleEntry,
    SimConfig, WorldMap,
};
use town_core::{
    run_loop, run_ticks, wall_ms, EngineHandle, ScriptedDecider, SimEngine, StateStore,
    TimedActionExecutor, WorldState,
};

const USAGE: &str = "usage: town <serve [addr] | run [ticks]> [--config file.json] [--db file.db]";

struct Args {
    command: String,
    value: Option<String>,
    config_path: Option<String>,
    db_path: String,
}

fn parse_args() -> Result<Args, Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let mut command = None;
    let mut value = None;
    let mut config_path = None;
    let mut db_path = "town.db".to_string();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config_path = Some(args.next().ok_or("--config needs a file path")?);
            }
            "--db" => {
                db_path = args.next().ok_or("--db needs a file path")?;
            }
            _ if command.is_none() => command = Some(arg),
            _ if value.is_none() => value = Some(arg),
            other => return Err(format!("unexpected argument: {other}\n{USAGE}").into()),
        }
    }

    Ok(Args {
        command: command.ok_or(USAGE)?,
        value,
        config_path,
        db_path,
    })
}

fn load_config(path: Option<&str>) -> Result<SimConfig, Box<dyn Error>> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(SimConfig::default()),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let args = parse_args()?;
    let config = load_config(args.config_path.as_deref())?;

    match args.command.as_str() {
        "serve" => {
            let addr: SocketAddr = args
                .value
                .as_deref()
                .unwrap_or("127.0.0.1:8080")
                .parse()?;
            serve(config, addr, &args.db_path).await
        }
        "run" => {
            let ticks: u64 = args.value.as_deref().unwrap_or("1200").parse()?;
            headless(config, ticks).await
        }
        other => Err(format!("unknown command: {other}\n{USAGE}").into()),
    }
}

async fn serve(config: SimConfig, addr: SocketAddr, db_path: &str) -> Result<(), Box<dyn Error>> {
    let store = Arc::new(town_api::SqliteStateStore::open(db_path)?);
    let mut engine = build_engine(config);
    match store.load_state() {
        Ok(Some(state)) => {
            tracing::info!(tick = state.tick, "restoring checkpoint");
            engine.restore(state);
        }
        Ok(None) => {}
        Err(err) => tracing::warn!(%err, "ignoring unreadable checkpoint"),
    }

    let catalog = engine.catalog().clone();
    let handle = EngineHandle::new(engine, Arc::new(ScriptedDecider::new(catalog)))
        .with_store(store.clone());

    let mut activity_rx = {
        let engine = handle.engine().lock().await;
        engine.events().subscribe_activity()
    };
    tokio::spawn(async move {
        loop {
            match activity_rx.recv().await {
                Ok(event) => {
                    let store = store.clone();
                    tokio::task::spawn_blocking(move || {
                        if let Err(err) = store.append_activity(&event) {
                            tracing::warn!(%err, "activity log write failed");
                        }
                    });
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "activity log writer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let loop_handle = handle.clone();
    tokio::spawn(async move {
        run_loop(loop_handle).await;
    });
    town_api::serve(handle, addr).await?;
    Ok(())
}

async fn headless(config: SimConfig, ticks: u64) -> Result<(), Box<dyn Error>> {
    let mut engine = build_engine(config);
    engine.world_mut().set_paused(false);
    let catalog = engine.catalog().clone();
    let handle = EngineHandle::new(engine, Arc::new(ScriptedDecider::new(catalog)));

    run_ticks(&handle, ticks).await;

    let engine = handle.engine().lock().await;
    let world = engine.world();
    println!("tick {} ({})", world.tick(), world.time());
    for agent in world.agents().values() {
        let doing = match (&agent.current_action, agent.is_navigating()) {
            (Some(action), _) => format!("doing {}", action.action_id),
            (None, true) => "walking".to_string(),
            (None, false) => agent
                .thought
                .clone()
                .map(|thought| format!("idle ({thought})"))
                .unwrap_or_else(|| "idle".to_string()),
        };
        println!(
            "  {} [{}] on {} at {}: {}",
            agent.name, agent.id, agent.current_map_id, agent.current_node_id, doing
        );
    }
    Ok(())
}

fn build_engine(config: SimConfig) -> SimEngine {
    let catalog = ActionCatalog::standard();
    let executor = TimedActionExecutor::new(catalog.clone(), config.time_scale);
    let mut world = WorldState::new(config, demo_maps(), wall_ms());
    spawn_demo_agents(&mut world);
    SimEngine::new(world, Box::new(executor), catalog)
}

// ---------------------------------------------------------------------------
// Demo world
// ---------------------------------------------------------------------------

fn waypoint(id: &str, x: f64, y: f64, connected: &[&str]) -> PathNode {
    PathNode {
        id: id.to_string(),
        x,
        y,
        kind: NodeKind::Waypoint,
        connected_to: connected.iter().map(|s| s.to_string()).collect(),
        leads_to: None,
    }
}

fn entrance(id: &str, x: f64, y: f64, connected: &[&str], to_map: &str, to_node: &str) -> PathNode {
    PathNode {
        id: id.to_string(),
        x,
        y,
        kind: NodeKind::Entrance,
        connected_to: connected.iter().map(|s| s.to_string()).collect(),
        leads_to: Some(MapLink {
            map_id: to_map.to_string(),
            node_id: to_node.to_string(),
        }),
    }
}

fn facility(id: &str, x: f64, y: f64, tags: &[&str], cost: i64, quality: i64) -> Obstacle {
    Obstacle {
        id: id.to_string(),
        bounds: Rect {
            x,
            y,
            width: 48.0,
            height: 48.0,
        },
        facility: Some(Facility {
            tags: tags.iter().map(|s| s.to_string()).collect(),
            cost,
            quality,
        }),
    }
}

/// Three maps: a town square connecting to a cafe and a home.
fn demo_maps() -> Vec<WorldMap> {
    let town = WorldMap {
        id: "town".to_string(),
        nodes: vec![
            waypoint("square", 320.0, 320.0, &["well", "cafe_door", "home_door"]),
            waypoint("well", 320.0, 160.0, &["square"]),
            entrance("cafe_door", 480.0, 320.0, &["square"], "cafe", "cafe_entry"),
            entrance("home_door", 160.0, 320.0, &["square"], "home", "home_entry"),
        ],
        obstacles: vec![
            facility("fountain", 296.0, 80.0, &["leisure"], 0, 60),
            facility("public_toilet", 352.0, 112.0, &["toilet"], 0, 30),
        ],
        spawn_node_id: "square".to_string(),
    };

    let cafe = WorldMap {
        id: "cafe".to_string(),
        nodes: vec![
            entrance("cafe_entry", 96.0, 320.0, &["cafe_floor"], "town", "cafe_door"),
            waypoint("cafe_floor", 224.0, 320.0, &["cafe_entry", "cafe_corner"]),
            waypoint("cafe_corner", 224.0, 192.0, &["cafe_floor"]),
        ],
        obstacles: vec![
            facility("counter", 264.0, 296.0, &["food"], 5, 70),
            facility("sofa", 184.0, 128.0, &["leisure"], 0, 50),
        ],
        spawn_node_id: "cafe_entry".to_string(),
    };

    let home = WorldMap {
        id: "home".to_string(),
        nodes: vec![
            entrance("home_entry", 352.0, 320.0, &["hall"], "town", "home_door"),
            waypoint("hall", 224.0, 320.0, &["home_entry", "bedroom"]),
            waypoint("bedroom", 224.0, 192.0, &["hall"]),
        ],
        obstacles: vec![
            facility("bed", 168.0, 136.0, &["bed"], 0, 80),
            facility("bathroom", 256.0, 136.0, &["bath", "toilet"], 0, 60),
            facility("fridge", 168.0, 360.0, &["food"], 0, 40),
        ],
        spawn_node_id: "home_entry".to_string(),
    };

    vec![town, cafe, home]
}

fn spawn_demo_agents(world: &mut WorldState) {
    let roster: [(&str, &str, AgentKind, &str); 4] = [
        ("char_mori", "Mori", AgentKind::Character, "home"),
        ("char_iri", "Iri", AgentKind::Character, "town"),
        ("npc_clerk", "Clerk", AgentKind::Npc, "cafe"),
        ("npc_keeper", "Keeper", AgentKind::Npc, "town"),
    ];
    for (agent_id, name, kind, map_id) in roster {
        if let Err(err) = world.spawn_agent(agent_id, name, kind, map_id) {
            tracing::warn!(%agent_id, %err, "failed to spawn demo agent");
        }
    }
    for (agent_id, schedule) in [
        (
            "char_mori",
            vec![(8, "breakfast"), (13, "cafe"), (22, "sleep")],
        ),
        ("char_iri", vec![(9, "stroll"), (12, "lunch"), (23, "sleep")]),
    ] {
        set_schedule(world, agent_id, &schedule);
    }
}

fn set_schedule(world: &mut WorldState, agent_id: &str, entries: &[(u8, &str)]) {
    let schedule: Vec<ScheduleEntry> = entries
        .iter()
        .map(|(hour, activity)| ScheduleEntry {
            hour: *hour,
            activity: activity.to_string(),
        })
        .collect();
    world.set_schedule(agent_id, schedule);
}
