//! Shared fixtures for unit tests: a two-map world (town and cafe joined
//! by one entrance pair) with a handful of tagged facilities.

use contracts::{Facility, MapLink, NodeKind, Obstacle, PathNode, Rect, WorldMap};

pub fn now_ms() -> u64 {
    // Fixed wall-clock instant: some day at 08:00 local.
    1_000 * 86_400_000 + 8 * 3_600_000
}

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

fn facility(id: &str, x: f64, y: f64, tags: &[&str]) -> Obstacle {
    Obstacle {
        id: id.to_string(),
        bounds: Rect {
            x,
            y,
            width: 32.0,
            height: 32.0,
        },
        facility: Some(Facility {
            tags: tags.iter().map(|s| s.to_string()).collect(),
            cost: 0,
            quality: 50,
        }),
    }
}

/// town: t0(spawn) — t1 — t_door(entrance) <-> cafe: c_door(entrance,
/// spawn) — c0. The cafe counter sits beside its door; the town toilet
/// and bed sit near t1 and t0.
pub fn town_and_cafe_maps() -> Vec<WorldMap> {
    let town = WorldMap {
        id: "town".into(),
        nodes: vec![
            waypoint("t0", 0.0, 0.0, &["t1"]),
            waypoint("t1", 64.0, 0.0, &["t0", "t_door"]),
            entrance("t_door", 128.0, 0.0, &["t1"], "cafe", "c_door"),
        ],
        obstacles: vec![
            facility("town_toilet", 56.0, -48.0, &["toilet"]),
            facility("town_bed", -8.0, -48.0, &["bed"]),
        ],
        spawn_node_id: "t0".into(),
    };
    let cafe = WorldMap {
        id: "cafe".into(),
        nodes: vec![
            entrance("c_door", 0.0, 0.0, &["c0"], "town", "t_door"),
            waypoint("c0", 64.0, 0.0, &["c_door"]),
        ],
        obstacles: vec![facility("cafe_counter", 24.0, -40.0, &["food"])],
        spawn_node_id: "c_door".into(),
    };
    vec![town, cafe]
}
