//! Static world geometry: maps, path nodes, obstacles, and facilities.
//! These structures are produced by an external loader and are immutable
//! once handed to the engine.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Facing direction for rendering, derived from the dominant axis of the
/// movement vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    /// Direction an agent faces when moving from `from` toward `to`.
    pub fn facing(from: &Position, to: &Position) -> Self {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        if dx.abs() >= dy.abs() {
            if dx >= 0.0 {
                Direction::Right
            } else {
                Direction::Left
            }
        } else if dy >= 0.0 {
            Direction::Down
        } else {
            Direction::Up
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Waypoint,
    Entrance,
    Spawn,
}

/// Cross-map edge carried by entrance nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLink {
    pub map_id: String,
    pub node_id: String,
}

/// A vertex in a map's walk graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub kind: NodeKind,
    pub connected_to: Vec<String>,
    #[serde(default)]
    pub leads_to: Option<MapLink>,
}

impl PathNode {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Axis-aligned bounds for obstacles and facilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn center(&self) -> Position {
        Position::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Containment check with the rect inflated by `margin` on every side.
    pub fn contains_with_margin(&self, point: &Position, margin: f64) -> bool {
        point.x >= self.x - margin
            && point.x <= self.x + self.width + margin
            && point.y >= self.y - margin
            && point.y <= self.y + self.height + margin
    }
}

/// Facility attributes attached to an obstacle. Tags drive which abstract
/// actions the facility supports, resolved through the action catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub tags: Vec<String>,
    #[serde(default)]
    pub cost: i64,
    #[serde(default)]
    pub quality: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: String,
    pub bounds: Rect,
    #[serde(default)]
    pub facility: Option<Facility>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldMap {
    pub id: String,
    pub nodes: Vec<PathNode>,
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
    pub spawn_node_id: String,
}

impl WorldMap {
    pub fn node(&self, node_id: &str) -> Option<&PathNode> {
        self.nodes.iter().find(|node| node.id == node_id)
    }

    pub fn obstacle(&self, obstacle_id: &str) -> Option<&Obstacle> {
        self.obstacles
            .iter()
            .find(|obstacle| obstacle.id == obstacle_id)
    }

    /// Entrance nodes that lead into another map.
    pub fn entrances(&self) -> impl Iterator<Item = &PathNode> {
        self.nodes
            .iter()
            .filter(|node| node.kind == NodeKind::Entrance && node.leads_to.is_some())
    }

    /// Nearest node to an arbitrary point, by Euclidean distance. Used to
    /// snap facility targets onto the walk graph.
    pub fn nearest_node(&self, point: &Position) -> Option<&PathNode> {
        self.nodes.iter().min_by(|a, b| {
            let da = a.position().distance_to(point);
            let db = b.position().distance_to(point);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}
