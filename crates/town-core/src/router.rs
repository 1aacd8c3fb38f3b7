//! Cross-map route composition.
//!
//! Maps form their own graph whose edges are entrance nodes carrying a
//! `leads_to` link. Planning walks that graph breadth-first and resolves
//! every hop with a same-map pathfinder call, so a route only exists when
//! each of its segments survives that map's blocked-node set.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use contracts::{Route, RouteSegment, WorldMap};

use crate::pathfind::find_path;

const EMPTY_BLOCKED: &BTreeSet<String> = &BTreeSet::new();

/// Plan a multi-segment route from (`start_map_id`, `start_node_id`) to
/// (`target_map_id`, `target_node_id`).
///
/// Segments are ordered; each holds the walkable path inside one map. A
/// segment may be a single-node stub when the agent already stands on the
/// entrance it must take. Returns `None` when no composed route exists.
pub fn plan_route(
    maps: &BTreeMap<String, WorldMap>,
    start_map_id: &str,
    start_node_id: &str,
    target_map_id: &str,
    target_node_id: &str,
    blocked_per_map: &BTreeMap<String, BTreeSet<String>>,
) -> Option<Route> {
    if !maps.contains_key(start_map_id) || !maps.contains_key(target_map_id) {
        return None;
    }

    let blocked = |map_id: &str| blocked_per_map.get(map_id).unwrap_or(EMPTY_BLOCKED);

    // Same-map request degenerates to a single segment.
    if start_map_id == target_map_id {
        let map = maps.get(start_map_id)?;
        let path = find_path(map, start_node_id, target_node_id, blocked(start_map_id));
        if path.is_empty() {
            return None;
        }
        return Some(Route {
            segments: vec![RouteSegment {
                map_id: start_map_id.to_string(),
                path,
            }],
        });
    }

    // Breadth-first search over (map, arrival node) states. Tracking the
    // arrival node matters: different entrances into the same map can make
    // different onward hops reachable once nodes are blocked.
    struct State {
        map_id: String,
        node_id: String,
        segments: Vec<RouteSegment>,
    }

    let mut queue = VecDeque::new();
    let mut visited: BTreeSet<(String, String)> = BTreeSet::new();

    queue.push_back(State {
        map_id: start_map_id.to_string(),
        node_id: start_node_id.to_string(),
        segments: Vec::new(),
    });
    visited.insert((start_map_id.to_string(), start_node_id.to_string()));

    while let Some(state) = queue.pop_front() {
        let Some(map) = maps.get(&state.map_id) else {
            continue;
        };

        if state.map_id == target_map_id {
            let path = find_path(map, &state.node_id, target_node_id, blocked(&state.map_id));
            if !path.is_empty() {
                let mut segments = state.segments;
                segments.push(RouteSegment {
                    map_id: state.map_id,
                    path,
                });
                return Some(Route { segments });
            }
            // Entered the target map but cannot reach the node from this
            // entrance; other entrances may still work.
            continue;
        }

        for entrance in map.entrances() {
            let Some(link) = entrance.leads_to.as_ref() else {
                continue;
            };
            let key = (link.map_id.clone(), link.node_id.clone());
            if visited.contains(&key) || !maps.contains_key(&link.map_id) {
                continue;
            }
            let path = find_path(map, &state.node_id, &entrance.id, blocked(&state.map_id));
            if path.is_empty() {
                continue;
            }
            visited.insert(key);
            let mut segments = state.segments.clone();
            segments.push(RouteSegment {
                map_id: state.map_id.clone(),
                path,
            });
            queue.push_back(State {
                map_id: link.map_id.clone(),
                node_id: link.node_id.clone(),
                segments,
            });
        }
    }

    None
}
