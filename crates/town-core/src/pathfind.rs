//! Unweighted BFS pathfinding over a map's node graph.
//!
//! Paths are shortest by hop count with FIFO discovery order as the
//! tie-break. Node coordinates are deliberately ignored here; switching to
//! a Euclidean-weighted search would change which of several equal-hop
//! paths wins and break replay comparisons.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use contracts::WorldMap;

/// Find a path from `start_id` to `end_id` avoiding `blocked` nodes.
///
/// Returns `[start_id]` when start and end coincide, and an empty vector
/// when either endpoint is unknown, the destination is blocked, or no
/// route survives the blocked set. The destination check runs before any
/// traversal so a blocked destination short-circuits immediately. The
/// returned path never contains a blocked node.
pub fn find_path(
    map: &WorldMap,
    start_id: &str,
    end_id: &str,
    blocked: &BTreeSet<String>,
) -> Vec<String> {
    let nodes: BTreeMap<&str, &contracts::PathNode> = map
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), node))
        .collect();

    if !nodes.contains_key(start_id) || !nodes.contains_key(end_id) {
        return Vec::new();
    }
    if blocked.contains(end_id) {
        return Vec::new();
    }
    if start_id == end_id {
        return vec![start_id.to_string()];
    }
    if blocked.contains(start_id) {
        // The agent itself may stand on a node someone else considers
        // blocked; a start inside the blocked set still cannot expand.
        return Vec::new();
    }

    let mut queue = VecDeque::new();
    let mut visited = BTreeSet::new();
    let mut parent: BTreeMap<&str, &str> = BTreeMap::new();

    queue.push_back(start_id);
    visited.insert(start_id);

    while let Some(current) = queue.pop_front() {
        if current == end_id {
            return reconstruct(&parent, start_id, end_id);
        }
        let Some(node) = nodes.get(current) else {
            continue;
        };
        for neighbor_id in &node.connected_to {
            let neighbor_id = neighbor_id.as_str();
            if visited.contains(neighbor_id)
                || blocked.contains(neighbor_id)
                || !nodes.contains_key(neighbor_id)
            {
                continue;
            }
            visited.insert(neighbor_id);
            parent.insert(neighbor_id, current);
            queue.push_back(neighbor_id);
        }
    }

    Vec::new()
}

fn reconstruct(parent: &BTreeMap<&str, &str>, start_id: &str, end_id: &str) -> Vec<String> {
    let mut path = vec![end_id.to_string()];
    let mut cursor = end_id;
    while cursor != start_id {
        match parent.get(cursor) {
            Some(previous) => {
                path.push((*previous).to_string());
                cursor = previous;
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}
