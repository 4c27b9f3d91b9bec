//! Bounded traversal primitives shared by every [`GraphReader`].
//!
//! Both walks keep a visited bitmap, so graphs that already contain cycles
//! (multi-source classifications can disagree) always terminate.

use ahash::AHashMap;
use roaring::RoaringBitmap;
use std::collections::VecDeque;

use crate::facade::{Direction, EdgeKind, GraphReader, NodeId};

/// Breadth-first shortest path over outgoing `kind` edges.
///
/// Returns the node sequence `from ..= to`. A path from a node to itself is
/// the zero-hop path `[from]`. Paths longer than `max_hops` edges are reported
/// as absent.
pub fn shortest_path<G: GraphReader + ?Sized>(
    graph: &G,
    from: NodeId,
    to: NodeId,
    kind: EdgeKind,
    max_hops: usize,
) -> Option<Vec<NodeId>> {
    if !graph.contains_node(from) || !graph.contains_node(to) {
        return None;
    }
    if from == to {
        return Some(vec![from]);
    }

    let mut visited = RoaringBitmap::new();
    let mut came_from: AHashMap<NodeId, NodeId> = AHashMap::new();
    let mut queue: VecDeque<(NodeId, usize)> = VecDeque::new();
    visited.insert(from);
    queue.push_back((from, 0));

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_hops {
            continue;
        }
        for next in graph.neighbors(current, kind, Direction::Outgoing) {
            if !visited.insert(next) {
                continue;
            }
            came_from.insert(next, current);
            if next == to {
                return Some(rebuild(&came_from, from, to));
            }
            queue.push_back((next, depth + 1));
        }
    }

    None
}

fn rebuild(came_from: &AHashMap<NodeId, NodeId>, from: NodeId, to: NodeId) -> Vec<NodeId> {
    let mut path = vec![to];
    let mut cur = to;
    while cur != from {
        match came_from.get(&cur) {
            Some(&prev) => {
                path.push(prev);
                cur = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Depth-first preorder over outgoing `kind` edges, starting node included.
pub fn depth_first<G: GraphReader + ?Sized>(graph: &G, start: NodeId, kind: EdgeKind) -> Vec<NodeId> {
    let mut out = Vec::new();
    if !graph.contains_node(start) {
        return out;
    }

    let mut visited = RoaringBitmap::new();
    let mut stack = vec![start];
    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        out.push(current);
        let next = graph.neighbors(current, kind, Direction::Outgoing);
        // reversed so the first-created edge is explored first
        for n in next.into_iter().rev() {
            if !visited.contains(n) {
                stack.push(n);
            }
        }
    }
    out
}
