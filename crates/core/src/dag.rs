//! Removal of invisible operators from a plan graph.
//!
//! The graph is an arena of adjacency lists indexed by node position. An
//! invisible node is collapsed by pointing each of its predecessors at its
//! *first* successor; further successors of that node are not rerouted.
//! Invisible sinks simply drop their incoming edges.

use std::collections::HashMap;

use planwatch_common::NodeId;

use crate::model::{Edge, Node};

/// Keep visible nodes and reconnect them through collapsed invisible ones.
pub fn simplify(nodes: Vec<Node>, edges: &[Edge]) -> (Vec<Node>, Vec<Edge>) {
    let index = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id, i))
        .collect::<HashMap<NodeId, usize>>();
    let visible = nodes.iter().map(|n| n.is_visible).collect::<Vec<_>>();
    let arena_edges = edges
        .iter()
        .filter_map(|e| Some((*index.get(&e.from_id)?, *index.get(&e.to_id)?)))
        .collect::<Vec<_>>();

    let kept_edges = simplify_indices(&visible, &arena_edges)
        .into_iter()
        .map(|(from, to)| Edge {
            from_id: nodes[from].id,
            to_id: nodes[to].id,
        })
        .collect();
    let kept_nodes = nodes.into_iter().filter(|n| n.is_visible).collect();
    (kept_nodes, kept_edges)
}

/// Index-level core of [`simplify`]. Edge endpoints must be `< visible.len()`.
pub fn simplify_indices(visible: &[bool], edges: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let n = visible.len();
    let mut succ: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut pred: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(from, to) in edges {
        if from != to {
            link(&mut succ, &mut pred, from, to);
        }
    }

    for node in (0..n).filter(|&i| !visible[i]) {
        let incoming = std::mem::take(&mut pred[node]);
        let outgoing = std::mem::take(&mut succ[node]);
        for &p in &incoming {
            succ[p].retain(|&s| s != node);
        }
        for &s in &outgoing {
            pred[s].retain(|&p| p != node);
        }
        if let Some(&target) = outgoing.first() {
            for &p in &incoming {
                if p != target {
                    link(&mut succ, &mut pred, p, target);
                }
            }
        }
    }

    (0..n)
        .filter(|&i| visible[i])
        .flat_map(|from| succ[from].iter().map(move |&to| (from, to)))
        .collect()
}

fn link(succ: &mut [Vec<usize>], pred: &mut [Vec<usize>], from: usize, to: usize) {
    if !succ[from].contains(&to) {
        succ[from].push(to);
        pred[to].push(from);
    }
}
