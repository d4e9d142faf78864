// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compute-order resolution.
//!
//! Topologically sorts nodes using edges as the "runs before" relation.
//! When several nodes are ready at once the one inserted first wins, so the
//! order is reproducible for an unchanged graph. Cycles are reported with
//! every participating node; nothing is repaired here.

use crate::edge::Edge;
use crate::error::{GraphError, Result};
use crate::node::NodeId;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Dependency relation over node indices
struct Dependencies {
    successors: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
}

impl Dependencies {
    fn build<'e>(nodes: &[NodeId], edges: impl IntoIterator<Item = &'e Edge>) -> Self {
        let index: HashMap<NodeId, usize> = nodes.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut successors = vec![Vec::new(); nodes.len()];
        let mut in_degree = vec![0; nodes.len()];

        for edge in edges {
            let (Some(&from), Some(&to)) = (index.get(&edge.from_node), index.get(&edge.to_node)) else {
                continue;
            };
            successors[from].push(to);
            in_degree[to] += 1;
        }

        Self {
            successors,
            in_degree,
        }
    }
}

/// Order `nodes` so every edge's output node precedes its input node.
///
/// `nodes` must be in insertion order; edges naming unknown nodes are
/// ignored. Fails with [`GraphError::CycleDetected`] naming every node on a
/// cycle.
pub fn compute_order<'e>(nodes: &[NodeId], edges: impl IntoIterator<Item = &'e Edge>) -> Result<Vec<NodeId>> {
    let Dependencies {
        successors,
        mut in_degree,
    } = Dependencies::build(nodes, edges);

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &deg)| deg == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(current)) = ready.pop() {
        order.push(nodes[current]);
        for &next in &successors[current] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() < nodes.len() {
        let members = cycle_members(&successors);
        return Err(GraphError::CycleDetected {
            nodes: members.into_iter().map(|i| nodes[i]).collect(),
        });
    }

    Ok(order)
}

/// Group a valid order into levels of mutually independent nodes.
///
/// Every node in level `n` depends only on nodes in levels `< n`, so a
/// concurrent scheduler may run each level in parallel.
pub fn dependency_levels<'e>(order: &[NodeId], edges: impl IntoIterator<Item = &'e Edge>) -> Vec<Vec<NodeId>> {
    let position: HashMap<NodeId, usize> = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut predecessors = vec![Vec::new(); order.len()];
    for edge in edges {
        if let (Some(&from), Some(&to)) = (position.get(&edge.from_node), position.get(&edge.to_node)) {
            predecessors[to].push(from);
        }
    }

    let mut level = vec![0usize; order.len()];
    let mut levels: Vec<Vec<NodeId>> = Vec::new();
    for (i, node) in order.iter().enumerate() {
        level[i] = predecessors[i]
            .iter()
            .filter(|&&p| p < i)
            .map(|&p| level[p] + 1)
            .max()
            .unwrap_or(0);
        if levels.len() <= level[i] {
            levels.resize_with(level[i] + 1, Vec::new);
        }
        levels[level[i]].push(*node);
    }
    levels
}

/// Indices of nodes lying on at least one cycle, ascending
fn cycle_members(successors: &[Vec<usize>]) -> Vec<usize> {
    let mut tarjan = Tarjan::new(successors);
    for v in 0..successors.len() {
        if tarjan.index[v].is_none() {
            tarjan.strong_connect(v);
        }
    }

    let mut members: Vec<usize> = tarjan
        .components
        .into_iter()
        .filter(|c| c.len() > 1 || successors[c[0]].contains(&c[0]))
        .flatten()
        .collect();
    members.sort_unstable();
    members
}

/// Tarjan's strongly connected components
struct Tarjan<'a> {
    successors: &'a [Vec<usize>],
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<Vec<usize>>,
}

impl<'a> Tarjan<'a> {
    fn new(successors: &'a [Vec<usize>]) -> Self {
        let n = successors.len();
        Self {
            successors,
            index: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
        }
    }

    fn visit(&mut self, v: usize) {
        self.index[v] = Some(self.next_index);
        self.lowlink[v] = self.next_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;
    }

    /// Depth-first walk from `root` on an explicit frame stack of
    /// `(node, next successor position)`; recursion depth stays constant.
    fn strong_connect(&mut self, root: usize) {
        let successors = self.successors;
        self.visit(root);
        let mut frames = vec![(root, 0usize)];

        while let Some(frame) = frames.last_mut() {
            let v = frame.0;
            if let Some(&w) = successors[v].get(frame.1) {
                frame.1 += 1;
                match self.index[w] {
                    None => {
                        self.visit(w);
                        frames.push((w, 0));
                    }
                    Some(w_index) if self.on_stack[w] => {
                        self.lowlink[v] = self.lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[v]);
            }
            if Some(self.lowlink[v]) == self.index[v] {
                let mut component = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                self.components.push(component);
            }
        }
    }
}
