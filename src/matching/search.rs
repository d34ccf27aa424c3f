// Copyright 2024 Mikael Lund
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

//! Backtracking subgraph-isomorphism search.
//!
//! The search assigns template slots to candidate atoms one slot at a time,
//! maintained on an explicit stack rather than the call stack, and returns a
//! result value for expected failures. Every assignment attempt consumes one
//! node of the caller-supplied budget so that pathological inputs abort
//! instead of hanging.

use crate::graph::AdjacencyList;

/// One template reference atom prepared for the search.
#[derive(Debug, Clone)]
pub(super) struct Slot {
    /// Candidate atom identities compatible with this slot, ascending
    pub candidates: Vec<usize>,
    /// Whether the slot may stay unassigned
    pub optional: bool,
    /// Slots connected to this one by a direct template edge
    pub adjacent: Vec<usize>,
}

/// Search input: prepared slots plus the molecular connectivity.
#[derive(Debug)]
pub(super) struct Problem<'a> {
    pub slots: Vec<Slot>,
    pub via_edges: Vec<ViaEdgeFlat>,
    pub adjacency: &'a AdjacencyList,
    /// Maximum number of assignment attempts
    pub budget: usize,
}

/// Flattened via edge: the full expected path as slot indices.
#[derive(Debug, Clone)]
pub(super) struct ViaEdgeFlat {
    /// Path of slots `[end, via.., end]`; consecutive assigned pairs must be
    /// bonded unless the endpoints are bonded directly
    pub path: Vec<usize>,
}

/// All complete assignments, or the budget-exceeded node count.
#[derive(Debug)]
pub(super) struct Exhausted {
    pub solutions: Vec<Vec<Option<usize>>>,
    /// The partial assignment with the most slots filled, for error reports
    pub deepest: Vec<Option<usize>>,
}

#[derive(Debug)]
pub(super) struct BudgetExceeded;

struct Frame {
    choices: Vec<Option<usize>>,
    next: usize,
}

/// Enumerate every injective, edge-consistent assignment of slots to atoms.
///
/// Mandatory slots must be assigned; optional slots may be skipped. A direct
/// template edge between two assigned slots requires a bond between the
/// mapped atoms. Via edges are verified once an assignment is complete.
pub(super) fn enumerate(problem: &Problem) -> Result<Exhausted, BudgetExceeded> {
    let n = problem.slots.len();
    let mut assignment: Vec<Option<usize>> = vec![None; n];
    let mut used: Vec<usize> = Vec::with_capacity(n);
    let mut solutions = Vec::new();
    let mut deepest: Vec<Option<usize>> = vec![None; n];
    let mut deepest_count = 0usize;
    let mut nodes = 0usize;

    if n == 0 {
        return Ok(Exhausted {
            solutions: vec![vec![]],
            deepest,
        });
    }

    let mut stack = vec![Frame {
        choices: choices_for(problem, 0, &assignment, &used),
        next: 0,
    }];

    while !stack.is_empty() {
        let slot = stack.len() - 1;
        let frame = stack.last_mut().unwrap();

        // undo this slot's previous choice before trying the next one
        if let Some(atom) = assignment[slot].take() {
            used.retain(|&a| a != atom);
        }

        if frame.next >= frame.choices.len() {
            stack.pop();
            continue;
        }

        let choice = frame.choices[frame.next];
        frame.next += 1;
        nodes += 1;
        if nodes > problem.budget {
            return Err(BudgetExceeded);
        }

        assignment[slot] = choice;
        if let Some(atom) = choice {
            used.push(atom);
        }

        let assigned_count = assignment.iter().flatten().count();
        if assigned_count > deepest_count {
            deepest_count = assigned_count;
            deepest = assignment.clone();
        }

        if slot + 1 == n {
            if via_edges_satisfied(problem, &assignment) {
                solutions.push(assignment.clone());
            }
        } else {
            stack.push(Frame {
                choices: choices_for(problem, slot + 1, &assignment, &used),
                next: 0,
            });
        }
    }

    Ok(Exhausted { solutions, deepest })
}

/// Valid choices for a slot under the current partial assignment: compatible,
/// unused atoms that are bonded to every already-assigned direct neighbor.
/// Optional slots additionally may stay empty (tried last).
fn choices_for(
    problem: &Problem,
    slot: usize,
    assignment: &[Option<usize>],
    used: &[usize],
) -> Vec<Option<usize>> {
    let reference = &problem.slots[slot];
    let mut choices: Vec<Option<usize>> = reference
        .candidates
        .iter()
        .filter(|&&atom| !used.contains(&atom))
        .filter(|&&atom| {
            reference.adjacent.iter().all(|&other| match assignment[other] {
                Some(partner) => problem.adjacency.neighbors(atom).contains(&partner),
                None => true,
            })
        })
        .map(|&atom| Some(atom))
        .collect();
    if reference.optional {
        choices.push(None);
    }
    choices
}

/// A via edge holds if its endpoints are directly bonded, or if all declared
/// intermediate slots are assigned and every consecutive pair along the path
/// is bonded. Edges with an unassigned endpoint are vacuously satisfied.
fn via_edges_satisfied(problem: &Problem, assignment: &[Option<usize>]) -> bool {
    problem.via_edges.iter().all(|edge| {
        let first = edge.path.first().and_then(|&s| assignment[s]);
        let last = edge.path.last().and_then(|&s| assignment[s]);
        let (Some(first), Some(last)) = (first, last) else {
            return true;
        };
        if problem.adjacency.neighbors(first).contains(&last) {
            return true;
        }
        let atoms: Option<Vec<usize>> = edge.path.iter().map(|&s| assignment[s]).collect();
        match atoms {
            Some(atoms) => atoms
                .windows(2)
                .all(|pair| problem.adjacency.neighbors(pair[0]).contains(&pair[1])),
            None => false,
        }
    })
}
