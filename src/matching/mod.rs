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

//! Structural correspondence between residues and block templates.
//!
//! For each residue-sized window of the atomistic graph, the [`Matcher`]
//! searches for an injective mapping from the reference atoms of the residue's
//! block template to observed atoms, under element, degree and connectivity
//! constraints. The search is a constrained backtracking isomorphism search
//! with an explicit stack and a node budget, not a brute-force permutation
//! search.

mod search;

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::errors::{ResidueError, ResidueSite};
use crate::forcefield::Block;
use crate::graph::{AdjacencyList, MoleculeGraph};

/// One residue-sized window of the atomistic graph: the atoms sharing a
/// `(chain, resid)` key, plus the directly bonded anchor atoms from
/// neighboring residues. Anchors are not matchable to reference atoms; they
/// exist to detect inter-residue connectivity and are exempt from the
/// unmatched-atom anomaly.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidueWindow {
    /// Where the residue sits in the input
    pub site: ResidueSite,
    /// Identities of the atoms belonging to the residue, ascending
    pub atoms: Vec<usize>,
    /// Identities of bonded atoms in other residues, ascending
    pub anchors: Vec<usize>,
}

/// Group the atoms of a molecule into residue windows, ordered by chain and
/// then residue number so that traversal, bead numbering and interaction
/// ordering are reproducible.
pub fn residue_windows(graph: &MoleculeGraph) -> Vec<ResidueWindow> {
    let mut grouped: BTreeMap<(String, isize), Vec<usize>> = BTreeMap::new();
    for atom in graph.atoms() {
        grouped
            .entry((atom.chain.clone(), atom.resid))
            .or_default()
            .push(atom.index);
    }

    let adjacency = graph.adjacency();
    grouped
        .into_iter()
        .map(|((chain, resid), atoms)| {
            let resname = graph.atom(atoms[0]).map(|a| a.resname.clone()).unwrap_or_default();
            let anchors: Vec<usize> = atoms
                .iter()
                .flat_map(|&i| adjacency.neighbors(i))
                .copied()
                .filter(|n| !atoms.contains(n))
                .sorted()
                .dedup()
                .collect();
            ResidueWindow {
                site: ResidueSite {
                    chain,
                    resid,
                    resname,
                },
                atoms,
                anchors,
            }
        })
        .collect()
}

/// An injective partial map from reference-atom names to observed atom
/// identities for one residue instance. Covers all mandatory reference atoms
/// of the matched block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Correspondence {
    map: BTreeMap<String, usize>,
}

impl Correspondence {
    /// Observed atom mapped to a reference-atom name.
    pub fn get(&self, name: &str) -> Option<usize> {
        self.map.get(name).copied()
    }

    /// All `(reference name, atom identity)` pairs, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.map.iter().map(|(name, &atom)| (name.as_str(), atom))
    }

    /// All mapped atom identities.
    pub fn atoms(&self) -> impl Iterator<Item = usize> + '_ {
        self.map.values().copied()
    }

    /// Number of mapped reference atoms.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl FromIterator<(String, usize)> for Correspondence {
    fn from_iter<T: IntoIterator<Item = (String, usize)>>(iter: T) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

/// A successfully matched residue, carried through mapping and topology
/// synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidueMatch {
    /// The window that was matched
    pub window: ResidueWindow,
    /// Name of the matched block
    pub block_name: String,
    /// Variant of the matched block, if any
    pub block_variant: Option<String>,
    /// Reference-atom to observed-atom correspondence
    pub correspondence: Correspondence,
}

/// Matches residue windows against block templates.
pub struct Matcher<'a> {
    graph: &'a MoleculeGraph,
    adjacency: AdjacencyList,
    budget: usize,
}

impl<'a> Matcher<'a> {
    /// New matcher over a molecule. `budget` bounds the number of search
    /// nodes spent per residue.
    pub fn new(graph: &'a MoleculeGraph, budget: usize) -> Self {
        Self {
            graph,
            adjacency: graph.adjacency(),
            budget,
        }
    }

    /// Find the correspondence between a residue window and a block template.
    ///
    /// On success also returns the names of window atoms that were left
    /// unmatched without being declared optional, for anomaly reporting.
    pub fn match_block(
        &self,
        window: &ResidueWindow,
        block: &Block,
    ) -> Result<(Correspondence, Vec<String>), ResidueError> {
        // template atoms in assignment order: mandatory first, declaration
        // order within each group
        let order: Vec<usize> = (0..block.atoms().len())
            .sorted_by_key(|&i| (*block.atoms()[i].optional(), i))
            .collect();
        let slot_of: BTreeMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(slot, &i)| (block.atoms()[i].name().as_str(), slot))
            .collect();

        let slots: Vec<search::Slot> = order
            .iter()
            .map(|&i| {
                let reference = &block.atoms()[i];
                let candidates = window
                    .atoms
                    .iter()
                    .copied()
                    .filter(|&atom| self.compatible(reference, atom))
                    .collect();
                let adjacent = block
                    .direct_edges_of(reference.name())
                    .map(|edge| {
                        let other = if edge.atoms()[0] == *reference.name() {
                            &edge.atoms()[1]
                        } else {
                            &edge.atoms()[0]
                        };
                        slot_of[other.as_str()]
                    })
                    .sorted()
                    .dedup()
                    .collect();
                search::Slot {
                    candidates,
                    optional: *reference.optional(),
                    adjacent,
                }
            })
            .collect();

        // a mandatory reference atom without any compatible candidate cannot
        // be matched; report before searching
        let missing: Vec<String> = order
            .iter()
            .enumerate()
            .filter(|&(slot, &i)| !block.atoms()[i].optional() && slots[slot].candidates.is_empty())
            .map(|(_, &i)| block.atoms()[i].name().clone())
            .collect();
        if !missing.is_empty() {
            return Err(ResidueError::IncompleteMatch {
                site: window.site.clone(),
                missing,
            });
        }

        let via_edges = block
            .edges()
            .iter()
            .filter(|edge| !edge.via().is_empty())
            .map(|edge| search::ViaEdgeFlat {
                path: std::iter::once(&edge.atoms()[0])
                    .chain(edge.via().iter())
                    .chain(std::iter::once(&edge.atoms()[1]))
                    .map(|name| slot_of[name.as_str()])
                    .collect(),
            })
            .collect();

        let problem = search::Problem {
            slots,
            via_edges,
            adjacency: &self.adjacency,
            budget: self.budget,
        };

        let exhausted = search::enumerate(&problem).map_err(|_| {
            ResidueError::SearchBudgetExceeded {
                site: window.site.clone(),
                budget: self.budget,
            }
        })?;

        if exhausted.solutions.is_empty() {
            // structurally impossible although every atom had candidates;
            // report the mandatory names unassigned in the deepest attempt
            let missing = order
                .iter()
                .enumerate()
                .filter(|&(slot, &i)| {
                    !block.atoms()[i].optional() && exhausted.deepest[slot].is_none()
                })
                .map(|(_, &i)| block.atoms()[i].name().clone())
                .collect();
            return Err(ResidueError::IncompleteMatch {
                site: window.site.clone(),
                missing,
            });
        }

        let chosen = self.select(window, block, &order, exhausted.solutions)?;
        let correspondence: Correspondence = order
            .iter()
            .enumerate()
            .filter_map(|(slot, &i)| {
                chosen[slot].map(|atom| (block.atoms()[i].name().clone(), atom))
            })
            .collect();

        let unmatched = window
            .atoms
            .iter()
            .filter(|&&atom| !correspondence.atoms().any(|a| a == atom))
            .filter_map(|&atom| self.graph.atom(atom))
            .map(|atom| atom.name.clone())
            .collect();

        Ok((correspondence, unmatched))
    }

    /// Attribute compatibility between a reference atom and a candidate.
    fn compatible(&self, reference: &crate::forcefield::RefAtom, atom: usize) -> bool {
        let Some(observed) = self.graph.atom(atom) else {
            return false;
        };
        if let (Some(expected), Some(element)) = (reference.element(), &observed.element) {
            if !expected.eq_ignore_ascii_case(element) {
                return false;
            }
        }
        if let Some(max_degree) = reference.degree() {
            if self.adjacency.degree(atom) > *max_degree {
                return false;
            }
        }
        true
    }

    /// Pick one solution deterministically, or fail with
    /// [`ResidueError::AmbiguousMatch`].
    ///
    /// Preference order: most reference atoms assigned, then most name-exact
    /// assignments. A remaining tie is the canonical symmetric-template case
    /// and benign as long as every slot maps to atoms of the same element in
    /// all tied solutions; the lexicographically smallest assignment is then
    /// chosen. Tied solutions that disagree on elements are a true ambiguity.
    fn select(
        &self,
        window: &ResidueWindow,
        block: &Block,
        order: &[usize],
        solutions: Vec<Vec<Option<usize>>>,
    ) -> Result<Vec<Option<usize>>, ResidueError> {
        let score = |solution: &Vec<Option<usize>>| {
            let assigned = solution.iter().flatten().count();
            let exact = solution
                .iter()
                .enumerate()
                .filter(|(slot, atom)| {
                    atom.and_then(|a| self.graph.atom(a))
                        .is_some_and(|a| a.name == *block.atoms()[order[*slot]].name())
                })
                .count();
            (assigned, exact)
        };

        let best = solutions.iter().map(score).max().expect("non-empty");
        let mut bests: Vec<Vec<Option<usize>>> = solutions
            .into_iter()
            .filter(|s| score(s) == best)
            .collect();
        if bests.len() > 1 {
            let elements = |solution: &Vec<Option<usize>>| -> Vec<Option<String>> {
                solution
                    .iter()
                    .map(|atom| {
                        atom.and_then(|a| self.graph.atom(a))
                            .and_then(|a| a.element.clone())
                    })
                    .collect()
            };
            let reference = elements(&bests[0]);
            if bests.iter().skip(1).any(|s| elements(s) != reference) {
                return Err(ResidueError::AmbiguousMatch {
                    site: window.site.clone(),
                    candidates: bests.len(),
                });
            }
            log::debug!(
                "residue {}: {} equivalent correspondences, picking the smallest",
                window.site,
                bests.len()
            );
            bests.sort_by_key(|s| {
                s.iter()
                    .map(|atom| atom.unwrap_or(usize::MAX))
                    .collect::<Vec<_>>()
            });
        }
        Ok(bests.swap_remove(0))
    }
}
