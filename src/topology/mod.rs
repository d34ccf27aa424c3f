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

//! Coarse-grained bonded topology: interaction instances and exclusions.
//!
//! A [`Topology`] holds the ordered list of bonded-interaction instances
//! generated for a coarse-grained molecule, plus the nonbonded exclusion
//! pairs derived from them. Instances reference beads by identity in the
//! coarse-grained [`MoleculeGraph`](crate::graph::MoleculeGraph).

mod builder;
mod exclusions;

use std::collections::HashMap;

pub use builder::TopologyBuilder;

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use unordered_pair::UnorderedPair;

use crate::errors::TopologyError;

/// Kind of a bonded interaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// Two-bead bond
    Bond,
    /// Rigid two-bead constraint; treated as a bond for exclusion purposes
    Constraint,
    /// Three-bead angle
    Angle,
    /// Four-bead proper dihedral
    Dihedral,
    /// Four-bead improper dihedral
    Improper,
    /// Constructed site; the first bead is built from the remaining ones
    VirtualSite,
    /// Explicit nonbonded exclusion between two beads
    Exclusion,
}

impl InteractionKind {
    /// Required number of participating beads, if fixed.
    pub fn arity(&self) -> Option<usize> {
        match self {
            InteractionKind::Bond | InteractionKind::Constraint | InteractionKind::Exclusion => {
                Some(2)
            }
            InteractionKind::Angle => Some(3),
            InteractionKind::Dihedral | InteractionKind::Improper => Some(4),
            InteractionKind::VirtualSite => None,
        }
    }

    /// Whether instances contribute an edge to the bonded graph from which
    /// exclusions are derived.
    pub fn generates_edge(&self) -> bool {
        matches!(self, InteractionKind::Bond | InteractionKind::Constraint)
    }

    /// Whether an instance over the reversed bead sequence denotes the same
    /// interaction. Not true for virtual sites, whose first bead is the
    /// constructed site.
    pub fn direction_symmetric(&self) -> bool {
        !matches!(self, InteractionKind::VirtualSite)
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            InteractionKind::Bond => "bond",
            InteractionKind::Constraint => "constraint",
            InteractionKind::Angle => "angle",
            InteractionKind::Dihedral => "dihedral",
            InteractionKind::Improper => "improper",
            InteractionKind::VirtualSite => "virtual_site",
            InteractionKind::Exclusion => "exclusion",
        };
        f.write_str(name)
    }
}

/// One instantiated bonded interaction over concrete bead identities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Getters)]
pub struct Interaction {
    /// Kind of interaction
    kind: InteractionKind,
    /// Ordered participating bead identities
    beads: Vec<usize>,
    /// Opaque parameter reference, handed through to the topology writer
    parameters: Vec<String>,
    /// Version tag; equal bead sets with distinct versions coexist
    version: u32,
}

impl Interaction {
    pub fn new(kind: InteractionKind, beads: Vec<usize>, parameters: Vec<String>) -> Self {
        Self {
            kind,
            beads,
            parameters,
            version: 0,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Identity under deduplication: kind, version, and the bead sequence in
    /// its direction-independent form (a bond 1-2 equals a bond 2-1, an
    /// angle 1-2-3 equals an angle 3-2-1, but virtual sites keep their
    /// direction).
    pub fn dedup_key(&self) -> (InteractionKind, u32, Vec<usize>) {
        let canonical = if self.kind.direction_symmetric() {
            let mut reversed = self.beads.clone();
            reversed.reverse();
            std::cmp::min(self.beads.clone(), reversed)
        } else {
            self.beads.clone()
        };
        (self.kind, self.version, canonical)
    }
}

/// Bead topology of one coarse-grained molecule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, Getters)]
pub struct Topology {
    /// Instantiated bonded interactions, in generation order
    interactions: Vec<Interaction>,
    /// Nonbonded exclusion pairs, sorted
    exclusions: Vec<UnorderedPair<usize>>,
}

impl Topology {
    /// Append an interaction instance.
    ///
    /// Instances of kind [`InteractionKind::Exclusion`] are routed into the
    /// exclusion list instead of the interaction list.
    pub fn add_interaction(&mut self, interaction: Interaction) {
        if *interaction.kind() == InteractionKind::Exclusion {
            let [i, j] = [interaction.beads[0], interaction.beads[1]];
            self.add_exclusion(i, j);
        } else {
            self.interactions.push(interaction);
        }
    }

    /// Append an exclusion pair; self-pairs and duplicates are ignored.
    pub fn add_exclusion(&mut self, i: usize, j: usize) {
        let pair = UnorderedPair(i, j);
        if i != j && !self.exclusions.contains(&pair) {
            self.exclusions.push(pair);
        }
    }

    /// All interactions of one kind, in generation order.
    pub fn find_interactions(&self, kind: InteractionKind) -> impl Iterator<Item = &Interaction> {
        self.interactions.iter().filter(move |i| *i.kind() == kind)
    }

    /// Drop exact duplicates (same kind, version, bead set in either order,
    /// same parameters), keeping the first occurrence. Interactions over the
    /// same bead set with *conflicting* parameters are reported and the first
    /// instantiation kept. Idempotent.
    pub fn deduplicate(&mut self) -> Vec<TopologyError> {
        let mut conflicts = Vec::new();
        let mut first_parameters: HashMap<(InteractionKind, u32, Vec<usize>), Vec<String>> =
            HashMap::new();
        let mut kept = Vec::with_capacity(self.interactions.len());

        for interaction in self.interactions.drain(..) {
            let key = interaction.dedup_key();
            match first_parameters.get(&key) {
                None => {
                    first_parameters.insert(key, interaction.parameters().clone());
                    kept.push(interaction);
                }
                Some(parameters) if parameters == interaction.parameters() => {
                    log::debug!(
                        "dropping duplicate {} over {:?}",
                        interaction.kind(),
                        interaction.beads()
                    );
                }
                Some(parameters) => {
                    conflicts.push(TopologyError::InteractionConflict {
                        kind: *interaction.kind(),
                        beads: key.2,
                        kept: parameters.clone(),
                        discarded: interaction.parameters().clone(),
                    });
                }
            }
        }
        self.interactions = kept;
        conflicts
    }

    /// Derive exclusions transitively from the bonded-interaction graph out
    /// to `distance` bonds, merge them with the explicit ones, and sort.
    pub fn derive_exclusions(
        &mut self,
        bead_ids: impl IntoIterator<Item = usize>,
        distance: usize,
    ) {
        let derived = exclusions::from_bonded_graph(&self.interactions, bead_ids, distance);
        for pair in derived {
            self.add_exclusion(pair.0, pair.1);
        }
        self.exclusions
            .sort_unstable_by_key(|p| (p.0.min(p.1), p.0.max(p.1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bond(i: usize, j: usize, parameters: &[&str]) -> Interaction {
        Interaction::new(
            InteractionKind::Bond,
            vec![i, j],
            parameters.iter().map(|p| p.to_string()).collect(),
        )
    }

    #[test]
    fn dedup_key_is_direction_independent() {
        let angle = Interaction::new(InteractionKind::Angle, vec![3, 2, 1], vec![]);
        let mirror = Interaction::new(InteractionKind::Angle, vec![1, 2, 3], vec![]);
        assert_eq!(angle.dedup_key(), mirror.dedup_key());
        let other = Interaction::new(InteractionKind::Angle, vec![2, 1, 3], vec![]);
        assert_ne!(angle.dedup_key(), other.dedup_key());
    }

    #[test]
    fn duplicates_are_dropped_conflicts_reported() {
        let mut topology = Topology::default();
        topology.add_interaction(bond(0, 1, &["1", "0.35"]));
        topology.add_interaction(bond(1, 0, &["1", "0.35"])); // exact duplicate, reversed
        topology.add_interaction(bond(0, 1, &["1", "0.47"])); // conflict
        topology.add_interaction(bond(1, 2, &["1", "0.35"]));

        let conflicts = topology.deduplicate();
        assert_eq!(topology.interactions().len(), 2);
        assert_eq!(conflicts.len(), 1);
        assert!(matches!(
            &conflicts[0],
            TopologyError::InteractionConflict { kept, discarded, .. }
                if kept == &vec!["1".to_string(), "0.35".to_string()]
                    && discarded == &vec!["1".to_string(), "0.47".to_string()]
        ));

        // kept parameters are the first instantiation
        assert_eq!(
            topology.interactions()[0].parameters(),
            &vec!["1".to_string(), "0.35".to_string()]
        );
    }

    #[test]
    fn deduplication_is_idempotent() {
        let mut topology = Topology::default();
        topology.add_interaction(bond(0, 1, &["a"]));
        topology.add_interaction(bond(0, 1, &["b"]));
        topology.add_interaction(bond(1, 2, &["a"]));
        let first = topology.deduplicate();
        assert_eq!(first.len(), 1);
        let snapshot = topology.clone();
        let second = topology.deduplicate();
        assert!(second.is_empty());
        assert_eq!(topology, snapshot);
    }

    #[test]
    fn virtual_sites_keep_their_direction() {
        let site = Interaction::new(InteractionKind::VirtualSite, vec![3, 0, 1, 2], vec![]);
        let reversed = Interaction::new(InteractionKind::VirtualSite, vec![2, 1, 0, 3], vec![]);
        assert_ne!(site.dedup_key(), reversed.dedup_key());

        let mut topology = Topology::default();
        topology.add_interaction(site);
        topology.add_interaction(reversed);
        assert!(topology.deduplicate().is_empty());
        assert_eq!(topology.interactions().len(), 2);
    }

    #[test]
    fn versions_keep_interactions_apart() {
        let mut topology = Topology::default();
        topology.add_interaction(bond(0, 1, &["a"]));
        topology.add_interaction(bond(0, 1, &["b"]).with_version(1));
        let conflicts = topology.deduplicate();
        assert!(conflicts.is_empty());
        assert_eq!(topology.interactions().len(), 2);
    }

    #[test]
    fn explicit_exclusions_are_routed() {
        let mut topology = Topology::default();
        topology.add_interaction(Interaction::new(
            InteractionKind::Exclusion,
            vec![0, 3],
            vec![],
        ));
        assert!(topology.interactions().is_empty());
        assert_eq!(topology.exclusions().len(), 1);
        // duplicate and self pairs ignored
        topology.add_exclusion(3, 0);
        topology.add_exclusion(1, 1);
        assert_eq!(topology.exclusions().len(), 1);
    }

    #[test]
    fn exclusions_from_bonds() {
        // linear beads 0-1-2-3
        let mut topology = Topology::default();
        topology.add_interaction(bond(0, 1, &[]));
        topology.add_interaction(bond(1, 2, &[]));
        topology.add_interaction(bond(2, 3, &[]));
        // angles must not create edges
        topology.add_interaction(Interaction::new(
            InteractionKind::Angle,
            vec![0, 1, 2],
            vec![],
        ));

        topology.derive_exclusions(0..4, 2);
        let pairs: Vec<(usize, usize)> = topology
            .exclusions()
            .iter()
            .map(|p| (p.0.min(p.1), p.0.max(p.1)))
            .collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2), (1, 3), (2, 3)]);
    }
}
