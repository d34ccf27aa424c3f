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

//! Transitive derivation of nonbonded exclusions.

use unordered_pair::UnorderedPair;

use super::Interaction;
use crate::graph::{AdjacencyList, Bond, BondOrder};

/// All bead pairs within `distance` bonds of each other in the graph spanned
/// by the edge-generating interactions (bonds and constraints).
pub(super) fn from_bonded_graph(
    interactions: &[Interaction],
    bead_ids: impl IntoIterator<Item = usize>,
    distance: usize,
) -> Vec<UnorderedPair<usize>> {
    let bonds: Vec<Bond> = interactions
        .iter()
        .filter(|i| i.kind().generates_edge())
        .map(|i| Bond::new([i.beads()[0], i.beads()[1]], BondOrder::Unspecified))
        .collect();
    let adjacency = AdjacencyList::new(bead_ids, &bonds);
    let mut pairs: Vec<UnorderedPair<usize>> =
        adjacency.pairs_within(distance).into_iter().collect();
    pairs.sort_unstable_by_key(|p| (p.0.min(p.1), p.0.max(p.1)));
    pairs
}
