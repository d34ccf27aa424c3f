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

//! Bonds between atoms

use std::collections::{BTreeMap, HashSet, VecDeque};

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use unordered_pair::UnorderedPair;
use validator::Validate;

/// Bond order describing the multiplicity of a bond between two atoms.
///
/// See <https://en.wikipedia.org/wiki/Bond_order> for more information.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub enum BondOrder {
    #[default]
    /// Undefined bond order
    Unspecified,
    /// Single bond, e.g. diatomic hydrogen, H–H
    Single,
    /// Double bond, e.g. diatomic oxygen, O=O
    Double,
    /// Triple bond, e.g. diatomic nitrogen, N≡N
    Triple,
    Amide,
    Aromatic,
}

/// Describes a bond between two atoms.
///
/// The bond is undirected; the stored index order is preserved but carries no
/// meaning. Edges are the sole source of connectivity in a molecular graph,
/// and never inferred from interatomic distances.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Validate, Getters)]
#[serde(deny_unknown_fields)]
pub struct Bond {
    /// Indices of the two atoms in the bond
    #[validate(custom(function = "super::validate_unique_indices"))]
    index: [usize; 2],
    /// Bond order
    #[serde(default)]
    order: BondOrder,
}

impl Bond {
    /// Create new bond. This function performs no sanity checks.
    pub const fn new(index: [usize; 2], order: BondOrder) -> Self {
        Self { index, order }
    }

    /// Check if the bond contains atom with index.
    pub fn contains(&self, index: usize) -> bool {
        self.index.contains(&index)
    }

    /// Check if the bond joins the two given atoms, in either order.
    pub fn connects(&self, i: usize, j: usize) -> bool {
        UnorderedPair(self.index[0], self.index[1]) == UnorderedPair(i, j)
    }

    /// Given one endpoint, the other. `None` if `index` is not an endpoint.
    pub fn other(&self, index: usize) -> Option<usize> {
        match self.index {
            [a, b] if a == index => Some(b),
            [a, b] if b == index => Some(a),
            _ => None,
        }
    }

    /// Shift both indices by a given offset.
    pub fn shift(&mut self, offset: usize) {
        for i in &mut self.index {
            *i += offset;
        }
    }
}

/// Adjacency list built from bonds, keyed by atom identity.
///
/// Atom identities need not be contiguous. Used for neighbor queries during
/// matching and for bond-walking algorithms such as the transitive exclusion
/// derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjacencyList {
    neighbors: BTreeMap<usize, Vec<usize>>,
}

impl AdjacencyList {
    /// Build from a bond list; `atoms` lists every atom identity so that
    /// isolated atoms are represented too.
    pub fn new(atoms: impl IntoIterator<Item = usize>, bonds: &[Bond]) -> Self {
        let mut neighbors: BTreeMap<usize, Vec<usize>> =
            atoms.into_iter().map(|i| (i, Vec::new())).collect();
        for bond in bonds {
            let [i, j] = *bond.index();
            neighbors.entry(i).or_default().push(j);
            neighbors.entry(j).or_default().push(i);
        }
        // sorted neighbor lists make all downstream traversal deterministic
        for list in neighbors.values_mut() {
            list.sort_unstable();
        }
        Self { neighbors }
    }

    /// Neighbors of the given atom, sorted by index. Empty if unknown.
    pub fn neighbors(&self, index: usize) -> &[usize] {
        self.neighbors.get(&index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of bonds at the given atom.
    pub fn degree(&self, index: usize) -> usize {
        self.neighbors(index).len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn num_atoms(&self) -> usize {
        self.neighbors.len()
    }

    /// Uses BFS from each atom to find all pairs within `max_distance` bonds.
    pub fn pairs_within(&self, max_distance: usize) -> HashSet<UnorderedPair<usize>> {
        let mut pairs = HashSet::new();
        let mut distances: BTreeMap<usize, usize> = BTreeMap::new();
        let mut queue = VecDeque::new();

        for &start in self.neighbors.keys() {
            distances.clear();
            distances.insert(start, 0);
            queue.push_back(start);

            while let Some(current) = queue.pop_front() {
                let d = distances[&current];

                if current != start {
                    pairs.insert(UnorderedPair(start, current));
                }

                if d < max_distance {
                    for &neighbour in self.neighbors(current) {
                        if !distances.contains_key(&neighbour) {
                            distances.insert(neighbour, d + 1);
                            queue.push_back(neighbour);
                        }
                    }
                }
            }
        }
        pairs
    }
}
