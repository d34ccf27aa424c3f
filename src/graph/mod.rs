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

//! Molecular graph of atoms (nodes) and bonds (edges).
//!
//! [`MoleculeGraph`] is the universal data structure passed between all
//! pipeline stages. The same type represents both the atomistic input and the
//! coarse-grained output; only the interpretation of the nodes changes with
//! the resolution.
//!
//! # Examples
//! ~~~
//! use coarsen::graph::{Atom, Bond, BondOrder, MoleculeGraph};
//! let mut water = MoleculeGraph::new("water");
//! water.add_atom(Atom::new(0, "OW")).unwrap();
//! water.add_atom(Atom::new(1, "HW1")).unwrap();
//! water.add_atom(Atom::new(2, "HW2")).unwrap();
//! assert!(water.add_atom(Atom::new(2, "HW3")).is_err()); // error: duplicate index
//!
//! water.add_bond(Bond::new([0, 1], BondOrder::Single)).unwrap();
//! water.add_bond(Bond::new([0, 2], BondOrder::Single)).unwrap();
//! assert_eq!(water.neighbors(0), vec![1, 2]);
//! ~~~

mod atom;
mod bond;

use std::collections::BTreeMap;

pub use atom::Atom;
pub use bond::{AdjacencyList, Bond, BondOrder};

use serde::{Deserialize, Serialize};
use validator::ValidationError;

use crate::errors::GraphError;

/// Check that all items of a collection are unique.
///
/// ## Parameters
/// - `collection` collection of items to compare
/// - `compare_fn` function/closure used for comparing the items
pub(crate) fn are_unique<T, F>(collection: &[T], compare_fn: F) -> bool
where
    F: Fn(&T, &T) -> bool,
{
    !collection.iter().enumerate().any(|(i, item_i)| {
        collection
            .iter()
            .skip(i + 1)
            .any(|item_j| compare_fn(item_i, item_j))
    })
}

/// Validate that the provided atom indices are unique.
/// Used e.g. to validate that a bond does not connect one and the same atom.
pub(crate) fn validate_unique_indices(indices: &[usize]) -> Result<(), ValidationError> {
    if are_unique(indices, |i: &usize, j: &usize| i == j) {
        Ok(())
    } else {
        Err(ValidationError::new("non-unique atom indices"))
    }
}

/// A molecular graph: atoms, bonds, and molecule-level metadata.
///
/// Atom identities are unique within a graph and need not be contiguous;
/// [`MoleculeGraph::renumber`] compacts them. Connectivity may contain cycles
/// and branches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MoleculeGraph {
    /// Molecule name
    name: String,
    /// Atoms keyed by identity
    atoms: BTreeMap<usize, Atom>,
    /// Bonds between atom identities
    bonds: Vec<Bond>,
}

impl MoleculeGraph {
    /// New empty graph with given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Build from externally read parts, checking consistency.
    ///
    /// This is the entry point for structure-file readers. Fails with a fatal
    /// [`GraphError`] on duplicate atom indices, self-bonds, or bonds whose
    /// endpoints do not exist.
    pub fn from_parts(name: &str, atoms: Vec<Atom>, bonds: Vec<Bond>) -> Result<Self, GraphError> {
        let mut graph = Self::new(name);
        for atom in atoms {
            let index = atom.index;
            if graph.atoms.insert(index, atom).is_some() {
                return Err(GraphError::DuplicateAtom {
                    molecule: name.to_string(),
                    index,
                });
            }
        }
        graph.bonds = bonds;
        graph.validate()?;
        Ok(graph)
    }

    /// Molecule name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Overall charge: sum of all known atomic partial charges.
    pub fn total_charge(&self) -> f64 {
        self.atoms
            .values()
            .filter_map(|atom| atom.charge)
            .sum()
    }

    /// Number of atoms
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Check if the graph has no atoms
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Check if an atom identity is present
    pub fn contains(&self, index: usize) -> bool {
        self.atoms.contains_key(&index)
    }

    /// Atom by identity
    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(&index)
    }

    /// Mutable atom by identity
    pub fn atom_mut(&mut self, index: usize) -> Option<&mut Atom> {
        self.atoms.get_mut(&index)
    }

    /// All atoms in identity order
    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.values()
    }

    /// All atoms in identity order, mutable
    pub fn atoms_mut(&mut self) -> impl Iterator<Item = &mut Atom> {
        self.atoms.values_mut()
    }

    /// All bonds
    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Smallest unused atom identity
    pub fn next_index(&self) -> usize {
        self.atoms
            .last_key_value()
            .map(|(&i, _)| i + 1)
            .unwrap_or(0)
    }

    /// Append a new atom. Will error if the identity already exists.
    pub fn add_atom(&mut self, atom: Atom) -> anyhow::Result<()> {
        if self.atoms.contains_key(&atom.index) {
            anyhow::bail!(
                "Atom with index {} already exists in molecule '{}'",
                atom.index,
                self.name
            );
        }
        self.atoms.insert(atom.index, atom);
        Ok(())
    }

    /// Remove an atom and all bonds incident to it.
    pub fn remove_atom(&mut self, index: usize) -> Option<Atom> {
        let atom = self.atoms.remove(&index)?;
        self.bonds.retain(|bond| !bond.contains(index));
        Some(atom)
    }

    /// Add a bond between two existing atoms.
    ///
    /// Will error if either endpoint is missing or the bond is a self-loop.
    /// Adding an already existing bond is a no-op, except that an
    /// [`BondOrder::Unspecified`] order is upgraded by the new bond.
    pub fn add_bond(&mut self, bond: Bond) -> anyhow::Result<()> {
        let [i, j] = *bond.index();
        if i == j {
            anyhow::bail!("Bond joins atom {} to itself in molecule '{}'", i, self.name);
        }
        for endpoint in [i, j] {
            if !self.contains(endpoint) {
                anyhow::bail!(
                    "Bond {}-{} references missing atom {} in molecule '{}'",
                    i,
                    j,
                    endpoint,
                    self.name
                );
            }
        }
        if let Some(existing) = self.bonds.iter_mut().find(|b| b.connects(i, j)) {
            if *existing.order() == BondOrder::Unspecified {
                *existing = bond;
            }
            return Ok(());
        }
        self.bonds.push(bond);
        Ok(())
    }

    /// Remove the bond between two atoms. Returns whether a bond was removed.
    pub fn remove_bond(&mut self, i: usize, j: usize) -> bool {
        let before = self.bonds.len();
        self.bonds.retain(|bond| !bond.connects(i, j));
        self.bonds.len() != before
    }

    /// Neighbors of an atom, sorted by identity.
    pub fn neighbors(&self, index: usize) -> Vec<usize> {
        let mut neighbors: Vec<usize> = self
            .bonds
            .iter()
            .filter_map(|bond| bond.other(index))
            .collect();
        neighbors.sort_unstable();
        neighbors
    }

    /// Number of bonds at an atom.
    pub fn degree(&self, index: usize) -> usize {
        self.bonds.iter().filter(|bond| bond.contains(index)).count()
    }

    /// Adjacency list over all atoms. Build once for repeated neighbor queries.
    pub fn adjacency(&self) -> AdjacencyList {
        AdjacencyList::new(self.atoms.keys().copied(), &self.bonds)
    }

    /// Induced subgraph over the given atom identities.
    ///
    /// Preserves every bond whose both endpoints are selected. Unknown
    /// identities are ignored. Atom identities are kept as-is.
    pub fn subgraph(&self, selection: &[usize]) -> Self {
        let atoms: BTreeMap<usize, Atom> = selection
            .iter()
            .filter_map(|&i| self.atoms.get(&i).cloned().map(|a| (i, a)))
            .collect();
        let bonds = self
            .bonds
            .iter()
            .filter(|bond| bond.index().iter().all(|i| atoms.contains_key(i)))
            .cloned()
            .collect();
        Self {
            name: self.name.clone(),
            atoms,
            bonds,
        }
    }

    /// All bonds joining an atom from `first` with an atom from `second`.
    pub fn edges_between<'a>(&'a self, first: &[usize], second: &[usize]) -> Vec<&'a Bond> {
        self.bonds
            .iter()
            .filter(|bond| {
                let [i, j] = *bond.index();
                (first.contains(&i) && second.contains(&j))
                    || (first.contains(&j) && second.contains(&i))
            })
            .collect()
    }

    /// Merge `other` into this graph as a disjoint union plus explicit cross
    /// bonds.
    ///
    /// Atom identities of `other` are offset past the last identity of this
    /// graph. Cross bonds are given as `(self identity, other identity)`
    /// pairs referring to the graphs *before* the merge. Returns the
    /// old-to-new identity correspondence for the merged atoms.
    ///
    /// Attributes are never silently dropped: differing non-empty molecule
    /// names are a reportable inconsistency.
    pub fn merge(
        &mut self,
        other: &MoleculeGraph,
        cross_bonds: &[(usize, usize)],
    ) -> Result<BTreeMap<usize, usize>, GraphError> {
        if !self.name.is_empty() && !other.name.is_empty() && self.name != other.name {
            return Err(GraphError::MergeConflict {
                molecule: self.name.clone(),
                other: other.name.clone(),
            });
        }
        if self.name.is_empty() {
            self.name = other.name.clone();
        }

        let offset = self.next_index();
        let mut correspondence = BTreeMap::new();
        for (old, atom) in &other.atoms {
            let new = old + offset;
            let mut atom = atom.clone();
            atom.index = new;
            correspondence.insert(*old, new);
            self.atoms.insert(new, atom);
        }
        for bond in &other.bonds {
            let mut bond = bond.clone();
            bond.shift(offset);
            self.bonds.push(bond);
        }
        for &(own, foreign) in cross_bonds {
            let mapped = correspondence.get(&foreign).copied().ok_or_else(|| {
                GraphError::DanglingBond {
                    molecule: self.name.clone(),
                    first: own,
                    second: foreign,
                    missing: foreign,
                }
            })?;
            self.bonds.push(Bond::new([own, mapped], BondOrder::Unspecified));
        }
        self.validate()?;
        Ok(correspondence)
    }

    /// Renumber atom identities contiguously from zero, preserving order.
    /// Returns the old-to-new identity map.
    pub fn renumber(&mut self) -> BTreeMap<usize, usize> {
        let remap: BTreeMap<usize, usize> = self
            .atoms
            .keys()
            .enumerate()
            .map(|(new, &old)| (old, new))
            .collect();
        self.atoms = self
            .atoms
            .iter()
            .map(|(old, atom)| {
                let mut atom = atom.clone();
                atom.index = remap[old];
                (remap[old], atom)
            })
            .collect();
        self.bonds = self
            .bonds
            .iter()
            .map(|bond| {
                let [i, j] = *bond.index();
                Bond::new([remap[&i], remap[&j]], *bond.order())
            })
            .collect();
        remap
    }

    /// Check structural consistency. Any failure is fatal for the run since
    /// downstream stages cannot operate on a corrupt graph.
    pub fn validate(&self) -> Result<(), GraphError> {
        for bond in &self.bonds {
            let [i, j] = *bond.index();
            if i == j {
                return Err(GraphError::SelfBond {
                    molecule: self.name.clone(),
                    index: i,
                });
            }
            for endpoint in [i, j] {
                if !self.contains(endpoint) {
                    return Err(GraphError::DanglingBond {
                        molecule: self.name.clone(),
                        first: i,
                        second: j,
                        missing: endpoint,
                    });
                }
            }
        }
        Ok(())
    }
}
