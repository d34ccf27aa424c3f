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

//! Atom-to-bead correspondence tables.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use validator::ValidationError;

/// Rule for deriving a bead position from its constituent atoms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// Unweighted centroid
    #[default]
    Uniform,
    /// Mass-weighted centroid
    Mass,
}

/// One coarse-grained bead and the reference atoms it absorbs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Getters)]
#[serde(deny_unknown_fields)]
pub struct BeadDef {
    /// Bead name, e.g. _BB_ or _SC1_
    name: String,
    /// Names of the reference atoms forming the bead
    atoms: Vec<String>,
}

impl BeadDef {
    pub fn new(name: &str, atoms: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            atoms: atoms.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Many-to-one table converting the reference atoms of one block into beads.
///
/// The table must be a partition: every reference atom of the owning block is
/// assigned to exactly one bead. This is checked when the force field is
/// loaded, so downstream code may rely on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, Getters)]
#[serde(deny_unknown_fields)]
pub struct Mapping {
    /// Bead definitions in output order
    beads: Vec<BeadDef>,
    /// Position-derivation rule for all beads of this mapping
    #[serde(default)]
    weighting: Weighting,
}

impl Mapping {
    pub fn new(beads: Vec<BeadDef>, weighting: Weighting) -> Self {
        Self { beads, weighting }
    }

    /// Name of the bead that absorbs the given reference atom.
    pub fn owner_of(&self, atom: &str) -> Option<&str> {
        self.beads
            .iter()
            .find(|bead| bead.atoms.iter().any(|a| a == atom))
            .map(|bead| bead.name.as_str())
    }

    /// Bead definition by name.
    pub fn bead(&self, name: &str) -> Option<&BeadDef> {
        self.beads.iter().find(|bead| bead.name == name)
    }

    /// Validate that no reference atom is claimed by two beads and that bead
    /// names are unique.
    pub(super) fn validate_partition(&self) -> Result<(), ValidationError> {
        if !crate::graph::are_unique(&self.beads, |a: &BeadDef, b: &BeadDef| a.name == b.name) {
            return Err(ValidationError::new("non-unique bead names in mapping"));
        }
        let all_atoms: Vec<&String> = self.beads.iter().flat_map(|b| &b.atoms).collect();
        if !crate::graph::are_unique(&all_atoms, |a: &&String, b: &&String| a == b) {
            return Err(ValidationError::new(
                "reference atom assigned to more than one bead",
            ));
        }
        Ok(())
    }
}
