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

//! Residue topology templates ("blocks").

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::mapping::Mapping;
use crate::topology::InteractionKind;

/// Expected properties of one atom in a block template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Getters)]
#[serde(deny_unknown_fields)]
pub struct RefAtom {
    /// Reference atom name; correspondences are keyed by it
    name: String,
    /// Expected element, compared when the observed atom has one too
    #[serde(default)]
    element: Option<String>,
    /// Optional atoms (e.g. non-polar hydrogens) may be absent from the input
    #[serde(default)]
    optional: bool,
    /// Upper bound on the observed degree of a matching candidate
    #[serde(default)]
    degree: Option<usize>,
}

impl RefAtom {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            element: None,
            optional: false,
            degree: None,
        }
    }

    pub fn with_element(mut self, element: &str) -> Self {
        self.element = Some(element.to_string());
        self
    }

    pub fn as_optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_degree(mut self, degree: usize) -> Self {
        self.degree = Some(degree);
        self
    }
}

/// An expected edge between two reference atoms.
///
/// The edge is satisfied by a direct bond between the mapped atoms, or, when
/// a `via` path is declared, by a bonded path running through the named
/// intermediate atoms (all of which must then be matched as well).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Getters)]
#[serde(deny_unknown_fields)]
pub struct TemplateEdge {
    /// The two reference atoms expected to be connected
    atoms: [String; 2],
    /// Declared equivalent path between them, innermost atoms only
    #[serde(default)]
    via: Vec<String>,
}

impl TemplateEdge {
    pub fn new(first: &str, second: &str) -> Self {
        Self {
            atoms: [first.to_string(), second.to_string()],
            via: Vec::new(),
        }
    }

    pub fn with_via(mut self, via: &[&str]) -> Self {
        self.via = via.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Check if the edge joins the two named atoms, in either order.
    pub fn connects(&self, first: &str, second: &str) -> bool {
        (self.atoms[0] == first && self.atoms[1] == second)
            || (self.atoms[0] == second && self.atoms[1] == first)
    }
}

/// A bonded-interaction template of a block, referencing reference-atom
/// names. When instantiated, each name resolves to the bead that absorbs the
/// atom per the block's [`Mapping`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Getters)]
#[serde(deny_unknown_fields)]
pub struct InteractionTemplate {
    /// Kind of interaction
    kind: InteractionKind,
    /// Ordered reference-atom names
    atoms: Vec<String>,
    /// Opaque force-field parameters, handed through verbatim
    #[serde(default)]
    parameters: Vec<String>,
    /// Interactions over the same bead set but different versions coexist
    #[serde(default)]
    version: u32,
}

impl InteractionTemplate {
    pub fn new(kind: InteractionKind, atoms: &[&str], parameters: &[&str]) -> Self {
        Self {
            kind,
            atoms: atoms.iter().map(|a| a.to_string()).collect(),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            version: 0,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

/// A named reference template for one residue: expected atoms and
/// connectivity, the bonded interactions to generate, and the atom-to-bead
/// mapping. Immutable once the force field is loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Getters, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_block"))]
pub struct Block {
    /// Residue name the block is registered under
    name: String,
    /// Variant tag, e.g. protonation state or terminus form
    #[serde(default)]
    variant: Option<String>,
    /// Reference atoms
    atoms: Vec<RefAtom>,
    /// Expected connectivity between reference atoms
    #[serde(default)]
    edges: Vec<TemplateEdge>,
    /// Bonded-interaction templates
    #[serde(default)]
    interactions: Vec<InteractionTemplate>,
    /// Atom-to-bead correspondence table
    mapping: Mapping,
}

impl Block {
    pub fn new(
        name: &str,
        variant: Option<&str>,
        atoms: Vec<RefAtom>,
        edges: Vec<TemplateEdge>,
        interactions: Vec<InteractionTemplate>,
        mapping: Mapping,
    ) -> Self {
        Self {
            name: name.to_string(),
            variant: variant.map(str::to_string),
            atoms,
            edges,
            interactions,
            mapping,
        }
    }

    /// Reference atom by name.
    pub fn atom(&self, name: &str) -> Option<&RefAtom> {
        self.atoms.iter().find(|a| a.name() == name)
    }

    /// Names of all mandatory reference atoms.
    pub fn mandatory_atoms(&self) -> impl Iterator<Item = &str> {
        self.atoms
            .iter()
            .filter(|a| !a.optional())
            .map(|a| a.name().as_str())
    }

    /// Direct template edges incident to the named atom, `via` edges excluded.
    pub fn direct_edges_of<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a TemplateEdge> {
        let name = name.to_string();
        self.edges
            .iter()
            .filter(move |e| e.via().is_empty() && e.atoms().iter().any(|a| *a == name))
    }
}

fn validate_block(block: &Block) -> Result<(), ValidationError> {
    let defined = |name: &String| block.atoms.iter().any(|a| a.name() == name);

    // reference atom names must be unique
    if !crate::graph::are_unique(&block.atoms, |a: &RefAtom, b: &RefAtom| a.name() == b.name()) {
        return Err(ValidationError::new("non-unique reference atom names"));
    }

    // edges must only connect defined atoms and must not be self-loops
    for edge in &block.edges {
        if edge.atoms()[0] == edge.atoms()[1] {
            return Err(ValidationError::new("template edge joins an atom to itself"));
        }
        if !edge.atoms().iter().all(defined) || !edge.via().iter().all(defined) {
            return Err(ValidationError::new("template edge between undefined atoms"));
        }
    }

    // interactions must reference defined atoms and respect the arity of their kind
    for interaction in &block.interactions {
        if !interaction.atoms().iter().all(defined) {
            return Err(ValidationError::new("interaction between undefined atoms"));
        }
        if let Some(arity) = interaction.kind().arity() {
            if interaction.atoms().len() != arity {
                return Err(ValidationError::new("wrong number of interaction atoms"));
            }
        }
    }

    // the mapping must partition the reference atoms
    block.mapping.validate_partition()?;
    for bead in block.mapping.beads() {
        if !bead.atoms().iter().all(defined) {
            return Err(ValidationError::new("bead built from undefined atoms"));
        }
    }
    for atom in &block.atoms {
        if block.mapping.owner_of(atom.name()).is_none() {
            return Err(ValidationError::new(
                "reference atom not covered by any bead",
            ));
        }
    }

    Ok(())
}
