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

//! Templates for bonded interactions between two adjacent blocks.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::topology::InteractionKind;

/// One participant of a link interaction: a reference atom on one of the two
/// linked residues. `side` 0 is the first block of the link key, `side` 1 the
/// second.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Getters)]
#[serde(deny_unknown_fields)]
pub struct LinkSite {
    /// Which side of the link the atom lives on (0 or 1)
    side: usize,
    /// Reference atom name within that side's block
    atom: String,
}

impl LinkSite {
    pub fn new(side: usize, atom: &str) -> Self {
        Self {
            side,
            atom: atom.to_string(),
        }
    }
}

/// A cross-residue interaction template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Getters)]
#[serde(deny_unknown_fields)]
pub struct LinkInteractionTemplate {
    /// Kind of interaction
    kind: InteractionKind,
    /// Ordered participants on both sides
    sites: Vec<LinkSite>,
    /// Opaque force-field parameters, handed through verbatim
    #[serde(default)]
    parameters: Vec<String>,
    /// Interactions over the same bead set but different versions coexist
    #[serde(default)]
    version: u32,
}

impl LinkInteractionTemplate {
    pub fn new(kind: InteractionKind, sites: Vec<LinkSite>, parameters: &[&str]) -> Self {
        Self {
            kind,
            sites,
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            version: 0,
        }
    }
}

/// Template describing the bonded interactions between two chain-adjacent
/// blocks, e.g. a peptide bond. Keyed by the pair of block names plus the
/// anchor atom name on each side; the link applies when the observed
/// inter-residue bond joins exactly those two atoms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Getters, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_link"))]
pub struct Link {
    /// Names of the two adjacent blocks
    blocks: [String; 2],
    /// Anchor atom name on each side
    anchors: [String; 2],
    /// Cross-residue interaction templates
    #[serde(default)]
    interactions: Vec<LinkInteractionTemplate>,
}

impl Link {
    pub fn new(
        blocks: [&str; 2],
        anchors: [&str; 2],
        interactions: Vec<LinkInteractionTemplate>,
    ) -> Self {
        Self {
            blocks: blocks.map(str::to_string),
            anchors: anchors.map(str::to_string),
            interactions,
        }
    }

    /// Check if this link applies to the given block pair and anchor pair,
    /// as declared. Returns `Some(swapped)` on a hit, where `swapped` tells
    /// whether the caller's sides are reversed with respect to the link.
    pub fn applies_to(&self, blocks: [&str; 2], anchors: [&str; 2]) -> Option<bool> {
        if self.blocks[0] == blocks[0]
            && self.blocks[1] == blocks[1]
            && self.anchors[0] == anchors[0]
            && self.anchors[1] == anchors[1]
        {
            Some(false)
        } else if self.blocks[0] == blocks[1]
            && self.blocks[1] == blocks[0]
            && self.anchors[0] == anchors[1]
            && self.anchors[1] == anchors[0]
        {
            Some(true)
        } else {
            None
        }
    }
}

fn validate_link(link: &Link) -> Result<(), ValidationError> {
    for interaction in &link.interactions {
        if interaction.sites().iter().any(|site| *site.side() > 1) {
            return Err(ValidationError::new("link site side must be 0 or 1"));
        }
        if let Some(arity) = interaction.kind().arity() {
            if interaction.sites().len() != arity {
                return Err(ValidationError::new("wrong number of link sites"));
            }
        }
        if interaction.sites().is_empty() {
            return Err(ValidationError::new("link interaction without sites"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peptide() -> Link {
        Link::new(
            ["ALA", "GLY"],
            ["C", "N"],
            vec![LinkInteractionTemplate::new(
                InteractionKind::Bond,
                vec![LinkSite::new(0, "C"), LinkSite::new(1, "N")],
                &["1", "0.35", "1250"],
            )],
        )
    }

    #[test]
    fn lookup_both_orders() {
        let link = peptide();
        assert_eq!(link.applies_to(["ALA", "GLY"], ["C", "N"]), Some(false));
        assert_eq!(link.applies_to(["GLY", "ALA"], ["N", "C"]), Some(true));
        assert_eq!(link.applies_to(["ALA", "GLY"], ["N", "C"]), None);
        assert_eq!(link.applies_to(["ALA", "SER"], ["C", "N"]), None);
    }

    #[test]
    fn invalid_side_rejected() {
        let link = Link::new(
            ["ALA", "GLY"],
            ["C", "N"],
            vec![LinkInteractionTemplate::new(
                InteractionKind::Bond,
                vec![LinkSite::new(0, "C"), LinkSite::new(2, "N")],
                &[],
            )],
        );
        assert!(link.validate().is_err());
    }
}
