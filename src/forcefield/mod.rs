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

//! Template library: blocks, links, and mappings for one force field.
//!
//! The library is loaded once per run, validated, and then only read,
//! shared by reference across all molecules processed in that run.

mod block;
mod link;
mod mapping;

use std::collections::BTreeMap;

pub use block::{Block, InteractionTemplate, RefAtom, TemplateEdge};
pub use link::{Link, LinkInteractionTemplate, LinkSite};
pub use mapping::{BeadDef, Mapping, Weighting};

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A library of residue templates and inter-residue links.
///
/// Lookups resolve an exact `(name, variant)` key first and fall back to the
/// declared default variant for that residue name.
///
/// # Examples
/// ~~~
/// use coarsen::forcefield::ForceField;
/// let yaml = r#"
/// name: demo
/// blocks:
///   - name: W
///     atoms: [{name: OW, element: O}, {name: HW1, element: H}, {name: HW2, element: H}]
///     edges: [{atoms: [OW, HW1]}, {atoms: [OW, HW2]}]
///     mapping:
///       beads: [{name: W, atoms: [OW, HW1, HW2]}]
/// "#;
/// let forcefield = ForceField::from_str(yaml).unwrap();
/// assert!(forcefield.block("W", None).is_some());
/// assert!(forcefield.block("NaCl", None).is_none());
/// ~~~
#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
#[serde(deny_unknown_fields)]
pub struct ForceField {
    /// Force-field name
    name: String,
    /// Residue templates
    #[validate(nested)]
    blocks: Vec<Block>,
    /// Inter-residue interaction templates
    #[serde(default)]
    #[validate(nested)]
    links: Vec<Link>,
    /// Per-residue-name fallback variant
    #[serde(default, with = "::serde_with::rust::maps_duplicate_key_is_error")]
    default_variants: BTreeMap<String, String>,
}

impl ForceField {
    /// Convert a yaml-formatted string into a ForceField.
    /// This performs sanity checks and always returns either a valid library
    /// or an error.
    pub fn from_str(string: &str) -> anyhow::Result<Self> {
        let forcefield = serde_yaml::from_str::<ForceField>(string)?;
        forcefield.validate()?;
        forcefield.check_cross_references()?;
        Ok(forcefield)
    }

    /// Assemble from parts, running the same checks as [`ForceField::from_str`].
    pub fn from_parts(
        name: &str,
        blocks: Vec<Block>,
        links: Vec<Link>,
        default_variants: BTreeMap<String, String>,
    ) -> anyhow::Result<Self> {
        let forcefield = Self {
            name: name.to_string(),
            blocks,
            links,
            default_variants,
        };
        forcefield.validate()?;
        forcefield.check_cross_references()?;
        Ok(forcefield)
    }

    /// Force-field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All blocks
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// All links
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Find the block registered for a residue name and optional variant tag.
    ///
    /// Resolution order: exact `(name, variant)` match, then the declared
    /// default variant for the name, then the variant-free base block.
    pub fn block(&self, name: &str, variant: Option<&str>) -> Option<&Block> {
        let exact = |v: Option<&str>| {
            self.blocks
                .iter()
                .find(|b| b.name() == name && b.variant().as_deref() == v)
        };
        exact(variant)
            .or_else(|| exact(self.default_variants.get(name).map(String::as_str)))
            .or_else(|| exact(None))
    }

    /// Find the link applying to two adjacent blocks joined by a bond between
    /// the given anchor atoms. Returns the link and whether the caller's
    /// sides are swapped with respect to the link declaration.
    pub fn link(&self, blocks: [&str; 2], anchors: [&str; 2]) -> Option<(&Link, bool)> {
        self.links
            .iter()
            .find_map(|link| link.applies_to(blocks, anchors).map(|swapped| (link, swapped)))
    }

    /// Checks that span several blocks/links and cannot live in the
    /// per-item validators.
    fn check_cross_references(&self) -> anyhow::Result<()> {
        // block keys must be unique
        if !crate::graph::are_unique(&self.blocks, |a: &Block, b: &Block| {
            a.name() == b.name() && a.variant() == b.variant()
        }) {
            anyhow::bail!("duplicate block (name, variant) key in force field '{}'", self.name);
        }

        // default variants must point at existing blocks
        for (name, variant) in &self.default_variants {
            if !self
                .blocks
                .iter()
                .any(|b| b.name() == name && b.variant().as_deref() == Some(variant.as_str()))
            {
                anyhow::bail!(
                    "default variant '{}' of residue '{}' is not a defined block",
                    variant,
                    name
                );
            }
        }

        // links must reference defined blocks and anchor atoms within them
        for link in &self.links {
            for side in 0..2 {
                let block_name = &link.blocks()[side];
                let anchor = &link.anchors()[side];
                let found = self.blocks.iter().any(|b| b.name() == block_name);
                if !found {
                    anyhow::bail!("link references undefined block '{}'", block_name);
                }
                if !self
                    .blocks
                    .iter()
                    .filter(|b| b.name() == block_name)
                    .any(|b| b.atom(anchor).is_some())
                {
                    anyhow::bail!(
                        "link anchor '{}' is not an atom of block '{}'",
                        anchor,
                        block_name
                    );
                }
            }
        }
        Ok(())
    }
}
