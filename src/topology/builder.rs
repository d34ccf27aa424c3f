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

//! Instantiation of bonded interactions for the coarse-grained model.
//!
//! Block templates yield intra-residue interactions, link templates yield
//! interactions across chain-adjacent residues. Template reference-atom names
//! resolve to the bead absorbing the atom per the block's mapping, then to
//! the concrete bead identity materialized by the resolution mapper.

use crate::errors::{Diagnostic, TopologyError};
use crate::forcefield::{Block, ForceField, Link};
use crate::graph::MoleculeGraph;
use crate::mapper::ResidueBeads;
use crate::matching::ResidueMatch;

use super::{Interaction, Topology};

const STAGE: &str = "build";

/// Builds a [`Topology`] from matched and mapped residues.
pub struct TopologyBuilder<'a> {
    forcefield: &'a ForceField,
}

impl<'a> TopologyBuilder<'a> {
    pub fn new(forcefield: &'a ForceField) -> Self {
        Self { forcefield }
    }

    /// Instantiate all block and link interactions.
    ///
    /// Residues are processed in their given (chain, residue) order and the
    /// result is raw: duplicates and derived exclusions are handled by
    /// [`Topology::deduplicate`] and [`Topology::derive_exclusions`]
    /// afterwards.
    pub fn build(
        &self,
        graph: &MoleculeGraph,
        residues: &[(ResidueMatch, ResidueBeads)],
    ) -> (Topology, Vec<Diagnostic>) {
        let mut topology = Topology::default();
        let mut diagnostics = Vec::new();

        for (matched, beads) in residues {
            let Some(block) = self
                .forcefield
                .block(&matched.block_name, matched.block_variant.as_deref())
            else {
                // cannot happen for residues matched against this force field
                log::warn!("no block for matched residue {}", matched.window.site);
                continue;
            };
            self.instantiate_block(block, matched, beads, &mut topology, &mut diagnostics);
        }

        self.instantiate_links(graph, residues, &mut topology, &mut diagnostics);

        (topology, diagnostics)
    }

    fn instantiate_block(
        &self,
        block: &Block,
        matched: &ResidueMatch,
        beads: &ResidueBeads,
        topology: &mut Topology,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        'templates: for template in block.interactions() {
            let mut resolved = Vec::with_capacity(template.atoms().len());
            for atom in template.atoms() {
                let owner = block
                    .mapping()
                    .owner_of(atom)
                    .expect("validated at force-field load");
                match beads.bead(owner) {
                    Some(bead) => resolved.push(bead),
                    None => {
                        diagnostics.push(Diagnostic::topology(
                            STAGE,
                            TopologyError::MissingBead {
                                kind: *template.kind(),
                                site: matched.window.site.clone(),
                                bead: owner.to_owned(),
                            },
                        ));
                        continue 'templates;
                    }
                }
            }
            if let Some(interaction) =
                collapse(*template.kind(), resolved, template.parameters(), *template.version())
            {
                topology.add_interaction(interaction);
            }
        }
    }

    /// Instantiate link interactions for every pair of residues joined by a
    /// bond between the link's anchor atoms.
    fn instantiate_links(
        &self,
        graph: &MoleculeGraph,
        residues: &[(ResidueMatch, ResidueBeads)],
        topology: &mut Topology,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        // residue index per atom identity, for a single pass over the bonds
        let residue_of: std::collections::BTreeMap<usize, usize> = residues
            .iter()
            .enumerate()
            .flat_map(|(r, (matched, _))| matched.window.atoms.iter().map(move |&a| (a, r)))
            .collect();
        let mut adjacent: Vec<(usize, usize)> = graph
            .bonds()
            .iter()
            .filter_map(|bond| {
                let [i, j] = *bond.index();
                match (residue_of.get(&i), residue_of.get(&j)) {
                    (Some(&a), Some(&b)) if a != b => Some((a.min(b), a.max(b))),
                    _ => None,
                }
            })
            .collect();
        adjacent.sort_unstable();
        adjacent.dedup();

        for (first, second) in adjacent {
            let (matched_a, beads_a) = &residues[first];
            let (matched_b, beads_b) = &residues[second];
            for bond in
                graph.edges_between(&matched_a.window.atoms, &matched_b.window.atoms)
            {
                let [i, j] = *bond.index();
                let (atom_a, atom_b) = if matched_a.window.atoms.contains(&i) {
                    (i, j)
                } else {
                    (j, i)
                };
                let name = |atom: usize| {
                    graph
                        .atom(atom)
                        .map(|a| a.name.clone())
                        .unwrap_or_default()
                };
                let (anchor_a, anchor_b) = (name(atom_a), name(atom_b));

                let Some((link, swapped)) = self.forcefield.link(
                    [matched_a.block_name.as_str(), matched_b.block_name.as_str()],
                    [anchor_a.as_str(), anchor_b.as_str()],
                ) else {
                    diagnostics.push(Diagnostic::anomaly(
                        STAGE,
                        matched_a.window.site.clone(),
                        format!(
                            "no link template for bond {}-{} to residue {}",
                            anchor_a, anchor_b, matched_b.window.site
                        ),
                    ));
                    continue;
                };

                self.instantiate_link(
                    link,
                    swapped,
                    (matched_a, beads_a),
                    (matched_b, beads_b),
                    topology,
                    diagnostics,
                );
            }
        }
    }

    fn instantiate_link(
        &self,
        link: &Link,
        swapped: bool,
        first: (&ResidueMatch, &ResidueBeads),
        second: (&ResidueMatch, &ResidueBeads),
        topology: &mut Topology,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        'templates: for template in link.interactions() {
            let mut resolved = Vec::with_capacity(template.sites().len());
            for site in template.sites() {
                // link side 0/1 relative to the declaration; swap to our order
                let side = if swapped { 1 - site.side() } else { *site.side() };
                let (matched, beads) = if side == 0 { first } else { second };
                let Some(block) = self
                    .forcefield
                    .block(&matched.block_name, matched.block_variant.as_deref())
                else {
                    continue 'templates;
                };
                let Some(owner) = block.mapping().owner_of(site.atom()) else {
                    log::warn!(
                        "link references atom '{}' unknown to block '{}'",
                        site.atom(),
                        matched.block_name
                    );
                    continue 'templates;
                };
                match beads.bead(owner) {
                    Some(bead) => resolved.push(bead),
                    None => {
                        diagnostics.push(Diagnostic::topology(
                            STAGE,
                            TopologyError::MissingBead {
                                kind: *template.kind(),
                                site: matched.window.site.clone(),
                                bead: owner.to_owned(),
                            },
                        ));
                        continue 'templates;
                    }
                }
            }
            if let Some(interaction) =
                collapse(*template.kind(), resolved, template.parameters(), *template.version())
            {
                topology.add_interaction(interaction);
            }
        }
    }
}

/// Interactions whose participants collapse onto fewer distinct beads than
/// the template names are an expected consequence of coarse-graining and are
/// dropped.
fn collapse(
    kind: super::InteractionKind,
    beads: Vec<usize>,
    parameters: &[String],
    version: u32,
) -> Option<Interaction> {
    let mut distinct = beads.clone();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() != beads.len() {
        log::debug!("dropping collapsed {kind} over beads {beads:?}");
        return None;
    }
    Some(Interaction::new(kind, beads, parameters.to_vec()).with_version(version))
}
