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

//! Resolution mapping: collapsing matched atomistic atoms into beads.
//!
//! Given a completed correspondence and the mapping table of the matched
//! block, the mapper partitions the mapped atoms into bead groups and
//! computes each bead's representative position with the declared weighting
//! rule. Every mapped atom belongs to exactly one bead; this is enforced when
//! the force field is loaded. Beads whose constituent atoms are all absent
//! are omitted with a diagnostic rather than silently materialized at the
//! origin.

use std::collections::BTreeMap;

use float_cmp::approx_eq;

use crate::errors::{Diagnostic, ResidueSite};
use crate::forcefield::{Block, Weighting};
use crate::graph::{Atom, MoleculeGraph};
use crate::matching::ResidueMatch;
use crate::Point;

const STAGE: &str = "map";

/// The beads materialized for one matched residue: bead name to bead
/// identity in the coarse-grained graph. Omitted beads are absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResidueBeads {
    /// Where the source residue sits in the input
    pub site: ResidueSite,
    /// Materialized beads by name
    pub beads: BTreeMap<String, usize>,
}

impl ResidueBeads {
    /// Bead identity for a bead name, if the bead was materialized.
    pub fn bead(&self, name: &str) -> Option<usize> {
        self.beads.get(name).copied()
    }
}

/// Append the beads of one matched residue to the coarse-grained graph.
///
/// Beads are created in the order declared by the block's mapping so that
/// bead numbering is reproducible. Returns the per-residue bead table and
/// any diagnostics (omitted beads, weighting fallbacks).
pub fn map_residue(
    graph: &MoleculeGraph,
    matched: &ResidueMatch,
    block: &Block,
    cg: &mut MoleculeGraph,
) -> (ResidueBeads, Vec<Diagnostic>) {
    let mut result = ResidueBeads {
        site: matched.window.site.clone(),
        ..Default::default()
    };
    let mut diagnostics = Vec::new();

    for bead_def in block.mapping().beads() {
        let members: Vec<&Atom> = bead_def
            .atoms()
            .iter()
            .filter_map(|name| matched.correspondence.get(name))
            .filter_map(|index| graph.atom(index))
            .collect();

        if members.is_empty() {
            diagnostics.push(Diagnostic::anomaly(
                STAGE,
                matched.window.site.clone(),
                format!("bead '{}' has no constituent atoms and is omitted", bead_def.name()),
            ));
            continue;
        }

        let (pos, fallback) = bead_position(&members, *block.mapping().weighting());
        if fallback {
            diagnostics.push(Diagnostic::anomaly(
                STAGE,
                matched.window.site.clone(),
                format!(
                    "bead '{}' has no constituent masses; falling back to the uniform rule",
                    bead_def.name()
                ),
            ));
        }

        let charge: Option<f64> = sum_present(members.iter().map(|a| a.charge));
        let mass: Option<f64> = sum_present(members.iter().map(|a| a.mass));

        let index = cg.next_index();
        let mut bead = Atom::new(index, bead_def.name())
            .with_residue(
                &matched.window.site.resname,
                matched.window.site.resid,
                &matched.window.site.chain,
            )
            .with_pos(pos);
        bead.charge = charge;
        bead.mass = mass;
        cg.add_atom(bead).expect("fresh bead identity");
        result.beads.insert(bead_def.name().clone(), index);
    }

    (result, diagnostics)
}

/// Representative position of a bead per the weighting rule. The second
/// return value reports a fallback from mass weighting to the uniform rule.
fn bead_position(members: &[&Atom], weighting: Weighting) -> (Point, bool) {
    match weighting {
        Weighting::Uniform => (centroid(members.iter().map(|a| (a.pos, 1.0))), false),
        Weighting::Mass => {
            let total: f64 = members.iter().filter_map(|a| a.mass).sum();
            if approx_eq!(f64, total, 0.0, ulps = 2) {
                (centroid(members.iter().map(|a| (a.pos, 1.0))), true)
            } else {
                (
                    centroid(members.iter().map(|a| (a.pos, a.mass.unwrap_or(0.0)))),
                    false,
                )
            }
        }
    }
}

fn centroid(weighted: impl Iterator<Item = (Point, f64)>) -> Point {
    let mut sum = Point::zeros();
    let mut total = 0.0;
    for (pos, weight) in weighted {
        sum += pos * weight;
        total += weight;
    }
    sum / total
}

/// Sum of the present values; `None` if no value is present.
fn sum_present(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Severity;
    use crate::forcefield::{BeadDef, Mapping, RefAtom, TemplateEdge, Weighting};
    use crate::graph::{Bond, BondOrder};
    use crate::matching::{residue_windows, Matcher};
    use approx::assert_relative_eq;

    fn block(weighting: Weighting) -> Block {
        Block::new(
            "GLY",
            None,
            vec![
                RefAtom::new("N").with_element("N"),
                RefAtom::new("CA").with_element("C"),
                RefAtom::new("O").with_element("O").as_optional(),
            ],
            vec![TemplateEdge::new("N", "CA"), TemplateEdge::new("CA", "O")],
            vec![],
            Mapping::new(
                vec![
                    BeadDef::new("BB", &["N", "CA"]),
                    BeadDef::new("SC1", &["O"]),
                ],
                weighting,
            ),
        )
    }

    fn matched(graph: &MoleculeGraph, block: &Block) -> ResidueMatch {
        let windows = residue_windows(graph);
        let matcher = Matcher::new(graph, 10_000);
        let (correspondence, _) = matcher.match_block(&windows[0], block).unwrap();
        ResidueMatch {
            window: windows.into_iter().next().unwrap(),
            block_name: "GLY".to_owned(),
            block_variant: None,
            correspondence,
        }
    }

    fn glycine_like(with_oxygen: bool) -> MoleculeGraph {
        let mut atoms = vec![
            Atom::new(0, "N")
                .with_element("N")
                .with_residue("GLY", 1, "A")
                .with_pos(Point::new(0.0, 0.0, 0.0))
                .with_mass(14.0)
                .with_charge(-0.3),
            Atom::new(1, "CA")
                .with_element("C")
                .with_residue("GLY", 1, "A")
                .with_pos(Point::new(2.0, 0.0, 0.0))
                .with_mass(12.0)
                .with_charge(0.3),
        ];
        let mut bonds = vec![Bond::new([0, 1], BondOrder::Single)];
        if with_oxygen {
            atoms.push(
                Atom::new(2, "O")
                    .with_element("O")
                    .with_residue("GLY", 1, "A")
                    .with_pos(Point::new(3.0, 1.0, 0.0))
                    .with_mass(16.0),
            );
            bonds.push(Bond::new([1, 2], BondOrder::Single));
        }
        MoleculeGraph::from_parts("gly", atoms, bonds).unwrap()
    }

    #[test]
    fn beads_partition_the_mapped_atoms() {
        let graph = glycine_like(true);
        let block = block(Weighting::Uniform);
        let matched = matched(&graph, &block);
        let mut cg = MoleculeGraph::new("gly");
        let (beads, diagnostics) = map_residue(&graph, &matched, &block, &mut cg);

        assert!(diagnostics.is_empty());
        assert_eq!(beads.beads.len(), 2);
        assert_eq!(cg.len(), 2);
        assert_eq!(beads.bead("BB"), Some(0));
        assert_eq!(beads.bead("SC1"), Some(1));

        // uniform centroid of N and CA
        let bb = cg.atom(0).unwrap();
        assert_relative_eq!(bb.pos.x, 1.0);
        assert_eq!(bb.charge, Some(0.0));
        assert_eq!(bb.mass, Some(26.0));
        assert_eq!(bb.resname, "GLY");
        assert_eq!(bb.chain, "A");

        // the O-only bead has no charge information at all
        let sc = cg.atom(1).unwrap();
        assert_eq!(sc.charge, None);
        assert_eq!(sc.mass, Some(16.0));
    }

    #[test]
    fn mass_weighted_centroid() {
        let graph = glycine_like(true);
        let block = block(Weighting::Mass);
        let matched = matched(&graph, &block);
        let mut cg = MoleculeGraph::new("gly");
        let (_, diagnostics) = map_residue(&graph, &matched, &block, &mut cg);
        assert!(diagnostics.is_empty());
        // (14*0 + 12*2) / 26
        assert_relative_eq!(cg.atom(0).unwrap().pos.x, 24.0 / 26.0);
    }

    #[test]
    fn empty_bead_is_omitted_with_diagnostic() {
        let graph = glycine_like(false);
        let block = block(Weighting::Uniform);
        let matched = matched(&graph, &block);
        let mut cg = MoleculeGraph::new("gly");
        let (beads, diagnostics) = map_residue(&graph, &matched, &block, &mut cg);

        assert_eq!(beads.bead("SC1"), None);
        assert_eq!(cg.len(), 1);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert!(diagnostics[0].to_string().contains("SC1"));
    }

    #[test]
    fn massless_constituents_fall_back_to_uniform() {
        let atoms = vec![
            Atom::new(0, "N")
                .with_element("N")
                .with_residue("GLY", 1, "A")
                .with_pos(Point::new(0.0, 0.0, 0.0)),
            Atom::new(1, "CA")
                .with_element("C")
                .with_residue("GLY", 1, "A")
                .with_pos(Point::new(2.0, 0.0, 0.0)),
        ];
        let bonds = vec![Bond::new([0, 1], BondOrder::Single)];
        let graph = MoleculeGraph::from_parts("gly", atoms, bonds).unwrap();
        let block = block(Weighting::Mass);
        let matched = matched(&graph, &block);
        let mut cg = MoleculeGraph::new("gly");
        let (_, diagnostics) = map_residue(&graph, &matched, &block, &mut cg);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].to_string().contains("uniform"));
        assert_relative_eq!(cg.atom(0).unwrap().pos.x, 1.0);
    }
}
