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

//! End-to-end tests of the transformation pipeline.

mod common;

use coarsen::errors::{DiagnosticKind, ResidueError, Severity};
use coarsen::pipeline::{Pipeline, RunContext};
use coarsen::topology::InteractionKind;
use coarsen::{process_molecules, MoleculeGraph};
use common::MoleculeBuilder;

/// `AAA` followed by `GGG`, joined by a C-N peptide bond.
fn dipeptide() -> MoleculeGraph {
    MoleculeBuilder::new()
        .aaa(1)
        .ggg(2)
        .bond(2, 5) // C of residue 1 to N of residue 2
        .build("dipeptide")
}

#[test]
fn dipeptide_is_mapped_and_topologized() {
    let forcefield = common::forcefield();
    let config = common::config();
    let processed = process_molecules(vec![dipeptide()], &forcefield, &config).unwrap();
    assert_eq!(processed.len(), 1);
    let result = &processed[0];

    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);

    // beads in traversal order: BB + SC1 from residue 1, BB from residue 2
    let names: Vec<&str> = result.cg.atoms().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["BB", "SC1", "BB"]);
    assert_eq!(result.cg.atom(0).unwrap().resname, "AAA");
    assert_eq!(result.cg.atom(2).unwrap().resid, 2);

    // bead masses sum to the masses of their constituent atoms
    let bb = result.cg.atom(0).unwrap();
    assert!((bb.mass.unwrap() - (14.007 + 12.011 * 2.0 + 15.999)).abs() < 1e-9);

    // one intra-residue bond (BB-SC1) and one link bond (BB-BB)
    let bonds: Vec<Vec<usize>> = result
        .topology
        .find_interactions(InteractionKind::Bond)
        .map(|i| i.beads().clone())
        .collect();
    assert_eq!(bonds, vec![vec![0, 1], vec![0, 2]]);

    // exclusions derived from the bead bonds at distance 1
    let exclusions: Vec<(usize, usize)> = result
        .topology
        .exclusions()
        .iter()
        .map(|p| (p.0.min(p.1), p.0.max(p.1)))
        .collect();
    assert_eq!(exclusions, vec![(0, 1), (0, 2)]);
}

#[test]
fn missing_mandatory_atom_skips_residue_but_not_molecule() {
    // AAA without its mandatory carbonyl oxygen
    let molecule = MoleculeBuilder::new()
        .atom("N", "N", "AAA", 1)
        .atom("CA", "C", "AAA", 1)
        .atom("C", "C", "AAA", 1)
        .atom("CB", "C", "AAA", 1)
        .bond(0, 1)
        .bond(1, 2)
        .bond(1, 3)
        .ggg(2)
        .bond(2, 4) // C to N of residue 2
        .build("broken");

    let forcefield = common::forcefield();
    let config = common::config();
    let processed = process_molecules(vec![molecule], &forcefield, &config).unwrap();
    let result = &processed[0];

    // residue 1 is reported and omitted; residue 2 is still mapped
    assert_eq!(result.cg.len(), 1);
    assert_eq!(result.cg.atom(0).unwrap().resname, "GGG");
    assert!(result.topology.interactions().is_empty());

    let errors: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0].kind,
        DiagnosticKind::Residue(ResidueError::IncompleteMatch { missing, .. })
            if missing == &vec!["O".to_string()]
    ));
}

#[test]
fn unknown_residue_is_reported_while_siblings_are_mapped() {
    let molecule = MoleculeBuilder::new()
        .aaa(1)
        .atom("X", "P", "ZZZ", 2)
        .bond(2, 5) // C of residue 1 to the unknown atom
        .ggg(3)
        .bond(5, 6) // unknown atom to N of residue 3
        .build("with-unknown");

    let forcefield = common::forcefield();
    let config = common::config();
    let processed = process_molecules(vec![molecule], &forcefield, &config).unwrap();
    let result = &processed[0];

    // both known residues are mapped
    let names: Vec<&str> = result.cg.atoms().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["BB", "SC1", "BB"]);

    let unknown: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| {
            matches!(
                &d.kind,
                DiagnosticKind::Residue(ResidueError::UnknownResidue { site })
                    if site.resname == "ZZZ" && site.resid == 2
            )
        })
        .collect();
    assert_eq!(unknown.len(), 1);
}

#[test]
fn output_is_deterministic() {
    let forcefield = common::forcefield();
    let config = common::config();

    let first = process_molecules(vec![dipeptide(), dipeptide()], &forcefield, &config).unwrap();
    let second = process_molecules(vec![dipeptide(), dipeptide()], &forcefield, &config).unwrap();

    // identical input molecules give identical output, and reruns reproduce it
    assert_eq!(first[0].cg, first[1].cg);
    assert_eq!(first[0].topology, first[1].topology);
    assert_eq!(first[0].cg, second[0].cg);
    assert_eq!(first[0].topology, second[0].topology);
    assert_eq!(first[0].diagnostics, second[0].diagnostics);
}

#[test]
fn deduplication_of_output_is_idempotent() {
    let forcefield = common::forcefield();
    let config = common::config();
    let processed = process_molecules(vec![dipeptide()], &forcefield, &config).unwrap();

    let mut topology = processed[0].topology.clone();
    let conflicts = topology.deduplicate();
    assert!(conflicts.is_empty());
    assert_eq!(topology, processed[0].topology);
}

#[test]
fn conflicting_parameters_are_reported_first_kept() {
    // a library whose block declares the same bond twice with different
    // parameters
    let yaml = r#"
name: conflicted
blocks:
  - name: AAA
    atoms:
      - {name: CA, element: C}
      - {name: CB, element: C}
    edges:
      - {atoms: [CA, CB]}
    interactions:
      - {kind: bond, atoms: [CA, CB], parameters: ["1", "0.30"]}
      - {kind: bond, atoms: [CB, CA], parameters: ["1", "0.47"]}
    mapping:
      beads:
        - {name: B1, atoms: [CA]}
        - {name: B2, atoms: [CB]}
"#;
    let forcefield = coarsen::ForceField::from_str(yaml).unwrap();
    let config = coarsen::Config::new("conflicted");
    let molecule = MoleculeBuilder::new()
        .atom("CA", "C", "AAA", 1)
        .atom("CB", "C", "AAA", 1)
        .bond(0, 1)
        .build("pair");

    let processed = process_molecules(vec![molecule], &forcefield, &config).unwrap();
    let result = &processed[0];

    let bonds: Vec<_> = result
        .topology
        .find_interactions(InteractionKind::Bond)
        .collect();
    assert_eq!(bonds.len(), 1);
    assert_eq!(
        bonds[0].parameters(),
        &vec!["1".to_string(), "0.30".to_string()]
    );
    assert!(result.diagnostics.iter().any(|d| {
        matches!(
            &d.kind,
            DiagnosticKind::Topology(coarsen::TopologyError::InteractionConflict { .. })
        )
    }));
}

#[test]
fn excluded_residues_are_skipped_silently() {
    let forcefield = common::forcefield();
    let mut config = common::config();
    config.exclude_residues.insert("GGG".to_owned());

    let processed = process_molecules(vec![dipeptide()], &forcefield, &config).unwrap();
    let result = &processed[0];

    let names: Vec<&str> = result.cg.atoms().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["BB", "SC1"]);
    // the peptide bond leads to an unmapped residue: no link, no diagnostic
    assert_eq!(
        result
            .topology
            .find_interactions(InteractionKind::Bond)
            .count(),
        1
    );
}

#[test]
fn terminus_variant_selects_modified_block() {
    let forcefield = common::forcefield();
    let mut config = common::config();
    config.begin_variant = Some("nter".to_owned());

    let processed = process_molecules(vec![dipeptide()], &forcefield, &config).unwrap();
    let result = &processed[0];

    // the nter variant declares a constraint instead of a bond for CA-CB
    assert_eq!(
        result
            .topology
            .find_interactions(InteractionKind::Constraint)
            .count(),
        1
    );
    // the link bond is still instantiated
    assert_eq!(
        result
            .topology
            .find_interactions(InteractionKind::Bond)
            .count(),
        1
    );
}

#[test]
fn residue_renames_are_applied_before_matching() {
    let forcefield = common::forcefield();
    let mut config = common::config();
    config
        .rename_residues
        .insert("ALA".to_owned(), "AAA".to_owned());

    let molecule = MoleculeBuilder::new()
        .atom("N", "N", "ALA", 1)
        .atom("CA", "C", "ALA", 1)
        .atom("C", "C", "ALA", 1)
        .atom("O", "O", "ALA", 1)
        .atom("CB", "C", "ALA", 1)
        .bond(0, 1)
        .bond(1, 2)
        .bond(2, 3)
        .bond(1, 4)
        .build("renamed");

    let processed = process_molecules(vec![molecule], &forcefield, &config).unwrap();
    let result = &processed[0];
    assert!(result.diagnostics.is_empty());
    assert_eq!(result.cg.len(), 2);
    assert_eq!(result.cg.atom(0).unwrap().resname, "AAA");
}

#[test]
fn corrupt_graph_aborts_the_run() {
    // a dangling bond can only enter through deserialized input, bypassing
    // the checked constructors
    let yaml = r#"
name: corrupt
atoms:
  0: {index: 0, name: CA, element: C, resname: AAA, resid: 1, chain: A, pos: [0.0, 0.0, 0.0], charge: null, mass: null}
bonds:
  - {index: [0, 7]}
"#;
    let molecule: MoleculeGraph = serde_yaml::from_str(yaml).unwrap();
    let forcefield = common::forcefield();
    let config = common::config();

    let pipeline = Pipeline::standard();
    let context = RunContext {
        forcefield: &forcefield,
        config: &config,
    };
    let result = pipeline.run(molecule, &context);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("missing atom 7"));
}

#[test]
fn unmatched_extra_atoms_surface_as_warnings() {
    // an extra phosphorus hanging off the side chain of AAA
    let molecule = MoleculeBuilder::new()
        .aaa(1)
        .atom("P", "P", "AAA", 1)
        .bond(4, 5)
        .build("decorated");

    let forcefield = common::forcefield();
    let config = common::config();
    let processed = process_molecules(vec![molecule], &forcefield, &config).unwrap();
    let result = &processed[0];

    // the residue still maps
    assert_eq!(result.cg.len(), 2);
    let warnings: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].to_string().contains('P'));
}
