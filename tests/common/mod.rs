//! Shared fixtures for integration tests.
//!
//! Provides a small peptide-like template library with two residue blocks
//! and a peptide link, plus builders for atomistic input graphs.

use coarsen::graph::{Atom, Bond, BondOrder, MoleculeGraph};
use coarsen::{Config, ForceField, Point};

/// Template library used by most tests: residue `AAA` maps to a backbone
/// bead plus a side-chain bead, residue `GGG` to a backbone bead only, and a
/// link over the C-N peptide bond joins the backbone beads of adjacent
/// residues.
pub const LIBRARY: &str = r#"
name: test-library
blocks:
  - name: AAA
    atoms:
      - {name: N, element: N}
      - {name: CA, element: C}
      - {name: C, element: C}
      - {name: O, element: O}
      - {name: CB, element: C, optional: true}
    edges:
      - {atoms: [N, CA]}
      - {atoms: [CA, C]}
      - {atoms: [C, O]}
      - {atoms: [CA, CB]}
    interactions:
      - {kind: bond, atoms: [CA, CB], parameters: ["1", "0.30", "5000"]}
    mapping:
      weighting: mass
      beads:
        - {name: BB, atoms: [N, CA, C, O]}
        - {name: SC1, atoms: [CB]}
  - name: AAA
    variant: nter
    atoms:
      - {name: N, element: N}
      - {name: CA, element: C}
      - {name: C, element: C}
      - {name: O, element: O}
      - {name: CB, element: C, optional: true}
    edges:
      - {atoms: [N, CA]}
      - {atoms: [CA, C]}
      - {atoms: [C, O]}
      - {atoms: [CA, CB]}
    interactions:
      - {kind: constraint, atoms: [CA, CB], parameters: ["1", "0.30"]}
    mapping:
      weighting: mass
      beads:
        - {name: BB, atoms: [N, CA, C, O]}
        - {name: SC1, atoms: [CB]}
  - name: GGG
    atoms:
      - {name: N, element: N}
      - {name: CA, element: C}
      - {name: C, element: C}
      - {name: O, element: O}
    edges:
      - {atoms: [N, CA]}
      - {atoms: [CA, C]}
      - {atoms: [C, O]}
    mapping:
      weighting: mass
      beads:
        - {name: BB, atoms: [N, CA, C, O]}
links:
  - blocks: [AAA, GGG]
    anchors: [C, N]
    interactions:
      - kind: bond
        sites: [{side: 0, atom: C}, {side: 1, atom: N}]
        parameters: ["1", "0.35", "1250"]
  - blocks: [AAA, AAA]
    anchors: [C, N]
    interactions:
      - kind: bond
        sites: [{side: 0, atom: C}, {side: 1, atom: N}]
        parameters: ["1", "0.35", "1250"]
"#;

pub fn forcefield() -> ForceField {
    ForceField::from_str(LIBRARY).expect("fixture library must load")
}

pub fn config() -> Config {
    Config::new("test-library")
}

/// Incrementally builds an atomistic test molecule on chain A.
pub struct MoleculeBuilder {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
}

impl MoleculeBuilder {
    pub fn new() -> Self {
        Self {
            atoms: Vec::new(),
            bonds: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Append an atom; positions are spread along x so centroids are
    /// nontrivial.
    pub fn atom(mut self, name: &str, element: &str, resname: &str, resid: isize) -> Self {
        let index = self.atoms.len();
        self.atoms.push(
            Atom::new(index, name)
                .with_element(element)
                .with_residue(resname, resid, "A")
                .with_pos(Point::new(index as f64, 0.0, 0.0))
                .with_mass(element_mass(element)),
        );
        self
    }

    pub fn bond(mut self, i: usize, j: usize) -> Self {
        self.bonds.push(Bond::new([i, j], BondOrder::Single));
        self
    }

    /// One complete `AAA` residue (with side chain), bonded internally.
    pub fn aaa(self, resid: isize) -> Self {
        let base = self.len();
        self.atom("N", "N", "AAA", resid)
            .atom("CA", "C", "AAA", resid)
            .atom("C", "C", "AAA", resid)
            .atom("O", "O", "AAA", resid)
            .atom("CB", "C", "AAA", resid)
            .bond(base, base + 1)
            .bond(base + 1, base + 2)
            .bond(base + 2, base + 3)
            .bond(base + 1, base + 4)
    }

    /// One complete `GGG` residue, bonded internally.
    pub fn ggg(self, resid: isize) -> Self {
        let base = self.len();
        self.atom("N", "N", "GGG", resid)
            .atom("CA", "C", "GGG", resid)
            .atom("C", "C", "GGG", resid)
            .atom("O", "O", "GGG", resid)
            .bond(base, base + 1)
            .bond(base + 1, base + 2)
            .bond(base + 2, base + 3)
    }

    pub fn build(self, name: &str) -> MoleculeGraph {
        MoleculeGraph::from_parts(name, self.atoms, self.bonds)
            .expect("fixture graph must be valid")
    }
}

fn element_mass(element: &str) -> f64 {
    match element {
        "H" => 1.008,
        "C" => 12.011,
        "N" => 14.007,
        "O" => 15.999,
        _ => 10.0,
    }
}
