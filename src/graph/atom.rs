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

use serde::{Deserialize, Serialize};

use crate::Point;

/// A node of a molecular graph.
///
/// The same type serves both resolutions: in an atomistic graph a node is a
/// chemical atom, in a coarse-grained graph it is a bead representing a group
/// of atoms. The `index` is the node's identity and never changes once the
/// atom is part of a graph; other attributes may be repaired by pipeline
/// stages (e.g. element inference).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Atom {
    /// Identity within the parent graph
    pub index: usize,
    /// Atom name, e.g. _CA_, _OW_, or a bead name at coarse resolution
    pub name: String,
    /// Chemical element symbol (He, C, O, Fe, etc.) if known
    pub element: Option<String>,
    /// Name of the residue the atom belongs to
    pub resname: String,
    /// Residue number within the chain
    pub resid: isize,
    /// Chain identifier
    pub chain: String,
    /// Position (angstrom)
    pub pos: Point,
    /// Partial charge
    pub charge: Option<f64>,
    /// Mass (g/mol)
    pub mass: Option<f64>,
}

impl Atom {
    /// New atom with given identity and name, otherwise default values.
    pub fn new(index: usize, name: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Builder-style residue annotation.
    pub fn with_residue(mut self, resname: &str, resid: isize, chain: &str) -> Self {
        self.resname = resname.to_string();
        self.resid = resid;
        self.chain = chain.to_string();
        self
    }

    /// Builder-style element annotation.
    pub fn with_element(mut self, element: &str) -> Self {
        self.element = Some(element.to_string());
        self
    }

    /// Builder-style position.
    pub fn with_pos(mut self, pos: Point) -> Self {
        self.pos = pos;
        self
    }

    /// Builder-style mass.
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }

    /// Builder-style charge.
    pub fn with_charge(mut self, charge: f64) -> Self {
        self.charge = Some(charge);
        self
    }

    /// Key grouping atoms into residues.
    pub fn residue_key(&self) -> (&str, isize) {
        (&self.chain, self.resid)
    }

    /// Infer the element from the atom name.
    ///
    /// Leading digits are stripped. A name whose alphabetic part is exactly a
    /// known two-letter symbol resolves to that symbol; anything else resolves
    /// to its first letter. _CA_ deliberately resolves to carbon, not calcium,
    /// as alpha carbons vastly outnumber calcium ions in biomolecular input.
    ///
    /// # Examples
    /// ~~~
    /// use coarsen::graph::Atom;
    /// assert_eq!(Atom::new(0, "CL").guess_element(), Some("CL".to_string()));
    /// assert_eq!(Atom::new(0, "CA").guess_element(), Some("C".to_string()));
    /// assert_eq!(Atom::new(0, "1HB2").guess_element(), Some("H".to_string()));
    /// assert_eq!(Atom::new(0, "1").guess_element(), None);
    /// ~~~
    pub fn guess_element(&self) -> Option<String> {
        const TWO_LETTER: [&str; 12] = [
            "BR", "CL", "CU", "FE", "LI", "MG", "MN", "NA", "SE", "SI", "ZN", "RB",
        ];
        let symbol: String = self
            .name
            .chars()
            .skip_while(|c| c.is_ascii_digit())
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_uppercase();
        if symbol.is_empty() {
            None
        } else if symbol.len() == 2 && TWO_LETTER.contains(&symbol.as_str()) {
            Some(symbol)
        } else {
            Some(symbol[..1].to_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain() {
        let atom = Atom::new(3, "CA")
            .with_residue("ALA", 7, "A")
            .with_element("C")
            .with_mass(12.011);
        assert_eq!(atom.index, 3);
        assert_eq!(atom.name, "CA");
        assert_eq!(atom.resname, "ALA");
        assert_eq!(atom.resid, 7);
        assert_eq!(atom.chain, "A");
        assert_eq!(atom.element.as_deref(), Some("C"));
        assert_eq!(atom.mass, Some(12.011));
        assert_eq!(atom.residue_key(), ("A", 7));
    }

    #[test]
    fn element_guessing() {
        assert_eq!(Atom::new(0, "OW").guess_element().as_deref(), Some("O"));
        assert_eq!(Atom::new(0, "1HB2").guess_element().as_deref(), Some("H"));
        assert_eq!(Atom::new(0, "O").guess_element().as_deref(), Some("O"));
        assert_eq!(Atom::new(0, "NA").guess_element().as_deref(), Some("NA"));
        assert_eq!(Atom::new(0, "CA").guess_element().as_deref(), Some("C"));
        assert_eq!(Atom::new(0, "123").guess_element(), None);
    }
}
