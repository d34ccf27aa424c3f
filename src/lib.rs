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

//! # Coarsen
//!
//! Transforms an atomistic molecular structure into a coarse-grained
//! representation by matching observed atomic connectivity against a library
//! of reference residue templates, then synthesizing a consistent
//! bonded-interaction topology for the coarse-grained model.
//!
//! The crate deliberately has no I/O: structure and topology files are read
//! and written by external collaborators, which hand over a
//! [`graph::MoleculeGraph`] plus a [`forcefield::ForceField`] and receive the
//! coarse-grained graph, its [`topology::Topology`], and a structured
//! diagnostics list.
//!
//! # Examples
//! ~~~no_run
//! use coarsen::{process_molecules, Config, ForceField};
//! # fn read_library(_: &str) -> String { unimplemented!() }
//! # fn read_molecules() -> Vec<coarsen::MoleculeGraph> { unimplemented!() }
//! let config = Config::from_str("forcefield: martini30")?;
//! let forcefield = ForceField::from_str(&read_library(&config.forcefield))?;
//! let processed = process_molecules(read_molecules(), &forcefield, &config)?;
//! for molecule in &processed {
//!     for diagnostic in &molecule.diagnostics {
//!         eprintln!("{diagnostic}");
//!     }
//! }
//! # anyhow::Ok(())
//! ~~~

use nalgebra::Vector3;

/// Cartesian position
pub type Point = Vector3<f64>;

pub mod config;
pub mod errors;
pub mod forcefield;
pub mod graph;
pub mod mapper;
pub mod matching;
pub mod pipeline;
pub mod topology;

pub use config::Config;
pub use errors::{Diagnostic, DiagnosticKind, GraphError, ResidueError, Severity, TopologyError};
pub use forcefield::ForceField;
pub use graph::MoleculeGraph;
pub use pipeline::{process_molecules, Pipeline, ProcessedMolecule, RunContext, Stage};
pub use topology::Topology;
