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

//! # Transformation pipeline
//!
//! An ordered sequence of [`Stage`] objects applied to each molecule:
//! consistency check, attribute repair, template matching, resolution
//! mapping, topology synthesis, and post-processing. Stages communicate
//! through a per-molecule [`Workspace`] and collect structured diagnostics.
//!
//! Residue-scoped failures never abort a run; they are attached to the
//! molecule's diagnostics and processing continues. Structural failures of
//! the input graph abort immediately since no partial result is trustworthy.
//!
//! Molecules are independent: they share only the read-only force field and
//! configuration, and [`process_molecules`] maps them across threads while
//! collecting results in input order.

use core::fmt::Debug;

use dyn_clone::DynClone;
use rayon::prelude::*;

use crate::config::Config;
use crate::errors::Diagnostic;
use crate::forcefield::ForceField;
use crate::graph::MoleculeGraph;
use crate::mapper::{map_residue, ResidueBeads};
use crate::matching::{residue_windows, Matcher, ResidueMatch};
use crate::topology::{Topology, TopologyBuilder};

/// Read-only state shared by all stages of one run: never a process-wide
/// singleton, so molecules can be processed in parallel without hidden
/// coupling.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub forcefield: &'a ForceField,
    pub config: &'a Config,
}

/// Mutable per-molecule state handed from stage to stage.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    /// The atomistic input graph, repaired in place
    pub molecule: MoleculeGraph,
    /// Matched residues awaiting resolution mapping
    pub matches: Vec<ResidueMatch>,
    /// Matched residues with their materialized beads
    pub residues: Vec<(ResidueMatch, ResidueBeads)>,
    /// The coarse-grained graph under construction
    pub cg: MoleculeGraph,
    /// The bonded topology under construction
    pub topology: Topology,
    /// Everything reportable that happened so far
    pub diagnostics: Vec<Diagnostic>,
}

impl Workspace {
    fn new(molecule: MoleculeGraph) -> Self {
        Self {
            cg: MoleculeGraph::new(molecule.name()),
            molecule,
            ..Default::default()
        }
    }
}

/// Interface for pipeline stages: transform a molecular graph, optionally
/// emitting diagnostics into the workspace.
pub trait Stage: Debug + DynClone + Send + Sync {
    /// Stage name used in logs and diagnostics
    fn name(&self) -> &'static str;

    /// Apply the stage. An `Err` aborts the whole molecule.
    fn run(&self, workspace: &mut Workspace, context: &RunContext) -> anyhow::Result<()>;
}

dyn_clone::clone_trait_object!(Stage);

/// Everything produced for one molecule.
#[derive(Debug, Clone)]
pub struct ProcessedMolecule {
    /// Coarse-grained graph: beads as nodes, numbered contiguously
    pub cg: MoleculeGraph,
    /// Bonded-interaction instances plus exclusions
    pub topology: Topology,
    /// Structured diagnostics for the caller to act on
    pub diagnostics: Vec<Diagnostic>,
}

/// An ordered, explicitly composed list of stages.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// The standard stage sequence.
    pub fn standard() -> Self {
        Self::default()
            .with_stage(Box::new(CheckGraph))
            .with_stage(Box::new(Repair))
            .with_stage(Box::new(MatchBlocks))
            .with_stage(Box::new(MapResolution))
            .with_stage(Box::new(BuildTopology))
            .with_stage(Box::new(PostProcess))
    }

    /// Append a stage.
    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Run all stages over one molecule.
    pub fn run(
        &self,
        molecule: MoleculeGraph,
        context: &RunContext,
    ) -> anyhow::Result<ProcessedMolecule> {
        let mut workspace = Workspace::new(molecule);
        for stage in &self.stages {
            log::debug!(
                "molecule '{}': running stage '{}'",
                workspace.molecule.name(),
                stage.name()
            );
            stage.run(&mut workspace, context)?;
        }
        Ok(ProcessedMolecule {
            cg: workspace.cg,
            topology: workspace.topology,
            diagnostics: workspace.diagnostics,
        })
    }
}

/// Process independent molecules in parallel with the standard pipeline.
///
/// Molecules share only the read-only template library and configuration;
/// results are collected in input order, so the output is deterministic
/// regardless of thread count.
pub fn process_molecules(
    molecules: Vec<MoleculeGraph>,
    forcefield: &ForceField,
    config: &Config,
) -> anyhow::Result<Vec<ProcessedMolecule>> {
    let pipeline = Pipeline::standard();
    let context = RunContext { forcefield, config };
    molecules
        .into_par_iter()
        .map(|molecule| pipeline.run(molecule, &context))
        .collect()
}

/// Fails fast on malformed input graphs.
#[derive(Debug, Clone)]
pub struct CheckGraph;

impl Stage for CheckGraph {
    fn name(&self) -> &'static str {
        "check"
    }

    fn run(&self, workspace: &mut Workspace, _context: &RunContext) -> anyhow::Result<()> {
        workspace.molecule.validate()?;
        Ok(())
    }
}

/// Repairs atom attributes: residue-name overrides and element inference.
#[derive(Debug, Clone)]
pub struct Repair;

impl Stage for Repair {
    fn name(&self) -> &'static str {
        "repair"
    }

    fn run(&self, workspace: &mut Workspace, context: &RunContext) -> anyhow::Result<()> {
        let renames = &context.config.rename_residues;
        let mut renamed = 0usize;
        let mut inferred = 0usize;
        for atom in workspace.molecule.atoms_mut() {
            if let Some(new_name) = renames.get(&atom.resname) {
                atom.resname = new_name.clone();
                renamed += 1;
            }
            if atom.element.is_none() {
                atom.element = atom.guess_element();
                inferred += 1;
            }
        }
        if renamed + inferred > 0 {
            log::info!(
                "molecule '{}': renamed {} residues, inferred {} elements",
                workspace.molecule.name(),
                renamed,
                inferred
            );
        }
        Ok(())
    }
}

/// Matches each residue window against its block template.
#[derive(Debug, Clone)]
pub struct MatchBlocks;

impl Stage for MatchBlocks {
    fn name(&self) -> &'static str {
        "match"
    }

    fn run(&self, workspace: &mut Workspace, context: &RunContext) -> anyhow::Result<()> {
        let windows = residue_windows(&workspace.molecule);
        let matcher = Matcher::new(&workspace.molecule, context.config.search_budget);

        for (index, window) in windows.iter().enumerate() {
            if context.config.exclude_residues.contains(&window.site.resname) {
                log::debug!("residue {} excluded from mapping", window.site);
                continue;
            }

            // terminus variants apply to the first and last residue of a chain
            let first_of_chain =
                index == 0 || windows[index - 1].site.chain != window.site.chain;
            let last_of_chain = index + 1 == windows.len()
                || windows[index + 1].site.chain != window.site.chain;
            let variant = if first_of_chain {
                context.config.begin_variant.as_deref()
            } else if last_of_chain {
                context.config.end_variant.as_deref()
            } else {
                None
            };

            let Some(block) = context.forcefield.block(&window.site.resname, variant) else {
                workspace.diagnostics.push(Diagnostic::residue(
                    self.name(),
                    crate::errors::ResidueError::UnknownResidue {
                        site: window.site.clone(),
                    },
                ));
                continue;
            };

            match matcher.match_block(window, block) {
                Ok((correspondence, unmatched)) => {
                    if !unmatched.is_empty() {
                        workspace.diagnostics.push(Diagnostic::anomaly(
                            self.name(),
                            window.site.clone(),
                            format!("unmatched atoms not declared optional: {unmatched:?}"),
                        ));
                    }
                    workspace.matches.push(ResidueMatch {
                        window: window.clone(),
                        block_name: block.name().clone(),
                        block_variant: block.variant().clone(),
                        correspondence,
                    });
                }
                Err(error) => {
                    log::warn!("{error}");
                    workspace
                        .diagnostics
                        .push(Diagnostic::residue(self.name(), error));
                }
            }
        }
        Ok(())
    }
}

/// Collapses each matched residue into beads of the coarse-grained graph.
#[derive(Debug, Clone)]
pub struct MapResolution;

impl Stage for MapResolution {
    fn name(&self) -> &'static str {
        "map"
    }

    fn run(&self, workspace: &mut Workspace, context: &RunContext) -> anyhow::Result<()> {
        for matched in std::mem::take(&mut workspace.matches) {
            let Some(block) = context
                .forcefield
                .block(&matched.block_name, matched.block_variant.as_deref())
            else {
                continue;
            };
            let (beads, diagnostics) =
                map_residue(&workspace.molecule, &matched, block, &mut workspace.cg);
            workspace.diagnostics.extend(diagnostics);
            workspace.residues.push((matched, beads));
        }
        Ok(())
    }
}

/// Instantiates block and link interactions.
#[derive(Debug, Clone)]
pub struct BuildTopology;

impl Stage for BuildTopology {
    fn name(&self) -> &'static str {
        "build"
    }

    fn run(&self, workspace: &mut Workspace, context: &RunContext) -> anyhow::Result<()> {
        let builder = TopologyBuilder::new(context.forcefield);
        let (topology, diagnostics) = builder.build(&workspace.molecule, &workspace.residues);
        workspace.topology = topology;
        workspace.diagnostics.extend(diagnostics);
        Ok(())
    }
}

/// Deduplicates interactions and derives nonbonded exclusions.
#[derive(Debug, Clone)]
pub struct PostProcess;

impl Stage for PostProcess {
    fn name(&self) -> &'static str {
        "post-process"
    }

    fn run(&self, workspace: &mut Workspace, context: &RunContext) -> anyhow::Result<()> {
        for conflict in workspace.topology.deduplicate() {
            workspace
                .diagnostics
                .push(Diagnostic::topology(self.name(), conflict));
        }
        let bead_ids: Vec<usize> = workspace.cg.atoms().map(|a| a.index).collect();
        workspace
            .topology
            .derive_exclusions(bead_ids, context.config.exclusion_distance);
        Ok(())
    }
}
