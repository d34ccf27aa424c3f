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

//! Error kinds and structured diagnostics.
//!
//! Residue-scoped failures ([`ResidueError`]) and topology-scoped failures
//! ([`TopologyError`]) are collected as [`Diagnostic`] values on the
//! processed molecule so that callers can decide programmatically whether to
//! abort. Only [`GraphError`] is fatal for a run: downstream stages cannot
//! operate on a corrupt graph.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topology::InteractionKind;

/// Location of a residue in the input, attached to every residue-scoped error.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResidueSite {
    /// Chain identifier
    pub chain: String,
    /// Residue number within the chain
    pub resid: isize,
    /// Residue name
    pub resname: String,
}

impl std::fmt::Display for ResidueSite {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "'{}' (chain {}, residue {})", self.resname, self.chain, self.resid)
    }
}

/// Failures scoped to a single residue. The residue is skipped and the run
/// continues; the error is surfaced as a [`Diagnostic`].
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResidueError {
    /// No block template registered for the residue name and variant.
    #[error("no block template for residue {site}")]
    UnknownResidue { site: ResidueSite },

    /// One or more mandatory reference atoms could not be matched.
    #[error("residue {site} is missing mandatory atoms {missing:?}")]
    IncompleteMatch { site: ResidueSite, missing: Vec<String> },

    /// Several structurally valid correspondences with equal score that are
    /// not attribute-equivalent. Requires manual resolution.
    #[error("residue {site} matches the template in {candidates} inequivalent ways")]
    AmbiguousMatch { site: ResidueSite, candidates: usize },

    /// The backtracking search exceeded its node budget.
    #[error("residue {site} exceeded the search budget of {budget} nodes")]
    SearchBudgetExceeded { site: ResidueSite, budget: usize },
}

impl ResidueError {
    /// The residue the error is scoped to.
    pub fn site(&self) -> &ResidueSite {
        match self {
            ResidueError::UnknownResidue { site }
            | ResidueError::IncompleteMatch { site, .. }
            | ResidueError::AmbiguousMatch { site, .. }
            | ResidueError::SearchBudgetExceeded { site, .. } => site,
        }
    }
}

/// Failures detected while synthesizing the bonded topology.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TopologyError {
    /// Two generated interactions cover the same bead set with different
    /// parameters. The first instantiation is kept.
    #[error(
        "conflicting {kind} parameters over beads {beads:?}: kept {kept:?}, discarded {discarded:?}"
    )]
    InteractionConflict {
        kind: InteractionKind,
        beads: Vec<usize>,
        kept: Vec<String>,
        discarded: Vec<String>,
    },

    /// An interaction template references a bead that was omitted because all
    /// of its constituent atoms were absent. The interaction is skipped.
    #[error("interaction {kind} in residue {site} references omitted bead '{bead}'")]
    MissingBead {
        kind: InteractionKind,
        site: ResidueSite,
        bead: String,
    },
}

/// Malformed input graph. Fatal for the whole run.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphError {
    /// A bond references an atom index that is not present in the graph.
    #[error("molecule '{molecule}': bond {first}-{second} references missing atom {missing}")]
    DanglingBond {
        molecule: String,
        first: usize,
        second: usize,
        missing: usize,
    },

    /// A bond joins an atom to itself.
    #[error("molecule '{molecule}': bond joins atom {index} to itself")]
    SelfBond { molecule: String, index: usize },

    /// An atom index occurs more than once.
    #[error("molecule '{molecule}': duplicate atom index {index}")]
    DuplicateAtom { molecule: String, index: usize },

    /// Metadata of two merged graphs disagrees.
    #[error("cannot merge molecule '{other}' into '{molecule}': conflicting names")]
    MergeConflict { molecule: String, other: String },
}

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Something was tolerated or skipped; the output is still usable.
    Warning,
    /// A residue or interaction was dropped from the output.
    Error,
}

/// Payload of a diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A residue-scoped matching failure.
    Residue(ResidueError),
    /// A topology-scoped failure.
    Topology(TopologyError),
    /// A reportable oddity that does not drop output, e.g. unmatched
    /// candidate atoms or an omitted empty bead.
    Anomaly { site: ResidueSite, message: String },
}

/// A single structured diagnostic collected during pipeline execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity of the event
    pub severity: Severity,
    /// Name of the pipeline stage that produced the event
    pub stage: String,
    /// What happened
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn residue(stage: &str, error: ResidueError) -> Self {
        Self {
            severity: Severity::Error,
            stage: stage.to_owned(),
            kind: DiagnosticKind::Residue(error),
        }
    }

    pub fn topology(stage: &str, error: TopologyError) -> Self {
        Self {
            severity: Severity::Error,
            stage: stage.to_owned(),
            kind: DiagnosticKind::Topology(error),
        }
    }

    pub fn anomaly(stage: &str, site: ResidueSite, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            stage: stage.to_owned(),
            kind: DiagnosticKind::Anomaly {
                site,
                message: message.into(),
            },
        }
    }

    /// Check if the diagnostic reports a dropped residue or interaction.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.kind {
            DiagnosticKind::Residue(e) => write!(f, "[{}] {}", self.stage, e),
            DiagnosticKind::Topology(e) => write!(f, "[{}] {}", self.stage, e),
            DiagnosticKind::Anomaly { site, message } => {
                write!(f, "[{}] residue {}: {}", self.stage, site, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn residue_error_site() {
        let site = ResidueSite {
            chain: "A".to_owned(),
            resid: 4,
            resname: "GLY".to_owned(),
        };
        let err = ResidueError::IncompleteMatch {
            site: site.clone(),
            missing: vec!["CA".to_owned()],
        };
        assert_eq!(err.site(), &site);
        assert!(err.to_string().contains("chain A"));
        assert!(err.to_string().contains("CA"));
    }

    #[test]
    fn diagnostic_severity() {
        let site = ResidueSite {
            chain: "A".to_owned(),
            resid: 1,
            resname: "ALA".to_owned(),
        };
        let diag = Diagnostic::residue("match", ResidueError::UnknownResidue { site: site.clone() });
        assert!(diag.is_error());
        let diag = Diagnostic::anomaly("match", site, "unmatched atoms");
        assert!(!diag.is_error());
    }
}
