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

//! Run configuration.
//!
//! Supplied by an external CLI or config layer, typically as YAML. The
//! configuration never carries force-field *content*, only the identifier of
//! the library to load and per-run adjustments.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use validator::Validate;

fn default_exclusion_distance() -> usize {
    1
}

fn default_search_budget() -> usize {
    100_000
}

/// Options recognized by the transformation pipeline.
///
/// # Examples
/// ~~~
/// use coarsen::Config;
/// let config = Config::from_str("forcefield: martini30").unwrap();
/// assert_eq!(config.forcefield, "martini30");
/// assert_eq!(config.exclusion_distance, 1);
/// ~~~
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Identifier of the template library to load
    pub forcefield: String,

    /// Residue-name overrides applied during repair, input name to library
    /// name
    #[serde(default, with = "::serde_with::rust::maps_duplicate_key_is_error")]
    pub rename_residues: BTreeMap<String, String>,

    /// Block variant for the first residue of each chain, e.g. a terminus
    /// modification
    #[serde(default)]
    pub begin_variant: Option<String>,

    /// Block variant for the last residue of each chain
    #[serde(default)]
    pub end_variant: Option<String>,

    /// Residue names excluded from mapping entirely
    #[serde(default)]
    pub exclude_residues: BTreeSet<String>,

    /// Topological distance out to which nonbonded exclusions are derived
    #[serde(default = "default_exclusion_distance")]
    #[validate(range(min = 1))]
    pub exclusion_distance: usize,

    /// Node budget of the per-residue matching search
    #[serde(default = "default_search_budget")]
    #[validate(range(min = 1))]
    pub search_budget: usize,
}

impl Config {
    /// Convert a yaml-formatted string into a Config.
    /// This performs sanity checks and always returns either a valid
    /// configuration or an error.
    pub fn from_str(string: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str::<Config>(string)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration selecting a force field, with defaults otherwise.
    pub fn new(forcefield: &str) -> Self {
        Self {
            forcefield: forcefield.to_string(),
            rename_residues: BTreeMap::new(),
            begin_variant: None,
            end_variant: None,
            exclude_residues: BTreeSet::new(),
            exclusion_distance: default_exclusion_distance(),
            search_budget: default_search_budget(),
        }
    }
}
