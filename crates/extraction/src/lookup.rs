//! Region lookup and variable abbreviation tables.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ExtractionError, Result};

/// One row of the region availability table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegionEntry {
    pub id: u32,
    pub name: String,
}

/// Region id/name table, loaded from the published availability CSV.
///
/// Only the `id` and `name` columns are read; any others are ignored.
#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    entries: Vec<RegionEntry>,
}

impl RegionTable {
    pub fn from_entries(entries: Vec<RegionEntry>) -> Self {
        Self { entries }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let entries = rdr
            .deserialize::<RegionEntry>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ExtractionError::Lookup(format!("malformed region table: {}", e)))?;
        debug!(count = entries.len(), "Loaded region table");
        Ok(Self { entries })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn entries(&self) -> &[RegionEntry] {
        &self.entries
    }

    /// All region ids in table order.
    pub fn ids(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.id).collect()
    }

    /// Names recorded for an id (exact match).
    pub fn names_for(&self, id: u32) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.id == id)
            .map(|e| e.name.clone())
            .collect()
    }

    /// Ids recorded for a name (case-insensitive).
    pub fn ids_for(&self, name: &str) -> Vec<u32> {
        let needle = name.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.name.to_lowercase() == needle)
            .map(|e| e.id)
            .collect()
    }
}

/// Why a lookup did not produce exactly one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ambiguity<'a, T> {
    /// No entry matched
    Missing,
    /// Several entries matched
    Multiple(&'a [T]),
}

/// Settles lookups that miss or match more than once.
pub trait ResolutionPolicy: Send + Sync {
    /// Pick an id for `name`. `None` aborts the lookup.
    fn resolve_id(&self, name: &str, ambiguity: Ambiguity<'_, u32>) -> Option<u32>;

    /// Pick a name for `id`. `None` aborts the lookup.
    fn resolve_name(&self, id: u32, ambiguity: Ambiguity<'_, String>) -> Option<String>;
}

/// Fails on every miss or ambiguity.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictPolicy;

impl ResolutionPolicy for StrictPolicy {
    fn resolve_id(&self, _name: &str, _ambiguity: Ambiguity<'_, u32>) -> Option<u32> {
        None
    }

    fn resolve_name(&self, _id: u32, _ambiguity: Ambiguity<'_, String>) -> Option<String> {
        None
    }
}

/// Takes the first match of an ambiguous lookup; fails on a miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMatchPolicy;

impl ResolutionPolicy for FirstMatchPolicy {
    fn resolve_id(&self, name: &str, ambiguity: Ambiguity<'_, u32>) -> Option<u32> {
        match ambiguity {
            Ambiguity::Multiple(ids) => {
                warn!(name, candidates = ?ids, "Ambiguous region name, using first match");
                ids.first().copied()
            }
            Ambiguity::Missing => None,
        }
    }

    fn resolve_name(&self, id: u32, ambiguity: Ambiguity<'_, String>) -> Option<String> {
        match ambiguity {
            Ambiguity::Multiple(names) => {
                warn!(region_id = id, candidates = ?names, "Ambiguous region id, using first match");
                names.first().cloned()
            }
            Ambiguity::Missing => None,
        }
    }
}

/// Remove every character that is not an ASCII letter or whitespace.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphabetic() || c.is_whitespace())
        .collect()
}

/// Completes a region id/name pair from the table.
pub struct RegionResolver<'a> {
    table: Option<&'a RegionTable>,
    policy: &'a dyn ResolutionPolicy,
}

impl<'a> RegionResolver<'a> {
    /// `table` may be `None` when neither the local nor the published table
    /// could be loaded; every lookup then goes through the policy.
    pub fn new(table: Option<&'a RegionTable>, policy: &'a dyn ResolutionPolicy) -> Self {
        Self { table, policy }
    }

    /// Return the `(id, name)` pair for the region.
    ///
    /// When both are given they are used as-is apart from sanitizing the name.
    pub fn resolve(&self, id: Option<u32>, name: Option<&str>) -> Result<(u32, String)> {
        match (id, name) {
            (Some(id), Some(name)) => Ok((id, sanitize_name(name))),
            (Some(id), None) => Ok((id, sanitize_name(&self.name_for(id)?))),
            (None, Some(name)) => Ok((self.id_for(name)?, sanitize_name(name))),
            (None, None) => Err(ExtractionError::MissingRegion),
        }
    }

    fn id_for(&self, name: &str) -> Result<u32> {
        let ids = self.table.map(|t| t.ids_for(name)).unwrap_or_default();
        let resolved = match ids.as_slice() {
            [id] => Some(*id),
            [] => self.policy.resolve_id(name, Ambiguity::Missing),
            many => self.policy.resolve_id(name, Ambiguity::Multiple(many)),
        };
        resolved.ok_or_else(|| match ids.len() {
            0 => ExtractionError::Lookup(format!("no region named '{}'", name)),
            n => ExtractionError::Lookup(format!("{} regions named '{}'", n, name)),
        })
    }

    fn name_for(&self, id: u32) -> Result<String> {
        let names = self.table.map(|t| t.names_for(id)).unwrap_or_default();
        let resolved = match names.as_slice() {
            [name] => Some(name.clone()),
            [] => self.policy.resolve_name(id, Ambiguity::Missing),
            many => self.policy.resolve_name(id, Ambiguity::Multiple(many)),
        };
        resolved.ok_or_else(|| match names.len() {
            0 => ExtractionError::Lookup(format!("no region with id {}", id)),
            n => ExtractionError::Lookup(format!("{} names for region id {}", n, id)),
        })
    }
}

/// Variable name to short code, used in output file names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AbbreviationTable {
    codes: BTreeMap<String, String>,
}

impl AbbreviationTable {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            codes: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ExtractionError::InvalidConfig(format!("abbreviation table: {}", e)))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn shortname(&self, variable: &str) -> Option<&str> {
        self.codes.get(variable).map(String::as_str)
    }

    /// Fail with every variable that has no abbreviation.
    pub fn validate(&self, variables: &[String]) -> Result<()> {
        let unknown: Vec<String> = variables
            .iter()
            .filter(|v| !self.codes.contains_key(v.as_str()))
            .cloned()
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ExtractionError::InvalidVariable(unknown))
        }
    }

    /// Short codes of `variables` joined with `_`.
    pub fn joined_shortnames(&self, variables: &[String]) -> Result<String> {
        self.validate(variables)?;
        Ok(variables
            .iter()
            .filter_map(|v| self.shortname(v))
            .collect::<Vec<_>>()
            .join("_"))
    }
}
