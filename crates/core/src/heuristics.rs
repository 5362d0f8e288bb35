//! Heuristic cache model and batch planning.
//!
//! A heuristic maps field names to command trees for one document label. The
//! cache maps labels to heuristics and is foreign input: reading it never
//! fails, and malformed parts are dropped instead of poisoning the batch.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use log::warn;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::{parse_commands, CommandTree};

/// Field name -> command tree.
pub type Heuristic = BTreeMap<String, CommandTree>;

/// Field name -> human description of what to extract.
pub type ExtractionSchema = BTreeMap<String, String>;

/// Field name -> extracted value (`None` when not found).
pub type Extraction = BTreeMap<String, Option<String>>;

/// Label -> heuristic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Heuristics(BTreeMap<String, Heuristic>);

impl Heuristics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a cache document. Invalid JSON or a non-object root yields an
    /// empty cache.
    pub fn from_json_str(s: &str) -> Self {
        match serde_json::from_str::<Value>(s) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                warn!("invalid heuristics cache, starting empty: {}", e);
                Self::default()
            }
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let Some(labels) = value.as_object() else {
            warn!("heuristics cache root is not an object, starting empty");
            return Self::default();
        };

        let mut heuristics = Self::default();
        for (label, heuristic) in labels {
            if !heuristic.is_object() {
                warn!("dropping heuristic for label {:?}: not an object", label);
                continue;
            }
            heuristics
                .0
                .insert(label.clone(), heuristic_from_value(heuristic));
        }
        heuristics
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn get(&self, label: &str) -> Option<&Heuristic> {
        self.0.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fold freshly generated trees into `label`, replacing existing fields of
    /// the same name. Returns whether anything was added.
    pub fn merge(&mut self, label: &str, heuristic: Heuristic) -> bool {
        if heuristic.is_empty() {
            return false;
        }
        self.0.entry(label.to_string()).or_default().extend(heuristic);
        true
    }

    /// Drop the given labels, returning the ones that were present.
    pub fn remove_labels(&mut self, labels: &[String]) -> Vec<String> {
        labels
            .iter()
            .filter(|label| self.0.remove(label.as_str()).is_some())
            .cloned()
            .collect()
    }
}

/// Lenient field -> tree parsing. Non-object input yields an empty heuristic.
pub fn heuristic_from_value(value: &Value) -> Heuristic {
    value
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .map(|(field, tree)| (field.clone(), parse_commands(tree)))
                .collect()
        })
        .unwrap_or_default()
}

/// One dataset row, with its 1-based position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: usize,
    pub label: String,
    pub pdf_path: PathBuf,
    pub extraction_schema: ExtractionSchema,
}

/// A request for new trees: the fields a label still lacks and the sample
/// documents to show the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicTask {
    pub label: String,
    pub schema_to_fetch: ExtractionSchema,
    pub pdf_paths: Vec<PathBuf>,
}

/// An entry is cached when every schema field has a tree for its label.
pub fn is_entry_cached(entry: &Entry, heuristics: &Heuristics) -> bool {
    let cached = heuristics.get(&entry.label);
    entry
        .extraction_schema
        .keys()
        .all(|field| cached.is_some_and(|h| h.contains_key(field)))
}

/// Split entries into `(cached, needing_heuristics)`, keeping dataset order.
pub fn partition_entries<'a>(
    entries: &'a [Entry],
    heuristics: &Heuristics,
) -> (Vec<&'a Entry>, Vec<&'a Entry>) {
    entries
        .iter()
        .partition(|entry| is_entry_cached(entry, heuristics))
}

/// Per label, in order of first appearance, the union of schema fields not yet
/// in the cache. Labels with nothing missing are omitted.
pub fn unknown_label_fields(
    entries: &[&Entry],
    heuristics: &Heuristics,
) -> Vec<(String, ExtractionSchema)> {
    let mut combined: Vec<(String, ExtractionSchema)> = Vec::new();
    for entry in entries {
        let index = match combined.iter().position(|(label, _)| label == &entry.label) {
            Some(index) => index,
            None => {
                combined.push((entry.label.clone(), ExtractionSchema::new()));
                combined.len() - 1
            }
        };
        combined[index].1.extend(
            entry
                .extraction_schema
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }

    combined
        .into_iter()
        .filter_map(|(label, fields)| {
            let cached = heuristics.get(&label);
            let missing: ExtractionSchema = fields
                .into_iter()
                .filter(|(field, _)| !cached.is_some_and(|h| h.contains_key(field)))
                .collect();
            (!missing.is_empty()).then_some((label, missing))
        })
        .collect()
}

/// Plan one generation task per label with missing fields, sampling up to
/// `samples` distinct documents of that label.
pub fn plan_heuristic_tasks<R: Rng + ?Sized>(
    entries: &[&Entry],
    heuristics: &Heuristics,
    samples: usize,
    rng: &mut R,
) -> Vec<HeuristicTask> {
    unknown_label_fields(entries, heuristics)
        .into_iter()
        .map(|(label, schema_to_fetch)| {
            let mut seen = HashSet::new();
            let candidates: Vec<&PathBuf> = entries
                .iter()
                .filter(|entry| entry.label == label)
                .map(|entry| &entry.pdf_path)
                .filter(|path| seen.insert(*path))
                .collect();

            let pdf_paths = candidates
                .choose_multiple(rng, samples.min(candidates.len()))
                .map(|path| (*path).clone())
                .collect();

            HeuristicTask {
                label,
                schema_to_fetch,
                pdf_paths,
            }
        })
        .collect()
}
