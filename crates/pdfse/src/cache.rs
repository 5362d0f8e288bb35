use crate::prelude::{eprintln, println, *};
use log::{debug, warn};
use pdfse_core::heuristics::Heuristics;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, clap::Parser)]
pub struct ClearOptions {
    /// Delete the whole cache file
    #[clap(long)]
    pub all: bool,

    /// Remove the heuristic of a label (repeatable)
    #[clap(long = "label", short = 'l')]
    pub labels: Vec<String>,
}

/// Default cache location under the user cache directory.
fn default_cache_path() -> Result<PathBuf> {
    let cache_dir = dirs_next::cache_dir()
        .ok_or_else(|| eyre!("Unable to determine cache directory"))?
        .join("pdfse");

    Ok(cache_dir.join("heuristics.json"))
}

/// The cache file to use: `--cache` / `PDFSE_CACHE`, or the default location.
pub fn resolve_path(global: &crate::Global) -> Result<PathBuf> {
    match &global.cache {
        Some(path) => Ok(path.clone()),
        None => default_cache_path(),
    }
}

/// Load the heuristics cache. A missing or unreadable file is an empty cache.
pub fn load(path: &Path) -> Heuristics {
    if !path.exists() {
        debug!("no heuristics cache at {}", path.display());
        return Heuristics::new();
    }

    match fs::read_to_string(path) {
        Ok(content) => Heuristics::from_json_str(&content),
        Err(e) => {
            warn!("cannot read heuristics cache {}: {}", path.display(), e);
            Heuristics::new()
        }
    }
}

/// Replace the cache file with `heuristics`. Failures are reported, never fatal.
pub fn save(path: &Path, heuristics: &Heuristics) -> bool {
    match write_cache(path, heuristics) {
        Ok(()) => true,
        Err(e) => {
            warn!("cannot save heuristics cache: {:?}", e);
            eprintln!(
                "{} Could not save heuristic cache to {}: {}",
                warn_mark(),
                path.display(),
                e
            );
            false
        }
    }
}

fn write_cache(path: &Path, heuristics: &Heuristics) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let content = heuristics.to_json_pretty()?;
    fs::write(path, content).map_err(|e| eyre!("Failed to write cache: {}", e))
}

/// What a clear request did to the cache.
#[derive(Debug, PartialEq)]
pub enum ClearOutcome {
    /// The cache file does not exist.
    Missing,
    /// The cache file was deleted.
    Deleted,
    /// Labels were removed; the rest were not in the cache.
    Removed {
        removed: Vec<String>,
        skipped: Vec<String>,
    },
    /// Neither `--all` nor a label was given.
    NothingRequested,
}

/// Delete the cache file (`all`) or drop `labels` from it.
pub fn clear(path: &Path, all: bool, labels: &[String]) -> Result<ClearOutcome> {
    if !path.exists() {
        return Ok(ClearOutcome::Missing);
    }

    if all {
        fs::remove_file(path)
            .map_err(|e| eyre!("Could not delete heuristics cache: {}", e))?;
        return Ok(ClearOutcome::Deleted);
    }

    if labels.is_empty() {
        return Ok(ClearOutcome::NothingRequested);
    }

    let mut heuristics = load(path);
    let removed = heuristics.remove_labels(labels);
    let skipped = labels
        .iter()
        .filter(|label| !removed.contains(label))
        .cloned()
        .collect();

    if !removed.is_empty() {
        write_cache(path, &heuristics)?;
    }

    Ok(ClearOutcome::Removed { removed, skipped })
}

pub async fn run(options: ClearOptions, global: crate::Global) -> Result<()> {
    let path = resolve_path(&global)?;

    if global.verbose {
        eprintln!("Cache: {}", path.display());
    }

    match clear(&path, options.all, &options.labels)? {
        ClearOutcome::Missing => {
            println!(
                "{} Heuristics cache file not found. Nothing to clear.",
                warn_mark()
            );
        }
        ClearOutcome::Deleted => {
            println!(
                "{} Heuristics cache file deleted: {}",
                done_mark(),
                path.display()
            );
        }
        ClearOutcome::NothingRequested => {
            println!("‧ Nothing to clear. Pass --all or --label <LABEL>.");
        }
        ClearOutcome::Removed { removed, skipped } => {
            for label in &removed {
                println!("{} Removed heuristic for label: '{}'", done_mark(), label);
            }
            for label in &skipped {
                println!(
                    "{} Heuristic for label '{}' not found. Skipping.",
                    warn_mark(),
                    label
                );
            }
            if removed.is_empty() {
                println!("‧ No matching heuristics found to remove.");
            } else {
                println!(
                    "{} Heuristics cache updated. Removed {} label(s).",
                    done_mark(),
                    removed.len()
                );
            }
        }
    }

    Ok(())
}
