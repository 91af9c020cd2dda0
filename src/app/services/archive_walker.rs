//! Archive tree traversal and directory qualification.
//!
//! Directories are visited in a deterministic, lexicographically sorted
//! depth-first pre-order. A directory qualifies when it directly contains a
//! file ending in the primary quaternion extension and none ending in the
//! complementary one. Qualification triggers the double-observation check,
//! which searches the whole subtree, so a directory can be flagged based on
//! companion files several levels below it.

use crate::app::models::{ArchiveDirectory, DoubleObservation};
use crate::app::progress::{ProgressStage, RunContext};
use crate::constants::{DOUBLE_OBS_BASE_SUFFIX, DOUBLE_OBS_PAIR_SUFFIX, DOUBLE_OBS_SIZE_RATIO};
use crate::Result;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Scan the archive tree, qualifying directories and reporting per-directory
/// progress. Cancellation is polled once per visited directory.
pub fn scan(
    root: &Path,
    primary_ext: &str,
    complement_ext: &str,
    ctx: &RunContext,
) -> Result<Vec<ArchiveDirectory>> {
    let total = count_directories(root);
    let mut scanned = 0u64;
    let mut directories = Vec::new();

    for entry in sorted_walk(root) {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }

        ctx.check_interrupted()?;
        scanned += 1;
        ctx.report(
            ProgressStage::Directories,
            scanned,
            total,
            &format!("Scanning directory: {}", entry.path().display()),
        );

        let directory = qualify_directory(entry.path(), primary_ext, complement_ext)?;
        if directory.has_primary_companion {
            info!(
                "Found '{}' file in: {} (double observation: {})",
                primary_ext,
                directory.path.display(),
                directory.double_observation
            );
        }
        directories.push(directory);
    }

    Ok(directories)
}

/// Collect only the qualifying directories of a subtree, polling
/// cancellation per directory but emitting no directory progress.
/// Used by the tensor path, which reports progress at the grouping-unit
/// level instead.
pub fn qualifying(
    root: &Path,
    primary_ext: &str,
    complement_ext: &str,
    ctx: &RunContext,
) -> Result<Vec<ArchiveDirectory>> {
    let mut directories = Vec::new();
    for entry in sorted_walk(root) {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        ctx.check_interrupted()?;

        let directory = qualify_directory(entry.path(), primary_ext, complement_ext)?;
        if directory.has_primary_companion {
            directories.push(directory);
        }
    }
    Ok(directories)
}

/// Qualify one directory and run the double-observation check when it
/// qualifies. The check result is cached on the entry and never recomputed.
fn qualify_directory(
    path: &Path,
    primary_ext: &str,
    complement_ext: &str,
) -> Result<ArchiveDirectory> {
    let mut has_primary = false;
    let mut has_complement = false;

    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(primary_ext) {
            has_primary = true;
        }
        if name.ends_with(complement_ext) {
            has_complement = true;
        }
    }

    let qualifies = has_primary && !has_complement;
    let double_observation = if qualifies {
        detect_double_observation(path)?
    } else {
        DoubleObservation::Unknown
    };

    Ok(ArchiveDirectory {
        path: path.to_path_buf(),
        has_primary_companion: qualifies,
        double_observation,
    })
}

/// Depth-first search of the subtree for the first companion histogram pair.
/// The first size pair found wins; the search never continues looking for a
/// closer match. An exhausted subtree yields `No`.
pub fn detect_double_observation(dir: &Path) -> Result<DoubleObservation> {
    let mut base_size: Option<u64> = None;
    let mut pair_size: Option<u64> = None;

    for entry in sorted_walk(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();

        if base_size.is_none() && name.ends_with(DOUBLE_OBS_BASE_SUFFIX) {
            base_size = Some(entry.metadata()?.len());
        } else if pair_size.is_none() && name.ends_with(DOUBLE_OBS_PAIR_SUFFIX) {
            pair_size = Some(entry.metadata()?.len());
        }

        if let (Some(base), Some(pair)) = (base_size, pair_size) {
            let result = if pair as f64 >= DOUBLE_OBS_SIZE_RATIO * base as f64 {
                DoubleObservation::Yes
            } else {
                DoubleObservation::No
            };
            debug!(
                "Double observation pair in {}: {} vs {} bytes -> {}",
                dir.display(),
                base,
                pair,
                result
            );
            return Ok(result);
        }
    }

    Ok(DoubleObservation::No)
}

/// Total directory count for the progress denominator
fn count_directories(root: &Path) -> u64 {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .count() as u64
}

fn sorted_walk(root: &Path) -> walkdir::IntoIter {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
}
