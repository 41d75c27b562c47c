//! Input discovery: scan a folder for images whose file name carries a channel tag,
//! and locate the paired image of another channel by substituting that tag.
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::core::params::DiscoveryParams;
use crate::error::{Error, Result};

/// Glob semantics of `*{pattern}*{extension}` applied to a bare file name.
pub fn matches_pattern(file_name: &str, pattern: &str, extension: &str) -> bool {
    match file_name.strip_suffix(extension) {
        Some(stem) => stem.contains(pattern),
        None => false,
    }
}

fn in_subfolder(path: &Path, subfolder: Option<&str>) -> bool {
    match subfolder {
        None => true,
        Some(name) => path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n == name)
            .unwrap_or(false),
    }
}

/// All matching files below `params.root`, sorted by path.
///
/// Fails with [`Error::InputPathNotFound`] if the root is not a directory and with
/// [`Error::EmptyInputSet`] if nothing matches.
pub fn discover_images(params: &DiscoveryParams) -> Result<Vec<PathBuf>> {
    if !params.root.is_dir() {
        return Err(Error::InputPathNotFound {
            path: params.root.clone(),
        });
    }

    let walker = if params.recursive {
        WalkDir::new(&params.root).min_depth(1)
    } else {
        WalkDir::new(&params.root).min_depth(1).max_depth(1)
    };

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !matches_pattern(&name, &params.pattern, &params.extension) {
            continue;
        }
        let path = entry.into_path();
        if in_subfolder(&path, params.subfolder.as_deref()) {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(Error::EmptyInputSet {
            root: params.root.clone(),
            pattern: params.pattern.clone(),
            extension: params.extension.clone(),
        });
    }

    info!(
        "Found {} images matching *{}*{} in {:?}",
        files.len(),
        params.pattern,
        params.extension,
        params.root
    );
    Ok(files)
}

/// Path of the paired image: same directory, `from` replaced by `to` in the file name.
pub fn paired_path(path: &Path, from: &str, to: &str) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    if from.is_empty() || !name.contains(from) {
        return None;
    }
    Some(path.with_file_name(name.replace(from, to)))
}

/// Locate the existing paired image for `path`.
pub fn resolve_pair(path: &Path, from: &str, to: &str) -> Result<PathBuf> {
    let candidate = paired_path(path, from, to).unwrap_or_else(|| path.to_path_buf());
    if candidate != path && candidate.is_file() {
        debug!("Paired {:?} with {:?}", path, candidate);
        Ok(candidate)
    } else {
        Err(Error::MissingPairedFile { path: candidate })
    }
}

/// One entry of a discovery plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    pub primary: PathBuf,
    /// Resolved paired image, if pairing was requested and the file exists
    pub paired: Option<PathBuf>,
    /// Expected paired path that does not exist
    pub missing_pair: Option<PathBuf>,
}

/// Discover inputs and resolve their pairs without loading anything.
pub fn plan_work(params: &DiscoveryParams) -> Result<Vec<WorkItem>> {
    let files = discover_images(params)?;
    let items = files
        .into_iter()
        .map(|primary| match params.pair_pattern.as_deref() {
            None => WorkItem {
                primary,
                paired: None,
                missing_pair: None,
            },
            Some(to) => match resolve_pair(&primary, &params.pattern, to) {
                Ok(paired) => WorkItem {
                    primary,
                    paired: Some(paired),
                    missing_pair: None,
                },
                Err(Error::MissingPairedFile { path }) => WorkItem {
                    primary,
                    paired: None,
                    missing_pair: Some(path),
                },
                Err(_) => WorkItem {
                    primary,
                    paired: None,
                    missing_pair: None,
                },
            },
        })
        .collect();
    Ok(items)
}
