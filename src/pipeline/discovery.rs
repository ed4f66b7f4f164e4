//! Dataset lookup.
//!
//! Datasets are the sub-directories of the data directory, usually named by
//! acquisition timestamp. On the command line they are selected by any
//! unambiguous suffix of their name, or all at once.

use crate::error::{AppResult, PostError};
use std::fs;
use std::path::{Path, PathBuf};

/// Selector meaning "every dataset".
pub const ALL: &str = "all";

/// Names of every dataset directory under `data_dir`, sorted.
pub fn list_datasets(data_dir: &Path) -> AppResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Resolve command-line selectors to dataset directories.
///
/// An empty selector list, or one containing `all`, selects every dataset.
/// Otherwise each selector must be the suffix of exactly one dataset name.
/// Duplicates are dropped; order follows the selectors.
pub fn resolve<S: AsRef<str>>(data_dir: &Path, selectors: &[S]) -> AppResult<Vec<PathBuf>> {
    let names = list_datasets(data_dir)?;

    if selectors.is_empty() || selectors.iter().any(|s| s.as_ref() == ALL) {
        return Ok(names.iter().map(|n| data_dir.join(n)).collect());
    }

    let mut selected: Vec<PathBuf> = Vec::with_capacity(selectors.len());
    for selector in selectors {
        let suffix = selector.as_ref();
        let matches: Vec<&String> = names.iter().filter(|n| n.ends_with(suffix)).collect();
        let path = match matches.as_slice() {
            [] => return Err(PostError::DatasetNotFound(suffix.to_string())),
            [only] => data_dir.join(only),
            _ => {
                return Err(PostError::AmbiguousDataset {
                    suffix: suffix.to_string(),
                    matches: matches.iter().map(|m| m.to_string()).collect(),
                })
            }
        };
        if !selected.contains(&path) {
            selected.push(path);
        }
    }
    Ok(selected)
}
