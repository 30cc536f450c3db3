use crate::error::ExportError;
use std::path::{Path, PathBuf};

/// Get all files with a given extension in a directory.
pub fn get_all_files(
    root_dir: &Path,
    file_extensions: &[&str],
) -> std::result::Result<Vec<PathBuf>, ExportError> {
    let mut paths = Vec::new();
    let flex_path = root_dir.join("**");
    for ext in file_extensions {
        let ext_path = flex_path.join(format!("*.{ext}"));
        for file_opt in glob::glob(&ext_path.to_string_lossy())? {
            paths.push(file_opt?)
        }
    }
    paths.sort();
    Ok(paths)
}

/// Derive a file name from a scope identifier. Only the last path segment of
/// the scope is used and characters that are not safe in file names are
/// replaced.
pub fn file_name_for(scope: &str, extension: &str) -> String {
    let last_segment = scope
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let stem: String = last_segment
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if stem.is_empty() || stem.chars().all(|c| c == '.') {
        "annotations".to_string()
    } else {
        stem
    };
    format!("{stem}.{extension}")
}
