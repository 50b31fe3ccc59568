//! Path handling
//!
//! Tree paths are absolute and `/`-separated. Script paths are rewritten into
//! the writable namespace before they reach a tree.

use crate::error::TreeError;

/// Split a tree path into components, dropping empty and `.` segments.
/// `..` is rejected: tree paths must already be resolved.
pub fn components(path: &str) -> Result<Vec<&str>, TreeError> {
    if !path.starts_with('/') {
        return Err(TreeError::InvalidPath(format!(
            "{}: paths must start with a leading slash",
            path
        )));
    }
    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(TreeError::InvalidPath(path.to_string())),
            other => parts.push(other),
        }
    }
    Ok(parts)
}

/// Join components back into an absolute path
pub fn join(parts: &[&str]) -> String {
    if parts.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for part in parts {
        out.push('/');
        out.push_str(part);
    }
    out
}

/// Rewrite a script-supplied path under `root`.
///
/// Relative and absolute paths are both placed under the root
/// (`a/b` and `/a/b` map to `<root>/a/b`). `..` resolves inside the
/// namespace but never above it. Returns `None` if the path escapes.
pub fn namespaced(root: &str, path: &str) -> Option<String> {
    let mut parts: Vec<&str> = root.split('/').filter(|p| !p.is_empty()).collect();
    let floor = parts.len();

    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                if parts.len() == floor {
                    return None;
                }
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    Some(join(&parts))
}

/// Split a tree path into (parent, last component)
pub fn split_parent(path: &str) -> Result<(String, String), TreeError> {
    let parts = components(path)?;
    match parts.split_last() {
        Some((name, parent)) => Ok((join(parent), name.to_string())),
        None => Err(TreeError::InvalidPath(path.to_string())),
    }
}

/// Last component of a path, used as a file's display name
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').find(|p| !p.is_empty()).unwrap_or("")
}
