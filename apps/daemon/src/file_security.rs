// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Path containment for `~/.opencli/` file serving.
//!
//! Grounded in the teacher's `file_security.rs` canonicalize-then-check
//! pattern, simplified from a multi-pattern glob allowlist to a single
//! root: the file-serving contract names exactly one root
//! (`~/.opencli/`), so there is nothing to match against but "is this
//! path under it".

use std::path::{Path, PathBuf};

/// Resolves `relative` against `root` and verifies the result, after
/// symlink resolution, stays under `root`.
///
/// # Errors
///
/// Returns an error string (never leaking the resolved path on denial,
/// matching the 403-not-404 posture of the file-serving contract) if:
/// - the path escapes `root` after canonicalization,
/// - `root` itself cannot be canonicalized,
/// - the target does not exist.
pub fn resolve_within_root(root: &Path, relative: &str) -> Result<PathBuf, String> {
    let root = root.canonicalize().map_err(|e| format!("root directory unavailable: {e}"))?;
    let candidate = root.join(relative);

    let canonical = candidate
        .canonicalize()
        .map_err(|_| "requested path does not exist".to_string())?;

    if !canonical.starts_with(&root) {
        return Err("requested path escapes the allowed root".to_string());
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn accepts_a_file_within_the_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("note.txt"), b"hi").unwrap();
        let resolved = resolve_within_root(dir.path(), "note.txt").unwrap();
        assert_eq!(fs::read(resolved).unwrap(), b"hi");
    }

    #[test]
    fn rejects_parent_directory_traversal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("inside.txt"), b"hi").unwrap();
        let outside = dir.path().parent().unwrap();
        let marker = outside.join("opencli-file-security-test-sibling.txt");
        fs::write(&marker, b"secret").unwrap();

        let result = resolve_within_root(dir.path(), "../opencli-file-security-test-sibling.txt");
        let _ = fs::remove_file(&marker);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_within_root(dir.path(), "does-not-exist.txt").is_err());
    }
}
