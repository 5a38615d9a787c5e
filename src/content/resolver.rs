//! Logical path to filesystem path resolution.
//!
//! # Responsibilities
//! - Map a client-supplied path to a regular file under a trusted root
//! - Refuse every escape from the root (traversal, absolute paths, symlinks)
//! - Resolve extensionless pages and directory indexes
//!
//! # Design Decisions
//! - The logical path is attacker-controlled; the root is trusted
//! - Canonicalize-then-prefix-check catches symlink and encoded escapes
//! - Escape attempts are indistinguishable from "not found" so the
//!   resolver never acts as an oracle for filesystem structure

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Resolve a logical request path to a regular file under `root`.
///
/// Candidates are tried in order: the exact path, the path with an
/// `.html` suffix, and `index.html` inside a matching directory.
/// Returns `None` when nothing resolves or the result escapes `root`.
pub fn resolve(logical: &str, root: &Path) -> Option<PathBuf> {
    let clean = normalize(logical);

    // Reject traversal sequences before touching the filesystem.
    if clean.contains("..") {
        return None;
    }

    let root = root.canonicalize().ok()?;
    let joined = root.join(&clean);

    if let Some(file) = contained_file(&joined, &root) {
        return Some(file);
    }

    // Extensionless app pages: /foo served from foo.html.
    if !clean.is_empty() && Path::new(&clean).extension().is_none() {
        let mut with_html = joined.clone().into_os_string();
        with_html.push(".html");
        if let Some(file) = contained_file(Path::new(&with_html), &root) {
            return Some(file);
        }
    }

    // Directory index.
    let index = joined.join("index.html");
    contained_file(&index, &root)
}

/// Canonicalize `candidate` and accept it only as a regular file still
/// prefixed by `root`.
fn contained_file(candidate: &Path, root: &Path) -> Option<PathBuf> {
    let canonical = candidate.canonicalize().ok()?;
    if !canonical.starts_with(root) {
        return None;
    }
    canonical.is_file().then_some(canonical)
}

/// Normalize a logical path: percent-decode, strip the query string,
/// trim surrounding slashes.
fn normalize(logical: &str) -> String {
    let decoded = percent_decode_str(logical)
        .decode_utf8()
        .map(Cow::into_owned)
        .unwrap_or_default();

    let path = decoded.split('?').next().unwrap_or(&decoded);
    path.trim_matches('/').to_string()
}
