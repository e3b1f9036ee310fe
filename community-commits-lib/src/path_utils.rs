//! Mapping of remote names onto the local filesystem.

use std::path::{Path, PathBuf};

/// Make a remote name (owner, repository, branch) safe to use as one path component.
///
/// Branch names routinely contain `/`, and nothing stops a remote from handing
/// back `..`, so both are neutralized along with characters Windows rejects.
#[must_use]
pub fn sanitize_path_component(s: &str) -> String {
    let s = s.replace("..", "__");
    let s = s.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
    if s.is_empty() { "_".to_string() } else { s }
}

/// Join sanitized components beneath `root`.
#[must_use]
pub fn nested_path<'a>(root: &Path, components: impl IntoIterator<Item = &'a str>) -> PathBuf {
    let mut path = root.to_path_buf();
    for c in components {
        path.push(sanitize_path_component(c));
    }
    path
}
