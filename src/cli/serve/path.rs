//! URL to asset path resolution.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Resolve a request path to a file under `root`.
///
/// Rejects anything that escapes `root`, including through symlinks or
/// encoded `..` segments. Directories never resolve.
pub fn resolve_asset(url_path: &str, root: &Path) -> Option<PathBuf> {
    let relative = decode(url_path)?;
    if relative.is_empty() || relative.split('/').any(|seg| seg == "..") {
        return None;
    }

    let canonical = root.join(relative.as_ref()).canonicalize().ok()?;
    let root_canonical = root.canonicalize().ok()?;

    (canonical.starts_with(&root_canonical) && canonical.is_file()).then_some(canonical)
}

/// Percent-decode and trim slashes. Invalid UTF-8 yields `None`.
fn decode(url_path: &str) -> Option<Cow<'_, str>> {
    let decoded = percent_decode_str(url_path).decode_utf8().ok()?;
    Some(match decoded {
        Cow::Borrowed(s) => Cow::Borrowed(s.trim_matches('/')),
        Cow::Owned(s) => Cow::Owned(s.trim_matches('/').to_string()),
    })
}
