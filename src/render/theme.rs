//! Named CSS themes.
//!
//! A theme is a stylesheet with a name. The name comes from a
//! `/* @theme name */` comment, falling back to the file stem.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use rustc_hash::FxHashMap;

use crate::embed::theme::DEFAULT_THEME_CSS;
use crate::{debug, log};

/// Name of the theme that is always available.
pub const BUILTIN_THEME: &str = "default";

#[derive(Debug, Clone)]
pub struct ThemeSet {
    themes: FxHashMap<String, String>,
}

impl ThemeSet {
    /// Theme set holding only the built-in theme.
    pub fn with_builtin() -> Self {
        let mut themes = FxHashMap::default();
        themes.insert(BUILTIN_THEME.to_string(), DEFAULT_THEME_CSS.to_string());
        Self { themes }
    }

    /// Add a stylesheet, returning the name it was registered under.
    ///
    /// A later theme with the same name replaces the earlier one.
    pub fn add(&mut self, css: String, fallback_name: &str) -> String {
        let name = theme_name(&css).unwrap_or(fallback_name).to_string();
        if self.themes.insert(name.clone(), css).is_some() {
            debug!("theme"; "replaced theme `{}`", name);
        }
        name
    }

    /// Scan directories for `*.css` themes.
    ///
    /// Missing directories, non-directories and unreadable files are warned
    /// about and skipped. Returns the number of themes loaded.
    pub fn load_dirs(&mut self, dirs: &[PathBuf]) -> usize {
        dirs.iter().map(|dir| self.load_dir(dir)).sum()
    }

    fn load_dir(&mut self, dir: &Path) -> usize {
        let Ok(meta) = fs::metadata(dir) else {
            log!("theme"; "theme directory {} does not exist", dir.display());
            return 0;
        };
        if !meta.is_dir() {
            log!("theme"; "path {} is not a directory", dir.display());
            return 0;
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log!("theme"; "cannot read {}: {}", dir.display(), e);
                return 0;
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_css(path) && path.is_file())
            .collect();
        files.sort();

        debug!("theme"; "loading themes from {}", dir.display());

        let mut loaded = 0;
        for path in files {
            let css = match fs::read_to_string(&path) {
                Ok(css) => css,
                Err(e) => {
                    log!("theme"; "skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let name = self.add(css, &stem);
            debug!("theme"; "loaded `{}` from {}", name, path.display());
            loaded += 1;
        }
        loaded
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.themes.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.themes.contains_key(name)
    }

    /// Theme names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.themes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn is_css(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("css"))
}

/// Extract the `@theme` name from a stylesheet's comments.
fn theme_name(css: &str) -> Option<&str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"/\*[\s*!]*@theme\s+([\w-]+)").unwrap());
    re.captures(css)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_present() {
        let themes = ThemeSet::with_builtin();
        assert!(themes.contains(BUILTIN_THEME));
        assert_eq!(themes.names(), vec![BUILTIN_THEME]);
    }

    #[test]
    fn test_theme_name_from_comment() {
        assert_eq!(theme_name("/* @theme gaia */\nsection {}"), Some("gaia"));
        assert_eq!(theme_name("/*!\n * @theme my-theme\n */"), Some("my-theme"));
        assert_eq!(theme_name("section { color: red; }"), None);
    }

    #[test]
    fn test_add_falls_back_to_stem() {
        let mut themes = ThemeSet::with_builtin();
        let name = themes.add("section { color: red; }".into(), "plain");
        assert_eq!(name, "plain");
        assert_eq!(themes.get("plain"), Some("section { color: red; }"));
    }

    #[test]
    fn test_load_dirs_skips_bad_entries() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.css"), "/* @theme alpha */ section {}").unwrap();
        fs::write(dir.path().join("b.CSS"), "section {}").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a theme").unwrap();
        let file = dir.path().join("a.css");

        let mut themes = ThemeSet::with_builtin();
        let loaded = themes.load_dirs(&[
            dir.path().join("missing"),
            file,
            dir.path().to_path_buf(),
        ]);

        assert_eq!(loaded, 2);
        assert_eq!(themes.names(), vec!["alpha", "b", "default"]);
    }
}
