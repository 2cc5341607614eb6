//! Preview configuration.
//!
//! Values come from three layers, later ones winning:
//!
//! 1. built-in defaults
//! 2. the config file (`.mp-config.json` in the working directory, or `-C`)
//! 3. command-line flags
//!
//! The config file is JSON unless its extension is `.toml`. Unknown keys are
//! reported as warnings and otherwise ignored.

mod error;

pub use error::ConfigError;

use crate::{cli::Cli, log};
use anyhow::Result;
use serde::{Deserialize, Deserializer};
use std::{
    fs,
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
};

/// Config file looked up in the working directory when `-C` is not given.
pub const DEFAULT_CONFIG_FILE: &str = ".mp-config.json";

/// Default HTTP port. The live-update socket binds the port after it.
pub const DEFAULT_PORT: u16 = 8080;

/// Built-in theme name.
pub const DEFAULT_THEME: &str = "default";

/// Resolved preview configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Directories scanned for theme stylesheets
    #[serde(alias = "themeDir", deserialize_with = "one_or_many")]
    pub theme_dir: Vec<PathBuf>,

    /// HTTP port
    pub port: u16,

    /// Interface to bind
    pub interface: IpAddr,

    /// Theme used when the deck does not pick one
    pub theme: String,

    /// Print debug output
    pub verbose: bool,

    /// Markdown file being previewed (CLI only)
    #[serde(skip)]
    pub markdown_file: PathBuf,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            theme_dir: Vec::new(),
            port: DEFAULT_PORT,
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            theme: DEFAULT_THEME.to_string(),
            verbose: false,
            markdown_file: PathBuf::new(),
        }
    }
}

impl PreviewConfig {
    /// Load configuration from CLI arguments.
    ///
    /// A missing default config file is fine; a missing `-C` file is not.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) if !path.exists() => {
                return Err(ConfigError::MissingConfig(path.clone()).into());
            }
            Some(path) => Self::from_path(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Self::from_path(path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_cli(cli);
        config.expand_theme_dirs();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let (config, ignored) = if is_toml {
            Self::parse_toml(&content).map_err(|err| ConfigError::Toml(path.to_path_buf(), err))?
        } else {
            Self::parse_json(&content).map_err(|err| ConfigError::Json(path.to_path_buf(), err))?
        };

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse JSON content, collecting any unknown fields.
    fn parse_json(content: &str) -> Result<(Self, Vec<String>), serde_json::Error> {
        let mut ignored = Vec::new();
        let mut deserializer = serde_json::Deserializer::from_str(content);
        let config = serde_ignored::deserialize(&mut deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        deserializer.end()?;
        Ok((config, ignored))
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_toml(content: &str) -> Result<(Self, Vec<String>), toml::de::Error> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// CLI flags override file values.
    fn apply_cli(&mut self, cli: &Cli) {
        self.markdown_file = cli.markdown_file.clone();

        if !cli.theme_dir.is_empty() {
            self.theme_dir = cli.theme_dir.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(interface) = cli.interface {
            self.interface = interface;
        }
        if let Some(theme) = &cli.theme {
            self.theme = theme.clone();
        }
        self.verbose |= cli.verbose;
    }

    /// Expand `~` in theme directories.
    fn expand_theme_dirs(&mut self) {
        for dir in &mut self.theme_dir {
            let raw = dir.to_string_lossy();
            if let std::borrow::Cow::Owned(expanded) = shellexpand::tilde(&raw) {
                *dir = PathBuf::from(expanded);
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.markdown_file.exists() {
            return Err(ConfigError::MissingInput(self.markdown_file.clone()));
        }
        if !self.markdown_file.is_file() {
            return Err(ConfigError::NotAFile(self.markdown_file.clone()));
        }
        Ok(())
    }

    /// Directory static assets are served from.
    pub fn asset_root(&self) -> PathBuf {
        match self.markdown_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Accept either a single path or a list of paths.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(PathBuf),
        Many(Vec<PathBuf>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(path) => vec![path],
        OneOrMany::Many(paths) => paths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("deckview").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = PreviewConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.theme, "default");
        assert_eq!(config.interface, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(config.theme_dir.is_empty());
    }

    #[test]
    fn test_parse_json_with_alias_and_single_dir() {
        let (config, ignored) =
            PreviewConfig::parse_json(r#"{"themeDir": "themes", "port": 3000}"#).unwrap();
        assert_eq!(config.theme_dir, vec![PathBuf::from("themes")]);
        assert_eq!(config.port, 3000);
        assert!(ignored.is_empty());
    }

    #[test]
    fn test_parse_json_reports_unknown_fields() {
        let (config, ignored) =
            PreviewConfig::parse_json(r#"{"theme_dir": ["a", "b"], "colour": "red"}"#).unwrap();
        assert_eq!(config.theme_dir.len(), 2);
        assert_eq!(ignored, vec!["colour".to_string()]);
    }

    #[test]
    fn test_parse_json_rejects_trailing_garbage() {
        assert!(PreviewConfig::parse_json(r#"{"port": 1} extra"#).is_err());
    }

    #[test]
    fn test_parse_toml() {
        let (config, ignored) =
            PreviewConfig::parse_toml("theme = \"gaia\"\nverbose = true\n").unwrap();
        assert_eq!(config.theme, "gaia");
        assert!(config.verbose);
        assert!(ignored.is_empty());
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = TempDir::new().unwrap();
        let md = dir.path().join("deck.md");
        fs::write(&md, "# hi").unwrap();
        let cfg_path = dir.path().join("preview.json");
        fs::write(&cfg_path, r#"{"port": 3000, "theme": "gaia"}"#).unwrap();

        let args = cli(&[
            md.to_str().unwrap(),
            "-C",
            cfg_path.to_str().unwrap(),
            "-p",
            "9999",
        ]);
        let config = PreviewConfig::load(&args).unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.theme, "gaia");
        assert_eq!(config.asset_root(), dir.path());
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let dir = TempDir::new().unwrap();
        let md = dir.path().join("deck.md");
        fs::write(&md, "").unwrap();
        let missing = dir.path().join("nope.json");

        let args = cli(&[md.to_str().unwrap(), "-C", missing.to_str().unwrap()]);
        assert!(PreviewConfig::load(&args).is_err());
    }

    #[test]
    fn test_missing_markdown_is_error() {
        let dir = TempDir::new().unwrap();
        let md = dir.path().join("absent.md");
        let cfg_path = dir.path().join("empty.json");
        fs::write(&cfg_path, "{}").unwrap();

        let args = cli(&[md.to_str().unwrap(), "-C", cfg_path.to_str().unwrap()]);
        let err = PreviewConfig::load(&args).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_asset_root_for_bare_file_name() {
        let config = PreviewConfig {
            markdown_file: PathBuf::from("deck.md"),
            ..PreviewConfig::default()
        };
        assert_eq!(config.asset_root(), PathBuf::from("."));
    }
}
