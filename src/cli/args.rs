//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::net::IpAddr;
use std::path::PathBuf;

/// Live preview server for slide-deck markdown
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Markdown file to preview
    #[arg(value_name = "MARKDOWN_FILE", value_hint = clap::ValueHint::FilePath)]
    pub markdown_file: PathBuf,

    /// Directory with additional theme stylesheets (repeatable)
    #[arg(short, long = "theme-dir", value_hint = clap::ValueHint::DirPath)]
    pub theme_dir: Vec<PathBuf>,

    /// Port number to listen on (the live-update socket uses the next port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub interface: Option<IpAddr>,

    /// Theme used when the deck does not pick one
    #[arg(long)]
    pub theme: Option<String>,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,

    /// Config file path (default: .mp-config.json)
    #[arg(short = 'C', long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,
}
