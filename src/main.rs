//! deckview - live preview server for slide-deck markdown.

#![allow(dead_code)]

mod actor;
mod cli;
mod client;
mod config;
mod core;
mod embed;
mod logger;
mod reload;
mod render;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::PreviewConfig;
use render::DeckRenderer;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = PreviewConfig::load(&cli)?;
    logger::set_verbose(config.verbose);

    let renderer = DeckRenderer::new(&config.theme_dir, &config.theme)
        .context("failed to initialize renderer")?;

    cli::serve::serve(&config, Arc::new(renderer))
}
