
use anyhow::bail;
use clap::{Parser, Subcommand};
use chrono::Datelike;
use lazy_static::lazy_static;
use std::path::Path;

use crate::cli::call::CallSettings;
use crate::cli::query::QuerySettings;

lazy_static! {
    /// Stores the full version string we plan to use, which is generated in build.rs
    /// # Examples
    /// * `0.3.1-6bb9635-dirty` - while on a dirty branch
    /// * `0.3.1-6bb9635` - with a fresh commit
    pub static ref FULL_VERSION: String = format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("VERGEN_GIT_DESCRIBE"));

    /// Shared after help string containing the legalese.
    pub static ref AFTER_HELP: String = format!("Copyright (C) 2004-{}     Pacific Biosciences of California, Inc.
This program comes with ABSOLUTELY NO WARRANTY; it is intended for
Research Use Only and not for use in diagnostic procedures.", chrono::Utc::now().year());
}

#[derive(Parser)]
#[clap(author,
    version = &**FULL_VERSION,
    about,
    after_help = &**AFTER_HELP)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands
}

/// kbreview, a knowledge base of reviewer classified variant calls.
/// Select a subcommand to see more usage information:
#[derive(Subcommand)]
pub enum Commands {
    /// Adds (or replaces) a reviewed call
    Add(Box<CallSettings>),
    /// Removes a reviewed call; genotype and truth status are ignored for matching
    Remove(Box<CallSettings>),
    /// Writes every call overlapping a region
    Query(Box<QuerySettings>)
}

pub fn get_cli() -> Cli {
    Cli::parse()
}

/// Checks if a file exists and will otherwise exit
/// # Arguments
/// * `filename` - the file path to check for
/// * `label` - the label to use for error messages
pub fn check_required_filename(filename: &Path, label: &str) -> anyhow::Result<()> {
    if !filename.exists() {
        bail!("{} does not exist: \"{}\"", label, filename.display());
    }

    // file exists
    Ok(())
}
