
use anyhow::ensure;
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, AFTER_HELP, FULL_VERSION};

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct QuerySettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    kbreview_version: String,

    /// Knowledge base connection config (JSON)
    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "config")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub config_fn: PathBuf,

    /// Output table (TSV, or CSV if the name ends in .csv) [default: stdout]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_fn: Option<PathBuf>,

    /// Chromosome to query
    #[clap(required = true)]
    #[clap(long = "chrom")]
    #[clap(value_name = "CHROM")]
    #[clap(help_heading = Some("Region"))]
    pub chrom: String,

    /// 0-based start of the region
    #[clap(required = true)]
    #[clap(long = "start")]
    #[clap(value_name = "POS")]
    #[clap(help_heading = Some("Region"))]
    pub start: u64,

    /// 0-based exclusive end of the region
    #[clap(required = true)]
    #[clap(long = "end")]
    #[clap(value_name = "POS")]
    #[clap(help_heading = Some("Region"))]
    pub end: u64,

    /// Collapses calls from all callsets into one row per site
    #[clap(long = "consensus")]
    #[clap(help_heading = Some("Region"))]
    pub consensus: bool,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_query_settings(mut settings: QuerySettings) -> anyhow::Result<QuerySettings> {
    // hard code the version in
    settings.kbreview_version = FULL_VERSION.clone();
    info!("kbreview version: {:?}", &settings.kbreview_version);
    info!("Sub-command: query");

    info!("Inputs:");
    check_required_filename(&settings.config_fn, "Knowledge base config")?;
    info!("\tConfig: {:?}", &settings.config_fn);

    info!("Region:");
    ensure!(!settings.chrom.is_empty(), "--chrom must not be empty");
    ensure!(settings.end > settings.start, "--end must be greater than --start");
    info!("\t{}:{}-{}", settings.chrom, settings.start, settings.end);
    info!("\tConsensus: {}", if settings.consensus { "ENABLED" } else { "DISABLED" });

    info!("Outputs:");
    match settings.output_fn.as_ref() {
        Some(output_fn) => info!("\tTable: {output_fn:?}"),
        None => info!("\tTable: stdout")
    };

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_query_settings() {
        let folder = tempfile::tempdir().unwrap();
        let config_fn = folder.path().join("kb.json");
        std::fs::write(&config_fn, "{}").unwrap();

        let good = QuerySettings {
            config_fn,
            chrom: "chr1".to_string(),
            start: 10,
            end: 20,
            ..Default::default()
        };
        let checked = check_query_settings(good.clone()).unwrap();
        assert_eq!(checked.kbreview_version, *FULL_VERSION);

        let mut empty = good;
        empty.end = 10;
        assert!(check_query_settings(empty).is_err());
    }
}
