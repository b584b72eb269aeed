
use anyhow::{bail, ensure, Context};
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::data_types::external_variant::VariantInput;
use crate::data_types::truth_status::TruthStatus;
use crate::data_types::variant_record::VariantRecord;
use crate::review_source::VariantReviewSource;

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct CallSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    kbreview_version: String,

    /// Knowledge base connection config (JSON)
    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "config")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Knowledge base"))]
    pub config_fn: PathBuf,

    /// Chromosome of the call
    #[clap(required = true)]
    #[clap(long = "chrom")]
    #[clap(value_name = "CHROM")]
    #[clap(help_heading = Some("Call"))]
    pub chrom: String,

    /// 0-based start of the call
    #[clap(required = true)]
    #[clap(long = "start")]
    #[clap(value_name = "POS")]
    #[clap(help_heading = Some("Call"))]
    pub start: u64,

    /// 0-based exclusive end of the call
    #[clap(required = true)]
    #[clap(long = "end")]
    #[clap(value_name = "POS")]
    #[clap(help_heading = Some("Call"))]
    pub end: u64,

    /// Comma separated alleles, reference first
    #[clap(required = true)]
    #[clap(long = "alleles")]
    #[clap(value_name = "REF,ALT")]
    #[clap(value_delimiter = ',')]
    #[clap(help_heading = Some("Call"))]
    pub alleles: Vec<String>,

    /// Comma separated genotype allele indices
    #[clap(long = "genotype")]
    #[clap(value_name = "GT")]
    #[clap(value_delimiter = ',')]
    #[clap(default_value = "0,1")]
    #[clap(help_heading = Some("Call"))]
    pub genotype: Vec<usize>,

    /// Name of the callset that produced the call
    #[clap(required = true)]
    #[clap(long = "callset")]
    #[clap(value_name = "NAME")]
    #[clap(help_heading = Some("Call"))]
    pub callset: String,

    /// Reviewer classification
    #[clap(long = "truth")]
    #[clap(value_name = "STATUS")]
    #[clap(default_value = "UNKNOWN")]
    #[clap(help_heading = Some("Call"))]
    pub truth_status: TruthStatus,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

impl CallSettings {
    /// Builds the record described by these settings
    /// # Errors
    /// * if the genotype does not have two indices
    /// * if the alleles, genotype, or coordinates do not form a valid call
    pub fn to_record(&self) -> anyhow::Result<VariantRecord> {
        let &[allele0, allele1] = self.genotype.as_slice() else {
            bail!("--genotype must have exactly two indices, found {}", self.genotype.len());
        };
        let variant = VariantInput::new(self.chrom.clone(), self.start, self.end, self.alleles.clone());
        let record = VariantReviewSource::create_record(
            allele0, allele1, &self.callset, &variant, self.truth_status
        ).with_context(|| format!("Error while building call {}:{}-{}:", self.chrom, self.start, self.end))?;
        Ok(record)
    }
}

pub fn check_call_settings(mut settings: CallSettings, sub_command: &str) -> anyhow::Result<CallSettings> {
    // hard code the version in
    settings.kbreview_version = FULL_VERSION.clone();
    info!("kbreview version: {:?}", &settings.kbreview_version);
    info!("Sub-command: {sub_command}");

    info!("Inputs:");
    check_required_filename(&settings.config_fn, "Knowledge base config")?;
    info!("\tConfig: {:?}", &settings.config_fn);

    info!("Call:");
    ensure!(!settings.chrom.is_empty(), "--chrom must not be empty");
    ensure!(settings.end > settings.start, "--end must be greater than --start");
    info!("\tRegion: {}:{}-{}", settings.chrom, settings.start, settings.end);
    ensure!(settings.alleles.len() >= 2, "--alleles requires a reference and at least one alternate");
    info!("\tAlleles: {:?}", settings.alleles);
    ensure!(settings.genotype.len() == 2, "--genotype must have exactly two indices, e.g. \"0,1\"");
    info!("\tGenotype: {}/{}", settings.genotype[0], settings.genotype[1]);
    ensure!(!settings.callset.is_empty(), "--callset must not be empty");
    info!("\tCallset: {:?}", settings.callset);
    ensure!(settings.truth_status.is_assignable(), "--truth {} is only produced by consensus queries", settings.truth_status);
    info!("\tTruth status: {}", settings.truth_status);

    Ok(settings)
}
