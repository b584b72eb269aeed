
use anyhow::Context;
use itertools::Itertools;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::data_types::consensus::ConsensusCall;
use crate::data_types::truth_status::TruthStatus;
use crate::data_types::variant_record::VariantRecord;

/// One row per reviewed call
#[derive(Serialize)]
struct VariantRow<'a> {
    chrom: &'a str,
    /// 0-based start
    start: u64,
    /// 0-based exclusive end
    end: u64,
    #[serde(rename = "ref")]
    reference: &'a str,
    /// Comma separated
    alts: String,
    /// e.g. "0/1"
    genotype: String,
    callset: &'a str,
    truth_status: TruthStatus
}

/// One row per site, collapsed across callsets
#[derive(Serialize)]
struct ConsensusRow<'a> {
    chrom: &'a str,
    start: u64,
    end: u64,
    #[serde(rename = "ref")]
    reference: &'a str,
    alts: String,
    /// Comma separated callsets that reported the site
    callsets: String,
    truth_status: TruthStatus
}

/// Writes query results as a TSV (or CSV when the file name ends in `.csv`), or as a TSV on stdout
pub struct VariantTableWriter {
    csv_writer: csv::Writer<Box<dyn Write>>,
    /// Number of rows written so far
    row_count: usize
}

impl VariantTableWriter {
    /// Opens the output
    /// # Arguments
    /// * `opt_filename` - the output file, or None for stdout
    /// # Errors
    /// * if the file cannot be created
    pub fn new(opt_filename: Option<&Path>) -> anyhow::Result<Self> {
        let (handle, delimiter): (Box<dyn Write>, u8) = match opt_filename {
            Some(filename) => {
                let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
                let file = File::create(filename)
                    .with_context(|| format!("Error while creating {filename:?}:"))?;
                (Box::new(file), if is_csv { b',' } else { b'\t' })
            },
            None => (Box::new(std::io::stdout()), b'\t')
        };
        Ok(Self::from_writer(handle, delimiter))
    }

    /// Wraps any writer with the given delimiter
    pub fn from_writer(handle: Box<dyn Write>, delimiter: u8) -> Self {
        let csv_writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(handle);
        Self {
            csv_writer,
            row_count: 0
        }
    }

    /// Writes one call
    /// # Errors
    /// * if the row fails to serialize or write
    pub fn write_variant(&mut self, record: &VariantRecord) -> csv::Result<()> {
        let row = VariantRow {
            chrom: record.chromosome(),
            start: record.start(),
            end: record.end(),
            reference: record.reference_allele(),
            alts: record.alternate_alleles().iter().join(","),
            genotype: record.genotype().to_string(),
            callset: record.callset_name(),
            truth_status: record.truth_status()
        };
        self.csv_writer.serialize(&row)?;
        self.row_count += 1;
        Ok(())
    }

    /// Writes one consensus site
    /// # Errors
    /// * if the row fails to serialize or write
    pub fn write_consensus(&mut self, consensus: &ConsensusCall) -> csv::Result<()> {
        let site = consensus.site();
        let row = ConsensusRow {
            chrom: site.coordinates().chrom(),
            start: site.coordinates().start(),
            end: site.coordinates().end(),
            reference: site.reference_allele(),
            alts: site.alternate_alleles().iter().join(","),
            callsets: consensus.callsets().iter().join(","),
            truth_status: consensus.truth_status()
        };
        self.csv_writer.serialize(&row)?;
        self.row_count += 1;
        Ok(())
    }

    /// Flushes everything out and returns the number of rows written
    /// # Errors
    /// * if the flush fails
    pub fn finish(mut self) -> std::io::Result<usize> {
        self.csv_writer.flush()?;
        Ok(self.row_count)
    }
}
