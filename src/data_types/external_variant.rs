use serde::{Deserialize, Serialize};

use crate::data_types::variant_record::{strip_allele_padding, VariantRecord};

/// Zygosity of a diploid call
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize)]
pub enum Zygosity {
    HomozygousReference=0,
    Heterozygous,
    HomozygousAlternate
}

impl Zygosity {
    /// Derives zygosity from a pair of allele indices, 0 being the reference
    pub fn from_indices(allele0: usize, allele1: usize) -> Self {
        if allele0 != allele1 {
            Zygosity::Heterozygous
        } else if allele0 == 0 {
            Zygosity::HomozygousReference
        } else {
            Zygosity::HomozygousAlternate
        }
    }
}

/// A genotype with the allele sequences filled back in
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CalledGenotype {
    /// Indices into `[reference, alternates...]`
    allele_indices: [usize; 2],
    /// The sequences those indices point at
    alleles: [String; 2],
    zygosity: Zygosity
}

impl CalledGenotype {
    pub fn allele_indices(&self) -> [usize; 2] {
        self.allele_indices
    }

    pub fn alleles(&self) -> &[String; 2] {
        &self.alleles
    }

    pub fn zygosity(&self) -> Zygosity {
        self.zygosity
    }
}

/// The variant shape handed back to callers of the review source
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ExternalVariant {
    chromosome: String,
    /// 0-based first included base
    start: u64,
    /// 0-based first excluded base
    end: u64,
    reference_allele: String,
    alternate_alleles: Vec<String>,
    genotype: CalledGenotype,
    /// The callset that submitted the call
    source: String
}

impl From<VariantRecord> for ExternalVariant {
    fn from(record: VariantRecord) -> Self {
        let [allele0, allele1] = record.genotype().indices();
        // indices were checked against the allele count when the record was built
        let lookup = |index: usize| record.allele(index).unwrap_or_default().to_string();
        let genotype = CalledGenotype {
            allele_indices: [allele0, allele1],
            alleles: [lookup(allele0), lookup(allele1)],
            zygosity: Zygosity::from_indices(allele0, allele1)
        };

        Self {
            chromosome: record.chromosome().to_string(),
            start: record.start(),
            end: record.end(),
            reference_allele: strip_allele_padding(record.reference_allele()),
            alternate_alleles: record.alternate_alleles().to_vec(),
            genotype,
            source: record.callset_name().to_string()
        }
    }
}

impl ExternalVariant {
    // getters
    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn reference_allele(&self) -> &str {
        &self.reference_allele
    }

    pub fn alternate_alleles(&self) -> &[String] {
        &self.alternate_alleles
    }

    pub fn genotype(&self) -> &CalledGenotype {
        &self.genotype
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// The external variant shape callers use when submitting a call.
/// `alleles[0]` is the reference (placeholder characters allowed), the rest are alternates.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct VariantInput {
    pub chromosome: String,
    /// 0-based first included base
    pub start: u64,
    /// 0-based first excluded base
    pub end: u64,
    pub alleles: Vec<String>
}

impl VariantInput {
    pub fn new(chromosome: String, start: u64, end: u64, alleles: Vec<String>) -> Self {
        Self { chromosome, start, end, alleles }
    }
}
