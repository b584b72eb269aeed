use serde::{Deserialize, Serialize};

use crate::data_types::coordinates::{CoordinateError, MAX_COORDINATE};
use crate::data_types::truth_status::TruthStatus;

/// Placeholder character some callers append to mark the reference allele, e.g. "A*"
pub const REFERENCE_MARKER: char = '*';

#[derive(thiserror::Error, Clone, Debug, Eq, PartialEq)]
pub enum ValidationError {
    #[error("chromosome must not be empty")]
    EmptyChromosome,
    #[error("end ({end}) must be greater than start ({start})")]
    EmptySpan { start: u64, end: u64 },
    #[error("coordinate {value} is larger than the maximum supported value ({MAX_COORDINATE})")]
    CoordinateRange { value: u64 },
    #[error("reference allele must not be empty")]
    EmptyReferenceAllele,
    #[error("at least one alternate allele is required")]
    MissingAlternateAllele,
    #[error("alternate allele #{index} is empty (length = 0)")]
    EmptyAlternateAllele { index: usize },
    #[error("callset name must not be empty")]
    EmptyCallset,
    #[error("genotype allele index {index} is invalid for a site with {allele_count} alleles")]
    GenotypeIndex { index: usize, allele_count: usize },
    #[error("expected at least 2 alleles (reference + alternate), found {found}")]
    AlleleCount { found: usize },
    #[error("truth status {status} is derived by consensus and cannot be assigned to a call")]
    DerivedTruthStatus { status: TruthStatus },
}

impl From<CoordinateError> for ValidationError {
    fn from(value: CoordinateError) -> Self {
        match value {
            CoordinateError::EmptySpan { start, end } => ValidationError::EmptySpan { start, end },
            CoordinateError::OutOfRange { value } => ValidationError::CoordinateRange { value },
        }
    }
}

/// Removes any reference placeholder characters from an allele string
pub fn strip_allele_padding(allele: &str) -> String {
    allele.replace(REFERENCE_MARKER, "")
}

/// Diploid genotype stored as two indices into `[reference, alternates...]`
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct Genotype {
    allele0: usize,
    allele1: usize
}

impl Genotype {
    pub fn new(allele0: usize, allele1: usize) -> Self {
        Self { allele0, allele1 }
    }

    /// Checks both indices against the number of alleles at the site
    pub fn validate(&self, allele_count: usize) -> Result<(), ValidationError> {
        for index in [self.allele0, self.allele1] {
            if index >= allele_count {
                return Err(ValidationError::GenotypeIndex { index, allele_count });
            }
        }
        Ok(())
    }

    pub fn indices(&self) -> [usize; 2] {
        [self.allele0, self.allele1]
    }

    // getters
    pub fn allele0(&self) -> usize {
        self.allele0
    }

    pub fn allele1(&self) -> usize {
        self.allele1
    }
}

impl std::fmt::Display for Genotype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.allele0, self.allele1)
    }
}

/// One reviewed call, in external coordinates (0-based start, exclusive end).
/// This is what callers submit to and receive from the knowledge base.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct VariantRecord {
    /// Chromosome name, matching the caller's naming
    chromosome: String,
    /// First included base, 0-based
    start: u64,
    /// First excluded base, 0-based
    end: u64,
    /// The reference allele with any placeholder characters removed
    reference_allele: String,
    /// Alternate alleles in genotype order; the first one is genotype index 1
    alternate_alleles: Vec<String>,
    /// Called genotype
    genotype: Genotype,
    /// Name of the callset that produced the call
    callset_name: String,
    /// Reviewer classification
    truth_status: TruthStatus
}

impl VariantRecord {
    /// Constructor with checks
    /// # Arguments
    /// * `chromosome` - chromosome name
    /// * `start` - 0-based first included base
    /// * `end` - 0-based first excluded base
    /// * `reference_allele` - REF allele, placeholder characters are stripped
    /// * `alternate_alleles` - ALT alleles in order
    /// * `genotype` - indices into `[reference, alternates...]`
    /// * `callset_name` - source callset
    /// * `truth_status` - review classification
    /// # Errors
    /// * if any of the checks in `validate()` fail
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chromosome: String, start: u64, end: u64,
        reference_allele: &str, alternate_alleles: Vec<String>,
        genotype: Genotype, callset_name: String, truth_status: TruthStatus
    ) -> Result<Self, ValidationError> {
        let record = Self {
            chromosome,
            start,
            end,
            reference_allele: strip_allele_padding(reference_allele),
            alternate_alleles,
            genotype,
            callset_name,
            truth_status
        };
        record.validate()?;
        Ok(record)
    }

    /// Runs all input checks. Records that arrive through deserialization have not been through `new()`, so the knowledge base calls this again.
    /// # Errors
    /// * if the chromosome or callset name is empty
    /// * if `end <= start` or `end` is beyond the supported range
    /// * if the reference is empty, there are no alternates, or any alternate is empty
    /// * if either genotype index does not point at an allele
    /// * if the truth status is one only consensus can produce
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.chromosome.is_empty() {
            return Err(ValidationError::EmptyChromosome);
        }
        if self.end <= self.start {
            return Err(ValidationError::EmptySpan { start: self.start, end: self.end });
        }
        if self.end > MAX_COORDINATE {
            return Err(ValidationError::CoordinateRange { value: self.end });
        }
        if self.reference_allele.is_empty() {
            return Err(ValidationError::EmptyReferenceAllele);
        }
        if self.alternate_alleles.is_empty() {
            return Err(ValidationError::MissingAlternateAllele);
        }
        if let Some(index) = self.alternate_alleles.iter().position(|a| a.is_empty()) {
            return Err(ValidationError::EmptyAlternateAllele { index });
        }
        if self.callset_name.is_empty() {
            return Err(ValidationError::EmptyCallset);
        }
        if !self.truth_status.is_assignable() {
            return Err(ValidationError::DerivedTruthStatus { status: self.truth_status });
        }
        self.genotype.validate(self.allele_count())
    }

    /// Number of alleles at the site, reference included
    pub fn allele_count(&self) -> usize {
        1 + self.alternate_alleles.len()
    }

    /// Looks up an allele by genotype index, 0 is the reference
    pub fn allele(&self, index: usize) -> Option<&str> {
        if index == 0 {
            Some(&self.reference_allele)
        } else {
            self.alternate_alleles.get(index - 1).map(|a| a.as_str())
        }
    }

    /// Returns a copy with a different review classification
    pub fn with_truth_status(&self, truth_status: TruthStatus) -> Self {
        Self {
            truth_status,
            ..self.clone()
        }
    }

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

    pub fn genotype(&self) -> Genotype {
        self.genotype
    }

    pub fn callset_name(&self) -> &str {
        &self.callset_name
    }

    pub fn truth_status(&self) -> TruthStatus {
        self.truth_status
    }
}
