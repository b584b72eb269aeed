use rustc_hash::FxHasher;
use std::hash::Hasher;

use crate::data_types::coordinates::{to_external, to_internal, InternalSpan};
use crate::data_types::truth_status::TruthStatus;
use crate::data_types::variant_record::{strip_allele_padding, Genotype, ValidationError, VariantRecord};

/// The identity of a call for upsert and removal.
/// Two records describe the same call if they agree on all of these, regardless of genotype or truth status.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CallKey {
    chromosome: String,
    /// 1-based first included base
    start: u64,
    /// 1-based last included base
    end: u64,
    reference_allele: String,
    alternate_alleles: Vec<String>,
    callset_name: String
}

impl CallKey {
    /// Stable identifier for the document holding this call, 16 hex digits.
    /// Fields are hashed explicitly with separators so the id does not depend on `Hash` derive details.
    pub fn document_id(&self) -> String {
        let mut hasher = FxHasher::default();
        hasher.write(self.chromosome.as_bytes());
        hasher.write_u8(0);
        hasher.write_u64(self.start);
        hasher.write_u64(self.end);
        hasher.write(self.reference_allele.as_bytes());
        hasher.write_u8(0);
        for alt in self.alternate_alleles.iter() {
            hasher.write(alt.as_bytes());
            hasher.write_u8(1);
        }
        hasher.write_u8(0);
        hasher.write(self.callset_name.as_bytes());
        format!("{:016x}", hasher.finish())
    }

    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn callset_name(&self) -> &str {
        &self.callset_name
    }
}

impl std::fmt::Display for CallKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f, "{}:{}-{} {}>{} ({})",
            self.chromosome, self.start, self.end,
            self.reference_allele, self.alternate_alleles.join(","),
            self.callset_name
        )
    }
}

/// A call as the store keeps it, with a 1-based closed span.
/// Stored calls are immutable; an update replaces the whole value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredCall {
    chromosome: String,
    span: InternalSpan,
    reference_allele: String,
    alternate_alleles: Vec<String>,
    genotype: Genotype,
    callset_name: String,
    truth_status: TruthStatus
}

impl StoredCall {
    /// Converts an external record into the stored form.
    /// # Errors
    /// * if the record fails validation
    pub fn from_record(record: &VariantRecord) -> Result<Self, ValidationError> {
        record.validate()?;
        let span = to_internal(record.start(), record.end())?;
        Ok(Self {
            chromosome: record.chromosome().to_string(),
            span,
            reference_allele: strip_allele_padding(record.reference_allele()),
            alternate_alleles: record.alternate_alleles().to_vec(),
            genotype: record.genotype(),
            callset_name: record.callset_name().to_string(),
            truth_status: record.truth_status()
        })
    }

    /// Rebuilds a stored call from already-persisted parts, used by backends when reading documents.
    pub fn from_parts(
        chromosome: String, span: InternalSpan,
        reference_allele: String, alternate_alleles: Vec<String>,
        genotype: Genotype, callset_name: String, truth_status: TruthStatus
    ) -> Self {
        Self {
            chromosome,
            span,
            reference_allele,
            alternate_alleles,
            genotype,
            callset_name,
            truth_status
        }
    }

    /// Converts back into external coordinates, splitting the alleles into reference and alternates.
    /// # Errors
    /// * if the stored content does not form a valid record, e.g. a hand-edited document
    pub fn to_record(&self) -> Result<VariantRecord, ValidationError> {
        let (start, end) = to_external(&self.span);
        VariantRecord::new(
            self.chromosome.clone(), start, end,
            &self.reference_allele, self.alternate_alleles.clone(),
            self.genotype, self.callset_name.clone(), self.truth_status
        )
    }

    pub fn call_key(&self) -> CallKey {
        CallKey {
            chromosome: self.chromosome.clone(),
            start: self.span.start().get() as u64,
            end: self.span.end().get() as u64,
            reference_allele: self.reference_allele.clone(),
            alternate_alleles: self.alternate_alleles.clone(),
            callset_name: self.callset_name.clone()
        }
    }

    // getters
    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn span(&self) -> &InternalSpan {
        &self.span
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

#[cfg(test)]
mod tests {
    use super::*;

    fn record(genotype: Genotype, truth_status: TruthStatus) -> VariantRecord {
        VariantRecord::new(
            "chr10".to_string(), 1_000_000, 1_000_001,
            "A", vec!["G".to_string()],
            genotype, "test_callset".to_string(), truth_status
        ).unwrap()
    }

    #[test]
    fn test_internal_coordinates() {
        let stored = StoredCall::from_record(&record(Genotype::new(0, 1), TruthStatus::Suspect)).unwrap();
        assert_eq!(stored.span().start().get(), 1_000_001);
        assert_eq!(stored.span().end().get(), 1_000_001);
        assert_eq!(stored.to_record().unwrap(), record(Genotype::new(0, 1), TruthStatus::Suspect));
    }

    #[test]
    fn test_key_ignores_review_fields() {
        let a = StoredCall::from_record(&record(Genotype::new(0, 1), TruthStatus::Suspect)).unwrap();
        let b = StoredCall::from_record(&record(Genotype::new(1, 1), TruthStatus::FalsePositive)).unwrap();
        assert_eq!(a.call_key(), b.call_key());
        assert_eq!(a.call_key().document_id(), b.call_key().document_id());
        assert_eq!(a.call_key().document_id().len(), 16);
        assert_eq!(a.call_key().to_string(), "chr10:1000001-1000001 A>G (test_callset)");
    }

    #[test]
    fn test_key_differs_by_callset_and_alleles() {
        let base = StoredCall::from_record(&record(Genotype::new(0, 1), TruthStatus::Suspect)).unwrap();
        let other_callset = VariantRecord::new(
            "chr10".to_string(), 1_000_000, 1_000_001,
            "A", vec!["G".to_string()],
            Genotype::new(0, 1), "other_callset".to_string(), TruthStatus::Suspect
        ).unwrap();
        let other_alt = VariantRecord::new(
            "chr10".to_string(), 1_000_000, 1_000_001,
            "A", vec!["T".to_string()],
            Genotype::new(0, 1), "test_callset".to_string(), TruthStatus::Suspect
        ).unwrap();
        for other in [other_callset, other_alt] {
            let other = StoredCall::from_record(&other).unwrap();
            assert_ne!(base.call_key(), other.call_key());
            assert_ne!(base.call_key().document_id(), other.call_key().document_id());
        }
    }

    #[test]
    fn test_allele_boundaries_in_document_id() {
        // "AC" + "G" and "A" + "CG" must not collapse into the same id
        let left = VariantRecord::new(
            "chr1".to_string(), 10, 12, "AC", vec!["G".to_string()],
            Genotype::new(0, 1), "cs".to_string(), TruthStatus::Unknown
        ).unwrap();
        let right = VariantRecord::new(
            "chr1".to_string(), 10, 12, "A", vec!["CG".to_string()],
            Genotype::new(0, 1), "cs".to_string(), TruthStatus::Unknown
        ).unwrap();
        let left = StoredCall::from_record(&left).unwrap().call_key().document_id();
        let right = StoredCall::from_record(&right).unwrap().call_key().document_id();
        assert_ne!(left, right);
    }
}
