/*!
# Review source
Adapter that serves reviewed calls as `ExternalVariant`s, and builds records for `add_call(...)` from the external variant shape.
*/
use anyhow::Context;
use log::info;
use std::path::Path;
use std::sync::Arc;

use crate::config::KnowledgeBaseConfig;
use crate::data_types::external_variant::{ExternalVariant, VariantInput};
use crate::data_types::truth_status::TruthStatus;
use crate::data_types::variant_record::{Genotype, ValidationError, VariantRecord};
use crate::knowledge_base::{KnowledgeBaseError, ReviewKnowledgeBase};

#[derive(Clone, Debug)]
pub struct VariantReviewSource {
    /// Shared so several sources can serve from one open store
    knowledge_base: Arc<ReviewKnowledgeBase>
}

impl VariantReviewSource {
    /// Loads a connection config and opens the knowledge base it describes
    /// # Arguments
    /// * `config_fn` - path to the JSON config
    /// # Errors
    /// * if the config cannot be loaded
    /// * if the store cannot be opened
    pub fn new(config_fn: &Path) -> anyhow::Result<Self> {
        let config = KnowledgeBaseConfig::from_file(config_fn)?;
        let knowledge_base = ReviewKnowledgeBase::open(&config)
            .with_context(|| format!("Error while opening knowledge base from {config_fn:?}:"))?;
        info!("Opened knowledge base namespace {:?}", config.namespace());
        Ok(Self::from_knowledge_base(Arc::new(knowledge_base)))
    }

    pub fn from_knowledge_base(knowledge_base: Arc<ReviewKnowledgeBase>) -> Self {
        Self { knowledge_base }
    }

    /// Reviewed calls overlapping `[start, end)` on `chromosome`, with the callset as the source
    /// # Errors
    /// * see `ReviewKnowledgeBase::get_variants_in_interval(...)`
    pub fn get_features(&self, chromosome: &str, start: u64, end: u64) -> Result<impl Iterator<Item = ExternalVariant>, KnowledgeBaseError> {
        let records = self.knowledge_base.get_variants_in_interval(chromosome, start, end)?;
        Ok(records.map(ExternalVariant::from))
    }

    /// Builds a record for `add_call(...)` or `remove_call(...)` from the external variant shape.
    /// The first allele of `variant` is the reference, placeholder characters are stripped.
    /// # Arguments
    /// * `allele0` - first genotype index
    /// * `allele1` - second genotype index
    /// * `callset_name` - the submitting callset
    /// * `variant` - location and alleles
    /// * `truth_status` - the review classification
    /// # Errors
    /// * if `variant` has fewer than two alleles
    /// * if the resulting record is invalid
    pub fn create_record(
        allele0: usize, allele1: usize, callset_name: &str,
        variant: &VariantInput, truth_status: TruthStatus
    ) -> Result<VariantRecord, ValidationError> {
        let Some((reference, alternates)) = variant.alleles.split_first() else {
            return Err(ValidationError::AlleleCount { found: 0 });
        };
        if alternates.is_empty() {
            return Err(ValidationError::AlleleCount { found: 1 });
        }

        VariantRecord::new(
            variant.chromosome.clone(), variant.start, variant.end,
            reference, alternates.to_vec(),
            Genotype::new(allele0, allele1), callset_name.to_string(), truth_status
        )
    }

    pub fn knowledge_base(&self) -> &ReviewKnowledgeBase {
        &self.knowledge_base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::external_variant::Zygosity;

    fn input(alleles: &[&str]) -> VariantInput {
        VariantInput::new("chr3".to_string(), 500, 501, alleles.iter().map(|a| a.to_string()).collect())
    }

    #[test]
    fn test_create_record() {
        let record = VariantReviewSource::create_record(0, 1, "cs", &input(&["T*", "C"]), TruthStatus::TruePositive).unwrap();
        assert_eq!(record.chromosome(), "chr3");
        assert_eq!(record.start(), 500);
        assert_eq!(record.end(), 501);
        assert_eq!(record.reference_allele(), "T");
        assert_eq!(record.alternate_alleles(), &["C".to_string()]);
        assert_eq!(record.genotype(), Genotype::new(0, 1));
        assert_eq!(record.callset_name(), "cs");
    }

    #[test]
    fn test_create_record_errors() {
        assert_eq!(
            VariantReviewSource::create_record(0, 1, "cs", &input(&[]), TruthStatus::Unknown).unwrap_err(),
            ValidationError::AlleleCount { found: 0 }
        );
        assert_eq!(
            VariantReviewSource::create_record(0, 1, "cs", &input(&["T"]), TruthStatus::Unknown).unwrap_err(),
            ValidationError::AlleleCount { found: 1 }
        );
        assert_eq!(
            VariantReviewSource::create_record(0, 3, "cs", &input(&["T", "C"]), TruthStatus::Unknown).unwrap_err(),
            ValidationError::GenotypeIndex { index: 3, allele_count: 2 }
        );
        assert_eq!(
            VariantReviewSource::create_record(0, 1, "", &input(&["T", "C"]), TruthStatus::Unknown).unwrap_err(),
            ValidationError::EmptyCallset
        );
    }

    #[test]
    fn test_get_features() {
        let kb = ReviewKnowledgeBase::open(&KnowledgeBaseConfig::default()).unwrap();
        let source = VariantReviewSource::from_knowledge_base(Arc::new(kb));
        let record = VariantReviewSource::create_record(1, 1, "reviewer", &input(&["T*", "C", "G"]), TruthStatus::Suspect).unwrap();
        source.knowledge_base().add_call(&record).unwrap();

        let features: Vec<ExternalVariant> = source.get_features("chr3", 0, 1000).unwrap().collect();
        assert_eq!(features.len(), 1);
        let feature = &features[0];
        assert_eq!(feature.reference_allele(), "T");
        assert_eq!(feature.alternate_alleles(), &["C".to_string(), "G".to_string()]);
        assert_eq!(feature.source(), "reviewer");
        assert_eq!(feature.genotype().zygosity(), Zygosity::HomozygousAlternate);
        assert_eq!(feature.genotype().alleles(), &["C".to_string(), "C".to_string()]);

        assert_eq!(source.get_features("chr3", 501, 1000).unwrap().count(), 0);
    }

    #[test]
    fn test_new_from_config() {
        let folder = tempfile::tempdir().unwrap();
        let config_fn = folder.path().join("kb.json");
        std::fs::write(&config_fn, r#"{"backend": {"type": "directory", "path": "data"}}"#).unwrap();

        {
            let source = VariantReviewSource::new(&config_fn).unwrap();
            let record = VariantReviewSource::create_record(0, 1, "cs", &input(&["T", "C"]), TruthStatus::TruePositive).unwrap();
            source.knowledge_base().add_call(&record).unwrap();
        }

        // reopening after the first handle is gone sees the same data
        let source = VariantReviewSource::new(&config_fn).unwrap();
        assert_eq!(source.get_features("chr3", 500, 501).unwrap().count(), 1);
        assert!(folder.path().join("data").join("reviews").is_dir());
    }
}
