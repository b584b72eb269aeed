use indexmap::IndexMap;

use crate::data_types::coordinates::Coordinates;
use crate::data_types::truth_status::TruthStatus;
use crate::data_types::variant_record::VariantRecord;

/// A site is a call key without the callset: the same alleles at the same place
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct VariantSite {
    coordinates: Coordinates,
    reference_allele: String,
    alternate_alleles: Vec<String>
}

impl VariantSite {
    pub fn from_record(record: &VariantRecord) -> Self {
        Self {
            coordinates: Coordinates::new(record.chromosome().to_string(), record.start(), record.end()),
            reference_allele: record.reference_allele().to_string(),
            alternate_alleles: record.alternate_alleles().to_vec()
        }
    }

    // getters
    pub fn coordinates(&self) -> &Coordinates {
        &self.coordinates
    }

    pub fn reference_allele(&self) -> &str {
        &self.reference_allele
    }

    pub fn alternate_alleles(&self) -> &[String] {
        &self.alternate_alleles
    }
}

/// The merged view of every callset's review at one site
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConsensusCall {
    site: VariantSite,
    /// Callsets with a call at this site, in the order they were seen
    callsets: Vec<String>,
    truth_status: TruthStatus
}

impl ConsensusCall {
    // getters
    pub fn site(&self) -> &VariantSite {
        &self.site
    }

    pub fn callsets(&self) -> &[String] {
        &self.callsets
    }

    pub fn truth_status(&self) -> TruthStatus {
        self.truth_status
    }
}

/// Groups records by site and collapses each group with `TruthStatus::consensus`.
/// Output order follows the first record seen for each site.
pub fn build_consensus<I: IntoIterator<Item = VariantRecord>>(records: I) -> Vec<ConsensusCall> {
    let mut groups: IndexMap<VariantSite, Vec<(String, TruthStatus)>> = Default::default();
    for record in records {
        let entry = groups.entry(VariantSite::from_record(&record)).or_default();
        entry.push((record.callset_name().to_string(), record.truth_status()));
    }

    groups.into_iter()
        .map(|(site, votes)| {
            let truth_status = TruthStatus::consensus(votes.iter().map(|(_c, t)| *t));
            let callsets = votes.into_iter().map(|(c, _t)| c).collect();
            ConsensusCall {
                site,
                callsets,
                truth_status
            }
        })
        .collect()
}
