
/// Per-site merging of reviews across callsets
pub mod consensus;
/// Conversion between external 0-based half-open and internal 1-based closed coordinates
pub mod coordinates;
/// The variant shapes exchanged with callers
pub mod external_variant;
/// Internal representation of a call and its identity key
pub mod stored_call;
/// Reviewer classification of a call
pub mod truth_status;
/// Contains the canonical call record and its input checks
pub mod variant_record;
