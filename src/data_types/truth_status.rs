use serde::{Deserialize, Serialize};

/// The reviewer classification attached to a call
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd,
    Deserialize, Serialize,
    strum_macros::AsRefStr, strum_macros::Display, strum_macros::EnumString
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum TruthStatus {
    /// No review decision has been made
    #[default]
    Unknown,
    /// Reviewer confirmed the call
    TruePositive,
    /// Reviewer rejected the call
    FalsePositive,
    /// Reviewer flagged the call as questionable
    Suspect,
    /// Reviewed callsets disagree; only produced by consensus and rejected as input
    Discordant
}

impl TruthStatus {
    /// Returns true if this carries an actual review decision
    pub fn is_reviewed(&self) -> bool {
        !matches!(self, TruthStatus::Unknown)
    }

    /// Returns true if a reviewer may attach this status to a call
    pub fn is_assignable(&self) -> bool {
        !matches!(self, TruthStatus::Discordant)
    }

    /// Collapses the statuses from several callsets into a single consensus status.
    /// Unknown votes are ignored; no remaining votes is Unknown, unanimous votes keep their status, anything else is Discordant.
    pub fn consensus<I: IntoIterator<Item = TruthStatus>>(votes: I) -> TruthStatus {
        let mut consensus = TruthStatus::Unknown;
        for vote in votes.into_iter().filter(|v| v.is_reviewed()) {
            consensus = match consensus {
                TruthStatus::Unknown => vote,
                current if current == vote => current,
                _ => return TruthStatus::Discordant
            };
        }
        consensus
    }
}
