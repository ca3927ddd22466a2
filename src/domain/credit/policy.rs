use serde::{Deserialize, Serialize};

use super::scoring::MAX_SCORE;
use super::value_objects::HistoryCategory;

pub const MIN_ELIGIBLE_SCORE: u32 = 600;
pub const MIN_ELIGIBLE_RANKING: u8 = 3;

/// Card issuance decision for an analysed customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CardDecision {
    Approved(ApprovalTier),
    Denied(DenialReason),
}

impl CardDecision {
    pub fn summary(&self) -> String {
        match self {
            CardDecision::Approved(tier) => tier.summary().to_string(),
            CardDecision::Denied(reason) => reason.summary(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalTier {
    Excellent,
    Good,
    Adequate,
    Standard,
}

impl ApprovalTier {
    fn for_ranking(ranking: u8) -> Self {
        match ranking {
            5 => ApprovalTier::Excellent,
            4 => ApprovalTier::Good,
            3 => ApprovalTier::Adequate,
            _ => ApprovalTier::Standard,
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            ApprovalTier::Excellent => "Excellent credit rating",
            ApprovalTier::Good => "Good credit rating",
            ApprovalTier::Adequate => "Adequate credit rating",
            ApprovalTier::Standard => "Approved for a credit card",
        }
    }
}

/// Why a card was refused, in the order the conditions are checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DenialReason {
    InsufficientScore(u32),
    InsufficientRanking(u8),
    AdverseCreditHistory,
    NotEligible,
}

impl DenialReason {
    pub fn summary(&self) -> String {
        match self {
            DenialReason::InsufficientScore(score) => {
                format!("Insufficient score ({score}/{MAX_SCORE})")
            }
            DenialReason::InsufficientRanking(ranking) => {
                format!("Insufficient ranking ({ranking}/5)")
            }
            DenialReason::AdverseCreditHistory => "Inadequate credit history".to_string(),
            DenialReason::NotEligible => "Not eligible for a credit card".to_string(),
        }
    }
}

/// Both gates are hard: failing either one denies the card.
pub fn is_eligible(score: u32, ranking: u8) -> bool {
    score >= MIN_ELIGIBLE_SCORE && ranking >= MIN_ELIGIBLE_RANKING
}

/// Typed decision behind `determine_reason`. A denial reports the first
/// failing condition: score, then ranking, then bad history.
pub fn decide(eligible: bool, score: u32, ranking: u8, history: HistoryCategory) -> CardDecision {
    if eligible {
        return CardDecision::Approved(ApprovalTier::for_ranking(ranking));
    }

    let reason = if score < MIN_ELIGIBLE_SCORE {
        DenialReason::InsufficientScore(score)
    } else if ranking < MIN_ELIGIBLE_RANKING {
        DenialReason::InsufficientRanking(ranking)
    } else if history == HistoryCategory::Bad {
        DenialReason::AdverseCreditHistory
    } else {
        DenialReason::NotEligible
    };

    CardDecision::Denied(reason)
}

pub fn determine_reason(eligible: bool, score: u32, ranking: u8, history: HistoryCategory) -> String {
    decide(eligible, score, ranking, history).summary()
}
