use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use super::value_objects::{Applicant, HistoryCategory, NationalId};

// ============================================================================
// Credit Scoring Engine
// ============================================================================
//
// Stateless, I/O free. The score is the clamped sum of four bounded parts:
//
//   credit history      up to 400
//   monthly income      up to 300
//   age band            up to 200
//   identity document   up to 100
//
// Ranking, credit limit and card allowance are derived from the score.
//
// ============================================================================

pub const MIN_SCORE: u32 = 0;
pub const MAX_SCORE: u32 = 1000;

/// Upper (inclusive) score bound of rankings 1 to 4; anything above is 5.
const RANKING_UPPER_BOUNDS: [u32; 4] = [200, 400, 600, 800];

const EXCELLENT_SCORE: u32 = 800;
const EXCELLENT_INCOME_MULTIPLIER: i64 = 10;
const MIN_CREDIT_LIMIT: i64 = 500;
const MAX_CREDIT_LIMIT: i64 = 100_000;
/// Limits are whole cents.
const CREDIT_LIMIT_DECIMALS: u32 = 2;

/// Scoring operations the registration handler depends on.
pub trait CreditScorer: Send + Sync {
    fn score(&self, applicant: &Applicant) -> u32;

    fn ranking(&self, score: u32) -> u8;

    fn credit_limit(&self, score: u32, income: Decimal, history: HistoryCategory) -> Decimal;

    fn max_cards(&self, ranking: u8) -> u8;
}

/// Production scorer backed by the functions in this module
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardScorer;

impl CreditScorer for StandardScorer {
    fn score(&self, applicant: &Applicant) -> u32 {
        compute_score(
            applicant.income,
            applicant.history,
            applicant.age,
            applicant.birth_date,
            &applicant.national_id,
        )
    }

    fn ranking(&self, score: u32) -> u8 {
        compute_ranking(score)
    }

    fn credit_limit(&self, score: u32, income: Decimal, history: HistoryCategory) -> Decimal {
        compute_credit_limit(score, income, history)
    }

    fn max_cards(&self, ranking: u8) -> u8 {
        compute_max_cards(ranking)
    }
}

/// Credit score in `MIN_SCORE..=MAX_SCORE`.
///
/// The birth date is accepted for parity with the registration payload but
/// does not contribute; the age band uses the declared age.
pub fn compute_score(
    income: Decimal,
    history: HistoryCategory,
    age: i32,
    _birth_date: Option<NaiveDate>,
    national_id: &NationalId,
) -> u32 {
    let total = history_points(history)
        + income_points(income)
        + age_points(age)
        + national_id_points(national_id);

    total.clamp(MIN_SCORE, MAX_SCORE)
}

pub fn history_points(history: HistoryCategory) -> u32 {
    match history {
        HistoryCategory::Good => 400,
        HistoryCategory::Regular => 200,
        HistoryCategory::Bad => 0,
    }
}

pub fn income_points(income: Decimal) -> u32 {
    let tiers: [(i64, u32); 4] = [(10_000, 300), (5_000, 225), (2_000, 150), (1_000, 75)];

    tiers
        .iter()
        .find(|(threshold, _)| income >= Decimal::from(*threshold))
        .map(|(_, points)| *points)
        .unwrap_or(0)
}

pub fn age_points(age: i32) -> u32 {
    match age {
        25..=45 => 200,
        22..=24 | 46..=55 => 150,
        18..=21 | 56..=65 => 100,
        _ => 50,
    }
}

pub fn national_id_points(national_id: &NationalId) -> u32 {
    if national_id.has_valid_format() {
        100
    } else {
        0
    }
}

/// Ranking 1 (worst) to 5 (best). Each tier includes its upper bound:
/// 200 is ranking 1, 201 is ranking 2.
pub fn compute_ranking(score: u32) -> u8 {
    RANKING_UPPER_BOUNDS
        .iter()
        .position(|upper| score <= *upper)
        .map(|tier| tier as u8 + 1)
        .unwrap_or(5)
}

/// Monthly income times a history multiplier, or times ten for excellent
/// scores, clamped to the product range and rounded to cents.
pub fn compute_credit_limit(score: u32, income: Decimal, history: HistoryCategory) -> Decimal {
    let multiplier = if score >= EXCELLENT_SCORE {
        EXCELLENT_INCOME_MULTIPLIER
    } else {
        match history {
            HistoryCategory::Good => 5,
            HistoryCategory::Regular => 2,
            HistoryCategory::Bad => 1,
        }
    };

    // saturate on overflow; the clamp below brings it back into range
    let limit = income
        .checked_mul(Decimal::from(multiplier))
        .unwrap_or(if income.is_sign_negative() { Decimal::MIN } else { Decimal::MAX });

    limit
        .clamp(Decimal::from(MIN_CREDIT_LIMIT), Decimal::from(MAX_CREDIT_LIMIT))
        .round_dp_with_strategy(CREDIT_LIMIT_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

pub fn compute_max_cards(ranking: u8) -> u8 {
    match ranking {
        1 => 1,
        2 | 3 => 2,
        4 => 3,
        5 => 5,
        _ => 0,
    }
}
