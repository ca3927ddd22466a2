use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::errors::ValidationError;

// ============================================================================
// Credit Value Objects
// ============================================================================

/// Prior credit behaviour reported by the customer service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HistoryCategory {
    Good,
    Regular,
    Bad,
}

impl HistoryCategory {
    pub const ALL: [HistoryCategory; 3] = [Self::Good, Self::Regular, Self::Bad];

    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryCategory::Good => "GOOD",
            HistoryCategory::Regular => "REGULAR",
            HistoryCategory::Bad => "BAD",
        }
    }
}

impl fmt::Display for HistoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryCategory {
    type Err = ValidationError;

    /// Codes are matched exactly; `good` or ` GOOD` are rejected.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Err(ValidationError::MissingHistoryCategory);
        }

        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
            .ok_or_else(|| ValidationError::UnknownHistoryCategory(value.to_string()))
    }
}

/// National identity document number as sent by the customer service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationalId(pub String);

impl NationalId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Format check only: eleven digits once `.` and `-` separators are
    /// stripped. Check digits are not verified.
    pub fn has_valid_format(&self) -> bool {
        let digits: Vec<char> = self
            .0
            .chars()
            .filter(|c| *c != '.' && *c != '-')
            .collect();

        digits.len() == 11 && digits.iter().all(|c| c.is_ascii_digit())
    }
}

/// Registration that passed validation; the only input the scorer accepts
#[derive(Debug, Clone, PartialEq)]
pub struct Applicant {
    pub customer_id: Uuid,
    pub name: String,
    pub national_id: NationalId,
    pub email: String,
    pub income: Decimal,
    pub age: i32,
    pub history: HistoryCategory,
    pub birth_date: Option<NaiveDate>,
}

/// Outcome of one credit analysis, ready to be put on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringResult {
    pub score: u32,
    pub ranking: u8,
    pub eligible: bool,
    pub reason: String,
    pub credit_limit: Decimal,
    pub max_cards: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_category_parses_exact_codes() {
        assert_eq!("GOOD".parse::<HistoryCategory>().unwrap(), HistoryCategory::Good);
        assert_eq!("REGULAR".parse::<HistoryCategory>().unwrap(), HistoryCategory::Regular);
        assert_eq!("BAD".parse::<HistoryCategory>().unwrap(), HistoryCategory::Bad);
    }

    #[test]
    fn test_history_category_rejects_unknown_and_blank() {
        assert!(matches!(
            "good".parse::<HistoryCategory>(),
            Err(ValidationError::UnknownHistoryCategory(code)) if code == "good"
        ));
        assert!(matches!(
            "EXCELLENT".parse::<HistoryCategory>(),
            Err(ValidationError::UnknownHistoryCategory(_))
        ));
        assert!(matches!(
            "  ".parse::<HistoryCategory>(),
            Err(ValidationError::MissingHistoryCategory)
        ));
    }

    #[test]
    fn test_history_category_serde_uses_upper_case_codes() {
        let json = serde_json::to_string(&HistoryCategory::Regular).unwrap();
        assert_eq!(json, "\"REGULAR\"");
    }

    #[test]
    fn test_national_id_format() {
        assert!(NationalId::new("52998224725").has_valid_format());
        assert!(NationalId::new("529.982.247-25").has_valid_format());
        // check digits are not verified
        assert!(NationalId::new("11111111111").has_valid_format());

        assert!(!NationalId::new("").has_valid_format());
        assert!(!NationalId::new("5299822472").has_valid_format());
        assert!(!NationalId::new("529982247251").has_valid_format());
        assert!(!NationalId::new("529/982/247-25").has_valid_format());
        assert!(!NationalId::new("5299822472a").has_valid_format());
        assert!(!NationalId::new("529 982 247 25").has_valid_format());
    }
}
