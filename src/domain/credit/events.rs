use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::integration::{EventMetadata, IntegrationEvent};
use super::errors::ValidationError;
use super::value_objects::{Applicant, HistoryCategory, NationalId, ScoringResult};

// ============================================================================
// Credit Analysis Integration Events
// ============================================================================
//
// Inbound:  CustomerRegistered  (customer service -> scoring worker)
// Outbound: ScoringCompleted    (scoring worker -> customer service)
//           ScoringFailed       (scoring worker -> customer service)
//
// ============================================================================

/// `createdBy` of every event this worker publishes
pub const PRODUCER: &str = "credit-scoring-worker";

/// A customer was created by the customer service and awaits credit analysis.
///
/// Every field defaults when absent so that an incomplete payload is reported
/// through `validate` instead of failing to decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRegistered {
    #[serde(default)]
    pub customer_id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub national_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub income: Decimal,
    #[serde(default)]
    pub age: i32,
    #[serde(default)]
    pub history_category: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

impl CustomerRegistered {
    /// Check the payload and lift it into an `Applicant`. Reports the first
    /// violation only.
    pub fn validate(&self) -> Result<Applicant, ValidationError> {
        if self.customer_id.is_nil() {
            return Err(ValidationError::MissingCustomerId);
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        if self.national_id.trim().is_empty() {
            return Err(ValidationError::MissingNationalId);
        }
        if self.income <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveIncome);
        }
        if !(18..=120).contains(&self.age) {
            return Err(ValidationError::AgeOutOfRange(self.age));
        }
        let history: HistoryCategory = self.history_category.parse()?;

        Ok(Applicant {
            customer_id: self.customer_id,
            name: self.name.clone(),
            national_id: NationalId::new(self.national_id.clone()),
            email: self.email.clone(),
            income: self.income,
            age: self.age,
            history,
            birth_date: self.birth_date,
        })
    }
}

/// Credit analysis finished; carries the full decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringCompleted {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub customer_id: Uuid,
    pub score: u32,
    pub ranking: u8,
    pub eligible: bool,
    pub reason: String,
    pub analysis_date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub credit_limit: Decimal,
    pub max_cards: u8,
}

impl ScoringCompleted {
    pub fn new(customer_id: Uuid, result: ScoringResult) -> Self {
        let metadata = EventMetadata::new().with_creator(PRODUCER);
        let analysis_date = metadata.created_at;

        Self {
            metadata,
            customer_id,
            score: result.score,
            ranking: result.ranking,
            eligible: result.eligible,
            reason: result.reason,
            analysis_date,
            credit_limit: result.credit_limit,
            max_cards: result.max_cards,
        }
    }
}

impl IntegrationEvent for ScoringCompleted {
    fn event_type() -> &'static str {
        "ScoringCompleted"
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

/// Credit analysis could not be produced for this registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringFailed {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub customer_id: Uuid,
    pub reason: String,
    pub attempt_date: DateTime<Utc>,
    pub retryable: bool,
}

impl ScoringFailed {
    /// Failures are always reported as retryable: the customer service may
    /// resubmit the registration once the cause is fixed.
    pub fn new(customer_id: Uuid, reason: impl Into<String>) -> Self {
        let metadata = EventMetadata::new().with_creator(PRODUCER);
        let attempt_date = metadata.created_at;

        Self {
            metadata,
            customer_id,
            reason: reason.into(),
            attempt_date,
            retryable: true,
        }
    }
}

impl IntegrationEvent for ScoringFailed {
    fn event_type() -> &'static str {
        "ScoringFailed"
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::{decode_event, encode_event};

    fn registration() -> CustomerRegistered {
        CustomerRegistered {
            customer_id: Uuid::new_v4(),
            name: "Maria Souza".to_string(),
            national_id: "529.982.247-25".to_string(),
            email: "maria@example.com".to_string(),
            income: Decimal::from(4_500),
            age: 34,
            history_category: "REGULAR".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 5, 17),
        }
    }

    #[test]
    fn test_valid_registration_becomes_applicant() {
        let event = registration();
        let applicant = event.validate().unwrap();

        assert_eq!(applicant.customer_id, event.customer_id);
        assert_eq!(applicant.history, HistoryCategory::Regular);
        assert_eq!(applicant.national_id.as_str(), "529.982.247-25");
        assert_eq!(applicant.income, Decimal::from(4_500));
    }

    #[test]
    fn test_validation_reports_first_violation() {
        let mut event = registration();
        event.customer_id = Uuid::nil();
        event.age = 15;
        assert_eq!(event.validate().unwrap_err(), ValidationError::MissingCustomerId);

        let mut event = registration();
        event.name = "   ".to_string();
        event.income = Decimal::ZERO;
        assert_eq!(event.validate().unwrap_err(), ValidationError::MissingName);

        let mut event = registration();
        event.national_id = String::new();
        assert_eq!(event.validate().unwrap_err(), ValidationError::MissingNationalId);

        let mut event = registration();
        event.income = Decimal::from(-10);
        assert_eq!(event.validate().unwrap_err(), ValidationError::NonPositiveIncome);

        let mut event = registration();
        event.history_category = String::new();
        assert_eq!(event.validate().unwrap_err(), ValidationError::MissingHistoryCategory);

        let mut event = registration();
        event.history_category = "BOM".to_string();
        assert_eq!(
            event.validate().unwrap_err(),
            ValidationError::UnknownHistoryCategory("BOM".to_string())
        );
    }

    #[test]
    fn test_age_bounds_are_inclusive() {
        for age in [18, 120] {
            let mut event = registration();
            event.age = age;
            assert!(event.validate().is_ok(), "age {age} should be accepted");
        }

        for age in [17, 121, -1] {
            let mut event = registration();
            event.age = age;
            assert_eq!(event.validate().unwrap_err(), ValidationError::AgeOutOfRange(age));
        }
    }

    #[test]
    fn test_registration_decodes_camel_case_payload() {
        let payload = br#"{
            "customerId": "6f1c2a4e-8a54-4b8e-9a57-2d7b8f0e1c11",
            "name": "Joao Lima",
            "nationalId": "52998224725",
            "email": "joao@example.com",
            "income": 12000.50,
            "age": 30,
            "historyCategory": "GOOD",
            "birthDate": "1995-02-01"
        }"#;

        let event: CustomerRegistered = decode_event(payload).unwrap();

        assert_eq!(event.name, "Joao Lima");
        assert_eq!(event.income, Decimal::new(1_200_050, 2));
        assert_eq!(event.birth_date, NaiveDate::from_ymd_opt(1995, 2, 1));
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_surface_as_validation_errors() {
        let event: CustomerRegistered =
            decode_event(br#"{"customerId": "6f1c2a4e-8a54-4b8e-9a57-2d7b8f0e1c11"}"#).unwrap();

        assert_eq!(event.income, Decimal::ZERO);
        assert_eq!(event.validate().unwrap_err(), ValidationError::MissingName);
    }

    #[test]
    fn test_completed_event_wire_format() {
        let customer_id = Uuid::new_v4();
        let event = ScoringCompleted::new(
            customer_id,
            ScoringResult {
                score: 1000,
                ranking: 5,
                eligible: true,
                reason: "excellent credit rating".to_string(),
                credit_limit: Decimal::from(100_000),
                max_cards: 5,
            },
        );

        let json: serde_json::Value = serde_json::from_slice(&encode_event(&event).unwrap()).unwrap();

        assert_eq!(json["customerId"], customer_id.to_string());
        assert_eq!(json["score"], 1000);
        assert_eq!(json["ranking"], 5);
        assert_eq!(json["eligible"], true);
        assert_eq!(json["creditLimit"], 100000.0);
        assert_eq!(json["maxCards"], 5);
        assert!(json["analysisDate"].is_string());
        assert!(json["eventId"].is_string());
        assert_eq!(json["createdBy"], PRODUCER);
        assert_eq!(event.analysis_date, event.metadata.created_at);
    }

    #[test]
    fn test_failed_event_is_always_retryable() {
        let event = ScoringFailed::new(Uuid::new_v4(), "age must be between 18 and 120 years (got 15)");
        assert!(event.retryable);

        let json: serde_json::Value = serde_json::from_slice(&encode_event(&event).unwrap()).unwrap();
        assert_eq!(json["retryable"], true);
        assert!(json["attemptDate"].is_string());
        assert_eq!(ScoringFailed::event_type(), "ScoringFailed");
    }

    #[test]
    fn test_cent_credit_limit_survives_the_wire() {
        let event = ScoringCompleted::new(
            Uuid::new_v4(),
            ScoringResult {
                score: 700,
                ranking: 4,
                eligible: true,
                reason: "Good credit rating".to_string(),
                credit_limit: Decimal::new(617_284, 2),
                max_cards: 3,
            },
        );

        let decoded: ScoringCompleted = decode_event(&encode_event(&event).unwrap()).unwrap();

        assert_eq!(decoded.credit_limit, Decimal::new(617_284, 2));
        assert_eq!(decoded, event);
    }
}
