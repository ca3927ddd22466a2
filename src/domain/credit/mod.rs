// ============================================================================
// Credit Domain - Credit Analysis of Newly Registered Customers
// ============================================================================
//
// - Value objects (HistoryCategory, NationalId, Applicant, ScoringResult)
// - Events (CustomerRegistered in, ScoringCompleted / ScoringFailed out)
// - Errors (ValidationError, ProcessingError, ScoringError)
// - Scoring engine (score, ranking, credit limit, card allowance)
// - Eligibility policy (card decision and its reason)
// - Handler (RegistrationEventHandler, plugged into the message bus)
//
// Scoring and policy are pure; only the handler does I/O.
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod errors;
pub mod scoring;
pub mod policy;
pub mod handler;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use errors::*;
pub use scoring::*;
pub use policy::*;
pub use handler::*;
