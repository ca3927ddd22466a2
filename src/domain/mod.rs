// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each bounded context has its own subdirectory with its value objects,
// events, errors and the logic operating on them. Transport and wire
// concerns stay in `messaging` and `integration`.
//
// ============================================================================

pub mod credit;
