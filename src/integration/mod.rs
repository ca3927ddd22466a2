// ============================================================================
// Integration Events - Generic Cross-Service Event Abstractions
// ============================================================================
//
// Events exchanged with other services over the message bus. Nothing in here
// knows about customers or credit; domain events plug in by implementing
// `IntegrationEvent`.
//
// ============================================================================

pub mod event;

pub use event::{decode_event, encode_event, EventMetadata, IntegrationEvent};
