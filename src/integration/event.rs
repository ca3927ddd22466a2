use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Event Metadata - Audit Fields Shared By Every Integration Event
// ============================================================================
//
// Embedded (flattened) into each outbound event so that consumers see
// `eventId`, `createdAt`, `version` and `createdBy` next to the payload fields.
//
// ============================================================================

/// Identity and audit information for a single published event
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    pub event_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub version: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl EventMetadata {
    pub fn new() -> Self {
        Self {
            event_id: Uuid::new_v4(),
            created_at: Utc::now(),
            version: 1,
            created_by: None,
        }
    }

    pub fn with_creator(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Integration Event Trait
// ============================================================================

/// Events that cross a service boundary through the message bus.
pub trait IntegrationEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync {
    fn event_type() -> &'static str
    where
        Self: Sized;

    fn metadata(&self) -> &EventMetadata;
}

// ============================================================================
// Wire Encoding Helpers
// ============================================================================

/// Encode an event as a JSON message body.
pub fn encode_event<E: Serialize>(event: &E) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(event)
}

/// Decode a JSON message body into an event.
pub fn decode_event<E: for<'de> Deserialize<'de>>(payload: &[u8]) -> Result<E, serde_json::Error> {
    serde_json::from_slice(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug)]
    #[serde(rename_all = "camelCase")]
    struct PingEvent {
        #[serde(flatten)]
        metadata: EventMetadata,
        target_host: String,
    }

    impl IntegrationEvent for PingEvent {
        fn event_type() -> &'static str {
            "Ping"
        }

        fn metadata(&self) -> &EventMetadata {
            &self.metadata
        }
    }

    #[test]
    fn test_metadata_is_flattened_into_payload() {
        let event = PingEvent {
            metadata: EventMetadata::new().with_creator("scoring-worker"),
            target_host: "db-1".to_string(),
        };

        let json: serde_json::Value = serde_json::from_slice(&encode_event(&event).unwrap()).unwrap();

        assert_eq!(json["targetHost"], "db-1");
        assert_eq!(json["version"], 1);
        assert_eq!(json["createdBy"], "scoring-worker");
        assert_eq!(json["eventId"], event.metadata().event_id.to_string());
    }

    #[test]
    fn test_created_by_omitted_when_unset() {
        let event = PingEvent {
            metadata: EventMetadata::new(),
            target_host: "db-2".to_string(),
        };

        let json: serde_json::Value = serde_json::from_slice(&encode_event(&event).unwrap()).unwrap();
        assert!(json.get("createdBy").is_none());

        let decoded: PingEvent = decode_event(&encode_event(&event).unwrap()).unwrap();
        assert_eq!(decoded.metadata, event.metadata);
        assert_eq!(PingEvent::event_type(), "Ping");
    }
}
