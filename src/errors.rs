// Copyright 2025 Cowboy AI, LLC.

//! Error types for event construction, encoding and ingestion

use thiserror::Error;

/// Errors raised by the event core.
///
/// Concurrent vector clocks are not an error: they are resolved by the
/// deterministic tie-break in [`crate::ordering`].
#[derive(Debug, Error)]
pub enum EventError {
    /// Construction input was missing or invalid
    #[error("Invalid argument `{field}`: {reason}")]
    InvalidArgument {
        /// Name of the offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// The envelope discriminator is not registered with the decoder
    #[error("Unknown event type `{event_type}`{}", context(.event_id, .aggregate_id))]
    UnknownEventType {
        /// Discriminator found in the envelope
        event_type: String,
        /// Event id, if it could be read
        event_id: Option<String>,
        /// Aggregate id, if it could be read
        aggregate_id: Option<String>,
    },

    /// Bytes were truncated, corrupt, or did not match the variant schema
    #[error("Malformed payload: {reason}{}", context(.event_id, .aggregate_id))]
    MalformedPayload {
        /// What went wrong
        reason: String,
        /// Event id, if it could be read
        event_id: Option<String>,
        /// Aggregate id, if it could be read
        aggregate_id: Option<String>,
    },

    /// Writing to or reading from the supplied stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Event store failure
    #[error("Event store error: {0}")]
    Store(String),
}

/// Result type for event operations
pub type EventResult<T> = Result<T, EventError>;

fn context(event_id: &Option<String>, aggregate_id: &Option<String>) -> String {
    match (event_id, aggregate_id) {
        (Some(e), Some(a)) => format!(" (event {e}, aggregate {a})"),
        (Some(e), None) => format!(" (event {e})"),
        (None, Some(a)) => format!(" (aggregate {a})"),
        (None, None) => String::new(),
    }
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::malformed(err.to_string())
    }
}

impl EventError {
    /// Create an invalid-argument error
    pub fn invalid_argument(field: &'static str, reason: impl Into<String>) -> Self {
        EventError::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    /// Create a malformed-payload error without event context
    pub fn malformed(reason: impl Into<String>) -> Self {
        EventError::MalformedPayload {
            reason: reason.into(),
            event_id: None,
            aggregate_id: None,
        }
    }

    /// Attach event id and aggregate id to a decode error.
    ///
    /// Context already present on the error is kept.
    pub fn with_context(self, event_id: Option<String>, aggregate_id: Option<String>) -> Self {
        match self {
            EventError::MalformedPayload {
                reason,
                event_id: e,
                aggregate_id: a,
            } => EventError::MalformedPayload {
                reason,
                event_id: e.or(event_id),
                aggregate_id: a.or(aggregate_id),
            },
            EventError::UnknownEventType {
                event_type,
                event_id: e,
                aggregate_id: a,
            } => EventError::UnknownEventType {
                event_type,
                event_id: e.or(event_id),
                aggregate_id: a.or(aggregate_id),
            },
            other => other,
        }
    }

    /// Check if this is an unknown-discriminator error
    pub fn is_unknown_event_type(&self) -> bool {
        matches!(self, EventError::UnknownEventType { .. })
    }

    /// Check if this is a malformed-payload error
    pub fn is_malformed(&self) -> bool {
        matches!(self, EventError::MalformedPayload { .. })
    }

    /// Check if this is an invalid-argument error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, EventError::InvalidArgument { .. })
    }

    /// Event id carried by the error, if any
    pub fn event_id(&self) -> Option<&str> {
        match self {
            EventError::UnknownEventType { event_id, .. }
            | EventError::MalformedPayload { event_id, .. } => event_id.as_deref(),
            _ => None,
        }
    }

    /// Aggregate id carried by the error, if any
    pub fn aggregate_id(&self) -> Option<&str> {
        match self {
            EventError::UnknownEventType { aggregate_id, .. }
            | EventError::MalformedPayload { aggregate_id, .. } => aggregate_id.as_deref(),
            _ => None,
        }
    }
}
