// Copyright 2025 Cowboy AI, LLC.

//! Configuration for the event codec and device sync

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How a decoder treats payload fields it does not know
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityMode {
    /// Ignore unknown fields and decode the known ones
    #[default]
    Lenient,
    /// Reject payloads with unknown fields or a newer schema version
    Strict,
}

/// Configuration for [`crate::EventSerializer`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SerializerConfig {
    /// Decoder compatibility mode
    pub compatibility: CompatibilityMode,

    /// Emit indented JSON (diagnostics only; not a different format)
    pub pretty: bool,
}

impl SerializerConfig {
    /// Lenient decoding, compact output
    pub fn lenient() -> Self {
        Self::default()
    }

    /// Strict decoding, compact output
    pub fn strict() -> Self {
        Self {
            compatibility: CompatibilityMode::Strict,
            ..Self::default()
        }
    }
}

/// Configuration for [`crate::Device`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SyncConfig {
    /// Codec settings used for authored and received events
    pub serializer: SerializerConfig,

    /// Stop a batch at the first failing event instead of recording the
    /// failure and continuing with the rest
    pub halt_on_error: bool,
}
