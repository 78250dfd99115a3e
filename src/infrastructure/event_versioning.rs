// Copyright 2025 Cowboy AI, LLC.

//! Payload schema evolution
//!
//! Stored and synchronised events outlive the code that wrote them. When a
//! decoder meets an envelope with an older `schema_version`, it lifts the
//! payload one version at a time through registered upcasters before the
//! typed decode.

use crate::errors::{EventError, EventResult};
use std::collections::HashMap;
use std::fmt;

// Type alias for transformer function
type PayloadTransformerFn =
    Box<dyn Fn(&serde_json::Value) -> EventResult<serde_json::Value> + Send + Sync>;

/// Transforms a payload from one schema version to the next
pub trait Upcaster: Send + Sync {
    /// Transform payload data from `source_version` to `target_version`
    fn upcast(&self, payload: &serde_json::Value) -> EventResult<serde_json::Value>;

    /// Version this upcaster reads
    fn source_version(&self) -> u32;

    /// Version this upcaster produces
    fn target_version(&self) -> u32;
}

/// An [`Upcaster`] backed by a closure
pub struct SimpleUpcaster {
    from: u32,
    to: u32,
    transformer: PayloadTransformerFn,
}

impl SimpleUpcaster {
    /// Create a new upcaster with a transformation function
    pub fn new<F>(from: u32, to: u32, transformer: F) -> Self
    where
        F: Fn(&serde_json::Value) -> EventResult<serde_json::Value> + Send + Sync + 'static,
    {
        Self {
            from,
            to,
            transformer: Box::new(transformer),
        }
    }
}

impl Upcaster for SimpleUpcaster {
    fn upcast(&self, payload: &serde_json::Value) -> EventResult<serde_json::Value> {
        (self.transformer)(payload)
    }

    fn source_version(&self) -> u32 {
        self.from
    }

    fn target_version(&self) -> u32 {
        self.to
    }
}

/// Upcasters registered per event type
#[derive(Default)]
pub struct SchemaEvolution {
    upcasters: HashMap<String, Vec<Box<dyn Upcaster>>>,
}

impl fmt::Debug for SchemaEvolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (event_type, chain) in &self.upcasters {
            let steps: Vec<_> = chain
                .iter()
                .map(|u| (u.source_version(), u.target_version()))
                .collect();
            map.entry(event_type, &steps);
        }
        map.finish()
    }
}

impl SchemaEvolution {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an upcaster for an event type
    pub fn register(&mut self, event_type: impl Into<String>, upcaster: Box<dyn Upcaster>) {
        self.upcasters
            .entry(event_type.into())
            .or_default()
            .push(upcaster);
    }

    /// Lift a payload from `from_version` up to `to_version`.
    ///
    /// A missing step, or one that would lift past `to_version`, fails with
    /// [`EventError::MalformedPayload`]; the decoder never guesses at an
    /// intermediate schema.
    pub fn upcast(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        from_version: u32,
        to_version: u32,
    ) -> EventResult<serde_json::Value> {
        if from_version >= to_version {
            return Ok(payload);
        }

        let no_path = |at: u32| {
            EventError::malformed(format!(
                "no upcaster for {event_type} from schema version {at} to {to_version}"
            ))
        };

        let chain = self
            .upcasters
            .get(event_type)
            .ok_or_else(|| no_path(from_version))?;

        let mut current = payload;
        let mut version = from_version;
        while version < to_version {
            let mut candidates = chain
                .iter()
                .filter(|u| u.source_version() == version && u.target_version() > version);
            let step = match candidates.clone().find(|u| u.target_version() <= to_version) {
                Some(step) => step,
                None => {
                    return Err(match candidates.next() {
                        Some(overshoot) => EventError::malformed(format!(
                            "upcaster for {event_type} lifts schema version {version} to {}, past the supported version {to_version}",
                            overshoot.target_version()
                        )),
                        None => no_path(version),
                    })
                }
            };
            current = step.upcast(&current)?;
            version = step.target_version();
        }

        Ok(current)
    }
}
