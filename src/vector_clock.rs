// Copyright 2025 Cowboy AI, LLC.

//! Vector clocks for causal ordering across devices (pure, no time generation).
//!
//! Every operation returns a new clock; events hold immutable snapshots.
//! Devices that are missing from a clock count as zero, so `{a: 1}` and
//! `{a: 1, b: 0}` are equal. Counters are kept in a `BTreeMap` so the encoded
//! form is the same on every device.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Partial order relationship between two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ClockOrdering {
    /// All counters are equal.
    Equal,
    /// Self is causally before other (self <= other and self != other).
    Before,
    /// Self is causally after other (self >= other and self != other).
    After,
    /// Neither before nor after: concurrent updates.
    Concurrent,
}

impl ClockOrdering {
    /// The relationship seen from the other side.
    pub fn reverse(self) -> Self {
        match self {
            ClockOrdering::Before => ClockOrdering::After,
            ClockOrdering::After => ClockOrdering::Before,
            other => other,
        }
    }
}

/// Immutable vector clock keyed by device identifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VectorClock {
    counters: BTreeMap<String, u64>,
}

impl VectorClock {
    /// Create an empty vector clock.
    pub fn new() -> Self {
        Self {
            counters: BTreeMap::new(),
        }
    }

    /// Create a vector clock from `(device, counter)` pairs.
    ///
    /// A device listed twice keeps its highest counter.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, u64)>,
        K: Into<String>,
    {
        let mut counters = BTreeMap::new();
        for (device, count) in entries {
            let entry = counters.entry(device.into()).or_insert(0);
            if count > *entry {
                *entry = count;
            }
        }
        Self { counters }
    }

    /// Get the counter for a device (0 if missing).
    pub fn get(&self, device: &str) -> u64 {
        self.counters.get(device).copied().unwrap_or(0)
    }

    /// Devices with a non-zero counter, in sorted order.
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.counters
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(device, _)| device.as_str())
    }

    /// Iterate `(device, counter)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counters.iter().map(|(d, &c)| (d.as_str(), c))
    }

    /// True when no device has a non-zero counter.
    pub fn is_empty(&self) -> bool {
        self.counters.values().all(|&c| c == 0)
    }

    /// Return a new clock with the device's counter incremented by 1.
    pub fn increment(&self, device: impl AsRef<str>) -> Self {
        let mut next = self.counters.clone();
        let entry = next.entry(device.as_ref().to_string()).or_insert(0);
        *entry = entry.saturating_add(1);
        Self { counters: next }
    }

    /// Merge two clocks by taking element-wise maxima (least upper bound).
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.counters.clone();
        for (device, &count) in &other.counters {
            let entry = merged.entry(device.clone()).or_insert(0);
            if count > *entry {
                *entry = count;
            }
        }
        Self { counters: merged }
    }

    /// Partial order comparison per vector clock semantics.
    pub fn compare(&self, other: &Self) -> ClockOrdering {
        let mut le = true; // self <= other
        let mut ge = true; // self >= other

        for key in self.counters.keys().chain(other.counters.keys()) {
            let a = self.get(key);
            let b = other.get(key);
            if a > b {
                le = false;
            }
            if a < b {
                ge = false;
            }
            if !le && !ge {
                break;
            }
        }

        match (le, ge) {
            (true, true) => ClockOrdering::Equal,
            (true, false) => ClockOrdering::Before,
            (false, true) => ClockOrdering::After,
            (false, false) => ClockOrdering::Concurrent,
        }
    }

    /// Return a standard partial_cmp: Some(Ordering) if comparable, None if concurrent.
    pub fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.compare(other) {
            ClockOrdering::Equal => Some(Ordering::Equal),
            ClockOrdering::Before => Some(Ordering::Less),
            ClockOrdering::After => Some(Ordering::Greater),
            ClockOrdering::Concurrent => None,
        }
    }

    /// True if self causally dominates other (self >= other and !=).
    pub fn dominates(&self, other: &Self) -> bool {
        matches!(self.compare(other), ClockOrdering::After)
    }

    /// True if self is causally dominated by other (self <= other and !=).
    pub fn is_dominated_by(&self, other: &Self) -> bool {
        matches!(self.compare(other), ClockOrdering::Before)
    }

    /// True if neither clock dominates the other.
    pub fn is_concurrent_with(&self, other: &Self) -> bool {
        matches!(self.compare(other), ClockOrdering::Concurrent)
    }
}

impl PartialEq for VectorClock {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == ClockOrdering::Equal
    }
}

impl Eq for VectorClock {}

impl<K: Into<String>> FromIterator<(K, u64)> for VectorClock {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        Self::from_entries(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_and_get() {
        let vc = VectorClock::new();
        let vc1 = vc.increment("a");
        let vc2 = vc1.increment("a");
        assert_eq!(vc.get("a"), 0);
        assert_eq!(vc1.get("a"), 1);
        assert_eq!(vc2.get("a"), 2);
    }

    #[test]
    fn test_increment_saturates() {
        let vc = VectorClock::from_entries([("a", u64::MAX)]);
        assert_eq!(vc.increment("a").get("a"), u64::MAX);
    }

    #[test]
    fn test_merge_and_compare() {
        let a1 = VectorClock::new().increment("a");
        let b1 = VectorClock::new().increment("b");

        let merged = a1.merge(&b1);
        assert_eq!(merged.get("a"), 1);
        assert_eq!(merged.get("b"), 1);

        assert_eq!(a1.compare(&merged), ClockOrdering::Before);
        assert_eq!(merged.compare(&a1), ClockOrdering::After);
        assert_eq!(b1.compare(&merged), ClockOrdering::Before);
        assert_eq!(a1.compare(&b1), ClockOrdering::Concurrent);
        assert_eq!(merged.compare(&merged), ClockOrdering::Equal);
    }

    #[test]
    fn test_missing_entries_count_as_zero() {
        let sparse = VectorClock::from_entries([("a", 1)]);
        let explicit = VectorClock::from_entries([("a", 1), ("b", 0)]);
        assert_eq!(sparse.compare(&explicit), ClockOrdering::Equal);
        assert_eq!(sparse, explicit);
        assert_eq!(explicit.devices().collect::<Vec<_>>(), vec!["a"]);
        assert!(VectorClock::from_entries([("z", 0)]).is_empty());
    }

    #[test]
    fn test_partial_cmp() {
        let a = VectorClock::new().increment("x");
        let b = a.merge(&VectorClock::new().increment("y"));
        assert_eq!(a.partial_cmp(&b), Some(Ordering::Less));
        assert_eq!(b.partial_cmp(&a), Some(Ordering::Greater));

        let c = VectorClock::new().increment("z");
        assert_eq!(a.partial_cmp(&c), None);
        assert!(a.is_concurrent_with(&c));
        assert!(b.dominates(&a));
        assert!(a.is_dominated_by(&b));
    }

    #[test]
    fn test_from_entries_keeps_highest() {
        let vc: VectorClock = vec![("a", 3), ("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(vc.get("a"), 3);
        assert_eq!(vc.get("b"), 2);
    }

    #[test]
    fn test_serializes_as_sorted_map() {
        let vc = VectorClock::from_entries([("dev-B", 4), ("dev-A", 2)]);
        let json = serde_json::to_string(&vc).unwrap();
        assert_eq!(json, r#"{"dev-A":2,"dev-B":4}"#);

        let back: VectorClock = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vc);
    }

    #[test]
    fn test_reverse() {
        assert_eq!(ClockOrdering::Before.reverse(), ClockOrdering::After);
        assert_eq!(ClockOrdering::After.reverse(), ClockOrdering::Before);
        assert_eq!(ClockOrdering::Equal.reverse(), ClockOrdering::Equal);
        assert_eq!(ClockOrdering::Concurrent.reverse(), ClockOrdering::Concurrent);
    }
}
