// Copyright 2025 Cowboy AI, LLC.

//! Causal ordering of events that target the same aggregate.
//!
//! Vector clocks give a partial order. Concurrent events are ordered by a
//! fixed policy: lexicographic `(device_id, event_id)`. Wall-clock timestamps
//! are never consulted because device clocks are not synchronised.
//!
//! The pairwise rule in [`causal_cmp`] is not transitive once three or more
//! events mix causal and concurrent relations, so a set of events is never
//! sorted with it. [`causal_order`] instead performs a topological sort over
//! happens-before and uses the tie-break only to pick among ready events.
//! Happens-before edges come from each device's chain of counters, which
//! keeps ordering close to linear in the number of events.

use crate::events::Event;
use crate::identifiers::EventId;
use crate::vector_clock::ClockOrdering;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use tracing::debug;

/// Deterministic tie-break for events whose clocks are concurrent (or equal).
pub fn tie_break(a: &Event, b: &Event) -> Ordering {
    a.device_id()
        .cmp(b.device_id())
        .then_with(|| a.event_id().cmp(&b.event_id()))
}

/// Decide which of two events applies first.
///
/// Causally ordered events follow their clocks; otherwise [`tie_break`]
/// decides. The answer is the same on every device and independent of the
/// order in which the events arrived.
pub fn causal_cmp(a: &Event, b: &Event) -> Ordering {
    match a.vector_clock().compare(b.vector_clock()) {
        ClockOrdering::Before => Ordering::Less,
        ClockOrdering::After => Ordering::Greater,
        ClockOrdering::Concurrent | ClockOrdering::Equal => tie_break(a, b),
    }
}

/// Key used to pick among events whose causal predecessors are all placed.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct ReadyKey<'a> {
    device_id: &'a str,
    event_id: EventId,
    index: usize,
}

/// Happens-before edges between events, by index
struct Precedence {
    successors: Vec<Vec<usize>>,
    pending: Vec<usize>,
}

impl Precedence {
    fn new(n: usize) -> Self {
        Self {
            successors: vec![Vec::new(); n],
            pending: vec![0; n],
        }
    }

    fn edge(&mut self, from: usize, to: usize) {
        self.successors[from].push(to);
        self.pending[to] += 1;
    }
}

/// Build edges from each device's own chain of events.
///
/// A device's counter rises by one per authored event and every clock is the
/// merge of everything its author had seen, so an event follows exactly the
/// events of device `d` whose counter is at most its own entry for `d`. Only
/// the latest such event needs an edge; the chain supplies the rest. Returns
/// `None` when the events do not satisfy that shape (a counter reused on one
/// device, or a chain link that is not a real happens-before), in which case
/// the caller compares every pair instead.
fn chain_precedence(events: &[Event]) -> Option<Precedence> {
    let mut chains: HashMap<&str, Vec<(u64, usize)>> = HashMap::new();
    for (i, event) in events.iter().enumerate() {
        let device = event.device_id().as_str();
        chains
            .entry(device)
            .or_default()
            .push((event.vector_clock().get(device), i));
    }
    for chain in chains.values_mut() {
        chain.sort_unstable();
        if chain.windows(2).any(|w| w[0].0 == w[1].0) {
            return None;
        }
    }

    let mut precedence = Precedence::new(events.len());
    for (i, event) in events.iter().enumerate() {
        let own = event.device_id().as_str();
        for (device, count) in event.vector_clock().iter() {
            let Some(chain) = chains.get(device) else {
                continue;
            };
            let bound = if device == own { count.saturating_sub(1) } else { count };
            let seen = chain.partition_point(|&(c, _)| c <= bound);
            if seen == 0 {
                continue;
            }
            let pred = chain[seen - 1].1;
            if events[pred].vector_clock().compare(event.vector_clock()) != ClockOrdering::Before {
                return None;
            }
            precedence.edge(pred, i);
        }
    }
    Some(precedence)
}

fn pairwise_precedence(events: &[Event]) -> Precedence {
    let n = events.len();
    let mut precedence = Precedence::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            match events[i].vector_clock().compare(events[j].vector_clock()) {
                ClockOrdering::Before => precedence.edge(i, j),
                ClockOrdering::After => precedence.edge(j, i),
                ClockOrdering::Concurrent | ClockOrdering::Equal => {}
            }
        }
    }
    precedence
}

/// Linearise events into a deterministic causal order.
///
/// Every event appears after all events whose clocks precede its own. Among
/// events that are free to go next, the smallest `(device_id, event_id)` is
/// emitted first. The output depends only on the set of events given, not
/// on their input order.
pub fn causal_order(events: Vec<Event>) -> Vec<Event> {
    let n = events.len();
    if n < 2 {
        return events;
    }

    let precedence = chain_precedence(&events).unwrap_or_else(|| {
        debug!(
            events = n,
            "Device chains inconsistent; comparing every pair of clocks"
        );
        pairwise_precedence(&events)
    });
    linearize(events, precedence)
}

/// Kahn's algorithm with the tie-break choosing among ready events
fn linearize(events: Vec<Event>, precedence: Precedence) -> Vec<Event> {
    let n = events.len();
    let Precedence {
        successors,
        mut pending,
    } = precedence;

    let order = {
        let key = |i: usize| {
            Reverse(ReadyKey {
                device_id: events[i].device_id().as_str(),
                event_id: events[i].event_id(),
                index: i,
            })
        };

        let mut ready: BinaryHeap<Reverse<ReadyKey<'_>>> =
            (0..n).filter(|&i| pending[i] == 0).map(key).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(Reverse(next)) = ready.pop() {
            let i = next.index;
            order.push(i);
            for &s in &successors[i] {
                pending[s] -= 1;
                if pending[s] == 0 {
                    ready.push(key(s));
                }
            }
        }
        order
    };

    // Every edge is a strict happens-before, so the graph is acyclic and
    // every event is placed.
    debug_assert_eq!(order.len(), n);

    let mut slots: Vec<Option<Event>> = events.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}
