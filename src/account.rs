// Copyright 2025 Cowboy AI, LLC.

//! Account aggregate rebuilt from account events

use crate::events::{Event, EventPayload};
use crate::identifiers::{AggregateId, EventId};
use crate::replay::Aggregate;
use crate::vector_clock::VectorClock;
use serde::{Deserialize, Serialize};

/// Lifecycle of an account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    /// No creation event applied yet
    #[default]
    Unopened,
    /// Created and usable
    Open,
    /// Closed; later renames are still recorded
    Closed,
}

/// Account state derived from its log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Aggregate the state was built for
    pub id: Option<AggregateId>,
    /// Current display name
    pub name: Option<String>,
    /// Lifecycle status
    pub status: AccountStatus,
    /// Number of events applied
    pub version: u64,
    /// Last applied event
    pub last_event_id: Option<EventId>,
    /// Merge of every applied event's clock
    pub observed: VectorClock,
}

impl Account {
    /// True once an `AccountCreated` has been applied and no close has followed
    pub fn is_open(&self) -> bool {
        self.status == AccountStatus::Open
    }
}

impl Aggregate for Account {
    fn apply(&self, event: &Event) -> Self {
        let mut next = self.clone();
        next.id.get_or_insert_with(|| event.aggregate_id().clone());

        match event.payload() {
            EventPayload::AccountCreated(created) => {
                next.name = Some(created.name.clone());
                if next.status == AccountStatus::Unopened {
                    next.status = AccountStatus::Open;
                }
            }
            EventPayload::AccountNameChanged(changed) => {
                next.name = Some(changed.name.clone());
            }
            EventPayload::AccountClosed(_) => {
                next.status = AccountStatus::Closed;
            }
        }

        next.version += 1;
        next.last_event_id = Some(event.event_id());
        next.observed = next.observed.merge(event.vector_clock());
        next
    }
}
