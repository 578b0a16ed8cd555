// Member Lifecycle Aggregator
//
// Counts members whose event history satisfies a month-scoped predicate.
// Windows are clamped to the data horizon (see calendar::horizon).
//
// Every temporal condition is an element match over `history`: some single
// event has the wanted type and a timestamp in range. The merchant condition
// is separate: some event references one of the merchant's plans.

use std::sync::Arc;

use serde::Serialize;

use crate::calendar::{Month, MonthWindow};
use crate::entities::{LifecycleEventType, Member, MerchantId, PlanIndex};
use crate::error::Result;
use crate::store::{collections, decode, DocumentStore, Filter};

use LifecycleEventType::{Cancellation, Deactivation, Signup};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    /// Signed up before month end, or deactivated during the month; and not
    /// cancelled or deactivated before the month started
    Active,

    /// Signed up during the month; not cancelled or deactivated before it
    New,

    /// Cancelled before month end; not deactivated before the month started
    Cancelled,

    /// Deactivated before month end; not cancelled before the month started
    DeactivatedNoCancel,
}

impl LifecycleKind {
    pub const ALL: [LifecycleKind; 4] = [
        LifecycleKind::Active,
        LifecycleKind::New,
        LifecycleKind::Cancelled,
        LifecycleKind::DeactivatedNoCancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleKind::Active => "active",
            LifecycleKind::New => "new",
            LifecycleKind::Cancelled => "cancelled",
            LifecycleKind::DeactivatedNoCancel => "deactivated_no_cancel",
        }
    }

    /// Temporal predicate for this kind over a (clamped) month window.
    pub fn predicate(&self, window: &MonthWindow) -> Filter {
        match self {
            LifecycleKind::Active => Filter::and(vec![
                Filter::or(vec![
                    event_before(&[Signup], window),
                    event_within(&[Deactivation], window),
                ]),
                Filter::not(event_before_start(&[Cancellation, Deactivation], window)),
            ]),
            LifecycleKind::New => Filter::and(vec![
                event_within(&[Signup], window),
                Filter::not(event_before_start(&[Cancellation, Deactivation], window)),
            ]),
            LifecycleKind::Cancelled => Filter::and(vec![
                event_before(&[Cancellation], window),
                Filter::not(event_before_start(&[Deactivation], window)),
            ]),
            LifecycleKind::DeactivatedNoCancel => Filter::and(vec![
                event_before(&[Deactivation], window),
                Filter::not(event_before_start(&[Cancellation], window)),
            ]),
        }
    }
}

fn event_types(types: &[LifecycleEventType]) -> Filter {
    Filter::in_values("event", types.iter().map(|t| t.stored_name()))
}

/// Some event of `types` dated before the window end.
fn event_before(types: &[LifecycleEventType], window: &MonthWindow) -> Filter {
    Filter::elem_match(
        "history",
        Filter::and(vec![event_types(types), Filter::before("date_created", window.end)]),
    )
}

/// Some event of `types` dated before the window start.
fn event_before_start(types: &[LifecycleEventType], window: &MonthWindow) -> Filter {
    Filter::elem_match(
        "history",
        Filter::and(vec![event_types(types), Filter::before("date_created", window.start)]),
    )
}

/// Some event of `types` dated inside the window.
fn event_within(types: &[LifecycleEventType], window: &MonthWindow) -> Filter {
    Filter::elem_match(
        "history",
        Filter::and(vec![event_types(types), Filter::within("date_created", window)]),
    )
}

pub struct LifecycleAggregator {
    store: Arc<dyn DocumentStore>,
    plans: PlanIndex,
}

impl LifecycleAggregator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        LifecycleAggregator {
            plans: PlanIndex::new(store.clone()),
            store,
        }
    }

    /// Number of the merchant's members matching `kind` in `month`.
    pub fn count(&self, merchant_id: &MerchantId, month: Month, kind: LifecycleKind) -> Result<u64> {
        let query = self.query(merchant_id, month, kind)?;
        let count = self.store.count(collections::MEMBERS, &query)?;

        tracing::debug!(
            merchant = %merchant_id,
            month = %month,
            kind = kind.as_str(),
            count,
            "lifecycle count"
        );

        Ok(count)
    }

    /// The members counted by `count`, decoded.
    pub fn members(&self, merchant_id: &MerchantId, month: Month, kind: LifecycleKind) -> Result<Vec<Member>> {
        let query = self.query(merchant_id, month, kind)?;
        self.store
            .find(collections::MEMBERS, &query)?
            .into_iter()
            .map(|doc| decode(collections::MEMBERS, doc))
            .collect()
    }

    fn query(&self, merchant_id: &MerchantId, month: Month, kind: LifecycleKind) -> Result<Filter> {
        let plan_ids = self.plans.plan_ids(merchant_id)?;
        let window = month.clamped_window();

        Ok(Filter::and(vec![
            kind.predicate(&window),
            Filter::elem_match("history", Filter::in_values("plan", plan_ids)),
        ]))
    }
}
