// Payment Aggregator
//
// Sums approved receipt amounts for a merchant and month. Windows are the full
// calendar month (no horizon clamp). Which timestamp dates a receipt depends on
// its channel:
//   signup    -> date_created
//   recurring -> original_payment_date
//
// Revenue splits use a looser date rule: a receipt belongs to the month when
// either timestamp falls inside it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::calendar::{Month, MonthWindow};
use crate::entities::receipt::APPROVED;
use crate::entities::{AccessTier, BillingCadence, Channel, MerchantId, PlanIndex, Receipt};
use crate::error::Result;
use crate::store::{collections, decode, DocumentStore, Filter};

// ============================================================================
// CATEGORIES & RESULTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentCategory {
    NewSignup,
    Recurring,
    /// Either of the above, matched in one query so no receipt counts twice
    Combined,
}

impl PaymentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentCategory::NewSignup => "new_signup",
            PaymentCategory::Recurring => "recurring",
            PaymentCategory::Combined => "combined",
        }
    }

    fn predicate(&self, window: &MonthWindow) -> Filter {
        match self {
            PaymentCategory::NewSignup => charged_through(Channel::Signup, window),
            PaymentCategory::Recurring => charged_through(Channel::Recurring, window),
            PaymentCategory::Combined => Filter::or(vec![
                charged_through(Channel::Signup, window),
                charged_through(Channel::Recurring, window),
            ]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitDimension {
    Cadence,
    Tier,
}

/// One day of collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub new_signup_total: i64,
    pub recurring_total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SplitBucket {
    Cadence(BillingCadence),
    Tier(AccessTier),
}

/// Amount collected per bucket of a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenueSplit {
    amounts: Vec<(SplitBucket, i64)>,
}

impl RevenueSplit {
    pub fn new(amounts: Vec<(SplitBucket, i64)>) -> Self {
        RevenueSplit { amounts }
    }

    pub fn total(&self) -> i64 {
        self.amounts.iter().map(|(_, amount)| amount).sum()
    }

    pub fn amount_of(&self, bucket: SplitBucket) -> i64 {
        self.amounts
            .iter()
            .find(|(b, _)| *b == bucket)
            .map_or(0, |(_, amount)| *amount)
    }

    /// Percentages are undefined when nothing was collected.
    pub fn is_defined(&self) -> bool {
        self.total() > 0
    }

    /// Bucket's percentage of the total; `None` when the total is zero.
    pub fn share_of(&self, bucket: SplitBucket) -> Option<f64> {
        let total = self.total();
        if total > 0 {
            Some(self.amount_of(bucket) as f64 / total as f64 * 100.0)
        } else {
            None
        }
    }

    pub fn shares(&self) -> Option<Vec<(SplitBucket, f64)>> {
        if !self.is_defined() {
            return None;
        }
        self.amounts
            .iter()
            .map(|(bucket, _)| self.share_of(*bucket).map(|share| (*bucket, share)))
            .collect()
    }
}

// ============================================================================
// FILTERS
// ============================================================================

fn approved_for(merchant_id: &MerchantId) -> Vec<Filter> {
    vec![
        Filter::eq("merchant_id", merchant_id.as_str()),
        Filter::eq("status", APPROVED),
    ]
}

/// Receipt from `channel`, dated inside the window by that channel's timestamp.
fn charged_through(channel: Channel, window: &MonthWindow) -> Filter {
    Filter::and(vec![
        Filter::in_values("source", channel.sources().iter().copied()),
        Filter::within(channel.date_field(), window),
    ])
}

/// Either timestamp inside the window, regardless of channel.
fn paid_within(window: &MonthWindow) -> Filter {
    Filter::or(vec![
        Filter::within("date_created", window),
        Filter::within("original_payment_date", window),
    ])
}

// ============================================================================
// PAYMENT AGGREGATOR
// ============================================================================

pub struct PaymentAggregator {
    store: Arc<dyn DocumentStore>,
    plans: PlanIndex,
}

impl PaymentAggregator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        PaymentAggregator {
            plans: PlanIndex::new(store.clone()),
            store,
        }
    }

    /// Approved receipts of the merchant matching `category` in `month`.
    pub fn receipts(&self, merchant_id: &MerchantId, month: Month, category: PaymentCategory) -> Result<Vec<Receipt>> {
        let mut conditions = approved_for(merchant_id);
        conditions.push(category.predicate(&month.window()));
        self.fetch(&Filter::and(conditions))
    }

    pub fn sum_amount(&self, merchant_id: &MerchantId, month: Month, category: PaymentCategory) -> Result<i64> {
        let total = self
            .receipts(merchant_id, month, category)?
            .iter()
            .map(Receipt::amount)
            .sum();

        tracing::debug!(
            merchant = %merchant_id,
            month = %month,
            category = category.as_str(),
            total,
            "payment sum"
        );

        Ok(total)
    }

    /// Per-day totals, ascending by date. Days without receipts are omitted.
    pub fn daily_breakdown(&self, merchant_id: &MerchantId, month: Month) -> Result<Vec<DailyTotals>> {
        let mut by_day: BTreeMap<NaiveDate, DailyTotals> = BTreeMap::new();

        for receipt in self.receipts(merchant_id, month, PaymentCategory::Combined)? {
            let Some(channel) = receipt.channel() else {
                continue;
            };
            let Some(dated_at) = receipt.dated_at(channel) else {
                continue;
            };
            let date = dated_at.date();
            let day = by_day.entry(date).or_insert_with(|| DailyTotals {
                date,
                new_signup_total: 0,
                recurring_total: 0,
            });
            match channel {
                Channel::Signup => day.new_signup_total += receipt.amount(),
                Channel::Recurring => day.recurring_total += receipt.amount(),
            }
        }

        Ok(by_day.into_values().collect())
    }

    pub fn revenue_split_by(
        &self,
        merchant_id: &MerchantId,
        month: Month,
        dimension: SplitDimension,
    ) -> Result<RevenueSplit> {
        let split = match dimension {
            SplitDimension::Cadence => self.cadence_split(merchant_id, month)?,
            SplitDimension::Tier => self.tier_split(merchant_id, month)?,
        };

        tracing::debug!(
            merchant = %merchant_id,
            month = %month,
            ?dimension,
            total = split.total(),
            "revenue split"
        );

        Ok(split)
    }

    fn cadence_split(&self, merchant_id: &MerchantId, month: Month) -> Result<RevenueSplit> {
        let buckets = self.plans.plans_by_cadence(merchant_id)?;
        let window = month.window();

        let mut amounts = Vec::with_capacity(BillingCadence::ALL.len());
        for cadence in BillingCadence::ALL {
            let plan_ids = buckets.bucket(cadence);
            let amount = if plan_ids.is_empty() {
                0
            } else {
                let mut conditions = approved_for(merchant_id);
                conditions.push(Filter::in_values("plan_id", plan_ids.iter().cloned()));
                conditions.push(paid_within(&window));
                self.fetch(&Filter::and(conditions))?
                    .iter()
                    .map(Receipt::amount)
                    .sum()
            };
            amounts.push((SplitBucket::Cadence(cadence), amount));
        }

        Ok(RevenueSplit::new(amounts))
    }

    fn tier_split(&self, merchant_id: &MerchantId, month: Month) -> Result<RevenueSplit> {
        let buckets = self.plans.plans_by_tier(merchant_id)?;
        let named = buckets.named_ids();

        let receipts = if named.is_empty() {
            Vec::new()
        } else {
            let mut conditions = approved_for(merchant_id);
            conditions.push(Filter::in_values("plan_id", named));
            conditions.push(paid_within(&month.window()));
            self.fetch(&Filter::and(conditions))?
        };

        let mut amounts: Vec<(SplitBucket, i64)> = AccessTier::ALL
            .iter()
            .map(|tier| (SplitBucket::Tier(*tier), 0))
            .collect();

        for receipt in &receipts {
            let tier = receipt
                .plan_id
                .as_deref()
                .and_then(|plan_id| buckets.classify(plan_id));
            if let Some(tier) = tier {
                if let Some(entry) = amounts.iter_mut().find(|(b, _)| *b == SplitBucket::Tier(tier)) {
                    entry.1 += receipt.amount();
                }
            }
        }

        Ok(RevenueSplit::new(amounts))
    }

    fn fetch(&self, filter: &Filter) -> Result<Vec<Receipt>> {
        self.store
            .find(collections::RECEIPTS, filter)?
            .into_iter()
            .map(|doc| decode(collections::RECEIPTS, doc))
            .collect()
    }
}
