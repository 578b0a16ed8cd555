// Composite reports
//
// MetricsEngine ties the aggregators together and produces the four reports
// served over HTTP and printed by the CLI. An unknown merchant is not an error
// here: every report comes back in its empty form, and the boundary decides
// what "empty" means for its callers.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::calendar::Month;
use crate::entities::{AccessTier, BillingCadence, MerchantId, MerchantResolver};
use crate::error::Result;
use crate::lifecycle::{LifecycleAggregator, LifecycleKind};
use crate::payments::{DailyTotals, PaymentAggregator, PaymentCategory, RevenueSplit, SplitBucket, SplitDimension};
use crate::store::DocumentStore;
use crate::variation::{month_over_month, Trend};

/// A report that may carry nothing worth serving.
pub trait Report {
    fn is_empty(&self) -> bool;
}

// ============================================================================
// REPORT TYPES
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthSummary {
    pub active_members: u64,
    pub active_members_variation: f64,
    pub new_members: u64,
    pub new_members_variation: f64,
    pub cancellations: u64,
    pub cancellations_variation: f64,
    pub deactivations_without_cancellation: u64,
    pub deactivations_without_cancellation_variation: f64,
}

impl Report for MonthSummary {
    fn is_empty(&self) -> bool {
        self.active_members == 0
            && self.active_members_variation == 0.0
            && self.new_members == 0
            && self.new_members_variation == 0.0
            && self.cancellations == 0
            && self.cancellations_variation == 0.0
            && self.deactivations_without_cancellation == 0
            && self.deactivations_without_cancellation_variation == 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionsSummary {
    pub total_collected: i64,
    pub total_collected_variation: f64,
    pub recurring_collected: i64,
    pub recurring_collected_variation: f64,
    pub signup_collected: i64,
    pub signup_collected_variation: f64,
}

impl Report for CollectionsSummary {
    fn is_empty(&self) -> bool {
        self.total_collected == 0
            && self.total_collected_variation == 0.0
            && self.recurring_collected == 0
            && self.recurring_collected_variation == 0.0
            && self.signup_collected == 0
            && self.signup_collected_variation == 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCollection {
    #[serde(serialize_with = "serialize_date")]
    pub date: NaiveDate,
    pub new_signup_total: i64,
    pub recurring_total: i64,
}

impl From<DailyTotals> for DailyCollection {
    fn from(day: DailyTotals) -> Self {
        DailyCollection {
            date: day.date,
            new_signup_total: day.new_signup_total,
            recurring_total: day.recurring_total,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DailyCollections {
    pub days: Vec<DailyCollection>,
}

impl Report for DailyCollections {
    fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Percentages of the month's revenue per billing cadence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CadenceShares {
    pub monthly: f64,
    pub annual: f64,
}

/// Percentages of the month's revenue per access tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierShares {
    pub local: f64,
    pub plus: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RevenueShare {
    /// `None` when nothing was collected for any cadence
    pub by_cadence: Option<CadenceShares>,
    pub by_tier: Option<TierShares>,
}

impl Report for RevenueShare {
    fn is_empty(&self) -> bool {
        self.by_cadence.is_none() && self.by_tier.is_none()
    }
}

impl CadenceShares {
    fn from_split(split: &RevenueSplit) -> Option<Self> {
        Some(CadenceShares {
            monthly: split.share_of(SplitBucket::Cadence(BillingCadence::Monthly))?,
            annual: split.share_of(SplitBucket::Cadence(BillingCadence::Annual))?,
        })
    }
}

impl TierShares {
    fn from_split(split: &RevenueSplit) -> Option<Self> {
        Some(TierShares {
            local: split.share_of(SplitBucket::Tier(AccessTier::Local))?,
            plus: split.share_of(SplitBucket::Tier(AccessTier::Plus))?,
            total: split.share_of(SplitBucket::Tier(AccessTier::Total))?,
        })
    }
}

fn serialize_date<S: Serializer>(date: &NaiveDate, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
}

// ============================================================================
// METRICS ENGINE
// ============================================================================

pub struct MetricsEngine {
    merchants: MerchantResolver,
    lifecycle: LifecycleAggregator,
    payments: PaymentAggregator,
}

impl MetricsEngine {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        MetricsEngine {
            merchants: MerchantResolver::new(store.clone()),
            lifecycle: LifecycleAggregator::new(store.clone()),
            payments: PaymentAggregator::new(store),
        }
    }

    pub fn month_summary(&self, merchant: &str, month: Month) -> Result<MonthSummary> {
        let Some(merchant_id) = self.known_merchant(merchant)? else {
            return Ok(MonthSummary::default());
        };

        let trend = |kind: LifecycleKind| -> Result<Trend<u64>> {
            month_over_month(month, |m| self.lifecycle.count(&merchant_id, m, kind))
        };

        let active = trend(LifecycleKind::Active)?;
        let new = trend(LifecycleKind::New)?;
        let cancelled = trend(LifecycleKind::Cancelled)?;
        let deactivated = trend(LifecycleKind::DeactivatedNoCancel)?;

        Ok(MonthSummary {
            active_members: active.current,
            active_members_variation: active.percent_change,
            new_members: new.current,
            new_members_variation: new.percent_change,
            cancellations: cancelled.current,
            cancellations_variation: cancelled.percent_change,
            deactivations_without_cancellation: deactivated.current,
            deactivations_without_cancellation_variation: deactivated.percent_change,
        })
    }

    pub fn collections_summary(&self, merchant: &str, month: Month) -> Result<CollectionsSummary> {
        let Some(merchant_id) = self.known_merchant(merchant)? else {
            return Ok(CollectionsSummary::default());
        };

        let trend = |category: PaymentCategory| -> Result<Trend<i64>> {
            month_over_month(month, |m| self.payments.sum_amount(&merchant_id, m, category))
        };

        let total = trend(PaymentCategory::Combined)?;
        let recurring = trend(PaymentCategory::Recurring)?;
        let signup = trend(PaymentCategory::NewSignup)?;

        Ok(CollectionsSummary {
            total_collected: total.current,
            total_collected_variation: total.percent_change,
            recurring_collected: recurring.current,
            recurring_collected_variation: recurring.percent_change,
            signup_collected: signup.current,
            signup_collected_variation: signup.percent_change,
        })
    }

    pub fn daily_collections(&self, merchant: &str, month: Month) -> Result<DailyCollections> {
        let Some(merchant_id) = self.known_merchant(merchant)? else {
            return Ok(DailyCollections::default());
        };

        let days = self
            .payments
            .daily_breakdown(&merchant_id, month)?
            .into_iter()
            .map(DailyCollection::from)
            .collect();

        Ok(DailyCollections { days })
    }

    pub fn revenue_share(&self, merchant: &str, month: Month) -> Result<RevenueShare> {
        let Some(merchant_id) = self.known_merchant(merchant)? else {
            return Ok(RevenueShare::default());
        };

        let cadence = self
            .payments
            .revenue_split_by(&merchant_id, month, SplitDimension::Cadence)?;
        let tier = self
            .payments
            .revenue_split_by(&merchant_id, month, SplitDimension::Tier)?;

        Ok(RevenueShare {
            by_cadence: CadenceShares::from_split(&cadence),
            by_tier: TierShares::from_split(&tier),
        })
    }

    fn known_merchant(&self, name: &str) -> Result<Option<MerchantId>> {
        let merchant_id = self.merchants.lookup(name)?;
        if merchant_id.is_none() {
            tracing::warn!(merchant = name, "unknown merchant, reporting empty result");
        }
        Ok(merchant_id)
    }
}
