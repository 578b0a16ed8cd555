// Membership Metrics - Core Library
// Exposes the engine for the CLI, the API server, and tests

pub mod calendar;
pub mod config;
pub mod entities;
pub mod error;
pub mod lifecycle;
pub mod payments;
pub mod reports;
pub mod store;
pub mod variation;

#[cfg(feature = "server")]
pub mod api;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use calendar::{horizon, Month, MonthWindow};
pub use config::MetricsConfig;
pub use entities::{
    AccessTier, BillingCadence, Channel, LifecycleEventType, Member, Merchant, MerchantId,
    MerchantResolver, Plan, PlanIndex, Receipt,
};
pub use error::{MetricsError, Result};
pub use lifecycle::{LifecycleAggregator, LifecycleKind};
pub use payments::{DailyTotals, PaymentAggregator, PaymentCategory, RevenueSplit, SplitBucket, SplitDimension};
pub use reports::{
    CadenceShares, CollectionsSummary, DailyCollection, DailyCollections, MetricsEngine,
    MonthSummary, Report, RevenueShare, TierShares,
};
pub use store::{collections, DocumentStore, Filter, ImportSummary, MemoryStore, SqliteStore};
pub use variation::{month_over_month, percent_change, Trend};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
