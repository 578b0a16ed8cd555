// Entity Models - read-only views of the platform's documents
//
// Each entity decodes from its collection's document layout. Resolvers and
// indexes on top of them answer the lookups the aggregators need:
// - MerchantResolver: merchant name -> id
// - PlanIndex: merchant -> plan ids, bucketed by cadence and access tier

pub mod member;
pub mod merchant;
pub mod plan;
pub mod receipt;

pub use member::{LifecycleEvent, LifecycleEventType, Member};
pub use merchant::{Merchant, MerchantId, MerchantResolver};
pub use plan::{AccessTier, BillingCadence, CadenceBuckets, Plan, PlanId, PlanIndex, TierBuckets};
pub use receipt::{Channel, Receipt};

use serde::{Deserialize, Deserializer};

/// Treat absent, null, and blank strings alike.
pub(crate) fn deserialize_blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.trim().is_empty()))
}
