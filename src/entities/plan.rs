// Plan Entity + Plan Index
//
// A plan may carry a "local site" alias: a second plan id that refers to the
// same product. Receipts reference either id, so every bucket the index builds
// holds both addresses of each plan.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use super::merchant::MerchantId;
use crate::error::Result;
use crate::store::{collections, decode, DocumentStore, Filter};

pub type PlanId = String;

// ============================================================================
// CADENCE & TIER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BillingCadence {
    #[serde(rename = "Mensual", alias = "Monthly")]
    Monthly,

    #[serde(rename = "Anual", alias = "Annual")]
    Annual,
}

impl BillingCadence {
    pub const ALL: [BillingCadence; 2] = [BillingCadence::Monthly, BillingCadence::Annual];

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCadence::Monthly => "Monthly",
            BillingCadence::Annual => "Annual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessTier {
    Local,
    Plus,
    Total,
}

impl AccessTier {
    /// Classification order: first match wins.
    pub const ALL: [AccessTier; 3] = [AccessTier::Local, AccessTier::Plus, AccessTier::Total];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessTier::Local => "Local",
            AccessTier::Plus => "Plus",
            AccessTier::Total => "Total",
        }
    }

    fn from_stored(raw: &str) -> Option<AccessTier> {
        AccessTier::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

// ============================================================================
// PLAN ENTITY
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Plan {
    #[serde(rename = "_id")]
    pub id: PlanId,

    pub merchant_id: MerchantId,

    #[serde(rename = "cobro")]
    pub cadence: BillingCadence,

    /// Absent, blank, or unrecognized tiers are unset
    #[serde(rename = "nivel_de_acceso", default, deserialize_with = "deserialize_tier")]
    pub access_tier: Option<AccessTier>,

    #[serde(
        rename = "sede_local",
        default,
        deserialize_with = "super::deserialize_blank_as_none"
    )]
    pub local_site_alias: Option<PlanId>,
}

impl Plan {
    /// The plan's own id plus its alias, when present and distinct.
    pub fn identity_set(&self) -> Vec<PlanId> {
        let mut ids = vec![self.id.clone()];
        if let Some(alias) = &self.local_site_alias {
            if alias != &self.id {
                ids.push(alias.clone());
            }
        }
        ids
    }
}

fn deserialize_tier<'de, D>(deserializer: D) -> std::result::Result<Option<AccessTier>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .as_deref()
        .and_then(AccessTier::from_stored))
}

/// Append the plan's identity set to a bucket, skipping ids already present.
fn add_identity(bucket: &mut Vec<PlanId>, plan: &Plan) {
    for id in plan.identity_set() {
        if !bucket.contains(&id) {
            bucket.push(id);
        }
    }
}

// ============================================================================
// BUCKETS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CadenceBuckets {
    pub monthly: Vec<PlanId>,
    pub annual: Vec<PlanId>,
}

impl CadenceBuckets {
    pub fn bucket(&self, cadence: BillingCadence) -> &[PlanId] {
        match cadence {
            BillingCadence::Monthly => &self.monthly,
            BillingCadence::Annual => &self.annual,
        }
    }

    fn bucket_mut(&mut self, cadence: BillingCadence) -> &mut Vec<PlanId> {
        match cadence {
            BillingCadence::Monthly => &mut self.monthly,
            BillingCadence::Annual => &mut self.annual,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TierBuckets {
    pub local: Vec<PlanId>,
    pub plus: Vec<PlanId>,
    pub total: Vec<PlanId>,
    /// Plans with no access tier; never part of a tier split
    pub unset: Vec<PlanId>,
}

impl TierBuckets {
    pub fn bucket(&self, tier: Option<AccessTier>) -> &[PlanId] {
        match tier {
            Some(AccessTier::Local) => &self.local,
            Some(AccessTier::Plus) => &self.plus,
            Some(AccessTier::Total) => &self.total,
            None => &self.unset,
        }
    }

    fn bucket_mut(&mut self, tier: Option<AccessTier>) -> &mut Vec<PlanId> {
        match tier {
            Some(AccessTier::Local) => &mut self.local,
            Some(AccessTier::Plus) => &mut self.plus,
            Some(AccessTier::Total) => &mut self.total,
            None => &mut self.unset,
        }
    }

    /// First named tier (Local, Plus, Total) whose bucket holds `plan_id`.
    pub fn classify(&self, plan_id: &str) -> Option<AccessTier> {
        AccessTier::ALL
            .into_iter()
            .find(|tier| self.bucket(Some(*tier)).iter().any(|id| id == plan_id))
    }

    /// Every id in the three named tiers.
    pub fn named_ids(&self) -> Vec<PlanId> {
        let mut ids = Vec::new();
        for id in self.local.iter().chain(&self.plus).chain(&self.total) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

// ============================================================================
// PLAN INDEX
// ============================================================================

pub struct PlanIndex {
    store: Arc<dyn DocumentStore>,
}

impl PlanIndex {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        PlanIndex { store }
    }

    /// All plans of a merchant, in storage order.
    pub fn plans(&self, merchant_id: &MerchantId) -> Result<Vec<Plan>> {
        self.store
            .find(
                collections::PLANS,
                &Filter::eq("merchant_id", merchant_id.as_str()),
            )?
            .into_iter()
            .map(|doc| decode(collections::PLANS, doc))
            .collect()
    }

    /// Own ids of the merchant's plans (aliases not included).
    pub fn plan_ids(&self, merchant_id: &MerchantId) -> Result<Vec<PlanId>> {
        Ok(self.plans(merchant_id)?.into_iter().map(|plan| plan.id).collect())
    }

    pub fn plans_by_cadence(&self, merchant_id: &MerchantId) -> Result<CadenceBuckets> {
        let mut buckets = CadenceBuckets::default();
        for plan in self.plans(merchant_id)? {
            add_identity(buckets.bucket_mut(plan.cadence), &plan);
        }
        Ok(buckets)
    }

    pub fn plans_by_tier(&self, merchant_id: &MerchantId) -> Result<TierBuckets> {
        let mut buckets = TierBuckets::default();
        for plan in self.plans(merchant_id)? {
            add_identity(buckets.bucket_mut(plan.access_tier), &plan);
        }
        Ok(buckets)
    }
}
