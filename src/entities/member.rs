// Member Entity - a member and the append-only history of lifecycle events

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::plan::PlanId;
use crate::calendar::deserialize_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEventType {
    #[serde(rename = "alta")]
    Signup,

    #[serde(rename = "baja")]
    Cancellation,

    #[serde(rename = "inactivacion")]
    Deactivation,
}

impl LifecycleEventType {
    /// Value persisted in the `event` field.
    pub fn stored_name(&self) -> &'static str {
        match self {
            LifecycleEventType::Signup => "alta",
            LifecycleEventType::Cancellation => "baja",
            LifecycleEventType::Deactivation => "inactivacion",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleEvent {
    #[serde(rename = "event")]
    pub event_type: LifecycleEventType,

    #[serde(rename = "date_created", deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,

    #[serde(rename = "plan")]
    pub plan_id: PlanId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    #[serde(rename = "_id")]
    pub id: String,

    /// Chronological, append-only
    #[serde(default)]
    pub history: Vec<LifecycleEvent>,
}
