// Receipt Entity - payment records
//
// Only approved receipts count toward any sum. The `source` field tells which
// channel produced the charge, and the channel decides which timestamp dates it:
// - signup charges: date_created
// - recurring charges: original_payment_date

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use super::merchant::MerchantId;
use super::plan::PlanId;
use crate::calendar::{deserialize_optional_timestamp, deserialize_timestamp};

pub const APPROVED: &str = "approved";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Channel {
    Signup,
    Recurring,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Signup, Channel::Recurring];

    /// `source` values belonging to this channel.
    pub fn sources(&self) -> &'static [&'static str] {
        match self {
            Channel::Signup => &["checkout", "checkout3", "checkout_miclub"],
            Channel::Recurring => &["recurring_charges", "recurring_miclub"],
        }
    }

    /// Document field holding the timestamp that dates a charge of this channel.
    pub fn date_field(&self) -> &'static str {
        match self {
            Channel::Signup => "date_created",
            Channel::Recurring => "original_payment_date",
        }
    }

    pub fn of_source(source: &str) -> Option<Channel> {
        Channel::ALL
            .into_iter()
            .find(|channel| channel.sources().contains(&source))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargesDetail {
    #[serde(deserialize_with = "deserialize_amount")]
    pub final_price: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Receipt {
    #[serde(rename = "_id")]
    pub id: String,

    pub merchant_id: MerchantId,

    #[serde(default, deserialize_with = "super::deserialize_blank_as_none")]
    pub plan_id: Option<PlanId>,

    pub source: String,

    pub status: String,

    #[serde(rename = "date_created", deserialize_with = "deserialize_timestamp")]
    pub created_at: NaiveDateTime,

    /// Set only for recurring charges
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub original_payment_date: Option<NaiveDateTime>,

    pub charges_detail: ChargesDetail,
}

impl Receipt {
    pub fn amount(&self) -> i64 {
        self.charges_detail.final_price
    }

    pub fn channel(&self) -> Option<Channel> {
        Channel::of_source(&self.source)
    }

    /// Timestamp that dates this receipt for its channel.
    pub fn dated_at(&self, channel: Channel) -> Option<NaiveDateTime> {
        match channel {
            Channel::Signup => Some(self.created_at),
            Channel::Recurring => self.original_payment_date,
        }
    }
}

/// Integer currency units; integral floats (e.g. `1500.0`) are accepted.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Number::deserialize(deserializer)?;
    if let Some(n) = raw.as_i64() {
        return Ok(n);
    }
    match raw.as_f64() {
        Some(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i64),
        _ => Err(serde::de::Error::custom(format!(
            "amount must be whole currency units, got {}",
            raw
        ))),
    }
}
