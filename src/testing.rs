// Fixture builders for unit tests

use std::sync::Arc;

use serde_json::{json, Value};

use crate::store::{collections, MemoryStore};

pub fn merchant(id: &str, name: &str) -> Value {
    json!({ "_id": id, "name": name })
}

pub fn plan(id: &str, merchant_id: &str, cadence: &str, tier: Option<&str>, alias: Option<&str>) -> Value {
    let mut doc = json!({ "_id": id, "merchant_id": merchant_id, "cobro": cadence });
    if let Some(tier) = tier {
        doc["nivel_de_acceso"] = json!(tier);
    }
    if let Some(alias) = alias {
        doc["sede_local"] = json!(alias);
    }
    doc
}

/// `(event, timestamp, plan)` triples, e.g. `("alta", "2023-03-05T10:00:00", "p1")`.
pub fn member(id: &str, events: &[(&str, &str, &str)]) -> Value {
    let history: Vec<Value> = events
        .iter()
        .map(|(event, ts, plan)| json!({ "event": event, "date_created": ts, "plan": plan }))
        .collect();
    json!({ "_id": id, "history": history })
}

pub fn signup_receipt(id: &str, merchant_id: &str, plan_id: &str, created: &str, amount: i64) -> Value {
    json!({
        "_id": id,
        "merchant_id": merchant_id,
        "plan_id": plan_id,
        "source": "checkout",
        "status": "approved",
        "date_created": created,
        "charges_detail": { "final_price": amount }
    })
}

pub fn recurring_receipt(
    id: &str,
    merchant_id: &str,
    plan_id: &str,
    created: &str,
    original_payment: &str,
    amount: i64,
) -> Value {
    json!({
        "_id": id,
        "merchant_id": merchant_id,
        "plan_id": plan_id,
        "source": "recurring_charges",
        "status": "approved",
        "date_created": created,
        "original_payment_date": original_payment,
        "charges_detail": { "final_price": amount }
    })
}

/// Store with merchant GymA (`m-a`), GymB (`m-b`), and the given documents.
pub struct Fixture {
    pub store: MemoryStore,
}

impl Fixture {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        store
            .insert_many(
                collections::MERCHANTS,
                vec![merchant("m-a", "GymA"), merchant("m-b", "GymB")],
            )
            .unwrap();
        Fixture { store }
    }

    pub fn plans(self, docs: Vec<Value>) -> Self {
        self.store.insert_many(collections::PLANS, docs).unwrap();
        self
    }

    pub fn members(self, docs: Vec<Value>) -> Self {
        self.store.insert_many(collections::MEMBERS, docs).unwrap();
        self
    }

    pub fn receipts(self, docs: Vec<Value>) -> Self {
        self.store.insert_many(collections::RECEIPTS, docs).unwrap();
        self
    }

    pub fn shared(&self) -> Arc<MemoryStore> {
        Arc::new(self.store.clone())
    }
}
