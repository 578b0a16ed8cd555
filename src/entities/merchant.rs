// Merchant Entity - tenant businesses, looked up by exact name

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};
use crate::store::{collections, decode, DocumentStore, Filter};

/// Internal merchant identifier (the merchant document's `_id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerchantId(String);

impl MerchantId {
    pub fn new(id: impl Into<String>) -> Self {
        MerchantId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MerchantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merchant {
    #[serde(rename = "_id")]
    pub id: MerchantId,
    pub name: String,
}

// ============================================================================
// MERCHANT RESOLVER
// ============================================================================

pub struct MerchantResolver {
    store: Arc<dyn DocumentStore>,
}

impl MerchantResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        MerchantResolver { store }
    }

    /// Find the merchant whose name matches exactly (case-sensitive).
    pub fn lookup(&self, name: &str) -> Result<Option<MerchantId>> {
        let doc = self
            .store
            .find_one(collections::MERCHANTS, &Filter::eq("name", name))?;

        match doc {
            Some(doc) => {
                let merchant: Merchant = decode(collections::MERCHANTS, doc)?;
                Ok(Some(merchant.id))
            }
            None => Ok(None),
        }
    }

    /// Like `lookup`, but an unknown name is a `MerchantNotFound` error.
    pub fn resolve(&self, name: &str) -> Result<MerchantId> {
        self.lookup(name)?
            .ok_or_else(|| MetricsError::MerchantNotFound(name.to_string()))
    }
}
