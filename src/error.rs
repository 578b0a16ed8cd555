// Error taxonomy for the metrics engine
//
// Aggregators never fail for "no matching records". Only malformed input,
// malformed stored documents, and store failures surface as errors.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, MetricsError>;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("merchant not found: {0}")]
    MerchantNotFound(String),

    #[error("malformed month '{0}': expected MM-YYYY")]
    MalformedMonth(String),

    #[error("malformed document in '{collection}': {reason}")]
    MalformedDocument { collection: String, reason: String },

    #[error("config: {0}")]
    Config(String),

    #[error("store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl MetricsError {
    pub fn malformed(collection: &str, reason: impl ToString) -> Self {
        MetricsError::MalformedDocument {
            collection: collection.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, MetricsError::MalformedMonth(_))
    }
}
