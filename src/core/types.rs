use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single monetary event as accepted by the aggregator.
///
/// Only the amount and the instant matter; once folded into a bucket the
/// transaction itself is not kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub amount: f64,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl Transaction {
    pub fn new(amount: f64, timestamp: i64) -> Self {
        Self { amount, timestamp }
    }

    /// Parse and validate a JSON request body
    pub fn from_json(bytes: &[u8]) -> Result<Self, TransactionError> {
        let request: TransactionRequest = serde_json::from_slice(bytes)?;
        Self::try_from(request)
    }
}

/// Wire shape of `POST /transactions`. Both fields are optional here so that
/// a missing field is reported as such instead of a generic decode error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionRequest {
    pub amount: Option<f64>,
    pub timestamp: Option<i64>,
}

impl TryFrom<TransactionRequest> for Transaction {
    type Error = TransactionError;

    fn try_from(request: TransactionRequest) -> Result<Self, Self::Error> {
        let amount = request.amount.ok_or(TransactionError::MissingField("amount"))?;
        let timestamp = request
            .timestamp
            .ok_or(TransactionError::MissingField("timestamp"))?;

        if !amount.is_finite() {
            return Err(TransactionError::NonFiniteAmount(amount));
        }

        Ok(Transaction { amount, timestamp })
    }
}

/// Structurally invalid transaction input
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Required field missing: {0}")]
    MissingField(&'static str),

    #[error("Amount must be a finite number, got {0}")]
    NonFiniteAmount(f64),
}

/// Outcome of offering a transaction to the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Accepted,
    /// Timestamp is not within the last 60 seconds; nothing was recorded
    OutOfWindow,
}

impl RecordOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RecordOutcome::Accepted)
    }
}

/// Aggregate over every transaction currently inside the window.
///
/// An empty window reports zero for every field, `min` and `max` included.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub sum: f64,
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    pub count: u64,
}
