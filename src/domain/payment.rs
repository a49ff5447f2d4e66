use super::machine::PaymentStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A strictly positive payment amount, in the provider's fixed currency unit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("amount must be positive, got {0}")]
pub struct InvalidAmount(pub Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, InvalidAmount> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(InvalidAmount(value))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = InvalidAmount;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Provider-assigned payment identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub String);

/// Provider-assigned blockchain transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(pub String);

impl From<&str> for PaymentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for TxId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local handle distinguishing one purchase from the next within a session.
///
/// Callbacks carry the ticket of the purchase they were issued for, so a late
/// callback from an earlier purchase can never touch the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PaymentTicket(pub u64);

impl fmt::Display for PaymentTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the caller asks the provider to charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentData {
    pub amount: Amount,
    /// Public note shown in the wallet.
    pub memo: String,
    /// Opaque to this client; only the backend interprets it.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl PaymentData {
    pub fn new(amount: Amount, memo: impl Into<String>) -> Self {
        Self {
            amount,
            memo: memo.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The single in-flight payment attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    pub ticket: PaymentTicket,
    pub data: PaymentData,
    pub payment_id: Option<PaymentId>,
    pub txid: Option<TxId>,
    pub status: PaymentStatus,
}

impl PaymentRequest {
    /// An unsubmitted request. See [`PaymentRequest::submit`].
    pub fn new(ticket: PaymentTicket, data: PaymentData) -> Self {
        Self {
            ticket,
            data,
            payment_id: None,
            txid: None,
            status: PaymentStatus::Idle,
        }
    }
}

/// Provider-side progress flags of a payment reported as incomplete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompletePaymentStatus {
    pub developer_approved: bool,
    pub transaction_verified: bool,
    pub developer_completed: bool,
    pub cancelled: bool,
    pub user_cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteTransaction {
    pub txid: TxId,
    pub verified: bool,
}

/// A payment from an earlier session that the provider still considers open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncompletePayment {
    pub identifier: PaymentId,
    pub amount: Amount,
    pub memo: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub status: IncompletePaymentStatus,
    #[serde(default)]
    pub transaction: Option<IncompleteTransaction>,
}
