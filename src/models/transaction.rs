use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One ledger entry. Payments and refunds are inserted already completed and
/// never change; withdrawal rows move through the admin approval statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub booking_id: Option<String>,
    pub vendor_id: Option<String>,
    pub tourist_id: Option<String>,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: i64,
    pub currency: String,
    pub reference: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Payment,
    Withdrawal,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payment => "payment",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Refund => "refund",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payment" => Some(TransactionType::Payment),
            "withdrawal" => Some(TransactionType::Withdrawal),
            "refund" => Some(TransactionType::Refund),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Completed,
    Failed,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "approved" => Some(TransactionStatus::Approved),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            "rejected" => Some(TransactionStatus::Rejected),
            _ => None,
        }
    }
}
