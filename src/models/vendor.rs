use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    pub id: String,
    pub profile_id: String,
    pub business_name: String,
    pub description: Option<String>,
    pub status: VendorStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VendorStatus {
    Pending,
    Approved,
    Suspended,
    Rejected,
}

impl VendorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorStatus::Pending => "pending",
            VendorStatus::Approved => "approved",
            VendorStatus::Suspended => "suspended",
            VendorStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(VendorStatus::Pending),
            "approved" => Some(VendorStatus::Approved),
            "suspended" => Some(VendorStatus::Suspended),
            "rejected" => Some(VendorStatus::Rejected),
            _ => None,
        }
    }
}
