use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// An account on the marketplace. The api_key doubles as the bearer
/// credential; guests have no profile at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Vendor,
    Tourist,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Vendor => "vendor",
            Role::Tourist => "tourist",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "vendor" => Some(Role::Vendor),
            "tourist" => Some(Role::Tourist),
            _ => None,
        }
    }
}
