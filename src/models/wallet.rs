use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Owner of the marketplace's own wallet row.
pub const PLATFORM_WALLET: &str = "platform";

/// Cached running balance. `owner` is a vendor id or [`PLATFORM_WALLET`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub owner: String,
    pub balance: i64,
    pub currency: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Balance figures recomputed from the ledger on every read. These can
/// diverge from the cached `Wallet::balance`; both are reported and neither
/// is treated as authoritative.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WalletStats {
    /// Completed payments whose booking has itself completed.
    pub total_earned: i64,
    /// Completed payments whose booking has not completed yet.
    pub pending_earnings: i64,
    /// Completed withdrawals.
    pub total_withdrawn: i64,
    /// Withdrawals still pending or approved but not yet paid out.
    pub pending_withdrawals: i64,
    /// total_earned - total_withdrawn - pending_withdrawals + pending_earnings
    pub available_balance: i64,
}
