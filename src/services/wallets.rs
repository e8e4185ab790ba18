use rusqlite::Connection;

use crate::db::queries;
use crate::models::WalletStats;

/// Add `amount` to a wallet's cached balance, creating a zero-balance row
/// first if the owner has none. Returns the new balance.
pub fn credit(conn: &Connection, owner: &str, amount: i64, currency: &str) -> anyhow::Result<i64> {
    queries::adjust_wallet_balance(conn, owner, amount, currency)
}

/// Mirror of [`credit`]. No overdraft guard; callers validate against the
/// recomputed available balance before requesting withdrawals.
pub fn debit(conn: &Connection, owner: &str, amount: i64, currency: &str) -> anyhow::Result<i64> {
    queries::adjust_wallet_balance(conn, owner, -amount, currency)
}

/// Recompute a vendor's earnings picture from the ledger.
///
/// Completed payments are partitioned by whether their booking has reached
/// `completed`: earnings on finished bookings count as earned, the rest as
/// pending. Withdrawals split the same way on their own status. The derived
/// `available_balance` can diverge from the cached wallet balance; callers
/// surface both rather than picking one.
pub fn compute_stats(conn: &Connection, vendor_id: &str) -> anyhow::Result<WalletStats> {
    let ledger = queries::get_vendor_ledger(conn, vendor_id)?;

    let mut stats = WalletStats::default();
    for row in &ledger {
        match (row.transaction_type.as_str(), row.status.as_str()) {
            ("payment", "completed") => {
                if row.booking_status.as_deref() == Some("completed") {
                    stats.total_earned += row.amount;
                } else {
                    stats.pending_earnings += row.amount;
                }
            }
            ("withdrawal", "completed") => stats.total_withdrawn += row.amount,
            ("withdrawal", "pending") | ("withdrawal", "approved") => {
                stats.pending_withdrawals += row.amount;
            }
            _ => {}
        }
    }

    stats.available_balance = stats.total_earned - stats.total_withdrawn
        - stats.pending_withdrawals
        + stats.pending_earnings;
    Ok(stats)
}

/// Stats with the degraded fallback: any failure logs a warning and yields
/// zeroed stats so one bad sub-query never blanks a vendor's dashboard.
pub fn stats_or_default(conn: &Connection, vendor_id: &str) -> WalletStats {
    match compute_stats(conn, vendor_id) {
        Ok(stats) => stats,
        Err(e) => {
            tracing::warn!(vendor_id, error = %e, "wallet stats unavailable, returning zeroed stats");
            WalletStats::default()
        }
    }
}
