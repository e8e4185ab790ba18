use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::models::{
    Booking, PaymentStatus, Transaction, TransactionStatus, TransactionType, PLATFORM_WALLET,
};
use crate::services::wallets;

fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn short_id(id: &str) -> &str {
    &id[..id.len().min(8)]
}

pub fn payment_reference(booking_id: &str) -> String {
    format!("PMT_{}_{}", short_id(booking_id), epoch_millis())
}

pub fn refund_reference(booking_id: &str) -> String {
    format!("RFD_{}_{}", short_id(booking_id), epoch_millis())
}

pub fn withdrawal_reference(vendor_id: &str) -> String {
    format!("WDR_{}_{}", short_id(vendor_id), epoch_millis())
}

/// Ensure a settled booking has its completed payment ledger row, writing it
/// and crediting the vendor and platform wallets when it is missing. Returns
/// true when a new row was created. Safe to call on every update: the probe
/// plus `INSERT OR IGNORE` under the one-completed-payment-per-booking index
/// make repeats a no-op.
pub fn ensure_payment_recorded(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    if queries::find_completed_transaction(conn, &booking.id, &TransactionType::Payment)?.is_some()
    {
        return Ok(false);
    }

    let now = Utc::now().naive_utc();
    let tx = Transaction {
        id: Uuid::new_v4().to_string(),
        booking_id: Some(booking.id.clone()),
        vendor_id: Some(booking.vendor_id.clone()),
        tourist_id: booking.tourist_id.clone(),
        transaction_type: TransactionType::Payment,
        status: TransactionStatus::Completed,
        amount: booking.total_amount,
        currency: booking.currency.clone(),
        reference: payment_reference(&booking.id),
        description: Some(format!("Payment for booking {}", booking.id)),
        created_at: now,
        updated_at: now,
    };

    if !queries::insert_transaction(conn, &tx)? {
        // Lost the race against a concurrent settlement of the same booking.
        return Ok(false);
    }

    wallets::credit(conn, &booking.vendor_id, booking.total_amount, &booking.currency)?;
    wallets::credit(conn, PLATFORM_WALLET, booking.total_amount, &booking.currency)?;

    tracing::info!(
        booking_id = %booking.id,
        vendor_id = %booking.vendor_id,
        amount = booking.total_amount,
        reference = %tx.reference,
        "recorded payment for settled booking"
    );
    Ok(true)
}

/// Refund mirror of [`ensure_payment_recorded`]: once a refunded booking has
/// a completed payment on the ledger, write exactly one completed refund row
/// and debit the vendor and platform wallets. A refunded booking that was
/// never paid gets no refund row.
pub fn ensure_refund_recorded(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    if queries::find_completed_transaction(conn, &booking.id, &TransactionType::Payment)?.is_none()
    {
        return Ok(false);
    }
    if queries::find_completed_transaction(conn, &booking.id, &TransactionType::Refund)?.is_some()
    {
        return Ok(false);
    }

    let now = Utc::now().naive_utc();
    let tx = Transaction {
        id: Uuid::new_v4().to_string(),
        booking_id: Some(booking.id.clone()),
        vendor_id: Some(booking.vendor_id.clone()),
        tourist_id: booking.tourist_id.clone(),
        transaction_type: TransactionType::Refund,
        status: TransactionStatus::Completed,
        amount: booking.total_amount,
        currency: booking.currency.clone(),
        reference: refund_reference(&booking.id),
        description: Some(format!("Refund for booking {}", booking.id)),
        created_at: now,
        updated_at: now,
    };

    if !queries::insert_transaction(conn, &tx)? {
        return Ok(false);
    }

    wallets::debit(conn, &booking.vendor_id, booking.total_amount, &booking.currency)?;
    wallets::debit(conn, PLATFORM_WALLET, booking.total_amount, &booking.currency)?;

    tracing::info!(
        booking_id = %booking.id,
        vendor_id = %booking.vendor_id,
        amount = booking.total_amount,
        reference = %tx.reference,
        "recorded refund for booking"
    );
    Ok(true)
}

/// Run the ledger and wallet side effects owed for a booking's current
/// state. Runs after every state update, not just on the transition edge.
/// A database without the payment tables logs a warning and leaves the
/// booking update itself intact.
pub fn apply_settlement_effects(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    let outcome = if booking.is_settled() {
        ensure_payment_recorded(conn, booking).map(|_| ())
    } else if booking.payment_status == PaymentStatus::Refunded {
        ensure_refund_recorded(conn, booking).map(|_| ())
    } else {
        Ok(())
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(e) if queries::is_missing_table(&e) => {
            tracing::warn!(
                booking_id = %booking.id,
                error = %e,
                "payment tables missing, skipping ledger side effects"
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug)]
pub enum WithdrawalError {
    Storage(anyhow::Error),
    NonPositiveAmount,
    ExceedsAvailable { available: i64 },
    NotAWithdrawal,
    AlreadyFinal { status: TransactionStatus },
    InvalidTarget { status: TransactionStatus },
}

impl std::fmt::Display for WithdrawalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WithdrawalError::Storage(e) => write!(f, "{e}"),
            WithdrawalError::NonPositiveAmount => {
                write!(f, "withdrawal amount must be positive")
            }
            WithdrawalError::ExceedsAvailable { available } => {
                write!(f, "withdrawal amount exceeds available balance ({available})")
            }
            WithdrawalError::NotAWithdrawal => {
                write!(f, "transaction is not a withdrawal")
            }
            WithdrawalError::AlreadyFinal { status } => {
                write!(f, "withdrawal is already {}", status.as_str())
            }
            WithdrawalError::InvalidTarget { status } => {
                write!(f, "cannot move a withdrawal to {}", status.as_str())
            }
        }
    }
}

impl From<anyhow::Error> for WithdrawalError {
    fn from(e: anyhow::Error) -> Self {
        WithdrawalError::Storage(e)
    }
}

/// Open a pending withdrawal for a vendor. The amount is validated against
/// the recomputed available balance, not the cached wallet balance.
pub fn request_withdrawal(
    conn: &Connection,
    vendor_id: &str,
    amount: i64,
    currency: &str,
    description: Option<String>,
) -> Result<Transaction, WithdrawalError> {
    if amount <= 0 {
        return Err(WithdrawalError::NonPositiveAmount);
    }

    let stats = wallets::compute_stats(conn, vendor_id)?;
    if amount > stats.available_balance {
        return Err(WithdrawalError::ExceedsAvailable {
            available: stats.available_balance,
        });
    }

    let now = Utc::now().naive_utc();
    let tx = Transaction {
        id: Uuid::new_v4().to_string(),
        booking_id: None,
        vendor_id: Some(vendor_id.to_string()),
        tourist_id: None,
        transaction_type: TransactionType::Withdrawal,
        status: TransactionStatus::Pending,
        amount,
        currency: currency.to_string(),
        reference: withdrawal_reference(vendor_id),
        description,
        created_at: now,
        updated_at: now,
    };
    queries::insert_transaction(conn, &tx)?;

    tracing::info!(
        vendor_id,
        amount,
        reference = %tx.reference,
        "withdrawal requested"
    );
    Ok(tx)
}

/// Move a withdrawal to an admin decision. Completing debits the vendor
/// wallet; completed and rejected are terminal, so a second completion
/// attempt errors instead of debiting twice.
pub fn decide_withdrawal(
    conn: &Connection,
    transaction_id: &str,
    target: TransactionStatus,
) -> Result<Option<Transaction>, WithdrawalError> {
    let Some(tx) = queries::get_transaction(conn, transaction_id)? else {
        return Ok(None);
    };

    if tx.transaction_type != TransactionType::Withdrawal {
        return Err(WithdrawalError::NotAWithdrawal);
    }
    if matches!(
        tx.status,
        TransactionStatus::Completed | TransactionStatus::Rejected
    ) {
        return Err(WithdrawalError::AlreadyFinal { status: tx.status });
    }
    if !matches!(
        target,
        TransactionStatus::Approved | TransactionStatus::Rejected | TransactionStatus::Completed
    ) {
        return Err(WithdrawalError::InvalidTarget { status: target });
    }

    queries::update_transaction_status(conn, transaction_id, &target)?;

    if target == TransactionStatus::Completed {
        if let Some(vendor_id) = &tx.vendor_id {
            wallets::debit(conn, vendor_id, tx.amount, &tx.currency)?;
            tracing::info!(
                vendor_id = %vendor_id,
                amount = tx.amount,
                reference = %tx.reference,
                "withdrawal completed, wallet debited"
            );
        }
    }

    Ok(queries::get_transaction(conn, transaction_id)?)
}
