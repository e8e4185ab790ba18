use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::models::{Transaction, TransactionStatus, TransactionType};
use crate::services::payments;

/// Backfill the ledger for settled bookings that have no completed payment
/// transaction yet, optionally for one vendor. Returns how many rows were
/// created. Best-effort: a failure on one booking is logged and the sweep
/// moves on. Wallets are deliberately left alone; the sweep repairs the
/// ledger, not balances.
pub fn run_sweep(conn: &Connection, vendor_id: Option<&str>) -> anyhow::Result<u32> {
    let bookings = queries::list_settled_bookings(conn, vendor_id)?;

    let mut created = 0u32;
    for booking in &bookings {
        match backfill_booking(conn, booking) {
            Ok(true) => created += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    booking_id = %booking.id,
                    error = %e,
                    "reconciliation skipped booking"
                );
            }
        }
    }

    tracing::info!(
        scanned = bookings.len(),
        created,
        vendor_id = vendor_id.unwrap_or("all"),
        "reconciliation sweep finished"
    );
    Ok(created)
}

fn backfill_booking(conn: &Connection, booking: &crate::models::Booking) -> anyhow::Result<bool> {
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
        reference: payments::payment_reference(&booking.id),
        description: Some(format!("Reconciled payment for booking {}", booking.id)),
        created_at: now,
        updated_at: now,
    };
    queries::insert_transaction(conn, &tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{BookingStatus, PaymentStatus};
    use crate::testutil;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    #[test]
    fn test_sweep_backfills_settled_bookings() {
        let conn = setup_db();
        testutil::seed_vendor(&conn, "v1");
        testutil::seed_vendor(&conn, "v2");
        testutil::insert_booking(
            &conn,
            "b1",
            "v1",
            BookingStatus::Confirmed,
            PaymentStatus::Paid,
            80000,
        );
        testutil::insert_booking(
            &conn,
            "b2",
            "v1",
            BookingStatus::Pending,
            PaymentStatus::Pending,
            80000,
        );
        testutil::insert_booking(
            &conn,
            "b3",
            "v2",
            BookingStatus::Confirmed,
            PaymentStatus::Paid,
            80000,
        );

        assert_eq!(run_sweep(&conn, None).unwrap(), 2);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_second_sweep_creates_nothing() {
        let conn = setup_db();
        testutil::seed_vendor(&conn, "v1");
        testutil::insert_booking(
            &conn,
            "b1",
            "v1",
            BookingStatus::Confirmed,
            PaymentStatus::Paid,
            80000,
        );

        assert_eq!(run_sweep(&conn, None).unwrap(), 1);
        assert_eq!(run_sweep(&conn, None).unwrap(), 0);
    }

    #[test]
    fn test_sweep_filters_by_vendor() {
        let conn = setup_db();
        testutil::seed_vendor(&conn, "v1");
        testutil::seed_vendor(&conn, "v2");
        testutil::insert_booking(
            &conn,
            "b1",
            "v1",
            BookingStatus::Confirmed,
            PaymentStatus::Paid,
            80000,
        );
        testutil::insert_booking(
            &conn,
            "b2",
            "v2",
            BookingStatus::Confirmed,
            PaymentStatus::Paid,
            80000,
        );

        assert_eq!(run_sweep(&conn, Some("v2")).unwrap(), 1);

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM transactions WHERE vendor_id = 'v2'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_sweep_skips_already_ledgered_booking() {
        let conn = setup_db();
        testutil::seed_vendor(&conn, "v1");
        let booking = testutil::insert_booking(
            &conn,
            "b1",
            "v1",
            BookingStatus::Confirmed,
            PaymentStatus::Paid,
            80000,
        );
        payments::ensure_payment_recorded(&conn, &booking).unwrap();

        assert_eq!(run_sweep(&conn, None).unwrap(), 0);
    }

    #[test]
    fn test_sweep_does_not_touch_wallets() {
        let conn = setup_db();
        testutil::seed_vendor(&conn, "v1");
        testutil::insert_booking(
            &conn,
            "b1",
            "v1",
            BookingStatus::Confirmed,
            PaymentStatus::Paid,
            80000,
        );

        run_sweep(&conn, None).unwrap();
        assert!(queries::get_wallet(&conn, "v1").unwrap().is_none());
    }
}
