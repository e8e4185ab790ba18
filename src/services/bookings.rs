use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries::{self, BookingDetail};
use crate::models::{Booking, BookingStatus, PaymentStatus, VendorStatus};
use crate::services::payments;

#[derive(Debug)]
pub enum BookingError {
    Storage(anyhow::Error),
    MissingGuestContact,
    InvalidPartySize,
    AmountOverflow,
    ServiceNotFound,
    ServiceUnavailable,
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::Storage(e) => write!(f, "{e}"),
            BookingError::MissingGuestContact => {
                write!(f, "guest bookings require guest_name, guest_email and guest_phone")
            }
            BookingError::InvalidPartySize => write!(f, "num_people must be at least 1"),
            BookingError::AmountOverflow => {
                write!(f, "num_people is too large for this service price")
            }
            BookingError::ServiceNotFound => write!(f, "service not found"),
            BookingError::ServiceUnavailable => write!(f, "service is not open for booking"),
        }
    }
}

impl From<anyhow::Error> for BookingError {
    fn from(e: anyhow::Error) -> Self {
        BookingError::Storage(e)
    }
}

pub struct NewBooking {
    pub service_id: String,
    pub tourist_id: Option<String>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub booking_date: NaiveDateTime,
    pub num_people: i64,
    pub notes: Option<String>,
}

fn present(field: &Option<String>) -> bool {
    field.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

/// Create a pending booking against an active service of an approved
/// vendor. Guest bookings (no tourist id) must carry the full contact
/// triple; that check runs before the database is touched at all.
pub fn create_booking(conn: &Connection, new: &NewBooking) -> Result<BookingDetail, BookingError> {
    if new.tourist_id.is_none()
        && !(present(&new.guest_name) && present(&new.guest_email) && present(&new.guest_phone))
    {
        return Err(BookingError::MissingGuestContact);
    }
    if new.num_people < 1 {
        return Err(BookingError::InvalidPartySize);
    }

    let Some(service) = queries::get_service(conn, &new.service_id)? else {
        return Err(BookingError::ServiceNotFound);
    };
    if !service.is_active {
        return Err(BookingError::ServiceUnavailable);
    }
    let vendor_approved = queries::get_vendor(conn, &service.vendor_id)?
        .map(|v| v.status == VendorStatus::Approved)
        .unwrap_or(false);
    if !vendor_approved {
        return Err(BookingError::ServiceUnavailable);
    }

    // num_people is caller-controlled on an unauthenticated endpoint; the
    // multiply must not wrap into a negative total that wallets would credit.
    let total_amount = service
        .price
        .checked_mul(new.num_people)
        .ok_or(BookingError::AmountOverflow)?;

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        service_id: service.id.clone(),
        vendor_id: service.vendor_id.clone(),
        tourist_id: new.tourist_id.clone(),
        guest_name: new.guest_name.clone(),
        guest_email: new.guest_email.clone(),
        guest_phone: new.guest_phone.clone(),
        booking_date: new.booking_date,
        num_people: new.num_people,
        total_amount,
        currency: service.currency.clone(),
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
        notes: new.notes.clone(),
        created_at: now,
        updated_at: now,
    };
    queries::create_booking(conn, &booking)?;

    tracing::info!(
        booking_id = %booking.id,
        service_id = %booking.service_id,
        total_amount = booking.total_amount,
        "booking created"
    );

    queries::get_booking_detail(conn, &booking.id)?
        .ok_or_else(|| BookingError::Storage(anyhow::anyhow!("booking row missing after insert")))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StateUpdate {
    pub status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
}

/// Apply a partial `{status, payment_status}` update to a booking, run the
/// settlement side effects for the state it lands in, and return the row
/// joined with its display info. Returns None for an unknown booking. The
/// side effects re-run on every call, so repeating an update is harmless.
pub fn apply_state_update(
    conn: &Connection,
    booking_id: &str,
    update: StateUpdate,
) -> anyhow::Result<Option<BookingDetail>> {
    let Some(current) = queries::get_booking(conn, booking_id)? else {
        return Ok(None);
    };

    let status = update.status.unwrap_or(current.status);
    let payment_status = update.payment_status.unwrap_or(current.payment_status);
    queries::update_booking_state(conn, booking_id, &status, &payment_status)?;

    let Some(updated) = queries::get_booking(conn, booking_id)? else {
        return Ok(None);
    };
    payments::apply_settlement_effects(conn, &updated)?;

    queries::get_booking_detail(conn, booking_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{TransactionStatus, TransactionType, PLATFORM_WALLET};
    use crate::testutil;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn guest_request(service_id: &str) -> NewBooking {
        NewBooking {
            service_id: service_id.to_string(),
            tourist_id: None,
            guest_name: Some("Ada".to_string()),
            guest_email: Some("ada@example.com".to_string()),
            guest_phone: Some("+256700000001".to_string()),
            booking_date: Utc::now().naive_utc(),
            num_people: 2,
            notes: None,
        }
    }

    fn booking_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
            .unwrap()
    }

    fn payment_count(conn: &Connection, booking_id: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE booking_id = ?1 \
             AND transaction_type = 'payment' AND status = 'completed'",
            rusqlite::params![booking_id],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_guest_booking_missing_email_rejected_before_any_write() {
        let conn = setup_db();
        testutil::seed_vendor(&conn, "v1");

        let mut request = guest_request("svc-v1");
        request.guest_email = None;

        let err = create_booking(&conn, &request).unwrap_err();
        assert!(matches!(err, BookingError::MissingGuestContact));
        assert_eq!(booking_count(&conn), 0);
    }

    #[test]
    fn test_guest_booking_blank_email_rejected() {
        let conn = setup_db();
        testutil::seed_vendor(&conn, "v1");

        let mut request = guest_request("svc-v1");
        request.guest_email = Some("   ".to_string());

        let err = create_booking(&conn, &request).unwrap_err();
        assert!(matches!(err, BookingError::MissingGuestContact));
        assert_eq!(booking_count(&conn), 0);
    }

    #[test]
    fn test_oversized_party_rejected_before_any_write() {
        let conn = setup_db();
        testutil::seed_vendor(&conn, "v1");

        // Large enough to wrap the i64 total at the seeded 250000 price.
        let mut request = guest_request("svc-v1");
        request.num_people = i64::MAX / 2;

        let err = create_booking(&conn, &request).unwrap_err();
        assert!(matches!(err, BookingError::AmountOverflow));
        assert_eq!(booking_count(&conn), 0);
    }

    #[test]
    fn test_create_booking_prices_from_service() {
        let conn = setup_db();
        testutil::seed_vendor(&conn, "v1");

        let detail = create_booking(&conn, &guest_request("svc-v1")).unwrap();
        // Seeded tour costs 250000 per head.
        assert_eq!(detail.booking.total_amount, 500000);
        assert_eq!(detail.booking.status, BookingStatus::Pending);
        assert_eq!(detail.booking.payment_status, PaymentStatus::Pending);
        assert_eq!(detail.service_title, "Gorilla trek");
        assert_eq!(detail.business_name, "Kampala Tours");
    }

    #[test]
    fn test_booking_unapproved_vendor_rejected() {
        let conn = setup_db();
        testutil::seed_vendor(&conn, "v1");
        conn.execute("UPDATE vendors SET status = 'suspended' WHERE id = 'v1'", [])
            .unwrap();

        let err = create_booking(&conn, &guest_request("svc-v1")).unwrap_err();
        assert!(matches!(err, BookingError::ServiceUnavailable));
    }

    #[test]
    fn test_booking_inactive_service_rejected() {
        let conn = setup_db();
        testutil::seed_vendor(&conn, "v1");
        conn.execute("UPDATE services SET is_active = 0 WHERE id = 'svc-v1'", [])
            .unwrap();

        let err = create_booking(&conn, &guest_request("svc-v1")).unwrap_err();
        assert!(matches!(err, BookingError::ServiceUnavailable));
    }

    #[test]
    fn test_repeated_settlement_updates_create_one_payment() {
        let conn = setup_db();
        testutil::seed_vendor(&conn, "v1");
        let detail = create_booking(&conn, &guest_request("svc-v1")).unwrap();
        let id = detail.booking.id.clone();

        let update = StateUpdate {
            status: Some(BookingStatus::Confirmed),
            payment_status: Some(PaymentStatus::Paid),
        };
        apply_state_update(&conn, &id, update).unwrap().unwrap();
        apply_state_update(&conn, &id, update).unwrap().unwrap();
        apply_state_update(&conn, &id, update).unwrap().unwrap();

        assert_eq!(payment_count(&conn, &id), 1);

        let wallet = queries::get_wallet(&conn, "v1").unwrap().unwrap();
        assert_eq!(wallet.balance, 500000);
        let platform = queries::get_wallet(&conn, PLATFORM_WALLET).unwrap().unwrap();
        assert_eq!(platform.balance, 500000);
    }

    #[test]
    fn test_partial_update_keeps_other_field() {
        let conn = setup_db();
        testutil::seed_vendor(&conn, "v1");
        let detail = create_booking(&conn, &guest_request("svc-v1")).unwrap();
        let id = detail.booking.id.clone();

        let updated = apply_state_update(
            &conn,
            &id,
            StateUpdate {
                status: Some(BookingStatus::Confirmed),
                payment_status: None,
            },
        )
        .unwrap()
        .unwrap();

        assert_eq!(updated.booking.status, BookingStatus::Confirmed);
        assert_eq!(updated.booking.payment_status, PaymentStatus::Pending);
        // Not settled yet, so no ledger row.
        assert_eq!(payment_count(&conn, &id), 0);
    }

    #[test]
    fn test_refund_follows_payment() {
        let conn = setup_db();
        testutil::seed_vendor(&conn, "v1");
        let detail = create_booking(&conn, &guest_request("svc-v1")).unwrap();
        let id = detail.booking.id.clone();

        apply_state_update(
            &conn,
            &id,
            StateUpdate {
                status: Some(BookingStatus::Confirmed),
                payment_status: Some(PaymentStatus::Paid),
            },
        )
        .unwrap();

        apply_state_update(
            &conn,
            &id,
            StateUpdate {
                status: Some(BookingStatus::Cancelled),
                payment_status: Some(PaymentStatus::Refunded),
            },
        )
        .unwrap();

        let refund =
            queries::find_completed_transaction(&conn, &id, &TransactionType::Refund)
                .unwrap()
                .unwrap();
        assert_eq!(refund.status, TransactionStatus::Completed);
        assert_eq!(refund.amount, 500000);

        let wallet = queries::get_wallet(&conn, "v1").unwrap().unwrap();
        assert_eq!(wallet.balance, 0);
    }

    #[test]
    fn test_update_unknown_booking_returns_none() {
        let conn = setup_db();
        let result = apply_state_update(&conn, "missing", StateUpdate::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_settlement_survives_missing_ledger_tables() {
        let conn = db::init_db_until(":memory:", "0001_core.sql").unwrap();
        testutil::seed_vendor(&conn, "v1");
        let detail = create_booking(&conn, &guest_request("svc-v1")).unwrap();
        let id = detail.booking.id.clone();

        let updated = apply_state_update(
            &conn,
            &id,
            StateUpdate {
                status: Some(BookingStatus::Confirmed),
                payment_status: Some(PaymentStatus::Paid),
            },
        )
        .unwrap()
        .unwrap();

        // The booking update went through even though the ledger write could
        // not happen.
        assert!(updated.booking.is_settled());
    }
}
