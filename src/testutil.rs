//! Shared fixtures for unit tests. Foreign keys are enforced, so bookings
//! need their profile / vendor / service chain seeded first.

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::db::queries;
use crate::models::{Booking, BookingStatus, PaymentStatus};

/// Insert an approved vendor `vendor_id` with owner profile `p-<vendor_id>`
/// and one active tour service `svc-<vendor_id>`.
pub fn seed_vendor(conn: &Connection, vendor_id: &str) {
    conn.execute(
        "INSERT INTO profiles (id, full_name, email, phone, role, api_key, created_at, updated_at)
         VALUES (?1, 'Vendor Owner', ?2, '+256700000000', 'vendor', ?3, \
         '2026-01-01 08:00:00', '2026-01-01 08:00:00')",
        params![
            format!("p-{vendor_id}"),
            format!("{vendor_id}@example.com"),
            format!("key-{vendor_id}")
        ],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO vendors (id, profile_id, business_name, status, created_at, updated_at)
         VALUES (?1, ?2, 'Kampala Tours', 'approved', '2026-01-01 08:00:00', '2026-01-01 08:00:00')",
        params![vendor_id, format!("p-{vendor_id}")],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO services (id, vendor_id, title, category, price, currency, is_active, \
         created_at, updated_at)
         VALUES (?1, ?2, 'Gorilla trek', 'tour', 250000, 'UGX', 1, \
         '2026-01-01 08:00:00', '2026-01-01 08:00:00')",
        params![format!("svc-{vendor_id}"), vendor_id],
    )
    .unwrap();
}

/// A guest booking against `svc-<vendor_id>`; the vendor must already be
/// seeded.
pub fn insert_booking(
    conn: &Connection,
    id: &str,
    vendor_id: &str,
    status: BookingStatus,
    payment_status: PaymentStatus,
    amount: i64,
) -> Booking {
    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: id.to_string(),
        service_id: format!("svc-{vendor_id}"),
        vendor_id: vendor_id.to_string(),
        tourist_id: None,
        guest_name: Some("Ada".to_string()),
        guest_email: Some("ada@example.com".to_string()),
        guest_phone: Some("+256700000001".to_string()),
        booking_date: now,
        num_people: 1,
        total_amount: amount,
        currency: "UGX".to_string(),
        status,
        payment_status,
        notes: None,
        created_at: now,
        updated_at: now,
    };
    queries::create_booking(conn, &booking).unwrap();
    booking
}
