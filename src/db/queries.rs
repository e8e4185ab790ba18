use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{
    Booking, BookingStatus, PaymentStatus, Profile, Review, ReviewStatus, Role, Service,
    ServiceCategory, Transaction, TransactionStatus, TransactionType, Vendor, VendorStatus,
    Wallet,
};

const SQL_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

fn fmt_dt(dt: &NaiveDateTime) -> String {
    dt.format(SQL_DATETIME).to_string()
}

fn parse_dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, SQL_DATETIME).unwrap_or_else(|_| {
        tracing::warn!(value = %s, "unparseable timestamp in stored row, substituting now");
        Utc::now().naive_utc()
    })
}

fn now_str() -> String {
    fmt_dt(&Utc::now().naive_utc())
}

// ── Profiles ──

const PROFILE_COLUMNS: &str = "id, full_name, email, phone, role, api_key, created_at, updated_at";

pub fn create_profile(conn: &Connection, profile: &Profile) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO profiles (id, full_name, email, phone, role, api_key, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            profile.id,
            profile.full_name,
            profile.email,
            profile.phone,
            profile.role.as_str(),
            profile.api_key,
            fmt_dt(&profile.created_at),
            fmt_dt(&profile.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: &str) -> anyhow::Result<Option<Profile>> {
    let result = conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
        params![id],
        |row| Ok(parse_profile_row(row)),
    );

    match result {
        Ok(profile) => Ok(Some(profile?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_profile_by_api_key(conn: &Connection, api_key: &str) -> anyhow::Result<Option<Profile>> {
    let result = conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE api_key = ?1"),
        params![api_key],
        |row| Ok(parse_profile_row(row)),
    );

    match result {
        Ok(profile) => Ok(Some(profile?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_profile_row(row: &rusqlite::Row) -> anyhow::Result<Profile> {
    let role_str: String = row.get(4)?;
    let created_at_str: String = row.get(6)?;
    let updated_at_str: String = row.get(7)?;

    Ok(Profile {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        role: Role::parse(&role_str).unwrap_or(Role::Tourist),
        api_key: row.get(5)?,
        created_at: parse_dt(&created_at_str),
        updated_at: parse_dt(&updated_at_str),
    })
}

// ── Vendors ──

const VENDOR_COLUMNS: &str =
    "id, profile_id, business_name, description, status, created_at, updated_at";

pub fn create_vendor(conn: &Connection, vendor: &Vendor) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO vendors (id, profile_id, business_name, description, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            vendor.id,
            vendor.profile_id,
            vendor.business_name,
            vendor.description,
            vendor.status.as_str(),
            fmt_dt(&vendor.created_at),
            fmt_dt(&vendor.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_vendor(conn: &Connection, id: &str) -> anyhow::Result<Option<Vendor>> {
    let result = conn.query_row(
        &format!("SELECT {VENDOR_COLUMNS} FROM vendors WHERE id = ?1"),
        params![id],
        |row| Ok(parse_vendor_row(row)),
    );

    match result {
        Ok(vendor) => Ok(Some(vendor?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_vendor_by_profile(conn: &Connection, profile_id: &str) -> anyhow::Result<Option<Vendor>> {
    let result = conn.query_row(
        &format!("SELECT {VENDOR_COLUMNS} FROM vendors WHERE profile_id = ?1"),
        params![profile_id],
        |row| Ok(parse_vendor_row(row)),
    );

    match result {
        Ok(vendor) => Ok(Some(vendor?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_vendors(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Vendor>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {VENDOR_COLUMNS} FROM vendors WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2"
            ),
            vec![
                Box::new(status.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            format!("SELECT {VENDOR_COLUMNS} FROM vendors ORDER BY created_at DESC LIMIT ?1"),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_vendor_row(row)))?;

    let mut vendors = vec![];
    for row in rows {
        vendors.push(row??);
    }
    Ok(vendors)
}

pub fn update_vendor_status(
    conn: &Connection,
    id: &str,
    status: &VendorStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE vendors SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_str(), id],
    )?;
    Ok(count > 0)
}

fn parse_vendor_row(row: &rusqlite::Row) -> anyhow::Result<Vendor> {
    let status_str: String = row.get(4)?;
    let created_at_str: String = row.get(5)?;
    let updated_at_str: String = row.get(6)?;

    Ok(Vendor {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        business_name: row.get(2)?,
        description: row.get(3)?,
        status: VendorStatus::parse(&status_str).unwrap_or(VendorStatus::Pending),
        created_at: parse_dt(&created_at_str),
        updated_at: parse_dt(&updated_at_str),
    })
}

// ── Services ──

const SERVICE_COLUMNS: &str = "id, vendor_id, title, description, category, price, currency, \
     location, image_url, is_active, duration_hours, max_group_size, meeting_point, star_rating, \
     room_type, amenities, vehicle_type, seat_count, route_from, route_to, airline, \
     departure_airport, arrival_airport, departure_time, venue, event_date, ticket_type, cuisine, \
     menu_url, opening_hours, languages, years_experience, specialties, created_at, updated_at";

pub fn create_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, vendor_id, title, description, category, price, currency, \
         location, image_url, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            service.id,
            service.vendor_id,
            service.title,
            service.description,
            service.category.as_str(),
            service.price,
            service.currency,
            service.location,
            service.image_url,
            service.is_active as i32,
            fmt_dt(&service.created_at),
            fmt_dt(&service.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        &format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"),
        params![id],
        |row| Ok(parse_service_row(row)),
    );

    match result {
        Ok(service) => Ok(Some(service?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_services_for_vendor(conn: &Connection, vendor_id: &str) -> anyhow::Result<Vec<Service>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services WHERE vendor_id = ?1 ORDER BY created_at DESC"
    ))?;

    let rows = stmt.query_map(params![vendor_id], |row| Ok(parse_service_row(row)))?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok(services)
}

#[derive(Debug, Default)]
pub struct ServiceFilter {
    pub category: Option<String>,
    pub location: Option<String>,
    pub q: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub limit: i64,
}

/// Public catalog search: only active services of approved vendors.
pub fn search_services(conn: &Connection, filter: &ServiceFilter) -> anyhow::Result<Vec<Service>> {
    let mut sql = format!(
        "SELECT {SERVICE_COLUMNS} FROM services WHERE is_active = 1 \
         AND vendor_id IN (SELECT id FROM vendors WHERE status = 'approved')"
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(category) = &filter.category {
        params_vec.push(Box::new(category.to_string()));
        sql.push_str(&format!(" AND category = ?{}", params_vec.len()));
    }
    if let Some(location) = &filter.location {
        params_vec.push(Box::new(format!("%{location}%")));
        sql.push_str(&format!(" AND location LIKE ?{}", params_vec.len()));
    }
    if let Some(q) = &filter.q {
        params_vec.push(Box::new(format!("%{q}%")));
        let idx = params_vec.len();
        sql.push_str(&format!(
            " AND (title LIKE ?{idx} OR description LIKE ?{idx})"
        ));
    }
    if let Some(min) = filter.min_price {
        params_vec.push(Box::new(min));
        sql.push_str(&format!(" AND price >= ?{}", params_vec.len()));
    }
    if let Some(max) = filter.max_price {
        params_vec.push(Box::new(max));
        sql.push_str(&format!(" AND price <= ?{}", params_vec.len()));
    }

    params_vec.push(Box::new(filter.limit));
    sql.push_str(&format!(" ORDER BY created_at DESC LIMIT ?{}", params_vec.len()));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_service_row(row)))?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok(services)
}

/// Apply pre-whitelisted column assignments to a service and refresh
/// updated_at. Column names come from the category whitelist, never from
/// request input, so interpolating them is safe.
pub fn update_service_columns(
    conn: &Connection,
    id: &str,
    assignments: &[(String, rusqlite::types::Value)],
) -> anyhow::Result<bool> {
    let mut set_parts: Vec<String> = Vec::with_capacity(assignments.len() + 1);
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> =
        Vec::with_capacity(assignments.len() + 2);

    for (column, value) in assignments {
        params_vec.push(Box::new(value.clone()));
        set_parts.push(format!("{column} = ?{}", params_vec.len()));
    }

    params_vec.push(Box::new(now_str()));
    set_parts.push(format!("updated_at = ?{}", params_vec.len()));

    params_vec.push(Box::new(id.to_string()));
    let sql = format!(
        "UPDATE services SET {} WHERE id = ?{}",
        set_parts.join(", "),
        params_vec.len()
    );

    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let count = conn.execute(&sql, params_refs.as_slice())?;
    Ok(count > 0)
}

pub fn set_service_active(conn: &Connection, id: &str, active: bool) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE services SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
        params![active as i32, now_str(), id],
    )?;
    Ok(count > 0)
}

fn parse_service_row(row: &rusqlite::Row) -> anyhow::Result<Service> {
    let category_str: String = row.get(4)?;
    let created_at_str: String = row.get(33)?;
    let updated_at_str: String = row.get(34)?;

    Ok(Service {
        id: row.get(0)?,
        vendor_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: ServiceCategory::parse(&category_str).unwrap_or(ServiceCategory::Tour),
        price: row.get(5)?,
        currency: row.get(6)?,
        location: row.get(7)?,
        image_url: row.get(8)?,
        is_active: row.get::<_, i32>(9)? != 0,
        duration_hours: row.get(10)?,
        max_group_size: row.get(11)?,
        meeting_point: row.get(12)?,
        star_rating: row.get(13)?,
        room_type: row.get(14)?,
        amenities: row.get(15)?,
        vehicle_type: row.get(16)?,
        seat_count: row.get(17)?,
        route_from: row.get(18)?,
        route_to: row.get(19)?,
        airline: row.get(20)?,
        departure_airport: row.get(21)?,
        arrival_airport: row.get(22)?,
        departure_time: row.get(23)?,
        venue: row.get(24)?,
        event_date: row.get(25)?,
        ticket_type: row.get(26)?,
        cuisine: row.get(27)?,
        menu_url: row.get(28)?,
        opening_hours: row.get(29)?,
        languages: row.get(30)?,
        years_experience: row.get(31)?,
        specialties: row.get(32)?,
        created_at: parse_dt(&created_at_str),
        updated_at: parse_dt(&updated_at_str),
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, service_id, vendor_id, tourist_id, guest_name, guest_email, \
     guest_phone, booking_date, num_people, total_amount, currency, status, payment_status, \
     notes, created_at, updated_at";

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, service_id, vendor_id, tourist_id, guest_name, guest_email, \
         guest_phone, booking_date, num_people, total_amount, currency, status, payment_status, \
         notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            booking.id,
            booking.service_id,
            booking.vendor_id,
            booking.tourist_id,
            booking.guest_name,
            booking.guest_email,
            booking.guest_phone,
            fmt_dt(&booking.booking_date),
            booking.num_people,
            booking.total_amount,
            booking.currency,
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.notes,
            fmt_dt(&booking.created_at),
            fmt_dt(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug)]
pub struct BookingDetail {
    pub booking: Booking,
    pub service_title: String,
    pub service_category: String,
    pub business_name: String,
    pub tourist_name: Option<String>,
}

/// Booking plus the service / vendor / tourist info callers display with it.
pub fn get_booking_detail(conn: &Connection, id: &str) -> anyhow::Result<Option<BookingDetail>> {
    let result = conn.query_row(
        "SELECT b.id, b.service_id, b.vendor_id, b.tourist_id, b.guest_name, b.guest_email, \
         b.guest_phone, b.booking_date, b.num_people, b.total_amount, b.currency, b.status, \
         b.payment_status, b.notes, b.created_at, b.updated_at, \
         s.title, s.category, v.business_name, p.full_name
         FROM bookings b
         JOIN services s ON b.service_id = s.id
         JOIN vendors v ON b.vendor_id = v.id
         LEFT JOIN profiles p ON b.tourist_id = p.id
         WHERE b.id = ?1",
        params![id],
        |row| {
            let booking = parse_booking_row(row);
            let service_title: String = row.get(16)?;
            let service_category: String = row.get(17)?;
            let business_name: String = row.get(18)?;
            let tourist_name: Option<String> = row.get(19)?;
            Ok((booking, service_title, service_category, business_name, tourist_name))
        },
    );

    match result {
        Ok((booking, service_title, service_category, business_name, tourist_name)) => {
            Ok(Some(BookingDetail {
                booking: booking?,
                service_title,
                service_category,
                business_name,
                tourist_name,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Default)]
pub struct BookingFilter {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub vendor_id: Option<String>,
    pub tourist_id: Option<String>,
    pub limit: i64,
}

pub fn list_bookings(conn: &Connection, filter: &BookingFilter) -> anyhow::Result<Vec<Booking>> {
    let mut sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(status) = &filter.status {
        params_vec.push(Box::new(status.to_string()));
        sql.push_str(&format!(" AND status = ?{}", params_vec.len()));
    }
    if let Some(payment_status) = &filter.payment_status {
        params_vec.push(Box::new(payment_status.to_string()));
        sql.push_str(&format!(" AND payment_status = ?{}", params_vec.len()));
    }
    if let Some(vendor_id) = &filter.vendor_id {
        params_vec.push(Box::new(vendor_id.to_string()));
        sql.push_str(&format!(" AND vendor_id = ?{}", params_vec.len()));
    }
    if let Some(tourist_id) = &filter.tourist_id {
        params_vec.push(Box::new(tourist_id.to_string()));
        sql.push_str(&format!(" AND tourist_id = ?{}", params_vec.len()));
    }

    params_vec.push(Box::new(filter.limit));
    sql.push_str(&format!(" ORDER BY created_at DESC LIMIT ?{}", params_vec.len()));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Bookings in the settled state (confirmed + paid), the population the
/// reconciliation sweep walks. No ordering guarantee.
pub fn list_settled_bookings(
    conn: &Connection,
    vendor_id: Option<&str>,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match vendor_id {
        Some(vendor) => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings \
                 WHERE status = 'confirmed' AND payment_status = 'paid' AND vendor_id = ?1"
            ),
            vec![Box::new(vendor.to_string()) as Box<dyn rusqlite::types::ToSql>],
        ),
        None => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings \
                 WHERE status = 'confirmed' AND payment_status = 'paid'"
            ),
            vec![],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking_state(
    conn: &Connection,
    id: &str,
    status: &BookingStatus,
    payment_status: &PaymentStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, payment_status = ?2, updated_at = ?3 WHERE id = ?4",
        params![status.as_str(), payment_status.as_str(), now_str(), id],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let booking_date_str: String = row.get(7)?;
    let status_str: String = row.get(11)?;
    let payment_status_str: String = row.get(12)?;
    let created_at_str: String = row.get(14)?;
    let updated_at_str: String = row.get(15)?;

    Ok(Booking {
        id: row.get(0)?,
        service_id: row.get(1)?,
        vendor_id: row.get(2)?,
        tourist_id: row.get(3)?,
        guest_name: row.get(4)?,
        guest_email: row.get(5)?,
        guest_phone: row.get(6)?,
        booking_date: parse_dt(&booking_date_str),
        num_people: row.get(8)?,
        total_amount: row.get(9)?,
        currency: row.get(10)?,
        status: BookingStatus::parse(&status_str).unwrap_or(BookingStatus::Pending),
        payment_status: PaymentStatus::parse(&payment_status_str).unwrap_or(PaymentStatus::Pending),
        notes: row.get(13)?,
        created_at: parse_dt(&created_at_str),
        updated_at: parse_dt(&updated_at_str),
    })
}

// ── Transactions ──

const TRANSACTION_COLUMNS: &str = "id, booking_id, vendor_id, tourist_id, transaction_type, \
     status, amount, currency, reference, description, created_at, updated_at";

/// Insert a ledger row. Returns false when the row was dropped by
/// `INSERT OR IGNORE` because a unique index (one completed payment/refund
/// per booking, unique reference) already holds a matching row.
pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> anyhow::Result<bool> {
    let count = conn.execute(
        "INSERT OR IGNORE INTO transactions (id, booking_id, vendor_id, tourist_id, \
         transaction_type, status, amount, currency, reference, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            tx.id,
            tx.booking_id,
            tx.vendor_id,
            tx.tourist_id,
            tx.transaction_type.as_str(),
            tx.status.as_str(),
            tx.amount,
            tx.currency,
            tx.reference,
            tx.description,
            fmt_dt(&tx.created_at),
            fmt_dt(&tx.updated_at),
        ],
    )?;
    Ok(count > 0)
}

pub fn get_transaction(conn: &Connection, id: &str) -> anyhow::Result<Option<Transaction>> {
    let result = conn.query_row(
        &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"),
        params![id],
        |row| Ok(parse_transaction_row(row)),
    );

    match result {
        Ok(tx) => Ok(Some(tx?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The completed transaction of the given type for a booking, if any. This
/// is the idempotency probe for the payment/refund legs.
pub fn find_completed_transaction(
    conn: &Connection,
    booking_id: &str,
    tx_type: &TransactionType,
) -> anyhow::Result<Option<Transaction>> {
    let result = conn.query_row(
        &format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE booking_id = ?1 AND transaction_type = ?2 AND status = 'completed' LIMIT 1"
        ),
        params![booking_id, tx_type.as_str()],
        |row| Ok(parse_transaction_row(row)),
    );

    match result {
        Ok(tx) => Ok(Some(tx?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Default)]
pub struct TransactionFilter {
    pub vendor_id: Option<String>,
    pub transaction_type: Option<String>,
    pub status: Option<String>,
    pub limit: i64,
}

/// List ledger rows. A database migrated before the ledger tables existed
/// yields an empty list rather than an error.
pub fn list_transactions(
    conn: &Connection,
    filter: &TransactionFilter,
) -> anyhow::Result<Vec<Transaction>> {
    let mut sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(vendor_id) = &filter.vendor_id {
        params_vec.push(Box::new(vendor_id.to_string()));
        sql.push_str(&format!(" AND vendor_id = ?{}", params_vec.len()));
    }
    if let Some(tx_type) = &filter.transaction_type {
        params_vec.push(Box::new(tx_type.to_string()));
        sql.push_str(&format!(" AND transaction_type = ?{}", params_vec.len()));
    }
    if let Some(status) = &filter.status {
        params_vec.push(Box::new(status.to_string()));
        sql.push_str(&format!(" AND status = ?{}", params_vec.len()));
    }

    params_vec.push(Box::new(filter.limit));
    sql.push_str(&format!(" ORDER BY created_at DESC LIMIT ?{}", params_vec.len()));

    let mut stmt = match conn.prepare(&sql) {
        Ok(stmt) => stmt,
        Err(e) if e.to_string().contains("no such table") => {
            tracing::warn!("transactions table missing, returning empty ledger");
            return Ok(vec![]);
        }
        Err(e) => return Err(e.into()),
    };
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_transaction_row(row)))?;

    let mut transactions = vec![];
    for row in rows {
        transactions.push(row??);
    }
    Ok(transactions)
}

pub fn update_transaction_status(
    conn: &Connection,
    id: &str,
    status: &TransactionStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE transactions SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_str(), id],
    )?;
    Ok(count > 0)
}

pub struct LedgerRow {
    pub transaction_type: String,
    pub status: String,
    pub amount: i64,
    pub booking_status: Option<String>,
}

/// Every ledger row for a vendor joined with the status of the booking it
/// settles (absent for withdrawals). Input for the recomputed wallet stats.
pub fn get_vendor_ledger(conn: &Connection, vendor_id: &str) -> anyhow::Result<Vec<LedgerRow>> {
    let mut stmt = match conn.prepare(
        "SELECT t.transaction_type, t.status, t.amount, b.status
         FROM transactions t
         LEFT JOIN bookings b ON t.booking_id = b.id
         WHERE t.vendor_id = ?1",
    ) {
        Ok(stmt) => stmt,
        Err(e) if e.to_string().contains("no such table") => {
            tracing::warn!("transactions table missing, returning empty ledger");
            return Ok(vec![]);
        }
        Err(e) => return Err(e.into()),
    };

    let rows = stmt.query_map(params![vendor_id], |row| {
        Ok(LedgerRow {
            transaction_type: row.get(0)?,
            status: row.get(1)?,
            amount: row.get(2)?,
            booking_status: row.get(3)?,
        })
    })?;

    let mut ledger = vec![];
    for row in rows {
        ledger.push(row?);
    }
    Ok(ledger)
}

fn parse_transaction_row(row: &rusqlite::Row) -> anyhow::Result<Transaction> {
    let type_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let created_at_str: String = row.get(10)?;
    let updated_at_str: String = row.get(11)?;

    Ok(Transaction {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        vendor_id: row.get(2)?,
        tourist_id: row.get(3)?,
        transaction_type: TransactionType::parse(&type_str).unwrap_or(TransactionType::Payment),
        status: TransactionStatus::parse(&status_str).unwrap_or(TransactionStatus::Pending),
        amount: row.get(6)?,
        currency: row.get(7)?,
        reference: row.get(8)?,
        description: row.get(9)?,
        created_at: parse_dt(&created_at_str),
        updated_at: parse_dt(&updated_at_str),
    })
}

// ── Wallets ──

/// Add `delta` (may be negative) to a wallet's cached balance, creating the
/// row on first touch. Returns the balance after the adjustment.
pub fn adjust_wallet_balance(
    conn: &Connection,
    owner: &str,
    delta: i64,
    currency: &str,
) -> anyhow::Result<i64> {
    let now = now_str();
    conn.execute(
        "INSERT INTO wallets (owner, balance, currency, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(owner) DO UPDATE SET balance = balance + ?2, updated_at = ?4",
        params![owner, delta, currency, now],
    )?;

    let balance: i64 = conn.query_row(
        "SELECT balance FROM wallets WHERE owner = ?1",
        params![owner],
        |row| row.get(0),
    )?;
    Ok(balance)
}

pub fn get_wallet(conn: &Connection, owner: &str) -> anyhow::Result<Option<Wallet>> {
    let result = conn.query_row(
        "SELECT owner, balance, currency, created_at, updated_at FROM wallets WHERE owner = ?1",
        params![owner],
        |row| {
            let created_at_str: String = row.get(3)?;
            let updated_at_str: String = row.get(4)?;
            Ok(Wallet {
                owner: row.get(0)?,
                balance: row.get(1)?,
                currency: row.get(2)?,
                created_at: parse_dt(&created_at_str),
                updated_at: parse_dt(&updated_at_str),
            })
        },
    );

    match result {
        Ok(wallet) => Ok(Some(wallet)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Reviews ──

const REVIEW_COLUMNS: &str =
    "id, service_id, tourist_id, rating, comment, status, created_at, updated_at";

pub fn create_review(conn: &Connection, review: &Review) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO reviews (id, service_id, tourist_id, rating, comment, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            review.id,
            review.service_id,
            review.tourist_id,
            review.rating,
            review.comment,
            review.status.as_str(),
            fmt_dt(&review.created_at),
            fmt_dt(&review.updated_at),
        ],
    )?;
    Ok(())
}

pub fn list_approved_reviews(conn: &Connection, service_id: &str) -> anyhow::Result<Vec<Review>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews \
         WHERE service_id = ?1 AND status = 'approved' ORDER BY created_at DESC"
    ))?;

    let rows = stmt.query_map(params![service_id], |row| Ok(parse_review_row(row)))?;

    let mut reviews = vec![];
    for row in rows {
        reviews.push(row??);
    }
    Ok(reviews)
}

pub fn list_reviews(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Review>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {REVIEW_COLUMNS} FROM reviews WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2"
            ),
            vec![
                Box::new(status.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            format!("SELECT {REVIEW_COLUMNS} FROM reviews ORDER BY created_at DESC LIMIT ?1"),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_review_row(row)))?;

    let mut reviews = vec![];
    for row in rows {
        reviews.push(row??);
    }
    Ok(reviews)
}

pub fn update_review_status(
    conn: &Connection,
    id: &str,
    status: &ReviewStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE reviews SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_str(), id],
    )?;
    Ok(count > 0)
}

fn parse_review_row(row: &rusqlite::Row) -> anyhow::Result<Review> {
    let status_str: String = row.get(5)?;
    let created_at_str: String = row.get(6)?;
    let updated_at_str: String = row.get(7)?;

    Ok(Review {
        id: row.get(0)?,
        service_id: row.get(1)?,
        tourist_id: row.get(2)?,
        rating: row.get(3)?,
        comment: row.get(4)?,
        status: ReviewStatus::parse(&status_str).unwrap_or(ReviewStatus::Pending),
        created_at: parse_dt(&created_at_str),
        updated_at: parse_dt(&updated_at_str),
    })
}

// ── Dashboard ──

pub struct DashboardStats {
    pub pending_vendors: i64,
    pub approved_vendors: i64,
    pub active_services: i64,
    pub total_bookings: i64,
    pub pending_bookings: i64,
    pub settled_bookings: i64,
    pub completed_payment_volume: i64,
    pub pending_reviews: i64,
    pub pending_withdrawals: i64,
}

/// Back-office overview. Every sub-query degrades to zero on failure so one
/// missing table or bad row never blanks the whole dashboard.
pub fn get_dashboard_stats(conn: &Connection) -> anyhow::Result<DashboardStats> {
    let pending_vendors: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM vendors WHERE status = 'pending'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let approved_vendors: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM vendors WHERE status = 'approved'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let active_services: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM services WHERE is_active = 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let total_bookings: i64 = conn
        .query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
        .unwrap_or(0);

    let pending_bookings: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM bookings WHERE status = 'pending'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let settled_bookings: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM bookings WHERE status = 'confirmed' AND payment_status = 'paid'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let completed_payment_volume: i64 = conn
        .query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM transactions \
             WHERE transaction_type = 'payment' AND status = 'completed'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let pending_reviews: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM reviews WHERE status = 'pending'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let pending_withdrawals: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM transactions \
             WHERE transaction_type = 'withdrawal' AND status IN ('pending', 'approved')",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(DashboardStats {
        pending_vendors,
        approved_vendors,
        active_services,
        total_bookings,
        pending_bookings,
        settled_bookings,
        completed_payment_volume,
        pending_reviews,
        pending_withdrawals,
    })
}

// ── Error classification ──

/// A deployment migrated before the payment tables existed reports
/// "no such table" on ledger writes. Callers treat that as a degraded
/// environment, not a fatal error.
pub fn is_missing_table(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.to_string().contains("no such table"))
}

pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(f, _))
                if f.code == rusqlite::ErrorCode::ConstraintViolation
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dt_round_trips() {
        let dt = parse_dt("2026-01-01 08:00:00");
        assert_eq!(fmt_dt(&dt), "2026-01-01 08:00:00");
    }

    #[test]
    fn test_parse_dt_substitutes_now_for_garbage() {
        let before = Utc::now().naive_utc();
        let parsed = parse_dt("not-a-timestamp");
        let after = Utc::now().naive_utc();
        assert!(parsed >= before && parsed <= after);
    }
}
