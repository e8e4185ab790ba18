use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, BookingDetail, BookingFilter};
use crate::errors::AppError;
use crate::handlers::auth;
use crate::models::{Booking, BookingStatus, PaymentStatus};
use crate::services;
use crate::services::bookings::{NewBooking, StateUpdate};
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookingDetailResponse {
    pub booking: Booking,
    pub service_title: String,
    pub service_category: String,
    pub business_name: String,
    pub tourist_name: Option<String>,
}

impl From<BookingDetail> for BookingDetailResponse {
    fn from(detail: BookingDetail) -> Self {
        BookingDetailResponse {
            booking: detail.booking,
            service_title: detail.service_title,
            service_category: detail.service_category,
            business_name: detail.business_name,
            tourist_name: detail.tourist_name,
        }
    }
}

/// Partial `{status, payment_status}` update shared by the vendor and admin
/// booking endpoints. Both fields optional; an empty body is allowed and
/// simply re-runs the settlement side effects for the current state.
#[derive(Deserialize)]
pub struct BookingStateRequest {
    pub status: Option<String>,
    pub payment_status: Option<String>,
}

pub fn parse_state_request(body: &BookingStateRequest) -> Result<StateUpdate, AppError> {
    let status = match &body.status {
        Some(s) => Some(
            BookingStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown status '{s}'")))?,
        ),
        None => None,
    };
    let payment_status = match &body.payment_status {
        Some(s) => Some(
            PaymentStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown payment_status '{s}'")))?,
        ),
        None => None,
    };
    Ok(StateUpdate {
        status,
        payment_status,
    })
}

fn parse_booking_date(s: &str) -> Result<NaiveDateTime, AppError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN))
        })
        .map_err(|_| AppError::Validation(format!("invalid booking_date '{s}'")))
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub service_id: String,
    pub booking_date: String,
    pub num_people: Option<i64>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub notes: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<Json<BookingDetailResponse>, AppError> {
    let booking_date = parse_booking_date(&body.booking_date)?;

    let detail = {
        let db = state.db.lock().unwrap();
        let tourist = auth::optional_profile(&db, &headers)?;

        let new = NewBooking {
            service_id: body.service_id,
            tourist_id: tourist.map(|p| p.id),
            guest_name: body.guest_name,
            guest_email: body.guest_email,
            guest_phone: body.guest_phone,
            booking_date,
            num_people: body.num_people.unwrap_or(1),
            notes: body.notes,
        };
        services::bookings::create_booking(&db, &new)?
    };

    Ok(Json(detail.into()))
}

// GET /api/my/bookings
#[derive(Deserialize)]
pub struct MyBookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<MyBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = {
        let db = state.db.lock().unwrap();
        let profile = auth::require_profile(&db, &headers)?;

        let filter = BookingFilter {
            status: query.status,
            tourist_id: Some(profile.id),
            limit: query.limit.unwrap_or(50),
            ..Default::default()
        };
        queries::list_bookings(&db, &filter)?
    };
    Ok(Json(bookings))
}

// POST /api/my/bookings/:id/cancel
pub async fn cancel_my_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingDetailResponse>, AppError> {
    let detail = {
        let db = state.db.lock().unwrap();
        let profile = auth::require_profile(&db, &headers)?;

        let booking = queries::get_booking(&db, &id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
        if booking.tourist_id.as_deref() != Some(profile.id.as_str()) {
            return Err(AppError::Forbidden(
                "booking does not belong to this account".to_string(),
            ));
        }

        let update = StateUpdate {
            status: Some(BookingStatus::Cancelled),
            payment_status: None,
        };
        services::bookings::apply_state_update(&db, &id, update)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?
    };

    Ok(Json(detail.into()))
}
