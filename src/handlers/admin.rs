use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, BookingFilter, TransactionFilter};
use crate::errors::AppError;
use crate::handlers::auth;
use crate::handlers::bookings::{parse_state_request, BookingDetailResponse, BookingStateRequest};
use crate::models::{
    Booking, Review, ReviewStatus, Transaction, TransactionStatus, Vendor, VendorStatus,
};
use crate::services;
use crate::state::AppState;

// GET /api/admin/stats
#[derive(Serialize)]
pub struct StatsResponse {
    pending_vendors: i64,
    approved_vendors: i64,
    active_services: i64,
    total_bookings: i64,
    pending_bookings: i64,
    settled_bookings: i64,
    completed_payment_volume: i64,
    pending_reviews: i64,
    pending_withdrawals: i64,
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatsResponse>, AppError> {
    let stats = {
        let db = state.db.lock().unwrap();
        auth::require_admin(&db, &headers, &state.config.admin_token)?;
        queries::get_dashboard_stats(&db)?
    };

    Ok(Json(StatsResponse {
        pending_vendors: stats.pending_vendors,
        approved_vendors: stats.approved_vendors,
        active_services: stats.active_services,
        total_bookings: stats.total_bookings,
        pending_bookings: stats.pending_bookings,
        settled_bookings: stats.settled_bookings,
        completed_payment_volume: stats.completed_payment_volume,
        pending_reviews: stats.pending_reviews,
        pending_withdrawals: stats.pending_withdrawals,
    }))
}

// GET /api/admin/vendors
#[derive(Deserialize)]
pub struct VendorsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_vendors(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<VendorsQuery>,
) -> Result<Json<Vec<Vendor>>, AppError> {
    if let Some(status) = &query.status {
        if VendorStatus::parse(status).is_none() {
            return Err(AppError::Validation(format!("unknown status '{status}'")));
        }
    }

    let vendors = {
        let db = state.db.lock().unwrap();
        auth::require_admin(&db, &headers, &state.config.admin_token)?;
        queries::list_vendors(&db, query.status.as_deref(), query.limit.unwrap_or(50))?
    };
    Ok(Json(vendors))
}

// POST /api/admin/vendors/:id/status
#[derive(Deserialize)]
pub struct VendorStatusRequest {
    pub status: String,
}

pub async fn set_vendor_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<VendorStatusRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = VendorStatus::parse(&body.status)
        .ok_or_else(|| AppError::Validation(format!("unknown status '{}'", body.status)))?;

    let updated = {
        let db = state.db.lock().unwrap();
        auth::require_admin(&db, &headers, &state.config.admin_token)?;
        queries::update_vendor_status(&db, &id, &status)?
    };

    if !updated {
        return Err(AppError::NotFound("vendor not found".to_string()));
    }
    tracing::info!(vendor_id = %id, status = status.as_str(), "vendor status changed");
    Ok(Json(serde_json::json!({"ok": true})))
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct AdminBookingsQuery {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub vendor_id: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AdminBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = {
        let db = state.db.lock().unwrap();
        auth::require_admin(&db, &headers, &state.config.admin_token)?;

        let filter = BookingFilter {
            status: query.status,
            payment_status: query.payment_status,
            vendor_id: query.vendor_id,
            limit: query.limit.unwrap_or(50),
            ..Default::default()
        };
        queries::list_bookings(&db, &filter)?
    };
    Ok(Json(bookings))
}

// POST /api/admin/bookings/:id/status
pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<BookingStateRequest>,
) -> Result<Json<BookingDetailResponse>, AppError> {
    let update = parse_state_request(&body)?;

    let detail = {
        let db = state.db.lock().unwrap();
        auth::require_admin(&db, &headers, &state.config.admin_token)?;
        services::bookings::apply_state_update(&db, &id, update)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?
    };

    Ok(Json(detail.into()))
}

// GET /api/admin/transactions
#[derive(Deserialize)]
pub struct AdminTransactionsQuery {
    pub vendor_id: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AdminTransactionsQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let transactions = {
        let db = state.db.lock().unwrap();
        auth::require_admin(&db, &headers, &state.config.admin_token)?;

        let filter = TransactionFilter {
            vendor_id: query.vendor_id,
            transaction_type: query.transaction_type,
            status: query.status,
            limit: query.limit.unwrap_or(50),
        };
        queries::list_transactions(&db, &filter)?
    };
    Ok(Json(transactions))
}

// POST /api/admin/withdrawals/:id/status
#[derive(Deserialize)]
pub struct WithdrawalStatusRequest {
    pub status: String,
}

pub async fn decide_withdrawal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<WithdrawalStatusRequest>,
) -> Result<Json<Transaction>, AppError> {
    let target = TransactionStatus::parse(&body.status)
        .ok_or_else(|| AppError::Validation(format!("unknown status '{}'", body.status)))?;

    let tx = {
        let db = state.db.lock().unwrap();
        auth::require_admin(&db, &headers, &state.config.admin_token)?;
        services::payments::decide_withdrawal(&db, &id, target)?
            .ok_or_else(|| AppError::NotFound("withdrawal not found".to_string()))?
    };
    Ok(Json(tx))
}

// POST /api/admin/reconcile
#[derive(Deserialize)]
pub struct ReconcileQuery {
    pub vendor_id: Option<String>,
}

#[derive(Serialize)]
pub struct ReconcileResponse {
    pub created: u32,
}

pub async fn reconcile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ReconcileQuery>,
) -> Result<Json<ReconcileResponse>, AppError> {
    let created = {
        let db = state.db.lock().unwrap();
        auth::require_admin(&db, &headers, &state.config.admin_token)?;
        services::reconciliation::run_sweep(&db, query.vendor_id.as_deref())?
    };
    Ok(Json(ReconcileResponse { created }))
}

// GET /api/admin/reviews
#[derive(Deserialize)]
pub struct ReviewsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ReviewsQuery>,
) -> Result<Json<Vec<Review>>, AppError> {
    if let Some(status) = &query.status {
        if ReviewStatus::parse(status).is_none() {
            return Err(AppError::Validation(format!("unknown status '{status}'")));
        }
    }

    let reviews = {
        let db = state.db.lock().unwrap();
        auth::require_admin(&db, &headers, &state.config.admin_token)?;
        queries::list_reviews(&db, query.status.as_deref(), query.limit.unwrap_or(50))?
    };
    Ok(Json(reviews))
}

// POST /api/admin/reviews/:id/status
#[derive(Deserialize)]
pub struct ReviewStatusRequest {
    pub status: String,
}

pub async fn set_review_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReviewStatusRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = ReviewStatus::parse(&body.status)
        .ok_or_else(|| AppError::Validation(format!("unknown status '{}'", body.status)))?;

    let updated = {
        let db = state.db.lock().unwrap();
        auth::require_admin(&db, &headers, &state.config.admin_token)?;
        queries::update_review_status(&db, &id, &status)?
    };

    if !updated {
        return Err(AppError::NotFound("review not found".to_string()));
    }
    Ok(Json(serde_json::json!({"ok": true})))
}
