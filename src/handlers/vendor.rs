use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries::{self, BookingFilter, TransactionFilter};
use crate::errors::AppError;
use crate::handlers::auth;
use crate::handlers::bookings::{parse_state_request, BookingDetailResponse, BookingStateRequest};
use crate::models::{
    Booking, Profile, Service, ServiceCategory, Transaction, Vendor, Wallet, WalletStats,
};
use crate::services;
use crate::state::AppState;

// GET /api/vendor/me
#[derive(Serialize)]
pub struct VendorMeResponse {
    pub profile: Profile,
    pub vendor: Vendor,
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<VendorMeResponse>, AppError> {
    let (profile, vendor) = {
        let db = state.db.lock().unwrap();
        auth::require_vendor(&db, &headers)?
    };
    Ok(Json(VendorMeResponse { profile, vendor }))
}

// POST /api/vendor/services
#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub price: i64,
    pub currency: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateServiceRequest>,
) -> Result<Json<Service>, AppError> {
    if body.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    let category = ServiceCategory::parse(&body.category)
        .ok_or_else(|| AppError::Validation(format!("unknown category '{}'", body.category)))?;
    if body.price <= 0 {
        return Err(AppError::Validation("price must be positive".to_string()));
    }

    let service = {
        let db = state.db.lock().unwrap();
        let (_, vendor) = auth::require_vendor(&db, &headers)?;

        let now = Utc::now().naive_utc();
        let service = Service {
            id: Uuid::new_v4().to_string(),
            vendor_id: vendor.id,
            title: body.title.trim().to_string(),
            description: body.description,
            category,
            price: body.price,
            currency: body
                .currency
                .unwrap_or_else(|| state.config.default_currency.clone()),
            location: body.location,
            image_url: body.image_url,
            is_active: true,
            duration_hours: None,
            max_group_size: None,
            meeting_point: None,
            star_rating: None,
            room_type: None,
            amenities: None,
            vehicle_type: None,
            seat_count: None,
            route_from: None,
            route_to: None,
            airline: None,
            departure_airport: None,
            arrival_airport: None,
            departure_time: None,
            venue: None,
            event_date: None,
            ticket_type: None,
            cuisine: None,
            menu_url: None,
            opening_hours: None,
            languages: None,
            years_experience: None,
            specialties: None,
            created_at: now,
            updated_at: now,
        };
        queries::create_service(&db, &service)?;
        service
    };

    tracing::info!(service_id = %service.id, category = %service.category.as_str(), "service created");
    Ok(Json(service))
}

// GET /api/vendor/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Service>>, AppError> {
    let services = {
        let db = state.db.lock().unwrap();
        let (_, vendor) = auth::require_vendor(&db, &headers)?;
        queries::list_services_for_vendor(&db, &vendor.id)?
    };
    Ok(Json(services))
}

// PATCH /api/vendor/services/:id
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<Service>, AppError> {
    let payload = body
        .as_object()
        .ok_or_else(|| AppError::Validation("expected a JSON object".to_string()))?;

    let service = {
        let db = state.db.lock().unwrap();
        let (_, vendor) = auth::require_vendor(&db, &headers)?;
        services::catalog::update_service(&db, &vendor.id, &id, payload)?
            .ok_or_else(|| AppError::NotFound("service not found".to_string()))?
    };
    Ok(Json(service))
}

// DELETE /api/vendor/services/:id
pub async fn deactivate_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Service>, AppError> {
    let service = {
        let db = state.db.lock().unwrap();
        let (_, vendor) = auth::require_vendor(&db, &headers)?;
        services::catalog::deactivate_service(&db, &vendor.id, &id)?
            .ok_or_else(|| AppError::NotFound("service not found".to_string()))?
    };
    Ok(Json(service))
}

// GET /api/vendor/bookings
#[derive(Deserialize)]
pub struct VendorBookingsQuery {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<VendorBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = {
        let db = state.db.lock().unwrap();
        let (_, vendor) = auth::require_vendor(&db, &headers)?;

        let filter = BookingFilter {
            status: query.status,
            payment_status: query.payment_status,
            vendor_id: Some(vendor.id),
            limit: query.limit.unwrap_or(50),
            ..Default::default()
        };
        queries::list_bookings(&db, &filter)?
    };
    Ok(Json(bookings))
}

// POST /api/vendor/bookings/:id/status
pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<BookingStateRequest>,
) -> Result<Json<BookingDetailResponse>, AppError> {
    let update = parse_state_request(&body)?;

    let detail = {
        let db = state.db.lock().unwrap();
        let (_, vendor) = auth::require_vendor(&db, &headers)?;

        let booking = queries::get_booking(&db, &id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
        if booking.vendor_id != vendor.id {
            return Err(AppError::Forbidden(
                "booking does not belong to this vendor".to_string(),
            ));
        }

        services::bookings::apply_state_update(&db, &id, update)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?
    };

    Ok(Json(detail.into()))
}

// GET /api/vendor/wallet
//
// Both balance notions side by side: the cached wallet row and the figures
// recomputed from the ledger. They can disagree.
#[derive(Serialize)]
pub struct WalletOverviewResponse {
    pub cached: Option<Wallet>,
    pub computed: WalletStats,
}

pub async fn wallet(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<WalletOverviewResponse>, AppError> {
    let overview = {
        let db = state.db.lock().unwrap();
        let (_, vendor) = auth::require_vendor(&db, &headers)?;

        WalletOverviewResponse {
            cached: queries::get_wallet(&db, &vendor.id)?,
            computed: services::wallets::stats_or_default(&db, &vendor.id),
        }
    };
    Ok(Json(overview))
}

// GET /api/vendor/transactions
#[derive(Deserialize)]
pub struct VendorTransactionsQuery {
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<VendorTransactionsQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let transactions = {
        let db = state.db.lock().unwrap();
        let (_, vendor) = auth::require_vendor(&db, &headers)?;

        let filter = TransactionFilter {
            vendor_id: Some(vendor.id),
            transaction_type: query.transaction_type,
            status: query.status,
            limit: query.limit.unwrap_or(50),
        };
        queries::list_transactions(&db, &filter)?
    };
    Ok(Json(transactions))
}

// POST /api/vendor/withdrawals
#[derive(Deserialize)]
pub struct WithdrawalRequestBody {
    pub amount: i64,
    pub description: Option<String>,
}

pub async fn request_withdrawal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<WithdrawalRequestBody>,
) -> Result<Json<Transaction>, AppError> {
    let tx = {
        let db = state.db.lock().unwrap();
        let (_, vendor) = auth::require_vendor(&db, &headers)?;

        let currency = queries::get_wallet(&db, &vendor.id)?
            .map(|w| w.currency)
            .unwrap_or_else(|| state.config.default_currency.clone());
        services::payments::request_withdrawal(
            &db,
            &vendor.id,
            body.amount,
            &currency,
            body.description,
        )?
    };
    Ok(Json(tx))
}
