use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries::{self, ServiceFilter};
use crate::errors::AppError;
use crate::handlers::auth;
use crate::models::{Review, ReviewStatus, Role, Service, ServiceCategory, VendorStatus};
use crate::state::AppState;

/// A service is publicly visible only while it is active and its vendor is
/// approved.
fn publicly_visible(conn: &rusqlite::Connection, service: &Service) -> Result<bool, AppError> {
    if !service.is_active {
        return Ok(false);
    }
    let approved = queries::get_vendor(conn, &service.vendor_id)?
        .map(|v| v.status == VendorStatus::Approved)
        .unwrap_or(false);
    Ok(approved)
}

// GET /api/services
#[derive(Deserialize)]
pub struct SearchQuery {
    pub category: Option<String>,
    pub location: Option<String>,
    pub q: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn search_services(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Service>>, AppError> {
    if let Some(category) = &query.category {
        if ServiceCategory::parse(category).is_none() {
            return Err(AppError::Validation(format!("unknown category '{category}'")));
        }
    }

    let filter = ServiceFilter {
        category: query.category,
        location: query.location,
        q: query.q,
        min_price: query.min_price,
        max_price: query.max_price,
        limit: query.limit.unwrap_or(50),
    };

    let services = {
        let db = state.db.lock().unwrap();
        queries::search_services(&db, &filter)?
    };
    Ok(Json(services))
}

// GET /api/services/:id
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Service>, AppError> {
    let service = {
        let db = state.db.lock().unwrap();
        let service = queries::get_service(&db, &id)?
            .ok_or_else(|| AppError::NotFound("service not found".to_string()))?;
        if !publicly_visible(&db, &service)? {
            return Err(AppError::NotFound("service not found".to_string()));
        }
        service
    };
    Ok(Json(service))
}

// GET /api/services/:id/reviews
pub async fn get_service_reviews(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Review>>, AppError> {
    let reviews = {
        let db = state.db.lock().unwrap();
        if queries::get_service(&db, &id)?.is_none() {
            return Err(AppError::NotFound("service not found".to_string()));
        }
        queries::list_approved_reviews(&db, &id)?
    };
    Ok(Json(reviews))
}

// POST /api/services/:id/reviews
#[derive(Deserialize)]
pub struct PostReviewRequest {
    pub rating: i64,
    pub comment: Option<String>,
}

pub async fn post_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<PostReviewRequest>,
) -> Result<Json<Review>, AppError> {
    if !(1..=5).contains(&body.rating) {
        return Err(AppError::Validation("rating must be between 1 and 5".to_string()));
    }

    let review = {
        let db = state.db.lock().unwrap();
        let profile = auth::require_profile(&db, &headers)?;
        if profile.role != Role::Tourist {
            return Err(AppError::Forbidden("tourist account required".to_string()));
        }

        let service = queries::get_service(&db, &id)?
            .ok_or_else(|| AppError::NotFound("service not found".to_string()))?;
        if !publicly_visible(&db, &service)? {
            return Err(AppError::NotFound("service not found".to_string()));
        }

        let now = Utc::now().naive_utc();
        let review = Review {
            id: Uuid::new_v4().to_string(),
            service_id: service.id,
            tourist_id: profile.id,
            rating: body.rating,
            comment: body.comment,
            status: ReviewStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        queries::create_review(&db, &review)?;
        review
    };

    Ok(Json(review))
}
