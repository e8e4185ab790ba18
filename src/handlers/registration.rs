use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Profile, Role, Vendor, VendorStatus};
use crate::state::AppState;

fn new_profile(full_name: &str, email: &str, phone: &str, role: Role) -> Profile {
    let now = Utc::now().naive_utc();
    Profile {
        id: Uuid::new_v4().to_string(),
        full_name: full_name.trim().to_string(),
        email: email.trim().to_string(),
        phone: phone.trim().to_string(),
        role,
        api_key: Uuid::new_v4().to_string(),
        created_at: now,
        updated_at: now,
    }
}

fn require_fields(fields: &[(&str, &str)]) -> Result<(), AppError> {
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{name} is required")));
        }
    }
    Ok(())
}

fn create_profile_checked(conn: &rusqlite::Connection, profile: &Profile) -> Result<(), AppError> {
    if let Err(e) = queries::create_profile(conn, profile) {
        if queries::is_unique_violation(&e) {
            return Err(AppError::Validation("email already registered".to_string()));
        }
        return Err(e.into());
    }
    Ok(())
}

// POST /api/register/tourist
#[derive(Deserialize)]
pub struct RegisterTouristRequest {
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Serialize)]
pub struct TouristRegistrationResponse {
    pub profile: Profile,
    /// Returned once at registration; all later calls authenticate with it.
    pub api_key: String,
}

pub async fn register_tourist(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterTouristRequest>,
) -> Result<Json<TouristRegistrationResponse>, AppError> {
    require_fields(&[
        ("full_name", &body.full_name),
        ("email", &body.email),
        ("phone", &body.phone),
    ])?;

    let profile = new_profile(&body.full_name, &body.email, &body.phone, Role::Tourist);

    {
        let db = state.db.lock().unwrap();
        create_profile_checked(&db, &profile)?;
    }

    tracing::info!(profile_id = %profile.id, "tourist registered");
    let api_key = profile.api_key.clone();
    Ok(Json(TouristRegistrationResponse { profile, api_key }))
}

// POST /api/register/vendor
#[derive(Deserialize)]
pub struct RegisterVendorRequest {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub business_name: String,
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct VendorRegistrationResponse {
    pub profile: Profile,
    pub vendor: Vendor,
    pub api_key: String,
}

pub async fn register_vendor(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterVendorRequest>,
) -> Result<Json<VendorRegistrationResponse>, AppError> {
    require_fields(&[
        ("full_name", &body.full_name),
        ("email", &body.email),
        ("phone", &body.phone),
        ("business_name", &body.business_name),
    ])?;

    let profile = new_profile(&body.full_name, &body.email, &body.phone, Role::Vendor);
    let now = Utc::now().naive_utc();
    let vendor = Vendor {
        id: Uuid::new_v4().to_string(),
        profile_id: profile.id.clone(),
        business_name: body.business_name.trim().to_string(),
        description: body.description.clone(),
        status: VendorStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    {
        let db = state.db.lock().unwrap();
        // One transaction: a failed vendor insert must not leave an orphan
        // profile holding the email.
        let tx = db.unchecked_transaction()?;
        create_profile_checked(&tx, &profile)?;
        queries::create_vendor(&tx, &vendor)?;
        tx.commit()?;
    }

    tracing::info!(
        vendor_id = %vendor.id,
        business_name = %vendor.business_name,
        "vendor registered, awaiting approval"
    );
    let api_key = profile.api_key.clone();
    Ok(Json(VendorRegistrationResponse {
        profile,
        vendor,
        api_key,
    }))
}
