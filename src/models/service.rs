use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A bookable offering. Every category shares the same flat row; the
/// category decides which of the optional attribute columns are meaningful
/// (and which keys an update is allowed to touch).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub vendor_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: ServiceCategory,
    pub price: i64,
    pub currency: String,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub duration_hours: Option<i64>,
    pub max_group_size: Option<i64>,
    pub meeting_point: Option<String>,
    pub star_rating: Option<i64>,
    pub room_type: Option<String>,
    pub amenities: Option<String>,
    pub vehicle_type: Option<String>,
    pub seat_count: Option<i64>,
    pub route_from: Option<String>,
    pub route_to: Option<String>,
    pub airline: Option<String>,
    pub departure_airport: Option<String>,
    pub arrival_airport: Option<String>,
    pub departure_time: Option<String>,
    pub venue: Option<String>,
    pub event_date: Option<String>,
    pub ticket_type: Option<String>,
    pub cuisine: Option<String>,
    pub menu_url: Option<String>,
    pub opening_hours: Option<String>,
    pub languages: Option<String>,
    pub years_experience: Option<i64>,
    pub specialties: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceCategory {
    Tour,
    Hotel,
    Transport,
    Flight,
    Event,
    Restaurant,
    Guide,
}

impl ServiceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceCategory::Tour => "tour",
            ServiceCategory::Hotel => "hotel",
            ServiceCategory::Transport => "transport",
            ServiceCategory::Flight => "flight",
            ServiceCategory::Event => "event",
            ServiceCategory::Restaurant => "restaurant",
            ServiceCategory::Guide => "guide",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tour" => Some(ServiceCategory::Tour),
            "hotel" => Some(ServiceCategory::Hotel),
            "transport" => Some(ServiceCategory::Transport),
            "flight" => Some(ServiceCategory::Flight),
            "event" => Some(ServiceCategory::Event),
            "restaurant" => Some(ServiceCategory::Restaurant),
            "guide" => Some(ServiceCategory::Guide),
            _ => None,
        }
    }

    /// Attribute columns an update may touch for this category, on top of
    /// the common set every category shares. Keys outside the combined
    /// whitelist are dropped without error.
    pub fn attribute_columns(&self) -> &'static [&'static str] {
        match self {
            ServiceCategory::Tour => &["duration_hours", "max_group_size", "meeting_point"],
            ServiceCategory::Hotel => &["star_rating", "room_type", "amenities"],
            ServiceCategory::Transport => {
                &["vehicle_type", "seat_count", "route_from", "route_to"]
            }
            ServiceCategory::Flight => &[
                "airline",
                "departure_airport",
                "arrival_airport",
                "departure_time",
            ],
            ServiceCategory::Event => &["venue", "event_date", "ticket_type"],
            ServiceCategory::Restaurant => &["cuisine", "menu_url", "opening_hours"],
            ServiceCategory::Guide => &["languages", "years_experience", "specialties"],
        }
    }
}
