// Trips - ticket-derived trip rows with stable natural keys
//
// A trip is identified by (route id, trip code, departure time). The trip
// code is derived from a SHA-256 digest of those natural attributes, so the
// same ticket always re-derives the same key and the appender can tell
// already-seen trips from new ones across runs.

use chrono::{NaiveDate, NaiveTime};
use sha2::{Digest, Sha256};

use crate::store::{soft_delete_stamp, KeyedRow, TIMESTAMP_FORMAT};

pub const TRIP_HEADERS: &[&str] = &[
    "id",
    "route_id",
    "vehicle_id",
    "driver_id",
    "attendant_id",
    "trip_code",
    "departure_time",
    "arrival_time",
    "base_fare",
    "created_at",
    "updated_at",
    "is_deleted",
    "deleted_at",
    "deleted_by",
];

// ============================================================================
// FIELD PARSING
// ============================================================================

/// Parse a scraped price like `"350.000đ"` or `"120000 VND"` into a fare.
/// Currency symbols and formatting are stripped; an empty remainder is None.
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Combine a ticket date (`dd-MM-yyyy`) and hour (`HH:mm`) into the
/// timestamp format used across the dataset. Malformed values yield None
/// and the ticket is skipped - a wall-clock fallback would mint a different
/// key every run.
pub fn format_trip_time(date_text: &str, hour_text: &str) -> Option<String> {
    let date = NaiveDate::parse_from_str(date_text.trim(), "%d-%m-%Y").ok()?;
    let time = NaiveTime::parse_from_str(hour_text.trim(), "%H:%M").ok()?;
    Some(date.and_time(time).format(TIMESTAMP_FORMAT).to_string())
}

/// Deterministic trip code: `TRIP` + six digits from a SHA-256 digest of
/// the natural attributes.
pub fn trip_code(route_id: i64, departure_time: &str, base_fare: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("trip:{route_id}:{departure_time}:{base_fare:.2}"));
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let n = u64::from_be_bytes(bytes) & 0x7FFF_FFFF_FFFF_FFFF;
    format!("TRIP{:06}", n % 1_000_000)
}

// ============================================================================
// TRIP ROWS
// ============================================================================

#[derive(Debug, Clone)]
pub struct TripDraft {
    pub route_id: i64,
    pub vehicle_id: String,
    pub driver_id: String,
    pub attendant_id: String,
    pub trip_code: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub base_fare: f64,
}

impl TripDraft {
    /// Natural key: route + code + departure, `|`-separated (none of the
    /// parts can contain a pipe).
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.route_id, self.trip_code, self.departure_time)
    }
}

/// Natural key of a persisted trip row.
pub fn trip_key(fields: &[String]) -> Option<String> {
    let route_id = fields[1].trim();
    let trip_code = fields[5].trim();
    let departure = fields[6].trim();
    if route_id.is_empty() || trip_code.is_empty() || departure.is_empty() {
        None
    } else {
        Some(format!("{route_id}|{trip_code}|{departure}"))
    }
}

pub fn trip_row(id: i64, draft: &TripDraft) -> KeyedRow {
    let stamp = soft_delete_stamp();
    KeyedRow {
        key: draft.key(),
        record: vec![
            id.to_string(),
            draft.route_id.to_string(),
            draft.vehicle_id.clone(),
            draft.driver_id.clone(),
            draft.attendant_id.clone(),
            draft.trip_code.clone(),
            draft.departure_time.clone(),
            draft.arrival_time.clone(),
            format!("{:.2}", draft.base_fare),
            stamp[0].clone(),
            stamp[1].clone(),
            stamp[2].clone(),
            stamp[3].clone(),
            stamp[4].clone(),
        ],
    }
}

// ============================================================================
// TESTS
// ============================================================================
