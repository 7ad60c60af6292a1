// Stations and addresses - scraped input rows and reference-table rows
//
// The scraper hands over a comma-delimited file of
// `station_slug, station_name, address, province`. The pipeline resolves
// each address to a ward and emits one address row and one station row; the
// station description carries the `Station in <Province>` sentinel the
// reference index later mines for per-province station lists.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

use crate::index::STATION_IN_PREFIX;
use crate::store::{soft_delete_stamp, KeyedRow};

// ============================================================================
// SCRAPED INPUT
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapedStation {
    pub station_slug: String,
    pub station_name: String,
    pub address: String,
    pub province: String,
}

/// Load the scraped station file. Mandatory for the station stage.
/// Rows that fail to deserialize are skipped with a warning.
pub fn load_scraped_stations(path: &Path) -> Result<Vec<ScrapedStation>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open scraped stations {}", path.display()))?;

    let mut stations = Vec::new();
    for result in reader.deserialize() {
        match result {
            Ok(station) => stations.push(station),
            Err(err) => warn!(path = %path.display(), %err, "skipping malformed scraped row"),
        }
    }
    Ok(stations)
}

// ============================================================================
// OUTPUT ROWS
// ============================================================================

pub const ADDRESS_HEADERS: &[&str] = &[
    "id",
    "street_address",
    "latitude",
    "longitude",
    "created_at",
    "updated_at",
    "is_deleted",
    "deleted_at",
    "deleted_by",
    "ward_id",
];

pub const STATION_HEADERS: &[&str] = &[
    "id",
    "name",
    "phone_number",
    "description",
    "active",
    "created_at",
    "updated_at",
    "is_deleted",
    "deleted_at",
    "deleted_by",
    "address_id",
    "station_img_id",
];

/// Natural key of an address row: the street text.
pub fn address_key(fields: &[String]) -> Option<String> {
    let street = fields[1].trim();
    if street.is_empty() {
        None
    } else {
        Some(street.to_string())
    }
}

/// Natural key of a station row: the station name.
pub fn station_key(fields: &[String]) -> Option<String> {
    let name = fields[1].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Address row; unresolved wards are retained with an empty foreign key so
/// the record is never silently lost.
pub fn address_row(id: i64, street: &str, ward_id: Option<i64>) -> KeyedRow {
    let stamp = soft_delete_stamp();
    KeyedRow {
        key: street.trim().to_string(),
        record: vec![
            id.to_string(),
            street.to_string(),
            String::new(),
            String::new(),
            stamp[0].clone(),
            stamp[1].clone(),
            stamp[2].clone(),
            stamp[3].clone(),
            stamp[4].clone(),
            ward_id.map(|w| w.to_string()).unwrap_or_default(),
        ],
    }
}

pub fn station_row(id: i64, name: &str, province: &str, address_id: i64) -> KeyedRow {
    let stamp = soft_delete_stamp();
    KeyedRow {
        key: name.trim().to_string(),
        record: vec![
            id.to_string(),
            name.to_string(),
            String::new(),
            format!("{STATION_IN_PREFIX}{province}"),
            "true".to_string(),
            stamp[0].clone(),
            stamp[1].clone(),
            stamp[2].clone(),
            stamp[3].clone(),
            stamp[4].clone(),
            address_id.to_string(),
            String::new(),
        ],
    }
}

// ============================================================================
// TESTS
// ============================================================================
