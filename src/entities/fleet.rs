// Fleet - vehicle input, seat-map/floor/seat layout rows, staff id pools
//
// Vehicles reference a seat map by id; the layout stage materializes the
// seat-map, floor and seat tables from them. Per-floor seat counts are
// derived from a SHA-256 digest of the seat-map id and floor number, so the
// layout is stable for a given vehicle fleet without being uniform.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::warn;

use crate::store::{soft_delete_stamp, KeyedRow};

const FLOOR1_FACTOR: f64 = 1.00;
const FLOOR2_FACTOR: f64 = 1.10;
const SEAT_FACTOR: f64 = 1.00;

const MIN_SEATS_PER_FLOOR: u64 = 15;
const MAX_SEATS_PER_FLOOR: u64 = 20;

/// Seats per row in every layout.
pub const SEAT_COLUMNS: usize = 4;

// ============================================================================
// VEHICLE INPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VehicleType {
    StandardBusVip,
    StandardBusNormal,
    Limousine,
}

impl VehicleType {
    /// Unknown or empty type strings fall back to the normal bus.
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "STANDARD_BUS_VIP" => VehicleType::StandardBusVip,
            "LIMOUSINE" => VehicleType::Limousine,
            _ => VehicleType::StandardBusNormal,
        }
    }

    /// Limousines are single-floor; every bus type has two.
    pub fn floor_count(&self) -> u32 {
        match self {
            VehicleType::Limousine => 1,
            _ => 2,
        }
    }

    pub fn seat_type(&self) -> &'static str {
        match self {
            VehicleType::Limousine => "SLEEPER",
            _ => "NORMAL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VehicleRecord {
    pub id: String,
    pub seat_map_id: String,
    pub vehicle_type: VehicleType,
    pub plate_number: String,
}

/// Read `vehicle.csv` (comma-delimited: id, seat_map_id, type, type_factor,
/// plate_number, ...). Rows without a seat map id are skipped.
pub fn load_vehicles(path: &Path) -> Result<Vec<VehicleRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open vehicles {}", path.display()))?;

    let mut vehicles = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable vehicle row");
                continue;
            }
        };
        let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();
        let seat_map_id = field(1);
        if field(0).is_empty() || seat_map_id.is_empty() {
            continue;
        }
        vehicles.push(VehicleRecord {
            id: field(0),
            seat_map_id,
            vehicle_type: VehicleType::parse(&field(2)),
            plate_number: field(4),
        });
    }
    Ok(vehicles)
}

/// Read the leading id column of a staff/vehicle pool file. A missing file
/// yields an empty pool; the caller decides whether that is fatal.
pub fn load_id_pool(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open id pool {}", path.display()))?;

    let mut ids = Vec::new();
    for result in reader.records() {
        if let Ok(record) = result {
            let id = record.get(0).unwrap_or("").trim().to_string();
            if !id.is_empty() {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}

// ============================================================================
// LAYOUT DERIVATION
// ============================================================================

/// Deterministic seat count in [15, 20] for one (seat map, floor) pair.
pub fn seat_count(seat_map_id: &str, floor_no: u32) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(format!("seatcount:{seat_map_id}:{floor_no}"));
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let n = u64::from_be_bytes(bytes) & 0x7FFF_FFFF_FFFF_FFFF;
    let span = MAX_SEATS_PER_FLOOR - MIN_SEATS_PER_FLOOR + 1;
    (MIN_SEATS_PER_FLOOR + n % span) as u32
}

/// Seat number from 1-based row/column: `A01`, `A02`, ... `B01`, ...
pub fn seat_no(row: u32, col: u32) -> String {
    let row_char = (b'A' + (row - 1) as u8) as char;
    format!("{row_char}{col:02}")
}

/// Display name for a seat map: the plate wins, then the type, then a
/// prefix of the id.
pub fn seat_map_name(vehicle: &VehicleRecord) -> String {
    if !vehicle.plate_number.is_empty() {
        format!("SM-{}", vehicle.plate_number)
    } else {
        let id: String = vehicle.seat_map_id.chars().take(8).collect();
        format!("SM-{id}")
    }
}

pub fn floor_key(seat_map_id: &str, floor_no: u32) -> String {
    format!("{}::{}", seat_map_id.to_lowercase(), floor_no)
}

pub fn seat_key(floor_id: i64, seat_no: &str) -> String {
    format!("{}::{}", floor_id, seat_no.to_lowercase())
}

// ============================================================================
// LAYOUT ROWS
// ============================================================================

pub const SEAT_MAP_HEADERS: &[&str] = &[
    "id",
    "name",
    "created_at",
    "updated_at",
    "is_deleted",
    "deleted_at",
    "deleted_by",
];

pub const FLOOR_HEADERS: &[&str] = &[
    "id",
    "seat_map_id",
    "floor_no",
    "price_factor_floor",
    "created_at",
    "updated_at",
    "is_deleted",
    "deleted_at",
    "deleted_by",
];

pub const SEAT_HEADERS: &[&str] = &[
    "id",
    "floor_id",
    "seat_no",
    "row_no",
    "col_no",
    "price_factor",
    "seat_type",
    "created_at",
    "updated_at",
    "is_deleted",
    "deleted_at",
    "deleted_by",
];

/// Seat-map rows keep the vehicle's seat map id verbatim (it may be a
/// non-numeric string); the id doubles as the natural key.
pub fn seat_map_id_key(fields: &[String]) -> Option<String> {
    let id = fields[0].trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_lowercase())
    }
}

pub fn floor_row_key(fields: &[String]) -> Option<String> {
    let seat_map_id = fields[1].trim();
    let floor_no = fields[2].trim();
    if seat_map_id.is_empty() || floor_no.is_empty() {
        None
    } else {
        Some(format!("{}::{}", seat_map_id.to_lowercase(), floor_no))
    }
}

pub fn seat_row_key(fields: &[String]) -> Option<String> {
    let floor_id = fields[1].trim();
    let seat_no = fields[2].trim();
    if floor_id.is_empty() || seat_no.is_empty() {
        None
    } else {
        Some(format!("{}::{}", floor_id, seat_no.to_lowercase()))
    }
}

pub fn seat_map_row(seat_map_id: &str, name: &str) -> KeyedRow {
    let stamp = soft_delete_stamp();
    KeyedRow {
        key: seat_map_id.to_lowercase(),
        record: vec![
            seat_map_id.to_string(),
            name.to_string(),
            stamp[0].clone(),
            stamp[1].clone(),
            stamp[2].clone(),
            stamp[3].clone(),
            stamp[4].clone(),
        ],
    }
}

pub fn floor_row(id: i64, seat_map_id: &str, floor_no: u32) -> KeyedRow {
    let factor = if floor_no == 2 { FLOOR2_FACTOR } else { FLOOR1_FACTOR };
    let stamp = soft_delete_stamp();
    KeyedRow {
        key: floor_key(seat_map_id, floor_no),
        record: vec![
            id.to_string(),
            seat_map_id.to_string(),
            floor_no.to_string(),
            format!("{factor:.3}"),
            stamp[0].clone(),
            stamp[1].clone(),
            stamp[2].clone(),
            stamp[3].clone(),
            stamp[4].clone(),
        ],
    }
}

pub fn seat_row(
    id: i64,
    floor_id: i64,
    row: u32,
    col: u32,
    seat_type: &'static str,
) -> KeyedRow {
    let number = seat_no(row, col);
    let stamp = soft_delete_stamp();
    KeyedRow {
        key: seat_key(floor_id, &number),
        record: vec![
            id.to_string(),
            floor_id.to_string(),
            number,
            row.to_string(),
            col.to_string(),
            format!("{SEAT_FACTOR:.3}"),
            seat_type.to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_type_parse() {
        assert_eq!(VehicleType::parse("LIMOUSINE"), VehicleType::Limousine);
        assert_eq!(VehicleType::parse("STANDARD_BUS_VIP"), VehicleType::StandardBusVip);
        assert_eq!(VehicleType::parse("STANDARD_BUS_NORMAL"), VehicleType::StandardBusNormal);
        assert_eq!(VehicleType::parse("anything else"), VehicleType::StandardBusNormal);
    }

    #[test]
    fn test_floor_count_and_seat_type() {
        assert_eq!(VehicleType::Limousine.floor_count(), 1);
        assert_eq!(VehicleType::StandardBusNormal.floor_count(), 2);
        assert_eq!(VehicleType::Limousine.seat_type(), "SLEEPER");
        assert_eq!(VehicleType::StandardBusVip.seat_type(), "NORMAL");
    }

    #[test]
    fn test_seat_count_stable_and_in_range() {
        let a = seat_count("sm-001", 1);
        assert_eq!(a, seat_count("sm-001", 1));
        for id in ["sm-001", "sm-002", "abc", "0e45f1"] {
            for floor in 1..=2 {
                let n = seat_count(id, floor);
                assert!((15..=20).contains(&n), "{id}:{floor} gave {n}");
            }
        }
    }

    #[test]
    fn test_seat_no_format() {
        assert_eq!(seat_no(1, 1), "A01");
        assert_eq!(seat_no(1, 4), "A04");
        assert_eq!(seat_no(2, 1), "B01");
        assert_eq!(seat_no(5, 3), "E03");
    }

    #[test]
    fn test_layout_row_shapes_and_keys() {
        let sm = seat_map_row("0E45F1AB", "SM-51A-12345");
        assert_eq!(sm.record.len(), SEAT_MAP_HEADERS.len());
        assert_eq!(sm.key, "0e45f1ab");
        assert_eq!(seat_map_id_key(&sm.record), Some("0e45f1ab".to_string()));

        let floor = floor_row(1500, "0E45F1AB", 2);
        assert_eq!(floor.record.len(), FLOOR_HEADERS.len());
        assert_eq!(floor.record[3], "1.100");
        assert_eq!(floor_row_key(&floor.record), Some(floor.key.clone()));

        let seat = seat_row(1501, 1500, 1, 2, "NORMAL");
        assert_eq!(seat.record.len(), SEAT_HEADERS.len());
        assert_eq!(seat.record[2], "A02");
        assert_eq!(seat_row_key(&seat.record), Some(seat.key.clone()));
    }

    #[test]
    fn test_seat_map_name_prefers_plate() {
        let with_plate = VehicleRecord {
            id: "1700".into(),
            seat_map_id: "0E45F1AB90".into(),
            vehicle_type: VehicleType::StandardBusNormal,
            plate_number: "51A-12345".into(),
        };
        assert_eq!(seat_map_name(&with_plate), "SM-51A-12345");

        let without = VehicleRecord {
            plate_number: String::new(),
            ..with_plate
        };
        assert_eq!(seat_map_name(&without), "SM-0E45F1AB");
    }
}
