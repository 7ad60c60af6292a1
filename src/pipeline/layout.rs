// Layout stage - seat_map, floor and seat tables from the vehicle fleet
//
// One seat map per distinct seat_map_id (first-seen vehicle names it),
// floors per vehicle type, seats in a fixed 4-column grid with a
// digest-derived per-floor count. Floor and seat ids come from their own
// sequences; existing layout rows keep their ids and only missing pieces
// are appended.

use anyhow::Result;
use std::collections::HashSet;
use tracing::warn;

use crate::allocator::{IdRegistry, DEFAULT_ID_FLOOR};
use crate::config::Paths;
use crate::entities::fleet::{
    floor_key, floor_row, floor_row_key, load_vehicles, seat_count, seat_key, seat_map_id_key,
    seat_map_name, seat_map_row, seat_no, seat_row, seat_row_key, FLOOR_HEADERS, SEAT_COLUMNS,
    SEAT_HEADERS, SEAT_MAP_HEADERS,
};
use crate::pipeline::StageSummary;
use crate::store::AppendStore;

pub fn run(paths: &Paths) -> Result<StageSummary> {
    paths.ensure_output_dir()?;
    let mut summary = StageSummary::new("layout");

    let vehicle_path = paths.vehicle_csv();
    if !vehicle_path.exists() {
        warn!(path = %vehicle_path.display(), "vehicle table missing, skipping layout generation");
        return Ok(summary);
    }
    let vehicles = load_vehicles(&vehicle_path)?;
    summary.loaded = vehicles.len();

    // First vehicle seen for a seat map decides its type and name
    let mut seen: HashSet<String> = HashSet::new();
    let mut seat_maps = Vec::new();
    for vehicle in &vehicles {
        if seen.insert(vehicle.seat_map_id.to_lowercase()) {
            seat_maps.push(vehicle);
        }
    }
    summary.resolved = seat_maps.len();

    let mut seat_map_store =
        AppendStore::open(&paths.seat_map_csv(), SEAT_MAP_HEADERS, b',', seat_map_id_key)?;
    let mut floor_store = AppendStore::open(&paths.floor_csv(), FLOOR_HEADERS, b',', floor_row_key)?;
    let mut seat_store = AppendStore::open(&paths.seat_csv(), SEAT_HEADERS, b',', seat_row_key)?;

    let mut floor_ids = IdRegistry::seeded(DEFAULT_ID_FLOOR, floor_store.existing_ids());
    let mut seat_ids = IdRegistry::seeded(DEFAULT_ID_FLOOR, seat_store.existing_ids());

    let mut seat_map_rows = Vec::new();
    let mut floor_rows = Vec::new();
    let mut seat_rows = Vec::new();

    for vehicle in seat_maps {
        let seat_map_id = &vehicle.seat_map_id;
        seat_map_rows.push(seat_map_row(seat_map_id, &seat_map_name(vehicle)));

        for floor_no in 1..=vehicle.vehicle_type.floor_count() {
            let floor_id = floor_ids.get_or_create(&floor_key(seat_map_id, floor_no));
            floor_rows.push(floor_row(floor_id, seat_map_id, floor_no));

            let seats = seat_count(seat_map_id, floor_no);
            for i in 0..seats {
                let row = i / SEAT_COLUMNS as u32 + 1;
                let col = i % SEAT_COLUMNS as u32 + 1;
                let seat_id = seat_ids.get_or_create(&seat_key(floor_id, &seat_no(row, col)));
                seat_rows.push(seat_row(
                    seat_id,
                    floor_id,
                    row,
                    col,
                    vehicle.vehicle_type.seat_type(),
                ));
            }
        }
    }

    summary.record_append("seat_map.csv", seat_map_store.append_rows(seat_map_rows)?);
    summary.record_append("floor.csv", floor_store.append_rows(floor_rows)?);
    summary.record_append("seat.csv", seat_store.append_rows(seat_rows)?);
    Ok(summary)
}
