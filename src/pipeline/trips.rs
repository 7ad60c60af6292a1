// Trip stage - tickets to trip rows against the persisted route table
//
// Each ticket is matched to a route by code (exact, then bidirectional
// substring, then a uniform-random route), its timestamps derived from the
// ticket date and hour columns, and its crew/vehicle drawn at random from
// the id pools. The natural key is fully deterministic, so the random
// assignments are only ever made once per logical trip.

use anyhow::{Context, Result};
use rand::Rng;
use rand_xorshift::XorShiftRng;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::allocator::{IdRegistry, DEFAULT_ID_FLOOR};
use crate::config::Paths;
use crate::entities::fleet::load_id_pool;
use crate::entities::route::{load_tickets, split_route_text, TicketChannel};
use crate::entities::trip::{
    format_trip_time, parse_price, trip_code, trip_key, trip_row, TripDraft, TRIP_HEADERS,
};
use crate::normalize::route_code;
use crate::pipeline::StageSummary;
use crate::store::AppendStore;

// ============================================================================
// ROUTE CATALOG
// ============================================================================

struct RouteEntry {
    id: i64,
    code: String,
}

/// Load the persisted route table (id and code columns). An absent table
/// reads as empty; the stage then skips with a warning.
fn load_route_catalog(path: &Path) -> Result<Vec<RouteEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open route table {}", path.display()))?;

    let mut catalog = Vec::new();
    for result in reader.records() {
        let Ok(record) = result else { continue };
        let id = record.get(0).unwrap_or("").trim().parse::<i64>();
        let code = record.get(1).unwrap_or("").trim().to_string();
        if let (Ok(id), false) = (id, code.is_empty()) {
            catalog.push(RouteEntry { id, code });
        }
    }
    Ok(catalog)
}

/// Exact code match, then bidirectional containment, then a random route.
fn find_route<'a>(
    catalog: &'a [RouteEntry],
    code: &str,
    rng: &mut XorShiftRng,
) -> Option<&'a RouteEntry> {
    if let Some(entry) = catalog.iter().find(|r| r.code == code) {
        return Some(entry);
    }
    if let Some(entry) = catalog
        .iter()
        .find(|r| r.code.contains(code) || code.contains(&r.code))
    {
        return Some(entry);
    }
    if catalog.is_empty() {
        None
    } else {
        Some(&catalog[rng.gen_range(0..catalog.len())])
    }
}

// ============================================================================
// STAGE
// ============================================================================

pub fn run(paths: &Paths, rng: &mut XorShiftRng) -> Result<StageSummary> {
    paths.ensure_output_dir()?;
    let mut summary = StageSummary::new("trips");

    let catalog = load_route_catalog(&paths.route_csv())?;
    let vehicles = load_id_pool(&paths.vehicle_csv())?;
    let drivers = load_id_pool(&paths.driver_csv())?;
    let attendants = load_id_pool(&paths.attendant_csv())?;

    if catalog.is_empty() {
        warn!("route table is empty, no trips to generate");
        return Ok(summary);
    }
    if vehicles.is_empty() || drivers.is_empty() || attendants.is_empty() {
        warn!(
            vehicles = vehicles.len(),
            drivers = drivers.len(),
            attendants = attendants.len(),
            "vehicle/driver/attendant pools incomplete, skipping trip generation"
        );
        return Ok(summary);
    }

    // Sorted by natural key: id assignment order is stable run to run
    let mut drafts: BTreeMap<String, TripDraft> = BTreeMap::new();

    let sources = [
        (paths.tickets_benxe(), TicketChannel::Benxe),
        (paths.tickets_nhaxe(), TicketChannel::Nhaxe),
    ];
    for (path, channel) in sources {
        let (tickets, unreadable) = load_tickets(&path, channel)?;
        summary.loaded += tickets.len();
        summary.skipped += unreadable;

        for ticket in tickets {
            let Some((origin, destination)) = split_route_text(&ticket.route_text) else {
                summary.skipped += 1;
                continue;
            };
            let code = route_code(&origin, &destination);
            let Some(route) = find_route(&catalog, &code, rng) else {
                summary.skipped += 1;
                continue;
            };

            let departure = format_trip_time(ticket.date_text(), ticket.departure_hour());
            let arrival = format_trip_time(ticket.date_text(), ticket.arrival_hour());
            let fare = parse_price(ticket.price_text());
            let (Some(departure), Some(arrival), Some(fare)) = (departure, arrival, fare) else {
                summary.skipped += 1;
                debug!(route = %ticket.route_text, "unparseable time or price");
                continue;
            };
            summary.resolved += 1;

            let draft = TripDraft {
                route_id: route.id,
                vehicle_id: vehicles[rng.gen_range(0..vehicles.len())].clone(),
                driver_id: drivers[rng.gen_range(0..drivers.len())].clone(),
                attendant_id: attendants[rng.gen_range(0..attendants.len())].clone(),
                trip_code: trip_code(route.id, &departure, fare),
                departure_time: departure,
                arrival_time: arrival,
                base_fare: fare,
            };
            drafts.entry(draft.key()).or_insert(draft);
        }
    }

    let mut store = AppendStore::open(&paths.trip_csv(), TRIP_HEADERS, b',', trip_key)?;
    let mut trip_ids = IdRegistry::seeded(DEFAULT_ID_FLOOR, store.existing_ids());

    let rows = drafts
        .values()
        .map(|draft| trip_row(trip_ids.get_or_create(&draft.key()), draft))
        .collect();
    summary.record_append("trip.csv", store.append_rows(rows)?);
    Ok(summary)
}
