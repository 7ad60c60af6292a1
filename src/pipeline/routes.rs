// Route stage - endpoint resolution over both ticket channels
//
// benxe tickets name endpoints as bare places, nhaxe as District - Province
// pairs; each goes through the matching station cascade. Tickets with an
// unresolvable endpoint are dropped (a route cannot be inserted without
// both foreign keys). Duplicate texts collapsing to the same station pair
// become one route.

use anyhow::Result;
use rand_xorshift::XorShiftRng;
use std::collections::HashSet;
use tracing::debug;

use crate::allocator::{IdRegistry, DEFAULT_ID_FLOOR};
use crate::config::Paths;
use crate::entities::route::{
    load_tickets, route_key, route_row, split_route_text, RouteCandidate, TicketChannel,
    ROUTE_HEADERS,
};
use crate::index::ReferenceIndex;
use crate::pipeline::StageSummary;
use crate::resolve::StationResolver;
use crate::store::AppendStore;

pub fn run(paths: &Paths, rng: &mut XorShiftRng) -> Result<StageSummary> {
    paths.ensure_output_dir()?;
    let mut summary = StageSummary::new("routes");

    let reference = ReferenceIndex::load(
        &paths.province_csv(),
        &paths.district_csv(),
        &paths.ward_csv(),
        &paths.station_csv(),
        &paths.address_csv(),
    )?;
    let resolver = StationResolver::new(&reference.geo, &reference.stations);

    let mut candidates: Vec<RouteCandidate> = Vec::new();
    let mut seen_pairs: HashSet<String> = HashSet::new();

    let sources = [
        (paths.tickets_benxe(), TicketChannel::Benxe),
        (paths.tickets_nhaxe(), TicketChannel::Nhaxe),
    ];
    for (path, channel) in sources {
        let (tickets, unreadable) = load_tickets(&path, channel)?;
        summary.loaded += tickets.len();
        summary.skipped += unreadable;

        for ticket in tickets {
            let Some((origin_text, destination_text)) = split_route_text(&ticket.route_text)
            else {
                summary.skipped += 1;
                continue;
            };

            let origin_id = resolve_endpoint(&resolver, channel, &origin_text, rng);
            let destination_id = resolve_endpoint(&resolver, channel, &destination_text, rng);
            let (Some(origin_id), Some(destination_id)) = (origin_id, destination_id) else {
                summary.skipped += 1;
                debug!(route = %ticket.route_text, channel = channel.name(), "unresolvable endpoint");
                continue;
            };
            summary.resolved += 1;

            let candidate = RouteCandidate::new(
                origin_text,
                destination_text,
                origin_id,
                destination_id,
                channel,
            );
            if seen_pairs.insert(candidate.key()) {
                candidates.push(candidate);
            }
        }
    }

    let mut store = AppendStore::open(&paths.route_csv(), ROUTE_HEADERS, b';', route_key)?;
    let mut route_ids = IdRegistry::seeded(DEFAULT_ID_FLOOR, store.existing_ids());

    let rows = candidates
        .iter()
        .map(|candidate| route_row(route_ids.get_or_create(&candidate.key()), candidate))
        .collect();
    summary.record_append("route.csv", store.append_rows(rows)?);
    Ok(summary)
}

fn resolve_endpoint(
    resolver: &StationResolver,
    channel: TicketChannel,
    text: &str,
    rng: &mut XorShiftRng,
) -> Option<i64> {
    match channel {
        TicketChannel::Benxe => resolver.resolve_place(text, rng),
        TicketChannel::Nhaxe => resolver.resolve_location(text, rng),
    }
}
