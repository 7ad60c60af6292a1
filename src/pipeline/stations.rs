// Station stage - resolve scraped addresses to wards, emit address + station
//
// Every scraped row produces one address row and one station row. Addresses
// whose ward never resolves are retained with an empty foreign key rather
// than dropped. Natural keys (street text, station name) keep re-runs from
// duplicating rows even though ward tie-breaks are random.

use anyhow::Result;
use rand_xorshift::XorShiftRng;
use tracing::debug;

use crate::allocator::{IdRegistry, DEFAULT_ID_FLOOR};
use crate::config::Paths;
use crate::entities::station::{
    address_key, address_row, load_scraped_stations, station_key, station_row, ADDRESS_HEADERS,
    STATION_HEADERS,
};
use crate::index::GeoIndex;
use crate::pipeline::StageSummary;
use crate::resolve::WardResolver;
use crate::store::AppendStore;

pub fn run(paths: &Paths, rng: &mut XorShiftRng) -> Result<StageSummary> {
    paths.ensure_output_dir()?;
    let mut summary = StageSummary::new("stations");

    let geo = GeoIndex::load(&paths.province_csv(), &paths.district_csv(), &paths.ward_csv())?;
    let resolver = WardResolver::new(&geo);
    let scraped = load_scraped_stations(&paths.scraped_stations())?;
    summary.loaded = scraped.len();

    let mut address_store =
        AppendStore::open(&paths.address_csv(), ADDRESS_HEADERS, b';', address_key)?;
    let mut station_store =
        AppendStore::open(&paths.station_csv(), STATION_HEADERS, b';', station_key)?;

    let mut address_ids = IdRegistry::seeded(DEFAULT_ID_FLOOR, address_store.existing_ids());
    let mut station_ids = IdRegistry::seeded(DEFAULT_ID_FLOOR, station_store.existing_ids());

    let mut address_rows = Vec::new();
    let mut station_rows = Vec::new();

    for record in &scraped {
        let matched = resolver.resolve(&record.address, &record.province, rng);
        match &matched {
            Some(found) => {
                summary.resolved += 1;
                debug!(station = %record.station_name, ward = %found.ward_name, "address resolved");
            }
            None => {
                summary.skipped += 1;
                debug!(station = %record.station_name, province = %record.province, "no province match");
            }
        }

        let address_id = address_ids.get_or_create(record.address.trim());
        let station_id = station_ids.get_or_create(record.station_name.trim());

        address_rows.push(address_row(
            address_id,
            &record.address,
            matched.map(|m| m.ward_id),
        ));
        station_rows.push(station_row(
            station_id,
            &record.station_name,
            &record.province,
            address_id,
        ));
    }

    summary.record_append("address.csv", address_store.append_rows(address_rows)?);
    summary.record_append("station.csv", station_store.append_rows(station_rows)?);
    Ok(summary)
}
