// Geography stage - province/district/ward tables from the JSON dataset
//
// Ids are allocated per tier, keyed by the official unit code, so re-runs
// reuse the ids already persisted and only genuinely new units (a dataset
// update) are appended. Parent foreign keys use the allocated ids, not the
// official codes.

use anyhow::Result;

use crate::allocator::{IdRegistry, DEFAULT_ID_FLOOR};
use crate::config::Paths;
use crate::entities::geo::{
    district_row, load_geo_dataset, province_row, unit_code_key, ward_row, DISTRICT_HEADERS,
    PROVINCE_HEADERS, WARD_HEADERS,
};
use crate::pipeline::StageSummary;
use crate::store::AppendStore;

pub fn run(paths: &Paths) -> Result<StageSummary> {
    paths.ensure_output_dir()?;
    let mut summary = StageSummary::new("geo");

    let provinces = load_geo_dataset(&paths.geo_dataset())?;

    let mut province_store =
        AppendStore::open(&paths.province_csv(), PROVINCE_HEADERS, b';', unit_code_key)?;
    let mut district_store =
        AppendStore::open(&paths.district_csv(), DISTRICT_HEADERS, b';', unit_code_key)?;
    let mut ward_store = AppendStore::open(&paths.ward_csv(), WARD_HEADERS, b';', unit_code_key)?;

    let mut province_ids = IdRegistry::seeded(DEFAULT_ID_FLOOR, province_store.existing_ids());
    let mut district_ids = IdRegistry::seeded(DEFAULT_ID_FLOOR, district_store.existing_ids());
    let mut ward_ids = IdRegistry::seeded(DEFAULT_ID_FLOOR, ward_store.existing_ids());

    let mut province_rows = Vec::new();
    let mut district_rows = Vec::new();
    let mut ward_rows = Vec::new();

    for province in &provinces {
        let province_id = province_ids.get_or_create(&province.code.to_string());
        province_rows.push(province_row(province_id, province));

        for district in &province.districts {
            let district_id = district_ids.get_or_create(&district.code.to_string());
            district_rows.push(district_row(district_id, district, province_id));

            for ward in &district.wards {
                let ward_id = ward_ids.get_or_create(&ward.code.to_string());
                ward_rows.push(ward_row(ward_id, ward, district_id));
            }
        }
    }

    summary.loaded = province_rows.len() + district_rows.len() + ward_rows.len();
    summary.resolved = summary.loaded;
    summary.skipped =
        province_store.skipped_rows() + district_store.skipped_rows() + ward_store.skipped_rows();

    summary.record_append("province.csv", province_store.append_rows(province_rows)?);
    summary.record_append("district.csv", district_store.append_rows(district_rows)?);
    summary.record_append("ward.csv", ward_store.append_rows(ward_rows)?);
    Ok(summary)
}
