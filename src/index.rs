// Reference index - in-memory lookup maps built once per run
//
// Loads the administrative hierarchy (province/district/ward) and the
// station/address reference tables, and exposes the name maps, parent
// back-references and per-province station lists the resolution cascade
// consults. Units are stored in file order; "first seen wins" answers are
// therefore reproducible run to run.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::normalize::normalize_unit;

// ============================================================================
// ADMINISTRATIVE UNITS
// ============================================================================

#[derive(Debug, Clone)]
pub struct Province {
    pub id: i64,
    pub name: String,
    pub normalized: String,
}

#[derive(Debug, Clone)]
pub struct District {
    pub id: i64,
    pub name: String,
    pub normalized: String,
    pub province_id: i64,
}

#[derive(Debug, Clone)]
pub struct Ward {
    pub id: i64,
    pub name: String,
    pub normalized: String,
    pub district_id: i64,
}

/// Three-tier administrative geography with name maps per tier.
///
/// Name maps are keyed on the normalized form and are last-write-wins on
/// collision: a district in one province can shadow a same-named district
/// in another. Known limitation, kept as-is; the cascade works around it by
/// scanning the ordered unit lists where province context matters.
#[derive(Debug, Default)]
pub struct GeoIndex {
    provinces: Vec<Province>,
    districts: Vec<District>,
    wards: Vec<Ward>,

    province_by_name: HashMap<String, usize>,
    district_by_name: HashMap<String, usize>,
    ward_by_name: HashMap<String, usize>,
    district_to_province: HashMap<i64, i64>,
    ward_to_district: HashMap<i64, i64>,

    skipped_rows: usize,
}

impl GeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the three reference files. All three are mandatory.
    pub fn load(province_path: &Path, district_path: &Path, ward_path: &Path) -> Result<Self> {
        let mut index = GeoIndex::new();

        for fields in read_reference_rows(province_path, &mut index.skipped_rows)? {
            match parse_unit_row(&fields, 2, None) {
                Some((id, name)) => index.push_province(id, name),
                None => {
                    index.skipped_rows += 1;
                    warn!(path = %province_path.display(), row = ?fields.first(), "malformed province row");
                }
            }
        }
        for fields in read_reference_rows(district_path, &mut index.skipped_rows)? {
            match parse_unit_row(&fields, 2, Some(13)) {
                Some((id, name)) => {
                    let province_id = fields[13].trim().parse().unwrap_or(0);
                    index.push_district(id, name, province_id);
                }
                None => {
                    index.skipped_rows += 1;
                    warn!(path = %district_path.display(), row = ?fields.first(), "malformed district row");
                }
            }
        }
        for fields in read_reference_rows(ward_path, &mut index.skipped_rows)? {
            match parse_unit_row(&fields, 2, Some(13)) {
                Some((id, name)) => {
                    let district_id = fields[13].trim().parse().unwrap_or(0);
                    index.push_ward(id, name, district_id);
                }
                None => {
                    index.skipped_rows += 1;
                    warn!(path = %ward_path.display(), row = ?fields.first(), "malformed ward row");
                }
            }
        }

        debug!(
            provinces = index.provinces.len(),
            districts = index.districts.len(),
            wards = index.wards.len(),
            skipped = index.skipped_rows,
            "geo index built"
        );
        Ok(index)
    }

    pub fn push_province(&mut self, id: i64, name: String) {
        let normalized = normalize_unit(&name);
        if self.province_by_name.contains_key(&normalized) {
            debug!(%name, "province name collision, last write wins");
        }
        self.province_by_name.insert(normalized.clone(), self.provinces.len());
        self.provinces.push(Province { id, name, normalized });
    }

    pub fn push_district(&mut self, id: i64, name: String, province_id: i64) {
        let normalized = normalize_unit(&name);
        if self.district_by_name.contains_key(&normalized) {
            debug!(%name, "district name collision, last write wins");
        }
        self.district_by_name.insert(normalized.clone(), self.districts.len());
        self.district_to_province.insert(id, province_id);
        self.districts.push(District { id, name, normalized, province_id });
    }

    pub fn push_ward(&mut self, id: i64, name: String, district_id: i64) {
        let normalized = normalize_unit(&name);
        if self.ward_by_name.contains_key(&normalized) {
            debug!(%name, "ward name collision, last write wins");
        }
        self.ward_by_name.insert(normalized.clone(), self.wards.len());
        self.ward_to_district.insert(id, district_id);
        self.wards.push(Ward { id, name, normalized, district_id });
    }

    pub fn provinces(&self) -> &[Province] {
        &self.provinces
    }

    pub fn districts(&self) -> &[District] {
        &self.districts
    }

    pub fn wards(&self) -> &[Ward] {
        &self.wards
    }

    pub fn province_by_id(&self, id: i64) -> Option<&Province> {
        self.provinces.iter().find(|p| p.id == id)
    }

    pub fn province_of_district(&self, district_id: i64) -> Option<i64> {
        self.district_to_province.get(&district_id).copied()
    }

    pub fn district_of_ward(&self, ward_id: i64) -> Option<i64> {
        self.ward_to_district.get(&ward_id).copied()
    }

    /// Exact lookup on the normalized name.
    pub fn province_by_normalized(&self, normalized: &str) -> Option<&Province> {
        self.province_by_name.get(normalized).map(|&i| &self.provinces[i])
    }

    pub fn district_by_normalized(&self, normalized: &str) -> Option<&District> {
        self.district_by_name.get(normalized).map(|&i| &self.districts[i])
    }

    /// Districts of a province, in input order.
    pub fn districts_of(&self, province_id: i64) -> Vec<&District> {
        self.districts.iter().filter(|d| d.province_id == province_id).collect()
    }

    /// Wards of a district, in input order.
    pub fn wards_of(&self, district_id: i64) -> Vec<&Ward> {
        self.wards.iter().filter(|w| w.district_id == district_id).collect()
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

// ============================================================================
// STATIONS & ADDRESSES
// ============================================================================

/// Sentinel prefix in the station description field carrying the province.
pub const STATION_IN_PREFIX: &str = "Station in ";

#[derive(Debug, Clone)]
pub struct StationRef {
    pub id: i64,
    pub name: String,
    pub normalized: String,
    pub address_id: i64,
}

/// Station/address side of the reference data.
///
/// Derives, from the `Station in <Province>` sentinel, both the full
/// station list per province and a first-seen default station per province.
#[derive(Debug, Default)]
pub struct StationIndex {
    stations: Vec<StationRef>,
    name_to_station: HashMap<String, i64>,

    /// Insertion-ordered (normalized province, display name, default id).
    province_defaults: Vec<(String, String, i64)>,
    province_stations: HashMap<String, Vec<i64>>,

    address_text: HashMap<i64, String>,
    skipped_rows: usize,
}

impl StationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `station.csv` and `address.csv`. Both are mandatory for
    /// route resolution.
    pub fn load(station_path: &Path, address_path: &Path) -> Result<Self> {
        let mut index = StationIndex::new();

        for fields in read_reference_rows(address_path, &mut index.skipped_rows)? {
            if fields.len() < 2 {
                index.skipped_rows += 1;
                continue;
            }
            match fields[0].trim().parse::<i64>() {
                Ok(id) => index.push_address(id, fields[1].clone()),
                Err(_) => {
                    index.skipped_rows += 1;
                    warn!(path = %address_path.display(), "malformed address row");
                }
            }
        }

        for fields in read_reference_rows(station_path, &mut index.skipped_rows)? {
            if fields.len() < 4 {
                index.skipped_rows += 1;
                continue;
            }
            let id = match fields[0].trim().parse::<i64>() {
                Ok(id) => id,
                Err(_) => {
                    index.skipped_rows += 1;
                    warn!(path = %station_path.display(), "malformed station row");
                    continue;
                }
            };
            let name = fields[1].clone();
            let description = fields[3].clone();
            // Absent address column falls back to address_id = station id
            let address_id = fields
                .get(10)
                .and_then(|f| f.trim().parse::<i64>().ok())
                .unwrap_or(id);
            let province = description
                .strip_prefix(STATION_IN_PREFIX)
                .map(|p| p.to_string());
            index.push_station(id, name, address_id, province);
        }

        debug!(
            stations = index.stations.len(),
            addresses = index.address_text.len(),
            provinces = index.province_defaults.len(),
            skipped = index.skipped_rows,
            "station index built"
        );
        Ok(index)
    }

    pub fn push_address(&mut self, id: i64, street: String) {
        self.address_text.insert(id, street);
    }

    pub fn push_station(&mut self, id: i64, name: String, address_id: i64, province: Option<String>) {
        let normalized = normalize_unit(&name);
        self.name_to_station.insert(normalized.clone(), id);
        if let Some(province) = province {
            let key = normalize_unit(&province);
            // First station of a province is its default; order = input order
            if !self.province_stations.contains_key(&key) {
                self.province_defaults.push((key.clone(), province, id));
            }
            self.province_stations.entry(key).or_default().push(id);
        }
        self.stations.push(StationRef { id, name, normalized, address_id });
    }

    pub fn stations(&self) -> &[StationRef] {
        &self.stations
    }

    pub fn station_by_normalized_name(&self, normalized: &str) -> Option<i64> {
        self.name_to_station.get(normalized).copied()
    }

    /// Default (first-seen) station per province, insertion-ordered as
    /// `(normalized province name, display name, station id)`.
    pub fn province_defaults(&self) -> &[(String, String, i64)] {
        &self.province_defaults
    }

    pub fn default_station_of(&self, normalized_province: &str) -> Option<i64> {
        self.province_defaults
            .iter()
            .find(|(key, _, _)| key == normalized_province)
            .map(|(_, _, id)| *id)
    }

    /// All stations of a province (normalized name), input order.
    pub fn stations_of_province(&self, normalized_province: &str) -> &[i64] {
        self.province_stations
            .get(normalized_province)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolved address text of a station, if its address is known.
    pub fn address_of_station(&self, station: &StationRef) -> Option<&str> {
        self.address_text.get(&station.address_id).map(String::as_str)
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

// ============================================================================
// COMBINED INDEX
// ============================================================================

/// Everything the resolution cascade needs, built once per run.
pub struct ReferenceIndex {
    pub geo: GeoIndex,
    pub stations: StationIndex,
}

impl ReferenceIndex {
    pub fn load(
        province_path: &Path,
        district_path: &Path,
        ward_path: &Path,
        station_path: &Path,
        address_path: &Path,
    ) -> Result<Self> {
        Ok(ReferenceIndex {
            geo: GeoIndex::load(province_path, district_path, ward_path)?,
            stations: StationIndex::load(station_path, address_path)?,
        })
    }
}

// ============================================================================
// REFERENCE FILE READING
// ============================================================================

/// Read a semicolon-delimited reference file, header skipped, yielding raw
/// field vectors. Unreadable lines are counted into `skipped` instead of
/// aborting; a missing file is fatal.
fn read_reference_rows(path: &Path, skipped: &mut usize) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open reference file {}", path.display()))?;

    let mut rows = Vec::new();
    for result in reader.records() {
        match result {
            Ok(record) => rows.push(record.iter().map(|f| f.to_string()).collect()),
            Err(err) => {
                *skipped += 1;
                debug!(path = %path.display(), %err, "unreadable reference row");
            }
        }
    }
    Ok(rows)
}

/// `(id, name)` from a reference row, requiring a numeric id at column 0,
/// the name at `name_col`, and (when given) a parseable parent column.
fn parse_unit_row(fields: &[String], name_col: usize, parent_col: Option<usize>) -> Option<(i64, String)> {
    let required = parent_col.map_or(name_col, |p| p.max(name_col)) + 1;
    if fields.len() < required {
        return None;
    }
    let id = fields[0].trim().parse::<i64>().ok()?;
    if let Some(p) = parent_col {
        fields[p].trim().parse::<i64>().ok()?;
    }
    Some((id, fields[name_col].clone()))
}

// ============================================================================
// TESTS
// ============================================================================
