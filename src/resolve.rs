// Resolution cascades - free text to administrative unit / station ids
//
// Two cascades share the reference index: address text → ward id and route
// endpoint text → station id. Each is an ordered list of strategies, first
// success wins. Ambiguity is resolved by a uniform pick from the injected
// RNG, never surfaced as an error: once a province resolves, the ward
// cascade always produces an answer (degraded to same-province randomness
// rather than leaving the record unresolved).

use rand::Rng;
use rand_xorshift::XorShiftRng;
use tracing::debug;

use crate::index::{District, GeoIndex, Province, StationIndex, Ward};
use crate::normalize::normalize_unit;

/// Normalized name of the province the colloquial alias points at.
const HCM_PROVINCE: &str = "ho chi minh";

/// Colloquial / abbreviated forms of Ho Chi Minh City seen in scraped text.
/// The administrative dataset only carries the official name, so these are
/// hard-mapped before containment matching.
const HCM_ALIASES: &[&str] = &["sai gon", "tp hcm", "tphcm", "hcm"];

/// Administrative prefixes stripped when matching district names inside
/// address text (tier 3 of the ward cascade).
const DISTRICT_PREFIXES: &[&str] = &["quan ", "huyen ", "thanh pho ", "thi xa "];

/// Stripped district names this short are too ambiguous to match on.
const MIN_STRIPPED_DISTRICT_LEN: usize = 4;

fn canonical_province_text(normalized: &str) -> &str {
    if HCM_ALIASES.contains(&normalized) {
        HCM_PROVINCE
    } else {
        normalized
    }
}

/// Bidirectional substring containment on two normalized, non-empty forms.
fn contains_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

fn pick<'a, T>(items: &[&'a T], rng: &mut XorShiftRng) -> Option<&'a T> {
    if items.is_empty() {
        None
    } else {
        Some(items[rng.gen_range(0..items.len())])
    }
}

// ============================================================================
// ADDRESS → WARD
// ============================================================================

/// Successful ward resolution, carrying the display names that matched so
/// callers can record them alongside the id.
#[derive(Debug, Clone, PartialEq)]
pub struct WardMatch {
    pub ward_id: i64,
    pub ward_name: String,
    pub district_name: String,
}

struct WardContext<'a> {
    geo: &'a GeoIndex,
    districts: Vec<&'a District>,
    address: String,
}

/// Ordered strategy tiers; evaluated until one yields a match.
const WARD_TIERS: &[fn(&WardContext, &mut XorShiftRng) -> Option<WardMatch>] = &[
    direct_ward_match,
    district_then_random_ward,
    random_ward_in_province,
];

pub struct WardResolver<'a> {
    geo: &'a GeoIndex,
}

impl<'a> WardResolver<'a> {
    pub fn new(geo: &'a GeoIndex) -> Self {
        WardResolver { geo }
    }

    /// Resolve an address/province text pair to a ward.
    ///
    /// Returns None only when no province can be resolved at all; with a
    /// resolved province the final tier picks uniformly among all of its
    /// wards, so any province with at least one ward always succeeds.
    pub fn resolve(
        &self,
        raw_address: &str,
        raw_province: &str,
        rng: &mut XorShiftRng,
    ) -> Option<WardMatch> {
        let address = normalize_unit(raw_address);
        let province = self.resolve_province(raw_province, &address)?;

        let ctx = WardContext {
            geo: self.geo,
            districts: self.geo.districts_of(province.id),
            address,
        };
        for tier in WARD_TIERS {
            if let Some(found) = tier(&ctx, rng) {
                return Some(found);
            }
        }
        None
    }

    /// Province tier: containment against province names, then the
    /// province-field-is-actually-a-district fallback, then a scan of the
    /// full address text for any known province name.
    fn resolve_province(&self, raw_province: &str, address: &str) -> Option<&'a Province> {
        let text = normalize_unit(raw_province);
        let text = canonical_province_text(&text);

        for province in self.geo.provinces() {
            if contains_either(text, &province.normalized) {
                return Some(province);
            }
        }

        // The "province" column sometimes holds a district name instead
        for district in self.geo.districts() {
            if district.normalized == text || contains_either(text, &district.normalized) {
                if let Some(province) = self.geo.province_by_id(district.province_id) {
                    debug!(district = %district.name, province = %province.name,
                        "province resolved through district name");
                    return Some(province);
                }
            }
        }

        for province in self.geo.provinces() {
            if !province.normalized.is_empty() && address.contains(&province.normalized) {
                debug!(province = %province.name, "province found in address text");
                return Some(province);
            }
        }

        None
    }
}

/// Tier 1: a ward of the resolved province named verbatim in the address.
/// First occurrence wins, in district order then ward order.
fn direct_ward_match(ctx: &WardContext, _rng: &mut XorShiftRng) -> Option<WardMatch> {
    for district in &ctx.districts {
        for ward in ctx.geo.wards_of(district.id) {
            if !ward.normalized.is_empty() && ctx.address.contains(&ward.normalized) {
                debug!(ward = %ward.name, "direct ward match");
                return Some(ward_match(ward, district));
            }
        }
    }
    None
}

/// Tier 2: a district named in the address (full name, then with the
/// administrative prefix stripped); a uniform-random ward of that district.
fn district_then_random_ward(ctx: &WardContext, rng: &mut XorShiftRng) -> Option<WardMatch> {
    for district in &ctx.districts {
        let full_hit = ctx.address.contains(&district.normalized);
        let stripped_hit = !full_hit
            && strip_district_prefix(&district.normalized)
                .filter(|s| s.len() >= MIN_STRIPPED_DISTRICT_LEN)
                .is_some_and(|s| ctx.address.contains(s));
        if !full_hit && !stripped_hit {
            continue;
        }

        let wards = ctx.geo.wards_of(district.id);
        if let Some(ward) = pick(&wards, rng) {
            debug!(district = %district.name, ward = %ward.name, "district match, random ward");
            return Some(ward_match(ward, district));
        }
    }
    None
}

/// Tier 3: uniform-random ward pooled across every district of the
/// province. Succeeds whenever the province has any ward at all.
fn random_ward_in_province(ctx: &WardContext, rng: &mut XorShiftRng) -> Option<WardMatch> {
    let mut pool: Vec<(&Ward, &District)> = Vec::new();
    for district in &ctx.districts {
        for ward in ctx.geo.wards_of(district.id) {
            pool.push((ward, *district));
        }
    }
    if pool.is_empty() {
        return None;
    }
    let (ward, district) = pool[rng.gen_range(0..pool.len())];
    debug!(district = %district.name, ward = %ward.name, "province fallback, random ward");
    Some(ward_match(ward, district))
}

fn ward_match(ward: &Ward, district: &District) -> WardMatch {
    WardMatch {
        ward_id: ward.id,
        ward_name: ward.name.clone(),
        district_name: district.name.clone(),
    }
}

fn strip_district_prefix(normalized: &str) -> Option<&str> {
    DISTRICT_PREFIXES
        .iter()
        .find_map(|prefix| normalized.strip_prefix(prefix))
}

// ============================================================================
// LOCATION TEXT → STATION
// ============================================================================

pub struct StationResolver<'a> {
    geo: &'a GeoIndex,
    stations: &'a StationIndex,
}

impl<'a> StationResolver<'a> {
    pub fn new(geo: &'a GeoIndex, stations: &'a StationIndex) -> Self {
        StationResolver { geo, stations }
    }

    /// Resolve a bare place name ("Sài Gòn", "Bến xe Miền Đông", "Cà Mau")
    /// to a station id.
    pub fn resolve_place(&self, location: &str, rng: &mut XorShiftRng) -> Option<i64> {
        let normalized = normalize_unit(location);
        if normalized.is_empty() {
            return None;
        }

        if let Some(id) = self.saigon_alias(&normalized, rng) {
            return Some(id);
        }
        if let Some(id) = self.stations.station_by_normalized_name(&normalized) {
            return Some(id);
        }
        if let Some(id) = self.stations.default_station_of(&normalized) {
            return Some(id);
        }
        self.station_by_address_fragment(&normalized)
    }

    /// Resolve a "District - Province" location (either side may be missing)
    /// to a station id.
    pub fn resolve_location(&self, location: &str, rng: &mut XorShiftRng) -> Option<i64> {
        let trimmed = location.trim();
        if let Some(id) = self.saigon_alias(&normalize_unit(trimmed), rng) {
            return Some(id);
        }

        let parts: Vec<&str> = trimmed.split(" - ").map(str::trim).collect();
        match parts.as_slice() {
            [district, province] => self
                .station_by_district(district, Some(*province))
                .or_else(|| self.station_by_province(province)),
            [single] => self
                .station_by_district(single, None)
                .or_else(|| self.station_by_province(single)),
            _ => None,
        }
    }

    /// The colloquial name for Ho Chi Minh City is not in the
    /// administrative dataset; it maps to a uniform pick among all known
    /// stations of that province.
    fn saigon_alias(&self, normalized: &str, rng: &mut XorShiftRng) -> Option<i64> {
        if normalized != "sai gon" {
            return None;
        }
        let hcm = self.stations.stations_of_province(HCM_PROVINCE);
        if hcm.is_empty() {
            return None;
        }
        Some(hcm[rng.gen_range(0..hcm.len())])
    }

    /// District-name lookup: exact, then bidirectional containment, both
    /// honoring province agreement when a province is also given. Yields
    /// the default station of the district's province.
    fn station_by_district(&self, district_text: &str, province_text: Option<&str>) -> Option<i64> {
        let normalized = normalize_unit(district_text);
        if normalized.is_empty() {
            return None;
        }
        let expected_province = province_text.and_then(|p| self.province_id_by_name(p));

        if let Some(district) = self.geo.district_by_normalized(&normalized) {
            if let Some(expected) = expected_province {
                if district.province_id != expected {
                    return None; // district/province mismatch
                }
            }
            return self.default_station_of_province_id(district.province_id);
        }

        for district in self.geo.districts() {
            if !contains_either(&district.normalized, &normalized) {
                continue;
            }
            if let Some(expected) = expected_province {
                if district.province_id != expected {
                    continue;
                }
            }
            return self.default_station_of_province_id(district.province_id);
        }
        None
    }

    /// Province lookup: exact default-station match, then containment over
    /// the per-province defaults, then an address-text scan.
    fn station_by_province(&self, province_text: &str) -> Option<i64> {
        let normalized = normalize_unit(province_text);
        let normalized = canonical_province_text(&normalized);
        if normalized.is_empty() {
            return None;
        }

        if let Some(id) = self.stations.default_station_of(normalized) {
            return Some(id);
        }
        for (key, _, id) in self.stations.province_defaults() {
            if contains_either(key, normalized) {
                return Some(*id);
            }
        }
        self.station_by_address_fragment(normalized)
    }

    /// Linear scan of (station, resolved address) pairs for the fragment.
    fn station_by_address_fragment(&self, fragment: &str) -> Option<i64> {
        for station in self.stations.stations() {
            if let Some(address) = self.stations.address_of_station(station) {
                if normalize_unit(address).contains(fragment) {
                    return Some(station.id);
                }
            }
        }
        None
    }

    fn province_id_by_name(&self, text: &str) -> Option<i64> {
        let normalized = normalize_unit(text);
        let normalized = canonical_province_text(&normalized);
        if let Some(province) = self.geo.province_by_normalized(normalized) {
            return Some(province.id);
        }
        self.geo
            .provinces()
            .iter()
            .find(|p| contains_either(&p.normalized, normalized))
            .map(|p| p.id)
    }

    fn default_station_of_province_id(&self, province_id: i64) -> Option<i64> {
        let province = self.geo.province_by_id(province_id)?;
        self.stations.default_station_of(&province.normalized)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> XorShiftRng {
        XorShiftRng::seed_from_u64(7)
    }

    fn sample_geo() -> GeoIndex {
        let mut geo = GeoIndex::new();
        geo.push_province(1500, "Hồ Chí Minh".into());
        geo.push_province(1501, "Tây Ninh".into());
        geo.push_province(1502, "Cần Thơ".into());
        geo.push_province(1503, "Đà Nẵng".into());

        geo.push_district(2500, "Quận 1".into(), 1500);
        geo.push_district(2501, "Quận Bình Thạnh".into(), 1500);
        geo.push_district(2502, "Thị xã Trảng Bàng".into(), 1501);
        geo.push_district(2503, "Quận Ninh Kiều".into(), 1502);
        geo.push_district(2504, "Quận Hải Châu".into(), 1503);

        geo.push_ward(3500, "Phường Bến Nghé".into(), 2500);
        geo.push_ward(3501, "Phường Đa Kao".into(), 2500);
        geo.push_ward(3502, "Phường 25".into(), 2501);
        geo.push_ward(3503, "Phường Gia Lộc".into(), 2502);
        geo.push_ward(3504, "Phường Cái Khế".into(), 2503);
        geo.push_ward(3505, "Phường Hòa Cường".into(), 2504);
        geo
    }

    fn sample_stations() -> StationIndex {
        let mut idx = StationIndex::new();
        idx.push_address(1500, "292 Đinh Bộ Lĩnh, Phường 26, Bình Thạnh".into());
        idx.push_address(1501, "395 Kinh Dương Vương, Bình Tân".into());
        idx.push_address(1502, "Đường Tôn Đức Thắng, Đà Nẵng".into());
        idx.push_address(1503, "36 Nguyễn Văn Linh, Ninh Kiều, Cần Thơ".into());

        idx.push_station(1500, "Bến xe Miền Đông".into(), 1500, Some("Hồ Chí Minh".into()));
        idx.push_station(1501, "Bến xe Miền Tây".into(), 1501, Some("Hồ Chí Minh".into()));
        idx.push_station(1502, "Bến xe Trung tâm Đà Nẵng".into(), 1502, Some("Đà Nẵng".into()));
        idx.push_station(1503, "Bến xe Cần Thơ".into(), 1503, Some("Cần Thơ".into()));
        idx
    }

    // ------------------------------------------------------------------
    // Ward cascade
    // ------------------------------------------------------------------

    #[test]
    fn test_exact_ward_match_beats_district_tier() {
        let geo = sample_geo();
        let resolver = WardResolver::new(&geo);
        // Address names both the ward and the district; the ward tier runs
        // first so the named ward must win over a random pick
        let found = resolver
            .resolve("15 Lê Duẩn, Phường Bến Nghé, Quận 1", "Hồ Chí Minh", &mut rng())
            .unwrap();
        assert_eq!(found.ward_id, 3500);
        assert_eq!(found.district_name, "Quận 1");
    }

    #[test]
    fn test_district_match_picks_ward_of_that_district() {
        let geo = sample_geo();
        let resolver = WardResolver::new(&geo);
        let found = resolver
            .resolve("123 Nguyễn Huệ, Quận 1", "TP.HCM", &mut rng())
            .unwrap();
        // No ward named in the address; any ward of Quận 1 qualifies
        assert_eq!(found.district_name, "Quận 1");
        assert!([3500, 3501].contains(&found.ward_id));
    }

    #[test]
    fn test_prefix_stripped_district_match() {
        let geo = sample_geo();
        let resolver = WardResolver::new(&geo);
        // "Trảng Bàng" appears without the "Thị xã" prefix
        let found = resolver
            .resolve("Khu phố 3, Trảng Bàng", "Tây Ninh", &mut rng())
            .unwrap();
        assert_eq!(found.ward_id, 3503);
    }

    #[test]
    fn test_province_field_holding_district_name() {
        let geo = sample_geo();
        let resolver = WardResolver::new(&geo);
        // "Ninh Kiều" is a district; its parent province must be used
        let found = resolver
            .resolve("36 Nguyễn Văn Linh", "Ninh Kiều", &mut rng())
            .unwrap();
        assert_eq!(found.ward_id, 3504);
    }

    #[test]
    fn test_province_name_found_in_address_text() {
        let geo = sample_geo();
        let resolver = WardResolver::new(&geo);
        let found = resolver
            .resolve("Bến xe Trung tâm Đà Nẵng, Hải Châu, Đà Nẵng", "???", &mut rng())
            .unwrap();
        assert_eq!(found.ward_id, 3505);
    }

    #[test]
    fn test_province_fallback_never_fails_with_wards() {
        let geo = sample_geo();
        let resolver = WardResolver::new(&geo);
        // Nothing in the address matches any district or ward
        let found = resolver
            .resolve("Số 1 đường không tên", "Cần Thơ", &mut rng())
            .unwrap();
        assert_eq!(found.ward_id, 3504); // only ward in the province
    }

    #[test]
    fn test_unresolvable_province_returns_none() {
        let geo = sample_geo();
        let resolver = WardResolver::new(&geo);
        assert!(resolver
            .resolve("Somewhere else entirely", "Atlantis", &mut rng())
            .is_none());
    }

    #[test]
    fn test_province_without_wards_returns_none() {
        let mut geo = GeoIndex::new();
        geo.push_province(1500, "Hồ Chí Minh".into());
        geo.push_district(2500, "Quận 1".into(), 1500);
        // No wards at all
        let resolver = WardResolver::new(&geo);
        assert!(resolver.resolve("123 Nguyễn Huệ", "Hồ Chí Minh", &mut rng()).is_none());
    }

    #[test]
    fn test_empty_province_text_does_not_match_everything() {
        let geo = sample_geo();
        let resolver = WardResolver::new(&geo);
        assert!(resolver.resolve("no usable text", "", &mut rng()).is_none());
    }

    // ------------------------------------------------------------------
    // Station cascade
    // ------------------------------------------------------------------

    #[test]
    fn test_station_exact_name_wins() {
        let geo = sample_geo();
        let stations = sample_stations();
        let resolver = StationResolver::new(&geo, &stations);
        assert_eq!(resolver.resolve_place("Bến Xe Miền Tây", &mut rng()), Some(1501));
    }

    #[test]
    fn test_station_saigon_alias_picks_hcm_station() {
        let geo = sample_geo();
        let stations = sample_stations();
        let resolver = StationResolver::new(&geo, &stations);
        for seed in 0..16 {
            let mut r = XorShiftRng::seed_from_u64(seed);
            let id = resolver.resolve_place("Sài Gòn", &mut r).unwrap();
            assert!([1500, 1501].contains(&id), "picked non-HCM station {id}");
        }
    }

    #[test]
    fn test_station_province_default() {
        let geo = sample_geo();
        let stations = sample_stations();
        let resolver = StationResolver::new(&geo, &stations);
        // "Đà Nẵng" is a province; first-seen station is the default
        assert_eq!(resolver.resolve_place("Đà Nẵng", &mut rng()), Some(1502));
    }

    #[test]
    fn test_station_via_address_fragment() {
        let geo = sample_geo();
        let stations = sample_stations();
        let resolver = StationResolver::new(&geo, &stations);
        assert_eq!(resolver.resolve_place("Kinh Dương Vương", &mut rng()), Some(1501));
    }

    #[test]
    fn test_station_district_province_pair() {
        let geo = sample_geo();
        let stations = sample_stations();
        let resolver = StationResolver::new(&geo, &stations);
        assert_eq!(
            resolver.resolve_location("Ninh Kiều - Cần Thơ", &mut rng()),
            Some(1503)
        );
        // Prefix-bearing district names still match by containment
        assert_eq!(
            resolver.resolve_location("Hải Châu - Đà Nẵng", &mut rng()),
            Some(1502)
        );
    }

    #[test]
    fn test_station_district_province_mismatch_falls_back_to_province() {
        let geo = sample_geo();
        let stations = sample_stations();
        let resolver = StationResolver::new(&geo, &stations);
        // District belongs to Cần Thơ, claimed province is Đà Nẵng: the
        // district tier refuses, the province tier answers
        assert_eq!(
            resolver.resolve_location("Ninh Kiều - Đà Nẵng", &mut rng()),
            Some(1502)
        );
    }

    #[test]
    fn test_station_unresolvable_returns_none() {
        let geo = sample_geo();
        let stations = sample_stations();
        let resolver = StationResolver::new(&geo, &stations);
        assert_eq!(resolver.resolve_place("Nowhere", &mut rng()), None);
        assert_eq!(resolver.resolve_location("", &mut rng()), None);
    }
}
