// Administrative geography - JSON dataset parsing and reference-table rows
//
// The canonical dataset is a nested JSON document: provinces containing
// districts containing wards, each node carrying an official numeric code,
// a display name and a codename slug. Official codes are unique per tier
// nationwide, so they serve as the natural keys for id allocation.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::store::{soft_delete_stamp, KeyedRow};

// ============================================================================
// JSON DATASET
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ProvinceNode {
    pub code: i64,
    pub name: String,
    pub codename: String,
    #[serde(default)]
    pub districts: Vec<DistrictNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistrictNode {
    pub code: i64,
    pub name: String,
    pub codename: String,
    #[serde(default)]
    pub wards: Vec<WardNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WardNode {
    pub code: i64,
    pub name: String,
    pub codename: String,
}

/// Load the geography dataset. Mandatory input; a missing or unparseable
/// file aborts the run.
pub fn load_geo_dataset(path: &Path) -> Result<Vec<ProvinceNode>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open geography dataset {}", path.display()))?;
    let provinces: Vec<ProvinceNode> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse geography dataset {}", path.display()))?;
    Ok(provinces)
}

// ============================================================================
// REFERENCE TABLE ROWS
// ============================================================================

pub const PROVINCE_HEADERS: &[&str] = &[
    "id",
    "province_code",
    "name",
    "name_en",
    "full_name",
    "full_name_en",
    "code_name",
    "administrative_unit_id",
    "administrative_region_id",
    "created_at",
    "updated_at",
    "is_deleted",
    "deleted_at",
    "deleted_by",
];

pub const DISTRICT_HEADERS: &[&str] = &[
    "id",
    "district_code",
    "name",
    "name_en",
    "full_name",
    "full_name_en",
    "code_name",
    "administrative_unit_id",
    "created_at",
    "updated_at",
    "is_deleted",
    "deleted_at",
    "deleted_by",
    "province_id",
];

pub const WARD_HEADERS: &[&str] = &[
    "id",
    "ward_code",
    "name",
    "name_en",
    "full_name",
    "full_name_en",
    "code_name",
    "administrative_unit_id",
    "created_at",
    "updated_at",
    "is_deleted",
    "deleted_at",
    "deleted_by",
    "district_id",
];

/// Natural key of a geography row: the official code column.
pub fn unit_code_key(fields: &[String]) -> Option<String> {
    let code = fields[1].trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

pub fn province_row(id: i64, node: &ProvinceNode) -> KeyedRow {
    let stamp = soft_delete_stamp();
    KeyedRow {
        key: node.code.to_string(),
        record: vec![
            id.to_string(),
            node.code.to_string(),
            node.name.clone(),
            String::new(),
            node.name.clone(),
            String::new(),
            node.codename.clone(),
            String::new(),
            String::new(),
            stamp[0].clone(),
            stamp[1].clone(),
            stamp[2].clone(),
            stamp[3].clone(),
            stamp[4].clone(),
        ],
    }
}

pub fn district_row(id: i64, node: &DistrictNode, province_id: i64) -> KeyedRow {
    let stamp = soft_delete_stamp();
    KeyedRow {
        key: node.code.to_string(),
        record: vec![
            id.to_string(),
            node.code.to_string(),
            node.name.clone(),
            String::new(),
            node.name.clone(),
            String::new(),
            node.codename.clone(),
            String::new(),
            stamp[0].clone(),
            stamp[1].clone(),
            stamp[2].clone(),
            stamp[3].clone(),
            stamp[4].clone(),
            province_id.to_string(),
        ],
    }
}

pub fn ward_row(id: i64, node: &WardNode, district_id: i64) -> KeyedRow {
    let stamp = soft_delete_stamp();
    KeyedRow {
        key: node.code.to_string(),
        record: vec![
            id.to_string(),
            node.code.to_string(),
            node.name.clone(),
            String::new(),
            node.name.clone(),
            String::new(),
            node.codename.clone(),
            String::new(),
            stamp[0].clone(),
            stamp[1].clone(),
            stamp[2].clone(),
            stamp[3].clone(),
            stamp[4].clone(),
            district_id.to_string(),
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
    fn test_parse_dataset_shape() {
        let json = r#"[
            {
                "name": "Thành phố Hồ Chí Minh",
                "code": 79,
                "codename": "thanh_pho_ho_chi_minh",
                "division_type": "thành phố trung ương",
                "districts": [
                    {
                        "name": "Quận 1",
                        "code": 760,
                        "codename": "quan_1",
                        "wards": [
                            {"name": "Phường Bến Nghé", "code": 26734, "codename": "phuong_ben_nghe"}
                        ]
                    }
                ]
            },
            {
                "name": "Tỉnh Cà Mau",
                "code": 96,
                "codename": "tinh_ca_mau"
            }
        ]"#;
        let provinces: Vec<ProvinceNode> = serde_json::from_str(json).unwrap();
        assert_eq!(provinces.len(), 2);
        assert_eq!(provinces[0].code, 79);
        assert_eq!(provinces[0].districts.len(), 1);
        assert_eq!(provinces[0].districts[0].wards[0].code, 26734);
        // Missing districts default to empty, extra fields are ignored
        assert!(provinces[1].districts.is_empty());
    }

    #[test]
    fn test_row_shapes_match_headers() {
        let ward = WardNode {
            code: 26734,
            name: "Phường Bến Nghé".into(),
            codename: "phuong_ben_nghe".into(),
        };
        let district = DistrictNode {
            code: 760,
            name: "Quận 1".into(),
            codename: "quan_1".into(),
            wards: vec![ward.clone()],
        };
        let province = ProvinceNode {
            code: 79,
            name: "Thành phố Hồ Chí Minh".into(),
            codename: "thanh_pho_ho_chi_minh".into(),
            districts: vec![district.clone()],
        };

        let p = province_row(1500, &province);
        assert_eq!(p.record.len(), PROVINCE_HEADERS.len());
        assert_eq!(p.key, "79");
        assert_eq!(p.record[0], "1500");

        let d = district_row(1501, &district, 1500);
        assert_eq!(d.record.len(), DISTRICT_HEADERS.len());
        // province_id lands in the last column, where the index reads it
        assert_eq!(d.record[13], "1500");

        let w = ward_row(1502, &ward, 1501);
        assert_eq!(w.record.len(), WARD_HEADERS.len());
        assert_eq!(w.record[13], "1501");
    }

    #[test]
    fn test_unit_code_key() {
        let row = vec!["1500".to_string(), "79".into(), "x".into()];
        assert_eq!(unit_code_key(&row), Some("79".to_string()));
        let blank = vec!["1500".to_string(), "  ".into()];
        assert_eq!(unit_code_key(&blank), None);
    }
}
