// Run configuration - input and output locations
//
// The tool is a batch transform over a data directory: scraped inputs and
// the geography dataset live at the root, generated tables under
// `csv_output/`. Paths are bundled here so stages and tests can point the
// whole pipeline at any directory.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const OUTPUT_DIR_NAME: &str = "csv_output";

#[derive(Debug, Clone)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Paths {
    /// Inputs in `root`, outputs in `root/csv_output`.
    pub fn from_root(root: &Path) -> Self {
        Paths {
            data_dir: root.to_path_buf(),
            output_dir: root.join(OUTPUT_DIR_NAME),
        }
    }

    pub fn ensure_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("failed to create output directory {}", self.output_dir.display())
        })
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    /// Canonical administrative-geography dataset (nested JSON).
    pub fn geo_dataset(&self) -> PathBuf {
        self.data_dir.join("provinces.json")
    }

    /// Scraped station file: station_slug, station_name, address, province.
    pub fn scraped_stations(&self) -> PathBuf {
        self.data_dir.join("benxe_addresses.csv")
    }

    pub fn tickets_benxe(&self) -> PathBuf {
        self.data_dir.join("tickets_benxe.csv")
    }

    pub fn tickets_nhaxe(&self) -> PathBuf {
        self.data_dir.join("tickets_nhaxe.csv")
    }

    // ------------------------------------------------------------------
    // Generated tables
    // ------------------------------------------------------------------

    pub fn province_csv(&self) -> PathBuf {
        self.output_dir.join("province.csv")
    }

    pub fn district_csv(&self) -> PathBuf {
        self.output_dir.join("district.csv")
    }

    pub fn ward_csv(&self) -> PathBuf {
        self.output_dir.join("ward.csv")
    }

    pub fn address_csv(&self) -> PathBuf {
        self.output_dir.join("address.csv")
    }

    pub fn station_csv(&self) -> PathBuf {
        self.output_dir.join("station.csv")
    }

    pub fn route_csv(&self) -> PathBuf {
        self.output_dir.join("route.csv")
    }

    pub fn trip_csv(&self) -> PathBuf {
        self.output_dir.join("trip.csv")
    }

    pub fn seat_map_csv(&self) -> PathBuf {
        self.output_dir.join("seat_map.csv")
    }

    pub fn floor_csv(&self) -> PathBuf {
        self.output_dir.join("floor.csv")
    }

    pub fn seat_csv(&self) -> PathBuf {
        self.output_dir.join("seat.csv")
    }

    // Staff/fleet pools are inputs to the trip and layout stages; they live
    // alongside the generated tables.

    pub fn vehicle_csv(&self) -> PathBuf {
        self.output_dir.join("vehicle.csv")
    }

    pub fn driver_csv(&self) -> PathBuf {
        self.output_dir.join("driver.csv")
    }

    pub fn attendant_csv(&self) -> PathBuf {
        self.output_dir.join("attendant.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_layout() {
        let paths = Paths::from_root(Path::new("/data"));
        assert_eq!(paths.geo_dataset(), Path::new("/data/provinces.json"));
        assert_eq!(paths.route_csv(), Path::new("/data/csv_output/route.csv"));
        assert_eq!(paths.trip_csv(), Path::new("/data/csv_output/trip.csv"));
    }
}
