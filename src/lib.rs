// Busline Seeder - Core Library
// Exposes all modules for use in the CLI and tests

pub mod allocator;
pub mod config;
pub mod entities;
pub mod index;      // Reference index: geo hierarchy + station/address maps
pub mod normalize;  // Vietnamese text normalization
pub mod pipeline;   // Batch stages: geo, stations, routes, trips, layout
pub mod resolve;    // Resolution cascades: address→ward, location→station
pub mod store;      // Append-only CSV table store

// Re-export commonly used types
pub use allocator::{IdRegistry, IdSequence, DEFAULT_ID_FLOOR};
pub use config::Paths;
pub use index::{GeoIndex, ReferenceIndex, StationIndex};
pub use normalize::{normalize_slug, normalize_unit, route_code};
pub use pipeline::StageSummary;
pub use resolve::{StationResolver, WardMatch, WardResolver};
pub use store::{AppendStore, KeyedRow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
