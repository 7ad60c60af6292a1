// Entity models - row types, natural keys and input-record parsing
//
// Each module covers one slice of the dataset: the table headers, the
// record builders (stamped with the soft-delete columns), the natural-key
// extractors the append store indexes on, and the parsers for the raw
// input feeding that slice.

pub mod fleet;
pub mod geo;
pub mod route;
pub mod station;
pub mod trip;

pub use fleet::{VehicleRecord, VehicleType};
pub use geo::{DistrictNode, ProvinceNode, WardNode};
pub use route::{RouteCandidate, TicketChannel, TicketRecord};
pub use station::ScrapedStation;
pub use trip::TripDraft;
