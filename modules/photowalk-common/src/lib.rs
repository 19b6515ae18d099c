pub mod config;
pub mod error;
pub mod geo;
pub mod types;

pub use config::Config;
pub use error::PhotowalkError;
pub use geo::{haversine_m, planar_degree_distance};
pub use types::*;
