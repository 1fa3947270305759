//! farmOS client implementing the area backend contract.
//!
//! Areas are Drupal taxonomy terms of the `farm_areas` vocabulary, reached
//! through the RestWS module. Geometry travels as WKT in
//! `field_farm_geofield`.

pub mod client;
pub mod model;

pub use client::{FarmOsClient, FarmOsConfig};
