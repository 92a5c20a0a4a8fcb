//! Test fixtures for itinerary-optimizer.
//!
//! Provides realistic test data including:
//! - Real landmark and city locations (from OpenStreetMap)
//! - Helpers to turn them into places

// Shared by several test binaries; each uses a subset.
#![allow(dead_code)]

pub mod tourist_locations;

pub use tourist_locations::*;
