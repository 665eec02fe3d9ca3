#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the geovisor server.
//!
//! Separate from the conversion crates so the HTTP contract can evolve
//! independently of the pipeline.

use serde::{Deserialize, Serialize};

/// Query parameters for the map view route.
#[derive(Debug, Clone, Deserialize)]
pub struct MapViewParams {
    /// Filename of the rendered map document under the static directory.
    pub map_file: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}
