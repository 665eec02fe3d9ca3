#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Interactive map rendering.
//!
//! Embeds a `GeoJSON` feature collection into a self-contained Leaflet
//! HTML document. The viewport is a fixed default location and zoom, not
//! derived from the data's extent; the overlay uses Leaflet's default
//! vector styling. The document never changes after it is written.

use std::path::Path;

use thiserror::Error;

/// Default viewport center (latitude, longitude).
pub const DEFAULT_CENTER: (f64, f64) = (-38.4161, -63.6167);

/// Default viewport zoom level.
pub const DEFAULT_ZOOM: u8 = 5;

/// Leaflet page template. The placeholders are substituted with the
/// feature collection and the default viewport before writing.
const MAP_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0"/>
  <title>Geovisor</title>
  <link
    rel="stylesheet"
    href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css"
    integrity="sha256-p4NxAoJBhIIN+hmNHrzRCf9tD/miZyoHS5obTRR9BMY="
    crossorigin=""
  />
  <style>
    html, body { height: 100%; margin: 0; padding: 0; }
    #map { height: 100%; width: 100%; }
  </style>
</head>
<body>
  <div id="map"></div>
  <script
    src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"
    integrity="sha256-20nQCchB9co0qIjJZRGuk2/Z9VM+kNiyxNV1lvTlZBo="
    crossorigin=""
  ></script>
  <script>
    var map = L.map('map').setView([__CENTER_LAT__, __CENTER_LNG__], __ZOOM__);
    L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
      maxZoom: 19,
      attribution: '&copy; OpenStreetMap contributors'
    }).addTo(map);
    var data = __GEOJSON_DATA__;
    L.geoJSON(data).addTo(map);
  </script>
</body>
</html>
"#;

/// Errors that can occur while rendering a map document.
#[derive(Debug, Error)]
pub enum RenderError {
    /// I/O error reading the feature collection or writing the document.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The feature collection is not valid JSON.
    #[error("Failed to parse GeoJSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_error(path: &Path, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Renders the feature collection at `geojson_path` into an interactive
/// map document written to `dest`.
///
/// # Errors
///
/// Returns [`RenderError`] if the collection cannot be read or parsed,
/// or the document cannot be written.
pub fn render_map(geojson_path: &Path, dest: &Path) -> Result<(), RenderError> {
    let raw =
        std::fs::read_to_string(geojson_path).map_err(|e| io_error(geojson_path, e))?;
    // Parse before embedding so a corrupt collection fails here rather
    // than as a broken page in the browser.
    let data: serde_json::Value = serde_json::from_str(&raw)?;

    let html = MAP_TEMPLATE
        .replace("__CENTER_LAT__", &DEFAULT_CENTER.0.to_string())
        .replace("__CENTER_LNG__", &DEFAULT_CENTER.1.to_string())
        .replace("__ZOOM__", &DEFAULT_ZOOM.to_string())
        .replace("__GEOJSON_DATA__", &data.to_string());

    std::fs::write(dest, html).map_err(|e| io_error(dest, e))?;
    log::info!("Map document written to {}", dest.display());
    Ok(())
}
