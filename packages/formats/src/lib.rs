#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Uploaded-format adapters: KMZ/KML and Shapefile to `GeoJSON`.
//!
//! Each converter takes paths from one upload, normalizes the geometry
//! into a `GeoJSON` feature collection in EPSG:4326, and writes it to
//! [`GEOJSON_OUTPUT`] inside the request's working directory. Geometry
//! scope is polygons only; records without a polygon are skipped.

pub mod archive;
pub mod kml;
pub mod shp;

use thiserror::Error;

/// Output filename for the normalized feature collection, written into
/// the per-request working directory.
pub const GEOJSON_OUTPUT: &str = "output.geojson";

/// Errors that can occur during format conversion.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The KMZ container held no `.kml` document.
    #[error("No se encontró ningún archivo KML en el KMZ.")]
    NoKmlInArchive,

    /// A required shapefile component is absent from the upload.
    #[error("Falta el archivo {extension}")]
    MissingShapefileComponent {
        /// The missing extension, e.g. `.shx`.
        extension: &'static str,
    },

    /// The document could not be parsed as KML.
    #[error("Failed to parse KML: {0}")]
    KmlParse(#[from] ::kml::Error),

    /// The shapefile loader rejected the dataset.
    #[error("Failed to read shapefile: {0}")]
    Shapefile(#[from] shapefile::Error),

    /// The KMZ container could not be read as a zip archive.
    #[error("Failed to read archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// CRS resolution or reprojection failed.
    #[error(transparent)]
    Crs(#[from] geovisor_crs::CrsError),

    /// I/O error during conversion.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Feature collection serialization failed.
    #[error("Failed to serialize GeoJSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl FormatError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Serializes a feature collection to `GEOJSON_OUTPUT` in `out_dir`.
pub(crate) fn write_feature_collection(
    collection: &geojson::FeatureCollection,
    out_dir: &std::path::Path,
) -> Result<std::path::PathBuf, FormatError> {
    let out_path = out_dir.join(GEOJSON_OUTPUT);
    let json = serde_json::to_string(collection)?;
    std::fs::write(&out_path, json).map_err(|e| FormatError::io(&out_path, e))?;
    Ok(out_path)
}
