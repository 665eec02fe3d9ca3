#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate reference system resolution and normalization.
//!
//! Every converted dataset must leave the pipeline in WGS84 / EPSG:4326.
//! This crate decides which CRS an uploaded dataset is in (declared
//! metadata first, then an explicit `.prj` sidecar) and reprojects the
//! geometries when the resolved CRS is anything else. A dataset with no
//! determinable CRS is a fatal input error; no default is ever assumed.

use std::path::Path;

use geo::MultiPolygon;
use proj::{Proj, Transform};
use thiserror::Error;

/// The canonical target CRS for every dataset leaving a converter.
pub const CANONICAL_CRS: &str = "EPSG:4326";

/// Errors that can occur while resolving or normalizing a CRS.
#[derive(Debug, Error)]
pub enum CrsError {
    /// No CRS declared by the dataset and no sidecar definition provided.
    #[error(
        "No se encontró sistema de coordenadas en el Shapefile y no se proporcionó un CRS."
    )]
    Missing,

    /// The CRS definition could not be interpreted by PROJ.
    #[error("Unsupported CRS definition: {0}")]
    Unsupported(#[from] proj::ProjCreateError),

    /// Reprojection of a geometry failed.
    #[error("Reprojection to EPSG:4326 failed: {0}")]
    Projection(#[from] proj::ProjError),

    /// I/O error reading a sidecar definition.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// A coordinate reference system definition.
///
/// Holds either an authority code (`EPSG:4326`) or a WKT definition as
/// read from a `.prj` sidecar. PROJ accepts both forms verbatim, so the
/// definition is kept as the original string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrsDefinition {
    definition: String,
}

impl CrsDefinition {
    /// The canonical WGS84 definition.
    #[must_use]
    pub fn wgs84() -> Self {
        Self {
            definition: CANONICAL_CRS.to_string(),
        }
    }

    /// Wraps a WKT (or authority code) string.
    #[must_use]
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            definition: wkt.into(),
        }
    }

    /// Reads a WKT definition from a `.prj` sidecar file.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::Io`] if the file cannot be read.
    pub fn from_prj_file(path: &Path) -> Result<Self, CrsError> {
        let wkt = std::fs::read_to_string(path).map_err(|e| CrsError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Self::from_wkt(wkt.trim()))
    }

    /// The definition string as handed to PROJ.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.definition
    }

    /// Whether this definition identifies WGS84 / EPSG:4326.
    ///
    /// Recognizes the authority code itself, an outermost
    /// `AUTHORITY["EPSG","4326"]` node in WKT, and the well-known WGS84
    /// geographic CRS names used by ESRI-style `.prj` files that carry no
    /// authority node at all.
    #[must_use]
    pub fn is_wgs84(&self) -> bool {
        let def = self.definition.trim();
        if def.eq_ignore_ascii_case(CANONICAL_CRS) {
            return true;
        }
        if let Some(code) = outermost_epsg_code(def) {
            return code == 4326;
        }
        if def.starts_with("GEOGCS[") {
            return matches!(
                wkt_name(def).as_deref(),
                Some("GCS_WGS_1984" | "WGS 84" | "WGS84")
            );
        }
        false
    }
}

/// Extracts the EPSG code of the outermost CRS node from a WKT1 string.
///
/// In WKT1 text the authority of the outermost node is serialized last,
/// so the final `AUTHORITY["EPSG",...]` occurrence identifies the whole
/// CRS (a projected CRS also contains the authority of its base GEOGCS
/// earlier in the string).
fn outermost_epsg_code(wkt: &str) -> Option<u32> {
    let marker = "AUTHORITY[\"EPSG\",";
    let start = wkt.rfind(marker)? + marker.len();
    let rest = &wkt[start..];
    let code: String = rest
        .chars()
        .skip_while(|c| *c == '"' || c.is_whitespace())
        .take_while(char::is_ascii_digit)
        .collect();
    code.parse().ok()
}

/// Extracts the quoted name of the outermost WKT node.
fn wkt_name(wkt: &str) -> Option<String> {
    let start = wkt.find('"')? + 1;
    let len = wkt[start..].find('"')?;
    Some(wkt[start..start + len].to_string())
}

/// A polygon feature prior to GeoJSON serialization.
#[derive(Debug, Clone)]
pub struct VectorFeature {
    /// Polygon geometry in the dataset's CRS.
    pub geometry: MultiPolygon<f64>,
    /// Attribute values keyed by field name.
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// A loaded vector dataset awaiting CRS normalization.
#[derive(Debug, Clone, Default)]
pub struct VectorDataset {
    /// Polygon features with their attributes.
    pub features: Vec<VectorFeature>,
    /// CRS declared by the dataset itself, if any.
    pub crs: Option<CrsDefinition>,
}

/// Resolves the dataset's CRS and reprojects it to EPSG:4326.
///
/// Resolution policy, in order: trust a CRS the dataset already declares;
/// otherwise parse the provided sidecar definition; otherwise fail with
/// [`CrsError::Missing`]. A dataset already in EPSG:4326 passes through
/// with every coordinate untouched.
///
/// # Errors
///
/// Returns [`CrsError`] if no CRS can be determined, the definition is
/// not understood by PROJ, or reprojection fails.
pub fn resolve_to_wgs84(
    dataset: &mut VectorDataset,
    sidecar: Option<&Path>,
) -> Result<(), CrsError> {
    let crs = match dataset.crs.take() {
        Some(declared) => declared,
        None => match sidecar {
            Some(path) => CrsDefinition::from_prj_file(path)?,
            None => return Err(CrsError::Missing),
        },
    };

    if crs.is_wgs84() {
        log::debug!("Dataset already in {CANONICAL_CRS}, skipping reprojection");
        dataset.crs = Some(crs);
        return Ok(());
    }

    log::info!(
        "Reprojecting {} features to {CANONICAL_CRS}",
        dataset.features.len()
    );
    let proj = Proj::new_known_crs(crs.as_str(), CANONICAL_CRS, None)?;
    for feature in &mut dataset.features {
        feature.geometry.transform(&proj)?;
    }
    dataset.crs = Some(CrsDefinition::wgs84());
    Ok(())
}
