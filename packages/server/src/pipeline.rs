//! Conversion pipeline dispatch.
//!
//! Chooses a converter by upload extension, runs it inside the request's
//! working directory, and renders the resulting feature collection into
//! the map document. Errors from every stage funnel into
//! [`PipelineError`]; mapping to HTTP responses happens only at the
//! handler boundary.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors surfaced by the upload-to-map pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No uploaded filename matched a supported format.
    #[error("Formato de archivo no soportado")]
    UnsupportedFormat,

    /// A converter rejected the upload.
    #[error(transparent)]
    Format(#[from] geovisor_formats::FormatError),

    /// Map rendering failed.
    #[error(transparent)]
    Render(#[from] geovisor_render::RenderError),

    /// The multipart payload could not be read.
    #[error("Upload failed: {message}")]
    Upload {
        /// Description of the intake failure.
        message: String,
    },

    /// I/O error handling the uploaded files.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Which converter a submission dispatches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadKind {
    /// A KMZ container holding a KML document.
    Kmz(PathBuf),
    /// A shapefile bundle.
    Shapefile,
}

/// Picks the converter for an uploaded file set.
///
/// A `.kmz` anywhere in the set wins; otherwise a `.shp` selects the
/// shapefile path. Extension matching is case-insensitive.
///
/// # Errors
///
/// Returns [`PipelineError::UnsupportedFormat`] if neither extension is
/// present.
pub fn detect_format(uploaded: &[PathBuf]) -> Result<UploadKind, PipelineError> {
    if let Some(kmz) = uploaded.iter().find(|path| has_extension(path, "kmz")) {
        return Ok(UploadKind::Kmz(kmz.clone()));
    }
    if uploaded.iter().any(|path| has_extension(path, "shp")) {
        return Ok(UploadKind::Shapefile);
    }
    Err(PipelineError::UnsupportedFormat)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Runs the full conversion pipeline for one submission and writes the
/// rendered map document to `map_dest`.
///
/// # Errors
///
/// Returns [`PipelineError`] from any stage: dispatch, extraction,
/// conversion, CRS resolution, or rendering.
pub fn run(uploaded: &[PathBuf], work_dir: &Path, map_dest: &Path) -> Result<(), PipelineError> {
    let geojson_path = match detect_format(uploaded)? {
        UploadKind::Kmz(kmz_path) => {
            let scratch = work_dir.join("extracted");
            let kml_path = geovisor_formats::archive::extract_kml(&kmz_path, &scratch)?;
            geovisor_formats::kml::kml_to_geojson(&kml_path, work_dir)?
        }
        UploadKind::Shapefile => {
            geovisor_formats::shp::shapefile_to_geojson(uploaded, work_dir)?
        }
    };
    geovisor_render::render_map(&geojson_path, map_dest)?;
    Ok(())
}
