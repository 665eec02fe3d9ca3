//! Shapefile to `GeoJSON` conversion.
//!
//! A shapefile upload is a multi-file bundle: `.shp` (geometry), `.shx`
//! (index), and `.dbf` (attribute table) are required, `.prj` (CRS in
//! WKT) is optional. The bundle is validated, loaded, normalized to
//! EPSG:4326 by the CRS resolver, and serialized as a feature
//! collection. Only polygon shapes are converted; other shape types are
//! skipped, matching the polygon-only geometry scope.

use std::path::{Path, PathBuf};

use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use geovisor_crs::{CrsDefinition, VectorDataset, VectorFeature};
use shapefile::Shape;
use shapefile::dbase::FieldValue;

use crate::FormatError;

/// Extensions that must all be present among the uploaded files.
const REQUIRED_EXTENSIONS: [&str; 3] = [".shp", ".shx", ".dbf"];

/// Converts the shapefile bundle among `uploaded` into a feature
/// collection written to `output.geojson` in `out_dir`, returning the
/// output path.
///
/// # Errors
///
/// Returns [`FormatError::MissingShapefileComponent`] if a required part
/// is absent, [`FormatError::Shapefile`] if the loader rejects the
/// dataset, or a CRS error if no spatial reference can be determined.
pub fn shapefile_to_geojson(
    uploaded: &[PathBuf],
    out_dir: &Path,
) -> Result<PathBuf, FormatError> {
    let shp_path = require_components(uploaded)?;
    let sidecar = find_sidecar(uploaded);

    let mut dataset = load_dataset(&shp_path)?;
    geovisor_crs::resolve_to_wgs84(&mut dataset, sidecar.as_deref())?;

    let features: Vec<Feature> = dataset
        .features
        .into_iter()
        .map(|feature| Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::from(&feature.geometry))),
            id: None,
            properties: Some(feature.properties),
            foreign_members: None,
        })
        .collect();

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    crate::write_feature_collection(&collection, out_dir)
}

/// Verifies that every required component is present and returns the
/// `.shp` path.
fn require_components(uploaded: &[PathBuf]) -> Result<PathBuf, FormatError> {
    let mut shp_path = None;
    for extension in REQUIRED_EXTENSIONS {
        let found = uploaded.iter().find(|path| has_extension(path, extension));
        match found {
            Some(path) => {
                if extension == ".shp" {
                    shp_path = Some(path.clone());
                }
            }
            None => return Err(FormatError::MissingShapefileComponent { extension }),
        }
    }
    // The .shp arm above always runs first, so this cannot be None.
    shp_path.ok_or(FormatError::MissingShapefileComponent { extension: ".shp" })
}

/// Locates an optional `.prj` CRS sidecar among the uploaded files.
fn find_sidecar(uploaded: &[PathBuf]) -> Option<PathBuf> {
    uploaded
        .iter()
        .find(|path| has_extension(path, ".prj"))
        .cloned()
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(&extension[1..]))
}

/// Loads the `.shp`/`.dbf` pair into a [`VectorDataset`], reading a
/// `.prj` sharing the `.shp` stem as the dataset's declared CRS.
fn load_dataset(shp_path: &Path) -> Result<VectorDataset, FormatError> {
    let mut reader = shapefile::Reader::from_path(shp_path)?;

    let mut features = Vec::new();
    let mut skipped = 0usize;
    for pair in reader.iter_shapes_and_records() {
        let (shape, record) = pair?;
        match shape {
            Shape::Polygon(polygon) => {
                let geometry: MultiPolygon<f64> = polygon.into();
                features.push(VectorFeature {
                    geometry,
                    properties: record_properties(record),
                });
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        log::warn!("Skipped {skipped} non-polygon shapes in {}", shp_path.display());
    }

    let declared_prj = shp_path.with_extension("prj");
    let crs = if declared_prj.exists() {
        Some(CrsDefinition::from_prj_file(&declared_prj).map_err(FormatError::Crs)?)
    } else {
        None
    };

    Ok(VectorDataset { features, crs })
}

/// Maps a dbase attribute record to `GeoJSON` property values.
fn record_properties(record: shapefile::dbase::Record) -> JsonObject {
    let mut properties = JsonObject::new();
    for (name, value) in record {
        properties.insert(name, field_value_to_json(value));
    }
    properties
}

fn field_value_to_json(value: FieldValue) -> serde_json::Value {
    match value {
        FieldValue::Character(text) => text.map_or(serde_json::Value::Null, Into::into),
        FieldValue::Memo(text) => text.into(),
        FieldValue::Numeric(number) => number.map_or(serde_json::Value::Null, Into::into),
        FieldValue::Float(number) => {
            number.map_or(serde_json::Value::Null, |f| f64::from(f).into())
        }
        FieldValue::Integer(number) => number.into(),
        FieldValue::Double(number) => number.into(),
        FieldValue::Currency(number) => number.into(),
        FieldValue::Logical(flag) => flag.map_or(serde_json::Value::Null, Into::into),
        FieldValue::Date(date) => date.map_or(serde_json::Value::Null, |d| {
            format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()).into()
        }),
        other => format!("{other:?}").into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapefile::dbase::{FieldName, Record, TableWriterBuilder};
    use shapefile::{Point, Polygon, PolygonRing};

    const ESRI_WGS84: &str = "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",\
        SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],\
        PRIMEM[\"Greenwich\",0.0],UNIT[\"Degree\",0.0174532925199433]]";

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("geovisor_shp_tests").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_test_shapefile(dir: &Path, stem: &str) -> Vec<PathBuf> {
        let shp = dir.join(format!("{stem}.shp"));
        let table = TableWriterBuilder::new()
            .add_character_field(FieldName::try_from("NAME").unwrap(), 50);
        let mut writer = shapefile::Writer::from_path(&shp, table).unwrap();

        let polygon = Polygon::with_rings(vec![PolygonRing::Outer(vec![
            Point::new(-60.0, -36.0),
            Point::new(-60.0, -37.0),
            Point::new(-61.0, -37.0),
            Point::new(-60.0, -36.0),
        ])]);
        let mut record = Record::default();
        record.insert(
            "NAME".to_string(),
            FieldValue::Character(Some("parcela".to_string())),
        );
        writer.write_shape_and_record(&polygon, &record).unwrap();
        drop(writer);

        vec![
            shp,
            dir.join(format!("{stem}.shx")),
            dir.join(format!("{stem}.dbf")),
        ]
    }

    #[test]
    fn reports_first_missing_component() {
        let uploaded = vec![PathBuf::from("parcels.shp"), PathBuf::from("parcels.dbf")];
        let err = shapefile_to_geojson(&uploaded, Path::new("/tmp")).unwrap_err();
        assert!(matches!(
            err,
            FormatError::MissingShapefileComponent { extension: ".shx" }
        ));
        assert_eq!(err.to_string(), "Falta el archivo .shx");
    }

    #[test]
    fn fails_without_any_crs() {
        let dir = scratch("no_crs");
        let uploaded = write_test_shapefile(&dir, "parcels");
        let err = shapefile_to_geojson(&uploaded, &dir).unwrap_err();
        assert!(err.to_string().contains("CRS"));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn sidecar_prj_enables_conversion() {
        let dir = scratch("with_sidecar");
        let mut uploaded = write_test_shapefile(&dir, "parcels");
        // Sidecar stem differs from the .shp stem, so the loader cannot
        // pick it up as the declared CRS.
        let prj = dir.join("srs.prj");
        std::fs::write(&prj, ESRI_WGS84).unwrap();
        uploaded.push(prj);

        let out_path = shapefile_to_geojson(&uploaded, &dir).unwrap();
        let raw = std::fs::read_to_string(out_path).unwrap();
        let collection: FeatureCollection = raw.parse().unwrap();
        assert_eq!(collection.features.len(), 1);
        let properties = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(properties["NAME"], "parcela");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn declared_prj_keeps_coordinates_identical() {
        let dir = scratch("declared");
        let uploaded = write_test_shapefile(&dir, "parcels");
        std::fs::write(dir.join("parcels.prj"), ESRI_WGS84).unwrap();

        let out_path = shapefile_to_geojson(&uploaded, &dir).unwrap();
        let raw = std::fs::read_to_string(out_path).unwrap();
        let collection: FeatureCollection = raw.parse().unwrap();
        let geometry = collection.features[0].geometry.as_ref().unwrap();
        let Value::MultiPolygon(polygons) = &geometry.value else {
            panic!("expected multipolygon geometry");
        };
        let ring = &polygons[0][0];
        assert!(ring.contains(&vec![-60.0, -36.0]));
        assert!(ring.contains(&vec![-61.0, -37.0]));
        let _ = std::fs::remove_dir_all(dir);
    }
}
