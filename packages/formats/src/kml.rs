//! KML to `GeoJSON` conversion.
//!
//! Walks every Placemark in the document (through any level of
//! `Document`/`Folder` nesting), extracts its polygon outer boundary in
//! first-listed point order, and maps sibling data into the explicit
//! property schema: `name` and `description` are recognized typed keys,
//! everything else lands in an untyped string map keyed by unqualified
//! tag name. Placemarks without a polygon are skipped; they are not an
//! error. A `MultiGeometry` contributes only its first polygon.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ::kml::Kml;
use ::kml::types::{Element, Geometry, Placemark, Polygon as KmlPolygon};
use geojson::{Feature, FeatureCollection, Geometry as GeoJsonGeometry, JsonObject, Value};

use crate::FormatError;

/// Properties extracted from one Placemark.
///
/// Recognized keys get typed fields; unrecognized sibling tags fall back
/// to the string map, where a duplicated tag name overwrites the earlier
/// value (last write wins).
#[derive(Debug, Clone, Default)]
pub struct PlacemarkProperties {
    /// The Placemark's `<name>`.
    pub name: Option<String>,
    /// The Placemark's `<description>`.
    pub description: Option<String>,
    /// Remaining sibling elements, keyed by unqualified tag name.
    pub extra: BTreeMap<String, String>,
}

impl PlacemarkProperties {
    fn from_placemark(placemark: &Placemark) -> Self {
        let mut extra = BTreeMap::new();
        for child in &placemark.children {
            extra.insert(
                child.name.clone(),
                child.content.clone().unwrap_or_default(),
            );
        }
        Self {
            name: placemark.name.clone(),
            description: placemark.description.clone(),
            extra,
        }
    }

    fn into_json(self) -> JsonObject {
        let mut properties = JsonObject::new();
        if let Some(name) = self.name {
            properties.insert("name".to_string(), name.into());
        }
        if let Some(description) = self.description {
            properties.insert("description".to_string(), description.into());
        }
        for (key, value) in self.extra {
            properties.insert(key, value.into());
        }
        properties
    }
}

/// Converts the KML document at `kml_path` into a feature collection
/// written to `output.geojson` in `out_dir`, returning the output path.
///
/// # Errors
///
/// Returns [`FormatError::KmlParse`] if the document is not valid KML,
/// or [`FormatError::Io`]/[`FormatError::Json`] on write failures.
pub fn kml_to_geojson(kml_path: &Path, out_dir: &Path) -> Result<PathBuf, FormatError> {
    let content =
        std::fs::read_to_string(kml_path).map_err(|e| FormatError::io(kml_path, e))?;
    let document: Kml = content.parse()?;

    let mut placemarks = Vec::new();
    collect_placemarks(&document, &mut placemarks);

    let features: Vec<Feature> = placemarks
        .iter()
        .filter_map(|placemark| placemark_to_feature(placemark))
        .collect();

    log::info!(
        "Converted {} of {} placemarks from {}",
        features.len(),
        placemarks.len(),
        kml_path.display()
    );

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    crate::write_feature_collection(&collection, out_dir)
}

/// Recursively collects every Placemark in the document tree.
fn collect_placemarks<'a>(node: &'a Kml, out: &mut Vec<&'a Placemark>) {
    match node {
        Kml::KmlDocument(document) => {
            for element in &document.elements {
                collect_placemarks(element, out);
            }
        }
        Kml::Document { elements, .. } => {
            for element in elements {
                collect_placemarks(element, out);
            }
        }
        Kml::Folder { elements, .. } => {
            for element in elements {
                collect_placemarks(element, out);
            }
        }
        Kml::Placemark(placemark) => out.push(placemark),
        _ => {}
    }
}

/// Returns the Placemark's first polygon, if it has one.
fn first_polygon(placemark: &Placemark) -> Option<&KmlPolygon> {
    match placemark.geometry.as_ref()? {
        Geometry::Polygon(polygon) => Some(polygon),
        Geometry::MultiGeometry(multi) => multi.geometries.iter().find_map(|geometry| {
            if let Geometry::Polygon(polygon) = geometry {
                Some(polygon)
            } else {
                None
            }
        }),
        _ => None,
    }
}

/// Builds a polygon Feature from a Placemark, or `None` if it has no
/// polygon geometry.
fn placemark_to_feature(placemark: &Placemark) -> Option<Feature> {
    let polygon = first_polygon(placemark)?;

    // Outer boundary only, in listed order; elevation is discarded.
    let ring: Vec<Vec<f64>> = polygon
        .outer
        .coords
        .iter()
        .map(|coord| vec![coord.x, coord.y])
        .collect();

    Some(Feature {
        bbox: None,
        geometry: Some(GeoJsonGeometry::new(Value::Polygon(vec![ring]))),
        id: None,
        properties: Some(PlacemarkProperties::from_placemark(placemark).into_json()),
        foreign_members: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PLACEMARKS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>Zona A</name>
      <description>Parcela norte</description>
      <superficie>120</superficie>
      <Polygon>
        <outerBoundaryIs>
          <LinearRing>
            <coordinates>
              -60.0,-36.0,12.5 -60.0,-37.0,12.5 -61.0,-37.0,12.5 -60.0,-36.0,12.5
            </coordinates>
          </LinearRing>
        </outerBoundaryIs>
      </Polygon>
    </Placemark>
    <Placemark>
      <name>Sin geometria</name>
    </Placemark>
  </Document>
</kml>"#;

    const DUPLICATE_TAGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <lote>uno</lote>
      <lote>dos</lote>
      <Polygon>
        <outerBoundaryIs>
          <LinearRing>
            <coordinates>0,0 0,1 1,1 0,0</coordinates>
          </LinearRing>
        </outerBoundaryIs>
      </Polygon>
    </Placemark>
  </Document>
</kml>"#;

    const NESTED_FOLDER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Folder>
      <Placemark>
        <Polygon>
          <outerBoundaryIs>
            <LinearRing>
              <coordinates>5,5 5,6 6,6 5,5</coordinates>
            </LinearRing>
          </outerBoundaryIs>
        </Polygon>
      </Placemark>
    </Folder>
  </Document>
</kml>"#;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("geovisor_kml_tests").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn convert(name: &str, content: &str) -> (PathBuf, FeatureCollection) {
        let dir = scratch(name);
        let kml_path = dir.join("input.kml");
        std::fs::write(&kml_path, content).unwrap();
        let out_path = kml_to_geojson(&kml_path, &dir).unwrap();
        let raw = std::fs::read_to_string(&out_path).unwrap();
        let collection: FeatureCollection = raw.parse().unwrap();
        (dir, collection)
    }

    #[test]
    fn skips_placemarks_without_polygon() {
        let (dir, collection) = convert("skips", TWO_PLACEMARKS);
        assert_eq!(collection.features.len(), 1);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn preserves_ring_order_and_drops_elevation() {
        let (dir, collection) = convert("ring_order", TWO_PLACEMARKS);
        let geometry = collection.features[0].geometry.as_ref().unwrap();
        let Value::Polygon(rings) = &geometry.value else {
            panic!("expected polygon geometry");
        };
        let ring = &rings[0];
        assert_eq!(ring[0], vec![-60.0, -36.0]);
        assert_eq!(ring[1], vec![-60.0, -37.0]);
        assert_eq!(ring[2], vec![-61.0, -37.0]);
        assert!(ring.iter().all(|position| position.len() == 2));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn extracts_recognized_and_extra_properties() {
        let (dir, collection) = convert("properties", TWO_PLACEMARKS);
        let properties = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(properties["name"], "Zona A");
        assert_eq!(properties["description"], "Parcela norte");
        assert_eq!(properties["superficie"], "120");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn duplicate_tags_keep_last_value() {
        let (dir, collection) = convert("duplicates", DUPLICATE_TAGS);
        let properties = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(properties["lote"], "dos");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn walks_into_folders() {
        let (dir, collection) = convert("folders", NESTED_FOLDER);
        assert_eq!(collection.features.len(), 1);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn rejects_unparseable_document() {
        let dir = scratch("unparseable");
        let kml_path = dir.join("input.kml");
        std::fs::write(&kml_path, "esto no es un documento KML").unwrap();
        let err = kml_to_geojson(&kml_path, &dir).unwrap_err();
        assert!(matches!(err, FormatError::KmlParse(_)));
        let _ = std::fs::remove_dir_all(dir);
    }
}
