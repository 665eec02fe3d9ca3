//! KMZ container extraction.
//!
//! A KMZ upload is a zip archive holding a KML document (plus any icons
//! or overlays it references). The archive is fully decompressed into the
//! request's scratch directory and the first `.kml` found in the listing
//! is handed to the markup converter. Which file wins when a container
//! holds several KML documents is deliberately unspecified.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::FormatError;

/// Unpacks `kmz_path` into `scratch_dir` and returns the path of the
/// first `.kml` file found there.
///
/// # Errors
///
/// Returns [`FormatError::NoKmlInArchive`] if the archive holds no
/// `.kml`, [`FormatError::Archive`] if it is not a readable zip, or
/// [`FormatError::Io`] on filesystem failures.
pub fn extract_kml(kmz_path: &Path, scratch_dir: &Path) -> Result<PathBuf, FormatError> {
    let file = File::open(kmz_path).map_err(|e| FormatError::io(kmz_path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;

    log::info!(
        "Extracting {} ({} entries) to {}",
        kmz_path.display(),
        archive.len(),
        scratch_dir.display()
    );
    archive.extract(scratch_dir)?;

    let entries =
        std::fs::read_dir(scratch_dir).map_err(|e| FormatError::io(scratch_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| FormatError::io(scratch_dir, e))?;
        let path = entry.path();
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("kml"))
        {
            return Ok(path);
        }
    }

    Err(FormatError::NoKmlInArchive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_test_kmz(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("geovisor_archive_tests").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn finds_kml_inside_kmz() {
        let dir = scratch("finds_kml");
        let kmz = dir.join("regions.kmz");
        write_test_kmz(
            &kmz,
            &[
                ("legend.png", "not really a png"),
                ("regions.kml", "<kml xmlns=\"http://www.opengis.net/kml/2.2\"/>"),
            ],
        );

        let out = dir.join("extracted");
        let kml_path = extract_kml(&kmz, &out).unwrap();
        assert_eq!(kml_path.file_name().unwrap(), "regions.kml");
        assert!(kml_path.exists());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn fails_when_archive_has_no_kml() {
        let dir = scratch("no_kml");
        let kmz = dir.join("empty.kmz");
        write_test_kmz(&kmz, &[("readme.txt", "nada")]);

        let out = dir.join("extracted");
        let err = extract_kml(&kmz, &out).unwrap_err();
        assert!(matches!(err, FormatError::NoKmlInArchive));
        assert!(err.to_string().contains("KML"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn rejects_non_zip_input() {
        let dir = scratch("not_zip");
        let bogus = dir.join("bogus.kmz");
        std::fs::write(&bogus, "esto no es un zip").unwrap();

        let err = extract_kml(&bogus, &dir.join("extracted")).unwrap_err();
        assert!(matches!(err, FormatError::Archive(_)));

        let _ = std::fs::remove_dir_all(dir);
    }
}
