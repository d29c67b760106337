use serde::{Deserialize, Serialize};
use std::fmt;

/// Data type of an uploaded file, as understood by the ingest gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// GeoTIFF and world files
    Raster,
    /// LAS/LAZ/BPF point clouds
    Pointcloud,
    /// Zipped shapefiles
    Shapefile,
    /// Anything the gateway cannot ingest
    Unrecognized,
}

impl DataType {
    /// Name used in the gateway job document, `None` for unrecognized files
    pub fn wire_name(&self) -> Option<&'static str> {
        match self {
            DataType::Raster => Some("raster"),
            DataType::Pointcloud => Some("pointcloud"),
            DataType::Shapefile => Some("shapefile"),
            DataType::Unrecognized => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, DataType::Unrecognized)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name().unwrap_or("unrecognized"))
    }
}

/// Classify a file by its extension (case-insensitive)
pub fn classify(file_name: &str) -> DataType {
    let Some(extension) = extension_of(file_name) else {
        return DataType::Unrecognized;
    };

    match extension.to_ascii_lowercase().as_str() {
        "tif" | "tiff" | "geotiff" | "tfw" => DataType::Raster,
        "laz" | "las" | "bpf" => DataType::Pointcloud,
        "zip" => DataType::Shapefile,
        _ => DataType::Unrecognized,
    }
}

/// Text after the final dot of the last key segment. A name that is only a
/// leading dot plus text (".tif") has no extension.
fn extension_of(file_name: &str) -> Option<&str> {
    let base = file_name.rsplit('/').next().unwrap_or(file_name);
    let stem_end = base.rfind('.')?;
    if base[..stem_end].trim_start_matches('.').is_empty() {
        return None;
    }
    Some(&base[stem_end + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_extensions() {
        for name in ["scan1.tif", "a.tiff", "dem.geotiff", "world.tfw"] {
            assert_eq!(classify(name), DataType::Raster, "{}", name);
        }
    }

    #[test]
    fn test_pointcloud_extensions() {
        for name in ["cloud1.laz", "cloud.las", "lidar.bpf"] {
            assert_eq!(classify(name), DataType::Pointcloud, "{}", name);
        }
    }

    #[test]
    fn test_shapefile_extension() {
        assert_eq!(classify("roads.zip"), DataType::Shapefile);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("A.TIF"), classify("a.tif"));
        assert_eq!(classify("A.TIF"), DataType::Raster);
        assert_eq!(classify("Cloud.LaZ"), DataType::Pointcloud);
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(classify("readme.txt"), DataType::Unrecognized);
        assert_eq!(classify("noextension"), DataType::Unrecognized);
        assert_eq!(classify("archive.tif.gz"), DataType::Unrecognized);
        assert_eq!(classify(".tif"), DataType::Unrecognized);
        assert_eq!(classify("trailing."), DataType::Unrecognized);
        assert_eq!(classify(""), DataType::Unrecognized);
    }

    #[test]
    fn test_only_last_segment_counts() {
        assert_eq!(classify("uploads.tif/readme"), DataType::Unrecognized);
        assert_eq!(classify("2024/01/scan.tif"), DataType::Raster);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(DataType::Raster.wire_name(), Some("raster"));
        assert_eq!(DataType::Unrecognized.wire_name(), None);
        assert_eq!(
            serde_json::to_string(&DataType::Pointcloud).unwrap(),
            "\"pointcloud\""
        );
        assert_eq!(DataType::Shapefile.to_string(), "shapefile");
    }
}
