use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::coverage::CoverageMode;
use crate::error::Result;
use crate::zonal::BandStatistics;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

/// Zonal statistics of one district, as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictReport {
    pub district_code: i32,
    pub crs: String,
    /// Boundary records dissolved into the district geometry
    pub parts: usize,
    pub coverage: CoverageMode,
    pub tiles: Vec<PathBuf>,
    pub mosaic: PathBuf,
    pub bands: Vec<BandStatistics>,
}

pub fn report_path(temp_dir: &Path, code: i32) -> PathBuf {
    temp_dir.join(format!("district_{}_ZonalStats.json", code))
}

/// Write the report as JSON with 4-space indentation.
pub fn write_report(path: &Path, report: &DistrictReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    report.serialize(&mut serializer)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    info!("Zonal statistics written to {}", path.display());
    Ok(())
}

pub fn read_report(path: &Path) -> Result<DistrictReport> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_report() -> DistrictReport {
        let mut stats = BTreeMap::new();
        stats.insert("sum".to_string(), Some(1234.5));
        stats.insert("median".to_string(), Some(-0.25));

        let mut empty = BTreeMap::new();
        empty.insert("sum".to_string(), Some(0.0));
        empty.insert("median".to_string(), None);

        DistrictReport {
            district_code: 532,
            crs: "EPSG:3857".to_string(),
            parts: 2,
            coverage: CoverageMode::Exact,
            tiles: vec![PathBuf::from("/e/a.tif"), PathBuf::from("/e/b.tif")],
            mosaic: PathBuf::from("/t/district_532_mosaiced.tif"),
            bands: vec![
                BandStatistics {
                    band: 1,
                    description: Some("A00".to_string()),
                    stats,
                },
                BandStatistics {
                    band: 2,
                    description: None,
                    stats: empty,
                },
            ],
        }
    }

    #[test]
    fn test_report_path() {
        assert_eq!(
            report_path(Path::new("/scratch/temp"), 532),
            PathBuf::from("/scratch/temp/district_532_ZonalStats.json")
        );
    }

    #[test]
    fn test_written_file_round_trips_to_computed_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = report_path(dir.path(), 532);
        let report = sample_report();

        write_report(&path, &report).unwrap();
        assert_eq!(read_report(&path).unwrap(), report);
    }

    #[test]
    fn test_json_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        write_report(&path, &sample_report()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n    \"district_code\": 532,"));
        assert!(text.contains("\"coverage\": \"exact\""));

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["bands"][0]["stats"]["sum"], 1234.5);
        assert!(value["bands"][1]["stats"]["median"].is_null());
        assert!(value["bands"][1].get("description").is_none());
    }
}
