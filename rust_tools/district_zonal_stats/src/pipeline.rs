use std::path::{Path, PathBuf};

use crate::cli::Args;
use crate::coverage::CoverageMode;
use crate::crs::{self, Crs};
use crate::district;
use crate::error::{Result, ZonalStatsError};
use crate::footprint::{self, FootprintIndex};
use crate::io;
use crate::mosaic::{self, MosaicArtifacts, MosaicOptions};
use crate::report::{self, DistrictReport};
use crate::vector::{self, DistrictRecord, FootprintRecord, VectorLayer};
use crate::zonal::{self, Statistic};
use gdal::spatial_ref::SpatialRef;
use geo::Rect;
use log::{error, info, warn};

/// Settings shared by every district of a run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub embeddings_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub stats: Vec<Statistic>,
    pub coverage: CoverageMode,
    pub mosaic: MosaicOptions,
    pub chunk_size: usize,
}

impl PipelineConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        if args.stats.is_empty() {
            return Err(ZonalStatsError::InvalidInput(
                "at least one statistic is required".to_string(),
            ));
        }
        if args.chunk_size == 0 {
            return Err(ZonalStatsError::InvalidInput(
                "chunk size must be positive".to_string(),
            ));
        }

        let mosaic = MosaicOptions {
            compression: args.compression.clone(),
            num_threads: args.gdal_threads.clone(),
            tiled: true,
        };
        mosaic::validate_compression(&mosaic.compression)?;
        mosaic::validate_num_threads(&mosaic.num_threads)?;

        let mut stats = Vec::with_capacity(args.stats.len());
        for stat in &args.stats {
            if !stats.contains(stat) {
                stats.push(*stat);
            }
        }

        Ok(Self {
            embeddings_dir: args.embeddings_dir.clone(),
            temp_dir: args.temp_dir.clone(),
            stats,
            coverage: args.coverage,
            mosaic,
            chunk_size: args.chunk_size,
        })
    }
}

/// Outcome of a batch: which districts produced a report and which failed.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: Vec<(i32, PathBuf)>,
    pub failed: Vec<(i32, String)>,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run `process` for each code; a failing district is logged and recorded
/// without stopping the others.
pub fn run_batch<F>(codes: &[i32], mut process: F) -> BatchSummary
where
    F: FnMut(i32) -> Result<PathBuf>,
{
    let mut summary = BatchSummary::default();
    for (i, &code) in codes.iter().enumerate() {
        info!("=== District {} ({}/{}) ===", code, i + 1, codes.len());
        match process(code) {
            Ok(path) => summary.succeeded.push((code, path)),
            Err(e) => {
                error!("District {} failed: {}", code, e);
                summary.failed.push((code, e.to_string()));
            }
        }
    }

    info!(
        "Batch finished: {} succeeded, {} failed",
        summary.succeeded.len(),
        summary.failed.len()
    );
    summary
}

/// Codes to process: the requested ones in order without repeats, or every
/// district in the boundary dataset.
pub fn district_codes(requested: &[i32], records: &[DistrictRecord]) -> Vec<i32> {
    if requested.is_empty() {
        return district::unique_codes(records);
    }
    let mut codes = Vec::with_capacity(requested.len());
    for &code in requested {
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

/// True when `outer` covers `inner`, allowing `tolerance` map units of slack.
pub fn extent_covers(outer: &Rect<f64>, inner: &Rect<f64>, tolerance: f64) -> bool {
    outer.min().x <= inner.min().x + tolerance
        && outer.min().y <= inner.min().y + tolerance
        && outer.max().x >= inner.max().x - tolerance
        && outer.max().y >= inner.max().y - tolerance
}

/// Load both vector inputs and check they share a CRS.
pub fn load_inputs(
    args: &Args,
) -> Result<(VectorLayer<DistrictRecord>, VectorLayer<FootprintRecord>)> {
    let districts = vector::read_districts(&args.districts, &args.district_field)?;
    let footprints = vector::read_footprints(&args.footprints, &args.source_field)?;
    crs::check_compatible(&districts.crs, &footprints.crs)?;
    Ok((districts, footprints))
}

/// Select, mosaic and summarize one district, returning the written report path.
pub fn process_district(
    code: i32,
    districts: &VectorLayer<DistrictRecord>,
    index: &FootprintIndex<'_>,
    config: &PipelineConfig,
) -> Result<PathBuf> {
    let selected = district::select_district(&districts.records, code)?;
    info!("District {}: {} boundary records", code, selected.parts);

    let intersecting = index.intersecting(&selected.geometry);
    if intersecting.is_empty() {
        return Err(ZonalStatsError::NoIntersectingTiles(code));
    }
    let tiles = footprint::resolve_tiles(&config.embeddings_dir, &intersecting)?;
    info!("District {}: {} intersecting tiles", code, tiles.len());

    let artifacts = MosaicArtifacts::for_district(&config.temp_dir, code);
    mosaic::build_mosaic(&tiles, &artifacts, &config.mosaic)?;
    check_mosaic(&artifacts.tif_path, &districts.crs, footprint::union_extent(&intersecting))?;

    let bands = zonal::zonal_statistics(
        &artifacts.tif_path,
        &selected.geometry,
        &config.stats,
        config.coverage,
        config.chunk_size,
    )?;

    let report = DistrictReport {
        district_code: code,
        crs: districts.crs.to_string(),
        parts: selected.parts,
        coverage: config.coverage,
        tiles,
        mosaic: artifacts.tif_path.clone(),
        bands,
    };

    let path = report::report_path(&config.temp_dir, code);
    report::write_report(&path, &report)?;
    Ok(path)
}

/// Warn when the mosaic is in another CRS than the vectors or does not cover
/// the footprints it was built from.
fn check_mosaic(tif_path: &Path, vector_crs: &Crs, expected: Option<Rect<f64>>) -> Result<()> {
    let metadata = io::read_raster_metadata(tif_path)?;

    let raster_crs = SpatialRef::from_wkt(&metadata.projection)
        .map_err(ZonalStatsError::from)
        .and_then(|sr| Crs::from_spatial_ref(&sr));
    match raster_crs {
        Ok(raster_crs) if !raster_crs.matches(vector_crs) => warn!(
            "Mosaic CRS {} differs from vector CRS {}",
            raster_crs, vector_crs
        ),
        Ok(_) => {}
        Err(e) => warn!("Could not read mosaic CRS: {}", e),
    }

    if let Some(expected) = expected {
        let tolerance = metadata.grid.pixel_width.max(metadata.grid.pixel_height.abs());
        if !extent_covers(&metadata.extent(), &expected, tolerance) {
            warn!(
                "Mosaic extent {:?} does not cover the tile footprints {:?}",
                metadata.extent(),
                expected
            );
        }
    }
    Ok(())
}

/// Full run: load inputs, then process every requested district.
pub fn run(args: &Args) -> Result<BatchSummary> {
    let config = PipelineConfig::from_args(args)?;
    let (districts, footprints) = load_inputs(args)?;

    let codes = district_codes(&args.districts_to_process, &districts.records);
    if codes.is_empty() {
        return Err(ZonalStatsError::InvalidInput(
            "no districts to process".to_string(),
        ));
    }
    info!(
        "Processing {} districts, statistics: {:?}",
        codes.len(),
        config.stats
    );

    std::fs::create_dir_all(&config.temp_dir)?;
    let index = FootprintIndex::new(&footprints.records);

    Ok(run_batch(&codes, |code| {
        process_district(code, &districts, &index, &config)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use geo::MultiPolygon;

    fn record(code: i32) -> DistrictRecord {
        DistrictRecord {
            code,
            geometry: MultiPolygon::new(vec![Rect::new((0.0, 0.0), (1.0, 1.0)).to_polygon()]),
        }
    }

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec![
            "district-zonal-stats",
            "--districts",
            "d.gpkg",
            "--footprints",
            "f.gpkg",
            "--embeddings-dir",
            "emb",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_batch_isolates_failures() {
        let codes = [1, 2, 3];
        let summary = run_batch(&codes, |code| {
            if code == 2 {
                Err(ZonalStatsError::NoIntersectingTiles(code))
            } else {
                Ok(PathBuf::from(format!("district_{}.json", code)))
            }
        });

        assert!(!summary.is_success());
        let ok: Vec<i32> = summary.succeeded.iter().map(|(c, _)| *c).collect();
        assert_eq!(ok, vec![1, 3]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, 2);
        assert!(summary.failed[0].1.contains("No footprints intersect district 2"));
    }

    #[test]
    fn test_district_codes_default_to_all() {
        let records = vec![record(5), record(3), record(5), record(-1)];
        assert_eq!(district_codes(&[], &records), vec![3, 5]);
        assert_eq!(district_codes(&[532, 3, 532], &records), vec![532, 3]);
    }

    #[test]
    fn test_extent_covers() {
        let outer = Rect::new((0.0, 0.0), (10.0, 10.0));
        assert!(extent_covers(&outer, &Rect::new((1.0, 1.0), (9.0, 9.0)), 0.0));
        assert!(extent_covers(&outer, &Rect::new((-0.5, 0.0), (10.0, 10.4)), 1.0));
        assert!(!extent_covers(&outer, &Rect::new((-2.0, 0.0), (10.0, 10.0)), 1.0));
    }

    #[test]
    fn test_config_from_args() {
        let config = PipelineConfig::from_args(&parse(&["--stats", "sum,sum,median"])).unwrap();
        assert_eq!(config.stats, vec![Statistic::Sum, Statistic::Median]);
        assert_eq!(config.mosaic, MosaicOptions::default());
        assert_eq!(config.temp_dir, PathBuf::from("temp"));
    }

    #[test]
    fn test_config_rejects_bad_mosaic_options() {
        let result = PipelineConfig::from_args(&parse(&["--compression", "JPEG"]));
        assert!(matches!(result, Err(ZonalStatsError::InvalidCompression(_))));

        let result = PipelineConfig::from_args(&parse(&["--gdal-threads", "0"]));
        assert!(matches!(result, Err(ZonalStatsError::InvalidInput(_))));

        let result = PipelineConfig::from_args(&parse(&["--chunk-size", "0"]));
        assert!(matches!(result, Err(ZonalStatsError::InvalidInput(_))));
    }
}
