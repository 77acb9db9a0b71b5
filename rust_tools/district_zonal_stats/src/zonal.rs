use std::collections::BTreeMap;
use std::path::Path;

use crate::chunking::{ChunkBounds, ChunkGrid};
use crate::coverage::{coverage_fractions, CoverageMode};
use crate::error::Result;
use crate::io;
use clap::ValueEnum;
use geo::{BoundingRect, MultiPolygon};
use log::{debug, info};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: usize = 512;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Sum,
    Median,
    Mean,
    Count,
    Min,
    Max,
}

impl Statistic {
    pub const DEFAULT: [Statistic; 2] = [Statistic::Sum, Statistic::Median];

    pub fn name(&self) -> &'static str {
        match self {
            Statistic::Sum => "sum",
            Statistic::Median => "median",
            Statistic::Mean => "mean",
            Statistic::Count => "count",
            Statistic::Min => "min",
            Statistic::Max => "max",
        }
    }
}

/// Statistics of one raster band over the district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandStatistics {
    /// 1-based band index
    pub band: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub stats: BTreeMap<String, Option<f64>>,
}

/// Running weighted aggregate of pixel values.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    weight: f64,
    weighted_sum: f64,
    min: Option<f64>,
    max: Option<f64>,
    /// (value, weight) pairs, kept only when a median is requested
    values: Option<Vec<(f64, f64)>>,
}

impl Accumulator {
    pub fn new(keep_values: bool) -> Self {
        Self {
            values: keep_values.then(Vec::new),
            ..Default::default()
        }
    }

    pub fn add(&mut self, value: f64, weight: f64) {
        if weight <= 0.0 || value.is_nan() {
            return;
        }
        self.weight += weight;
        self.weighted_sum += value * weight;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        if let Some(values) = self.values.as_mut() {
            values.push((value, weight));
        }
    }

    /// Add a chunk of pixel values with their coverage weights, skipping nodata.
    pub fn add_chunk(&mut self, values: &Array2<f64>, weights: &Array2<f64>, nodata: Option<f64>) {
        for (&value, &weight) in values.iter().zip(weights.iter()) {
            if let Some(nd) = nodata {
                if value == nd {
                    continue;
                }
            }
            self.add(value, weight);
        }
    }

    pub fn merge(&mut self, other: Accumulator) {
        self.weight += other.weight;
        self.weighted_sum += other.weighted_sum;
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        if let (Some(values), Some(more)) = (self.values.as_mut(), other.values) {
            values.extend(more);
        }
    }

    pub fn finish(mut self, stats: &[Statistic]) -> BTreeMap<String, Option<f64>> {
        let empty = self.weight <= 0.0;
        let mut result = BTreeMap::new();

        for stat in stats {
            let value = match stat {
                Statistic::Sum => Some(self.weighted_sum),
                Statistic::Count => Some(self.weight),
                Statistic::Mean => (!empty).then(|| self.weighted_sum / self.weight),
                Statistic::Min => self.min,
                Statistic::Max => self.max,
                Statistic::Median => self
                    .values
                    .as_mut()
                    .and_then(|values| weighted_median(values)),
            };
            result.insert(stat.name().to_string(), value);
        }
        result
    }
}

/// Median of weighted values: the value at which the cumulative weight
/// reaches half the total. When it lands exactly on half, the two neighbouring
/// values are averaged, which gives the usual median for equal weights.
pub fn weighted_median(values: &mut [(f64, f64)]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total: f64 = values.iter().map(|&(_, w)| w).sum();
    let half = total / 2.0;
    let tolerance = total * 1e-12;

    let mut cumulative = 0.0;
    for (i, &(value, weight)) in values.iter().enumerate() {
        cumulative += weight;
        if (cumulative - half).abs() <= tolerance {
            return Some(match values.get(i + 1) {
                Some(&(next, _)) => (value + next) / 2.0,
                None => value,
            });
        }
        if cumulative > half {
            return Some(value);
        }
    }
    values.last().map(|&(v, _)| v)
}

/// Statistics of a single in-memory band.
pub fn band_statistics(
    values: &Array2<f64>,
    weights: &Array2<f64>,
    nodata: Option<f64>,
    stats: &[Statistic],
) -> BTreeMap<String, Option<f64>> {
    let mut acc = Accumulator::new(stats.contains(&Statistic::Median));
    acc.add_chunk(values, weights, nodata);
    acc.finish(stats)
}

/// Compute `stats` for every band of the raster at `raster_path` over
/// `geometry`, which must be in the raster's CRS.
pub fn zonal_statistics(
    raster_path: &Path,
    geometry: &MultiPolygon<f64>,
    stats: &[Statistic],
    mode: CoverageMode,
    chunk_size: usize,
) -> Result<Vec<BandStatistics>> {
    let metadata = io::read_raster_metadata(raster_path)?;

    let window = geometry
        .bounding_rect()
        .and_then(|bbox| metadata.grid.window_for(&bbox, metadata.width, metadata.height));

    // Coverage weights are shared by all bands
    let chunks: Vec<(ChunkBounds, Array2<f64>)> = match window {
        None => Vec::new(),
        Some(window) => {
            info!(
                "District window: {}x{} pixels at ({}, {})",
                window.width, window.height, window.x_off, window.y_off
            );
            let grid = ChunkGrid::new(window, chunk_size);
            let bounds: Vec<(usize, ChunkBounds)> = grid.iter().collect();
            bounds
                .into_par_iter()
                .map(|(_, b)| (b, coverage_fractions(geometry, &metadata.grid, &b, mode)))
                .filter(|(_, weights)| weights.iter().any(|&w| w > 0.0))
                .collect()
        }
    };

    let covered: f64 = chunks.iter().map(|(_, w)| w.sum()).sum();
    info!(
        "{} chunks overlap the district, {:.2} pixels covered ({:?} coverage)",
        chunks.len(),
        covered,
        mode
    );

    let keep_values = stats.contains(&Statistic::Median);

    // GDAL datasets are not Sync: one handle per band
    (1..=metadata.band_count)
        .into_par_iter()
        .map(|band| -> Result<BandStatistics> {
            let dataset = io::open_raster(raster_path)?;
            let nodata = metadata.nodata[band - 1];

            let mut acc = Accumulator::new(keep_values);
            for (bounds, weights) in &chunks {
                let values = io::read_band_chunk(&dataset, band, bounds)?;
                acc.add_chunk(&values, weights, nodata);
            }

            debug!("Band {} done", band);
            Ok(BandStatistics {
                band,
                description: metadata.descriptions[band - 1].clone(),
                stats: acc.finish(stats),
            })
        })
        .collect()
}
