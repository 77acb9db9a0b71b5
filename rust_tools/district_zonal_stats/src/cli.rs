use std::path::PathBuf;

use crate::coverage::CoverageMode;
use crate::zonal::{Statistic, DEFAULT_CHUNK_SIZE};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "district-zonal-stats")]
#[command(about = "Zonal statistics of a tiled embedding raster archive per administrative district")]
#[command(version)]
pub struct Args {
    /// District boundaries (GeoPackage or any OGR vector format)
    #[arg(long, value_name = "FILE")]
    pub districts: PathBuf,

    /// Raster footprint index (one polygon per tile)
    #[arg(long, value_name = "FILE")]
    pub footprints: PathBuf,

    /// Directory holding the raster tiles
    #[arg(long, value_name = "DIR")]
    pub embeddings_dir: PathBuf,

    /// Directory for mosaics and JSON results
    #[arg(long, value_name = "DIR", default_value = "temp")]
    pub temp_dir: PathBuf,

    /// District code to process (repeatable; default: all districts)
    #[arg(short = 'd', long = "district", value_name = "CODE")]
    pub districts_to_process: Vec<i32>,

    /// District code field in the boundary dataset
    #[arg(long, value_name = "NAME", default_value = "di_code")]
    pub district_field: String,

    /// Footprint source path field in the footprint index
    #[arg(long, value_name = "NAME", default_value = "source")]
    pub source_field: String,

    /// Statistics to compute
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = Statistic::DEFAULT)]
    pub stats: Vec<Statistic>,

    /// How pixels on the district boundary are weighted
    #[arg(long, value_enum, default_value_t = CoverageMode::Exact)]
    pub coverage: CoverageMode,

    /// Mosaic compression (DEFLATE, LZW, ZSTD, NONE)
    #[arg(long, value_name = "CODEC", default_value = "LZW")]
    pub compression: String,

    /// Threads used by gdal_translate (ALL_CPUS or a count)
    #[arg(long, value_name = "N", default_value = "ALL_CPUS")]
    pub gdal_threads: String,

    /// Pixel chunk size for reading the mosaic
    #[arg(long, value_name = "PIXELS", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Number of threads (default: all available)
    #[arg(short, long, value_name = "N")]
    pub threads: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
