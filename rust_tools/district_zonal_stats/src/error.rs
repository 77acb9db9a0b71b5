use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZonalStatsError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("CRS mismatch: districts are {districts}, footprints are {footprints}")]
    CrsMismatch { districts: String, footprints: String },

    #[error("Dataset {0} has no spatial reference")]
    MissingCrs(PathBuf),

    #[error("Field '{field}' not found in {path}")]
    MissingField { path: PathBuf, field: String },

    #[error("Unsupported geometry type '{0}' (expected polygon or multipolygon)")]
    UnsupportedGeometry(String),

    #[error("District {0} not found in boundary dataset")]
    DistrictNotFound(i32),

    #[error("No footprints intersect district {0}")]
    NoIntersectingTiles(i32),

    #[error("Raster tile not found: {0}")]
    MissingTile(PathBuf),

    #[error("External tool '{0}' not found on PATH")]
    ToolMissing(String),

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid compression type: {0}")]
    InvalidCompression(String),

    #[error("Input raster has invalid dimensions: {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("Pixel size is non-positive: {0}")]
    InvalidPixelSize(f64),

    #[error("Rotated geotransforms are not supported")]
    RotatedRaster,
}

pub type Result<T> = std::result::Result<T, ZonalStatsError>;
