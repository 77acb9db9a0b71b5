// Library exports for testing and reuse

pub mod chunking;
pub mod cli;
pub mod coverage;
pub mod crs;
pub mod district;
pub mod error;
pub mod footprint;
pub mod io;
pub mod mosaic;
pub mod pipeline;
pub mod report;
pub mod vector;
pub mod zonal;

// Re-export commonly used types
pub use coverage::CoverageMode;
pub use error::{Result, ZonalStatsError};
pub use pipeline::{run, BatchSummary, PipelineConfig};
pub use report::DistrictReport;
pub use zonal::{zonal_statistics, BandStatistics, Statistic};
