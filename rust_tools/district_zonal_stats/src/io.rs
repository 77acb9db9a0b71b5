use std::path::Path;

use crate::chunking::{ChunkBounds, PixelWindow};
use crate::error::{Result, ZonalStatsError};
use gdal::raster::RasterBand;
use gdal::{Dataset, Metadata};
use geo::{coord, Coord, Rect};
use log::{debug, info};
use ndarray::Array2;

/// Affine mapping between pixel and map coordinates of a north-up raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelGrid {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Signed; negative for north-up rasters
    pub pixel_height: f64,
}

impl PixelGrid {
    pub fn from_geotransform(gt: &[f64; 6]) -> Result<Self> {
        if gt[2] != 0.0 || gt[4] != 0.0 {
            return Err(ZonalStatsError::RotatedRaster);
        }
        if gt[1] <= 0.0 {
            return Err(ZonalStatsError::InvalidPixelSize(gt[1]));
        }
        if gt[5] == 0.0 {
            return Err(ZonalStatsError::InvalidPixelSize(gt[5]));
        }
        Ok(Self {
            origin_x: gt[0],
            origin_y: gt[3],
            pixel_width: gt[1],
            pixel_height: gt[5],
        })
    }

    pub fn pixel_area(&self) -> f64 {
        (self.pixel_width * self.pixel_height).abs()
    }

    /// Map coordinate of a pixel-space position (col, row may be fractional).
    pub fn to_map(&self, col: f64, row: f64) -> Coord<f64> {
        coord! {
            x: self.origin_x + col * self.pixel_width,
            y: self.origin_y + row * self.pixel_height,
        }
    }

    /// Fractional pixel-space position of a map coordinate.
    pub fn to_pixel(&self, c: Coord<f64>) -> (f64, f64) {
        (
            (c.x - self.origin_x) / self.pixel_width,
            (c.y - self.origin_y) / self.pixel_height,
        )
    }

    pub fn pixel_rect(&self, col: usize, row: usize) -> Rect<f64> {
        Rect::new(
            self.to_map(col as f64, row as f64),
            self.to_map(col as f64 + 1.0, row as f64 + 1.0),
        )
    }

    pub fn pixel_center(&self, col: usize, row: usize) -> Coord<f64> {
        self.to_map(col as f64 + 0.5, row as f64 + 0.5)
    }

    pub fn chunk_rect(&self, bounds: &ChunkBounds) -> Rect<f64> {
        Rect::new(
            self.to_map(bounds.x_min as f64, bounds.y_min as f64),
            self.to_map(bounds.x_max as f64, bounds.y_max as f64),
        )
    }

    pub fn extent(&self, width: usize, height: usize) -> Rect<f64> {
        Rect::new(
            self.to_map(0.0, 0.0),
            self.to_map(width as f64, height as f64),
        )
    }

    /// Smallest pixel window of a `width` x `height` raster that covers
    /// `bounds`, or `None` when they do not overlap.
    pub fn window_for(&self, bounds: &Rect<f64>, width: usize, height: usize) -> Option<PixelWindow> {
        let (c0, r0) = self.to_pixel(bounds.min());
        let (c1, r1) = self.to_pixel(bounds.max());

        let clamp = |v: f64, max: usize| v.max(0.0).min(max as f64) as usize;
        let col_min = clamp(c0.min(c1).floor(), width);
        let col_max = clamp(c0.max(c1).ceil(), width);
        let row_min = clamp(r0.min(r1).floor(), height);
        let row_max = clamp(r0.max(r1).ceil(), height);

        let window = PixelWindow::new(col_min, row_min, col_max - col_min, row_max - row_min);
        (!window.is_empty()).then_some(window)
    }
}

#[derive(Debug, Clone)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub geotransform: [f64; 6],
    pub projection: String,
    pub grid: PixelGrid,
    /// Per-band nodata value, index 0 is band 1
    pub nodata: Vec<Option<f64>>,
    /// Per-band description, index 0 is band 1
    pub descriptions: Vec<Option<String>>,
}

impl RasterMetadata {
    pub fn extent(&self) -> Rect<f64> {
        self.grid.extent(self.width, self.height)
    }
}

pub fn open_raster(path: &Path) -> Result<Dataset> {
    debug!("Opening raster: {}", path.display());
    Ok(Dataset::open(path)?)
}

/// Extract metadata from a dataset without reading pixel data
pub fn extract_metadata_from_dataset(dataset: &Dataset) -> Result<RasterMetadata> {
    let (width, height) = dataset.raster_size();
    let (width, height) = (width as usize, height as usize);
    if width == 0 || height == 0 {
        return Err(ZonalStatsError::InvalidDimensions(width, height));
    }

    let band_count = dataset.raster_count() as usize;
    let geotransform = dataset.geo_transform()?;
    let grid = PixelGrid::from_geotransform(&geotransform)?;

    let mut nodata = Vec::with_capacity(band_count);
    let mut descriptions = Vec::with_capacity(band_count);
    for band_index in 1..=band_count {
        let band: RasterBand = dataset.rasterband(band_index)?;
        nodata.push(band.no_data_value());
        descriptions.push(band.description().ok().filter(|d| !d.is_empty()));
    }

    Ok(RasterMetadata {
        width,
        height,
        band_count,
        geotransform,
        projection: dataset.projection(),
        grid,
        nodata,
        descriptions,
    })
}

pub fn read_raster_metadata(path: &Path) -> Result<RasterMetadata> {
    info!("Reading raster metadata: {}", path.display());
    let dataset = open_raster(path)?;
    let metadata = extract_metadata_from_dataset(&dataset)?;

    debug!(
        "Raster {}x{} with {} bands, pixel size {:.6} x {:.6}",
        metadata.width,
        metadata.height,
        metadata.band_count,
        metadata.grid.pixel_width,
        metadata.grid.pixel_height.abs()
    );
    Ok(metadata)
}

/// Read one chunk of a band as `f64`, rows first.
pub fn read_band_chunk(
    dataset: &Dataset,
    band_index: usize,
    bounds: &ChunkBounds,
) -> Result<Array2<f64>> {
    let rasterband = dataset.rasterband(band_index)?;
    let (width, height) = (bounds.width(), bounds.height());

    debug!(
        "Reading band {} chunk: offset=({},{}), size=({},{})",
        band_index, bounds.x_min, bounds.y_min, width, height
    );

    let buffer = rasterband.read_as::<f64>(
        (bounds.x_min as isize, bounds.y_min as isize),
        (width, height),
        (width, height),
        None,
    )?;

    let data_vec: Vec<f64> = buffer.into_iter().collect();
    let data = Array2::from_shape_vec((height, width), data_vec)?;
    Ok(data)
}
