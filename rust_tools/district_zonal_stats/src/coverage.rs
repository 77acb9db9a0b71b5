//! Per-pixel coverage of a polygon over a chunk of the raster grid.
//!
//! Pixels crossed by the polygon boundary get their exact covered fraction by
//! clipping; all others are fully in or fully out and are classified by their
//! center.

use crate::chunking::ChunkBounds;
use crate::io::PixelGrid;
use clap::ValueEnum;
use geo::coordinate_position::CoordPos;
use geo::{Area, BooleanOps, CoordinatePosition, Intersects, MultiPolygon};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageMode {
    /// Weight each pixel by the fraction of its area inside the polygon
    Exact,
    /// Count a pixel fully when its center is inside the polygon
    Center,
}

/// Coverage weights in `[0, 1]` for each pixel of `bounds`, rows first.
pub fn coverage_fractions(
    geometry: &MultiPolygon<f64>,
    grid: &PixelGrid,
    bounds: &ChunkBounds,
    mode: CoverageMode,
) -> Array2<f64> {
    let mut weights = Array2::<f64>::zeros((bounds.height(), bounds.width()));

    let chunk_rect = grid.chunk_rect(bounds);
    if !geometry.intersects(&chunk_rect) {
        return weights;
    }

    // Restrict the polygon to this chunk so per-pixel work stays local
    let local = geometry.intersection(&MultiPolygon::new(vec![chunk_rect.to_polygon()]));
    if local.0.is_empty() {
        return weights;
    }

    match mode {
        CoverageMode::Center => {
            for ((row, col), w) in weights.indexed_iter_mut() {
                let center = grid.pixel_center(bounds.x_min + col, bounds.y_min + row);
                if local.coordinate_position(&center) != CoordPos::Outside {
                    *w = 1.0;
                }
            }
        }
        CoverageMode::Exact => {
            let crossed = boundary_cells(&local, grid, bounds);
            let pixel_area = grid.pixel_area();

            for ((row, col), w) in weights.indexed_iter_mut() {
                let (abs_col, abs_row) = (bounds.x_min + col, bounds.y_min + row);
                if crossed[[row, col]] {
                    let cell = MultiPolygon::new(vec![grid.pixel_rect(abs_col, abs_row).to_polygon()]);
                    let covered = local.intersection(&cell).unsigned_area() / pixel_area;
                    *w = covered.clamp(0.0, 1.0);
                } else if local.coordinate_position(&grid.pixel_center(abs_col, abs_row))
                    == CoordPos::Inside
                {
                    *w = 1.0;
                }
            }
        }
    }

    weights
}

/// Marks every pixel whose area may be crossed by a polygon edge. Marking is
/// conservative: each edge marks its whole bounding box of pixels.
fn boundary_cells(geometry: &MultiPolygon<f64>, grid: &PixelGrid, bounds: &ChunkBounds) -> Array2<bool> {
    let (height, width) = (bounds.height(), bounds.width());
    let mut crossed = Array2::from_elem((height, width), false);

    let to_index = |v: f64, offset: usize, len: usize| -> usize {
        let local = v.floor() - offset as f64;
        local.max(0.0).min(len as f64 - 1.0) as usize
    };

    let rings = geometry
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()));

    for ring in rings {
        for line in ring.lines() {
            let (c0, r0) = grid.to_pixel(line.start);
            let (c1, r1) = grid.to_pixel(line.end);

            let col_lo = to_index(c0.min(c1), bounds.x_min, width);
            let col_hi = to_index(c0.max(c1), bounds.x_min, width);
            let row_lo = to_index(r0.min(r1), bounds.y_min, height);
            let row_hi = to_index(r0.max(r1), bounds.y_min, height);

            for row in row_lo..=row_hi {
                for col in col_lo..=col_hi {
                    crossed[[row, col]] = true;
                }
            }
        }
    }

    crossed
}
