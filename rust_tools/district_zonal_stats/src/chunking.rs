use log::debug;

/// A rectangle of pixels in raster coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub x_off: usize,
    pub y_off: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelWindow {
    pub fn new(x_off: usize, y_off: usize, width: usize, height: usize) -> Self {
        Self {
            x_off,
            y_off,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// Bounds of one chunk, in absolute raster pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBounds {
    pub x_min: usize,
    pub y_min: usize,
    pub x_max: usize,
    pub y_max: usize,
}

impl ChunkBounds {
    pub fn width(&self) -> usize {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> usize {
        self.y_max - self.y_min
    }
}

/// Splits a pixel window into square chunks so a district never has to be
/// read in one piece.
pub struct ChunkGrid {
    window: PixelWindow,
    chunk_size: usize,
    pub num_chunks_x: usize,
    pub num_chunks_y: usize,
    pub total_chunks: usize,
}

impl ChunkGrid {
    pub fn new(window: PixelWindow, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let num_chunks_x = window.width.div_ceil(chunk_size);
        let num_chunks_y = window.height.div_ceil(chunk_size);
        let total_chunks = num_chunks_x * num_chunks_y;

        debug!(
            "ChunkGrid: {}x{} window at ({}, {}), chunk_size={} → {}x{} chunks ({} total)",
            window.width,
            window.height,
            window.x_off,
            window.y_off,
            chunk_size,
            num_chunks_x,
            num_chunks_y,
            total_chunks
        );

        Self {
            window,
            chunk_size,
            num_chunks_x,
            num_chunks_y,
            total_chunks,
        }
    }

    pub fn iter(&self) -> ChunkIterator<'_> {
        ChunkIterator::new(self)
    }

    pub fn get_chunk_bounds(&self, chunk_idx: usize) -> ChunkBounds {
        let chunk_y = chunk_idx / self.num_chunks_x;
        let chunk_x = chunk_idx % self.num_chunks_x;

        let x_min = self.window.x_off + chunk_x * self.chunk_size;
        let y_min = self.window.y_off + chunk_y * self.chunk_size;
        let x_max = (x_min + self.chunk_size).min(self.window.x_off + self.window.width);
        let y_max = (y_min + self.chunk_size).min(self.window.y_off + self.window.height);

        ChunkBounds {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }
}

pub struct ChunkIterator<'a> {
    grid: &'a ChunkGrid,
    current_idx: usize,
}

impl<'a> ChunkIterator<'a> {
    fn new(grid: &'a ChunkGrid) -> Self {
        Self {
            grid,
            current_idx: 0,
        }
    }
}

impl<'a> Iterator for ChunkIterator<'a> {
    type Item = (usize, ChunkBounds);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_idx < self.grid.total_chunks {
            let bounds = self.grid.get_chunk_bounds(self.current_idx);
            let idx = self.current_idx;
            self.current_idx += 1;
            Some((idx, bounds))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_grid_simple() {
        let grid = ChunkGrid::new(PixelWindow::new(0, 0, 4000, 4000), 2000);
        assert_eq!(grid.num_chunks_x, 2);
        assert_eq!(grid.num_chunks_y, 2);
        assert_eq!(grid.total_chunks, 4);
    }

    #[test]
    fn test_chunk_bounds_are_offset_by_window() {
        let grid = ChunkGrid::new(PixelWindow::new(100, 50, 300, 200), 128);
        let first = grid.get_chunk_bounds(0);
        assert_eq!(first, ChunkBounds { x_min: 100, y_min: 50, x_max: 228, y_max: 178 });

        // Last chunk is clipped to the window
        let last = grid.get_chunk_bounds(grid.total_chunks - 1);
        assert_eq!(last.x_max, 400);
        assert_eq!(last.y_max, 250);
        assert_eq!(last.width(), 44);
        assert_eq!(last.height(), 72);
    }

    #[test]
    fn test_chunks_cover_window_exactly() {
        let window = PixelWindow::new(3, 7, 130, 61);
        let grid = ChunkGrid::new(window, 32);
        let covered: usize = grid.iter().map(|(_, b)| b.width() * b.height()).sum();
        assert_eq!(covered, window.pixel_count());
    }

    #[test]
    fn test_empty_window_has_no_chunks() {
        let grid = ChunkGrid::new(PixelWindow::new(0, 0, 0, 10), 16);
        assert_eq!(grid.total_chunks, 0);
        assert_eq!(grid.iter().count(), 0);
    }
}
