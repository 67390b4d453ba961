//! # Fixed size motion grid
//!
//! Partitions a motion magnitude field into a coarse grid of equal cells and
//! reduces each cell to its arithmetic mean. The grid is the pipeline's unit
//! of output.

use crate::error::{Error, Result};
use crate::frame::GrayFrame;

/// Aggregated per-cell motion intensities.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionGrid {
    cells: Vec<f32>,
    width: usize,
}

impl MotionGrid {
    /// Get width and height of the grid.
    pub fn dim(&self) -> (usize, usize) {
        (self.width, self.cells.len() / self.width)
    }

    /// Get the cells in row-major order.
    ///
    /// This is the wire layout: `grid[0,0], grid[0,1], ... grid[H-1,W-1]`.
    pub fn as_slice(&self) -> &[f32] {
        &self.cells
    }

    /// Get the cell at grid coordinates.
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.cells[y * self.width + x]
    }
}

/// Reduces motion fields of a fixed geometry into `MotionGrid`s.
pub struct GridAggregator {
    field_width: usize,
    field_height: usize,
    cell_size: usize,
}

impl GridAggregator {
    /// Create an aggregator for the given field geometry.
    ///
    /// Fails with `Error::Config` unless `cell_size` divides both field
    /// dimensions exactly. This is the startup-time check; `aggregate` can
    /// then assume a clean partition.
    pub fn new(field_width: usize, field_height: usize, cell_size: usize) -> Result<Self> {
        if cell_size == 0 || field_width % cell_size != 0 || field_height % cell_size != 0 {
            return Err(Error::Config(format!(
                "cell size {} does not divide field {}x{}",
                cell_size, field_width, field_height
            )));
        }

        Ok(Self {
            field_width,
            field_height,
            cell_size,
        })
    }

    /// Output grid dimensions.
    pub fn grid_dim(&self) -> (usize, usize) {
        (
            self.field_width / self.cell_size,
            self.field_height / self.cell_size,
        )
    }

    /// Reduce one motion field to a grid of per-cell means.
    ///
    /// Means are computed in f32 with no intermediate rounding.
    pub fn aggregate(&self, field: &GrayFrame) -> MotionGrid {
        assert_eq!(field.dim(), (self.field_width, self.field_height));

        let (gw, gh) = self.grid_dim();
        let inv_area = 1.0 / (self.cell_size * self.cell_size) as f32;
        let mut cells = Vec::with_capacity(gw * gh);

        for gy in 0..gh {
            for gx in 0..gw {
                let mut sum = 0.0f32;
                for y in gy * self.cell_size..(gy + 1) * self.cell_size {
                    for x in gx * self.cell_size..(gx + 1) * self.cell_size {
                        sum += field.get(x, y) as f32;
                    }
                }
                cells.push(sum * inv_area);
            }
        }

        MotionGrid { cells, width: gw }
    }
}
