//! 2-D launch grids.
//!
//! A map kernel launch covers a `(rows, cols)` output co-domain with a grid
//! of thread blocks. The grid is rounded up to whole blocks, so some threads
//! land outside the co-domain and must exit without writing. The mapping
//! from `(block, thread)` to an output slot lives here so the same logic
//! drives the CUDA launch configuration and the host emulation.

use pairdist_core::{PairdistError, Result};

/// Threads per block along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockShape {
    /// Threads along the row (x) axis.
    pub x: u32,
    /// Threads along the column (y) axis.
    pub y: u32,
}

impl BlockShape {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Threads per block.
    pub fn threads(&self) -> u32 {
        self.x * self.y
    }
}

impl Default for BlockShape {
    /// 32×32, the CUDA limit of 1024 threads per block.
    fn default() -> Self {
        Self::new(32, 32)
    }
}

/// CUDA's limit on blocks along the grid x axis.
pub const MAX_GRID_X: u32 = (1 << 31) - 1;
/// CUDA's limit on blocks along the grid y axis.
pub const MAX_GRID_Y: u32 = 65_535;

/// A 2-D grid covering a `(rows, cols)` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGrid {
    /// Blocks along x and y.
    pub blocks: (u32, u32),
    /// Threads per block.
    pub shape: BlockShape,
    /// Output bounds.
    pub rows: usize,
    pub cols: usize,
}

impl LaunchGrid {
    /// Smallest grid of `shape` blocks covering `(rows, cols)`.
    pub fn covering(rows: usize, cols: usize, shape: BlockShape) -> Result<Self> {
        if shape.x == 0 || shape.y == 0 {
            return Err(PairdistError::InvalidInput(format!(
                "LaunchGrid: block shape {}×{} has no threads",
                shape.x, shape.y
            )));
        }
        let bx = blocks_for(rows, shape.x)?;
        let by = blocks_for(cols, shape.y)?;
        Ok(Self {
            blocks: (bx, by),
            shape,
            rows,
            cols,
        })
    }

    /// Output slot addressed by thread `thread` of block `block`.
    ///
    /// Row comes from the x axis and column from the y axis, matching the
    /// device kernels.
    #[inline]
    pub fn global_index(&self, block: (u32, u32), thread: (u32, u32)) -> (usize, usize) {
        let i = block.0 as usize * self.shape.x as usize + thread.0 as usize;
        let j = block.1 as usize * self.shape.y as usize + thread.1 as usize;
        (i, j)
    }

    /// Whether slot `(i, j)` lies inside the output.
    #[inline]
    pub fn in_bounds(&self, i: usize, j: usize) -> bool {
        i < self.rows && j < self.cols
    }

    /// Checks the block counts against the CUDA grid limits.
    ///
    /// The host emulation has no such limit; device launches call this
    /// before staging any data.
    pub fn check_device_limits(&self) -> Result<()> {
        let (bx, by) = self.blocks;
        if bx > MAX_GRID_X || by > MAX_GRID_Y {
            return Err(PairdistError::InvalidInput(format!(
                "LaunchGrid: {}×{} blocks exceed the device grid limit of {}×{}; \
                 use smaller row blocks",
                bx, by, MAX_GRID_X, MAX_GRID_Y
            )));
        }
        Ok(())
    }

    /// Total threads launched, including those past the output bounds.
    pub fn thread_count(&self) -> usize {
        self.blocks.0 as usize
            * self.blocks.1 as usize
            * self.shape.threads() as usize
    }
}

fn blocks_for(extent: usize, threads: u32) -> Result<u32> {
    let blocks = extent.div_ceil(threads as usize);
    u32::try_from(blocks).map_err(|_| {
        PairdistError::InvalidInput(format!(
            "LaunchGrid: {} blocks exceed the grid dimension limit",
            blocks
        ))
    })
}

/// Runs `kernel(i, j)` once per in-bounds thread of `grid`, on the host.
///
/// Excess threads from rounding the grid up are skipped, as a device
/// kernel's early return would.
pub fn launch_on_host<F>(grid: &LaunchGrid, mut kernel: F)
where
    F: FnMut(usize, usize),
{
    for bx in 0..grid.blocks.0 {
        for by in 0..grid.blocks.1 {
            for tx in 0..grid.shape.x {
                for ty in 0..grid.shape.y {
                    let (i, j) = grid.global_index((bx, by), (tx, ty));
                    if !grid.in_bounds(i, j) {
                        continue;
                    }
                    kernel(i, j);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covering_rounds_up() {
        let g = LaunchGrid::covering(33, 64, BlockShape::default()).unwrap();
        assert_eq!(g.blocks, (2, 2));
        assert_eq!(g.thread_count(), 4 * 1024);
    }

    #[test]
    fn device_limits() {
        let shape = BlockShape::default();
        let at_limit = LaunchGrid::covering(64, 65_535 * 32, shape).unwrap();
        assert_eq!(at_limit.blocks, (2, 65_535));
        assert!(at_limit.check_device_limits().is_ok());

        let past_limit = LaunchGrid::covering(64, 65_535 * 32 + 1, shape).unwrap();
        assert_eq!(past_limit.blocks.1, 65_536);
        let err = past_limit.check_device_limits().unwrap_err();
        assert!(matches!(err, PairdistError::InvalidInput(_)));

        let tall = LaunchGrid::covering(65_536 * 32, 1, shape).unwrap();
        assert!(tall.check_device_limits().is_ok());
    }

    #[test]
    fn empty_output_launches_nothing() {
        let g = LaunchGrid::covering(0, 10, BlockShape::default()).unwrap();
        assert_eq!(g.thread_count(), 0);
        let mut calls = 0;
        launch_on_host(&g, |_, _| calls += 1);
        assert_eq!(calls, 0);
    }

    #[test]
    fn zero_block_shape_rejected() {
        assert!(LaunchGrid::covering(4, 4, BlockShape::new(0, 32)).is_err());
    }

    #[test]
    fn global_index_mapping() {
        let g = LaunchGrid::covering(100, 100, BlockShape::new(8, 4)).unwrap();
        assert_eq!(g.global_index((0, 0), (0, 0)), (0, 0));
        assert_eq!(g.global_index((1, 0), (3, 0)), (11, 0));
        assert_eq!(g.global_index((2, 3), (7, 1)), (23, 13));
    }

    #[test]
    fn every_slot_visited_exactly_once() {
        let (rows, cols) = (5, 7);
        let g = LaunchGrid::covering(rows, cols, BlockShape::new(4, 4)).unwrap();
        assert!(g.thread_count() > rows * cols);
        let mut hits = vec![0u32; rows * cols];
        launch_on_host(&g, |i, j| hits[i * cols + j] += 1);
        assert!(hits.iter().all(|&h| h == 1));
    }
}
