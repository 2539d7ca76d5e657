//! CPU kernels and the CPU backend.
//!
//! The per-pair map and reduce kernels here are the reference semantics
//! for every backend: the CUDA kernels compute the same sums in the same
//! order, and all backends share the reduce step.

use log::{debug, warn};
use pairdist_core::{mask, Element, PairdistError, Result};

use crate::backend::{BackendKind, Device, DeviceInfo, MapBackend};
use crate::block::RowBlock;
use crate::metric::{MapElement, Metric};
use crate::tensor::{DistanceMatrix, StatsTensor};

// ── Euclidean ──────────────────────────────────────────────────────

/// Euclidean map: `out[0] = Σ (x[i] - y[i])²` over pairwise-valid `i`.
///
/// With no valid positions the sum is 0.
pub fn euclidean_map<T: Element>(x: &[T], y: &[T], out: &mut [f64]) {
    let mut square_sum = 0.0;
    for (a, b) in mask::valid_pairs(x, y) {
        let diff = a - b;
        square_sum += diff * diff;
    }
    out[0] = square_sum;
}

/// Euclidean reduce: square root of the accumulated squared sum.
pub fn euclidean_reduce(stats: &[f64]) -> f64 {
    stats[0].sqrt()
}

// ── Correlation ────────────────────────────────────────────────────

/// Correlation map over the pairwise-valid subset of `x` and `y`.
///
/// Writes `[Σx, Σy, Σx², Σy², Σxy, n]`.
pub fn correlation_map<T: Element>(x: &[T], y: &[T], out: &mut [f64]) {
    let (xs, ys): (Vec<f64>, Vec<f64>) = mask::valid_pairs(x, y).unzip();

    out[0] = xs.iter().sum();
    out[1] = ys.iter().sum();
    out[2] = xs.iter().map(|v| v * v).sum();
    out[3] = ys.iter().map(|v| v * v).sum();
    out[4] = xs.iter().zip(&ys).map(|(a, b)| a * b).sum();
    out[5] = xs.len() as f64;
}

/// Correlation reduce: `1 - r` where `r` is Pearson's correlation.
///
/// Returns NaN when the denominator is not positive (a constant row, or
/// fewer than two valid pairs).
pub fn correlation_reduce(stats: &[f64]) -> f64 {
    let n = stats[5];
    let num = n * stats[4] - stats[0] * stats[1];
    let denom_x = scaled_variance(n, stats[0], stats[2]).sqrt();
    let denom_y = scaled_variance(n, stats[1], stats[3]).sqrt();
    let denom = denom_x * denom_y;
    if denom > 0.0 {
        1.0 - num / denom
    } else {
        f64::NAN
    }
}

/// `n·Σx² - (Σx)²`, clamped to 0 when it is within rounding error of 0.
///
/// For a constant non-integer row the two terms differ only by
/// cancellation error, which can leave a tiny value of either sign.
fn scaled_variance(n: f64, sum: f64, sum_sq: f64) -> f64 {
    let scaled_sq = n * sum_sq;
    let var = scaled_sq - sum * sum;
    if var <= 4.0 * n * f64::EPSILON * scaled_sq {
        0.0
    } else {
        var
    }
}

// ── Block kernels ──────────────────────────────────────────────────

/// Applies `metric`'s map kernel to every row pair of `a` × `b`.
pub fn map_block<T: MapElement>(
    a: &RowBlock<'_, T>,
    b: &RowBlock<'_, T>,
    metric: Metric,
) -> Result<StatsTensor> {
    check_columns(a, b)?;
    let k = metric.n_map_param();
    let (p, q) = (a.rows(), b.rows());
    let map = metric.map_fn::<T>();
    let mut stats = StatsTensor::zeros(p, q, k);
    if p == 0 || q == 0 {
        return Ok(stats);
    }
    debug!(
        "cpu map {}: {}×{} pairs over {} columns",
        metric,
        p,
        q,
        a.cols()
    );

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        stats
            .as_mut_slice()
            .par_chunks_mut(q * k)
            .enumerate()
            .for_each(|(i, row_out)| {
                let x = a.row(i);
                for (j, out) in row_out.chunks_mut(k).enumerate() {
                    map(x, b.row(j), out);
                }
            });
    }
    #[cfg(not(feature = "parallel"))]
    {
        use crate::grid::{launch_on_host, BlockShape, LaunchGrid};
        let grid = LaunchGrid::covering(p, q, BlockShape::default())?;
        launch_on_host(&grid, |i, j| map(a.row(i), b.row(j), stats.pair_mut(i, j)));
    }

    Ok(stats)
}

/// Reduces every row pair's accumulated statistics to a distance.
///
/// Degenerate pairs become NaN and are reported with a warning; they never
/// fail the call.
pub fn reduce_block(stats: &StatsTensor, metric: Metric) -> Result<DistanceMatrix<f64>> {
    let (p, q, k) = stats.shape();
    if k != metric.n_map_param() {
        return Err(PairdistError::ShapeMismatch(format!(
            "reduce {}: expected {} statistics per pair, got {}",
            metric,
            metric.n_map_param(),
            k
        )));
    }
    let mut values = Vec::with_capacity(p * q);
    for i in 0..p {
        for j in 0..q {
            values.push(metric.reduce_pair(stats.pair(i, j)));
        }
    }
    let out = DistanceMatrix::from_vec(values, p, q)?;
    let degenerate = out.degenerate_count();
    if degenerate > 0 {
        warn!(
            "{}: {} of {} row pairs are degenerate (zero variance or too few valid pairs); reported as NaN",
            metric,
            degenerate,
            p * q
        );
    }
    Ok(out)
}

pub(crate) fn check_columns<T: Element>(a: &RowBlock<'_, T>, b: &RowBlock<'_, T>) -> Result<()> {
    if a.cols() != b.cols() {
        return Err(PairdistError::ShapeMismatch(format!(
            "row blocks have {} and {} columns",
            a.cols(),
            b.cols()
        )));
    }
    Ok(())
}

// ── Backend ────────────────────────────────────────────────────────

/// CPU compute backend.
///
/// Runs the host kernels above. This backend serves as the reference
/// implementation and the fallback when no GPU is available.
pub struct CpuBackend {
    parallelism: usize,
}

impl CpuBackend {
    /// Creates a new CPU backend, detecting available parallelism.
    pub fn new() -> Self {
        #[cfg(feature = "parallel")]
        let parallelism = rayon::current_num_threads();
        #[cfg(not(feature = "parallel"))]
        let parallelism = 1;
        Self { parallelism }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for CpuBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "CPU".to_string(),
            kind: BackendKind::Cpu,
            total_memory: 0,
            max_parallelism: self.parallelism,
        }
    }
}

impl<T: MapElement> MapBackend<T> for CpuBackend {
    fn map_block(
        &self,
        a: &RowBlock<'_, T>,
        b: &RowBlock<'_, T>,
        metric: Metric,
    ) -> Result<StatsTensor> {
        map_block(a, b, metric)
    }
}
