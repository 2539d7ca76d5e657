//! Chunked map/reduce execution over whole matrices.
//!
//! Splits the input into row blocks and column chunks, runs the backend's
//! map step per `(row block, row block, column chunk)`, sums the partial
//! statistics per row-block pair and reduces once per pair. Because the
//! statistics are plain sums, the result does not depend on the chunking.

use std::ops::Range;

use log::debug;
use pairdist_core::{DistanceValue, Element, PairdistError, Result};

use crate::backend::MapBackend;
use crate::block::RowBlock;
use crate::metric::Metric;
use crate::tensor::{DistanceMatrix, StatsTensor};

/// Block sizes for chunked execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkConfig {
    /// Rows per row block.
    pub row_chunk: usize,
    /// Columns per column chunk.
    pub col_chunk: usize,
}

impl ChunkConfig {
    pub fn new(row_chunk: usize, col_chunk: usize) -> Self {
        Self {
            row_chunk,
            col_chunk,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.row_chunk == 0 || self.col_chunk == 0 {
            return Err(PairdistError::InvalidInput(format!(
                "chunk sizes must be > 0, got {}×{}",
                self.row_chunk, self.col_chunk
            )));
        }
        Ok(())
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self::new(1024, 4096)
    }
}

fn chunk_ranges(len: usize, chunk: usize) -> Vec<Range<usize>> {
    (0..len)
        .step_by(chunk)
        .map(|start| start..(start + chunk).min(len))
        .collect()
}

/// Map step for one row-block pair, accumulated over all column chunks.
fn map_accumulated<T: Element>(
    backend: &dyn MapBackend<T>,
    a: &RowBlock<'_, T>,
    b: &RowBlock<'_, T>,
    metric: Metric,
    col_ranges: &[Range<usize>],
) -> Result<StatsTensor> {
    let mut stats = StatsTensor::zeros(a.rows(), b.rows(), metric.n_map_param());
    for cols in col_ranges {
        let partial = backend.map_block(
            &a.col_range(cols.clone())?,
            &b.col_range(cols.clone())?,
            metric,
        )?;
        stats.accumulate(&partial)?;
    }
    Ok(stats)
}

/// Distances between every row of `a` and every row of `b`.
///
/// Returns an `(a.rows(), b.rows())` matrix in `T`'s output type.
pub fn cross_distance<T: Element>(
    backend: &dyn MapBackend<T>,
    a: &RowBlock<'_, T>,
    b: &RowBlock<'_, T>,
    metric: Metric,
    chunks: ChunkConfig,
) -> Result<DistanceMatrix<T::Output>> {
    chunks.validate()?;
    if a.cols() != b.cols() {
        return Err(PairdistError::ShapeMismatch(format!(
            "cross_distance: inputs have {} and {} columns",
            a.cols(),
            b.cols()
        )));
    }
    let a_ranges = chunk_ranges(a.rows(), chunks.row_chunk);
    let b_ranges = chunk_ranges(b.rows(), chunks.row_chunk);
    let col_ranges = chunk_ranges(a.cols(), chunks.col_chunk);
    debug!(
        "cross {}: {}×{} row blocks, {} column chunks",
        metric,
        a_ranges.len(),
        b_ranges.len(),
        col_ranges.len()
    );

    let zero = T::Output::from_f64(0.0);
    let mut result = DistanceMatrix::filled(zero, a.rows(), b.rows());
    for ra in &a_ranges {
        let block_a = a.row_range(ra.clone())?;
        for rb in &b_ranges {
            let block_b = b.row_range(rb.clone())?;
            let stats = map_accumulated(backend, &block_a, &block_b, metric, &col_ranges)?;
            let dist = backend.reduce_block(&stats, metric)?;
            for li in 0..block_a.rows() {
                for lj in 0..block_b.rows() {
                    let v = T::Output::from_f64(dist.get(li, lj));
                    result.set(ra.start + li, rb.start + lj, v);
                }
            }
        }
    }
    Ok(result)
}

/// Square `(n, n)` distance matrix between the rows of `x`.
///
/// Only row-block pairs on or above the diagonal are computed; the rest
/// is mirrored.
pub fn pairwise_distance<T: Element>(
    backend: &dyn MapBackend<T>,
    x: &RowBlock<'_, T>,
    metric: Metric,
    chunks: ChunkConfig,
) -> Result<DistanceMatrix<T::Output>> {
    chunks.validate()?;
    let n = x.rows();
    let row_ranges = chunk_ranges(n, chunks.row_chunk);
    let col_ranges = chunk_ranges(x.cols(), chunks.col_chunk);
    debug!(
        "pairwise {}: {} rows in {} blocks, {} columns in {} chunks",
        metric,
        n,
        row_ranges.len(),
        x.cols(),
        col_ranges.len()
    );

    let zero = T::Output::from_f64(0.0);
    let mut result = DistanceMatrix::filled(zero, n, n);
    for (ti, ri) in row_ranges.iter().enumerate() {
        let block_i = x.row_range(ri.clone())?;
        for rj in &row_ranges[ti..] {
            let block_j = x.row_range(rj.clone())?;
            let stats = map_accumulated(backend, &block_i, &block_j, metric, &col_ranges)?;
            let dist = backend.reduce_block(&stats, metric)?;
            for li in 0..block_i.rows() {
                for lj in 0..block_j.rows() {
                    let v = T::Output::from_f64(dist.get(li, lj));
                    result.set(ri.start + li, rj.start + lj, v);
                    result.set(rj.start + lj, ri.start + li, v);
                }
            }
        }
    }
    Ok(result)
}

/// [`pairwise_distance`] with the metric selected by name.
///
/// An unknown name fails before any computation.
pub fn pairwise_distance_by_name<T: Element>(
    backend: &dyn MapBackend<T>,
    x: &RowBlock<'_, T>,
    metric: &str,
    chunks: ChunkConfig,
) -> Result<DistanceMatrix<T::Output>> {
    let metric: Metric = metric.parse()?;
    pairwise_distance(backend, x, metric, chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuBackend;

    /// Deterministic integers in 0..3 with about one in eight missing.
    fn genotypes(n: usize, seed: u64) -> Vec<i8> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let r = (state >> 33) % 8;
                if r == 0 {
                    -1
                } else {
                    (r % 3) as i8
                }
            })
            .collect()
    }

    fn rel_close(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return a.is_nan() && b.is_nan();
        }
        (a - b).abs() <= tol * a.abs().max(b.abs()).max(1.0)
    }

    fn whole(x: &RowBlock<'_, i8>, metric: Metric) -> DistanceMatrix<f64> {
        let cfg = ChunkConfig::new(x.rows(), x.cols());
        pairwise_distance(&CpuBackend::new(), x, metric, cfg).unwrap()
    }

    #[test]
    fn end_to_end_example() {
        let data = [4i8, 3, 2, 3, 5, 6, 7, 0];
        let x = RowBlock::new(&data, 2, 4).unwrap();
        let backend = CpuBackend::new();
        let cfg = ChunkConfig::new(1, 3);

        let e = pairwise_distance(&backend, &x, Metric::Euclidean, cfg).unwrap();
        assert!((e.get(0, 1) - 6.6332).abs() < 1e-4);
        assert_eq!(e.get(0, 0), 0.0);

        let c = pairwise_distance(&backend, &x, Metric::Correlation, cfg).unwrap();
        assert!((c.get(0, 1) - 1.2626).abs() < 1e-4);
        assert!(c.get(0, 0).abs() < 1e-6);
    }

    #[test]
    fn chunking_does_not_change_result() {
        let (n, m) = (18, 40);
        let data = genotypes(n * m, 7);
        let x = RowBlock::new(&data, n, m).unwrap();
        let backend = CpuBackend::new();
        for metric in Metric::all() {
            let expected = whole(&x, metric);
            for cfg in [ChunkConfig::new(6, 10), ChunkConfig::new(5, 7), ChunkConfig::new(1, 1)] {
                let got = pairwise_distance(&backend, &x, metric, cfg).unwrap();
                for (a, b) in expected.as_slice().iter().zip(got.as_slice()) {
                    assert!(rel_close(*a, *b, 1e-6), "{}: {} vs {}", metric, a, b);
                }
            }
        }
    }

    #[test]
    fn chunk_partials_sum_to_full_pass() {
        let (n, m) = (4, 9);
        let data = genotypes(n * m, 11);
        let x = RowBlock::new(&data, n, m).unwrap();
        let backend = CpuBackend::new();
        for metric in Metric::all() {
            let full = backend.map_block(&x, &x, metric).unwrap();
            let parts: Vec<StatsTensor> = [0..2, 2..7, 7..9]
                .into_iter()
                .map(|c| {
                    let chunk = x.col_range(c).unwrap();
                    backend.map_block(&chunk, &chunk, metric).unwrap()
                })
                .collect();
            let summed = StatsTensor::sum_stack(&parts).unwrap();
            for (a, b) in full.as_slice().iter().zip(summed.as_slice()) {
                assert!(rel_close(*a, *b, 1e-12));
            }
        }
    }

    #[test]
    fn result_is_symmetric_with_zero_diagonal() {
        let (n, m) = (9, 12);
        let data = genotypes(n * m, 3);
        let x = RowBlock::new(&data, n, m).unwrap();
        let d = pairwise_distance(&CpuBackend::new(), &x, Metric::Euclidean, ChunkConfig::new(4, 5))
            .unwrap();
        for i in 0..n {
            assert_eq!(d.get(i, i), 0.0);
            for j in 0..n {
                assert_eq!(d.get(i, j), d.get(j, i));
            }
        }
    }

    #[test]
    fn matches_unmasked_definition_without_missing() {
        let data: Vec<f64> = (0..30).map(|v| ((v * 7) % 11) as f64).collect();
        let x = RowBlock::new(&data, 5, 6).unwrap();
        let d = pairwise_distance(&CpuBackend::new(), &x, Metric::Euclidean, ChunkConfig::new(2, 4))
            .unwrap();
        for i in 0..5 {
            for j in 0..5 {
                let expected: f64 = x
                    .row(i)
                    .iter()
                    .zip(x.row(j))
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
                    .sqrt();
                assert!(rel_close(d.get(i, j), expected, 1e-12));
            }
        }
    }

    #[test]
    fn float32_output_family() {
        let data = [1.0f32, 2.0, 3.0, 3.0, 2.0, 1.0];
        let x = RowBlock::new(&data, 2, 3).unwrap();
        let d: DistanceMatrix<f32> =
            pairwise_distance(&CpuBackend::new(), &x, Metric::Correlation, ChunkConfig::new(2, 2))
                .unwrap();
        assert!((d.get(0, 1) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn cross_distance_shape() {
        let a_data = [0.0, 0.0, 3.0, 0.0, 0.0, 4.0];
        let b_data = [0.0, 0.0, 6.0, 8.0];
        let a = RowBlock::new(&a_data, 3, 2).unwrap();
        let b = RowBlock::new(&b_data, 2, 2).unwrap();
        let d = cross_distance(&CpuBackend::new(), &a, &b, Metric::Euclidean, ChunkConfig::new(2, 1))
            .unwrap();
        assert_eq!(d.shape(), (3, 2));
        assert_eq!(d.get(1, 0), 3.0);
        assert_eq!(d.get(0, 1), 10.0);
        assert_eq!(d.get(2, 1), (36.0f64 + 16.0).sqrt());
    }

    #[test]
    fn cross_distance_column_mismatch() {
        let a_data = [0.0; 4];
        let b_data = [0.0; 3];
        let a = RowBlock::new(&a_data, 2, 2).unwrap();
        let b = RowBlock::new(&b_data, 1, 3).unwrap();
        assert!(cross_distance(&CpuBackend::new(), &a, &b, Metric::Euclidean, ChunkConfig::default())
            .is_err());
    }

    #[test]
    fn degenerate_rows_are_nan_not_errors() {
        let data = [1.0f64, 1.0, 1.0, 2.0, 5.0, 9.0, 1.0, 2.0, 3.0];
        let x = RowBlock::new(&data, 3, 3).unwrap();
        let d = pairwise_distance(&CpuBackend::new(), &x, Metric::Correlation, ChunkConfig::new(2, 2))
            .unwrap();
        assert!(d.get(0, 1).is_nan());
        assert!(d.get(1, 0).is_nan());
        assert!(!d.get(1, 2).is_nan());
    }

    #[test]
    fn unknown_metric_name() {
        let data = [1.0, 2.0];
        let x = RowBlock::new(&data, 1, 2).unwrap();
        let err = pairwise_distance_by_name(
            &CpuBackend::new(),
            &x,
            "not-implemented-metric",
            ChunkConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PairdistError::UnknownMetric(_)));
    }

    #[test]
    fn zero_chunk_rejected() {
        let data = [1.0, 2.0];
        let x = RowBlock::new(&data, 1, 2).unwrap();
        let err = pairwise_distance(&CpuBackend::new(), &x, Metric::Euclidean, ChunkConfig::new(0, 1))
            .unwrap_err();
        assert!(matches!(err, PairdistError::InvalidInput(_)));
    }

    #[test]
    fn empty_input() {
        let data: [f64; 0] = [];
        let x = RowBlock::new(&data, 0, 5).unwrap();
        let d = pairwise_distance(&CpuBackend::new(), &x, Metric::Correlation, ChunkConfig::default())
            .unwrap();
        assert_eq!(d.shape(), (0, 0));
    }

    #[test]
    fn chunk_ranges_cover_extent() {
        assert_eq!(chunk_ranges(7, 3), vec![0..3, 3..6, 6..7]);
        assert!(chunk_ranges(0, 3).is_empty());
    }
}
