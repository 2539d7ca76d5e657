//! Partial-statistics tensors and distance matrices.
//!
//! A [`StatsTensor`] holds, for every row pair `(i, j)` of two row blocks,
//! the `k` partial statistics a metric's map step produced. Each slot is a
//! plain sum, so tensors computed over disjoint column chunks of the same
//! row blocks combine with [`StatsTensor::accumulate`] into exactly the
//! tensor of a single pass over all columns.

use pairdist_core::{DistanceValue, PairdistError, Result, Summarizable};

/// A `(rows, cols, n_param)` row-major tensor of `f64` partial statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsTensor {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
    n_param: usize,
}

impl StatsTensor {
    /// Zero-initialized tensor.
    pub fn zeros(rows: usize, cols: usize, n_param: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols * n_param],
            rows,
            cols,
            n_param,
        }
    }

    /// Wraps existing row-major data, checking it matches the shape.
    pub fn from_vec(data: Vec<f64>, rows: usize, cols: usize, n_param: usize) -> Result<Self> {
        let expected = rows * cols * n_param;
        if data.len() != expected {
            return Err(PairdistError::ShapeMismatch(format!(
                "StatsTensor: expected {} elements ({}×{}×{}), got {}",
                expected,
                rows,
                cols,
                n_param,
                data.len()
            )));
        }
        Ok(Self {
            data,
            rows,
            cols,
            n_param,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of statistics per row pair.
    pub fn n_param(&self) -> usize {
        self.n_param
    }

    /// `(rows, cols, n_param)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.rows, self.cols, self.n_param)
    }

    /// Statistics for row pair `(i, j)`.
    #[inline]
    pub fn pair(&self, i: usize, j: usize) -> &[f64] {
        let start = (i * self.cols + j) * self.n_param;
        &self.data[start..start + self.n_param]
    }

    /// Mutable statistics for row pair `(i, j)`.
    #[inline]
    pub fn pair_mut(&mut self, i: usize, j: usize) -> &mut [f64] {
        let start = (i * self.cols + j) * self.n_param;
        &mut self.data[start..start + self.n_param]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Adds `other` slot by slot. Both tensors must have the same shape.
    pub fn accumulate(&mut self, other: &StatsTensor) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(PairdistError::ShapeMismatch(format!(
                "accumulate: {:?} vs {:?}",
                self.shape(),
                other.shape()
            )));
        }
        for (acc, v) in self.data.iter_mut().zip(&other.data) {
            *acc += v;
        }
        Ok(())
    }

    /// Sums a stack of same-shaped tensors, one per column chunk.
    pub fn sum_stack(stack: &[StatsTensor]) -> Result<StatsTensor> {
        let (first, rest) = stack.split_first().ok_or_else(|| {
            PairdistError::InvalidInput("sum_stack: stack is empty".to_string())
        })?;
        let mut total = first.clone();
        for t in rest {
            total.accumulate(t)?;
        }
        Ok(total)
    }
}

impl Summarizable for StatsTensor {
    fn summary(&self) -> String {
        format!(
            "StatsTensor({}×{}×{} f64s)",
            self.rows, self.cols, self.n_param
        )
    }
}

/// A `(rows, cols)` row-major matrix of distances.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix<D> {
    data: Vec<D>,
    rows: usize,
    cols: usize,
}

impl<D: DistanceValue> DistanceMatrix<D> {
    /// Wraps existing row-major data, checking it matches the shape.
    pub fn from_vec(data: Vec<D>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(PairdistError::ShapeMismatch(format!(
                "DistanceMatrix: expected {} elements ({}×{}), got {}",
                rows * cols,
                rows,
                cols,
                data.len()
            )));
        }
        Ok(Self { data, rows, cols })
    }

    pub(crate) fn filled(value: D, rows: usize, cols: usize) -> Self {
        Self {
            data: vec![value; rows * cols],
            rows,
            cols,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> D {
        self.data[i * self.cols + j]
    }

    #[inline]
    pub(crate) fn set(&mut self, i: usize, j: usize, v: D) {
        self.data[i * self.cols + j] = v;
    }

    pub fn as_slice(&self) -> &[D] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<D> {
        self.data
    }

    /// Number of undefined (NaN) entries.
    pub fn degenerate_count(&self) -> usize {
        self.data.iter().filter(|v| v.to_f64().is_nan()).count()
    }

    /// Converts every entry to another distance type.
    pub fn cast<E: DistanceValue>(self) -> DistanceMatrix<E> {
        DistanceMatrix {
            data: self.data.into_iter().map(|v| E::from_f64(v.to_f64())).collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }
}

impl<D: DistanceValue> Summarizable for DistanceMatrix<D> {
    fn summary(&self) -> String {
        format!(
            "DistanceMatrix({}×{} {}, {} undefined)",
            self.rows,
            self.cols,
            core::any::type_name::<D>(),
            self.degenerate_count()
        )
    }
}
