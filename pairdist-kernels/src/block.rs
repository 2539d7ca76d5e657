//! Read-only row-block views over row-major input matrices.

use std::borrow::Cow;
use std::ops::Range;

use pairdist_core::{Element, PairdistError, Result};

/// A `(rows, cols)` window onto row-major data.
///
/// Row `i` starts at `i * row_stride`. A block cut out of a wider matrix by
/// [`RowBlock::col_range`] keeps the parent stride and is therefore not
/// densely packed; kernels that need packed input call
/// [`RowBlock::to_standard_layout`].
#[derive(Debug, Clone, Copy)]
pub struct RowBlock<'a, T> {
    data: &'a [T],
    rows: usize,
    cols: usize,
    row_stride: usize,
}

impl<'a, T: Element> RowBlock<'a, T> {
    /// Wraps densely packed row-major data of shape `(rows, cols)`.
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(PairdistError::ShapeMismatch(format!(
                "RowBlock: expected {} elements ({}×{}), got {}",
                rows * cols,
                rows,
                cols,
                data.len()
            )));
        }
        Ok(Self {
            data,
            rows,
            cols,
            row_stride: cols,
        })
    }

    /// Wraps strided row-major data: row `i` is `data[i*row_stride..i*row_stride+cols]`.
    pub fn with_stride(data: &'a [T], rows: usize, cols: usize, row_stride: usize) -> Result<Self> {
        if row_stride < cols {
            return Err(PairdistError::InvalidInput(format!(
                "RowBlock: row stride {} is smaller than column count {}",
                row_stride, cols
            )));
        }
        let needed = if rows == 0 {
            0
        } else {
            (rows - 1) * row_stride + cols
        };
        if data.len() < needed {
            return Err(PairdistError::ShapeMismatch(format!(
                "RowBlock: {} rows of stride {} need {} elements, got {}",
                rows,
                row_stride,
                needed,
                data.len()
            )));
        }
        Ok(Self {
            data,
            rows,
            cols,
            row_stride,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns row `i`. Panics if `i >= rows`.
    #[inline]
    pub fn row(&self, i: usize) -> &'a [T] {
        assert!(i < self.rows, "row {} out of range for {} rows", i, self.rows);
        let start = i * self.row_stride;
        &self.data[start..start + self.cols]
    }

    /// Iterates the rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &'a [T]> + '_ {
        (0..self.rows).map(move |i| self.row(i))
    }

    /// Whether rows are densely packed with no gaps between them.
    pub fn is_standard_layout(&self) -> bool {
        self.row_stride == self.cols || self.rows <= 1
    }

    /// Returns the block as densely packed row-major data, copying only if strided.
    pub fn to_standard_layout(&self) -> Cow<'a, [T]> {
        if self.is_standard_layout() {
            let len = self.rows * self.cols;
            Cow::Borrowed(&self.data[..len])
        } else {
            let mut packed = Vec::with_capacity(self.rows * self.cols);
            for row in self.iter_rows() {
                packed.extend_from_slice(row);
            }
            Cow::Owned(packed)
        }
    }

    /// Sub-view over a contiguous range of rows.
    pub fn row_range(&self, range: Range<usize>) -> Result<RowBlock<'a, T>> {
        if range.start > range.end || range.end > self.rows {
            return Err(PairdistError::InvalidInput(format!(
                "RowBlock: row range {:?} out of bounds for {} rows",
                range, self.rows
            )));
        }
        let rows = range.end - range.start;
        let start = (range.start * self.row_stride).min(self.data.len());
        Ok(Self {
            data: &self.data[start..],
            rows,
            cols: self.cols,
            row_stride: self.row_stride,
        })
    }

    /// Sub-view over a contiguous range of columns (a column chunk).
    pub fn col_range(&self, range: Range<usize>) -> Result<RowBlock<'a, T>> {
        if range.start > range.end || range.end > self.cols {
            return Err(PairdistError::InvalidInput(format!(
                "RowBlock: column range {:?} out of bounds for {} columns",
                range, self.cols
            )));
        }
        let start = range.start.min(self.data.len());
        Ok(Self {
            data: &self.data[start..],
            rows: self.rows,
            cols: range.end - range.start,
            row_stride: self.row_stride,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> Vec<f64> {
        // 3 × 4
        vec![
            0.0, 1.0, 2.0, 3.0, //
            4.0, 5.0, 6.0, 7.0, //
            8.0, 9.0, 10.0, 11.0,
        ]
    }

    #[test]
    fn new_rejects_bad_length() {
        let data = matrix();
        assert!(RowBlock::new(&data, 3, 3).is_err());
        assert!(RowBlock::new(&data, 3, 4).is_ok());
    }

    #[test]
    fn rows_and_packing() {
        let data = matrix();
        let b = RowBlock::new(&data, 3, 4).unwrap();
        assert_eq!(b.row(1), &[4.0, 5.0, 6.0, 7.0]);
        assert!(b.is_standard_layout());
        assert!(matches!(b.to_standard_layout(), Cow::Borrowed(_)));
    }

    #[test]
    fn column_chunk_is_strided() {
        let data = matrix();
        let b = RowBlock::new(&data, 3, 4).unwrap();
        let c = b.col_range(1..3).unwrap();
        assert_eq!(c.cols(), 2);
        assert_eq!(c.row(0), &[1.0, 2.0]);
        assert_eq!(c.row(2), &[9.0, 10.0]);
        assert!(!c.is_standard_layout());
        let packed = c.to_standard_layout();
        assert!(matches!(packed, Cow::Owned(_)));
        assert_eq!(&*packed, &[1.0, 2.0, 5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn row_then_column_chunk() {
        let data = matrix();
        let b = RowBlock::new(&data, 3, 4).unwrap();
        let sub = b.row_range(1..3).unwrap().col_range(2..4).unwrap();
        assert_eq!(sub.rows(), 2);
        assert_eq!(sub.row(0), &[6.0, 7.0]);
        assert_eq!(sub.row(1), &[10.0, 11.0]);
    }

    #[test]
    fn empty_ranges() {
        let data = matrix();
        let b = RowBlock::new(&data, 3, 4).unwrap();
        assert_eq!(b.row_range(3..3).unwrap().rows(), 0);
        assert_eq!(b.col_range(4..4).unwrap().cols(), 0);
        assert!(b.row_range(2..4).is_err());
    }

    #[test]
    fn stride_validation() {
        let data = matrix();
        assert!(RowBlock::with_stride(&data, 3, 2, 4).is_ok());
        assert!(RowBlock::with_stride(&data, 3, 4, 2).is_err());
        assert!(RowBlock::with_stride(&data, 4, 2, 4).is_err());
    }
}
