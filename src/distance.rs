//! Caller-supplied leaf distances.
//!
//! A [`DistanceMatrix`] is validated once on construction (square, at least
//! four leaves, finite non-negative entries, zero diagonal, symmetric) so
//! scoring can read it without further checks.

use crate::error::MatrixError;
use crate::path::TruncatedPathMatrix;
use crate::tree::MIN_LEAF_COUNT;

/// Row-major `n x n` leaf distances.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceMatrix {
    size: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// Wraps a flat row-major buffer of `size * size` entries.
    ///
    /// # Errors
    /// Any [`MatrixError`] describing the first violated input rule.
    pub fn new(size: usize, values: Vec<f64>) -> Result<Self, MatrixError> {
        if size < MIN_LEAF_COUNT {
            return Err(MatrixError::TooSmall(size));
        }
        if values.len() != size * size {
            return Err(MatrixError::WrongDimension {
                size,
                expected: size * size,
                found: values.len(),
            });
        }
        let matrix = DistanceMatrix { size, values };
        matrix.validate()?;
        Ok(matrix)
    }

    /// Builds a matrix from nested rows, as read from a TSV file or passed
    /// in from Python.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, MatrixError> {
        let size = rows.len();
        if size < MIN_LEAF_COUNT {
            return Err(MatrixError::TooSmall(size));
        }
        let mut values = Vec::with_capacity(size * size);
        for (row, entries) in rows.iter().enumerate() {
            if entries.len() != size {
                return Err(MatrixError::RaggedRow { row, expected: size, found: entries.len() });
            }
            values.extend_from_slice(entries);
        }
        Self::new(size, values)
    }

    /// A tree's own leaf path lengths used as distances. Scoring the same
    /// tree against this matrix gives an exact fit.
    pub fn from_path_matrix(paths: &TruncatedPathMatrix) -> Self {
        let size = paths.leaf_count();
        let values = (0..size)
            .flat_map(|i| (0..size).map(move |j| (i, j)))
            .map(|(i, j)| paths.get(i, j) as f64)
            .collect();
        DistanceMatrix { size, values }
    }

    /// Deterministic pseudo-random distances for demos and benchmarks:
    /// `|sin((i + j) * 0.17 + min^2 * 0.3 + max^3 * 0.01)|` off the diagonal.
    pub fn synthetic(size: usize) -> Result<Self, MatrixError> {
        let mut values = vec![0.0; size * size];
        for i in 0..size {
            for j in 0..size {
                if i == j {
                    continue;
                }
                let (lo, hi) = (i.min(j) as f64, i.max(j) as f64);
                let sum = (i + j) as f64 * 0.17 + lo * lo * 0.3 + hi * hi * hi * 0.01;
                values[i * size + j] = sum.sin().abs();
            }
        }
        Self::new(size, values)
    }

    fn validate(&self) -> Result<(), MatrixError> {
        let n = self.size;
        for i in 0..n {
            for j in 0..n {
                let value = self.get(i, j);
                if !value.is_finite() || value < 0.0 {
                    return Err(MatrixError::InvalidEntry(i, j));
                }
            }
            if self.get(i, i) != 0.0 {
                return Err(MatrixError::NonZeroDiagonal(i));
            }
        }
        for i in 0..n {
            for j in i + 1..n {
                if self.get(i, j) != self.get(j, i) {
                    return Err(MatrixError::Asymmetric(i, j));
                }
            }
        }
        Ok(())
    }

    /// Number of leaves the matrix covers.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn get(&self, a: usize, b: usize) -> f64 {
        self.values[a * self.size + b]
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.values.chunks(self.size).map(<[f64]>::to_vec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::QuartetTree;

    #[test]
    fn test_rejects_malformed_input() {
        assert_eq!(DistanceMatrix::new(3, vec![0.0; 9]), Err(MatrixError::TooSmall(3)));
        assert_eq!(
            DistanceMatrix::new(4, vec![0.0; 15]),
            Err(MatrixError::WrongDimension { size: 4, expected: 16, found: 15 })
        );

        let mut rows = vec![vec![0.0; 4]; 4];
        rows[2].pop();
        assert_eq!(
            DistanceMatrix::from_rows(&rows),
            Err(MatrixError::RaggedRow { row: 2, expected: 4, found: 3 })
        );

        let mut rows = vec![vec![0.0; 4]; 4];
        rows[1][1] = 0.5;
        assert_eq!(DistanceMatrix::from_rows(&rows), Err(MatrixError::NonZeroDiagonal(1)));

        let mut rows = vec![vec![0.0; 4]; 4];
        rows[0][3] = 1.0;
        assert_eq!(DistanceMatrix::from_rows(&rows), Err(MatrixError::Asymmetric(0, 3)));

        let mut rows = vec![vec![0.0; 4]; 4];
        rows[2][0] = -1.0;
        rows[0][2] = -1.0;
        assert_eq!(DistanceMatrix::from_rows(&rows), Err(MatrixError::InvalidEntry(0, 2)));

        let mut rows = vec![vec![0.0; 4]; 4];
        rows[1][2] = f64::NAN;
        assert_eq!(DistanceMatrix::from_rows(&rows), Err(MatrixError::InvalidEntry(1, 2)));
    }

    #[test]
    fn test_from_path_matrix() {
        let tree = QuartetTree::fixed_starting_tree(4).unwrap();
        let dm = DistanceMatrix::from_path_matrix(&TruncatedPathMatrix::from_tree(&tree));
        assert_eq!(dm.size(), 4);
        assert_eq!(dm.rows()[0], vec![0.0, 3.0, 2.0, 3.0]);
        assert_eq!(DistanceMatrix::from_rows(&dm.rows()), Ok(dm));
    }

    #[test]
    fn test_synthetic_is_valid() {
        let dm = DistanceMatrix::synthetic(15).unwrap();
        assert_eq!(dm.size(), 15);
        let expected = (1.0f64 * 0.17 + 0.0 + 0.01).sin().abs();
        assert!((dm.get(0, 1) - expected).abs() < 1e-12);
        assert_eq!(dm.get(3, 7), dm.get(7, 3));
    }
}
