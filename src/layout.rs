//// # Packed layouts
////
//// Lower triangular matrices are stored row by row, without the zeros above the diagonal.
//// The Cholesky factors given as input have an implicit unit diagonal and store only the
//// `dim * (dim - 1) / 2` strictly lower entries; the scores, instead, are computed for every
//// entry of the factor, diagonal included, for a total of `dim * (dim + 1) / 2` positions.
//// Keeping the offset arithmetic here means the estimators never compute a row start by hand.

use std::ops::Range;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Diagonal {
    /// Each row `r` holds the `r + 1` entries `(r, 0..=r)`.
    Stored,
    /// Each row `r` holds the `r` entries `(r, 0..r)`; the diagonal is implicitly one.
    Unit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LowerTriangular {
    dim: usize,
    diagonal: Diagonal,
}

impl LowerTriangular {
    pub const fn with_diagonal(dim: usize) -> Self {
        Self {
            dim,
            diagonal: Diagonal::Stored,
        }
    }

    pub const fn unit(dim: usize) -> Self {
        Self {
            dim,
            diagonal: Diagonal::Unit,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored entries in the first `rows` rows.
    #[inline]
    pub fn len_upto(&self, rows: usize) -> usize {
        match self.diagonal {
            Diagonal::Stored => rows * (rows + 1) / 2,
            Diagonal::Unit => rows * rows.saturating_sub(1) / 2,
        }
    }

    /// Total number of stored entries.
    pub fn len(&self) -> usize {
        self.len_upto(self.dim)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Positions of the stored entries of `row` in the flat buffer.
    #[inline]
    pub fn row(&self, row: usize) -> Range<usize> {
        debug_assert!(row < self.dim);
        self.len_upto(row)..self.len_upto(row + 1)
    }

    /// Flat position of entry `(row, col)`.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.dim);
        debug_assert!(match self.diagonal {
            Diagonal::Stored => col <= row,
            Diagonal::Unit => col < row,
        });
        self.len_upto(row) + col
    }

    /// Flat position of the diagonal entry of `row`.
    #[inline]
    pub fn diagonal(&self, row: usize) -> usize {
        debug_assert!(self.diagonal == Diagonal::Stored);
        self.index(row, row)
    }
}

/// Row layout of one column of the score matrix:
/// `[probability sum, cholesky scores, mean scores, lower scores, upper scores]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreLayout {
    dim: usize,
    packed: usize,
}

impl ScoreLayout {
    pub const PROBABILITY: usize = 0;

    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            packed: LowerTriangular::with_diagonal(dim).len(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of rows, `dim * (dim + 1) / 2 + 1 + 3 * dim`.
    pub fn rows(&self) -> usize {
        self.packed + 1 + 3 * self.dim
    }

    pub fn chol(&self) -> Range<usize> {
        1..1 + self.packed
    }

    pub fn mean(&self) -> Range<usize> {
        let start = 1 + self.packed;
        start..start + self.dim
    }

    pub fn lower(&self) -> Range<usize> {
        let start = 1 + self.packed + self.dim;
        start..start + self.dim
    }

    pub fn upper(&self) -> Range<usize> {
        let start = 1 + self.packed + 2 * self.dim;
        start..start + self.dim
    }
}
