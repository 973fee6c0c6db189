//! Rectangular tables of indices.
//!
//! [`Table`] is a row-major two-dimensional vector with a fixed number of
//! columns and a growable number of rows. It backs the right and left Cayley
//! graphs of the enumerator and the coset/preimage tables of the coset
//! enumerator, all of which are indexed by `(row, generator)` pairs.
//!
//! # Determinism
//! Iteration over a row is by column index; rows are appended only, never
//! reordered.

use serde::{Deserialize, Serialize};

/// A row-major rectangular table with a default value for new rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table<T> {
    vec: Vec<T>,
    nr_cols: usize,
    nr_rows: usize,
    default: T,
}

impl<T: Copy> Table<T> {
    /// Creates a table with the given shape, every entry set to `default`.
    pub fn new(nr_cols: usize, nr_rows: usize, default: T) -> Self {
        Self {
            vec: vec![default; nr_cols * nr_rows],
            nr_cols,
            nr_rows,
            default,
        }
    }

    /// Appends `n` rows filled with the default value.
    pub fn add_rows(&mut self, n: usize) {
        self.nr_rows += n;
        self.vec.resize(self.nr_rows * self.nr_cols, self.default);
    }

    /// Returns the entry at `(row, col)`.
    ///
    /// # Panics
    /// Panics if `row` or `col` is out of bounds.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        debug_assert!(col < self.nr_cols);
        self.vec[row * self.nr_cols + col]
    }

    /// Sets the entry at `(row, col)`.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: T) {
        debug_assert!(col < self.nr_cols);
        self.vec[row * self.nr_cols + col] = val;
    }

    /// Number of rows.
    #[inline]
    pub fn nr_rows(&self) -> usize {
        self.nr_rows
    }

    /// Number of columns.
    #[inline]
    pub fn nr_cols(&self) -> usize {
        self.nr_cols
    }

    /// Returns `true` if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.nr_rows == 0
    }

    /// Iterates over one row.
    pub fn row(&self, row: usize) -> impl Iterator<Item = T> + '_ {
        let start = row * self.nr_cols;
        self.vec[start..start + self.nr_cols].iter().copied()
    }

    /// Reserves capacity for at least `nr_rows` rows in total.
    pub fn reserve_rows(&mut self, nr_rows: usize) {
        if nr_rows > self.nr_rows {
            self.vec.reserve((nr_rows - self.nr_rows) * self.nr_cols);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::UNDEFINED;

    #[test]
    fn get_set_roundtrip() {
        let mut t = Table::new(3, 2, UNDEFINED);
        assert_eq!(t.nr_rows(), 2);
        assert_eq!(t.nr_cols(), 3);
        assert_eq!(t.get(1, 2), UNDEFINED);
        t.set(1, 2, 17);
        assert_eq!(t.get(1, 2), 17);
        assert_eq!(t.get(1, 1), UNDEFINED);
    }

    #[test]
    fn add_rows_fills_default() {
        let mut t = Table::new(2, 1, 0u32);
        t.set(0, 0, 5);
        t.add_rows(2);
        assert_eq!(t.nr_rows(), 3);
        assert_eq!(t.get(0, 0), 5);
        assert_eq!(t.get(2, 1), 0);
    }

    #[test]
    fn row_iteration_is_by_column() {
        let mut t = Table::new(3, 1, 0u32);
        t.set(0, 0, 1);
        t.set(0, 1, 2);
        t.set(0, 2, 3);
        assert_eq!(t.row(0).collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
