//! Built-in element algebras.
//!
//! Each algebra is a plain data type with an in-place product and a
//! constructor that validates the defining data. The types here are wrapped
//! by [`Elt`](crate::element::Elt), which adds the cached hash and dispatches
//! the engine-facing operations.
//!
//! Conventions: a transformation or partial permutation of degree `n` maps
//! `{0, …, n-1}` into itself, stored as the vector of images; products act on
//! the right, so `(x · y)(i) = y(x(i))`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::word::UNDEFINED;

/// A total map `{0, …, n-1} → {0, …, n-1}`, stored as its vector of images.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transformation {
    images: Vec<u32>,
}

impl Transformation {
    /// Creates a transformation from its images.
    ///
    /// Returns [`Error::InvalidElement`] if any image is out of bounds.
    pub fn new(images: Vec<u32>) -> Result<Self, Error> {
        let deg = images.len();
        for &val in &images {
            if val as usize >= deg {
                return Err(Error::InvalidElement(format!(
                    "transformation image {} out of bounds, must be less than {}",
                    val, deg
                )));
            }
        }
        Ok(Self { images })
    }

    /// The identity transformation of degree `n`.
    pub fn identity(n: usize) -> Self {
        Self {
            images: (0..n as u32).collect(),
        }
    }

    /// The number of points the transformation acts on.
    #[inline]
    pub fn degree(&self) -> usize {
        self.images.len()
    }

    /// The images, indexed by point.
    #[inline]
    pub fn images(&self) -> &[u32] {
        &self.images
    }

    /// The number of distinct image values.
    pub fn rank(&self) -> usize {
        let mut seen = vec![false; self.images.len()];
        let mut rank = 0;
        for &val in &self.images {
            if !seen[val as usize] {
                seen[val as usize] = true;
                rank += 1;
            }
        }
        rank
    }

    pub(crate) fn product_in_place(&mut self, x: &Self, y: &Self) {
        debug_assert_eq!(x.degree(), y.degree());
        debug_assert_eq!(x.degree(), self.degree());
        for i in 0..self.images.len() {
            self.images[i] = y.images[x.images[i] as usize];
        }
    }
}

impl PartialOrd for Transformation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Transformation {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.images.len(), &self.images).cmp(&(other.images.len(), &other.images))
    }
}

/// An injective partial map `{0, …, n-1} → {0, …, n-1}`.
///
/// Undefined points are stored as [`UNDEFINED`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartialPerm {
    images: Vec<u32>,
}

impl PartialPerm {
    /// Creates a partial permutation from its images, with [`UNDEFINED`]
    /// marking the points where the map is undefined.
    ///
    /// Returns [`Error::InvalidElement`] if any defined image is out of
    /// bounds or occurs more than once.
    pub fn new(images: Vec<u32>) -> Result<Self, Error> {
        let deg = images.len();
        let mut present = vec![false; deg];
        for &val in &images {
            if val != UNDEFINED {
                if val as usize >= deg {
                    return Err(Error::InvalidElement(format!(
                        "partial perm image {} out of bounds, must be less than {}",
                        val, deg
                    )));
                }
                if present[val as usize] {
                    return Err(Error::InvalidElement(format!(
                        "partial perm has duplicate image value {}",
                        val
                    )));
                }
                present[val as usize] = true;
            }
        }
        Ok(Self { images })
    }

    /// Creates the partial permutation of degree `deg` mapping `dom[i]` to
    /// `ran[i]` and undefined elsewhere.
    pub fn from_domain(dom: &[u32], ran: &[u32], deg: usize) -> Result<Self, Error> {
        if dom.len() != ran.len() {
            return Err(Error::InvalidElement(
                "partial perm domain and range size mismatch".into(),
            ));
        }
        if let Some(&max) = dom.iter().max() {
            if max as usize >= deg {
                return Err(Error::InvalidElement(format!(
                    "partial perm domain value {} out of bounds, must be less than {}",
                    max, deg
                )));
            }
        }
        let mut images = vec![UNDEFINED; deg];
        for (&d, &r) in dom.iter().zip(ran) {
            images[d as usize] = r;
        }
        Self::new(images)
    }

    /// The identity partial permutation of degree `n` (defined everywhere).
    pub fn identity(n: usize) -> Self {
        Self {
            images: (0..n as u32).collect(),
        }
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn images(&self) -> &[u32] {
        &self.images
    }

    /// The number of points on which the map is defined. Since a partial
    /// permutation is injective this equals the number of distinct images.
    pub fn rank(&self) -> usize {
        self.images.iter().filter(|&&v| v != UNDEFINED).count()
    }

    pub(crate) fn product_in_place(&mut self, x: &Self, y: &Self) {
        debug_assert_eq!(x.degree(), y.degree());
        debug_assert_eq!(x.degree(), self.degree());
        for i in 0..self.images.len() {
            let im = x.images[i];
            self.images[i] = if im == UNDEFINED {
                UNDEFINED
            } else {
                y.images[im as usize]
            };
        }
    }

    /// Compares two partial permutations in the order used by GAP.
    ///
    /// This is not short-lex on the image lists: degrees are first compared
    /// after stripping trailing undefined points, and an undefined image
    /// compares below every defined one.
    pub fn gap_cmp(&self, other: &Self) -> Ordering {
        let mut deg_this = self.images.len();
        while deg_this > 0 && self.images[deg_this - 1] == UNDEFINED {
            deg_this -= 1;
        }
        let mut deg_that = other.images.len();
        while deg_that >= deg_this && deg_that > 0 && other.images[deg_that - 1] == UNDEFINED {
            deg_that -= 1;
        }
        if deg_this != deg_that {
            return deg_this.cmp(&deg_that);
        }
        for i in 0..deg_this {
            let (a, b) = (self.images[i], other.images[i]);
            if a != b {
                return if a == UNDEFINED {
                    Ordering::Less
                } else if b == UNDEFINED {
                    Ordering::Greater
                } else {
                    a.cmp(&b)
                };
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for PartialPerm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PartialPerm {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.images.len(), &self.images).cmp(&(other.images.len(), &other.images))
    }
}

/// A square matrix over the boolean semiring `({false, true}, ∨, ∧)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BooleanMat {
    dim: usize,
    entries: Vec<bool>,
}

impl BooleanMat {
    /// Creates a boolean matrix from row-major entries of length `n²`.
    pub fn new(entries: Vec<bool>) -> Result<Self, Error> {
        let dim = (entries.len() as f64).sqrt() as usize;
        if dim * dim != entries.len() {
            return Err(Error::InvalidElement(format!(
                "boolean matrix needs a square number of entries, got {}",
                entries.len()
            )));
        }
        Ok(Self { dim, entries })
    }

    /// Creates a boolean matrix from its rows.
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self, Error> {
        let dim = rows.len();
        let mut entries = Vec::with_capacity(dim * dim);
        for row in &rows {
            if row.len() != dim {
                return Err(Error::InvalidElement(format!(
                    "boolean matrix row has length {}, expected {}",
                    row.len(),
                    dim
                )));
            }
            entries.extend_from_slice(row);
        }
        Ok(Self { dim, entries })
    }

    /// The identity matrix of dimension `n`.
    pub fn identity(n: usize) -> Self {
        let mut entries = vec![false; n * n];
        for i in 0..n {
            entries[i * n + i] = true;
        }
        Self { dim: n, entries }
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.dim
    }

    /// The entry in row `i`, column `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> bool {
        self.entries[i * self.dim + j]
    }

    pub(crate) fn product_in_place(&mut self, x: &Self, y: &Self) {
        debug_assert_eq!(x.dim, y.dim);
        debug_assert_eq!(x.dim, self.dim);
        let n = self.dim;
        for i in 0..n {
            for j in 0..n {
                self.entries[i * n + j] = (0..n).any(|k| x.get(i, k) && y.get(k, j));
            }
        }
    }
}

impl PartialOrd for BooleanMat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BooleanMat {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.dim, &self.entries).cmp(&(other.dim, &other.entries))
    }
}

/// A bijection `{0, …, n-1} → {0, …, n-1}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permutation {
    images: Vec<u32>,
}

impl Permutation {
    /// Creates a permutation from its images.
    ///
    /// Returns [`Error::InvalidElement`] unless the images are a bijection.
    pub fn new(images: Vec<u32>) -> Result<Self, Error> {
        let deg = images.len();
        let mut present = vec![false; deg];
        for &val in &images {
            if val as usize >= deg {
                return Err(Error::InvalidElement(format!(
                    "permutation image {} out of bounds, must be less than {}",
                    val, deg
                )));
            }
            if present[val as usize] {
                return Err(Error::InvalidElement(format!(
                    "permutation has duplicate image value {}",
                    val
                )));
            }
            present[val as usize] = true;
        }
        Ok(Self { images })
    }

    /// The identity permutation of degree `n`.
    pub fn identity(n: usize) -> Self {
        Self {
            images: (0..n as u32).collect(),
        }
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn images(&self) -> &[u32] {
        &self.images
    }

    /// The inverse permutation.
    pub fn inverse(&self) -> Self {
        let mut images = vec![0; self.images.len()];
        for (i, &val) in self.images.iter().enumerate() {
            images[val as usize] = i as u32;
        }
        Self { images }
    }

    pub(crate) fn product_in_place(&mut self, x: &Self, y: &Self) {
        debug_assert_eq!(x.degree(), y.degree());
        debug_assert_eq!(x.degree(), self.degree());
        for i in 0..self.images.len() {
            self.images[i] = y.images[x.images[i] as usize];
        }
    }
}

impl PartialOrd for Permutation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Permutation {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.images.len(), &self.images).cmp(&(other.images.len(), &other.images))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transformation_validation() {
        assert!(Transformation::new(vec![0, 2, 1]).is_ok());
        assert!(matches!(
            Transformation::new(vec![0, 3, 1]),
            Err(Error::InvalidElement(_))
        ));
    }

    #[test]
    fn transformation_product_acts_on_the_right() {
        let x = Transformation::new(vec![1, 2, 0]).unwrap();
        let y = Transformation::new(vec![0, 0, 2]).unwrap();
        let mut z = Transformation::identity(3);
        z.product_in_place(&x, &y);
        // (x . y)(i) = y(x(i))
        assert_eq!(z.images(), &[0, 2, 0]);
    }

    #[test]
    fn transformation_rank() {
        assert_eq!(Transformation::new(vec![1, 3, 4, 2, 3]).unwrap().rank(), 4);
        assert_eq!(Transformation::identity(5).rank(), 5);
    }

    #[test]
    fn partial_perm_validation() {
        assert!(PartialPerm::new(vec![1, UNDEFINED, 0]).is_ok());
        // duplicate image
        assert!(PartialPerm::new(vec![1, 1, 0]).is_err());
        // out of bounds
        assert!(PartialPerm::new(vec![5, UNDEFINED, 0]).is_err());
    }

    #[test]
    fn partial_perm_product_propagates_undefined() {
        let x = PartialPerm::new(vec![1, UNDEFINED, 2]).unwrap();
        let y = PartialPerm::new(vec![UNDEFINED, 0, 2]).unwrap();
        let mut z = PartialPerm::identity(3);
        z.product_in_place(&x, &y);
        assert_eq!(z.images(), &[0, UNDEFINED, 2]);
        assert_eq!(z.rank(), 2);
    }

    #[test]
    fn partial_perm_from_domain() {
        let p = PartialPerm::from_domain(&[0, 3], &[2, 1], 5).unwrap();
        assert_eq!(p.images(), &[2, UNDEFINED, UNDEFINED, 1, UNDEFINED]);
    }

    #[test]
    fn gap_cmp_strips_trailing_undefined() {
        let p = PartialPerm::new(vec![1, 0, UNDEFINED, UNDEFINED]).unwrap();
        let q = PartialPerm::new(vec![1, 0, UNDEFINED, 2]).unwrap();
        // p has effective degree 2, q has effective degree 4.
        assert_eq!(p.gap_cmp(&q), Ordering::Less);
        assert_eq!(q.gap_cmp(&p), Ordering::Greater);
        assert_eq!(p.gap_cmp(&p), Ordering::Equal);
    }

    #[test]
    fn gap_cmp_undefined_below_defined() {
        let p = PartialPerm::new(vec![UNDEFINED, 1, 0]).unwrap();
        let q = PartialPerm::new(vec![2, 1, 0]).unwrap();
        assert_eq!(p.gap_cmp(&q), Ordering::Less);
    }

    #[test]
    fn boolean_mat_product() {
        let x = BooleanMat::from_rows(vec![
            vec![true, false],
            vec![false, true],
        ])
        .unwrap();
        let y = BooleanMat::from_rows(vec![
            vec![false, true],
            vec![true, false],
        ])
        .unwrap();
        let mut z = BooleanMat::identity(2);
        z.product_in_place(&x, &y);
        assert_eq!(z, y);
    }

    #[test]
    fn boolean_mat_needs_square_data() {
        assert!(BooleanMat::new(vec![true; 4]).is_ok());
        assert!(BooleanMat::new(vec![true; 5]).is_err());
    }

    #[test]
    fn permutation_inverse() {
        let p = Permutation::new(vec![2, 0, 1]).unwrap();
        let inv = p.inverse();
        let mut z = Permutation::identity(3);
        z.product_in_place(&p, &inv);
        assert_eq!(z, Permutation::identity(3));
    }

    #[test]
    fn permutation_rejects_non_bijection() {
        assert!(Permutation::new(vec![0, 0, 1]).is_err());
    }
}
