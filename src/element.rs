//! The element contract and the built-in element algebras.
//!
//! The enumerator is generic over anything implementing [`Element`]: a value
//! with a degree, a cost estimate for one product, an identity of the same
//! degree, and an in-place product. Equality, hashing, and a strict total
//! order come from the usual standard traits; the order is only used for the
//! sorted-positions view of an enumerated semigroup.
//!
//! [`Elt`] bundles the built-in algebras of [`algebra`] into one tagged
//! variant with a lazily cached hash, so that mixed collections of
//! transformations, partial permutations, boolean matrices, and permutations
//! share a single concrete type. User-defined algebras implement [`Element`]
//! directly.

pub mod algebra;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

pub use algebra::{BooleanMat, PartialPerm, Permutation, Transformation};

/// The capability an element type must provide to be enumerated.
///
/// # Laws
/// - The product of two degree-`d` elements has degree `d`, and
///   `identity()` has the same degree as `self`.
/// - `a == b` implies equal hashes, and `Ord` is a strict total order
///   extending `Eq` (used only for the sorted view).
/// - [`Element::product_in_place`] never fails; validating constructed
///   elements is the constructor's job.
pub trait Element: Clone + Eq + Ord + Hash + fmt::Debug + Send + Sync {
    /// Scratch space for one product, owned by the caller and passed in
    /// explicitly. Engines that multiply from several threads keep one
    /// scratch value per thread.
    type Scratch: Default + Send + Sync + fmt::Debug;

    /// The number of points (or dimension) the element acts on.
    fn degree(&self) -> usize;

    /// Approximate cost of one product of two elements of this degree.
    ///
    /// Used to decide between multiplying directly and walking the Cayley
    /// graph; see `FroidurePin::fast_product`.
    fn complexity(&self) -> usize;

    /// The identity of the same degree, so `identity() · x == x` for every
    /// `x` of this degree.
    fn identity(&self) -> Self;

    /// Sets `self := x · y`.
    ///
    /// `self` must be distinct from both `x` and `y`, and all three must
    /// have equal degree.
    fn product_in_place(&mut self, x: &Self, y: &Self, scratch: &mut Self::Scratch);
}

/// The payload of an [`Elt`]: which built-in algebra the element belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EltKind {
    /// A total transformation of `{0, …, n-1}`.
    Transformation(Transformation),
    /// An injective partial map of `{0, …, n-1}`.
    PartialPerm(PartialPerm),
    /// A square matrix over the boolean semiring.
    BooleanMat(BooleanMat),
    /// A bijection of `{0, …, n-1}`.
    Permutation(Permutation),
}

/// An element of one of the built-in algebras, with a lazily cached hash.
///
/// The cache is invalidated whenever the payload is redefined by a product;
/// `0` marks "not yet computed" and computed hashes are nudged off `0`.
#[derive(Debug)]
pub struct Elt {
    kind: EltKind,
    hash: AtomicU64,
}

impl Elt {
    /// Wraps a payload with an empty hash cache.
    pub fn new(kind: EltKind) -> Self {
        Self {
            kind,
            hash: AtomicU64::new(0),
        }
    }

    /// The payload.
    #[inline]
    pub fn kind(&self) -> &EltKind {
        &self.kind
    }

    fn hash64(&self) -> u64 {
        let cached = self.hash.load(AtomicOrdering::Relaxed);
        if cached != 0 {
            return cached;
        }
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.kind.hash(&mut hasher);
        let computed = hasher.finish().max(1);
        self.hash.store(computed, AtomicOrdering::Relaxed);
        computed
    }
}

impl From<Transformation> for Elt {
    fn from(t: Transformation) -> Self {
        Self::new(EltKind::Transformation(t))
    }
}

impl From<PartialPerm> for Elt {
    fn from(p: PartialPerm) -> Self {
        Self::new(EltKind::PartialPerm(p))
    }
}

impl From<BooleanMat> for Elt {
    fn from(m: BooleanMat) -> Self {
        Self::new(EltKind::BooleanMat(m))
    }
}

impl From<Permutation> for Elt {
    fn from(p: Permutation) -> Self {
        Self::new(EltKind::Permutation(p))
    }
}

impl Clone for Elt {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            hash: AtomicU64::new(self.hash.load(AtomicOrdering::Relaxed)),
        }
    }
}

impl PartialEq for Elt {
    fn eq(&self, other: &Self) -> bool {
        // Cached hashes give a cheap negative answer.
        let (h1, h2) = (
            self.hash.load(AtomicOrdering::Relaxed),
            other.hash.load(AtomicOrdering::Relaxed),
        );
        if h1 != 0 && h2 != 0 && h1 != h2 {
            return false;
        }
        self.kind == other.kind
    }
}

impl Eq for Elt {}

impl PartialOrd for Elt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Elt {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind.cmp(&other.kind)
    }
}

impl Hash for Elt {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash64());
    }
}

impl Element for Elt {
    type Scratch = ();

    fn degree(&self) -> usize {
        match &self.kind {
            EltKind::Transformation(t) => t.degree(),
            EltKind::PartialPerm(p) => p.degree(),
            EltKind::BooleanMat(m) => m.degree(),
            EltKind::Permutation(p) => p.degree(),
        }
    }

    fn complexity(&self) -> usize {
        match &self.kind {
            EltKind::Transformation(t) => t.degree(),
            EltKind::PartialPerm(p) => p.degree(),
            EltKind::BooleanMat(m) => m.degree().saturating_pow(3),
            EltKind::Permutation(p) => p.degree(),
        }
    }

    fn identity(&self) -> Self {
        let kind = match &self.kind {
            EltKind::Transformation(t) => EltKind::Transformation(Transformation::identity(t.degree())),
            EltKind::PartialPerm(p) => EltKind::PartialPerm(PartialPerm::identity(p.degree())),
            EltKind::BooleanMat(m) => EltKind::BooleanMat(BooleanMat::identity(m.degree())),
            EltKind::Permutation(p) => EltKind::Permutation(Permutation::identity(p.degree())),
        };
        Self::new(kind)
    }

    fn product_in_place(&mut self, x: &Self, y: &Self, _scratch: &mut ()) {
        match (&mut self.kind, &x.kind, &y.kind) {
            (EltKind::Transformation(t), EltKind::Transformation(a), EltKind::Transformation(b)) => {
                t.product_in_place(a, b)
            }
            (EltKind::PartialPerm(t), EltKind::PartialPerm(a), EltKind::PartialPerm(b)) => {
                t.product_in_place(a, b)
            }
            (EltKind::BooleanMat(t), EltKind::BooleanMat(a), EltKind::BooleanMat(b)) => {
                t.product_in_place(a, b)
            }
            (EltKind::Permutation(t), EltKind::Permutation(a), EltKind::Permutation(b)) => {
                t.product_in_place(a, b)
            }
            _ => panic!("product of elements from different algebras"),
        }
        self.hash.store(0, AtomicOrdering::Relaxed);
    }
}
