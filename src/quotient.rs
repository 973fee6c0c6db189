//! Congruence classes as elements of the quotient semigroup.
//!
//! A [`ClassElt`] is a lightweight pseudo-element: a coset index into the
//! completed, compressed table of a two-sided Todd–Coxeter enumeration.
//! Products are read straight off the shared table, so enumerating the
//! quotient with Froidure–Pin costs no real multiplication at all.
//!
//! A `ClassElt` can only be multiplied on the right by a generator (index
//! `a + 1` for column `a`), which is the only product the enumerator ever
//! forms directly; everything else it deduces through the Cayley graphs,
//! steered by the maximal [`Element::complexity`] reported here.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::element::Element;
use crate::table::Table;

/// One class of a two-sided congruence, as an element of the quotient.
#[derive(Clone)]
pub struct ClassElt {
    table: Arc<Table<u32>>,
    index: u32,
}

impl ClassElt {
    /// Wraps coset `index` of a completed coset table. Index 0 is the
    /// empty-word coset, and index `a + 1` the class of generator `a`.
    pub fn new(table: Arc<Table<u32>>, index: u32) -> Self {
        Self { table, index }
    }

    /// The coset index in the underlying table.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Debug for ClassElt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassElt({})", self.index)
    }
}

impl PartialEq for ClassElt {
    fn eq(&self, other: &Self) -> bool {
        debug_assert!(Arc::ptr_eq(&self.table, &other.table));
        self.index == other.index
    }
}

impl Eq for ClassElt {}

impl PartialOrd for ClassElt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassElt {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

impl Hash for ClassElt {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl Element for ClassElt {
    type Scratch = ();

    fn degree(&self) -> usize {
        0
    }

    /// Effectively infinite, so products are always deduced by walking the
    /// Cayley graphs rather than multiplied directly.
    fn complexity(&self) -> usize {
        usize::MAX
    }

    fn identity(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            index: 0,
        }
    }

    fn product_in_place(&mut self, x: &Self, y: &Self, _scratch: &mut ()) {
        // y must be a generator class.
        debug_assert!(y.index >= 1 && (y.index as usize - 1) < x.table.nr_cols());
        debug_assert!(Arc::ptr_eq(&x.table, &y.table));
        self.index = x.table.get(x.index as usize, y.index as usize - 1);
    }
}
