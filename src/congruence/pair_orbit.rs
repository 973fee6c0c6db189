//! The orbit-of-pairs method for congruences on a concrete semigroup.
//!
//! Starting from the generating pairs, [`PairOrbit`] repeatedly multiplies
//! every known related pair by every generator on the side(s) the congruence
//! kind requires, uniting the components in a union-find structure. When the
//! queue drains, the union-find partition is exactly the restriction of the
//! congruence to the elements that appear in some non-trivial class; all
//! other classes are singletons.
//!
//! The worst-case space is quadratic in the size of the parent semigroup,
//! so this method usually only wins races on congruences with few related
//! pairs.

use std::borrow::Borrow;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::congruence::{CongruenceKind, CongruenceMethod};
use crate::element::Element;
use crate::error::Error;
use crate::froidure_pin::FroidurePin;
use crate::runner::{Runner, StopToken};
use crate::word::{Letter, Relation, Word};

/// Union-find over pair indices, with the smaller index kept as root.
#[derive(Debug, Clone, Default)]
pub(crate) struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    pub(crate) fn add_entry(&mut self) -> u32 {
        let index = self.parent.len() as u32;
        self.parent.push(index);
        index
    }

    pub(crate) fn len(&self) -> usize {
        self.parent.len()
    }

    pub(crate) fn find(&mut self, mut index: u32) -> u32 {
        // Path halving.
        while self.parent[index as usize] != index {
            let grandparent = self.parent[self.parent[index as usize] as usize];
            self.parent[index as usize] = grandparent;
            index = grandparent;
        }
        index
    }

    pub(crate) fn unite(&mut self, i: u32, j: u32) {
        let (ri, rj) = (self.find(i), self.find(j));
        if ri < rj {
            self.parent[rj as usize] = ri;
        } else {
            self.parent[ri as usize] = rj;
        }
    }
}

/// Enumerates a congruence on a fully enumerated parent semigroup by the
/// orbit of its generating pairs.
#[derive(Debug)]
pub struct PairOrbit<E: Element, P: Borrow<FroidurePin<E>> + Send + Sync> {
    kind: CongruenceKind,
    parent: P,
    gens: Vec<E>,
    map: HashMap<E, u32>,
    reverse_map: Vec<E>,
    lookup: UnionFind,
    class_lookup: Vec<u32>,
    next_class: u32,
    found_pairs: HashSet<(u32, u32)>,
    queue: VecDeque<(u32, u32)>,
    nr_nontrivial_classes: u32,
    nr_nontrivial_elms: usize,
    class_of_pos: Option<Vec<u32>>,
    done: bool,
    token: StopToken,
    tmp1: E,
    tmp2: E,
    scratch: E::Scratch,
}

impl<E: Element, P: Borrow<FroidurePin<E>> + Send + Sync> PairOrbit<E, P> {
    /// Creates the orbit for the `kind` congruence on `parent` generated by
    /// the word pairs in `pairs`. The parent must already be fully
    /// enumerated; the token is polled between pair expansions.
    pub fn new(
        kind: CongruenceKind,
        parent: P,
        pairs: &[Relation],
        token: StopToken,
    ) -> Result<Self, Error> {
        if !parent.borrow().is_done() {
            return Err(Error::InvalidOperation(
                "the parent semigroup must be fully enumerated before the pair orbit".into(),
            ));
        }
        let gens: Vec<E> = (0..parent.borrow().nr_gens() as Letter)
            .map(|a| parent.borrow().gen(a).cloned())
            .collect::<Result<_, _>>()?;
        let tmp = gens[0].clone();
        let mut this = Self {
            kind,
            gens,
            tmp1: tmp.clone(),
            tmp2: tmp,
            parent,
            map: HashMap::new(),
            reverse_map: Vec::new(),
            lookup: UnionFind::default(),
            class_lookup: Vec::new(),
            next_class: 0,
            found_pairs: HashSet::new(),
            queue: VecDeque::new(),
            nr_nontrivial_classes: 0,
            nr_nontrivial_elms: 0,
            class_of_pos: None,
            done: false,
            token,
            scratch: E::Scratch::default(),
        };
        for (u, v) in pairs {
            let x = this.parent.borrow().word_to_element(u)?;
            let y = this.parent.borrow().word_to_element(v)?;
            this.add_pair(x, y);
        }
        Ok(this)
    }

    /// The parent semigroup.
    pub fn parent(&self) -> &FroidurePin<E> {
        self.parent.borrow()
    }

    fn add_pair(&mut self, x: E, y: E) {
        if x == y {
            return;
        }
        let i = self.get_index(x);
        let j = self.get_index(y);
        let pair = (i.min(j), i.max(j));
        if self.found_pairs.insert(pair) {
            self.queue.push_back(pair);
            self.lookup.unite(i, j);
        }
    }

    fn get_index(&mut self, x: E) -> u32 {
        if let Some(&index) = self.map.get(&x) {
            return index;
        }
        let index = self.lookup.add_entry();
        self.map.insert(x.clone(), index);
        self.reverse_map.push(x);
        if self.done {
            self.class_lookup.push(self.next_class);
            self.next_class += 1;
        }
        index
    }

    /// Expands pairs until the queue drains, then normalises the classes.
    pub fn enumerate(&mut self) {
        if self.done {
            return;
        }
        while let Some(&(i, j)) = self.queue.front() {
            if self.token.should_stop() {
                return;
            }
            self.queue.pop_front();
            for g in 0..self.gens.len() {
                if matches!(self.kind, CongruenceKind::Left | CongruenceKind::TwoSided) {
                    self.tmp1.product_in_place(
                        &self.gens[g],
                        &self.reverse_map[i as usize],
                        &mut self.scratch,
                    );
                    self.tmp2.product_in_place(
                        &self.gens[g],
                        &self.reverse_map[j as usize],
                        &mut self.scratch,
                    );
                    let (x, y) = (self.tmp1.clone(), self.tmp2.clone());
                    self.add_pair(x, y);
                }
                if matches!(self.kind, CongruenceKind::Right | CongruenceKind::TwoSided) {
                    self.tmp1.product_in_place(
                        &self.reverse_map[i as usize],
                        &self.gens[g],
                        &mut self.scratch,
                    );
                    self.tmp2.product_in_place(
                        &self.reverse_map[j as usize],
                        &self.gens[g],
                        &mut self.scratch,
                    );
                    let (x, y) = (self.tmp1.clone(), self.tmp2.clone());
                    self.add_pair(x, y);
                }
            }
        }

        // Number the classes contiguously: roots appear at their own index
        // first, so a find result above every previous root opens a class.
        if self.lookup.len() > 0 {
            self.class_lookup = Vec::with_capacity(self.lookup.len());
            self.class_lookup.push(0);
            self.next_class = 1;
            let mut max_root = 0;
            for i in 1..self.lookup.len() as u32 {
                let root = self.lookup.find(i);
                if root > max_root {
                    self.class_lookup.push(self.next_class);
                    self.next_class += 1;
                    max_root = root;
                } else {
                    self.class_lookup.push(self.class_lookup[root as usize]);
                }
            }
        }
        self.nr_nontrivial_classes = self.next_class;
        self.nr_nontrivial_elms = self.map.len();
        self.done = true;
        self.found_pairs = HashSet::new();
        self.queue = VecDeque::new();
        log::debug!(
            "pair-orbit: finished with {} elements in {} non-trivial classes",
            self.nr_nontrivial_elms,
            self.nr_nontrivial_classes
        );
    }

    fn require_done(&self) -> Result<(), Error> {
        if self.done {
            return Ok(());
        }
        Err(Error::InvalidOperation(
            "the pair orbit has not been fully enumerated".into(),
        ))
    }

    /// The number of classes: every element of the parent counts one except
    /// those merged into a non-trivial class.
    pub fn nr_classes_done(&self) -> Result<u64, Error> {
        self.require_done()?;
        Ok(self.parent.borrow().current_size() as u64 - self.class_lookup.len() as u64
            + self.next_class as u64)
    }

    fn class_of_element(&mut self, x: E) -> u32 {
        let index = self.get_index(x);
        self.class_lookup[index as usize]
    }

    fn build_class_of_pos(&mut self) -> Result<(), Error> {
        if self.class_of_pos.is_some() {
            return Ok(());
        }
        let size = self.parent.borrow().current_size();
        let mut classes = Vec::with_capacity(size);
        for pos in 0..size as u32 {
            let x = self.parent.borrow().current_at(pos)?.clone();
            classes.push(self.class_of_element(x));
        }
        self.class_of_pos = Some(classes);
        Ok(())
    }

    /// The words of every class with at least two elements.
    pub fn nontrivial_classes(&mut self) -> Result<Vec<Vec<Word>>, Error> {
        self.require_done()?;
        let mut classes: Vec<Vec<Word>> = vec![Vec::new(); self.nr_nontrivial_classes as usize];
        for index in 0..self.nr_nontrivial_elms {
            let pos = self
                .parent
                .borrow()
                .current_position(&self.reverse_map[index])
                .ok_or_else(|| {
                    Error::InvalidOperation("pair-orbit element is not in the parent".into())
                })?;
            let word = self.parent.borrow().current_minimal_factorisation(pos)?;
            classes[self.class_lookup[index] as usize].push(word);
        }
        Ok(classes)
    }
}

impl<E: Element, P: Borrow<FroidurePin<E>> + Send + Sync> Runner for PairOrbit<E, P> {
    fn run(&mut self) {
        self.enumerate();
    }

    fn finished(&self) -> bool {
        self.done
    }

    fn stop_token(&self) -> &StopToken {
        &self.token
    }
}

impl<E: Element, P: Borrow<FroidurePin<E>> + Send + Sync> CongruenceMethod for PairOrbit<E, P> {
    fn nr_classes(&mut self) -> Result<u64, Error> {
        self.nr_classes_done()
    }

    fn word_to_class_index(&mut self, word: &[Letter]) -> Result<u32, Error> {
        self.require_done()?;
        self.build_class_of_pos()?;
        let x = self.parent.borrow().word_to_element(word)?;
        Ok(self.class_of_element(x))
    }

    fn class_index_to_word(&mut self, class: u32) -> Result<Word, Error> {
        self.require_done()?;
        self.build_class_of_pos()?;
        let classes = self.class_of_pos.as_ref().ok_or_else(|| {
            Error::InvalidOperation("class table unavailable".into())
        })?;
        match classes.iter().position(|&c| c == class) {
            Some(pos) => self
                .parent
                .borrow()
                .current_minimal_factorisation(pos as u32),
            None => Err(Error::OutOfRange {
                index: class as usize,
                size: classes.len(),
            }),
        }
    }

    fn nontrivial_classes(&mut self) -> Result<Option<Vec<Vec<Word>>>, Error> {
        Ok(Some(PairOrbit::nontrivial_classes(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Elt, Transformation};

    fn transf(images: &[u32]) -> Elt {
        Transformation::new(images.to_vec()).unwrap().into()
    }

    fn parent() -> FroidurePin<Elt> {
        let mut s =
            FroidurePin::new(vec![transf(&[1, 3, 4, 2, 3]), transf(&[3, 2, 1, 3, 3])]).unwrap();
        s.size().unwrap();
        s
    }

    #[test]
    fn union_find_keeps_smallest_root() {
        let mut uf = UnionFind::default();
        for _ in 0..5 {
            uf.add_entry();
        }
        uf.unite(3, 4);
        uf.unite(1, 3);
        assert_eq!(uf.find(4), 1);
        assert_eq!(uf.find(0), 0);
        assert_eq!(uf.find(2), 2);
    }

    #[test]
    fn two_sided_orbit_matches_the_known_class_count() {
        let mut s = parent();
        // The pair identifies the transformations [3,4,4,4,4] and
        // [3,1,3,3,3], given as words in the generators.
        let w1 = word_of(&mut s, &[3, 4, 4, 4, 4]);
        let w2 = word_of(&mut s, &[3, 1, 3, 3, 3]);
        let mut orbit =
            PairOrbit::new(CongruenceKind::TwoSided, &s, &[(w1, w2)], StopToken::new()).unwrap();
        orbit.enumerate();
        assert_eq!(orbit.nr_classes_done().unwrap(), 21);
        let classes = PairOrbit::nontrivial_classes(&mut orbit).unwrap();
        // Every non-trivial class has at least two members and the total
        // accounts for the difference from the semigroup size.
        let merged: usize = classes.iter().map(|c| c.len()).sum();
        assert!(classes.iter().all(|c| c.len() >= 2));
        assert_eq!(88 - merged + classes.len(), 21);
    }

    #[test]
    fn right_orbit_matches_the_known_class_count() {
        let mut s = parent();
        let w1 = word_of(&mut s, &[3, 4, 4, 4, 4]);
        let w2 = word_of(&mut s, &[3, 1, 3, 3, 3]);
        let mut orbit =
            PairOrbit::new(CongruenceKind::Right, &s, &[(w1, w2)], StopToken::new()).unwrap();
        orbit.enumerate();
        assert_eq!(orbit.nr_classes_done().unwrap(), 72);
    }

    fn word_of(s: &mut FroidurePin<Elt>, images: &[u32]) -> Word {
        let pos = s.position(&transf(images)).unwrap().unwrap();
        s.minimal_factorisation(pos).unwrap()
    }
}
