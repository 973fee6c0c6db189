//! The Froidure–Pin enumeration algorithm.
//!
//! [`FroidurePin`] takes a set of generators satisfying the
//! [`Element`](crate::element::Element) contract and incrementally enumerates
//! every element of the semigroup they generate, assigning each a dense index
//! in insertion order. Along the way it records the right and left Cayley
//! graphs, a shortest-word factorisation of every element, the defining
//! rules of the semigroup, and (on demand) the idempotents and the sorted
//! order of the elements.
//!
//! The enumeration is breadth-first by word length: every known element is
//! multiplied on the right by every generator, and a product that hashes to
//! a known element yields a rule instead of a new element. Products of
//! longer words are deduced from shorter ones through the Cayley graphs
//! whenever possible, so most elements are found without multiplying at all.
//!
//! # Citations
//! - Froidure & Pin, "Algorithms for computing finite semigroups" (1997)
//!
//! # Invariants
//! - Indices are insertion order; the distinct generators occupy the first
//!   indices in input order.
//! - For every non-generator index `k` there are unique `j < k` and letter
//!   `a` with `right[j][a] = k`, witnessing the shortest factorisation.
//! - The enumeration grows monotonically and never shrinks; the Cayley
//!   graphs are total once enumeration has finished.

use std::collections::HashMap;

use crate::element::Element;
use crate::error::Error;
use crate::runner::StopToken;
use crate::table::Table;
use crate::word::{Letter, Word, UNDEFINED};

/// Default number of element insertions per enumeration batch; the stop
/// token is consulted while a batch is being filled.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// A semigroup enumerated from generators by the Froidure–Pin algorithm.
#[derive(Debug)]
pub struct FroidurePin<E: Element> {
    batch_size: usize,
    degree: usize,
    duplicate_gens: Vec<(Letter, Letter)>,
    elements: Vec<E>,
    map: HashMap<E, u32>,
    enumerate_order: Vec<u32>,
    first_letter: Vec<Letter>,
    final_letter: Vec<Letter>,
    found_one: bool,
    pos_one: u32,
    gens: Vec<E>,
    id: E,
    idempotents: Vec<u32>,
    idempotents_found: bool,
    is_idempotent: Vec<bool>,
    left: Table<u32>,
    length: Vec<u32>,
    lenindex: Vec<usize>,
    letter_to_pos: Vec<u32>,
    nr: u32,
    nr_rules: usize,
    pos: usize,
    prefix: Vec<u32>,
    reduced: Table<bool>,
    right: Table<u32>,
    sorted: Vec<u32>,
    sorted_pos: Vec<u32>,
    suffix: Vec<u32>,
    wordlen: usize,
    relation_pos: u32,
    relation_gen: usize,
    tmp_product: E,
    scratch: E::Scratch,
}

impl<E: Element> FroidurePin<E> {
    /// Creates an enumerator over the given generators.
    ///
    /// Returns [`Error::InvalidOperation`] when `gens` is empty and
    /// [`Error::InvalidElement`] when the generators have unequal degrees.
    /// Duplicate generators are kept as letters but stored only once as
    /// elements; each duplicate contributes a length-1 rule.
    pub fn new(gens: Vec<E>) -> Result<Self, Error> {
        if gens.is_empty() {
            return Err(Error::InvalidOperation(
                "at least one generator is required".into(),
            ));
        }
        let degree = gens[0].degree();
        for gen in &gens {
            if gen.degree() != degree {
                return Err(Error::InvalidElement(format!(
                    "generator of degree {} added to a semigroup of degree {}",
                    gen.degree(),
                    degree
                )));
            }
        }
        let nr_gens = gens.len();
        let id = gens[0].identity();
        let mut this = Self {
            batch_size: DEFAULT_BATCH_SIZE,
            degree,
            duplicate_gens: Vec::new(),
            elements: Vec::new(),
            map: HashMap::new(),
            enumerate_order: Vec::new(),
            first_letter: Vec::new(),
            final_letter: Vec::new(),
            found_one: false,
            pos_one: 0,
            tmp_product: id.clone(),
            id,
            idempotents: Vec::new(),
            idempotents_found: false,
            is_idempotent: Vec::new(),
            left: Table::new(nr_gens, 0, UNDEFINED),
            length: Vec::new(),
            lenindex: vec![0],
            letter_to_pos: Vec::new(),
            nr: 0,
            nr_rules: 0,
            pos: 0,
            prefix: Vec::new(),
            reduced: Table::new(nr_gens, 0, false),
            right: Table::new(nr_gens, 0, UNDEFINED),
            sorted: Vec::new(),
            sorted_pos: Vec::new(),
            suffix: Vec::new(),
            wordlen: 0,
            relation_pos: UNDEFINED,
            relation_gen: 0,
            gens,
            scratch: E::Scratch::default(),
        };

        for i in 0..nr_gens {
            if let Some(&pos) = this.map.get(&this.gens[i]) {
                // Duplicate generator: a length-1 rule.
                this.letter_to_pos.push(pos);
                this.nr_rules += 1;
                this.duplicate_gens
                    .push((i as Letter, this.first_letter[pos as usize]));
            } else {
                Self::is_one(
                    &mut this.found_one,
                    &mut this.pos_one,
                    &this.id,
                    &this.gens[i],
                    this.nr,
                );
                this.elements.push(this.gens[i].clone());
                this.first_letter.push(i as Letter);
                this.final_letter.push(i as Letter);
                this.enumerate_order.push(this.nr);
                this.letter_to_pos.push(this.nr);
                this.length.push(1);
                this.map.insert(this.gens[i].clone(), this.nr);
                this.prefix.push(UNDEFINED);
                this.suffix.push(UNDEFINED);
                this.nr += 1;
            }
        }
        this.expand(this.nr as usize);
        this.lenindex.push(this.enumerate_order.len());
        Ok(this)
    }

    #[inline]
    fn is_one(found_one: &mut bool, pos_one: &mut u32, id: &E, x: &E, pos: u32) {
        if !*found_one && x == id {
            *found_one = true;
            *pos_one = pos;
        }
    }

    fn expand(&mut self, nr: usize) {
        self.left.add_rows(nr);
        self.right.add_rows(nr);
        self.reduced.add_rows(nr);
    }

    /// The number of generators, counted with multiplicity.
    pub fn nr_gens(&self) -> usize {
        self.gens.len()
    }

    /// The common degree of the generators.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// The generator with the given letter.
    pub fn gen(&self, letter: Letter) -> Result<&E, Error> {
        self.gens
            .get(letter as usize)
            .ok_or(Error::OutOfRange {
                index: letter as usize,
                size: self.gens.len(),
            })
    }

    /// The position of the generator with the given letter. Distinct letters
    /// may share a position when the input contained duplicate generators.
    pub fn letter_to_pos(&self, letter: Letter) -> Result<u32, Error> {
        self.letter_to_pos
            .get(letter as usize)
            .copied()
            .ok_or(Error::OutOfRange {
                index: letter as usize,
                size: self.letter_to_pos.len(),
            })
    }

    /// Target number of insertions between stop-token polls.
    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size.max(1);
    }

    /// The current batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns `true` if every element has been enumerated.
    pub fn is_done(&self) -> bool {
        self.pos == self.nr as usize
    }

    /// Returns `true` if enumeration has consumed any queue entries yet.
    /// Generators may only be added while this is `false`.
    pub fn started(&self) -> bool {
        self.pos > 0 || self.wordlen > 0
    }

    /// The number of elements found so far, without enumerating further.
    pub fn current_size(&self) -> usize {
        self.nr as usize
    }

    /// The number of rules found so far, without enumerating further.
    pub fn current_nr_rules(&self) -> usize {
        self.nr_rules
    }

    /// The length of the longest word seen so far.
    pub fn current_max_word_length(&self) -> usize {
        match self.enumerate_order.last() {
            Some(&last) => self.length[last as usize] as usize,
            None => 0,
        }
    }

    /// Adds generators before enumeration begins, resetting all derived
    /// state. Returns [`Error::InvalidOperation`] once enumeration has
    /// started and [`Error::InvalidElement`] on a degree mismatch.
    pub fn add_generators(&mut self, more: Vec<E>) -> Result<(), Error> {
        if self.started() {
            return Err(Error::InvalidOperation(
                "generators can only be added before enumeration begins".into(),
            ));
        }
        for gen in &more {
            if gen.degree() != self.degree {
                return Err(Error::InvalidElement(format!(
                    "generator of degree {} added to a semigroup of degree {}",
                    gen.degree(),
                    self.degree
                )));
            }
        }
        let mut all = self.gens.clone();
        all.extend(more);
        let batch_size = self.batch_size;
        *self = Self::new(all)?;
        self.batch_size = batch_size;
        Ok(())
    }

    /// Extends the enumeration until all elements are known or at least
    /// `limit` elements have been found. Idempotent beyond completion, and
    /// resumable after being stopped.
    pub fn enumerate(&mut self, limit: usize) -> Result<(), Error> {
        self.enumerate_until(limit, &StopToken::new())
    }

    /// Runs the enumeration to completion and returns the size.
    pub fn size(&mut self) -> Result<usize, Error> {
        self.enumerate(usize::MAX)?;
        Ok(self.nr as usize)
    }

    /// Like [`FroidurePin::enumerate`], polling `token` as each batch fills;
    /// a stopped enumeration keeps all state and resumes on the next call.
    pub fn enumerate_until(&mut self, limit: usize, token: &StopToken) -> Result<(), Error> {
        if self.pos >= self.nr as usize || limit <= self.nr as usize || token.should_stop() {
            return Ok(());
        }
        let limit = limit.max((self.nr as usize).saturating_add(self.batch_size));
        log::debug!("froidure-pin: enumerating up to {} elements", limit);

        let nr_gens = self.gens.len();

        // Multiply the generators by every generator.
        if self.pos < self.lenindex[1] {
            let nr_shorter = self.nr;
            while self.pos < self.lenindex[1] {
                let i = self.enumerate_order[self.pos] as usize;
                for j in 0..nr_gens {
                    self.tmp_product.product_in_place(
                        &self.elements[i],
                        &self.gens[j],
                        &mut self.scratch,
                    );
                    if let Some(&k) = self.map.get(&self.tmp_product) {
                        self.right.set(i, j, k);
                        self.nr_rules += 1;
                    } else {
                        if self.nr == UNDEFINED {
                            return Err(Error::Overflow("element count"));
                        }
                        Self::is_one(
                            &mut self.found_one,
                            &mut self.pos_one,
                            &self.id,
                            &self.tmp_product,
                            self.nr,
                        );
                        self.elements.push(self.tmp_product.clone());
                        self.first_letter.push(self.first_letter[i]);
                        self.final_letter.push(j as Letter);
                        self.enumerate_order.push(self.nr);
                        self.length.push(2);
                        self.map.insert(self.tmp_product.clone(), self.nr);
                        self.prefix.push(i as u32);
                        self.reduced.set(i, j, true);
                        self.right.set(i, j, self.nr);
                        self.suffix.push(self.letter_to_pos[j]);
                        self.nr += 1;
                    }
                }
                self.pos += 1;
            }
            for i in 0..self.pos {
                let row = self.enumerate_order[i] as usize;
                let b = self.final_letter[row] as usize;
                for j in 0..nr_gens {
                    let val = self.right.get(self.letter_to_pos[j] as usize, b);
                    self.left.set(row, j, val);
                }
            }
            self.wordlen += 1;
            self.expand((self.nr - nr_shorter) as usize);
            self.lenindex.push(self.enumerate_order.len());
        }

        // Multiply the words of length > 1 by every generator.
        let mut stop = self.nr as usize >= limit || token.should_stop();
        while self.pos != self.nr as usize && !stop {
            let nr_shorter = self.nr;
            while self.pos != self.lenindex[self.wordlen + 1] && !stop {
                let i = self.enumerate_order[self.pos] as usize;
                let b = self.first_letter[i];
                let s = self.suffix[i] as usize;
                for j in 0..nr_gens {
                    if !self.reduced.get(s, j) {
                        // The product reduces: read it off the graphs.
                        let r = self.right.get(s, j) as usize;
                        if self.found_one && r as u32 == self.pos_one {
                            self.right.set(i, j, self.letter_to_pos[b as usize]);
                        } else if self.prefix[r] != UNDEFINED {
                            let via = self.left.get(self.prefix[r] as usize, b as usize) as usize;
                            let val = self.right.get(via, self.final_letter[r] as usize);
                            self.right.set(i, j, val);
                        } else {
                            let val = self.right.get(
                                self.letter_to_pos[b as usize] as usize,
                                self.final_letter[r] as usize,
                            );
                            self.right.set(i, j, val);
                        }
                    } else {
                        self.tmp_product.product_in_place(
                            &self.elements[i],
                            &self.gens[j],
                            &mut self.scratch,
                        );
                        if let Some(&k) = self.map.get(&self.tmp_product) {
                            self.right.set(i, j, k);
                            self.nr_rules += 1;
                        } else {
                            if self.nr == UNDEFINED {
                                return Err(Error::Overflow("element count"));
                            }
                            Self::is_one(
                                &mut self.found_one,
                                &mut self.pos_one,
                                &self.id,
                                &self.tmp_product,
                                self.nr,
                            );
                            self.elements.push(self.tmp_product.clone());
                            self.first_letter.push(b);
                            self.final_letter.push(j as Letter);
                            self.length.push(self.wordlen as u32 + 2);
                            self.map.insert(self.tmp_product.clone(), self.nr);
                            self.prefix.push(i as u32);
                            self.reduced.set(i, j, true);
                            self.right.set(i, j, self.nr);
                            self.suffix.push(self.right.get(s, j));
                            self.enumerate_order.push(self.nr);
                            self.nr += 1;
                            stop = self.nr as usize >= limit || token.should_stop();
                        }
                    }
                }
                self.pos += 1;
            }
            self.expand((self.nr - nr_shorter) as usize);

            if self.pos == self.lenindex[self.wordlen + 1] {
                for i in self.lenindex[self.wordlen]..self.pos {
                    let row = self.enumerate_order[i] as usize;
                    let p = self.prefix[row] as usize;
                    let b = self.final_letter[row] as usize;
                    for j in 0..nr_gens {
                        let val = self.right.get(self.left.get(p, j) as usize, b);
                        self.left.set(row, j, val);
                    }
                }
                self.wordlen += 1;
                self.lenindex.push(self.enumerate_order.len());
            }
            log::debug!(
                "froidure-pin: found {} elements, {} rules, max word length {}, {}",
                self.nr,
                self.nr_rules,
                self.current_max_word_length(),
                if self.is_done() { "finished" } else { "so far" }
            );
        }
        Ok(())
    }

    /// The position of `x`, enumerating as needed; `None` if `x` does not
    /// belong to the semigroup.
    pub fn position(&mut self, x: &E) -> Result<Option<u32>, Error> {
        if x.degree() != self.degree {
            return Ok(None);
        }
        loop {
            if let Some(&pos) = self.map.get(x) {
                return Ok(Some(pos));
            }
            if self.is_done() {
                return Ok(None);
            }
            self.enumerate(self.nr as usize + 1)?;
        }
    }

    /// The position of `x` among the elements found so far; no enumeration.
    pub fn current_position(&self, x: &E) -> Option<u32> {
        self.map.get(x).copied()
    }

    /// Returns `true` if `x` is an element of the semigroup.
    pub fn contains(&mut self, x: &E) -> Result<bool, Error> {
        Ok(self.position(x)?.is_some())
    }

    /// The element at the given position, enumerating as needed.
    pub fn at(&mut self, pos: u32) -> Result<&E, Error> {
        self.enumerate(pos as usize + 1)?;
        self.elements
            .get(pos as usize)
            .ok_or(Error::OutOfRange {
                index: pos as usize,
                size: self.nr as usize,
            })
    }

    /// Iterates over the elements found so far in position order.
    pub fn current_elements(&self) -> impl Iterator<Item = &E> {
        self.elements.iter()
    }

    /// The element at `pos` among those found so far; no enumeration.
    pub fn current_at(&self, pos: u32) -> Result<&E, Error> {
        self.elements.get(pos as usize).ok_or(Error::OutOfRange {
            index: pos as usize,
            size: self.nr as usize,
        })
    }

    /// The right Cayley transition: the position of `at(pos) · gens[letter]`.
    /// Before enumeration completes the value may be [`UNDEFINED`].
    pub fn right(&self, pos: u32, letter: Letter) -> Result<u32, Error> {
        self.check_index(pos)?;
        Ok(self.right.get(pos as usize, letter as usize))
    }

    /// The left Cayley transition: the position of `gens[letter] · at(pos)`.
    pub fn left(&self, pos: u32, letter: Letter) -> Result<u32, Error> {
        self.check_index(pos)?;
        Ok(self.left.get(pos as usize, letter as usize))
    }

    fn check_index(&self, pos: u32) -> Result<(), Error> {
        if pos >= self.nr {
            return Err(Error::OutOfRange {
                index: pos as usize,
                size: self.nr as usize,
            });
        }
        Ok(())
    }

    /// The unique shortest-length, lexicographically smallest word equal to
    /// the element at `pos`, enumerating as needed.
    pub fn minimal_factorisation(&mut self, pos: u32) -> Result<Word, Error> {
        if pos as usize >= self.nr as usize && !self.is_done() {
            self.enumerate(pos as usize + 1)?;
        }
        self.current_minimal_factorisation(pos)
    }

    /// As [`FroidurePin::minimal_factorisation`], but never enumerates.
    pub fn current_minimal_factorisation(&self, pos: u32) -> Result<Word, Error> {
        self.check_index(pos)?;
        let mut word = Word::new();
        let mut pos = pos;
        while pos != UNDEFINED {
            word.push(self.first_letter[pos as usize]);
            pos = self.suffix[pos as usize];
        }
        Ok(word)
    }

    /// A word equal to the element at `pos`; for elements enumerated here
    /// this is the minimal factorisation.
    pub fn factorisation(&mut self, pos: u32) -> Result<Word, Error> {
        self.minimal_factorisation(pos)
    }

    /// Evaluates a word to a position. The semigroup is enumerated to
    /// completion first, so that products can be read off the Cayley graphs.
    pub fn word_to_pos(&mut self, word: &[Letter]) -> Result<u32, Error> {
        crate::word::validate_word(word, self.gens.len())?;
        if word.is_empty() {
            return Err(Error::InvalidOperation(
                "cannot evaluate the empty word in a semigroup".into(),
            ));
        }
        self.enumerate(usize::MAX)?;
        let mut out = self.letter_to_pos[word[0] as usize];
        for &letter in &word[1..] {
            out = self.fast_product(out, self.letter_to_pos[letter as usize])?;
        }
        Ok(out)
    }

    /// Evaluates a word to an element, multiplying generators directly when
    /// the enumeration is incomplete.
    pub fn word_to_element(&self, word: &[Letter]) -> Result<E, Error> {
        crate::word::validate_word(word, self.gens.len())?;
        if word.is_empty() {
            return Err(Error::InvalidOperation(
                "cannot evaluate the empty word in a semigroup".into(),
            ));
        }
        if self.is_done() || word.len() == 1 {
            // Every letter is known; follow the right Cayley graph.
            let mut pos = self.letter_to_pos[word[0] as usize];
            for &letter in &word[1..] {
                pos = self.right.get(pos as usize, letter as usize);
            }
            return Ok(self.elements[pos as usize].clone());
        }
        let mut scratch = E::Scratch::default();
        let mut out = self.id.clone();
        out.product_in_place(
            &self.gens[word[0] as usize],
            &self.gens[word[1] as usize],
            &mut scratch,
        );
        let mut tmp = self.id.clone();
        for &letter in &word[2..] {
            std::mem::swap(&mut tmp, &mut out);
            out.product_in_place(&tmp, &self.gens[letter as usize], &mut scratch);
        }
        Ok(out)
    }

    /// The product of the elements at positions `i` and `j`, computed either
    /// by one direct multiplication or by walking the Cayley graphs,
    /// whichever is cheaper for this element type.
    pub fn fast_product(&self, i: u32, j: u32) -> Result<u32, Error> {
        self.check_index(i)?;
        self.check_index(j)?;
        if !self.is_done() {
            return Err(Error::InvalidOperation(
                "fast products require a fully enumerated semigroup".into(),
            ));
        }
        let threshold = self.id.complexity().saturating_mul(2);
        if (self.length[i as usize] as usize) < threshold
            || (self.length[j as usize] as usize) < threshold
        {
            Ok(self.product_by_reduction(i, j))
        } else {
            let mut scratch = E::Scratch::default();
            let mut tmp = self.id.clone();
            tmp.product_in_place(
                &self.elements[i as usize],
                &self.elements[j as usize],
                &mut scratch,
            );
            Ok(self.map[&tmp])
        }
    }

    /// The product of positions `i` and `j` by tracing the shorter
    /// factorisation through the Cayley graphs.
    fn product_by_reduction(&self, mut i: u32, mut j: u32) -> u32 {
        if self.length[i as usize] <= self.length[j as usize] {
            while i != UNDEFINED {
                j = self.left.get(j as usize, self.final_letter[i as usize] as usize);
                i = self.prefix[i as usize];
            }
            j
        } else {
            while j != UNDEFINED {
                i = self.right.get(i as usize, self.first_letter[j as usize] as usize);
                j = self.suffix[j as usize];
            }
            i
        }
    }

    /// The number of distinct defining rules, running to completion.
    pub fn nr_rules(&mut self) -> Result<usize, Error> {
        self.enumerate(usize::MAX)?;
        Ok(self.nr_rules)
    }

    /// All defining rules as pairs of words, running to completion. Each
    /// rule equates a reduced word times a generator with the reduced word
    /// of the product; duplicate generators appear as length-1 rules.
    pub fn rules(&mut self) -> Result<Vec<(Word, Word)>, Error> {
        self.enumerate(usize::MAX)?;
        self.reset_rules();
        let mut out = Vec::with_capacity(self.nr_rules);
        while let Some(rule) = self.next_rule()? {
            out.push(rule);
        }
        Ok(out)
    }

    /// Rewinds the rule cursor used by [`FroidurePin::next_rule`].
    pub fn reset_rules(&mut self) {
        self.relation_pos = UNDEFINED;
        self.relation_gen = 0;
    }

    /// The next defining rule, or `None` when all rules have been yielded.
    pub fn next_rule(&mut self) -> Result<Option<(Word, Word)>, Error> {
        self.enumerate(usize::MAX)?;
        loop {
            if self.relation_pos == UNDEFINED {
                // Duplicate generators come first.
                if self.relation_gen < self.duplicate_gens.len() {
                    let (a, b) = self.duplicate_gens[self.relation_gen];
                    self.relation_gen += 1;
                    return Ok(Some((vec![a], vec![b])));
                }
                self.relation_gen = 0;
                self.relation_pos = 0;
                continue;
            }
            if self.relation_pos as usize == self.nr as usize {
                return Ok(None);
            }
            let mut emitted = None;
            while (self.relation_pos as usize) < self.nr as usize {
                let i = self.enumerate_order[self.relation_pos as usize] as usize;
                while self.relation_gen < self.gens.len() {
                    let j = self.relation_gen;
                    if !self.reduced.get(i, j)
                        && ((self.relation_pos as usize) < self.lenindex[1]
                            || self.reduced.get(self.suffix[i] as usize, j))
                    {
                        emitted = Some((i as u32, j as Letter, self.right.get(i, j)));
                        break;
                    }
                    self.relation_gen += 1;
                }
                if self.relation_gen == self.gens.len() {
                    self.relation_gen = 0;
                    self.relation_pos += 1;
                } else {
                    break;
                }
            }
            self.relation_gen += 1;
            return match emitted {
                None => Ok(None),
                Some((i, a, k)) => {
                    let mut lhs = self.current_minimal_factorisation(i)?;
                    lhs.push(a);
                    let rhs = self.current_minimal_factorisation(k)?;
                    Ok(Some((lhs, rhs)))
                }
            };
        }
    }

    /// The number of idempotents, running to completion.
    pub fn nr_idempotents(&mut self) -> Result<usize, Error> {
        self.init_idempotents()?;
        Ok(self.idempotents.len())
    }

    /// Returns `true` if the element at `pos` is an idempotent.
    pub fn is_idempotent(&mut self, pos: u32) -> Result<bool, Error> {
        self.init_idempotents()?;
        self.check_index(pos)?;
        Ok(self.is_idempotent[pos as usize])
    }

    /// Positions of all idempotents, in enumeration order.
    pub fn idempotents(&mut self) -> Result<&[u32], Error> {
        self.init_idempotents()?;
        Ok(&self.idempotents)
    }

    fn init_idempotents(&mut self) -> Result<(), Error> {
        if self.idempotents_found {
            return Ok(());
        }
        self.enumerate(usize::MAX)?;
        self.idempotents_found = true;
        self.is_idempotent = vec![false; self.nr as usize];

        // Short words are squared by tracing the Cayley graphs; the rest by
        // one direct multiplication. Element types whose products are very
        // expensive (or only defined against generators) trace everything.
        let complexity = self.id.complexity();
        let threshold_length = (self.lenindex.len() - 1).min(complexity.saturating_sub(1));
        let threshold_index = self.lenindex[threshold_length];

        for pos in 0..self.nr as usize {
            let k = self.enumerate_order[pos];
            let square = if pos < threshold_index {
                self.product_by_reduction(k, k)
            } else {
                let mut scratch = E::Scratch::default();
                let mut tmp = self.id.clone();
                tmp.product_in_place(
                    &self.elements[k as usize],
                    &self.elements[k as usize],
                    &mut scratch,
                );
                self.map[&tmp]
            };
            if square == k {
                self.idempotents.push(k);
                self.is_idempotent[k as usize] = true;
            }
        }
        Ok(())
    }

    /// Returns `true` if the semigroup contains the identity of its degree.
    pub fn is_monoid(&mut self) -> Result<bool, Error> {
        self.enumerate(usize::MAX)?;
        Ok(self.found_one)
    }

    fn init_sorted(&mut self) -> Result<(), Error> {
        if self.sorted.len() == self.nr as usize && self.is_done() {
            return Ok(());
        }
        self.enumerate(usize::MAX)?;
        let mut order: Vec<u32> = (0..self.nr).collect();
        let elements = &self.elements;
        order.sort_by(|&a, &b| elements[a as usize].cmp(&elements[b as usize]));
        let mut inverse = vec![0u32; self.nr as usize];
        for (rank, &pos) in order.iter().enumerate() {
            inverse[pos as usize] = rank as u32;
        }
        self.sorted = order;
        self.sorted_pos = inverse;
        Ok(())
    }

    /// The rank of the element at `pos` under the element order.
    pub fn sorted_position(&mut self, pos: u32) -> Result<u32, Error> {
        self.init_sorted()?;
        self.check_index(pos)?;
        Ok(self.sorted_pos[pos as usize])
    }

    /// The element of the given rank under the element order.
    pub fn sorted_at(&mut self, rank: u32) -> Result<&E, Error> {
        self.init_sorted()?;
        self.check_index(rank)?;
        Ok(&self.elements[self.sorted[rank as usize] as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Elt, Transformation};

    fn transf(images: &[u32]) -> Elt {
        Transformation::new(images.to_vec()).unwrap().into()
    }

    fn example_semigroup() -> FroidurePin<Elt> {
        FroidurePin::new(vec![transf(&[1, 3, 4, 2, 3]), transf(&[3, 2, 1, 3, 3])]).unwrap()
    }

    #[test]
    fn size_and_rules() {
        let mut s = example_semigroup();
        assert_eq!(s.size().unwrap(), 88);
        assert_eq!(s.nr_rules().unwrap(), 18);
        assert_eq!(s.rules().unwrap().len(), 18);
    }

    #[test]
    fn elements_are_distinct() {
        let mut s = example_semigroup();
        let n = s.size().unwrap();
        let mut seen = std::collections::HashSet::new();
        for e in s.current_elements() {
            assert!(seen.insert(e.clone()));
        }
        assert_eq!(seen.len(), n);
    }

    #[test]
    fn cayley_graphs_agree_with_products() {
        let mut s = example_semigroup();
        let n = s.size().unwrap() as u32;
        for i in 0..n {
            for a in 0..2 {
                let r = s.right(i, a).unwrap();
                let mut scratch = ();
                let mut prod = s.elements[i as usize].identity();
                prod.product_in_place(
                    &s.elements[i as usize],
                    &s.gens[a as usize],
                    &mut scratch,
                );
                assert_eq!(s.elements[r as usize], prod, "right({}, {})", i, a);

                let l = s.left(i, a).unwrap();
                let mut prod = s.elements[i as usize].identity();
                prod.product_in_place(
                    &s.gens[a as usize],
                    &s.elements[i as usize],
                    &mut scratch,
                );
                assert_eq!(s.elements[l as usize], prod, "left({}, {})", i, a);
            }
        }
    }

    #[test]
    fn factorisations_evaluate_back() {
        let mut s = example_semigroup();
        let n = s.size().unwrap() as u32;
        for i in 0..n {
            let word = s.minimal_factorisation(i).unwrap();
            assert_eq!(s.word_to_element(&word).unwrap(), s.elements[i as usize]);
            assert_eq!(s.length[i as usize] as usize, word.len());
        }
    }

    #[test]
    fn rules_hold_in_the_semigroup() {
        let mut s = example_semigroup();
        for (lhs, rhs) in s.rules().unwrap() {
            assert_eq!(
                s.word_to_element(&lhs).unwrap(),
                s.word_to_element(&rhs).unwrap(),
                "{:?} = {:?}",
                lhs,
                rhs
            );
        }
    }

    #[test]
    fn fast_product_matches_direct_product() {
        let mut s = example_semigroup();
        let n = s.size().unwrap() as u32;
        for i in (0..n).step_by(11) {
            for j in (0..n).step_by(7) {
                let k = s.fast_product(i, j).unwrap();
                let mut prod = s.elements[0].identity();
                prod.product_in_place(&s.elements[i as usize], &s.elements[j as usize], &mut ());
                assert_eq!(s.elements[k as usize], prod);
            }
        }
    }

    #[test]
    fn idempotents_square_to_themselves() {
        let mut s = example_semigroup();
        let n = s.size().unwrap() as u32;
        let mut count = 0;
        for i in 0..n {
            let sq = s.fast_product(i, i).unwrap();
            if sq == i {
                count += 1;
                assert!(s.is_idempotent(i).unwrap());
            } else {
                assert!(!s.is_idempotent(i).unwrap());
            }
        }
        assert_eq!(s.nr_idempotents().unwrap(), count);
    }

    #[test]
    fn enumeration_is_resumable_and_idempotent() {
        let mut s = example_semigroup();
        s.enumerate(10).unwrap();
        let partial = s.current_size();
        assert!(partial >= 10);
        // Asking for fewer elements than are known is a no-op.
        s.enumerate(2).unwrap();
        assert_eq!(s.current_size(), partial);
        assert_eq!(s.size().unwrap(), 88);
        // Enumerating beyond completion is a no-op.
        s.enumerate(1_000_000).unwrap();
        assert_eq!(s.current_size(), 88);
    }

    #[test]
    fn position_and_membership() {
        let mut s = example_semigroup();
        let x = transf(&[1, 3, 4, 2, 3]);
        assert_eq!(s.position(&x).unwrap(), Some(0));
        // An element of the wrong degree is never a member.
        let y: Elt = Transformation::new(vec![0, 1]).unwrap().into();
        assert_eq!(s.position(&y).unwrap(), None);
        // The identity of degree 5 is not in this semigroup.
        let id = x.identity();
        assert_eq!(s.position(&id).unwrap(), None);
        assert!(!s.is_monoid().unwrap());
    }

    #[test]
    fn duplicate_generators_become_rules() {
        let mut s = FroidurePin::new(vec![
            transf(&[1, 3, 4, 2, 3]),
            transf(&[1, 3, 4, 2, 3]),
            transf(&[3, 2, 1, 3, 3]),
        ])
        .unwrap();
        assert_eq!(s.size().unwrap(), 88);
        let rules = s.rules().unwrap();
        assert_eq!(rules[0], (vec![1], vec![0]));
    }

    #[test]
    fn sorted_positions_invert_each_other() {
        let mut s = example_semigroup();
        let n = s.size().unwrap() as u32;
        let mut seen = vec![false; n as usize];
        for i in 0..n {
            let rank = s.sorted_position(i).unwrap();
            assert!(!seen[rank as usize]);
            seen[rank as usize] = true;
            let by_rank = s.sorted_at(rank).unwrap().clone();
            assert_eq!(by_rank, s.elements[i as usize]);
        }
        // Ranks are ordered by the element order.
        for rank in 1..n {
            let prev = s.sorted_at(rank - 1).unwrap().clone();
            let here = s.sorted_at(rank).unwrap().clone();
            assert!(prev < here);
        }
    }

    #[test]
    fn add_generators_resets_before_enumeration() {
        let mut s = FroidurePin::new(vec![transf(&[1, 3, 4, 2, 3])]).unwrap();
        s.add_generators(vec![transf(&[3, 2, 1, 3, 3])]).unwrap();
        assert_eq!(s.size().unwrap(), 88);
        assert!(matches!(
            s.add_generators(vec![transf(&[0, 1, 2, 3, 4])]),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            example_semigroup().add_generators(vec![transf(&[0, 1])]),
            Err(Error::InvalidElement(_))
        ));
    }

    #[test]
    fn monoid_detection() {
        let mut s = FroidurePin::new(vec![transf(&[0, 1, 2]), transf(&[1, 1, 2])]).unwrap();
        assert!(s.is_monoid().unwrap());
    }

    #[test]
    fn stop_token_pauses_enumeration() {
        let mut s = example_semigroup();
        let token = StopToken::new();
        token.request_stop();
        s.enumerate_until(usize::MAX, &token).unwrap();
        assert!(!s.is_done());
        // Resumes cleanly once the token is cleared.
        token.clear();
        s.enumerate_until(usize::MAX, &token).unwrap();
        assert_eq!(s.current_size(), 88);
    }
}
