//! The Todd–Coxeter coset enumeration algorithm.
//!
//! [`ToddCoxeter`] enumerates the classes of a one- or two-sided congruence
//! on a finitely presented semigroup, or on a concrete semigroup via a
//! prefilled Cayley table. Classes are represented by *cosets*: rows of a
//! table mapping each coset and generator to an image coset. Tracing the
//! defining relations over every coset either fills in undefined images or
//! discovers that two cosets coincide, in which case the higher is merged
//! into the lower and leaves a forwarding address behind.
//!
//! When the number of active cosets outgrows the packing threshold, a
//! *lookahead* phase applies every relation without creating new cosets to
//! force coincidences and reduce memory pressure; the threshold then grows
//! by 10%.
//!
//! # Citations
//! - Todd & Coxeter, "A practical method for enumerating cosets of a finite
//!   abstract group" (1936)
//! - The coset table organisation follows the GAP implementation by Goetz
//!   Pfeiffer.
//!
//! # Invariants
//! - Active cosets form a doubly-linked list through `forwd`/`bckwd`; dead
//!   cosets form a free list through `forwd` and carry a forwarding address.
//! - Coset 0 represents the empty word, never dies, and is not itself a
//!   class of the semigroup: `nr_classes` is the active count minus one.
//! - For every defined `table[c][a] = d`, `c` occurs exactly once in the
//!   preimage list of `d` under `a`.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::congruence::{CongruenceKind, CongruenceMethod};
use crate::error::Error;
use crate::froidure_pin::FroidurePin;
use crate::quotient::ClassElt;
use crate::runner::{Runner, StopToken};
use crate::table::Table;
use crate::word::{validate_relation, validate_word, Letter, Relation, Word, UNDEFINED};

/// Number of active cosets at which the first lookahead phase starts.
pub const DEFAULT_PACK_THRESHOLD: usize = 120_000;

const DEFAULT_REPORT_INTERVAL: usize = 2_000_000;

/// A Todd–Coxeter coset enumeration.
#[derive(Debug)]
pub struct ToddCoxeter {
    kind: CongruenceKind,
    nr_gens: usize,
    relations: Vec<Relation>,
    extra: Vec<Relation>,

    // Relations as actually traced: reversed for left congruences, with the
    // generating pairs merged in for two-sided ones.
    tc_relations: Vec<Relation>,
    tc_extra: Vec<Relation>,

    table: Table<u32>,
    preim_init: Table<u32>,
    preim_next: Table<u32>,
    forwd: Vec<u32>,
    bckwd: Vec<u32>,
    forwarding: Vec<Option<u32>>,

    active: usize,
    defined: usize,
    cosets_killed: usize,
    current: u32,
    current_no_add: u32,
    last: u32,
    next: u32,

    pack: usize,
    stop_packing: bool,
    lhs_stack: Vec<u32>,
    rhs_stack: Vec<u32>,

    init_done: bool,
    prefilled: bool,
    done: bool,
    error: Option<Error>,
    token: StopToken,

    report_interval: usize,
    report_next: usize,

    // Built on completion.
    gen_lookup: Vec<Letter>,
    paths: Option<(Vec<u32>, Vec<u32>)>,
}

impl ToddCoxeter {
    /// Creates an enumeration of the `kind` congruence on the semigroup
    /// presented by `relations` over `nr_gens` generators, generated by the
    /// pairs in `extra`.
    pub fn new(
        kind: CongruenceKind,
        nr_gens: usize,
        relations: Vec<Relation>,
        extra: Vec<Relation>,
    ) -> Result<Self, Error> {
        for rel in relations.iter().chain(&extra) {
            validate_relation(rel, nr_gens)?;
        }
        Ok(Self {
            kind,
            nr_gens,
            relations,
            extra,
            tc_relations: Vec::new(),
            tc_extra: Vec::new(),
            table: Table::new(nr_gens, 1, UNDEFINED),
            preim_init: Table::new(nr_gens, 1, UNDEFINED),
            preim_next: Table::new(nr_gens, 1, UNDEFINED),
            forwd: vec![UNDEFINED],
            bckwd: vec![0],
            forwarding: vec![None],
            active: 1,
            defined: 1,
            cosets_killed: 0,
            current: 0,
            current_no_add: UNDEFINED,
            last: 0,
            next: UNDEFINED,
            pack: DEFAULT_PACK_THRESHOLD,
            stop_packing: false,
            lhs_stack: Vec::new(),
            rhs_stack: Vec::new(),
            init_done: false,
            prefilled: false,
            done: false,
            error: None,
            token: StopToken::new(),
            report_interval: DEFAULT_REPORT_INTERVAL,
            report_next: 0,
            gen_lookup: Vec::new(),
            paths: None,
        })
    }

    /// The kind of congruence being enumerated.
    pub fn kind(&self) -> CongruenceKind {
        self.kind
    }

    /// The alphabet size.
    pub fn nr_gens(&self) -> usize {
        self.nr_gens
    }

    /// Adds a generating pair of the congruence. Pairs can only be added
    /// before the enumeration starts.
    pub fn add_pair(&mut self, u: Word, v: Word) -> Result<(), Error> {
        if self.init_done {
            return Err(Error::InvalidOperation(
                "generating pairs must be added before the enumeration starts".into(),
            ));
        }
        validate_relation(&(u.clone(), v.clone()), self.nr_gens)?;
        self.extra.push((u, v));
        Ok(())
    }

    /// Sets the active-coset count that triggers a lookahead phase.
    pub fn set_pack(&mut self, pack: usize) {
        self.pack = pack.max(1);
    }

    /// Sets how many trace steps pass between progress reports; the packing
    /// kill-rate signal is sampled at the same interval.
    pub fn set_report_interval(&mut self, interval: usize) {
        self.report_interval = interval.max(1);
    }

    /// Seeds the coset table with a complete table, typically the right (or
    /// left) Cayley graph of a parent semigroup with a leading row for the
    /// empty-word coset.
    ///
    /// Row `r + 1` must describe element `r` of the parent, and row 0 must
    /// send each generator to its position plus one.
    pub fn prefill(&mut self, table: Table<u32>) -> Result<(), Error> {
        if self.init_done || self.prefilled {
            return Err(Error::InvalidOperation(
                "the coset table can only be prefilled before the enumeration starts".into(),
            ));
        }
        if table.nr_cols() != self.nr_gens {
            return Err(Error::IncompatibleTypes(format!(
                "prefill table has {} columns, expected {}",
                table.nr_cols(),
                self.nr_gens
            )));
        }
        if table.nr_rows() == 0 {
            return Err(Error::InvalidOperation("prefill table has no rows".into()));
        }
        for row in 0..table.nr_rows() {
            for val in table.row(row) {
                if val == 0 || val as usize >= table.nr_rows() {
                    return Err(Error::InvalidOperation(format!(
                        "prefill table entry {} out of bounds in row {}",
                        val, row
                    )));
                }
            }
        }
        self.table = table;
        self.init_after_prefill();
        Ok(())
    }

    /// Prefills from a fully enumerated parent semigroup: the right Cayley
    /// graph for right and two-sided congruences, the left one for left
    /// congruences.
    pub fn prefill_from<E: crate::element::Element>(
        &mut self,
        parent: &FroidurePin<E>,
    ) -> Result<(), Error> {
        if parent.nr_gens() != self.nr_gens {
            return Err(Error::IncompatibleTypes(format!(
                "parent semigroup has {} generators, congruence has {}",
                parent.nr_gens(),
                self.nr_gens
            )));
        }
        if !parent.is_done() {
            return Err(Error::InvalidOperation(
                "the parent semigroup must be fully enumerated before prefilling".into(),
            ));
        }
        let size = parent.current_size();
        let mut table = Table::new(self.nr_gens, size + 1, UNDEFINED);
        for a in 0..self.nr_gens {
            table.set(0, a, parent.letter_to_pos(a as Letter)? + 1);
        }
        for row in 0..size {
            for a in 0..self.nr_gens {
                let image = match self.kind {
                    CongruenceKind::Left => parent.left(row as u32, a as Letter)?,
                    _ => parent.right(row as u32, a as Letter)?,
                };
                table.set(row + 1, a, image + 1);
            }
        }
        self.table = table;
        self.init_after_prefill();
        Ok(())
    }

    fn init_after_prefill(&mut self) {
        self.prefilled = true;
        self.active = self.table.nr_rows();
        self.defined = self.active;

        self.forwd = (1..=self.active as u32).collect();
        self.forwd[self.active - 1] = UNDEFINED;
        self.bckwd = (0..self.active as u32).map(|i| i.saturating_sub(1)).collect();
        self.forwarding = vec![None; self.active];
        self.last = self.active as u32 - 1;
        self.next = UNDEFINED;

        self.preim_init = Table::new(self.nr_gens, self.active, UNDEFINED);
        self.preim_next = Table::new(self.nr_gens, self.active, UNDEFINED);
        for c in 0..self.active {
            for i in 0..self.nr_gens {
                let b = self.table.get(c, i) as usize;
                let head = self.preim_init.get(b, i);
                self.preim_next.set(c, i, head);
                self.preim_init.set(b, i, c as u32);
            }
        }
    }

    /// Returns `true` once every relation holds at every active coset.
    pub fn finished(&self) -> bool {
        self.done
    }

    /// The error that killed the enumeration, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Quick sufficient conditions for the congruence to have infinitely
    /// many classes: nothing prefilled and either more generators than
    /// relations and pairs together, or a generator that occurs in no
    /// relation or pair.
    pub fn is_obviously_infinite(&self) -> bool {
        if self.prefilled {
            return false;
        }
        if self.nr_gens > self.relations.len() + self.extra.len() {
            return true;
        }
        'gens: for gen in 0..self.nr_gens as Letter {
            for (lhs, rhs) in self.relations.iter().chain(&self.extra) {
                if lhs.contains(&gen) || rhs.contains(&gen) {
                    continue 'gens;
                }
            }
            return true;
        }
        false
    }

    /// Returns `true` if the class count is known to be finite without
    /// further work.
    pub fn is_obviously_finite(&self) -> bool {
        self.prefilled || self.done
    }

    fn init(&mut self) -> Result<(), Error> {
        if self.init_done {
            return Ok(());
        }
        self.init_tc_relations();
        let extras = self.tc_extra.clone();
        for rel in &extras {
            self.trace(0, rel, true)?;
        }
        self.init_done = true;
        Ok(())
    }

    fn init_tc_relations(&mut self) {
        match self.kind {
            CongruenceKind::TwoSided => {
                // Generating pairs become ordinary relations.
                self.tc_relations.extend(self.extra.iter().cloned());
            }
            CongruenceKind::Right => {
                self.tc_extra.extend(self.extra.iter().cloned());
            }
            CongruenceKind::Left => {
                self.tc_extra.extend(self.extra.iter().map(reversed));
            }
        }
        if self.prefilled {
            // The defining relations are already encoded in the table.
            return;
        }
        match self.kind {
            CongruenceKind::Left => {
                let rels: Vec<Relation> = self.relations.iter().map(reversed).collect();
                self.tc_relations.extend(rels);
            }
            _ => self.tc_relations.extend(self.relations.iter().cloned()),
        }
    }

    /// Runs the enumeration until it completes or the stop token fires.
    /// A stopped enumeration keeps all state, including pending
    /// coincidences, and resumes on the next call.
    pub fn run(&mut self) {
        if self.done || self.error.is_some() {
            return;
        }
        if let Err(err) = self.run_inner() {
            log::debug!("todd-coxeter: dead: {}", err);
            self.error = Some(err);
        }
    }

    fn run_inner(&mut self) -> Result<(), Error> {
        self.init()?;
        // Drain coincidences left over from an interrupted run.
        self.process_coincidences();
        if self.done || self.token.should_stop() {
            return Ok(());
        }

        let relations = self.tc_relations.clone();
        loop {
            if self.token.should_stop() {
                return Ok(());
            }
            for rel in &relations {
                self.trace(self.current, rel, true)?;
            }

            if self.active > self.pack {
                log::debug!(
                    "todd-coxeter: {} defined, {} max, {} active, entering lookahead",
                    self.defined,
                    self.forwd.len(),
                    self.active
                );
                self.cosets_killed = self.defined - self.active;
                let old_active = self.active;
                self.current_no_add = self.current + 1;

                let mut interrupted = false;
                while (self.current_no_add as usize) < self.forwd.len()
                    && self.current_no_add != self.next
                    && !self.stop_packing
                {
                    for rel in &relations {
                        self.trace(self.current_no_add, rel, false)?;
                    }
                    self.current_no_add = self.forwd[self.current_no_add as usize];
                    if self.current_no_add == UNDEFINED {
                        break;
                    }
                    if self.token.should_stop() {
                        interrupted = true;
                        break;
                    }
                }
                log::debug!(
                    "todd-coxeter: lookahead complete, {} killed",
                    old_active - self.active
                );
                self.pack += self.pack / 10;
                self.stop_packing = false;
                self.current_no_add = UNDEFINED;
                if interrupted {
                    return Ok(());
                }
            }

            self.current = self.forwd[self.current as usize];
            if self.current == self.next {
                break;
            }
        }

        self.done = true;
        self.compress();
        log::debug!(
            "todd-coxeter: finished with {} cosets defined, {} active",
            self.defined,
            self.active
        );
        Ok(())
    }

    /// The number of congruence classes. Runs to completion, so this may
    /// never return for a congruence with infinitely many classes; the
    /// obviously infinite ones are rejected up front.
    pub fn nr_classes(&mut self) -> Result<u64, Error> {
        if !self.done {
            if self.is_obviously_infinite() {
                return Err(Error::Infinite);
            }
            self.run();
            self.completion_status()?;
        }
        Ok(self.active as u64 - 1)
    }

    fn completion_status(&self) -> Result<(), Error> {
        if self.done {
            return Ok(());
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Err(if self.token.timed_out() {
            Error::TimedOut
        } else {
            Error::Cancelled
        })
    }

    /// The class of the word, by walking the completed coset table (in
    /// reverse for a left congruence).
    pub fn word_to_class_index(&self, word: &[Letter]) -> Result<u32, Error> {
        if !self.done {
            return Err(Error::InvalidOperation(
                "class indices are only defined once the enumeration finishes".into(),
            ));
        }
        validate_word(word, self.nr_gens)?;
        if word.is_empty() {
            return Err(Error::InvalidOperation(
                "cannot evaluate the empty word in a semigroup".into(),
            ));
        }
        let mut coset = 0u32;
        match self.kind {
            CongruenceKind::Left => {
                for &letter in word.iter().rev() {
                    coset = self.table.get(coset as usize, letter as usize);
                }
            }
            _ => {
                for &letter in word {
                    coset = self.table.get(coset as usize, letter as usize);
                }
            }
        }
        debug_assert!(coset >= 1 && (coset as usize) < self.active);
        Ok(coset - 1)
    }

    /// A shortest word in the given class, found by breadth-first search
    /// over the completed table.
    pub fn class_index_to_word(&mut self, class: u32) -> Result<Word, Error> {
        if !self.done {
            return Err(Error::InvalidOperation(
                "class words are only defined once the enumeration finishes".into(),
            ));
        }
        if class as usize >= self.active - 1 {
            return Err(Error::OutOfRange {
                index: class as usize,
                size: self.active - 1,
            });
        }
        let table = &self.table;
        let nr_gens = self.nr_gens;
        let (parent, letter) = self
            .paths
            .get_or_insert_with(|| shortest_paths(table, nr_gens));
        let mut word = Word::new();
        let mut coset = class + 1;
        while coset != 0 {
            word.push(letter[coset as usize]);
            coset = parent[coset as usize];
        }
        // The letters were collected from the class back to the empty-word
        // coset; a left congruence applies words in reverse, so they are
        // already in the right order there.
        if self.kind != CongruenceKind::Left {
            word.reverse();
        }
        Ok(word)
    }

    /// A generator whose class is `class`, from row 0 of the completed
    /// table; [`Error::OutOfRange`] when no generator lies in the class.
    pub fn class_index_to_letter(&self, class: u32) -> Result<Letter, Error> {
        if !self.done {
            return Err(Error::InvalidOperation(
                "class letters are only defined once the enumeration finishes".into(),
            ));
        }
        match self.gen_lookup.get(class as usize) {
            Some(&letter) if letter != UNDEFINED => Ok(letter),
            _ => Err(Error::OutOfRange {
                index: class as usize,
                size: self.gen_lookup.len(),
            }),
        }
    }

    /// Returns `true` if the two words lie in the same class, running to
    /// completion first.
    pub fn contains(&mut self, u: &[Letter], v: &[Letter]) -> Result<bool, Error> {
        if u == v {
            validate_word(u, self.nr_gens)?;
            return Ok(true);
        }
        if !self.done {
            if self.is_obviously_infinite() {
                return Err(Error::Infinite);
            }
            self.run();
            self.completion_status()?;
        }
        Ok(self.word_to_class_index(u)? == self.word_to_class_index(v)?)
    }

    /// The completed coset table restricted to one column per distinct
    /// generator, as used by the quotient semigroup. Two-sided only.
    pub fn quotient_table(&mut self) -> Result<Table<u32>, Error> {
        if self.kind != CongruenceKind::TwoSided {
            return Err(Error::InvalidOperation(
                "only two-sided congruences have quotient semigroups".into(),
            ));
        }
        if !self.done {
            if self.is_obviously_infinite() {
                return Err(Error::Infinite);
            }
            self.run();
            self.completion_status()?;
        }
        // Compression numbered cosets in first-seen scan order, so the coset
        // of the a-th distinct generator is a + 1; other columns repeat an
        // earlier generator and are dropped.
        let mut keep = Vec::with_capacity(self.nr_gens);
        let mut expected = 1u32;
        for a in 0..self.nr_gens {
            if self.table.get(0, a) == expected {
                keep.push(a);
                expected += 1;
            }
        }
        let mut out = Table::new(keep.len(), self.table.nr_rows(), UNDEFINED);
        for row in 0..self.table.nr_rows() {
            for (col, &a) in keep.iter().enumerate() {
                out.set(row, col, self.table.get(row, a));
            }
        }
        Ok(out)
    }

    /// The quotient of the semigroup by this two-sided congruence, as a
    /// semigroup of congruence classes enumerated by Froidure–Pin.
    pub fn quotient_semigroup(&mut self) -> Result<FroidurePin<ClassElt>, Error> {
        let table = Arc::new(self.quotient_table()?);
        let gens = (0..table.nr_cols())
            .map(|a| ClassElt::new(Arc::clone(&table), a as u32 + 1))
            .collect();
        FroidurePin::new(gens)
    }

    fn new_coset(&mut self, c: u32, a: Letter) -> Result<(), Error> {
        self.active += 1;
        self.defined += 1;
        self.report_next += 1;

        if self.next == UNDEFINED {
            // No dead coset to recycle: append a fresh one.
            if self.forwd.len() >= UNDEFINED as usize {
                return Err(Error::Overflow("coset count"));
            }
            self.next = self.active as u32 - 1;
            self.forwd[self.last as usize] = self.next;
            self.forwd.push(UNDEFINED);
            self.bckwd.push(self.last);
            self.forwarding.push(None);
            self.table.add_rows(1);
            self.preim_init.add_rows(1);
            self.preim_next.add_rows(1);
        } else {
            self.bckwd[self.next as usize] = self.last;
            self.forwarding[self.next as usize] = None;
        }

        self.last = self.next;
        self.next = self.forwd[self.last as usize];

        for i in 0..self.nr_gens {
            self.table.set(self.last as usize, i, UNDEFINED);
            self.preim_init.set(self.last as usize, i, UNDEFINED);
        }
        self.table.set(c as usize, a as usize, self.last);
        self.preim_init.set(self.last as usize, a as usize, c);
        self.preim_next.set(c as usize, a as usize, UNDEFINED);
        Ok(())
    }

    /// Records that two cosets represent the same class and merges until no
    /// pending coincidence remains.
    fn identify_cosets(&mut self, lhs: u32, rhs: u32) {
        self.lhs_stack.push(lhs.min(rhs));
        self.rhs_stack.push(lhs.max(rhs));
        self.process_coincidences();
    }

    fn process_coincidences(&mut self) {
        loop {
            if self.token.should_stop() {
                // The remaining pairs stay on the stacks and are drained
                // when the enumeration resumes.
                return;
            }
            let (mut lhs, mut rhs) = match (self.lhs_stack.pop(), self.rhs_stack.pop()) {
                (Some(l), Some(r)) => (l, r),
                _ => return,
            };
            while let Some(f) = self.forwarding[lhs as usize] {
                lhs = f;
            }
            while let Some(f) = self.forwarding[rhs as usize] {
                rhs = f;
            }
            if lhs == rhs {
                continue;
            }
            let (lo, hi) = (lhs.min(rhs), lhs.max(rhs));
            self.merge(lo, hi);
        }
    }

    /// Kills `hi`, forwarding it to `lo`, rewiring every preimage of `hi`
    /// and pushing any images that now disagree.
    fn merge(&mut self, lo: u32, hi: u32) {
        self.active -= 1;
        if hi == self.current {
            self.current = self.bckwd[self.current as usize];
        }
        if hi == self.current_no_add {
            self.current_no_add = self.bckwd[self.current_no_add as usize];
        }
        debug_assert!(hi != self.next);
        if hi == self.last {
            self.last = self.bckwd[self.last as usize];
        } else {
            // Splice hi out of the active list and onto the free list.
            self.bckwd[self.forwd[hi as usize] as usize] = self.bckwd[hi as usize];
            self.forwd[self.bckwd[hi as usize] as usize] = self.forwd[hi as usize];
            self.forwd[hi as usize] = self.next;
            self.forwd[self.last as usize] = hi;
        }
        self.next = hi;
        self.forwarding[hi as usize] = Some(lo);

        for i in 0..self.nr_gens {
            // Every preimage of hi becomes a preimage of lo.
            let mut v = self.preim_init.get(hi as usize, i);
            while v != UNDEFINED {
                self.table.set(v as usize, i, lo);
                let u = self.preim_next.get(v as usize, i);
                let head = self.preim_init.get(lo as usize, i);
                self.preim_next.set(v as usize, i, head);
                self.preim_init.set(lo as usize, i, v);
                v = u;
            }

            // If hi has an image, detach hi from its preimage list and make
            // sure lo agrees with it.
            let v = self.table.get(hi as usize, i);
            if v != UNDEFINED {
                let mut u = self.preim_init.get(v as usize, i);
                debug_assert!(u != UNDEFINED);
                if u == hi {
                    let tail = self.preim_next.get(hi as usize, i);
                    self.preim_init.set(v as usize, i, tail);
                } else {
                    while self.preim_next.get(u as usize, i) != hi {
                        u = self.preim_next.get(u as usize, i);
                    }
                    let tail = self.preim_next.get(hi as usize, i);
                    self.preim_next.set(u as usize, i, tail);
                }

                let u = self.table.get(lo as usize, i);
                if u == UNDEFINED {
                    self.table.set(lo as usize, i, v);
                    let head = self.preim_init.get(v as usize, i);
                    self.preim_next.set(lo as usize, i, head);
                    self.preim_init.set(v as usize, i, lo);
                } else {
                    self.lhs_stack.push(u.min(v));
                    self.rhs_stack.push(u.max(v));
                }
            }
        }
    }

    /// Walks one relation from coset `c`, creating cosets on undefined
    /// transitions when `add` is set, and reconciling the two endpoint
    /// images.
    fn trace(&mut self, c: u32, rel: &Relation, add: bool) -> Result<(), Error> {
        let mut lhs = c;
        for &letter in &rel.0[..rel.0.len() - 1] {
            let image = self.table.get(lhs as usize, letter as usize);
            if image != UNDEFINED {
                lhs = image;
            } else if add {
                self.new_coset(lhs, letter)?;
                lhs = self.last;
            } else {
                return Ok(());
            }
        }
        let mut rhs = c;
        for &letter in &rel.1[..rel.1.len() - 1] {
            let image = self.table.get(rhs as usize, letter as usize);
            if image != UNDEFINED {
                rhs = image;
            } else if add {
                self.new_coset(rhs, letter)?;
                rhs = self.last;
            } else {
                return Ok(());
            }
        }

        self.report_next += 1;
        if self.report_next > self.report_interval {
            log::trace!(
                "todd-coxeter: {} defined, {} max, {} active, {} killed since last report",
                self.defined,
                self.forwd.len(),
                self.active,
                (self.defined - self.active) - self.cosets_killed
            );
            // Lookahead that kills too slowly is not worth continuing.
            if (self.defined - self.active) - self.cosets_killed < 100 {
                self.stop_packing = true;
            }
            self.report_next = 0;
            self.cosets_killed = self.defined - self.active;
        }

        let a = rel.0[rel.0.len() - 1];
        let b = rel.1[rel.1.len() - 1];
        let u = self.table.get(lhs as usize, a as usize);
        let v = self.table.get(rhs as usize, b as usize);

        if u == UNDEFINED && v == UNDEFINED {
            if add {
                // One new coset is the image of both endpoints.
                self.new_coset(lhs, a)?;
                self.table.set(rhs as usize, b as usize, self.last);
                if a == b {
                    self.preim_next.set(lhs as usize, a as usize, rhs);
                    self.preim_next.set(rhs as usize, a as usize, UNDEFINED);
                } else {
                    self.preim_init.set(self.last as usize, b as usize, rhs);
                    self.preim_next.set(rhs as usize, b as usize, UNDEFINED);
                }
            }
        } else if u == UNDEFINED {
            self.table.set(lhs as usize, a as usize, v);
            let head = self.preim_init.get(v as usize, a as usize);
            self.preim_next.set(lhs as usize, a as usize, head);
            self.preim_init.set(v as usize, a as usize, lhs);
        } else if v == UNDEFINED {
            self.table.set(rhs as usize, b as usize, u);
            let head = self.preim_init.get(u as usize, b as usize);
            self.preim_next.set(rhs as usize, b as usize, head);
            self.preim_init.set(u as usize, b as usize, rhs);
        } else {
            self.identify_cosets(u, v);
        }
        Ok(())
    }

    /// Renumbers the active cosets densely in first-seen scan order and
    /// shrinks the table to them; also records which generator first lands
    /// in each class.
    fn compress(&mut self) {
        debug_assert!(self.done);
        let mut lookup = vec![UNDEFINED; self.table.nr_rows()];
        let mut next_index = 0u32;
        let mut compressed = Table::new(self.nr_gens, self.active, UNDEFINED);

        let mut pos = 0u32;
        while pos != self.next && pos != UNDEFINED {
            let row = pos as usize;
            if lookup[row] == UNDEFINED {
                lookup[row] = next_index;
                next_index += 1;
            }
            let cur = lookup[row];
            for i in 0..self.nr_gens {
                let val = self.table.get(row, i) as usize;
                if lookup[val] == UNDEFINED {
                    lookup[val] = next_index;
                    next_index += 1;
                }
                compressed.set(cur as usize, i, lookup[val]);
            }
            pos = self.forwd[row];
        }
        self.table = compressed;

        self.gen_lookup = vec![UNDEFINED; self.active.saturating_sub(1)];
        for a in (0..self.nr_gens).rev() {
            let coset = self.table.get(0, a);
            if coset >= 1 {
                self.gen_lookup[coset as usize - 1] = a as Letter;
            }
        }
    }
}

impl Runner for ToddCoxeter {
    fn run(&mut self) {
        ToddCoxeter::run(self)
    }

    fn finished(&self) -> bool {
        self.done
    }

    fn dead(&self) -> bool {
        self.error.is_some()
    }

    fn stop_token(&self) -> &StopToken {
        &self.token
    }
}

impl CongruenceMethod for ToddCoxeter {
    fn nr_classes(&mut self) -> Result<u64, Error> {
        ToddCoxeter::nr_classes(self)
    }

    fn word_to_class_index(&mut self, word: &[Letter]) -> Result<u32, Error> {
        if !self.done {
            if self.is_obviously_infinite() {
                return Err(Error::Infinite);
            }
            ToddCoxeter::run(self);
            self.completion_status()?;
        }
        ToddCoxeter::word_to_class_index(self, word)
    }

    fn class_index_to_word(&mut self, class: u32) -> Result<Word, Error> {
        if !self.done {
            if self.is_obviously_infinite() {
                return Err(Error::Infinite);
            }
            ToddCoxeter::run(self);
            self.completion_status()?;
        }
        ToddCoxeter::class_index_to_word(self, class)
    }

    fn quotient_table(&mut self) -> Result<Table<u32>, Error> {
        ToddCoxeter::quotient_table(self)
    }
}

/// Breadth-first search over a completed coset table, recording for each
/// coset the coset and letter it was first reached through.
fn shortest_paths(table: &Table<u32>, nr_gens: usize) -> (Vec<u32>, Vec<u32>) {
    let n = table.nr_rows();
    let mut parent = vec![UNDEFINED; n];
    let mut letter = vec![UNDEFINED; n];
    let mut seen = vec![false; n];
    let mut queue = VecDeque::from([0u32]);
    seen[0] = true;
    while let Some(coset) = queue.pop_front() {
        for a in 0..nr_gens {
            let image = table.get(coset as usize, a) as usize;
            if !seen[image] {
                seen[image] = true;
                parent[image] = coset;
                letter[image] = a as u32;
                queue.push_back(image as u32);
            }
        }
    }
    (parent, letter)
}

fn reversed(rel: &Relation) -> Relation {
    let mut lhs = rel.0.clone();
    let mut rhs = rel.1.clone();
    lhs.reverse();
    rhs.reverse();
    (lhs, rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Elt, Transformation};

    fn presentation() -> Vec<Relation> {
        // a^3 = a, a = b^2: the monogenic semigroup of index 2 and period 4.
        vec![(vec![0, 0, 0], vec![0]), (vec![0], vec![1, 1])]
    }

    #[test]
    fn two_sided_trivial_congruence() {
        let mut tc = ToddCoxeter::new(CongruenceKind::TwoSided, 2, presentation(), vec![]).unwrap();
        assert!(!tc.is_obviously_infinite());
        assert_eq!(tc.nr_classes().unwrap(), 5);
        assert_eq!(
            tc.word_to_class_index(&[0, 0, 1]).unwrap(),
            tc.word_to_class_index(&[0, 0, 0, 0, 1]).unwrap()
        );
        assert_ne!(
            tc.word_to_class_index(&[0, 0, 0]).unwrap(),
            tc.word_to_class_index(&[0, 0, 1]).unwrap()
        );
    }

    #[test]
    fn relations_hold_at_every_coset() {
        let mut tc = ToddCoxeter::new(CongruenceKind::TwoSided, 2, presentation(), vec![]).unwrap();
        tc.nr_classes().unwrap();
        // Tracing any relation from any coset of the compressed table lands
        // on the same coset on both sides.
        for c in 0..tc.table.nr_rows() as u32 {
            for (lhs, rhs) in &tc.tc_relations {
                let walk = |word: &Word| {
                    let mut coset = c;
                    for &letter in word {
                        coset = tc.table.get(coset as usize, letter as usize);
                    }
                    coset
                };
                assert_eq!(walk(lhs), walk(rhs));
            }
        }
    }

    #[test]
    fn left_congruence_reverses_relations() {
        let mut tc = ToddCoxeter::new(CongruenceKind::Left, 2, presentation(), vec![]).unwrap();
        assert_eq!(tc.nr_classes().unwrap(), 5);
        assert_eq!(
            tc.word_to_class_index(&[0, 1, 1, 0, 0, 1]).unwrap(),
            tc.word_to_class_index(&[0, 0, 1]).unwrap()
        );
    }

    #[test]
    fn class_words_round_trip() {
        let mut tc = ToddCoxeter::new(CongruenceKind::TwoSided, 2, presentation(), vec![]).unwrap();
        let n = tc.nr_classes().unwrap() as u32;
        for c in 0..n {
            let word = tc.class_index_to_word(c).unwrap();
            assert_eq!(tc.word_to_class_index(&word).unwrap(), c);
        }
        assert!(matches!(
            tc.class_index_to_word(n),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn left_class_words_round_trip() {
        let mut tc = ToddCoxeter::new(CongruenceKind::Left, 2, presentation(), vec![]).unwrap();
        let n = tc.nr_classes().unwrap() as u32;
        for c in 0..n {
            let word = tc.class_index_to_word(c).unwrap();
            assert_eq!(tc.word_to_class_index(&word).unwrap(), c);
        }
    }

    #[test]
    fn queries_before_running_are_rejected() {
        let tc = ToddCoxeter::new(CongruenceKind::TwoSided, 2, presentation(), vec![]).unwrap();
        assert!(matches!(
            tc.word_to_class_index(&[0]),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            tc.class_index_to_letter(0),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn obviously_infinite_presentations() {
        // A generator that occurs in no relation.
        let tc = ToddCoxeter::new(
            CongruenceKind::TwoSided,
            2,
            vec![(vec![0, 0], vec![0]), (vec![0, 0, 0], vec![0])],
            vec![],
        )
        .unwrap();
        assert!(tc.is_obviously_infinite());

        // More generators than relations.
        let tc =
            ToddCoxeter::new(CongruenceKind::TwoSided, 3, vec![(vec![0], vec![1])], vec![]).unwrap();
        assert!(tc.is_obviously_infinite());
        let mut tc =
            ToddCoxeter::new(CongruenceKind::TwoSided, 3, vec![(vec![0], vec![1])], vec![]).unwrap();
        assert_eq!(tc.nr_classes(), Err(Error::Infinite));
    }

    #[test]
    fn quotient_needs_two_sided() {
        let mut tc = ToddCoxeter::new(CongruenceKind::Left, 2, presentation(), vec![]).unwrap();
        assert!(matches!(
            tc.quotient_semigroup(),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn quotient_semigroup_has_one_element_per_class() {
        let mut tc = ToddCoxeter::new(CongruenceKind::TwoSided, 2, presentation(), vec![]).unwrap();
        let n = tc.nr_classes().unwrap() as usize;
        let mut quotient = tc.quotient_semigroup().unwrap();
        assert_eq!(quotient.size().unwrap(), n);
    }

    #[test]
    fn prefilled_congruence_counts_classes() {
        let t1: Elt = Transformation::new(vec![1, 3, 4, 2, 3]).unwrap().into();
        let t2: Elt = Transformation::new(vec![3, 2, 1, 3, 3]).unwrap().into();
        let mut parent = FroidurePin::new(vec![t1, t2]).unwrap();
        let size = parent.size().unwrap() as u64;
        let mut tc = ToddCoxeter::new(CongruenceKind::TwoSided, 2, vec![], vec![]).unwrap();
        tc.prefill_from(&parent).unwrap();
        assert!(tc.is_obviously_finite());
        // With no generating pairs the congruence is trivial.
        assert_eq!(tc.nr_classes().unwrap(), size);
    }

    #[test]
    fn stopped_enumeration_resumes() {
        let mut tc = ToddCoxeter::new(CongruenceKind::TwoSided, 2, presentation(), vec![]).unwrap();
        tc.stop_token().request_stop();
        Runner::run(&mut tc);
        assert!(!tc.finished());
        tc.stop_token().clear();
        Runner::run(&mut tc);
        assert!(tc.finished());
        assert_eq!(tc.nr_classes().unwrap(), 5);
    }

    #[test]
    fn pairs_cannot_be_added_after_running() {
        let mut tc = ToddCoxeter::new(CongruenceKind::TwoSided, 2, presentation(), vec![]).unwrap();
        tc.nr_classes().unwrap();
        assert!(matches!(
            tc.add_pair(vec![0], vec![1]),
            Err(Error::InvalidOperation(_))
        ));
    }
}
