//! Congruences on finitely presented and concrete semigroups.
//!
//! A [`Congruence`] is defined by its kind (left, right, or two-sided) and
//! a source: either a [`Presentation`] or a fully enumerated parent
//! semigroup. It owns a [`Race`] of interchangeable congruence methods
//! (Todd–Coxeter in one or two flavours, plus the Knuth–Bendix based
//! methods for presentations) and answers every query by racing them and
//! delegating to whichever finishes first.
//!
//! Different methods may number the classes differently, so the *values* of
//! class indices can vary between runs on the same input; the counts and
//! the induced partition never do.

pub mod kbfp;
pub mod kbp;
pub mod pair_orbit;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::element::{Element, Elt};
use crate::error::Error;
use crate::froidure_pin::FroidurePin;
use crate::quotient::ClassElt;
use crate::runner::{Race, Runner, StopToken};
use crate::table::Table;
use crate::todd_coxeter::ToddCoxeter;
use crate::word::{validate_relation, validate_word, Letter, Relation, Word};

pub use kbfp::Kbfp;
pub use kbp::Kbp;
pub use pair_orbit::PairOrbit;

/// Parents whose Cayley table is at most this large are handled by a single
/// prefilled Todd–Coxeter instead of a race.
const SMALL_PARENT: usize = 1024;

/// The kind of a congruence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CongruenceKind {
    /// Compatible with multiplication on the left.
    Left,
    /// Compatible with multiplication on the right.
    Right,
    /// Compatible with multiplication on both sides.
    TwoSided,
}

impl fmt::Display for CongruenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CongruenceKind::Left => "left",
            CongruenceKind::Right => "right",
            CongruenceKind::TwoSided => "two-sided",
        })
    }
}

/// How the driver populates its standard set of methods.
///
/// Without an explicit policy the driver picks for itself, racing the
/// relation-tracing and Cayley-graph-prefilled variants where both apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Policy {
    /// No standard methods; the caller supplies methods with
    /// [`Congruence::add_method`].
    None,
    /// Todd–Coxeter tracing the defining relations only.
    UseRelations,
    /// Todd–Coxeter prefilled from the parent's Cayley graph. Falls back to
    /// [`Policy::UseRelations`] when there is nothing to prefill from.
    UseCayleyGraph,
}

/// A finite semigroup presentation: an alphabet size and defining
/// relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    /// Number of generators.
    pub alphabet_size: usize,
    /// Defining relations; both sides are non-empty words over the
    /// alphabet.
    pub relations: Vec<Relation>,
}

impl Presentation {
    /// Creates a validated presentation.
    pub fn new(alphabet_size: usize, relations: Vec<Relation>) -> Result<Self, Error> {
        let this = Self {
            alphabet_size,
            relations,
        };
        this.validate()?;
        Ok(this)
    }

    /// Checks every relation against the alphabet.
    pub fn validate(&self) -> Result<(), Error> {
        if self.alphabet_size == 0 {
            return Err(Error::InvalidOperation(
                "a presentation needs at least one generator".into(),
            ));
        }
        for rel in &self.relations {
            validate_relation(rel, self.alphabet_size)?;
        }
        Ok(())
    }
}

/// One algorithm for computing a congruence, with the query surface the
/// driver dispatches to the race winner.
pub trait CongruenceMethod: Runner {
    /// The number of congruence classes.
    fn nr_classes(&mut self) -> Result<u64, Error>;

    /// The class of a word over the congruence's alphabet.
    fn word_to_class_index(&mut self, word: &[Letter]) -> Result<u32, Error>;

    /// A word lying in the given class.
    fn class_index_to_word(&mut self, class: u32) -> Result<Word, Error>;

    /// The completed coset table for building a quotient semigroup, if this
    /// method produces one.
    fn quotient_table(&mut self) -> Result<Table<u32>, Error> {
        Err(Error::InvalidOperation(
            "this method does not build a coset table".into(),
        ))
    }

    /// The non-trivial classes, if this method can list them directly.
    fn nontrivial_classes(&mut self) -> Result<Option<Vec<Vec<Word>>>, Error> {
        Ok(None)
    }
}

impl<'a> Runner for Box<dyn CongruenceMethod + 'a> {
    fn run(&mut self) {
        (**self).run()
    }

    fn finished(&self) -> bool {
        (**self).finished()
    }

    fn dead(&self) -> bool {
        (**self).dead()
    }

    fn stop_token(&self) -> &StopToken {
        (**self).stop_token()
    }
}

/// A congruence on a finitely presented or concrete semigroup, computed by
/// racing methods against each other.
pub struct Congruence<'a, E: Element = Elt> {
    kind: CongruenceKind,
    nr_gens: usize,
    relations: Vec<Relation>,
    extra: Vec<Relation>,
    parent: Option<&'a FroidurePin<E>>,
    prefill: Option<Table<u32>>,
    policy: Option<Policy>,
    race: Race<Box<dyn CongruenceMethod + 'a>>,
    initialised: bool,
}

impl<'a, E: Element> Congruence<'a, E> {
    /// A congruence of the given kind over a finitely presented semigroup.
    /// The congruence itself is generated by the pairs added with
    /// [`Congruence::add_pair`].
    pub fn new(kind: CongruenceKind, presentation: Presentation) -> Result<Self, Error> {
        presentation.validate()?;
        Ok(Self {
            kind,
            nr_gens: presentation.alphabet_size,
            relations: presentation.relations,
            extra: Vec::new(),
            parent: None,
            prefill: None,
            policy: None,
            race: Race::new(),
            initialised: false,
        })
    }

    /// A congruence of the given kind over a concrete semigroup. The parent
    /// is enumerated to completion first (its defining rules and Cayley
    /// graphs feed the methods) and is only read afterwards, so it can be
    /// shared by every runner in the race.
    pub fn from_semigroup(
        kind: CongruenceKind,
        parent: &'a mut FroidurePin<E>,
    ) -> Result<Self, Error> {
        let relations = parent.rules()?;
        let nr_gens = parent.nr_gens();
        let parent: &'a FroidurePin<E> = parent;
        Ok(Self {
            kind,
            nr_gens,
            relations,
            extra: Vec::new(),
            parent: Some(parent),
            prefill: None,
            policy: None,
            race: Race::new(),
            initialised: false,
        })
    }

    /// The kind of the congruence.
    pub fn kind(&self) -> CongruenceKind {
        self.kind
    }

    /// The alphabet size of the underlying semigroup.
    pub fn nr_gens(&self) -> usize {
        self.nr_gens
    }

    /// Adds a generating pair. Only allowed before the first query runs the
    /// race.
    pub fn add_pair(&mut self, u: Word, v: Word) -> Result<(), Error> {
        if self.initialised {
            return Err(Error::InvalidOperation(
                "generating pairs must be added before the congruence is computed".into(),
            ));
        }
        validate_relation(&(u.clone(), v.clone()), self.nr_gens)?;
        self.extra.push((u, v));
        Ok(())
    }

    /// Chooses how the standard method set is populated.
    pub fn set_policy(&mut self, policy: Policy) {
        self.policy = Some(policy);
    }

    /// Bounds the number of concurrently racing methods.
    pub fn set_max_threads(&mut self, nr_threads: usize) {
        self.race.set_max_threads(nr_threads);
    }

    /// Supplies a partial coset table to seed Todd–Coxeter with, e.g. the
    /// Cayley graph of a semigroup. Ignored once the race has started.
    pub fn set_prefill(&mut self, table: Table<u32>) {
        if !self.initialised {
            self.prefill = Some(table);
        }
    }

    /// Adds a caller-supplied method to the race.
    pub fn add_method(&mut self, method: Box<dyn CongruenceMethod + 'a>) {
        self.race.add_runner(method);
    }

    /// Quick sufficient conditions for infinitely many classes, mirroring
    /// the Todd–Coxeter check: only presentations can be obviously
    /// infinite.
    pub fn is_obviously_infinite(&self) -> bool {
        if self.parent.is_some() || self.prefill.is_some() {
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
    /// further computation.
    pub fn is_obviously_finite(&self) -> bool {
        self.parent.is_some()
            || self.prefill.is_some()
            || self.race.winner().is_some_and(|w| w.finished())
    }

    fn relation_tc(&self) -> Result<ToddCoxeter, Error> {
        ToddCoxeter::new(
            self.kind,
            self.nr_gens,
            self.relations.clone(),
            self.extra.clone(),
        )
    }

    fn prefilled_tc(&self) -> Result<Option<ToddCoxeter>, Error> {
        let mut tc = ToddCoxeter::new(self.kind, self.nr_gens, Vec::new(), self.extra.clone())?;
        if let Some(parent) = self.parent {
            tc.prefill_from(parent)?;
        } else if let Some(table) = &self.prefill {
            tc.prefill(table.clone())?;
        } else {
            return Ok(None);
        }
        Ok(Some(tc))
    }

    /// Installs the standard method set, as selected by the policy.
    fn init_race(&mut self) -> Result<(), Error> {
        if self.initialised {
            return Ok(());
        }
        self.initialised = true;
        match self.policy {
            Some(Policy::None) => {}
            Some(Policy::UseCayleyGraph) => match self.prefilled_tc()? {
                Some(tc) => self.race.add_runner(Box::new(tc)),
                // Nothing to prefill from: trace the relations instead.
                None => self.race.add_runner(Box::new(self.relation_tc()?)),
            },
            Some(Policy::UseRelations) => {
                self.race.add_runner(Box::new(self.relation_tc()?));
            }
            None => {
                if let Some(parent) = self.parent {
                    let prefilled = match self.prefilled_tc()? {
                        Some(tc) => tc,
                        None => self.relation_tc()?,
                    };
                    if parent.current_size() < SMALL_PARENT {
                        log::debug!("congruence: small parent, racing one prefilled method");
                        self.race.add_runner(Box::new(prefilled));
                    } else {
                        self.race.add_runner(Box::new(prefilled));
                        self.race.add_runner(Box::new(self.relation_tc()?));
                    }
                } else if self.prefill.is_some() {
                    if let Some(tc) = self.prefilled_tc()? {
                        self.race.add_runner(Box::new(tc));
                    }
                } else {
                    // Presentation: Knuth–Bendix methods, and Todd–Coxeter
                    // whenever it has a chance of terminating.
                    self.race.add_runner(Box::new(Kbp::new(
                        self.kind,
                        self.nr_gens,
                        self.relations.clone(),
                        self.extra.clone(),
                    )?));
                    if self.kind == CongruenceKind::TwoSided {
                        self.race.add_runner(Box::new(Kbfp::new(
                            self.nr_gens,
                            self.relations.clone(),
                            self.extra.clone(),
                        )?));
                    }
                    if !self.is_obviously_infinite() {
                        self.race.add_runner(Box::new(self.relation_tc()?));
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs the race if needed and returns the winning method.
    pub fn winner(&mut self) -> Result<&mut Box<dyn CongruenceMethod + 'a>, Error> {
        self.init_race()?;
        if self.race.is_empty() {
            return Err(Error::InvalidOperation(
                "the congruence has no methods to run".into(),
            ));
        }
        let index = self.race.run_race()?;
        Ok(&mut self.race.runners_mut()[index])
    }

    /// The number of congruence classes.
    pub fn nr_classes(&mut self) -> Result<u64, Error> {
        if self.is_obviously_infinite() {
            return Err(Error::Infinite);
        }
        self.winner()?.nr_classes()
    }

    /// The class of the given word.
    pub fn word_to_class_index(&mut self, word: &[Letter]) -> Result<u32, Error> {
        validate_word(word, self.nr_gens)?;
        self.winner()?.word_to_class_index(word)
    }

    /// A word lying in the given class.
    pub fn class_index_to_word(&mut self, class: u32) -> Result<Word, Error> {
        self.winner()?.class_index_to_word(class)
    }

    /// Returns `true` if the two words lie in the same class.
    pub fn contains(&mut self, u: &[Letter], v: &[Letter]) -> Result<bool, Error> {
        validate_word(u, self.nr_gens)?;
        validate_word(v, self.nr_gens)?;
        if u == v {
            return Ok(true);
        }
        let winner = self.winner()?;
        Ok(winner.word_to_class_index(u)? == winner.word_to_class_index(v)?)
    }

    /// The quotient of the underlying semigroup by this congruence, as a
    /// new semigroup of classes enumerated by Froidure–Pin. Two-sided only.
    pub fn quotient_semigroup(&mut self) -> Result<FroidurePin<ClassElt>, Error> {
        if self.kind != CongruenceKind::TwoSided {
            return Err(Error::InvalidOperation(
                "only two-sided congruences have quotient semigroups".into(),
            ));
        }
        let attempt = self.winner()?.quotient_table();
        let table = match attempt {
            Ok(table) => table,
            Err(Error::InvalidOperation(_)) => {
                // The winner keeps no coset table; run a dedicated
                // enumeration, prefilled where possible.
                let mut tc = match self.prefilled_tc()? {
                    Some(tc) => tc,
                    None => self.relation_tc()?,
                };
                tc.quotient_table()?
            }
            Err(err) => return Err(err),
        };
        let table = Arc::new(table);
        let gens = (0..table.nr_cols())
            .map(|a| ClassElt::new(Arc::clone(&table), a as u32 + 1))
            .collect();
        FroidurePin::new(gens)
    }

    /// The classes with more than one element, as words over the
    /// generators.
    ///
    /// With a parent semigroup, every element is swept and bucketed by its
    /// class; for a presentation the Knuth–Bendix-then-pair-orbit method
    /// lists them.
    pub fn nontrivial_classes(&mut self) -> Result<Vec<Vec<Word>>, Error> {
        if let Some(parent) = self.parent {
            let nr_classes = self.nr_classes()? as usize;
            let winner = self.winner()?;
            let mut buckets: Vec<Vec<Word>> = vec![Vec::new(); nr_classes];
            for pos in 0..parent.current_size() as u32 {
                let word = parent.current_minimal_factorisation(pos)?;
                let class = winner.word_to_class_index(&word)?;
                buckets[class as usize].push(word);
            }
            buckets.retain(|class| class.len() > 1);
            return Ok(buckets);
        }
        // Reuse the winner when it can list the classes itself.
        if let Some(classes) = self.winner()?.nontrivial_classes()? {
            return Ok(classes.into_iter().filter(|c| c.len() > 1).collect());
        }
        let mut kbp = Kbp::new(
            self.kind,
            self.nr_gens,
            self.relations.clone(),
            self.extra.clone(),
        )?;
        match CongruenceMethod::nontrivial_classes(&mut kbp)? {
            Some(classes) => Ok(classes.into_iter().filter(|c| c.len() > 1).collect()),
            None => Err(Error::InvalidOperation(
                "no method can list the non-trivial classes".into(),
            )),
        }
    }
}

impl<E: Element> fmt::Debug for Congruence<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Congruence")
            .field("kind", &self.kind)
            .field("nr_gens", &self.nr_gens)
            .field("relations", &self.relations.len())
            .field("extra", &self.extra.len())
            .field("parent", &self.parent.is_some())
            .field("initialised", &self.initialised)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Transformation;

    fn presentation() -> Presentation {
        Presentation::new(2, vec![(vec![0, 0, 0], vec![0]), (vec![0], vec![1, 1])]).unwrap()
    }

    #[test]
    fn presentation_congruence_counts_classes() {
        let mut cong: Congruence = Congruence::new(CongruenceKind::TwoSided, presentation()).unwrap();
        assert_eq!(cong.nr_classes().unwrap(), 5);
        assert!(cong.is_obviously_finite());
        assert!(cong.contains(&[0, 0, 1], &[0, 0, 0, 0, 1]).unwrap());
    }

    #[test]
    fn policy_none_needs_methods() {
        let mut cong: Congruence = Congruence::new(CongruenceKind::TwoSided, presentation()).unwrap();
        cong.set_policy(Policy::None);
        assert!(matches!(
            cong.nr_classes(),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn policy_none_with_a_supplied_method() {
        let mut cong: Congruence = Congruence::new(CongruenceKind::TwoSided, presentation()).unwrap();
        cong.set_policy(Policy::None);
        let tc = ToddCoxeter::new(
            CongruenceKind::TwoSided,
            2,
            presentation().relations,
            vec![],
        )
        .unwrap();
        cong.add_method(Box::new(tc));
        assert_eq!(cong.nr_classes().unwrap(), 5);
    }

    #[test]
    fn use_cayley_graph_policy_falls_back_to_relations() {
        let mut cong: Congruence = Congruence::new(CongruenceKind::TwoSided, presentation()).unwrap();
        cong.set_policy(Policy::UseCayleyGraph);
        // No parent and no prefill: the driver silently traces relations.
        assert_eq!(cong.nr_classes().unwrap(), 5);
    }

    #[test]
    fn quotient_of_a_presentation_congruence() {
        let mut cong: Congruence = Congruence::new(CongruenceKind::TwoSided, presentation()).unwrap();
        let mut quotient = cong.quotient_semigroup().unwrap();
        assert_eq!(quotient.size().unwrap(), 5);
    }

    #[test]
    fn quotient_needs_two_sided() {
        let mut cong: Congruence = Congruence::new(CongruenceKind::Left, presentation()).unwrap();
        assert!(matches!(
            cong.quotient_semigroup(),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn semigroup_congruence_with_pair() {
        let t1: Elt = Transformation::new(vec![1, 3, 4, 2, 3]).unwrap().into();
        let t2: Elt = Transformation::new(vec![3, 2, 1, 3, 3]).unwrap().into();
        let mut parent = FroidurePin::new(vec![t1, t2]).unwrap();
        let u1: Elt = Transformation::new(vec![3, 4, 4, 4, 4]).unwrap().into();
        let u2: Elt = Transformation::new(vec![3, 1, 3, 3, 3]).unwrap().into();
        let p1 = parent.position(&u1).unwrap().unwrap();
        let p2 = parent.position(&u2).unwrap().unwrap();
        let w1 = parent.minimal_factorisation(p1).unwrap();
        let w2 = parent.minimal_factorisation(p2).unwrap();

        let mut cong = Congruence::from_semigroup(CongruenceKind::TwoSided, &mut parent).unwrap();
        cong.add_pair(w1.clone(), w2.clone()).unwrap();
        assert_eq!(cong.nr_classes().unwrap(), 21);
        assert!(cong.contains(&w1, &w2).unwrap());

        let classes = cong.nontrivial_classes().unwrap();
        let merged: usize = classes.iter().map(|c| c.len()).sum();
        assert_eq!(88 - merged + classes.len(), 21);
    }

    #[test]
    fn pairs_rejected_after_computation() {
        let mut cong: Congruence = Congruence::new(CongruenceKind::TwoSided, presentation()).unwrap();
        cong.nr_classes().unwrap();
        assert!(matches!(
            cong.add_pair(vec![0], vec![1]),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn obviously_infinite_is_rejected_up_front() {
        let free = Presentation::new(2, vec![]).unwrap();
        let mut cong: Congruence = Congruence::new(CongruenceKind::TwoSided, free).unwrap();
        assert!(cong.is_obviously_infinite());
        assert_eq!(cong.nr_classes(), Err(Error::Infinite));
    }

    #[test]
    fn class_indices_round_trip_through_the_driver() {
        let mut cong: Congruence = Congruence::new(CongruenceKind::TwoSided, presentation()).unwrap();
        let n = cong.nr_classes().unwrap() as u32;
        for class in 0..n {
            let word = cong.class_index_to_word(class).unwrap();
            assert_eq!(cong.word_to_class_index(&word).unwrap(), class);
        }
    }
}
