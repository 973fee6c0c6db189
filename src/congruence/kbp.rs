//! Knuth–Bendix followed by the orbit of pairs.
//!
//! For a congruence of any kind given by a presentation, first complete a
//! rewriting system on the defining relations alone and enumerate the
//! presented semigroup with Froidure–Pin; then run the
//! [`PairOrbit`] of the generating pairs over that concrete semigroup.
//! Unlike [`Kbfp`](crate::congruence::kbfp::Kbfp), this handles left and
//! right congruences, and it is the method that can list the non-trivial
//! classes of a presentation congruence.

use std::sync::Arc;

use crate::congruence::pair_orbit::PairOrbit;
use crate::congruence::{CongruenceKind, CongruenceMethod};
use crate::error::Error;
use crate::froidure_pin::FroidurePin;
use crate::rewrite::{RewriteElt, RewritingSystem};
use crate::runner::{Runner, StopToken};
use crate::word::{Letter, Relation, Word};

/// The Knuth–Bendix-then-pair-orbit congruence method.
#[derive(Debug)]
pub struct Kbp {
    kind: CongruenceKind,
    nr_gens: usize,
    extra: Vec<Relation>,
    rws: Option<RewritingSystem>,
    fp: Option<FroidurePin<RewriteElt>>,
    orbit: Option<PairOrbit<RewriteElt, Arc<FroidurePin<RewriteElt>>>>,
    token: StopToken,
    error: Option<Error>,
}

impl Kbp {
    /// Creates the method for the `kind` congruence generated by `extra` on
    /// the semigroup presented by `relations`.
    pub fn new(
        kind: CongruenceKind,
        nr_gens: usize,
        relations: Vec<Relation>,
        extra: Vec<Relation>,
    ) -> Result<Self, Error> {
        if nr_gens == 0 {
            return Err(Error::InvalidOperation(
                "a presentation needs at least one generator".into(),
            ));
        }
        let mut rws = RewritingSystem::new(nr_gens);
        rws.add_rules(&relations)?;
        for rel in &extra {
            crate::word::validate_relation(rel, nr_gens)?;
        }
        Ok(Self {
            kind,
            nr_gens,
            extra,
            rws: Some(rws),
            fp: None,
            orbit: None,
            token: StopToken::new(),
            error: None,
        })
    }

    fn run_inner(&mut self) -> Result<(), Error> {
        if self.orbit.is_none() {
            if let Some(rws) = self.rws.as_mut() {
                log::debug!("kbp: running knuth-bendix");
                rws.knuth_bendix(&self.token);
                if self.token.should_stop() {
                    return Ok(());
                }
            }
            if let Some(rws) = self.rws.take() {
                let shared = Arc::new(rws);
                let gens = (0..self.nr_gens as Letter)
                    .map(|a| RewriteElt::from_letter(Arc::clone(&shared), a))
                    .collect();
                self.fp = Some(FroidurePin::new(gens)?);
            }
            if let Some(fp) = self.fp.as_mut() {
                log::debug!("kbp: enumerating the presented semigroup");
                fp.enumerate_until(usize::MAX, &self.token)?;
                if !fp.is_done() {
                    return Ok(());
                }
            }
            if let Some(fp) = self.fp.take() {
                log::debug!("kbp: running the pair orbit");
                let shared = Arc::new(fp);
                self.orbit = Some(PairOrbit::new(
                    self.kind,
                    shared,
                    &self.extra,
                    self.token.clone(),
                )?);
            }
        }
        if let Some(orbit) = self.orbit.as_mut() {
            orbit.enumerate();
        }
        Ok(())
    }

    fn orbit_finished(&mut self) -> Result<&mut PairOrbit<RewriteElt, Arc<FroidurePin<RewriteElt>>>, Error>
    {
        if !Runner::finished(self) {
            Runner::run(self);
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        match self.orbit.as_mut() {
            Some(orbit) if orbit.finished() => Ok(orbit),
            _ => Err(if self.token.timed_out() {
                Error::TimedOut
            } else {
                Error::Cancelled
            }),
        }
    }
}

impl Runner for Kbp {
    fn run(&mut self) {
        if self.finished() || self.dead() {
            return;
        }
        if let Err(err) = self.run_inner() {
            log::debug!("kbp: dead: {}", err);
            self.error = Some(err);
        }
    }

    fn finished(&self) -> bool {
        self.orbit.as_ref().is_some_and(|o| o.finished())
    }

    fn dead(&self) -> bool {
        self.error.is_some()
    }

    fn stop_token(&self) -> &StopToken {
        &self.token
    }
}

impl CongruenceMethod for Kbp {
    fn nr_classes(&mut self) -> Result<u64, Error> {
        self.orbit_finished()?.nr_classes()
    }

    fn word_to_class_index(&mut self, word: &[Letter]) -> Result<u32, Error> {
        self.orbit_finished()?.word_to_class_index(word)
    }

    fn class_index_to_word(&mut self, class: u32) -> Result<Word, Error> {
        self.orbit_finished()?.class_index_to_word(class)
    }

    fn nontrivial_classes(&mut self) -> Result<Option<Vec<Vec<Word>>>, Error> {
        let orbit = self.orbit_finished()?;
        Ok(Some(PairOrbit::nontrivial_classes(orbit)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presentation() -> Vec<Relation> {
        vec![(vec![0, 0, 0], vec![0]), (vec![0], vec![1, 1])]
    }

    #[test]
    fn trivial_congruence_has_one_class_per_element() {
        let mut kbp = Kbp::new(CongruenceKind::TwoSided, 2, presentation(), vec![]).unwrap();
        Runner::run(&mut kbp);
        assert!(Runner::finished(&kbp));
        assert_eq!(kbp.nr_classes().unwrap(), 5);
    }

    #[test]
    fn left_congruence_with_a_pair() {
        let mut kbp = Kbp::new(
            CongruenceKind::Left,
            2,
            presentation(),
            vec![(vec![0], vec![1])],
        )
        .unwrap();
        Runner::run(&mut kbp);
        let n = kbp.nr_classes().unwrap();
        assert!(n >= 1 && n < 5);
        // The generating pair itself is contained in the congruence.
        assert_eq!(
            kbp.word_to_class_index(&[0]).unwrap(),
            kbp.word_to_class_index(&[1]).unwrap()
        );
        let nontrivial = kbp.nontrivial_classes().unwrap().unwrap();
        assert!(!nontrivial.is_empty());
    }
}
