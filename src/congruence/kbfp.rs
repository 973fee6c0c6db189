//! Knuth–Bendix followed by Froidure–Pin.
//!
//! For a two-sided congruence given by a presentation, completing a
//! rewriting system on the relations *and* the generating pairs presents
//! the quotient semigroup itself; enumerating that semigroup with
//! Froidure–Pin then yields one element per congruence class.

use std::sync::Arc;

use crate::congruence::CongruenceMethod;
use crate::error::Error;
use crate::froidure_pin::FroidurePin;
use crate::rewrite::{RewriteElt, RewritingSystem};
use crate::runner::{Runner, StopToken};
use crate::word::{validate_word, Letter, Relation, Word};

/// The Knuth–Bendix-then-Froidure–Pin congruence method. Two-sided only.
#[derive(Debug)]
pub struct Kbfp {
    nr_gens: usize,
    rws: Option<RewritingSystem>,
    semigroup: Option<FroidurePin<RewriteElt>>,
    token: StopToken,
    error: Option<Error>,
}

impl Kbfp {
    /// Creates the method for the two-sided congruence generated by `extra`
    /// on the semigroup presented by `relations`.
    pub fn new(
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
        rws.add_rules(&extra)?;
        Ok(Self {
            nr_gens,
            rws: Some(rws),
            semigroup: None,
            token: StopToken::new(),
            error: None,
        })
    }

    fn run_inner(&mut self) -> Result<(), Error> {
        if self.semigroup.is_none() {
            if let Some(rws) = self.rws.as_mut() {
                log::debug!("kbfp: running knuth-bendix");
                rws.knuth_bendix(&self.token);
                if self.token.should_stop() {
                    return Ok(());
                }
            }
            if let Some(rws) = self.rws.take() {
                log::debug!("kbfp: running froidure-pin");
                let shared = Arc::new(rws);
                let gens = (0..self.nr_gens as Letter)
                    .map(|a| RewriteElt::from_letter(Arc::clone(&shared), a))
                    .collect();
                self.semigroup = Some(FroidurePin::new(gens)?);
            }
        }
        if let Some(semigroup) = self.semigroup.as_mut() {
            semigroup.enumerate_until(usize::MAX, &self.token)?;
        }
        Ok(())
    }

    fn ensure_finished(&mut self) -> Result<&mut FroidurePin<RewriteElt>, Error> {
        if !Runner::finished(self) {
            Runner::run(self);
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        match self.semigroup.as_mut() {
            Some(semigroup) if semigroup.is_done() => Ok(semigroup),
            _ => Err(if self.token.timed_out() {
                Error::TimedOut
            } else {
                Error::Cancelled
            }),
        }
    }
}

impl Runner for Kbfp {
    fn run(&mut self) {
        if self.finished() || self.dead() {
            return;
        }
        if let Err(err) = self.run_inner() {
            log::debug!("kbfp: dead: {}", err);
            self.error = Some(err);
        }
    }

    fn finished(&self) -> bool {
        self.semigroup.as_ref().is_some_and(|s| s.is_done())
    }

    fn dead(&self) -> bool {
        self.error.is_some()
    }

    fn stop_token(&self) -> &StopToken {
        &self.token
    }
}

impl CongruenceMethod for Kbfp {
    fn nr_classes(&mut self) -> Result<u64, Error> {
        Ok(self.ensure_finished()?.current_size() as u64)
    }

    fn word_to_class_index(&mut self, word: &[Letter]) -> Result<u32, Error> {
        validate_word(word, self.nr_gens)?;
        let semigroup = self.ensure_finished()?;
        let rws = Arc::clone(semigroup.gen(0)?.system());
        let elt = RewriteElt::new(rws, word.to_vec());
        semigroup.current_position(&elt).ok_or_else(|| {
            Error::InvalidOperation("word does not represent an element of the quotient".into())
        })
    }

    fn class_index_to_word(&mut self, class: u32) -> Result<Word, Error> {
        self.ensure_finished()?.current_minimal_factorisation(class)
    }
}
