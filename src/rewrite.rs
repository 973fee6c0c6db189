//! Knuth–Bendix completion of a string rewriting system.
//!
//! A [`RewritingSystem`] holds rules over letter words, oriented by the
//! short-lex reduction ordering. [`RewritingSystem::knuth_bendix`] resolves
//! the overlaps between rule left-hand sides until the system is confluent,
//! at which point two words are equal in the presented semigroup exactly
//! when their normal forms coincide.
//!
//! Completion may run forever on presentations without a finite confluent
//! system, so it polls a stop token after every resolved overlap and can be
//! resumed.
//!
//! # Citations
//! - Knuth & Bendix, "Simple word problems in universal algebras" (1970)
//! - Sims, "Computation with finitely presented groups" (1994): the
//!   completion here is KBS_2 with TEST_2 stack clearing, and the
//!   confluence check is CONFLUENT (p. 62).

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::element::Element;
use crate::error::Error;
use crate::runner::StopToken;
use crate::word::{validate_relation, Letter, Relation, Word};

/// Stop adding rules beyond this many by default.
pub const DEFAULT_MAX_RULES: usize = 65_536;

#[derive(Debug, Clone)]
struct Rule {
    lhs: Word,
    rhs: Word,
    active: bool,
}

/// A string rewriting system with short-lex-oriented rules.
#[derive(Debug, Clone)]
pub struct RewritingSystem {
    alphabet_size: usize,
    rules: Vec<Rule>,
    stack: Vec<(Word, Word)>,
    confluent: bool,
    confluence_known: bool,
    total_rules: usize,
    max_rules: usize,
}

/// Returns `true` if `a` is greater than `b` in short-lex order.
fn shortlex_gt(a: &[Letter], b: &[Letter]) -> bool {
    a.len() > b.len() || (a.len() == b.len() && a > b)
}

fn find_subword(hay: &[Letter], needle: &[Letter]) -> Option<usize> {
    if needle.len() > hay.len() {
        return None;
    }
    hay.windows(needle.len()).position(|w| w == needle)
}

impl RewritingSystem {
    /// Creates an empty rewriting system over the given alphabet.
    pub fn new(alphabet_size: usize) -> Self {
        Self {
            alphabet_size,
            rules: Vec::new(),
            stack: Vec::new(),
            confluent: true,
            confluence_known: true,
            total_rules: 0,
            max_rules: DEFAULT_MAX_RULES,
        }
    }

    /// The alphabet size.
    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    /// Caps the number of rules completion may create.
    pub fn set_max_rules(&mut self, max_rules: usize) {
        self.max_rules = max_rules;
    }

    /// Adds one defining relation, reducing and orienting it first.
    pub fn add_rule(&mut self, lhs: Word, rhs: Word) -> Result<(), Error> {
        validate_relation(&(lhs.clone(), rhs.clone()), self.alphabet_size)?;
        self.push_stack(lhs, rhs, &StopToken::new());
        Ok(())
    }

    /// Adds every relation in `relations`.
    pub fn add_rules(&mut self, relations: &[Relation]) -> Result<(), Error> {
        for (lhs, rhs) in relations {
            self.add_rule(lhs.clone(), rhs.clone())?;
        }
        Ok(())
    }

    /// The number of active rules.
    pub fn nr_active_rules(&self) -> usize {
        self.rules.iter().filter(|r| r.active).count()
    }

    /// Iterates over the active rules as `(lhs, rhs)` pairs.
    pub fn active_rules(&self) -> impl Iterator<Item = (&Word, &Word)> {
        self.rules
            .iter()
            .filter(|r| r.active)
            .map(|r| (&r.lhs, &r.rhs))
    }

    /// Rewrites `word` to normal form with the active rules. Every rule is
    /// length-reducing or short-lex reducing, so this terminates.
    pub fn rewrite_in_place(&self, word: &mut Word) {
        'scan: loop {
            for rule in self.rules.iter().filter(|r| r.active) {
                if let Some(at) = find_subword(word, &rule.lhs) {
                    word.splice(at..at + rule.lhs.len(), rule.rhs.iter().copied());
                    continue 'scan;
                }
            }
            return;
        }
    }

    /// The normal form of `word`.
    pub fn normal_form(&self, word: &[Letter]) -> Word {
        let mut out = word.to_vec();
        self.rewrite_in_place(&mut out);
        out
    }

    /// Returns `true` if the two words have the same normal form. This
    /// decides equality in the presented semigroup once the system is
    /// confluent.
    pub fn equal(&self, u: &[Letter], v: &[Letter]) -> bool {
        u == v || self.normal_form(u) == self.normal_form(v)
    }

    /// Returns `true` if every overlap of two rule left-hand sides resolves
    /// to a common normal form.
    pub fn is_confluent(&mut self) -> bool {
        if self.confluence_known {
            return self.confluent;
        }
        self.confluent = self.check_confluent();
        self.confluence_known = true;
        self.confluent
    }

    fn check_confluent(&self) -> bool {
        let active: Vec<&Rule> = self.rules.iter().filter(|r| r.active).collect();
        for rule1 in &active {
            for rule2 in &active {
                let n1 = rule1.lhs.len();
                for start in (0..n1).rev() {
                    // Longest common prefix of rule1.lhs[start..] and rule2.lhs.
                    let suffix = &rule1.lhs[start..];
                    let matched = suffix
                        .iter()
                        .zip(&rule2.lhs)
                        .take_while(|(a, b)| a == b)
                        .count();
                    if matched == suffix.len() || matched == rule2.lhs.len() {
                        let mut word1 = rule1.lhs[..start].to_vec();
                        word1.extend_from_slice(&rule2.rhs);
                        word1.extend_from_slice(&rule1.lhs[start + matched..]);
                        let mut word2 = rule1.rhs.clone();
                        word2.extend_from_slice(&rule2.lhs[matched..]);
                        if word1 != word2 {
                            self.rewrite_in_place(&mut word1);
                            self.rewrite_in_place(&mut word2);
                            if word1 != word2 {
                                return false;
                            }
                        }
                    }
                }
            }
        }
        true
    }

    /// Runs Knuth–Bendix completion until the system is confluent, the rule
    /// cap is reached, or the token fires. Resumable; a no-op when already
    /// confluent.
    pub fn knuth_bendix(&mut self, token: &StopToken) {
        if self.stack.is_empty() && self.is_confluent() {
            return;
        }
        self.clear_stack(token);

        let mut i = 0;
        while i < self.rules.len()
            && !token.should_stop()
            && self.nr_active_rules() < self.max_rules
        {
            if !self.rules[i].active {
                i += 1;
                continue;
            }
            let mut j = 0;
            while j <= i && self.rules[i].active {
                if self.rules[j].active {
                    self.overlap(i, j, token);
                    if i != j && self.rules[i].active && self.rules[j].active {
                        self.overlap(j, i, token);
                    }
                }
                j += 1;
            }
            i += 1;
        }
        let capped = self.nr_active_rules() >= self.max_rules;
        if !token.should_stop() && !capped {
            log::debug!(
                "knuth-bendix: finished with {} active rules ({} defined)",
                self.nr_active_rules(),
                self.total_rules
            );
            self.confluence_known = true;
            self.confluent = true;
        }
    }

    /// Resolves every proper overlap between a suffix of rule `u`'s side
    /// and a prefix of rule `v`'s.
    fn overlap(&mut self, u: usize, v: usize, token: &StopToken) {
        let max_len = self.rules[u].lhs.len().min(self.rules[v].lhs.len());
        for k in 1..max_len {
            if token.should_stop() || !self.rules[u].active || !self.rules[v].active {
                return;
            }
            let u_lhs = &self.rules[u].lhs;
            let v_lhs = &self.rules[v].lhs;
            if u_lhs[u_lhs.len() - k..] == v_lhs[..k] {
                // u.lhs = AB, v.lhs = BC: the word ABC reduces two ways.
                let mut word1 = u_lhs[..u_lhs.len() - k].to_vec();
                word1.extend_from_slice(&self.rules[v].rhs);
                let mut word2 = self.rules[u].rhs.clone();
                word2.extend_from_slice(&self.rules[v].lhs[k..]);
                self.push_stack(word1, word2, token);
            }
        }
    }

    fn push_stack(&mut self, lhs: Word, rhs: Word, token: &StopToken) {
        if lhs != rhs {
            self.stack.push((lhs, rhs));
            self.clear_stack(token);
        }
    }

    /// Reduces and orients pending pairs into rules, retiring any rule the
    /// new one makes reducible.
    fn clear_stack(&mut self, token: &StopToken) {
        while let Some((mut lhs, mut rhs)) = self.stack.pop() {
            if token.should_stop() {
                // Leave the pair for the next call.
                self.stack.push((lhs, rhs));
                return;
            }
            self.rewrite_in_place(&mut lhs);
            self.rewrite_in_place(&mut rhs);
            if lhs == rhs {
                continue;
            }
            if shortlex_gt(&rhs, &lhs) {
                std::mem::swap(&mut lhs, &mut rhs);
            }

            // Any rule whose left side contains the new one is redundant:
            // retire it and reconsider it as a pending pair.
            for idx in 0..self.rules.len() {
                if self.rules[idx].active && find_subword(&self.rules[idx].lhs, &lhs).is_some() {
                    self.rules[idx].active = false;
                    let rule = self.rules[idx].clone();
                    self.stack.push((rule.lhs, rule.rhs));
                }
            }

            self.rules.push(Rule {
                lhs: lhs.clone(),
                rhs,
                active: true,
            });
            self.total_rules += 1;
            self.confluence_known = false;

            // Keep right-hand sides reduced with respect to the new rule.
            for idx in 0..self.rules.len() - 1 {
                if self.rules[idx].active && find_subword(&self.rules[idx].rhs, &lhs).is_some() {
                    let mut reduced = self.rules[idx].rhs.clone();
                    self.rewrite_in_place(&mut reduced);
                    self.rules[idx].rhs = reduced;
                }
            }
        }
    }
}

/// An element of the semigroup presented by a confluent rewriting system:
/// a word in normal form.
///
/// Used to enumerate such a semigroup with Froidure–Pin; the product
/// concatenates and rewrites, with the concatenation buffer passed in as
/// scratch.
#[derive(Clone)]
pub struct RewriteElt {
    rws: Arc<RewritingSystem>,
    word: Word,
}

impl RewriteElt {
    /// The element represented by `word`, reduced to normal form.
    pub fn new(rws: Arc<RewritingSystem>, word: Word) -> Self {
        let word = rws.normal_form(&word);
        Self { rws, word }
    }

    /// The element of a single generator.
    pub fn from_letter(rws: Arc<RewritingSystem>, letter: Letter) -> Self {
        Self::new(rws, vec![letter])
    }

    /// The normal form of this element.
    pub fn word(&self) -> &Word {
        &self.word
    }

    /// The rewriting system this element reduces against.
    pub fn system(&self) -> &Arc<RewritingSystem> {
        &self.rws
    }
}

impl fmt::Debug for RewriteElt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RewriteElt({:?})", self.word)
    }
}

impl PartialEq for RewriteElt {
    fn eq(&self, other: &Self) -> bool {
        self.word == other.word
    }
}

impl Eq for RewriteElt {}

impl PartialOrd for RewriteElt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RewriteElt {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.word.len(), &self.word).cmp(&(other.word.len(), &other.word))
    }
}

impl Hash for RewriteElt {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.word.hash(state);
    }
}

impl Element for RewriteElt {
    type Scratch = Word;

    fn degree(&self) -> usize {
        0
    }

    /// Effectively infinite: once enumerated, products are deduced through
    /// the Cayley graphs instead of concatenating and rewriting.
    fn complexity(&self) -> usize {
        usize::MAX
    }

    fn identity(&self) -> Self {
        Self {
            rws: Arc::clone(&self.rws),
            word: Word::new(),
        }
    }

    fn product_in_place(&mut self, x: &Self, y: &Self, scratch: &mut Word) {
        scratch.clear();
        scratch.extend_from_slice(&x.word);
        scratch.extend_from_slice(&y.word);
        x.rws.rewrite_in_place(scratch);
        self.word.clone_from(scratch);
        self.rws = Arc::clone(&x.rws);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::froidure_pin::FroidurePin;

    fn completed(relations: &[Relation], alphabet: usize) -> RewritingSystem {
        let mut rws = RewritingSystem::new(alphabet);
        rws.add_rules(relations).unwrap();
        rws.knuth_bendix(&StopToken::new());
        assert!(rws.is_confluent());
        rws
    }

    #[test]
    fn completion_decides_equality() {
        // a^3 = a and a = b^2.
        let rws = completed(&[(vec![0, 0, 0], vec![0]), (vec![0], vec![1, 1])], 2);
        assert!(rws.equal(&[0, 0, 1], &[0, 0, 0, 0, 1]));
        assert!(!rws.equal(&[0, 0, 0], &[0, 0, 1]));
        assert!(rws.equal(&[0], &[1, 1]));
    }

    #[test]
    fn normal_forms_are_fixed_points() {
        let rws = completed(&[(vec![0, 0, 0], vec![0]), (vec![0], vec![1, 1])], 2);
        for word in [vec![0], vec![1], vec![0, 1, 0, 1], vec![1, 1, 1, 1, 1, 0]] {
            let nf = rws.normal_form(&word);
            assert_eq!(rws.normal_form(&nf), nf);
            assert!(rws.equal(&word, &nf));
        }
    }

    #[test]
    fn rules_are_shortlex_oriented() {
        let rws = completed(&[(vec![0, 0, 0], vec![0]), (vec![0], vec![1, 1])], 2);
        for (lhs, rhs) in rws.active_rules() {
            assert!(shortlex_gt(lhs, rhs));
        }
    }

    #[test]
    fn incomplete_system_is_detected() {
        let mut rws = RewritingSystem::new(2);
        // ab -> a and ba -> b: the overlap aba resolves two ways.
        rws.add_rule(vec![0, 1], vec![0]).unwrap();
        rws.add_rule(vec![1, 0], vec![1]).unwrap();
        assert!(!rws.is_confluent());
        rws.knuth_bendix(&StopToken::new());
        assert!(rws.is_confluent());
        // The completed system identifies aa with a and bb with b.
        assert!(rws.equal(&[0, 0], &[0]));
        assert!(rws.equal(&[1, 1], &[1]));
    }

    #[test]
    fn completion_is_idempotent_and_resumable() {
        let mut rws = RewritingSystem::new(2);
        rws.add_rules(&[(vec![0, 0, 0], vec![0]), (vec![0], vec![1, 1])])
            .unwrap();
        let stopped = StopToken::new();
        stopped.request_stop();
        rws.knuth_bendix(&stopped);
        // Resumes and completes with a fresh token.
        rws.knuth_bendix(&StopToken::new());
        assert!(rws.is_confluent());
        let nr = rws.nr_active_rules();
        rws.knuth_bendix(&StopToken::new());
        assert_eq!(rws.nr_active_rules(), nr);
    }

    #[test]
    fn rewrite_elements_enumerate_the_semigroup() {
        let rws = Arc::new(completed(
            &[(vec![0, 0, 0], vec![0]), (vec![0], vec![1, 1])],
            2,
        ));
        let gens = vec![
            RewriteElt::from_letter(Arc::clone(&rws), 0),
            RewriteElt::from_letter(Arc::clone(&rws), 1),
        ];
        let mut s = FroidurePin::new(gens).unwrap();
        assert_eq!(s.size().unwrap(), 5);
    }

    #[test]
    fn invalid_letters_are_rejected() {
        let mut rws = RewritingSystem::new(2);
        assert!(rws.add_rule(vec![0, 2], vec![0]).is_err());
        assert!(rws.add_rule(vec![], vec![0]).is_err());
    }
}
