//! Cayley: computing with finitely generated semigroups, monoids, and
//! congruences on them.
//!
//! This crate implements the two classical workhorses of computational
//! semigroup theory and the machinery that lets them cooperate:
//! - The Froidure–Pin algorithm ([`FroidurePin`]) enumerates a finite
//!   semigroup from generators, building its left and right Cayley graphs,
//!   shortest-word factorisations, defining rules, and idempotents.
//! - The Todd–Coxeter algorithm ([`ToddCoxeter`]) enumerates the classes of
//!   a one- or two-sided congruence, given either a presentation or the
//!   Cayley graph of an enumerated semigroup.
//! - A [`Congruence`] races Todd–Coxeter against Knuth–Bendix based methods
//!   ([`RewritingSystem`]) in parallel threads and answers queries with
//!   whichever finishes first; losers are cancelled cooperatively through
//!   [`StopToken`]s and keep their partial state.
//!
//! Congruence computations consume a semigroup (its size, Cayley graphs,
//! and rules) and can conversely produce one: the quotient by a two-sided
//! congruence is materialised as a fresh [`FroidurePin`] over lightweight
//! class elements.
//!
//! # Module structure
//!
//! - [`word`]: letters, words, relations, and the `UNDEFINED` sentinel
//! - [`element`]: the element contract and the built-in algebras
//! - [`table`]: the rectangular index tables backing every graph
//! - [`froidure_pin`]: the Froidure–Pin enumerator
//! - [`todd_coxeter`]: the Todd–Coxeter coset enumerator
//! - [`rewrite`]: Knuth–Bendix completion of string rewriting systems
//! - [`runner`]: the runner lifecycle and the race harness
//! - [`congruence`]: the congruence driver and its method set
//! - [`quotient`]: congruence classes as elements of quotient semigroups
//! - [`error`]: the crate-wide error type
//!
//! # Example
//!
//! ```
//! use cayley::prelude::*;
//!
//! // The semigroup presented by a^3 = a and a = b^2 has five elements.
//! let presentation = Presentation::new(
//!     2,
//!     vec![(vec![0, 0, 0], vec![0]), (vec![0], vec![1, 1])],
//! )?;
//! let mut cong: Congruence = Congruence::new(CongruenceKind::TwoSided, presentation)?;
//! assert_eq!(cong.nr_classes()?, 5);
//! assert!(cong.contains(&[0, 0, 1], &[0, 0, 0, 0, 1])?);
//! # Ok::<(), cayley::Error>(())
//! ```

pub mod congruence;
pub mod element;
pub mod error;
pub mod froidure_pin;
pub mod quotient;
pub mod rewrite;
pub mod runner;
pub mod table;
pub mod todd_coxeter;
pub mod word;

pub use congruence::{
    Congruence, CongruenceKind, CongruenceMethod, Kbfp, Kbp, PairOrbit, Policy, Presentation,
};
pub use element::{BooleanMat, Element, Elt, EltKind, PartialPerm, Permutation, Transformation};
pub use error::Error;
pub use froidure_pin::FroidurePin;
pub use quotient::ClassElt;
pub use rewrite::{RewriteElt, RewritingSystem};
pub use runner::{Race, Runner, StopToken};
pub use table::Table;
pub use todd_coxeter::ToddCoxeter;
pub use word::{Letter, Relation, Word, UNDEFINED};

/// Everything needed for typical use.
pub mod prelude {
    pub use crate::congruence::{
        Congruence, CongruenceKind, CongruenceMethod, Policy, Presentation,
    };
    pub use crate::element::{BooleanMat, Element, Elt, PartialPerm, Permutation, Transformation};
    pub use crate::error::Error;
    pub use crate::froidure_pin::FroidurePin;
    pub use crate::runner::{Race, Runner, StopToken};
    pub use crate::todd_coxeter::ToddCoxeter;
    pub use crate::word::{Letter, Relation, Word, UNDEFINED};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    fn fp_presentation() -> Presentation {
        // a^3 = a, a = b^2.
        Presentation::new(2, vec![(vec![0, 0, 0], vec![0]), (vec![0], vec![1, 1])]).unwrap()
    }

    fn transf(images: &[u32]) -> Elt {
        Transformation::new(images.to_vec()).unwrap().into()
    }

    fn example_semigroup() -> FroidurePin<Elt> {
        FroidurePin::new(vec![transf(&[1, 3, 4, 2, 3]), transf(&[3, 2, 1, 3, 3])]).unwrap()
    }

    /// Words of the pair identifying [3,4,4,4,4] with [3,1,3,3,3].
    fn example_pair(s: &mut FroidurePin<Elt>) -> (Word, Word) {
        let p1 = s.position(&transf(&[3, 4, 4, 4, 4])).unwrap().unwrap();
        let p2 = s.position(&transf(&[3, 1, 3, 3, 3])).unwrap().unwrap();
        (
            s.minimal_factorisation(p1).unwrap(),
            s.minimal_factorisation(p2).unwrap(),
        )
    }

    #[test]
    fn two_sided_congruence_on_a_presentation() {
        let mut cong: Congruence =
            Congruence::new(CongruenceKind::TwoSided, fp_presentation()).unwrap();
        assert_eq!(cong.nr_classes().unwrap(), 5);
        assert_eq!(
            cong.word_to_class_index(&[0, 0, 1]).unwrap(),
            cong.word_to_class_index(&[0, 0, 0, 0, 1]).unwrap()
        );
        assert_ne!(
            cong.word_to_class_index(&[0, 0, 0]).unwrap(),
            cong.word_to_class_index(&[0, 0, 1]).unwrap()
        );
    }

    #[test]
    fn left_congruence_on_the_same_presentation() {
        let mut cong: Congruence =
            Congruence::new(CongruenceKind::Left, fp_presentation()).unwrap();
        assert_eq!(cong.nr_classes().unwrap(), 5);
        assert_eq!(
            cong.word_to_class_index(&[0, 1, 1, 0, 0, 1]).unwrap(),
            cong.word_to_class_index(&[0, 0, 1]).unwrap()
        );
    }

    #[test]
    fn transformation_semigroup_and_its_congruence() {
        let mut s = example_semigroup();
        assert_eq!(s.size().unwrap(), 88);
        assert_eq!(s.nr_rules().unwrap(), 18);
        let (w1, w2) = example_pair(&mut s);
        let mut cong = Congruence::from_semigroup(CongruenceKind::TwoSided, &mut s).unwrap();
        cong.add_pair(w1, w2).unwrap();
        assert_eq!(cong.nr_classes().unwrap(), 21);
    }

    #[test]
    fn right_congruence_on_the_same_semigroup() {
        let mut s = example_semigroup();
        let (w1, w2) = example_pair(&mut s);
        let mut cong = Congruence::from_semigroup(CongruenceKind::Right, &mut s).unwrap();
        cong.add_pair(w1, w2).unwrap();
        assert_eq!(cong.nr_classes().unwrap(), 72);
    }

    #[test]
    fn congruence_on_an_infinite_semigroup_can_converge() {
        // The semigroup is infinite, but the congruence generated by a = b
        // on top of these relations has finitely many classes.
        let presentation = Presentation::new(
            3,
            vec![
                (vec![0, 1], vec![1, 0]),
                (vec![0, 2], vec![2, 2]),
                (vec![0, 2], vec![0]),
                (vec![2, 2], vec![0]),
                (vec![1, 2], vec![1, 2]),
                (vec![1, 2], vec![2, 2]),
                (vec![1, 2, 2], vec![1]),
                (vec![1, 2], vec![1]),
                (vec![2, 2], vec![1]),
            ],
        )
        .unwrap();
        let mut cong: Congruence =
            Congruence::new(CongruenceKind::TwoSided, presentation).unwrap();
        cong.add_pair(vec![0], vec![1]).unwrap();
        assert!(!cong.is_obviously_infinite());
        assert_eq!(
            cong.word_to_class_index(&[0]).unwrap(),
            cong.word_to_class_index(&[0, 1]).unwrap()
        );
    }

    #[test]
    fn bicyclic_like_presentation_with_a_torsion_pair() {
        // ab = b, ba = b, aa = a, ac = c, ca = c, bc = a, plus b^3 = a.
        let presentation = Presentation::new(
            3,
            vec![
                (vec![0, 1], vec![1]),
                (vec![1, 0], vec![1]),
                (vec![0, 0], vec![0]),
                (vec![0, 2], vec![2]),
                (vec![2, 0], vec![2]),
                (vec![1, 2], vec![0]),
            ],
        )
        .unwrap();
        let mut cong: Congruence =
            Congruence::new(CongruenceKind::TwoSided, presentation).unwrap();
        cong.add_pair(vec![1, 1, 1], vec![0]).unwrap();
        assert_eq!(cong.nr_classes().unwrap(), 3);
    }

    #[test]
    fn every_method_agrees_on_the_class_count() {
        // Whatever wins the race must agree with a forced single method.
        let mut racing: Congruence =
            Congruence::new(CongruenceKind::TwoSided, fp_presentation()).unwrap();
        let racing_classes = racing.nr_classes().unwrap();

        let mut forced: Congruence =
            Congruence::new(CongruenceKind::TwoSided, fp_presentation()).unwrap();
        forced.set_policy(Policy::UseRelations);
        assert_eq!(forced.nr_classes().unwrap(), racing_classes);
    }

    #[test]
    fn quotient_semigroup_of_a_semigroup_congruence() {
        let mut s = example_semigroup();
        let (w1, w2) = example_pair(&mut s);
        let mut cong = Congruence::from_semigroup(CongruenceKind::TwoSided, &mut s).unwrap();
        cong.add_pair(w1, w2).unwrap();
        let classes = cong.nr_classes().unwrap();
        let mut quotient = cong.quotient_semigroup().unwrap();
        assert_eq!(quotient.size().unwrap() as u64, classes);
    }

    #[test]
    fn class_indices_round_trip() {
        let mut s = example_semigroup();
        let (w1, w2) = example_pair(&mut s);
        let mut cong = Congruence::from_semigroup(CongruenceKind::TwoSided, &mut s).unwrap();
        cong.add_pair(w1, w2).unwrap();
        let n = cong.nr_classes().unwrap() as u32;
        for class in 0..n {
            let word = cong.class_index_to_word(class).unwrap();
            assert_eq!(cong.word_to_class_index(&word).unwrap(), class);
        }
    }

    #[test]
    fn words_are_validated_at_the_boundary() {
        let mut cong: Congruence =
            Congruence::new(CongruenceKind::TwoSided, fp_presentation()).unwrap();
        assert!(matches!(
            cong.word_to_class_index(&[7]),
            Err(Error::InvalidWord { .. })
        ));
        assert!(matches!(
            cong.add_pair(vec![0], vec![9]),
            Err(Error::InvalidWord { .. })
        ));
    }
}
