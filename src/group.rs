//! Permutation groups.
//!
//! [`PermGroup`] is the user-facing facade over a stabilizer chain: order,
//! membership, element enumeration and random sampling all delegate to the
//! owned [`Bsgs`]. Named groups (symmetric, alternating, cyclic, dihedral)
//! install precomputed bases instead of running Schreier-Sims; direct
//! products splice shifted chains together, wreath products go through
//! chain construction.
//!
//! Structural decompositions live in [`decompose`], block systems in
//! [`block`].

use std::fmt;

use num::{BigUint, One};
use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::bsgs::{Bsgs, BsgsError, BsgsOptions};
use crate::orbit::Orbit;
use crate::perm::{PermError, PermSet, Permutation};
use crate::schreier::SchreierStructure;

pub mod block;
pub mod decompose;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    #[error("product over an empty list of groups")]
    EmptyProduct,

    #[error(transparent)]
    Bsgs(#[from] BsgsError),

    #[error(transparent)]
    Perm(#[from] PermError),
}

/// A permutation group, represented by a stabilizer chain and a cached
/// order. Groups are value types; no element listing is ever stored.
#[derive(Debug, Clone)]
pub struct PermGroup {
    bsgs: Bsgs,
    order: BigUint,
}

impl PermGroup {
    // --------------------------------------------------------------------------------------------
    // Construction
    // --------------------------------------------------------------------------------------------

    pub fn trivial(degree: usize) -> Self {
        Self::from_bsgs(Bsgs::trivial(degree))
    }

    /// The group generated by `generators`, constructed with default
    /// options (deterministic Schreier-Sims, explicit transversals).
    pub fn new(
        degree: usize,
        generators: impl IntoIterator<Item = Permutation>,
    ) -> Result<Self, GroupError> {
        Self::with_options(degree, generators, &BsgsOptions::default())
    }

    pub fn with_options(
        degree: usize,
        generators: impl IntoIterator<Item = Permutation>,
        options: &BsgsOptions,
    ) -> Result<Self, GroupError> {
        let generators = PermSet::from_perms(degree, generators)?;
        Ok(Self::from_bsgs(Bsgs::new(degree, generators, options)?))
    }

    pub fn from_bsgs(bsgs: Bsgs) -> Self {
        let order = bsgs.order();
        PermGroup { bsgs, order }
    }

    // --------------------------------------------------------------------------------------------
    // Named Groups
    // --------------------------------------------------------------------------------------------

    /// The symmetric group on `0..degree`, installed without running
    /// Schreier-Sims: the base is `0..degree-1` and the strong generators
    /// are the adjacent transpositions.
    pub fn symmetric(degree: usize) -> Self {
        if degree <= 1 {
            return Self::trivial(degree);
        }
        let gens = (0..degree - 1)
            .map(|i| Permutation::from_cycles(&[vec![i, i + 1]], degree))
            .collect::<Result<Vec<_>, _>>()
            .expect("adjacent transpositions are disjoint cycles");
        let strong_gens =
            PermSet::from_perms(degree, gens).expect("generator degrees match");
        Self::from_bsgs(Bsgs::from_parts(
            degree,
            (0..degree - 1).collect(),
            strong_gens,
            Default::default(),
        ))
    }

    /// The alternating group on `0..degree`; strong generators are the
    /// consecutive 3-cycles.
    pub fn alternating(degree: usize) -> Self {
        if degree <= 2 {
            return Self::trivial(degree);
        }
        let gens = (0..degree - 2)
            .map(|i| Permutation::from_cycles(&[vec![i, i + 1, i + 2]], degree))
            .collect::<Result<Vec<_>, _>>()
            .expect("consecutive 3-cycles are single cycles");
        let strong_gens =
            PermSet::from_perms(degree, gens).expect("generator degrees match");
        Self::from_bsgs(Bsgs::from_parts(
            degree,
            (0..degree - 2).collect(),
            strong_gens,
            Default::default(),
        ))
    }

    /// The cyclic group generated by the full rotation of `0..degree`.
    pub fn cyclic(degree: usize) -> Self {
        if degree <= 1 {
            return Self::trivial(degree);
        }
        let rotation = Permutation::from_cycles(&[(0..degree).collect()], degree)
            .expect("rotation is a single cycle");
        let strong_gens =
            PermSet::from_perms(degree, vec![rotation]).expect("generator degrees match");
        Self::from_bsgs(Bsgs::from_parts(
            degree,
            vec![0],
            strong_gens,
            Default::default(),
        ))
    }

    /// The dihedral group of order `2 * degree` acting on `degree` points
    /// (with the usual small-degree special cases: `degree == 1` gives the
    /// flip on two points, `degree == 2` the Klein four-group on four).
    pub fn dihedral(degree: usize) -> Self {
        match degree {
            0 => Self::trivial(0),
            1 => Self::symmetric(2),
            2 => {
                let gens = vec![
                    Permutation::from_cycles(&[vec![0, 1]], 4).expect("transposition"),
                    Permutation::from_cycles(&[vec![2, 3]], 4).expect("transposition"),
                ];
                let strong_gens =
                    PermSet::from_perms(4, gens).expect("generator degrees match");
                Self::from_bsgs(Bsgs::from_parts(4, vec![0, 2], strong_gens, Default::default()))
            }
            _ => {
                let rotation = Permutation::from_cycles(&[(0..degree).collect()], degree)
                    .expect("rotation is a single cycle");
                let reflection = Permutation::from_map(
                    (0..degree).map(|i| (degree - i) % degree).collect(),
                );
                let strong_gens = PermSet::from_perms(degree, vec![rotation, reflection])
                    .expect("generator degrees match");
                Self::from_bsgs(Bsgs::from_parts(
                    degree,
                    vec![0, 1],
                    strong_gens,
                    Default::default(),
                ))
            }
        }
    }

    // --------------------------------------------------------------------------------------------
    // Products
    // --------------------------------------------------------------------------------------------

    /// The direct product, acting on the disjoint union of the factors'
    /// domains. The shifted chains of the factors splice into a valid chain
    /// for the product, so no Schreier-Sims run is needed.
    pub fn direct_product(groups: &[PermGroup]) -> Result<Self, GroupError> {
        if groups.is_empty() {
            return Err(GroupError::EmptyProduct);
        }

        let total_degree: usize = groups.iter().map(PermGroup::degree).sum();

        let mut base = Vec::new();
        let mut strong_gens = PermSet::new(total_degree);
        let mut shift = 0;
        for group in groups {
            base.extend(group.bsgs.base().iter().map(|&b| b + shift));
            for g in group.generators() {
                strong_gens.insert(g.shifted(shift))?;
            }
            shift += group.degree();
        }

        Ok(Self::from_bsgs(Bsgs::from_parts(
            total_degree,
            base,
            strong_gens,
            Default::default(),
        )))
    }

    /// The wreath product `h wr k`: `deg(k)` copies of `h` acting inside
    /// consecutive blocks, permuted blockwise by `k`. The order is
    /// `|h|^deg(k) * |k|`.
    pub fn wreath_product(
        h: &PermGroup,
        k: &PermGroup,
        options: &BsgsOptions,
    ) -> Result<Self, GroupError> {
        let m = h.degree();
        let d = k.degree();
        let degree = m * d;

        let mut generators = Vec::new();
        for block in 0..d {
            for g in h.generators() {
                generators.push(g.shifted(block * m).extended(degree));
            }
        }
        for g in k.generators() {
            let map = (0..degree)
                .map(|x| g.image(x / m) * m + x % m)
                .collect::<Vec<_>>();
            generators.push(Permutation::from_map(map));
        }

        debug!(m, d, "constructing wreath product");
        Self::with_options(degree, generators, options)
    }

    // --------------------------------------------------------------------------------------------
    // Queries
    // --------------------------------------------------------------------------------------------

    pub fn degree(&self) -> usize {
        self.bsgs.degree()
    }

    pub fn order(&self) -> &BigUint {
        &self.order
    }

    /// A generating set: the strong generators of the underlying chain.
    pub fn generators(&self) -> &PermSet {
        self.bsgs.strong_generators()
    }

    pub fn bsgs(&self) -> &Bsgs {
        &self.bsgs
    }

    pub fn is_trivial(&self) -> bool {
        self.order.is_one()
    }

    pub fn contains_element(&self, perm: &Permutation) -> bool {
        self.bsgs.contains(perm)
    }

    pub fn smallest_moved_point(&self) -> Option<usize> {
        self.generators().smallest_moved_point()
    }

    pub fn largest_moved_point(&self) -> Option<usize> {
        self.generators().largest_moved_point()
    }

    /// Transitivity on the moved range: the orbit of the smallest moved
    /// point must cover every point up to the largest moved one.
    pub fn is_transitive(&self) -> bool {
        let (Some(lo), Some(hi)) = (self.smallest_moved_point(), self.largest_moved_point())
        else {
            return self.degree() <= 1;
        };
        let orbit = Orbit::generate(lo, self.generators());
        (lo..=hi).all(|x| orbit.contains(x))
    }

    /// A uniformly distributed group element: one transversal factor per
    /// level, multiplied. Not cryptographically secure.
    pub fn random_element(&self, rng: &mut impl Rng) -> Permutation {
        let mut element = Permutation::id(self.degree());
        for level in 0..self.bsgs.num_levels() {
            let tv = self.bsgs.transversal(level);
            let idx = rng.gen_range(0..tv.orbit().len());
            let point = *tv.orbit().get_index(idx).expect("index within orbit");
            let u = tv.transversal(point).expect("orbit point has a representative");
            element = element.compose(&u);
        }
        element
    }

    /// Iterates over every group element exactly once, in a stable order.
    ///
    /// The iterator snapshots the transversal tables: mutating the group
    /// afterwards does not affect an iteration already in progress.
    pub fn iter(&self) -> Elements {
        Elements::new(self)
    }

    // --------------------------------------------------------------------------------------------
    // Structure Predicates
    // --------------------------------------------------------------------------------------------

    /// Whether this group is the full symmetric group on its degree.
    pub fn is_symmetric(&self) -> bool {
        self.matches_symmetric(0, self.degree())
    }

    /// Like [`is_symmetric`](Self::is_symmetric), but the acted-on set may
    /// be any contiguous range `k..k+m`.
    pub fn is_shifted_symmetric(&self) -> bool {
        let Some((lo, hi)) = self.moved_range() else {
            return false;
        };
        self.matches_symmetric(lo, hi - lo + 1)
    }

    /// Whether this group is the alternating group on its degree.
    pub fn is_alternating(&self) -> bool {
        self.matches_alternating(0, self.degree())
    }

    pub fn is_shifted_alternating(&self) -> bool {
        let Some((lo, hi)) = self.moved_range() else {
            return false;
        };
        self.matches_alternating(lo, hi - lo + 1)
    }

    fn moved_range(&self) -> Option<(usize, usize)> {
        Some((self.smallest_moved_point()?, self.largest_moved_point()?))
    }

    /// Order match plus membership of the canonical generators of
    /// `Sym({shift..shift+n})`.
    fn matches_symmetric(&self, shift: usize, n: usize) -> bool {
        if n < 2 {
            return self.is_trivial();
        }
        if self.order != factorial(n) {
            return false;
        }
        let degree = shift + n;
        let transposition = Permutation::from_cycles(&[vec![shift, shift + 1]], degree)
            .expect("two distinct points");
        let cycle = Permutation::from_cycles(&[(shift..shift + n).collect()], degree)
            .expect("single cycle");
        self.contains_element(&transposition) && self.contains_element(&cycle)
    }

    fn matches_alternating(&self, shift: usize, n: usize) -> bool {
        if n < 3 {
            return self.is_trivial();
        }
        if self.order != factorial(n) / BigUint::from(2u32) {
            return false;
        }
        let degree = shift + n;
        (shift..shift + n - 2).all(|i| {
            let cycle = Permutation::from_cycles(&[vec![i, i + 1, i + 2]], degree)
                .expect("three distinct points");
            self.contains_element(&cycle)
        })
    }
}

/// Groups compare equal when they contain the same elements; degrees may
/// differ by fixed points.
impl PartialEq for PermGroup {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
            && other
                .generators()
                .iter()
                .all(|g| self.contains_element(g))
    }
}

impl Eq for PermGroup {}

/// The serialization format: `degree:<d>,order:<o>,gens:[...]` with
/// 1-indexed cycles. [`crate::parse::parse_group`] reads it back.
impl fmt::Display for PermGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "degree:{},order:{},gens:[", self.degree(), self.order)?;
        for (i, g) in self.generators().iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", g.to_gap())?;
        }
        write!(f, "]")
    }
}

pub fn factorial(n: usize) -> BigUint {
    let mut result = BigUint::one();
    for i in 2..=n {
        result *= BigUint::from(i);
    }
    result
}

/// Mixed-radix enumeration over the transversal tables: each state vector
/// picks one coset representative per level, and the counter carries
/// low-to-high, so every element is produced exactly once.
pub struct Elements {
    degree: usize,
    transversals: Vec<Vec<Permutation>>,
    state: Vec<usize>,
    done: bool,
}

impl Elements {
    fn new(group: &PermGroup) -> Self {
        let transversals: Vec<Vec<Permutation>> = (0..group.bsgs.num_levels())
            .map(|level| group.bsgs.transversal_elements(level))
            .collect();
        let state = vec![0; transversals.len()];
        Elements {
            degree: group.degree(),
            transversals,
            state,
            done: false,
        }
    }
}

impl Iterator for Elements {
    type Item = Permutation;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut element = Permutation::id(self.degree);
        for (level, &idx) in self.state.iter().enumerate() {
            element = element.compose(&self.transversals[level][idx]);
        }

        // low-to-high carry
        let mut level = 0;
        loop {
            if level == self.state.len() {
                self.done = true;
                break;
            }
            self.state[level] += 1;
            if self.state[level] < self.transversals[level].len() {
                break;
            }
            self.state[level] = 0;
            level += 1;
        }

        Some(element)
    }
}

impl<'a> IntoIterator for &'a PermGroup {
    type Item = Permutation;
    type IntoIter = Elements;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashSet;
    use rand::{rngs::SmallRng, SeedableRng};

    fn cycles(degree: usize, spec: &[&[usize]]) -> Permutation {
        let cycles: Vec<Vec<usize>> = spec.iter().map(|c| c.to_vec()).collect();
        Permutation::from_cycles(&cycles, degree).unwrap()
    }

    #[test]
    fn test_s3_scenario() {
        let group = PermGroup::new(3, vec![cycles(3, &[&[0, 1]]), cycles(3, &[&[0, 1, 2]])])
            .unwrap();

        assert_eq!(group.order(), &BigUint::from(6u32));
        assert!(group.is_symmetric());
        assert!(!group.is_alternating());
        assert!(group.is_transitive());

        let elements: AHashSet<Permutation> = group.iter().collect();
        assert_eq!(elements.len(), 6);
    }

    #[test]
    fn test_a4_scenario() {
        let group = PermGroup::new(4, vec![cycles(4, &[&[0, 1, 2]]), cycles(4, &[&[1, 2, 3]])])
            .unwrap();

        assert_eq!(group.order(), &BigUint::from(12u32));
        assert!(group.is_alternating());
        assert!(!group.is_symmetric());
    }

    #[test]
    fn test_enumeration_matches_order() {
        for group in [
            PermGroup::symmetric(4),
            PermGroup::alternating(4),
            PermGroup::dihedral(5),
            PermGroup::cyclic(7),
        ] {
            let seen: AHashSet<Permutation> = group.iter().collect();
            assert_eq!(BigUint::from(seen.len()), *group.order());
            for element in &seen {
                assert!(group.contains_element(element));
            }
        }
    }

    #[test]
    fn test_named_group_orders() {
        assert_eq!(PermGroup::symmetric(5).order(), &BigUint::from(120u32));
        assert_eq!(PermGroup::alternating(5).order(), &BigUint::from(60u32));
        assert_eq!(PermGroup::cyclic(12).order(), &BigUint::from(12u32));
        assert_eq!(PermGroup::dihedral(12).order(), &BigUint::from(24u32));
        assert_eq!(PermGroup::dihedral(1).order(), &BigUint::from(2u32));
        assert_eq!(PermGroup::dihedral(2).order(), &BigUint::from(4u32));
        assert!(PermGroup::symmetric(1).is_trivial());

        // 20! overflows u64; the order stays exact
        assert_eq!(
            PermGroup::symmetric(20).order().to_string(),
            "2432902008176640000"
        );
        assert_eq!(
            PermGroup::symmetric(21).order().to_string(),
            "51090942171709440000"
        );
    }

    #[test]
    fn test_membership() {
        let group = PermGroup::alternating(4);
        assert!(group.contains_element(&cycles(4, &[&[0, 1, 2]])));
        assert!(group.contains_element(&Permutation::id(4)));
        assert!(!group.contains_element(&cycles(4, &[&[0, 1]])));
        // a permutation moving points outside the domain is never a member
        assert!(!group.contains_element(&cycles(6, &[&[0, 5]])));
    }

    #[test]
    fn test_direct_product() {
        let product =
            PermGroup::direct_product(&[PermGroup::symmetric(3), PermGroup::symmetric(2)])
                .unwrap();
        assert_eq!(product.degree(), 5);
        assert_eq!(product.order(), &BigUint::from(12u32));

        // factors act on disjoint ranges
        assert!(product.contains_element(&cycles(5, &[&[0, 1, 2]])));
        assert!(product.contains_element(&cycles(5, &[&[3, 4]])));
        assert!(!product.contains_element(&cycles(5, &[&[2, 3]])));

        assert!(PermGroup::direct_product(&[]).is_err());
    }

    #[test]
    fn test_wreath_product() {
        let wreath = PermGroup::wreath_product(
            &PermGroup::symmetric(3),
            &PermGroup::symmetric(2),
            &BsgsOptions::default(),
        )
        .unwrap();
        assert_eq!(wreath.degree(), 6);
        // |S3|^2 * |S2| = 72
        assert_eq!(wreath.order(), &BigUint::from(72u32));

        // block copies of S3 and the block swap are members
        assert!(wreath.contains_element(&cycles(6, &[&[0, 1, 2]])));
        assert!(wreath.contains_element(&cycles(6, &[&[3, 4]])));
        assert!(wreath.contains_element(&cycles(6, &[&[0, 3], &[1, 4], &[2, 5]])));
        assert!(!wreath.contains_element(&cycles(6, &[&[2, 3]])));
    }

    #[test]
    fn test_shifted_predicates() {
        let shifted = PermGroup::new(
            7,
            vec![cycles(7, &[&[2, 3]]), cycles(7, &[&[2, 3, 4, 5]])],
        )
        .unwrap();
        assert!(shifted.is_shifted_symmetric());
        assert!(!shifted.is_symmetric());

        let shifted_alt = PermGroup::new(
            6,
            vec![cycles(6, &[&[1, 2, 3]]), cycles(6, &[&[2, 3, 4]])],
        )
        .unwrap();
        assert!(shifted_alt.is_shifted_alternating());
        assert!(!shifted_alt.is_alternating());
    }

    #[test]
    fn test_random_elements_are_members() {
        let group = PermGroup::new(
            8,
            vec![
                cycles(8, &[&[0, 1, 2, 3], &[4, 5, 6, 7]]),
                cycles(8, &[&[0, 4], &[1, 5], &[2, 6], &[3, 7]]),
            ],
        )
        .unwrap();

        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..50 {
            let g = group.random_element(&mut rng);
            assert!(group.contains_element(&g));
        }
    }

    #[test]
    fn test_group_equality() {
        let a = PermGroup::symmetric(3);
        let b = PermGroup::new(3, vec![cycles(3, &[&[0, 1]]), cycles(3, &[&[1, 2]])]).unwrap();
        assert_eq!(a, b);

        // padding with fixed points does not change the group
        let c = PermGroup::new(5, vec![cycles(5, &[&[0, 1]]), cycles(5, &[&[1, 2]])]).unwrap();
        assert_eq!(a, c);

        assert_ne!(a, PermGroup::alternating(3));
    }

    #[test]
    fn test_transitivity() {
        assert!(PermGroup::cyclic(5).is_transitive());
        assert!(PermGroup::trivial(1).is_transitive());

        let intransitive =
            PermGroup::new(4, vec![cycles(4, &[&[0, 1]]), cycles(4, &[&[2, 3]])]).unwrap();
        assert!(!intransitive.is_transitive());
    }

    #[test]
    fn test_enumeration_is_stable() {
        let group = PermGroup::symmetric(4);
        let first: Vec<Permutation> = group.iter().collect();
        let second: Vec<Permutation> = group.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 24);
    }
}
