//! Base and strong generating sets.
//!
//! A [`Bsgs`] holds an ordered base, a strong generating set and one
//! transversal per base point, so that level `i`'s generators span the
//! pointwise stabilizer of the base prefix `base[..i]`. Construction runs
//! either deterministic Schreier-Sims or a Monte-Carlo variant driven by
//! product replacement; both leave the same post-conditions: a
//! non-redundant base, level-closed strong generators, and an order equal
//! to the product of the fundamental orbit sizes.

use num::{BigUint, One};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, trace};

use crate::perm::{PermError, PermSet, Permutation};
use crate::schreier::queue::SchreierGeneratorQueue;
use crate::schreier::{SchreierStructure, Transversal, TransversalKind};

/// Default seed for the Monte-Carlo construction; stable within a process
/// so repeated runs agree.
pub const DEFAULT_SEED: u64 = 0x5eed_ca11;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BsgsError {
    #[error("randomized construction failed verification against the expected order")]
    ProbabilisticIncomplete,

    #[error(transparent)]
    Perm(#[from] PermError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Construction {
    #[default]
    Deterministic,
    MonteCarlo,
}

/// Knobs for chain construction. `confidence` is the number of consecutive
/// identity sifts that ends the Monte-Carlo phase; `expected_order` is an
/// optional oracle that both stops the random phase early and backs the
/// `guaranteed` verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BsgsOptions {
    pub construction: Construction,
    pub transversals: TransversalKind,
    pub confidence: Option<usize>,
    pub guaranteed: bool,
    pub seed: Option<u64>,
    pub expected_order: Option<BigUint>,
}

impl BsgsOptions {
    pub fn deterministic() -> Self {
        Self::default()
    }

    pub fn monte_carlo() -> Self {
        BsgsOptions {
            construction: Construction::MonteCarlo,
            ..Self::default()
        }
    }

    fn confidence(&self) -> usize {
        self.confidence.unwrap_or(20)
    }
}

/// Base, strong generating set and per-level transversals.
#[derive(Debug, Clone)]
pub struct Bsgs {
    degree: usize,
    base: Vec<usize>,
    strong_gens: PermSet,
    transversals: Vec<Transversal>,
    kind: TransversalKind,
}

impl Bsgs {
    /// The chain of the trivial group of the given degree.
    pub fn trivial(degree: usize) -> Self {
        Bsgs {
            degree,
            base: Vec::new(),
            strong_gens: PermSet::new(degree),
            transversals: Vec::new(),
            kind: TransversalKind::default(),
        }
    }

    /// Builds a chain for the group generated by `generators`.
    pub fn new(
        degree: usize,
        generators: PermSet,
        options: &BsgsOptions,
    ) -> Result<Self, BsgsError> {
        let mut bsgs = Self::trivial(degree);
        bsgs.kind = options.transversals;

        let mut generators = generators;
        generators.make_unique();
        if generators.is_empty() {
            return Ok(bsgs);
        }

        debug!(
            degree,
            generators = generators.len(),
            construction = ?options.construction,
            "constructing stabilizer chain"
        );

        let mut level_gens = bsgs.seed_chain(generators);
        match options.construction {
            Construction::Deterministic => bsgs.complete_deterministically(&mut level_gens),
            Construction::MonteCarlo => {
                bsgs.complete_randomly(&mut level_gens, options);
                if options.guaranteed {
                    bsgs.complete_deterministically(&mut level_gens);
                    if let Some(expected) = &options.expected_order {
                        if &bsgs.order() != expected {
                            return Err(BsgsError::ProbabilisticIncomplete);
                        }
                    }
                }
            }
        }

        bsgs.finalize();
        debug!(order = %bsgs.order(), base_len = bsgs.base.len(), "chain complete");
        Ok(bsgs)
    }

    /// Installs a chain from a known base and strong generating set without
    /// running Schreier-Sims. The caller asserts that `strong_gens`
    /// restricted to each level generates that level's stabilizer.
    pub(crate) fn from_parts(
        degree: usize,
        base: Vec<usize>,
        strong_gens: PermSet,
        kind: TransversalKind,
    ) -> Self {
        let mut bsgs = Bsgs {
            degree,
            base,
            strong_gens,
            transversals: Vec::new(),
            kind,
        };
        for i in 0..bsgs.base.len() {
            let mut tv = Transversal::new(kind, degree, bsgs.base[i]);
            tv.extend(&bsgs.level_generators(i));
            bsgs.transversals.push(tv);
        }
        bsgs.finalize();
        bsgs
    }

    // --------------------------------------------------------------------------------------------
    // Accessors
    // --------------------------------------------------------------------------------------------

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn base(&self) -> &[usize] {
        &self.base
    }

    pub fn strong_generators(&self) -> &PermSet {
        &self.strong_gens
    }

    pub fn num_levels(&self) -> usize {
        self.base.len()
    }

    pub fn transversal(&self, level: usize) -> &Transversal {
        &self.transversals[level]
    }

    /// `prod_i |orbit_i|`, exact.
    pub fn order(&self) -> BigUint {
        let mut order = BigUint::one();
        for tv in &self.transversals {
            order *= BigUint::from(tv.orbit().len());
        }
        order
    }

    /// The coset representatives of one level, in orbit insertion order.
    pub fn transversal_elements(&self, level: usize) -> Vec<Permutation> {
        let tv = &self.transversals[level];
        tv.orbit()
            .iter()
            .map(|&x| tv.transversal(x).expect("orbit point has a representative"))
            .collect()
    }

    /// The strong generators fixing `base[..level]` pointwise.
    pub fn level_generators(&self, level: usize) -> PermSet {
        PermSet::from_perms(
            self.degree,
            self.strong_gens
                .iter()
                .filter(|g| self.base[..level].iter().all(|&b| g.image(b) == b))
                .cloned(),
        )
        .expect("strong generators share the chain degree")
    }

    // --------------------------------------------------------------------------------------------
    // Sifting
    // --------------------------------------------------------------------------------------------

    /// Decomposes `h` along the chain. Returns the residue and the level it
    /// stopped at; the residue is the identity exactly when `h` is a group
    /// member (and then the level equals the base length).
    pub fn strip(&self, h: &Permutation) -> (Permutation, usize) {
        self.strip_from(0, h)
    }

    fn strip_from(&self, start: usize, h: &Permutation) -> (Permutation, usize) {
        let mut h = h.extended(self.degree);
        for i in start..self.base.len() {
            let img = h.image(self.base[i]);
            match self.transversals[i].transversal(img) {
                None => return (h, i),
                Some(u) => h = u.inverse().compose(&h),
            }
        }
        let end = self.base.len();
        (h, end)
    }

    pub fn contains(&self, h: &Permutation) -> bool {
        let (residue, level) = self.strip(h);
        level == self.base.len() && residue.is_identity()
    }

    // --------------------------------------------------------------------------------------------
    // Construction
    // --------------------------------------------------------------------------------------------

    /// Seeds base points so every generator moves one, installs the level
    /// transversals, and returns the per-level generator sets.
    fn seed_chain(&mut self, generators: PermSet) -> Vec<PermSet> {
        for g in &generators {
            if self.base.iter().all(|&b| g.image(b) == b) {
                let point = g.smallest_moved_point().expect("generators are non-identity");
                self.base.push(point);
            }
        }
        self.strong_gens = generators;

        let mut level_gens = Vec::with_capacity(self.base.len());
        self.transversals.clear();
        for i in 0..self.base.len() {
            let gens = self.level_generators(i);
            let mut tv = Transversal::new(self.kind, self.degree, self.base[i]);
            tv.extend(&gens);
            self.transversals.push(tv);
            level_gens.push(gens);
        }
        level_gens
    }

    /// Appends a base point with a fresh (still orbit-less) level.
    fn append_base_point(&mut self, point: usize, level_gens: &mut Vec<PermSet>) {
        self.base.push(point);
        self.transversals
            .push(Transversal::new(self.kind, self.degree, point));
        level_gens.push(PermSet::new(self.degree));
    }

    /// Installs a sift residue that failed at `level`: it becomes a strong
    /// generator of every level up to and including `level`.
    fn install_residue(
        &mut self,
        residue: Permutation,
        level: usize,
        level_gens: &mut Vec<PermSet>,
    ) {
        trace!(%residue, level, "installing strong generator");
        self.strong_gens
            .insert(residue.clone())
            .expect("residue degree matches the chain");
        for k in 0..=level {
            level_gens[k]
                .insert(residue.clone())
                .expect("residue degree matches the chain");
            self.transversals[k].extend(&level_gens[k]);
        }
    }

    /// Deterministic Schreier-Sims over the current chain: works outward
    /// from the deepest level, sifting lazily produced Schreier generators
    /// and descending again whenever a residue is installed.
    fn complete_deterministically(&mut self, level_gens: &mut Vec<PermSet>) {
        if self.base.is_empty() {
            return;
        }

        let mut queues: Vec<SchreierGeneratorQueue> =
            vec![SchreierGeneratorQueue::new(); self.base.len()];

        let mut i = self.base.len() - 1;
        loop {
            queues[i].update();

            let mut descended = false;
            while let Some(sg) =
                queues[i].next_generator(&level_gens[i], &self.transversals[i])
            {
                let (residue, j) = self.strip_from(i + 1, &sg);
                if residue.is_identity() {
                    continue;
                }

                if j == self.base.len() {
                    let point = residue
                        .smallest_moved_point()
                        .expect("non-identity residue");
                    self.append_base_point(point, level_gens);
                    queues.push(SchreierGeneratorQueue::new());
                }

                self.install_residue(residue, j, level_gens);
                for queue in queues.iter_mut().take(j + 1) {
                    queue.invalidate();
                }

                i = j;
                descended = true;
                break;
            }

            if descended {
                continue;
            }
            if i == 0 {
                break;
            }
            i -= 1;
        }
    }

    /// Monte-Carlo phase: sift product-replacement random elements until
    /// `confidence` consecutive sifts come back trivial or the order oracle
    /// confirms completeness.
    fn complete_randomly(&mut self, level_gens: &mut Vec<PermSet>, options: &BsgsOptions) {
        let mut rng = SmallRng::seed_from_u64(options.seed.unwrap_or(DEFAULT_SEED));
        let mut state: Vec<Permutation> = self
            .strong_gens
            .iter()
            .cloned()
            .cycle()
            .take(self.strong_gens.len().max(10))
            .collect();

        // mix the state before drawing from it
        for _ in 0..50 {
            product_replacement_step(&mut state, &mut rng);
        }

        let mut consecutive = 0;
        while consecutive < options.confidence() {
            if let Some(expected) = &options.expected_order {
                if &self.order() == expected {
                    debug!("order oracle confirmed completeness");
                    break;
                }
            }

            let g = product_replacement_step(&mut state, &mut rng).clone();
            let (residue, j) = self.strip(&g);
            if residue.is_identity() {
                consecutive += 1;
                continue;
            }
            consecutive = 0;

            if j == self.base.len() {
                let point = residue
                    .smallest_moved_point()
                    .expect("non-identity residue");
                self.append_base_point(point, level_gens);
            }
            self.install_residue(residue, j, level_gens);
        }
    }

    /// Drops levels whose fundamental orbit is a single point; the base is
    /// non-redundant afterwards.
    fn finalize(&mut self) {
        let mut level = 0;
        while level < self.base.len() {
            if self.transversals[level].orbit().len() > 1 {
                level += 1;
            } else {
                self.base.remove(level);
                self.transversals.remove(level);
            }
        }
    }

    // --------------------------------------------------------------------------------------------
    // Base Change
    // --------------------------------------------------------------------------------------------

    /// Swaps the adjacent base points at `i` and `i + 1` and rebuilds the
    /// chain from level `i` downward.
    pub fn transpose_base_points(&mut self, i: usize) {
        assert!(i + 1 < self.base.len(), "transposition out of range");
        self.base.swap(i, i + 1);
        self.rebuild_from(i);
    }

    /// Reorders the base so it starts with `target` (modulo redundant
    /// points, which are dropped), by repeated adjacent transpositions and
    /// trailing insertions.
    pub fn change_base(&mut self, target: &[usize]) {
        let mut pos = 0;
        for &point in target {
            if pos < self.base.len() && self.base[pos] == point {
                pos += 1;
                continue;
            }

            match self.base[pos..].iter().position(|&b| b == point) {
                Some(offset) => {
                    for k in (pos..pos + offset).rev() {
                        self.transpose_base_points(k);
                    }
                }
                None => {
                    // everything deeper than the chain stabilizes the new
                    // point, so it can be appended and bubbled up
                    self.base.push(point);
                    self.transversals
                        .push(Transversal::new(self.kind, self.degree, point));
                    self.rebuild_from(self.base.len() - 1);
                    for k in (pos..self.base.len() - 1).rev() {
                        self.transpose_base_points(k);
                    }
                }
            }
            pos += 1;
        }
        self.finalize();
    }

    /// Rebuilds transversals for levels `from..` against the current base
    /// order and re-runs the deterministic pass to restore strong
    /// generation at every level.
    fn rebuild_from(&mut self, from: usize) {
        self.transversals.truncate(from);
        for i in from..self.base.len() {
            let gens = self.level_generators(i);
            let mut tv = Transversal::new(self.kind, self.degree, self.base[i]);
            tv.extend(&gens);
            self.transversals.push(tv);
        }

        let mut level_gens: Vec<PermSet> = (0..self.base.len())
            .map(|i| self.level_generators(i))
            .collect();
        self.complete_deterministically(&mut level_gens);
    }
}

fn product_replacement_step<'a>(
    state: &'a mut Vec<Permutation>,
    rng: &mut SmallRng,
) -> &'a Permutation {
    let r = rng.gen_range(0..state.len());
    let mut s = rng.gen_range(0..state.len() - 1);
    if s >= r {
        s += 1;
    }
    state[r] = state[r].compose(&state[s]);
    &state[r]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perm::Permutation;

    fn gens(degree: usize, cycles: &[&[&[usize]]]) -> PermSet {
        PermSet::from_perms(
            degree,
            cycles.iter().map(|perm| {
                let cycles: Vec<Vec<usize>> = perm.iter().map(|c| c.to_vec()).collect();
                Permutation::from_cycles(&cycles, degree).unwrap()
            }),
        )
        .unwrap()
    }

    fn s4() -> PermSet {
        gens(4, &[&[&[0, 1]], &[&[0, 1, 2, 3]]])
    }

    #[test]
    fn test_deterministic_s4() {
        let bsgs = Bsgs::new(4, s4(), &BsgsOptions::deterministic()).unwrap();
        assert_eq!(bsgs.order(), BigUint::from(24u32));
        assert!(bsgs.base().len() <= 3);

        // base is non-redundant
        for level in 0..bsgs.num_levels() {
            assert!(bsgs.transversal(level).orbit().len() > 1);
        }
    }

    #[test]
    fn test_deterministic_a4() {
        let bsgs = Bsgs::new(
            4,
            gens(4, &[&[&[0, 1, 2]], &[&[1, 2, 3]]]),
            &BsgsOptions::deterministic(),
        )
        .unwrap();
        assert_eq!(bsgs.order(), BigUint::from(12u32));
    }

    #[test]
    fn test_all_transversal_kinds_agree() {
        let generators = gens(8, &[&[&[0, 1, 2, 3], &[4, 5, 6, 7]], &[&[0, 4], &[1, 5], &[2, 6], &[3, 7]]]);
        let mut orders = Vec::new();
        for kind in [
            TransversalKind::Explicit,
            TransversalKind::SchreierTrees,
            TransversalKind::ShallowSchreierTrees,
        ] {
            let options = BsgsOptions {
                transversals: kind,
                ..BsgsOptions::deterministic()
            };
            let bsgs = Bsgs::new(8, generators.clone(), &options).unwrap();
            orders.push(bsgs.order());
        }
        assert_eq!(orders[0], orders[1]);
        assert_eq!(orders[1], orders[2]);
    }

    #[test]
    fn test_membership() {
        let bsgs = Bsgs::new(4, gens(4, &[&[&[0, 1, 2]], &[&[1, 2, 3]]]), &BsgsOptions::deterministic()).unwrap();

        // even permutations are in, odd ones are out
        assert!(bsgs.contains(&Permutation::from_cycles(&[vec![0, 1, 2]], 4).unwrap()));
        assert!(bsgs.contains(&Permutation::from_cycles(&[vec![0, 1], vec![2, 3]], 4).unwrap()));
        assert!(bsgs.contains(&Permutation::id(4)));
        assert!(!bsgs.contains(&Permutation::from_cycles(&[vec![0, 1]], 4).unwrap()));
        assert!(!bsgs.contains(&Permutation::from_cycles(&[vec![0, 1, 2, 3]], 4).unwrap()));
    }

    #[test]
    fn test_strip_factorization() {
        let bsgs = Bsgs::new(4, s4(), &BsgsOptions::deterministic()).unwrap();
        let g = Permutation::from_cycles(&[vec![0, 2], vec![1, 3]], 4).unwrap();
        let (residue, level) = bsgs.strip(&g);
        assert!(residue.is_identity());
        assert_eq!(level, bsgs.num_levels());
    }

    #[test]
    fn test_monte_carlo_matches_deterministic() {
        let generators = gens(6, &[&[&[0, 1, 2, 3, 4, 5]], &[&[1, 5], &[2, 4]]]);

        let det = Bsgs::new(6, generators.clone(), &BsgsOptions::deterministic()).unwrap();
        let mc = Bsgs::new(6, generators, &BsgsOptions::monte_carlo()).unwrap();
        // dihedral group of order 12
        assert_eq!(det.order(), BigUint::from(12u32));
        assert_eq!(mc.order(), det.order());
    }

    #[test]
    fn test_monte_carlo_guaranteed() {
        let options = BsgsOptions {
            guaranteed: true,
            expected_order: Some(BigUint::from(24u32)),
            ..BsgsOptions::monte_carlo()
        };
        let bsgs = Bsgs::new(4, s4(), &options).unwrap();
        assert_eq!(bsgs.order(), BigUint::from(24u32));
    }

    #[test]
    fn test_monte_carlo_wrong_oracle_fails() {
        let options = BsgsOptions {
            guaranteed: true,
            expected_order: Some(BigUint::from(23u32)),
            ..BsgsOptions::monte_carlo()
        };
        assert_eq!(
            Bsgs::new(4, s4(), &options).unwrap_err(),
            BsgsError::ProbabilisticIncomplete
        );
    }

    #[test]
    fn test_transpose_base_points() {
        let mut bsgs = Bsgs::new(4, s4(), &BsgsOptions::deterministic()).unwrap();
        let order = bsgs.order();
        assert!(bsgs.num_levels() >= 2);

        let before = bsgs.base().to_vec();
        bsgs.transpose_base_points(0);
        assert_eq!(bsgs.base()[0], before[1]);
        assert_eq!(bsgs.base()[1], before[0]);
        assert_eq!(bsgs.order(), order);

        // membership is preserved across the base change
        assert!(bsgs.contains(&Permutation::from_cycles(&[vec![0, 1]], 4).unwrap()));
        assert!(!bsgs.contains(&Permutation::from_cycles(&[vec![0, 4]], 5).unwrap()));
    }

    #[test]
    fn test_change_base() {
        let mut bsgs = Bsgs::new(4, s4(), &BsgsOptions::deterministic()).unwrap();
        let order = bsgs.order();

        bsgs.change_base(&[3, 1]);
        assert_eq!(&bsgs.base()[..2], &[3, 1]);
        assert_eq!(bsgs.order(), order);
        assert!(bsgs.contains(&Permutation::from_cycles(&[vec![0, 3]], 4).unwrap()));
    }

    #[test]
    fn test_trivial_chain() {
        let bsgs = Bsgs::trivial(5);
        assert_eq!(bsgs.order(), BigUint::one());
        assert!(bsgs.contains(&Permutation::id(5)));
        assert!(!bsgs.contains(&Permutation::from_cycles(&[vec![0, 1]], 5).unwrap()));
    }
}
