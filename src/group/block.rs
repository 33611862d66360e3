//! Systems of imprimitivity.
//!
//! A block system is a partition of the acted-on set into equal-size
//! blocks that the group permutes setwise. Discovery follows the classic
//! route: minimal block systems from two-point seed classes via iterative
//! union-find merging, then deduplication over all seeds.

use ahash::AHashSet;
use indexmap::IndexSet;
use tracing::trace;

use crate::group::{GroupError, PermGroup};
use crate::orbit::Orbit;
use crate::perm::{PermSet, Permutation};

/// A G-invariant partition of `0..degree`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSystem {
    degree: usize,
    blocks: Vec<Vec<usize>>,
    index: Vec<usize>,
}

impl BlockSystem {
    /// Builds a system from its blocks. Blocks are renumbered by smallest
    /// element so equal partitions compare equal.
    pub fn new(degree: usize, mut blocks: Vec<Vec<usize>>) -> Self {
        for block in &mut blocks {
            block.sort_unstable();
        }
        blocks.sort_unstable_by_key(|block| block[0]);

        let mut index = vec![usize::MAX; degree];
        for (i, block) in blocks.iter().enumerate() {
            for &x in block {
                index[x] = i;
            }
        }
        debug_assert!(index.iter().all(|&i| i != usize::MAX), "blocks must cover the domain");

        BlockSystem {
            degree,
            blocks,
            index,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn blocks(&self) -> &[Vec<usize>] {
        &self.blocks
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_of(&self, x: usize) -> usize {
        self.index[x]
    }

    /// Singletons-only and one-block-only partitions carry no information.
    pub fn is_trivial(&self) -> bool {
        self.num_blocks() <= 1 || self.num_blocks() == self.degree
    }

    /// Whether `block` is a block of `<generators>`: every generator must
    /// map it to itself or to a disjoint image.
    pub fn is_block(generators: &PermSet, block: &[usize]) -> bool {
        let block_set: AHashSet<usize> = block.iter().copied().collect();
        for g in generators {
            let mut overlap = 0;
            for &x in block {
                if block_set.contains(&g.image(x)) {
                    overlap += 1;
                }
            }
            if overlap != 0 && overlap != block.len() {
                return false;
            }
        }
        true
    }

    /// The orbit of `block` under the setwise action of `<generators>`,
    /// assembled into a system. Points outside the orbit become singleton
    /// blocks.
    pub fn from_block(generators: &PermSet, block: &[usize]) -> Self {
        let degree = generators.degree();

        let mut seed = block.to_vec();
        seed.sort_unstable();

        let mut images: IndexSet<Vec<usize>> = IndexSet::new();
        images.insert(seed);
        let mut cursor = 0;
        while cursor < images.len() {
            let current = images.get_index(cursor).expect("cursor within set").clone();
            for g in generators {
                let mut image: Vec<usize> = current.iter().map(|&x| g.image(x)).collect();
                image.sort_unstable();
                images.insert(image);
            }
            cursor += 1;
        }

        let mut blocks: Vec<Vec<usize>> = images.into_iter().collect();
        let covered: AHashSet<usize> = blocks.iter().flatten().copied().collect();
        for x in 0..degree {
            if !covered.contains(&x) {
                blocks.push(vec![x]);
            }
        }

        Self::new(degree, blocks)
    }

    /// The minimal block system in which `class` lies inside one block:
    /// iterative union-find merging driven by generator images.
    pub fn minimal(generators: &PermSet, class: &[usize]) -> Self {
        let degree = generators.degree();
        let mut sets = PointSets::new(degree);
        let mut queue = Vec::new();

        for &x in &class[1..] {
            if sets.union(class[0], x) {
                queue.push(x);
            }
        }

        while let Some(gamma) = queue.pop() {
            let delta = sets.find(gamma);
            for g in generators {
                let a = sets.find(g.image(gamma));
                let b = sets.find(g.image(delta));
                if a != b {
                    sets.union(a, b);
                    // the root that lost its class needs reprocessing
                    let winner = sets.find(a);
                    queue.push(if winner == a { b } else { a });
                }
            }
        }

        Self::new(degree, sets.classes())
    }

    /// All non-trivial block systems, found by growing minimal systems
    /// from `{0, x}` seeds over the orbit of the smallest moved point.
    /// Only groups transitive on their whole domain admit any.
    pub fn non_trivial(group: &PermGroup) -> Vec<BlockSystem> {
        let generators = group.generators();
        let Some(lo) = group.smallest_moved_point() else {
            return Vec::new();
        };
        if !group.is_transitive() || lo != 0 || group.largest_moved_point() != Some(group.degree() - 1)
        {
            return Vec::new();
        }

        let orbit = Orbit::generate(lo, generators);
        let mut systems = Vec::new();
        for x in orbit.iter() {
            if x == lo {
                continue;
            }
            let system = Self::minimal(generators, &[lo, x]);
            if !system.is_trivial() && !systems.contains(&system) {
                trace!(blocks = system.num_blocks(), "found block system");
                systems.push(system);
            }
        }
        systems
    }

    /// The induced action on the blocks.
    pub fn block_permuter(&self, generators: &PermSet) -> Result<PermGroup, GroupError> {
        let perms: Vec<Permutation> = generators
            .iter()
            .map(|g| {
                let map = self
                    .blocks
                    .iter()
                    .map(|block| self.block_of(g.image(block[0])))
                    .collect();
                Permutation::from_map(map)
            })
            .collect();
        PermGroup::new(self.num_blocks(), perms)
    }
}

/// Union-find over points with path halving; just enough for the merging
/// loop above.
struct PointSets {
    parent: Vec<usize>,
}

impl PointSets {
    fn new(n: usize) -> Self {
        PointSets {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Returns `false` when the points were already joined.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        self.parent[rb] = ra;
        true
    }

    fn classes(&mut self) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        let mut by_root: Vec<Vec<usize>> = vec![Vec::new(); n];
        for x in 0..n {
            let root = self.find(x);
            by_root[root].push(x);
        }
        by_root.retain(|class| !class.is_empty());
        by_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycles(degree: usize, spec: &[&[usize]]) -> Permutation {
        let cycles: Vec<Vec<usize>> = spec.iter().map(|c| c.to_vec()).collect();
        Permutation::from_cycles(&cycles, degree).unwrap()
    }

    fn fixture_gens() -> PermSet {
        PermSet::from_perms(
            8,
            vec![
                cycles(8, &[&[0, 1, 2, 3], &[4, 5, 6, 7]]),
                cycles(8, &[&[0, 4], &[1, 5], &[2, 6], &[3, 7]]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_is_block() {
        let gens = fixture_gens();
        assert!(BlockSystem::is_block(&gens, &[0, 4]));
        assert!(BlockSystem::is_block(&gens, &[0, 1, 2, 3]));
        assert!(!BlockSystem::is_block(&gens, &[0, 1]));
    }

    #[test]
    fn test_minimal() {
        let system = BlockSystem::minimal(&fixture_gens(), &[0, 4]);
        assert_eq!(system.num_blocks(), 4);
        assert_eq!(
            system.blocks(),
            &[vec![0, 4], vec![1, 5], vec![2, 6], vec![3, 7]]
        );
        assert_eq!(system.block_of(6), 2);
    }

    #[test]
    fn test_from_block() {
        let system = BlockSystem::from_block(&fixture_gens(), &[0, 4]);
        assert_eq!(system.num_blocks(), 4);
        assert_eq!(system.blocks()[1], vec![1, 5]);
    }

    #[test]
    fn test_non_trivial_fixture() {
        let group = PermGroup::new(
            8,
            vec![
                cycles(8, &[&[0, 1, 2, 3], &[4, 5, 6, 7]]),
                cycles(8, &[&[0, 4], &[1, 5], &[2, 6], &[3, 7]]),
            ],
        )
        .unwrap();

        let systems = BlockSystem::non_trivial(&group);
        assert!(!systems.is_empty());

        let wanted = BlockSystem::new(
            8,
            vec![vec![0, 4], vec![1, 5], vec![2, 6], vec![3, 7]],
        );
        let found = systems
            .iter()
            .find(|s| *s == &wanted)
            .expect("the {i, i+4} system must be discovered");

        let permuter = found.block_permuter(group.generators()).unwrap();
        assert_eq!(permuter.order(), &num::BigUint::from(4u32));
    }

    #[test]
    fn test_non_trivial_rejects_primitive_groups() {
        let s4 = PermGroup::symmetric(4);
        assert!(BlockSystem::non_trivial(&s4).is_empty());

        let intransitive = PermGroup::new(
            4,
            vec![cycles(4, &[&[0, 1]]), cycles(4, &[&[2, 3]])],
        )
        .unwrap();
        assert!(BlockSystem::non_trivial(&intransitive).is_empty());
    }

    #[test]
    fn test_trivial_partitions() {
        assert!(BlockSystem::new(3, vec![vec![0], vec![1], vec![2]]).is_trivial());
        assert!(BlockSystem::new(3, vec![vec![0, 1, 2]]).is_trivial());
        assert!(!BlockSystem::new(4, vec![vec![0, 1], vec![2, 3]]).is_trivial());
    }
}
