//! Orbits of points under a generating set, and orbit partitions of the
//! full acted-on set.

use indexmap::IndexSet;

use crate::perm::PermSet;

/// The orbit `{g(x) : g in <S>}` of a seed point, kept in BFS insertion
/// order with constant-time lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orbit {
    points: IndexSet<usize>,
}

impl Orbit {
    /// Breadth-first orbit generation: repeatedly applies every generator
    /// to each newly discovered point.
    pub fn generate(seed: usize, generators: &PermSet) -> Self {
        let mut points = IndexSet::new();
        points.insert(seed);

        let mut next = 0;
        while next < points.len() {
            let x = *points.get_index(next).expect("cursor within orbit");
            for g in generators {
                points.insert(g.image(x));
            }
            next += 1;
        }

        Orbit { points }
    }

    pub fn contains(&self, x: usize) -> bool {
        self.points.contains(&x)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.points.iter().copied()
    }
}

/// A partition of `0..degree` into the orbits of a generating set.
///
/// Blocks are numbered by their smallest element in increasing order, so
/// two partitions are equal exactly when their block lists are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrbitPartition {
    degree: usize,
    index: Vec<usize>,
    blocks: Vec<Vec<usize>>,
}

impl OrbitPartition {
    pub fn from_generators(degree: usize, generators: &PermSet) -> Self {
        let mut index = vec![usize::MAX; degree];
        let mut blocks = Vec::new();

        for x in 0..degree {
            if index[x] != usize::MAX {
                continue;
            }
            let block_idx = blocks.len();
            let orbit = Orbit::generate(x, generators);
            let mut block: Vec<usize> = orbit.iter().collect();
            block.sort_unstable();
            for &y in &block {
                index[y] = block_idx;
            }
            blocks.push(block);
        }

        OrbitPartition {
            degree,
            index,
            blocks,
        }
    }

    fn from_index(degree: usize, raw: Vec<usize>) -> Self {
        let slots = raw.iter().max().map_or(0, |&m| m + 1);
        let mut remap = vec![usize::MAX; slots];
        let mut index = vec![usize::MAX; degree];
        let mut blocks: Vec<Vec<usize>> = Vec::new();

        for x in 0..degree {
            let raw_id = raw[x];
            if remap[raw_id] == usize::MAX {
                remap[raw_id] = blocks.len();
                blocks.push(Vec::new());
            }
            index[x] = remap[raw_id];
            blocks[remap[raw_id]].push(x);
        }

        OrbitPartition {
            degree,
            index,
            blocks,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn block_of(&self, x: usize) -> usize {
        self.index[x]
    }

    pub fn blocks(&self) -> &[Vec<usize>] {
        &self.blocks
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// The common refinement: two points share a block exactly when they
    /// share a block in both operands.
    pub fn refine(&self, other: &OrbitPartition) -> OrbitPartition {
        assert_eq!(self.degree, other.degree, "partition degrees differ");

        let pairs: Vec<usize> = (0..self.degree)
            .map(|x| self.index[x] * other.num_blocks() + other.index[x])
            .collect();
        Self::from_index(self.degree, pairs)
    }
}
