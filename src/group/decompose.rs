//! Structural decompositions: disjoint subgroup factorizations and wreath
//! product decompositions.
//!
//! The disjoint decomposition comes in two modes. The incomplete mode
//! merges generators whose supports overlap and factors along the
//! resulting classes; it is fast but can miss factorizations where
//! generators straddle independent parts. The complete mode searches the
//! subsets of the orbit partition, accepting a split when the restricted
//! projections multiply up to the full order, and recurses on both sides.

use ahash::AHashSet;
use num::BigUint;
use tracing::{debug, trace};

use crate::group::block::BlockSystem;
use crate::group::PermGroup;
use crate::orbit::OrbitPartition;
use crate::perm::Permutation;

impl PermGroup {
    // --------------------------------------------------------------------------------------------
    // Disjoint Subgroup Decomposition
    // --------------------------------------------------------------------------------------------

    /// Factors the group into subgroups with pairwise disjoint supports
    /// whose product is the whole group. Returns `[self]` when no
    /// non-trivial factorization exists.
    ///
    /// With `complete` unset only the generator-support heuristic runs.
    /// `disjoint_orbit_optimization` pre-splits along the support classes
    /// before the subset search and is only meaningful in complete mode.
    pub fn disjoint_decomposition(
        &self,
        complete: bool,
        disjoint_orbit_optimization: bool,
    ) -> Vec<PermGroup> {
        if complete {
            self.disjoint_decomp_complete(disjoint_orbit_optimization)
        } else {
            self.disjoint_decomp_incomplete()
        }
    }

    /// One subgroup per equivalence class of generators under transitive
    /// support overlap.
    fn disjoint_decomp_incomplete(&self) -> Vec<PermGroup> {
        let mut classes: Vec<(AHashSet<usize>, Vec<Permutation>)> = Vec::new();

        for g in self.generators() {
            let support: AHashSet<usize> = g.moved().collect();

            let mut merged_support = support;
            let mut merged_gens = vec![g.clone()];
            let mut remaining = Vec::new();
            for (class_support, class_gens) in classes.drain(..) {
                if class_support.intersection(&merged_support).next().is_some() {
                    merged_support.extend(class_support);
                    merged_gens.extend(class_gens);
                } else {
                    remaining.push((class_support, class_gens));
                }
            }
            remaining.push((merged_support, merged_gens));
            classes = remaining;
        }

        if classes.len() <= 1 {
            return vec![self.clone()];
        }

        debug!(classes = classes.len(), "support heuristic split");
        classes
            .into_iter()
            .map(|(_, gens)| {
                PermGroup::new(self.degree(), gens)
                    .expect("restricted generators act on the group degree")
            })
            .collect()
    }

    fn disjoint_decomp_complete(&self, disjoint_orbit_optimization: bool) -> Vec<PermGroup> {
        if disjoint_orbit_optimization {
            // generator-support classes factor unconditionally; refine each
            // class by subset search afterwards
            let parts = self.disjoint_decomp_incomplete();
            if parts.len() > 1 {
                return parts
                    .iter()
                    .flat_map(|part| part.disjoint_decomp_complete(false))
                    .collect();
            }
        }

        let partition = OrbitPartition::from_generators(self.degree(), self.generators());
        let orbits: Vec<&Vec<usize>> = partition
            .blocks()
            .iter()
            .filter(|block| block.len() > 1)
            .collect();
        if orbits.len() <= 1 {
            return vec![self.clone()];
        }

        // try every split of the orbit set in two; the last orbit is pinned
        // to the right side so each unordered split is visited once
        for mask in 1u64..(1 << (orbits.len() - 1)) {
            let mut left_support = vec![false; self.degree()];
            for (i, orbit) in orbits.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    for &x in orbit.iter() {
                        left_support[x] = true;
                    }
                }
            }

            let left = self.restricted_to(&left_support);
            let right = self.restricted_to_complement(&left_support);

            if &(left.order() * right.order()) == self.order() {
                trace!(%mask, "found disjoint split");
                let mut result = left.disjoint_decomp_complete(false);
                result.extend(right.disjoint_decomp_complete(false));
                return result;
            }
        }

        vec![self.clone()]
    }

    /// The projection onto a union of orbits: each generator keeps its
    /// action inside the support and fixes everything else.
    fn restricted_to(&self, support: &[bool]) -> PermGroup {
        let gens = self.generators().iter().filter_map(|g| {
            let map: Vec<usize> = (0..self.degree())
                .map(|x| if support[x] { g.image(x) } else { x })
                .collect();
            let restricted = Permutation::from_map(map);
            (!restricted.is_identity()).then_some(restricted)
        });
        PermGroup::new(self.degree(), gens.collect::<Vec<_>>())
            .expect("restricted generators act on the group degree")
    }

    fn restricted_to_complement(&self, support: &[bool]) -> PermGroup {
        let complement: Vec<bool> = support.iter().map(|&b| !b).collect();
        self.restricted_to(&complement)
    }

    // --------------------------------------------------------------------------------------------
    // Wreath Product Decomposition
    // --------------------------------------------------------------------------------------------

    /// Attempts to write the group as `H wr K` along one of its block
    /// systems. On success returns `[K, H_1, ..., H_d]`: the block
    /// permuter followed by the `d` disjoint block copies of `H`, so that
    /// `|K| * prod |H_i|` is the group order. Returns an empty vector when
    /// no block system supports a decomposition.
    pub fn wreath_decomposition(&self) -> Vec<PermGroup> {
        for system in BlockSystem::non_trivial(self) {
            if let Some(result) = self.wreath_decomp_with(&system) {
                debug!(blocks = system.num_blocks(), "wreath decomposition found");
                return result;
            }
        }
        Vec::new()
    }

    fn wreath_decomp_with(&self, system: &BlockSystem) -> Option<Vec<PermGroup>> {
        let degree = self.degree();
        let blocks = system.blocks();
        let d = system.num_blocks();

        let permuter = system.block_permuter(self.generators()).ok()?;

        // position of each point inside its (sorted) block
        let mut pos = vec![0; degree];
        for block in blocks {
            for (r, &x) in block.iter().enumerate() {
                pos[x] = r;
            }
        }

        // within-block components of every generator, pulled back to the
        // first block: candidate generators for H
        let mut h_gens = Vec::new();
        for g in self.generators() {
            for block in blocks {
                let mut map: Vec<usize> = (0..degree).collect();
                for (r, &x) in block.iter().enumerate() {
                    map[blocks[0][r]] = blocks[0][pos[g.image(x)]];
                }
                let component = Permutation::from_map(map);
                if !component.is_identity() {
                    h_gens.push(component);
                }
            }
        }
        let h = PermGroup::new(degree, h_gens).ok()?;

        // candidate group: d position-transported copies of H plus pure
        // block-permuting lifts of the permuter's generators
        let copies: Vec<Vec<Permutation>> = (0..d)
            .map(|i| {
                h.generators()
                    .iter()
                    .map(|hg| transport(hg, blocks, 0, i, &pos, degree))
                    .collect()
            })
            .collect();

        let mut candidate_gens: Vec<Permutation> = copies.iter().flatten().cloned().collect();
        for pg in permuter.generators() {
            let mut map = vec![0; degree];
            for (b, block) in blocks.iter().enumerate() {
                for (r, &x) in block.iter().enumerate() {
                    map[x] = blocks[pg.image(b)][r];
                }
            }
            candidate_gens.push(Permutation::from_map(map));
        }

        let candidate = PermGroup::new(degree, candidate_gens).ok()?;
        if candidate.order() != self.order()
            || !self
                .generators()
                .iter()
                .all(|g| candidate.contains_element(g))
        {
            return None;
        }

        let mut result = vec![permuter];
        for copy in copies {
            result.push(
                PermGroup::new(degree, copy).expect("copies act on the group degree"),
            );
        }
        Some(result)
    }
}

/// Moves a permutation supported on block `from` to block `to` by matching
/// sorted positions.
fn transport(
    perm: &Permutation,
    blocks: &[Vec<usize>],
    from: usize,
    to: usize,
    pos: &[usize],
    degree: usize,
) -> Permutation {
    let mut map: Vec<usize> = (0..degree).collect();
    for &x in &blocks[from] {
        map[blocks[to][pos[x]]] = blocks[to][pos[perm.image(x)]];
    }
    Permutation::from_map(map)
}

/// Checks invariant bookkeeping shared by the decomposition tests.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsgs::BsgsOptions;
    use crate::perm::PermSet;
    use num::One;

    fn cycles(degree: usize, spec: &[&[usize]]) -> Permutation {
        let cycles: Vec<Vec<usize>> = spec.iter().map(|c| c.to_vec()).collect();
        Permutation::from_cycles(&cycles, degree).unwrap()
    }

    fn assert_disjoint_supports(parts: &[PermGroup], whole: &PermGroup) {
        let mut seen: AHashSet<usize> = AHashSet::new();
        let mut product = BigUint::one();
        for part in parts {
            let support: Vec<usize> = PermSet::from_perms(
                part.degree(),
                part.generators().iter().cloned(),
            )
            .unwrap()
            .support()
            .iter_ones()
            .collect();
            for x in support {
                assert!(seen.insert(x), "supports must be pairwise disjoint");
            }
            product *= part.order();
        }
        assert_eq!(&product, whole.order());
    }

    #[test]
    fn test_incomplete_splits_obvious_factors() {
        let group =
            PermGroup::new(4, vec![cycles(4, &[&[0, 1]]), cycles(4, &[&[2, 3]])]).unwrap();
        let parts = group.disjoint_decomposition(false, false);
        assert_eq!(parts.len(), 2);
        assert_disjoint_supports(&parts, &group);
    }

    #[test]
    fn test_incomplete_is_a_heuristic() {
        // the straddling generator hides the factorization from the
        // support heuristic; the complete search finds it
        let group = PermGroup::new(
            4,
            vec![
                cycles(4, &[&[0, 1], &[2, 3]]),
                cycles(4, &[&[0, 1]]),
                cycles(4, &[&[2, 3]]),
            ],
        )
        .unwrap();

        let incomplete = group.disjoint_decomposition(false, false);
        assert_eq!(incomplete.len(), 1);

        let complete = group.disjoint_decomposition(true, false);
        assert_eq!(complete.len(), 2);
        assert_disjoint_supports(&complete, &group);
    }

    #[test]
    fn test_complete_leaves_diagonal_groups_whole() {
        // order 2, projections have order 2 each: 2 * 2 != 2
        let group = PermGroup::new(4, vec![cycles(4, &[&[0, 1], &[2, 3]])]).unwrap();
        let parts = group.disjoint_decomposition(true, false);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].order(), group.order());
    }

    #[test]
    fn test_orbit_optimization_agrees() {
        let group = PermGroup::new(
            7,
            vec![
                cycles(7, &[&[0, 1, 2]]),
                cycles(7, &[&[3, 4]]),
                cycles(7, &[&[5, 6]]),
            ],
        )
        .unwrap();

        let plain = group.disjoint_decomposition(true, false);
        let optimized = group.disjoint_decomposition(true, true);
        assert_eq!(plain.len(), 3);
        assert_eq!(optimized.len(), 3);
        assert_disjoint_supports(&plain, &group);
        assert_disjoint_supports(&optimized, &group);
    }

    #[test]
    fn test_wreath_decomposition_of_wreath_product() {
        let wreath = PermGroup::wreath_product(
            &PermGroup::symmetric(3),
            &PermGroup::symmetric(2),
            &BsgsOptions::default(),
        )
        .unwrap();

        let parts = wreath.wreath_decomposition();
        assert_eq!(parts.len(), 3, "expected [K, H_1, H_2]");

        // |K| * |H_1| * |H_2| = |G| = 72
        assert_eq!(parts[0].order(), &BigUint::from(2u32));
        assert_eq!(parts[1].order(), &BigUint::from(6u32));
        assert_eq!(parts[2].order(), &BigUint::from(6u32));

        let product: BigUint = parts.iter().map(|p| p.order()).product();
        assert_eq!(&product, wreath.order());

        // the two H copies act on disjoint blocks
        let support_1: AHashSet<usize> =
            parts[1].generators().iter().flat_map(|g| g.moved()).collect();
        let support_2: AHashSet<usize> =
            parts[2].generators().iter().flat_map(|g| g.moved()).collect();
        assert!(support_1.is_disjoint(&support_2));
    }

    #[test]
    fn test_wreath_decomposition_failure() {
        // primitive group: no block system, no decomposition
        assert!(PermGroup::symmetric(5).wreath_decomposition().is_empty());
    }
}
