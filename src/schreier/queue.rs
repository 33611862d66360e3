//! Lazy production of Schreier generators for one level of the
//! Schreier-Sims loop.
//!
//! The queue walks the pairs `(beta, s)` of fundamental-orbit point and
//! strong generator, yielding `u_beta . s . u_{s(beta)}^-1` for each. Pairs
//! where `s` labels the incoming edge of `beta` are skipped, those
//! contribute the identity by construction. The outer loop invalidates the
//! queue whenever the generating set grows and re-seeds it in place with
//! [`SchreierGeneratorQueue::update`].

use crate::perm::{PermSet, Permutation};
use crate::schreier::{SchreierStructure, Transversal};

#[derive(Debug, Clone, Default)]
pub struct SchreierGeneratorQueue {
    beta_idx: usize,
    gen_idx: usize,
    u_beta: Option<Permutation>,
    valid: bool,
}

impl SchreierGeneratorQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the queue stale; the next [`update`](Self::update) restarts
    /// the pass from the first orbit point.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Re-seeds the cursors if the queue was invalidated; a no-op on a
    /// valid queue.
    pub fn update(&mut self) {
        if self.valid {
            return;
        }
        self.beta_idx = 0;
        self.gen_idx = 0;
        self.u_beta = None;
        self.valid = true;
    }

    /// Produces the next Schreier generator, or `None` once every
    /// `(beta, s)` pair has been visited.
    pub fn next_generator(
        &mut self,
        generators: &PermSet,
        structure: &Transversal,
    ) -> Option<Permutation> {
        let orbit = structure.orbit();

        loop {
            if self.beta_idx >= orbit.len() {
                return None;
            }
            let beta = *orbit.get_index(self.beta_idx).expect("cursor within orbit");

            if self.gen_idx >= generators.len() {
                self.beta_idx += 1;
                self.gen_idx = 0;
                self.u_beta = None;
                continue;
            }

            let s = generators.get(self.gen_idx);
            self.gen_idx += 1;

            if structure.incoming(beta, s) {
                continue;
            }

            if self.u_beta.is_none() {
                self.u_beta = Some(
                    structure
                        .transversal(beta)
                        .expect("orbit point has a representative"),
                );
            }
            let u_beta = self.u_beta.as_ref().expect("cached above");

            let u_target = structure
                .transversal(s.image(beta))
                .expect("orbit is closed under generators");

            return Some(u_target.inverse().compose(&s.compose(u_beta)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perm::Permutation;
    use crate::schreier::TransversalKind;

    fn setup() -> (PermSet, Transversal) {
        let gens = PermSet::from_perms(
            3,
            vec![
                Permutation::from_cycles(&[vec![0, 1]], 3).unwrap(),
                Permutation::from_cycles(&[vec![0, 1, 2]], 3).unwrap(),
            ],
        )
        .unwrap();
        let mut structure = Transversal::new(TransversalKind::Explicit, 3, 0);
        structure.extend(&gens);
        (gens, structure)
    }

    #[test]
    fn test_generators_fix_the_root() {
        let (gens, structure) = setup();
        let mut queue = SchreierGeneratorQueue::new();
        queue.update();

        let mut count = 0;
        while let Some(sg) = queue.next_generator(&gens, &structure) {
            assert_eq!(sg.image(0), 0, "schreier generator must fix the root");
            count += 1;
        }
        // 3 orbit points x 2 generators, minus one incoming edge per
        // non-root point
        assert_eq!(count, 4);
    }

    #[test]
    fn test_restart_after_invalidate() {
        let (gens, structure) = setup();
        let mut queue = SchreierGeneratorQueue::new();
        queue.update();

        let mut first_pass = Vec::new();
        while let Some(sg) = queue.next_generator(&gens, &structure) {
            first_pass.push(sg);
        }

        queue.invalidate();
        queue.update();
        let mut second_pass = Vec::new();
        while let Some(sg) = queue.next_generator(&gens, &structure) {
            second_pass.push(sg);
        }

        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn test_exhaustion_is_stable() {
        let (gens, structure) = setup();
        let mut queue = SchreierGeneratorQueue::new();
        queue.update();
        while queue.next_generator(&gens, &structure).is_some() {}

        // update without a preceding invalidate must not rewind the pass
        queue.update();
        assert!(queue.next_generator(&gens, &structure).is_none());
    }
}
