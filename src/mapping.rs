//! Task mappings and the orbit-representative cache.
//!
//! A [`TaskMapping`] assigns one processor index to each task. The
//! symmetry-reduction engine permutes the processor indices (offset into a
//! window of the global index space) and compares candidates
//! lexicographically; [`TaskMapping::less_than`] does the comparison
//! without materializing the permuted copy, which dominates the hot loop
//! of the iterate strategy.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::perm::Permutation;

/// Where a representative search gets its candidates from and which window
/// of the processor index space the automorphisms act on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReprMethod {
    /// Enumerate the whole group; exact and slow.
    #[default]
    Iterate,
    /// Fixed-point descent along the strong generators; approximate.
    LocalSearch,
    /// BFS over the mapping's orbit; exact, memory-bound.
    Orbits,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReprOptions {
    pub method: ReprMethod,
    /// First processor index the automorphism group acts on.
    pub offset: usize,
}

/// An assignment of tasks to processors, ordered lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskMapping(Vec<usize>);

impl TaskMapping {
    pub fn new(tasks: Vec<usize>) -> Self {
        TaskMapping(tasks)
    }

    pub fn tasks(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn apply(task: usize, perm: &Permutation, offset: usize) -> usize {
        if task >= offset && task - offset < perm.degree() {
            offset + perm.image(task - offset)
        } else {
            task
        }
    }

    /// The mapping with `perm` applied to every processor index inside the
    /// window `offset..offset + perm.degree()`.
    pub fn permuted(&self, perm: &Permutation, offset: usize) -> Self {
        TaskMapping(
            self.0
                .iter()
                .map(|&task| Self::apply(task, perm, offset))
                .collect(),
        )
    }

    /// Whether `self.permuted(perm, offset)` would order strictly below
    /// `other`, decided pointwise without building the permuted copy.
    pub fn less_than(&self, other: &TaskMapping, perm: &Permutation, offset: usize) -> bool {
        for (&task, &reference) in self.0.iter().zip(other.0.iter()) {
            let image = Self::apply(task, perm, offset);
            if image != reference {
                return image < reference;
            }
        }
        false
    }
}

impl fmt::Display for TaskMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, task) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{task}")?;
        }
        write!(f, "]")
    }
}

/// Orbit representatives seen so far, each with a stable orbit index
/// assigned at first insertion. Lookups are by exact equality; the repr
/// engine canonicalizes before inserting.
#[derive(Debug, Clone, Default)]
pub struct TaskOrbits {
    representatives: IndexSet<TaskMapping>,
}

impl TaskOrbits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mapping's orbit index and whether it was newly
    /// inserted.
    pub fn insert(&mut self, mapping: TaskMapping) -> (usize, bool) {
        self.representatives.insert_full(mapping)
    }

    pub fn contains(&self, mapping: &TaskMapping) -> bool {
        self.representatives.contains(mapping)
    }

    pub fn orbit_index(&self, mapping: &TaskMapping) -> Option<usize> {
        self.representatives.get_index_of(mapping)
    }

    pub fn num_orbits(&self) -> usize {
        self.representatives.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskMapping> {
        self.representatives.iter()
    }
}
