//! # Permutations
//!
//! This module provides the [`Permutation`] struct and the ordered
//! [`PermSet`] container used throughout the crate.
//!
//! ## Key Features:
//!
//! - **Representation**: A `Permutation` is stored by its direct mapping
//!   (`map[i]` is the image of `i`) and its inverse mapping.
//! - **Construction**:
//!   - Identity permutation: `Permutation::id(n)`.
//!   - From a mapping vector: `Permutation::from_map(vec![...])`.
//!   - From disjoint cycles: `Permutation::from_cycles(&[...], degree)`.
//! - **Basic Operations**:
//!   - Composition: `p.compose(&q)` (applies `q` then `p`).
//!   - Inverse: `p.inverse()`.
//!   - Action on points: `p.image(x)`, also available as `p[x]`.
//!   - Degree shifts: `p.shifted(k)` renames `i` to `i + k`,
//!     `p.extended(m)` pads with fixed points up to degree `m`.
//! - **Extension semantics**: permutations of different degrees compare
//!   equal when they agree after padding the shorter one with fixed
//!   points. Hashing and lexicographic ordering are consistent with this.
//! - **Cycle Utilities**: cycle decomposition via `p.cycles()`, GAP-style
//!   rendering (1-indexed) via `p.to_gap()`.
//!
//! Points are 0-indexed everywhere; the 1-indexed convention appears only
//! inside GAP-facing strings.

use std::{cmp::Ordering, fmt, ops::Index};

use ahash::AHashSet;
use bitvec::vec::BitVec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermError {
    #[error("degree mismatch: expected degree <= {expected}, found {found}")]
    DegreeMismatch { expected: usize, found: usize },

    #[error("point {0} appears in more than one cycle")]
    DuplicatePoint(usize),
}

/// A permutation of `0..n`, stored together with its inverse mapping.
///
/// # Examples
///
/// ```
/// use archsym::perm::Permutation;
///
/// // Maps 0->2, 1->0, 2->1, 3->3
/// let p = Permutation::from_map(vec![2, 0, 1, 3]);
/// assert_eq!(p.image(0), 2);
/// assert_eq!(p[1], 0);
/// assert_eq!(p.inverse().image(2), 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permutation {
    map: Vec<usize>,
    inv: Vec<usize>,
}

impl Permutation {
    // --------------------------------------------------------------------------------------------
    // Basic Constructors and Accessors
    // --------------------------------------------------------------------------------------------

    /// Creates the identity permutation of degree `n`.
    pub fn id(n: usize) -> Self {
        Permutation {
            map: (0..n).collect(),
            inv: (0..n).collect(),
        }
    }

    /// Creates a permutation from a mapping vector.
    /// The `map` vector states where index `i` is sent: `map[i]` is the image of `i`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use archsym::perm::Permutation;
    /// let p = Permutation::from_map(vec![2, 0, 1]);
    /// assert_eq!(p.image(2), 1);
    /// ```
    pub fn from_map(map: Vec<usize>) -> Self {
        let mut inv = vec![0; map.len()];
        debug_assert!(
            {
                let mut seen = vec![false; map.len()];
                map.iter().all(|&j| {
                    j < seen.len() && !std::mem::replace(&mut seen[j], true)
                })
            },
            "mapping vector is not a bijection of 0..{}",
            map.len()
        );
        for (i, &j) in map.iter().enumerate() {
            inv[j] = i;
        }
        Permutation { map, inv }
    }

    /// Creates a permutation of the given degree from a set of disjoint cycles.
    ///
    /// # Examples
    ///
    /// ```
    /// # use archsym::perm::Permutation;
    /// let p = Permutation::from_cycles(&[vec![0, 1, 2], vec![3, 4]], 6).unwrap();
    /// assert_eq!(p.map(), &[1, 2, 0, 4, 3, 5]);
    ///
    /// assert!(Permutation::from_cycles(&[vec![0, 1], vec![1, 2]], 3).is_err());
    /// ```
    pub fn from_cycles(cycles: &[Vec<usize>], degree: usize) -> Result<Self, PermError> {
        let mut map: Vec<usize> = (0..degree).collect();
        let mut seen = vec![false; degree];

        for cycle in cycles {
            for &x in cycle {
                if x >= degree {
                    return Err(PermError::DegreeMismatch {
                        expected: degree,
                        found: x + 1,
                    });
                }
                if std::mem::replace(&mut seen[x], true) {
                    return Err(PermError::DuplicatePoint(x));
                }
            }

            if cycle.len() <= 1 {
                continue;
            }
            for i in 0..cycle.len() {
                map[cycle[i]] = cycle[(i + 1) % cycle.len()];
            }
        }

        Ok(Self::from_map(map))
    }

    /// Returns the internal mapping as a slice.
    pub fn map(&self) -> &[usize] {
        &self.map
    }

    /// The degree `n` of the set `0..n` this permutation is stored on.
    pub fn degree(&self) -> usize {
        self.map.len()
    }

    /// The image of a point. Points at or beyond the stored degree are fixed.
    pub fn image(&self, x: usize) -> usize {
        if x < self.map.len() {
            self.map[x]
        } else {
            x
        }
    }

    /// The preimage of a point.
    pub fn preimage(&self, x: usize) -> usize {
        if x < self.inv.len() {
            self.inv[x]
        } else {
            x
        }
    }

    // --------------------------------------------------------------------------------------------
    // Basic Operations
    // --------------------------------------------------------------------------------------------

    /// Returns the inverse of the permutation.
    pub fn inverse(&self) -> Self {
        Permutation {
            map: self.inv.clone(),
            inv: self.map.clone(),
        }
    }

    /// Composes `self` with `other`: `(self.compose(&other))(x) = self(other(x))`.
    ///
    /// The degrees need not match; the shorter operand acts as the identity
    /// on the excess points.
    ///
    /// # Examples
    ///
    /// ```
    /// # use archsym::perm::Permutation;
    /// let p = Permutation::from_map(vec![1, 0, 2]); // (0 1)
    /// let q = Permutation::from_map(vec![0, 2, 1]); // (1 2)
    /// assert_eq!(p.compose(&q).map(), &[1, 2, 0]); // (0 1)(1 2) = (0 1 2)
    /// ```
    pub fn compose(&self, other: &Self) -> Self {
        let n = self.degree().max(other.degree());
        let map = (0..n).map(|i| self.image(other.image(i))).collect();
        Self::from_map(map)
    }

    /// Checks whether this permutation fixes every point.
    pub fn is_identity(&self) -> bool {
        self.map.iter().enumerate().all(|(i, &m)| i == m)
    }

    /// Renames every point `i` to `i + shift`; points below `shift` are fixed.
    /// The resulting degree is `self.degree() + shift`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use archsym::perm::Permutation;
    /// let p = Permutation::from_map(vec![1, 0]);
    /// assert_eq!(p.shifted(2).map(), &[0, 1, 3, 2]);
    /// ```
    pub fn shifted(&self, shift: usize) -> Self {
        let mut map: Vec<usize> = (0..shift).collect();
        map.extend(self.map.iter().map(|&j| j + shift));
        Self::from_map(map)
    }

    /// Pads the permutation with fixed points up to degree `n`. A no-op when
    /// `n` does not exceed the current degree.
    pub fn extended(&self, n: usize) -> Self {
        if n <= self.degree() {
            return self.clone();
        }
        let mut map = self.map.clone();
        map.extend(self.degree()..n);
        Self::from_map(map)
    }

    // --------------------------------------------------------------------------------------------
    // Moved Points
    // --------------------------------------------------------------------------------------------

    /// Iterates over the points not fixed by this permutation, in increasing order.
    pub fn moved(&self) -> impl Iterator<Item = usize> + '_ {
        self.map
            .iter()
            .enumerate()
            .filter(|(i, &m)| *i != m)
            .map(|(i, _)| i)
    }

    pub fn smallest_moved_point(&self) -> Option<usize> {
        self.moved().next()
    }

    pub fn largest_moved_point(&self) -> Option<usize> {
        self.moved().last()
    }

    // --------------------------------------------------------------------------------------------
    // Cycles
    // --------------------------------------------------------------------------------------------

    /// Returns the cycle decomposition, one `Vec` per cycle, fixed points omitted.
    ///
    /// # Examples
    ///
    /// ```
    /// # use archsym::perm::Permutation;
    /// let p = Permutation::from_map(vec![2, 0, 1, 3]);
    /// assert_eq!(p.cycles(), vec![vec![0, 2, 1]]);
    /// ```
    pub fn cycles(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.map.len()];
        let mut cycles = Vec::new();
        for i in 0..self.map.len() {
            if visited[i] {
                continue;
            }
            let mut cycle = Vec::new();
            let mut j = i;
            while !visited[j] {
                visited[j] = true;
                cycle.push(j);
                j = self.map[j];
            }
            if cycle.len() > 1 {
                cycles.push(cycle);
            }
        }
        cycles
    }

    /// Renders the permutation as a GAP cycle expression with a 1-indexed
    /// alphabet, e.g. `(1,3,5)(2,4)`, or `()` for the identity.
    pub fn to_gap(&self) -> String {
        let cycles = self.cycles();
        if cycles.is_empty() {
            return "()".to_string();
        }
        let mut out = String::new();
        for cycle in cycles {
            out.push('(');
            for (i, &x) in cycle.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&(x + 1).to_string());
            }
            out.push(')');
        }
        out
    }

    /// The effective length of the mapping once trailing fixed points are
    /// dropped. Two permutations are equal exactly when their trimmed
    /// mappings are equal.
    fn trimmed(&self) -> &[usize] {
        let mut n = self.map.len();
        while n > 0 && self.map[n - 1] == n - 1 {
            n -= 1;
        }
        &self.map[..n]
    }
}

impl PartialEq for Permutation {
    fn eq(&self, other: &Self) -> bool {
        self.trimmed() == other.trimmed()
    }
}

impl Eq for Permutation {}

impl std::hash::Hash for Permutation {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.trimmed().hash(state);
    }
}

impl PartialOrd for Permutation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lexicographic on the image vector, the shorter operand padded with fixed
/// points.
impl Ord for Permutation {
    fn cmp(&self, other: &Self) -> Ordering {
        let n = self.degree().max(other.degree());
        for i in 0..n {
            match self.image(i).cmp(&other.image(i)) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl Index<usize> for Permutation {
    type Output = usize;

    fn index(&self, index: usize) -> &Self::Output {
        &self.map[index]
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cycles = self.cycles();
        if cycles.is_empty() {
            return write!(f, "()");
        }
        for cycle in cycles {
            write!(f, "(")?;
            for (i, &x) in cycle.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{x}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// An ordered sequence of permutations sharing one degree.
///
/// Insertion order is preserved; duplicates are allowed until
/// [`PermSet::make_unique`] is called. Permutations of lower degree are
/// padded on insertion, higher degrees are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermSet {
    degree: usize,
    perms: Vec<Permutation>,
}

impl PermSet {
    pub fn new(degree: usize) -> Self {
        PermSet {
            degree,
            perms: Vec::new(),
        }
    }

    /// Builds a set from the given permutations, padding lower degrees.
    ///
    /// # Examples
    ///
    /// ```
    /// # use archsym::perm::{Permutation, PermSet};
    /// let gens = PermSet::from_perms(4, vec![Permutation::from_map(vec![1, 0])]).unwrap();
    /// assert_eq!(gens.iter().next().unwrap().degree(), 4);
    /// ```
    pub fn from_perms(
        degree: usize,
        perms: impl IntoIterator<Item = Permutation>,
    ) -> Result<Self, PermError> {
        let mut set = Self::new(degree);
        for p in perms {
            set.insert(p)?;
        }
        Ok(set)
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn len(&self) -> usize {
        self.perms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.perms.is_empty()
    }

    pub fn insert(&mut self, perm: Permutation) -> Result<(), PermError> {
        if perm.degree() > self.degree {
            return Err(PermError::DegreeMismatch {
                expected: self.degree,
                found: perm.degree(),
            });
        }
        self.perms.push(perm.extended(self.degree));
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Permutation> {
        self.perms.iter()
    }

    pub fn get(&self, i: usize) -> &Permutation {
        &self.perms[i]
    }

    /// Removes duplicates and identity permutations, keeping first occurrences.
    pub fn make_unique(&mut self) {
        let mut seen = AHashSet::new();
        self.perms
            .retain(|p| !p.is_identity() && seen.insert(p.clone()));
    }

    /// Appends the inverse of every contained permutation that is not
    /// already present.
    pub fn insert_inverses(&mut self) {
        let seen: AHashSet<Permutation> = self.perms.iter().cloned().collect();
        let mut inverses = Vec::new();
        for p in &self.perms {
            let inv = p.inverse();
            if !seen.contains(&inv) {
                inverses.push(inv);
            }
        }
        self.perms.extend(inverses);
    }

    /// The union of moved points over all contained permutations.
    pub fn support(&self) -> BitVec {
        let mut support = BitVec::repeat(false, self.degree);
        for p in &self.perms {
            for x in p.moved() {
                support.set(x, true);
            }
        }
        support
    }

    pub fn smallest_moved_point(&self) -> Option<usize> {
        self.perms
            .iter()
            .filter_map(Permutation::smallest_moved_point)
            .min()
    }

    pub fn largest_moved_point(&self) -> Option<usize> {
        self.perms
            .iter()
            .filter_map(Permutation::largest_moved_point)
            .max()
    }
}

impl<'a> IntoIterator for &'a PermSet {
    type Item = &'a Permutation;
    type IntoIter = std::slice::Iter<'a, Permutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.perms.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cycles() {
        let p = Permutation::from_cycles(&[vec![0, 3, 2], vec![1, 4]], 5).unwrap();
        assert_eq!(p.map(), &[3, 4, 0, 2, 1]);

        let p = Permutation::from_cycles(&[vec![0, 1, 2]], 3).unwrap();
        assert_eq!(p.map(), &[1, 2, 0]);

        assert!(Permutation::from_cycles(&[vec![0, 1], vec![1, 2]], 3).is_err());
        assert!(Permutation::from_cycles(&[vec![0, 5]], 3).is_err());

        let p = Permutation::from_cycles(&[], 4).unwrap();
        assert!(p.is_identity());
    }

    #[test]
    fn test_compose() {
        // p1: 0->1, 1->2, 2->0 and its inverse compose to the identity
        let p1 = Permutation::from_map(vec![1, 2, 0]);
        let p2 = Permutation::from_map(vec![2, 0, 1]);
        assert_eq!(p1.compose(&p2), Permutation::id(3));
        assert_eq!(p2.compose(&p1), Permutation::id(3));

        // composition applies the right operand first
        let p1 = Permutation::from_map(vec![1, 0, 2]); // (0 1)
        let p2 = Permutation::from_map(vec![0, 2, 1]); // (1 2)
        assert_eq!(p1.compose(&p2).map(), &[1, 2, 0]);
        assert_eq!(p2.compose(&p1).map(), &[2, 0, 1]);

        // associativity
        let p3 = Permutation::from_map(vec![0, 2, 1]);
        assert_eq!(
            p1.compose(&p2).compose(&p3),
            p1.compose(&p2.compose(&p3))
        );
    }

    #[test]
    fn test_compose_mixed_degrees() {
        let p = Permutation::from_map(vec![1, 0]);
        let q = Permutation::from_map(vec![0, 1, 3, 2]);
        let c = p.compose(&q);
        assert_eq!(c.map(), &[1, 0, 3, 2]);
        assert_eq!(c, q.compose(&p));
    }

    #[test]
    fn test_equality_modulo_extension() {
        let p = Permutation::from_map(vec![1, 0]);
        let q = Permutation::from_map(vec![1, 0, 2, 3]);
        assert_eq!(p, q);
        assert_eq!(p, p.extended(7));
        assert_ne!(p, Permutation::id(2));

        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let hash = |p: &Permutation| {
            let mut h = DefaultHasher::new();
            p.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&p), hash(&q));
    }

    #[test]
    fn test_ordering() {
        let id = Permutation::id(3);
        let p = Permutation::from_map(vec![1, 0, 2]);
        assert!(id < p);
        // extension does not change the ordering
        assert_eq!(p.cmp(&p.extended(5)), Ordering::Equal);
        assert!(Permutation::from_map(vec![0, 2, 1]) < p);
    }

    #[test]
    fn test_shifted_extended() {
        let p = Permutation::from_cycles(&[vec![0, 1, 2]], 3).unwrap();
        let s = p.shifted(2);
        assert_eq!(s.degree(), 5);
        assert_eq!(s.map(), &[0, 1, 3, 4, 2]);

        let e = p.extended(5);
        assert_eq!(e.map(), &[1, 2, 0, 3, 4]);
        assert_eq!(p.extended(2), p);
    }

    #[test]
    fn test_moved_points() {
        let p = Permutation::from_cycles(&[vec![2, 5]], 7).unwrap();
        assert_eq!(p.smallest_moved_point(), Some(2));
        assert_eq!(p.largest_moved_point(), Some(5));
        assert_eq!(Permutation::id(4).smallest_moved_point(), None);
    }

    #[test]
    fn test_gap_rendering() {
        let p = Permutation::from_cycles(&[vec![0, 2, 4], vec![1, 3]], 5).unwrap();
        assert_eq!(p.to_gap(), "(1,3,5)(2,4)");
        assert_eq!(Permutation::id(5).to_gap(), "()");
    }

    #[test]
    fn test_perm_set_degree_handling() {
        let mut set = PermSet::new(3);
        set.insert(Permutation::from_map(vec![1, 0])).unwrap();
        assert_eq!(set.get(0).degree(), 3);

        let err = set.insert(Permutation::id(5)).unwrap_err();
        assert!(matches!(err, PermError::DegreeMismatch { .. }));
    }

    #[test]
    fn test_perm_set_queries() {
        let set = PermSet::from_perms(
            6,
            vec![
                Permutation::from_cycles(&[vec![1, 2]], 6).unwrap(),
                Permutation::from_cycles(&[vec![4, 5]], 6).unwrap(),
            ],
        )
        .unwrap();

        assert_eq!(set.smallest_moved_point(), Some(1));
        assert_eq!(set.largest_moved_point(), Some(5));

        let support = set.support();
        let moved: Vec<usize> = support.iter_ones().collect();
        assert_eq!(moved, vec![1, 2, 4, 5]);
    }

    #[test]
    fn test_make_unique() {
        let mut set = PermSet::from_perms(
            3,
            vec![
                Permutation::id(3),
                Permutation::from_map(vec![1, 0, 2]),
                Permutation::from_map(vec![1, 0, 2]),
            ],
        )
        .unwrap();
        set.make_unique();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_insert_inverses() {
        let cycle = Permutation::from_cycles(&[vec![0, 1, 2]], 3).unwrap();
        let mut set = PermSet::from_perms(3, vec![cycle.clone()]).unwrap();
        set.insert_inverses();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(1), &cycle.inverse());

        // an involution is its own inverse, nothing to add
        let mut set =
            PermSet::from_perms(2, vec![Permutation::from_map(vec![1, 0])]).unwrap();
        set.insert_inverses();
        assert_eq!(set.len(), 1);
    }
}
