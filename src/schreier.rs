//! Transversal storage for stabilizer chains.
//!
//! For a base point `root` and a generating set, a Schreier structure
//! records the fundamental orbit of `root` together with one coset
//! representative `u_x` per orbit point (`u_x(root) = x`) and the
//! generator labelling the incoming BFS edge of each point. Three storage
//! trade-offs are provided behind the [`SchreierStructure`] interface:
//!
//! - [`ExplicitTransversal`] stores every representative as a full
//!   permutation: constant-time lookup, highest memory.
//! - [`SchreierTree`] stores only the labelling generator per edge;
//!   lookup climbs parent indices to the root composing labels.
//! - [`ShallowSchreierTree`] bounds the climb to `O(log |orbit|)` by
//!   installing composed representatives as redundant labels whenever a
//!   node ends up too deep.
//!
//! Trees are arenas keyed by orbit point with integer parent points and
//! label indices; representatives are computed by climbing parent entries,
//! never by chasing pointers.

use ahash::AHashMap;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::perm::{PermSet, Permutation};

pub mod queue;

/// Storage strategy for the per-level transversals of a stabilizer chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransversalKind {
    #[default]
    Explicit,
    SchreierTrees,
    ShallowSchreierTrees,
}

/// Common interface over the three transversal representations.
pub trait SchreierStructure {
    fn degree(&self) -> usize;

    fn root(&self) -> usize;

    /// The fundamental orbit in BFS insertion order.
    fn orbit(&self) -> &IndexSet<usize>;

    fn contains(&self, x: usize) -> bool {
        self.orbit().contains(&x)
    }

    /// The coset representative `u_x` with `u_x(root) = x`, or `None` when
    /// `x` lies outside the orbit.
    fn transversal(&self, x: usize) -> Option<Permutation>;

    /// Whether `gen` labels the incoming edge of `x`.
    fn incoming(&self, x: usize, gen: &Permutation) -> bool;

    /// Grows the orbit and transversal against a larger generating set.
    /// Existing entries are kept; the generating set must contain every
    /// generator the structure was previously extended with.
    fn extend(&mut self, generators: &PermSet);
}

/// A tagged transversal; the variant is chosen once at chain construction.
#[derive(Debug, Clone)]
pub enum Transversal {
    Explicit(ExplicitTransversal),
    Tree(SchreierTree),
    Shallow(ShallowSchreierTree),
}

impl Transversal {
    pub fn new(kind: TransversalKind, degree: usize, root: usize) -> Self {
        match kind {
            TransversalKind::Explicit => {
                Transversal::Explicit(ExplicitTransversal::new(degree, root))
            }
            TransversalKind::SchreierTrees => {
                Transversal::Tree(SchreierTree::new(degree, root, false))
            }
            TransversalKind::ShallowSchreierTrees => {
                Transversal::Shallow(ShallowSchreierTree::new(degree, root))
            }
        }
    }
}

impl SchreierStructure for Transversal {
    fn degree(&self) -> usize {
        match self {
            Transversal::Explicit(t) => t.degree(),
            Transversal::Tree(t) => t.degree(),
            Transversal::Shallow(t) => t.degree(),
        }
    }

    fn root(&self) -> usize {
        match self {
            Transversal::Explicit(t) => t.root(),
            Transversal::Tree(t) => t.root(),
            Transversal::Shallow(t) => t.root(),
        }
    }

    fn orbit(&self) -> &IndexSet<usize> {
        match self {
            Transversal::Explicit(t) => t.orbit(),
            Transversal::Tree(t) => t.orbit(),
            Transversal::Shallow(t) => t.orbit(),
        }
    }

    fn transversal(&self, x: usize) -> Option<Permutation> {
        match self {
            Transversal::Explicit(t) => t.transversal(x),
            Transversal::Tree(t) => t.transversal(x),
            Transversal::Shallow(t) => t.transversal(x),
        }
    }

    fn incoming(&self, x: usize, gen: &Permutation) -> bool {
        match self {
            Transversal::Explicit(t) => t.incoming(x, gen),
            Transversal::Tree(t) => t.incoming(x, gen),
            Transversal::Shallow(t) => t.incoming(x, gen),
        }
    }

    fn extend(&mut self, generators: &PermSet) {
        match self {
            Transversal::Explicit(t) => t.extend(generators),
            Transversal::Tree(t) => t.extend(generators),
            Transversal::Shallow(t) => t.extend(generators),
        }
    }
}

/// Transversal store holding one full permutation per orbit point.
#[derive(Debug, Clone)]
pub struct ExplicitTransversal {
    degree: usize,
    root: usize,
    orbit: IndexSet<usize>,
    reps: AHashMap<usize, Permutation>,
    labels: AHashMap<usize, Permutation>,
}

impl ExplicitTransversal {
    pub fn new(degree: usize, root: usize) -> Self {
        let mut orbit = IndexSet::new();
        orbit.insert(root);
        let mut reps = AHashMap::new();
        reps.insert(root, Permutation::id(degree));

        ExplicitTransversal {
            degree,
            root,
            orbit,
            reps,
            labels: AHashMap::new(),
        }
    }
}

impl SchreierStructure for ExplicitTransversal {
    fn degree(&self) -> usize {
        self.degree
    }

    fn root(&self) -> usize {
        self.root
    }

    fn orbit(&self) -> &IndexSet<usize> {
        &self.orbit
    }

    fn transversal(&self, x: usize) -> Option<Permutation> {
        self.reps.get(&x).cloned()
    }

    fn incoming(&self, x: usize, gen: &Permutation) -> bool {
        self.labels.get(&x) == Some(gen)
    }

    fn extend(&mut self, generators: &PermSet) {
        let mut cursor = 0;
        while cursor < self.orbit.len() {
            let x = *self.orbit.get_index(cursor).expect("cursor within orbit");
            for g in generators {
                let y = g.image(x);
                if self.orbit.insert(y) {
                    let u_y =
                        g.compose(self.reps.get(&x).expect("orbit point has a representative"));
                    self.reps.insert(y, u_y);
                    self.labels.insert(y, g.clone());
                }
            }
            cursor += 1;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TreeNode {
    parent: usize,
    label: usize,
}

/// Transversal store keeping only the labelling generator per tree edge.
///
/// `transversal` climbs from the queried point to the root and composes
/// the collected labels outward-in.
#[derive(Debug, Clone)]
pub struct SchreierTree {
    degree: usize,
    root: usize,
    orbit: IndexSet<usize>,
    nodes: AHashMap<usize, TreeNode>,
    labels: Vec<Permutation>,
    depths: AHashMap<usize, usize>,
    /// When set, nodes deeper than [`shallow_depth_bound`] of the orbit
    /// size are re-hung directly off the root.
    shallow: bool,
}

fn shallow_depth_bound(orbit_len: usize) -> usize {
    2 * orbit_len.max(1).ilog2() as usize + 1
}

impl SchreierTree {
    fn new(degree: usize, root: usize, shallow: bool) -> Self {
        let mut orbit = IndexSet::new();
        orbit.insert(root);
        let mut depths = AHashMap::new();
        depths.insert(root, 0);

        SchreierTree {
            degree,
            root,
            orbit,
            nodes: AHashMap::new(),
            labels: Vec::new(),
            depths,
            shallow,
        }
    }

    fn intern_label(&mut self, label: &Permutation) -> usize {
        match self.labels.iter().position(|l| l == label) {
            Some(idx) => idx,
            None => {
                self.labels.push(label.clone());
                self.labels.len() - 1
            }
        }
    }

    fn climb(&self, x: usize) -> Option<Permutation> {
        if !self.orbit.contains(&x) {
            return None;
        }

        let mut path = Vec::new();
        let mut current = x;
        while current != self.root {
            let node = self.nodes.get(&current).expect("non-root orbit point has a node");
            path.push(node.label);
            current = node.parent;
        }

        let mut rep = Permutation::id(self.degree);
        for &label in path.iter().rev() {
            rep = self.labels[label].compose(&rep);
        }
        Some(rep)
    }
}

impl SchreierStructure for SchreierTree {
    fn degree(&self) -> usize {
        self.degree
    }

    fn root(&self) -> usize {
        self.root
    }

    fn orbit(&self) -> &IndexSet<usize> {
        &self.orbit
    }

    fn transversal(&self, x: usize) -> Option<Permutation> {
        self.climb(x)
    }

    fn incoming(&self, x: usize, gen: &Permutation) -> bool {
        self.nodes
            .get(&x)
            .is_some_and(|node| &self.labels[node.label] == gen)
    }

    fn extend(&mut self, generators: &PermSet) {
        let mut cursor = 0;
        while cursor < self.orbit.len() {
            let x = *self.orbit.get_index(cursor).expect("cursor within orbit");
            for g in generators {
                let y = g.image(x);
                if self.orbit.insert(y) {
                    let label = self.intern_label(g);
                    self.nodes.insert(y, TreeNode { parent: x, label });
                    let depth = self.depths[&x] + 1;
                    self.depths.insert(y, depth);

                    if self.shallow && depth > shallow_depth_bound(self.orbit.len()) {
                        // too deep: install the full representative as a
                        // redundant label and hang the node off the root
                        let rep = self.climb(y).expect("freshly inserted point");
                        let label = self.intern_label(&rep);
                        self.nodes.insert(
                            y,
                            TreeNode {
                                parent: self.root,
                                label,
                            },
                        );
                        self.depths.insert(y, 1);
                    }
                }
            }
            cursor += 1;
        }
    }
}

/// A [`SchreierTree`] whose depth is kept `O(log |orbit|)` by adding
/// redundant labels during extension.
#[derive(Debug, Clone)]
pub struct ShallowSchreierTree {
    tree: SchreierTree,
}

impl ShallowSchreierTree {
    pub fn new(degree: usize, root: usize) -> Self {
        ShallowSchreierTree {
            tree: SchreierTree::new(degree, root, true),
        }
    }
}

impl SchreierStructure for ShallowSchreierTree {
    fn degree(&self) -> usize {
        self.tree.degree()
    }

    fn root(&self) -> usize {
        self.tree.root()
    }

    fn orbit(&self) -> &IndexSet<usize> {
        self.tree.orbit()
    }

    fn transversal(&self, x: usize) -> Option<Permutation> {
        self.tree.transversal(x)
    }

    fn incoming(&self, x: usize, gen: &Permutation) -> bool {
        self.tree.incoming(x, gen)
    }

    fn extend(&mut self, generators: &PermSet) {
        self.tree.extend(generators);
    }
}

impl Transversal {
    /// Plain Schreier tree constructor, used directly by tests; chains go
    /// through [`Transversal::new`].
    pub fn schreier_tree(degree: usize, root: usize) -> SchreierTree {
        SchreierTree::new(degree, root, false)
    }
}
