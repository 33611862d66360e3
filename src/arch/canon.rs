//! Reduction of typed architecture graphs to a colored-graph automorphism
//! problem.
//!
//! Channel types are folded into plain vertex-colored adjacency by a
//! binary expansion: the graph is replicated across `bitlen(#channel
//! types)` levels, a channel of type `t` contributes its edge on level `l`
//! exactly when bit `l` of `t + 1` is set, and vertical edges tie each
//! vertex to its copy on the previous level. Every level partitions its
//! vertices by processor type, each level with its own color range, so
//! automorphisms preserve levels and the vertical edges force them to act
//! identically on each one. The generators of the layered graph restricted
//! to the base level are then exactly the automorphisms of the typed
//! graph.
//!
//! The search backend sits behind [`CanonBackend`] so an external
//! canonicalization library can be dropped in; the built-in
//! [`BacktrackBackend`] emits one automorphism per (fixed prefix, image)
//! pair, which forms a strong generating set relative to the vertex order.

use bitvec::vec::BitVec;
use tracing::debug;

use super::{ArchError, ArchGraph, MAX_TYPES};
use crate::bsgs::BsgsOptions;
use crate::group::PermGroup;
use crate::perm::Permutation;

/// A vertex-colored undirected graph (self-loops allowed), adjacency kept
/// as one bit row per vertex.
#[derive(Debug, Clone)]
pub struct ColoredGraph {
    colors: Vec<usize>,
    adj: Vec<BitVec>,
}

impl ColoredGraph {
    pub fn new(colors: Vec<usize>) -> Self {
        let n = colors.len();
        ColoredGraph {
            colors,
            adj: vec![BitVec::repeat(false, n); n],
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.colors.len()
    }

    pub fn color(&self, v: usize) -> usize {
        self.colors[v]
    }

    pub fn add_edge(&mut self, u: usize, v: usize) {
        self.adj[u].set(v, true);
        self.adj[v].set(u, true);
    }

    pub fn adjacent(&self, u: usize, v: usize) -> bool {
        self.adj[u][v]
    }
}

/// The contract of the external colored-graph canonicalization call: a
/// generating set of the color- and adjacency-preserving vertex
/// bijections.
pub trait CanonBackend {
    fn automorphism_generators(&self, graph: &ColoredGraph) -> Vec<Permutation>;
}

/// Complete backtracking over color classes.
///
/// For every vertex `v` (in index order) and every candidate image `w`,
/// one automorphism fixing `0..v` and mapping `v` to `w` is searched for;
/// the found elements are coset representatives along the pointwise
/// stabilizer chain of `0, 1, ...` and therefore generate the full
/// automorphism group.
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktrackBackend;

impl CanonBackend for BacktrackBackend {
    fn automorphism_generators(&self, graph: &ColoredGraph) -> Vec<Permutation> {
        let n = graph.num_vertices();
        let degrees: Vec<usize> = (0..n).map(|v| graph.adj[v].count_ones()).collect();

        let mut generators = Vec::new();
        for v in 0..n {
            for w in v + 1..n {
                if graph.colors[v] != graph.colors[w] || degrees[v] != degrees[w] {
                    continue;
                }

                let mut mapping = vec![usize::MAX; n];
                for u in 0..v {
                    mapping[u] = u;
                }
                let mut used = vec![false; n];
                used[..v].iter_mut().for_each(|b| *b = true);

                if !consistent(graph, &mapping, v, w) {
                    continue;
                }
                mapping[v] = w;
                used[w] = true;

                if complete(graph, &degrees, &mut mapping, &mut used, v + 1) {
                    generators.push(Permutation::from_map(mapping));
                }
            }
        }
        debug!(n, generators = generators.len(), "backtracking search done");
        generators
    }
}

/// Whether assigning `w` as the image of `v` agrees with every assignment
/// made so far (including the self-loop at `v`).
fn consistent(graph: &ColoredGraph, mapping: &[usize], v: usize, w: usize) -> bool {
    if graph.adjacent(v, v) != graph.adjacent(w, w) {
        return false;
    }
    for u in 0..graph.num_vertices() {
        if mapping[u] == usize::MAX {
            continue;
        }
        if graph.adjacent(v, u) != graph.adjacent(w, mapping[u]) {
            return false;
        }
    }
    true
}

/// Depth-first completion of a partial mapping; stops at the first full
/// automorphism.
fn complete(
    graph: &ColoredGraph,
    degrees: &[usize],
    mapping: &mut Vec<usize>,
    used: &mut Vec<bool>,
    next: usize,
) -> bool {
    let n = graph.num_vertices();
    if next == n {
        return true;
    }

    for w in 0..n {
        if used[w]
            || graph.colors[next] != graph.colors[w]
            || degrees[next] != degrees[w]
            || !consistent(graph, mapping, next, w)
        {
            continue;
        }
        mapping[next] = w;
        used[w] = true;
        if complete(graph, degrees, mapping, used, next + 1) {
            return true;
        }
        mapping[next] = usize::MAX;
        used[w] = false;
    }
    false
}

/// Builds the layered colored graph for a raw architecture graph.
pub(super) fn layered_graph(arch: &ArchGraph) -> Result<ColoredGraph, ArchError> {
    if arch.num_processor_types() > MAX_TYPES || arch.num_channel_types() > MAX_TYPES {
        return Err(ArchError::TooManyTypes);
    }

    let n = arch.num_processors();
    let num_types = arch.num_channel_types();
    let levels = if num_types == 0 {
        1
    } else {
        num_types.ilog2() as usize + 1
    };

    let num_proc_types = arch.num_processor_types().max(1);
    let colors: Vec<usize> = (0..levels)
        .flat_map(|level| {
            arch.processor_type_indices()
                .map(move |t| level * num_proc_types + t)
        })
        .collect();
    let mut graph = ColoredGraph::new(colors);

    for level in 1..levels {
        for v in 0..n {
            graph.add_edge(level * n + v, (level - 1) * n + v);
        }
    }

    for &(from, to, channel_type) in arch.channel_list() {
        let encoding = channel_type + 1;
        for level in 0..levels {
            if encoding >> level & 1 == 1 {
                graph.add_edge(level * n + from, level * n + to);
            }
        }
    }

    Ok(graph)
}

/// The automorphism group of a raw architecture graph: layered reduction,
/// backend search, restriction of the generators to the base level.
pub(super) fn automorphisms(
    arch: &ArchGraph,
    options: &BsgsOptions,
) -> Result<PermGroup, ArchError> {
    let layered = layered_graph(arch)?;
    let generators = BacktrackBackend.automorphism_generators(&layered);

    let n = arch.num_processors();
    let mut restricted = Vec::with_capacity(generators.len());
    for g in generators {
        if (0..n).any(|v| g.image(v) >= n) {
            // a generator leaking across levels breaks the reduction's
            // base-level closure
            return Err(ArchError::Unreachable);
        }
        restricted.push(Permutation::from_map((0..n).map(|v| g.image(v)).collect()));
    }

    Ok(PermGroup::with_options(n, restricted, options)?)
}
