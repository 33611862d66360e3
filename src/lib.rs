//! # Archsym
//!
//! Archsym computes and exploits the automorphism groups of hierarchical
//! processor architectures to canonicalize task allocations into orbit
//! representatives: two allocations related by an architecture symmetry
//! need only be analyzed once by downstream tools.
//!
//! The crate is built from two tightly coupled subsystems. A permutation
//! group engine constructs base and strong generating sets via variants of
//! the Schreier-Sims algorithm with pluggable transversal storage, and on
//! top of that provides membership testing, enumeration, random sampling,
//! products, block systems and structural decompositions. A symmetry
//! reduction engine composes architecture descriptions into automorphism
//! groups (direct products for clusters, wreath products for uniform super
//! graphs, a colored-graph reduction for raw graphs) and maps task
//! allocations to canonical orbit representatives.

pub mod arch;
pub mod bsgs;
pub mod group;
pub mod mapping;
pub mod orbit;
pub mod parse;
pub mod perm;
pub mod schreier;
