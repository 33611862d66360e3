//! Architecture graphs and their composition tree.
//!
//! An [`ArchGraphSystem`] is a tagged tree: raw typed processor graphs at
//! the leaves, clusters (direct products) and uniform super graphs (wreath
//! products) as interior nodes, plus a wrapper for precomputed
//! automorphism groups. Each node caches its automorphism group on first
//! computation and answers representative queries for task mappings via
//! one of the three strategies in [`ReprMethod`](crate::mapping::ReprMethod).

use std::collections::VecDeque;

use ahash::AHashSet;
use thiserror::Error;
use tracing::debug;

use crate::bsgs::BsgsOptions;
use crate::group::{GroupError, PermGroup};
use crate::mapping::{ReprMethod, ReprOptions, TaskMapping, TaskOrbits};

pub mod canon;

/// Hard limit inherited from the colored-graph reduction.
pub const MAX_TYPES: usize = 7;

pub type ProcessorType = usize;
pub type ChannelType = usize;
pub type Processor = usize;

#[derive(Error, Debug)]
pub enum ArchError {
    #[error("cluster contains no subsystems")]
    EmptyComposite,

    #[error("more than {MAX_TYPES} processor or channel types")]
    TooManyTypes,

    #[error("automorphism reduction produced generators crossing levels")]
    Unreachable,

    #[error(transparent)]
    Group(#[from] GroupError),
}

/// A raw architecture graph: typed processors connected by typed channels
/// (directions are ignored, self-channels are allowed).
#[derive(Debug, Clone, Default)]
pub struct ArchGraph {
    processor_types: Vec<String>,
    channel_types: Vec<String>,
    processors: Vec<ProcessorType>,
    channels: Vec<(Processor, Processor, ChannelType)>,
}

impl ArchGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_processor_type(&mut self, label: &str) -> ProcessorType {
        self.processor_types.push(label.to_string());
        self.processor_types.len() - 1
    }

    pub fn new_channel_type(&mut self, label: &str) -> ChannelType {
        self.channel_types.push(label.to_string());
        self.channel_types.len() - 1
    }

    pub fn add_processor(&mut self, processor_type: ProcessorType) -> Processor {
        self.processors.push(processor_type);
        self.processors.len() - 1
    }

    pub fn add_channel(&mut self, from: Processor, to: Processor, channel_type: ChannelType) {
        self.channels.push((from, to, channel_type));
    }

    /// Adds a channel of the given type between every unordered pair of
    /// processors.
    pub fn fully_connect(&mut self, channel_type: ChannelType) {
        for from in 0..self.processors.len() {
            for to in from + 1..self.processors.len() {
                self.add_channel(from, to, channel_type);
            }
        }
    }

    /// Adds a self-channel of the given type on every processor.
    pub fn self_connect(&mut self, channel_type: ChannelType) {
        for p in 0..self.processors.len() {
            self.add_channel(p, p, channel_type);
        }
    }

    pub fn num_processors(&self) -> usize {
        self.processors.len()
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_processor_types(&self) -> usize {
        self.processor_types.len()
    }

    pub fn num_channel_types(&self) -> usize {
        self.channel_types.len()
    }

    pub(crate) fn processor_type_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.processors.iter().copied()
    }

    pub(crate) fn channel_list(&self) -> &[(Processor, Processor, ChannelType)] {
        &self.channels
    }
}

/// Ordered list of subsystems composed as a direct product.
#[derive(Debug, Clone, Default)]
pub struct ArchGraphCluster {
    subsystems: Vec<ArchGraphSystem>,
}

impl ArchGraphCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subsystem(&mut self, subsystem: ArchGraphSystem) {
        self.subsystems.push(subsystem);
    }

    pub fn num_subsystems(&self) -> usize {
        self.subsystems.len()
    }
}

/// A prototype subsystem replicated over an outer super graph, composed as
/// a wreath product.
#[derive(Debug, Clone)]
pub struct ArchUniformSuperGraph {
    outer: Box<ArchGraphSystem>,
    proto: Box<ArchGraphSystem>,
}

impl ArchUniformSuperGraph {
    pub fn new(outer: ArchGraphSystem, proto: ArchGraphSystem) -> Self {
        ArchUniformSuperGraph {
            outer: Box::new(outer),
            proto: Box::new(proto),
        }
    }
}

/// A subsystem given directly by its automorphism group.
#[derive(Debug, Clone)]
pub struct ArchGraphAutomorphisms {
    group: PermGroup,
}

impl ArchGraphAutomorphisms {
    pub fn new(group: PermGroup) -> Self {
        ArchGraphAutomorphisms { group }
    }
}

/// A node of the architecture composition tree.
#[derive(Debug, Clone)]
pub enum ArchGraphSystem {
    Graph {
        graph: ArchGraph,
        cached: Option<PermGroup>,
    },
    Cluster {
        cluster: ArchGraphCluster,
        cached: Option<PermGroup>,
    },
    SuperGraph {
        super_graph: ArchUniformSuperGraph,
        cached: Option<PermGroup>,
    },
    Automorphisms(ArchGraphAutomorphisms),
}

impl From<ArchGraph> for ArchGraphSystem {
    fn from(graph: ArchGraph) -> Self {
        ArchGraphSystem::Graph {
            graph,
            cached: None,
        }
    }
}

impl From<ArchGraphCluster> for ArchGraphSystem {
    fn from(cluster: ArchGraphCluster) -> Self {
        ArchGraphSystem::Cluster {
            cluster,
            cached: None,
        }
    }
}

impl From<ArchUniformSuperGraph> for ArchGraphSystem {
    fn from(super_graph: ArchUniformSuperGraph) -> Self {
        ArchGraphSystem::SuperGraph {
            super_graph,
            cached: None,
        }
    }
}

impl From<PermGroup> for ArchGraphSystem {
    fn from(group: PermGroup) -> Self {
        ArchGraphSystem::Automorphisms(ArchGraphAutomorphisms::new(group))
    }
}

impl ArchGraphSystem {
    pub fn num_processors(&self) -> usize {
        match self {
            ArchGraphSystem::Graph { graph, .. } => graph.num_processors(),
            ArchGraphSystem::Cluster { cluster, .. } => cluster
                .subsystems
                .iter()
                .map(ArchGraphSystem::num_processors)
                .sum(),
            ArchGraphSystem::SuperGraph { super_graph, .. } => {
                super_graph.outer.num_processors() * super_graph.proto.num_processors()
            }
            ArchGraphSystem::Automorphisms(a) => a.group.degree(),
        }
    }

    pub fn num_channels(&self) -> usize {
        match self {
            ArchGraphSystem::Graph { graph, .. } => graph.num_channels(),
            ArchGraphSystem::Cluster { cluster, .. } => cluster
                .subsystems
                .iter()
                .map(ArchGraphSystem::num_channels)
                .sum(),
            ArchGraphSystem::SuperGraph { super_graph, .. } => {
                super_graph.outer.num_channels()
                    + super_graph.outer.num_processors() * super_graph.proto.num_channels()
            }
            ArchGraphSystem::Automorphisms(_) => 0,
        }
    }

    /// The automorphism group of this (sub)system, cached per instance.
    pub fn automorphisms(&mut self, options: &BsgsOptions) -> Result<PermGroup, ArchError> {
        match self {
            ArchGraphSystem::Graph { graph, cached } => {
                if let Some(group) = cached {
                    return Ok(group.clone());
                }
                let group = canon::automorphisms(graph, options)?;
                debug!(order = %group.order(), "graph automorphisms computed");
                *cached = Some(group.clone());
                Ok(group)
            }
            ArchGraphSystem::Cluster { cluster, cached } => {
                if let Some(group) = cached {
                    return Ok(group.clone());
                }
                if cluster.subsystems.is_empty() {
                    return Err(ArchError::EmptyComposite);
                }
                let mut groups = Vec::with_capacity(cluster.subsystems.len());
                for subsystem in &mut cluster.subsystems {
                    groups.push(subsystem.automorphisms(options)?);
                }
                let group = PermGroup::direct_product(&groups)?;
                *cached = Some(group.clone());
                Ok(group)
            }
            ArchGraphSystem::SuperGraph {
                super_graph,
                cached,
            } => {
                if let Some(group) = cached {
                    return Ok(group.clone());
                }
                let proto = super_graph.proto.automorphisms(options)?;
                let outer = super_graph.outer.automorphisms(options)?;
                let group = PermGroup::wreath_product(&proto, &outer, options)?;
                *cached = Some(group.clone());
                Ok(group)
            }
            ArchGraphSystem::Automorphisms(a) => Ok(a.group.clone()),
        }
    }

    /// A GAP expression reconstructing this system's automorphism group.
    pub fn to_gap(&mut self) -> Result<String, ArchError> {
        match self {
            ArchGraphSystem::Graph { .. } => {
                let group = self.automorphisms(&BsgsOptions::default())?;
                Ok(gap_group(&group))
            }
            ArchGraphSystem::Cluster { cluster, .. } => {
                if cluster.subsystems.is_empty() {
                    return Ok("()".to_string());
                }
                let parts = cluster
                    .subsystems
                    .iter_mut()
                    .map(ArchGraphSystem::to_gap)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("DirectProduct({})", parts.join(",")))
            }
            ArchGraphSystem::SuperGraph { super_graph, .. } => Ok(format!(
                "WreathProduct({},{})",
                super_graph.proto.to_gap()?,
                super_graph.outer.to_gap()?
            )),
            ArchGraphSystem::Automorphisms(a) => Ok(gap_group(&a.group)),
        }
    }

    // --------------------------------------------------------------------------------------------
    // Representative Engine
    // --------------------------------------------------------------------------------------------

    /// Maps a task allocation to its canonical orbit representative: the
    /// lexicographic minimum of its orbit under this system's automorphism
    /// group, restricted to the window starting at `options.offset`.
    ///
    /// Clusters delegate structurally, walking their subsystems left to
    /// right while advancing the window. The result is recorded in
    /// `orbits` when a cache is supplied.
    pub fn repr(
        &mut self,
        mapping: &TaskMapping,
        options: &ReprOptions,
        mut orbits: Option<&mut TaskOrbits>,
    ) -> Result<TaskMapping, ArchError> {
        debug!(%mapping, "representative requested");

        let representative = match self {
            ArchGraphSystem::Cluster { cluster, .. } => {
                if cluster.subsystems.is_empty() {
                    return Err(ArchError::EmptyComposite);
                }
                let mut current = mapping.clone();
                let mut options = *options;
                for subsystem in &mut cluster.subsystems {
                    current = subsystem.repr(&current, &options, None)?;
                    options.offset += subsystem.num_processors();
                }
                current
            }
            _ => {
                let group = self.automorphisms(&BsgsOptions::default())?;
                let cache = orbits.as_deref();
                match options.method {
                    ReprMethod::Iterate => min_elem_iterate(&group, mapping, options, cache),
                    ReprMethod::LocalSearch => min_elem_local_search(&group, mapping, options),
                    ReprMethod::Orbits => min_elem_orbits(&group, mapping, options, cache),
                }
            }
        };

        if let Some(orbits) = orbits.as_deref_mut() {
            orbits.insert(representative.clone());
        }
        Ok(representative)
    }
}

fn gap_group(group: &PermGroup) -> String {
    if group.generators().is_empty() {
        return "Group(())".to_string();
    }
    let gens: Vec<String> = group.generators().iter().map(|g| g.to_gap()).collect();
    format!("Group({})", gens.join(","))
}

/// Whether a candidate is already a known representative, allowing the
/// exact strategies to stop early.
fn is_repr(mapping: &TaskMapping, orbits: Option<&TaskOrbits>) -> bool {
    orbits.is_some_and(|cache| cache.contains(mapping))
}

/// Exact search by full group enumeration.
fn min_elem_iterate(
    group: &PermGroup,
    tasks: &TaskMapping,
    options: &ReprOptions,
    orbits: Option<&TaskOrbits>,
) -> TaskMapping {
    let mut representative = tasks.clone();

    for element in group {
        if tasks.less_than(&representative, &element, options.offset) {
            representative = tasks.permuted(&element, options.offset);

            if is_repr(&representative, orbits) {
                return representative;
            }
        }
    }

    debug!(%representative, "minimal orbit element found by iteration");
    representative
}

/// Approximate search: descend along the strong generators until no
/// generator decreases the mapping.
fn min_elem_local_search(
    group: &PermGroup,
    tasks: &TaskMapping,
    options: &ReprOptions,
) -> TaskMapping {
    let mut representative = tasks.clone();

    let mut stationary = false;
    while !stationary {
        stationary = true;
        for generator in group.generators() {
            if representative.less_than(&representative, generator, options.offset) {
                representative = representative.permuted(generator, options.offset);
                stationary = false;
            }
        }
    }

    debug!(%representative, "approximate minimal orbit element found");
    representative
}

/// Exact search by BFS over the mapping's orbit.
fn min_elem_orbits(
    group: &PermGroup,
    tasks: &TaskMapping,
    options: &ReprOptions,
    orbits: Option<&TaskOrbits>,
) -> TaskMapping {
    let mut representative = tasks.clone();

    let mut processed: AHashSet<TaskMapping> = AHashSet::new();
    processed.insert(tasks.clone());
    let mut unprocessed: VecDeque<TaskMapping> = VecDeque::new();
    unprocessed.push_back(tasks.clone());

    while let Some(current) = unprocessed.pop_front() {
        if current < representative {
            representative = current.clone();
        }

        for generator in group.generators() {
            let next = current.permuted(generator, options.offset);

            if is_repr(&next, orbits) {
                return next;
            }
            if !processed.contains(&next) {
                processed.insert(next.clone());
                unprocessed.push_back(next);
            }
        }
    }

    representative
}
