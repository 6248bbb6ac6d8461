//! Links and nodes of the road graph
//!
//! Links are created by the segmenter, nodes by the topology builder. After
//! creation the only mutation is the one-time cross reference between a link
//! end and a node, guarded by `Link::attach`.

use scenario_types::LaneCell;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::error::{BuildError, BuildResult, LinkEnd};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// LINK
// =============================================================================

/// Maximal run of mutually reachable lanes within one section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub section: usize,
    pub from_lane: usize,
    /// Inclusive
    pub to_lane: usize,
    /// One cell per lane in `from_lane..=to_lane`
    pub cells: Vec<LaneCell>,
    from_node: Option<NodeId>,
    to_node: Option<NodeId>,
}

impl Link {
    pub fn new(
        id: LinkId,
        section: usize,
        from_lane: usize,
        to_lane: usize,
        cells: Vec<LaneCell>,
    ) -> Self {
        debug_assert!(from_lane <= to_lane);
        debug_assert_eq!(cells.len(), to_lane - from_lane + 1);
        Self {
            id,
            section,
            from_lane,
            to_lane,
            cells,
            from_node: None,
            to_node: None,
        }
    }

    pub fn lane_count(&self) -> usize {
        self.to_lane - self.from_lane + 1
    }

    pub fn contains_lane(&self, lane: usize) -> bool {
        (self.from_lane..=self.to_lane).contains(&lane)
    }

    /// `(global lane index, cell)` pairs, left to right
    pub fn lanes(&self) -> impl Iterator<Item = (usize, &LaneCell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (self.from_lane + i, cell))
    }

    pub fn from_node(&self) -> Option<NodeId> {
        self.from_node
    }

    pub fn to_node(&self) -> Option<NodeId> {
        self.to_node
    }

    pub fn node(&self, end: LinkEnd) -> Option<NodeId> {
        match end {
            LinkEnd::Start => self.from_node,
            LinkEnd::End => self.to_node,
        }
    }

    /// Set the node at one end; a second, different node is rejected
    pub(crate) fn attach(&mut self, end: LinkEnd, node: NodeId) -> BuildResult<()> {
        let slot = match end {
            LinkEnd::Start => &mut self.from_node,
            LinkEnd::End => &mut self.to_node,
        };
        match *slot {
            Some(existing) if existing != node => Err(BuildError::ConflictingAttachment {
                link: self.id,
                end,
                existing,
                requested: node,
            }),
            _ => {
                *slot = Some(node);
                Ok(())
            }
        }
    }
}

// =============================================================================
// NODE
// =============================================================================

/// What a node stands for besides joining links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeBinding {
    /// Index into the scenario's source list
    Source(usize),
    /// Index into the scenario's sink list
    Sink(usize),
}

/// Graph vertex joining links at a merge, diverge, source or sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Naming-counter value the node was created with
    pub label: usize,
    name: String,
    in_links: SmallVec<[LinkId; 4]>,
    out_links: SmallVec<[LinkId; 4]>,
    binding: Option<NodeBinding>,
}

impl Node {
    pub(crate) fn new(id: NodeId, label: usize, name: String) -> Self {
        Self {
            id,
            label,
            name,
            in_links: SmallVec::new(),
            out_links: SmallVec::new(),
            binding: None,
        }
    }

    pub(crate) fn bound(mut self, binding: NodeBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn in_links(&self) -> &[LinkId] {
        &self.in_links
    }

    pub fn out_links(&self) -> &[LinkId] {
        &self.out_links
    }

    pub fn binding(&self) -> Option<NodeBinding> {
        self.binding
    }

    pub fn is_source(&self) -> bool {
        matches!(self.binding, Some(NodeBinding::Source(_)))
    }

    pub fn is_sink(&self) -> bool {
        matches!(self.binding, Some(NodeBinding::Sink(_)))
    }

    pub(crate) fn add_in_link(&mut self, link: LinkId) {
        if !self.in_links.contains(&link) {
            self.in_links.push(link);
        }
    }

    pub(crate) fn add_out_link(&mut self, link: LinkId) {
        if !self.out_links.contains(&link) {
            self.out_links.push(link);
        }
    }
}
