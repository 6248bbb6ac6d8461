//! Topology builder
//!
//! Connects the links of consecutive sections through nodes, attaches source
//! and sink nodes, and names every node. Runs in three phases:
//!
//! 1. intermediate nodes at section boundaries (merges, diverges, plain joins)
//! 2. source nodes, then sink nodes
//! 3. a completeness check: every link must have a node at both ends
//!
//! Link ends are the adjacency index: `Link::to_node` / `Link::from_node` give
//! the node incident to a link in O(1), so "find the node already joining
//! these links" never scans the node list.

use scenario_types::{ScenarioGrid, Terminal, TerminalKind};
use tracing::{debug, info};

use crate::error::{BuildError, BuildResult, LinkEnd};
use crate::model::{Link, LinkId, Node, NodeBinding, NodeId};
use crate::naming::NameAllocator;
use crate::segmenter::Segmentation;

/// Finished road graph, before geometry
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    pub links: Vec<Link>,
    pub nodes: Vec<Node>,
    /// `link_index[section][lane]`
    pub(crate) link_index: Vec<Vec<Option<LinkId>>>,
}

impl Topology {
    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn link_at(&self, lane: usize, section: usize) -> Option<LinkId> {
        self.link_index
            .get(section)
            .and_then(|row| row.get(lane))
            .copied()
            .flatten()
    }
}

pub struct TopologyBuilder<'a> {
    grid: &'a ScenarioGrid,
    segmentation: Segmentation,
    nodes: Vec<Node>,
    names: NameAllocator,
}

impl<'a> TopologyBuilder<'a> {
    pub fn new(grid: &'a ScenarioGrid, segmentation: Segmentation) -> Self {
        let forbidden = grid
            .sources()
            .iter()
            .chain(grid.sinks())
            .map(|t| t.name.clone());
        Self {
            grid,
            segmentation,
            nodes: Vec::new(),
            names: NameAllocator::new(forbidden),
        }
    }

    pub fn build(mut self) -> BuildResult<Topology> {
        let grid = self.grid;
        self.connect_sections()?;
        let intermediate = self.nodes.len();

        for (index, source) in grid.sources().iter().enumerate() {
            self.attach_terminal(TerminalKind::Source, index, source)?;
        }
        for (index, sink) in grid.sinks().iter().enumerate() {
            self.attach_terminal(TerminalKind::Sink, index, sink)?;
        }

        self.check_dangling()?;

        info!(
            links = self.segmentation.links.len(),
            nodes = self.nodes.len(),
            intermediate,
            "Built topology"
        );

        Ok(Topology {
            links: self.segmentation.links,
            nodes: self.nodes,
            link_index: self.segmentation.index,
        })
    }

    // =========================================================================
    // Phase 1: section boundaries
    // =========================================================================

    fn connect_sections(&mut self) -> BuildResult<()> {
        let grid = self.grid;
        for section in 0..grid.section_count().saturating_sub(1) {
            for lane in 0..grid.lane_count() {
                let Some(from_link) = self.segmentation.link_at(lane, section) else {
                    continue;
                };
                let lane_out = grid.cell(lane, section).lane_out;
                let Some(to_link) = self.segmentation.link_at(lane_out, section + 1) else {
                    continue;
                };

                let node = match (
                    self.link(from_link).to_node(),
                    self.link(to_link).from_node(),
                ) {
                    // both already joined: the earlier node wins, a conflict
                    // surfaces when the other end is attached
                    (Some(a), Some(b)) => a.min(b),
                    (Some(existing), None) | (None, Some(existing)) => existing,
                    (None, None) => self.new_intermediate(),
                };
                self.join(from_link, node, to_link)?;
            }
        }
        Ok(())
    }

    fn new_intermediate(&mut self) -> NodeId {
        let (label, name) = self.names.intermediate();
        let id = NodeId(self.nodes.len());
        debug!(node = %id, %name, "created intermediate node");
        self.nodes.push(Node::new(id, label, name));
        id
    }

    fn join(&mut self, from_link: LinkId, node: NodeId, to_link: LinkId) -> BuildResult<()> {
        self.link_mut(from_link).attach(LinkEnd::End, node)?;
        self.nodes[node.0].add_in_link(from_link);
        self.link_mut(to_link).attach(LinkEnd::Start, node)?;
        self.nodes[node.0].add_out_link(to_link);
        Ok(())
    }

    // =========================================================================
    // Phase 2: sources and sinks
    // =========================================================================

    /// Link a terminal attaches to
    ///
    /// The link at `from_lane` in the attachment section, or else the link of
    /// the first lane in that section whose lane target falls inside the
    /// terminal's lane range.
    pub fn resolve(
        &self,
        kind: TerminalKind,
        index: usize,
        terminal: &Terminal,
    ) -> BuildResult<LinkId> {
        let unresolved = |reason: String| BuildError::UnresolvedAttachment {
            kind,
            index,
            name: terminal.name.clone(),
            reason,
        };

        let section = self
            .grid
            .section_from_end(terminal.section_from_end)
            .ok_or_else(|| {
                unresolved(format!(
                    "section {} from the end is outside the {} sections",
                    terminal.section_from_end,
                    self.grid.section_count()
                ))
            })?;
        if terminal.to_lane >= self.grid.lane_count() {
            return Err(unresolved(format!(
                "lane {} is outside the {} lanes",
                terminal.to_lane,
                self.grid.lane_count()
            )));
        }

        if let Some(link) = self.segmentation.link_at(terminal.from_lane, section) {
            return Ok(link);
        }

        (0..self.grid.lane_count())
            .filter(|&lane| terminal.contains_lane(self.grid.cell(lane, section).lane_out))
            .find_map(|lane| self.segmentation.link_at(lane, section))
            .ok_or_else(|| {
                unresolved(format!(
                    "no link at lanes {}..={} of section {}",
                    terminal.from_lane, terminal.to_lane, section
                ))
            })
    }

    fn attach_terminal(
        &mut self,
        kind: TerminalKind,
        index: usize,
        terminal: &Terminal,
    ) -> BuildResult<NodeId> {
        let link = self.resolve(kind, index, terminal)?;
        let (label, name, retries) = self.names.terminal(&terminal.name);
        let id = NodeId(self.nodes.len());
        if name != terminal.name {
            debug!(
                node = %id,
                intended = %terminal.name,
                %name,
                retries,
                "{} name taken, composed a unique name",
                kind
            );
        }

        let (binding, end) = match kind {
            TerminalKind::Source => (NodeBinding::Source(index), LinkEnd::Start),
            TerminalKind::Sink => (NodeBinding::Sink(index), LinkEnd::End),
        };
        let mut node = Node::new(id, label, name).bound(binding);
        match end {
            LinkEnd::Start => node.add_out_link(link),
            LinkEnd::End => node.add_in_link(link),
        }
        self.link_mut(link).attach(end, id)?;
        self.nodes.push(node);
        Ok(id)
    }

    // =========================================================================
    // Phase 3: completeness
    // =========================================================================

    fn check_dangling(&self) -> BuildResult<()> {
        for link in &self.segmentation.links {
            for end in [LinkEnd::Start, LinkEnd::End] {
                if link.node(end).is_none() {
                    return Err(BuildError::DanglingLink {
                        link: link.id,
                        section: link.section,
                        from_lane: link.from_lane,
                        to_lane: link.to_lane,
                        missing: end,
                    });
                }
            }
        }
        Ok(())
    }

    fn link(&self, id: LinkId) -> &Link {
        &self.segmentation.links[id.0]
    }

    fn link_mut(&mut self, id: LinkId) -> &mut Link {
        &mut self.segmentation.links[id.0]
    }
}
