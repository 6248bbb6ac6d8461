//! Build pipeline
//!
//! `ScenarioGrid` → segmentation → topology → geometry → [`RoadNetwork`].
//! The grid is borrowed read-only; every phase either completes or aborts the
//! whole build, so no partially built network is ever returned.

use scenario_types::ScenarioGrid;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::BuildConfig;
use crate::error::BuildResult;
use crate::geometry::{AlignmentFrame, GeometrySynthesizer, LinkGeometry};
use crate::ingest::parse_scenario;
use crate::model::{Link, LinkId, Node, NodeId};
use crate::segmenter::LinkSegmenter;
use crate::topology::TopologyBuilder;

/// Links, named nodes and per-link lateral geometry of one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadNetwork {
    links: Vec<Link>,
    nodes: Vec<Node>,
    /// Parallel to `links`
    geometry: Vec<LinkGeometry>,
    /// `link_index[section][lane]`
    link_index: Vec<Vec<Option<LinkId>>>,
}

impl RoadNetwork {
    /// Links in id order
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Nodes in id order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn geometry(&self, id: LinkId) -> Option<&LinkGeometry> {
        self.geometry.get(id.0)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    /// Link covering `lane` in `section`, if the cell is traversable
    pub fn link_at(&self, section: usize, lane: usize) -> Option<&Link> {
        self.link_index
            .get(section)
            .and_then(|row| row.get(lane))
            .copied()
            .flatten()
            .and_then(|id| self.link(id))
    }

    /// Nodes at the start and end of a link
    pub fn nodes_of(&self, id: LinkId) -> Option<(&Node, &Node)> {
        let link = self.link(id)?;
        let from = self.node(link.from_node()?)?;
        let to = self.node(link.to_node()?)?;
        Some((from, to))
    }

    pub fn sources(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(|n| n.is_source())
    }

    pub fn sinks(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(|n| n.is_sink())
    }
}

/// Build the road network of a validated grid
pub fn build_network(grid: &ScenarioGrid, config: &BuildConfig) -> BuildResult<RoadNetwork> {
    config.validate()?;
    let striped = config.striped_areas_traversable;

    let segmentation = LinkSegmenter::new(grid, striped).segment_grid();
    info!(links = segmentation.links.len(), "segmented grid");

    let topology = TopologyBuilder::new(grid, segmentation).build()?;

    let frame = AlignmentFrame::from_grid(grid, striped);
    let synthesizer =
        GeometrySynthesizer::new(&frame, &config.markings, striped, grid.section_count());
    let geometry = topology
        .links
        .iter()
        .map(|link| synthesizer.synthesize(link))
        .collect::<BuildResult<Vec<_>>>()?;
    info!(links = geometry.len(), "synthesized geometry");

    Ok(RoadNetwork {
        links: topology.links,
        nodes: topology.nodes,
        geometry,
        link_index: topology.link_index,
    })
}

/// Parse scenario text and build its road network
pub fn build_from_text(input: &str, config: &BuildConfig) -> BuildResult<RoadNetwork> {
    let grid = parse_scenario(input)?;
    build_network(&grid, config)
}
