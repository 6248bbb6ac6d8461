//! Lateral lane geometry
//!
//! Offsets are lane centre lines in one global lateral frame: metres to the
//! right of the left edge of lane 0 in the idealized grid. The idealized grid
//! gives every lane index its widest width anywhere in the scenario, so links
//! with different lane counts or lane widths still line up: each link is
//! centred within the idealized width of its lane range.
//!
//! ## End side shifts
//!
//! A lane whose target in the next section differs from its own index shifts
//! laterally over the link. Lanes are grouped by their shift (`laneOut` minus
//! lane index, half a lane less for merge tapers):
//!
//! - same shift as the lane to the left: lanes abut, as on the start side
//! - larger shift (or first lane): re-anchor on the idealized position of the
//!   target lane, keeping the link's centring margin
//! - smaller shift: the lane converges onto its left neighbour's centre line
//!   and lanes after it continue from its right edge; more than one lane
//!   position is a non-adjacent merge and rejected

use scenario_types::{LaneCell, ScenarioGrid, Taper};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MarkingConfig;
use crate::error::{BuildError, BuildResult};
use crate::model::{Link, LinkId};

// =============================================================================
// TYPES
// =============================================================================

/// Lane divider style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkKind {
    /// Continuous line, never crossed
    SolidEdge,
    /// Crossed in both directions
    Dashed,
    /// Crossed only by traffic moving left, from the lane on its right
    LeftOnly,
    /// Crossed only by traffic moving right, from the lane on its left
    RightOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryMark {
    pub kind: MarkKind,
    pub start_offset: f64,
    pub end_offset: f64,
    pub start_width: f64,
    pub end_width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneGeometry {
    /// Global lane index
    pub lane: usize,
    pub start_offset: f64,
    pub end_offset: f64,
    pub start_width: f64,
    pub end_width: f64,
}

impl LaneGeometry {
    pub fn start_left(&self) -> f64 {
        self.start_offset - self.start_width / 2.0
    }

    pub fn start_right(&self) -> f64 {
        self.start_offset + self.start_width / 2.0
    }

    pub fn end_left(&self) -> f64 {
        self.end_offset - self.end_width / 2.0
    }

    pub fn end_right(&self) -> f64 {
        self.end_offset + self.end_width / 2.0
    }
}

/// Geometry of all lanes of one link plus its `lanes + 1` boundary marks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkGeometry {
    pub link: LinkId,
    pub lanes: Vec<LaneGeometry>,
    pub marks: Vec<BoundaryMark>,
}

// =============================================================================
// ALIGNMENT FRAME
// =============================================================================

/// Widest width per lane index, and the idealized left edges it implies
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentFrame {
    max_lane_width: Vec<f64>,
    /// `left_edge[lane]`, with one trailing entry for the total width
    left_edge: Vec<f64>,
}

impl AlignmentFrame {
    pub fn from_grid(grid: &ScenarioGrid, striped_traversable: bool) -> Self {
        let lanes = grid.lane_count();
        let last_section = grid.section_count() - 1;
        let mut max_lane_width = vec![0.0f64; lanes];

        for lane in 0..lanes {
            for (section, cell) in grid.lane_row(lane).iter().enumerate() {
                if !cell.is_traversable(striped_traversable) {
                    continue;
                }
                max_lane_width[lane] = max_lane_width[lane].max(cell.width);
                // a diagonal target must fit the lane shifting into it
                if section < last_section && cell.lane_out != lane {
                    let target = cell.lane_out;
                    max_lane_width[target] = max_lane_width[target].max(cell.width);
                }
            }
        }

        let mut left_edge = Vec::with_capacity(lanes + 1);
        let mut edge = 0.0;
        left_edge.push(edge);
        for width in &max_lane_width {
            edge += width;
            left_edge.push(edge);
        }

        Self {
            max_lane_width,
            left_edge,
        }
    }

    pub fn max_lane_width(&self, lane: usize) -> f64 {
        self.max_lane_width[lane]
    }

    /// Idealized left edge of a lane index
    pub fn left_edge_max(&self, lane: usize) -> f64 {
        self.left_edge[lane]
    }

    /// Idealized width of the inclusive lane range
    pub fn ideal_width(&self, from_lane: usize, to_lane: usize) -> f64 {
        self.left_edge[to_lane + 1] - self.left_edge[from_lane]
    }

    /// Half the slack between the idealized and actual width of a link
    pub fn margin(&self, link: &Link) -> f64 {
        let actual: f64 = link.cells.iter().map(|c| c.width).sum();
        (self.ideal_width(link.from_lane, link.to_lane) - actual) / 2.0
    }

    /// Actual left edge of a link, centred in its idealized lane range
    pub fn link_left_edge(&self, link: &Link) -> f64 {
        self.left_edge_max(link.from_lane) + self.margin(link)
    }
}

// =============================================================================
// SYNTHESIZER
// =============================================================================

pub struct GeometrySynthesizer<'a> {
    frame: &'a AlignmentFrame,
    markings: &'a MarkingConfig,
    striped_traversable: bool,
    section_count: usize,
}

impl<'a> GeometrySynthesizer<'a> {
    pub fn new(
        frame: &'a AlignmentFrame,
        markings: &'a MarkingConfig,
        striped_traversable: bool,
        section_count: usize,
    ) -> Self {
        Self {
            frame,
            markings,
            striped_traversable,
            section_count,
        }
    }

    pub fn synthesize(&self, link: &Link) -> BuildResult<LinkGeometry> {
        let lanes = self.lane_geometry(link)?;
        let marks = self.boundary_marks(link, &lanes);
        debug!(link = %link.id, lanes = lanes.len(), "synthesized link geometry");
        Ok(LinkGeometry {
            link: link.id,
            lanes,
            marks,
        })
    }

    fn lane_geometry(&self, link: &Link) -> BuildResult<Vec<LaneGeometry>> {
        let margin = self.frame.margin(link);
        let has_next_section = link.section + 1 < self.section_count;

        let mut out: Vec<LaneGeometry> = Vec::with_capacity(link.lane_count());
        let mut start_edge = self.frame.link_left_edge(link);
        let mut end_edge = start_edge;
        // shift class in half lanes, and the whole-lane shift behind it
        let mut class = 0i64;
        let mut shift = 0i64;

        for (i, (lane, cell)) in link.lanes().enumerate() {
            let width = cell.width;

            let (start_offset, start_width) = if cell.taper == Taper::DivergeTaper {
                let offset = out.last().map(|p| p.start_offset).unwrap_or(start_edge);
                (offset, 0.0)
            } else {
                let offset = start_edge + width / 2.0;
                start_edge += width;
                (offset, width)
            };

            let target = if has_next_section { cell.lane_out } else { lane };
            let lane_shift = target as i64 - lane as i64;
            let merging = cell.taper == Taper::MergeTaper;
            let lane_class = 2 * lane_shift - i64::from(merging);
            let end_width = if merging { 0.0 } else { width };

            let end_offset = if i == 0 || lane_class > class {
                end_edge = self.frame.left_edge_max(target) + margin;
                let offset = end_edge + end_width / 2.0;
                end_edge += end_width;
                offset
            } else if lane_class == class {
                let offset = end_edge + end_width / 2.0;
                end_edge += end_width;
                offset
            } else {
                if shift - lane_shift > 1 {
                    return Err(BuildError::IllegalShift {
                        link: link.id,
                        lane,
                        shift: shift - lane_shift,
                    });
                }
                // converge onto the left neighbour
                let offset = out[i - 1].end_offset;
                end_edge = offset + end_width / 2.0;
                offset
            };

            class = lane_class;
            shift = lane_shift;
            out.push(LaneGeometry {
                lane,
                start_offset,
                end_offset,
                start_width,
                end_width,
            });
        }

        Ok(out)
    }

    fn boundary_marks(&self, link: &Link, lanes: &[LaneGeometry]) -> Vec<BoundaryMark> {
        let m = self.markings;
        let mut marks = Vec::with_capacity(lanes.len() + 1);

        if let (Some(first), Some(last)) = (lanes.first(), lanes.last()) {
            marks.push(BoundaryMark {
                kind: MarkKind::SolidEdge,
                start_offset: first.start_left() + m.edge_gap,
                end_offset: first.end_left() + m.edge_gap,
                start_width: m.edge_line_width,
                end_width: m.edge_line_width,
            });

            for i in 1..lanes.len() {
                let kind = self.classify(&link.cells[i - 1], &link.cells[i]);
                let width = match kind {
                    MarkKind::SolidEdge | MarkKind::Dashed => m.narrow_line_width,
                    MarkKind::LeftOnly | MarkKind::RightOnly => m.wide_line_width,
                };
                let (left, right) = (&lanes[i - 1], &lanes[i]);
                marks.push(BoundaryMark {
                    kind,
                    start_offset: (left.start_right() + right.start_left()) / 2.0,
                    end_offset: (left.end_right() + right.end_left()) / 2.0,
                    start_width: width,
                    end_width: width,
                });
            }

            marks.push(BoundaryMark {
                kind: MarkKind::SolidEdge,
                start_offset: last.start_right() - m.edge_gap,
                end_offset: last.end_right() - m.edge_gap,
                start_width: m.edge_line_width,
                end_width: m.edge_line_width,
            });
        }

        marks
    }

    /// Marking between `left` and the lane directly to its right
    pub fn classify(&self, left: &LaneCell, right: &LaneCell) -> MarkKind {
        let striped = self.striped_traversable;
        if right.taper == Taper::MergeTaper {
            MarkKind::LeftOnly
        } else if right.taper == Taper::DivergeTaper || left.taper.is_taper() {
            MarkKind::RightOnly
        } else if left.is_shoulder() || right.is_shoulder() {
            MarkKind::SolidEdge
        } else if right.permits_left(striped) && left.permits_right(striped) {
            MarkKind::Dashed
        } else if right.permits_left(striped) {
            MarkKind::LeftOnly
        } else {
            MarkKind::RightOnly
        }
    }
}
