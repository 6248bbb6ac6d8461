//! Link segmentation
//!
//! Splits each section's lane row into maximal runs of lanes between which
//! traffic can change lanes. Sections are scanned left to right and lanes top
//! to bottom, which fixes link id order.

use scenario_types::ScenarioGrid;
use tracing::debug;

use crate::model::{Link, LinkId};

/// Links of a grid plus the `(lane, section) → link` index
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub links: Vec<Link>,
    /// `index[section][lane]`
    pub(crate) index: Vec<Vec<Option<LinkId>>>,
}

impl Segmentation {
    pub fn link_at(&self, lane: usize, section: usize) -> Option<LinkId> {
        self.index
            .get(section)
            .and_then(|row| row.get(lane))
            .copied()
            .flatten()
    }

    /// Links of one section, in lane order
    pub fn section_links(&self, section: usize) -> impl Iterator<Item = &Link> + '_ {
        self.links.iter().filter(move |l| l.section == section)
    }
}

pub struct LinkSegmenter<'a> {
    grid: &'a ScenarioGrid,
    striped_traversable: bool,
    next_id: usize,
}

impl<'a> LinkSegmenter<'a> {
    pub fn new(grid: &'a ScenarioGrid, striped_traversable: bool) -> Self {
        Self {
            grid,
            striped_traversable,
            next_id: 0,
        }
    }

    /// Next link in `section` starting at lane `from`, and the lane at which
    /// scanning resumes
    pub fn segment_row(&mut self, section: usize, from: usize) -> (Option<Link>, usize) {
        let grid = self.grid;
        let striped = self.striped_traversable;
        if !grid.cell(from, section).is_traversable(striped) {
            return (None, from + 1);
        }

        let mut to = from;
        while to + 1 < grid.lane_count() {
            let here = grid.cell(to, section);
            let next = grid.cell(to + 1, section);
            if !next.is_traversable(striped) {
                break;
            }
            let connected = here.permits_right(striped)
                || (to == from && here.is_shoulder())
                || next.permits_left(striped)
                || next.is_shoulder();
            if !connected {
                break;
            }
            to += 1;
        }

        let cells = (from..=to)
            .map(|lane| grid.cell(lane, section).clone())
            .collect();
        let link = Link::new(LinkId(self.next_id), section, from, to, cells);
        self.next_id += 1;
        debug!(link = %link.id, section, from, to, "segmented link");
        (Some(link), to + 1)
    }

    /// Segment every section of the grid
    pub fn segment_grid(mut self) -> Segmentation {
        let grid = self.grid;
        let mut links = Vec::new();
        let mut index = vec![vec![None; grid.lane_count()]; grid.section_count()];

        for section in 0..grid.section_count() {
            let mut lane = 0;
            while lane < grid.lane_count() {
                let (link, next) = self.segment_row(section, lane);
                if let Some(link) = link {
                    for covered in link.from_lane..=link.to_lane {
                        index[section][covered] = Some(link.id);
                    }
                    links.push(link);
                }
                lane = next;
            }
        }

        Segmentation { links, index }
    }
}
