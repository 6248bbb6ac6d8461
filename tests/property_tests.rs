//! Property tests over generated scenario grids

use std::collections::HashSet;

use freeway_grid::config::MarkingConfig;
use freeway_grid::geometry::{AlignmentFrame, GeometrySynthesizer};
use freeway_grid::segmenter::LinkSegmenter;
use freeway_grid::{
    build_network, BuildConfig, BuildError, CellKind, LaneCell, NodeBinding, ScenarioGrid, Taper,
    Terminal,
};
use proptest::prelude::*;

const EPS: f64 = 1e-9;

// -- Strategy helpers --

fn arb_kind() -> impl Strategy<Value = CellKind> {
    prop_oneof![
        2 => Just(CellKind::Unused),
        3 => Just(CellKind::Both),
        2 => Just(CellKind::Single),
        1 => Just(CellKind::LeftOnly),
        1 => Just(CellKind::RightOnly),
        1 => Just(CellKind::StripedLeft),
        1 => Just(CellKind::StripedRight),
        1 => Just(CellKind::BeyondStriped),
    ]
}

fn arb_taper() -> impl Strategy<Value = Taper> {
    prop_oneof![
        6 => Just(Taper::None),
        2 => Just(Taper::MergeTaper),
        2 => Just(Taper::DivergeTaper),
        1 => Just(Taper::MergeAdjacent),
        1 => Just(Taper::DivergeAdjacent),
    ]
}

fn arb_width() -> impl Strategy<Value = f64> {
    prop_oneof![Just(3.0), Just(3.25), Just(3.5), Just(3.75)]
}

/// Cell whose lane target moves at most one lane
fn arb_cell(lane: usize, lanes: usize) -> impl Strategy<Value = LaneCell> {
    (arb_kind(), arb_taper(), -1i64..=1, arb_width()).prop_map(move |(kind, taper, shift, width)| {
        let lane_out = (lane as i64 + shift).clamp(0, lanes as i64 - 1) as usize;
        LaneCell::new(kind, lane_out, width).with_taper(taper)
    })
}

/// Lane-major grid of 1-5 lanes by 1-5 sections, no terminals
fn arb_grid() -> impl Strategy<Value = ScenarioGrid> {
    (1usize..=5, 1usize..=5).prop_flat_map(|(lanes, sections)| {
        let rows = (0..lanes)
            .map(|lane| prop::collection::vec(arb_cell(lane, lanes), sections))
            .collect::<Vec<_>>();
        rows.prop_map(move |rows| {
            ScenarioGrid::new(&vec![100.0; sections], rows, vec![], vec![])
                .expect("generated grids are well formed")
        })
    })
}

fn arb_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("A".to_string()),
        Just("B".to_string()),
        Just("C".to_string()),
        Just("C (A)".to_string()),
        Just("D (B)".to_string()),
        Just("Ramp".to_string()),
    ]
}

/// Parallel single lanes over two sections, one source and one sink per lane
fn arb_named_grid() -> impl Strategy<Value = ScenarioGrid> {
    (1usize..=4).prop_flat_map(|lanes| {
        (
            prop::collection::vec(arb_name(), lanes),
            prop::collection::vec(arb_name(), lanes),
        )
            .prop_map(move |(sources, sinks)| {
                let rows = (0..lanes)
                    .map(|lane| vec![LaneCell::new(CellKind::Single, lane, 3.5); 2])
                    .collect();
                let sources = sources
                    .into_iter()
                    .enumerate()
                    .map(|(lane, name)| Terminal::new(1, lane, lane, name))
                    .collect();
                let sinks = sinks
                    .into_iter()
                    .enumerate()
                    .map(|(lane, name)| Terminal::new(0, lane, lane, name))
                    .collect();
                ScenarioGrid::new(&[100.0, 100.0], rows, sources, sinks)
                    .expect("generated grids are well formed")
            })
    })
}

proptest! {
    #[test]
    fn links_partition_traversable_cells(grid in arb_grid(), striped in any::<bool>()) {
        let segmentation = LinkSegmenter::new(&grid, striped).segment_grid();

        for section in 0..grid.section_count() {
            let mut covered = vec![0usize; grid.lane_count()];
            for link in segmentation.section_links(section) {
                prop_assert!(link.from_lane <= link.to_lane);
                for lane in link.from_lane..=link.to_lane {
                    covered[lane] += 1;
                }
            }
            for (lane, count) in covered.iter().enumerate() {
                let expected = usize::from(grid.cell(lane, section).is_traversable(striped));
                prop_assert_eq!(*count, expected, "lane {} section {}", lane, section);
            }
        }

        let ids: Vec<usize> = segmentation.links.iter().map(|l| l.id.0).collect();
        prop_assert_eq!(ids, (0..segmentation.links.len()).collect::<Vec<_>>());
    }

    #[test]
    fn node_names_are_unique_and_keep_terminal_names(grid in arb_named_grid()) {
        let network = build_network(&grid, &BuildConfig::default()).unwrap();

        let mut seen = HashSet::new();
        for node in network.nodes() {
            prop_assert!(seen.insert(node.name()), "duplicate name {}", node.name());
        }

        for node in network.nodes() {
            let intended = match node.binding() {
                Some(NodeBinding::Source(i)) => &grid.sources()[i].name,
                Some(NodeBinding::Sink(i)) => &grid.sinks()[i].name,
                None => continue,
            };
            let composed_suffix = format!(" ({})", intended);
            prop_assert!(
                node.name() == intended || node.name().ends_with(&composed_suffix),
                "{} does not carry {}", node.name(), intended
            );
        }
    }

    #[test]
    fn lane_geometry_is_continuous(grid in arb_grid()) {
        let segmentation = LinkSegmenter::new(&grid, true).segment_grid();
        let frame = AlignmentFrame::from_grid(&grid, true);
        let markings = MarkingConfig::default();
        let synthesizer = GeometrySynthesizer::new(&frame, &markings, true, grid.section_count());
        let last_section = grid.section_count() - 1;

        for link in &segmentation.links {
            let geometry = match synthesizer.synthesize(link) {
                Ok(geometry) => geometry,
                Err(BuildError::IllegalShift { .. }) => continue,
                Err(other) => return Err(TestCaseError::fail(other.to_string())),
            };
            prop_assert_eq!(geometry.lanes.len(), link.lane_count());
            prop_assert_eq!(geometry.marks.len(), link.lane_count() + 1);

            // start side: wedges sit on their left neighbour, other lanes abut
            let first = &geometry.lanes[0];
            let mut edge = first.start_right();
            for i in 1..geometry.lanes.len() {
                let lane = &geometry.lanes[i];
                if link.cells[i].taper == Taper::DivergeTaper {
                    prop_assert!((lane.start_offset - geometry.lanes[i - 1].start_offset).abs() < EPS);
                    prop_assert_eq!(lane.start_width, 0.0);
                } else {
                    prop_assert!((lane.start_left() - edge).abs() < EPS);
                    edge = lane.start_right();
                }
            }

            // end side, by shift class in half lanes
            let class = |i: usize| {
                let (lane, cell) = (link.from_lane + i, &link.cells[i]);
                let target = if link.section < last_section { cell.lane_out } else { lane };
                2 * (target as i64 - lane as i64) - i64::from(cell.taper == Taper::MergeTaper)
            };
            for i in 1..geometry.lanes.len() {
                let (prev, lane) = (&geometry.lanes[i - 1], &geometry.lanes[i]);
                if class(i) == class(i - 1) {
                    prop_assert!((lane.end_left() - prev.end_right()).abs() < EPS);
                } else if class(i) < class(i - 1) {
                    prop_assert!((lane.end_offset - prev.end_offset).abs() < EPS);
                }
            }
            for (lane, cell) in geometry.lanes.iter().zip(&link.cells) {
                if cell.taper == Taper::MergeTaper {
                    prop_assert_eq!(lane.end_width, 0.0);
                }
            }
        }
    }

    #[test]
    fn builds_are_deterministic(grid in arb_named_grid()) {
        let config = BuildConfig::default();
        let first = build_network(&grid, &config).unwrap();
        let second = build_network(&grid, &config).unwrap();
        prop_assert_eq!(first, second);
    }
}
