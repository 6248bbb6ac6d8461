//! End-to-end network builds from scenario text

use freeway_grid::{
    build_from_text, build_network, parse_scenario, BuildConfig, BuildError, LinkId, MarkKind,
    NodeBinding, NodeId,
};
use pretty_assertions::assert_eq;

fn build(text: &str) -> freeway_grid::RoadNetwork {
    build_from_text(text, &BuildConfig::default()).unwrap()
}

fn names(network: &freeway_grid::RoadNetwork) -> Vec<&str> {
    network.nodes().iter().map(|n| n.name()).collect()
}

#[test]
fn test_single_lanes_form_separate_links() {
    let network = build(
        "sections: 100
lane 0: s,-,0,0,0,3.5,120
lane 1: s,-,1,0,0,3.5,120
source 0: 0 0 0 North
source 1: 0 1 1 South
sink 0: 0 0 0 NorthEnd
sink 1: 0 1 1 SouthEnd
",
    );
    let ranges: Vec<(usize, usize)> = network
        .links()
        .iter()
        .map(|l| (l.from_lane, l.to_lane))
        .collect();
    assert_eq!(ranges, vec![(0, 0), (1, 1)]);
    assert_eq!(names(&network), vec!["North", "South", "NorthEnd", "SouthEnd"]);
}

#[test]
fn test_both_lanes_form_one_link() {
    let network = build(
        "sections: 100
lane 0: c,-,0,0,0,3.5,120
lane 1: c,-,1,0,0,3.5,120
source 0: 0 0 1 In
sink 0: 0 0 1 Out
",
    );
    assert_eq!(network.links().len(), 1);
    let link = &network.links()[0];
    assert_eq!((link.from_lane, link.to_lane), (0, 1));
    let geometry = network.geometry(link.id).unwrap();
    assert_eq!(geometry.marks.len(), 3);
    assert_eq!(geometry.marks[1].kind, MarkKind::Dashed);
}

#[test]
fn test_sink_attaches_to_last_section() {
    let network = build(
        "sections: 100 100
lane 0: s,-,0,0,0,3.5,120 s,-,0,0,0,3.5,120
source 0: 1 0 0 Start
sink 0: 0 0 0 X
",
    );
    let x = network.node_by_name("X").unwrap();
    assert_eq!(x.binding(), Some(NodeBinding::Sink(0)));
    assert_eq!(x.in_links(), &[LinkId(1)]);
    assert!(x.out_links().is_empty());
    assert_eq!(network.link(LinkId(1)).unwrap().to_node(), Some(x.id));
    assert_eq!(names(&network), vec!["A", "Start", "X"]);
}

#[test]
fn test_colliding_sink_names_are_composed() {
    let network = build(
        "sections: 100 100
lane 0: c,-,0,0,0,3.5,120 s,-,0,0,0,3.5,120
lane 1: c,-,1,0,0,3.5,120 s,-,1,0,0,3.5,120
lane 2: u,-,2,0,0,3.5,120 s,-,2,0,0,3.5,120
lane 3: s,-,2,0,0,3.5,120 u,-,3,0,0,3.5,120
source 0: 1 0 1 B
source 1: 1 3 3 Feeder
sink 0: 0 0 0 B
sink 1: 0 1 1 B
sink 2: 0 2 2 B
",
    );
    // label 2 ("B") is reserved, so the second intermediate node is "C";
    // the sources take labels 4 and 5 and every sink "B" is composed
    assert_eq!(
        names(&network),
        vec!["A", "C", "B", "Feeder", "F (B)", "G (B)", "H (B)"]
    );
}

#[test]
fn test_merge_taper_converges_with_left_only_mark() {
    let network = build(
        "sections: 200 200
lane 0: c,-,0,0,0,3.5,120 c,-,0,0,0,3.5,120
lane 1: c,>,0,0,0,3.5,100 u,-,1,0,0,3.5,120
source 0: 1 0 1 In
sink 0: 0 0 0 Out
",
    );
    let geometry = network.geometry(LinkId(0)).unwrap();
    let (left, merging) = (&geometry.lanes[0], &geometry.lanes[1]);
    assert!((left.end_offset - merging.end_offset).abs() < 1e-9);
    assert_eq!(merging.end_width, 0.0);

    let mark = &geometry.marks[1];
    assert_eq!(mark.kind, MarkKind::LeftOnly);
    assert_eq!(mark.start_width, BuildConfig::default().markings.wide_line_width);
}

#[test]
fn test_two_lane_leftward_shift_is_rejected() {
    let err = build_from_text(
        "sections: 100 100
lane 0: c,-,0,0,0,3.5,120 c,-,0,0,0,3.5,120
lane 1: c,-,1,0,0,3.5,120 c,-,1,0,0,3.5,120
lane 2: c,-,0,0,0,3.5,120 c,-,2,0,0,3.5,120
source 0: 1 0 2 In
sink 0: 0 0 2 Out
",
        &BuildConfig::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        BuildError::IllegalShift {
            link: LinkId(0),
            lane: 2,
            shift: 2
        }
    );
}

#[test]
fn test_striped_policy_changes_segmentation() {
    let text = "sections: 100
lane 0: c,-,0,0,0,3.5,120
lane 1: L,-,1,0,0,3.5,120
source 0: 0 0 0 In
sink 0: 0 0 0 Out
";
    let grid = parse_scenario(text).unwrap();

    let mut config = BuildConfig::default();
    let traversable = build_network(&grid, &config).unwrap();
    assert_eq!(traversable.links()[0].to_lane, 1);

    config.striped_areas_traversable = false;
    let blocked = build_network(&grid, &config).unwrap();
    assert_eq!(blocked.links()[0].to_lane, 0);
    assert!(blocked.link_at(0, 1).is_none());
}

#[test]
fn test_unresolvable_source_is_rejected() {
    let err = build_from_text(
        "sections: 100
lane 0: s,-,0,0,0,3.5,120
source 0: 4 0 0 Nowhere
sink 0: 0 0 0 Out
",
        &BuildConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, BuildError::UnresolvedAttachment { index: 0, .. }));
}

#[test]
fn test_repeated_builds_are_identical() {
    let text = "sections: 100 150 100
lane 0: c,-,0,0,0,3.5,120 c,-,0,0,0,3.5,120 c,-,0,0,0,3.5,120
lane 1: c,-,1,0,0,3.5,120 c,<,1,0,0,3.5,120 s,-,1,0,0,3.5,120
lane 2: u,-,2,0,0,3.5,120 u,-,2,0,0,3.5,120 u,-,2,0,0,3.5,120
source 0: 2 0 1 Entry
sink 0: 0 0 1 Exit
";
    let grid = parse_scenario(text).unwrap();
    let config = BuildConfig::default();
    let first = build_network(&grid, &config).unwrap();
    let second = build_network(&grid, &config).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(first.node(NodeId(0)).map(|n| n.name()), Some("A"));
}
