//! freeway-grid: road graph and lane geometry from freeway scenario grids
//!
//! A scenario describes a freeway as a grid of lane cells: lanes top to bottom,
//! sections left to right. This crate turns that grid into a simulation-ready
//! road network:
//! - Nom-based reader for the line-oriented scenario format
//! - Link segmentation by lane-change permissions
//! - Node graph with merge/diverge nodes, sources and sinks, and unique names
//! - Lateral lane geometry and boundary markings in one global frame
//! - YAML build configuration and loader
//!
//! The grid types themselves live in `scenario_types`.
//!
//! ```no_run
//! use freeway_grid::{build_from_text, BuildConfig};
//!
//! let text = std::fs::read_to_string("highway.scn").unwrap();
//! let network = build_from_text(&text, &BuildConfig::default()).unwrap();
//! for node in network.nodes() {
//!     println!("{} in={:?} out={:?}", node.name(), node.in_links(), node.out_links());
//! }
//! ```

pub mod config;
pub mod error;
pub mod geometry;
pub mod ingest;
pub mod model;
pub mod naming;
pub mod parser;
pub mod pipeline;
pub mod segmenter;
pub mod topology;

// Re-export commonly used types
pub use config::{BuildConfig, ConfigLoader, MarkingConfig};
pub use error::{BuildError, BuildResult, LinkEnd};
pub use geometry::{BoundaryMark, LaneGeometry, LinkGeometry, MarkKind};
pub use ingest::{parse_scenario, parse_scenario_named, ScenarioBuilder, SparseList};
pub use model::{Link, LinkId, Node, NodeBinding, NodeId};
pub use parser::{parse_statement, parse_statements, Keyword, Statement};
pub use pipeline::{build_from_text, build_network, RoadNetwork};

pub use scenario_types::{
    CellKind, GridError, LaneCell, ScenarioExtras, ScenarioGrid, Section, SourceLocation,
    SwitchedAreaRef, Taper, Terminal, TerminalKind,
};
