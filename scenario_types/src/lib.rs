//! Scenario Types - Level 1 Foundation Types
//!
//! Pure data structures describing a parsed freeway scenario grid. Every other
//! part of the workspace (reader, segmenter, topology, geometry) builds on
//! these types, and this crate depends on nothing else in the workspace.
//!
//! ## Contents
//!
//! - Lane cell attributes (`CellKind`, `Taper`, `SwitchedAreaRef`, `LaneCell`)
//! - Sections and longitudinal positioning
//! - Source/sink attachment points (`Terminal`)
//! - Opaque demand and simulation fields (`ScenarioExtras`)
//! - The immutable `ScenarioGrid`
//!
//! ## Rules
//!
//! 1. **NO TOPOLOGY LOGIC** - links, nodes and geometry live in `freeway_grid`
//! 2. **SERIALIZABLE** - all types support serde
//! 3. **IMMUTABLE GRID** - a `ScenarioGrid` is validated once in `ScenarioGrid::new`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// SOURCE LOCATION
// ============================================================================

/// Location of a statement in scenario text, for error reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Line number (1-based)
    pub line: usize,
    /// Optional filename or identifier for the source
    pub source_name: Option<String>,
}

impl SourceLocation {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            source_name: None,
        }
    }

    pub fn with_source(line: usize, source_name: impl Into<String>) -> Self {
        Self {
            line,
            source_name: Some(source_name.into()),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source_name {
            Some(name) => write!(f, "{}:{}", name, self.line),
            None => write!(f, "line {}", self.line),
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Errors raised while decoding or validating grid data
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("Invalid lane cell '{text}': {reason}")]
    InvalidCell { text: String, reason: String },

    #[error("Invalid {kind} definition '{text}': {reason}")]
    InvalidTerminal {
        kind: TerminalKind,
        text: String,
        reason: String,
    },

    #[error("Lane {lane} has {cells} cells but the scenario has {sections} sections")]
    ShapeMismatch {
        lane: usize,
        cells: usize,
        sections: usize,
    },

    #[error("Cell at lane {lane}, section {section} targets lane {lane_out}, outside 0..{lane_count}")]
    LaneTargetOutOfRange {
        lane: usize,
        section: usize,
        lane_out: usize,
        lane_count: usize,
    },

    #[error("Section {section} has invalid length {length}")]
    InvalidSectionLength { section: usize, length: f64 },

    #[error("Scenario has no {0}")]
    Empty(&'static str),
}

impl GridError {
    fn cell(text: &str, reason: impl Into<String>) -> Self {
        Self::InvalidCell {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// LANE CELL ATTRIBUTES
// ============================================================================

/// Lane-change regime of a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    /// No lane at this position
    Unused,
    /// Lane changes to the left only
    LeftOnly,
    /// Lane changes to the right only
    RightOnly,
    /// Lane changes in both directions
    Both,
    /// No lane changes at all
    Single,
    /// Striped area, left changes when striped areas are traversable
    StripedLeft,
    /// Striped area, right changes when striped areas are traversable
    StripedRight,
    /// Inside a wider striped area, both directions when traversable
    BeyondStriped,
}

impl CellKind {
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'u' => Some(CellKind::Unused),
            'l' => Some(CellKind::LeftOnly),
            'r' => Some(CellKind::RightOnly),
            'c' => Some(CellKind::Both),
            's' => Some(CellKind::Single),
            'L' => Some(CellKind::StripedLeft),
            'R' => Some(CellKind::StripedRight),
            'X' => Some(CellKind::BeyondStriped),
            _ => None,
        }
    }

    pub fn code(&self) -> char {
        match self {
            CellKind::Unused => 'u',
            CellKind::LeftOnly => 'l',
            CellKind::RightOnly => 'r',
            CellKind::Both => 'c',
            CellKind::Single => 's',
            CellKind::StripedLeft => 'L',
            CellKind::StripedRight => 'R',
            CellKind::BeyondStriped => 'X',
        }
    }

    pub fn is_striped(&self) -> bool {
        matches!(
            self,
            CellKind::StripedLeft | CellKind::StripedRight | CellKind::BeyondStriped
        )
    }
}

/// Transition marking of a lane within its section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Taper {
    #[default]
    None,
    /// Lane narrows to nothing at the section end
    MergeTaper,
    /// Lane opens from nothing at the section start
    DivergeTaper,
    /// Lane next to a merge taper
    MergeAdjacent,
    /// Lane next to a diverge taper
    DivergeAdjacent,
}

impl Taper {
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            '-' | '_' => Some(Taper::None),
            '>' => Some(Taper::MergeTaper),
            '<' => Some(Taper::DivergeTaper),
            '/' => Some(Taper::MergeAdjacent),
            '\\' => Some(Taper::DivergeAdjacent),
            _ => None,
        }
    }

    pub fn code(&self) -> char {
        match self {
            Taper::None => '-',
            Taper::MergeTaper => '>',
            Taper::DivergeTaper => '<',
            Taper::MergeAdjacent => '/',
            Taper::DivergeAdjacent => '\\',
        }
    }

    /// Merge or diverge taper proper (adjacent markers excluded)
    pub fn is_taper(&self) -> bool {
        matches!(self, Taper::MergeTaper | Taper::DivergeTaper)
    }
}

/// Reference into the switched-area table
///
/// Encoded in scenario text as a signed, non-zero integer: positive values are
/// rush-hour lanes, negative values plus lanes; the magnitude minus one is the
/// table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwitchedAreaRef {
    RushHourLane(usize),
    PlusLane(usize),
}

impl SwitchedAreaRef {
    pub fn from_signed(value: i64) -> Option<Self> {
        match value {
            0 => None,
            v if v > 0 => Some(SwitchedAreaRef::RushHourLane((v - 1) as usize)),
            v => Some(SwitchedAreaRef::PlusLane((v.unsigned_abs() - 1) as usize)),
        }
    }

    pub fn to_signed(&self) -> i64 {
        match self {
            SwitchedAreaRef::RushHourLane(i) => *i as i64 + 1,
            SwitchedAreaRef::PlusLane(i) => -(*i as i64 + 1),
        }
    }

    pub fn table_index(&self) -> usize {
        match self {
            SwitchedAreaRef::RushHourLane(i) | SwitchedAreaRef::PlusLane(i) => *i,
        }
    }
}

/// One lane of one section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneCell {
    pub kind: CellKind,
    pub taper: Taper,
    /// Lane index this cell continues into in the next section
    pub lane_out: usize,
    pub no_overtaking_trucks: bool,
    pub road_works: bool,
    /// Lane width in metres
    pub width: f64,
    /// Speed limit in km/h
    pub speed_limit: f64,
    pub switched_area: Option<SwitchedAreaRef>,
}

impl LaneCell {
    /// A plain lane of the given kind continuing straight on
    pub fn new(kind: CellKind, lane_out: usize, width: f64) -> Self {
        Self {
            kind,
            taper: Taper::None,
            lane_out,
            no_overtaking_trucks: false,
            road_works: false,
            width,
            speed_limit: 120.0,
            switched_area: None,
        }
    }

    pub fn with_taper(mut self, taper: Taper) -> Self {
        self.taper = taper;
        self
    }

    pub fn with_switched_area(mut self, switched_area: SwitchedAreaRef) -> Self {
        self.switched_area = Some(switched_area);
        self
    }

    pub fn is_unused(&self) -> bool {
        self.kind == CellKind::Unused
    }

    /// Whether the cell can carry traffic under the given striped-area policy
    pub fn is_traversable(&self, striped_traversable: bool) -> bool {
        match self.kind {
            CellKind::Unused => false,
            k if k.is_striped() => striped_traversable,
            _ => true,
        }
    }

    /// A switched area (rush-hour or plus lane) behaves as a shoulder
    pub fn is_shoulder(&self) -> bool {
        self.switched_area.is_some()
    }

    pub fn permits_left(&self, striped_traversable: bool) -> bool {
        match self.kind {
            CellKind::LeftOnly | CellKind::Both => true,
            CellKind::StripedLeft | CellKind::BeyondStriped => striped_traversable,
            _ => false,
        }
    }

    pub fn permits_right(&self, striped_traversable: bool) -> bool {
        match self.kind {
            CellKind::RightOnly | CellKind::Both => true,
            CellKind::StripedRight | CellKind::BeyondStriped => striped_traversable,
            _ => false,
        }
    }

    /// Render back to the scenario cell notation
    pub fn to_scenario_string(&self) -> String {
        let mut out = format!(
            "{},{},{},{},{},{},{}",
            self.kind.code(),
            self.taper.code(),
            self.lane_out,
            self.no_overtaking_trucks as u8,
            self.road_works as u8,
            self.width,
            self.speed_limit
        );
        if let Some(area) = self.switched_area {
            out.push_str(&format!(",{}", area.to_signed()));
        }
        out
    }
}

fn parse_flag(text: &str, field: &str, cell: &str) -> Result<bool, GridError> {
    match text {
        "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        other => Err(GridError::cell(
            cell,
            format!("{} must be 0 or 1, got '{}'", field, other),
        )),
    }
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Parses `kind,taper,laneOut,noOvertakingTrucks,roadWorks,width,speedLimit[,switchedArea]`
impl FromStr for LaneCell {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        if fields.len() != 7 && fields.len() != 8 {
            return Err(GridError::cell(
                s,
                format!("expected 7 or 8 fields, found {}", fields.len()),
            ));
        }

        let kind = single_char(fields[0])
            .and_then(CellKind::from_code)
            .ok_or_else(|| GridError::cell(s, format!("unknown lane kind '{}'", fields[0])))?;
        let taper = single_char(fields[1])
            .and_then(Taper::from_code)
            .ok_or_else(|| GridError::cell(s, format!("unknown taper '{}'", fields[1])))?;
        let lane_out = fields[2]
            .parse::<usize>()
            .map_err(|e| GridError::cell(s, format!("lane out: {}", e)))?;
        let no_overtaking_trucks = parse_flag(fields[3], "no-overtaking-trucks", s)?;
        let road_works = parse_flag(fields[4], "road-works", s)?;
        let width = fields[5]
            .parse::<f64>()
            .map_err(|e| GridError::cell(s, format!("width: {}", e)))?;
        if !(width.is_finite() && width >= 0.0) {
            return Err(GridError::cell(s, "width must be a non-negative number"));
        }
        let speed_limit = fields[6]
            .parse::<f64>()
            .map_err(|e| GridError::cell(s, format!("speed limit: {}", e)))?;
        let switched_area = match fields.get(7) {
            Some(text) => {
                let value = text
                    .parse::<i64>()
                    .map_err(|e| GridError::cell(s, format!("switched area: {}", e)))?;
                if value.checked_neg().is_none() {
                    return Err(GridError::cell(s, "switched area out of range"));
                }
                SwitchedAreaRef::from_signed(value)
            }
            None => None,
        };

        Ok(LaneCell {
            kind,
            taper,
            lane_out,
            no_overtaking_trucks,
            road_works,
            width,
            speed_limit,
            switched_area,
        })
    }
}

// ============================================================================
// SECTIONS AND TERMINALS
// ============================================================================

/// Longitudinal slice of the scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub index: usize,
    /// Length in metres
    pub length: f64,
    /// Position of the section start, from the scenario start
    pub start: f64,
}

impl Section {
    pub fn end(&self) -> f64 {
        self.start + self.length
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminalKind {
    Source,
    Sink,
}

impl fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalKind::Source => write!(f, "source"),
            TerminalKind::Sink => write!(f, "sink"),
        }
    }
}

/// Source or sink attachment point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminal {
    /// Distance in sections from the last section (0 = last)
    pub section_from_end: usize,
    pub from_lane: usize,
    pub to_lane: usize,
    /// Intended node name, may collide with other names
    pub name: String,
}

impl Terminal {
    pub fn new(
        section_from_end: usize,
        from_lane: usize,
        to_lane: usize,
        name: impl Into<String>,
    ) -> Self {
        Self {
            section_from_end,
            from_lane,
            to_lane,
            name: name.into(),
        }
    }

    /// Parse `sectionFromEnd fromLane toLane name...`; the name is the
    /// remainder of the text and may contain blanks.
    pub fn parse(kind: TerminalKind, text: &str) -> Result<Self, GridError> {
        let err = |reason: String| GridError::InvalidTerminal {
            kind,
            text: text.to_string(),
            reason,
        };
        let mut rest = text.trim_start();
        let mut numbers = [0usize; 3];
        for (slot, field) in numbers
            .iter_mut()
            .zip(["section from end", "from lane", "to lane"])
        {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            let (token, tail) = rest.split_at(end);
            if token.is_empty() {
                return Err(err(format!("missing {}", field)));
            }
            *slot = token
                .parse()
                .map_err(|e| err(format!("{}: {}", field, e)))?;
            rest = tail.trim_start();
        }
        let name = rest.trim_end();
        if name.is_empty() {
            return Err(err("missing name".to_string()));
        }
        if numbers[1] > numbers[2] {
            return Err(err(format!(
                "from lane {} is right of to lane {}",
                numbers[1], numbers[2]
            )));
        }
        Ok(Terminal::new(numbers[0], numbers[1], numbers[2], name))
    }

    pub fn contains_lane(&self, lane: usize) -> bool {
        (self.from_lane..=self.to_lane).contains(&lane)
    }
}

// ============================================================================
// OPAQUE SCENARIO FIELDS
// ============================================================================

/// Demand, detector and run parameters carried through for the simulator
///
/// The topology core never interprets these; they are parsed so that a
/// scenario round-trips and cross-reference counts can be checked.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioExtras {
    pub traffic_lights: Vec<String>,
    pub detector_times: Vec<f64>,
    pub detector_positions: Vec<f64>,
    pub vehicle_types: Vec<String>,
    pub vehicle_general_params: Vec<String>,
    /// Indexed by vehicle type, then parameter
    pub vehicle_specific_params: Vec<Vec<String>>,
    pub flows: Vec<String>,
    /// Per source, one probability per vehicle type
    pub vehicle_probabilities: Vec<Vec<f64>>,
    /// Per source, per vehicle type, one fraction per sink
    pub source_to_sink: Vec<Vec<Vec<f64>>>,
    pub switched_area_times: Vec<String>,
    pub temporary_blockage: Option<String>,
    pub random_seed: Option<u64>,
    pub time_step_size: Option<f64>,
    pub maximum_simulation_time: Option<f64>,
}

// ============================================================================
// SCENARIO GRID
// ============================================================================

/// Immutable, validated scenario grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioGrid {
    pub version: Option<String>,
    sections: Vec<Section>,
    /// Lane-major: `lanes[lane][section]`
    lanes: Vec<Vec<LaneCell>>,
    sources: Vec<Terminal>,
    sinks: Vec<Terminal>,
    pub extras: ScenarioExtras,
}

impl ScenarioGrid {
    /// Validate shape and lane targets and assemble the grid
    pub fn new(
        section_lengths: &[f64],
        lanes: Vec<Vec<LaneCell>>,
        sources: Vec<Terminal>,
        sinks: Vec<Terminal>,
    ) -> Result<Self, GridError> {
        if section_lengths.is_empty() {
            return Err(GridError::Empty("sections"));
        }
        if lanes.is_empty() {
            return Err(GridError::Empty("lanes"));
        }
        if let Some((section, &length)) = section_lengths
            .iter()
            .enumerate()
            .find(|(_, length)| !(length.is_finite() && **length >= 0.0))
        {
            return Err(GridError::InvalidSectionLength { section, length });
        }

        let mut start = 0.0;
        let sections = section_lengths
            .iter()
            .enumerate()
            .map(|(index, &length)| {
                let section = Section {
                    index,
                    length,
                    start,
                };
                start += length;
                section
            })
            .collect::<Vec<_>>();

        let lane_count = lanes.len();
        for (lane, row) in lanes.iter().enumerate() {
            if row.len() != sections.len() {
                return Err(GridError::ShapeMismatch {
                    lane,
                    cells: row.len(),
                    sections: sections.len(),
                });
            }
            // the last section has no successor, its lane targets are unused
            for (section, cell) in row.iter().enumerate().take(sections.len() - 1) {
                if !cell.is_unused() && cell.lane_out >= lane_count {
                    return Err(GridError::LaneTargetOutOfRange {
                        lane,
                        section,
                        lane_out: cell.lane_out,
                        lane_count,
                    });
                }
            }
        }

        Ok(Self {
            version: None,
            sections,
            lanes,
            sources,
            sinks,
            extras: ScenarioExtras::default(),
        })
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_extras(mut self, extras: ScenarioExtras) -> Self {
        self.extras = extras;
        self
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    pub fn cell(&self, lane: usize, section: usize) -> &LaneCell {
        &self.lanes[lane][section]
    }

    pub fn get_cell(&self, lane: usize, section: usize) -> Option<&LaneCell> {
        self.lanes.get(lane).and_then(|row| row.get(section))
    }

    /// Cells of one lane across all sections
    pub fn lane_row(&self, lane: usize) -> &[LaneCell] {
        &self.lanes[lane]
    }

    pub fn sources(&self) -> &[Terminal] {
        &self.sources
    }

    pub fn sinks(&self) -> &[Terminal] {
        &self.sinks
    }

    pub fn terminals(&self, kind: TerminalKind) -> &[Terminal] {
        match kind {
            TerminalKind::Source => &self.sources,
            TerminalKind::Sink => &self.sinks,
        }
    }

    /// Absolute section index for a distance-from-end count
    pub fn section_from_end(&self, from_end: usize) -> Option<usize> {
        (self.sections.len() - 1).checked_sub(from_end)
    }

    /// Total scenario length in metres
    pub fn length(&self) -> f64 {
        self.sections.last().map(Section::end).unwrap_or(0.0)
    }

    /// Project a longitudinal position onto `(section index, offset in section)`
    ///
    /// Section ends belong to the next section, except the scenario end which
    /// belongs to the last section.
    pub fn locate(&self, position: f64) -> Option<(usize, f64)> {
        if !(0.0..=self.length()).contains(&position) {
            return None;
        }
        let index = self
            .sections
            .iter()
            .position(|s| position < s.end())
            .unwrap_or(self.sections.len() - 1);
        let section = &self.sections[index];
        Some((index, position - section.start))
    }
}

// ============================================================================
// TESTS
// ============================================================================
