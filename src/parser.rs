//! Scenario statement parser
//!
//! Scenario text is line oriented. Every non-blank, non-comment line is one
//! statement of the form
//!
//! ```text
//! <keyword>[ <index>[ <index2>]]: <value>
//! ```
//!
//! Keywords overlap (`lane change` / `lane`, `source to sink` / `source`), so
//! the longer keyword is always tried first. The parser only decodes single
//! lines; ordering rules (indexed fields, `end of file`) belong to
//! [`crate::ingest`].

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, satisfy, space0, space1},
    combinator::{all_consuming, map_res, not, opt, peek, value},
    error::{
        context, convert_error, ContextError, FromExternalError, ParseError as NomParseError,
        VerboseError,
    },
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{preceded, terminated},
    IResult,
};
use scenario_types::{LaneCell, SourceLocation, Terminal, TerminalKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use crate::error::{BuildError, BuildResult};

/// Largest index a statement may address
pub const MAX_INDEX: usize = 65_535;

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    Version,
    Sections,
    Lane,
    Source,
    Sink,
    TrafficLight,
    DetectorTimes,
    DetectorPositions,
    VehicleTypes,
    VehicleGeneralParam,
    VehicleSpecificParam,
    Flow,
    VehicleProbabilities,
    SourceToSink,
    LaneChange,
    SwitchedAreaTimes,
    TemporaryBlockage,
    RandomSeed,
    TimeStepSize,
    MaximumSimulationTime,
    EndOfFile,
}

impl Keyword {
    pub fn text(&self) -> &'static str {
        match self {
            Keyword::Version => "version",
            Keyword::Sections => "sections",
            Keyword::Lane => "lane",
            Keyword::Source => "source",
            Keyword::Sink => "sink",
            Keyword::TrafficLight => "traffic light",
            Keyword::DetectorTimes => "detector times",
            Keyword::DetectorPositions => "detector positions",
            Keyword::VehicleTypes => "vehicle types",
            Keyword::VehicleGeneralParam => "vehicle general param",
            Keyword::VehicleSpecificParam => "vehicle specific param",
            Keyword::Flow => "flow",
            Keyword::VehicleProbabilities => "vehicle probabilities",
            Keyword::SourceToSink => "source to sink",
            Keyword::LaneChange => "lane change",
            Keyword::SwitchedAreaTimes => "switched area times",
            Keyword::TemporaryBlockage => "temporary blockage",
            Keyword::RandomSeed => "random seed",
            Keyword::TimeStepSize => "time step size",
            Keyword::MaximumSimulationTime => "maximum simulation time",
            Keyword::EndOfFile => "end of file",
        }
    }

    /// Number of indices that follow the keyword
    pub fn arity(&self) -> usize {
        match self {
            Keyword::VehicleSpecificParam | Keyword::SourceToSink => 2,
            Keyword::Lane
            | Keyword::Source
            | Keyword::Sink
            | Keyword::TrafficLight
            | Keyword::VehicleGeneralParam
            | Keyword::Flow
            | Keyword::VehicleProbabilities
            | Keyword::SwitchedAreaTimes => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// One decoded scenario statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Version(String),
    /// Section lengths in metres
    Sections(Vec<f64>),
    Lane { index: usize, cells: Vec<LaneCell> },
    Source { index: usize, terminal: Terminal },
    Sink { index: usize, terminal: Terminal },
    TrafficLight { index: usize, value: String },
    DetectorTimes(Vec<f64>),
    DetectorPositions(Vec<f64>),
    VehicleTypes(Vec<String>),
    VehicleGeneralParam { index: usize, value: String },
    VehicleSpecificParam {
        vehicle: usize,
        param: usize,
        value: String,
    },
    Flow { index: usize, value: String },
    VehicleProbabilities { source: usize, values: Vec<f64> },
    /// Per-sink fractions for one source and vehicle type
    SourceToSink {
        source: usize,
        vehicle: usize,
        values: Vec<f64>,
    },
    /// Accepted and ignored
    LaneChange(String),
    SwitchedAreaTimes { index: usize, value: String },
    TemporaryBlockage(String),
    RandomSeed(u64),
    TimeStepSize(f64),
    MaximumSimulationTime(f64),
    EndOfFile,
}

impl Statement {
    pub fn keyword(&self) -> Keyword {
        match self {
            Statement::Version(_) => Keyword::Version,
            Statement::Sections(_) => Keyword::Sections,
            Statement::Lane { .. } => Keyword::Lane,
            Statement::Source { .. } => Keyword::Source,
            Statement::Sink { .. } => Keyword::Sink,
            Statement::TrafficLight { .. } => Keyword::TrafficLight,
            Statement::DetectorTimes(_) => Keyword::DetectorTimes,
            Statement::DetectorPositions(_) => Keyword::DetectorPositions,
            Statement::VehicleTypes(_) => Keyword::VehicleTypes,
            Statement::VehicleGeneralParam { .. } => Keyword::VehicleGeneralParam,
            Statement::VehicleSpecificParam { .. } => Keyword::VehicleSpecificParam,
            Statement::Flow { .. } => Keyword::Flow,
            Statement::VehicleProbabilities { .. } => Keyword::VehicleProbabilities,
            Statement::SourceToSink { .. } => Keyword::SourceToSink,
            Statement::LaneChange(_) => Keyword::LaneChange,
            Statement::SwitchedAreaTimes { .. } => Keyword::SwitchedAreaTimes,
            Statement::TemporaryBlockage(_) => Keyword::TemporaryBlockage,
            Statement::RandomSeed(_) => Keyword::RandomSeed,
            Statement::TimeStepSize(_) => Keyword::TimeStepSize,
            Statement::MaximumSimulationTime(_) => Keyword::MaximumSimulationTime,
            Statement::EndOfFile => Keyword::EndOfFile,
        }
    }
}

/// A statement with the line it came from
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedStatement {
    pub location: SourceLocation,
    pub text: String,
    pub statement: Statement,
}

// ============================================================================
// Public API
// ============================================================================

/// Parse one line; `Ok(None)` for blank lines and `#` comments
pub fn parse_statement(line: &str) -> Result<Option<Statement>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (rest, (keyword, indices, colon)) = match header::<VerboseError<&str>>(line) {
        Ok(parsed) => parsed,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(convert_error(line, e));
        }
        Err(nom::Err::Incomplete(_)) => return Err("Incomplete input".to_string()),
    };

    if !colon && keyword != Keyword::EndOfFile {
        return Err(format!("expected ':' after '{}'", keyword));
    }
    if indices.len() != keyword.arity() {
        return Err(format!(
            "'{}' takes {} index(es), found {}",
            keyword,
            keyword.arity(),
            indices.len()
        ));
    }
    if let Some(index) = indices.iter().find(|&&i| i > MAX_INDEX) {
        return Err(format!("index {} exceeds {}", index, MAX_INDEX));
    }

    decode(keyword, &indices, rest.trim()).map(Some)
}

/// Parse every line of a scenario
///
/// Fails on the first malformed line, reporting its 1-based line number.
pub fn parse_statements(
    input: &str,
    source_name: Option<&str>,
) -> BuildResult<Vec<LocatedStatement>> {
    let mut out = Vec::new();
    for (i, line) in input.lines().enumerate() {
        let location = match source_name {
            Some(name) => SourceLocation::with_source(i + 1, name),
            None => SourceLocation::new(i + 1),
        };
        match parse_statement(line) {
            Ok(Some(statement)) => out.push(LocatedStatement {
                location,
                text: line.trim().to_string(),
                statement,
            }),
            Ok(None) => {}
            Err(reason) => return Err(BuildError::malformed(location, line.trim(), reason)),
        }
    }
    Ok(out)
}

// ============================================================================
// Internal Parsers
// ============================================================================

fn keyword<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Keyword, E> {
    // most specific first where keywords share a prefix
    let structure = alt((
        value(Keyword::LaneChange, tag("lane change")),
        value(Keyword::Lane, tag("lane")),
        value(Keyword::SourceToSink, tag("source to sink")),
        value(Keyword::Source, tag("source")),
        value(Keyword::Sink, tag("sink")),
        value(Keyword::Sections, tag("sections")),
        value(Keyword::Version, tag("version")),
    ));
    let demand = alt((
        value(Keyword::TrafficLight, tag("traffic light")),
        value(Keyword::DetectorTimes, tag("detector times")),
        value(Keyword::DetectorPositions, tag("detector positions")),
        value(Keyword::VehicleTypes, tag("vehicle types")),
        value(Keyword::VehicleGeneralParam, tag("vehicle general param")),
        value(Keyword::VehicleSpecificParam, tag("vehicle specific param")),
        value(Keyword::VehicleProbabilities, tag("vehicle probabilities")),
        value(Keyword::Flow, tag("flow")),
    ));
    let run = alt((
        value(Keyword::SwitchedAreaTimes, tag("switched area times")),
        value(Keyword::TemporaryBlockage, tag("temporary blockage")),
        value(Keyword::RandomSeed, tag("random seed")),
        value(Keyword::TimeStepSize, tag("time step size")),
        value(Keyword::MaximumSimulationTime, tag("maximum simulation time")),
        value(Keyword::EndOfFile, tag("end of file")),
    ));

    context(
        "keyword",
        terminated(
            alt((structure, demand, run)),
            not(peek(satisfy(|c: char| c.is_alphanumeric() || c == '_'))),
        ),
    )(input)
}

fn index<'a, E>(input: &'a str) -> IResult<&'a str, usize, E>
where
    E: NomParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    context("index", map_res(digit1, usize::from_str))(input)
}

/// Keyword, indices, and whether a ':' follows
fn header<'a, E>(input: &'a str) -> IResult<&'a str, (Keyword, Vec<usize>, bool), E>
where
    E: NomParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    let (input, keyword) = keyword(input)?;
    let (input, indices) = many0(preceded(space1, index))(input)?;
    let (input, _) = space0(input)?;
    let (input, colon) = opt(char(':'))(input)?;
    Ok((input, (keyword, indices, colon.is_some())))
}

fn number_list<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Vec<f64>, E> {
    context("number list", separated_list0(space1, double))(input)
}

fn numbers(value: &str) -> Result<Vec<f64>, String> {
    match all_consuming(number_list::<VerboseError<&str>>)(value) {
        Ok((_, values)) => Ok(values),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(convert_error(value, e)),
        Err(nom::Err::Incomplete(_)) => Err("Incomplete input".to_string()),
    }
}

fn scalar<T: FromStr>(value: &str, what: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("'{}' is not a valid {}", value, what))
}

fn decode(keyword: Keyword, indices: &[usize], value: &str) -> Result<Statement, String> {
    let text = value.to_string();
    let statement = match keyword {
        Keyword::Version => Statement::Version(text),
        Keyword::Sections => Statement::Sections(numbers(value)?),
        Keyword::Lane => Statement::Lane {
            index: indices[0],
            cells: value
                .split_whitespace()
                .map(|cell| cell.parse::<LaneCell>().map_err(|e| e.to_string()))
                .collect::<Result<_, _>>()?,
        },
        Keyword::Source => Statement::Source {
            index: indices[0],
            terminal: Terminal::parse(TerminalKind::Source, value).map_err(|e| e.to_string())?,
        },
        Keyword::Sink => Statement::Sink {
            index: indices[0],
            terminal: Terminal::parse(TerminalKind::Sink, value).map_err(|e| e.to_string())?,
        },
        Keyword::TrafficLight => Statement::TrafficLight {
            index: indices[0],
            value: text,
        },
        Keyword::DetectorTimes => Statement::DetectorTimes(numbers(value)?),
        Keyword::DetectorPositions => Statement::DetectorPositions(numbers(value)?),
        Keyword::VehicleTypes => {
            Statement::VehicleTypes(value.split_whitespace().map(str::to_string).collect())
        }
        Keyword::VehicleGeneralParam => Statement::VehicleGeneralParam {
            index: indices[0],
            value: text,
        },
        Keyword::VehicleSpecificParam => Statement::VehicleSpecificParam {
            vehicle: indices[0],
            param: indices[1],
            value: text,
        },
        Keyword::Flow => Statement::Flow {
            index: indices[0],
            value: text,
        },
        Keyword::VehicleProbabilities => Statement::VehicleProbabilities {
            source: indices[0],
            values: numbers(value)?,
        },
        Keyword::SourceToSink => Statement::SourceToSink {
            source: indices[0],
            vehicle: indices[1],
            values: numbers(value)?,
        },
        Keyword::LaneChange => Statement::LaneChange(text),
        Keyword::SwitchedAreaTimes => Statement::SwitchedAreaTimes {
            index: indices[0],
            value: text,
        },
        Keyword::TemporaryBlockage => Statement::TemporaryBlockage(text),
        Keyword::RandomSeed => Statement::RandomSeed(scalar(value, "seed")?),
        Keyword::TimeStepSize => Statement::TimeStepSize(scalar(value, "number")?),
        Keyword::MaximumSimulationTime => {
            Statement::MaximumSimulationTime(scalar(value, "number")?)
        }
        Keyword::EndOfFile => {
            if !value.is_empty() {
                return Err("'end of file' takes no value".to_string());
            }
            Statement::EndOfFile
        }
    };
    Ok(statement)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scenario_types::{CellKind, Taper};

    fn parse(line: &str) -> Statement {
        parse_statement(line).unwrap().unwrap()
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(parse_statement("").unwrap(), None);
        assert_eq!(parse_statement("   ").unwrap(), None);
        assert_eq!(parse_statement("# lane 0: nothing").unwrap(), None);
    }

    #[test]
    fn test_sections() {
        assert_eq!(
            parse("sections: 100 250.5  80"),
            Statement::Sections(vec![100.0, 250.5, 80.0])
        );
    }

    #[test]
    fn test_lane_statement() {
        let stmt = parse("lane 1: c,-,1,0,0,3.5,120 c,>,0,0,0,3.5,100");
        match stmt {
            Statement::Lane { index, cells } => {
                assert_eq!(index, 1);
                assert_eq!(cells.len(), 2);
                assert_eq!(cells[1].kind, CellKind::Both);
                assert_eq!(cells[1].taper, Taper::MergeTaper);
                assert_eq!(cells[1].lane_out, 0);
            }
            other => panic!("expected lane, got {:?}", other),
        }
    }

    #[test]
    fn test_more_specific_keyword_wins() {
        assert_eq!(
            parse("lane change: anything at all"),
            Statement::LaneChange("anything at all".to_string())
        );
        assert_eq!(
            parse("source to sink 0 1: 0.25 0.75"),
            Statement::SourceToSink {
                source: 0,
                vehicle: 1,
                values: vec![0.25, 0.75]
            }
        );
        match parse("source 0: 2 0 1 Main Street") {
            Statement::Source { index, terminal } => {
                assert_eq!(index, 0);
                assert_eq!(terminal.section_from_end, 2);
                assert_eq!(terminal.name, "Main Street");
            }
            other => panic!("expected source, got {:?}", other),
        }
    }

    #[test]
    fn test_two_index_keyword() {
        assert_eq!(
            parse("vehicle specific param 2 3: 1.5 fast"),
            Statement::VehicleSpecificParam {
                vehicle: 2,
                param: 3,
                value: "1.5 fast".to_string()
            }
        );
    }

    #[test]
    fn test_scalars() {
        assert_eq!(parse("random seed: 42"), Statement::RandomSeed(42));
        assert_eq!(parse("time step size: 0.5"), Statement::TimeStepSize(0.5));
        assert_eq!(parse("end of file"), Statement::EndOfFile);
        assert_eq!(parse("end of file:"), Statement::EndOfFile);
        assert_eq!(parse("vehicle types: car truck"), Statement::VehicleTypes(vec![
            "car".to_string(),
            "truck".to_string()
        ]));
    }

    #[test]
    fn test_rejections() {
        assert!(parse_statement("lanes: 1 2").is_err());
        assert!(parse_statement("lane: c,-,0,0,0,3.5,120").is_err());
        assert!(parse_statement("sections 100").is_err());
        assert!(parse_statement("sections: 100 abc").is_err());
        assert!(parse_statement("random seed: -1").is_err());
        assert!(parse_statement("source 0: 0 0").is_err());
        assert!(parse_statement("end of file: now").is_err());
        assert!(parse_statement("bridges: 3").is_err());
    }

    #[test]
    fn test_index_limit() {
        assert!(parse_statement(&format!("flow {}: 1", MAX_INDEX)).is_ok());

        let err = parse_statement(&format!("flow {}: 1", MAX_INDEX + 1)).unwrap_err();
        assert!(err.contains("exceeds"), "{}", err);
        assert!(parse_statement("lane 18446744073709551615: c,-,0,0,0,3.5,120").is_err());
        assert!(parse_statement("lane 99999999999999999999999: c,-,0,0,0,3.5,120").is_err());
        assert!(parse_statement("source to sink 0 4000000000: 1").is_err());
    }

    #[test]
    fn test_statements_carry_line_numbers() {
        let text = "# header\nversion: 3\n\nsections: 100\n";
        let parsed = parse_statements(text, None).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].location.line, 2);
        assert_eq!(parsed[1].location.line, 4);
        assert_eq!(parsed[1].statement.keyword(), Keyword::Sections);
    }

    #[test]
    fn test_malformed_line_reports_location() {
        let err = parse_statements("version: 1\nbogus line\n", Some("a.scn")).unwrap_err();
        match err {
            BuildError::MalformedLine { location, text, .. } => {
                assert_eq!(location, SourceLocation::with_source(2, "a.scn"));
                assert_eq!(text, "bogus line");
            }
            other => panic!("expected malformed line, got {:?}", other),
        }
    }
}
