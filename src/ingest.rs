//! Scenario ingestion
//!
//! Applies parsed statements to a [`ScenarioBuilder`] and validates the result
//! into a [`ScenarioGrid`]. Indexed statements may appear in any order, so
//! indexed fields are collected in [`SparseList`]s and checked for gaps once
//! the whole text has been read.

use scenario_types::{LaneCell, ScenarioExtras, ScenarioGrid, SourceLocation, Terminal};
use tracing::{debug, info, warn};

use crate::error::{BuildError, BuildResult};
use crate::parser::{parse_statements, LocatedStatement, Statement};

// ============================================================================
// SPARSE LIST
// ============================================================================

/// Index-addressed list that grows on demand, leaving undefined slots
///
/// Scenario indices reaching this list are at most
/// [`MAX_INDEX`](crate::parser::MAX_INDEX).
#[derive(Debug, Clone, PartialEq)]
pub struct SparseList<T> {
    items: Vec<Option<T>>,
}

impl<T> Default for SparseList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> SparseList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define slot `index`, returning the value it replaces
    pub fn set(&mut self, index: usize, value: T) -> Option<T> {
        if index >= self.items.len() {
            self.items.resize_with(index + 1, || None);
        }
        self.items[index].replace(value)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index).and_then(Option::as_ref)
    }

    pub fn get_or_insert_with(&mut self, index: usize, f: impl FnOnce() -> T) -> &mut T {
        if index >= self.items.len() {
            self.items.resize_with(index + 1, || None);
        }
        self.items[index].get_or_insert_with(f)
    }

    /// Highest defined index plus one
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Undefined indices below [`len`](Self::len)
    pub fn missing(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Dense values, or `IncompleteScenario` naming the undefined indices
    pub fn finish(self, what: &str) -> BuildResult<Vec<T>> {
        let missing = self.missing();
        if !missing.is_empty() {
            let list = missing
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(BuildError::incomplete(format!(
                "{} {} not defined",
                what, list
            )));
        }
        Ok(self.items.into_iter().flatten().collect())
    }
}

// ============================================================================
// SCENARIO BUILDER
// ============================================================================

#[derive(Debug, Default)]
pub struct ScenarioBuilder {
    version: Option<String>,
    sections: Option<Vec<f64>>,
    lanes: SparseList<Vec<LaneCell>>,
    sources: SparseList<Terminal>,
    sinks: SparseList<Terminal>,
    traffic_lights: SparseList<String>,
    detector_times: Vec<f64>,
    detector_positions: Vec<f64>,
    vehicle_types: Vec<String>,
    vehicle_general_params: SparseList<String>,
    vehicle_specific_params: SparseList<SparseList<String>>,
    flows: SparseList<String>,
    vehicle_probabilities: SparseList<Vec<f64>>,
    source_to_sink: SparseList<SparseList<Vec<f64>>>,
    switched_area_times: SparseList<String>,
    temporary_blockage: Option<String>,
    random_seed: Option<u64>,
    time_step_size: Option<f64>,
    maximum_simulation_time: Option<f64>,
    ended_at: Option<SourceLocation>,
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, located: LocatedStatement) -> BuildResult<()> {
        let LocatedStatement {
            location,
            text,
            statement,
        } = located;

        if let Some(end) = &self.ended_at {
            return Err(BuildError::malformed(
                location,
                text,
                format!("statement after end of file at {}", end),
            ));
        }

        let replaced = match statement {
            Statement::Version(v) => self.version.replace(v).is_some(),
            Statement::Sections(lengths) => self.sections.replace(lengths).is_some(),
            Statement::Lane { index, cells } => self.lanes.set(index, cells).is_some(),
            Statement::Source { index, terminal } => self.sources.set(index, terminal).is_some(),
            Statement::Sink { index, terminal } => self.sinks.set(index, terminal).is_some(),
            Statement::TrafficLight { index, value } => {
                self.traffic_lights.set(index, value).is_some()
            }
            Statement::DetectorTimes(values) => {
                !std::mem::replace(&mut self.detector_times, values).is_empty()
            }
            Statement::DetectorPositions(values) => {
                !std::mem::replace(&mut self.detector_positions, values).is_empty()
            }
            Statement::VehicleTypes(types) => {
                !std::mem::replace(&mut self.vehicle_types, types).is_empty()
            }
            Statement::VehicleGeneralParam { index, value } => {
                self.vehicle_general_params.set(index, value).is_some()
            }
            Statement::VehicleSpecificParam {
                vehicle,
                param,
                value,
            } => self
                .vehicle_specific_params
                .get_or_insert_with(vehicle, SparseList::new)
                .set(param, value)
                .is_some(),
            Statement::Flow { index, value } => self.flows.set(index, value).is_some(),
            Statement::VehicleProbabilities { source, values } => {
                self.vehicle_probabilities.set(source, values).is_some()
            }
            Statement::SourceToSink {
                source,
                vehicle,
                values,
            } => self
                .source_to_sink
                .get_or_insert_with(source, SparseList::new)
                .set(vehicle, values)
                .is_some(),
            Statement::LaneChange(_) => {
                warn!(%location, "ignoring lane change statement");
                false
            }
            Statement::SwitchedAreaTimes { index, value } => {
                self.switched_area_times.set(index, value).is_some()
            }
            Statement::TemporaryBlockage(v) => self.temporary_blockage.replace(v).is_some(),
            Statement::RandomSeed(v) => self.random_seed.replace(v).is_some(),
            Statement::TimeStepSize(v) => self.time_step_size.replace(v).is_some(),
            Statement::MaximumSimulationTime(v) => {
                self.maximum_simulation_time.replace(v).is_some()
            }
            Statement::EndOfFile => {
                debug!(%location, "end of file marker");
                self.ended_at = Some(location);
                return Ok(());
            }
        };

        if replaced {
            warn!(%location, statement = %text, "statement redefines an earlier value");
        }
        Ok(())
    }

    /// Check completeness and cross references, then assemble the grid
    pub fn finish(self) -> BuildResult<ScenarioGrid> {
        let sections = self
            .sections
            .ok_or_else(|| BuildError::incomplete("no 'sections' statement"))?;
        let lanes = self.lanes.finish("lane")?;
        let sources = self.sources.finish("source")?;
        let sinks = self.sinks.finish("sink")?;

        let vehicle_specific_params = self
            .vehicle_specific_params
            .finish("vehicle specific params for vehicle")?
            .into_iter()
            .enumerate()
            .map(|(vehicle, params)| {
                params.finish(&format!("vehicle {} specific param", vehicle))
            })
            .collect::<BuildResult<Vec<_>>>()?;
        let source_to_sink = self
            .source_to_sink
            .finish("source to sink entries for source")?
            .into_iter()
            .enumerate()
            .map(|(source, rows)| rows.finish(&format!("source {} to sink vehicle type", source)))
            .collect::<BuildResult<Vec<_>>>()?;

        let extras = ScenarioExtras {
            traffic_lights: self.traffic_lights.finish("traffic light")?,
            detector_times: self.detector_times,
            detector_positions: self.detector_positions,
            vehicle_types: self.vehicle_types,
            vehicle_general_params: self.vehicle_general_params.finish("vehicle general param")?,
            vehicle_specific_params,
            flows: self.flows.finish("flow")?,
            vehicle_probabilities: self.vehicle_probabilities.finish("vehicle probabilities")?,
            source_to_sink,
            switched_area_times: self.switched_area_times.finish("switched area times")?,
            temporary_blockage: self.temporary_blockage,
            random_seed: self.random_seed,
            time_step_size: self.time_step_size,
            maximum_simulation_time: self.maximum_simulation_time,
        };
        check_cross_references(&extras, sources.len(), sinks.len())?;

        let mut grid = ScenarioGrid::new(&sections, lanes, sources, sinks)?.with_extras(extras);
        if let Some(version) = self.version {
            grid = grid.with_version(version);
        }

        info!(
            sections = grid.section_count(),
            lanes = grid.lane_count(),
            sources = grid.sources().len(),
            sinks = grid.sinks().len(),
            "scenario ingested"
        );
        Ok(grid)
    }
}

/// Demand tables must agree with the declared vehicle types and terminals
fn check_cross_references(extras: &ScenarioExtras, sources: usize, sinks: usize) -> BuildResult<()> {
    let vehicle_types = extras.vehicle_types.len();

    if extras.vehicle_probabilities.len() > sources {
        return Err(BuildError::CrossReferenceMismatch(format!(
            "vehicle probabilities given for {} sources, scenario has {}",
            extras.vehicle_probabilities.len(),
            sources
        )));
    }
    for (source, row) in extras.vehicle_probabilities.iter().enumerate() {
        if row.len() != vehicle_types {
            return Err(BuildError::CrossReferenceMismatch(format!(
                "vehicle probabilities {} has {} values for {} vehicle types",
                source,
                row.len(),
                vehicle_types
            )));
        }
    }

    if extras.source_to_sink.len() > sources {
        return Err(BuildError::CrossReferenceMismatch(format!(
            "source to sink given for {} sources, scenario has {}",
            extras.source_to_sink.len(),
            sources
        )));
    }
    for (source, per_vehicle) in extras.source_to_sink.iter().enumerate() {
        if per_vehicle.len() != vehicle_types {
            return Err(BuildError::CrossReferenceMismatch(format!(
                "source to sink {} covers {} vehicle types, scenario declares {}",
                source,
                per_vehicle.len(),
                vehicle_types
            )));
        }
        for (vehicle, fractions) in per_vehicle.iter().enumerate() {
            if fractions.len() != sinks {
                return Err(BuildError::CrossReferenceMismatch(format!(
                    "source to sink {} {} has {} values for {} sinks",
                    source,
                    vehicle,
                    fractions.len(),
                    sinks
                )));
            }
        }
    }
    Ok(())
}

/// Parse and validate scenario text
pub fn parse_scenario(input: &str) -> BuildResult<ScenarioGrid> {
    ingest(input, None)
}

/// Like [`parse_scenario`], with `name` in error locations
pub fn parse_scenario_named(input: &str, name: &str) -> BuildResult<ScenarioGrid> {
    ingest(input, Some(name))
}

fn ingest(input: &str, source_name: Option<&str>) -> BuildResult<ScenarioGrid> {
    let mut builder = ScenarioBuilder::new();
    for statement in parse_statements(input, source_name)? {
        builder.apply(statement)?;
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scenario_types::{CellKind, GridError};

    const TWO_LANES: &str = "\
version: 2
sections: 100 200
lane 1: c,-,1,0,0,3.5,120 c,-,1,0,0,3.5,120
lane 0: c,-,0,0,0,3.5,120 c,-,0,0,0,3.5,120
source 0: 1 0 1 In
sink 0: 0 0 1 Out
";

    #[test]
    fn test_sparse_list_fills_gaps() {
        let mut list = SparseList::new();
        assert_eq!(list.set(2, "c"), None);
        assert_eq!(list.set(0, "a"), None);
        assert_eq!(list.len(), 3);
        assert_eq!(list.missing(), vec![1]);
        assert_eq!(list.get(2), Some(&"c"));

        let err = list.clone().finish("lane").unwrap_err();
        assert_eq!(err, BuildError::incomplete("lane 1 not defined"));

        assert_eq!(list.set(1, "b"), None);
        assert_eq!(list.set(1, "B"), Some("b"));
        assert_eq!(list.finish("lane").unwrap(), vec!["a", "B", "c"]);
    }

    #[test]
    fn test_out_of_order_lanes() {
        let grid = parse_scenario(TWO_LANES).unwrap();
        assert_eq!(grid.version.as_deref(), Some("2"));
        assert_eq!(grid.section_count(), 2);
        assert_eq!(grid.lane_count(), 2);
        assert_eq!(grid.cell(1, 0).lane_out, 1);
        assert_eq!(grid.cell(0, 1).kind, CellKind::Both);
        assert_eq!(grid.sources()[0].name, "In");
        assert_eq!(grid.sinks()[0].to_lane, 1);
    }

    #[test]
    fn test_missing_lane_is_incomplete() {
        let text = "sections: 100\nlane 1: c,-,1,0,0,3.5,120\n";
        let err = parse_scenario(text).unwrap_err();
        assert_eq!(err, BuildError::incomplete("lane 0 not defined"));
    }

    #[test]
    fn test_missing_sections_is_incomplete() {
        let err = parse_scenario("lane 0: c,-,0,0,0,3.5,120\n").unwrap_err();
        assert!(matches!(err, BuildError::IncompleteScenario(_)));
    }

    #[test]
    fn test_statement_after_end_of_file() {
        let text = format!("{}end of file\nflow 0: 1000\n", TWO_LANES);
        let err = parse_scenario(&text).unwrap_err();
        match err {
            BuildError::MalformedLine { location, text, .. } => {
                assert_eq!(location.line, 8);
                assert_eq!(text, "flow 0: 1000");
            }
            other => panic!("expected malformed line, got {:?}", other),
        }
    }

    #[test]
    fn test_end_of_file_is_optional() {
        let with_marker = parse_scenario(&format!("{}end of file\n", TWO_LANES)).unwrap();
        let without = parse_scenario(TWO_LANES).unwrap();
        assert_eq!(with_marker, without);
    }

    #[test]
    fn test_blank_and_comment_lines_after_end_of_file() {
        let text = format!("{}end of file\n\n# trailer\n   \n", TWO_LANES);
        assert_eq!(parse_scenario(&text).unwrap(), parse_scenario(TWO_LANES).unwrap());
    }

    #[test]
    fn test_lane_row_shape_checked() {
        let text = "sections: 100 100\nlane 0: c,-,0,0,0,3.5,120\n";
        let err = parse_scenario(text).unwrap_err();
        assert_eq!(
            err,
            BuildError::InvalidGrid(GridError::ShapeMismatch {
                lane: 0,
                cells: 1,
                sections: 2
            })
        );
    }

    #[test]
    fn test_negative_section_length_rejected() {
        let text = "sections: 100 -100\nlane 0: c,-,0,0,0,3.5,120 c,-,0,0,0,3.5,120\n";
        let err = parse_scenario(text).unwrap_err();
        assert!(matches!(
            err,
            BuildError::InvalidGrid(GridError::InvalidSectionLength { section: 1, .. })
        ));
    }

    #[test]
    fn test_demand_tables() {
        let text = format!(
            "{}vehicle types: car truck\n\
             vehicle probabilities 0: 0.9 0.1\n\
             source to sink 0 1: 1\n\
             source to sink 0 0: 1\n\
             vehicle specific param 1 0: 80\n\
             vehicle specific param 0 0: 120\n\
             random seed: 7\n",
            TWO_LANES
        );
        let grid = parse_scenario(&text).unwrap();
        let extras = &grid.extras;
        assert_eq!(extras.vehicle_types, vec!["car", "truck"]);
        assert_eq!(extras.vehicle_probabilities, vec![vec![0.9, 0.1]]);
        assert_eq!(extras.source_to_sink, vec![vec![vec![1.0], vec![1.0]]]);
        assert_eq!(extras.vehicle_specific_params[1], vec!["80".to_string()]);
        assert_eq!(extras.random_seed, Some(7));
    }

    #[test]
    fn test_probability_count_mismatch() {
        let text = format!(
            "{}vehicle types: car truck\nvehicle probabilities 0: 1.0\n",
            TWO_LANES
        );
        let err = parse_scenario(&text).unwrap_err();
        assert!(matches!(err, BuildError::CrossReferenceMismatch(_)));
    }

    #[test]
    fn test_source_to_sink_vehicle_count_mismatch() {
        let text = format!(
            "{}vehicle types: car truck\nsource to sink 0 0: 1\n",
            TWO_LANES
        );
        let err = parse_scenario(&text).unwrap_err();
        assert!(matches!(err, BuildError::CrossReferenceMismatch(_)));
    }

    #[test]
    fn test_huge_index_is_malformed() {
        let text = "sections: 100\nlane 18446744073709551615: c,-,0,0,0,3.5,120\n";
        match parse_scenario(text).unwrap_err() {
            BuildError::MalformedLine { location, .. } => assert_eq!(location.line, 2),
            other => panic!("expected malformed line, got {:?}", other),
        }
        let err = parse_scenario("sections: 100\nlane 4000000000: c,-,0,0,0,3.5,120\n");
        assert!(matches!(err, Err(BuildError::MalformedLine { .. })));
    }

    #[test]
    fn test_named_source_in_errors() {
        let err = parse_scenario_named("sections: x\n", "demo.scn").unwrap_err();
        assert!(err.to_string().contains("demo.scn:1"));
    }
}
