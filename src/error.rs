//! Build errors
//!
//! Every failure aborts the whole build; there is no warning level. Each
//! variant carries enough context (line, link id, lane) to point at the
//! offending part of the scenario.

use scenario_types::{GridError, SourceLocation, TerminalKind};
use thiserror::Error;

use crate::model::{LinkId, NodeId};

pub type BuildResult<T> = Result<T, BuildError>;

/// Which end of a link is missing its node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEnd {
    Start,
    End,
}

impl std::fmt::Display for LinkEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkEnd::Start => write!(f, "start"),
            LinkEnd::End => write!(f, "end"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("Malformed statement at {location}: '{text}' ({reason})")]
    MalformedLine {
        location: SourceLocation,
        text: String,
        reason: String,
    },

    #[error("Incomplete scenario: {0}")]
    IncompleteScenario(String),

    #[error("Invalid grid: {0}")]
    InvalidGrid(#[from] GridError),

    #[error("Cannot attach {kind} {index} ('{name}'): {reason}")]
    UnresolvedAttachment {
        kind: TerminalKind,
        index: usize,
        name: String,
        reason: String,
    },

    #[error("Link {link} (section {section}, lanes {from_lane}..={to_lane}) has no node at its {missing}")]
    DanglingLink {
        link: LinkId,
        section: usize,
        from_lane: usize,
        to_lane: usize,
        missing: LinkEnd,
    },

    #[error("Link {link} already has node {existing} at its {end}, cannot attach node {requested}")]
    ConflictingAttachment {
        link: LinkId,
        end: LinkEnd,
        existing: NodeId,
        requested: NodeId,
    },

    #[error("Link {link}, lane {lane}: non-adjacent merge, lane shifts {shift} positions to the left")]
    IllegalShift { link: LinkId, lane: usize, shift: i64 },

    #[error("Cross reference mismatch: {0}")]
    CrossReferenceMismatch(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BuildError {
    pub fn malformed(
        location: SourceLocation,
        text: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedLine {
            location,
            text: text.into(),
            reason: reason.into(),
        }
    }

    pub fn incomplete(message: impl Into<String>) -> Self {
        Self::IncompleteScenario(message.into())
    }

    /// Short machine-readable category, used by the CLI's JSON output
    pub fn code(&self) -> &'static str {
        match self {
            BuildError::MalformedLine { .. } => "malformed_line",
            BuildError::IncompleteScenario(_) => "incomplete_scenario",
            BuildError::InvalidGrid(_) => "invalid_grid",
            BuildError::UnresolvedAttachment { .. } => "unresolved_attachment",
            BuildError::DanglingLink { .. } => "dangling_link",
            BuildError::ConflictingAttachment { .. } => "conflicting_attachment",
            BuildError::IllegalShift { .. } => "illegal_shift",
            BuildError::CrossReferenceMismatch(_) => "cross_reference_mismatch",
            BuildError::Config(_) => "config",
        }
    }
}
