use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::report::ReportMode;

/// Pipeline stage an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Input,
    Grouping,
    Rendering,
    Output,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Input => "input",
            Stage::Grouping => "grouping",
            Stage::Rendering => "rendering",
            Stage::Output => "output",
        };
        f.write_str(name)
    }
}

/// Errors that abort a report.
///
/// Image failures are not represented here; they degrade to placeholders
/// inside the image pipeline.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no records to render in {mode} mode")]
    EmptyInput { mode: ReportMode },

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("grouping failed: {0}")]
    Grouping(String),

    #[error("rendering failed: {0}")]
    Rendering(String),

    #[error("failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("report cancelled")]
    Cancelled,
}

impl ReportError {
    pub fn stage(&self) -> Stage {
        match self {
            ReportError::EmptyInput { .. } | ReportError::RecordNotFound(_) => Stage::Input,
            ReportError::Grouping(_) => Stage::Grouping,
            ReportError::Rendering(_) | ReportError::Cancelled => Stage::Rendering,
            ReportError::Output { .. } => Stage::Output,
        }
    }

    pub fn output(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ReportError::Output { path: path.into(), source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        assert_eq!(ReportError::EmptyInput { mode: ReportMode::Consolidated }.stage(), Stage::Input);
        assert_eq!(ReportError::Rendering("x".into()).stage(), Stage::Rendering);
        let err = ReportError::output("/nope/report.pdf", io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert_eq!(err.stage(), Stage::Output);
        assert_eq!(err.to_string(), "failed to write /nope/report.pdf: missing");
    }

    #[test]
    fn test_empty_input_message() {
        let err = ReportError::EmptyInput { mode: ReportMode::Detailed };
        assert_eq!(err.to_string(), "no records to render in detailed mode");
        assert_eq!(Stage::Grouping.to_string(), "grouping");
    }
}
