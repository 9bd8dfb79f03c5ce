//! Error taxonomy for the dashboard pipeline.
//!
//! Validation errors are raised before anything is sent to the warehouse,
//! execution errors come back from the warehouse boundary, and shape errors
//! describe result tables that cannot be displayed.

use chrono::NaiveDate;
use thiserror::Error;

/// Rejected user input. Nothing has been executed when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("end date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("unknown timeframe {0:?}, expected day, week or month")]
    UnknownGranularity(String),

    #[error("unknown chain {0:?}")]
    UnknownChain(String),

    #[error("invalid asset symbol {0:?}")]
    InvalidAsset(String),
}

/// Failure reported by the warehouse boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("query timed out after {0}s")]
    Timeout(u64),

    #[error("query failed ({code}): {message}")]
    Query { code: String, message: String },

    #[error("could not decode warehouse response: {0}")]
    Decode(String),
}

impl ExecutionError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Authentication(_) => "authentication",
            Self::Timeout(_) => "timeout",
            Self::Query { .. } => "query",
            Self::Decode(_) => "decode",
        }
    }
}

/// A result table that cannot be shaped for display.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("no data for this selection")]
    NoData,

    #[error("result is missing column {0:?}")]
    MissingColumn(String),
}

/// Anything that can stop a dashboard section from rendering.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

impl DashboardError {
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::Shape(ShapeError::NoData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_detection() {
        let err = DashboardError::from(ShapeError::NoData);
        assert!(err.is_no_data());
        assert_eq!(err.to_string(), "no data for this selection");

        let err = DashboardError::from(ExecutionError::Timeout(30));
        assert!(!err.is_no_data());
    }

    #[test]
    fn test_execution_error_kinds() {
        assert_eq!(ExecutionError::Timeout(5).kind(), "timeout");
        let q = ExecutionError::Query {
            code: "002003".to_string(),
            message: "object does not exist".to_string(),
        };
        assert_eq!(q.kind(), "query");
        assert!(q.to_string().contains("002003"));
    }
}
