use crate::chains;
use crate::error::ValidationError;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Longest asset filter accepted from the UI. Real symbols and raw codes are far shorter.
const MAX_ASSET_LEN: usize = 128;

/// Time-bucket width for time-series reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    pub const ALL: [Self; 3] = [Self::Month, Self::Week, Self::Day];

    /// Date-part name understood by the warehouse's `DATE_TRUNC`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            _ => Err(ValidationError::UnknownGranularity(s.to_string())),
        }
    }
}

/// Which end of a route a chain filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainSide {
    Source,
    Destination,
}

impl ChainSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Destination => "destination",
        }
    }

    /// Column of the service union holding this side's chain.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Source => "source_chain",
            Self::Destination => "destination_chain",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Source => "Source Chain",
            Self::Destination => "Destination Chain",
        }
    }
}

/// Dashboard page a report belongs to. Drives per-page cache lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Overall,
    Routes,
    Assets,
    Chain,
}

impl Page {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overall => "overall",
            Self::Routes => "routes",
            Self::Assets => "assets",
            Self::Chain => "chain",
        }
    }
}

/// Parse a `YYYY-MM-DD` date coming from a date picker.
pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .ok_or_else(|| ValidationError::InvalidDate(s.to_string()))
}

/// One user interaction's worth of query parameters.
///
/// Immutable once built: the constructor is the only place the invariants
/// (`start <= end`, known chain, clean asset text) are checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryParameters {
    start: NaiveDate,
    end: NaiveDate,
    granularity: Granularity,
    chain: Option<&'static str>,
    asset: Option<String>,
}

impl QueryParameters {
    pub fn new(
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
    ) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::EndBeforeStart { start, end });
        }
        Ok(Self {
            start,
            end,
            granularity,
            chain: None,
            asset: None,
        })
    }

    /// Restrict to one chain from the allow-list. `"All"` clears the filter.
    pub fn with_chain(mut self, chain: &str) -> Result<Self, ValidationError> {
        self.chain = chains::canonical(chain)?;
        Ok(self)
    }

    /// Restrict to one display symbol (or raw code when it has no mapping).
    pub fn with_asset(mut self, asset: &str) -> Result<Self, ValidationError> {
        let trimmed = asset.trim();
        let clean = !trimmed.is_empty()
            && trimmed.len() <= MAX_ASSET_LEN
            && !trimmed
                .chars()
                .any(|c| c.is_control() || matches!(c, '\'' | '"' | '\\' | ';'));
        if !clean {
            return Err(ValidationError::InvalidAsset(asset.to_string()));
        }
        self.asset = Some(trimmed.to_string());
        Ok(self)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn chain(&self) -> Option<&'static str> {
        self.chain
    }

    pub fn asset(&self) -> Option<&str> {
        self.asset.as_deref()
    }
}
