//! Published series types consumed by the UI layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::TimeWindow;

/// A chart point derived from a reading. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
    /// True when the break since the previous point exceeds the gap threshold
    pub has_gap_before: bool,
}

/// Provenance of a published series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSourceLabel {
    #[serde(rename = "cached-only")]
    CachedOnly,
    #[serde(rename = "cached+live-hybrid")]
    CachedLiveHybrid,
    #[serde(rename = "official-only")]
    OfficialOnly,
    #[serde(rename = "share-only")]
    ShareOnly,
    #[serde(rename = "health-store")]
    HealthStore,
}

impl DataSourceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceLabel::CachedOnly => "cached-only",
            DataSourceLabel::CachedLiveHybrid => "cached+live-hybrid",
            DataSourceLabel::OfficialOnly => "official-only",
            DataSourceLabel::ShareOnly => "share-only",
            DataSourceLabel::HealthStore => "health-store",
        }
    }
}

impl fmt::Display for DataSourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the UI needs to draw the current series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    pub points: Vec<DisplayPoint>,
    pub label: DataSourceLabel,
    /// Only ever set when `points` is empty
    pub error_message: Option<String>,
    pub window: Option<TimeWindow>,
    pub generation: u64,
    pub last_load_time: Option<DateTime<Utc>>,
}

impl SeriesSnapshot {
    pub fn empty() -> Self {
        Self {
            points: Vec::new(),
            label: DataSourceLabel::CachedOnly,
            error_message: None,
            window: None,
            generation: 0,
            last_load_time: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recent point, if any
    pub fn latest(&self) -> Option<&DisplayPoint> {
        self.points.last()
    }

    /// Number of points flagged as following a gap
    pub fn gap_count(&self) -> usize {
        self.points.iter().filter(|p| p.has_gap_before).count()
    }
}

impl Default for SeriesSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
