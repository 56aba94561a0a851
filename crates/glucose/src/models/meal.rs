//! Meal overlay models
//!
//! Meals are owned by the meal-logging subsystem. The engine only reads their
//! timestamps to place markers on the glucose time axis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A logged meal as seen by the glucose chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealEntry {
    pub id: String,
    pub eaten_at: DateTime<Utc>,
    pub title: Option<String>,
}

impl MealEntry {
    pub fn new(id: impl Into<String>, eaten_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            eaten_at,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Where a meal lands on the glucose chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealMarker {
    pub meal_id: String,
    pub time: DateTime<Utc>,
    /// Glucose value interpolated at `time`
    pub value: f64,
    pub title: Option<String>,
}
