//! Domain models for glucose readings and published series

mod meal;
mod reading;
mod series;
mod sync_state;

pub use meal::{MealEntry, MealMarker};
pub use reading::{Reading, ReadingSource, TimeWindow};
pub use series::{DataSourceLabel, DisplayPoint, SeriesSnapshot};
pub use sync_state::SyncState;
