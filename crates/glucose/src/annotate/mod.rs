//! Pure post-processing of the merged series for display

mod gaps;
mod meals;

pub use gaps::{GAP_THRESHOLD, Timestamped, annotate};
pub use meals::place_meal_markers;
