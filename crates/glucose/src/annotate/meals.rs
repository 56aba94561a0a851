//! Meal markers on the glucose time axis

use crate::models::{DisplayPoint, MealEntry, MealMarker};

/// Place each meal on the series, interpolating the glucose value at its time
///
/// `points` must be ascending. Meals outside the span of the series are
/// skipped. Markers come back in time order.
pub fn place_meal_markers(points: &[DisplayPoint], meals: &[MealEntry]) -> Vec<MealMarker> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Vec::new();
    };

    let mut markers: Vec<MealMarker> = meals
        .iter()
        .filter(|meal| meal.eaten_at >= first.time && meal.eaten_at <= last.time)
        .map(|meal| MealMarker {
            meal_id: meal.id.clone(),
            time: meal.eaten_at,
            value: value_at(points, meal),
            title: meal.title.clone(),
        })
        .collect();

    markers.sort_by_key(|m| m.time);
    markers
}

fn value_at(points: &[DisplayPoint], meal: &MealEntry) -> f64 {
    let at = meal.eaten_at;
    // Index of the first point strictly after the meal
    let after = points.partition_point(|p| p.time <= at);

    if after == 0 {
        return points[0].value;
    }
    if after == points.len() {
        return points[points.len() - 1].value;
    }

    let (a, b) = (&points[after - 1], &points[after]);
    let span = (b.time - a.time).num_milliseconds();
    if span <= 0 {
        return a.value;
    }
    let offset = (at - a.time).num_milliseconds();
    a.value + (b.value - a.value) * (offset as f64 / span as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 2, h, m, 0).unwrap()
    }

    fn point(time: DateTime<Utc>, value: f64) -> DisplayPoint {
        DisplayPoint {
            time,
            value,
            has_gap_before: false,
        }
    }

    #[test]
    fn test_interpolates_between_points() {
        let points = vec![point(at(12, 0), 100.0), point(at(12, 10), 140.0)];
        let meals = vec![MealEntry::new("lunch", at(12, 5)).with_title("Lunch")];

        let markers = place_meal_markers(&points, &meals);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].value, 120.0);
        assert_eq!(markers[0].title.as_deref(), Some("Lunch"));
    }

    #[test]
    fn test_meal_on_a_point_uses_its_value() {
        let points = vec![
            point(at(8, 0), 90.0),
            point(at(8, 5), 95.0),
            point(at(8, 10), 130.0),
        ];
        let markers = place_meal_markers(&points, &[MealEntry::new("b", at(8, 5))]);
        assert_eq!(markers[0].value, 95.0);

        let markers = place_meal_markers(&points, &[MealEntry::new("c", at(8, 10))]);
        assert_eq!(markers[0].value, 130.0);
    }

    #[test]
    fn test_meals_outside_series_are_skipped() {
        let points = vec![point(at(8, 0), 90.0), point(at(9, 0), 110.0)];
        let meals = vec![
            MealEntry::new("early", at(7, 0)),
            MealEntry::new("late", at(10, 0)),
            MealEntry::new("inside", at(8, 30)),
        ];

        let markers = place_meal_markers(&points, &meals);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].meal_id, "inside");
    }

    #[test]
    fn test_markers_sorted_and_empty_series() {
        let points = vec![point(at(8, 0), 90.0), point(at(9, 0), 110.0)];
        let meals = vec![MealEntry::new("b", at(8, 45)), MealEntry::new("a", at(8, 15))];
        let ids: Vec<_> = place_meal_markers(&points, &meals)
            .into_iter()
            .map(|m| m.meal_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        assert!(place_meal_markers(&[], &meals).is_empty());
    }
}
