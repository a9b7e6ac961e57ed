use crate::INTERSECT_COST;

/// Estimated cost of tracing a ray through a node of `total_area` that's split
/// into two halves, each described by its surface area and primitive count.
///
/// A flat parent (zero area) treats both halves as always hit.
///
/// Computed in `f64`, so that nearly-equal splits can be told apart from
/// rounding noise.
pub fn sah_split_cost(
    total_area: f32,
    left_area: f32,
    left_count: usize,
    right_area: f32,
    right_count: usize,
    avg_cost: f32,
) -> f64 {
    let total_area = f64::from(total_area);
    let avg_cost = f64::from(avg_cost);

    let ratio = |area: f32| {
        if total_area > 0.0 {
            f64::from(area) / total_area
        } else {
            1.0
        }
    };

    2.0 * f64::from(INTERSECT_COST)
        + ratio(left_area) * (left_count as f64) * avg_cost
        + ratio(right_area) * (right_count as f64) * avg_cost
}

/// Estimated cost of tracing a ray through a leaf holding `count` primitives.
pub fn sah_leaf_cost(count: usize, avg_cost: f32) -> f64 {
    (count as f64) * f64::from(avg_cost)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_cost() {
        let cost = sah_split_cost(100.0, 50.0, 4, 25.0, 4, 1.0);

        assert_eq!(2.0 * f64::from(INTERSECT_COST) + 2.0 + 1.0, cost);
    }

    #[test]
    fn split_cost_of_flat_parent() {
        let cost = sah_split_cost(0.0, 0.0, 3, 0.0, 2, 2.0);

        assert_eq!(2.0 * f64::from(INTERSECT_COST) + 10.0, cost);
        assert!(cost > sah_leaf_cost(5, 2.0));
    }
}
