use crate::data::{to_mean, PointSource};
use crate::distance::Distance;
use crate::{NoImprovingMedoidSnafu, Result};
use log::debug;
use snafu::prelude::*;

/// Greedy BUILD: the first medoid minimizes the total distance to all points,
/// each further one the total distance to the nearest medoid.
///
/// Quadratic in the number of points per medoid.
pub(super) fn choose<P: PointSource + ?Sized>(
    points: &P,
    k: usize,
    distance: &dyn Distance,
) -> Result<Vec<Vec<f64>>> {
    let n = points.len();
    // Distance of every point to its nearest medoid so far.
    let mut nearest = vec![f64::INFINITY; n];
    let mut chosen = vec![false; n];
    let mut medoids = Vec::with_capacity(k);

    for round in 0..k {
        let mut best = None;
        let mut best_cost = f64::INFINITY;
        for candidate in points.ids().filter(|&c| !chosen[c]) {
            let c = points.point(candidate);
            let cost: f64 = points
                .ids()
                .map(|id| distance.distance(points.point(id), c).min(nearest[id]))
                .sum();
            if cost < best_cost {
                best = Some(candidate);
                best_cost = cost;
            }
        }
        let medoid = best.context(NoImprovingMedoidSnafu)?;
        debug!("medoid {round}: point {medoid}, total deviation {best_cost}");

        chosen[medoid] = true;
        let m = points.point(medoid);
        for (id, d) in nearest.iter_mut().enumerate() {
            *d = d.min(distance.distance(points.point(id), m));
        }
        medoids.push(to_mean(points, medoid));
    }
    Ok(medoids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::distance::tests::Undefined;
    use crate::distance::Euclidean;
    use crate::KMeansError;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_medoid_is_central() {
        let points = Dataset::from_rows(&[[0.0], [1.0], [2.0], [3.0], [100.0]]);
        let medoids = choose(&points, 1, &Euclidean).unwrap();
        assert_eq!(medoids, vec![vec![2.0]]);
    }

    #[test]
    fn second_medoid_serves_the_rest() {
        let points = Dataset::from_rows(&[[0.0], [1.0], [2.0], [50.0], [51.0], [52.0]]);
        let medoids = choose(&points, 2, &Euclidean).unwrap();
        // Both groups are equally central; the first wins, then the other
        // group's middle point.
        assert_eq!(medoids, vec![vec![2.0], vec![51.0]]);
    }

    #[test]
    fn nan_distances_fail() {
        let points = Dataset::from_rows(&[[0.0], [1.0]]);
        let err = choose(&points, 1, &Undefined).unwrap_err();
        assert!(matches!(err, KMeansError::NoImprovingMedoid));
    }
}
