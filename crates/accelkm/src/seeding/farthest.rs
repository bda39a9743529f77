use crate::data::{to_mean, PointSource};
use crate::distance::Distance;
use crate::{NoFarthestPointSnafu, Result};
use rand::RngExt;
use snafu::prelude::*;

/// Folds the distance of every unchosen point to `center` into its score.
/// Chosen points are marked by a NaN score and left alone.
fn update<P: PointSource + ?Sized>(
    points: &P,
    distance: &dyn Distance,
    scores: &mut [f64],
    center: usize,
    sum: bool,
) {
    let c = points.point(center);
    for (id, score) in scores.iter_mut().enumerate() {
        if score.is_nan() {
            continue;
        }
        let d = distance.distance(points.point(id), c);
        *score = if sum { *score + d } else { score.min(d) };
    }
}

/// Unchosen point with the highest score; the first one on ties.
fn farthest(scores: &[f64]) -> Option<usize> {
    let mut best = None;
    let mut max = f64::NEG_INFINITY;
    for (id, &s) in scores.iter().enumerate() {
        // NaN never compares greater.
        if s > max {
            best = Some(id);
            max = s;
        }
    }
    best
}

/// Farthest-first traversal, by minimum distance or, with `sum`, by the sum
/// of distances to the chosen points.
pub(super) fn choose<R: RngExt, P: PointSource + ?Sized>(
    rng: &mut R,
    points: &P,
    k: usize,
    distance: &dyn Distance,
    keep_first: bool,
    sum: bool,
) -> Result<Vec<Vec<f64>>> {
    let n = points.len();
    let fresh = if sum { 0.0 } else { f64::INFINITY };
    let mut scores = vec![fresh; n];

    let mut first = rng.random_range(0..n);
    if !keep_first {
        update(points, distance, &mut scores, first, sum);
        first = farthest(&scores).unwrap_or(first);
        scores.fill(fresh);
    }

    let mut chosen = Vec::with_capacity(k);
    let mut next = Some(first);
    while let Some(id) = next {
        chosen.push(id);
        if chosen.len() == k {
            break;
        }
        scores[id] = f64::NAN;
        update(points, distance, &mut scores, id, sum);
        next = farthest(&scores);
    }
    // Only NaN scores left: the distances cannot rank the remaining points.
    ensure!(chosen.len() == k, NoFarthestPointSnafu { found: chosen.len(), k });
    Ok(chosen.into_iter().map(|id| to_mean(points, id)).collect())
}
