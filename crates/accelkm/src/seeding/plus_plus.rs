use super::{means_of, random_unchosen};
use crate::data::PointSource;
use crate::distance::{self, Distance, DistanceKind};
use crate::{vmath, IncompatibleDistanceSnafu, Result, WeightOverflowSnafu};
use log::warn;
use rand::RngExt;
use snafu::prelude::*;

/// Draws an id with probability proportional to its weight, or `None` when
/// no weight is positive.
///
/// `weightsum` is only trusted as far as floating point allows: when the scan
/// runs past the last positive weight, the draw is repeated with the excess
/// taken off.
pub(super) fn sample_weighted<R: RngExt>(
    rng: &mut R,
    weights: &[f64],
    mut weightsum: f64,
) -> Result<Option<usize>> {
    ensure!(weightsum <= f64::MAX, WeightOverflowSnafu);
    if weightsum < f64::MIN_POSITIVE {
        warn!("could not choose a reasonable mean: weight sum {weightsum:e} underflowed, too few distinct points?");
    }
    while weightsum > 0.0 {
        let mut r = rng.random::<f64>() * weightsum;
        let mut any = false;
        for (id, &w) in weights.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            any = true;
            r -= w;
            if r <= 0.0 {
                return Ok(Some(id));
            }
        }
        if !any {
            break;
        }
        weightsum -= r;
    }
    Ok(None)
}

/// Lowers every positive weight to its cost against `mean`, if smaller, and
/// returns the new sum. Zero weights stay zero.
pub(super) fn update_weights<P: PointSource + ?Sized>(
    points: &P,
    weights: &mut [f64],
    mean: &[f64],
    cost: &impl Fn(&[f64], &[f64]) -> f64,
) -> f64 {
    let mut sum = 0.0;
    for (id, w) in weights.iter_mut().enumerate() {
        if *w <= 0.0 {
            continue;
        }
        let c = cost(points.point(id), mean);
        if c < *w {
            *w = c;
        }
        sum += *w;
    }
    sum
}

/// Adds points by weighted sampling until `k` are chosen. `weights` must
/// hold each point's cost against the points chosen so far.
pub(super) fn choose_remaining<R: RngExt, P: PointSource + ?Sized>(
    rng: &mut R,
    points: &P,
    k: usize,
    mut chosen: Vec<usize>,
    weights: &mut [f64],
    mut weightsum: f64,
    cost: &impl Fn(&[f64], &[f64]) -> f64,
) -> Result<Vec<Vec<f64>>> {
    while chosen.len() < k {
        let id = match sample_weighted(rng, weights, weightsum)? {
            Some(id) => id,
            None => {
                warn!("all remaining points coincide with chosen means; picking uniformly");
                random_unchosen(rng, points.len(), &chosen)?
            }
        };
        weights[id] = 0.0;
        weightsum = update_weights(points, weights, points.point(id), cost);
        chosen.push(id);
    }
    Ok(means_of(points, chosen))
}

/// Initial weights against the single mean `first`; `first` itself gets 0.
pub(super) fn first_weights<P: PointSource + ?Sized>(
    points: &P,
    first: usize,
    cost: &impl Fn(&[f64], &[f64]) -> f64,
) -> (Vec<f64>, f64) {
    let mean = points.point(first);
    let mut weights: Vec<f64> = points.ids().map(|id| cost(points.point(id), mean)).collect();
    weights[first] = 0.0;
    let sum = weights.iter().sum();
    (weights, sum)
}

/// k-means++ with an arbitrary non-negative cost.
pub(super) fn with_cost<R: RngExt, P: PointSource + ?Sized>(
    rng: &mut R,
    points: &P,
    k: usize,
    cost: &impl Fn(&[f64], &[f64]) -> f64,
) -> Result<Vec<Vec<f64>>> {
    let first = rng.random_range(0..points.len());
    let (mut weights, weightsum) = first_weights(points, first, cost);
    choose_remaining(rng, points, k, vec![first], &mut weights, weightsum, cost)
}

pub(super) fn kmeans_plus_plus<R: RngExt, P: PointSource + ?Sized>(
    rng: &mut R,
    points: &P,
    k: usize,
    distance: &dyn Distance,
) -> Result<Vec<Vec<f64>>> {
    with_cost(rng, points, k, &|x: &[f64], y: &[f64]| {
        distance::squared(distance, x, y)
    })
}

/// Ostrovsky et al.: the first mean is drawn with probability proportional to
/// `||x - c||^2 + S / n`, where `c` is the centroid and `S` the sum of the
/// first terms. This is the marginal of drawing the first two means as a pair
/// weighted by their squared distance. The rest follow k-means++.
pub(super) fn ostrovsky<R: RngExt, P: PointSource + ?Sized>(
    rng: &mut R,
    points: &P,
    k: usize,
    distance: &dyn Distance,
) -> Result<Vec<Vec<f64>>> {
    ensure!(
        distance.kind() == DistanceKind::SquaredEuclidean,
        IncompatibleDistanceSnafu {
            initializer: "ostrovsky",
            distance: distance.name(),
        }
    );
    let n = points.len();
    let centroid = vmath::centroid(points.dim(), points.ids().map(|id| points.point(id)));
    let mut weights: Vec<f64> = points
        .ids()
        .map(|id| vmath::squared_euclidean(points.point(id), &centroid))
        .collect();
    let total: f64 = weights.iter().sum();
    let bias = total / n as f64;
    for w in &mut weights {
        *w += bias;
    }
    let first = match sample_weighted(rng, &weights, 2.0 * total)? {
        Some(id) => id,
        None => rng.random_range(0..n),
    };

    let cost = |x: &[f64], y: &[f64]| distance.distance(x, y);
    let (mut weights, weightsum) = first_weights(points, first, &cost);
    choose_remaining(rng, points, k, vec![first], &mut weights, weightsum, &cost)
}
