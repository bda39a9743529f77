use super::random_unchosen;
use crate::data::{to_mean, PointSource};
use crate::distance::{self, Distance};
use crate::{InvalidParameterSnafu, Result};
use log::warn;
use rand::RngExt;
use snafu::prelude::*;

/// Proposal distribution of the Markov chains.
enum Proposal {
    Uniform,
    /// Cumulative proposal weights, and the unnormalized weights themselves.
    Weighted { cumulative: Vec<f64>, q: Vec<f64> },
}

impl Proposal {
    /// `q(x) ∝ cost(x, first) + mean cost`, so that every point can be
    /// proposed.
    fn assumption_free<P: PointSource + ?Sized>(
        points: &P,
        first: &[f64],
        cost: &impl Fn(&[f64], &[f64]) -> f64,
    ) -> Self {
        let mut q: Vec<f64> = points.ids().map(|id| cost(points.point(id), first)).collect();
        let sum: f64 = q.iter().sum();
        if !(sum > 0.0 && sum.is_finite()) {
            return Proposal::Uniform;
        }
        let bias = sum / q.len() as f64;
        let mut acc = 0.0;
        let mut cumulative = Vec::with_capacity(q.len());
        for w in &mut q {
            *w += bias;
            acc += *w;
            cumulative.push(acc);
        }
        Proposal::Weighted { cumulative, q }
    }

    fn draw<R: RngExt>(&self, rng: &mut R, n: usize) -> usize {
        match self {
            Proposal::Uniform => rng.random_range(0..n),
            Proposal::Weighted { cumulative, .. } => {
                let total = cumulative.last().copied().unwrap_or(0.0);
                let r = rng.random::<f64>() * total;
                cumulative.partition_point(|&c| c <= r).min(n - 1)
            }
        }
    }

    #[inline]
    fn weight(&self, id: usize) -> f64 {
        match self {
            Proposal::Uniform => 1.0,
            Proposal::Weighted { q, .. } => q[id],
        }
    }
}

/// Cost of `x` against its closest mean.
fn nearest_cost(x: &[f64], means: &[Vec<f64>], cost: &impl Fn(&[f64], &[f64]) -> f64) -> f64 {
    means
        .iter()
        .map(|m| cost(x, m))
        .fold(f64::INFINITY, f64::min)
}

/// Cost of point `id` as a chain state. Chosen points cost nothing, even
/// when `cost` of a point against itself is positive.
fn state_cost<P: PointSource + ?Sized>(
    points: &P,
    id: usize,
    chosen: &[usize],
    means: &[Vec<f64>],
    cost: &impl Fn(&[f64], &[f64]) -> f64,
) -> f64 {
    if chosen.contains(&id) {
        0.0
    } else {
        nearest_cost(points.point(id), means, cost)
    }
}

/// Metropolis-Hastings approximation of k-means++: each further mean is the
/// last state of a chain of `chain_length` proposals.
pub(super) fn chain<R: RngExt, P: PointSource + ?Sized>(
    rng: &mut R,
    points: &P,
    k: usize,
    chain_length: usize,
    assumption_free: bool,
    cost: &impl Fn(&[f64], &[f64]) -> f64,
) -> Result<Vec<Vec<f64>>> {
    ensure!(
        chain_length > 0,
        InvalidParameterSnafu {
            name: "chain_length",
            reason: "the Markov chain needs at least one step",
        }
    );
    let n = points.len();
    let first = rng.random_range(0..n);
    let mut means = vec![to_mean(points, first)];
    let proposal = if assumption_free {
        Proposal::assumption_free(points, &means[0], cost)
    } else {
        Proposal::Uniform
    };

    let mut chosen = vec![first];
    while chosen.len() < k {
        let mut x = proposal.draw(rng, n);
        let mut dx = state_cost(points, x, &chosen, &means, cost);
        for _ in 1..chain_length {
            let y = proposal.draw(rng, n);
            let dy = state_cost(points, y, &chosen, &means, cost);
            // Accept with probability min(1, dy q(x) / (dx q(y))).
            let u = rng.random::<f64>();
            if dx == 0.0 || dy * proposal.weight(x) > u * dx * proposal.weight(y) {
                x = y;
                dx = dy;
            }
        }
        if dx == 0.0 {
            // The chain got stuck on chosen means; take any other point.
            x = match points
                .ids()
                .find(|&id| state_cost(points, id, &chosen, &means, cost) > 0.0)
            {
                Some(id) => id,
                None => {
                    warn!("all remaining points coincide with chosen means; picking uniformly");
                    random_unchosen(rng, n, &chosen)?
                }
            };
        }
        chosen.push(x);
        means.push(to_mean(points, x));
    }
    Ok(means)
}

pub(super) fn kmc2<R: RngExt, P: PointSource + ?Sized>(
    rng: &mut R,
    points: &P,
    k: usize,
    distance: &dyn Distance,
    chain_length: usize,
) -> Result<Vec<Vec<f64>>> {
    let cost = |x: &[f64], y: &[f64]| distance::squared(distance, x, y);
    chain(rng, points, k, chain_length, false, &cost)
}

pub(super) fn afkmc2<R: RngExt, P: PointSource + ?Sized>(
    rng: &mut R,
    points: &P,
    k: usize,
    distance: &dyn Distance,
    chain_length: usize,
) -> Result<Vec<Vec<f64>>> {
    let cost = |x: &[f64], y: &[f64]| distance::squared(distance, x, y);
    chain(rng, points, k, chain_length, true, &cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::distance::SquaredEuclidean;
    use crate::{rng, vmath, KMeansError};
    use pretty_assertions::assert_eq;

    fn blobs() -> Dataset {
        let mut rows = Vec::new();
        for (cx, cy) in [(0.0, 0.0), (50.0, 0.0), (0.0, 50.0)] {
            for i in 0..20 {
                rows.push([cx + (i % 5) as f64 * 0.1, cy + (i / 5) as f64 * 0.1]);
            }
        }
        Dataset::from_rows(&rows)
    }

    fn blob_of(mean: &[f64]) -> usize {
        match (mean[0] > 25.0, mean[1] > 25.0) {
            (false, false) => 0,
            (true, false) => 1,
            _ => 2,
        }
    }

    #[test]
    fn long_chains_find_every_blob() {
        let points = blobs();
        for assumption_free in [false, true] {
            for seed in 0..5 {
                let cost = |x: &[f64], y: &[f64]| vmath::squared_euclidean(x, y);
                let means =
                    chain(&mut rng::from_seed(seed), &points, 3, 100, assumption_free, &cost).unwrap();
                let mut blobs: Vec<usize> = means.iter().map(|m| blob_of(m)).collect();
                blobs.sort_unstable();
                assert_eq!(blobs, vec![0, 1, 2]);
            }
        }
    }

    #[test]
    fn proposal_covers_every_point() {
        let points = Dataset::from_rows(&[[0.0], [0.0], [3.0]]);
        let cost = |x: &[f64], y: &[f64]| vmath::squared_euclidean(x, y);
        let proposal = Proposal::assumption_free(&points, &[0.0], &cost);
        // Costs 0, 0, 9 plus the mean cost 3.
        assert_eq!(proposal.weight(0), 3.0);
        assert_eq!(proposal.weight(1), 3.0);
        assert_eq!(proposal.weight(2), 12.0);

        let identical = Dataset::from_rows(&[[1.0], [1.0]]);
        let proposal = Proposal::assumption_free(&identical, &[1.0], &cost);
        assert!(matches!(proposal, Proposal::Uniform));
    }

    #[test]
    fn duplicate_rows_are_distinct_means() {
        let points = Dataset::from_rows(&[[0.0, 0.0], [0.0, 0.0], [5.0, 5.0]]);
        for seed in 0..50 {
            for mut means in [
                kmc2(&mut rng::from_seed(seed), &points, 3, &SquaredEuclidean, 20).unwrap(),
                afkmc2(&mut rng::from_seed(seed), &points, 3, &SquaredEuclidean, 20).unwrap(),
            ] {
                means.sort_by(|a, b| a.partial_cmp(b).unwrap());
                assert_eq!(means, vec![vec![0.0, 0.0], vec![0.0, 0.0], vec![5.0, 5.0]], "seed {seed}");
            }
        }
    }

    #[test]
    fn chosen_points_are_never_proposed_again() {
        // With `alpha > 1` a point costs `alpha - 1` against itself.
        let points = Dataset::from_rows(&[[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]]);
        let cost = |x: &[f64], y: &[f64]| 2.0 - vmath::dot(x, y);
        for seed in 0..20 {
            let mut means = chain(&mut rng::from_seed(seed), &points, 3, 10, true, &cost).unwrap();
            means.sort_by(|a, b| a.partial_cmp(b).unwrap());
            assert_eq!(means, vec![vec![-1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]], "seed {seed}");
        }
    }

    #[test]
    fn zero_chain_length_is_rejected() {
        let points = blobs();
        let err = kmc2(&mut rng::new(), &points, 2, &SquaredEuclidean, 0).unwrap_err();
        assert!(matches!(err, KMeansError::InvalidParameter { name: "chain_length", .. }));
    }
}
