//! Strategies choosing the k initial means.

use crate::data::{to_mean, PointSource};
use crate::distance::Distance;
use crate::kmeans::KMeans;
use crate::{Result, TooFewPointsSnafu, ZeroKSnafu};
use rand::RngExt;
use snafu::prelude::*;

mod farthest;
mod mc2;
mod pam;
mod plus_plus;
mod sample;
mod simple;
mod spherical;

/// Default Markov chain length for the MC² strategies.
pub const DEFAULT_CHAIN_LENGTH: usize = 200;

/// Size of the sample used by [`Initializer::Sample`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SampleSize {
    /// Number of points, capped at the data set size.
    Absolute(usize),
    /// Share of the data set, in `(0, 1]`.
    Fraction(f64),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Initializer {
    /// The first k points.
    FirstK,
    /// k distinct points drawn uniformly.
    RandomlyChosen,
    /// A random point, then repeatedly the point farthest from all chosen
    /// ones. Without `keep_first` the random point only serves to find the
    /// first real mean, the point farthest from it.
    FarthestPoints { keep_first: bool },
    /// Like [`FarthestPoints`](Self::FarthestPoints), maximizing the sum of
    /// distances instead of the minimum.
    FarthestSumPoints { keep_first: bool },
    /// D² sampling.
    #[default]
    KMeansPlusPlus,
    /// k-means++ approximated by Markov chains with uniform proposals.
    KMc2 { chain_length: usize },
    /// k-means++ approximated by Markov chains with a proposal distribution
    /// derived from the first mean.
    AfkMc2 { chain_length: usize },
    /// Greedy medoids (the BUILD phase of PAM).
    Pam,
    /// k-means++ with the first mean drawn by distance to the centroid.
    /// Squared Euclidean distance only.
    Ostrovsky,
    /// Runs `inner` (with `k` replaced) on a random sample and uses its
    /// means.
    Sample { size: SampleSize, inner: Box<KMeans> },
    /// Exactly these means.
    Predefined(Vec<Vec<f64>>),
    /// k-means++ on `alpha - similarity`, for unit vectors and cosine
    /// distance. `alpha` must be at least 1.
    SphericalKMeansPlusPlus { alpha: f64 },
    /// AFK-MC² on `alpha - similarity`.
    SphericalAfkMc2 { alpha: f64, chain_length: usize },
}

impl Initializer {
    pub fn name(&self) -> &'static str {
        match self {
            Initializer::FirstK => "first-k",
            Initializer::RandomlyChosen => "random",
            Initializer::FarthestPoints { .. } => "farthest-points",
            Initializer::FarthestSumPoints { .. } => "farthest-sum-points",
            Initializer::KMeansPlusPlus => "k-means++",
            Initializer::KMc2 { .. } => "k-mc2",
            Initializer::AfkMc2 { .. } => "afk-mc2",
            Initializer::Pam => "pam",
            Initializer::Ostrovsky => "ostrovsky",
            Initializer::Sample { .. } => "sample",
            Initializer::Predefined(_) => "predefined",
            Initializer::SphericalKMeansPlusPlus { .. } => "spherical-k-means++",
            Initializer::SphericalAfkMc2 { .. } => "spherical-afk-mc2",
        }
    }

    /// Chooses `k` means of dimensionality `points.dim()`.
    ///
    /// Fails if there are fewer than `k` points, for every strategy.
    pub fn choose_initial_means<R: RngExt, P: PointSource + ?Sized>(
        &self,
        rng: &mut R,
        points: &P,
        k: usize,
        distance: &dyn Distance,
    ) -> Result<Vec<Vec<f64>>> {
        ensure!(k > 0, ZeroKSnafu);
        let n = points.len();
        ensure!(n >= k, TooFewPointsSnafu { k, n });

        match self {
            Initializer::FirstK => Ok(means_of(points, 0..k)),
            Initializer::RandomlyChosen => Ok(means_of(points, random_sample(rng, n, k))),
            Initializer::FarthestPoints { keep_first } => {
                farthest::choose(rng, points, k, distance, *keep_first, false)
            }
            Initializer::FarthestSumPoints { keep_first } => {
                farthest::choose(rng, points, k, distance, *keep_first, true)
            }
            Initializer::KMeansPlusPlus => plus_plus::kmeans_plus_plus(rng, points, k, distance),
            Initializer::KMc2 { chain_length } => {
                mc2::kmc2(rng, points, k, distance, *chain_length)
            }
            Initializer::AfkMc2 { chain_length } => {
                mc2::afkmc2(rng, points, k, distance, *chain_length)
            }
            Initializer::Pam => pam::choose(points, k, distance),
            Initializer::Ostrovsky => plus_plus::ostrovsky(rng, points, k, distance),
            Initializer::Sample { size, inner } => {
                sample::choose(rng, points, k, distance, *size, inner)
            }
            Initializer::Predefined(means) => simple::predefined(means, k, points.dim()),
            Initializer::SphericalKMeansPlusPlus { alpha } => {
                spherical::kmeans_plus_plus(rng, points, k, distance, *alpha)
            }
            Initializer::SphericalAfkMc2 {
                alpha,
                chain_length,
            } => spherical::afkmc2(rng, points, k, distance, *alpha, *chain_length),
        }
    }
}

/// Copies the given points as means, padded to the full dimensionality.
fn means_of<P: PointSource + ?Sized>(points: &P, ids: impl IntoIterator<Item = usize>) -> Vec<Vec<f64>> {
    ids.into_iter().map(|id| to_mean(points, id)).collect()
}

/// `k` distinct ids out of `0..n`, in random order.
pub(crate) fn random_sample<R: RngExt>(rng: &mut R, n: usize, k: usize) -> Vec<usize> {
    debug_assert!(k <= n);
    let mut ids: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.random_range(i..n);
        ids.swap(i, j);
    }
    ids.truncate(k);
    ids
}

/// Uniformly drawn id in `0..n` that is not yet in `chosen`.
pub(crate) fn random_unchosen<R: RngExt>(rng: &mut R, n: usize, chosen: &[usize]) -> Result<usize> {
    let mut free = (0..n).filter(|id| !chosen.contains(id));
    let count = n.saturating_sub(chosen.len());
    ensure!(count > 0, TooFewPointsSnafu { k: chosen.len() + 1, n });
    let skip = rng.random_range(0..count);
    free.nth(skip).context(TooFewPointsSnafu { k: chosen.len() + 1, n })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::distance::{Cosine, SquaredEuclidean};
    use crate::kmeans::Variant;
    use crate::{rng, ErrorKind, KMeansError};
    use pretty_assertions::assert_eq;

    pub(crate) fn line(n: usize) -> Dataset {
        Dataset::from_rows(&(0..n).map(|i| [i as f64, (i * i) as f64]).collect::<Vec<_>>())
    }

    fn circle(n: usize) -> Dataset {
        let step = std::f64::consts::TAU / n as f64;
        Dataset::from_rows(
            &(0..n)
                .map(|i| [(i as f64 * step).cos(), (i as f64 * step).sin()])
                .collect::<Vec<_>>(),
        )
    }

    fn all(n: usize) -> Vec<Initializer> {
        let inner = KMeans::new(1)
            .with_initializer(Initializer::FirstK)
            .with_variant(Variant::Lloyd);
        vec![
            Initializer::FirstK,
            Initializer::RandomlyChosen,
            Initializer::FarthestPoints { keep_first: true },
            Initializer::FarthestPoints { keep_first: false },
            Initializer::FarthestSumPoints { keep_first: true },
            Initializer::FarthestSumPoints { keep_first: false },
            Initializer::KMeansPlusPlus,
            Initializer::KMc2 { chain_length: 20 },
            Initializer::AfkMc2 { chain_length: 20 },
            Initializer::Pam,
            Initializer::Ostrovsky,
            Initializer::Sample {
                size: SampleSize::Fraction(1.0),
                inner: Box::new(inner),
            },
            Initializer::Predefined(vec![vec![0.0, 0.0]; n]),
            Initializer::SphericalKMeansPlusPlus { alpha: 1.0 },
            Initializer::SphericalAfkMc2 {
                alpha: 1.0,
                chain_length: 20,
            },
        ]
    }

    #[test]
    fn too_few_points() {
        let points = line(5);
        let mut rng = rng::new();
        for init in all(6) {
            let err = init
                .choose_initial_means(&mut rng, &points, 6, &SquaredEuclidean)
                .unwrap_err();
            assert!(
                matches!(err, KMeansError::TooFewPoints { k: 6, n: 5 }),
                "{}: {err}",
                init.name()
            );
            assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        }
    }

    /// The first four rows of `points`, then the first three again.
    fn with_duplicates(points: &Dataset) -> Dataset {
        let rows: Vec<&[f64]> = points.rows().take(4).chain(points.rows().take(3)).collect();
        Dataset::new(points.dim(), rows.concat()).unwrap()
    }

    #[test]
    fn k_equals_n_picks_every_point() {
        let n = 7;
        for (points, distance) in [
            (line(n), &SquaredEuclidean as &dyn Distance),
            (circle(n), &Cosine as &dyn Distance),
            (with_duplicates(&line(n)), &SquaredEuclidean as &dyn Distance),
            (with_duplicates(&circle(n)), &Cosine as &dyn Distance),
        ] {
            for init in all(n) {
                if matches!(init, Initializer::Predefined(_)) {
                    continue;
                }
                let mut rng = rng::from_seed(3);
                let distance: &dyn Distance = if matches!(init, Initializer::Ostrovsky) {
                    &SquaredEuclidean
                } else {
                    distance
                };
                let mut means = init
                    .choose_initial_means(&mut rng, &points, n, distance)
                    .unwrap();
                assert_eq!(means.len(), n, "{}", init.name());
                means.sort_by(|a, b| a.partial_cmp(b).unwrap());
                let mut expected: Vec<Vec<f64>> = points.rows().map(<[f64]>::to_vec).collect();
                expected.sort_by(|a, b| a.partial_cmp(b).unwrap());
                assert_eq!(means, expected, "{}", init.name());
            }
        }
    }

    #[test]
    fn zero_k() {
        let points = line(3);
        let err = Initializer::FirstK
            .choose_initial_means(&mut rng::new(), &points, 0, &SquaredEuclidean)
            .unwrap_err();
        assert!(matches!(err, KMeansError::ZeroK));
    }

    #[test]
    fn random_sample_is_distinct() {
        let mut rng = rng::new();
        let mut ids = random_sample(&mut rng, 10, 10);
        ids.sort_unstable();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
        assert_eq!(random_sample(&mut rng, 10, 3).len(), 3);
    }

    #[test]
    fn random_unchosen_skips_chosen() {
        let mut rng = rng::new();
        for _ in 0..50 {
            let id = random_unchosen(&mut rng, 5, &[0, 2, 3]).unwrap();
            assert!(id == 1 || id == 4, "{id}");
        }
        let err = random_unchosen(&mut rng, 2, &[1, 0]).unwrap_err();
        assert!(matches!(err, KMeansError::TooFewPoints { k: 3, n: 2 }));
    }

    #[test]
    fn same_seed_same_means() {
        let points = line(50);
        for init in all(4) {
            let a = init.choose_initial_means(&mut rng::from_seed(9), &points, 4, &SquaredEuclidean);
            let b = init.choose_initial_means(&mut rng::from_seed(9), &points, 4, &SquaredEuclidean);
            assert_eq!(a.unwrap(), b.unwrap(), "{}", init.name());
        }
    }
}
