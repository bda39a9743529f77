use super::{random_sample, SampleSize};
use crate::data::{Dataset, PointSource};
use crate::distance::Distance;
use crate::kmeans::{KMeans, NoopObserver};
use crate::{InvalidParameterSnafu, Result, SampleTooSmallSnafu};
use log::debug;
use rand::RngExt;
use snafu::prelude::*;

fn resolve(size: SampleSize, n: usize) -> Result<usize> {
    match size {
        SampleSize::Absolute(m) => Ok(m.min(n)),
        SampleSize::Fraction(f) => {
            ensure!(
                f > 0.0 && f <= 1.0,
                InvalidParameterSnafu {
                    name: "sample size",
                    reason: format!("fraction {f} is not in (0, 1]"),
                }
            );
            Ok(((f * n as f64) as usize).min(n))
        }
    }
}

/// Clusters a random sample with `inner` and returns its means.
///
/// The inner run draws from `rng`, so its own seed is not used.
pub(super) fn choose<R: RngExt, P: PointSource + ?Sized>(
    rng: &mut R,
    points: &P,
    k: usize,
    distance: &dyn Distance,
    size: SampleSize,
    inner: &KMeans,
) -> Result<Vec<Vec<f64>>> {
    let size = resolve(size, points.len())?;
    ensure!(size >= k, SampleTooSmallSnafu { size, k });

    let mut ids = random_sample(rng, points.len(), size);
    // Keep the original order, so that order-sensitive inner seeding sees
    // the same relative order as on the full data.
    ids.sort_unstable();
    let subset = Dataset::gather(points, &ids);
    debug!(
        "running {} k-means on a sample of {size} points",
        inner.variant.name()
    );

    let inner = KMeans { k, ..inner.clone() };
    let model = inner.fit(rng, &subset, distance, &mut NoopObserver)?;
    Ok(model.means)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::SquaredEuclidean;
    use crate::seeding::tests::line;
    use crate::seeding::Initializer;
    use crate::{rng, KMeansError, Variant};
    use pretty_assertions::assert_eq;

    fn inner() -> KMeans {
        KMeans::new(99)
            .with_initializer(Initializer::FirstK)
            .with_variant(Variant::Lloyd)
    }

    #[test]
    fn sizes() {
        assert_eq!(resolve(SampleSize::Absolute(5), 10).unwrap(), 5);
        assert_eq!(resolve(SampleSize::Absolute(50), 10).unwrap(), 10);
        assert_eq!(resolve(SampleSize::Fraction(0.25), 10).unwrap(), 2);
        assert_eq!(resolve(SampleSize::Fraction(1.0), 10).unwrap(), 10);
        for f in [0.0, -0.5, 1.5, f64::NAN] {
            let err = resolve(SampleSize::Fraction(f), 10).unwrap_err();
            assert!(matches!(err, KMeansError::InvalidParameter { .. }), "{f}");
        }
    }

    #[test]
    fn sample_smaller_than_k() {
        let points = line(20);
        let err = choose(
            &mut rng::new(),
            &points,
            4,
            &SquaredEuclidean,
            SampleSize::Absolute(3),
            &inner(),
        )
        .unwrap_err();
        assert!(matches!(err, KMeansError::SampleTooSmall { size: 3, k: 4 }));
    }

    #[test]
    fn means_come_from_the_sample() {
        // Two far apart groups; the inner k-means recovers their centers.
        let mut rows: Vec<[f64; 1]> = (0..10).map(|i| [i as f64 * 0.1]).collect();
        rows.extend((0..10).map(|i| [100.0 + i as f64 * 0.1]));
        let points = Dataset::from_rows(&rows);
        let inner = KMeans::new(1)
            .with_initializer(Initializer::FarthestPoints { keep_first: false })
            .with_variant(Variant::Hamerly);
        let means = choose(
            &mut rng::from_seed(5),
            &points,
            2,
            &SquaredEuclidean,
            SampleSize::Fraction(1.0),
            &inner,
        )
        .unwrap();
        let mut centers: Vec<f64> = means.iter().map(|m| m[0]).collect();
        centers.sort_by(|a, b| a.partial_cmp(b).unwrap());
        approx::assert_abs_diff_eq!(centers[0], 0.45, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(centers[1], 100.45, epsilon = 1e-9);
    }
}
