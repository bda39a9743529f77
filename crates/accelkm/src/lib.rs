//! Accelerated k-means.
//!
//! The crate provides the classic Lloyd iteration, spherical (cosine) k-means,
//! and the triangle-inequality pruned variants of both (Hamerly, simplified
//! Elkan and Elkan). All engines on the same data and the same initial means
//! produce the same assignments; the pruned ones just skip distance
//! computations that provably cannot change the result.
//!
//! ```
//! use accelkm::{Dataset, Initializer, KMeans, SquaredEuclidean, Variant};
//!
//! let points = Dataset::from_rows(&[
//!     [0.0, 0.0], [0.0, 1.0], [1.0, 0.0],
//!     [10.0, 10.0], [10.0, 11.0], [11.0, 10.0],
//! ]);
//!
//! let clustering = KMeans::new(2)
//!     .with_initializer(Initializer::FirstK)
//!     .with_variant(Variant::Hamerly)
//!     .run(&points, &SquaredEuclidean)
//!     .unwrap();
//!
//! assert_eq!(clustering.clusters[0].members, vec![0, 1, 2]);
//! assert_eq!(clustering.clusters[1].members, vec![3, 4, 5]);
//! ```

pub mod data;
pub mod distance;
pub mod kmeans;
pub mod rng;
pub mod seeding;
pub mod vmath;

pub use data::{Dataset, PointSource};
pub use distance::{Cosine, Distance, DistanceKind, Euclidean, SquaredEuclidean};
pub use kmeans::{
    Cluster, Clustering, KMeans, NoopObserver, Observer, ResultSink, Variant,
};
pub use seeding::{Initializer, SampleSize, DEFAULT_CHAIN_LENGTH};

use snafu::prelude::*;

/// Coarse classification of [`KMeansError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request cannot be satisfied as configured; nothing was computed.
    InvalidConfiguration,
    /// An internal consistency check failed. Only infinite or NaN distances
    /// should be able to trigger this.
    InvariantViolation,
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum KMeansError {
    #[snafu(display("k must be at least 1"))]
    ZeroK,

    #[snafu(display("cannot choose {k} means from fewer than {k} points (got {n})"))]
    TooFewPoints { k: usize, n: usize },

    #[snafu(display("{given} predefined means were given, but k is {k}"))]
    PredefinedCount { given: usize, k: usize },

    #[snafu(display("a sample of {size} points is too small to choose {k} means"))]
    SampleTooSmall { size: usize, k: usize },

    #[snafu(display("{initializer} initialization cannot be used with {distance} distance"))]
    IncompatibleDistance {
        initializer: &'static str,
        distance: &'static str,
    },

    #[snafu(display("invalid value for {name}: {reason}"))]
    InvalidParameter { name: &'static str, reason: String },

    #[snafu(display("expected vectors of dimensionality {expected}, got {found}"))]
    DimensionMismatch { expected: usize, found: usize },

    #[snafu(display(
        "could not choose a reasonable mean: the weight sum overflowed \
        (too many points or too large distances?)"
    ))]
    WeightOverflow,

    #[snafu(display("no medoid candidate improves the criterion (infinite or NaN distances?)"))]
    NoImprovingMedoid,

    #[snafu(display(
        "farthest-point seeding found only {found} of {k} means (NaN distances?)"
    ))]
    NoFarthestPoint { found: usize, k: usize },
}

impl KMeansError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KMeansError::NoImprovingMedoid | KMeansError::NoFarthestPoint { .. } => {
                ErrorKind::InvariantViolation
            }
            _ => ErrorKind::InvalidConfiguration,
        }
    }
}

pub type Result<T, E = KMeansError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_messages() {
        let err = TooFewPointsSnafu { k: 4usize, n: 3usize }.build();
        assert!(err.to_string().contains("fewer than 4 points"));
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let err = NoImprovingMedoidSnafu.build();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);

        let err = NoFarthestPointSnafu { found: 1usize, k: 3usize }.build();
        assert!(err.to_string().contains("only 1 of 3"));
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }
}
