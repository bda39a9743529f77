use crate::vmath;
use std::fmt::Debug;

/// Well-known distances some algorithms need to recognise.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DistanceKind {
    SquaredEuclidean,
    Euclidean,
    /// Cosine distance of unit vectors, see [`Cosine`].
    Cosine,
    Other,
}

/// A pure pairwise distance between two vectors of equal length.
pub trait Distance: Debug + Send + Sync {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64;

    /// Whether this is the square of a metric; the pruned engines take the
    /// square root before using it in triangle inequalities.
    fn is_squared(&self) -> bool {
        false
    }

    /// Whether the triangle inequality holds (for the square root, if squared).
    fn is_metric(&self) -> bool {
        false
    }

    fn kind(&self) -> DistanceKind {
        DistanceKind::Other
    }

    fn name(&self) -> &'static str;
}

#[derive(Debug, Copy, Clone, Default)]
pub struct SquaredEuclidean;

impl Distance for SquaredEuclidean {
    #[inline]
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        vmath::squared_euclidean(a, b)
    }

    fn is_squared(&self) -> bool {
        true
    }

    fn is_metric(&self) -> bool {
        true
    }

    fn kind(&self) -> DistanceKind {
        DistanceKind::SquaredEuclidean
    }

    fn name(&self) -> &'static str {
        "squared Euclidean"
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Euclidean;

impl Distance for Euclidean {
    #[inline]
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        vmath::squared_euclidean(a, b).sqrt()
    }

    fn is_metric(&self) -> bool {
        true
    }

    fn kind(&self) -> DistanceKind {
        DistanceKind::Euclidean
    }

    fn name(&self) -> &'static str {
        "Euclidean"
    }
}

/// `2 - 2 * min(1, dot(a, b))`, the squared Euclidean distance of unit vectors.
///
/// Inputs are expected to be normalized; nothing here normalizes them.
#[derive(Debug, Copy, Clone, Default)]
pub struct Cosine;

impl Distance for Cosine {
    #[inline]
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        vmath::cosine_distance(a, b)
    }

    fn is_squared(&self) -> bool {
        true
    }

    fn is_metric(&self) -> bool {
        true
    }

    fn kind(&self) -> DistanceKind {
        DistanceKind::Cosine
    }

    fn name(&self) -> &'static str {
        "cosine"
    }
}

/// Squared distance as used for k-means++ style weights.
#[inline]
pub(crate) fn squared(distance: &dyn Distance, a: &[f64], b: &[f64]) -> f64 {
    let d = distance.distance(a, b);
    if distance.is_squared() { d } else { d * d }
}
