use crate::{DimensionMismatchSnafu, PredefinedCountSnafu, Result};
use snafu::prelude::*;

pub(super) fn predefined(means: &[Vec<f64>], k: usize, dim: usize) -> Result<Vec<Vec<f64>>> {
    ensure!(
        means.len() == k,
        PredefinedCountSnafu {
            given: means.len(),
            k
        }
    );
    for mean in means {
        ensure!(
            mean.len() == dim,
            DimensionMismatchSnafu {
                expected: dim,
                found: mean.len()
            }
        );
    }
    Ok(means.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KMeansError;
    use pretty_assertions::assert_eq;

    #[test]
    fn count_must_match() {
        let means = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(predefined(&means, 2, 2).unwrap(), means);

        let err = predefined(&means, 3, 2).unwrap_err();
        assert!(matches!(err, KMeansError::PredefinedCount { given: 2, k: 3 }));
        assert_eq!(err.to_string(), "2 predefined means were given, but k is 3");
    }

    #[test]
    fn dimensionality_must_match() {
        let means = vec![vec![1.0, 2.0], vec![3.0]];
        let err = predefined(&means, 2, 2).unwrap_err();
        assert!(matches!(err, KMeansError::DimensionMismatch { expected: 2, found: 1 }));
    }
}
