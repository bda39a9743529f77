//! Seeding for spherical k-means, on the cost `alpha - similarity`.
//!
//! With `alpha = 1` this is half the squared chord length between unit
//! vectors; larger values flatten the distribution towards uniform sampling.

use super::{mc2, plus_plus};
use crate::data::PointSource;
use crate::distance::{Distance, DistanceKind};
use crate::{vmath, InvalidParameterSnafu, Result};
use log::warn;
use rand::RngExt;
use snafu::prelude::*;

fn check_alpha(alpha: f64) -> Result<()> {
    ensure!(
        alpha >= 1.0,
        InvalidParameterSnafu {
            name: "alpha",
            reason: format!("{alpha} is less than 1"),
        }
    );
    Ok(())
}

fn is_cosine(distance: &dyn Distance, initializer: &str) -> bool {
    if distance.kind() == DistanceKind::Cosine {
        return true;
    }
    warn!(
        "{initializer} expects cosine distance on unit vectors, got {} distance; \
        using the regular variant",
        distance.name()
    );
    false
}

fn cost(alpha: f64) -> impl Fn(&[f64], &[f64]) -> f64 {
    move |x: &[f64], y: &[f64]| (alpha - vmath::dot(x, y)).max(0.0)
}

pub(super) fn kmeans_plus_plus<R: RngExt, P: PointSource + ?Sized>(
    rng: &mut R,
    points: &P,
    k: usize,
    distance: &dyn Distance,
    alpha: f64,
) -> Result<Vec<Vec<f64>>> {
    check_alpha(alpha)?;
    if !is_cosine(distance, "spherical k-means++") {
        return plus_plus::kmeans_plus_plus(rng, points, k, distance);
    }
    plus_plus::with_cost(rng, points, k, &cost(alpha))
}

pub(super) fn afkmc2<R: RngExt, P: PointSource + ?Sized>(
    rng: &mut R,
    points: &P,
    k: usize,
    distance: &dyn Distance,
    alpha: f64,
    chain_length: usize,
) -> Result<Vec<Vec<f64>>> {
    check_alpha(alpha)?;
    if !is_cosine(distance, "spherical AFK-MC²") {
        return mc2::afkmc2(rng, points, k, distance, chain_length);
    }
    mc2::chain(rng, points, k, chain_length, true, &cost(alpha))
}
