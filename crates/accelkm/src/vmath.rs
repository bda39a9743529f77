//! Dense vector arithmetic used by every engine and seeding strategy.
//!
//! Dimensionality is validated once when a run starts, so these helpers only
//! `debug_assert!` matching lengths.

#[inline]
pub fn add(a: &[f64], b: &[f64]) -> Vec<f64> {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

#[inline]
pub fn scale(a: &[f64], s: f64) -> Vec<f64> {
    a.iter().map(|x| x * s).collect()
}

/// `dst += s * src`
#[inline]
pub fn axpy(dst: &mut [f64], src: &[f64], s: f64) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, x) in dst.iter_mut().zip(src) {
        *d = x.mul_add(s, *d);
    }
}

/// `dst = s * src`
#[inline]
pub fn overwrite_times(dst: &mut [f64], src: &[f64], s: f64) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, x) in dst.iter_mut().zip(src) {
        *d = x * s;
    }
}

#[inline]
pub fn plus_equals(sum: &mut [f64], v: &[f64]) {
    debug_assert_eq!(sum.len(), v.len());
    for (s, x) in sum.iter_mut().zip(v) {
        *s += x;
    }
}

/// Adds `v` to `add` and removes it from `sub` in one pass.
#[inline]
pub fn plus_minus_equals(add: &mut [f64], sub: &mut [f64], v: &[f64]) {
    debug_assert_eq!(add.len(), v.len());
    debug_assert_eq!(sub.len(), v.len());
    for ((a, s), x) in add.iter_mut().zip(sub.iter_mut()).zip(v) {
        *a += x;
        *s -= x;
    }
}

#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).fold(0.0, |acc, (x, y)| x.mul_add(*y, acc))
}

/// Squared Euclidean distance, never negative.
#[inline]
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let v = a.iter().zip(b).fold(0.0, |acc, (x, y)| {
        let d = x - y;
        d.mul_add(d, acc)
    });
    v.max(0.0)
}

#[inline]
pub fn euclidean_norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Scales `a` to unit length. Returns `false` and leaves `a` untouched when
/// its norm is zero or not finite.
#[inline]
pub fn normalize_in_place(a: &mut [f64]) -> bool {
    let norm = euclidean_norm(a);
    if norm > 0.0 && norm.is_finite() {
        let inv = 1.0 / norm;
        for x in a.iter_mut() {
            *x *= inv;
        }
        true
    } else {
        false
    }
}

/// Cosine distance of unit vectors, `2 - 2 * min(1, dot(a, b))`.
///
/// The clamp matters: the dot product of two normalized vectors can exceed 1
/// by a few ulps, and the pruned engines rely on this value being a proper
/// squared chord length.
#[inline]
pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    cosine_distance_from_similarity(dot(a, b))
}

#[inline]
pub fn cosine_distance_from_similarity(sim: f64) -> f64 {
    2.0 - 2.0 * sim.min(1.0)
}

/// Euclidean distance between two unit vectors with similarity `sim`.
#[inline]
pub fn chord_from_similarity(sim: f64) -> f64 {
    cosine_distance_from_similarity(sim).max(0.0).sqrt()
}

/// Lower bound on `cos(a + b)` for angles `a = acos(x)`, `b = acos(y)`.
///
/// This is the similarity after moving away by an angle `b` from something at
/// similarity `x`; it saturates at -1 once the angles add up to more than pi.
#[inline]
pub fn similarity_after_receding(x: f64, y: f64) -> f64 {
    let (x, y) = (x.clamp(-1.0, 1.0), y.clamp(-1.0, 1.0));
    if x + y < 0.0 {
        return -1.0;
    }
    let v = x * y - ((1.0 - x * x) * (1.0 - y * y)).max(0.0).sqrt();
    v.max(-1.0)
}

/// Upper bound on `cos(a - b)` for angles `a = acos(x)`, `b = acos(y)`.
///
/// This is the similarity after approaching by an angle `b` something at
/// similarity `x`; it saturates at 1 once `b >= a`.
#[inline]
pub fn similarity_after_approaching(x: f64, y: f64) -> f64 {
    let (x, y) = (x.clamp(-1.0, 1.0), y.clamp(-1.0, 1.0));
    if x >= y {
        return 1.0;
    }
    let v = x * y + ((1.0 - x * x) * (1.0 - y * y)).max(0.0).sqrt();
    v.min(1.0)
}

/// Arithmetic mean of the given points; the origin for an empty input.
pub fn centroid<'a>(dim: usize, points: impl IntoIterator<Item = &'a [f64]>) -> Vec<f64> {
    let mut sum = vec![0.0; dim];
    let mut count = 0usize;
    for p in points {
        plus_equals(&mut sum, p);
        count += 1;
    }
    if count > 0 {
        let inv = 1.0 / count as f64;
        for x in &mut sum {
            *x *= inv;
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn basic_ops() {
        assert_eq!(add(&[1.0, 2.0], &[3.0, 4.0]), vec![4.0, 6.0]);
        assert_eq!(scale(&[1.0, -2.0], 2.0), vec![2.0, -4.0]);

        let mut dst = vec![1.0, 1.0];
        axpy(&mut dst, &[2.0, 3.0], 0.5);
        assert_eq!(dst, vec![2.0, 2.5]);

        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
        assert_eq!(squared_euclidean(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 27.0);
        assert_eq!(euclidean_norm(&[3.0, 4.0]), 5.0);
    }

    #[test]
    fn plus_minus() {
        let mut a = vec![0.0, 0.0];
        let mut b = vec![5.0, 5.0];
        plus_minus_equals(&mut a, &mut b, &[1.0, 2.0]);
        assert_eq!(a, vec![1.0, 2.0]);
        assert_eq!(b, vec![4.0, 3.0]);
    }

    #[test]
    fn normalize() {
        let mut v = vec![3.0, 4.0];
        assert!(normalize_in_place(&mut v));
        assert_abs_diff_eq!(v[0], 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(v[1], 0.8, epsilon = 1e-12);

        let mut zero = vec![0.0, 0.0];
        assert!(!normalize_in_place(&mut zero));
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn cosine_distance_is_clamped() {
        // Slightly more than unit length, as produced by rounding.
        let a = [1.0 + 1e-15, 0.0];
        assert_eq!(cosine_distance(&a, &a), 0.0);
        assert_abs_diff_eq!(cosine_distance(&[1.0, 0.0], &[0.0, 1.0]), 2.0);
        assert_abs_diff_eq!(cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]), 4.0);
        assert_abs_diff_eq!(chord_from_similarity(0.0), 2f64.sqrt());
    }

    #[test]
    fn angle_bounds_match_trigonometry() {
        for &(a, b) in &[(0.3f64, 0.2f64), (1.0, 0.5), (0.1, 1.2), (2.0, 0.9)] {
            let (x, y) = (a.cos(), b.cos());
            let receding = if a + b >= std::f64::consts::PI { -1.0 } else { (a + b).cos() };
            let approaching = if b >= a { 1.0 } else { (a - b).cos() };
            assert_abs_diff_eq!(similarity_after_receding(x, y), receding, epsilon = 1e-12);
            assert_abs_diff_eq!(similarity_after_approaching(x, y), approaching, epsilon = 1e-12);
        }
        // Angles adding up to more than pi saturate.
        assert_eq!(similarity_after_receding((2.5f64).cos(), (1.0f64).cos()), -1.0);
    }

    #[test]
    fn centroid_of_points() {
        let pts: [&[f64]; 3] = [&[0.0, 0.0], &[3.0, 0.0], &[0.0, 3.0]];
        assert_eq!(centroid(2, pts), vec![1.0, 1.0]);
    }
}
