//! Pruned spherical k-means working directly on similarities.
//!
//! Larger is closer, so the roles of the bounds flip: each point keeps a
//! lower bound on the similarity to its own mean and upper bounds on the
//! similarity to other means. Mean movement is itself a similarity (between
//! the old and the new mean), and bounds are widened by adding or subtracting
//! the corresponding angles.

use super::instance::{BoundPolicy, Instance};
use crate::data::PointSource;
use crate::vmath::{similarity_after_approaching, similarity_after_receding};

/// Similarity above which a point is closer to mean `i` than to `j`:
/// the cosine of half the angle between the two means.
#[inline]
fn half_angle(cc: f64) -> f64 {
    ((1.0 + cc.min(1.0)) * 0.5).max(0.0).sqrt()
}

/// Fills `sep[i]` with the [`half_angle`] of mean `i` to its most similar
/// other mean, and optionally `cc` (`k * k`, row-major) with the similarities
/// of all pairs of means.
fn separation<P: PointSource + ?Sized>(
    inst: &Instance<'_, P>,
    sep: &mut [f64],
    mut cc: Option<&mut [f64]>,
) {
    let k = inst.k;
    let mut most = vec![f64::NEG_INFINITY; k];
    for i in 1..k {
        for j in 0..i {
            let s = inst.measure(&inst.means[i], &inst.means[j]);
            if let Some(t) = cc.as_deref_mut() {
                t[i * k + j] = s;
                t[j * k + i] = s;
            }
            most[i] = most[i].max(s);
            most[j] = most[j].max(s);
        }
    }
    for (sep, &s) in sep.iter_mut().zip(&most) {
        *sep = if s == f64::NEG_INFINITY { s } else { half_angle(s) };
    }
}

/// Index of the smallest value, the smallest and the second smallest value,
/// where nothing is smaller than 1.
fn least_two(values: &[f64]) -> (usize, f64, f64) {
    let (mut least, mut m1, mut m2) = (usize::MAX, 1.0, 1.0);
    for (i, &v) in values.iter().enumerate() {
        if v < m1 {
            least = i;
            m2 = m1;
            m1 = v;
        } else if v < m2 {
            m2 = v;
        }
    }
    (least, m1, m2)
}

/// Hamerly's bounds in similarity space.
#[derive(Debug)]
pub(crate) struct Hamerly {
    /// Lower bound on the similarity to the own mean.
    own: Vec<f64>,
    /// Upper bound on the similarity to every other mean.
    other: Vec<f64>,
    sep: Vec<f64>,
    movement: Vec<f64>,
}

impl Hamerly {
    pub(crate) fn new(n: usize, k: usize) -> Self {
        Self {
            own: vec![f64::NEG_INFINITY; n],
            other: vec![1.0; n],
            sep: vec![f64::NEG_INFINITY; k],
            movement: vec![1.0; k],
        }
    }

    #[inline]
    fn threshold(&self, id: usize, cur: usize) -> f64 {
        self.other[id].min(self.sep[cur])
    }

    /// Most and second most similar mean. `keep` is the current mean with
    /// its exact similarity; it stays unless another is strictly more similar.
    fn full_scan<P: PointSource + ?Sized>(
        &mut self,
        inst: &Instance<'_, P>,
        id: usize,
        keep: Option<(usize, f64)>,
    ) -> usize {
        let x = inst.point(id);
        let (mut best, mut max1) = keep.unwrap_or((0, f64::NEG_INFINITY));
        let mut max2 = f64::NEG_INFINITY;
        for (j, mean) in inst.means.iter().enumerate() {
            if keep.is_some_and(|(cur, _)| cur == j) {
                continue;
            }
            let s = inst.measure(x, mean);
            if s > max1 {
                best = j;
                max2 = max1;
                max1 = s;
            } else if s > max2 {
                max2 = s;
            }
        }
        self.own[id] = max1;
        self.other[id] = max2.max(-1.0);
        best
    }
}

impl BoundPolicy for Hamerly {
    fn prepare<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, initial: bool) {
        if !initial {
            separation(inst, &mut self.sep, None);
        }
    }

    fn initial_assign<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize) -> usize {
        self.full_scan(inst, id, None)
    }

    fn skip(&self, id: usize, cur: usize) -> bool {
        self.own[id] >= self.threshold(id, cur)
    }

    fn tighten<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize, cur: usize) -> bool {
        self.own[id] = inst.measure(inst.point(id), &inst.means[cur]);
        self.own[id] >= self.threshold(id, cur)
    }

    fn scan<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize, cur: usize) -> usize {
        // `tighten` just made the own bound exact.
        let exact = self.own[id];
        self.full_scan(inst, id, Some((cur, exact)))
    }

    fn relax<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>) {
        inst.movement(&mut self.movement);
        let (least, m1, m2) = least_two(&self.movement);
        for (id, &a) in inst.assignment.iter().enumerate() {
            self.own[id] = similarity_after_receding(self.own[id], self.movement[a]);
            // Same as the Euclidean version: if the own mean moved the most,
            // the others moved at most by the runner-up angle.
            let m = if a == least { m2 } else { m1 };
            self.other[id] = similarity_after_approaching(self.other[id], m);
        }
    }
}

/// Per-cluster similarity bounds, shared by the two Elkan variants.
#[derive(Debug)]
struct Bounds {
    k: usize,
    own: Vec<f64>,
    /// `n * k` upper bounds, row-major by point.
    other: Vec<f64>,
    movement: Vec<f64>,
}

impl Bounds {
    fn new(n: usize, k: usize) -> Self {
        Self {
            k,
            own: vec![f64::NEG_INFINITY; n],
            other: vec![1.0; n * k],
            movement: vec![1.0; k],
        }
    }

    /// Full scan. With the similarity and half-angle tables of the means, a
    /// mean is not compared at all when the best mean so far is provably
    /// closer; its bound is then derived from the angle between the two means
    /// instead.
    fn initial_assign<P: PointSource + ?Sized>(
        &mut self,
        inst: &Instance<'_, P>,
        id: usize,
        tables: Option<(&[f64], &[f64])>,
    ) -> usize {
        let k = self.k;
        let x = inst.point(id);
        let row = &mut self.other[id * k..(id + 1) * k];
        let mut best = 0;
        let mut max = inst.measure(x, &inst.means[0]);
        row[0] = max;
        for j in 1..k {
            if let Some((cc, half)) = tables {
                if max >= half[best * k + j] {
                    // cos(angle(best, j) - angle(x, best)) bounds the similarity.
                    let c = cc[best * k + j].clamp(-1.0, 1.0);
                    let s = max.clamp(-1.0, 1.0);
                    row[j] = (c * s + ((1.0 - c * c) * (1.0 - s * s)).max(0.0).sqrt()).min(1.0);
                    continue;
                }
            }
            let s = inst.measure(x, &inst.means[j]);
            row[j] = s;
            if s > max {
                best = j;
                max = s;
            }
        }
        self.own[id] = max;
        best
    }

    fn scan<P: PointSource + ?Sized>(
        &mut self,
        inst: &Instance<'_, P>,
        id: usize,
        orig: usize,
        half: Option<&[f64]>,
    ) -> usize {
        let k = self.k;
        let x = inst.point(id);
        let row = &mut self.other[id * k..(id + 1) * k];
        let pruned = |s: f64, best: usize, j: usize, row: &[f64]| {
            s >= row[j] || half.is_some_and(|h| s >= h[best * k + j])
        };

        let mut s = self.own[id];
        let mut best = orig;
        let mut exact = false;
        for j in 0..k {
            if j == orig || pruned(s, best, j, &*row) {
                continue;
            }
            if !exact {
                s = inst.measure(x, &inst.means[orig]);
                row[orig] = s;
                exact = true;
                if pruned(s, best, j, &*row) {
                    continue;
                }
            }
            let sj = inst.measure(x, &inst.means[j]);
            row[j] = sj;
            if sj > s {
                best = j;
                s = sj;
            }
        }
        self.own[id] = s;
        best
    }

    fn relax<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>) {
        inst.movement(&mut self.movement);
        let k = self.k;
        for (id, &a) in inst.assignment.iter().enumerate() {
            self.own[id] = similarity_after_receding(self.own[id], self.movement[a]);
            for (u, &m) in self.other[id * k..(id + 1) * k].iter_mut().zip(&self.movement) {
                *u = similarity_after_approaching(*u, m);
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct SimplifiedElkan {
    bounds: Bounds,
}

impl SimplifiedElkan {
    pub(crate) fn new(n: usize, k: usize) -> Self {
        Self {
            bounds: Bounds::new(n, k),
        }
    }
}

impl BoundPolicy for SimplifiedElkan {
    fn initial_assign<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize) -> usize {
        self.bounds.initial_assign(inst, id, None)
    }

    fn scan<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize, cur: usize) -> usize {
        self.bounds.scan(inst, id, cur, None)
    }

    fn relax<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>) {
        self.bounds.relax(inst);
    }
}

#[derive(Debug)]
pub(crate) struct Elkan {
    bounds: Bounds,
    /// `k * k` similarities between means.
    cc: Vec<f64>,
    /// `k * k` half-angle cosines derived from `cc`.
    half: Vec<f64>,
    sep: Vec<f64>,
}

impl Elkan {
    pub(crate) fn new(n: usize, k: usize) -> Self {
        Self {
            bounds: Bounds::new(n, k),
            cc: vec![1.0; k * k],
            half: vec![1.0; k * k],
            sep: vec![f64::NEG_INFINITY; k],
        }
    }
}

impl BoundPolicy for Elkan {
    fn prepare<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, _initial: bool) {
        separation(inst, &mut self.sep, Some(self.cc.as_mut_slice()));
        for (h, &cc) in self.half.iter_mut().zip(&self.cc) {
            *h = half_angle(cc);
        }
    }

    fn initial_assign<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize) -> usize {
        self.bounds.initial_assign(inst, id, Some((self.cc.as_slice(), self.half.as_slice())))
    }

    fn skip(&self, id: usize, cur: usize) -> bool {
        self.bounds.own[id] >= self.sep[cur]
    }

    fn scan<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize, cur: usize) -> usize {
        self.bounds.scan(inst, id, cur, Some(self.half.as_slice()))
    }

    fn relax<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>) {
        self.bounds.relax(inst);
    }
}
