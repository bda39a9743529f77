use super::instance::{BoundPolicy, Instance};
use crate::data::PointSource;

/// Hamerly's k-means: one upper bound on the distance to the own mean, one
/// lower bound on the distance to every other mean, plus the half distance
/// from each mean to its nearest neighbouring mean.
///
/// Also used, with unit-chord distances, for the Euclidean embedding of
/// spherical k-means.
#[derive(Debug)]
pub(crate) struct Hamerly {
    upper: Vec<f64>,
    lower: Vec<f64>,
    sep: Vec<f64>,
    movement: Vec<f64>,
}

impl Hamerly {
    pub(crate) fn new(n: usize, k: usize) -> Self {
        Self {
            upper: vec![f64::INFINITY; n],
            lower: vec![0.0; n],
            sep: vec![f64::INFINITY; k],
            movement: vec![0.0; k],
        }
    }

    #[inline]
    fn threshold(&self, id: usize, cur: usize) -> f64 {
        self.lower[id].max(self.sep[cur])
    }

    /// Nearest and second nearest mean, updating both bounds.
    ///
    /// `keep` carries the current mean and its exact distance; it stays
    /// unless another mean is strictly closer.
    fn full_scan<P: PointSource + ?Sized>(
        &mut self,
        inst: &Instance<'_, P>,
        id: usize,
        keep: Option<(usize, f64)>,
    ) -> usize {
        let x = inst.point(id);
        let (mut best, mut min1) = keep.unwrap_or((0, f64::INFINITY));
        let mut min2 = f64::INFINITY;
        for (j, mean) in inst.means.iter().enumerate() {
            if keep.is_some_and(|(cur, _)| cur == j) {
                continue;
            }
            let d = inst.measure(x, mean);
            if d < min1 {
                best = j;
                min2 = min1;
                min1 = d;
            } else if d < min2 {
                min2 = d;
            }
        }
        self.upper[id] = min1;
        self.lower[id] = min2;
        best
    }
}

impl BoundPolicy for Hamerly {
    fn prepare<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, initial: bool) {
        if !initial {
            inst.half_separation(&mut self.sep, None);
        }
    }

    fn initial_assign<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize) -> usize {
        self.full_scan(inst, id, None)
    }

    fn skip(&self, id: usize, cur: usize) -> bool {
        self.upper[id] <= self.threshold(id, cur)
    }

    fn tighten<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize, cur: usize) -> bool {
        self.upper[id] = inst.measure(inst.point(id), &inst.means[cur]);
        self.upper[id] <= self.threshold(id, cur)
    }

    fn scan<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize, cur: usize) -> usize {
        // Only reached after `tighten`, so the upper bound is exact.
        let exact = self.upper[id];
        self.full_scan(inst, id, Some((cur, exact)))
    }

    fn relax<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>) {
        inst.movement(&mut self.movement);
        let (most, delta, delta2) = largest_two(&self.movement);
        for (id, &a) in inst.assignment.iter().enumerate() {
            self.upper[id] += self.movement[a];
            // The lower bound stems from some other mean, so if the own mean
            // moved the most, the runner-up movement is enough.
            self.lower[id] -= if a == most { delta2 } else { delta };
        }
    }
}

/// Index of the largest value, the largest and the second largest value.
pub(crate) fn largest_two(values: &[f64]) -> (usize, f64, f64) {
    let (mut most, mut delta, mut delta2) = (usize::MAX, 0.0, 0.0);
    for (i, &v) in values.iter().enumerate() {
        if v > delta {
            most = i;
            delta2 = delta;
            delta = v;
        } else if v > delta2 {
            delta2 = v;
        }
    }
    (most, delta, delta2)
}
