use super::instance::{BoundPolicy, Instance};
use crate::data::PointSource;

/// Upper bound on the distance to the own mean plus one lower bound per mean.
#[derive(Debug)]
struct Bounds {
    k: usize,
    upper: Vec<f64>,
    /// `n * k`, row-major by point.
    lower: Vec<f64>,
    movement: Vec<f64>,
}

impl Bounds {
    fn new(n: usize, k: usize) -> Self {
        Self {
            k,
            upper: vec![f64::INFINITY; n],
            lower: vec![0.0; n * k],
            movement: vec![0.0; k],
        }
    }

    fn initial_assign<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize) -> usize {
        let x = inst.point(id);
        let row = &mut self.lower[id * self.k..(id + 1) * self.k];
        let mut best = 0;
        let mut min = f64::INFINITY;
        for (j, mean) in inst.means.iter().enumerate() {
            let d = inst.measure(x, mean);
            row[j] = d;
            if d < min {
                best = j;
                min = d;
            }
        }
        self.upper[id] = min;
        best
    }

    /// Scans the means whose lower bound (or, with `cdist`, half distance to
    /// the current best mean) does not rule them out. The upper bound is made
    /// exact at most once, and only when some mean cannot be ruled out by the
    /// stale one.
    fn scan<P: PointSource + ?Sized>(
        &mut self,
        inst: &Instance<'_, P>,
        id: usize,
        orig: usize,
        cdist: Option<&[f64]>,
    ) -> usize {
        let k = self.k;
        let x = inst.point(id);
        let row = &mut self.lower[id * k..(id + 1) * k];
        let pruned = |u: f64, best: usize, j: usize, row: &[f64]| {
            u <= row[j] || cdist.is_some_and(|c| u <= c[best * k + j])
        };

        let mut u = self.upper[id];
        let mut best = orig;
        let mut exact = false;
        for j in 0..k {
            if j == orig || pruned(u, best, j, &*row) {
                continue;
            }
            if !exact {
                u = inst.measure(x, &inst.means[orig]);
                row[orig] = u;
                exact = true;
                if pruned(u, best, j, &*row) {
                    continue;
                }
            }
            let d = inst.measure(x, &inst.means[j]);
            row[j] = d;
            if d < u {
                best = j;
                u = d;
            }
        }
        self.upper[id] = u;
        best
    }

    fn relax<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>) {
        inst.movement(&mut self.movement);
        let k = self.k;
        for (id, &a) in inst.assignment.iter().enumerate() {
            self.upper[id] += self.movement[a];
            for (l, mv) in self.lower[id * k..(id + 1) * k].iter_mut().zip(&self.movement) {
                *l -= mv;
            }
        }
    }
}

/// Elkan's bounds without the mean-to-mean distances.
///
/// Also used, with unit-chord distances, for the Euclidean embedding of
/// spherical k-means.
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
        self.bounds.initial_assign(inst, id)
    }

    fn scan<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize, cur: usize) -> usize {
        self.bounds.scan(inst, id, cur, None)
    }

    fn relax<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>) {
        self.bounds.relax(inst);
    }
}

/// Elkan's k-means: per-cluster lower bounds, plus half the distance between
/// every pair of means.
#[derive(Debug)]
pub(crate) struct Elkan {
    bounds: Bounds,
    /// `k * k` half distances between means.
    cdist: Vec<f64>,
    sep: Vec<f64>,
}

impl Elkan {
    pub(crate) fn new(n: usize, k: usize) -> Self {
        Self {
            bounds: Bounds::new(n, k),
            cdist: vec![0.0; k * k],
            sep: vec![f64::INFINITY; k],
        }
    }
}

impl BoundPolicy for Elkan {
    fn prepare<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, initial: bool) {
        if !initial {
            inst.half_separation(&mut self.sep, Some(self.cdist.as_mut_slice()));
        }
    }

    fn initial_assign<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize) -> usize {
        self.bounds.initial_assign(inst, id)
    }

    fn skip(&self, id: usize, cur: usize) -> bool {
        self.bounds.upper[id] <= self.sep[cur]
    }

    fn scan<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize, cur: usize) -> usize {
        self.bounds.scan(inst, id, cur, Some(self.cdist.as_slice()))
    }

    fn relax<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>) {
        self.bounds.relax(inst);
    }
}
