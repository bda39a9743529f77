use super::{Model, Observer};
use crate::data::PointSource;
use crate::distance::Distance;
use crate::vmath;
use log::debug;
use std::cell::Cell;
use std::collections::HashSet;

const UNASSIGNED: usize = usize::MAX;

// Below this norm (relative to the cluster size) a spherical sum is treated as
// zero and the previous mean is kept.
const SPHERICAL_ZERO_NORM: f64 = 1e-12;

/// How a pass compares points with means.
#[derive(Debug, Copy, Clone)]
pub(crate) enum Metric<'a> {
    /// Caller-supplied distance. Bounds use its square root when it is squared.
    Distance(&'a dyn Distance),
    /// Euclidean distance of unit vectors, derived from their dot product.
    UnitChord,
    /// Dot product of unit vectors. Larger is closer.
    Similarity,
}

/// How means are derived from cluster sums.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Space {
    Euclidean,
    Spherical,
}

/// Per-point bookkeeping that decides which distance computations a pass can
/// skip. Every engine except the parallel one is a `BoundPolicy` driven by
/// [`Instance::run`].
pub(crate) trait BoundPolicy {
    /// Called before every assignment pass. `initial` is set for the first,
    /// unpruned pass.
    fn prepare<P: PointSource + ?Sized>(&mut self, _inst: &Instance<'_, P>, _initial: bool) {}

    /// Full scan of point `id` against all means; seeds its bounds.
    fn initial_assign<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize) -> usize;

    /// Whether the stored bounds already prove `id` stays in `cur`.
    fn skip(&self, _id: usize, _cur: usize) -> bool {
        false
    }

    /// Recomputes the exact bound to the own mean and checks again.
    fn tighten<P: PointSource + ?Sized>(
        &mut self,
        _inst: &Instance<'_, P>,
        _id: usize,
        _cur: usize,
    ) -> bool {
        false
    }

    /// Finds the nearest mean of `id`, currently in `cur`, updating bounds.
    fn scan<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize, cur: usize) -> usize;

    /// Widens the bounds by the movement of the means in the last update.
    fn relax<P: PointSource + ?Sized>(&mut self, _inst: &Instance<'_, P>) {}

    /// Per-cluster scatter gathered during the last pass, if tracked.
    fn scatter(&self) -> Option<&[f64]> {
        None
    }
}

/// State of one sequential k-means run.
pub(crate) struct Instance<'a, P: PointSource + ?Sized> {
    points: &'a P,
    metric: Metric<'a>,
    space: Space,
    pub(crate) k: usize,
    pub(crate) means: Vec<Vec<f64>>,
    /// Means before the last update, for movement bounds.
    pub(crate) previous: Vec<Vec<f64>>,
    sums: Vec<Vec<f64>>,
    clusters: Vec<HashSet<usize>>,
    pub(crate) assignment: Vec<usize>,
    distance_computations: Cell<u64>,
}

impl<'a, P: PointSource + ?Sized> Instance<'a, P> {
    pub(crate) fn new(points: &'a P, metric: Metric<'a>, space: Space, means: Vec<Vec<f64>>) -> Self {
        let k = means.len();
        let n = points.len();
        let dim = points.dim();
        let guessed_size = n * 2 / k.max(1);
        Self {
            points,
            metric,
            space,
            k,
            previous: means.clone(),
            means,
            sums: vec![vec![0.0; dim]; k],
            clusters: (0..k).map(|_| HashSet::with_capacity(guessed_size)).collect(),
            assignment: vec![UNASSIGNED; n],
            distance_computations: Cell::new(0),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub(crate) fn point(&self, id: usize) -> &'a [f64] {
        self.points.point(id)
    }

    #[inline]
    pub(crate) fn metric(&self) -> Metric<'a> {
        self.metric
    }

    /// The value bounds are kept on: a metric distance, or a similarity for
    /// [`Metric::Similarity`].
    #[inline]
    pub(crate) fn measure(&self, x: &[f64], y: &[f64]) -> f64 {
        self.count();
        match self.metric {
            Metric::Distance(d) => {
                let v = d.distance(x, y);
                if d.is_squared() { v.sqrt() } else { v }
            }
            Metric::UnitChord => vmath::chord_from_similarity(vmath::dot(x, y)),
            Metric::Similarity => vmath::dot(x, y),
        }
    }

    /// The raw value the unpruned engines minimize (or maximize, for
    /// similarities).
    #[inline]
    pub(crate) fn cost(&self, x: &[f64], y: &[f64]) -> f64 {
        match self.metric {
            Metric::Distance(d) => {
                self.count();
                d.distance(x, y)
            }
            _ => self.measure(x, y),
        }
    }

    #[inline]
    fn count(&self) {
        self.distance_computations.set(self.distance_computations.get() + 1);
    }

    /// Contribution of `x` to the scatter of a cluster with mean `mean`.
    pub(crate) fn scatter_of(&self, x: &[f64], mean: &[f64]) -> f64 {
        match self.metric {
            Metric::Distance(d) => {
                self.count();
                let v = d.distance(x, mean);
                if d.is_squared() { v } else { v * v }
            }
            Metric::UnitChord | Metric::Similarity => {
                self.count();
                vmath::cosine_distance(x, mean)
            }
        }
    }

    /// Movement of every mean in the last update, in the units of
    /// [`measure`](Self::measure).
    pub(crate) fn movement(&self, out: &mut [f64]) {
        for (j, m) in out.iter_mut().enumerate() {
            *m = self.measure(&self.previous[j], &self.means[j]);
        }
    }

    /// Half the distance between every pair of means (`k * k`, row-major) and
    /// the smallest such value per mean. Only valid for distance metrics.
    pub(crate) fn half_separation(&self, sep: &mut [f64], mut cdist: Option<&mut [f64]>) {
        let k = self.k;
        sep.fill(f64::INFINITY);
        for i in 1..k {
            for j in 0..i {
                let d = 0.5 * self.measure(&self.means[i], &self.means[j]);
                if let Some(c) = cdist.as_deref_mut() {
                    c[i * k + j] = d;
                    c[j * k + i] = d;
                }
                sep[i] = sep[i].min(d);
                sep[j] = sep[j].min(d);
            }
        }
    }

    fn assign_initial(&mut self, id: usize, cluster: usize) {
        let x = self.points.point(id);
        vmath::plus_equals(&mut self.sums[cluster], x);
        self.clusters[cluster].insert(id);
        self.assignment[id] = cluster;
    }

    fn reassign(&mut self, id: usize, from: usize, to: usize) {
        debug_assert_ne!(from, to);
        let x = self.points.point(id);
        let (add, sub) = pair_mut(&mut self.sums, to, from);
        vmath::plus_minus_equals(add, sub, x);
        self.clusters[from].remove(&id);
        self.clusters[to].insert(id);
        self.assignment[id] = to;
        if self.clusters[from].is_empty() {
            // Drop accumulated rounding error instead of carrying it over.
            self.sums[from].fill(0.0);
        }
    }

    /// First pass: every point against every mean.
    pub(crate) fn initial_pass<B: BoundPolicy>(&mut self, policy: &mut B) -> usize {
        policy.prepare(self, true);
        for id in 0..self.len() {
            let best = policy.initial_assign(self, id);
            self.assign_initial(id, best);
        }
        self.len()
    }

    /// Bound-checked pass. Returns the number of reassigned points.
    pub(crate) fn pass<B: BoundPolicy>(&mut self, policy: &mut B) -> usize {
        policy.prepare(self, false);
        let mut changed = 0;
        for id in 0..self.len() {
            let cur = self.assignment[id];
            if policy.skip(id, cur) || policy.tighten(self, id, cur) {
                continue;
            }
            let best = policy.scan(self, id, cur);
            if best != cur {
                self.reassign(id, cur, best);
                changed += 1;
            }
        }
        changed
    }

    /// Derives new means from the cluster sums. Empty clusters keep their
    /// previous mean.
    pub(crate) fn update_means(&mut self) {
        for j in 0..self.k {
            self.previous[j].copy_from_slice(&self.means[j]);
            let size = self.clusters[j].len();
            if size == 0 {
                continue;
            }
            match self.space {
                Space::Euclidean => {
                    vmath::overwrite_times(&mut self.means[j], &self.sums[j], 1.0 / size as f64);
                }
                Space::Spherical => {
                    let norm = vmath::euclidean_norm(&self.sums[j]);
                    if norm > SPHERICAL_ZERO_NORM * size as f64 {
                        vmath::overwrite_times(&mut self.means[j], &self.sums[j], 1.0 / norm);
                    }
                }
            }
        }
    }

    /// Runs until no point changes its cluster, or for `max_iter` iterations
    /// unless that is zero. Returns the number of iterations performed.
    pub(crate) fn run<B: BoundPolicy>(
        &mut self,
        policy: &mut B,
        max_iter: usize,
        observer: &mut dyn Observer,
    ) -> usize {
        let mut iteration = 0;
        while max_iter == 0 || iteration < max_iter {
            iteration += 1;
            observer.iteration_started(iteration);
            let changed = if iteration == 1 {
                self.initial_pass(policy)
            } else {
                self.pass(policy)
            };
            observer.iteration_finished(iteration, changed);
            debug!("iteration {iteration}: {changed} reassignments");
            if changed == 0 {
                break;
            }
            self.update_means();
            policy.relax(self);
        }
        iteration
    }

    pub(crate) fn into_model(self, scatter: Option<&[f64]>, varstat: bool, iterations: usize) -> Model {
        let mut clusters: Vec<Vec<usize>> = self
            .clusters
            .iter()
            .map(|c| c.iter().copied().collect())
            .collect();
        for members in &mut clusters {
            members.sort_unstable();
        }

        let scatter = if varstat {
            Some(
                clusters
                    .iter()
                    .zip(&self.means)
                    .map(|(members, mean)| {
                        members
                            .iter()
                            .map(|&id| self.scatter_of(self.points.point(id), mean))
                            .sum()
                    })
                    .collect(),
            )
        } else {
            scatter.map(<[f64]>::to_vec)
        };

        Model {
            means: self.means,
            clusters,
            scatter,
            iterations,
            distance_computations: self.distance_computations.get(),
        }
    }
}

/// Two distinct mutable elements of a slice.
fn pair_mut<T>(v: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b);
    if a < b {
        let (lo, hi) = v.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = v.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::distance::SquaredEuclidean;
    use crate::kmeans::lloyd::FullScan;
    use crate::kmeans::NoopObserver;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    fn six_points() -> Dataset {
        Dataset::from_rows(&[
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [10.0, 10.0],
            [10.0, 11.0],
            [11.0, 10.0],
        ])
    }

    #[test]
    fn pair_mut_both_orders() {
        let mut v = vec![1, 2, 3];
        let (a, b) = pair_mut(&mut v, 0, 2);
        std::mem::swap(a, b);
        assert_eq!(v, vec![3, 2, 1]);
        let (a, b) = pair_mut(&mut v, 2, 1);
        *a += 10;
        *b += 20;
        assert_eq!(v, vec![3, 22, 11]);
    }

    #[test]
    fn sums_follow_reassignments() {
        let points = six_points();
        let means = vec![vec![0.0, 0.0], vec![0.0, 1.0]];
        let mut inst = Instance::new(&points, Metric::Distance(&SquaredEuclidean), Space::Euclidean, means);
        let mut policy = FullScan::new(2);

        assert_eq!(inst.initial_pass(&mut policy), 6);
        assert_eq!(inst.assignment, vec![0, 1, 0, 1, 1, 1]);
        inst.update_means();
        assert_eq!(inst.means[0], vec![0.5, 0.0]);
        assert_eq!(inst.means[1], vec![7.75, 8.0]);

        assert_eq!(inst.pass(&mut policy), 1);
        assert_eq!(inst.assignment, vec![0, 0, 0, 1, 1, 1]);
        inst.update_means();
        assert_abs_diff_eq!(inst.means[0][0], 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(inst.means[1][1], 31.0 / 3.0, epsilon = 1e-12);
        assert_eq!(inst.previous[1], vec![7.75, 8.0]);
    }

    #[test]
    fn empty_cluster_keeps_mean() {
        let points = six_points();
        // Nothing is closest to the far away mean.
        let means = vec![vec![0.0, 0.0], vec![10.0, 10.0], vec![-100.0, -100.0]];
        let mut inst = Instance::new(&points, Metric::Distance(&SquaredEuclidean), Space::Euclidean, means);
        let mut policy = FullScan::new(3);
        let iterations = inst.run(&mut policy, 0, &mut NoopObserver);
        assert_eq!(iterations, 2);
        assert_eq!(inst.means[2], vec![-100.0, -100.0]);
        let model = inst.into_model(policy.scatter(), true, iterations);
        assert_eq!(model.clusters[2], Vec::<usize>::new());
        assert_eq!(model.scatter.unwrap()[2], 0.0);
    }

    #[test]
    fn spherical_update_normalizes() {
        let points = Dataset::from_rows(&[[1.0, 0.0], [0.0, 1.0]]);
        let means = vec![vec![1.0, 0.0]];
        let mut inst = Instance::new(&points, Metric::Similarity, Space::Spherical, means);
        let mut policy = FullScan::new(1);
        inst.initial_pass(&mut policy);
        inst.update_means();
        let h = 0.5f64.sqrt();
        assert_abs_diff_eq!(inst.means[0][0], h, epsilon = 1e-12);
        assert_abs_diff_eq!(inst.means[0][1], h, epsilon = 1e-12);
    }

    #[test]
    fn antipodal_sum_keeps_previous_mean() {
        let points = Dataset::from_rows(&[[1.0, 0.0], [-1.0, 0.0]]);
        let means = vec![vec![0.0, 1.0]];
        let mut inst = Instance::new(&points, Metric::Similarity, Space::Spherical, means);
        let mut policy = FullScan::new(1);
        inst.initial_pass(&mut policy);
        inst.update_means();
        assert_eq!(inst.means[0], vec![0.0, 1.0]);
    }
}
