use super::{Model, Observer};
use crate::data::PointSource;
use crate::distance::{self, Distance};
use log::debug;
use rayon::prelude::*;

const UNASSIGNED: usize = usize::MAX;

/// Points per work unit. Fixed, so that the merge order and with it the
/// rounding of the means does not depend on the number of threads.
const BLOCK: usize = 256;

/// Means, sizes and scatter of the points of one block.
#[derive(Debug, Clone)]
struct Partial {
    /// Running means over the members seen so far.
    means: Vec<Vec<f64>>,
    sizes: Vec<usize>,
    varsum: Vec<f64>,
    changed: usize,
    distance_computations: u64,
}

impl Partial {
    fn new(k: usize, dim: usize) -> Self {
        Self {
            means: vec![vec![0.0; dim]; k],
            sizes: vec![0; k],
            varsum: vec![0.0; k],
            changed: 0,
            distance_computations: 0,
        }
    }

    fn add(&mut self, cluster: usize, x: &[f64], sqdist: f64) {
        self.sizes[cluster] += 1;
        let inv = 1.0 / self.sizes[cluster] as f64;
        for (m, v) in self.means[cluster].iter_mut().zip(x) {
            *m += (v - *m) * inv;
        }
        self.varsum[cluster] += sqdist;
    }

    /// Folds `other` in, weighting each mean by its share of the combined
    /// cluster size.
    fn merge(&mut self, other: &Partial) {
        for (j, &size) in other.sizes.iter().enumerate() {
            if size == 0 {
                continue;
            }
            let total = self.sizes[j] + size;
            let weight = size as f64 / total as f64;
            for (m, o) in self.means[j].iter_mut().zip(&other.means[j]) {
                *m += (o - *m) * weight;
            }
            self.sizes[j] = total;
            self.varsum[j] += other.varsum[j];
        }
        self.changed += other.changed;
        self.distance_computations += other.distance_computations;
    }
}

/// Assigns one block of points, starting at point `offset`, to the nearest of
/// `means`.
fn assign_block<P: PointSource + ?Sized>(
    points: &P,
    distance: &dyn Distance,
    means: &[Vec<f64>],
    offset: usize,
    assignment: &mut [usize],
) -> Partial {
    let mut partial = Partial::new(means.len(), points.dim());
    for (i, slot) in assignment.iter_mut().enumerate() {
        let x = points.point(offset + i);
        // After the first pass, the current mean stays unless another is strictly closer.
        let keep = (*slot != UNASSIGNED).then_some(*slot);
        let (mut best, mut min) = match keep {
            Some(cur) => (cur, distance.distance(x, &means[cur])),
            None => (0, f64::INFINITY),
        };
        for (j, mean) in means.iter().enumerate() {
            if Some(j) == keep {
                continue;
            }
            let d = distance.distance(x, mean);
            if d < min {
                best = j;
                min = d;
            }
        }
        partial.distance_computations += means.len() as u64;
        if *slot != best {
            *slot = best;
            partial.changed += 1;
        }
        let sqdist = if distance.is_squared() { min } else { min * min };
        partial.add(best, x, sqdist);
    }
    partial
}

/// Lloyd's algorithm with the assignment step run on the rayon thread pool.
pub(crate) fn run<P: PointSource + ?Sized>(
    points: &P,
    distance: &dyn Distance,
    means: Vec<Vec<f64>>,
    max_iter: usize,
    varstat: bool,
    observer: &mut dyn Observer,
) -> Model {
    run_blocks(points, distance, means, max_iter, varstat, observer, BLOCK)
}

fn run_blocks<P: PointSource + ?Sized>(
    points: &P,
    distance: &dyn Distance,
    mut means: Vec<Vec<f64>>,
    max_iter: usize,
    varstat: bool,
    observer: &mut dyn Observer,
    block: usize,
) -> Model {
    let k = means.len();
    let dim = points.dim();
    let mut assignment = vec![UNASSIGNED; points.len()];
    let mut varsum = vec![0.0; k];
    let mut distance_computations = 0;

    let mut iteration = 0;
    while max_iter == 0 || iteration < max_iter {
        iteration += 1;
        observer.iteration_started(iteration);

        // Workers only read the means; each owns a disjoint slice of the
        // assignment.
        let snapshot = &means;
        let partials: Vec<Partial> = assignment
            .par_chunks_mut(block)
            .enumerate()
            .map(|(b, chunk)| assign_block(points, distance, snapshot, b * block, chunk))
            .collect();

        let mut total = Partial::new(k, dim);
        for partial in &partials {
            total.merge(partial);
        }
        distance_computations += total.distance_computations;
        varsum = total.varsum;

        let changed = total.changed;
        observer.iteration_finished(iteration, changed);
        debug!("iteration {iteration}: {changed} reassignments");
        if changed == 0 {
            break;
        }
        for ((mean, new), &size) in means.iter_mut().zip(total.means).zip(&total.sizes) {
            // Empty clusters keep their mean.
            if size > 0 {
                *mean = new;
            }
        }
    }

    let mut clusters = vec![Vec::new(); k];
    for (id, &c) in assignment.iter().enumerate() {
        clusters[c].push(id);
    }

    let scatter = if varstat {
        let exact = clusters
            .iter()
            .zip(&means)
            .map(|(members, mean)| {
                members
                    .iter()
                    .map(|&id| distance::squared(distance, points.point(id), mean))
                    .sum()
            })
            .collect();
        distance_computations += points.len() as u64;
        exact
    } else {
        varsum
    };

    Model {
        means,
        clusters,
        scatter: Some(scatter),
        iterations: iteration,
        distance_computations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::SquaredEuclidean;
    use crate::kmeans::hamerly::tests::{first_means, random_points};
    use crate::kmeans::instance::{Instance, Metric, Space};
    use crate::kmeans::lloyd::FullScan;
    use crate::kmeans::NoopObserver;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn running_means_merge() {
        let mut a = Partial::new(1, 1);
        a.add(0, &[1.0], 0.0);
        a.add(0, &[2.0], 0.0);
        let mut b = Partial::new(1, 1);
        b.add(0, &[6.0], 0.0);
        a.merge(&b);
        assert_eq!(a.sizes, vec![3]);
        assert_abs_diff_eq!(a.means[0][0], 3.0, epsilon = 1e-12);

        // Merging into an empty partial copies the other one.
        let mut empty = Partial::new(1, 1);
        empty.merge(&a);
        assert_abs_diff_eq!(empty.means[0][0], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn assigned_points_stay_on_ties() {
        let points = crate::data::Dataset::from_rows(&[[2.0], [2.0], [3.0]]);
        let means = vec![vec![0.0], vec![4.0]];
        let mut assignment = vec![UNASSIGNED, 1, 0];
        let partial = assign_block(&points, &SquaredEuclidean, &means, 0, &mut assignment);
        assert_eq!(assignment, vec![0, 1, 1]);
        assert_eq!(partial.changed, 2);
        assert_eq!(partial.sizes, vec![1, 2]);
    }

    #[test]
    fn matches_sequential_lloyd() {
        let points = random_points(7, 300, 3);
        let k = 6;

        let mut inst = Instance::new(
            &points,
            Metric::Distance(&SquaredEuclidean),
            Space::Euclidean,
            first_means(&points, k),
        );
        let mut policy = FullScan::new(k);
        let iterations = inst.run(&mut policy, 0, &mut NoopObserver);
        let lloyd = inst.into_model(None, true, iterations);

        // Small blocks so that many partials get merged.
        for block in [7, 64, 1024] {
            let parallel = run_blocks(
                &points,
                &SquaredEuclidean,
                first_means(&points, k),
                0,
                true,
                &mut NoopObserver,
                block,
            );
            assert_eq!(parallel.clusters, lloyd.clusters);
            assert_eq!(parallel.iterations, lloyd.iterations);
            for (p, l) in parallel.means.iter().zip(&lloyd.means) {
                for (x, y) in p.iter().zip(l) {
                    assert_abs_diff_eq!(*x, *y, epsilon = 1e-9);
                }
            }
            let (p, l) = (parallel.scatter.unwrap(), lloyd.scatter.clone().unwrap());
            for (x, y) in p.iter().zip(&l) {
                assert_abs_diff_eq!(*x, *y, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn first_iteration_counts_every_point() {
        let points = random_points(8, 40, 2);
        let model = run(&points, &SquaredEuclidean, first_means(&points, 3), 1, false, &mut NoopObserver);
        assert_eq!(model.iterations, 1);
        assert_eq!(model.clusters.iter().map(Vec::len).sum::<usize>(), 40);
        assert_eq!(model.distance_computations, 120);
    }
}
