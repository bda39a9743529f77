use crate::data::PointSource;
use crate::distance::{Distance, DistanceKind};
use crate::seeding::Initializer;
use crate::{rng, vmath, DimensionMismatchSnafu, Result, TooFewPointsSnafu, ZeroKSnafu};
use instance::{BoundPolicy, Instance, Metric, Space};
use log::{debug, info, warn};
use rand::RngExt;
use snafu::prelude::*;

pub(crate) mod elkan;
pub(crate) mod hamerly;
pub(crate) mod instance;
pub(crate) mod lloyd;
pub(crate) mod parallel;
pub(crate) mod spherical;

// References:
// - Using the Triangle Inequality to Accelerate k-Means (C. Elkan)
//   https://cdn.aaai.org/ICML/2003/ICML03-022.pdf
// - Making k-means even faster (G. Hamerly)
//   https://doi.org/10.1137/1.9781611972801.12
// - Accelerating Spherical k-Means (E. Schubert, A. Lang, G. Feher)
//   https://doi.org/10.1007/978-3-030-89657-7_17

/// The iteration engine.
///
/// All engines produce the same assignments for the same initial means; they
/// differ in how many distance computations they need to get there.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Variant {
    /// Compares every point with every mean in every iteration.
    #[default]
    Lloyd,
    /// Lloyd's algorithm with the assignment step spread over a thread pool.
    ParallelLloyd,
    Hamerly,
    /// Elkan's per-cluster lower bounds without the mean-to-mean table.
    SimplifiedElkan,
    Elkan,
    /// Lloyd-style iteration on unit vectors maximizing cosine similarity.
    /// The points are expected to be normalized.
    Spherical,
    SphericalHamerly,
    SphericalSimplifiedElkan,
    SphericalElkan,
    /// Hamerly on the chord distances of unit vectors.
    EuclideanSphericalHamerly,
    EuclideanSphericalSimplifiedElkan,
    EuclideanSphericalElkan,
}

impl Variant {
    pub const ALL: [Variant; 12] = [
        Variant::Lloyd,
        Variant::ParallelLloyd,
        Variant::Hamerly,
        Variant::SimplifiedElkan,
        Variant::Elkan,
        Variant::Spherical,
        Variant::SphericalHamerly,
        Variant::SphericalSimplifiedElkan,
        Variant::SphericalElkan,
        Variant::EuclideanSphericalHamerly,
        Variant::EuclideanSphericalSimplifiedElkan,
        Variant::EuclideanSphericalElkan,
    ];

    /// Whether the variant clusters unit vectors by cosine similarity.
    pub fn is_spherical(self) -> bool {
        !matches!(
            self,
            Variant::Lloyd
                | Variant::ParallelLloyd
                | Variant::Hamerly
                | Variant::SimplifiedElkan
                | Variant::Elkan
        )
    }

    /// Whether the variant relies on the triangle inequality.
    pub fn is_pruned(self) -> bool {
        !matches!(self, Variant::Lloyd | Variant::ParallelLloyd | Variant::Spherical)
    }

    pub fn name(self) -> &'static str {
        match self {
            Variant::Lloyd => "lloyd",
            Variant::ParallelLloyd => "parallel-lloyd",
            Variant::Hamerly => "hamerly",
            Variant::SimplifiedElkan => "simplified-elkan",
            Variant::Elkan => "elkan",
            Variant::Spherical => "spherical",
            Variant::SphericalHamerly => "spherical-hamerly",
            Variant::SphericalSimplifiedElkan => "spherical-simplified-elkan",
            Variant::SphericalElkan => "spherical-elkan",
            Variant::EuclideanSphericalHamerly => "euclidean-spherical-hamerly",
            Variant::EuclideanSphericalSimplifiedElkan => "euclidean-spherical-simplified-elkan",
            Variant::EuclideanSphericalElkan => "euclidean-spherical-elkan",
        }
    }
}

/// Callbacks at fixed points of a run. Nothing an observer does changes the
/// result.
pub trait Observer {
    fn seeding_started(&mut self, _initializer: &'static str) {}

    fn seeding_finished(&mut self, _k: usize) {}

    fn iteration_started(&mut self, _iteration: usize) {}

    /// `changed` is the number of reassigned points; every point counts in
    /// the first iteration.
    fn iteration_finished(&mut self, _iteration: usize, _changed: usize) {}
}

#[derive(Debug, Copy, Clone, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Receives the final partition, one cluster at a time.
pub trait ResultSink {
    fn cluster(&mut self, index: usize, members: &[usize], center: &[f64], scatter: Option<f64>);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Position of the cluster's mean among the k means, stable across
    /// empty clusters being dropped.
    pub index: usize,
    /// Sorted point ids.
    pub members: Vec<usize>,
    pub center: Vec<f64>,
    /// Sum of squared distances (cosine distances for the spherical
    /// variants) of the members to the center, when available.
    pub scatter: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Non-empty clusters in mean order.
    pub clusters: Vec<Cluster>,
    pub iterations: usize,
    pub distance_computations: u64,
}

impl Clustering {
    fn from_model(model: Model) -> Self {
        let Model {
            means,
            clusters,
            scatter,
            iterations,
            distance_computations,
        } = model;

        let clusters = means
            .into_iter()
            .zip(clusters)
            .enumerate()
            .filter_map(|(index, (center, members))| {
                if members.is_empty() {
                    debug!("dropping empty cluster {index}");
                    return None;
                }
                Some(Cluster {
                    index,
                    members,
                    center,
                    scatter: scatter.as_ref().map(|s| s[index]),
                })
            })
            .collect();

        Self {
            clusters,
            iterations,
            distance_computations,
        }
    }

    /// Position in [`clusters`](Self::clusters) for each of the `n` points.
    pub fn labels(&self) -> Vec<usize> {
        let n = self.clusters.iter().map(|c| c.members.len()).sum();
        let mut labels = vec![0; n];
        for (label, cluster) in self.clusters.iter().enumerate() {
            for &id in &cluster.members {
                labels[id] = label;
            }
        }
        labels
    }

    pub fn emit(&self, sink: &mut impl ResultSink) {
        for c in &self.clusters {
            sink.cluster(c.index, &c.members, &c.center, c.scatter);
        }
    }
}

/// Engine output before empty clusters are dropped.
#[derive(Debug)]
pub(crate) struct Model {
    pub(crate) means: Vec<Vec<f64>>,
    pub(crate) clusters: Vec<Vec<usize>>,
    pub(crate) scatter: Option<Vec<f64>>,
    pub(crate) iterations: usize,
    pub(crate) distance_computations: u64,
}

/// k-means parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    pub k: usize,
    /// Iteration limit; 0 runs until no point changes its cluster.
    pub max_iter: usize,
    pub variant: Variant,
    pub initializer: Initializer,
    /// Recompute the exact per-cluster scatter after the last iteration.
    pub varstat: bool,
    pub seed: u64,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            k: 2,
            max_iter: 0,
            variant: Variant::default(),
            initializer: Initializer::default(),
            varstat: false,
            seed: rng::DEFAULT_SEED,
        }
    }
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_initializer(mut self, initializer: Initializer) -> Self {
        self.initializer = initializer;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_varstat(mut self, varstat: bool) -> Self {
        self.varstat = varstat;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Seeds, iterates and collects the non-empty clusters.
    ///
    /// `distance` drives seeding and the non-spherical engines; the spherical
    /// engines always iterate on cosine similarity.
    pub fn run<P: PointSource + ?Sized>(
        &self,
        points: &P,
        distance: &dyn Distance,
    ) -> Result<Clustering> {
        self.run_observed(points, distance, &mut NoopObserver)
    }

    pub fn run_observed<P: PointSource + ?Sized>(
        &self,
        points: &P,
        distance: &dyn Distance,
        observer: &mut dyn Observer,
    ) -> Result<Clustering> {
        let mut rng = rng::from_seed(self.seed);
        let model = self.fit(&mut rng, points, distance, observer)?;
        Ok(Clustering::from_model(model))
    }

    pub(crate) fn fit<R: RngExt, P: PointSource + ?Sized>(
        &self,
        rng: &mut R,
        points: &P,
        distance: &dyn Distance,
        observer: &mut dyn Observer,
    ) -> Result<Model> {
        ensure!(self.k > 0, ZeroKSnafu);
        ensure!(
            points.len() >= self.k,
            TooFewPointsSnafu {
                k: self.k,
                n: points.len()
            }
        );
        self.check_distance(distance);

        observer.seeding_started(self.initializer.name());
        let mut means = self
            .initializer
            .choose_initial_means(rng, points, self.k, distance)?;
        observer.seeding_finished(means.len());
        debug_assert_eq!(means.len(), self.k);

        let dim = points.dim();
        for mean in &means {
            ensure!(
                mean.len() == dim,
                DimensionMismatchSnafu {
                    expected: dim,
                    found: mean.len()
                }
            );
        }
        if self.variant.is_spherical() {
            let off = non_unit_rows(points);
            if off > 0 {
                warn!(
                    "{} k-means expects unit-length rows, but {off} of {} rows are not normalized",
                    self.variant.name(),
                    points.len()
                );
            }
            for mean in &mut means {
                if !vmath::normalize_in_place(mean) {
                    warn!("initial mean has zero length and cannot be normalized");
                }
            }
        }

        let model = self.iterate(points, distance, means, observer);
        info!(
            "{} k-means with k={} finished after {} iterations, {} distance computations",
            self.variant.name(),
            self.k,
            model.iterations,
            model.distance_computations
        );
        Ok(model)
    }

    fn check_distance(&self, distance: &dyn Distance) {
        if self.variant.is_spherical() {
            return;
        }
        if self.variant.is_pruned() && !distance.is_metric() {
            warn!(
                "{} k-means needs a metric, but {} distance is not known to be one; \
                results may differ from Lloyd",
                self.variant.name(),
                distance.name()
            );
        }
        if !matches!(
            distance.kind(),
            DistanceKind::SquaredEuclidean | DistanceKind::Euclidean
        ) {
            warn!(
                "k-means minimizes squared Euclidean distances; with {} distance \
                the means may not minimize the objective",
                distance.name()
            );
        }
    }

    fn iterate<P: PointSource + ?Sized>(
        &self,
        points: &P,
        distance: &dyn Distance,
        means: Vec<Vec<f64>>,
        observer: &mut dyn Observer,
    ) -> Model {
        let (n, k) = (points.len(), means.len());
        let euclidean = |means: Vec<Vec<f64>>| {
            Instance::new(points, Metric::Distance(distance), Space::Euclidean, means)
        };
        let similarity =
            |means: Vec<Vec<f64>>| Instance::new(points, Metric::Similarity, Space::Spherical, means);
        let chord =
            |means: Vec<Vec<f64>>| Instance::new(points, Metric::UnitChord, Space::Spherical, means);

        match self.variant {
            Variant::Lloyd => self.drive(euclidean(means), lloyd::FullScan::new(k), observer),
            Variant::ParallelLloyd => {
                parallel::run(points, distance, means, self.max_iter, self.varstat, observer)
            }
            Variant::Hamerly => self.drive(euclidean(means), hamerly::Hamerly::new(n, k), observer),
            Variant::SimplifiedElkan => {
                self.drive(euclidean(means), elkan::SimplifiedElkan::new(n, k), observer)
            }
            Variant::Elkan => self.drive(euclidean(means), elkan::Elkan::new(n, k), observer),
            Variant::Spherical => self.drive(similarity(means), lloyd::FullScan::new(k), observer),
            Variant::SphericalHamerly => {
                self.drive(similarity(means), spherical::Hamerly::new(n, k), observer)
            }
            Variant::SphericalSimplifiedElkan => {
                self.drive(similarity(means), spherical::SimplifiedElkan::new(n, k), observer)
            }
            Variant::SphericalElkan => {
                self.drive(similarity(means), spherical::Elkan::new(n, k), observer)
            }
            Variant::EuclideanSphericalHamerly => {
                self.drive(chord(means), hamerly::Hamerly::new(n, k), observer)
            }
            Variant::EuclideanSphericalSimplifiedElkan => {
                self.drive(chord(means), elkan::SimplifiedElkan::new(n, k), observer)
            }
            Variant::EuclideanSphericalElkan => {
                self.drive(chord(means), elkan::Elkan::new(n, k), observer)
            }
        }
    }

    fn drive<P: PointSource + ?Sized, B: BoundPolicy>(
        &self,
        mut inst: Instance<'_, P>,
        mut policy: B,
        observer: &mut dyn Observer,
    ) -> Model {
        let iterations = inst.run(&mut policy, self.max_iter, observer);
        inst.into_model(policy.scatter(), self.varstat, iterations)
    }
}

/// Number of rows whose squared length is not within `1e-6` of one.
fn non_unit_rows<P: PointSource + ?Sized>(points: &P) -> usize {
    (0..points.len())
        .filter(|&id| {
            let x = points.point(id);
            (vmath::dot(x, x) - 1.0).abs() > 1e-6
        })
        .count()
}
