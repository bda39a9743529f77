use accelkm::{rng, Dataset, Initializer, KMeans, SquaredEuclidean, Variant};
use clap::Parser;
use rand::RngExt;
use std::time::Instant;

/// Runs every k-means variant on the same synthetic data and seeds, and
/// reports how much work each one needed.
#[derive(Parser)]
struct Args {
    /// Number of points
    #[arg(short, default_value_t = 10_000)]
    n: usize,

    /// Dimensionality
    #[arg(long, default_value_t = 8)]
    dim: usize,

    /// Number of clusters
    #[arg(short, default_value_t = 10)]
    k: usize,

    /// Number of Gaussian-ish blobs; 0 draws uniformly
    #[arg(long, default_value_t = 0)]
    blobs: usize,

    #[arg(long, default_value_t = rng::DEFAULT_SEED)]
    seed: u64,
}

fn generate(args: &Args) -> Dataset {
    let mut rng = rng::from_seed(args.seed);
    let centers: Vec<Vec<f64>> = (0..args.blobs)
        .map(|_| (0..args.dim).map(|_| rng.random::<f64>() * 20.0).collect())
        .collect();
    let mut values = Vec::with_capacity(args.n * args.dim);
    for i in 0..args.n {
        for d in 0..args.dim {
            let base = if centers.is_empty() { 0.0 } else { centers[i % centers.len()][d] };
            // Sum of uniforms, roughly normal.
            let noise: f64 = (0..4).map(|_| rng.random::<f64>() - 0.5).sum();
            values.push(base + noise * if centers.is_empty() { 10.0 } else { 1.0 });
        }
    }
    Dataset::new(args.dim, values).unwrap()
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let points = generate(&args);
    let mut normalized = points.clone();
    normalized.normalize_rows();

    let init = KMeans::new(args.k).with_seed(args.seed);
    let mut rng = rng::from_seed(args.seed);
    let means = Initializer::KMeansPlusPlus
        .choose_initial_means(&mut rng, &points, args.k, &SquaredEuclidean)
        .unwrap();
    let mut rng = rng::from_seed(args.seed);
    let unit_means = Initializer::KMeansPlusPlus
        .choose_initial_means(&mut rng, &normalized, args.k, &SquaredEuclidean)
        .unwrap();

    let mut reference = None;
    let mut spherical_reference = None;
    for variant in Variant::ALL {
        let (data, seeds, baseline) = if variant.is_spherical() {
            (&normalized, &unit_means, &mut spherical_reference)
        } else {
            (&points, &means, &mut reference)
        };
        let kmeans = init
            .clone()
            .with_variant(variant)
            .with_initializer(Initializer::Predefined(seeds.clone()));

        let t = Instant::now();
        let clustering = kmeans.run(data, &SquaredEuclidean).unwrap();
        let elapsed = t.elapsed();

        let labels = clustering.labels();
        let agreement = if let Some(expected) = baseline.as_ref() {
            let same = labels.iter().zip(expected).filter(|(a, b)| a == b).count();
            format!("{same}/{} labels agree", labels.len())
        } else {
            *baseline = Some(labels);
            "baseline".to_string()
        };

        println!(
            "{:>40}: {:>3} iterations, {:>10} distance computations, {:?}, {}",
            variant.name(),
            clustering.iterations,
            clustering.distance_computations,
            elapsed,
            agreement,
        );
    }
}
