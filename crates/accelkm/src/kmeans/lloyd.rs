use super::instance::{BoundPolicy, Instance, Metric};
use crate::data::PointSource;
use crate::vmath;

/// Lloyd's algorithm: every pass compares every point with every mean.
///
/// With [`Metric::Similarity`] this is spherical k-means, maximizing the dot
/// product instead of minimizing the distance.
#[derive(Debug)]
pub(crate) struct FullScan {
    varsum: Vec<f64>,
}

impl FullScan {
    pub(crate) fn new(k: usize) -> Self {
        Self {
            varsum: vec![0.0; k],
        }
    }
}

impl FullScan {
    /// Index of the nearest mean. With `keep`, that mean stays unless
    /// another one is strictly closer; otherwise the first closest wins.
    fn nearest<P: PointSource + ?Sized>(
        &mut self,
        inst: &Instance<'_, P>,
        id: usize,
        keep: Option<usize>,
    ) -> usize {
        let x = inst.point(id);
        let metric = inst.metric();
        let similarity = matches!(metric, Metric::Similarity);
        let closer = |a: f64, b: f64| if similarity { a > b } else { a < b };
        let (mut best, mut value) = match keep {
            Some(cur) => (cur, inst.cost(x, &inst.means[cur])),
            None if similarity => (0, f64::NEG_INFINITY),
            None => (0, f64::INFINITY),
        };
        for (j, mean) in inst.means.iter().enumerate() {
            if Some(j) == keep {
                continue;
            }
            let v = inst.cost(x, mean);
            if closer(v, value) {
                best = j;
                value = v;
            }
        }
        self.varsum[best] += match metric {
            Metric::Similarity => vmath::cosine_distance_from_similarity(value),
            Metric::Distance(d) if d.is_squared() => value,
            _ => value * value,
        };
        best
    }
}

impl BoundPolicy for FullScan {
    fn prepare<P: PointSource + ?Sized>(&mut self, _inst: &Instance<'_, P>, _initial: bool) {
        self.varsum.fill(0.0);
    }

    fn initial_assign<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize) -> usize {
        self.nearest(inst, id, None)
    }

    fn scan<P: PointSource + ?Sized>(&mut self, inst: &Instance<'_, P>, id: usize, cur: usize) -> usize {
        self.nearest(inst, id, Some(cur))
    }

    fn scatter(&self) -> Option<&[f64]> {
        Some(self.varsum.as_slice())
    }
}
