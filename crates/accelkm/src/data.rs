use crate::{vmath, InvalidParameterSnafu, Result};
use snafu::prelude::*;
use std::ops::Range;

/// Read access to the points being clustered.
///
/// Points are identified by their position `0..len()`. Every point handed out
/// by [`point`](PointSource::point) has length [`dim`](PointSource::dim).
pub trait PointSource: Sync {
    fn len(&self) -> usize;

    /// Dimensionality of every point.
    fn dim(&self) -> usize;

    fn point(&self, id: usize) -> &[f64];

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ids(&self) -> Range<usize> {
        0..self.len()
    }
}

/// Row-major, owned point set.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    dim: usize,
    values: Vec<f64>,
}

impl Dataset {
    /// Wraps row-major `values` holding `values.len() / dim` points.
    pub fn new(dim: usize, values: Vec<f64>) -> Result<Self> {
        ensure!(
            dim > 0,
            InvalidParameterSnafu {
                name: "dim",
                reason: "dimensionality must be positive",
            }
        );
        ensure!(
            values.len().is_multiple_of(dim),
            InvalidParameterSnafu {
                name: "values",
                reason: format!("length {} is not a multiple of {dim}", values.len()),
            }
        );
        Ok(Self { dim, values })
    }

    /// Builds a dataset from rows of possibly different lengths. Shorter rows
    /// are padded with zeros up to the longest one.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Self {
        let dim = rows.iter().map(|r| r.as_ref().len()).max().unwrap_or(0);
        let mut values = Vec::with_capacity(rows.len() * dim);
        for row in rows {
            let row = row.as_ref();
            values.extend_from_slice(row);
            values.resize(values.len() + dim - row.len(), 0.0);
        }
        Self { dim, values }
    }

    /// Copies the given points of `source` into a new dataset.
    pub fn gather<P: PointSource + ?Sized>(source: &P, ids: &[usize]) -> Self {
        let dim = source.dim();
        let mut values = Vec::with_capacity(ids.len() * dim);
        for &id in ids {
            values.extend_from_slice(source.point(id));
        }
        Self { dim, values }
    }

    /// Scales every row to unit length; all-zero rows are left as they are.
    pub fn normalize_rows(&mut self) {
        if self.dim == 0 {
            return;
        }
        for row in self.values.chunks_exact_mut(self.dim) {
            vmath::normalize_in_place(row);
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.dim.max(1))
    }
}

impl PointSource for Dataset {
    fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.values.len() / self.dim }
    }

    fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    fn point(&self, id: usize) -> &[f64] {
        &self.values[id * self.dim..(id + 1) * self.dim]
    }
}

/// Copies a point into a fresh mean vector of the source's dimensionality,
/// padding with zeros when the point is shorter.
pub(crate) fn to_mean<P: PointSource + ?Sized>(points: &P, id: usize) -> Vec<f64> {
    let mut mean = points.point(id).to_vec();
    mean.resize(points.dim(), 0.0);
    mean
}
