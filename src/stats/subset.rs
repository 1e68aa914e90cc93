//! Band subsets of scene statistics.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::stats::DetectionStatistics;
use crate::trace::trace_event;
use crate::util::{SpectralError, SpectralResult};

/// Means, matrix and re-inverted matrix restricted to a band subset.
#[derive(Clone, Debug, PartialEq)]
pub struct PartialStatistics {
    bands: Vec<usize>,
    means: Vec<f64>,
    matrix: DMatrix<f64>,
    inverse: DMatrix<f64>,
}

impl PartialStatistics {
    /// Cube band indices the subset was taken over.
    pub fn bands(&self) -> &[usize] {
        &self.bands
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }
}

/// Statistics matching one target's resampled bands.
///
/// When the target covers every band the full statistics are borrowed as-is.
#[derive(Clone, Debug)]
pub enum StatisticsSubset<'a> {
    Full(&'a DetectionStatistics),
    Partial(Arc<PartialStatistics>),
}

impl StatisticsSubset<'_> {
    pub fn means(&self) -> &[f64] {
        match self {
            StatisticsSubset::Full(stats) => stats.means(),
            StatisticsSubset::Partial(sub) => &sub.means,
        }
    }

    pub fn inverse(&self) -> &DMatrix<f64> {
        match self {
            StatisticsSubset::Full(stats) => stats.inverse(),
            StatisticsSubset::Partial(sub) => &sub.inverse,
        }
    }

    /// Matrix dimension, equal to the number of resampled bands.
    pub fn dim(&self) -> usize {
        self.means().len()
    }

    pub fn is_full(&self) -> bool {
        matches!(self, StatisticsSubset::Full(_))
    }
}

/// Restricts `stats` to `bands`, re-inverting the sub-matrix when needed.
pub fn extract_subset<'a>(
    stats: &'a DetectionStatistics,
    bands: &[usize],
) -> SpectralResult<StatisticsSubset<'a>> {
    let dim = stats.dim();
    if bands.windows(2).any(|w| w[0] >= w[1]) || bands.last().is_some_and(|&b| b >= dim) {
        return Err(SpectralError::StatisticsMismatch {
            expected: dim,
            got: bands.last().map_or(0, |b| b + 1),
        });
    }
    if bands.len() == dim {
        return Ok(StatisticsSubset::Full(stats));
    }
    Ok(StatisticsSubset::Partial(Arc::new(compute_partial(stats, bands)?)))
}

fn compute_partial(stats: &DetectionStatistics, bands: &[usize]) -> SpectralResult<PartialStatistics> {
    let k = bands.len();
    let full = stats.matrix();
    let matrix = DMatrix::from_fn(k, k, |i, j| full[(bands[i], bands[j])]);
    let inverse = matrix
        .clone()
        .try_inverse()
        .ok_or(SpectralError::SingularMatrix { dim: k })?;
    Ok(PartialStatistics {
        bands: bands.to_vec(),
        means: bands.iter().map(|&b| stats.means()[b]).collect(),
        matrix,
        inverse,
    })
}

/// Extracts subsets for a sequence of targets, reusing the previous subset
/// when consecutive targets resolve to the same bands.
#[derive(Debug)]
pub struct SubsetExtractor<'a> {
    stats: &'a DetectionStatistics,
    cached: Option<Arc<PartialStatistics>>,
    reused: usize,
}

impl<'a> SubsetExtractor<'a> {
    pub fn new(stats: &'a DetectionStatistics) -> Self {
        Self {
            stats,
            cached: None,
            reused: 0,
        }
    }

    /// Returns the subset for `bands`.
    pub fn extract(&mut self, bands: &[usize]) -> SpectralResult<StatisticsSubset<'a>> {
        if let Some(cached) = &self.cached {
            if cached.bands == bands {
                self.reused += 1;
                trace_event!("subset_reused", bands = bands.len());
                return Ok(StatisticsSubset::Partial(Arc::clone(cached)));
            }
        }
        let subset = extract_subset(self.stats, bands)?;
        if let StatisticsSubset::Partial(partial) = &subset {
            self.cached = Some(Arc::clone(partial));
        }
        Ok(subset)
    }

    /// Number of extractions served from the cache.
    pub fn reused(&self) -> usize {
        self.reused
    }
}

/// CEM filter `w = Σ⁻¹ s / (sᵗ Σ⁻¹ s)`, so that `wᵗ s = 1`.
///
/// A zero-energy signature yields the unnormalised `Σ⁻¹ s`.
pub fn cem_operator(signature: &[f64], inverse: &DMatrix<f64>) -> SpectralResult<Vec<f64>> {
    let k = signature.len();
    if inverse.nrows() != k || inverse.ncols() != k {
        return Err(SpectralError::StatisticsMismatch {
            expected: k,
            got: inverse.nrows(),
        });
    }
    let s = DVector::from_column_slice(signature);
    let filtered = inverse * &s;
    let energy = s.dot(&filtered);
    let gain = if energy == 0.0 { 1.0 } else { 1.0 / energy };
    if !gain.is_finite() {
        return Err(SpectralError::DegenerateSignature {
            reason: "signature energy is not finite",
        });
    }
    Ok(filtered.iter().map(|v| v * gain).collect())
}
