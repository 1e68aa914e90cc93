//! Second-order band statistics of a scene.
//!
//! ACE whitens with the scene covariance, CEM with the second-moment matrix.
//! Both come from a [`StatisticsProvider`] once per run; per target the
//! scorer only needs the rows and columns of the bands the signature covers,
//! which [`SubsetExtractor`] derives and caches.

use nalgebra::DMatrix;

use crate::cube::{CubeAccessor, Roi};
use crate::util::{SpectralError, SpectralResult};

mod scene;
mod subset;

pub use scene::SceneStatistics;
pub use subset::{cem_operator, extract_subset, PartialStatistics, StatisticsSubset, SubsetExtractor};

/// Which band-by-band matrix the statistics hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatisticsKind {
    /// Mean-removed covariance.
    Covariance,
    /// Raw second moment `E[x xᵗ]`.
    SecondMoment,
}

impl StatisticsKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatisticsKind::Covariance => "covariance",
            StatisticsKind::SecondMoment => "second moment",
        }
    }
}

/// Band means plus a band-by-band matrix and its inverse.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionStatistics {
    kind: StatisticsKind,
    means: Vec<f64>,
    matrix: DMatrix<f64>,
    inverse: DMatrix<f64>,
}

impl DetectionStatistics {
    /// Builds statistics from means and a square matrix, inverting it.
    pub fn new(kind: StatisticsKind, means: Vec<f64>, matrix: DMatrix<f64>) -> SpectralResult<Self> {
        let dim = means.len();
        check_square(&matrix, dim)?;
        let inverse = matrix
            .clone()
            .try_inverse()
            .ok_or(SpectralError::SingularMatrix { dim })?;
        Ok(Self {
            kind,
            means,
            matrix,
            inverse,
        })
    }

    /// Builds statistics from a precomputed inverse.
    pub fn with_inverse(
        kind: StatisticsKind,
        means: Vec<f64>,
        matrix: DMatrix<f64>,
        inverse: DMatrix<f64>,
    ) -> SpectralResult<Self> {
        let dim = means.len();
        check_square(&matrix, dim)?;
        check_square(&inverse, dim)?;
        Ok(Self {
            kind,
            means,
            matrix,
            inverse,
        })
    }

    pub fn kind(&self) -> StatisticsKind {
        self.kind
    }

    /// Number of bands.
    pub fn dim(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn inverse(&self) -> &DMatrix<f64> {
        &self.inverse
    }
}

fn check_square(matrix: &DMatrix<f64>, dim: usize) -> SpectralResult<()> {
    if matrix.nrows() != dim || matrix.ncols() != dim {
        return Err(SpectralError::StatisticsMismatch {
            expected: dim,
            got: matrix.nrows().max(matrix.ncols()),
        });
    }
    Ok(())
}

/// Source of scene statistics for a cube.
pub trait StatisticsProvider: Send + Sync {
    /// Computes statistics over all bands of `cube`, optionally restricted to
    /// the pixels selected by `roi`.
    fn statistics(
        &self,
        cube: &dyn CubeAccessor,
        roi: Option<&Roi>,
        kind: StatisticsKind,
    ) -> SpectralResult<DetectionStatistics>;
}
